use thiserror::Error;

pub type Result<T> = std::result::Result<T, XpostError>;

#[derive(Debug, Error)]
pub enum XpostError {
    /// Required configuration is missing or unusable. Fatal, never retried.
    #[error("configuration error: {0}")]
    Config(String),

    /// No entry URL produced a recognizable login form.
    #[error("could not reach a login form on any entry URL")]
    FormUnreachable,

    /// The password step never became visible within the bounded
    /// re-submission loop.
    #[error("password step unreachable after {attempts} identifier re-submissions")]
    PasswordStepUnreachable { attempts: u32 },

    /// Neither the authenticated-home indicator nor a second-factor prompt
    /// appeared after submitting credentials.
    #[error("login did not reach home or a second-factor prompt in time")]
    LoginTimeout,

    #[error("second factor failed: {0}")]
    TwoFactorFailed(String),

    /// No writable content surface became visible.
    #[error("could not find the post composer")]
    ComposerUnavailable,

    /// Both submission paths ran but the content surface is still open.
    #[error("post was written but the composer never closed")]
    SubmissionIncomplete,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl XpostError {
    /// Errors that abort the run before any interaction took place.
    pub fn is_config(&self) -> bool {
        matches!(self, XpostError::Config(_))
    }
}
