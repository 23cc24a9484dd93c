//! Run configuration injected into the flow: who to log in as, what to
//! post, and the timing policy for every bounded wait.

use std::time::Duration;

use crate::error::{Result, XpostError};

/// Credential set for the run. Immutable once built; never persisted.
#[derive(Clone, Default)]
pub struct Identity {
    pub username: String,
    pub password: String,
    /// Base32 TOTP secret for automated second-factor resolution.
    pub totp_secret: Option<String>,
    /// Pre-supplied one-time code; takes precedence over the TOTP secret.
    pub explicit_code: Option<String>,
}

// Manual impl so secrets never end up in logs via derived Debug.
impl std::fmt::Debug for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Identity")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("totp_secret", &self.totp_secret.as_ref().map(|_| "<redacted>"))
            .field("explicit_code", &self.explicit_code.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Identity {
    /// Both required secrets must be present before an automated login can
    /// start. Not enforced when a stored session already exists.
    pub fn require_credentials(&self) -> Result<()> {
        if self.username.is_empty() || self.password.is_empty() {
            return Err(XpostError::Config(
                "username and password are required when no stored session exists".into(),
            ));
        }
        Ok(())
    }
}

/// Timing and retry policy. The bounds mirror what the target service
/// tolerates in practice; all of them are injectable rather than baked into
/// the flow.
#[derive(Debug, Clone)]
pub struct Policy {
    /// Wait for an identifier input after navigating to an entry URL.
    pub form_reach: Duration,
    /// Wait for the identifier input on the detected form.
    pub identifier_wait: Duration,
    /// Per-iteration race between password and interposed identifier.
    pub password_race: Duration,
    /// Bounded identifier re-submissions before giving up.
    pub password_discovery_attempts: u32,
    /// One last direct wait for the password field after the loop.
    pub password_final_wait: Duration,
    /// Back-off after a visible throttle banner.
    pub throttle_backoff: Duration,
    /// Race between home indicator and second-factor prompt.
    pub post_credentials: Duration,
    /// Wait for the second-factor input to appear.
    pub second_factor_input: Duration,
    /// Wait for home after submitting the second factor, and for the
    /// logged-in probe per indicator.
    pub home_wait: Duration,
    /// Per-indicator probe while checking an existing session.
    pub login_probe: Duration,
    /// Wait for the content surface to become visible.
    pub surface_wait: Duration,
    /// Wait for an enabled send control on the secondary submission path;
    /// the button is frequently mid-re-render right after the submit chord.
    pub send_button_wait: Duration,
    /// Window in which a confirmation dialog is considered solicited.
    pub dialog_wait: Duration,
    /// Short settle pause after input lands or a dialog is resolved.
    pub settle: Duration,
    /// Pause after landing on home before touching the composer.
    pub home_settle: Duration,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            form_reach: Duration::from_secs(30),
            identifier_wait: Duration::from_secs(20),
            password_race: Duration::from_secs(15),
            password_discovery_attempts: 3,
            password_final_wait: Duration::from_secs(10),
            throttle_backoff: Duration::from_secs(2),
            post_credentials: Duration::from_secs(20),
            second_factor_input: Duration::from_secs(15),
            home_wait: Duration::from_secs(20),
            login_probe: Duration::from_secs(4),
            surface_wait: Duration::from_secs(10),
            send_button_wait: Duration::from_secs(10),
            dialog_wait: Duration::from_millis(500),
            settle: Duration::from_millis(300),
            home_settle: Duration::from_secs(2),
        }
    }
}

/// Everything the flow needs beyond the driver and the session store.
#[derive(Debug, Clone)]
pub struct FlowConfig {
    pub identity: Identity,
    pub content: String,
    /// Hand the login step to the operator instead of automating it.
    pub manual_login: bool,
    pub policy: Policy,
}
