//! Second-factor code resolution.
//!
//! Exactly one source is consulted per resolution, in priority order:
//! a pre-supplied one-time code, a TOTP secret, then an interactive prompt.
//! Sources are never combined or raced.

use std::time::{SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use totp_rs::{Algorithm, Secret, TOTP};
use tracing::debug;

use crate::config::Identity;
use crate::error::{Result, XpostError};

/// Line-based exchange with the operator. Injectable so tests can count
/// invocations and scripted answers.
#[async_trait]
pub trait Prompt: Send + Sync {
    /// Print `question` and block until the operator confirms a line.
    async fn read_line(&self, question: &str) -> std::io::Result<String>;
}

/// Reads from the process stdin on a blocking task.
pub struct StdinPrompt;

#[async_trait]
impl Prompt for StdinPrompt {
    async fn read_line(&self, question: &str) -> std::io::Result<String> {
        println!("{question}");
        tokio::task::spawn_blocking(|| {
            let mut input = String::new();
            std::io::stdin().read_line(&mut input)?;
            Ok(input)
        })
        .await
        .map_err(|e| std::io::Error::other(e))?
    }
}

pub struct TwoFactorResolver<'a> {
    prompt: &'a dyn Prompt,
}

impl<'a> TwoFactorResolver<'a> {
    pub fn new(prompt: &'a dyn Prompt) -> Self {
        Self { prompt }
    }

    /// Resolve a second-factor code from the highest-priority source the
    /// identity provides.
    pub async fn resolve(&self, identity: &Identity) -> Result<String> {
        if let Some(code) = &identity.explicit_code {
            debug!(target = "xpost", source = "explicit", "resolved second factor");
            return Ok(code.clone());
        }

        if let Some(secret) = &identity.totp_secret {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map_err(|e| XpostError::TwoFactorFailed(e.to_string()))?
                .as_secs();
            let code = code_for(secret, now)?;
            debug!(target = "xpost", source = "totp", "resolved second factor");
            return Ok(code);
        }

        let line = self
            .prompt
            .read_line("Enter 2FA code from email/auth app:")
            .await
            .map_err(|e| XpostError::TwoFactorFailed(e.to_string()))?;
        debug!(target = "xpost", source = "prompt", "resolved second factor");
        Ok(line.trim().to_string())
    }
}

/// Deterministic 6-digit code for a base32 secret and a unix timestamp,
/// per standard 30-second-window TOTP semantics.
pub fn code_for(secret: &str, unix_time: u64) -> Result<String> {
    let bytes = Secret::Encoded(secret.trim().to_uppercase())
        .to_bytes()
        .map_err(|e| XpostError::TwoFactorFailed(format!("bad TOTP secret: {e:?}")))?;
    // new_unchecked: authenticator-app secrets are frequently shorter than
    // the RFC-recommended 128 bits and must still work.
    let totp = TOTP::new_unchecked(Algorithm::SHA1, 6, 1, 30, bytes);
    Ok(totp.generate(unix_time))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingPrompt {
        calls: AtomicUsize,
        answer: &'static str,
    }

    impl CountingPrompt {
        fn new(answer: &'static str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                answer,
            }
        }
    }

    #[async_trait]
    impl Prompt for CountingPrompt {
        async fn read_line(&self, _question: &str) -> std::io::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.answer.to_string())
        }
    }

    const SECRET: &str = "JBSWY3DPEHPK3PXP";

    #[tokio::test]
    async fn explicit_code_wins_over_everything() {
        let prompt = CountingPrompt::new("ignored");
        let resolver = TwoFactorResolver::new(&prompt);
        let identity = Identity {
            explicit_code: Some("123456".into()),
            totp_secret: Some(SECRET.into()),
            ..Identity::default()
        };

        let code = resolver.resolve(&identity).await.unwrap();
        assert_eq!(code, "123456");
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn totp_secret_skips_the_prompt() {
        let prompt = CountingPrompt::new("ignored");
        let resolver = TwoFactorResolver::new(&prompt);
        let identity = Identity {
            totp_secret: Some(SECRET.into()),
            ..Identity::default()
        };

        let code = resolver.resolve(&identity).await.unwrap();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn prompt_is_last_resort_and_trimmed() {
        let prompt = CountingPrompt::new("  654321 \n");
        let resolver = TwoFactorResolver::new(&prompt);
        let identity = Identity::default();

        let code = resolver.resolve(&identity).await.unwrap();
        assert_eq!(code, "654321");
        assert_eq!(prompt.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn code_is_deterministic_within_a_window() {
        // Both timestamps fall inside the 30s window that opens at
        // 1_700_000_010.
        let a = code_for(SECRET, 1_700_000_010).unwrap();
        let b = code_for(SECRET, 1_700_000_029).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn code_changes_across_windows() {
        let a = code_for(SECRET, 1_700_000_010).unwrap();
        let b = code_for(SECRET, 1_700_000_040).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn garbage_secret_is_a_two_factor_error() {
        let err = code_for("not base32!!", 0).unwrap_err();
        assert!(matches!(err, XpostError::TwoFactorFailed(_)));
    }
}
