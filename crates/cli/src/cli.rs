use clap::{Parser, ValueEnum};
use std::path::PathBuf;

use xpost::{FlowConfig, Identity, Policy};

#[derive(Parser, Debug)]
#[command(name = "xpost")]
#[command(about = "Log into X and submit a post, reusing a saved session when possible")]
#[command(version)]
pub struct Cli {
    /// Text to post
    #[arg(value_name = "TEXT", env = "XPOST_TEXT")]
    pub content: Option<String>,

    /// Account username, email or phone
    #[arg(long, env = "XPOST_USERNAME")]
    pub username: Option<String>,

    /// Account password
    #[arg(long, env = "XPOST_PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Base32 TOTP secret for automated two-factor codes
    #[arg(long, env = "XPOST_2FA_SECRET", hide_env_values = true)]
    pub totp_secret: Option<String>,

    /// Pre-supplied one-time two-factor code (takes precedence over the secret)
    #[arg(long, env = "XPOST_2FA_CODE")]
    pub code: Option<String>,

    /// Open a headed browser and log in by hand instead of automating it
    #[arg(long, env = "XPOST_MANUAL_LOGIN")]
    pub manual_login: bool,

    /// Run the browser headless (ignored with --manual-login)
    #[arg(long, env = "XPOST_HEADLESS")]
    pub headless: bool,

    /// Device/user-agent profile to present
    #[arg(long, value_enum, default_value = "chromium", env = "XPOST_BROWSER")]
    pub engine: EngineChoice,

    /// Session file holding cookies and storage between runs
    #[arg(long, value_name = "FILE", default_value = "xpost-auth.json", env = "XPOST_SESSION_FILE")]
    pub session_file: PathBuf,

    /// Chrome/Chromium executable override
    #[arg(long, value_name = "PATH", env = "XPOST_CHROME")]
    pub chrome: Option<PathBuf>,

    /// Increase verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Which device profile to present to the service. Rendering always happens
/// in a Chromium binary; this only selects the advertised user agent.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum EngineChoice {
    #[default]
    Chromium,
    Webkit,
}

impl EngineChoice {
    pub fn user_agent(self) -> &'static str {
        match self {
            EngineChoice::Chromium => {
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                 (KHTML, like Gecko) Chrome/124.0.0.0 Safari/537.36"
            }
            EngineChoice::Webkit => {
                "Mozilla/5.0 (Macintosh; Intel Mac OS X 13_6) AppleWebKit/605.1.15 \
                 (KHTML, like Gecko) Version/17.1 Safari/605.1.15"
            }
        }
    }
}

impl Cli {
    /// Manual login always gets a headed browser so the operator can see it.
    pub fn effective_headless(&self) -> bool {
        !self.manual_login && self.headless
    }

    pub fn flow_config(&self) -> anyhow::Result<FlowConfig> {
        let content = self
            .content
            .clone()
            .ok_or_else(|| anyhow::anyhow!("no post text given (argument or XPOST_TEXT)"))?;

        Ok(FlowConfig {
            identity: Identity {
                username: self.username.clone().unwrap_or_default(),
                password: self.password.clone().unwrap_or_default(),
                totp_secret: self.totp_secret.clone(),
                explicit_code: self.code.clone(),
            },
            content,
            manual_login: self.manual_login,
            policy: Policy::default(),
        })
    }
}
