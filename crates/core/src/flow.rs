//! Top-level run sequencing: load session → log in if needed → submit →
//! persist the (possibly rotated) session again.

use tracing::{info, warn};

use crate::config::FlowConfig;
use crate::driver::{wait_for, InteractiveDriver};
use crate::error::{Result, XpostError};
use crate::login::LoginStateMachine;
use crate::session::SessionStore;
use crate::submit::SubmissionProtocol;
use crate::two_factor::{Prompt, TwoFactorResolver};
use crate::ui;

/// Run the whole flow against an already-launched driver.
///
/// The session file is written at two points: after login and after
/// submission, both times as a full overwrite so rotated tokens are kept.
pub async fn run_flow(
    driver: &dyn InteractiveDriver,
    store: &dyn SessionStore,
    config: &FlowConfig,
    prompt: &dyn Prompt,
) -> Result<()> {
    let stored = store.load();
    if stored.is_none() && !config.manual_login {
        config.identity.require_credentials()?;
    }
    if let Some(state) = &stored {
        driver.restore(state).await;
    }

    let _ = driver.open(ui::HOME_URL).await;

    if !is_logged_in(driver, config).await {
        if config.manual_login {
            manual_login(driver, prompt, config).await?;
        } else {
            // A stale blob must not let an automated login start with empty
            // credentials and burn the whole wait budget.
            config.identity.require_credentials()?;
            let resolver = TwoFactorResolver::new(prompt);
            let mut machine =
                LoginStateMachine::new(driver, store, resolver, &config.policy);
            machine.run(&config.identity).await?;
        }

        if !is_logged_in(driver, config).await {
            warn!(target = "xpost", "still unauthenticated after login flow");
            return Err(XpostError::LoginTimeout);
        }
    } else {
        info!(target = "xpost", "stored session is still authenticated");
    }

    // Refresh the blob before posting; login may have rotated cookies.
    persist(driver, store).await;

    let _ = driver.open(ui::HOME_URL).await;
    driver.pause(config.policy.home_settle).await;

    SubmissionProtocol::new(driver, &config.policy)
        .run(&config.content)
        .await?;

    // Capture tokens the submission itself may have rotated.
    persist(driver, store).await;
    Ok(())
}

/// Positive authenticated-state probe: any home indicator visible within
/// its own short bound.
async fn is_logged_in(driver: &dyn InteractiveDriver, config: &FlowConfig) -> bool {
    for indicator in &ui::HOME_INDICATORS {
        if wait_for(driver, indicator, config.policy.login_probe).await {
            return true;
        }
    }
    false
}

/// Operator-driven login: open a login form, then block until the operator
/// confirms they are done. The operator is handed a rendered form, not a
/// blank navigation: each entry URL gets a bounded wait for an identifier
/// input before the next one is tried.
async fn manual_login(
    driver: &dyn InteractiveDriver,
    prompt: &dyn Prompt,
    config: &FlowConfig,
) -> Result<()> {
    for url in ui::LOGIN_URLS {
        if driver.open(url).await.completed()
            && wait_for(driver, &ui::ANY_IDENTIFIER_INPUT, config.policy.form_reach).await
        {
            break;
        }
    }
    info!(target = "xpost", "manual login: complete the login in the browser");
    prompt
        .read_line("Press Enter after you finish logging in...")
        .await
        .map_err(XpostError::Io)?;
    Ok(())
}

async fn persist(driver: &dyn InteractiveDriver, store: &dyn SessionStore) {
    match driver.storage_state().await {
        Some(state) => {
            if let Err(err) = store.save(&state) {
                warn!(target = "xpost", error = %err, "failed to persist session");
            }
        }
        None => warn!(target = "xpost", "driver produced no session snapshot"),
    }
}
