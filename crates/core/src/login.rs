//! The multi-path login state machine.
//!
//! The service serves at least two form variants (a multi-step identifier →
//! password flow and a legacy single-page form), may interpose an extra
//! identifier-echo step when it suspects fraud, and may demand a second
//! factor after the credentials land. Each ambiguity is resolved by a
//! bounded race over the possible next surfaces; the state is an explicit
//! tagged enum so every legal transition is enumerable and testable.

use std::time::Duration;

use tracing::{debug, info, warn};

use crate::config::{Identity, Policy};
use crate::driver::{wait_for, Condition, Descriptor, InteractiveDriver};
use crate::error::{Result, XpostError};
use crate::session::SessionStore;
use crate::two_factor::TwoFactorResolver;
use crate::ui;

/// Which login form the service decided to serve.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormVariant {
    /// Identifier and password inputs on one page (legacy mobile form).
    SingleStep,
    /// Identifier first, password on a later step.
    MultiStep,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    Start,
    FormDetected(FormVariant),
    IdentifierSubmitted,
    PasswordStep,
    CredentialsSubmitted,
    SecondFactor,
    Home,
    Failed,
}

/// Probe window used to tell the single-step variant apart from the
/// multi-step one once a form is on screen.
const VARIANT_PROBE: Duration = Duration::from_secs(1);

pub struct LoginStateMachine<'a> {
    driver: &'a dyn InteractiveDriver,
    store: &'a dyn SessionStore,
    resolver: TwoFactorResolver<'a>,
    policy: &'a Policy,
    state: LoginState,
}

impl<'a> LoginStateMachine<'a> {
    pub fn new(
        driver: &'a dyn InteractiveDriver,
        store: &'a dyn SessionStore,
        resolver: TwoFactorResolver<'a>,
        policy: &'a Policy,
    ) -> Self {
        Self {
            driver,
            store,
            resolver,
            policy,
            state: LoginState::Start,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    fn transition(&mut self, next: LoginState) {
        debug!(target = "xpost", from = ?self.state, to = ?next, "login transition");
        self.state = next;
    }

    /// Drive the flow to HOME or a terminal error. Saves the session
    /// exactly once, after the home indicator is positively observed.
    pub async fn run(&mut self, identity: &Identity) -> Result<()> {
        let result = self.drive(identity).await;
        if result.is_err() {
            self.transition(LoginState::Failed);
        }
        result
    }

    async fn drive(&mut self, identity: &Identity) -> Result<()> {
        let variant = self.detect_form().await?;
        self.transition(LoginState::FormDetected(variant));

        match variant {
            FormVariant::SingleStep => self.submit_single_step(identity).await?,
            FormVariant::MultiStep => {
                self.submit_identifier(identity).await?;
                self.transition(LoginState::IdentifierSubmitted);
                self.navigate_to_password(identity).await?;
                self.transition(LoginState::PasswordStep);
                self.submit_password(identity).await?;
            }
        }
        self.transition(LoginState::CredentialsSubmitted);

        match self.post_credentials_wait().await? {
            PostCredentials::Home => {}
            PostCredentials::SecondFactor => {
                self.transition(LoginState::SecondFactor);
                self.resolve_second_factor(identity).await?;
            }
        }

        self.transition(LoginState::Home);
        self.persist_session().await;
        info!(target = "xpost", username = %identity.username, "login complete");
        Ok(())
    }

    /// Try each entry URL until one shows a recognizable identifier input.
    async fn detect_form(&mut self) -> Result<FormVariant> {
        for url in ui::LOGIN_URLS {
            debug!(target = "xpost", %url, "trying login entry URL");
            if !self.driver.open(url).await.completed() {
                continue;
            }
            self.click_retry_if_present().await;
            if wait_for(self.driver, &ui::ANY_IDENTIFIER_INPUT, self.policy.form_reach).await {
                let variant = if wait_for(self.driver, &ui::MOBILE_USERNAME_INPUT, VARIANT_PROBE)
                    .await
                {
                    FormVariant::SingleStep
                } else {
                    FormVariant::MultiStep
                };
                info!(target = "xpost", %url, ?variant, "login form reached");
                return Ok(variant);
            }
        }
        Err(XpostError::FormUnreachable)
    }

    /// Pre-form acknowledgement control some entry pages interpose.
    async fn click_retry_if_present(&self) {
        if self
            .driver
            .first_visible(std::slice::from_ref(&ui::RETRY_BUTTON))
            .await
            .is_some()
        {
            let _ = self.driver.click(&ui::RETRY_BUTTON).await;
            self.driver.pause(self.policy.throttle_backoff).await;
        }
    }

    /// Both fields on one page: fill both, submit once.
    async fn submit_single_step(&self, identity: &Identity) -> Result<()> {
        let _ = self
            .driver
            .fill(&ui::MOBILE_USERNAME_INPUT, &identity.username)
            .await;
        let _ = self
            .driver
            .fill(&ui::MOBILE_PASSWORD_INPUT, &identity.password)
            .await;
        submit_via(self.driver, &ui::MOBILE_LOGIN_BUTTONS).await;
        Ok(())
    }

    async fn submit_identifier(&self, identity: &Identity) -> Result<()> {
        if crate::driver::first_visible_within(
            self.driver,
            &ui::IDENTIFIER_INPUTS,
            self.policy.identifier_wait,
        )
        .await
        .is_none()
        {
            return Err(XpostError::FormUnreachable);
        }
        let _ = self
            .driver
            .fill(&ui::INTERPOSED_IDENTIFIER, &identity.username)
            .await;
        submit_via(self.driver, &ui::NEXT_BUTTONS).await;
        Ok(())
    }

    /// Reach the password step past any interposed identifier-echo prompts.
    ///
    /// Each iteration races "password visible" against "identifier asked
    /// again"; an identifier hit re-submits the known identifier and loops.
    /// The loop is strictly bounded; exhaustion gets one final direct wait
    /// before the terminal error.
    async fn navigate_to_password(&self, identity: &Identity) -> Result<()> {
        let attempts = self.policy.password_discovery_attempts;
        for attempt in 0..attempts {
            let winner = self
                .driver
                .wait_for_any(
                    &[
                        Condition::new("password", ui::PASSWORD_INPUT),
                        Condition::new("identifier", ui::INTERPOSED_IDENTIFIER),
                    ],
                    self.policy.password_race,
                )
                .await;

            match winner {
                Some("password") => return Ok(()),
                Some(_) | None => {
                    debug!(target = "xpost", attempt, "password step not reached yet");
                    if self
                        .driver
                        .first_visible(std::slice::from_ref(&ui::THROTTLE_BANNER))
                        .await
                        .is_some()
                    {
                        warn!(target = "xpost", "throttle banner visible, backing off");
                        self.driver.pause(self.policy.throttle_backoff).await;
                    }
                    if self
                        .driver
                        .first_visible(std::slice::from_ref(&ui::INTERPOSED_IDENTIFIER))
                        .await
                        .is_some()
                    {
                        let _ = self
                            .driver
                            .fill(&ui::INTERPOSED_IDENTIFIER, &identity.username)
                            .await;
                        submit_via(self.driver, &ui::NEXT_BUTTONS).await;
                        self.click_retry_if_present().await;
                        self.driver.pause(self.policy.settle).await;
                    }
                }
            }
        }

        // One last direct wait before declaring the step unreachable.
        if wait_for(self.driver, &ui::PASSWORD_INPUT, self.policy.password_final_wait).await {
            return Ok(());
        }
        Err(XpostError::PasswordStepUnreachable { attempts })
    }

    async fn submit_password(&self, identity: &Identity) -> Result<()> {
        let _ = self
            .driver
            .fill(&ui::PASSWORD_INPUT, &identity.password)
            .await;
        submit_via(self.driver, std::slice::from_ref(&ui::LOGIN_BUTTON)).await;
        Ok(())
    }

    /// Race the authenticated-home indicator against a second-factor
    /// prompt; neither resolving within the bound is terminal.
    async fn post_credentials_wait(&self) -> Result<PostCredentials> {
        let winner = self
            .driver
            .wait_for_any(
                &[
                    Condition::new("home", ui::HOME_INDICATORS[0].clone()),
                    Condition::new("2fa", ui::SECOND_FACTOR_INPUT),
                    Condition::new("2fa", ui::SECOND_FACTOR_PROMPT),
                ],
                self.policy.post_credentials,
            )
            .await;

        match winner {
            Some("home") => Ok(PostCredentials::Home),
            Some(_) => Ok(PostCredentials::SecondFactor),
            None => Err(XpostError::LoginTimeout),
        }
    }

    async fn resolve_second_factor(&self, identity: &Identity) -> Result<()> {
        let code = self.resolver.resolve(identity).await?;

        if !wait_for(
            self.driver,
            &ui::SECOND_FACTOR_INPUT,
            self.policy.second_factor_input,
        )
        .await
        {
            return Err(XpostError::TwoFactorFailed(
                "verification-code input never appeared".into(),
            ));
        }
        let _ = self.driver.fill(&ui::SECOND_FACTOR_INPUT, &code).await;
        submit_via(self.driver, std::slice::from_ref(&ui::VERIFY_BUTTON)).await;

        if !wait_for(self.driver, &ui::HOME_INDICATORS[0], self.policy.home_wait).await {
            return Err(XpostError::TwoFactorFailed(
                "home indicator not visible after verification".into(),
            ));
        }
        Ok(())
    }

    /// Save the session blob; reaching this point requires a positive home
    /// observation, never a speculative one.
    async fn persist_session(&self) {
        match self.driver.storage_state().await {
            Some(state) => {
                if let Err(err) = self.store.save(&state) {
                    warn!(target = "xpost", error = %err, "failed to persist session");
                }
            }
            None => warn!(target = "xpost", "driver produced no session snapshot"),
        }
    }
}

enum PostCredentials {
    Home,
    SecondFactor,
}

/// Click the first visible control in `buttons`, falling back to Enter on
/// the focused element. The fallback is why this never fails.
pub(crate) async fn submit_via(driver: &dyn InteractiveDriver, buttons: &[Descriptor]) {
    if let Some(idx) = driver.first_visible(buttons).await {
        if driver.click(&buttons[idx]).await.completed() {
            return;
        }
    }
    let _ = driver.press(crate::driver::KeyCombo::Enter).await;
}
