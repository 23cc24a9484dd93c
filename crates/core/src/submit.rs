//! Idempotent content submission.
//!
//! The composer may already hold a draft, the service may float a
//! save-draft dialog at any point, and an invisible overlay can intercept
//! the send click. The write is therefore a full replace, the primary
//! submit path is a keyboard chord, and a single secondary button-click
//! path runs only if the surface is still open afterwards.

use tracing::{debug, info, warn};

use crate::config::Policy;
use crate::driver::{wait_for, Descriptor, InteractiveDriver, KeyCombo};
use crate::error::{Result, XpostError};
use crate::overlay::OverlayDismisser;
use crate::ui;

/// How a submission attempt ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionOutcome {
    /// The content surface closed; the post went out.
    Submitted,
    /// Both paths ran and the surface is still open.
    StillOpen,
}

pub struct SubmissionProtocol<'a> {
    driver: &'a dyn InteractiveDriver,
    policy: &'a Policy,
}

impl<'a> SubmissionProtocol<'a> {
    pub fn new(driver: &'a dyn InteractiveDriver, policy: &'a Policy) -> Self {
        Self { driver, policy }
    }

    /// Open the composer, write `text` idempotently, and push it through
    /// the primary and (at most once) secondary submission path.
    pub async fn run(&self, text: &str) -> Result<()> {
        self.open_composer().await;
        let surface = self.locate_surface().await?;

        OverlayDismisser::dismiss(self.driver).await;
        self.write_content(&surface, text).await;
        OverlayDismisser::dismiss(self.driver).await;

        match self.submit(&surface).await {
            SubmissionOutcome::Submitted => {
                info!(target = "xpost", chars = text.chars().count(), "post submitted");
                Ok(())
            }
            SubmissionOutcome::StillOpen => Err(XpostError::SubmissionIncomplete),
        }
    }

    /// Click the first visible composer trigger; with none visible, fall
    /// back to the keyboard shortcut as a best-effort, unverified action.
    async fn open_composer(&self) {
        if let Some(idx) = self.driver.first_visible(&ui::COMPOSE_TRIGGERS).await {
            debug!(target = "xpost", trigger = idx, "opening composer");
            if self.driver.click(&ui::COMPOSE_TRIGGERS[idx]).await.completed() {
                return;
            }
        }
        debug!(target = "xpost", "no composer trigger visible, trying shortcut");
        let _ = self.driver.press(KeyCombo::Char('n')).await;
    }

    /// First visible content surface among the ordered candidates.
    async fn locate_surface(&self) -> Result<Descriptor> {
        match crate::driver::first_visible_within(
            self.driver,
            &ui::COMPOSER_SURFACES,
            self.policy.surface_wait,
        )
        .await
        {
            Some(idx) => Ok(ui::COMPOSER_SURFACES[idx].clone()),
            None => Err(XpostError::ComposerUnavailable),
        }
    }

    /// Full-replace write: select-all, delete, insert as one logical
    /// operation. Post-write content equals `text` regardless of whatever
    /// draft the surface held before.
    pub async fn write_content(&self, surface: &Descriptor, text: &str) {
        let _ = self.driver.focus(surface).await;
        let _ = self.driver.press(KeyCombo::SelectAll).await;
        let _ = self.driver.press(KeyCombo::DeleteSelection).await;
        let _ = self.driver.insert_text(text).await;
        self.driver.pause(self.policy.settle).await;
    }

    /// Primary path is the platform submit chord; the secondary
    /// button-click path runs exactly once, and only if the surface
    /// survived the primary path.
    async fn submit(&self, surface: &Descriptor) -> SubmissionOutcome {
        let _ = self.driver.press(KeyCombo::Submit).await;
        self.driver.pause(self.policy.settle).await;
        self.resolve_confirmation_dialog().await;

        if !self.surface_visible(surface).await {
            return SubmissionOutcome::Submitted;
        }

        warn!(target = "xpost", "composer still open after submit chord, clicking send");
        // Bounded wait, not an instant probe: the send control is often
        // still re-rendering at this point.
        if crate::driver::first_visible_within(
            self.driver,
            std::slice::from_ref(&ui::SEND_BUTTONS),
            self.policy.send_button_wait,
        )
        .await
        .is_some()
        {
            OverlayDismisser::dismiss(self.driver).await;
            // Programmatic activation: a leftover overlay must not be able
            // to swallow this click.
            let _ = self.driver.click_js(&ui::SEND_BUTTONS).await;
            self.driver.pause(self.policy.settle).await;
        }
        self.resolve_confirmation_dialog().await;

        if self.surface_visible(surface).await {
            SubmissionOutcome::StillOpen
        } else {
            SubmissionOutcome::Submitted
        }
    }

    /// Resolve a save/discard-style prompt if one appears within the short
    /// dialog bound.
    ///
    /// The fallback chain degrades from send-now through discard and cancel
    /// down to any control in the dialog, then any control on the page, so
    /// an unrecognized dialog cannot block the flow indefinitely. The
    /// page-wide last resort only runs once the dialog prompt has actually
    /// been observed.
    pub async fn resolve_confirmation_dialog(&self) {
        if !wait_for(self.driver, &ui::DRAFT_PROMPT, self.policy.dialog_wait).await {
            return;
        }
        debug!(target = "xpost", "confirmation dialog visible");

        let ranked = [
            ui::DIALOG_SEND_NOW,
            ui::DIALOG_DISCARD,
            ui::DIALOG_CANCEL,
            ui::DIALOG_ANY_BUTTON,
            ui::PAGE_ANY_BUTTON,
        ];
        for control in &ranked {
            if self
                .driver
                .first_visible(std::slice::from_ref(control))
                .await
                .is_some()
            {
                let _ = self.driver.click(control).await;
                break;
            }
        }
        self.driver.pause(self.policy.dialog_wait).await;
    }

    async fn surface_visible(&self, surface: &Descriptor) -> bool {
        self.driver
            .first_visible(std::slice::from_ref(surface))
            .await
            .is_some()
    }
}
