//! Best-effort removal of transient UI obstructions.
//!
//! The service floats consent sheets, app-bar dialogs and an invisible
//! full-viewport mask over the timeline; any of them can swallow a click
//! meant for the composer. Dismissal is strictly best-effort: every step
//! tolerates its own failure so a later click at least has a chance of
//! landing on the intended element.

use std::time::Duration;

use tracing::trace;

use crate::driver::InteractiveDriver;
use crate::ui;

const CLICK_SETTLE: Duration = Duration::from_millis(300);

pub struct OverlayDismisser;

impl OverlayDismisser {
    /// Click every visible known obstruction closed, then strip residual
    /// intercepting layers via direct document mutation. Never fails.
    pub async fn dismiss(driver: &dyn InteractiveDriver) {
        for closer in &ui::OVERLAY_CLOSERS {
            if driver.first_visible(std::slice::from_ref(closer)).await == Some(0) {
                trace!(target = "xpost", ?closer, "dismissing overlay");
                let _ = driver.click(closer).await;
                driver.pause(CLICK_SETTLE).await;
            }
        }

        // Clicking is not enough for the pointer-events mask; mutate the
        // document directly.
        let _ = driver.evaluate(ui::STRIP_OVERLAYS_JS).await;
    }
}
