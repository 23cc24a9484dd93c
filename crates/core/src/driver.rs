//! The seam between the flow logic and the underlying browser engine.
//!
//! Every interaction primitive reports absence as a normal outcome rather
//! than raising: the remote surface re-renders asynchronously, so "not there
//! yet" is expected noise. Only the bounded waits built on top of these
//! primitives ever turn absence into a typed error.

use std::time::Duration;

use async_trait::async_trait;

use crate::session::StorageState;

/// A capability-typed way of finding an element, in preference order when
/// used in a candidate list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Descriptor {
    /// CSS selector.
    Css(&'static str),
    /// Accessibility role with a case-insensitive name pattern,
    /// e.g. `Role { role: "button", name: "next|continue" }`.
    Role {
        role: &'static str,
        name: &'static str,
    },
    /// Visible text matching a case-insensitive pattern anywhere on the page.
    Text(&'static str),
}

/// One branch of a bounded race: a descriptor plus the tag returned when it
/// becomes visible first.
#[derive(Debug, Clone)]
pub struct Condition {
    pub tag: &'static str,
    pub target: Descriptor,
}

impl Condition {
    pub fn new(tag: &'static str, target: Descriptor) -> Self {
        Self { tag, target }
    }
}

/// Tri-state result of a single interaction attempt.
///
/// `NotVisible` and `SurfaceChanged` are both retry signals for the caller's
/// bounded loop; the distinction only matters for logging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverOutcome {
    /// The action landed.
    Completed,
    /// The target is not visible (yet).
    NotVisible,
    /// The target existed but the surface re-rendered mid-action.
    SurfaceChanged,
}

impl DriverOutcome {
    pub fn completed(self) -> bool {
        matches!(self, DriverOutcome::Completed)
    }
}

/// Key combinations the flow needs, named by intent so the driver can pick
/// the platform-appropriate chord (Meta on macOS, Control elsewhere).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCombo {
    /// Select the whole content of the focused editable.
    SelectAll,
    /// Delete the current selection.
    DeleteSelection,
    /// Plain Enter.
    Enter,
    /// Platform submit chord (mod+Enter).
    Submit,
    /// A single character shortcut, e.g. `n` for the composer.
    Char(char),
}

/// Page navigation, element lookup, bounded waits and input injection,
/// supplied by a rendering engine the core never sees directly.
#[async_trait]
pub trait InteractiveDriver: Send + Sync {
    /// Navigate to `url`, waiting for the initial document. Navigation
    /// failure is absence, not an error: the caller tries the next URL.
    async fn open(&self, url: &str) -> DriverOutcome;

    /// Index of the first currently-visible candidate, probed once without
    /// waiting.
    async fn first_visible(&self, candidates: &[Descriptor]) -> Option<usize>;

    /// Race the named conditions for up to `timeout`; the first to become
    /// visible wins. `None` means the bound expired with no winner.
    async fn wait_for_any(
        &self,
        conditions: &[Condition],
        timeout: Duration,
    ) -> Option<&'static str>;

    /// Replace the value of the first visible match with `text`.
    async fn fill(&self, target: &Descriptor, text: &str) -> DriverOutcome;

    /// Click the first visible match with a synthesized pointer.
    async fn click(&self, target: &Descriptor) -> DriverOutcome;

    /// Activate the first match programmatically (in-page `el.click()`),
    /// bypassing hit-testing. Used when an invisible layer may intercept
    /// real pointer events.
    async fn click_js(&self, target: &Descriptor) -> DriverOutcome;

    /// Move keyboard focus to the first visible match.
    async fn focus(&self, target: &Descriptor) -> DriverOutcome;

    /// Send a key combination to the focused element.
    async fn press(&self, combo: KeyCombo) -> DriverOutcome;

    /// Insert `text` into the focused editable as one logical input event.
    async fn insert_text(&self, text: &str) -> DriverOutcome;

    /// Evaluate a script in the page. `None` on any evaluation failure.
    async fn evaluate(&self, script: &str) -> Option<serde_json::Value>;

    /// Snapshot cookies and per-origin storage for persistence. `None` if
    /// the engine cannot produce one right now.
    async fn storage_state(&self) -> Option<StorageState>;

    /// Apply a previously captured session before navigation. Best-effort:
    /// a stale blob simply leaves the run unauthenticated.
    async fn restore(&self, state: &StorageState);

    /// Sleep helper so tests can run without real delays.
    async fn pause(&self, duration: Duration);
}

/// Wait for a single descriptor, built on the race primitive.
pub async fn wait_for(
    driver: &dyn InteractiveDriver,
    target: &Descriptor,
    timeout: Duration,
) -> bool {
    driver
        .wait_for_any(&[Condition::new("it", target.clone())], timeout)
        .await
        .is_some()
}

/// First visible candidate within `timeout`, polling via the race primitive
/// one candidate set at a time. Shared by every ordered-fallback lookup.
pub async fn first_visible_within(
    driver: &dyn InteractiveDriver,
    candidates: &[Descriptor],
    timeout: Duration,
) -> Option<usize> {
    let conditions: Vec<Condition> = candidates
        .iter()
        .enumerate()
        .map(|(i, d)| Condition::new(INDEX_TAGS[i.min(INDEX_TAGS.len() - 1)], d.clone()))
        .collect();
    let tag = driver.wait_for_any(&conditions, timeout).await?;
    INDEX_TAGS.iter().position(|t| *t == tag)
}

// Tags for positional races; candidate lists in this crate stay well under
// this length.
const INDEX_TAGS: [&str; 10] = ["0", "1", "2", "3", "4", "5", "6", "7", "8", "9"];
