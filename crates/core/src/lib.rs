//! Resilient login and idempotent post submission for X.
//!
//! The target service exposes no stable programmatic API, only a dynamic
//! document surface. This crate coordinates with that surface through a
//! small driver abstraction: a multi-path login state machine, an
//! idempotent submission protocol, a ranked second-factor resolver, a
//! best-effort overlay dismisser and a persisted session store, all built
//! on bounded waits and racing outcomes.

pub mod config;
pub mod driver;
pub mod error;
pub mod flow;
pub mod login;
pub mod overlay;
pub mod session;
pub mod submit;
pub mod testing;
pub mod two_factor;
pub mod ui;

pub use config::{FlowConfig, Identity, Policy};
pub use driver::{Condition, Descriptor, DriverOutcome, InteractiveDriver, KeyCombo};
pub use error::{Result, XpostError};
pub use flow::run_flow;
pub use login::{FormVariant, LoginState, LoginStateMachine};
pub use overlay::OverlayDismisser;
pub use session::{Cookie, FileSessionStore, SessionStore, StorageState};
pub use submit::{SubmissionOutcome, SubmissionProtocol};
pub use two_factor::{Prompt, StdinPrompt, TwoFactorResolver};
