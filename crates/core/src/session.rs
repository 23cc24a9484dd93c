//! Persisted session state: cookies plus per-origin storage.
//!
//! The blob is written only after a positively observed authenticated state
//! and always as an indivisible unit; the core never interprets individual
//! fields.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;

/// A browser cookie as captured by the driver.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Unix timestamp in seconds; negative or absent means session cookie.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub http_only: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secure: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

impl Cookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: None,
            expires: None,
            http_only: None,
            secure: None,
            same_site: None,
        }
    }
}

/// A localStorage entry within an origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalStorageEntry {
    pub name: String,
    pub value: String,
}

/// Storage for a single origin.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    pub local_storage: Vec<LocalStorageEntry>,
}

/// Complete authenticated-session snapshot.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageState {
    pub cookies: Vec<Cookie>,
    #[serde(default)]
    pub origins: Vec<OriginState>,
}

impl StorageState {
    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }
}

/// Persists and loads the opaque session blob.
///
/// Injectable so tests can substitute an in-memory fake for the file-backed
/// store.
pub trait SessionStore: Send + Sync {
    /// `None` on missing or corrupt data; never fatal.
    fn load(&self) -> Option<StorageState>;

    /// Idempotent overwrite; no partial write is ever observable.
    fn save(&self, state: &StorageState) -> Result<()>;
}

/// File-backed store at a fixed path.
pub struct FileSessionStore {
    path: PathBuf,
}

impl FileSessionStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<StorageState> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return None,
        };
        match serde_json::from_str::<StorageState>(&content) {
            Ok(state) => {
                debug!(
                    target = "xpost",
                    path = %self.path.display(),
                    cookies = state.cookies.len(),
                    "loaded stored session"
                );
                Some(state)
            }
            Err(err) => {
                warn!(
                    target = "xpost",
                    path = %self.path.display(),
                    error = %err,
                    "stored session is corrupt, ignoring"
                );
                None
            }
        }
    }

    fn save(&self, state: &StorageState) -> Result<()> {
        let content = serde_json::to_string_pretty(state)?;
        // Write-then-rename so a crash mid-save leaves the old blob intact.
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, content)?;
        std::fs::rename(&tmp, &self.path)?;
        debug!(
            target = "xpost",
            path = %self.path.display(),
            cookies = state.cookies.len(),
            origins = state.origins.len(),
            "session saved"
        );
        Ok(())
    }
}
