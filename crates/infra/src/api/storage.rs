//! Durable slot for the signed-in session
//!
//! A restart restores the identity and credentials without a new login.
//! Business data is never persisted; caches are memory-only.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use warehouse_domain::Session;

use super::errors::ApiError;

/// Key-value slot holding at most one session
pub trait SessionStorage: Send + Sync {
    fn load(&self) -> Result<Option<Session>, ApiError>;

    fn save(&self, session: &Session) -> Result<(), ApiError>;

    /// Clearing an empty slot succeeds.
    fn clear(&self) -> Result<(), ApiError>;
}

/// Process-lifetime storage; nothing survives a restart
#[derive(Debug, Default)]
pub struct MemorySessionStorage {
    slot: Mutex<Option<Session>>,
}

impl MemorySessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-filled slot, as if a previous run had saved `session`
    pub fn with_session(session: Session) -> Self {
        Self { slot: Mutex::new(Some(session)) }
    }
}

impl SessionStorage for MemorySessionStorage {
    fn load(&self) -> Result<Option<Session>, ApiError> {
        Ok(self.slot.lock().clone())
    }

    fn save(&self, session: &Session) -> Result<(), ApiError> {
        *self.slot.lock() = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), ApiError> {
        *self.slot.lock() = None;
        Ok(())
    }
}

/// JSON file slot
///
/// Writes go to a sibling temp file that is renamed over the target, so a
/// crash mid-write never leaves a truncated session behind.
#[derive(Debug, Clone)]
pub struct FileSessionStorage {
    path: PathBuf,
}

impl FileSessionStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self.path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl SessionStorage for FileSessionStorage {
    fn load(&self) -> Result<Option<Session>, ApiError> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(ApiError::Storage(format!(
                    "Failed to read session file {}: {err}",
                    self.path.display()
                )))
            }
        };

        serde_json::from_str(&contents).map(Some).map_err(|err| {
            ApiError::Storage(format!("Corrupt session file {}: {err}", self.path.display()))
        })
    }

    fn save(&self, session: &Session) -> Result<(), ApiError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|err| {
                ApiError::Storage(format!("Failed to create {}: {err}", parent.display()))
            })?;
        }

        let json = serde_json::to_vec_pretty(session)
            .map_err(|err| ApiError::Storage(format!("Failed to encode session: {err}")))?;
        let temp = self.temp_path();
        fs::write(&temp, json)
            .and_then(|()| fs::rename(&temp, &self.path))
            .map_err(|err| {
                ApiError::Storage(format!(
                    "Failed to write session file {}: {err}",
                    self.path.display()
                ))
            })
    }

    fn clear(&self) -> Result<(), ApiError> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(ApiError::Storage(format!(
                "Failed to remove session file {}: {err}",
                self.path.display()
            ))),
        }
    }
}
