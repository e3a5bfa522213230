//! Persisted session storage.
//!
//! The browser front-end keeps the session in local storage under the key
//! `userInfor`. [`FileSessionStore`] mirrors that: a JSON object file where
//! each top-level key is one stored value and the session lives under
//! [`SESSION_KEY`]. Other keys in the file are preserved on write.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::CoreError;
use crate::session::Session;

/// Key the session is stored under.
pub const SESSION_KEY: &str = "userInfor";

/// Backing storage for a [`Session`].
///
/// Implementations are read on every request, so `load` should be cheap and
/// must never fail loudly: a missing or unreadable session is `None`.
pub trait SessionStore: Send + Sync {
    fn load(&self) -> Option<Session>;
    fn save(&self, session: &Session) -> Result<(), CoreError>;
    fn clear(&self) -> Result<(), CoreError>;
}

/// In-process session storage.
#[derive(Debug, Default)]
pub struct MemorySessionStore {
    session: Mutex<Option<Session>>,
}

impl SessionStore for MemorySessionStore {
    fn load(&self) -> Option<Session> {
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }

    fn save(&self, session: &Session) -> Result<(), CoreError> {
        *self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(session.clone());
        Ok(())
    }

    fn clear(&self) -> Result<(), CoreError> {
        *self
            .session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = None;
        Ok(())
    }
}

/// Key-value JSON file holding the session under [`SESSION_KEY`].
#[derive(Debug, Clone)]
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

    fn read_entries(&self) -> Option<serde_json::Map<String, serde_json::Value>> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(d) => d,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to read session file: {e}");
                return None;
            }
        };

        match serde_json::from_str::<serde_json::Value>(&data) {
            Ok(serde_json::Value::Object(map)) => Some(map),
            Ok(_) => {
                tracing::warn!(path = %self.path.display(), "session file is not a JSON object");
                None
            }
            Err(e) => {
                tracing::warn!(path = %self.path.display(), "failed to parse session file: {e}");
                None
            }
        }
    }

    fn write_entries(
        &self,
        entries: &serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), CoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(entries)?;
        std::fs::write(&self.path, json)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let perms = std::fs::Permissions::from_mode(0o600);
            let _ = std::fs::set_permissions(&self.path, perms);
        }

        Ok(())
    }
}

impl SessionStore for FileSessionStore {
    fn load(&self) -> Option<Session> {
        let value = self.read_entries()?.remove(SESSION_KEY)?;
        match serde_json::from_value(value) {
            Ok(session) => Some(session),
            Err(e) => {
                tracing::warn!("stored session has an unexpected shape: {e}");
                None
            }
        }
    }

    fn save(&self, session: &Session) -> Result<(), CoreError> {
        let mut entries = self.read_entries().unwrap_or_default();
        entries.insert(SESSION_KEY.to_string(), serde_json::to_value(session)?);
        self.write_entries(&entries)
    }

    fn clear(&self) -> Result<(), CoreError> {
        let Some(mut entries) = self.read_entries() else {
            return Ok(());
        };
        if entries.remove(SESSION_KEY).is_some() {
            self.write_entries(&entries)?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
