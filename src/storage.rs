//! Durable storage for the session's credentials.

use crate::UserProfile;
use serde_derive::{Deserialize, Serialize};
use std::{
    fs, io,
    path::{Path, PathBuf},
    sync::{Arc, Mutex, PoisonError},
};

/// The part of the session which survives a restart.
///
/// Whether the user is authenticated and whether we've hydrated are always
/// recomputed, so they never appear here.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub token: Option<String>,
    pub user: Option<UserProfile>,
}

/// Somewhere a [`Snapshot`] can be kept between runs.
pub trait Storage: Send + Sync {
    /// Read the last saved snapshot, if there is one.
    fn load(&self) -> Result<Option<Snapshot>, StorageError>;

    /// Replace the saved snapshot.
    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError>;
}

impl<S: Storage + ?Sized> Storage for Arc<S> {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        (**self).load()
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        (**self).save(snapshot)
    }
}

/// Errors that may occur while reading or writing a [`Snapshot`].
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Unable to access \"{}\"", path.display())]
    Io {
        path: PathBuf,
        #[source]
        error: io::Error,
    },
    #[error("The saved session is corrupt")]
    Corrupt(#[from] serde_json::Error),
}

/// A [`Storage`] which only lives as long as the process.
///
/// Clones share the same slot, so a test can hold onto one handle while the
/// session writes through another.
#[derive(Debug, Clone, Default)]
pub struct MemoryStorage {
    slot: Arc<Mutex<Option<Snapshot>>>,
}

impl MemoryStorage {
    pub fn new() -> Self { MemoryStorage::default() }

    pub fn with_snapshot(snapshot: Snapshot) -> Self {
        MemoryStorage {
            slot: Arc::new(Mutex::new(Some(snapshot))),
        }
    }

    /// Peek at whatever was last saved.
    pub fn contents(&self) -> Option<Snapshot> {
        self.slot
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

impl Storage for MemoryStorage {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        Ok(self.contents())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        *self.slot.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(snapshot.clone());
        Ok(())
    }
}

/// A [`Storage`] backed by a JSON file.
#[derive(Debug, Clone, PartialEq)]
pub struct FileStorage {
    path: PathBuf,
}

impl FileStorage {
    /// The name used for the session file, kept from the web dashboard's
    /// `auth-storage` key.
    pub const FILE_NAME: &'static str = "auth-storage.json";

    pub fn new(path: impl Into<PathBuf>) -> Self {
        FileStorage { path: path.into() }
    }

    /// `$DATA_DIR/salesdash/auth-storage.json`, falling back to the current
    /// directory when the platform has no data directory.
    pub fn default_location() -> Self {
        let base = dirs::data_dir().unwrap_or_else(|| PathBuf::from("."));
        FileStorage::new(
            base.join(env!("CARGO_PKG_NAME")).join(Self::FILE_NAME),
        )
    }

    pub fn path(&self) -> &Path { &self.path }

    fn io_error(&self, error: io::Error) -> StorageError {
        StorageError::Io {
            path: self.path.clone(),
            error,
        }
    }
}

impl Storage for FileStorage {
    fn load(&self) -> Result<Option<Snapshot>, StorageError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                log::debug!("No saved session at {}", self.path.display());
                return Ok(None);
            },
            Err(e) => return Err(self.io_error(e)),
        };

        let snapshot = serde_json::from_str(&raw)?;
        Ok(Some(snapshot))
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        fs::write(&self.path, json).map_err(|e| self.io_error(e))?;
        log::trace!("Saved the session to {}", self.path.display());

        Ok(())
    }
}
