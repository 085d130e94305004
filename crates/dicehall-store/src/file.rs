//! JSON file backend with atomic replace.
//!
//! Commits serialize the whole state to `<path>.tmp`, fsync it, and rename
//! it over `<path>`. A crash at any point leaves either the old or the new
//! document in place, never a torn one.

use std::{
    fs::{self, File},
    io::Write,
    path::{Path, PathBuf},
};

use chrono::Utc;
use dicehall_types::{DicehallError, GameState, Result};

use crate::{
    schema,
    store::{Backend, TransactionalStore},
};

/// Persists the game state as one JSON document.
#[derive(Debug)]
pub struct JsonFileBackend {
    path: PathBuf,
    tmp_path: PathBuf,
}

impl JsonFileBackend {
    /// Open (or create) the document at `path`, migrating it in place if its
    /// schema is outdated.
    ///
    /// # Errors
    /// Returns `Io`/`Persistence` on disk failures and the migration errors
    /// of [`schema::migrate`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let mut tmp = path.clone().into_os_string();
        tmp.push(".tmp");
        let mut backend = Self {
            path,
            tmp_path: PathBuf::from(tmp),
        };

        if backend.path.exists() {
            let migrated = backend.read_migrated()?;
            if migrated.changed {
                tracing::info!(path = %backend.path.display(), "Persisting migrated state document");
                backend.commit(&migrated.state)?;
            }
        } else {
            tracing::info!(path = %backend.path.display(), "Creating empty state document");
            backend.commit(&GameState::default())?;
        }
        Ok(backend)
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_migrated(&self) -> Result<schema::Migrated> {
        let bytes = fs::read(&self.path)?;
        let raw = serde_json::from_slice(&bytes)?;
        schema::migrate(raw, Utc::now())
    }

    fn write_tmp(&self, bytes: &[u8]) -> std::io::Result<()> {
        let mut file = File::create(&self.tmp_path)?;
        file.write_all(bytes)?;
        file.sync_all()
    }
}

impl Backend for JsonFileBackend {
    fn load(&mut self) -> Result<GameState> {
        Ok(self.read_migrated()?.state)
    }

    fn commit(&mut self, state: &GameState) -> Result<()> {
        let bytes = serde_json::to_vec_pretty(state)?;
        self.write_tmp(&bytes).map_err(|e| {
            DicehallError::Persistence(format!("write {}: {e}", self.tmp_path.display()))
        })?;
        fs::rename(&self.tmp_path, &self.path).map_err(|e| {
            DicehallError::Persistence(format!("swap into {}: {e}", self.path.display()))
        })?;
        tracing::debug!(path = %self.path.display(), bytes = bytes.len(), "State committed");
        Ok(())
    }
}

/// Mutex-guarded store backed by a JSON document.
///
/// Each commit rewrites and fsyncs the whole document on the calling thread
/// while the store lock is held, so concurrent transactions queue behind the
/// disk. Sized for one process with a modest user base.
pub type JsonFileStore = TransactionalStore<JsonFileBackend>;

impl JsonFileStore {
    /// # Errors
    /// See [`JsonFileBackend::open`].
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::new(JsonFileBackend::open(path)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateStore;
    use dicehall_types::{User, UserId};

    #[test]
    fn open_creates_document() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let store = JsonFileStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.snapshot().unwrap(), GameState::default());
    }

    #[test]
    fn commits_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        {
            let store = JsonFileStore::open(&path).unwrap();
            store
                .transact(|s| {
                    let user = User::new(UserId(1), "alice", 1000, Utc::now());
                    s.users.insert(user.id, user);
                    s.house_balance = 20;
                    Ok(())
                })
                .unwrap();
        }
        let reopened = JsonFileStore::open(&path).unwrap();
        let snap = reopened.snapshot().unwrap();
        assert_eq!(snap.house_balance, 20);
        assert_eq!(snap.user(UserId(1)).unwrap().name, "alice");
        assert!(!dir.path().join("database.json.tmp").exists());
    }

    #[test]
    fn failed_mutation_does_not_touch_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        let store = JsonFileStore::open(&path).unwrap();
        let before = fs::read(&path).unwrap();
        let _ = store.transact(|s| -> Result<()> {
            s.house_balance = 7;
            Err(DicehallError::Internal("abort".into()))
        });
        assert_eq!(fs::read(&path).unwrap(), before);
    }

    #[test]
    fn legacy_document_is_migrated_on_open() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        fs::write(&path, br#"{"users": {}, "lobbies": {}}"#).unwrap();
        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.snapshot().unwrap().pending_confirmations.is_empty());
        let on_disk: serde_json::Value = serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
        assert!(on_disk.get("pending_confirmations").is_some());
        assert_eq!(on_disk["schema_version"], 2);
    }

    #[test]
    fn corrupt_document_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("database.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            JsonFileStore::open(&path),
            Err(DicehallError::Serialization(_))
        ));
    }
}
