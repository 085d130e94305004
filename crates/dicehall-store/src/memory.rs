//! In-memory backend.

use dicehall_types::{GameState, Result};

use crate::store::{Backend, TransactionalStore};

/// Keeps the committed state in memory. Commits are a plain replace.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    committed: GameState,
}

impl MemoryBackend {
    /// Start from an existing state (e.g. a fixture).
    #[must_use]
    pub fn with_state(state: GameState) -> Self {
        Self { committed: state }
    }
}

impl Backend for MemoryBackend {
    fn load(&mut self) -> Result<GameState> {
        Ok(self.committed.clone())
    }

    fn commit(&mut self, state: &GameState) -> Result<()> {
        self.committed = state.clone();
        Ok(())
    }
}

/// Mutex-guarded in-memory store.
pub type MemoryStore = TransactionalStore<MemoryBackend>;

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new(MemoryBackend::default())
    }
}

impl MemoryStore {
    #[must_use]
    pub fn with_state(state: GameState) -> Self {
        Self::new(MemoryBackend::with_state(state))
    }
}

/// In-memory backend whose next commit can be made to fail.
/// **Test fixture only.**
#[cfg(any(test, feature = "test-helpers"))]
#[derive(Debug, Default)]
pub struct FaultyBackend {
    inner: MemoryBackend,
    fail_commits: usize,
    commits: usize,
}

#[cfg(any(test, feature = "test-helpers"))]
impl FaultyBackend {
    /// Make the next commit fail.
    pub fn fail_next_commit(&mut self) {
        self.fail_commits += 1;
    }

    /// Number of successful commits so far.
    #[must_use]
    pub fn commits(&self) -> usize {
        self.commits
    }
}

#[cfg(any(test, feature = "test-helpers"))]
impl Backend for FaultyBackend {
    fn load(&mut self) -> Result<GameState> {
        self.inner.load()
    }

    fn commit(&mut self, state: &GameState) -> Result<()> {
        if self.fail_commits > 0 {
            self.fail_commits -= 1;
            return Err(dicehall_types::DicehallError::Persistence(
                "injected commit failure".into(),
            ));
        }
        self.commits += 1;
        self.inner.commit(state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::StateStore;

    #[test]
    fn load_returns_independent_copy() {
        let mut backend = MemoryBackend::default();
        let mut snap = backend.load().unwrap();
        snap.house_balance = 5;
        assert_eq!(backend.load().unwrap().house_balance, 0);
        backend.commit(&snap).unwrap();
        assert_eq!(backend.load().unwrap().house_balance, 5);
    }

    #[test]
    fn seeded_store_starts_from_fixture() {
        let state = GameState {
            house_balance: 42,
            ..GameState::default()
        };
        let store = MemoryStore::with_state(state);
        assert_eq!(store.snapshot().unwrap().house_balance, 42);
    }

    #[test]
    fn faulty_backend_counts_commits() {
        let mut backend = FaultyBackend::default();
        let snap = backend.load().unwrap();
        backend.fail_next_commit();
        assert!(backend.commit(&snap).is_err());
        assert!(backend.commit(&snap).is_ok());
        assert_eq!(backend.commits(), 1);
    }
}
