//! The transactional store abstraction.

use std::sync::{Mutex, MutexGuard, PoisonError};

use dicehall_types::{GameState, Result};

/// Where committed state lives.
///
/// A backend is only ever driven from inside the store's critical section,
/// so implementations need no synchronization of their own.
pub trait Backend: Send {
    /// Load the latest committed state, migrating it if needed.
    fn load(&mut self) -> Result<GameState>;

    /// Replace the committed state atomically. On error the previously
    /// committed state must still be the one `load` returns.
    fn commit(&mut self, state: &GameState) -> Result<()>;
}

/// Atomic read-modify-write access to the full game state.
///
/// Transactions are synchronous: the caller's thread holds the critical
/// section from load to commit, including any backend I/O. Mutations must
/// stay short and never await. Async hosts whose backend touches the disk
/// should run on a multi-thread runtime so one commit cannot park every
/// worker.
pub trait StateStore: Send + Sync {
    /// Run `mutation` against a fresh snapshot and commit the result only if
    /// it returns `Ok`. On `Err` the snapshot is discarded and the error
    /// propagates unchanged.
    fn transact<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut GameState) -> Result<T>;

    /// A copy of the committed state. Stale as soon as it is returned; use
    /// only for read-only queries.
    fn snapshot(&self) -> Result<GameState>;
}

/// A [`StateStore`] that serializes every transaction through one mutex
/// wrapped around a [`Backend`].
pub struct TransactionalStore<B: Backend> {
    backend: Mutex<B>,
}

impl<B: Backend> TransactionalStore<B> {
    #[must_use]
    pub fn new(backend: B) -> Self {
        Self {
            backend: Mutex::new(backend),
        }
    }

    /// Run `f` on the backend inside the critical section.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        f(&mut self.lock())
    }

    /// A mutation that panicked never reached `commit`, so the committed
    /// state behind a poisoned lock is intact and safe to keep using.
    fn lock(&self) -> MutexGuard<'_, B> {
        self.backend.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<B: Backend> StateStore for TransactionalStore<B> {
    fn transact<T, F>(&self, mutation: F) -> Result<T>
    where
        F: FnOnce(&mut GameState) -> Result<T>,
    {
        let mut backend = self.lock();
        let mut snapshot = backend.load()?;
        let value = mutation(&mut snapshot)?;
        if let Err(err) = backend.commit(&snapshot) {
            tracing::warn!(error = %err, "State commit failed; prior state retained");
            return Err(err);
        }
        Ok(value)
    }

    fn snapshot(&self) -> Result<GameState> {
        self.lock().load()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use dicehall_types::{DicehallError, User, UserId};

    use super::*;
    use crate::{FaultyBackend, MemoryStore};

    fn register(state: &mut GameState, id: u64) {
        let user = User::new(UserId(id), format!("user{id}"), 1000, chrono::Utc::now());
        state.users.insert(user.id, user);
    }

    #[test]
    fn committed_mutation_is_visible() {
        let store = MemoryStore::default();
        store
            .transact(|s| {
                register(s, 1);
                Ok(())
            })
            .unwrap();
        let snap = store.snapshot().unwrap();
        assert!(snap.users.contains_key(&UserId(1)));
    }

    #[test]
    fn failed_mutation_leaves_state_untouched() {
        let store = MemoryStore::default();
        let err = store
            .transact(|s| -> Result<()> {
                register(s, 1);
                s.house_balance = 99;
                Err(DicehallError::Internal("boom".into()))
            })
            .unwrap_err();
        assert!(matches!(err, DicehallError::Internal(_)));
        let snap = store.snapshot().unwrap();
        assert!(snap.users.is_empty());
        assert_eq!(snap.house_balance, 0);
    }

    #[test]
    fn failed_commit_retains_prior_state() {
        let store = TransactionalStore::new(FaultyBackend::default());
        store
            .transact(|s| {
                register(s, 1);
                Ok(())
            })
            .unwrap();

        store.with_backend(|b| b.fail_next_commit());
        let err = store
            .transact(|s| {
                register(s, 2);
                Ok(())
            })
            .unwrap_err();
        assert!(err.is_retryable());

        let snap = store.snapshot().unwrap();
        assert!(snap.users.contains_key(&UserId(1)));
        assert!(!snap.users.contains_key(&UserId(2)));
    }

    #[test]
    fn panicking_mutation_does_not_wedge_store() {
        let store = Arc::new(MemoryStore::default());
        let s2 = Arc::clone(&store);
        let joined = std::thread::spawn(move || {
            let _ = s2.transact(|_| -> Result<()> { panic!("handler bug") });
        })
        .join();
        assert!(joined.is_err());
        store
            .transact(|s| {
                register(s, 3);
                Ok(())
            })
            .unwrap();
        assert_eq!(store.snapshot().unwrap().users.len(), 1);
    }

    #[test]
    fn concurrent_increments_are_not_lost() {
        let store = Arc::new(MemoryStore::default());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    for _ in 0..100 {
                        store
                            .transact(|s| {
                                s.house_balance += 1;
                                Ok(())
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(store.snapshot().unwrap().house_balance, 800);
    }
}
