//! # dicehall-store
//!
//! **Durable Store**: the single source of truth for users, lobbies, pending
//! confirmations, the house pool, and bet history.
//!
//! ## Contract
//!
//! ```text
//! lock ─▶ load fresh snapshot ─▶ mutation(&mut snapshot) ─┬─ Ok  ─▶ commit (temp + swap) ─▶ unlock
//!                                                         └─ Err ─▶ discard snapshot    ─▶ unlock
//! ```
//!
//! One process-wide mutex guards every read → mutate → persist sequence, so
//! concurrent handlers can never interleave writes. Nothing read outside
//! [`StateStore::transact`] may be used to decide a mutation.
//!
//! Backends:
//! - [`MemoryBackend`]: committed state held in memory
//! - [`JsonFileBackend`]: JSON document on disk, replaced atomically via rename
//!
//! Both migrate the persisted schema explicitly at load ([`schema::migrate`]).

pub mod file;
pub mod memory;
pub mod schema;
pub mod store;

pub use file::{JsonFileBackend, JsonFileStore};
pub use memory::{MemoryBackend, MemoryStore};
pub use store::{Backend, StateStore, TransactionalStore};

#[cfg(any(test, feature = "test-helpers"))]
pub use memory::FaultyBackend;
