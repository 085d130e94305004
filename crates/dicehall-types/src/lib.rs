//! # dicehall-types
//!
//! Shared types, errors, and configuration for **Dicehall**, a chat-driven
//! multiplayer dice competition with escrowed wagers.
//!
//! This crate is the leaf dependency of the workspace; every other crate
//! depends on it. It defines:
//!
//! - **Identifiers**: [`UserId`], [`LobbyId`], [`SettlementId`]
//! - **Users**: [`User`] with available/locked accounting
//! - **Lobbies**: [`Lobby`], [`LobbyPhase`], [`GameKind`], [`MatchState`], [`MatchPhase`]
//! - **Confirmations**: [`PendingConfirmation`], [`ConfirmAction`]
//! - **History**: [`BetRecord`], [`BetOutcome`]
//! - **Persisted root**: [`GameState`]
//! - **Configuration**: [`GameConfig`], [`GameLimits`]
//! - **Errors**: [`DicehallError`] with `DH_ERR_` prefix codes, flattened to [`Reason`]
//! - **Outcome envelope**: [`Outcome`] returned to the chat collaborator

pub mod config;
pub mod confirmation;
pub mod constants;
pub mod error;
pub mod history;
pub mod ids;
pub mod lobby;
pub mod outcome;
pub mod state;
pub mod user;

pub use config::*;
pub use confirmation::*;
pub use error::*;
pub use history::*;
pub use ids::*;
pub use lobby::*;
pub use outcome::*;
pub use state::*;
pub use user::*;

/// Virtual currency amount. Balances never go negative.
pub type Amount = u64;

// Constants are accessed via `dicehall_types::constants::FOO`
// (not re-exported to avoid name collisions).
