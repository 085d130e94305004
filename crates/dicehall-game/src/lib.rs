//! # dicehall-game
//!
//! Lobbies, matches and the async service the chat transport talks to.
//!
//! - [`LobbyRegistry`]: create / join / leave / kick / start / delete
//! - [`MatchEngine`]: roll submission, round resolution, finalization
//! - [`ConfirmationGate`]: two-step acknowledgment for destructive actions
//! - [`fan_out`]: best-effort per-member notification delivery
//! - [`GameService`]: ties the above to a [`dicehall_store::StateStore`]
//!
//! ## Lobby Lifecycle
//!
//! ```text
//! ┌────────┐  start   ┌─────────────────────────────┐  last round  ┌──────────┐
//! │  OPEN  │─────────▶│ STARTED: AwaitingRoll(r)... │─────────────▶│ FINISHED │──▶ settle, delete
//! └────────┘ lock all └─────────────────────────────┘              └──────────┘
//!     │                      │ leave / kick / delete
//!     └──────────────────────┴──────────────────────▶ release escrow, delete
//! ```
//!
//! Every state change happens inside one store transaction. Notifications
//! go out only after the commit and never affect the outcome.

pub mod clock;
pub mod confirmation;
pub mod engine;
pub mod notify;
pub mod query;
pub mod registry;
pub mod service;

pub use clock::{Clock, DiceSource, RandomDice, SystemClock};
#[cfg(any(test, feature = "test-helpers"))]
pub use clock::{ManualClock, ScriptedDice};
pub use confirmation::{ConfirmationGate, GateDecision};
pub use engine::{MatchEngine, MatchResult, RollResult, RoundResult};
#[cfg(any(test, feature = "test-helpers"))]
pub use notify::{FailingNotifier, RecordingNotifier};
pub use notify::{AbortCause, FanOutReport, Notification, Notifier, TracingNotifier, fan_out};
pub use query::{LeaderboardEntry, LobbyView, UserProfile};
pub use registry::{Departure, LobbyRegistry, LobbySummary};
pub use service::{ActionStatus, GameService};
