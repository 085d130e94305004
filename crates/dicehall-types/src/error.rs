//! Error types for Dicehall.
//!
//! All errors use the `DH_ERR_` prefix convention for easy grepping in logs.
//! Error codes are grouped by subsystem:
//! - 1xx: Lobby registry errors
//! - 2xx: Funds / ledger errors
//! - 3xx: Match errors
//! - 4xx: Bonus errors
//! - 5xx: Persistence errors
//! - 9xx: General / internal errors
//!
//! The chat collaborator never sees these variants directly: it receives the
//! flat [`Reason`] produced by [`DicehallError::reason`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Amount, LobbyId, UserId};

/// Central error enum for all Dicehall operations.
#[derive(Debug, Error)]
pub enum DicehallError {
    // =================================================================
    // Lobby Errors (1xx)
    // =================================================================
    /// No live lobby has this id.
    #[error("DH_ERR_100: Lobby not found: {0}")]
    LobbyNotFound(LobbyId),

    /// The lobby's match is already running.
    #[error("DH_ERR_101: Lobby {0} already started")]
    AlreadyStarted(LobbyId),

    /// The user is already seated in the lobby.
    #[error("DH_ERR_102: {user} is already a member of lobby {lobby}")]
    AlreadyMember { lobby: LobbyId, user: UserId },

    /// The lobby reached its capacity.
    #[error("DH_ERR_103: Lobby {lobby} is full ({capacity} seats)")]
    LobbyFull { lobby: LobbyId, capacity: usize },

    /// Only the creator may perform this action.
    #[error("DH_ERR_104: Only the creator of lobby {0} may do this")]
    NotCreator(LobbyId),

    /// The user is not seated in the lobby.
    #[error("DH_ERR_105: {user} is not a member of lobby {lobby}")]
    NotMember { lobby: LobbyId, user: UserId },

    /// The user already owns a live lobby.
    #[error("DH_ERR_106: {user} already owns lobby {lobby}")]
    AlreadyOwnsLobby { user: UserId, lobby: LobbyId },

    /// The creator cannot be kicked out of their own lobby.
    #[error("DH_ERR_107: The creator cannot be kicked from lobby {0}")]
    CannotKickCreator(LobbyId),

    /// Not enough members to start the match.
    #[error("DH_ERR_108: Lobby {lobby} needs at least {min} players, has {actual}")]
    BelowMinPlayers {
        lobby: LobbyId,
        min: usize,
        actual: usize,
    },

    /// Too many members for this game kind.
    #[error("DH_ERR_109: Lobby {lobby} allows at most {max} players, has {actual}")]
    AboveMaxPlayers {
        lobby: LobbyId,
        max: usize,
        actual: usize,
    },

    /// The requested wager is outside the configured bounds.
    #[error("DH_ERR_110: Wager {wager} outside [{min}, {max}]")]
    InvalidWager { wager: Amount, min: Amount, max: Amount },

    /// Could not allocate a free lobby id.
    #[error("DH_ERR_111: Lobby id space exhausted")]
    LobbyIdsExhausted,

    // =================================================================
    // Funds Errors (2xx)
    // =================================================================
    /// Available (unlocked) balance is below the requested amount.
    #[error("DH_ERR_200: Insufficient funds for {user}: need {needed}, available {available}")]
    InsufficientFunds {
        user: UserId,
        needed: Amount,
        available: Amount,
    },

    /// Settlement needs more locked balance than the user holds.
    #[error("DH_ERR_201: Insufficient locked funds for {user}: need {needed}, locked {locked}")]
    InsufficientLocked {
        user: UserId,
        needed: Amount,
        locked: Amount,
    },

    /// The user has never been registered.
    #[error("DH_ERR_202: Unknown user: {0}")]
    UnknownUser(UserId),

    /// A ledger invariant check failed. Critical safety alert.
    #[error("DH_ERR_203: Ledger invariant violation: {reason}")]
    LedgerInvariant { reason: String },

    /// An arithmetic step of a balance mutation overflowed.
    #[error("DH_ERR_204: Balance overflow for {0}")]
    BalanceOverflow(UserId),

    // =================================================================
    // Match Errors (3xx)
    // =================================================================
    /// The lobby has no running match.
    #[error("DH_ERR_300: Match in lobby {0} has not started")]
    NotStarted(LobbyId),

    /// The user already rolled in the current round.
    #[error("DH_ERR_301: {user} already rolled in round {round}")]
    AlreadyRolled { user: UserId, round: u32 },

    /// All rounds have been played; the match awaits settlement.
    #[error("DH_ERR_302: Match in lobby {0} is finished")]
    MatchFinished(LobbyId),

    /// The match is not in a state that can be finalized.
    #[error("DH_ERR_303: Match in lobby {0} is not finished")]
    MatchNotFinished(LobbyId),

    /// A roll outside the die's faces was submitted.
    #[error("DH_ERR_304: Invalid die value {0}")]
    InvalidRoll(u8),

    // =================================================================
    // Bonus Errors (4xx)
    // =================================================================
    /// The user claimed a bonus too recently.
    #[error("DH_ERR_400: Bonus on cooldown for {user}: {remaining_secs}s remaining")]
    BonusCooldown { user: UserId, remaining_secs: i64 },

    /// The house pool is empty.
    #[error("DH_ERR_401: House pool is empty")]
    BonusUnavailable,

    // =================================================================
    // Persistence Errors (5xx)
    // =================================================================
    /// The store could not load or commit state.
    #[error("DH_ERR_500: Persistence failure: {0}")]
    Persistence(String),

    /// The persisted schema is newer than this build understands.
    #[error("DH_ERR_501: Unsupported schema version {found} (max {supported})")]
    UnsupportedSchema { found: u32, supported: u32 },

    // =================================================================
    // General / Internal (9xx)
    // =================================================================
    /// Unrecoverable internal error.
    #[error("DH_ERR_900: Internal error: {0}")]
    Internal(String),

    /// Serialization / deserialization error.
    #[error("DH_ERR_901: Serialization error: {0}")]
    Serialization(String),

    /// Configuration error (invalid config file, bad values).
    #[error("DH_ERR_902: Configuration error: {0}")]
    Configuration(String),

    /// I/O error (disk).
    #[error("DH_ERR_903: I/O error: {0}")]
    Io(String),
}

/// Crate-wide `Result` alias.
pub type Result<T> = std::result::Result<T, DicehallError>;

impl From<std::io::Error> for DicehallError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<serde_json::Error> for DicehallError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

/// Flat reason code handed to the chat collaborator alongside `ok = false`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Reason {
    NotFound,
    AlreadyStarted,
    AlreadyMember,
    Full,
    NotCreator,
    NotMember,
    AlreadyOwnsLobby,
    CannotKickCreator,
    BelowMinPlayers,
    AboveMaxPlayers,
    InvalidWager,
    InsufficientFunds,
    UnknownUser,
    NotStarted,
    AlreadyRolled,
    MatchFinished,
    BonusCooldown,
    BonusUnavailable,
    Internal,
}

impl DicehallError {
    /// Collapse this error into the reason code the collaborator renders.
    #[must_use]
    pub fn reason(&self) -> Reason {
        match self {
            Self::LobbyNotFound(_) => Reason::NotFound,
            Self::AlreadyStarted(_) => Reason::AlreadyStarted,
            Self::AlreadyMember { .. } => Reason::AlreadyMember,
            Self::LobbyFull { .. } => Reason::Full,
            Self::NotCreator(_) => Reason::NotCreator,
            Self::NotMember { .. } => Reason::NotMember,
            Self::AlreadyOwnsLobby { .. } => Reason::AlreadyOwnsLobby,
            Self::CannotKickCreator(_) => Reason::CannotKickCreator,
            Self::BelowMinPlayers { .. } => Reason::BelowMinPlayers,
            Self::AboveMaxPlayers { .. } => Reason::AboveMaxPlayers,
            Self::InvalidWager { .. } => Reason::InvalidWager,
            Self::InsufficientFunds { .. } => Reason::InsufficientFunds,
            Self::UnknownUser(_) => Reason::UnknownUser,
            Self::NotStarted(_) => Reason::NotStarted,
            Self::AlreadyRolled { .. } => Reason::AlreadyRolled,
            Self::MatchFinished(_) => Reason::MatchFinished,
            Self::BonusCooldown { .. } => Reason::BonusCooldown,
            Self::BonusUnavailable => Reason::BonusUnavailable,
            Self::LobbyIdsExhausted
            | Self::InsufficientLocked { .. }
            | Self::LedgerInvariant { .. }
            | Self::BalanceOverflow(_)
            | Self::MatchNotFinished(_)
            | Self::InvalidRoll(_)
            | Self::Persistence(_)
            | Self::UnsupportedSchema { .. }
            | Self::Internal(_)
            | Self::Serialization(_)
            | Self::Configuration(_)
            | Self::Io(_) => Reason::Internal,
        }
    }

    /// Whether the operation may be retried as a whole after this error.
    ///
    /// Validation errors are final; persistence failures leave prior state
    /// intact so the same call can be replayed.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Persistence(_) | Self::Io(_))
    }
}
