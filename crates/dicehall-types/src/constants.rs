//! System-wide constants and configuration defaults.

/// Balance granted to a user on first registration.
pub const DEFAULT_STARTING_BALANCE: u64 = 1000;

/// House commission in percent of the bank (10%).
pub const DEFAULT_COMMISSION_PERCENT: i64 = 10;

/// How long a pending confirmation stays valid, in seconds.
pub const DEFAULT_CONFIRM_TTL_SECS: u64 = 60;

/// Rounds per dice match.
pub const DEFAULT_DICE_ROUNDS: u32 = 6;

/// Minimum members required to start a dice match.
pub const DEFAULT_DICE_MIN_PLAYERS: usize = 2;

/// Maximum members of a dice lobby.
pub const DEFAULT_DICE_MAX_PLAYERS: usize = 2;

/// Wins deducted for walking out of a running match.
pub const DEFAULT_LEAVE_PENALTY_WINS: i64 = 5;

/// Pause between a resolved round and the next round's announcement, in ms.
pub const DEFAULT_ROUND_PACING_MS: u64 = 1000;

/// Minimum spacing between two bonus claims of one user, in seconds.
pub const DEFAULT_BONUS_COOLDOWN_SECS: u64 = 24 * 60 * 60;

/// Smallest wager accepted at lobby creation.
pub const DEFAULT_MIN_WAGER: u64 = 0;

/// Largest wager accepted at lobby creation.
pub const DEFAULT_MAX_WAGER: u64 = 1_000_000;

/// Lobby ids are drawn uniformly from this inclusive range.
pub const LOBBY_ID_MIN: u32 = 100_000;

/// Upper bound of the lobby id range.
pub const LOBBY_ID_MAX: u32 = 999_999;

/// Faces of the die.
pub const DIE_FACES: u8 = 6;

/// Current persisted schema version.
pub const SCHEMA_VERSION: u32 = 2;

/// Smallest non-empty bonus payout.
pub const MIN_BONUS_SHARE: u64 = 1;

/// Version string.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
