//! Pending confirmations for destructive actions.
//!
//! A destructive action (leave, kick, delete) only runs on the second press.
//! The first press stores a [`PendingConfirmation`] keyed by the acting user;
//! at most one exists per user and it is consumed on use.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{LobbyId, UserId};

/// The destructive action a confirmation guards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ConfirmAction {
    /// Leave an open lobby.
    Leave,
    /// Walk out of a running match (penalized).
    LeaveInGame,
    /// Remove another member. The target is part of the tag so confirmations
    /// for different targets never satisfy each other.
    Kick(UserId),
    /// Delete the whole lobby.
    DeleteLobby,
}

impl fmt::Display for ConfirmAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Leave => write!(f, "LEAVE"),
            Self::LeaveInGame => write!(f, "LEAVE_IN_GAME"),
            Self::Kick(target) => write!(f, "KICK({target})"),
            Self::DeleteLobby => write!(f, "DELETE_LOBBY"),
        }
    }
}

/// A short-lived, single-use acknowledgment token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingConfirmation {
    pub action: ConfirmAction,
    pub lobby: LobbyId,
    pub expires_at: DateTime<Utc>,
}

impl PendingConfirmation {
    /// Expired tokens are treated as absent.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Same action against the same lobby.
    #[must_use]
    pub fn matches(&self, action: ConfirmAction, lobby: LobbyId) -> bool {
        self.action == action && self.lobby == lobby
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn expiry_is_strict() {
        let now = Utc::now();
        let pc = PendingConfirmation {
            action: ConfirmAction::DeleteLobby,
            lobby: LobbyId(100_000),
            expires_at: now,
        };
        assert!(!pc.is_expired(now));
        assert!(pc.is_expired(now + Duration::milliseconds(1)));
    }

    #[test]
    fn kick_targets_are_distinct() {
        let pc = PendingConfirmation {
            action: ConfirmAction::Kick(UserId(2)),
            lobby: LobbyId(100_000),
            expires_at: Utc::now(),
        };
        assert!(pc.matches(ConfirmAction::Kick(UserId(2)), LobbyId(100_000)));
        assert!(!pc.matches(ConfirmAction::Kick(UserId(3)), LobbyId(100_000)));
        assert!(!pc.matches(ConfirmAction::Kick(UserId(2)), LobbyId(100_001)));
    }

    #[test]
    fn action_display() {
        assert_eq!(format!("{}", ConfirmAction::LeaveInGame), "LEAVE_IN_GAME");
        assert_eq!(format!("{}", ConfirmAction::Kick(UserId(9))), "KICK(user:9)");
    }
}
