//! Confirmation gate: two-step acknowledgment for destructive actions.
//!
//! ```text
//! 1st call ─▶ no matching live token ─▶ record {action, lobby, now+ttl} ─▶ Pending
//! 2nd call ─▶ matching live token     ─▶ consume                        ─▶ Confirmed
//! ```
//!
//! Runs inside the same store transaction as the action it guards, so a
//! token can never be consumed twice by racing handlers. A `Pending`
//! decision is an `Ok` result: the caller commits the recorded token and
//! reports "pending" without executing anything else.

use chrono::{DateTime, Duration, Utc};
use dicehall_types::{
    ConfirmAction, DicehallError, GameConfig, GameState, LobbyId, PendingConfirmation, Result,
    UserId,
};

/// What the gate decided for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    /// A fresh token was recorded; ask the user to repeat the action.
    Pending { expires_at: DateTime<Utc> },
    /// A matching live token was consumed; proceed.
    Confirmed,
}

impl GateDecision {
    #[must_use]
    pub fn is_confirmed(&self) -> bool {
        matches!(self, Self::Confirmed)
    }
}

#[derive(Debug, Clone)]
pub struct ConfirmationGate {
    ttl: Duration,
}

impl ConfirmationGate {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl }
    }

    /// # Errors
    /// Returns `Configuration` if `confirm_ttl` does not fit a chrono duration.
    pub fn from_config(config: &GameConfig) -> Result<Self> {
        let ttl = Duration::from_std(config.confirm_ttl)
            .map_err(|e| DicehallError::Configuration(format!("confirm_ttl: {e}")))?;
        Ok(Self::new(ttl))
    }

    /// Check (and update) `user`'s pending confirmation for `action` on
    /// `lobby`. Expired or unrelated tokens are dropped and replaced.
    pub fn check(
        &self,
        state: &mut GameState,
        user: UserId,
        action: ConfirmAction,
        lobby: LobbyId,
        now: DateTime<Utc>,
    ) -> GateDecision {
        if let Some(existing) = state.pending_confirmations.remove(&user) {
            if existing.is_expired(now) {
                tracing::warn!(
                    user = %user,
                    action = %existing.action,
                    lobby = %existing.lobby,
                    "Confirmation expired; restarting"
                );
            } else if existing.matches(action, lobby) {
                tracing::debug!(user = %user, action = %action, lobby = %lobby, "Confirmation consumed");
                return GateDecision::Confirmed;
            }
        }

        let expires_at = now + self.ttl;
        state.pending_confirmations.insert(
            user,
            PendingConfirmation {
                action,
                lobby,
                expires_at,
            },
        );
        tracing::debug!(user = %user, action = %action, lobby = %lobby, %expires_at, "Confirmation pending");
        GateDecision::Pending { expires_at }
    }

    /// Drop every token that points at `lobby`, e.g. once it is deleted.
    pub fn purge_lobby(state: &mut GameState, lobby: LobbyId) {
        state.pending_confirmations.retain(|_, pc| pc.lobby != lobby);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOBBY: LobbyId = LobbyId(123_456);
    const USER: UserId = UserId(1);

    fn gate() -> ConfirmationGate {
        ConfirmationGate::new(Duration::seconds(60))
    }

    #[test]
    fn pending_then_confirmed_then_pending_again() {
        let mut state = GameState::default();
        let g = gate();
        let now = Utc::now();
        let first = g.check(&mut state, USER, ConfirmAction::DeleteLobby, LOBBY, now);
        assert!(matches!(first, GateDecision::Pending { .. }));
        assert!(state.pending_confirmations.contains_key(&USER));

        let second = g.check(&mut state, USER, ConfirmAction::DeleteLobby, LOBBY, now + Duration::seconds(5));
        assert_eq!(second, GateDecision::Confirmed);
        assert!(state.pending_confirmations.is_empty());

        let third = g.check(&mut state, USER, ConfirmAction::DeleteLobby, LOBBY, now + Duration::seconds(6));
        assert!(!third.is_confirmed());
    }

    #[test]
    fn expired_token_restarts_cycle() {
        let mut state = GameState::default();
        let g = gate();
        let now = Utc::now();
        g.check(&mut state, USER, ConfirmAction::DeleteLobby, LOBBY, now);
        let late = now + Duration::seconds(61);
        let decision = g.check(&mut state, USER, ConfirmAction::DeleteLobby, LOBBY, late);
        assert_eq!(
            decision,
            GateDecision::Pending {
                expires_at: late + Duration::seconds(60)
            }
        );
    }

    #[test]
    fn boundary_instant_is_still_live() {
        let mut state = GameState::default();
        let g = gate();
        let now = Utc::now();
        g.check(&mut state, USER, ConfirmAction::Leave, LOBBY, now);
        let decision = g.check(&mut state, USER, ConfirmAction::Leave, LOBBY, now + Duration::seconds(60));
        assert!(decision.is_confirmed());
    }

    #[test]
    fn mismatch_overwrites_previous_token() {
        let mut state = GameState::default();
        let g = gate();
        let now = Utc::now();
        g.check(&mut state, USER, ConfirmAction::Kick(UserId(2)), LOBBY, now);
        let d = g.check(&mut state, USER, ConfirmAction::Kick(UserId(3)), LOBBY, now);
        assert!(!d.is_confirmed());
        assert_eq!(
            state.pending_confirmations[&USER].action,
            ConfirmAction::Kick(UserId(3))
        );
        let d = g.check(&mut state, USER, ConfirmAction::Kick(UserId(3)), LobbyId(654_321), now);
        assert!(!d.is_confirmed());
    }

    #[test]
    fn tokens_are_per_user() {
        let mut state = GameState::default();
        let g = gate();
        let now = Utc::now();
        g.check(&mut state, USER, ConfirmAction::Leave, LOBBY, now);
        let other = g.check(&mut state, UserId(2), ConfirmAction::Leave, LOBBY, now);
        assert!(!other.is_confirmed());
        assert_eq!(state.pending_confirmations.len(), 2);
    }

    #[test]
    fn purge_lobby_drops_only_that_lobby() {
        let mut state = GameState::default();
        let g = gate();
        let now = Utc::now();
        g.check(&mut state, USER, ConfirmAction::Leave, LOBBY, now);
        g.check(&mut state, UserId(2), ConfirmAction::Leave, LobbyId(111_111), now);
        ConfirmationGate::purge_lobby(&mut state, LOBBY);
        assert_eq!(state.pending_confirmations.len(), 1);
        assert!(state.pending_confirmations.contains_key(&UserId(2)));
    }
}
