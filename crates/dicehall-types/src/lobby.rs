//! Lobby and match records.
//!
//! ## Lobby lifecycle
//!
//! ```text
//!   ┌──────┐  start (wagers locked)  ┌─────────────────────┐
//!   │ OPEN ├────────────────────────▶│ STARTED(MatchState) │
//!   └──┬───┘                         └──────────┬──────────┘
//!      │ empty / creator left / deleted         │ finalized / aborted
//!      ▼                                        ▼
//!   (deleted)                               (deleted)
//! ```
//!
//! ## Match phases
//!
//! A started lobby embeds a [`MatchState`]. Each round waits for one roll per
//! member; once the last roll lands the round is resolved and the match
//! either re-enters `AwaitingRoll` for the next round or moves to
//! `Finished`, where it waits for settlement.

use std::{collections::BTreeMap, fmt};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, LobbyId, UserId};

/// The games a lobby can host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    Dice,
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Dice => write!(f, "DICE"),
        }
    }
}

/// Where a running match stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MatchPhase {
    /// Waiting for every member to roll in the current round.
    AwaitingRoll,
    /// All rounds resolved. Settlement pending.
    Finished,
}

impl fmt::Display for MatchPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::AwaitingRoll => write!(f, "AWAITING_ROLL"),
            Self::Finished => write!(f, "FINISHED"),
        }
    }
}

/// Round-by-round state of a running dice match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MatchState {
    /// 1-based current round. Equals `total_rounds + 1` once finished.
    pub round: u32,
    pub total_rounds: u32,
    /// round → (member → die value).
    pub rolls: BTreeMap<u32, BTreeMap<UserId, u8>>,
    /// Cumulative round credits per member.
    pub scores: BTreeMap<UserId, u32>,
    pub phase: MatchPhase,
}

impl MatchState {
    /// Round 1, no rolls, every member at zero.
    #[must_use]
    pub fn new(members: &[UserId], total_rounds: u32) -> Self {
        Self {
            round: 1,
            total_rounds,
            rolls: BTreeMap::new(),
            scores: members.iter().map(|m| (*m, 0)).collect(),
            phase: MatchPhase::AwaitingRoll,
        }
    }

    /// Rolls recorded so far in the current round.
    #[must_use]
    pub fn current_rolls(&self) -> Option<&BTreeMap<UserId, u8>> {
        self.rolls.get(&self.round)
    }

    /// Whether `user` already rolled in the current round.
    #[must_use]
    pub fn has_rolled(&self, user: UserId) -> bool {
        self.current_rolls().is_some_and(|r| r.contains_key(&user))
    }

    #[must_use]
    pub fn score(&self, user: UserId) -> u32 {
        self.scores.get(&user).copied().unwrap_or(0)
    }

    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.phase == MatchPhase::Finished
    }
}

/// Lobby state machine: open for joins, or running a match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum LobbyPhase {
    Open,
    Started(MatchState),
}

/// A group of players waiting for, or engaged in, one match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Lobby {
    pub id: LobbyId,
    pub game: GameKind,
    pub creator: UserId,
    /// Members in join order. The creator is always first.
    pub members: Vec<UserId>,
    /// Stake each member puts in escrow at start.
    pub wager: Amount,
    pub phase: LobbyPhase,
    pub created_at: DateTime<Utc>,
    /// Refreshed on every mutation.
    pub last_activity: DateTime<Utc>,
}

impl Lobby {
    /// A new open lobby seating only its creator.
    #[must_use]
    pub fn new(id: LobbyId, game: GameKind, creator: UserId, wager: Amount, now: DateTime<Utc>) -> Self {
        Self {
            id,
            game,
            creator,
            members: vec![creator],
            wager,
            phase: LobbyPhase::Open,
            created_at: now,
            last_activity: now,
        }
    }

    #[must_use]
    pub fn is_started(&self) -> bool {
        matches!(self.phase, LobbyPhase::Started(_))
    }

    /// The last round is resolved but the match has not been settled yet.
    #[must_use]
    pub fn is_match_finished(&self) -> bool {
        self.match_state().is_some_and(MatchState::is_finished)
    }

    #[must_use]
    pub fn is_member(&self, user: UserId) -> bool {
        self.members.contains(&user)
    }

    #[must_use]
    pub fn match_state(&self) -> Option<&MatchState> {
        match &self.phase {
            LobbyPhase::Started(state) => Some(state),
            LobbyPhase::Open => None,
        }
    }

    pub fn match_state_mut(&mut self) -> Option<&mut MatchState> {
        match &mut self.phase {
            LobbyPhase::Started(state) => Some(state),
            LobbyPhase::Open => None,
        }
    }

    /// Remove `user` from the member list. Returns `false` if absent.
    pub fn remove_member(&mut self, user: UserId) -> bool {
        let before = self.members.len();
        self.members.retain(|m| *m != user);
        self.members.len() != before
    }

    pub fn touch(&mut self, now: DateTime<Utc>) {
        self.last_activity = now;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn lobby() -> Lobby {
        Lobby::new(LobbyId(100_001), GameKind::Dice, UserId(1), 100, Utc::now())
    }

    #[test]
    fn new_lobby_seats_creator() {
        let l = lobby();
        assert_eq!(l.members, vec![UserId(1)]);
        assert!(l.is_member(UserId(1)));
        assert!(!l.is_started());
        assert!(l.match_state().is_none());
        assert!(!l.is_match_finished());
    }

    #[test]
    fn finished_phase_is_reported() {
        let mut l = lobby();
        let mut ms = MatchState::new(&l.members, 6);
        l.phase = LobbyPhase::Started(ms.clone());
        assert!(!l.is_match_finished());
        ms.phase = MatchPhase::Finished;
        l.phase = LobbyPhase::Started(ms);
        assert!(l.is_match_finished());
    }

    #[test]
    fn remove_member_reports_presence() {
        let mut l = lobby();
        l.members.push(UserId(2));
        assert!(l.remove_member(UserId(2)));
        assert!(!l.remove_member(UserId(2)));
        assert_eq!(l.members.len(), 1);
    }

    #[test]
    fn fresh_match_state() {
        let ms = MatchState::new(&[UserId(1), UserId(2)], 6);
        assert_eq!(ms.round, 1);
        assert_eq!(ms.total_rounds, 6);
        assert_eq!(ms.score(UserId(1)), 0);
        assert_eq!(ms.score(UserId(2)), 0);
        assert!(!ms.has_rolled(UserId(1)));
        assert_eq!(ms.phase, MatchPhase::AwaitingRoll);
    }

    #[test]
    fn started_lobby_serde_roundtrip() {
        let mut l = lobby();
        l.members.push(UserId(2));
        let mut ms = MatchState::new(&l.members, 6);
        ms.rolls.entry(1).or_default().insert(UserId(1), 4);
        l.phase = LobbyPhase::Started(ms);
        let json = serde_json::to_string(&l).unwrap();
        let back: Lobby = serde_json::from_str(&json).unwrap();
        assert_eq!(l, back);
        assert!(back.match_state().unwrap().has_rolled(UserId(1)));
    }

    #[test]
    fn display_tags() {
        assert_eq!(format!("{}", GameKind::Dice), "DICE");
        assert_eq!(format!("{}", MatchPhase::Finished), "FINISHED");
    }
}
