//! Dice match state machine.
//!
//! ```text
//! AwaitingRoll(r) ──all members rolled──▶ resolve(r) ──r < total──▶ AwaitingRoll(r+1)
//!                                                    └─r = total──▶ Finished ──finalize──▶ settled, lobby deleted
//! ```
//!
//! Round rule: the highest face scores +1, and every member tied at the
//! highest face scores +1 (shared credit, no replay). Match rule: the
//! highest cumulative score wins; a tie at the top is a draw and every
//! tied member is credited a win.
//!
//! The service runs the roll that ends the last round and `finalize` in
//! one store transaction, so a `Finished` lobby is never visible to other
//! operations. Documents written without that guarantee can still hold
//! one; [`MatchEngine::stalled_matches`] finds them.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use dicehall_ledger::EscrowLedger;
use dicehall_types::{
    Amount, DicehallError, GameState, LobbyId, MatchPhase, MatchState, Result, SettlementId,
    UserId, constants::DIE_FACES,
};
use serde::Serialize;

use crate::confirmation::ConfirmationGate;

/// The outcome of one resolved round.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoundResult {
    pub lobby: LobbyId,
    pub round: u32,
    pub total_rounds: u32,
    pub rolls: BTreeMap<UserId, u8>,
    /// Every member that rolled the top face.
    pub scorers: Vec<UserId>,
    /// Cumulative scores after this round.
    pub scores: BTreeMap<UserId, u32>,
}

/// What a single roll did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollResult {
    pub lobby: LobbyId,
    pub user: UserId,
    pub round: u32,
    pub face: u8,
    /// Set when this roll completed the round.
    pub resolved: Option<RoundResult>,
    /// Set when this roll completed the final round.
    pub finished: bool,
}

/// A finalized match.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MatchResult {
    pub lobby: LobbyId,
    pub members: Vec<UserId>,
    pub wager: Amount,
    pub scores: BTreeMap<UserId, u32>,
    /// One entry for a win; several for a shared top score (draw).
    pub winners: Vec<UserId>,
    pub settlement_id: SettlementId,
    pub commission: Amount,
    pub payout: Amount,
}

impl MatchResult {
    #[must_use]
    pub fn is_draw(&self) -> bool {
        self.winners.len() != 1
    }
}

#[derive(Debug, Clone)]
pub struct MatchEngine {
    ledger: EscrowLedger,
}

impl MatchEngine {
    #[must_use]
    pub fn new(ledger: EscrowLedger) -> Self {
        Self { ledger }
    }

    /// Record `face` for `user` in the current round, resolving the round
    /// once every member has rolled.
    ///
    /// # Errors
    /// `LobbyNotFound`, `NotStarted`, `NotMember`, `MatchFinished`,
    /// `AlreadyRolled`, `InvalidRoll`. On error nothing is recorded.
    pub fn submit_roll(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        user: UserId,
        face: u8,
        now: DateTime<Utc>,
    ) -> Result<RollResult> {
        if !(1..=DIE_FACES).contains(&face) {
            return Err(DicehallError::InvalidRoll(face));
        }
        let lobby = state.lobby(lobby_id)?;
        if !lobby.is_member(user) {
            return Err(DicehallError::NotMember {
                lobby: lobby_id,
                user,
            });
        }
        let ms = lobby
            .match_state()
            .ok_or(DicehallError::NotStarted(lobby_id))?;
        if ms.is_finished() {
            return Err(DicehallError::MatchFinished(lobby_id));
        }
        if ms.has_rolled(user) {
            return Err(DicehallError::AlreadyRolled {
                user,
                round: ms.round,
            });
        }

        let lobby = state.lobby_mut(lobby_id)?;
        let members = lobby.members.clone();
        lobby.touch(now);
        let Some(ms) = lobby.match_state_mut() else {
            return Err(DicehallError::NotStarted(lobby_id));
        };
        let round = ms.round;
        let rolls = ms.rolls.entry(round).or_default();
        rolls.insert(user, face);
        tracing::debug!(lobby = %lobby_id, user = %user, round, face, "Roll recorded");

        let complete = members.iter().all(|m| rolls.contains_key(m));
        let resolved = complete.then(|| Self::resolve_round(lobby_id, ms, &members));
        if let Some(result) = &resolved {
            tracing::debug!(
                lobby = %lobby_id,
                round = result.round,
                scorers = ?result.scorers,
                "Round resolved"
            );
        }
        Ok(RollResult {
            lobby: lobby_id,
            user,
            round,
            face,
            resolved,
            finished: ms.is_finished(),
        })
    }

    fn resolve_round(lobby: LobbyId, ms: &mut MatchState, members: &[UserId]) -> RoundResult {
        let round = ms.round;
        let rolls: BTreeMap<UserId, u8> = ms
            .current_rolls()
            .map(|r| {
                r.iter()
                    .filter(|(u, _)| members.contains(u))
                    .map(|(u, f)| (*u, *f))
                    .collect()
            })
            .unwrap_or_default();
        let top = rolls.values().copied().max().unwrap_or(0);
        let scorers: Vec<UserId> = rolls
            .iter()
            .filter(|(_, f)| **f == top)
            .map(|(u, _)| *u)
            .collect();
        for scorer in &scorers {
            *ms.scores.entry(*scorer).or_insert(0) += 1;
        }

        ms.round += 1;
        if ms.round > ms.total_rounds {
            ms.phase = MatchPhase::Finished;
        }
        RoundResult {
            lobby,
            round,
            total_rounds: ms.total_rounds,
            rolls,
            scorers,
            scores: ms.scores.clone(),
        }
    }

    /// Settle a finished match, update counters, and delete the lobby.
    ///
    /// # Errors
    /// `LobbyNotFound`, `NotStarted`, `MatchNotFinished`, and any ledger
    /// error from settlement. On error the caller must discard the snapshot
    /// or release the members' escrow.
    pub fn finalize(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        now: DateTime<Utc>,
    ) -> Result<MatchResult> {
        let lobby = state.lobby(lobby_id)?;
        let ms = lobby
            .match_state()
            .ok_or(DicehallError::NotStarted(lobby_id))?;
        if !ms.is_finished() {
            return Err(DicehallError::MatchNotFinished(lobby_id));
        }
        let members = lobby.members.clone();
        let wager = lobby.wager;
        let scores: BTreeMap<UserId, u32> = members.iter().map(|m| (*m, ms.score(*m))).collect();
        let top = scores.values().copied().max().unwrap_or(0);
        let winners: Vec<UserId> = scores
            .iter()
            .filter(|(_, s)| **s == top)
            .map(|(u, _)| *u)
            .collect();

        let settlement = if let [winner] = winners[..] {
            let losers: Vec<UserId> = members.iter().copied().filter(|m| *m != winner).collect();
            self.ledger.settle(state, winner, &losers, wager, now)?
        } else {
            self.ledger.settle_draw(state, &members, wager, now)?
        };

        for member in &members {
            let user = state.user_mut(*member)?;
            user.games_played += 1;
            if winners.contains(member) {
                user.wins += 1;
            }
        }
        state.lobbies.remove(&lobby_id);
        ConfirmationGate::purge_lobby(state, lobby_id);

        tracing::info!(
            lobby = %lobby_id,
            winners = ?winners,
            settlement = %settlement.id,
            commission = settlement.commission,
            "Match finalized"
        );
        Ok(MatchResult {
            lobby: lobby_id,
            members,
            wager,
            scores,
            winners,
            settlement_id: settlement.id,
            commission: settlement.commission,
            payout: settlement.payout,
        })
    }

    /// Lobbies whose match reached `Finished` but was never finalized.
    #[must_use]
    pub fn stalled_matches(state: &GameState) -> Vec<LobbyId> {
        state
            .lobbies
            .values()
            .filter(|l| l.match_state().is_some_and(MatchState::is_finished))
            .map(|l| l.id)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LobbyRegistry;
    use dicehall_types::{GameConfig, GameKind, Lobby};

    const LOBBY: LobbyId = LobbyId(222_222);

    fn started(players: &[u64], rounds: u32) -> (MatchEngine, GameState) {
        let mut config = GameConfig::default();
        config.dice.rounds = rounds;
        config.dice.max_players = 4;
        let reg = LobbyRegistry::new(config).unwrap();
        let mut state = GameState::default();
        for id in players {
            reg.ensure_user(&mut state, UserId(*id), &format!("u{id}"), Utc::now());
        }
        let mut lobby = Lobby::new(LOBBY, GameKind::Dice, UserId(players[0]), 100, Utc::now());
        lobby.members = players.iter().map(|p| UserId(*p)).collect();
        state.lobbies.insert(LOBBY, lobby);
        reg.start(&mut state, LOBBY, UserId(players[0]), Utc::now())
            .unwrap();
        (MatchEngine::new(reg.ledger().clone()), state)
    }

    fn play_round(engine: &MatchEngine, state: &mut GameState, faces: &[(u64, u8)]) -> RollResult {
        let mut last = None;
        for (user, face) in faces {
            last = Some(
                engine
                    .submit_roll(state, LOBBY, UserId(*user), *face, Utc::now())
                    .unwrap(),
            );
        }
        last.unwrap()
    }

    #[test]
    fn round_resolves_after_last_roll() {
        let (engine, mut state) = started(&[1, 2], 6);
        let first = engine.submit_roll(&mut state, LOBBY, UserId(1), 3, Utc::now()).unwrap();
        assert!(first.resolved.is_none());
        let second = engine.submit_roll(&mut state, LOBBY, UserId(2), 5, Utc::now()).unwrap();
        let round = second.resolved.unwrap();
        assert_eq!(round.round, 1);
        assert_eq!(round.scorers, vec![UserId(2)]);
        assert_eq!(round.scores[&UserId(2)], 1);
        assert_eq!(round.scores[&UserId(1)], 0);
        assert_eq!(state.lobby(LOBBY).unwrap().match_state().unwrap().round, 2);
    }

    #[test]
    fn double_roll_is_rejected_without_change() {
        let (engine, mut state) = started(&[1, 2], 6);
        engine.submit_roll(&mut state, LOBBY, UserId(1), 4, Utc::now()).unwrap();
        let before = state.lobby(LOBBY).unwrap().clone();
        let later = Utc::now() + chrono::Duration::hours(1);
        let err = engine
            .submit_roll(&mut state, LOBBY, UserId(1), 6, later)
            .unwrap_err();
        assert!(matches!(err, DicehallError::AlreadyRolled { round: 1, .. }));
        // A rejected roll leaves the lobby untouched, activity stamp included.
        assert_eq!(state.lobby(LOBBY).unwrap(), &before);
    }

    #[test]
    fn tie_at_top_credits_everyone() {
        let (engine, mut state) = started(&[1, 2, 3], 6);
        let r = play_round(&engine, &mut state, &[(1, 6), (2, 6), (3, 2)]);
        let round = r.resolved.unwrap();
        assert_eq!(round.scorers, vec![UserId(1), UserId(2)]);
        let r = play_round(&engine, &mut state, &[(1, 4), (2, 4), (3, 4)]);
        let round = r.resolved.unwrap();
        assert_eq!(round.scorers.len(), 3);
        assert_eq!(round.scores[&UserId(1)], 2);
        assert_eq!(round.scores[&UserId(3)], 1);
    }

    #[test]
    fn roll_rejections() {
        let (engine, mut state) = started(&[1, 2], 6);
        assert!(matches!(
            engine.submit_roll(&mut state, LOBBY, UserId(1), 7, Utc::now()),
            Err(DicehallError::InvalidRoll(7))
        ));
        assert!(matches!(
            engine.submit_roll(&mut state, LOBBY, UserId(9), 3, Utc::now()),
            Err(DicehallError::NotMember { .. })
        ));
        state.lobby_mut(LOBBY).unwrap().phase = dicehall_types::LobbyPhase::Open;
        assert!(matches!(
            engine.submit_roll(&mut state, LOBBY, UserId(1), 3, Utc::now()),
            Err(DicehallError::NotStarted(_))
        ));
    }

    #[test]
    fn full_match_settles_winner() {
        let (engine, mut state) = started(&[1, 2], 2);
        play_round(&engine, &mut state, &[(1, 6), (2, 1)]);
        let last = play_round(&engine, &mut state, &[(1, 5), (2, 2)]);
        assert!(last.finished);
        assert!(matches!(
            engine.submit_roll(&mut state, LOBBY, UserId(1), 3, Utc::now()),
            Err(DicehallError::MatchFinished(_))
        ));
        assert_eq!(MatchEngine::stalled_matches(&state), vec![LOBBY]);

        let result = engine.finalize(&mut state, LOBBY, Utc::now()).unwrap();
        assert_eq!(result.winners, vec![UserId(1)]);
        assert!(!result.is_draw());
        assert_eq!(result.commission, 20);
        assert_eq!(result.payout, 180);
        assert!(state.lobbies.is_empty());
        let winner = state.user(UserId(1)).unwrap();
        assert_eq!(winner.balance, 1080);
        assert_eq!(winner.wins, 1);
        assert_eq!(winner.games_played, 1);
        let loser = state.user(UserId(2)).unwrap();
        assert_eq!(loser.balance, 900);
        assert_eq!(loser.wins, 0);
        assert_eq!(loser.games_played, 1);
        assert_eq!(state.house_balance, 20);
        assert_eq!(state.total_locked(), 0);
    }

    #[test]
    fn tied_match_is_a_draw_with_shared_wins() {
        let (engine, mut state) = started(&[1, 2], 2);
        play_round(&engine, &mut state, &[(1, 6), (2, 1)]);
        play_round(&engine, &mut state, &[(1, 1), (2, 6)]);
        let result = engine.finalize(&mut state, LOBBY, Utc::now()).unwrap();
        assert!(result.is_draw());
        assert_eq!(result.commission, 0);
        for id in [1, 2] {
            let u = state.user(UserId(id)).unwrap();
            assert_eq!(u.balance, 1000);
            assert_eq!(u.locked, 0);
            assert_eq!(u.wins, 1);
        }
        assert_eq!(state.house_balance, 0);
    }

    #[test]
    fn finalize_requires_finished_match() {
        let (engine, mut state) = started(&[1, 2], 6);
        assert!(matches!(
            engine.finalize(&mut state, LOBBY, Utc::now()),
            Err(DicehallError::MatchNotFinished(_))
        ));
        assert!(MatchEngine::stalled_matches(&state).is_empty());
    }
}
