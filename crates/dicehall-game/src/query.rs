//! Read-only views over a state snapshot.

use std::{cmp::Ordering, collections::BTreeMap};

use chrono::{DateTime, Utc};
use dicehall_types::{Amount, BetRecord, GameKind, GameState, Lobby, LobbyId, Result, User, UserId};
use serde::Serialize;

/// Bet records included in a profile.
pub const RECENT_BETS: usize = 10;

/// A lobby as presented to its members.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LobbyView {
    pub id: LobbyId,
    pub game: GameKind,
    pub creator: UserId,
    pub members: Vec<UserId>,
    pub capacity: usize,
    pub wager: Amount,
    pub started: bool,
    /// Current round while a match is running.
    pub round: Option<u32>,
    pub total_rounds: Option<u32>,
    pub scores: BTreeMap<UserId, u32>,
    pub last_activity: DateTime<Utc>,
}

impl LobbyView {
    #[must_use]
    pub fn new(lobby: &Lobby, capacity: usize) -> Self {
        let ms = lobby.match_state();
        Self {
            id: lobby.id,
            game: lobby.game,
            creator: lobby.creator,
            members: lobby.members.clone(),
            capacity,
            wager: lobby.wager,
            started: lobby.is_started(),
            round: ms.map(|m| m.round.min(m.total_rounds)),
            total_rounds: ms.map(|m| m.total_rounds),
            scores: ms.map(|m| m.scores.clone()).unwrap_or_default(),
            last_activity: lobby.last_activity,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserProfile {
    pub id: UserId,
    pub name: String,
    pub balance: Amount,
    pub locked: Amount,
    pub available: Amount,
    pub games_played: u32,
    pub wins: i64,
    pub last_bonus: Option<DateTime<Utc>>,
    pub owned_lobby: Option<LobbyId>,
    /// Newest first.
    pub recent_bets: Vec<BetRecord>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeaderboardEntry {
    /// 1-based.
    pub rank: usize,
    pub user: UserId,
    pub name: String,
    pub balance: Amount,
    pub wins: i64,
}

/// # Errors
/// `UnknownUser`.
pub fn user_profile(state: &GameState, id: UserId) -> Result<UserProfile> {
    let user = state.user(id)?;
    let recent_bets = state
        .bet_history
        .iter()
        .rev()
        .filter(|b| b.user_id == id)
        .take(RECENT_BETS)
        .cloned()
        .collect();
    Ok(UserProfile {
        id,
        name: user.name.clone(),
        balance: user.balance,
        locked: user.locked,
        available: user.available(),
        games_played: user.games_played,
        wins: user.wins,
        last_bonus: user.last_bonus,
        owned_lobby: state.owned_lobby(id),
        recent_bets,
    })
}

/// Top `limit` users by balance, ties broken by id.
#[must_use]
pub fn leaderboard_by_balance(state: &GameState, limit: usize) -> Vec<LeaderboardEntry> {
    leaderboard(state, limit, |a, b| b.balance.cmp(&a.balance))
}

/// Top `limit` users by wins, ties broken by id.
#[must_use]
pub fn leaderboard_by_wins(state: &GameState, limit: usize) -> Vec<LeaderboardEntry> {
    leaderboard(state, limit, |a, b| b.wins.cmp(&a.wins))
}

fn leaderboard(
    state: &GameState,
    limit: usize,
    order: impl Fn(&User, &User) -> Ordering,
) -> Vec<LeaderboardEntry> {
    let mut users: Vec<_> = state.users.values().collect();
    users.sort_by(|a, b| order(a, b).then(a.id.cmp(&b.id)));
    users
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(i, u)| LeaderboardEntry {
            rank: i + 1,
            user: u.id,
            name: u.name.clone(),
            balance: u.balance,
            wins: u.wins,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicehall_types::{BetOutcome, LobbyPhase, MatchState, SettlementId};

    fn state() -> GameState {
        let mut state = GameState::default();
        for (id, balance, wins) in [(1, 900, 3), (2, 1200, 1), (3, 1200, 7)] {
            let mut u = User::new(UserId(id), format!("u{id}"), balance, Utc::now());
            u.wins = wins;
            state.users.insert(u.id, u);
        }
        state
    }

    #[test]
    fn balance_board_breaks_ties_by_id() {
        let board = leaderboard_by_balance(&state(), 10);
        let order: Vec<_> = board.iter().map(|e| e.user).collect();
        assert_eq!(order, vec![UserId(2), UserId(3), UserId(1)]);
        assert_eq!(board[0].rank, 1);
        assert_eq!(board[2].rank, 3);
    }

    #[test]
    fn wins_board_respects_limit() {
        let board = leaderboard_by_wins(&state(), 2);
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].user, UserId(3));
        assert_eq!(board[1].user, UserId(1));
    }

    #[test]
    fn profile_lists_recent_bets_newest_first() {
        let mut s = state();
        for profit in [10, -20, 30] {
            s.bet_history.push(BetRecord {
                settlement_id: SettlementId::new(),
                user_id: UserId(1),
                amount: 50,
                opponent_id: Some(UserId(2)),
                outcome: if profit > 0 { BetOutcome::Win } else { BetOutcome::Loss },
                profit,
                timestamp: Utc::now(),
            });
        }
        let p = user_profile(&s, UserId(1)).unwrap();
        assert_eq!(p.recent_bets.len(), 3);
        assert_eq!(p.recent_bets[0].profit, 30);
        assert_eq!(p.available, 900);
        assert!(user_profile(&s, UserId(9)).is_err());
    }

    #[test]
    fn lobby_view_of_started_match() {
        let mut lobby = Lobby::new(LobbyId(333_333), GameKind::Dice, UserId(1), 10, Utc::now());
        lobby.members.push(UserId(2));
        let mut ms = MatchState::new(&lobby.members, 6);
        ms.round = 7;
        lobby.phase = LobbyPhase::Started(ms);
        let view = LobbyView::new(&lobby, 2);
        assert!(view.started);
        assert_eq!(view.round, Some(6));
        assert_eq!(view.scores.len(), 2);
    }
}
