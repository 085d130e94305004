//! Lobby registry: the per-lobby lifecycle.
//!
//! ```text
//! Open(creator, members, wager) ──start──▶ Started(MatchState) ──▶ deleted
//!        │                                        │
//!        └──────── leave / kick / delete ─────────┘
//! ```
//!
//! Every method mutates the `GameState` snapshot of the caller's store
//! transaction and validates fully before mutating, so an `Err` leaves the
//! snapshot untouched.

use chrono::{DateTime, Utc};
use dicehall_ledger::EscrowLedger;
use dicehall_types::{
    Amount, DicehallError, GameConfig, GameKind, GameState, Lobby, LobbyId, LobbyPhase,
    MatchState, Result, User, UserId, constants,
};
use rand::Rng;
use serde::Serialize;

use crate::confirmation::ConfirmationGate;

const ID_ALLOCATION_ATTEMPTS: usize = 64;

/// An open lobby as shown in the lobby list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LobbySummary {
    pub id: LobbyId,
    pub game: GameKind,
    pub creator: UserId,
    pub members: usize,
    pub capacity: usize,
    pub wager: Amount,
}

/// What a leave or kick did to the lobby.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Departure {
    pub lobby: LobbyId,
    pub user: UserId,
    /// The match was running when the user left; the caller must abort it.
    pub was_started: bool,
    pub lobby_deleted: bool,
    /// Members still seated (or, if the lobby was deleted, the ones evicted).
    pub remaining: Vec<UserId>,
}

/// Lobby lifecycle rules bound to one configuration.
#[derive(Debug, Clone)]
pub struct LobbyRegistry {
    config: GameConfig,
    ledger: EscrowLedger,
}

impl LobbyRegistry {
    /// # Errors
    /// `Configuration` if the commission rate is outside `[0, 1)`.
    pub fn new(config: GameConfig) -> Result<Self> {
        let ledger = EscrowLedger::from_config(&config)?;
        Ok(Self { config, ledger })
    }

    #[must_use]
    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    #[must_use]
    pub fn ledger(&self) -> &EscrowLedger {
        &self.ledger
    }

    #[must_use]
    pub fn capacity(&self, game: GameKind) -> usize {
        self.config.limits(game).max_players
    }

    /// Register `id` with the starting balance on first sight; afterwards
    /// only the display name is refreshed.
    pub fn ensure_user(
        &self,
        state: &mut GameState,
        id: UserId,
        name: &str,
        now: DateTime<Utc>,
    ) -> User {
        let user = state.users.entry(id).or_insert_with(|| {
            tracing::info!(user = %id, name, balance = self.config.starting_balance, "User registered");
            User::new(id, name, self.config.starting_balance, now)
        });
        if user.name != name {
            user.name = name.to_string();
        }
        user.clone()
    }

    /// Open a new lobby owned by `creator`.
    ///
    /// # Errors
    /// `UnknownUser`, `AlreadyOwnsLobby`, `InvalidWager`, `LobbyIdsExhausted`.
    pub fn create<R: Rng + ?Sized>(
        &self,
        state: &mut GameState,
        creator: UserId,
        game: GameKind,
        wager: Amount,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Result<LobbyId> {
        state.user(creator)?;
        if let Some(lobby) = state.owned_lobby(creator) {
            return Err(DicehallError::AlreadyOwnsLobby {
                user: creator,
                lobby,
            });
        }
        if wager < self.config.min_wager || wager > self.config.max_wager {
            return Err(DicehallError::InvalidWager {
                wager,
                min: self.config.min_wager,
                max: self.config.max_wager,
            });
        }

        let id = Self::allocate_id(state, rng)?;
        state
            .lobbies
            .insert(id, Lobby::new(id, game, creator, wager, now));
        tracing::info!(lobby = %id, creator = %creator, game = %game, wager, "Lobby created");
        Ok(id)
    }

    fn allocate_id<R: Rng + ?Sized>(state: &GameState, rng: &mut R) -> Result<LobbyId> {
        for _ in 0..ID_ALLOCATION_ATTEMPTS {
            let candidate = LobbyId(rng.gen_range(constants::LOBBY_ID_MIN..=constants::LOBBY_ID_MAX));
            if !state.lobbies.contains_key(&candidate) {
                return Ok(candidate);
            }
        }
        Err(DicehallError::LobbyIdsExhausted)
    }

    /// Seat `user` in an open lobby.
    ///
    /// # Errors
    /// `UnknownUser`, `LobbyNotFound`, `AlreadyStarted`, `AlreadyMember`, `LobbyFull`.
    pub fn join(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        state.user(user)?;
        let lobby = state.lobby_mut(lobby_id)?;
        if lobby.is_started() {
            return Err(DicehallError::AlreadyStarted(lobby_id));
        }
        if lobby.is_member(user) {
            return Err(DicehallError::AlreadyMember {
                lobby: lobby_id,
                user,
            });
        }
        let capacity = self.config.limits(lobby.game).max_players;
        if lobby.members.len() >= capacity {
            return Err(DicehallError::LobbyFull {
                lobby: lobby_id,
                capacity,
            });
        }
        lobby.members.push(user);
        lobby.touch(now);
        tracing::info!(lobby = %lobby_id, user = %user, seated = lobby.members.len(), "Lobby joined");
        Ok(())
    }

    /// Remove `user` from the lobby.
    ///
    /// In a started lobby the leaver's escrow is released and, when
    /// `penalty` is set, `leave_penalty_wins` is charged to their wins. The
    /// match itself is left running; aborting it is the caller's call. The
    /// creator leaving an open lobby closes it.
    ///
    /// # Errors
    /// `LobbyNotFound`, `NotMember`, `MatchFinished` (the result stands).
    pub fn leave(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        user: UserId,
        penalty: bool,
        now: DateTime<Utc>,
    ) -> Result<Departure> {
        let lobby = state.lobby(lobby_id)?;
        if !lobby.is_member(user) {
            return Err(DicehallError::NotMember {
                lobby: lobby_id,
                user,
            });
        }
        if lobby.is_match_finished() {
            return Err(DicehallError::MatchFinished(lobby_id));
        }
        let was_started = lobby.is_started();
        let wager = lobby.wager;

        if !was_started && lobby.creator == user {
            let closed = self.dissolve(state, lobby_id)?;
            let remaining: Vec<UserId> = closed.members.into_iter().filter(|m| *m != user).collect();
            return Ok(Departure {
                lobby: lobby_id,
                user,
                was_started,
                lobby_deleted: true,
                remaining,
            });
        }

        if was_started {
            self.ledger.unlock_funds(state, user, wager)?;
            if penalty {
                let leaver = state.user_mut(user)?;
                leaver.wins -= self.config.leave_penalty_wins;
                tracing::warn!(
                    lobby = %lobby_id,
                    user = %user,
                    penalty = self.config.leave_penalty_wins,
                    "Penalized leave from running match"
                );
            }
        }
        self.remove_member(state, lobby_id, user, was_started, now)
    }

    /// Remove `target` on behalf of the creator `by`. A target kicked from a
    /// started match gets their escrow back; the caller aborts the match.
    ///
    /// # Errors
    /// `LobbyNotFound`, `NotCreator`, `MatchFinished`, `CannotKickCreator`, `NotMember`.
    pub fn kick(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        by: UserId,
        target: UserId,
        now: DateTime<Utc>,
    ) -> Result<Departure> {
        let lobby = Self::validate_kick(state, lobby_id, by, target)?;
        let was_started = lobby.is_started();
        let wager = lobby.wager;
        if was_started {
            self.ledger.unlock_funds(state, target, wager)?;
        }
        tracing::warn!(lobby = %lobby_id, by = %by, target = %target, "Member kicked");
        self.remove_member(state, lobby_id, target, was_started, now)
    }

    /// The checks `kick` performs, without mutating anything.
    ///
    /// # Errors
    /// See [`LobbyRegistry::kick`].
    pub fn validate_kick(
        state: &GameState,
        lobby_id: LobbyId,
        by: UserId,
        target: UserId,
    ) -> Result<&Lobby> {
        let lobby = state.lobby(lobby_id)?;
        if lobby.creator != by {
            return Err(DicehallError::NotCreator(lobby_id));
        }
        if lobby.is_match_finished() {
            return Err(DicehallError::MatchFinished(lobby_id));
        }
        if target == lobby.creator {
            return Err(DicehallError::CannotKickCreator(lobby_id));
        }
        if !lobby.is_member(target) {
            return Err(DicehallError::NotMember {
                lobby: lobby_id,
                user: target,
            });
        }
        Ok(lobby)
    }

    fn remove_member(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        user: UserId,
        was_started: bool,
        now: DateTime<Utc>,
    ) -> Result<Departure> {
        let lobby = state.lobby_mut(lobby_id)?;
        lobby.remove_member(user);
        lobby.touch(now);
        let remaining = lobby.members.clone();
        let lobby_deleted = remaining.is_empty();
        if lobby_deleted {
            self.dissolve(state, lobby_id)?;
        }
        Ok(Departure {
            lobby: lobby_id,
            user,
            was_started,
            lobby_deleted,
            remaining,
        })
    }

    /// Lock the wager for every member and begin the match.
    ///
    /// # Errors
    /// `LobbyNotFound`, `NotCreator`, `AlreadyStarted`, `BelowMinPlayers`,
    /// `AboveMaxPlayers`, `InsufficientFunds` (no lock is taken).
    pub fn start(
        &self,
        state: &mut GameState,
        lobby_id: LobbyId,
        by: UserId,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let lobby = state.lobby(lobby_id)?;
        if lobby.creator != by {
            return Err(DicehallError::NotCreator(lobby_id));
        }
        if lobby.is_started() {
            return Err(DicehallError::AlreadyStarted(lobby_id));
        }
        let limits = self.config.limits(lobby.game);
        let actual = lobby.members.len();
        if actual < limits.min_players {
            return Err(DicehallError::BelowMinPlayers {
                lobby: lobby_id,
                min: limits.min_players,
                actual,
            });
        }
        if actual > limits.max_players {
            return Err(DicehallError::AboveMaxPlayers {
                lobby: lobby_id,
                max: limits.max_players,
                actual,
            });
        }
        let members = lobby.members.clone();
        let wager = lobby.wager;

        self.ledger.lock_all(state, &members, wager)?;
        let lobby = state.lobby_mut(lobby_id)?;
        lobby.phase = LobbyPhase::Started(MatchState::new(&members, limits.rounds));
        lobby.touch(now);
        tracing::info!(lobby = %lobby_id, players = members.len(), wager, rounds = limits.rounds, "Match started");
        Ok(())
    }

    /// Delete the lobby on behalf of its creator, aborting a running match.
    ///
    /// # Errors
    /// `LobbyNotFound`, `NotCreator`, `MatchFinished`.
    pub fn delete(&self, state: &mut GameState, lobby_id: LobbyId, by: UserId) -> Result<Lobby> {
        Self::validate_delete(state, lobby_id, by)?;
        self.dissolve(state, lobby_id)
    }

    /// The checks `delete` performs, without mutating anything.
    ///
    /// # Errors
    /// See [`LobbyRegistry::delete`].
    pub fn validate_delete(state: &GameState, lobby_id: LobbyId, by: UserId) -> Result<&Lobby> {
        let lobby = state.lobby(lobby_id)?;
        if lobby.creator != by {
            return Err(DicehallError::NotCreator(lobby_id));
        }
        if lobby.is_match_finished() {
            return Err(DicehallError::MatchFinished(lobby_id));
        }
        Ok(lobby)
    }

    /// Remove the lobby unconditionally. Escrow still held by the members of
    /// a started lobby is released and confirmation tokens pointing at the
    /// lobby are dropped.
    ///
    /// # Errors
    /// `LobbyNotFound`.
    pub fn dissolve(&self, state: &mut GameState, lobby_id: LobbyId) -> Result<Lobby> {
        let lobby = state
            .lobbies
            .remove(&lobby_id)
            .ok_or(DicehallError::LobbyNotFound(lobby_id))?;
        if lobby.is_started() {
            self.ledger.release_all(state, &lobby.members, lobby.wager);
        }
        ConfirmationGate::purge_lobby(state, lobby_id);
        tracing::info!(lobby = %lobby_id, started = lobby.is_started(), "Lobby deleted");
        Ok(lobby)
    }

    /// Lobbies that can still be joined, oldest first.
    #[must_use]
    pub fn open_lobbies(&self, state: &GameState) -> Vec<LobbySummary> {
        let mut open: Vec<&Lobby> = state.lobbies.values().filter(|l| !l.is_started()).collect();
        open.sort_by_key(|l| (l.created_at, l.id));
        open.into_iter()
            .map(|l| LobbySummary {
                id: l.id,
                game: l.game,
                creator: l.creator,
                members: l.members.len(),
                capacity: self.capacity(l.game),
                wager: l.wager,
            })
            .collect()
    }
}
