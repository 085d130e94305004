//! The persisted root: every record the store owns.
//!
//! Logical layout on disk:
//!
//! ```text
//! {
//!   "schema_version": 2,
//!   "users":                 { "<user id>":  User },
//!   "lobbies":               { "<lobby id>": Lobby },
//!   "pending_confirmations": { "<user id>":  PendingConfirmation },
//!   "house_balance": 0,
//!   "bet_history": [ BetRecord, ... ]
//! }
//! ```

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{
    Amount, BetRecord, DicehallError, Lobby, LobbyId, PendingConfirmation, Result, User, UserId,
    constants,
};

/// Full application state, loaded and committed as one unit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameState {
    pub schema_version: u32,
    pub users: BTreeMap<UserId, User>,
    pub lobbies: BTreeMap<LobbyId, Lobby>,
    pub pending_confirmations: BTreeMap<UserId, PendingConfirmation>,
    /// Accrued commission not yet paid out as bonuses.
    pub house_balance: Amount,
    pub bet_history: Vec<BetRecord>,
}

impl Default for GameState {
    fn default() -> Self {
        Self {
            schema_version: constants::SCHEMA_VERSION,
            users: BTreeMap::new(),
            lobbies: BTreeMap::new(),
            pending_confirmations: BTreeMap::new(),
            house_balance: 0,
            bet_history: Vec::new(),
        }
    }
}

impl GameState {
    /// # Errors
    /// Returns `UnknownUser` if the user was never registered.
    pub fn user(&self, id: UserId) -> Result<&User> {
        self.users.get(&id).ok_or(DicehallError::UnknownUser(id))
    }

    /// # Errors
    /// Returns `UnknownUser` if the user was never registered.
    pub fn user_mut(&mut self, id: UserId) -> Result<&mut User> {
        self.users.get_mut(&id).ok_or(DicehallError::UnknownUser(id))
    }

    /// # Errors
    /// Returns `LobbyNotFound` if no live lobby has this id.
    pub fn lobby(&self, id: LobbyId) -> Result<&Lobby> {
        self.lobbies.get(&id).ok_or(DicehallError::LobbyNotFound(id))
    }

    /// # Errors
    /// Returns `LobbyNotFound` if no live lobby has this id.
    pub fn lobby_mut(&mut self, id: LobbyId) -> Result<&mut Lobby> {
        self.lobbies
            .get_mut(&id)
            .ok_or(DicehallError::LobbyNotFound(id))
    }

    /// The live lobby created by `user`, if any.
    #[must_use]
    pub fn owned_lobby(&self, user: UserId) -> Option<LobbyId> {
        self.lobbies
            .values()
            .find(|l| l.creator == user)
            .map(|l| l.id)
    }

    /// Every unit of currency in the system: user balances plus the house pool.
    #[must_use]
    pub fn total_currency(&self) -> u128 {
        let users: u128 = self.users.values().map(|u| u128::from(u.balance)).sum();
        users + u128::from(self.house_balance)
    }

    /// Sum of all users' locked balances.
    #[must_use]
    pub fn total_locked(&self) -> u128 {
        self.users.values().map(|u| u128::from(u.locked)).sum()
    }
}
