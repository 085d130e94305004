//! Player profiles with escrow accounting.
//!
//! `balance` is everything the user owns; `locked` is the part of it held
//! in escrow for running matches. Unlike a split available/frozen model,
//! locked funds stay inside `balance` until settlement debits them, so the
//! invariant is `balance >= locked`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, UserId};

/// A registered player. Created on first interaction, never deleted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    /// Display name as last reported by the chat transport.
    pub name: String,
    /// Total currency owned, including the locked part.
    pub balance: Amount,
    /// Currency reserved against running matches.
    pub locked: Amount,
    /// Matches played to completion.
    pub games_played: u32,
    /// Match wins. Signed: walking out of a match costs wins.
    pub wins: i64,
    /// Last successful bonus claim.
    pub last_bonus: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl User {
    /// A fresh profile holding `starting_balance`.
    #[must_use]
    pub fn new(id: UserId, name: impl Into<String>, starting_balance: Amount, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            balance: starting_balance,
            locked: 0,
            games_played: 0,
            wins: 0,
            last_bonus: None,
            created_at: now,
        }
    }

    /// Balance not reserved by escrow.
    #[must_use]
    pub fn available(&self) -> Amount {
        self.balance.saturating_sub(self.locked)
    }

    /// `balance >= locked`.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        self.balance >= self.locked
    }
}
