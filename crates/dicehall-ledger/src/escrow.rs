//! Escrow ledger: locks wagers and settles finished matches.
//!
//! The ledger never holds state of its own: every call mutates the
//! [`GameState`] snapshot of the caller's store transaction. Each method
//! validates everything it needs *before* touching a balance, so an error
//! never leaves a half-applied settlement even inside the snapshot.

use chrono::{DateTime, Utc};
use dicehall_types::{
    Amount, BetOutcome, BetRecord, DicehallError, GameConfig, GameState, Result, SettlementId,
    UserId,
};
use rust_decimal::{Decimal, prelude::ToPrimitive};

use crate::audit::SupplyAudit;

/// What one settlement did to the books.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub id: SettlementId,
    /// `None` for a draw.
    pub winner: Option<UserId>,
    /// `wager × participants`.
    pub bank: Amount,
    /// House share of the bank; zero on a draw.
    pub commission: Amount,
    /// Credited to the winner; zero on a draw.
    pub payout: Amount,
    /// The bet-history records appended by this settlement.
    pub records: Vec<BetRecord>,
}

/// Wager escrow and settlement over a game state.
#[derive(Debug, Clone)]
pub struct EscrowLedger {
    commission_rate: Decimal,
}

impl EscrowLedger {
    /// # Errors
    /// Returns `Configuration` if `commission_rate` is outside `[0, 1)`.
    pub fn new(commission_rate: Decimal) -> Result<Self> {
        if commission_rate < Decimal::ZERO || commission_rate >= Decimal::ONE {
            return Err(DicehallError::Configuration(format!(
                "commission_rate must be in [0, 1), got {commission_rate}"
            )));
        }
        Ok(Self { commission_rate })
    }

    /// # Errors
    /// See [`EscrowLedger::new`].
    pub fn from_config(config: &GameConfig) -> Result<Self> {
        Self::new(config.commission_rate)
    }

    #[must_use]
    pub fn commission_rate(&self) -> Decimal {
        self.commission_rate
    }

    /// `floor(bank × rate)`.
    ///
    /// # Errors
    /// Returns `Internal` if the product does not fit an [`Amount`].
    pub fn commission_for(&self, bank: Amount) -> Result<Amount> {
        (Decimal::from(bank) * self.commission_rate)
            .floor()
            .to_u64()
            .ok_or_else(|| DicehallError::Internal(format!("commission overflow for bank {bank}")))
    }

    /// Reserve `amount` of the user's available balance.
    ///
    /// # Errors
    /// - `UnknownUser` if the user is not registered
    /// - `InsufficientFunds` if `balance - locked < amount`; nothing is locked
    pub fn lock_funds(&self, state: &mut GameState, user: UserId, amount: Amount) -> Result<()> {
        let entry = state.user_mut(user)?;
        let available = entry.available();
        if available < amount {
            return Err(DicehallError::InsufficientFunds {
                user,
                needed: amount,
                available,
            });
        }
        entry.locked += amount;
        Ok(())
    }

    /// Release up to `amount` of the user's lock. Floors at zero, so a
    /// double unlock can never push `locked` negative.
    ///
    /// # Errors
    /// Returns `UnknownUser` if the user is not registered.
    pub fn unlock_funds(&self, state: &mut GameState, user: UserId, amount: Amount) -> Result<()> {
        let entry = state.user_mut(user)?;
        if entry.locked < amount {
            tracing::warn!(
                user = %user,
                locked = entry.locked,
                requested = amount,
                "Unlock exceeds locked balance; flooring at zero"
            );
        }
        entry.locked = entry.locked.saturating_sub(amount);
        Ok(())
    }

    /// Lock `amount` for every player, or for none of them.
    ///
    /// # Errors
    /// Returns the first `UnknownUser` / `InsufficientFunds` found; no lock
    /// is taken in that case.
    pub fn lock_all(&self, state: &mut GameState, players: &[UserId], amount: Amount) -> Result<()> {
        for player in players {
            let user = state.user(*player)?;
            if user.available() < amount {
                return Err(DicehallError::InsufficientFunds {
                    user: *player,
                    needed: amount,
                    available: user.available(),
                });
            }
        }
        for player in players {
            self.lock_funds(state, *player, amount)?;
        }
        Ok(())
    }

    /// Compensating release: unlock `amount` for every player. Never fails;
    /// unknown players are logged and skipped.
    pub fn release_all(&self, state: &mut GameState, players: &[UserId], amount: Amount) {
        for player in players {
            if let Err(err) = self.unlock_funds(state, *player, amount) {
                tracing::warn!(user = %player, error = %err, "Skipping release for missing user");
            }
        }
    }

    /// Settle a match with one winner.
    ///
    /// ```text
    /// bank       = wager × (1 + losers)
    /// commission = floor(bank × rate)      → house pool
    /// payout     = bank − commission       → winner
    /// ```
    ///
    /// Every participant's wager is unlocked; each loser is debited `wager`;
    /// the winner's balance changes by `payout − wager`. One bet record per
    /// participant is appended.
    ///
    /// # Errors
    /// - `Internal` if `losers` is empty or contains the winner
    /// - `UnknownUser` / `InsufficientLocked` if a participant's escrow is
    ///   missing
    /// - `BalanceOverflow` / `LedgerInvariant` on arithmetic or conservation
    ///   failure
    ///
    /// On error nothing has been mutated.
    pub fn settle(
        &self,
        state: &mut GameState,
        winner: UserId,
        losers: &[UserId],
        wager: Amount,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        if losers.is_empty() || losers.contains(&winner) {
            return Err(DicehallError::Internal(format!(
                "settle needs distinct winner and losers, got {winner} vs {losers:?}"
            )));
        }
        let participants = u64::try_from(losers.len() + 1)
            .map_err(|_| DicehallError::Internal("participant count overflow".into()))?;
        let bank = wager
            .checked_mul(participants)
            .ok_or(DicehallError::BalanceOverflow(winner))?;
        let commission = self.commission_for(bank)?;
        let payout = bank - commission;

        Self::require_locked(state, std::iter::once(&winner).chain(losers), wager)?;
        let winner_balance = state.user(winner)?.balance;
        let credited = (winner_balance - wager)
            .checked_add(payout)
            .ok_or(DicehallError::BalanceOverflow(winner))?;
        let house = state
            .house_balance
            .checked_add(commission)
            .ok_or_else(|| DicehallError::Internal("house pool overflow".into()))?;

        let before = SupplyAudit::measure(state);
        for loser in losers {
            let entry = state.user_mut(*loser)?;
            entry.locked -= wager;
            entry.balance -= wager;
        }
        let entry = state.user_mut(winner)?;
        entry.locked -= wager;
        entry.balance = credited;
        state.house_balance = house;
        SupplyAudit::verify_conserved(before, SupplyAudit::measure(state))?;

        let id = SettlementId::new();
        let single_opponent = (losers.len() == 1).then(|| losers[0]);
        let mut records = Vec::with_capacity(losers.len() + 1);
        records.push(BetRecord {
            settlement_id: id,
            user_id: winner,
            amount: wager,
            opponent_id: single_opponent,
            outcome: BetOutcome::Win,
            profit: signed(payout) - signed(wager),
            timestamp: now,
        });
        for loser in losers {
            records.push(BetRecord {
                settlement_id: id,
                user_id: *loser,
                amount: wager,
                opponent_id: (losers.len() == 1).then_some(winner),
                outcome: BetOutcome::Loss,
                profit: -signed(wager),
                timestamp: now,
            });
        }
        state.bet_history.extend(records.iter().cloned());

        tracing::info!(
            settlement = %id,
            winner = %winner,
            bank,
            commission,
            payout,
            "Match settled"
        );

        Ok(Settlement {
            id,
            winner: Some(winner),
            bank,
            commission,
            payout,
            records,
        })
    }

    /// Settle a drawn match: every player's wager is unlocked and no balance
    /// changes hands.
    ///
    /// # Errors
    /// `UnknownUser` / `InsufficientLocked` if a player's escrow is missing.
    /// On error nothing has been mutated.
    pub fn settle_draw(
        &self,
        state: &mut GameState,
        players: &[UserId],
        wager: Amount,
        now: DateTime<Utc>,
    ) -> Result<Settlement> {
        Self::require_locked(state, players.iter(), wager)?;
        for player in players {
            state.user_mut(*player)?.locked -= wager;
        }

        let id = SettlementId::new();
        let records: Vec<BetRecord> = players
            .iter()
            .map(|p| BetRecord {
                settlement_id: id,
                user_id: *p,
                amount: wager,
                opponent_id: match players {
                    [a, b] if a == p => Some(*b),
                    [a, b] if b == p => Some(*a),
                    _ => None,
                },
                outcome: BetOutcome::Draw,
                profit: 0,
                timestamp: now,
            })
            .collect();
        state.bet_history.extend(records.iter().cloned());

        tracing::info!(settlement = %id, players = players.len(), wager, "Match drawn");

        Ok(Settlement {
            id,
            winner: None,
            bank: wager.saturating_mul(players.len() as u64),
            commission: 0,
            payout: 0,
            records,
        })
    }

    fn require_locked<'a>(
        state: &GameState,
        players: impl Iterator<Item = &'a UserId>,
        wager: Amount,
    ) -> Result<()> {
        for player in players {
            let user = state.user(*player)?;
            if user.locked < wager {
                return Err(DicehallError::InsufficientLocked {
                    user: *player,
                    needed: wager,
                    locked: user.locked,
                });
            }
        }
        Ok(())
    }
}

fn signed(amount: Amount) -> i64 {
    i64::try_from(amount).unwrap_or(i64::MAX)
}
