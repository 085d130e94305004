//! Supply conservation and lock-consistency checks.
//!
//! Invariants enforced around every settlement:
//! ```text
//! ∀ user:  balance ≥ locked ≥ 0
//! Σ(balance) + house_pool  is unchanged by lock / unlock / settle / bonus
//! ```
//!
//! Currency only enters the system when a user registers. Settlement moves
//! the commission from the players into the house pool; bonus claims move
//! it back out. If a check ever fails the surrounding transaction is
//! aborted, so no inconsistent state is committed.

use dicehall_types::{Amount, DicehallError, GameState, LobbyId, Result};

/// Currency totals captured at one instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SupplySnapshot {
    /// `Σ balance + house_pool`.
    pub total: u128,
    /// `Σ locked`.
    pub locked: u128,
}

/// Stateless auditor over a [`GameState`].
pub struct SupplyAudit;

impl SupplyAudit {
    /// Measure the current totals.
    #[must_use]
    pub fn measure(state: &GameState) -> SupplySnapshot {
        SupplySnapshot {
            total: state.total_currency(),
            locked: state.total_locked(),
        }
    }

    /// Verify that total supply did not change between two snapshots.
    ///
    /// # Errors
    /// Returns [`DicehallError::LedgerInvariant`] if `after.total != before.total`.
    pub fn verify_conserved(before: SupplySnapshot, after: SupplySnapshot) -> Result<()> {
        if before.total != after.total {
            return Err(DicehallError::LedgerInvariant {
                reason: format!(
                    "total supply changed from {} to {}",
                    before.total, after.total
                ),
            });
        }
        Ok(())
    }

    /// Verify `balance ≥ locked` for every user.
    ///
    /// # Errors
    /// Returns [`DicehallError::LedgerInvariant`] naming the first offender.
    pub fn verify_locks(state: &GameState) -> Result<()> {
        match state.users.values().find(|u| !u.is_consistent()) {
            Some(user) => Err(DicehallError::LedgerInvariant {
                reason: format!(
                    "{} has locked {} above balance {}",
                    user.id, user.locked, user.balance
                ),
            }),
            None => Ok(()),
        }
    }

    /// Full audit: total supply equals `expected_total` and no user is
    /// over-locked.
    ///
    /// # Errors
    /// Returns [`DicehallError::LedgerInvariant`] on the first violation.
    pub fn check(state: &GameState, expected_total: u128) -> Result<()> {
        let actual = state.total_currency();
        if actual != expected_total {
            return Err(DicehallError::LedgerInvariant {
                reason: format!("total supply {actual}, expected {expected_total}"),
            });
        }
        Self::verify_locks(state)
    }

    /// Locked funds attributable to a started lobby: `wager × members`
    /// if every member still holds at least the wager in escrow.
    ///
    /// # Errors
    /// Returns `LobbyNotFound` or `LedgerInvariant` if some member's lock is
    /// short of the wager.
    pub fn locked_in_lobby(state: &GameState, lobby: LobbyId) -> Result<Amount> {
        let lobby = state.lobby(lobby)?;
        if !lobby.is_started() {
            return Ok(0);
        }
        let mut sum: Amount = 0;
        for member in &lobby.members {
            let user = state.user(*member)?;
            if user.locked < lobby.wager {
                return Err(DicehallError::LedgerInvariant {
                    reason: format!(
                        "{member} holds {} locked, below wager {} of lobby {}",
                        user.locked, lobby.wager, lobby.id
                    ),
                });
            }
            sum = sum.saturating_add(lobby.wager);
        }
        Ok(sum)
    }
}
