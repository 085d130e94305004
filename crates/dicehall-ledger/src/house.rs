//! House pool: commission accrues here and is paid back out as bonuses.

use chrono::{DateTime, Utc};
use dicehall_types::{Amount, DicehallError, GameConfig, GameState, Result, UserId, constants};

/// A successful bonus claim.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BonusClaim {
    pub user: UserId,
    pub amount: Amount,
    /// Pool balance left after this claim.
    pub remaining_pool: Amount,
}

/// Bonus payouts from the commission pool.
#[derive(Debug, Clone)]
pub struct HousePool {
    cooldown: chrono::Duration,
}

impl HousePool {
    /// # Errors
    /// Returns `Configuration` if `cooldown` does not fit a chrono duration.
    pub fn new(cooldown: std::time::Duration) -> Result<Self> {
        let cooldown = chrono::Duration::from_std(cooldown)
            .map_err(|e| DicehallError::Configuration(format!("bonus_cooldown: {e}")))?;
        Ok(Self { cooldown })
    }

    /// # Errors
    /// See [`HousePool::new`].
    pub fn from_config(config: &GameConfig) -> Result<Self> {
        Self::new(config.bonus_cooldown)
    }

    /// Pay `user` an equal share of the pool: `max(1, pool / users)`,
    /// capped at what the pool holds. One claim per cooldown window.
    ///
    /// # Errors
    /// - `UnknownUser` if the claimant is not registered
    /// - `BonusCooldown` if the last claim is younger than the cooldown
    /// - `BonusUnavailable` if the pool is empty
    /// - `BalanceOverflow` if the credit would overflow the balance
    pub fn claim_bonus(
        &self,
        state: &mut GameState,
        user: UserId,
        now: DateTime<Utc>,
    ) -> Result<BonusClaim> {
        let last = state.user(user)?.last_bonus;
        if let Some(last) = last {
            let ready_at = last + self.cooldown;
            if now < ready_at {
                return Err(DicehallError::BonusCooldown {
                    user,
                    remaining_secs: (ready_at - now).num_seconds().max(1),
                });
            }
        }

        let pool = state.house_balance;
        if pool == 0 {
            return Err(DicehallError::BonusUnavailable);
        }
        let users = state.users.len() as u64;
        let amount = (pool / users.max(1)).max(constants::MIN_BONUS_SHARE).min(pool);

        let entry = state.user_mut(user)?;
        entry.balance = entry
            .balance
            .checked_add(amount)
            .ok_or(DicehallError::BalanceOverflow(user))?;
        entry.last_bonus = Some(now);
        state.house_balance = pool - amount;

        tracing::info!(user = %user, amount, remaining = state.house_balance, "Bonus claimed");
        Ok(BonusClaim {
            user,
            amount,
            remaining_pool: state.house_balance,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::SupplyAudit;
    use chrono::Duration;
    use dicehall_types::User;

    fn pool() -> HousePool {
        HousePool::new(std::time::Duration::from_secs(86_400)).unwrap()
    }

    fn state(users: u64, house: Amount) -> GameState {
        let mut state = GameState::default();
        for id in 1..=users {
            state
                .users
                .insert(UserId(id), User::new(UserId(id), format!("u{id}"), 1000, Utc::now()));
        }
        state.house_balance = house;
        state
    }

    #[test]
    fn share_is_pool_over_users() {
        let mut s = state(4, 100);
        let before = SupplyAudit::measure(&s);
        let claim = pool().claim_bonus(&mut s, UserId(1), Utc::now()).unwrap();
        assert_eq!(claim.amount, 25);
        assert_eq!(claim.remaining_pool, 75);
        assert_eq!(s.user(UserId(1)).unwrap().balance, 1025);
        SupplyAudit::verify_conserved(before, SupplyAudit::measure(&s)).unwrap();
    }

    #[test]
    fn small_pool_pays_minimum_share() {
        let mut s = state(10, 3);
        let claim = pool().claim_bonus(&mut s, UserId(2), Utc::now()).unwrap();
        assert_eq!(claim.amount, 1);
        assert_eq!(s.house_balance, 2);
    }

    #[test]
    fn empty_pool_is_unavailable() {
        let mut s = state(2, 0);
        assert!(matches!(
            pool().claim_bonus(&mut s, UserId(1), Utc::now()),
            Err(DicehallError::BonusUnavailable)
        ));
        assert_eq!(s.user(UserId(1)).unwrap().last_bonus, None);
    }

    #[test]
    fn cooldown_blocks_second_claim() {
        let mut s = state(1, 100);
        let p = pool();
        let now = Utc::now();
        p.claim_bonus(&mut s, UserId(1), now).unwrap();
        s.house_balance = 50;

        let err = p
            .claim_bonus(&mut s, UserId(1), now + Duration::hours(23))
            .unwrap_err();
        match err {
            DicehallError::BonusCooldown { remaining_secs, .. } => assert_eq!(remaining_secs, 3600),
            other => panic!("unexpected {other:?}"),
        }

        let claim = p
            .claim_bonus(&mut s, UserId(1), now + Duration::hours(24))
            .unwrap();
        assert_eq!(claim.amount, 50);
    }

    #[test]
    fn unknown_claimant() {
        let mut s = state(1, 100);
        assert!(matches!(
            pool().claim_bonus(&mut s, UserId(9), Utc::now()),
            Err(DicehallError::UnknownUser(UserId(9)))
        ));
    }
}
