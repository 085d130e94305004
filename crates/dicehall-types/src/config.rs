//! Game configuration.

use std::{path::Path, time::Duration};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::{Amount, DicehallError, GameKind, Result, constants};

/// Per-game-kind limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameLimits {
    /// Rounds per match.
    pub rounds: u32,
    /// Members needed to start.
    pub min_players: usize,
    /// Seats in the lobby.
    pub max_players: usize,
}

impl GameLimits {
    /// Dice defaults: six rounds, head-to-head.
    #[must_use]
    pub fn dice() -> Self {
        Self {
            rounds: constants::DEFAULT_DICE_ROUNDS,
            min_players: constants::DEFAULT_DICE_MIN_PLAYERS,
            max_players: constants::DEFAULT_DICE_MAX_PLAYERS,
        }
    }
}

/// Tunables for the whole service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameConfig {
    /// Balance granted when a user is first registered.
    pub starting_balance: Amount,
    /// House share of the bank, in `[0, 1)`.
    pub commission_rate: Decimal,
    /// Validity window of a pending confirmation.
    pub confirm_ttl: Duration,
    /// Limits for dice lobbies.
    pub dice: GameLimits,
    /// Wins deducted for walking out of a running match.
    pub leave_penalty_wins: i64,
    /// Pause between a resolved round and the next round's prompt.
    pub round_pacing: Duration,
    /// Minimum spacing between two bonus claims of one user.
    pub bonus_cooldown: Duration,
    pub min_wager: Amount,
    pub max_wager: Amount,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            starting_balance: constants::DEFAULT_STARTING_BALANCE,
            commission_rate: Decimal::new(constants::DEFAULT_COMMISSION_PERCENT, 2),
            confirm_ttl: Duration::from_secs(constants::DEFAULT_CONFIRM_TTL_SECS),
            dice: GameLimits::dice(),
            leave_penalty_wins: constants::DEFAULT_LEAVE_PENALTY_WINS,
            round_pacing: Duration::from_millis(constants::DEFAULT_ROUND_PACING_MS),
            bonus_cooldown: Duration::from_secs(constants::DEFAULT_BONUS_COOLDOWN_SECS),
            min_wager: constants::DEFAULT_MIN_WAGER,
            max_wager: constants::DEFAULT_MAX_WAGER,
        }
    }
}

impl GameConfig {
    /// Limits for a game kind.
    #[must_use]
    pub fn limits(&self, game: GameKind) -> GameLimits {
        match game {
            GameKind::Dice => self.dice,
        }
    }

    /// Parse and validate a JSON config.
    ///
    /// # Errors
    /// Returns `Configuration` on malformed JSON or invalid values.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: Self =
            serde_json::from_str(json).map_err(|e| DicehallError::Configuration(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Read, parse and validate a JSON config file.
    ///
    /// # Errors
    /// Returns `Io` if the file cannot be read, `Configuration` otherwise.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    /// Check value ranges.
    ///
    /// # Errors
    /// Returns `Configuration` naming the first offending field.
    pub fn validate(&self) -> Result<()> {
        if self.commission_rate < Decimal::ZERO || self.commission_rate >= Decimal::ONE {
            return Err(DicehallError::Configuration(format!(
                "commission_rate {} outside [0, 1)",
                self.commission_rate
            )));
        }
        let dice = self.dice;
        if dice.rounds == 0 {
            return Err(DicehallError::Configuration("dice.rounds must be > 0".into()));
        }
        if dice.min_players < 2 || dice.min_players > dice.max_players {
            return Err(DicehallError::Configuration(format!(
                "dice players range [{}, {}] invalid",
                dice.min_players, dice.max_players
            )));
        }
        if self.min_wager > self.max_wager {
            return Err(DicehallError::Configuration(format!(
                "min_wager {} exceeds max_wager {}",
                self.min_wager, self.max_wager
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_house_rules() {
        let cfg = GameConfig::default();
        assert_eq!(cfg.starting_balance, 1000);
        assert_eq!(cfg.commission_rate, Decimal::new(10, 2));
        assert_eq!(cfg.confirm_ttl.as_secs(), 60);
        assert_eq!(cfg.dice.rounds, 6);
        assert_eq!(cfg.limits(GameKind::Dice).max_players, 2);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_full_commission() {
        let cfg = GameConfig {
            commission_rate: Decimal::ONE,
            ..GameConfig::default()
        };
        assert!(matches!(
            cfg.validate(),
            Err(DicehallError::Configuration(_))
        ));
    }

    #[test]
    fn rejects_inverted_player_range() {
        let mut cfg = GameConfig::default();
        cfg.dice.min_players = 3;
        assert!(cfg.validate().is_err());
        cfg.dice.min_players = 1;
        cfg.dice.max_players = 4;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn json_roundtrip_and_validation() {
        let cfg = GameConfig::default();
        let json = serde_json::to_string(&cfg).unwrap();
        let back = GameConfig::from_json_str(&json).unwrap();
        assert_eq!(back.commission_rate, cfg.commission_rate);
        assert_eq!(back.round_pacing, cfg.round_pacing);

        let bad = json.replace(r#""rounds":6"#, r#""rounds":0"#);
        assert!(GameConfig::from_json_str(&bad).is_err());
        assert!(GameConfig::from_json_str("{").is_err());
    }
}
