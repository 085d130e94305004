//! Append-only bet history.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{Amount, SettlementId, UserId};

/// How a settled match ended for one participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BetOutcome {
    Win,
    Loss,
    Draw,
}

impl fmt::Display for BetOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Win => write!(f, "WIN"),
            Self::Loss => write!(f, "LOSS"),
            Self::Draw => write!(f, "DRAW"),
        }
    }
}

/// One participant's side of a settled match.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BetRecord {
    /// Shared by every record written in the same settlement.
    pub settlement_id: SettlementId,
    pub user_id: UserId,
    /// The wager staked.
    pub amount: Amount,
    /// Set when the match had exactly one opponent.
    pub opponent_id: Option<UserId>,
    pub outcome: BetOutcome,
    /// Net balance change: `payout - wager` for the winner, `-wager` for a
    /// loser, `0` on a draw.
    pub profit: i64,
    pub timestamp: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn outcome_serializes_snake_case() {
        assert_eq!(serde_json::to_string(&BetOutcome::Loss).unwrap(), r#""loss""#);
        assert_eq!(format!("{}", BetOutcome::Draw), "DRAW");
    }
}
