//! Identifiers used throughout Dicehall.
//!
//! `UserId` is the opaque identity handed to us by the chat transport.
//! `LobbyId` is a short random number players can type. `SettlementId`
//! uses UUIDv7 so bet history sorts by settlement time.

use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::constants;

// ---------------------------------------------------------------------------
// UserId
// ---------------------------------------------------------------------------

/// Opaque per-user identity supplied by the chat transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct UserId(pub u64);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "user:{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// LobbyId
// ---------------------------------------------------------------------------

/// Six-digit lobby identifier, unique among live lobbies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct LobbyId(pub u32);

impl LobbyId {
    /// Whether the id lies in the allocatable range.
    #[must_use]
    pub fn is_well_formed(self) -> bool {
        (constants::LOBBY_ID_MIN..=constants::LOBBY_ID_MAX).contains(&self.0)
    }
}

impl fmt::Display for LobbyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for LobbyId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

// ---------------------------------------------------------------------------
// SettlementId
// ---------------------------------------------------------------------------

/// Groups the bet-history records written by one match settlement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SettlementId(pub Uuid);

impl SettlementId {
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::now_v7())
    }
}

impl Default for SettlementId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SettlementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stl:{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lobby_id_parses_user_input() {
        let id: LobbyId = " 123456 ".parse().unwrap();
        assert_eq!(id, LobbyId(123_456));
        assert!(id.is_well_formed());
        assert!("abc".parse::<LobbyId>().is_err());
    }

    #[test]
    fn lobby_id_range() {
        assert!(!LobbyId(99_999).is_well_formed());
        assert!(LobbyId(999_999).is_well_formed());
        assert!(!LobbyId(1_000_000).is_well_formed());
    }

    #[test]
    fn settlement_ids_are_time_ordered() {
        let a = SettlementId::new();
        let b = SettlementId::new();
        assert_ne!(a, b);
        assert!(a < b);
    }

    #[test]
    fn ids_as_json_map_keys() {
        let mut map = std::collections::BTreeMap::new();
        map.insert(UserId(42), LobbyId(100_001));
        let json = serde_json::to_string(&map).unwrap();
        assert_eq!(json, r#"{"42":100001}"#);
        let back: std::collections::BTreeMap<UserId, LobbyId> =
            serde_json::from_str(&json).unwrap();
        assert_eq!(back, map);
    }
}
