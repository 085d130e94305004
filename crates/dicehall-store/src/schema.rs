//! Explicit schema migration at load.
//!
//! Older documents may lack whole top-level collections or the per-lobby
//! activity timestamp. Those are synthesized here, on the raw JSON, before
//! the document is decoded into a typed [`GameState`]; the typed model
//! itself has no serde defaults and rejects anything this step misses.
//!
//! | version | change                                                      |
//! |---------|-------------------------------------------------------------|
//! | 1       | untagged; collections and `last_activity` may be missing    |
//! | 2       | `schema_version` stamped; every collection present          |

use chrono::{DateTime, Utc};
use dicehall_types::{DicehallError, GameState, Result, constants};
use serde_json::{Map, Value};

/// The outcome of migrating one document.
#[derive(Debug)]
pub struct Migrated {
    pub state: GameState,
    /// Whether anything was synthesized; callers persist the result if so.
    pub changed: bool,
}

/// Migrate a raw persisted document to the current schema and decode it.
///
/// # Errors
/// - `UnsupportedSchema` if the document is newer than this build
/// - `Persistence` if the document is not a JSON object
/// - `Serialization` if the migrated document still fails to decode
pub fn migrate(raw: Value, now: DateTime<Utc>) -> Result<Migrated> {
    let Value::Object(mut doc) = raw else {
        return Err(DicehallError::Persistence(
            "state document is not a JSON object".into(),
        ));
    };

    let version = doc
        .get("schema_version")
        .and_then(Value::as_u64)
        .map_or(Ok(1), u32::try_from)
        .map_err(|_| DicehallError::Persistence("schema_version out of range".into()))?;
    if version > constants::SCHEMA_VERSION {
        return Err(DicehallError::UnsupportedSchema {
            found: version,
            supported: constants::SCHEMA_VERSION,
        });
    }

    let mut changed = false;
    for (key, default) in [
        ("users", Value::Object(Map::new())),
        ("lobbies", Value::Object(Map::new())),
        ("pending_confirmations", Value::Object(Map::new())),
        ("house_balance", Value::from(0u64)),
        ("bet_history", Value::Array(Vec::new())),
    ] {
        if !doc.contains_key(key) {
            tracing::info!(collection = key, "Synthesizing missing collection");
            doc.insert(key.to_string(), default);
            changed = true;
        }
    }

    if let Some(Value::Object(lobbies)) = doc.get_mut("lobbies") {
        let stamp = Value::String(now.to_rfc3339());
        for (id, lobby) in lobbies.iter_mut() {
            let Value::Object(lobby) = lobby else {
                return Err(DicehallError::Persistence(format!(
                    "lobby {id} is not a JSON object"
                )));
            };
            if !lobby.contains_key("last_activity") {
                tracing::info!(lobby = %id, "Stamping missing last_activity");
                lobby.insert("last_activity".into(), stamp.clone());
                changed = true;
            }
            if !lobby.contains_key("created_at") {
                let created = lobby
                    .get("last_activity")
                    .cloned()
                    .unwrap_or_else(|| stamp.clone());
                lobby.insert("created_at".into(), created);
                changed = true;
            }
        }
    }

    if version != constants::SCHEMA_VERSION {
        changed = true;
    }
    doc.insert(
        "schema_version".into(),
        Value::from(constants::SCHEMA_VERSION),
    );

    let state: GameState = serde_json::from_value(Value::Object(doc))?;
    Ok(Migrated { state, changed })
}

#[cfg(test)]
mod tests {
    use super::*;
    use dicehall_types::{LobbyId, UserId};
    use serde_json::json;

    #[test]
    fn empty_document_gets_every_collection() {
        let m = migrate(json!({}), Utc::now()).unwrap();
        assert!(m.changed);
        assert_eq!(m.state, GameState::default());
    }

    #[test]
    fn current_document_is_untouched() {
        let raw = serde_json::to_value(GameState::default()).unwrap();
        let m = migrate(raw, Utc::now()).unwrap();
        assert!(!m.changed);
    }

    #[test]
    fn missing_pending_confirmations_is_synthesized() {
        let mut raw = serde_json::to_value(GameState::default()).unwrap();
        raw.as_object_mut().unwrap().remove("pending_confirmations");
        let m = migrate(raw, Utc::now()).unwrap();
        assert!(m.changed);
        assert!(m.state.pending_confirmations.is_empty());
    }

    #[test]
    fn lobby_without_activity_is_stamped() {
        let now = Utc::now();
        let raw = json!({
            "users": {},
            "lobbies": {
                "123456": {
                    "id": 123456,
                    "game": "dice",
                    "creator": 1,
                    "members": [1],
                    "wager": 50,
                    "phase": "Open"
                }
            }
        });
        let m = migrate(raw, now).unwrap();
        assert!(m.changed);
        let lobby = m.state.lobbies.get(&LobbyId(123_456)).unwrap();
        assert_eq!(lobby.creator, UserId(1));
        assert_eq!(lobby.last_activity, now);
        assert_eq!(lobby.created_at, now);
    }

    #[test]
    fn newer_schema_is_rejected() {
        let err = migrate(json!({ "schema_version": 99 }), Utc::now()).unwrap_err();
        assert!(matches!(
            err,
            DicehallError::UnsupportedSchema { found: 99, .. }
        ));
    }

    #[test]
    fn non_object_is_rejected() {
        let err = migrate(json!([1, 2, 3]), Utc::now()).unwrap_err();
        assert!(matches!(err, DicehallError::Persistence(_)));
    }
}
