//! Versioned JSON form of a session.
//!
//! ```json
//! { "version": 1,
//!   "snapshot": { "tokens": [["row:col", 4], ...],
//!                 "inventory": {"value": 8} | null,
//!                 "playerCell": {"row": 0, "col": 0},
//!                 "movementMode": "manual",
//!                 "target": 32 } }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::shared::*;

/// Bump together with `tokens::WORLD_SALT` or any shape change.
pub const SAVE_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum SaveError {
    #[error("encoded save is {size} bytes, over the {cap} byte cap")]
    Oversize { size: usize, cap: usize },
    #[error("save i/o failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not encode save: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("storage backend: {0}")]
    Storage(String),
}

/// Why a stored save was not restored.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadRejection {
    #[error("stored save is empty")]
    Empty,
    #[error("not valid JSON: {0}")]
    Parse(String),
    #[error("save version {found:?} does not match {expected}")]
    VersionMismatch { found: Option<u64>, expected: u32 },
    #[error("save has no snapshot")]
    MissingSnapshot,
    #[error("snapshot has the wrong shape: {0}")]
    Shape(String),
    #[error("bad cell key {0:?}")]
    BadCellKey(String),
    #[error("token value {0} is not a power of two")]
    BadValue(TokenValue),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventorySlot {
    pub value: TokenValue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub tokens: Vec<(String, TokenValue)>,
    pub inventory: Option<InventorySlot>,
    pub player_cell: CellId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub movement_mode: Option<MovementMode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<TokenValue>,
}

#[derive(Serialize)]
struct Envelope<'a> {
    version: u32,
    snapshot: &'a Snapshot,
}

/// Loose view of the envelope so a version mismatch is told apart from a
/// shape error.
#[derive(Deserialize)]
struct RawEnvelope {
    version: Option<serde_json::Value>,
    snapshot: Option<serde_json::Value>,
}

pub fn encode(snapshot: &Snapshot, cap: usize) -> Result<String, SaveError> {
    let json = serde_json::to_string(&Envelope {
        version: SAVE_VERSION,
        snapshot,
    })?;
    if json.len() > cap {
        return Err(SaveError::Oversize {
            size: json.len(),
            cap,
        });
    }
    Ok(json)
}

pub fn decode(json: &str) -> Result<Snapshot, LoadRejection> {
    if json.trim().is_empty() {
        return Err(LoadRejection::Empty);
    }
    let raw: RawEnvelope =
        serde_json::from_str(json).map_err(|e| LoadRejection::Parse(e.to_string()))?;

    let found = raw.version.as_ref().and_then(serde_json::Value::as_u64);
    if found != Some(u64::from(SAVE_VERSION)) {
        return Err(LoadRejection::VersionMismatch {
            found,
            expected: SAVE_VERSION,
        });
    }
    let snapshot = match raw.snapshot {
        Some(serde_json::Value::Null) | None => return Err(LoadRejection::MissingSnapshot),
        Some(value) => value,
    };
    let snapshot: Snapshot =
        serde_json::from_value(snapshot).map_err(|e| LoadRejection::Shape(e.to_string()))?;

    for (key, value) in &snapshot.tokens {
        if CellId::parse_key(key).is_none() {
            return Err(LoadRejection::BadCellKey(key.clone()));
        }
        check_value(*value)?;
    }
    if let Some(slot) = &snapshot.inventory {
        check_value(slot.value)?;
    }
    Ok(snapshot)
}

fn check_value(value: TokenValue) -> Result<(), LoadRejection> {
    if value == 0 || value.is_power_of_two() {
        Ok(())
    } else {
        Err(LoadRejection::BadValue(value))
    }
}

/// Overrides in a stable (row, col) order so identical sessions encode
/// identically.
pub fn snapshot_of(session: &Session, config: &GameConfig) -> Snapshot {
    let mut tokens: Vec<(CellId, TokenValue)> = session.tokens.overrides().collect();
    tokens.sort_unstable_by_key(|(cell, _)| *cell);
    Snapshot {
        tokens: tokens
            .into_iter()
            .map(|(cell, value)| (cell.key(), value))
            .collect(),
        inventory: session.held.value().map(|value| InventorySlot { value }),
        player_cell: session.player_cell,
        movement_mode: Some(session.movement_mode),
        target: Some(config.win_target),
    }
}

/// Rebuilds a session from a decoded snapshot. Entries that equal the
/// baseline are dropped on the way in.
pub fn restore(snapshot: &Snapshot, config: &GameConfig, source: ValueSource) -> Session {
    let mut session = Session::with_source(config, source);
    for (key, value) in &snapshot.tokens {
        if let Some(cell) = CellId::parse_key(key) {
            session.tokens.set_value(cell, *value);
        }
    }
    session.held = Held::from_value(snapshot.inventory.as_ref().map(|slot| slot.value));
    session.player_cell = snapshot.player_cell;
    session.movement_mode = snapshot.movement_mode.unwrap_or(config.default_movement);
    session.won = session.held.value().unwrap_or(0) >= config.win_target
        || session
            .tokens
            .overrides()
            .any(|(_, value)| value >= config.win_target);
    session
}
