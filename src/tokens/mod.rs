//! Token values: the deterministic world baseline and the sparse record
//! of cells the player has changed.
//!
//! Every cell has a baseline value derived from a stable hash of its key, so
//! the world is effectively unbounded without storing anything. The store
//! only keeps cells whose value differs from that baseline; writing the
//! baseline back deletes the entry, which keeps saves small.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::collections::HashMap;
use xxhash_rust::xxh3::xxh3_64;

use crate::shared::{CellId, TokenValue};

/// Salt mixed into every cell hash. Changing it (or `SPAWN_TIERS`) reshuffles
/// the whole world, so it must move together with `save::SAVE_VERSION`.
pub const WORLD_SALT: &str = "geomerge-world-v1";

/// Cumulative luck thresholds: a roll below the bound spawns that value.
pub const SPAWN_TIERS: [(f64, TokenValue); 3] = [(0.14, 2), (0.20, 4), (0.22, 8)];

// ═══════════════════════════════════════════════════════════════════════
// DETERMINISTIC VALUE SOURCE
// ═══════════════════════════════════════════════════════════════════════

/// Baseline token value for any cell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValueSource {
    salt: String,
}

impl Default for ValueSource {
    fn default() -> Self {
        Self::with_salt(WORLD_SALT)
    }
}

impl ValueSource {
    pub fn with_salt(salt: impl Into<String>) -> Self {
        Self { salt: salt.into() }
    }

    pub fn salt(&self) -> &str {
        &self.salt
    }

    /// Stable roll in [0, 1) for a cell. xxh3 of `"row:col|salt"` seeds a
    /// ChaCha8 stream; both are platform and version stable.
    pub fn luck(&self, cell: CellId) -> f64 {
        let seed = xxh3_64(format!("{}|{}", cell.key(), self.salt).as_bytes());
        ChaCha8Rng::seed_from_u64(seed).gen::<f64>()
    }

    pub fn value_at(&self, cell: CellId) -> TokenValue {
        let roll = self.luck(cell);
        SPAWN_TIERS
            .iter()
            .find(|(bound, _)| roll < *bound)
            .map(|&(_, value)| value)
            .unwrap_or(0)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SPARSE OVERRIDE STORE
// ═══════════════════════════════════════════════════════════════════════

/// Cells whose value differs from the baseline.
///
/// Invariant: no entry ever equals `source.value_at(cell)`.
#[derive(Debug, Clone, Default)]
pub struct TokenStore {
    source: ValueSource,
    overrides: HashMap<CellId, TokenValue>,
}

impl TokenStore {
    pub fn new(source: ValueSource) -> Self {
        Self {
            source,
            overrides: HashMap::new(),
        }
    }

    pub fn source(&self) -> &ValueSource {
        &self.source
    }

    pub fn effective_value(&self, cell: CellId) -> TokenValue {
        match self.overrides.get(&cell) {
            Some(&value) => value,
            None => self.source.value_at(cell),
        }
    }

    /// Writes a cell's value. Returns `true` when the stored state changed.
    pub fn set_value(&mut self, cell: CellId, value: TokenValue) -> bool {
        if value == self.source.value_at(cell) {
            self.overrides.remove(&cell).is_some()
        } else {
            self.overrides.insert(cell, value) != Some(value)
        }
    }

    /// Forgets any player change to `cell`; the baseline shows through again.
    pub fn evict(&mut self, cell: CellId) -> bool {
        self.overrides.remove(&cell).is_some()
    }

    pub fn has_override(&self, cell: CellId) -> bool {
        self.overrides.contains_key(&cell)
    }

    pub fn len(&self) -> usize {
        self.overrides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.overrides.is_empty()
    }

    pub fn overrides(&self) -> impl Iterator<Item = (CellId, TokenValue)> + '_ {
        self.overrides.iter().map(|(&cell, &value)| (cell, value))
    }

    pub fn clear(&mut self) {
        self.overrides.clear();
    }
}
