//! Shared components, resources, events, and states for GeoMerge.
//!
//! This is the type contract. Every domain plugin imports from here.
//! No domain imports from any other domain's systems directly; the only
//! cross-domain types are the plain data types re-exported below.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;

pub use crate::grid::{CellBounds, GridGeometry};
pub use crate::tokens::{TokenStore, ValueSource};

// ═══════════════════════════════════════════════════════════════════════
// GAME STATE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, States, Default)]
pub enum GameState {
    /// Config is in place; the saved session (if any) is being restored.
    #[default]
    Loading,
    Playing,
}

// ═══════════════════════════════════════════════════════════════════════
// CELLS & TOKENS
// ═══════════════════════════════════════════════════════════════════════

/// A token's numeric value. 0 means the cell (or hand) is empty; every
/// other value is a power of two.
pub type TokenValue = u32;

/// Grid cell relative to the configured origin. Rows grow north
/// (latitude), columns grow east (longitude).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
pub struct CellId {
    pub row: i32,
    pub col: i32,
}

impl CellId {
    pub const ORIGIN: CellId = CellId { row: 0, col: 0 };

    pub const fn new(row: i32, col: i32) -> Self {
        Self { row, col }
    }

    pub fn offset(self, d_row: i32, d_col: i32) -> Self {
        Self {
            row: self.row.saturating_add(d_row),
            col: self.col.saturating_add(d_col),
        }
    }

    /// Max of the per-axis distances.
    pub fn chebyshev(self, other: CellId) -> u64 {
        let dr = (i64::from(self.row) - i64::from(other.row)).unsigned_abs();
        let dc = (i64::from(self.col) - i64::from(other.col)).unsigned_abs();
        dr.max(dc)
    }

    /// Canonical `"row:col"` form used as the persisted map key and as
    /// the input to the deterministic value hash.
    pub fn key(self) -> String {
        format!("{}:{}", self.row, self.col)
    }

    pub fn parse_key(key: &str) -> Option<CellId> {
        let (row, col) = key.split_once(':')?;
        Some(CellId {
            row: row.trim().parse().ok()?,
            col: col.trim().parse().ok()?,
        })
    }
}

impl fmt::Display for CellId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.row, self.col)
    }
}

/// A continuous position on the Earth (degrees).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct GeoPosition {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPosition {
    pub const NULL_ISLAND: GeoPosition = GeoPosition { lat: 0.0, lng: 0.0 };

    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }
}

/// The single inventory slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Held {
    #[default]
    Empty,
    Holding(TokenValue),
}

impl Held {
    pub fn value(self) -> Option<TokenValue> {
        match self {
            Held::Empty => None,
            Held::Holding(v) => Some(v),
        }
    }

    pub fn from_value(value: Option<TokenValue>) -> Self {
        match value {
            Some(v) if v > 0 => Held::Holding(v),
            _ => Held::Empty,
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════
// CONFIGURATION
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MovementMode {
    #[default]
    Manual,
    Tracking,
}

impl MovementMode {
    pub fn toggled(self) -> Self {
        match self {
            MovementMode::Manual => MovementMode::Tracking,
            MovementMode::Tracking => MovementMode::Manual,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MovementMode::Manual => "manual",
            MovementMode::Tracking => "tracking",
        }
    }
}

/// Where the doubled token ends up after a merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MergePolicy {
    /// Cell becomes empty, the hand holds the doubled value.
    #[default]
    StaysInHand,
    /// Cell holds the doubled value, the hand becomes empty.
    WritesToCell,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WindowStrategy {
    /// Square of `radius` cells around the player's cell.
    PlayerRadius { radius: u32 },
    /// Cells under the camera's visible rectangle, grown by `margin` cells.
    Viewport { margin: i32 },
}

impl Default for WindowStrategy {
    fn default() -> Self {
        WindowStrategy::PlayerRadius { radius: 8 }
    }
}

/// Game constants. Fixed at startup (see `config::load_game_config`).
#[derive(Resource, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    pub origin: GeoPosition,
    /// Degrees per cell on both axes.
    pub cell_size: f64,
    /// Chebyshev reach, in cells.
    pub interaction_radius: u32,
    pub window: WindowStrategy,
    pub win_target: TokenValue,
    pub default_movement: MovementMode,
    pub merge_policy: MergePolicy,
    /// Forget overrides for cells that leave the visible window.
    pub memoryless: bool,
    /// Emitted by the tracking source when live location is unavailable.
    pub fallback_position: GeoPosition,
    pub save_debounce_ms: u64,
    pub resync_throttle_ms: u64,
    pub save_size_cap: usize,
}

/// Default anchor: a lecture hall on the UCSC campus.
pub const CLASSROOM: GeoPosition = GeoPosition::new(36.997936, -122.056987);

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            origin: CLASSROOM,
            cell_size: 1e-4,
            interaction_radius: 3,
            window: WindowStrategy::default(),
            win_target: 32,
            default_movement: MovementMode::Manual,
            merge_policy: MergePolicy::StaysInHand,
            memoryless: true,
            fallback_position: CLASSROOM,
            save_debounce_ms: 250,
            resync_throttle_ms: 16,
            save_size_cap: 200_000,
        }
    }
}

impl GameConfig {
    pub fn geometry(&self) -> GridGeometry {
        GridGeometry::new(self.origin, self.cell_size)
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SESSION
// ═══════════════════════════════════════════════════════════════════════

/// Everything a save captures. Owned by the app world; every domain reaches
/// it through `Res<Session>` / `ResMut<Session>`, so change detection on
/// this resource is what schedules persistence.
#[derive(Resource, Debug, Clone)]
pub struct Session {
    pub tokens: TokenStore,
    pub held: Held,
    pub player_cell: CellId,
    pub movement_mode: MovementMode,
    /// Latched once any merge reaches the target.
    pub won: bool,
}

impl Session {
    pub fn new(config: &GameConfig) -> Self {
        Self::with_source(config, ValueSource::default())
    }

    pub fn with_source(config: &GameConfig, source: ValueSource) -> Self {
        Self {
            tokens: TokenStore::new(source),
            held: Held::Empty,
            player_cell: config.geometry().to_cell(config.origin),
            movement_mode: config.default_movement,
            won: false,
        }
    }
}

impl Default for Session {
    fn default() -> Self {
        Self::new(&GameConfig::default())
    }
}

/// Most recent raw position reported by the active movement source.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct PlayerPosition(pub GeoPosition);

/// Live-location health, shown by the HUD.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocationStatus {
    pub degraded: bool,
}

// ═══════════════════════════════════════════════════════════════════════
// EVENTS
// ═══════════════════════════════════════════════════════════════════════

/// A position emitted by the active movement source.
#[derive(Event, Debug, Clone, Copy)]
pub struct PositionUpdateEvent {
    pub position: GeoPosition,
    /// Manual steps ask the camera to re-centre on the player.
    pub follow_camera: bool,
    pub degraded: bool,
}

/// The player clicked a cell view.
#[derive(Event, Debug, Clone, Copy)]
pub struct CellClickEvent {
    pub cell: CellId,
}

/// Move the manual source by whole cells.
#[derive(Event, Debug, Clone, Copy)]
pub struct StepRequestEvent {
    pub d_row: i32,
    pub d_col: i32,
}

/// Hot-swap the movement source. `None` toggles.
#[derive(Event, Debug, Clone, Copy)]
pub struct SwitchMovementEvent {
    pub mode: Option<MovementMode>,
}

/// Asks the UI to confirm a reset.
#[derive(Event, Debug, Clone, Copy)]
pub struct NewGameRequestEvent;

/// Confirmed reset: clear persisted state and every in-memory structure.
#[derive(Event, Debug, Clone, Copy)]
pub struct NewGameEvent;

/// A merge reached the win target.
#[derive(Event, Debug, Clone, Copy)]
pub struct WinEvent {
    pub value: TokenValue,
}

/// Re-centre the camera on a position.
#[derive(Event, Debug, Clone, Copy)]
pub struct CameraFollowEvent {
    pub position: GeoPosition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatusKind {
    Info,
    Warning,
    Win,
}

/// One line for the status area.
#[derive(Event, Debug, Clone)]
pub struct StatusEvent {
    pub message: String,
    pub kind: StatusKind,
}

impl StatusEvent {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: StatusKind::Info,
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind: StatusKind::Warning,
        }
    }
}

/// The system that resets the session on `NewGameEvent`. Systems that
/// rebuild state from the session run after it.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct SessionResetSet;

// ═══════════════════════════════════════════════════════════════════════
// RENDER CONSTANTS
// ═══════════════════════════════════════════════════════════════════════

/// World-space pixels per grid cell.
pub const CELL_PIXELS: f32 = 32.0;
pub const Z_CELLS: f32 = 1.0;
pub const Z_LABELS: f32 = 2.0;
pub const Z_PLAYER: f32 = 5.0;
