//! Cell window. Keeps exactly one view per cell inside the visible window.
//!
//! The window is either a square around the player or the camera's visible
//! rectangle plus a margin. `CellWindow::sync` diffs the window against the
//! views that already exist: new cells get a view, surviving cells are
//! refreshed in place, and cells that left are destroyed (and, in
//! memoryless mode, forgotten by the token store).
//!
//! Views are never the source of truth. The `CellViewSink` trait is the only
//! thing that knows how a view is drawn; `render.rs` implements it with
//! sprites, tests implement it with a recorder.

use bevy::prelude::*;
use std::collections::{HashMap, HashSet};
use std::time::Duration;

use crate::debounce::Debounce;
use crate::grid::in_range;
use crate::shared::*;

pub mod render;

pub use render::{CellAppearance, CellLabel, CellView, CommandViewSink, PlayerMarker};

// ═══════════════════════════════════════════════════════════════════════
// WINDOW BOUNDS
// ═══════════════════════════════════════════════════════════════════════

/// Inclusive row/col bounds. `min > max` on either axis means "nothing".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowRange {
    pub min_row: i32,
    pub max_row: i32,
    pub min_col: i32,
    pub max_col: i32,
}

impl WindowRange {
    pub fn around(center: CellId, radius: u32) -> Self {
        let r = i32::try_from(radius).unwrap_or(i32::MAX);
        Self {
            min_row: center.row.saturating_sub(r),
            max_row: center.row.saturating_add(r),
            min_col: center.col.saturating_sub(r),
            max_col: center.col.saturating_add(r),
        }
    }

    /// Cells under the rectangle spanned by two corners, grown by `margin`
    /// cells on every side (a negative margin shrinks it).
    pub fn from_viewport(
        geometry: &GridGeometry,
        south_west: GeoPosition,
        north_east: GeoPosition,
        margin: i32,
    ) -> Self {
        let sw = geometry.to_cell(south_west);
        let ne = geometry.to_cell(north_east);
        Self {
            min_row: sw.row.saturating_sub(margin),
            max_row: ne.row.saturating_add(margin),
            min_col: sw.col.saturating_sub(margin),
            max_col: ne.col.saturating_add(margin),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min_row > self.max_row || self.min_col > self.max_col
    }

    pub fn contains(&self, cell: CellId) -> bool {
        (self.min_row..=self.max_row).contains(&cell.row)
            && (self.min_col..=self.max_col).contains(&cell.col)
    }

    pub fn cell_count(&self) -> u64 {
        if self.is_empty() {
            return 0;
        }
        let rows = (i64::from(self.max_row) - i64::from(self.min_row) + 1) as u64;
        let cols = (i64::from(self.max_col) - i64::from(self.min_col) + 1) as u64;
        rows * cols
    }

    /// Row-major walk. Yields nothing for a malformed range.
    pub fn cells(&self) -> impl Iterator<Item = CellId> + '_ {
        (self.min_row..=self.max_row)
            .flat_map(move |row| (self.min_col..=self.max_col).map(move |col| CellId::new(row, col)))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// VIEW COLLABORATOR
// ═══════════════════════════════════════════════════════════════════════

/// What a cell view shows. Recreating a view from the same visual must look
/// identical.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CellVisual {
    pub value: TokenValue,
    pub in_range: bool,
}

impl CellVisual {
    /// Labels are only shown on occupied cells.
    pub fn label(&self) -> Option<String> {
        (self.value > 0).then(|| self.value.to_string())
    }
}

/// Whatever draws cells. The window manager only ever talks to views
/// through this.
pub trait CellViewSink {
    fn create(&mut self, cell: CellId, bounds: CellBounds) -> Entity;
    fn set_visual(&mut self, view: Entity, visual: CellVisual);
    fn refresh_bounds(&mut self, view: Entity, bounds: CellBounds);
    fn destroy(&mut self, view: Entity);
}

/// Per-sync inputs that aren't owned by the window.
#[derive(Debug, Clone, Copy)]
pub struct SyncContext {
    pub geometry: GridGeometry,
    pub player_cell: CellId,
    pub interaction_radius: u32,
    pub memoryless: bool,
}

impl SyncContext {
    pub fn new(config: &GameConfig, player_cell: CellId) -> Self {
        Self {
            geometry: config.geometry(),
            player_cell,
            interaction_radius: config.interaction_radius,
            memoryless: config.memoryless,
        }
    }

    pub fn visual(&self, tokens: &TokenStore, cell: CellId) -> CellVisual {
        CellVisual {
            value: tokens.effective_value(cell),
            in_range: in_range(cell, self.player_cell, self.interaction_radius),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncReport {
    pub created: usize,
    pub refreshed: usize,
    pub destroyed: usize,
    pub evicted: usize,
}

// ═══════════════════════════════════════════════════════════════════════
// WINDOW MANAGER
// ═══════════════════════════════════════════════════════════════════════

/// Owns the live set of cell views.
#[derive(Resource, Debug)]
pub struct CellWindow {
    views: HashMap<CellId, Entity>,
    last_range: Option<WindowRange>,
    resync: Debounce,
}

impl Default for CellWindow {
    fn default() -> Self {
        Self::new(Duration::from_millis(16))
    }
}

impl CellWindow {
    pub fn new(throttle: Duration) -> Self {
        let mut resync = Debounce::throttle(throttle);
        // Nothing is drawn yet.
        resync.trigger();
        Self {
            views: HashMap::new(),
            last_range: None,
            resync,
        }
    }

    pub fn len(&self) -> usize {
        self.views.len()
    }

    pub fn is_empty(&self) -> bool {
        self.views.is_empty()
    }

    pub fn view(&self, cell: CellId) -> Option<Entity> {
        self.views.get(&cell).copied()
    }

    pub fn contains(&self, cell: CellId) -> bool {
        self.views.contains_key(&cell)
    }

    pub fn last_range(&self) -> Option<WindowRange> {
        self.last_range
    }

    /// Coalesced: many requests in one burst produce one sync.
    pub fn request_resync(&mut self) {
        self.resync.trigger();
    }

    pub fn resync_pending(&self) -> bool {
        self.resync.is_pending()
    }

    pub fn resync_due(&mut self, delta: Duration) -> bool {
        self.resync.tick(delta)
    }

    /// Brings the view set in line with `range`.
    ///
    /// Overrides of cells that leave the window are evicted when the context
    /// is memoryless; the number evicted is reported so callers know whether
    /// the sync mutated game state.
    pub fn sync(
        &mut self,
        range: WindowRange,
        ctx: &SyncContext,
        tokens: &mut TokenStore,
        sink: &mut impl CellViewSink,
    ) -> SyncReport {
        let mut report = SyncReport::default();
        let mut stale: HashSet<CellId> = self.views.keys().copied().collect();

        for cell in range.cells() {
            stale.remove(&cell);
            let bounds = ctx.geometry.bounds(cell);
            let view = match self.views.get(&cell) {
                Some(&view) => {
                    sink.refresh_bounds(view, bounds);
                    report.refreshed += 1;
                    view
                }
                None => {
                    let view = sink.create(cell, bounds);
                    self.views.insert(cell, view);
                    report.created += 1;
                    view
                }
            };
            sink.set_visual(view, ctx.visual(tokens, cell));
        }

        for cell in stale {
            if let Some(view) = self.views.remove(&cell) {
                sink.destroy(view);
                report.destroyed += 1;
            }
            if ctx.memoryless && tokens.evict(cell) {
                report.evicted += 1;
            }
        }

        self.last_range = Some(range);
        report
    }

    /// Re-pushes one cell's visual after a state change. Returns `false`
    /// when the cell has no live view.
    pub fn refresh_cell(
        &self,
        cell: CellId,
        ctx: &SyncContext,
        tokens: &TokenStore,
        sink: &mut impl CellViewSink,
    ) -> bool {
        match self.views.get(&cell) {
            Some(&view) => {
                sink.set_visual(view, ctx.visual(tokens, cell));
                true
            }
            None => false,
        }
    }

    /// Destroys every view without touching the token store.
    pub fn clear(&mut self, sink: &mut impl CellViewSink) -> usize {
        let count = self.views.len();
        for (_, view) in self.views.drain() {
            sink.destroy(view);
        }
        self.last_range = None;
        count
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

/// The camera's visible rectangle in geo coordinates, refreshed whenever
/// the camera moves or the window resizes.
#[derive(Resource, Debug, Clone, Copy, Default, PartialEq)]
pub struct Viewport {
    pub south_west: GeoPosition,
    pub north_east: GeoPosition,
    pub known: bool,
}

pub struct CellWindowPlugin;

impl Plugin for CellWindowPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<Viewport>()
            .add_systems(Startup, (render::spawn_player_marker, init_cell_window))
            .add_systems(
                Update,
                (
                    render::follow_camera,
                    render::track_viewport,
                    sync_cell_window,
                    render::apply_cell_appearance,
                    render::move_player_marker,
                )
                    .chain()
                    .in_set(WindowSet)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Update, reset_window_on_new_game);
    }
}

/// Everything that renders the window. Movement runs before it and
/// crafting runs after it.
#[derive(SystemSet, Debug, Clone, PartialEq, Eq, Hash)]
pub struct WindowSet;

fn init_cell_window(mut commands: Commands, config: Res<GameConfig>) {
    commands.insert_resource(CellWindow::new(Duration::from_millis(
        config.resync_throttle_ms,
    )));
}

/// The window range the configured strategy currently asks for.
pub fn current_range(config: &GameConfig, player_cell: CellId, viewport: &Viewport) -> WindowRange {
    match config.window {
        WindowStrategy::PlayerRadius { radius } => WindowRange::around(player_cell, radius),
        WindowStrategy::Viewport { margin } if viewport.known => WindowRange::from_viewport(
            &config.geometry(),
            viewport.south_west,
            viewport.north_east,
            margin,
        ),
        // No camera yet: fall back to a small square so the player sees
        // something on the first frame.
        WindowStrategy::Viewport { margin } => {
            WindowRange::around(player_cell, margin.unsigned_abs().max(1))
        }
    }
}

fn sync_cell_window(
    mut commands: Commands,
    time: Res<Time>,
    config: Res<GameConfig>,
    viewport: Res<Viewport>,
    mut window: ResMut<CellWindow>,
    mut session: ResMut<Session>,
) {
    if session.is_changed() {
        // Player moved or a value changed: reachability may differ.
        window.request_resync();
    }
    if !window.resync_due(time.delta()) {
        return;
    }

    let ctx = SyncContext::new(&config, session.player_cell);
    let range = current_range(&config, session.player_cell, &viewport);
    let mut sink = CommandViewSink::new(&mut commands, ctx.geometry);

    // Only evictions mutate the session here; don't let a plain redraw
    // look like a change to the save scheduler.
    let report = window.sync(
        range,
        &ctx,
        &mut session.bypass_change_detection().tokens,
        &mut sink,
    );
    if report.evicted > 0 {
        session.set_changed();
    }
    debug!(
        "cell window sync {:?}: +{} ~{} -{} evicted {}",
        range, report.created, report.refreshed, report.destroyed, report.evicted
    );
}

fn reset_window_on_new_game(
    mut commands: Commands,
    config: Res<GameConfig>,
    mut events: EventReader<NewGameEvent>,
    window: Option<ResMut<CellWindow>>,
) {
    if events.read().last().is_none() {
        return;
    }
    let Some(mut window) = window else {
        return;
    };
    let mut sink = CommandViewSink::new(&mut commands, config.geometry());
    let cleared = window.clear(&mut sink);
    window.request_resync();
    info!("New game: cleared {} cell views", cleared);
}
