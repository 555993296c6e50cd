//! Movement sources: where the player's position comes from.
//!
//! Exactly one source is active at a time. Sources push positions into a
//! crossbeam channel; the plugin drains it once per frame and turns each
//! update into a `PositionUpdateEvent`, so game state is only ever touched
//! from systems.

use bevy::prelude::*;
use crossbeam_channel::{unbounded, Receiver, Sender};

pub mod location;
mod manual;
mod tracking;

pub use location::{
    LocationError, LocationProvider, LocationReport, ScriptedFeed, ScriptedLocation,
    UnavailableLocation, WatchId,
};
pub use manual::ManualMovement;
pub use tracking::TrackingMovement;

use crate::shared::*;
use crate::window::WindowSet;

/// A position feed the game can start, stop and listen to.
pub trait MovementSource: Send + Sync {
    fn mode(&self) -> MovementMode;

    /// Registers the single listener. A new registration replaces the old.
    fn on_position(&mut self, listener: Sender<PositionUpdateEvent>);

    fn start(&mut self);

    /// Idempotent.
    fn stop(&mut self);

    /// Moves pending reports from the underlying feed to the listener.
    fn poll(&mut self) {}

    /// Sources that can be stepped cell by cell expose it here.
    fn as_stepper(&mut self) -> Option<&mut dyn StepMovement> {
        None
    }
}

pub trait StepMovement {
    /// `dx` moves columns (east), `dy` moves rows (north). Returns the new
    /// cell.
    fn step_by(&mut self, dx: i32, dy: i32) -> CellId;
}

// ═══════════════════════════════════════════════════════════════════════
// ACTIVE SOURCE
// ═══════════════════════════════════════════════════════════════════════

#[derive(Resource)]
pub struct ActiveMovement {
    source: Box<dyn MovementSource>,
    sender: Sender<PositionUpdateEvent>,
    updates: Receiver<PositionUpdateEvent>,
}

impl ActiveMovement {
    pub fn new(mut source: Box<dyn MovementSource>) -> Self {
        let (sender, updates) = unbounded();
        source.on_position(sender.clone());
        source.start();
        Self {
            source,
            sender,
            updates,
        }
    }

    pub fn mode(&self) -> MovementMode {
        self.source.mode()
    }

    /// Stops the current source before the new one starts. Updates the old
    /// source queued but nobody drained are dropped.
    pub fn swap(&mut self, mut next: Box<dyn MovementSource>) {
        self.source.stop();
        let dropped = self.updates.try_iter().count();
        if dropped > 0 {
            debug!("dropped {} stale position updates on source swap", dropped);
        }
        next.on_position(self.sender.clone());
        next.start();
        self.source = next;
    }

    pub fn step_by(&mut self, dx: i32, dy: i32) -> Option<CellId> {
        self.source.as_stepper().map(|stepper| stepper.step_by(dx, dy))
    }

    pub fn drain(&mut self) -> Vec<PositionUpdateEvent> {
        self.source.poll();
        self.updates.try_iter().collect()
    }

    pub fn stop(&mut self) {
        self.source.stop();
    }
}

/// Builds the live-location provider for tracking mode. Replaced in tests
/// and demos with a scripted feed.
#[derive(Resource)]
pub struct LocationProviderFactory(pub Box<dyn Fn() -> Box<dyn LocationProvider> + Send + Sync>);

impl LocationProviderFactory {
    pub fn new(make: impl Fn() -> Box<dyn LocationProvider> + Send + Sync + 'static) -> Self {
        Self(Box::new(make))
    }

    pub fn scripted(feed: ScriptedFeed) -> Self {
        Self::new(move || Box::new(ScriptedLocation::from_feed(feed.clone())))
    }

    pub fn make(&self) -> Box<dyn LocationProvider> {
        (self.0)()
    }
}

impl Default for LocationProviderFactory {
    fn default() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self::new(|| Box::new(location::BrowserGeolocation))
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::new(|| Box::new(UnavailableLocation))
        }
    }
}

pub fn build_source(
    mode: MovementMode,
    config: &GameConfig,
    player_cell: CellId,
    providers: &LocationProviderFactory,
) -> Box<dyn MovementSource> {
    match mode {
        MovementMode::Manual => Box::new(ManualMovement::new(config.geometry(), player_cell)),
        MovementMode::Tracking => Box::new(TrackingMovement::new(
            providers.make(),
            config.fallback_position,
        )),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct MovementPlugin;

impl Plugin for MovementPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<LocationProviderFactory>()
            .init_resource::<PlayerPosition>()
            .init_resource::<LocationStatus>()
            .add_event::<PositionUpdateEvent>()
            .add_event::<StepRequestEvent>()
            .add_event::<SwitchMovementEvent>()
            .add_event::<CameraFollowEvent>()
            .add_event::<StatusEvent>()
            .add_systems(OnEnter(GameState::Playing), start_movement)
            .add_systems(
                Update,
                (
                    reset_movement_on_new_game,
                    handle_switch_movement,
                    handle_step_requests,
                    drain_position_updates,
                    apply_position_updates,
                )
                    .chain()
                    .after(SessionResetSet)
                    .before(WindowSet)
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Last, stop_movement_on_exit);
    }
}

/// Starts the source the restored session was using.
fn start_movement(
    mut commands: Commands,
    config: Res<GameConfig>,
    session: Res<Session>,
    providers: Res<LocationProviderFactory>,
) {
    let source = build_source(session.movement_mode, &config, session.player_cell, &providers);
    info!("Movement: starting in {} mode", session.movement_mode.label());
    commands.insert_resource(ActiveMovement::new(source));
}

fn reset_movement_on_new_game(
    config: Res<GameConfig>,
    providers: Res<LocationProviderFactory>,
    mut events: EventReader<NewGameEvent>,
    active: Option<ResMut<ActiveMovement>>,
) {
    if events.read().last().is_none() {
        return;
    }
    let Some(mut active) = active else {
        return;
    };
    let origin = config.geometry().to_cell(config.origin);
    active.swap(build_source(config.default_movement, &config, origin, &providers));
}

pub fn handle_switch_movement(
    config: Res<GameConfig>,
    providers: Res<LocationProviderFactory>,
    mut events: EventReader<SwitchMovementEvent>,
    mut session: ResMut<Session>,
    mut status: ResMut<LocationStatus>,
    mut messages: EventWriter<StatusEvent>,
    active: Option<ResMut<ActiveMovement>>,
) {
    let Some(mut active) = active else {
        return;
    };
    for event in events.read() {
        let current = active.mode();
        let target = event.mode.unwrap_or(current.toggled());
        if target == current {
            continue;
        }
        // Manual picks up wherever the player currently stands.
        active.swap(build_source(target, &config, session.player_cell, &providers));
        session.movement_mode = target;
        if status.degraded {
            status.degraded = false;
        }
        info!("Movement: switched to {} mode", target.label());
        messages.send(StatusEvent::info(format!("Movement: {}", target.label())));
    }
}

pub fn handle_step_requests(
    mut events: EventReader<StepRequestEvent>,
    mut messages: EventWriter<StatusEvent>,
    active: Option<ResMut<ActiveMovement>>,
) {
    let Some(mut active) = active else {
        return;
    };
    let mut refused = false;
    for event in events.read() {
        if active.step_by(event.d_col, event.d_row).is_none() {
            refused = true;
        }
    }
    if refused {
        messages.send(StatusEvent::info("Switch to manual mode to step"));
    }
}

fn drain_position_updates(
    active: Option<ResMut<ActiveMovement>>,
    mut updates: EventWriter<PositionUpdateEvent>,
) {
    let Some(mut active) = active else {
        return;
    };
    for update in active.drain() {
        updates.send(update);
    }
}

/// Moves the player. Only a change of cell touches the session.
pub fn apply_position_updates(
    config: Res<GameConfig>,
    mut events: EventReader<PositionUpdateEvent>,
    mut session: ResMut<Session>,
    mut position: ResMut<PlayerPosition>,
    mut status: ResMut<LocationStatus>,
    mut follow: EventWriter<CameraFollowEvent>,
    mut messages: EventWriter<StatusEvent>,
) {
    let geometry = config.geometry();
    for update in events.read() {
        position.0 = update.position;

        if status.degraded != update.degraded {
            status.degraded = update.degraded;
            if update.degraded {
                messages.send(StatusEvent::warning(
                    "Live location unavailable; showing the default anchor",
                ));
            }
        }

        let cell = geometry.to_cell(update.position);
        if session.player_cell != cell {
            session.player_cell = cell;
        }
        if update.follow_camera {
            follow.send(CameraFollowEvent {
                position: update.position,
            });
        }
    }
}

fn stop_movement_on_exit(mut exits: EventReader<AppExit>, active: Option<ResMut<ActiveMovement>>) {
    if exits.read().last().is_none() {
        return;
    }
    if let Some(mut active) = active {
        active.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manual_at(cell: CellId) -> Box<dyn MovementSource> {
        Box::new(ManualMovement::new(GridGeometry::default(), cell))
    }

    #[test]
    fn test_new_active_source_emits_first_position() {
        let mut active = ActiveMovement::new(manual_at(CellId::new(4, 4)));
        let updates = active.drain();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            GridGeometry::default().to_cell(updates[0].position),
            CellId::new(4, 4)
        );
    }

    #[test]
    fn test_step_requires_stepper_capability() {
        let config = GameConfig::default();
        let providers = LocationProviderFactory::default();
        let mut active = ActiveMovement::new(build_source(
            MovementMode::Tracking,
            &config,
            CellId::ORIGIN,
            &providers,
        ));
        assert_eq!(active.step_by(1, 0), None);

        active.swap(manual_at(CellId::ORIGIN));
        assert_eq!(active.step_by(1, 0), Some(CellId::new(0, 1)));
    }

    #[test]
    fn test_swap_drops_stale_updates_and_reseeds() {
        let mut active = ActiveMovement::new(manual_at(CellId::ORIGIN));
        // Not drained: the old source's first position is stale.
        active.swap(manual_at(CellId::new(9, 9)));
        let updates = active.drain();
        assert_eq!(updates.len(), 1);
        assert_eq!(
            GridGeometry::default().to_cell(updates[0].position),
            CellId::new(9, 9)
        );
        assert_eq!(active.mode(), MovementMode::Manual);
    }

    #[test]
    fn test_swap_stops_the_old_tracking_watch() {
        let feed = ScriptedFeed::default();
        let providers = LocationProviderFactory::scripted(feed.clone());
        let config = GameConfig::default();
        let mut active = ActiveMovement::new(build_source(
            MovementMode::Tracking,
            &config,
            CellId::ORIGIN,
            &providers,
        ));
        active.swap(manual_at(CellId::ORIGIN));
        let _ = active.drain();

        feed.push_fix(GeoPosition::new(50.0, 50.0));
        assert!(active.drain().is_empty());
        assert_eq!(feed.pending(), 1);
    }

    #[test]
    fn test_unavailable_tracking_falls_back_to_config_anchor() {
        let config = GameConfig::default();
        let mut active = ActiveMovement::new(build_source(
            MovementMode::Tracking,
            &config,
            CellId::new(7, 7),
            &LocationProviderFactory::new(|| Box::new(UnavailableLocation)),
        ));
        let updates = active.drain();
        assert_eq!(updates.len(), 1);
        assert!(updates[0].degraded);
        assert_eq!(updates[0].position, config.fallback_position);
    }
}
