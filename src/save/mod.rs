use bevy::prelude::*;
use std::time::Duration;

mod codec;
mod storage;

pub use codec::{
    decode, encode, restore, snapshot_of, InventorySlot, LoadRejection, SaveError, Snapshot,
    SAVE_VERSION,
};
#[cfg(not(target_arch = "wasm32"))]
pub use storage::FileStorage;
#[cfg(target_arch = "wasm32")]
pub use storage::LocalStorage;
pub use storage::{MemoryStorage, SaveStorage};

use crate::debounce::Debounce;
use crate::shared::*;

// ═══════════════════════════════════════════════════════════════════════
// PERSISTENCE
// ═══════════════════════════════════════════════════════════════════════

/// The save slot plus the codec. Failures are logged here and never reach
/// gameplay.
#[derive(Resource)]
pub struct Persistence {
    storage: Box<dyn SaveStorage>,
}

impl Persistence {
    pub fn new(storage: impl SaveStorage + 'static) -> Self {
        Self {
            storage: Box::new(storage),
        }
    }

    /// Encodes and writes the session. Returns the encoded size.
    pub fn save(&mut self, session: &Session, config: &GameConfig) -> Result<usize, SaveError> {
        let json = encode(&snapshot_of(session, config), config.save_size_cap)?;
        self.storage.write(&json)?;
        Ok(json.len())
    }

    /// The stored session, or `None` when there is nothing usable.
    pub fn load(&self, config: &GameConfig) -> Option<Session> {
        let json = match self.storage.read() {
            Ok(Some(json)) => json,
            Ok(None) => {
                info!("No save found in {}", self.storage.describe());
                return None;
            }
            Err(e) => {
                warn!("Could not read save from {}: {}", self.storage.describe(), e);
                return None;
            }
        };
        match decode(&json) {
            Ok(snapshot) => Some(restore(&snapshot, config, ValueSource::default())),
            Err(reason) => {
                warn!("Discarding stored save: {}", reason);
                None
            }
        }
    }

    pub fn clear(&mut self) -> Result<(), SaveError> {
        self.storage.clear()
    }

    pub fn describe(&self) -> String {
        self.storage.describe()
    }
}

impl Default for Persistence {
    fn default() -> Self {
        #[cfg(target_arch = "wasm32")]
        {
            Self::new(LocalStorage::default())
        }
        #[cfg(not(target_arch = "wasm32"))]
        {
            Self::new(FileStorage::beside_executable())
        }
    }
}

/// Trailing debounce between a session change and the write.
#[derive(Resource, Debug)]
pub struct SaveScheduler {
    debounce: Debounce,
}

impl SaveScheduler {
    pub fn new(delay: Duration) -> Self {
        Self {
            debounce: Debounce::trailing(delay),
        }
    }

    pub fn is_pending(&self) -> bool {
        self.debounce.is_pending()
    }
}

impl Default for SaveScheduler {
    fn default() -> Self {
        Self::new(Duration::from_millis(250))
    }
}

// ═══════════════════════════════════════════════════════════════════════
// PLUGIN
// ═══════════════════════════════════════════════════════════════════════

pub struct SavePlugin;

impl Plugin for SavePlugin {
    fn build(&self, app: &mut App) {
        // Tests and demos may have installed their own backend already.
        if !app.world().contains_resource::<Persistence>() {
            app.init_resource::<Persistence>();
        }
        app.add_event::<NewGameEvent>()
            .add_systems(OnEnter(GameState::Loading), restore_session)
            .add_systems(
                Update,
                (handle_new_game.in_set(SessionResetSet), schedule_save)
                    .chain()
                    .run_if(in_state(GameState::Playing)),
            )
            .add_systems(Last, flush_save_on_exit);
    }
}

/// Restores the stored session (or starts fresh) and enters play.
fn restore_session(
    mut commands: Commands,
    config: Res<GameConfig>,
    persistence: Res<Persistence>,
    mut next_state: ResMut<NextState<GameState>>,
) {
    let session = match persistence.load(&config) {
        Some(session) => {
            info!(
                "Restored session from {}: {} changed cells, player at {}",
                persistence.describe(),
                session.tokens.len(),
                session.player_cell
            );
            session
        }
        None => Session::new(&config),
    };
    commands.insert_resource(session);
    commands.insert_resource(SaveScheduler::new(Duration::from_millis(
        config.save_debounce_ms,
    )));
    next_state.set(GameState::Playing);
}

fn schedule_save(
    time: Res<Time>,
    config: Res<GameConfig>,
    session: Res<Session>,
    mut scheduler: ResMut<SaveScheduler>,
    mut persistence: ResMut<Persistence>,
) {
    if session.is_changed() && !session.is_added() {
        scheduler.debounce.trigger();
    }
    if scheduler.debounce.tick(time.delta()) {
        write_session(&mut persistence, &session, &config);
    }
}

fn write_session(persistence: &mut Persistence, session: &Session, config: &GameConfig) {
    match persistence.save(session, config) {
        Ok(size) => debug!("Saved session ({} bytes)", size),
        Err(e) => warn!("Save skipped: {}", e),
    }
}

/// Clears the slot and starts over from the origin.
fn handle_new_game(
    config: Res<GameConfig>,
    mut events: EventReader<NewGameEvent>,
    mut session: ResMut<Session>,
    mut scheduler: ResMut<SaveScheduler>,
    mut persistence: ResMut<Persistence>,
) {
    if events.read().last().is_none() {
        return;
    }
    if let Err(e) = persistence.clear() {
        warn!("Could not clear stored save: {}", e);
    }
    scheduler.debounce.cancel();
    // The fresh session isn't worth a save until the player changes it.
    *session.bypass_change_detection() = Session::new(&config);
    info!("New game started");
}

fn flush_save_on_exit(
    mut exits: EventReader<AppExit>,
    config: Res<GameConfig>,
    session: Option<Res<Session>>,
    scheduler: Option<ResMut<SaveScheduler>>,
    persistence: Option<ResMut<Persistence>>,
) {
    if exits.read().last().is_none() {
        return;
    }
    let (Some(session), Some(mut scheduler), Some(mut persistence)) =
        (session, scheduler, persistence)
    else {
        return;
    };
    if scheduler.debounce.flush() {
        write_session(&mut persistence, &session, &config);
    }
}
