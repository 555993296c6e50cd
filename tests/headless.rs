//! Headless integration tests for GeoMerge.
//!
//! These tests exercise the game's ECS logic without a window or GPU.
//! They use Bevy's `MinimalPlugins` with a fixed frame time, an in-memory
//! save slot and a scripted location feed, and verify that position
//! updates, the cell window, clicks, wins, mode switches and persistence
//! work together.
//!
//! Run with: `cargo test --test headless`

use bevy::prelude::*;
use bevy::state::app::StatesPlugin;
use bevy::time::TimeUpdateStrategy;
use std::time::Duration;

use geomerge::crafting::CraftingPlugin;
use geomerge::movement::{LocationProviderFactory, MovementPlugin, ScriptedFeed, UnavailableLocation};
use geomerge::save::{decode, MemoryStorage, Persistence, SavePlugin, SaveScheduler};
use geomerge::shared::*;
use geomerge::ui::UiPlugin;
use geomerge::window::{CellView, CellWindow, CellWindowPlugin, WindowRange};

// ─────────────────────────────────────────────────────────────────────────────
// Test App Builder
// ─────────────────────────────────────────────────────────────────────────────

const FRAME: Duration = Duration::from_millis(20);

/// Every `WinEvent` seen so far.
#[derive(Resource, Default)]
struct SeenWins(Vec<TokenValue>);

fn record_wins(mut events: EventReader<WinEvent>, mut seen: ResMut<SeenWins>) {
    seen.0.extend(events.read().map(|w| w.value));
}

/// Builds the game without rendering, windowing or hardware input. Each
/// update advances the clock by exactly `FRAME`.
fn build_test_app(
    config: GameConfig,
    storage: MemoryStorage,
    providers: LocationProviderFactory,
) -> App {
    let mut app = App::new();
    app.add_plugins(MinimalPlugins);
    app.add_plugins(StatesPlugin);
    app.insert_resource(TimeUpdateStrategy::ManualDuration(FRAME));

    app.init_state::<GameState>();
    app.insert_resource(config)
        .insert_resource(Persistence::new(storage))
        .insert_resource(providers)
        .init_resource::<SeenWins>();

    app.add_plugins(MovementPlugin)
        .add_plugins(CellWindowPlugin)
        .add_plugins(CraftingPlugin)
        .add_plugins(SavePlugin)
        .add_plugins(UiPlugin);

    app.add_systems(Update, record_wins);
    app
}

fn default_app() -> (App, MemoryStorage) {
    let storage = MemoryStorage::default();
    let app = build_test_app(
        GameConfig::default(),
        storage.clone(),
        LocationProviderFactory::default(),
    );
    (app, storage)
}

/// Restore → Playing → first position → first window sync.
fn boot(app: &mut App) {
    for _ in 0..4 {
        app.update();
    }
}

fn run_frames(app: &mut App, frames: usize) {
    for _ in 0..frames {
        app.update();
    }
}

fn session(app: &App) -> &Session {
    app.world().resource::<Session>()
}

fn view_count(app: &mut App) -> usize {
    let mut query = app.world_mut().query::<&CellView>();
    query.iter(app.world()).count()
}

/// Sets a cell without marking the session changed, as if it had always
/// been part of the world.
fn seed_cell(app: &mut App, cell: CellId, value: TokenValue) {
    app.world_mut()
        .resource_mut::<Session>()
        .bypass_change_detection()
        .tokens
        .set_value(cell, value);
}

fn click(app: &mut App, cell: CellId) {
    app.world_mut().send_event(CellClickEvent { cell });
    app.update();
}

// ─────────────────────────────────────────────────────────────────────────────
// Boot & window
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_boot_enters_playing_with_fresh_session() {
    let (mut app, storage) = default_app();
    boot(&mut app);

    assert_eq!(
        app.world().resource::<State<GameState>>().get(),
        &GameState::Playing
    );
    let s = session(&app);
    assert_eq!(s.player_cell, CellId::ORIGIN);
    assert_eq!(s.held, Held::Empty);
    assert!(s.tokens.is_empty());
    assert_eq!(storage.contents(), None, "nothing to save before the player acts");
}

#[test]
fn test_window_spawns_one_view_per_cell_around_player() {
    let (mut app, _) = default_app();
    boot(&mut app);

    // Default strategy: radius 8 → 17 × 17.
    assert_eq!(app.world().resource::<CellWindow>().len(), 289);
    assert_eq!(view_count(&mut app), 289);

    run_frames(&mut app, 5);
    assert_eq!(view_count(&mut app), 289, "idle frames create nothing");
}

#[test]
fn test_manual_step_moves_player_and_shifts_window() {
    let (mut app, _) = default_app();
    boot(&mut app);

    app.world_mut().send_event(StepRequestEvent { d_row: 0, d_col: 1 });
    run_frames(&mut app, 3);

    assert_eq!(session(&app).player_cell, CellId::new(0, 1));
    let geometry = app.world().resource::<GameConfig>().geometry();
    let position = app.world().resource::<PlayerPosition>().0;
    assert_eq!(geometry.to_cell(position), CellId::new(0, 1));

    let window = app.world().resource::<CellWindow>();
    assert!(window.contains(CellId::new(0, 9)));
    assert!(!window.contains(CellId::new(0, -8)));
    assert_eq!(view_count(&mut app), 289);
}

#[test]
fn test_viewport_window_follows_the_camera() {
    let config = GameConfig {
        window: WindowStrategy::Viewport { margin: 1 },
        ..GameConfig::default()
    };
    let mut app = build_test_app(config, MemoryStorage::default(), LocationProviderFactory::default());
    // 80 × 80 pixels is two and a half cells across.
    let camera = app
        .world_mut()
        .spawn((
            Camera2d,
            OrthographicProjection {
                area: Rect::new(-40.0, -40.0, 40.0, 40.0),
                ..OrthographicProjection::default_2d()
            },
            Transform::default(),
        ))
        .id();
    boot(&mut app);

    // The camera snapped to the centre of the origin cell.
    let home = WindowRange { min_row: -2, max_row: 2, min_col: -2, max_col: 2 };
    assert_eq!(app.world().resource::<CellWindow>().last_range(), Some(home));
    assert_eq!(view_count(&mut app), 25);

    // Pan two cells east.
    app.world_mut()
        .get_mut::<Transform>(camera)
        .expect("camera has a transform")
        .translation
        .x += 64.0;
    app.update();

    let panned = WindowRange { min_row: -2, max_row: 2, min_col: 0, max_col: 4 };
    assert_eq!(app.world().resource::<CellWindow>().last_range(), Some(panned));
    assert!(app.world().resource::<CellWindow>().contains(CellId::new(0, 4)));
    assert!(!app.world().resource::<CellWindow>().contains(CellId::new(0, -1)));
    assert_eq!(session(&app).player_cell, CellId::ORIGIN);
}

#[test]
fn test_memoryless_window_forgets_cells_left_behind() {
    let (mut app, _) = default_app();
    boot(&mut app);
    let edge = CellId::new(0, -8);
    seed_cell(&mut app, edge, 1024);

    app.world_mut().send_event(StepRequestEvent { d_row: 0, d_col: 1 });
    run_frames(&mut app, 3);

    assert!(!session(&app).tokens.has_override(edge));

    app.world_mut().send_event(StepRequestEvent { d_row: 0, d_col: -1 });
    run_frames(&mut app, 3);
    let s = session(&app);
    assert_eq!(s.tokens.effective_value(edge), s.tokens.source().value_at(edge));
}

// ─────────────────────────────────────────────────────────────────────────────
// Crafting
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_click_picks_up_and_places() {
    let (mut app, _) = default_app();
    boot(&mut app);
    let from = CellId::new(1, 1);
    let to = CellId::new(-1, 2);
    seed_cell(&mut app, from, 4);
    seed_cell(&mut app, to, 0);

    click(&mut app, from);
    assert_eq!(session(&app).held, Held::Holding(4));
    assert_eq!(session(&app).tokens.effective_value(from), 0);

    click(&mut app, to);
    assert_eq!(session(&app).held, Held::Empty);
    assert_eq!(session(&app).tokens.effective_value(to), 4);
}

#[test]
fn test_out_of_range_click_is_a_no_op() {
    let (mut app, _) = default_app();
    boot(&mut app);
    let far = CellId::new(0, 4);
    seed_cell(&mut app, far, 8);

    click(&mut app, far);
    assert_eq!(session(&app).held, Held::Empty);
    assert_eq!(session(&app).tokens.effective_value(far), 8);
}

#[test]
fn test_merge_reaching_target_fires_one_win() {
    let storage = MemoryStorage::default();
    let config = GameConfig {
        win_target: 8,
        ..GameConfig::default()
    };
    let mut app = build_test_app(config, storage, LocationProviderFactory::default());
    boot(&mut app);

    let a = CellId::new(0, 1);
    let b = CellId::new(1, 0);
    let c = CellId::new(1, 1);
    seed_cell(&mut app, a, 4);
    seed_cell(&mut app, b, 4);
    seed_cell(&mut app, c, 0);

    click(&mut app, a);
    click(&mut app, b);
    assert_eq!(session(&app).held, Held::Holding(8));
    assert!(session(&app).won);

    // Putting the 8 down is not another win.
    click(&mut app, c);
    run_frames(&mut app, 2);
    assert_eq!(app.world().resource::<SeenWins>().0, vec![8]);
}

// ─────────────────────────────────────────────────────────────────────────────
// Persistence
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_change_is_saved_after_quiet_period_and_restored() {
    let (mut app, storage) = default_app();
    boot(&mut app);
    let cell = CellId::new(2, -1);
    seed_cell(&mut app, cell, 16);

    click(&mut app, cell);
    run_frames(&mut app, 3);
    assert_eq!(storage.contents(), None, "still inside the debounce window");
    assert!(app.world().resource::<SaveScheduler>().is_pending());

    run_frames(&mut app, 20);
    assert!(!app.world().resource::<SaveScheduler>().is_pending());
    let json = storage.contents().expect("debounced save landed");
    let snapshot = decode(&json).unwrap();
    assert_eq!(snapshot.inventory.map(|slot| slot.value), Some(16));

    // A second app on the same slot resumes the session.
    let mut resumed = build_test_app(
        GameConfig::default(),
        storage.clone(),
        LocationProviderFactory::default(),
    );
    boot(&mut resumed);
    assert_eq!(session(&resumed).held, Held::Holding(16));
    assert_eq!(session(&resumed).tokens.effective_value(cell), 0);
}

#[test]
fn test_ignored_clicks_do_not_save() {
    let (mut app, storage) = default_app();
    boot(&mut app);
    let empty = CellId::new(1, 0);
    seed_cell(&mut app, empty, 0);

    click(&mut app, empty);
    click(&mut app, CellId::new(50, 50));
    run_frames(&mut app, 20);
    assert_eq!(storage.contents(), None);
}

#[test]
fn test_corrupt_save_starts_fresh() {
    let storage = MemoryStorage::with_contents(r#"{"version":1,"snapshot":{"tokens":"nope"}}"#);
    let mut app = build_test_app(
        GameConfig::default(),
        storage,
        LocationProviderFactory::default(),
    );
    boot(&mut app);
    assert_eq!(
        app.world().resource::<State<GameState>>().get(),
        &GameState::Playing
    );
    assert!(session(&app).tokens.is_empty());
    assert_eq!(session(&app).held, Held::Empty);
}

#[test]
fn test_confirmed_new_game_clears_save_and_session() {
    let (mut app, storage) = default_app();
    boot(&mut app);
    let cell = CellId::new(0, 1);
    seed_cell(&mut app, cell, 2);
    click(&mut app, cell);
    app.world_mut().send_event(StepRequestEvent { d_row: 1, d_col: 0 });
    run_frames(&mut app, 20);
    assert!(storage.contents().is_some());

    // One request only arms the confirmation.
    app.world_mut().send_event(NewGameRequestEvent);
    run_frames(&mut app, 2);
    assert_eq!(session(&app).held, Held::Holding(2));

    app.world_mut().send_event(NewGameRequestEvent);
    run_frames(&mut app, 4);
    let s = session(&app);
    assert_eq!(s.held, Held::Empty);
    assert!(s.tokens.is_empty());
    assert_eq!(s.player_cell, CellId::ORIGIN);
    assert_eq!(storage.contents(), None);
}

// ─────────────────────────────────────────────────────────────────────────────
// Movement sources
// ─────────────────────────────────────────────────────────────────────────────

#[test]
fn test_switch_to_tracking_follows_scripted_feed() {
    let feed = ScriptedFeed::default();
    let config = GameConfig::default();
    let geometry = config.geometry();
    let mut app = build_test_app(
        config,
        MemoryStorage::default(),
        LocationProviderFactory::scripted(feed.clone()),
    );
    boot(&mut app);

    feed.push_fix(geometry.center(CellId::new(5, 5)));
    app.world_mut().send_event(SwitchMovementEvent {
        mode: Some(MovementMode::Tracking),
    });
    run_frames(&mut app, 3);

    let s = session(&app);
    assert_eq!(s.movement_mode, MovementMode::Tracking);
    assert_eq!(s.player_cell, CellId::new(5, 5));
    assert!(!app.world().resource::<LocationStatus>().degraded);

    // Steps are refused while tracking.
    app.world_mut().send_event(StepRequestEvent { d_row: 1, d_col: 0 });
    run_frames(&mut app, 2);
    assert_eq!(session(&app).player_cell, CellId::new(5, 5));

    // Back to manual: stepping resumes from where tracking left off.
    app.world_mut().send_event(SwitchMovementEvent { mode: None });
    run_frames(&mut app, 2);
    app.world_mut().send_event(StepRequestEvent { d_row: 1, d_col: 0 });
    run_frames(&mut app, 2);
    assert_eq!(session(&app).player_cell, CellId::new(6, 5));
    assert_eq!(session(&app).movement_mode, MovementMode::Manual);
}

#[test]
fn test_unavailable_location_degrades_to_fallback() {
    let config = GameConfig::default();
    let fallback_cell = config.geometry().to_cell(config.fallback_position);
    let mut app = build_test_app(
        config,
        MemoryStorage::default(),
        LocationProviderFactory::new(|| Box::new(UnavailableLocation)),
    );
    boot(&mut app);
    app.world_mut().send_event(StepRequestEvent { d_row: 3, d_col: 0 });
    run_frames(&mut app, 2);
    assert_eq!(session(&app).player_cell, CellId::new(3, 0));

    app.world_mut().send_event(SwitchMovementEvent {
        mode: Some(MovementMode::Tracking),
    });
    run_frames(&mut app, 3);

    assert!(app.world().resource::<LocationStatus>().degraded);
    assert_eq!(session(&app).player_cell, fallback_cell);
}
