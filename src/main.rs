mod shared;
mod grid;
mod tokens;
mod debounce;
mod config;
mod input;
mod window;
mod crafting;
mod movement;
mod save;
mod ui;

use bevy::prelude::*;
use bevy::window::{PresentMode, WindowResolution};

use shared::*;

const SCREEN_WIDTH: f32 = 960.0;
const SCREEN_HEIGHT: f32 = 720.0;

fn main() {
    let config = config::load_game_config();

    App::new()
        .add_plugins(DefaultPlugins.set(WindowPlugin {
            primary_window: Some(Window {
                title: "GeoMerge".into(),
                resolution: WindowResolution::new(SCREEN_WIDTH, SCREEN_HEIGHT),
                present_mode: PresentMode::AutoVsync,
                resizable: true,
                ..default()
            }),
            ..default()
        }))
        // Game state
        .init_state::<GameState>()
        // Shared resources
        .insert_resource(config)
        // Events
        .add_event::<PositionUpdateEvent>()
        .add_event::<CellClickEvent>()
        .add_event::<StepRequestEvent>()
        .add_event::<SwitchMovementEvent>()
        .add_event::<NewGameRequestEvent>()
        .add_event::<NewGameEvent>()
        .add_event::<WinEvent>()
        .add_event::<CameraFollowEvent>()
        .add_event::<StatusEvent>()
        // Domain plugins
        .add_plugins(input::InputPlugin)
        .add_plugins(movement::MovementPlugin)
        .add_plugins(window::CellWindowPlugin)
        .add_plugins(crafting::CraftingPlugin)
        .add_plugins(save::SavePlugin)
        .add_plugins(ui::UiPlugin)
        // Camera
        .add_systems(Startup, setup_camera)
        .run();
}

fn setup_camera(mut commands: Commands) {
    commands.spawn(Camera2d);
}
