use bevy::prelude::*;
use bevy::window::PrimaryWindow;

use crate::shared::*;

pub struct InputPlugin;

impl Plugin for InputPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<KeyBindings>()
            .init_resource::<PlayerInput>()
            .init_resource::<UiHovered>()
            .add_event::<StepRequestEvent>()
            .add_event::<SwitchMovementEvent>()
            .add_event::<NewGameRequestEvent>()
            .add_event::<CellClickEvent>()
            .add_systems(PreUpdate, reset_and_read_input)
            .add_systems(
                Update,
                (dispatch_input, click_to_cell).run_if(in_state(GameState::Playing)),
            );
    }
}

#[derive(Resource, Debug, Clone)]
pub struct KeyBindings {
    pub step_north: KeyCode,
    pub step_south: KeyCode,
    pub step_west: KeyCode,
    pub step_east: KeyCode,
    pub toggle_mode: KeyCode,
    pub new_game: KeyCode,
    pub confirm: KeyCode,
    pub cancel: KeyCode,
}

impl Default for KeyBindings {
    fn default() -> Self {
        Self {
            step_north: KeyCode::KeyW,
            step_south: KeyCode::KeyS,
            step_west: KeyCode::KeyA,
            step_east: KeyCode::KeyD,
            toggle_mode: KeyCode::KeyT,
            new_game: KeyCode::KeyN,
            confirm: KeyCode::KeyY,
            cancel: KeyCode::Escape,
        }
    }
}

/// This frame's actions, rebuilt from scratch in `PreUpdate`.
#[derive(Resource, Debug, Clone, Default, PartialEq)]
pub struct PlayerInput {
    /// (d_row, d_col) of a one-cell step.
    pub step: Option<(i32, i32)>,
    pub toggle_mode: bool,
    pub new_game: bool,
    pub confirm: bool,
    pub cancel: bool,
    /// Cursor position of a left click, in window coordinates.
    pub click: Option<Vec2>,
}

/// Set by the UI while the pointer is over a button, so the click doesn't
/// fall through to the map.
#[derive(Resource, Debug, Default)]
pub struct UiHovered(pub bool);

/// One step per key press; the first matching direction wins.
pub fn step_from_keys(keys: &ButtonInput<KeyCode>, bindings: &KeyBindings) -> Option<(i32, i32)> {
    let pressed = |binding: KeyCode, arrow: KeyCode| keys.just_pressed(binding) || keys.just_pressed(arrow);
    if pressed(bindings.step_north, KeyCode::ArrowUp) {
        Some((1, 0))
    } else if pressed(bindings.step_south, KeyCode::ArrowDown) {
        Some((-1, 0))
    } else if pressed(bindings.step_west, KeyCode::ArrowLeft) {
        Some((0, -1))
    } else if pressed(bindings.step_east, KeyCode::ArrowRight) {
        Some((0, 1))
    } else {
        None
    }
}

/// The single point where hardware input becomes game actions.
fn reset_and_read_input(
    keys: Res<ButtonInput<KeyCode>>,
    mouse: Res<ButtonInput<MouseButton>>,
    bindings: Res<KeyBindings>,
    windows: Query<&Window, With<PrimaryWindow>>,
    mut input: ResMut<PlayerInput>,
) {
    *input = PlayerInput {
        step: step_from_keys(&keys, &bindings),
        toggle_mode: keys.just_pressed(bindings.toggle_mode),
        new_game: keys.just_pressed(bindings.new_game),
        confirm: keys.just_pressed(bindings.confirm),
        cancel: keys.just_pressed(bindings.cancel),
        click: None,
    };
    if mouse.just_pressed(MouseButton::Left) {
        input.click = windows.get_single().ok().and_then(Window::cursor_position);
    }
}

fn dispatch_input(
    input: Res<PlayerInput>,
    mut steps: EventWriter<StepRequestEvent>,
    mut switches: EventWriter<SwitchMovementEvent>,
    mut new_game: EventWriter<NewGameRequestEvent>,
) {
    if let Some((d_row, d_col)) = input.step {
        steps.send(StepRequestEvent { d_row, d_col });
    }
    if input.toggle_mode {
        switches.send(SwitchMovementEvent { mode: None });
    }
    if input.new_game {
        new_game.send(NewGameRequestEvent);
    }
}

/// Window cursor → world → geo → cell.
fn click_to_cell(
    input: Res<PlayerInput>,
    hovered: Res<UiHovered>,
    config: Res<GameConfig>,
    cameras: Query<(&Camera, &GlobalTransform)>,
    mut clicks: EventWriter<CellClickEvent>,
) {
    let Some(cursor) = input.click else {
        return;
    };
    if hovered.0 {
        return;
    }
    let Ok((camera, camera_transform)) = cameras.get_single() else {
        return;
    };
    let Ok(world) = camera.viewport_to_world_2d(camera_transform, cursor) else {
        return;
    };
    let geometry = config.geometry();
    let cell = geometry.to_cell(geometry.from_world(world));
    clicks.send(CellClickEvent { cell });
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pressed(key: KeyCode) -> ButtonInput<KeyCode> {
        let mut keys = ButtonInput::<KeyCode>::default();
        keys.press(key);
        keys
    }

    #[test]
    fn test_wasd_and_arrows_step_by_one_cell() {
        let bindings = KeyBindings::default();
        assert_eq!(step_from_keys(&pressed(KeyCode::KeyW), &bindings), Some((1, 0)));
        assert_eq!(step_from_keys(&pressed(KeyCode::ArrowDown), &bindings), Some((-1, 0)));
        assert_eq!(step_from_keys(&pressed(KeyCode::KeyA), &bindings), Some((0, -1)));
        assert_eq!(step_from_keys(&pressed(KeyCode::ArrowRight), &bindings), Some((0, 1)));
        assert_eq!(step_from_keys(&pressed(KeyCode::KeyQ), &bindings), None);
    }

    #[test]
    fn test_held_key_steps_only_once() {
        let bindings = KeyBindings::default();
        let mut keys = pressed(KeyCode::KeyD);
        keys.clear();
        assert!(keys.pressed(KeyCode::KeyD));
        assert_eq!(step_from_keys(&keys, &bindings), None);
    }
}
