mod confirm;
mod hud;
mod toast;

use bevy::prelude::*;
use crate::shared::*;

pub use confirm::NewGameConfirm;
pub use hud::{hud_lines, HudButton, HudLines};

pub struct UiPlugin;

impl Plugin for UiPlugin {
    fn build(&self, app: &mut App) {
        app.init_resource::<NewGameConfirm>()
            .init_resource::<crate::input::PlayerInput>()
            .init_resource::<crate::input::UiHovered>()
            .add_event::<StatusEvent>()
            .add_event::<NewGameRequestEvent>()
            .add_event::<NewGameEvent>();

        // ─── HUD + TOASTS: visible during Playing ───
        app.add_systems(
            OnEnter(GameState::Playing),
            (hud::spawn_hud, toast::spawn_toast_container),
        );
        app.add_systems(
            OnExit(GameState::Playing),
            (hud::despawn_hud, toast::despawn_toast_container),
        );
        app.add_systems(
            Update,
            (
                hud::track_ui_hover,
                hud::handle_hud_buttons,
                confirm::handle_new_game_confirmation,
                hud::update_hud_text,
                toast::handle_status_events,
                toast::update_toasts,
            )
                .chain()
                .run_if(in_state(GameState::Playing)),
        );
    }
}
