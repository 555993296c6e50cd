use bevy::prelude::*;

use crate::input::UiHovered;
use crate::shared::*;

// ═══════════════════════════════════════════════════════════════════════
// COMPONENTS
// ═══════════════════════════════════════════════════════════════════════

#[derive(Component)]
pub struct HudRoot;

#[derive(Component)]
pub struct HudHeldText;

#[derive(Component)]
pub struct HudModeText;

#[derive(Component)]
pub struct HudGoalText;

#[derive(Component)]
pub struct HudCellText;

/// What a HUD button does when pressed.
#[derive(Component, Debug, Clone, Copy, PartialEq, Eq)]
pub enum HudButton {
    Step { d_row: i32, d_col: i32 },
    ToggleMode,
    NewGame,
}

impl HudButton {
    fn label(self) -> &'static str {
        match self {
            HudButton::Step { d_row: 1, .. } => "N",
            HudButton::Step { d_row: -1, .. } => "S",
            HudButton::Step { d_col: -1, .. } => "W",
            HudButton::Step { .. } => "E",
            HudButton::ToggleMode => "Mode",
            HudButton::NewGame => "New game",
        }
    }
}

const BUTTON_IDLE: Color = Color::srgba(0.15, 0.15, 0.18, 0.85);
const BUTTON_HOVER: Color = Color::srgba(0.25, 0.25, 0.30, 0.95);
const BUTTON_PRESSED: Color = Color::srgba(0.35, 0.45, 0.30, 1.0);

// ═══════════════════════════════════════════════════════════════════════
// TEXT
// ═══════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudLines {
    pub held: String,
    pub mode: String,
    pub goal: String,
    pub cell: String,
}

pub fn hud_lines(session: &Session, config: &GameConfig, location: &LocationStatus) -> HudLines {
    let held = match session.held {
        Held::Empty => "Hand: empty".to_string(),
        Held::Holding(v) => format!("Hand: {v}"),
    };
    let mode = if session.movement_mode == MovementMode::Tracking && location.degraded {
        "Mode: tracking (no signal)".to_string()
    } else {
        format!("Mode: {}", session.movement_mode.label())
    };
    let goal = if session.won {
        format!("Goal {} reached!", config.win_target)
    } else {
        format!("Goal: {}", config.win_target)
    };
    HudLines {
        held,
        mode,
        goal,
        cell: format!("Cell {}", session.player_cell),
    }
}

// ═══════════════════════════════════════════════════════════════════════
// SPAWN / DESPAWN
// ═══════════════════════════════════════════════════════════════════════

pub fn spawn_hud(mut commands: Commands) {
    commands
        .spawn((
            HudRoot,
            Node {
                width: Val::Percent(100.0),
                height: Val::Percent(100.0),
                flex_direction: FlexDirection::Column,
                justify_content: JustifyContent::SpaceBetween,
                ..default()
            },
        ))
        .with_children(|parent| {
            // ─── TOP BAR ───
            parent
                .spawn((
                    Node {
                        width: Val::Percent(100.0),
                        height: Val::Px(36.0),
                        flex_direction: FlexDirection::Row,
                        justify_content: JustifyContent::SpaceBetween,
                        align_items: AlignItems::Center,
                        padding: UiRect::axes(Val::Px(12.0), Val::Px(4.0)),
                        ..default()
                    },
                    BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.6)),
                ))
                .with_children(|bar| {
                    hud_text(bar, HudHeldText, Color::srgb(1.0, 0.92, 0.6));
                    hud_text(bar, HudModeText, Color::WHITE);
                    hud_text(bar, HudCellText, Color::srgb(0.75, 0.75, 0.8));
                    hud_text(bar, HudGoalText, Color::srgb(0.6, 1.0, 0.6));
                });

            // ─── BOTTOM BAR: controls ───
            parent
                .spawn(Node {
                    width: Val::Percent(100.0),
                    flex_direction: FlexDirection::Row,
                    justify_content: JustifyContent::Center,
                    column_gap: Val::Px(6.0),
                    padding: UiRect::all(Val::Px(8.0)),
                    ..default()
                })
                .with_children(|bar| {
                    for button in [
                        HudButton::Step { d_row: 1, d_col: 0 },
                        HudButton::Step { d_row: -1, d_col: 0 },
                        HudButton::Step { d_row: 0, d_col: -1 },
                        HudButton::Step { d_row: 0, d_col: 1 },
                        HudButton::ToggleMode,
                        HudButton::NewGame,
                    ] {
                        hud_button(bar, button);
                    }
                });
        });
}

fn hud_text(parent: &mut ChildBuilder, marker: impl Component, color: Color) {
    parent.spawn((
        marker,
        Text::new(""),
        TextFont {
            font_size: 16.0,
            ..default()
        },
        TextColor(color),
    ));
}

fn hud_button(parent: &mut ChildBuilder, button: HudButton) {
    parent
        .spawn((
            button,
            Button,
            Node {
                min_width: Val::Px(36.0),
                height: Val::Px(32.0),
                padding: UiRect::axes(Val::Px(10.0), Val::Px(4.0)),
                justify_content: JustifyContent::Center,
                align_items: AlignItems::Center,
                ..default()
            },
            BackgroundColor(BUTTON_IDLE),
        ))
        .with_children(|b| {
            b.spawn((
                Text::new(button.label()),
                TextFont {
                    font_size: 14.0,
                    ..default()
                },
                TextColor(Color::WHITE),
            ));
        });
}

pub fn despawn_hud(mut commands: Commands, hud_query: Query<Entity, With<HudRoot>>) {
    for entity in &hud_query {
        commands.entity(entity).despawn_recursive();
    }
}

// ═══════════════════════════════════════════════════════════════════════
// UPDATE
// ═══════════════════════════════════════════════════════════════════════

/// Rewrites the HUD text when it no longer matches the session.
#[allow(clippy::type_complexity)]
pub fn update_hud_text(
    session: Res<Session>,
    config: Res<GameConfig>,
    location: Res<LocationStatus>,
    mut texts: ParamSet<(
        Query<&mut Text, With<HudHeldText>>,
        Query<&mut Text, With<HudModeText>>,
        Query<&mut Text, With<HudGoalText>>,
        Query<&mut Text, With<HudCellText>>,
    )>,
) {
    let lines = hud_lines(&session, &config, &location);
    set_text(texts.p0().iter_mut(), &lines.held);
    set_text(texts.p1().iter_mut(), &lines.mode);
    set_text(texts.p2().iter_mut(), &lines.goal);
    set_text(texts.p3().iter_mut(), &lines.cell);
}

fn set_text<'a>(texts: impl Iterator<Item = Mut<'a, Text>>, line: &str) {
    for mut text in texts {
        if text.0 != line {
            text.0 = line.to_string();
        }
    }
}

/// Button presses become the same events the keyboard sends.
pub fn handle_hud_buttons(
    mut buttons: Query<(&Interaction, &HudButton, &mut BackgroundColor), Changed<Interaction>>,
    mut steps: EventWriter<StepRequestEvent>,
    mut switches: EventWriter<SwitchMovementEvent>,
    mut new_game: EventWriter<NewGameRequestEvent>,
) {
    for (interaction, button, mut background) in &mut buttons {
        background.0 = match interaction {
            Interaction::Pressed => BUTTON_PRESSED,
            Interaction::Hovered => BUTTON_HOVER,
            Interaction::None => BUTTON_IDLE,
        };
        if *interaction != Interaction::Pressed {
            continue;
        }
        match *button {
            HudButton::Step { d_row, d_col } => {
                steps.send(StepRequestEvent { d_row, d_col });
            }
            HudButton::ToggleMode => {
                switches.send(SwitchMovementEvent { mode: None });
            }
            HudButton::NewGame => {
                new_game.send(NewGameRequestEvent);
            }
        }
    }
}

/// Keeps map clicks from firing through a button.
pub fn track_ui_hover(buttons: Query<&Interaction, With<HudButton>>, mut hovered: ResMut<UiHovered>) {
    let over = buttons.iter().any(|i| *i != Interaction::None);
    if hovered.0 != over {
        hovered.0 = over;
    }
}
