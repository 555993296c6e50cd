use bevy::prelude::*;

use crate::shared::*;

/// At most this many status lines are on screen at once.
const MAX_TOASTS: usize = 3;
const FADE_SECS: f32 = 0.5;

#[derive(Component)]
pub struct ToastContainer;

#[derive(Component)]
pub struct ToastItem {
    pub timer: Timer,
    pub fade_timer: Option<Timer>,
    pub color: Color,
}

fn kind_style(kind: StatusKind) -> (Color, f32) {
    match kind {
        StatusKind::Info => (Color::WHITE, 2.0),
        StatusKind::Warning => (Color::srgb(1.0, 0.75, 0.3), 4.0),
        StatusKind::Win => (Color::srgb(0.5, 1.0, 0.5), 5.0),
    }
}

pub fn spawn_toast_container(mut commands: Commands) {
    commands.spawn((
        ToastContainer,
        Node {
            position_type: PositionType::Absolute,
            top: Val::Px(48.0),
            left: Val::Percent(50.0),
            width: Val::Px(360.0),
            margin: UiRect {
                left: Val::Px(-180.0),
                ..default()
            },
            flex_direction: FlexDirection::Column,
            row_gap: Val::Px(6.0),
            align_items: AlignItems::Center,
            ..default()
        },
    ));
}

pub fn despawn_toast_container(
    mut commands: Commands,
    query: Query<Entity, With<ToastContainer>>,
) {
    for entity in &query {
        commands.entity(entity).despawn_recursive();
    }
}

/// Logs every status line and shows it as a toast.
pub fn handle_status_events(
    mut commands: Commands,
    mut events: EventReader<StatusEvent>,
    container_query: Query<Entity, With<ToastContainer>>,
    existing_toasts: Query<Entity, With<ToastItem>>,
) {
    let container = container_query.get_single().ok();
    let mut visible: Vec<Entity> = existing_toasts.iter().collect();

    for event in events.read() {
        match event.kind {
            StatusKind::Warning => warn!("status: {}", event.message),
            _ => info!("status: {}", event.message),
        }
        let Some(container) = container else {
            continue;
        };

        if visible.len() >= MAX_TOASTS {
            let oldest = visible.remove(0);
            commands.entity(oldest).despawn_recursive();
        }

        let (color, secs) = kind_style(event.kind);
        let toast = commands
            .spawn((
                ToastItem {
                    timer: Timer::from_seconds(secs, TimerMode::Once),
                    fade_timer: None,
                    color,
                },
                Node {
                    padding: UiRect::axes(Val::Px(12.0), Val::Px(5.0)),
                    border: UiRect::all(Val::Px(1.0)),
                    ..default()
                },
                BackgroundColor(Color::srgba(0.0, 0.0, 0.0, 0.75)),
                BorderColor(color.with_alpha(0.5)),
            ))
            .with_children(|parent| {
                parent.spawn((
                    Text::new(event.message.clone()),
                    TextFont {
                        font_size: 14.0,
                        ..default()
                    },
                    TextColor(color),
                ));
            })
            .id();
        commands.entity(container).add_child(toast);
        visible.push(toast);
    }
}

pub fn update_toasts(
    mut commands: Commands,
    time: Res<Time>,
    mut toast_query: Query<(Entity, &mut ToastItem, &mut BackgroundColor, &Children)>,
    mut text_color_query: Query<&mut TextColor>,
) {
    for (entity, mut toast, mut bg_color, children) in &mut toast_query {
        let toast = &mut *toast;
        if toast.fade_timer.is_none() {
            toast.timer.tick(time.delta());
            if toast.timer.just_finished() {
                toast.fade_timer = Some(Timer::from_seconds(FADE_SECS, TimerMode::Once));
            }
            continue;
        }
        let Some(fade) = toast.fade_timer.as_mut() else {
            continue;
        };

        fade.tick(time.delta());
        if fade.finished() {
            commands.entity(entity).despawn_recursive();
            continue;
        }
        let alpha = 1.0 - fade.fraction();
        bg_color.0 = bg_color.0.with_alpha(0.75 * alpha);
        let color = toast.color.with_alpha(alpha);
        for &child in children.iter() {
            if let Ok(mut text_color) = text_color_query.get_mut(child) {
                text_color.0 = color;
            }
        }
    }
}
