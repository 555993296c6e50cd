//! Sprite side of the cell window: spawning and recolouring cell views, the
//! camera, and the player marker.

use bevy::prelude::*;

use super::{CellViewSink, CellVisual, CellWindow, Viewport};
use crate::shared::*;

/// Marks the sprite for one grid cell.
#[derive(Component, Debug, Clone, Copy)]
pub struct CellView {
    pub cell: CellId,
}

/// The value label drawn on top of a cell view.
#[derive(Component, Debug, Default)]
pub struct CellLabel;

/// The visual last pushed for a cell view. Recoloured by
/// `apply_cell_appearance` whenever it changes.
#[derive(Component, Debug, Clone, Copy, PartialEq)]
pub struct CellAppearance(pub CellVisual);

#[derive(Component, Debug, Default)]
pub struct PlayerMarker;

const EMPTY_IN_RANGE: Color = Color::srgb(0.86, 0.90, 0.82);
const EMPTY_OUT_OF_RANGE: Color = Color::srgb(0.55, 0.58, 0.55);
const PLAYER_COLOR: Color = Color::srgb(0.15, 0.35, 0.95);
const LABEL_COLOR: Color = Color::srgb(0.08, 0.08, 0.10);

/// One warm step per doubling, 2 through 2048; larger values reuse the last.
const TOKEN_PALETTE: [(f32, f32, f32); 11] = [
    (0.93, 0.89, 0.85),
    (0.93, 0.88, 0.78),
    (0.95, 0.69, 0.47),
    (0.96, 0.58, 0.39),
    (0.96, 0.49, 0.37),
    (0.96, 0.37, 0.23),
    (0.93, 0.81, 0.45),
    (0.93, 0.80, 0.38),
    (0.93, 0.78, 0.31),
    (0.93, 0.77, 0.25),
    (0.93, 0.76, 0.18),
];

pub fn token_color(visual: CellVisual) -> Color {
    if visual.value == 0 {
        return if visual.in_range {
            EMPTY_IN_RANGE
        } else {
            EMPTY_OUT_OF_RANGE
        };
    }
    let tier = (visual.value.max(2).ilog2() as usize - 1).min(TOKEN_PALETTE.len() - 1);
    let (r, g, b) = TOKEN_PALETTE[tier];
    let alpha = if visual.in_range { 1.0 } else { 0.55 };
    Color::srgba(r, g, b, alpha)
}

// ─────────────────────────────────────────────────────────────────────────────
// CellViewSink over Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Spawns and despawns cell sprites through deferred commands.
pub struct CommandViewSink<'a, 'w, 's> {
    commands: &'a mut Commands<'w, 's>,
    geometry: GridGeometry,
}

impl<'a, 'w, 's> CommandViewSink<'a, 'w, 's> {
    pub fn new(commands: &'a mut Commands<'w, 's>, geometry: GridGeometry) -> Self {
        Self { commands, geometry }
    }

    fn translation(&self, bounds: CellBounds, z: f32) -> Vec3 {
        self.geometry.to_world(bounds.center()).extend(z)
    }
}

impl CellViewSink for CommandViewSink<'_, '_, '_> {
    fn create(&mut self, cell: CellId, bounds: CellBounds) -> Entity {
        let translation = self.translation(bounds, Z_CELLS);
        let entity = self
            .commands
            .spawn((
                CellView { cell },
                Sprite {
                    color: EMPTY_OUT_OF_RANGE,
                    custom_size: Some(Vec2::splat(CELL_PIXELS - 2.0)),
                    ..default()
                },
                Transform::from_translation(translation),
                Visibility::default(),
            ))
            .id();
        self.commands.entity(entity).with_children(|parent| {
            parent.spawn((
                CellLabel,
                Text2d::new(""),
                TextFont {
                    font_size: 12.0,
                    ..default()
                },
                TextColor(LABEL_COLOR),
                Transform::from_xyz(0.0, 0.0, Z_LABELS - Z_CELLS),
            ));
        });
        entity
    }

    fn set_visual(&mut self, view: Entity, visual: CellVisual) {
        if let Some(mut entity) = self.commands.get_entity(view) {
            entity.try_insert(CellAppearance(visual));
        }
    }

    fn refresh_bounds(&mut self, view: Entity, bounds: CellBounds) {
        let translation = self.translation(bounds, Z_CELLS);
        if let Some(mut entity) = self.commands.get_entity(view) {
            entity.try_insert(Transform::from_translation(translation));
        }
    }

    fn destroy(&mut self, view: Entity) {
        if let Some(entity) = self.commands.get_entity(view) {
            entity.despawn_recursive();
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Systems
// ─────────────────────────────────────────────────────────────────────────────

pub fn spawn_player_marker(mut commands: Commands) {
    commands.spawn((
        PlayerMarker,
        Sprite {
            color: PLAYER_COLOR,
            custom_size: Some(Vec2::splat(CELL_PIXELS * 0.4)),
            ..default()
        },
        Transform::from_xyz(0.0, 0.0, Z_PLAYER),
    ));
}

/// Recolours sprites and rewrites labels whose appearance changed.
pub fn apply_cell_appearance(
    mut cells: Query<(&CellAppearance, &mut Sprite, &Children), Changed<CellAppearance>>,
    mut labels: Query<&mut Text2d, With<CellLabel>>,
) {
    for (appearance, mut sprite, children) in cells.iter_mut() {
        sprite.color = token_color(appearance.0);
        let text = appearance.0.label().unwrap_or_default();
        for &child in children.iter() {
            if let Ok(mut label) = labels.get_mut(child) {
                if label.0 != text {
                    label.0 = text.clone();
                }
            }
        }
    }
}

/// Records the camera's visible rectangle and asks for a resync when the
/// window follows the viewport.
pub fn track_viewport(
    config: Res<GameConfig>,
    mut viewport: ResMut<Viewport>,
    mut window: ResMut<CellWindow>,
    cameras: Query<
        (&Transform, &OrthographicProjection),
        (
            With<Camera2d>,
            Or<(Changed<Transform>, Changed<OrthographicProjection>)>,
        ),
    >,
) {
    let Ok((transform, projection)) = cameras.get_single() else {
        return;
    };
    let geometry = config.geometry();
    let center = transform.translation.truncate();
    let half = Vec2::new(
        projection.area.width() / 2.0 * transform.scale.x,
        projection.area.height() / 2.0 * transform.scale.y,
    );
    let next = Viewport {
        south_west: geometry.from_world(center - half),
        north_east: geometry.from_world(center + half),
        known: true,
    };
    if *viewport != next {
        *viewport = next;
        if matches!(config.window, WindowStrategy::Viewport { .. }) {
            window.request_resync();
        }
    }
}

/// Snaps the camera to the requested position.
pub fn follow_camera(
    config: Res<GameConfig>,
    mut events: EventReader<CameraFollowEvent>,
    mut cameras: Query<&mut Transform, With<Camera2d>>,
) {
    let Some(event) = events.read().last() else {
        return;
    };
    let Ok(mut transform) = cameras.get_single_mut() else {
        return;
    };
    let target = config.geometry().to_world(event.position).round();
    transform.translation.x = target.x;
    transform.translation.y = target.y;
}

pub fn move_player_marker(
    config: Res<GameConfig>,
    position: Res<PlayerPosition>,
    mut markers: Query<&mut Transform, With<PlayerMarker>>,
) {
    if !position.is_changed() {
        return;
    }
    let target = config.geometry().to_world(position.0);
    for mut transform in markers.iter_mut() {
        transform.translation.x = target.x;
        transform.translation.y = target.y;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy::ecs::system::RunSystemOnce;
    use std::time::Duration;

    /// A world with one camera whose visible area is 80 × 80 pixels, and a
    /// window that has already drawn its first frame.
    fn world_with_camera(window: WindowStrategy) -> World {
        let mut world = World::new();
        world.insert_resource(GameConfig {
            window,
            ..GameConfig::default()
        });
        world.init_resource::<Viewport>();
        let mut cell_window = CellWindow::new(Duration::from_millis(16));
        cell_window.resync_due(Duration::ZERO);
        world.insert_resource(cell_window);
        world.spawn((
            Camera2d,
            OrthographicProjection {
                area: Rect::new(-40.0, -40.0, 40.0, 40.0),
                ..OrthographicProjection::default_2d()
            },
            Transform::from_xyz(16.0, 16.0, 0.0),
        ));
        world
    }

    #[test]
    fn test_viewport_change_requests_resync_in_viewport_mode() {
        let mut world = world_with_camera(WindowStrategy::Viewport { margin: 1 });
        world.run_system_once(track_viewport).unwrap();

        let viewport = *world.resource::<Viewport>();
        assert!(viewport.known);
        let geometry = world.resource::<GameConfig>().geometry();
        assert_eq!(geometry.to_cell(viewport.south_west), CellId::new(-1, -1));
        assert_eq!(geometry.to_cell(viewport.north_east), CellId::new(1, 1));
        assert!(world.resource::<CellWindow>().resync_pending());
    }

    #[test]
    fn test_viewport_change_is_recorded_but_ignored_in_radius_mode() {
        let mut world = world_with_camera(WindowStrategy::PlayerRadius { radius: 4 });
        world.run_system_once(track_viewport).unwrap();

        assert!(world.resource::<Viewport>().known);
        assert!(!world.resource::<CellWindow>().resync_pending());
    }


    #[test]
    fn test_empty_cells_dim_out_of_range() {
        let near = token_color(CellVisual { value: 0, in_range: true });
        let far = token_color(CellVisual { value: 0, in_range: false });
        assert_ne!(near, far);
    }

    #[test]
    fn test_token_palette_steps_with_value() {
        let two = token_color(CellVisual { value: 2, in_range: true });
        let four = token_color(CellVisual { value: 4, in_range: true });
        assert_ne!(two, four);
        // Past the end of the palette every value shares the last colour.
        let huge = token_color(CellVisual { value: 1 << 20, in_range: true });
        let top = token_color(CellVisual { value: 2048, in_range: true });
        assert_eq!(huge, top);
    }

    #[test]
    fn test_out_of_range_tokens_are_translucent() {
        let far = token_color(CellVisual { value: 8, in_range: false });
        assert!(far.alpha() < 1.0);
    }
}
