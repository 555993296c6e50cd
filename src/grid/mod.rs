//! Grid geometry: continuous positions to discrete cells and back.
//!
//! Cells are half-open squares of `cell_size` degrees anchored at a fixed
//! origin, so the origin itself always lands in cell (0, 0). Rows follow
//! latitude, columns follow longitude.

use bevy::prelude::*;
use serde::{Deserialize, Serialize};

use crate::shared::{CellId, GeoPosition, CELL_PIXELS};

/// Spatial rectangle of one cell, in degrees. Derived on demand, never
/// stored or persisted.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CellBounds {
    pub south_west: GeoPosition,
    pub north_east: GeoPosition,
}

impl CellBounds {
    pub fn center(&self) -> GeoPosition {
        GeoPosition {
            lat: (self.south_west.lat + self.north_east.lat) / 2.0,
            lng: (self.south_west.lng + self.north_east.lng) / 2.0,
        }
    }

    pub fn contains(&self, position: GeoPosition) -> bool {
        position.lat >= self.south_west.lat
            && position.lat < self.north_east.lat
            && position.lng >= self.south_west.lng
            && position.lng < self.north_east.lng
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridGeometry {
    pub origin: GeoPosition,
    pub cell_size: f64,
}

impl GridGeometry {
    pub fn new(origin: GeoPosition, cell_size: f64) -> Self {
        Self { origin, cell_size }
    }

    /// Floor-divides the offset from the origin on each axis.
    ///
    /// Non-finite input saturates through the float-to-int cast instead of
    /// panicking, so the function stays total.
    pub fn to_cell(&self, position: GeoPosition) -> CellId {
        let row = ((position.lat - self.origin.lat) / self.cell_size).floor();
        let col = ((position.lng - self.origin.lng) / self.cell_size).floor();
        CellId::new(row as i32, col as i32)
    }

    pub fn bounds(&self, cell: CellId) -> CellBounds {
        let size = self.cell_size;
        CellBounds {
            south_west: GeoPosition {
                lat: self.origin.lat + f64::from(cell.row) * size,
                lng: self.origin.lng + f64::from(cell.col) * size,
            },
            north_east: GeoPosition {
                lat: self.origin.lat + (f64::from(cell.row) + 1.0) * size,
                lng: self.origin.lng + (f64::from(cell.col) + 1.0) * size,
            },
        }
    }

    pub fn center(&self, cell: CellId) -> GeoPosition {
        self.bounds(cell).center()
    }

    /// Geo position to 2D world space (`CELL_PIXELS` per cell, origin at 0,0).
    pub fn to_world(&self, position: GeoPosition) -> Vec2 {
        let x = (position.lng - self.origin.lng) / self.cell_size;
        let y = (position.lat - self.origin.lat) / self.cell_size;
        Vec2::new(x as f32 * CELL_PIXELS, y as f32 * CELL_PIXELS)
    }

    pub fn from_world(&self, world: Vec2) -> GeoPosition {
        GeoPosition {
            lat: self.origin.lat + f64::from(world.y / CELL_PIXELS) * self.cell_size,
            lng: self.origin.lng + f64::from(world.x / CELL_PIXELS) * self.cell_size,
        }
    }
}

impl Default for GridGeometry {
    fn default() -> Self {
        Self::new(GeoPosition::NULL_ISLAND, 1e-4)
    }
}

/// Interaction reach: Chebyshev distance from the player's cell.
pub fn in_range(cell: CellId, player_cell: CellId, radius: u32) -> bool {
    cell.chebyshev(player_cell) <= u64::from(radius)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shared::CLASSROOM;

    fn classroom() -> GridGeometry {
        GridGeometry::new(CLASSROOM, 1e-4)
    }

    #[test]
    fn test_origin_maps_to_cell_zero() {
        assert_eq!(classroom().to_cell(CLASSROOM), CellId::ORIGIN);
        let null_island = GridGeometry::default();
        assert_eq!(
            null_island.to_cell(GeoPosition::NULL_ISLAND),
            CellId::ORIGIN
        );
    }

    #[test]
    fn test_negative_offsets_floor_toward_negative_infinity() {
        let geo = GridGeometry::default();
        assert_eq!(
            geo.to_cell(GeoPosition::new(-0.00005, -0.00015)),
            CellId::new(-1, -2)
        );
        assert_eq!(
            geo.to_cell(GeoPosition::new(0.00005, 0.00015)),
            CellId::new(0, 1)
        );
    }

    #[test]
    fn test_center_maps_back_to_its_cell() {
        let geo = classroom();
        for row in -20..20 {
            for col in -20..20 {
                let cell = CellId::new(row * 7, col * 13);
                assert_eq!(
                    geo.to_cell(geo.center(cell)),
                    cell,
                    "center of {cell} should map back to itself"
                );
            }
        }
    }

    #[test]
    fn test_bounds_edges_follow_cell_size() {
        let geo = GridGeometry::new(GeoPosition::new(10.0, 20.0), 0.5);
        let b = geo.bounds(CellId::new(2, -3));
        assert_eq!(b.south_west, GeoPosition::new(11.0, 18.5));
        assert_eq!(b.north_east, GeoPosition::new(11.5, 19.0));
        assert!(b.contains(geo.center(CellId::new(2, -3))));
        // Half-open: the north-east corner belongs to the next cell.
        assert!(!b.contains(b.north_east));
        assert_eq!(geo.to_cell(b.south_west), CellId::new(2, -3));
    }

    #[test]
    fn test_world_round_trip_stays_in_cell() {
        let geo = classroom();
        let cell = CellId::new(4, -9);
        let world = geo.to_world(geo.center(cell));
        assert_eq!(geo.to_cell(geo.from_world(world)), cell);
        assert!((world.x - (-8.5 * CELL_PIXELS)).abs() < 0.01);
        assert!((world.y - (4.5 * CELL_PIXELS)).abs() < 0.01);
    }

    #[test]
    fn test_in_range_is_chebyshev() {
        let player = CellId::new(5, 5);
        assert!(in_range(CellId::new(8, 2), player, 3));
        assert!(!in_range(CellId::new(9, 5), player, 3));
        assert!(in_range(player, player, 0));
        assert!(!in_range(CellId::new(5, 6), player, 0));
    }
}
