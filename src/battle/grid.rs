//! Battle grid bounds and derived occupancy
//!
//! The grid only knows its size. Who stands where is always read from the
//! unit table at query time, never stored here.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::battle::units::UnitTable;
use crate::core::types::GridPos;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Grid {
    pub rows: u32,
    pub cols: u32,
}

impl Grid {
    pub fn new(rows: u32, cols: u32) -> Self {
        Self { rows, cols }
    }

    /// x runs along columns, y along rows
    pub fn in_bounds(&self, pos: GridPos) -> bool {
        pos.x >= 0 && pos.y >= 0 && (pos.x as u32) < self.cols && (pos.y as u32) < self.rows
    }

    /// Tiles held by living units right now
    pub fn occupancy(&self, units: &UnitTable) -> AHashSet<GridPos> {
        units.occupied_positions()
    }

    pub fn is_free(&self, pos: GridPos, occupied: &AHashSet<GridPos>) -> bool {
        self.in_bounds(pos) && !occupied.contains(&pos)
    }

    /// In-bounds tiles within Manhattan `range` of `center`, excluding `center`
    ///
    /// Ordered by distance, then row, then column.
    pub fn tiles_within(&self, center: GridPos, range: u32) -> Vec<GridPos> {
        let r = range as i32;
        let mut tiles = Vec::new();
        for dy in -r..=r {
            for dx in -r..=r {
                let pos = GridPos::new(center.x + dx, center.y + dy);
                let dist = center.distance(&pos);
                if dist == 0 || dist > range || !self.in_bounds(pos) {
                    continue;
                }
                tiles.push(pos);
            }
        }
        tiles.sort_by_key(|pos| (center.distance(pos), pos.y, pos.x));
        tiles
    }
}
