//! Core type definitions used throughout the codebase

use std::fmt;

use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of a unit as the host knows it (scenario files, presentation)
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Display, From,
)]
#[display(fmt = "unit#{}", _0)]
pub struct UnitId(pub u32);

/// Slot of a unit inside the `UnitTable` component arrays
///
/// Deliberately not convertible to or from `UnitId`: ids come from the host,
/// indices come only from the table that issued them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UnitIndex(pub(crate) usize);

impl UnitIndex {
    pub fn get(self) -> usize {
        self.0
    }
}

/// Unique identifier for a battle (log correlation)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display)]
#[display(fmt = "{}", _0)]
pub struct BattleId(pub Uuid);

impl BattleId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BattleId {
    fn default() -> Self {
        Self::new()
    }
}

/// Round counter (one round = every unit in the turn order acts once)
pub type Turn = u32;

/// Tile coordinate on the battle grid
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
pub struct GridPos {
    pub x: i32,
    pub y: i32,
}

impl GridPos {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Manhattan distance
    pub fn distance(&self, other: &Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// The 4-connected neighbours, in a fixed order (east, west, south, north)
    pub fn neighbors(&self) -> [GridPos; 4] {
        [
            GridPos::new(self.x + 1, self.y),
            GridPos::new(self.x - 1, self.y),
            GridPos::new(self.x, self.y + 1),
            GridPos::new(self.x, self.y - 1),
        ]
    }
}

impl fmt::Display for GridPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Which side a unit fights for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Allegiance {
    Friendly,
    Hostile,
    Neutral,
}

impl Allegiance {
    /// Friendly and hostile oppose each other; neutral opposes nobody
    pub fn opposes(&self, other: &Allegiance) -> bool {
        matches!(
            (self, other),
            (Allegiance::Friendly, Allegiance::Hostile) | (Allegiance::Hostile, Allegiance::Friendly)
        )
    }
}
