//! Target selection heuristics
//!
//! Lower current hp means higher priority. All scans walk the unit table in
//! spawn order, so ties go to the earliest unit.

use ahash::AHashSet;

use crate::battle::grid::Grid;
use crate::battle::pathfinding::find_path;
use crate::battle::units::UnitTable;
use crate::core::types::{GridPos, UnitIndex};

/// Living units opposing `actor`
pub fn opponents_of(units: &UnitTable, actor: UnitIndex) -> Vec<UnitIndex> {
    let side = units.allegiance(actor);
    units
        .living()
        .filter(|&idx| side.opposes(&units.allegiance(idx)))
        .collect()
}

/// Living units on `actor`'s side, the actor included
pub fn allies_of(units: &UnitTable, actor: UnitIndex) -> Vec<UnitIndex> {
    let side = units.allegiance(actor);
    units
        .living()
        .filter(|&idx| units.allegiance(idx) == side)
        .collect()
}

/// score = base - hp
pub fn target_score(base: i32, hp: i32) -> i32 {
    base - hp
}

/// Free in-grid tiles from which `target` can be hit at `attack_range`
pub fn attack_tiles(
    grid: &Grid,
    occupied: &AHashSet<GridPos>,
    target: GridPos,
    attack_range: u32,
) -> Vec<GridPos> {
    grid.tiles_within(target, attack_range)
        .into_iter()
        .filter(|&tile| !occupied.contains(&tile))
        .collect()
}

/// Manhattan-nearest living opponent
pub fn nearest_opponent(units: &UnitTable, actor: UnitIndex) -> Option<UnitIndex> {
    let from = units.position(actor);
    opponents_of(units, actor)
        .into_iter()
        .min_by_key(|&idx| from.distance(&units.position(idx)))
}

/// Living ally (or self) with the lowest hp within `range`
pub fn weakest_ally_within(units: &UnitTable, actor: UnitIndex, range: u32) -> Option<UnitIndex> {
    let from = units.position(actor);
    allies_of(units, actor)
        .into_iter()
        .filter(|&idx| from.distance(&units.position(idx)) <= range)
        .min_by_key(|&idx| units.hp(idx))
}

/// A reachable target and how to get there
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetPlan {
    pub target: UnitIndex,
    /// Path to the attack tile, including the actor's tile
    pub path: Vec<GridPos>,
    pub score: i32,
}

impl TargetPlan {
    /// Target is already in range; no movement needed
    pub fn is_stationary(&self) -> bool {
        self.path.len() <= 1
    }
}

/// Highest-scoring opponent the actor can reach and hit this turn
///
/// For each opponent the shortest path to any tile within `attack_range`
/// is used. The actor's own tile counts when it is already in range.
pub fn best_reachable_target(
    units: &UnitTable,
    grid: &Grid,
    actor: UnitIndex,
    move_range: u32,
    attack_range: u32,
    score_base: i32,
) -> Option<TargetPlan> {
    let occupied = grid.occupancy(units);
    let from = units.position(actor);
    let mut best: Option<TargetPlan> = None;

    for target in opponents_of(units, actor) {
        let target_pos = units.position(target);

        let path = if from.distance(&target_pos) <= attack_range {
            Some(vec![from])
        } else {
            attack_tiles(grid, &occupied, target_pos, attack_range)
                .into_iter()
                .filter(|tile| from.distance(tile) <= move_range)
                .filter_map(|tile| find_path(grid, &occupied, from, tile, move_range))
                .min_by_key(|path| path.len())
        };

        let Some(path) = path else {
            continue;
        };

        let score = target_score(score_base, units.hp(target));
        if best.as_ref().map_or(true, |b| score > b.score) {
            best = Some(TargetPlan {
                target,
                path,
                score,
            });
        }
    }

    best
}
