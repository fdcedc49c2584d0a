//! Breadth-first pathfinding on the battle grid
//!
//! Every step costs the same, so BFS gives shortest paths. Searches stop
//! expanding once a path would exceed the mover's move range.

use std::collections::VecDeque;

use ahash::{AHashMap, AHashSet};

use crate::battle::grid::Grid;
use crate::core::types::GridPos;

/// Find a path from `start` to `goal` of at most `move_range` steps
///
/// The returned path includes `start`. The start tile itself may be
/// occupied (by the mover); every other tile must be free and in bounds.
/// Returns None if the goal cannot be reached within range.
pub fn find_path(
    grid: &Grid,
    occupied: &AHashSet<GridPos>,
    start: GridPos,
    goal: GridPos,
    move_range: u32,
) -> Option<Vec<GridPos>> {
    if start == goal {
        return Some(vec![start]);
    }

    if !grid.is_free(goal, occupied) || start.distance(&goal) > move_range {
        return None;
    }

    let mut came_from: AHashMap<GridPos, GridPos> = AHashMap::new();
    let mut visited: AHashSet<GridPos> = AHashSet::new();
    let mut queue = VecDeque::new();

    visited.insert(start);
    queue.push_back((start, 0u32));

    while let Some((current, steps)) = queue.pop_front() {
        if steps >= move_range {
            continue;
        }

        for neighbor in current.neighbors() {
            if visited.contains(&neighbor) || !grid.is_free(neighbor, occupied) {
                continue;
            }
            visited.insert(neighbor);
            came_from.insert(neighbor, current);

            if neighbor == goal {
                return Some(reconstruct_path(&came_from, goal));
            }
            queue.push_back((neighbor, steps + 1));
        }
    }

    None
}

/// Every tile reachable within `move_range` steps, with the path to it
///
/// The start tile maps to `[start]`.
pub fn reachable_tiles(
    grid: &Grid,
    occupied: &AHashSet<GridPos>,
    start: GridPos,
    move_range: u32,
) -> AHashMap<GridPos, Vec<GridPos>> {
    let mut came_from: AHashMap<GridPos, GridPos> = AHashMap::new();
    let mut order = vec![start];
    let mut queue = VecDeque::new();
    let mut visited: AHashSet<GridPos> = AHashSet::new();

    visited.insert(start);
    queue.push_back((start, 0u32));

    while let Some((current, steps)) = queue.pop_front() {
        if steps >= move_range {
            continue;
        }
        for neighbor in current.neighbors() {
            if visited.contains(&neighbor) || !grid.is_free(neighbor, occupied) {
                continue;
            }
            visited.insert(neighbor);
            came_from.insert(neighbor, current);
            order.push(neighbor);
            queue.push_back((neighbor, steps + 1));
        }
    }

    order
        .into_iter()
        .map(|tile| (tile, reconstruct_path(&came_from, tile)))
        .collect()
}

fn reconstruct_path(came_from: &AHashMap<GridPos, GridPos>, mut current: GridPos) -> Vec<GridPos> {
    let mut path = vec![current];
    while let Some(&prev) = came_from.get(&current) {
        path.push(prev);
        current = prev;
    }
    path.reverse();
    path
}

/// Number of moves in a path (tiles minus the start)
pub fn path_steps(path: &[GridPos]) -> u32 {
    path.len().saturating_sub(1) as u32
}
