//! Turn order by initiative
//!
//! Computed once at battle start. Dead units are pruned as they fall and
//! are never admitted again; the order itself is never re-sorted.

use std::cmp::Reverse;

use ahash::AHashSet;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

use crate::battle::formulas::initiative;
use crate::battle::units::UnitTable;
use crate::core::types::{UnitId, UnitIndex};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurnOrderEntry {
    pub unit: UnitId,
    pub initiative: f32,
}

#[derive(Debug, Clone, Default)]
pub struct TurnOrder {
    entries: Vec<TurnOrderEntry>,
    removed: AHashSet<UnitId>,
}

/// Initiative of one unit from its current stats and gear
pub fn unit_initiative(units: &UnitTable, idx: UnitIndex) -> f32 {
    initiative(units.stats(idx).speed, units.total_weight(idx))
}

impl TurnOrder {
    /// Rank every living unit, highest initiative first
    ///
    /// Ties keep table (spawn) order.
    pub fn compute(units: &UnitTable) -> Self {
        let mut entries: Vec<TurnOrderEntry> = units
            .living()
            .map(|idx| TurnOrderEntry {
                unit: units.id(idx),
                initiative: unit_initiative(units, idx),
            })
            .collect();

        // sort_by_key is stable
        entries.sort_by_key(|entry| Reverse(OrderedFloat(entry.initiative)));

        Self {
            entries,
            removed: AHashSet::new(),
        }
    }

    /// Drop a unit for the rest of the battle; true if it was in the order
    pub fn prune(&mut self, unit: UnitId) -> bool {
        self.removed.insert(unit);
        let before = self.entries.len();
        self.entries.retain(|entry| entry.unit != unit);
        before != self.entries.len()
    }

    /// Owned copy of the current order, for iterating while units die
    pub fn snapshot(&self) -> Vec<UnitId> {
        self.entries.iter().map(|entry| entry.unit).collect()
    }

    pub fn entries(&self) -> &[TurnOrderEntry] {
        &self.entries
    }

    pub fn contains(&self, unit: UnitId) -> bool {
        !self.removed.contains(&unit) && self.entries.iter().any(|entry| entry.unit == unit)
    }

    pub fn was_removed(&self, unit: UnitId) -> bool {
        self.removed.contains(&unit)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
