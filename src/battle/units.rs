//! Unit component table using Structure of Arrays layout
//!
//! Every per-unit fact lives in its own column, indexed by `UnitIndex`.
//! Dead units stay in the table (flagged, never removed) so late events can
//! still name them.

use ahash::AHashSet;
use serde::{Deserialize, Serialize};

use crate::battle::definitions::ClassDef;
use crate::battle::formulas::{max_barrier_from_valor, total_weight};
use crate::core::types::{Allegiance, GridPos, UnitId, UnitIndex};

/// Base stats of a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StatBlock {
    pub max_hp: i32,
    pub attack: i32,
    pub magic: i32,
    pub speed: i32,
    pub valor: i32,
    pub strength: i32,
    pub weight: i32,
    pub luck: i32,
}

impl Default for StatBlock {
    fn default() -> Self {
        Self {
            max_hp: 20,
            attack: 5,
            magic: 0,
            speed: 10,
            valor: 0,
            strength: 10,
            weight: 0,
            luck: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EquippedItem {
    pub id: String,
    #[serde(default)]
    pub weight: i32,
    #[serde(default)]
    pub is_weapon: bool,
}

/// Everything needed to place a unit on the field
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSpawn {
    pub id: UnitId,
    #[serde(default)]
    pub name: String,
    pub class: String,
    pub allegiance: Allegiance,
    pub position: GridPos,
    #[serde(default)]
    pub stats: StatBlock,
    #[serde(default)]
    pub equipment: Vec<EquippedItem>,
    /// Skills on top of the class list, appended after it
    #[serde(default)]
    pub extra_skills: Vec<String>,
}

impl UnitSpawn {
    pub fn new(id: u32, class: &str, allegiance: Allegiance, position: GridPos) -> Self {
        Self {
            id: UnitId(id),
            name: format!("{}-{}", class, id),
            class: class.to_string(),
            allegiance,
            position,
            stats: StatBlock::default(),
            equipment: Vec::new(),
            extra_skills: Vec::new(),
        }
    }

    pub fn with_stats(mut self, stats: StatBlock) -> Self {
        self.stats = stats;
        self
    }

    pub fn with_equipment(mut self, item: EquippedItem) -> Self {
        self.equipment.push(item);
        self
    }

    pub fn with_skill(mut self, skill: &str) -> Self {
        self.extra_skills.push(skill.to_string());
        self
    }
}

/// Owned copy of the combat-relevant state of one unit
///
/// This is what crosses the resolver boundary: never a live reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnitSnapshot {
    pub id: UnitId,
    pub allegiance: Allegiance,
    pub position: GridPos,
    pub hp: i32,
    pub max_hp: i32,
    pub barrier: i32,
    pub max_barrier: i32,
    pub attack: i32,
    pub magic: i32,
    pub luck: i32,
    /// Product of the unit's active attack modifiers
    pub attack_multiplier: f32,
}

/// All units of a battle
#[derive(Debug, Clone, Default)]
pub struct UnitTable {
    pub ids: Vec<UnitId>,
    pub names: Vec<String>,
    pub classes: Vec<String>,
    pub allegiances: Vec<Allegiance>,
    pub stats: Vec<StatBlock>,
    pub skill_slots: Vec<Vec<String>>,
    pub tags: Vec<Vec<String>>,
    pub equipment: Vec<Vec<EquippedItem>>,
    positions: Vec<GridPos>,
    hp: Vec<i32>,
    barrier: Vec<i32>,
    max_barrier: Vec<i32>,
    alive: Vec<bool>,
}

impl UnitTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a unit; placement rules are checked by the caller
    pub fn spawn(&mut self, spawn: UnitSpawn, class: &ClassDef, valor_barrier_scale: i32) -> UnitIndex {
        let index = UnitIndex(self.ids.len());
        let max_barrier = max_barrier_from_valor(spawn.stats.valor, valor_barrier_scale);

        let mut slots = class.skills.clone();
        slots.extend(spawn.extra_skills);

        self.ids.push(spawn.id);
        self.names.push(spawn.name);
        self.classes.push(spawn.class);
        self.allegiances.push(spawn.allegiance);
        self.stats.push(spawn.stats);
        self.skill_slots.push(slots);
        self.tags.push(class.tags.clone());
        self.equipment.push(spawn.equipment);
        self.positions.push(spawn.position);
        self.hp.push(spawn.stats.max_hp.max(0));
        self.barrier.push(max_barrier);
        self.max_barrier.push(max_barrier);
        self.alive.push(spawn.stats.max_hp > 0);
        index
    }

    pub fn index_of(&self, id: UnitId) -> Option<UnitIndex> {
        self.ids.iter().position(|&uid| uid == id).map(UnitIndex)
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Every slot, dead or alive, in spawn order
    pub fn indices(&self) -> impl Iterator<Item = UnitIndex> {
        (0..self.ids.len()).map(UnitIndex)
    }

    /// Living units in spawn order
    pub fn living(&self) -> impl Iterator<Item = UnitIndex> + '_ {
        self.indices().filter(move |&idx| self.alive[idx.0])
    }

    pub fn id(&self, idx: UnitIndex) -> UnitId {
        self.ids[idx.0]
    }

    pub fn name(&self, idx: UnitIndex) -> &str {
        &self.names[idx.0]
    }

    pub fn class_id(&self, idx: UnitIndex) -> &str {
        &self.classes[idx.0]
    }

    pub fn allegiance(&self, idx: UnitIndex) -> Allegiance {
        self.allegiances[idx.0]
    }

    pub fn stats(&self, idx: UnitIndex) -> &StatBlock {
        &self.stats[idx.0]
    }

    pub fn position(&self, idx: UnitIndex) -> GridPos {
        self.positions[idx.0]
    }

    pub fn hp(&self, idx: UnitIndex) -> i32 {
        self.hp[idx.0]
    }

    pub fn barrier(&self, idx: UnitIndex) -> i32 {
        self.barrier[idx.0]
    }

    pub fn max_barrier(&self, idx: UnitIndex) -> i32 {
        self.max_barrier[idx.0]
    }

    pub fn is_alive(&self, idx: UnitIndex) -> bool {
        self.alive[idx.0]
    }

    pub fn is_alive_id(&self, id: UnitId) -> bool {
        self.index_of(id).is_some_and(|idx| self.is_alive(idx))
    }

    pub fn skills(&self, idx: UnitIndex) -> &[String] {
        &self.skill_slots[idx.0]
    }

    pub fn tags(&self, idx: UnitIndex) -> &[String] {
        &self.tags[idx.0]
    }

    /// Total carried weight used by the initiative formula
    pub fn total_weight(&self, idx: UnitIndex) -> i32 {
        let stats = &self.stats[idx.0];
        total_weight(
            stats.weight,
            stats.strength,
            self.equipment[idx.0].iter().map(|item| item.weight),
        )
    }

    /// Living unit standing on `pos`
    pub fn unit_at(&self, pos: GridPos) -> Option<UnitIndex> {
        self.living().find(|&idx| self.positions[idx.0] == pos)
    }

    /// Tiles held by living units, rebuilt on every call
    pub fn occupied_positions(&self) -> AHashSet<GridPos> {
        self.living().map(|idx| self.positions[idx.0]).collect()
    }

    pub fn count_living(&self, allegiance: Allegiance) -> usize {
        self.living()
            .filter(|&idx| self.allegiances[idx.0] == allegiance)
            .count()
    }

    pub fn snapshot(&self, idx: UnitIndex, attack_multiplier: f32) -> UnitSnapshot {
        let stats = &self.stats[idx.0];
        UnitSnapshot {
            id: self.ids[idx.0],
            allegiance: self.allegiances[idx.0],
            position: self.positions[idx.0],
            hp: self.hp[idx.0],
            max_hp: stats.max_hp,
            barrier: self.barrier[idx.0],
            max_barrier: self.max_barrier[idx.0],
            attack: stats.attack,
            magic: stats.magic,
            luck: stats.luck,
            attack_multiplier,
        }
    }

    /// Movement is the only writer of positions
    pub(crate) fn set_position(&mut self, idx: UnitIndex, pos: GridPos) {
        self.positions[idx.0] = pos;
    }

    /// Damage application is the only writer of hp and barrier
    ///
    /// Clamps barrier into `[0, max_barrier]` and hp at 0. Returns true when
    /// this call killed the unit.
    pub(crate) fn set_vitals(&mut self, idx: UnitIndex, hp: i32, barrier: i32) -> bool {
        let was_alive = self.alive[idx.0];
        self.hp[idx.0] = hp.max(0);
        self.barrier[idx.0] = barrier.clamp(0, self.max_barrier[idx.0]);
        if self.hp[idx.0] == 0 {
            self.alive[idx.0] = false;
        }
        was_alive && !self.alive[idx.0]
    }
}
