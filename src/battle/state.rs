//! Battle state: grid, units, status ledger, passives and turn order
//!
//! Only the orchestrating task holds this. Positions change through
//! `move_unit`, hp and barrier through `apply_damage_response`.

use ahash::AHashSet;

use crate::battle::constants::{
    COLOR_BARRIER_ONLY, COLOR_COUNTER, COLOR_DAMAGE_OVER_TIME, COLOR_HP_DAMAGE,
};
use crate::battle::damage::{resolve_fixed_damage, DamageResponse};
use crate::battle::definitions::Definitions;
use crate::battle::events::{BattleEventType, EndReason, EventBus};
use crate::battle::grid::Grid;
use crate::battle::passives::PassiveEvaluator;
use crate::battle::scheduler::TurnOrder;
use crate::battle::status::StatusLedger;
use crate::battle::units::{UnitSnapshot, UnitSpawn, UnitTable};
use crate::core::error::{BattleError, Result};
use crate::core::types::{Allegiance, GridPos, Turn, UnitId, UnitIndex};

/// How a hit reached its target; picks the display colour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HitKind {
    Attack,
    Counter,
    DamageOverTime,
}

/// Display colour for a resolved hit
pub fn damage_color(response: &DamageResponse, kind: HitKind) -> &'static str {
    match kind {
        HitKind::DamageOverTime => COLOR_DAMAGE_OVER_TIME,
        HitKind::Counter => COLOR_COUNTER,
        HitKind::Attack if response.hp_damage_dealt > 0 => COLOR_HP_DAMAGE,
        HitKind::Attack => COLOR_BARRIER_ONLY,
    }
}

#[derive(Debug, Clone)]
pub struct BattleState {
    pub grid: Grid,
    pub units: UnitTable,
    pub statuses: StatusLedger,
    pub passives: PassiveEvaluator,
    pub turn_order: TurnOrder,
    pub turn: Turn,
    valor_barrier_scale: i32,
}

impl BattleState {
    pub fn new(grid: Grid, valor_barrier_scale: i32) -> Self {
        Self {
            grid,
            units: UnitTable::new(),
            statuses: StatusLedger::new(),
            passives: PassiveEvaluator::new(),
            turn_order: TurnOrder::default(),
            turn: 0,
            valor_barrier_scale,
        }
    }

    /// Place a unit before the battle starts
    pub fn spawn(&mut self, spawn: UnitSpawn, definitions: &Definitions) -> Result<UnitIndex> {
        if self.units.index_of(spawn.id).is_some() {
            return Err(BattleError::DuplicateUnit(spawn.id));
        }
        if !self.grid.in_bounds(spawn.position) {
            return Err(BattleError::OutOfBounds(spawn.position));
        }
        if self.units.unit_at(spawn.position).is_some() {
            return Err(BattleError::TileOccupied(spawn.position));
        }
        let class = definitions
            .classes
            .get(&spawn.class)
            .ok_or_else(|| BattleError::UnknownDefinition {
                kind: "class",
                id: spawn.class.clone(),
            })?;

        for skill in &spawn.extra_skills {
            if !definitions.skills.contains_key(skill) {
                tracing::warn!("{} carries unknown skill '{}'", spawn.id, skill);
            }
        }

        Ok(self.units.spawn(spawn, class, self.valor_barrier_scale))
    }

    /// Rank the living units; called once when the battle starts
    pub fn compute_turn_order(&mut self) {
        self.turn_order = TurnOrder::compute(&self.units);
    }

    pub fn occupancy(&self) -> AHashSet<GridPos> {
        self.grid.occupancy(&self.units)
    }

    /// Victory, defeat or draw once a side is wiped out
    pub fn check_outcome(&self) -> Option<EndReason> {
        let friendlies = self.units.count_living(Allegiance::Friendly);
        let hostiles = self.units.count_living(Allegiance::Hostile);

        match (friendlies, hostiles) {
            (0, 0) => Some(EndReason::Draw),
            (_, 0) => Some(EndReason::Victory),
            (0, _) => Some(EndReason::Defeat),
            _ => None,
        }
    }

    /// Owned copy with the unit's current attack multiplier folded in
    pub fn snapshot(&self, idx: UnitIndex) -> UnitSnapshot {
        let multiplier = self.statuses.attack_multiplier(self.units.id(idx));
        self.units.snapshot(idx, multiplier)
    }

    pub fn refresh_passives(&mut self, definitions: &Definitions) {
        self.passives.refresh(&self.units, definitions);
    }

    /// Step a living unit onto a free neighbouring tile
    ///
    /// Returns false and leaves the unit in place if the tile is blocked.
    pub fn move_unit(&mut self, idx: UnitIndex, to: GridPos, bus: &mut EventBus) -> bool {
        if !self.units.is_alive(idx) {
            return false;
        }
        let from = self.units.position(idx);
        if from.distance(&to) != 1 || !self.grid.is_free(to, &self.occupancy()) {
            return false;
        }

        self.units.set_position(idx, to);
        bus.publish(BattleEventType::UnitMoved {
            unit: self.units.id(idx),
            from,
            to,
        });
        true
    }

    /// Write a resolver answer back into the unit table
    ///
    /// Announces the split and the display amount, then runs death handling.
    /// Returns true if the target died from this hit.
    pub fn apply_damage_response(
        &mut self,
        source: Option<UnitId>,
        response: &DamageResponse,
        kind: HitKind,
        bus: &mut EventBus,
    ) -> bool {
        let Some(idx) = self.units.index_of(response.unit_id) else {
            tracing::warn!("Damage for unknown {}", response.unit_id);
            return false;
        };
        if !self.units.is_alive(idx) {
            tracing::debug!("Damage for {} arrived after death, ignored", response.unit_id);
            return false;
        }

        let died = self
            .units
            .set_vitals(idx, response.new_hp, response.new_barrier);

        bus.publish(BattleEventType::DamageCalculated {
            unit: response.unit_id,
            hp_damage: response.hp_damage_dealt,
            barrier_damage: response.barrier_damage_dealt,
            new_hp: self.units.hp(idx),
            new_barrier: self.units.barrier(idx),
        });
        bus.publish(BattleEventType::DisplayDamage {
            unit: response.unit_id,
            amount: response.total_dealt(),
            color: damage_color(response, kind).to_string(),
            source,
            is_counter: kind == HitKind::Counter,
        });

        if died {
            self.handle_death(idx, source, bus);
        }
        died
    }

    /// Unit just hit 0 hp: announce, drop weapons, clear effects, leave the order
    pub fn handle_death(&mut self, idx: UnitIndex, killer: Option<UnitId>, bus: &mut EventBus) {
        let unit = self.units.id(idx);
        let position = self.units.position(idx);
        tracing::info!("{} ({}) has fallen", self.units.name(idx), unit);

        bus.publish(BattleEventType::UnitDeath { unit, killer });

        let weapons: Vec<String> = self.units.equipment[idx.get()]
            .iter()
            .filter(|item| item.is_weapon)
            .map(|item| item.id.clone())
            .collect();
        for item_id in weapons {
            bus.publish(BattleEventType::WeaponDropped {
                unit,
                item_id,
                position,
            });
        }

        self.statuses.clear_unit(unit, bus);
        self.turn_order.prune(unit);
    }

    /// Fire every damage-over-time effect on a unit at its start of turn
    ///
    /// Returns true if the unit died.
    pub fn apply_damage_over_time(&mut self, idx: UnitIndex, bus: &mut EventBus) -> bool {
        let unit = self.units.id(idx);
        for (status_id, amount) in self.statuses.damage_over_time(unit) {
            if !self.units.is_alive(idx) {
                break;
            }
            let response = resolve_fixed_damage(&self.snapshot(idx), amount);
            tracing::debug!("{} takes {} from {}", unit, response.total_dealt(), status_id);
            if self.apply_damage_response(None, &response, HitKind::DamageOverTime, bus) {
                return true;
            }
        }
        false
    }

    /// Ids of living units, spawn order
    pub fn survivors(&self) -> Vec<UnitId> {
        self.units.living().map(|idx| self.units.id(idx)).collect()
    }
}
