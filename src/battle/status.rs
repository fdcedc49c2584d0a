//! Status-effect ledger
//!
//! Per unit, the active effect instances in application order. Durations
//! count down once per tick; a tick happens at the carrier's own end of turn.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::battle::constants::INDEFINITE_DURATION;
use crate::battle::definitions::{StatusEffectDef, StatusPayload};
use crate::battle::events::{BattleEventType, EventBus, RemovalReason};
use crate::core::types::UnitId;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StatusEffectInstance {
    pub definition: StatusEffectDef,
    /// Turns left; negative means indefinite
    pub remaining: i32,
}

impl StatusEffectInstance {
    pub fn new(definition: StatusEffectDef) -> Self {
        let remaining = if definition.duration < 0 {
            INDEFINITE_DURATION
        } else {
            definition.duration
        };
        Self {
            definition,
            remaining,
        }
    }

    pub fn id(&self) -> &str {
        &self.definition.id
    }

    pub fn is_indefinite(&self) -> bool {
        self.remaining < 0
    }
}

#[derive(Debug, Clone, Default)]
pub struct StatusLedger {
    effects: BTreeMap<UnitId, Vec<StatusEffectInstance>>,
}

impl StatusLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Attach `definition` to `unit` with its full duration
    ///
    /// Re-applying an active effect overwrites it and resets the duration.
    /// Returns false when the definition has a zero duration and nothing
    /// was applied.
    pub fn apply(&mut self, unit: UnitId, definition: &StatusEffectDef, bus: &mut EventBus) -> bool {
        if definition.duration == 0 {
            tracing::warn!(
                "Status '{}' has zero duration, not applied to {}",
                definition.id,
                unit
            );
            return false;
        }

        let instance = StatusEffectInstance::new(definition.clone());
        let remaining = instance.remaining;
        let slots = self.effects.entry(unit).or_default();

        match slots.iter_mut().find(|e| e.definition.id == definition.id) {
            Some(existing) => {
                tracing::warn!(
                    "Status '{}' already active on {}, resetting duration",
                    definition.id,
                    unit
                );
                *existing = instance;
            }
            None => slots.push(instance),
        }

        bus.publish(BattleEventType::StatusEffectApplied {
            unit,
            status_id: definition.id.clone(),
            duration: remaining,
        });
        true
    }

    /// Count down every timed effect on `unit` and drop the expired ones
    ///
    /// Returns the ids of the removed effects.
    pub fn tick(&mut self, unit: UnitId, bus: &mut EventBus) -> Vec<String> {
        let Some(slots) = self.effects.get_mut(&unit) else {
            return Vec::new();
        };

        let mut expired = Vec::new();
        slots.retain_mut(|effect| {
            if effect.is_indefinite() {
                return true;
            }
            effect.remaining -= 1;
            if effect.remaining <= 0 {
                expired.push(effect.definition.id.clone());
                false
            } else {
                true
            }
        });

        if slots.is_empty() {
            self.effects.remove(&unit);
        }

        for status_id in &expired {
            bus.publish(BattleEventType::StatusEffectRemoved {
                unit,
                status_id: status_id.clone(),
                reason: RemovalReason::Expired,
            });
        }
        expired
    }

    /// Force-remove one effect; true when it was present
    pub fn remove_explicit(&mut self, unit: UnitId, status_id: &str, bus: &mut EventBus) -> bool {
        let Some(slots) = self.effects.get_mut(&unit) else {
            return false;
        };
        let before = slots.len();
        slots.retain(|e| e.definition.id != status_id);
        let removed = slots.len() != before;
        if slots.is_empty() {
            self.effects.remove(&unit);
        }

        if removed {
            bus.publish(BattleEventType::StatusEffectRemoved {
                unit,
                status_id: status_id.to_string(),
                reason: RemovalReason::Cancelled,
            });
        }
        removed
    }

    /// Drop everything on a unit that just died
    pub fn clear_unit(&mut self, unit: UnitId, bus: &mut EventBus) {
        let Some(slots) = self.effects.remove(&unit) else {
            return;
        };
        for effect in slots {
            bus.publish(BattleEventType::StatusEffectRemoved {
                unit,
                status_id: effect.definition.id,
                reason: RemovalReason::UnitDied,
            });
        }
    }

    pub fn effects_of(&self, unit: UnitId) -> &[StatusEffectInstance] {
        self.effects.get(&unit).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has(&self, unit: UnitId, status_id: &str) -> bool {
        self.effects_of(unit).iter().any(|e| e.id() == status_id)
    }

    pub fn remaining(&self, unit: UnitId, status_id: &str) -> Option<i32> {
        self.effects_of(unit)
            .iter()
            .find(|e| e.id() == status_id)
            .map(|e| e.remaining)
    }

    /// Any active effect that stops the unit from acting
    pub fn is_disabled(&self, unit: UnitId) -> bool {
        self.effects_of(unit)
            .iter()
            .any(|e| matches!(e.definition.payload, StatusPayload::Disable))
    }

    /// Product of all attack modifiers on the unit (1.0 if none)
    pub fn attack_multiplier(&self, unit: UnitId) -> f32 {
        self.effects_of(unit)
            .iter()
            .filter_map(|e| match e.definition.payload {
                StatusPayload::AttackModifier { multiplier } => Some(multiplier),
                _ => None,
            })
            .product()
    }

    /// Damage-over-time effects as (status id, amount)
    pub fn damage_over_time(&self, unit: UnitId) -> Vec<(String, i32)> {
        self.effects_of(unit)
            .iter()
            .filter_map(|e| match e.definition.payload {
                StatusPayload::DamageOverTime { amount } => Some((e.definition.id.clone(), amount)),
                _ => None,
            })
            .collect()
    }

    /// Units carrying at least one effect, in id order
    pub fn units(&self) -> impl Iterator<Item = UnitId> + '_ {
        self.effects.keys().copied()
    }
}
