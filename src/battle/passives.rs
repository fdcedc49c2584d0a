//! Continuous passive evaluation
//!
//! Passive skills are not events: their values are recomputed from current
//! unit state on every refresh and read by the damage pipeline.

use ahash::AHashMap;

use crate::battle::constants::MAX_DAMAGE_REDUCTION;
use crate::battle::definitions::{Definitions, PassiveKind, SkillEffect};
use crate::battle::units::UnitTable;
use crate::core::types::UnitId;

/// `max_reduction` scaled by the fraction of hp already lost
pub fn hp_loss_reduction(max_reduction: f32, hp: i32, max_hp: i32) -> f32 {
    if max_hp <= 0 {
        return 0.0;
    }
    let lost = 1.0 - (hp.clamp(0, max_hp) as f32 / max_hp as f32);
    max_reduction * lost
}

#[derive(Debug, Clone, Default)]
pub struct PassiveEvaluator {
    reductions: AHashMap<UnitId, f32>,
}

impl PassiveEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute every living unit's incoming damage reduction
    pub fn refresh(&mut self, units: &UnitTable, definitions: &Definitions) {
        self.reductions.clear();

        for idx in units.living() {
            let stats = units.stats(idx);
            let mut total = 0.0;

            for skill_id in units.skills(idx) {
                let Some(skill) = definitions.skills.get(skill_id) else {
                    continue;
                };
                if !skill.usable_with(units.tags(idx)) {
                    continue;
                }
                if let SkillEffect::Passive {
                    kind: PassiveKind::HpLossReduction,
                    max_reduction,
                } = skill.effect
                {
                    total += hp_loss_reduction(max_reduction, units.hp(idx), stats.max_hp);
                }
            }

            if total > 0.0 {
                self.reductions
                    .insert(units.id(idx), total.clamp(0.0, MAX_DAMAGE_REDUCTION));
            }
        }
    }

    /// Fraction of incoming damage removed, in `[0, MAX_DAMAGE_REDUCTION]`
    pub fn reduction_for(&self, unit: UnitId) -> f32 {
        self.reductions.get(&unit).copied().unwrap_or(0.0)
    }
}
