//! First-tier decision: the per-turn skill roll
//!
//! One draw in [0, 100) against cumulative slot probabilities. The first
//! slot whose running total exceeds the draw fires; probabilities are not
//! normalised, so leftover mass means no skill this turn.

use crate::battle::definitions::{Definitions, SkillDef};
use crate::battle::dice::RandomSource;
use crate::battle::units::UnitTable;
use crate::core::types::UnitIndex;

/// Index of the slot that fires for `draw`, if any
pub fn select_slot(probabilities: &[f32], draw: f32) -> Option<usize> {
    let mut cumulative = 0.0;
    for (i, probability) in probabilities.iter().enumerate() {
        cumulative += probability.max(0.0);
        if draw < cumulative {
            return Some(i);
        }
    }
    None
}

/// Active and buff skills the unit can use, in slot order
///
/// Slots with missing definitions or unmet tag requirements are left out
/// and contribute nothing to the cumulative total.
pub fn rollable_skills<'d>(
    units: &UnitTable,
    actor: UnitIndex,
    definitions: &'d Definitions,
) -> Vec<&'d SkillDef> {
    let tags = units.tags(actor);
    units
        .skills(actor)
        .iter()
        .filter_map(|skill_id| definitions.skill(skill_id))
        .filter(|skill| skill.effect.is_rollable() && skill.usable_with(tags))
        .collect()
}

/// Roll for this turn's skill
///
/// Draws nothing when the unit has no rollable skill.
pub fn roll_skill<'d>(
    units: &UnitTable,
    actor: UnitIndex,
    definitions: &'d Definitions,
    rng: &mut dyn RandomSource,
) -> Option<&'d SkillDef> {
    let candidates = rollable_skills(units, actor, definitions);
    if candidates.is_empty() {
        return None;
    }

    let probabilities: Vec<f32> = candidates.iter().map(|skill| skill.probability).collect();
    let draw = rng.percent();
    let fired = select_slot(&probabilities, draw).map(|i| candidates[i]);

    match fired {
        Some(skill) => tracing::debug!("{} rolls {:.1}: {} fires", units.id(actor), draw, skill.id),
        None => tracing::debug!("{} rolls {:.1}: no skill", units.id(actor), draw),
    }
    fired
}
