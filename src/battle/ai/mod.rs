//! Unit AI for battle decision-making
//!
//! Two tiers per acting unit:
//! - skill roll: one draw against the unit's cumulative skill probabilities
//! - basic behaviour: class-specific targeting and movement
//!
//! A fired skill that finds no valid target falls through to the basic
//! behaviour. Returning None means the unit idles this turn.

pub mod behavior;
pub mod skill_roll;

pub use behavior::{basic_behavior, skill_command, step_toward_nearest};
pub use skill_roll::{roll_skill, select_slot};

use crate::battle::commands::Command;
use crate::battle::definitions::Definitions;
use crate::battle::dice::RandomSource;
use crate::battle::state::BattleState;
use crate::core::types::UnitIndex;

/// Trait for swappable unit AI implementations
pub trait UnitAi: Send {
    /// Decide what `actor` does this turn
    fn decide(
        &mut self,
        actor: UnitIndex,
        state: &BattleState,
        definitions: &Definitions,
        rng: &mut dyn RandomSource,
    ) -> Option<Command>;
}

/// Default AI: skill roll, then class behaviour
#[derive(Debug, Clone)]
pub struct AiEngine {
    pub score_base: i32,
}

impl AiEngine {
    pub fn new(score_base: i32) -> Self {
        Self { score_base }
    }
}

impl UnitAi for AiEngine {
    fn decide(
        &mut self,
        actor: UnitIndex,
        state: &BattleState,
        definitions: &Definitions,
        rng: &mut dyn RandomSource,
    ) -> Option<Command> {
        let unit = state.units.id(actor);
        let Some(class) = definitions.class(state.units.class_id(actor)) else {
            tracing::warn!("{} has no class definition and idles", unit);
            return None;
        };

        if let Some(skill) = roll_skill(&state.units, actor, definitions, rng) {
            match skill_command(state, actor, class, skill, definitions, self.score_base) {
                Some(command) => return Some(command),
                None => tracing::debug!("{} fired {} with no valid target", unit, skill.id),
            }
        }

        basic_behavior(state, actor, class, self.score_base)
    }
}
