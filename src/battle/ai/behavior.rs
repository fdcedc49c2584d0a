//! Second-tier decision: class behaviours and skill targeting
//!
//! Every function here returns None when it has nothing sensible to do,
//! so the caller can fall through to the next option.

use crate::battle::commands::Command;
use crate::battle::damage::AttackPayload;
use crate::battle::definitions::{BehaviorKind, BuffTarget, ClassDef, Definitions, SkillDef, SkillEffect};
use crate::battle::pathfinding::{path_steps, reachable_tiles};
use crate::battle::state::BattleState;
use crate::battle::targeting::{best_reachable_target, nearest_opponent, weakest_ally_within, TargetPlan};
use crate::core::types::UnitIndex;

/// How far this class may walk before attacking
pub fn effective_move_range(class: &ClassDef) -> u32 {
    match class.behavior {
        BehaviorKind::MeleeSeeker => class.move_range,
        BehaviorKind::Holder => 0,
    }
}

/// Attack for a plan, preceded by the walk when one is needed
pub fn plan_to_command(state: &BattleState, actor: UnitIndex, plan: TargetPlan, payload: AttackPayload) -> Command {
    let attacker = state.units.id(actor);
    let attack = Command::Attack {
        attacker,
        target: state.units.id(plan.target),
        payload,
    };
    if plan.is_stationary() {
        attack
    } else {
        Command::Move {
            unit: attacker,
            path: plan.path,
        }
        .then(attack)
    }
}

/// Basic behaviour of the class
pub fn basic_behavior(state: &BattleState, actor: UnitIndex, class: &ClassDef, score_base: i32) -> Option<Command> {
    let move_range = effective_move_range(class);
    let plan = best_reachable_target(
        &state.units,
        &state.grid,
        actor,
        move_range,
        class.attack_range,
        score_base,
    );

    match plan {
        Some(plan) => {
            tracing::debug!(
                "{} targets {} (score {}, {} steps)",
                state.units.id(actor),
                state.units.id(plan.target),
                plan.score,
                path_steps(&plan.path)
            );
            Some(plan_to_command(state, actor, plan, AttackPayload::basic(class)))
        }
        None if move_range > 0 => step_toward_nearest(state, actor, move_range),
        None => None,
    }
}

/// Walk as close as possible to the Manhattan-nearest opponent
///
/// None when no reachable tile gets any closer.
pub fn step_toward_nearest(state: &BattleState, actor: UnitIndex, move_range: u32) -> Option<Command> {
    let unit = state.units.id(actor);
    let Some(nearest) = nearest_opponent(&state.units, actor) else {
        tracing::debug!("{} has no opponents left", unit);
        return None;
    };

    let goal = state.units.position(nearest);
    let from = state.units.position(actor);
    let current = from.distance(&goal);

    let tiles = reachable_tiles(&state.grid, &state.occupancy(), from, move_range);
    let (tile, path) = tiles
        .into_iter()
        .min_by_key(|(tile, path)| (tile.distance(&goal), path.len(), tile.y, tile.x))?;

    if tile.distance(&goal) >= current {
        tracing::warn!("{} cannot get any closer to {}", unit, state.units.id(nearest));
        return None;
    }

    tracing::debug!("{} advances toward {} via {}", unit, state.units.id(nearest), tile);
    Some(Command::Move { unit, path })
}

/// Target and command for a fired active or buff skill
pub fn skill_command(
    state: &BattleState,
    actor: UnitIndex,
    class: &ClassDef,
    skill: &SkillDef,
    definitions: &Definitions,
    score_base: i32,
) -> Option<Command> {
    match &skill.effect {
        SkillEffect::Active {
            dice,
            damage_type,
            range,
            damage_modifier,
            apply_status,
        } => {
            let plan = best_reachable_target(
                &state.units,
                &state.grid,
                actor,
                effective_move_range(class),
                *range,
                score_base,
            )?;
            let payload = AttackPayload::skill(
                &skill.id,
                *dice,
                *damage_type,
                *range,
                *damage_modifier,
                apply_status.clone(),
            );
            Some(plan_to_command(state, actor, plan, payload))
        }
        SkillEffect::Buff {
            status,
            target,
            range,
        } => {
            definitions.status(status)?;
            let recipient = match target {
                BuffTarget::SelfUnit => actor,
                BuffTarget::WeakestAlly => weakest_ally_within(&state.units, actor, *range)?,
            };
            Some(Command::ApplyStatus {
                source: state.units.id(actor),
                target: state.units.id(recipient),
                status_id: status.clone(),
            })
        }
        _ => None,
    }
}
