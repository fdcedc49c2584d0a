//! Commands and the stepping interpreter
//!
//! The AI produces a `Command`; the `CommandRunner` flattens it into
//! primitives and steps them one at a time. Whenever a primitive needs
//! something from outside (an animation beat, a delay, a damage answer) the
//! runner returns a `SuspendReason` and the host resumes it once resolved.
//! A primitive never starts before the previous one has fully finished.

use std::collections::VecDeque;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::battle::damage::{AttackPayload, DamageRequest, DamageResponse};
use crate::battle::definitions::Definitions;
use crate::battle::dice::{roll, RandomSource};
use crate::battle::events::{BattleEventType, EventBus};
use crate::battle::state::{BattleState, HitKind};
use crate::core::types::{GridPos, UnitId};

/// A unit of intent
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "snake_case")]
pub enum Command {
    /// Walk along `path`; the first tile is the unit's current tile
    Move { unit: UnitId, path: Vec<GridPos> },
    Attack {
        attacker: UnitId,
        target: UnitId,
        payload: AttackPayload,
    },
    ApplyStatus {
        source: UnitId,
        target: UnitId,
        status_id: String,
    },
    Wait { unit: UnitId, duration: Duration },
    Sequence { commands: Vec<Command> },
}

impl Command {
    /// Run `next` after `self`
    pub fn then(self, next: Command) -> Command {
        match self {
            Command::Sequence { mut commands } => {
                commands.push(next);
                Command::Sequence { commands }
            }
            first => Command::Sequence {
                commands: vec![first, next],
            },
        }
    }

    /// Primitive commands in execution order
    pub fn flatten(self) -> Vec<Command> {
        match self {
            Command::Sequence { commands } => commands.into_iter().flat_map(Command::flatten).collect(),
            primitive => vec![primitive],
        }
    }
}

/// What presentation is asked to animate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "cue", rename_all = "snake_case")]
pub enum AnimationCue {
    Step { unit: UnitId, from: GridPos, to: GridPos },
    Attack { attacker: UnitId, target: UnitId },
    Status { unit: UnitId, status_id: String },
}

/// Presentation collaborator: how long each animation takes
pub trait Presentation: Send {
    fn animation_delay(&mut self, cue: &AnimationCue) -> Duration;
}

/// Headless: animations take no time
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPresentation;

impl Presentation for NoPresentation {
    fn animation_delay(&mut self, _cue: &AnimationCue) -> Duration {
        Duration::ZERO
    }
}

/// Why the runner stopped
#[derive(Debug, Clone, PartialEq)]
pub enum SuspendReason {
    Animation(AnimationCue),
    Delay(Duration),
    /// Resume with `Resume::Damage` carrying the resolver's answer
    AwaitDamage(DamageRequest),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Resume {
    Continue,
    Damage(DamageResponse),
    /// The suspension could not be resolved; drop the rest of the command
    Failed,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Step {
    Suspend(SuspendReason),
    Done,
}

/// Mutable battle access lent to the runner for one step
pub struct CommandContext<'a> {
    pub state: &'a mut BattleState,
    pub definitions: &'a Definitions,
    pub bus: &'a mut EventBus,
    pub rng: &'a mut dyn RandomSource,
}

#[derive(Debug, Clone, Default)]
enum Stage {
    #[default]
    Idle,
    Moving {
        unit: UnitId,
        path: Vec<GridPos>,
        next: usize,
    },
    AttackReady {
        attacker: UnitId,
        target: UnitId,
        payload: AttackPayload,
    },
    AwaitingDamage {
        attacker: UnitId,
        target: UnitId,
        payload: AttackPayload,
    },
}

#[derive(Debug, Clone, Default)]
pub struct CommandRunner {
    queue: VecDeque<Command>,
    stage: Stage,
}

impl CommandRunner {
    pub fn new(command: Command) -> Self {
        Self {
            queue: command.flatten().into(),
            stage: Stage::Idle,
        }
    }

    pub fn is_finished(&self) -> bool {
        self.queue.is_empty() && matches!(self.stage, Stage::Idle)
    }

    /// Advance until the next suspension or the end of the command
    pub fn step(&mut self, ctx: &mut CommandContext<'_>, resume: Resume) -> Step {
        if resume == Resume::Failed {
            self.queue.clear();
            self.stage = Stage::Idle;
            return Step::Done;
        }
        let mut resume = Some(resume);

        loop {
            let stage = std::mem::take(&mut self.stage);
            let suspended = match stage {
                Stage::Idle => {
                    let Some(command) = self.queue.pop_front() else {
                        return Step::Done;
                    };
                    self.begin(command, ctx)
                }
                Stage::Moving { unit, path, next } => self.continue_move(unit, path, next, ctx),
                Stage::AttackReady {
                    attacker,
                    target,
                    payload,
                } => self.request_damage(attacker, target, payload, ctx),
                Stage::AwaitingDamage {
                    attacker,
                    target,
                    payload,
                } => {
                    match resume.take() {
                        Some(Resume::Damage(response)) => {
                            finish_attack(attacker, target, &payload, &response, ctx)
                        }
                        other => tracing::warn!(
                            "Attack by {} resumed without a damage answer ({:?}), dropped",
                            attacker,
                            other
                        ),
                    }
                    None
                }
            };

            if let Some(reason) = suspended {
                return Step::Suspend(reason);
            }
        }
    }

    fn begin(&mut self, command: Command, ctx: &mut CommandContext<'_>) -> Option<SuspendReason> {
        match command {
            Command::Move { unit, path } => {
                let Some(idx) = ctx.state.units.index_of(unit) else {
                    tracing::warn!("Move for unknown {}", unit);
                    return None;
                };
                if path.first() != Some(&ctx.state.units.position(idx)) {
                    tracing::warn!("Move for {} does not start at its tile, dropped", unit);
                    return None;
                }
                self.continue_move(unit, path, 1, ctx)
            }
            Command::Attack {
                attacker,
                target,
                payload,
            } => {
                if !attack_still_valid(attacker, target, &payload, ctx.state) {
                    return None;
                }
                ctx.bus.publish(BattleEventType::UnitAttackAttempted {
                    attacker,
                    target,
                    skill: payload.skill_id.clone(),
                    is_counter: payload.is_counter,
                });
                self.stage = Stage::AttackReady {
                    attacker,
                    target,
                    payload,
                };
                Some(SuspendReason::Animation(AnimationCue::Attack { attacker, target }))
            }
            Command::ApplyStatus {
                source,
                target,
                status_id,
            } => {
                if !ctx.state.units.is_alive_id(target) {
                    tracing::debug!("{} gone before {} could apply {}", target, source, status_id);
                    return None;
                }
                let definition = ctx.definitions.status(&status_id)?;
                if ctx.state.statuses.apply(target, definition, ctx.bus) {
                    Some(SuspendReason::Animation(AnimationCue::Status {
                        unit: target,
                        status_id,
                    }))
                } else {
                    None
                }
            }
            Command::Wait { duration, .. } => Some(SuspendReason::Delay(duration)),
            // flatten() leaves no sequences in the queue
            Command::Sequence { commands } => {
                for command in commands.into_iter().rev() {
                    self.queue.push_front(command);
                }
                None
            }
        }
    }

    fn continue_move(
        &mut self,
        unit: UnitId,
        path: Vec<GridPos>,
        next: usize,
        ctx: &mut CommandContext<'_>,
    ) -> Option<SuspendReason> {
        let to = *path.get(next)?;
        let idx = ctx.state.units.index_of(unit)?;
        let from = ctx.state.units.position(idx);

        if !ctx.state.move_unit(idx, to, ctx.bus) {
            tracing::debug!("{} stopped at {}: {} is blocked", unit, from, to);
            return None;
        }

        self.stage = Stage::Moving {
            unit,
            path,
            next: next + 1,
        };
        Some(SuspendReason::Animation(AnimationCue::Step { unit, from, to }))
    }

    fn request_damage(
        &mut self,
        attacker: UnitId,
        target: UnitId,
        payload: AttackPayload,
        ctx: &mut CommandContext<'_>,
    ) -> Option<SuspendReason> {
        let state = &mut *ctx.state;
        let attacker_idx = state.units.index_of(attacker)?;
        let target_idx = state.units.index_of(target)?;
        if !state.units.is_alive(attacker_idx) || !state.units.is_alive(target_idx) {
            return None;
        }

        state.refresh_passives(ctx.definitions);
        let pre_rolled = roll(payload.dice, ctx.rng);
        let reduction = state.passives.reduction_for(target);

        let request = DamageRequest {
            attacker: state.snapshot(attacker_idx),
            target: state.snapshot(target_idx),
            payload: payload.clone(),
            pre_rolled,
            reduction,
        };
        tracing::debug!(
            "{} rolls {} ({}) against {}, reduction {:.2}",
            attacker,
            pre_rolled,
            payload.dice,
            target,
            reduction
        );

        self.stage = Stage::AwaitingDamage {
            attacker,
            target,
            payload,
        };
        Some(SuspendReason::AwaitDamage(request))
    }
}

/// Both units alive and, for ranged payloads, still within range
fn attack_still_valid(
    attacker: UnitId,
    target: UnitId,
    payload: &AttackPayload,
    state: &BattleState,
) -> bool {
    let (Some(a), Some(t)) = (state.units.index_of(attacker), state.units.index_of(target)) else {
        tracing::warn!("Attack between unknown units {} and {}", attacker, target);
        return false;
    };
    if !state.units.is_alive(a) || !state.units.is_alive(t) {
        tracing::debug!("Attack {} -> {} skipped, a participant is dead", attacker, target);
        return false;
    }
    if let Some(range) = payload.range {
        let distance = state.units.position(a).distance(&state.units.position(t));
        if distance > range {
            tracing::debug!(
                "Attack {} -> {} skipped, distance {} exceeds range {}",
                attacker,
                target,
                distance,
                range
            );
            return false;
        }
    }
    true
}

fn finish_attack(
    attacker: UnitId,
    target: UnitId,
    payload: &AttackPayload,
    response: &DamageResponse,
    ctx: &mut CommandContext<'_>,
) {
    if response.unit_id != target {
        tracing::warn!(
            "Damage answer for {} does not match target {}, dropped",
            response.unit_id,
            target
        );
        return;
    }

    let kind = if payload.is_counter {
        HitKind::Counter
    } else {
        HitKind::Attack
    };
    let died = ctx
        .state
        .apply_damage_response(Some(attacker), response, kind, ctx.bus);

    if died {
        return;
    }
    if let Some(status_id) = &payload.on_hit_status {
        if let Some(definition) = ctx.definitions.status(status_id) {
            ctx.state.statuses.apply(target, definition, ctx.bus);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::damage::resolve_damage;
    use crate::battle::definitions::{ClassDef, StatusEffectDef, StatusPayload};
    use crate::battle::dice::ScriptedRandom;
    use crate::battle::grid::Grid;
    use crate::battle::units::{StatBlock, UnitSpawn};
    use crate::core::types::Allegiance;

    struct Fixture {
        state: BattleState,
        defs: Definitions,
        bus: EventBus,
        rng: ScriptedRandom,
    }

    impl Fixture {
        fn new() -> Self {
            let mut defs = Definitions::new();
            defs.insert_class(ClassDef::new("knight", 3));
            defs.insert_status(StatusEffectDef::new("status_stun", 1, StatusPayload::Disable));

            let mut state = BattleState::new(Grid::new(6, 6), 1);
            let stats = StatBlock {
                max_hp: 20,
                attack: 4,
                ..StatBlock::default()
            };
            state
                .spawn(
                    UnitSpawn::new(1, "knight", Allegiance::Friendly, GridPos::new(0, 0))
                        .with_stats(stats),
                    &defs,
                )
                .unwrap();
            state
                .spawn(
                    UnitSpawn::new(2, "knight", Allegiance::Hostile, GridPos::new(3, 0))
                        .with_stats(stats),
                    &defs,
                )
                .unwrap();

            Self {
                state,
                defs,
                bus: EventBus::new(),
                rng: ScriptedRandom::new().with_dice([3]),
            }
        }

        /// Drive a command to completion, resolving damage inline
        fn run(&mut self, command: Command) -> Vec<SuspendReason> {
            let mut runner = CommandRunner::new(command);
            let mut resume = Resume::Continue;
            let mut seen = Vec::new();
            loop {
                let mut ctx = CommandContext {
                    state: &mut self.state,
                    definitions: &self.defs,
                    bus: &mut self.bus,
                    rng: &mut self.rng,
                };
                match runner.step(&mut ctx, resume) {
                    Step::Done => break,
                    Step::Suspend(reason) => {
                        resume = match &reason {
                            SuspendReason::AwaitDamage(req) => Resume::Damage(resolve_damage(req)),
                            _ => Resume::Continue,
                        };
                        seen.push(reason);
                    }
                }
            }
            assert!(runner.is_finished());
            seen
        }
    }

    fn melee(on_hit: Option<&str>) -> AttackPayload {
        let mut payload = AttackPayload::basic(&ClassDef::new("knight", 3));
        payload.on_hit_status = on_hit.map(str::to_string);
        payload
    }

    #[test]
    fn test_move_then_attack_in_order() {
        let mut fx = Fixture::new();
        let command = Command::Move {
            unit: UnitId(1),
            path: vec![GridPos::new(0, 0), GridPos::new(1, 0), GridPos::new(2, 0)],
        }
        .then(Command::Attack {
            attacker: UnitId(1),
            target: UnitId(2),
            payload: melee(Some("status_stun")),
        });

        let reasons = fx.run(command);
        assert!(matches!(reasons[0], SuspendReason::Animation(AnimationCue::Step { .. })));
        assert!(matches!(reasons[1], SuspendReason::Animation(AnimationCue::Step { .. })));
        assert!(matches!(reasons[2], SuspendReason::Animation(AnimationCue::Attack { .. })));
        assert!(matches!(reasons[3], SuspendReason::AwaitDamage(_)));
        assert_eq!(reasons.len(), 4);

        let target = fx.state.units.index_of(UnitId(2)).unwrap();
        // 3 rolled + 4 attack
        assert_eq!(fx.state.units.hp(target), 13);
        assert!(fx.state.statuses.is_disabled(UnitId(2)));

        let order: Vec<&str> = fx
            .bus
            .history()
            .iter()
            .map(|e| match e.event_type {
                BattleEventType::UnitMoved { .. } => "moved",
                BattleEventType::UnitAttackAttempted { .. } => "attempted",
                BattleEventType::DamageCalculated { .. } => "calculated",
                BattleEventType::DisplayDamage { .. } => "display",
                BattleEventType::StatusEffectApplied { .. } => "status",
                _ => "other",
            })
            .collect();
        assert_eq!(
            order,
            vec!["moved", "moved", "attempted", "calculated", "display", "status"]
        );
    }

    #[test]
    fn test_move_cut_short_at_blocked_tile() {
        let mut fx = Fixture::new();
        let command = Command::Move {
            unit: UnitId(1),
            path: vec![
                GridPos::new(0, 0),
                GridPos::new(1, 0),
                GridPos::new(2, 0),
                GridPos::new(3, 0),
            ],
        };
        fx.run(command);
        let idx = fx.state.units.index_of(UnitId(1)).unwrap();
        assert_eq!(fx.state.units.position(idx), GridPos::new(2, 0));
    }

    #[test]
    fn test_out_of_range_attack_skipped() {
        let mut fx = Fixture::new();
        let reasons = fx.run(Command::Attack {
            attacker: UnitId(1),
            target: UnitId(2),
            payload: melee(None),
        });
        assert!(reasons.is_empty());
        assert!(fx.bus.history().is_empty());
    }

    #[test]
    fn test_attack_on_dead_target_skipped() {
        let mut fx = Fixture::new();
        let idx = fx.state.units.index_of(UnitId(2)).unwrap();
        fx.state.units.set_vitals(idx, 0, 0);

        let mut payload = melee(None);
        payload.range = None;
        let reasons = fx.run(Command::Attack {
            attacker: UnitId(1),
            target: UnitId(2),
            payload,
        });
        assert!(reasons.is_empty());
    }

    #[test]
    fn test_failed_resume_drops_rest() {
        let mut fx = Fixture::new();
        let mut payload = melee(None);
        payload.range = None;
        let command = Command::Attack {
            attacker: UnitId(1),
            target: UnitId(2),
            payload,
        }
        .then(Command::Wait {
            unit: UnitId(1),
            duration: Duration::from_millis(10),
        });

        let mut runner = CommandRunner::new(command);
        let mut ctx = CommandContext {
            state: &mut fx.state,
            definitions: &fx.defs,
            bus: &mut fx.bus,
            rng: &mut fx.rng,
        };
        assert!(matches!(
            runner.step(&mut ctx, Resume::Continue),
            Step::Suspend(SuspendReason::Animation(_))
        ));
        assert!(matches!(
            runner.step(&mut ctx, Resume::Continue),
            Step::Suspend(SuspendReason::AwaitDamage(_))
        ));
        assert_eq!(runner.step(&mut ctx, Resume::Failed), Step::Done);
        assert!(runner.is_finished());
    }

    #[test]
    fn test_flatten_nested_sequences() {
        let wait = |ms| Command::Wait {
            unit: UnitId(1),
            duration: Duration::from_millis(ms),
        };
        let nested = Command::Sequence {
            commands: vec![wait(1), Command::Sequence { commands: vec![wait(2), wait(3)] }],
        };
        let flat = nested.flatten();
        assert_eq!(flat, vec![wait(1), wait(2), wait(3)]);
    }

    #[test]
    fn test_unknown_status_is_no_effect() {
        let mut fx = Fixture::new();
        let reasons = fx.run(Command::ApplyStatus {
            source: UnitId(1),
            target: UnitId(2),
            status_id: "status_frozen".into(),
        });
        assert!(reasons.is_empty());
        assert!(fx.state.statuses.effects_of(UnitId(2)).is_empty());
    }
}
