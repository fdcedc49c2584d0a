//! Turn state machine
//!
//! StartTurn -> ProcessUnitTurn -> EndTurn -> StartTurn ... or Terminated.
//! Everything runs on the caller's task, one unit at a time. The only
//! awaits are command suspensions, hook delays, the inter-turn delay and the
//! resolver round trip.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::Instrument;

use crate::battle::ai::{AiEngine, UnitAi};
use crate::battle::commands::{
    Command, CommandContext, CommandRunner, NoPresentation, Presentation, Resume, Step,
    SuspendReason,
};
use crate::battle::constants::RESOLVER_ERROR_SOURCE;
use crate::battle::definitions::Definitions;
use crate::battle::dice::{RandomSource, SeededRandom};
use crate::battle::events::{BattleEvent, BattleEventType, EndReason, EventBus, EventListener, TurnPhaseKind};
use crate::battle::hooks::{HookContext, HookPoint, HookRegistry, TurnHook};
use crate::battle::reactions::{default_hooks, Reaction, ReactionHook, ReactionView};
use crate::battle::resolver::ResolverHandle;
use crate::battle::state::BattleState;
use crate::core::config::BattleConfig;
use crate::core::error::{BattleError, Result};
use crate::core::types::{BattleId, Turn, UnitId};

/// State machine position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TurnPhase {
    StartTurn,
    ProcessUnitTurn,
    EndTurn,
    Terminated(EndReason),
}

/// External control over a running battle
///
/// Clearing the running flag stops the battle at the next phase boundary;
/// work already in flight finishes first.
#[derive(Debug, Clone)]
pub struct BattleHandle {
    running: Arc<AtomicBool>,
}

impl BattleHandle {
    pub fn halt(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Final report of a battle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleSummary {
    pub battle_id: BattleId,
    pub reason: EndReason,
    pub turns: Turn,
    pub survivors: Vec<UnitId>,
}

pub struct BattleEngine {
    id: BattleId,
    state: BattleState,
    definitions: Definitions,
    config: BattleConfig,
    resolver: ResolverHandle,
    ai: Box<dyn UnitAi>,
    rng: Box<dyn RandomSource>,
    presentation: Box<dyn Presentation>,
    bus: EventBus,
    hooks: HookRegistry,
    reactions: Vec<Box<dyn ReactionHook>>,
    post_action: VecDeque<Command>,
    phase: TurnPhase,
    running: Arc<AtomicBool>,
    started: bool,
}

impl std::fmt::Debug for BattleEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BattleEngine")
            .field("id", &self.id)
            .field("phase", &self.phase)
            .field("turn", &self.state.turn)
            .field("units", &self.state.units.len())
            .finish()
    }
}

async fn pause(duration: Duration) {
    if !duration.is_zero() {
        tokio::time::sleep(duration).await;
    }
}

impl BattleEngine {
    /// Set up a battle over already-spawned units
    pub fn new(
        state: BattleState,
        definitions: Definitions,
        config: BattleConfig,
        resolver: ResolverHandle,
    ) -> Result<Self> {
        config.validate()?;

        for problem in definitions.dangling_references() {
            tracing::warn!("Definitions: {}", problem);
        }

        Ok(Self {
            id: BattleId::new(),
            state,
            definitions,
            rng: Box::new(SeededRandom::new(config.seed)),
            ai: Box::new(AiEngine::new(config.target_score_base)),
            resolver: resolver.with_timeout(config.resolver_timeout()),
            config,
            presentation: Box::new(NoPresentation),
            bus: EventBus::new(),
            hooks: HookRegistry::new(),
            reactions: default_hooks(),
            post_action: VecDeque::new(),
            phase: TurnPhase::StartTurn,
            running: Arc::new(AtomicBool::new(true)),
            started: false,
        })
    }

    pub fn with_random(mut self, rng: impl RandomSource + 'static) -> Self {
        self.rng = Box::new(rng);
        self
    }

    pub fn with_ai(mut self, ai: impl UnitAi + 'static) -> Self {
        self.ai = Box::new(ai);
        self
    }

    pub fn with_presentation(mut self, presentation: impl Presentation + 'static) -> Self {
        self.presentation = Box::new(presentation);
        self
    }

    pub fn register_hook(&mut self, point: HookPoint, hook: impl TurnHook + 'static) {
        self.hooks.register(point, hook);
    }

    pub fn register_reaction(&mut self, hook: impl ReactionHook + 'static) {
        self.reactions.push(Box::new(hook));
    }

    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        self.bus.subscribe(listener);
    }

    pub fn handle(&self) -> BattleHandle {
        BattleHandle {
            running: Arc::clone(&self.running),
        }
    }

    pub fn battle_id(&self) -> BattleId {
        self.id
    }

    pub fn state(&self) -> &BattleState {
        &self.state
    }

    pub fn definitions(&self) -> &Definitions {
        &self.definitions
    }

    pub fn phase(&self) -> TurnPhase {
        self.phase
    }

    pub fn events(&self) -> &[BattleEvent] {
        self.bus.history()
    }

    /// Play the battle to the end
    pub async fn run(&mut self) -> BattleSummary {
        let span = tracing::info_span!("battle", id = %self.id);
        async {
            loop {
                if let TurnPhase::Terminated(reason) = self.step().await {
                    return self.summary(reason);
                }
            }
        }
        .instrument(span)
        .await
    }

    /// Advance exactly one phase and return the new one
    pub async fn step(&mut self) -> TurnPhase {
        if !self.started {
            self.start();
        }

        let next = match self.phase {
            TurnPhase::StartTurn => self.start_turn().await,
            TurnPhase::ProcessUnitTurn => self.process_units().await,
            TurnPhase::EndTurn => self.end_turn().await,
            terminated @ TurnPhase::Terminated(_) => return terminated,
        };
        self.phase = next;
        next
    }

    pub fn summary(&self, reason: EndReason) -> BattleSummary {
        BattleSummary {
            battle_id: self.id,
            reason,
            turns: self.state.turn,
            survivors: self.state.survivors(),
        }
    }

    fn start(&mut self) {
        self.started = true;
        self.state.compute_turn_order();
        self.state.refresh_passives(&self.definitions);

        tracing::info!(
            "Battle {} starts: {} units, {} in turn order",
            self.id,
            self.state.units.len(),
            self.state.turn_order.len()
        );
        self.bus.publish(BattleEventType::BattleStart {
            battle_id: self.id,
            units: self.state.units.len(),
        });
    }

    fn terminate(&mut self, reason: EndReason) -> TurnPhase {
        self.running.store(false, Ordering::SeqCst);
        tracing::info!("Battle {} over after {} turns: {}", self.id, self.state.turn, reason);
        self.bus.publish(BattleEventType::BattleEnd {
            battle_id: self.id,
            reason,
        });
        TurnPhase::Terminated(reason)
    }

    async fn start_turn(&mut self) -> TurnPhase {
        if !self.running.load(Ordering::SeqCst) {
            return self.terminate(EndReason::Halted);
        }
        if let Some(reason) = self.state.check_outcome() {
            return self.terminate(reason);
        }
        if self.config.max_turns > 0 && self.state.turn >= self.config.max_turns {
            return self.terminate(EndReason::TurnLimit);
        }

        self.state.turn += 1;
        self.bus.set_turn(self.state.turn);
        tracing::debug!("Turn {} begins", self.state.turn);

        self.bus.publish(BattleEventType::TurnStart);
        self.bus.publish(BattleEventType::TurnPhase {
            phase: TurnPhaseKind::StartOfTurn,
        });
        self.run_hooks(HookPoint::StartOfTurn, None).await;

        TurnPhase::ProcessUnitTurn
    }

    async fn process_units(&mut self) -> TurnPhase {
        self.bus.publish(BattleEventType::TurnPhase {
            phase: TurnPhaseKind::UnitActions,
        });

        for unit in self.state.turn_order.snapshot() {
            if !self.state.turn_order.contains(unit) || !self.state.units.is_alive_id(unit) {
                continue;
            }

            if let Err(err) = self.unit_turn(unit).await {
                return self.round_failed(err);
            }

            if self.state.check_outcome().is_some() {
                break;
            }
        }

        TurnPhase::EndTurn
    }

    async fn end_turn(&mut self) -> TurnPhase {
        self.bus.publish(BattleEventType::TurnPhase {
            phase: TurnPhaseKind::EndOfTurn,
        });
        self.run_hooks(HookPoint::EndOfTurn, None).await;
        self.bus.publish(BattleEventType::TurnEnd);

        pause(self.config.inter_turn_delay()).await;

        if !self.running.load(Ordering::SeqCst) {
            return self.terminate(EndReason::Halted);
        }
        TurnPhase::StartTurn
    }

    async fn unit_turn(&mut self, unit: UnitId) -> Result<()> {
        let idx = self
            .state
            .units
            .index_of(unit)
            .ok_or(BattleError::UnitNotFound(unit))?;

        self.bus.publish(BattleEventType::UnitTurnStart { unit });
        self.run_hooks(HookPoint::UnitTurnStart, Some(unit)).await;

        self.state.refresh_passives(&self.definitions);
        self.state.apply_damage_over_time(idx, &mut self.bus);
        self.dispatch_reactions();

        if self.state.units.is_alive(idx) {
            if self.state.statuses.is_disabled(unit) {
                tracing::debug!("{} is disabled and waits", unit);
                pause(self.config.disabled_wait()).await;
            } else {
                let decision = self.ai.decide(idx, &self.state, &self.definitions, self.rng.as_mut());
                match decision {
                    Some(command) => self.execute(command).await?,
                    None => tracing::debug!("{} takes no action", unit),
                }
            }
        }

        while let Some(command) = self.post_action.pop_front() {
            self.execute(command).await?;
        }

        if self.state.units.is_alive(idx) {
            self.state.statuses.tick(unit, &mut self.bus);
        }

        self.run_hooks(HookPoint::UnitTurnEnd, Some(unit)).await;
        self.bus.publish(BattleEventType::UnitTurnEnd { unit });
        Ok(())
    }

    /// Step a command to completion, resolving each suspension in turn
    async fn execute(&mut self, command: Command) -> Result<()> {
        let mut runner = CommandRunner::new(command);
        let mut resume = Resume::Continue;

        loop {
            let step = {
                let mut ctx = CommandContext {
                    state: &mut self.state,
                    definitions: &self.definitions,
                    bus: &mut self.bus,
                    rng: self.rng.as_mut(),
                };
                runner.step(&mut ctx, resume)
            };
            self.dispatch_reactions();

            resume = match step {
                Step::Done => return Ok(()),
                Step::Suspend(SuspendReason::Animation(cue)) => {
                    pause(self.presentation.animation_delay(&cue)).await;
                    Resume::Continue
                }
                Step::Suspend(SuspendReason::Delay(duration)) => {
                    pause(duration).await;
                    Resume::Continue
                }
                Step::Suspend(SuspendReason::AwaitDamage(request)) => {
                    match self.resolver.request(request).await {
                        Ok(response) => Resume::Damage(response),
                        Err(err) => {
                            let mut ctx = CommandContext {
                                state: &mut self.state,
                                definitions: &self.definitions,
                                bus: &mut self.bus,
                                rng: self.rng.as_mut(),
                            };
                            runner.step(&mut ctx, Resume::Failed);
                            return Err(err);
                        }
                    }
                }
            };
        }
    }

    /// Feed newly published events to the reaction hooks
    fn dispatch_reactions(&mut self) {
        loop {
            let events = self.bus.drain_pending();
            if events.is_empty() {
                break;
            }

            for event in &events {
                for hook in self.reactions.iter_mut() {
                    let view = ReactionView {
                        units: &self.state.units,
                        definitions: &self.definitions,
                    };
                    let reactions = hook.on_event(event, &view, self.rng.as_mut());

                    for reaction in reactions {
                        match reaction {
                            Reaction::ApplyStatus {
                                source,
                                target,
                                status_id,
                            } => {
                                if !self.state.units.is_alive_id(target) {
                                    continue;
                                }
                                if let Some(definition) = self.definitions.status(&status_id) {
                                    tracing::debug!("{} applies {} to {}", source, status_id, target);
                                    self.state.statuses.apply(target, definition, &mut self.bus);
                                }
                            }
                            Reaction::Counter(command) => self.post_action.push_back(command),
                        }
                    }
                }
            }
        }
    }

    /// A failed command abandons the rest of the round. Only a resolver
    /// failure can end the battle; anything else resumes at EndTurn.
    fn round_failed(&mut self, err: BattleError) -> TurnPhase {
        let resolver_failure = err.is_resolver_failure();
        let source = if resolver_failure {
            RESOLVER_ERROR_SOURCE
        } else {
            "engine"
        };
        tracing::error!("Round {} aborted: {}", self.state.turn, err);

        self.bus.publish(BattleEventType::CriticalError {
            source: source.to_string(),
            message: err.to_string(),
        });
        self.post_action.clear();

        if resolver_failure && self.config.halt_on_resolver_failure {
            self.terminate(EndReason::ResolverFailure)
        } else {
            TurnPhase::EndTurn
        }
    }

    async fn run_hooks(&mut self, point: HookPoint, unit: Option<UnitId>) {
        for index in self.hooks.indices_for(point) {
            let delay = {
                let ctx = HookContext {
                    point,
                    turn: self.state.turn,
                    unit,
                    units: &self.state.units,
                    statuses: &self.state.statuses,
                };
                self.hooks.call(index, &ctx)
            };
            if let Some(delay) = delay {
                pause(delay).await;
            }
        }
    }
}
