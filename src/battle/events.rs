//! Battle events and the event bus
//!
//! The bus is an explicit value owned by the engine and lent to whoever
//! publishes. Listeners see each event immediately; reaction dispatch reads
//! the same events later from the pending queue.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::types::{BattleId, GridPos, Turn, UnitId};

/// Why a battle stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// No hostile unit left standing
    Victory,
    /// No friendly unit left standing
    Defeat,
    /// Both sides eliminated at once
    Draw,
    /// The running flag was cleared by the host
    Halted,
    /// `max_turns` rounds were played
    TurnLimit,
    /// The damage resolver failed and the config says to stop
    ResolverFailure,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EndReason::Victory => "victory",
            EndReason::Defeat => "defeat",
            EndReason::Draw => "draw",
            EndReason::Halted => "halted",
            EndReason::TurnLimit => "turn limit",
            EndReason::ResolverFailure => "resolver failure",
        };
        f.write_str(name)
    }
}

/// Phase announced through `TurnPhase` events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPhaseKind {
    StartOfTurn,
    UnitActions,
    EndOfTurn,
}

/// Why a status effect left a unit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RemovalReason {
    Expired,
    Cancelled,
    UnitDied,
}

/// Log entry for battle events
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BattleEvent {
    pub turn: Turn,
    pub event_type: BattleEventType,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BattleEventType {
    BattleStart {
        battle_id: BattleId,
        units: usize,
    },
    BattleEnd {
        battle_id: BattleId,
        reason: EndReason,
    },
    TurnStart,
    TurnEnd,
    TurnPhase {
        phase: TurnPhaseKind,
    },
    UnitTurnStart {
        unit: UnitId,
    },
    UnitTurnEnd {
        unit: UnitId,
    },
    UnitMoved {
        unit: UnitId,
        from: GridPos,
        to: GridPos,
    },
    UnitAttackAttempted {
        attacker: UnitId,
        target: UnitId,
        skill: Option<String>,
        is_counter: bool,
    },
    DamageCalculated {
        unit: UnitId,
        hp_damage: i32,
        barrier_damage: i32,
        new_hp: i32,
        new_barrier: i32,
    },
    DisplayDamage {
        unit: UnitId,
        amount: i32,
        color: String,
        /// Attacking unit; None for damage over time
        source: Option<UnitId>,
        is_counter: bool,
    },
    StatusEffectApplied {
        unit: UnitId,
        status_id: String,
        duration: i32,
    },
    StatusEffectRemoved {
        unit: UnitId,
        status_id: String,
        reason: RemovalReason,
    },
    UnitDeath {
        unit: UnitId,
        killer: Option<UnitId>,
    },
    WeaponDropped {
        unit: UnitId,
        item_id: String,
        position: GridPos,
    },
    CriticalError {
        source: String,
        message: String,
    },
}

impl fmt::Display for BattleEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BattleEventType::BattleStart { battle_id, units } => {
                write!(f, "battle {} starts with {} units", battle_id, units)
            }
            BattleEventType::BattleEnd { reason, .. } => write!(f, "battle over: {}", reason),
            BattleEventType::TurnStart => write!(f, "turn start"),
            BattleEventType::TurnEnd => write!(f, "turn end"),
            BattleEventType::TurnPhase { phase } => write!(f, "phase {:?}", phase),
            BattleEventType::UnitTurnStart { unit } => write!(f, "{} acts", unit),
            BattleEventType::UnitTurnEnd { unit } => write!(f, "{} done", unit),
            BattleEventType::UnitMoved { unit, from, to } => {
                write!(f, "{} moves {} -> {}", unit, from, to)
            }
            BattleEventType::UnitAttackAttempted {
                attacker,
                target,
                skill,
                is_counter,
            } => {
                let verb = if *is_counter { "counters" } else { "attacks" };
                match skill {
                    Some(skill) => write!(f, "{} {} {} with {}", attacker, verb, target, skill),
                    None => write!(f, "{} {} {}", attacker, verb, target),
                }
            }
            BattleEventType::DamageCalculated {
                unit,
                hp_damage,
                barrier_damage,
                new_hp,
                new_barrier,
            } => write!(
                f,
                "{} takes {} hp / {} barrier (now {} hp, {} barrier)",
                unit, hp_damage, barrier_damage, new_hp, new_barrier
            ),
            BattleEventType::DisplayDamage {
                unit, amount, color, ..
            } => write!(f, "{} shows {} [{}]", unit, amount, color),
            BattleEventType::StatusEffectApplied {
                unit,
                status_id,
                duration,
            } => write!(f, "{} gains {} ({})", unit, status_id, duration),
            BattleEventType::StatusEffectRemoved {
                unit,
                status_id,
                reason,
            } => write!(f, "{} loses {} ({:?})", unit, status_id, reason),
            BattleEventType::UnitDeath { unit, .. } => write!(f, "{} dies", unit),
            BattleEventType::WeaponDropped {
                unit,
                item_id,
                position,
            } => write!(f, "{} drops {} at {}", unit, item_id, position),
            BattleEventType::CriticalError { source, message } => {
                write!(f, "critical error in {}: {}", source, message)
            }
        }
    }
}

/// Fire-and-forget event consumer (presentation, logging, tests)
pub trait EventListener: Send {
    fn on_event(&mut self, event: &BattleEvent);
}

impl<F> EventListener for F
where
    F: FnMut(&BattleEvent) + Send,
{
    fn on_event(&mut self, event: &BattleEvent) {
        self(event)
    }
}

/// Explicit event bus, one per battle
#[derive(Default)]
pub struct EventBus {
    turn: Turn,
    listeners: Vec<Box<dyn EventListener>>,
    history: Vec<BattleEvent>,
    pending: VecDeque<BattleEvent>,
}

impl fmt::Debug for EventBus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventBus")
            .field("turn", &self.turn)
            .field("listeners", &self.listeners.len())
            .field("history", &self.history.len())
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self, listener: impl EventListener + 'static) {
        self.listeners.push(Box::new(listener));
    }

    /// Turn stamped on subsequently published events
    pub fn set_turn(&mut self, turn: Turn) {
        self.turn = turn;
    }

    pub fn turn(&self) -> Turn {
        self.turn
    }

    pub fn publish(&mut self, event_type: BattleEventType) {
        let event = BattleEvent {
            turn: self.turn,
            event_type,
        };
        tracing::trace!(turn = event.turn, "{}", event.event_type);

        for listener in self.listeners.iter_mut() {
            listener.on_event(&event);
        }
        self.pending.push_back(event.clone());
        self.history.push(event);
    }

    /// Everything published so far
    pub fn history(&self) -> &[BattleEvent] {
        &self.history
    }

    /// Take the events not yet seen by reaction dispatch
    pub fn drain_pending(&mut self) -> Vec<BattleEvent> {
        self.pending.drain(..).collect()
    }
}
