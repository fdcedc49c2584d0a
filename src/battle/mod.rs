//! Battle core - turn resolution and combat decisions on a tile grid
//!
//! Each round the engine asks the turn order who acts, the AI what it does,
//! the resolver how much it hurts, and the status ledger what wears off.
//!
//! Key pieces:
//! - Units live in a component table indexed by `UnitIndex`
//! - AI is a skill roll followed by a class behaviour
//! - Commands are stepped by an interpreter that yields typed suspensions
//! - Damage resolution runs on a worker task behind a message contract

pub mod ai;
pub mod commands;
pub mod constants;
pub mod damage;
pub mod definitions;
pub mod dice;
pub mod engine;
pub mod events;
pub mod formulas;
pub mod grid;
pub mod hooks;
pub mod passives;
pub mod pathfinding;
pub mod reactions;
pub mod resolver;
pub mod scenario;
pub mod scheduler;
pub mod state;
pub mod status;
pub mod targeting;
pub mod units;

// Re-exports for convenient access
pub use ai::{AiEngine, UnitAi};
pub use commands::{
    AnimationCue, Command, CommandContext, CommandRunner, NoPresentation, Presentation, Resume,
    Step, SuspendReason,
};
pub use constants::*;
pub use damage::{
    resolve_damage, split_damage, AttackPayload, DamageRequest, DamageResponse, ResolverMessage,
};
pub use definitions::{
    BehaviorKind, BuffTarget, ClassDef, DamageType, Definitions, PassiveKind, SkillDef,
    SkillEffect, StatusEffectDef, StatusPayload,
};
pub use dice::{roll, DiceSpec, RandomSource, ScriptedRandom, SeededRandom};
pub use engine::{BattleEngine, BattleHandle, BattleSummary, TurnPhase};
pub use events::{
    BattleEvent, BattleEventType, EndReason, EventBus, EventListener, RemovalReason,
    TurnPhaseKind,
};
pub use grid::Grid;
pub use hooks::{HookContext, HookPoint, HookRegistry, TurnHook};
pub use passives::PassiveEvaluator;
pub use pathfinding::{find_path, reachable_tiles};
pub use reactions::{
    default_hooks, CounterAttackHook, OnHitDebuffHook, Reaction, ReactionHook, ReactionView,
};
pub use resolver::{spawn_resolver, ResolverEnvelope, ResolverHandle};
pub use scenario::Scenario;
pub use scheduler::{TurnOrder, TurnOrderEntry};
pub use state::{BattleState, HitKind};
pub use status::{StatusEffectInstance, StatusLedger};
pub use units::{EquippedItem, StatBlock, UnitSnapshot, UnitSpawn, UnitTable};
