//! Turn engine integration tests

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::mpsc;
use valor_tactics::battle::*;
use valor_tactics::core::config::BattleConfig;
use valor_tactics::core::types::{Allegiance, GridPos, UnitId};

fn knight_defs() -> Definitions {
    let mut defs = Definitions::new();
    let mut knight = ClassDef::new("knight", 3);
    knight.attack_dice = DiceSpec::new(1, 6);
    defs.insert_class(knight);
    defs
}

fn stats(max_hp: i32, attack: i32, speed: i32) -> StatBlock {
    StatBlock {
        max_hp,
        attack,
        speed,
        strength: 0,
        ..StatBlock::default()
    }
}

/// Friendly unit 1 (fast) next to hostile unit 2 (slow)
fn adjacent_duel(defs: &Definitions, defender_skill: Option<&str>) -> BattleState {
    let mut state = BattleState::new(Grid::new(6, 6), 1);
    state
        .spawn(
            UnitSpawn::new(1, "knight", Allegiance::Friendly, GridPos::new(0, 0)).with_stats(stats(20, 5, 12)),
            defs,
        )
        .unwrap();
    let mut defender =
        UnitSpawn::new(2, "knight", Allegiance::Hostile, GridPos::new(1, 0)).with_stats(stats(20, 3, 8));
    if let Some(skill) = defender_skill {
        defender = defender.with_skill(skill);
    }
    state.spawn(defender, defs).unwrap();
    state
}

fn engine(state: BattleState, defs: Definitions, config: BattleConfig, resolver: ResolverHandle) -> BattleEngine {
    BattleEngine::new(state, defs, config, resolver).unwrap()
}

/// StartTurn -> ProcessUnitTurn -> EndTurn
async fn play_round(engine: &mut BattleEngine) {
    for _ in 0..3 {
        engine.step().await;
    }
}

fn attacks_by(events: &[BattleEvent], unit: UnitId) -> Vec<(UnitId, bool)> {
    events
        .iter()
        .filter_map(|e| match &e.event_type {
            BattleEventType::UnitAttackAttempted {
                attacker,
                target,
                is_counter,
                ..
            } if *attacker == unit => Some((*target, *is_counter)),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_round_of_basic_attacks() {
    let defs = knight_defs();
    let state = adjacent_duel(&defs, None);
    let (resolver, _worker) = spawn_resolver(4);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver)
        .with_random(ScriptedRandom::new().with_dice([4, 2]));

    play_round(&mut engine).await;

    // 4 + 5 attack = 9 on unit 2, then 2 + 3 attack = 5 back
    let state = engine.state();
    let one = state.units.index_of(UnitId(1)).unwrap();
    let two = state.units.index_of(UnitId(2)).unwrap();
    assert_eq!(state.units.hp(two), 11);
    assert_eq!(state.units.hp(one), 15);

    let events = engine.events();
    assert!(matches!(events[0].event_type, BattleEventType::BattleStart { units: 2, .. }));
    assert!(events.iter().any(|e| matches!(
        &e.event_type,
        BattleEventType::DisplayDamage { unit: UnitId(2), amount: 9, color, source: Some(UnitId(1)), is_counter: false }
            if color == COLOR_HP_DAMAGE
    )));
    assert!(events.iter().all(|e| e.turn <= 1));
}

#[tokio::test]
async fn test_counter_attack_fires_once() {
    let mut defs = knight_defs();
    defs.insert_skill(SkillDef::new(
        "riposte",
        0.0,
        SkillEffect::Reaction {
            chance: 50.0,
            damage_modifier: 1.0,
        },
    ));
    let state = adjacent_duel(&defs, Some("riposte"));
    let (resolver, _worker) = spawn_resolver(4);
    // Dice: unit 1 rolls 4, the counter rolls 2, unit 2's own attack rolls 1
    // Percent: the riposte check draws 10
    let rng = ScriptedRandom::new().with_dice([4, 2, 1]).with_percents([10.0]);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(rng);

    play_round(&mut engine).await;

    let events = engine.events();
    assert_eq!(attacks_by(events, UnitId(2)), vec![(UnitId(1), true), (UnitId(1), false)]);
    assert!(events.iter().any(|e| matches!(
        &e.event_type,
        BattleEventType::DisplayDamage { unit: UnitId(1), amount: 5, color, is_counter: true, .. }
            if color == COLOR_COUNTER
    )));

    // 20 - (2 + 3) - (1 + 3)
    let one = engine.state().units.index_of(UnitId(1)).unwrap();
    assert_eq!(engine.state().units.hp(one), 11);
}

#[tokio::test]
async fn test_stun_skips_turn_then_expires() {
    let mut defs = knight_defs();
    defs.insert_status(StatusEffectDef::new("stunned", 1, StatusPayload::Disable));
    defs.insert_skill(SkillDef::new(
        "stunning_blow",
        0.0,
        SkillEffect::Debuff {
            status: "stunned".into(),
            chance: 100.0,
            luck_scaling: 0.0,
        },
    ));

    let mut state = BattleState::new(Grid::new(6, 6), 1);
    state
        .spawn(
            UnitSpawn::new(1, "knight", Allegiance::Friendly, GridPos::new(0, 0))
                .with_stats(stats(20, 5, 12))
                .with_skill("stunning_blow"),
            &defs,
        )
        .unwrap();
    state
        .spawn(
            UnitSpawn::new(2, "knight", Allegiance::Hostile, GridPos::new(1, 0)).with_stats(stats(20, 3, 8)),
            &defs,
        )
        .unwrap();

    let (resolver, _worker) = spawn_resolver(4);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(ScriptedRandom::new());

    play_round(&mut engine).await;

    let events = engine.events();
    assert!(attacks_by(events, UnitId(2)).is_empty());

    let applied = events.iter().position(|e| {
        matches!(
            &e.event_type,
            BattleEventType::StatusEffectApplied { unit: UnitId(2), status_id, duration: 1 } if status_id == "stunned"
        )
    });
    let expired = events.iter().position(|e| {
        matches!(
            &e.event_type,
            BattleEventType::StatusEffectRemoved { unit: UnitId(2), reason: RemovalReason::Expired, .. }
        )
    });
    assert!(applied.unwrap() < expired.unwrap());
    assert!(!engine.state().statuses.has(UnitId(2), "stunned"));
}

#[tokio::test]
async fn test_death_prunes_turn_order() {
    let defs = knight_defs();
    let mut state = BattleState::new(Grid::new(8, 8), 1);
    state
        .spawn(
            UnitSpawn::new(1, "knight", Allegiance::Friendly, GridPos::new(0, 0)).with_stats(stats(20, 50, 12)),
            &defs,
        )
        .unwrap();
    state
        .spawn(
            UnitSpawn::new(2, "knight", Allegiance::Hostile, GridPos::new(1, 0))
                .with_stats(stats(5, 3, 8))
                .with_equipment(EquippedItem {
                    id: "spear".into(),
                    weight: 0,
                    is_weapon: true,
                }),
            &defs,
        )
        .unwrap();
    state
        .spawn(
            UnitSpawn::new(3, "knight", Allegiance::Hostile, GridPos::new(7, 7)).with_stats(stats(20, 3, 6)),
            &defs,
        )
        .unwrap();

    let (resolver, _worker) = spawn_resolver(4);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(ScriptedRandom::new());

    play_round(&mut engine).await;

    let state = engine.state();
    assert!(!state.units.is_alive_id(UnitId(2)));
    assert!(!state.turn_order.contains(UnitId(2)));
    assert!(state.turn_order.was_removed(UnitId(2)));
    assert_eq!(state.turn_order.snapshot(), vec![UnitId(1), UnitId(3)]);

    let events = engine.events();
    assert!(events.iter().any(|e| e.event_type
        == BattleEventType::UnitDeath {
            unit: UnitId(2),
            killer: Some(UnitId(1)),
        }));
    assert!(events.iter().any(|e| e.event_type
        == BattleEventType::WeaponDropped {
            unit: UnitId(2),
            item_id: "spear".into(),
            position: GridPos::new(1, 0),
        }));
    assert!(!events
        .iter()
        .any(|e| e.event_type == BattleEventType::UnitTurnStart { unit: UnitId(2) }));
    // Unit 3 is out of reach and walks closer instead
    assert!(events
        .iter()
        .any(|e| matches!(e.event_type, BattleEventType::UnitMoved { unit: UnitId(3), .. })));
}

#[tokio::test]
async fn test_dropped_worker_aborts_battle() {
    let defs = knight_defs();
    let state = adjacent_duel(&defs, None);
    let (sender, receiver) = mpsc::channel::<ResolverEnvelope>(1);
    drop(receiver);

    let resolver = ResolverHandle::new(sender, Duration::from_secs(1));
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(ScriptedRandom::new());

    let summary = engine.run().await;
    assert_eq!(summary.reason, EndReason::ResolverFailure);
    assert_eq!(summary.turns, 1);

    let events = engine.events();
    assert!(events.iter().any(|e| matches!(
        &e.event_type,
        BattleEventType::CriticalError { source, .. } if source == RESOLVER_ERROR_SOURCE
    )));
    assert!(matches!(
        events.last().unwrap().event_type,
        BattleEventType::BattleEnd {
            reason: EndReason::ResolverFailure,
            ..
        }
    ));
}

#[tokio::test]
async fn test_silent_worker_times_out_and_round_ends() {
    let defs = knight_defs();
    let state = adjacent_duel(&defs, None);

    // Worker that accepts requests and never answers
    let (sender, mut receiver) = mpsc::channel::<ResolverEnvelope>(4);
    let _worker = tokio::spawn(async move {
        let mut held = Vec::new();
        while let Some(envelope) = receiver.recv().await {
            held.push(envelope);
        }
    });

    let config = BattleConfig {
        resolver_timeout_ms: 30,
        halt_on_resolver_failure: false,
        ..BattleConfig::default()
    };
    let resolver = ResolverHandle::new(sender, Duration::from_secs(10));
    let mut engine = engine(state, defs, config, resolver).with_random(ScriptedRandom::new());

    assert_eq!(engine.step().await, TurnPhase::ProcessUnitTurn);
    // Unit 1's attack fails; unit 2 never gets to act this round
    assert_eq!(engine.step().await, TurnPhase::EndTurn);

    let events = engine.events();
    assert!(events
        .iter()
        .any(|e| matches!(e.event_type, BattleEventType::CriticalError { .. })));
    assert!(attacks_by(events, UnitId(2)).is_empty());
    assert_eq!(engine.step().await, TurnPhase::StartTurn);
}

#[tokio::test]
async fn test_hooks_and_listeners_see_the_battle() {
    let defs = knight_defs();
    let state = adjacent_duel(&defs, None);
    let (resolver, _worker) = spawn_resolver(4);
    let config = BattleConfig {
        max_turns: 2,
        ..BattleConfig::default()
    };
    let mut engine = engine(state, defs, config, resolver).with_random(ScriptedRandom::new());

    let unit_turns = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&unit_turns);
    engine.register_hook(HookPoint::UnitTurnStart, move |_ctx: &HookContext<'_>| {
        counter.fetch_add(1, Ordering::SeqCst);
        None
    });
    engine.register_hook(HookPoint::StartOfTurn, |_ctx: &HookContext<'_>| Some(Duration::from_millis(1)));

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    engine.subscribe(move |event: &BattleEvent| {
        sink.lock().unwrap().push(event.clone());
    });

    let summary = engine.run().await;
    assert_eq!(summary.reason, EndReason::TurnLimit);
    assert_eq!(unit_turns.load(Ordering::SeqCst), 4);
    assert_eq!(seen.lock().unwrap().as_slice(), engine.events());
}

#[tokio::test]
async fn test_skill_roll_picks_active_skill() {
    let mut defs = knight_defs();
    defs.insert_skill(SkillDef::new(
        "power_strike",
        40.0,
        SkillEffect::Active {
            dice: DiceSpec::new(2, 6),
            damage_type: DamageType::Physical,
            range: 1,
            damage_modifier: 2.0,
            apply_status: None,
        },
    ));
    let mut state = BattleState::new(Grid::new(6, 6), 1);
    state
        .spawn(
            UnitSpawn::new(1, "knight", Allegiance::Friendly, GridPos::new(0, 0))
                .with_stats(stats(20, 5, 12))
                .with_skill("power_strike"),
            &defs,
        )
        .unwrap();
    state
        .spawn(
            UnitSpawn::new(2, "knight", Allegiance::Hostile, GridPos::new(1, 0)).with_stats(stats(40, 3, 8)),
            &defs,
        )
        .unwrap();

    let (resolver, _worker) = spawn_resolver(4);
    let rng = ScriptedRandom::new().with_dice([3, 4]).with_percents([12.0]);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(rng);

    play_round(&mut engine).await;

    let events = engine.events();
    assert!(events.iter().any(|e| matches!(
        &e.event_type,
        BattleEventType::UnitAttackAttempted { attacker: UnitId(1), skill: Some(skill), .. } if skill == "power_strike"
    )));
    // (3 + 4 + 5 attack) * 2.0
    let two = engine.state().units.index_of(UnitId(2)).unwrap();
    assert_eq!(engine.state().units.hp(two), 16);
}

#[tokio::test]
async fn test_lethal_poison_kills_before_acting() {
    let mut defs = knight_defs();
    let poison = StatusEffectDef::new("poisoned", 3, StatusPayload::DamageOverTime { amount: 50 });
    defs.insert_status(poison.clone());

    let mut state = adjacent_duel(&defs, None);
    state.statuses.apply(UnitId(1), &poison, &mut EventBus::new());

    let (resolver, _worker) = spawn_resolver(4);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(ScriptedRandom::new());

    let summary = engine.run().await;
    assert_eq!(summary.reason, EndReason::Defeat);
    assert_eq!(summary.turns, 1);

    let events = engine.events();
    assert!(attacks_by(events, UnitId(1)).is_empty());
    assert!(events.iter().any(|e| matches!(
        &e.event_type,
        BattleEventType::DisplayDamage { unit: UnitId(1), amount: 20, color, source: None, .. }
            if color == COLOR_DAMAGE_OVER_TIME
    )));
    assert!(events.iter().any(|e| e.event_type
        == BattleEventType::UnitDeath {
            unit: UnitId(1),
            killer: None,
        }));
}

#[tokio::test]
async fn test_last_stand_softens_hits_on_wounded_defender() {
    let mut defs = knight_defs();
    defs.insert_skill(SkillDef::new(
        "last_stand",
        0.0,
        SkillEffect::Passive {
            kind: PassiveKind::HpLossReduction,
            max_reduction: 0.4,
        },
    ));

    let mut state = BattleState::new(Grid::new(6, 6), 1);
    state
        .spawn(
            UnitSpawn::new(1, "knight", Allegiance::Friendly, GridPos::new(0, 0)).with_stats(stats(20, 15, 12)),
            &defs,
        )
        .unwrap();
    state
        .spawn(
            UnitSpawn::new(2, "knight", Allegiance::Hostile, GridPos::new(1, 0))
                .with_stats(stats(40, 3, 8))
                .with_skill("last_stand"),
            &defs,
        )
        .unwrap();

    let (resolver, _worker) = spawn_resolver(4);
    // Round 1: unit 1 rolls 5, unit 2 rolls 1. Round 2: unit 1 rolls 6
    let rng = ScriptedRandom::new().with_dice([5, 1, 6]);
    let mut engine = engine(state, defs, BattleConfig::default(), resolver).with_random(rng);

    // Unhurt, so the full 5 + 15 lands
    play_round(&mut engine).await;
    let two = engine.state().units.index_of(UnitId(2)).unwrap();
    assert_eq!(engine.state().units.hp(two), 20);

    // Half hp lost: 0.4 * 0.5 = 0.2 reduction, floor(21 * 0.8) = 16
    play_round(&mut engine).await;
    assert_eq!(engine.state().units.hp(two), 4);
    assert!(engine.events().iter().any(|e| matches!(
        e.event_type,
        BattleEventType::DamageCalculated { unit: UnitId(2), hp_damage: 16, new_hp: 4, .. }
    )));
}
