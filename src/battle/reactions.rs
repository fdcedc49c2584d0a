//! Reaction hooks driven by battle events
//!
//! Hooks look at published events and answer with reactions; they never
//! touch state themselves. Each hook rolls its own chances, so one event can
//! set off several reactions.

use crate::battle::commands::Command;
use crate::battle::damage::AttackPayload;
use crate::battle::definitions::{Definitions, SkillEffect};
use crate::battle::dice::{chance_succeeds, RandomSource};
use crate::battle::events::{BattleEvent, BattleEventType};
use crate::battle::units::UnitTable;
use crate::core::types::UnitId;

/// Read-only state visible to reaction hooks
pub struct ReactionView<'a> {
    pub units: &'a UnitTable,
    pub definitions: &'a Definitions,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reaction {
    /// Apply a status right away
    ApplyStatus {
        source: UnitId,
        target: UnitId,
        status_id: String,
    },
    /// Queue a command to run after the acting unit's own commands
    Counter(Command),
}

pub trait ReactionHook: Send {
    fn name(&self) -> &str;

    fn on_event(
        &mut self,
        event: &BattleEvent,
        view: &ReactionView<'_>,
        rng: &mut dyn RandomSource,
    ) -> Vec<Reaction>;
}

/// Attacker debuff skills may land on whoever it swings at
#[derive(Debug, Clone, Copy, Default)]
pub struct OnHitDebuffHook;

impl ReactionHook for OnHitDebuffHook {
    fn name(&self) -> &str {
        "on_hit_debuff"
    }

    fn on_event(
        &mut self,
        event: &BattleEvent,
        view: &ReactionView<'_>,
        rng: &mut dyn RandomSource,
    ) -> Vec<Reaction> {
        let BattleEventType::UnitAttackAttempted {
            attacker, target, ..
        } = &event.event_type
        else {
            return Vec::new();
        };
        let (Some(a), Some(t)) = (view.units.index_of(*attacker), view.units.index_of(*target)) else {
            return Vec::new();
        };
        if !view.units.is_alive(t) {
            return Vec::new();
        }

        let luck = view.units.stats(a).luck as f32;
        let mut reactions = Vec::new();

        for skill_id in view.units.skills(a) {
            let Some(skill) = view.definitions.skills.get(skill_id) else {
                continue;
            };
            let SkillEffect::Debuff {
                status,
                chance,
                luck_scaling,
            } = &skill.effect
            else {
                continue;
            };
            if !skill.usable_with(view.units.tags(a)) {
                continue;
            }

            let effective = chance + luck * luck_scaling;
            if chance_succeeds(effective, rng) {
                tracing::debug!("{} lands {} on {} ({:.1}%)", attacker, status, target, effective);
                reactions.push(Reaction::ApplyStatus {
                    source: *attacker,
                    target: *target,
                    status_id: status.clone(),
                });
            }
        }
        reactions
    }
}

/// Defender reaction skills may strike back after taking damage
#[derive(Debug, Clone, Copy, Default)]
pub struct CounterAttackHook;

impl ReactionHook for CounterAttackHook {
    fn name(&self) -> &str {
        "counter_attack"
    }

    fn on_event(
        &mut self,
        event: &BattleEvent,
        view: &ReactionView<'_>,
        rng: &mut dyn RandomSource,
    ) -> Vec<Reaction> {
        let BattleEventType::DisplayDamage {
            unit,
            amount,
            source: Some(attacker),
            is_counter: false,
            ..
        } = &event.event_type
        else {
            return Vec::new();
        };
        if *amount <= 0 {
            return Vec::new();
        }
        let (Some(d), Some(a)) = (view.units.index_of(*unit), view.units.index_of(*attacker)) else {
            return Vec::new();
        };
        if !view.units.is_alive(d) || !view.units.is_alive(a) {
            return Vec::new();
        }
        let Some(class) = view.definitions.class(view.units.class_id(d)) else {
            return Vec::new();
        };

        let mut reactions = Vec::new();
        for skill_id in view.units.skills(d) {
            let Some(skill) = view.definitions.skills.get(skill_id) else {
                continue;
            };
            let SkillEffect::Reaction {
                chance,
                damage_modifier,
            } = skill.effect
            else {
                continue;
            };
            if !skill.usable_with(view.units.tags(d)) {
                continue;
            }

            if chance_succeeds(chance, rng) {
                tracing::debug!("{} counters {} with {}", unit, attacker, skill.id);
                reactions.push(Reaction::Counter(Command::Attack {
                    attacker: *unit,
                    target: *attacker,
                    payload: AttackPayload::counter(class, &skill.id, damage_modifier),
                }));
            }
        }
        reactions
    }
}

/// Hooks every battle starts with
pub fn default_hooks() -> Vec<Box<dyn ReactionHook>> {
    vec![Box::new(OnHitDebuffHook), Box::new(CounterAttackHook)]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::battle::definitions::{ClassDef, SkillDef};
    use crate::battle::dice::ScriptedRandom;
    use crate::battle::units::{StatBlock, UnitSpawn};
    use crate::core::types::{Allegiance, GridPos};

    fn setup() -> (UnitTable, Definitions) {
        let mut defs = Definitions::new();
        defs.insert_skill(SkillDef::new(
            "venom",
            0.0,
            SkillEffect::Debuff {
                status: "status_poison".into(),
                chance: 20.0,
                luck_scaling: 2.0,
            },
        ));
        defs.insert_skill(SkillDef::new(
            "riposte",
            0.0,
            SkillEffect::Reaction {
                chance: 30.0,
                damage_modifier: 0.5,
            },
        ));
        let mut class = ClassDef::new("duelist", 3);
        class.skills = vec!["venom".into(), "riposte".into()];
        defs.insert_class(class.clone());

        let mut table = UnitTable::new();
        let stats = StatBlock {
            luck: 10,
            ..StatBlock::default()
        };
        table.spawn(
            UnitSpawn::new(1, "duelist", Allegiance::Friendly, GridPos::new(0, 0)).with_stats(stats),
            &class,
            1,
        );
        table.spawn(
            UnitSpawn::new(2, "duelist", Allegiance::Hostile, GridPos::new(1, 0)).with_stats(stats),
            &class,
            1,
        );
        (table, defs)
    }

    fn event(event_type: BattleEventType) -> BattleEvent {
        BattleEvent {
            turn: 1,
            event_type,
        }
    }

    fn attempted() -> BattleEvent {
        event(BattleEventType::UnitAttackAttempted {
            attacker: UnitId(1),
            target: UnitId(2),
            skill: None,
            is_counter: false,
        })
    }

    fn displayed(amount: i32, is_counter: bool) -> BattleEvent {
        event(BattleEventType::DisplayDamage {
            unit: UnitId(2),
            amount,
            color: "red".into(),
            source: Some(UnitId(1)),
            is_counter,
        })
    }

    #[test]
    fn test_luck_boosts_debuff_chance() {
        let (units, defs) = setup();
        let view = ReactionView {
            units: &units,
            definitions: &defs,
        };
        // 20 + 10 * 2 = 40: a draw of 39 lands
        let mut rng = ScriptedRandom::new().with_percents([39.0]);
        let reactions = OnHitDebuffHook.on_event(&attempted(), &view, &mut rng);
        assert_eq!(
            reactions,
            vec![Reaction::ApplyStatus {
                source: UnitId(1),
                target: UnitId(2),
                status_id: "status_poison".into(),
            }]
        );

        let mut rng = ScriptedRandom::new().with_percents([40.0]);
        assert!(OnHitDebuffHook.on_event(&attempted(), &view, &mut rng).is_empty());
    }

    #[test]
    fn test_counter_targets_attacker() {
        let (units, defs) = setup();
        let view = ReactionView {
            units: &units,
            definitions: &defs,
        };
        let mut rng = ScriptedRandom::new().with_percents([10.0]);
        let reactions = CounterAttackHook.on_event(&displayed(5, false), &view, &mut rng);

        match reactions.as_slice() {
            [Reaction::Counter(Command::Attack {
                attacker,
                target,
                payload,
            })] => {
                assert_eq!(*attacker, UnitId(2));
                assert_eq!(*target, UnitId(1));
                assert!(payload.is_counter);
                assert_eq!(payload.damage_modifier, 0.5);
            }
            other => panic!("expected one counter, got {:?}", other),
        }
    }

    #[test]
    fn test_no_counter_for_zero_damage_or_counters() {
        let (units, defs) = setup();
        let view = ReactionView {
            units: &units,
            definitions: &defs,
        };
        let mut rng = ScriptedRandom::new().with_percents([0.0, 0.0]);
        assert!(CounterAttackHook.on_event(&displayed(0, false), &view, &mut rng).is_empty());
        assert!(CounterAttackHook.on_event(&displayed(5, true), &view, &mut rng).is_empty());
        // Nothing was rolled
        assert_eq!(rng.remaining_percents(), 2);
    }

    #[test]
    fn test_dead_defender_cannot_counter() {
        let (mut units, defs) = setup();
        let idx = units.index_of(UnitId(2)).unwrap();
        units.set_vitals(idx, 0, 0);
        let view = ReactionView {
            units: &units,
            definitions: &defs,
        };
        let mut rng = ScriptedRandom::new().with_percents([0.0]);
        assert!(CounterAttackHook.on_event(&displayed(5, false), &view, &mut rng).is_empty());
    }

    #[test]
    fn test_unrelated_events_ignored() {
        let (units, defs) = setup();
        let view = ReactionView {
            units: &units,
            definitions: &defs,
        };
        let mut rng = ScriptedRandom::new();
        let turn_start = event(BattleEventType::TurnStart);
        for mut hook in default_hooks() {
            assert!(hook.on_event(&turn_start, &view, &mut rng).is_empty());
        }
    }
}
