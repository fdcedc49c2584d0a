//! Damage resolution pipeline
//!
//! roll -> flat stat bonus -> composed multiplier -> floor -> passive
//! reduction -> barrier-first split. Everything here is a pure function of
//! the request, so it can run on the resolver worker with no shared state.

use serde::{Deserialize, Serialize};

use crate::battle::definitions::{ClassDef, DamageType};
use crate::battle::dice::DiceSpec;
use crate::battle::formulas::valor_amplification;
use crate::battle::units::UnitSnapshot;
use crate::core::types::UnitId;

/// What an attack carries into resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttackPayload {
    pub dice: DiceSpec,
    pub damage_type: DamageType,
    /// Skill-intrinsic multiplier (e.g. a half-strength counter)
    pub damage_modifier: f32,
    /// Status applied to the target after a hit
    pub on_hit_status: Option<String>,
    pub is_counter: bool,
    pub skill_id: Option<String>,
    /// Maximum distance to the target; None for no limit
    pub range: Option<u32>,
}

impl AttackPayload {
    /// The class's plain attack
    pub fn basic(class: &ClassDef) -> Self {
        Self {
            dice: class.attack_dice,
            damage_type: class.damage_type,
            damage_modifier: 1.0,
            on_hit_status: None,
            is_counter: false,
            skill_id: None,
            range: Some(class.attack_range),
        }
    }

    /// An active skill
    pub fn skill(
        skill_id: &str,
        dice: DiceSpec,
        damage_type: DamageType,
        range: u32,
        damage_modifier: f32,
        on_hit_status: Option<String>,
    ) -> Self {
        Self {
            dice,
            damage_type,
            damage_modifier,
            on_hit_status,
            is_counter: false,
            skill_id: Some(skill_id.to_string()),
            range: Some(range),
        }
    }

    /// A reaction strike back at an attacker, using the defender's class attack
    pub fn counter(class: &ClassDef, skill_id: &str, damage_modifier: f32) -> Self {
        Self {
            dice: class.attack_dice,
            damage_type: class.damage_type,
            damage_modifier,
            on_hit_status: None,
            is_counter: true,
            skill_id: Some(skill_id.to_string()),
            range: None,
        }
    }
}

/// Everything the resolver needs, copied out of live state
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageRequest {
    pub attacker: UnitSnapshot,
    pub target: UnitSnapshot,
    pub payload: AttackPayload,
    /// Dice total, rolled on the orchestrating side
    pub pre_rolled: u32,
    /// Target's passive damage reduction fraction
    pub reduction: f32,
}

/// Authoritative outcome of one hit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DamageResponse {
    pub unit_id: UnitId,
    pub hp_damage_dealt: i32,
    pub barrier_damage_dealt: i32,
    pub new_hp: i32,
    pub new_barrier: i32,
    /// Damage before passive reduction
    pub nominal_damage: i32,
}

impl DamageResponse {
    pub fn total_dealt(&self) -> i32 {
        self.hp_damage_dealt + self.barrier_damage_dealt
    }
}

/// Resolver wire messages
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ResolverMessage {
    CalculateDamage { payload: DamageRequest },
    DamageCalculated(DamageResponse),
}

/// Flat bonus added to the dice total
pub fn stat_bonus(attacker: &UnitSnapshot, damage_type: DamageType) -> i32 {
    match damage_type {
        DamageType::Physical => attacker.attack,
        DamageType::Magic => attacker.magic,
    }
}

/// valor amplification x attack modifiers x skill modifier, never negative
pub fn damage_multiplier(attacker: &UnitSnapshot, payload: &AttackPayload) -> f32 {
    let valor = valor_amplification(attacker.barrier, attacker.max_barrier);
    (valor * attacker.attack_multiplier * payload.damage_modifier).max(0.0)
}

/// Damage after modifiers and before reduction
pub fn nominal_damage(pre_rolled: u32, attacker: &UnitSnapshot, payload: &AttackPayload) -> i32 {
    let base = pre_rolled as f32 + stat_bonus(attacker, payload.damage_type) as f32;
    let scaled = (base * damage_multiplier(attacker, payload)).floor();
    scaled.max(0.0) as i32
}

/// Scale by `1 - reduction`, floored
pub fn apply_reduction(nominal: i32, reduction: f32) -> i32 {
    let kept = 1.0 - reduction.clamp(0.0, 1.0);
    (nominal.max(0) as f32 * kept).floor() as i32
}

/// Barrier absorbs first, hp takes the rest
///
/// Returns (barrier damage, hp damage, new hp, new barrier). Hp damage is
/// capped at the hp the target has left.
pub fn split_damage(amount: i32, hp: i32, barrier: i32) -> (i32, i32, i32, i32) {
    let amount = amount.max(0);
    let barrier = barrier.max(0);
    let hp = hp.max(0);

    let barrier_damage = amount.min(barrier);
    let hp_damage = (amount - barrier_damage).min(hp);
    (barrier_damage, hp_damage, hp - hp_damage, barrier - barrier_damage)
}

/// Resolve a request end to end
pub fn resolve_damage(request: &DamageRequest) -> DamageResponse {
    let nominal = nominal_damage(request.pre_rolled, &request.attacker, &request.payload);
    let reduced = apply_reduction(nominal, request.reduction);
    build_response(request.target.id, nominal, reduced, request.target.hp, request.target.barrier)
}

/// Fixed damage that skips modifiers and reduction (damage over time)
pub fn resolve_fixed_damage(target: &UnitSnapshot, amount: i32) -> DamageResponse {
    let amount = amount.max(0);
    build_response(target.id, amount, amount, target.hp, target.barrier)
}

fn build_response(unit_id: UnitId, nominal: i32, amount: i32, hp: i32, barrier: i32) -> DamageResponse {
    let (barrier_damage, hp_damage, new_hp, new_barrier) = split_damage(amount, hp, barrier);
    DamageResponse {
        unit_id,
        hp_damage_dealt: hp_damage,
        barrier_damage_dealt: barrier_damage,
        new_hp,
        new_barrier,
        nominal_damage: nominal,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{Allegiance, GridPos};
    use proptest::prelude::*;

    fn snapshot(id: u32, attack: i32, hp: i32, barrier: i32, max_barrier: i32) -> UnitSnapshot {
        UnitSnapshot {
            id: UnitId(id),
            allegiance: Allegiance::Friendly,
            position: GridPos::new(0, 0),
            hp,
            max_hp: hp.max(1),
            barrier,
            max_barrier,
            attack,
            magic: 3,
            luck: 0,
            attack_multiplier: 1.0,
        }
    }

    fn payload() -> AttackPayload {
        AttackPayload::basic(&ClassDef::new("knight", 3))
    }

    #[test]
    fn test_full_barrier_amplifies_and_absorbs() {
        // attack 20, roll 1 on 1d6: (1 + 20) * 1.5 = 31.5 -> 31
        let mut pay = payload();
        pay.dice = DiceSpec::new(1, 6);
        let request = DamageRequest {
            attacker: snapshot(1, 20, 30, 10, 10),
            target: snapshot(2, 0, 50, 10, 10),
            payload: pay,
            pre_rolled: 1,
            reduction: 0.0,
        };
        let response = resolve_damage(&request);

        assert_eq!(response.nominal_damage, 31);
        assert_eq!(response.barrier_damage_dealt, 10);
        assert_eq!(response.hp_damage_dealt, 21);
        assert_eq!(response.new_barrier, 0);
        assert_eq!(response.new_hp, 29);
    }

    #[test]
    fn test_empty_barrier_no_amplification() {
        let request = DamageRequest {
            attacker: snapshot(1, 5, 30, 0, 10),
            target: snapshot(2, 0, 50, 0, 0),
            payload: payload(),
            pre_rolled: 3,
            reduction: 0.0,
        };
        assert_eq!(resolve_damage(&request).hp_damage_dealt, 8);
    }

    #[test]
    fn test_magic_uses_magic_stat() {
        let mut pay = payload();
        pay.damage_type = DamageType::Magic;
        let attacker = snapshot(1, 50, 30, 0, 0);
        assert_eq!(nominal_damage(2, &attacker, &pay), 5);
    }

    #[test]
    fn test_modifiers_compose() {
        let mut attacker = snapshot(1, 10, 30, 0, 0);
        attacker.attack_multiplier = 2.0;
        let mut pay = payload();
        pay.damage_modifier = 0.5;
        // (10 + 10) * 1.0 * 2.0 * 0.5
        assert_eq!(nominal_damage(10, &attacker, &pay), 20);
    }

    #[test]
    fn test_reduction_floors() {
        assert_eq!(apply_reduction(10, 0.25), 7);
        assert_eq!(apply_reduction(10, 0.0), 10);
        assert_eq!(apply_reduction(10, 1.5), 0);
    }

    #[test]
    fn test_negative_stats_floor_at_zero() {
        let attacker = snapshot(1, -20, 30, 0, 0);
        assert_eq!(nominal_damage(3, &attacker, &payload()), 0);
    }

    #[test]
    fn test_fixed_damage_splits_barrier_first() {
        let target = snapshot(2, 0, 20, 3, 10);
        let response = resolve_fixed_damage(&target, 5);
        assert_eq!(response.barrier_damage_dealt, 3);
        assert_eq!(response.hp_damage_dealt, 2);
        assert_eq!(response.new_hp, 18);
    }

    #[test]
    fn test_message_wire_format() {
        let msg = ResolverMessage::DamageCalculated(DamageResponse {
            unit_id: UnitId(7),
            hp_damage_dealt: 4,
            barrier_damage_dealt: 6,
            new_hp: 16,
            new_barrier: 0,
            nominal_damage: 10,
        });
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["type"], "DAMAGE_CALCULATED");
        assert_eq!(json["unitId"], 7);
        assert_eq!(json["hpDamageDealt"], 4);
        assert_eq!(json["barrierDamageDealt"], 6);

        let back: ResolverMessage = serde_json::from_value(json).unwrap();
        assert_eq!(back, msg);
    }

    proptest! {
        #[test]
        fn proptest_split_invariants(
            roll in 0u32..40,
            attack in -10i32..60,
            hp in 0i32..200,
            barrier in 0i32..50,
            attacker_barrier in 0i32..30,
            reduction in 0.0f32..0.9,
        ) {
            let request = DamageRequest {
                attacker: snapshot(1, attack, 30, attacker_barrier, 30),
                target: snapshot(2, 0, hp, barrier, 50),
                payload: payload(),
                pre_rolled: roll,
                reduction,
            };
            let r = resolve_damage(&request);

            prop_assert!(r.nominal_damage >= 0);
            prop_assert!(r.hp_damage_dealt >= 0);
            prop_assert!(r.barrier_damage_dealt >= 0);
            prop_assert!(r.hp_damage_dealt + r.barrier_damage_dealt <= r.nominal_damage);
            prop_assert!(r.barrier_damage_dealt <= barrier);
            prop_assert!(r.new_barrier >= 0 && r.new_barrier <= barrier);
            prop_assert!(r.new_hp >= 0);
            if r.barrier_damage_dealt < barrier {
                prop_assert_eq!(r.hp_damage_dealt, 0);
            }
        }
    }
}
