//! Valor and weight formulas
//!
//! Pure functions of stats. Scheduling and damage both read from here so
//! the numbers stay in one place.

use crate::battle::constants::{STRENGTH_WEIGHT_DIVISOR, VALOR_AMPLIFICATION, WEIGHT_PENALTY_FACTOR};

/// Body weight + one point per full 10 strength + everything equipped
pub fn total_weight(weight: i32, strength: i32, item_weights: impl IntoIterator<Item = i32>) -> i32 {
    weight + strength.div_euclid(STRENGTH_WEIGHT_DIVISOR) + item_weights.into_iter().sum::<i32>()
}

pub fn weight_penalty(total_weight: i32) -> f32 {
    WEIGHT_PENALTY_FACTOR * total_weight as f32
}

/// Scheduling value: speed minus the weight penalty
pub fn initiative(speed: i32, total_weight: i32) -> f32 {
    speed as f32 - weight_penalty(total_weight)
}

/// Damage amplification from the attacker's remaining barrier
///
/// A full barrier adds 50%, an empty one nothing. Units without any
/// barrier capacity get no amplification.
pub fn valor_amplification(barrier: i32, max_barrier: i32) -> f32 {
    if max_barrier <= 0 {
        return 1.0;
    }
    let fill = barrier.clamp(0, max_barrier) as f32 / max_barrier as f32;
    1.0 + VALOR_AMPLIFICATION * fill
}

/// Barrier capacity granted by valor
pub fn max_barrier_from_valor(valor: i32, scale: i32) -> i32 {
    (valor * scale).max(0)
}
