//! Battle formula constants - all tunable values in one place

// Initiative
/// Fraction of total carried weight subtracted from speed
pub const WEIGHT_PENALTY_FACTOR: f32 = 0.5;
/// Strength points that add one point of carried weight
pub const STRENGTH_WEIGHT_DIVISOR: i32 = 10;

// Damage
/// Extra damage fraction granted by a full barrier
pub const VALOR_AMPLIFICATION: f32 = 0.5;
/// Ceiling on summed continuous damage reduction
pub const MAX_DAMAGE_REDUCTION: f32 = 0.9;

// Rolls
/// Exclusive upper bound of a percentage draw
pub const PERCENT_SCALE: f32 = 100.0;

// Status effects
/// Duration marking an effect that only explicit removal ends
pub const INDEFINITE_DURATION: i32 = -1;

// Classes
pub const DEFAULT_ATTACK_RANGE: u32 = 1;

// Display colours for damage numbers
pub const COLOR_HP_DAMAGE: &str = "red";
pub const COLOR_BARRIER_ONLY: &str = "cyan";
pub const COLOR_COUNTER: &str = "orange";
pub const COLOR_DAMAGE_OVER_TIME: &str = "purple";

/// Round-trip bound for a fresh resolver handle (milliseconds)
pub const DEFAULT_RESOLVER_TIMEOUT_MS: u64 = 5_000;

/// Source name on CriticalError events raised by the resolver round trip
pub const RESOLVER_ERROR_SOURCE: &str = "damage_resolver";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reduction_ceiling_leaves_some_damage() {
        assert!(MAX_DAMAGE_REDUCTION < 1.0);
        assert!(MAX_DAMAGE_REDUCTION > 0.0);
    }

    #[test]
    fn test_indefinite_marker_negative() {
        assert!(INDEFINITE_DURATION < 0);
    }
}
