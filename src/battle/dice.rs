//! Dice expressions and the battle's random source
//!
//! Everything random in a battle goes through `RandomSource`, so a seeded
//! source replays a battle exactly and a scripted source pins draws in tests.

use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::battle::constants::PERCENT_SCALE;
use crate::core::error::BattleError;

/// `count` dice of `sides` sides, written `"NdS"`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DiceSpec {
    pub count: u32,
    pub sides: u32,
}

impl DiceSpec {
    pub const fn new(count: u32, sides: u32) -> Self {
        Self { count, sides }
    }

    pub fn min(&self) -> u32 {
        self.count
    }

    pub fn max(&self) -> u32 {
        self.count * self.sides
    }
}

impl Default for DiceSpec {
    fn default() -> Self {
        Self::new(1, 4)
    }
}

impl fmt::Display for DiceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}d{}", self.count, self.sides)
    }
}

impl FromStr for DiceSpec {
    type Err = BattleError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lowered = s.trim().to_ascii_lowercase();
        let (count, sides) = lowered
            .split_once('d')
            .ok_or_else(|| BattleError::InvalidDice(s.to_string()))?;

        // "d6" is shorthand for "1d6"
        let count = if count.is_empty() {
            1
        } else {
            count
                .parse::<u32>()
                .map_err(|_| BattleError::InvalidDice(s.to_string()))?
        };
        let sides = sides
            .parse::<u32>()
            .map_err(|_| BattleError::InvalidDice(s.to_string()))?;

        if sides == 0 {
            return Err(BattleError::InvalidDice(s.to_string()));
        }

        Ok(Self::new(count, sides))
    }
}

impl TryFrom<String> for DiceSpec {
    type Error = BattleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<DiceSpec> for String {
    fn from(dice: DiceSpec) -> Self {
        dice.to_string()
    }
}

/// Pure randomness provider for dice and probability rolls
pub trait RandomSource: Send {
    /// One die, uniform in `1..=sides`
    fn roll_die(&mut self, sides: u32) -> u32;

    /// Uniform draw in `[0, 100)`
    fn percent(&mut self) -> f32;
}

/// Sum of rolling every die in `dice`
pub fn roll(dice: DiceSpec, rng: &mut dyn RandomSource) -> u32 {
    (0..dice.count).map(|_| rng.roll_die(dice.sides)).sum()
}

/// Percentage check: true when a fresh draw lands below `chance`
pub fn chance_succeeds(chance: f32, rng: &mut dyn RandomSource) -> bool {
    chance > 0.0 && rng.percent() < chance
}

/// Seeded ChaCha source; the same seed replays the same battle
#[derive(Debug, Clone)]
pub struct SeededRandom {
    rng: ChaCha8Rng,
}

impl SeededRandom {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: ChaCha8Rng::seed_from_u64(seed),
        }
    }
}

impl RandomSource for SeededRandom {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.rng.gen_range(1..=sides.max(1))
    }

    fn percent(&mut self) -> f32 {
        self.rng.gen_range(0.0..PERCENT_SCALE)
    }
}

/// Replays fixed draws in order
///
/// Once a queue runs dry, die rolls return 1 and percentage draws return
/// the top of the range, so nothing probabilistic fires by accident.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRandom {
    dice: VecDeque<u32>,
    percents: VecDeque<f32>,
}

impl ScriptedRandom {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_dice(mut self, rolls: impl IntoIterator<Item = u32>) -> Self {
        self.dice.extend(rolls);
        self
    }

    pub fn with_percents(mut self, draws: impl IntoIterator<Item = f32>) -> Self {
        self.percents.extend(draws);
        self
    }

    pub fn remaining_percents(&self) -> usize {
        self.percents.len()
    }
}

impl RandomSource for ScriptedRandom {
    fn roll_die(&mut self, sides: u32) -> u32 {
        self.dice.pop_front().unwrap_or(1).clamp(1, sides.max(1))
    }

    fn percent(&mut self) -> f32 {
        self.percents
            .pop_front()
            .unwrap_or(PERCENT_SCALE - 0.001)
            .clamp(0.0, PERCENT_SCALE - 0.001)
    }
}
