//! Battle configuration with documented constants
//!
//! Everything the host may want to tune without touching definitions lives
//! here. The engine receives its config explicitly; there is no global copy.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::battle::constants::DEFAULT_RESOLVER_TIMEOUT_MS;
use crate::core::error::{BattleError, Result};

/// Configuration for the turn engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BattleConfig {
    // === PACING ===
    /// Pause after every round, before the next StartTurn (milliseconds)
    ///
    /// Headless runs leave this at 0. Presentation hosts use it to give
    /// players a beat between rounds.
    pub inter_turn_delay_ms: u64,

    /// Time a disabled (stunned) unit spends "waiting" instead of acting
    pub disabled_wait_ms: u64,

    // === DAMAGE RESOLVER ===
    /// Upper bound on a single resolver round trip (milliseconds)
    ///
    /// A request that is not answered in time is treated exactly like a
    /// crashed worker: one CriticalError event, no retry.
    pub resolver_timeout_ms: u64,

    /// Stop the battle after a resolver failure
    ///
    /// When false the round is abandoned but the next round starts as
    /// normal, leaving recovery to whoever listens for CriticalError.
    pub halt_on_resolver_failure: bool,

    /// Size of the resolver request queue
    pub resolver_queue: usize,

    // === LIMITS ===
    /// Stop after this many rounds (0 = unlimited)
    pub max_turns: u32,

    // === AI ===
    /// Base value of the target score (score = base - target hp)
    pub target_score_base: i32,

    // === UNITS ===
    /// Barrier points granted per point of valor at spawn
    pub valor_barrier_scale: i32,

    // === RANDOMNESS ===
    /// Seed for the battle's random source
    pub seed: u64,
}

impl Default for BattleConfig {
    fn default() -> Self {
        Self {
            inter_turn_delay_ms: 0,
            disabled_wait_ms: 0,
            resolver_timeout_ms: DEFAULT_RESOLVER_TIMEOUT_MS,
            halt_on_resolver_failure: true,
            resolver_queue: 32,
            max_turns: 200,
            target_score_base: 1_000,
            valor_barrier_scale: 1,
            seed: 42,
        }
    }
}

impl BattleConfig {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inter_turn_delay(&self) -> Duration {
        Duration::from_millis(self.inter_turn_delay_ms)
    }

    pub fn disabled_wait(&self) -> Duration {
        Duration::from_millis(self.disabled_wait_ms)
    }

    pub fn resolver_timeout(&self) -> Duration {
        Duration::from_millis(self.resolver_timeout_ms)
    }

    /// Validate configuration for internal consistency
    pub fn validate(&self) -> Result<()> {
        if self.resolver_timeout_ms == 0 {
            return Err(BattleError::InvalidConfig(
                "resolver_timeout_ms must be positive".into(),
            ));
        }

        if self.resolver_queue == 0 {
            return Err(BattleError::InvalidConfig(
                "resolver_queue must be positive".into(),
            ));
        }

        // Scores must stay positive for any plausible hp value
        if self.target_score_base <= 0 {
            return Err(BattleError::InvalidConfig(format!(
                "target_score_base ({}) must be positive",
                self.target_score_base
            )));
        }

        if self.valor_barrier_scale < 0 {
            return Err(BattleError::InvalidConfig(format!(
                "valor_barrier_scale ({}) must not be negative",
                self.valor_barrier_scale
            )));
        }

        Ok(())
    }

    /// Parse and validate a config from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: BattleConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a config file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }
}
