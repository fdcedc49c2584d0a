//! Scenario files: grid size and initial placement
//!
//! ```toml
//! rows = 8
//! cols = 8
//!
//! [[units]]
//! id = 1
//! name = "Aldric"
//! class = "knight"
//! allegiance = "friendly"
//! position = { x = 1, y = 3 }
//! stats = { max_hp = 30, attack = 6, speed = 11, valor = 8 }
//! equipment = [{ id = "longsword", weight = 3, is_weapon = true }]
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::battle::definitions::Definitions;
use crate::battle::grid::Grid;
use crate::battle::state::BattleState;
use crate::battle::units::UnitSpawn;
use crate::core::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub rows: u32,
    pub cols: u32,
    #[serde(default)]
    pub units: Vec<UnitSpawn>,
}

impl Scenario {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Spawn every unit onto a fresh grid
    pub fn build_state(&self, definitions: &Definitions, valor_barrier_scale: i32) -> Result<BattleState> {
        let mut state = BattleState::new(Grid::new(self.rows, self.cols), valor_barrier_scale);
        for spawn in &self.units {
            state.spawn(spawn.clone(), definitions)?;
        }
        Ok(state)
    }
}
