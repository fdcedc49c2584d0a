use std::time::Duration;

use thiserror::Error;

use crate::core::types::{GridPos, UnitId};

#[derive(Error, Debug)]
pub enum BattleError {
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    #[error("Duplicate unit id: {0}")]
    DuplicateUnit(UnitId),

    #[error("Unknown {kind} definition: {id}")]
    UnknownDefinition { kind: &'static str, id: String },

    #[error("Tile {0} is outside the grid")]
    OutOfBounds(GridPos),

    #[error("Tile {0} is already occupied")]
    TileOccupied(GridPos),

    #[error("Invalid dice expression: {0}")]
    InvalidDice(String),

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Damage resolver unavailable: {0}")]
    ResolverUnavailable(String),

    #[error("Damage resolver did not answer within {0:?}")]
    ResolverTimeout(Duration),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),
}

impl BattleError {
    /// True for failures of the damage-resolution worker round trip
    pub fn is_resolver_failure(&self) -> bool {
        matches!(
            self,
            BattleError::ResolverUnavailable(_) | BattleError::ResolverTimeout(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, BattleError>;
