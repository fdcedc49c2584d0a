//! Valor Tactics - turn-resolution and combat-decision core for grid battles

pub mod battle;
pub mod core;
