//! Host-registered turn hooks
//!
//! Hooks at the same point run in registration order. A hook may ask for a
//! delay; the engine waits it out before running the next one.

use std::fmt;
use std::time::Duration;

use crate::battle::status::StatusLedger;
use crate::battle::units::UnitTable;
use crate::core::types::{Turn, UnitId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HookPoint {
    StartOfTurn,
    EndOfTurn,
    UnitTurnStart,
    UnitTurnEnd,
}

/// Read-only view handed to hooks
pub struct HookContext<'a> {
    pub point: HookPoint,
    pub turn: Turn,
    /// Acting unit for the per-unit points
    pub unit: Option<UnitId>,
    pub units: &'a UnitTable,
    pub statuses: &'a StatusLedger,
}

pub trait TurnHook: Send {
    /// Run the hook; Some(delay) suspends the turn for that long
    fn call(&mut self, ctx: &HookContext<'_>) -> Option<Duration>;
}

impl<F> TurnHook for F
where
    F: FnMut(&HookContext<'_>) -> Option<Duration> + Send,
{
    fn call(&mut self, ctx: &HookContext<'_>) -> Option<Duration> {
        self(ctx)
    }
}

#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<(HookPoint, Box<dyn TurnHook>)>,
}

impl fmt::Debug for HookRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let points: Vec<HookPoint> = self.hooks.iter().map(|(point, _)| *point).collect();
        f.debug_struct("HookRegistry").field("hooks", &points).finish()
    }
}

impl HookRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, point: HookPoint, hook: impl TurnHook + 'static) {
        self.hooks.push((point, Box::new(hook)));
    }

    pub fn len(&self) -> usize {
        self.hooks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hooks.is_empty()
    }

    /// Registry slots for `point`, in registration order
    pub fn indices_for(&self, point: HookPoint) -> Vec<usize> {
        self.hooks
            .iter()
            .enumerate()
            .filter(|(_, (p, _))| *p == point)
            .map(|(i, _)| i)
            .collect()
    }

    /// Run the hook in slot `index`
    pub fn call(&mut self, index: usize, ctx: &HookContext<'_>) -> Option<Duration> {
        let (point, hook) = self.hooks.get_mut(index)?;
        if *point != ctx.point {
            return None;
        }
        hook.call(ctx)
    }
}
