//! A stateful owner of one game, for callers that hold the state in memory.
//!
//! [`apply`] is the primitive; [`Simulation`] wraps it with a choice of
//! execution mode and optional replay recording.

use std::sync::Arc;

use foundry_core::error::ActionError;
use foundry_core::event::ProductionEvent;
use foundry_core::hash::state_hash;
use foundry_core::rules::Rules;
use foundry_core::state::GameState;

use crate::action::Action;
use crate::dispatch::{apply, apply_in_place};
use crate::replay::ReplayLog;

/// How actions are applied to the owned state. Chosen at construction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExecutionMode {
    /// Each action runs against a copy, which replaces the state on success.
    /// A rejected action never leaves partial effects.
    #[default]
    Persistent,
    /// Actions mutate the state directly. Avoids a clone per action; a
    /// rules inconsistency mid-tick may leave a partial tick.
    InPlace,
}

#[derive(Debug)]
pub struct Simulation {
    state: GameState,
    rules: Arc<Rules>,
    mode: ExecutionMode,
    replay: Option<ReplayLog>,
}

impl Simulation {
    pub fn new(state: GameState, rules: Arc<Rules>) -> Self {
        Self::with_mode(state, rules, ExecutionMode::default())
    }

    pub fn with_mode(state: GameState, rules: Arc<Rules>, mode: ExecutionMode) -> Self {
        Self {
            state,
            rules,
            mode,
            replay: None,
        }
    }

    /// Start recording a replay from the current state. Replaces any log
    /// already being recorded.
    pub fn start_recording(&mut self) {
        self.replay = Some(ReplayLog::new(self.state.clone()));
    }

    /// Stop recording and hand back the log.
    pub fn take_replay(&mut self) -> Option<ReplayLog> {
        self.replay.take()
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn rules(&self) -> &Rules {
        &self.rules
    }

    pub fn mode(&self) -> ExecutionMode {
        self.mode
    }

    pub fn into_state(self) -> GameState {
        self.state
    }

    /// Apply one action. Rejected actions are still recorded so a replay
    /// sees exactly what the caller sent.
    pub fn apply(&mut self, action: Action) -> Result<Vec<ProductionEvent>, ActionError> {
        let outcome = match self.mode {
            ExecutionMode::Persistent => {
                let result = apply(&self.state, &self.rules, &action);
                self.state = result.state;
                match result.error {
                    None => Ok(result.production_events),
                    Some(error) => Err(error),
                }
            }
            ExecutionMode::InPlace => apply_in_place(&mut self.state, &self.rules, &action),
        };
        if let Some(log) = self.replay.as_mut() {
            match state_hash(&self.state) {
                Ok(hash) => log.record_with_hash(action, hash),
                Err(error) => {
                    tracing::warn!(%error, "state hash unavailable; recording without checkpoint");
                    log.record(action);
                }
            }
        }
        outcome
    }

    /// Advance one tick.
    pub fn step(&mut self) -> Result<Vec<ProductionEvent>, ActionError> {
        self.apply(Action::tick())
    }

    /// Advance `ticks` ticks.
    pub fn advance(&mut self, ticks: u32) -> Result<Vec<ProductionEvent>, ActionError> {
        self.apply(Action::Simulate { ticks: Some(ticks) })
    }
}
