//! Action logs that reproduce a game from a starting state.
//!
//! Because [`apply`](crate::apply) is a pure function of state, rules and
//! action, replaying a log against the same rules must reproduce every
//! recorded state hash. A mismatch means a determinism bug or different
//! rules.

use foundry_core::hash::state_hash;
use foundry_core::rules::Rules;
use foundry_core::state::GameState;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::dispatch::apply;

#[derive(Debug, thiserror::Error)]
pub enum ReplayError {
    #[error("json encoding failed: {0}")]
    Json(#[from] serde_json::Error),
}

/// Where replay verification failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplayMismatch {
    pub action_index: usize,
    pub expected_hash: u64,
    pub actual_hash: u64,
}

/// A starting state plus the actions applied to it, in order.
///
/// Stored as JSON: actions use the `{type, payload}` wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplayLog {
    pub initial: GameState,
    pub actions: Vec<Action>,
    /// `(action index, state hash after that action)`.
    #[serde(default)]
    pub hash_checkpoints: Vec<(usize, u64)>,
}

impl ReplayLog {
    pub fn new(initial: GameState) -> Self {
        Self {
            initial,
            actions: Vec::new(),
            hash_checkpoints: Vec::new(),
        }
    }

    pub fn record(&mut self, action: Action) {
        self.actions.push(action);
    }

    /// Record an action together with the hash of the state it produced.
    pub fn record_with_hash(&mut self, action: Action, hash: u64) {
        let index = self.actions.len();
        self.actions.push(action);
        self.hash_checkpoints.push((index, hash));
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn to_json(&self) -> Result<String, ReplayError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, ReplayError> {
        Ok(serde_json::from_str(json)?)
    }
}

/// The outcome of replaying a log.
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayResult {
    pub actions_applied: usize,
    pub rejected: usize,
    pub is_verified: bool,
    pub first_mismatch: Option<ReplayMismatch>,
    pub final_state: GameState,
}

/// Replay `log` against `rules`, checking every hash checkpoint.
pub fn replay_and_verify(log: &ReplayLog, rules: &Rules) -> Result<ReplayResult, ReplayError> {
    let mut state = log.initial.clone();
    let mut rejected = 0;
    let mut first_mismatch = None;
    let mut checkpoints = log.hash_checkpoints.iter().peekable();

    for (index, action) in log.actions.iter().enumerate() {
        let result = apply(&state, rules, action);
        if result.error.is_some() {
            rejected += 1;
        }
        state = result.state;

        while let Some(&&(at, expected)) = checkpoints.peek() {
            if at > index {
                break;
            }
            checkpoints.next();
            if at < index {
                continue;
            }
            let actual = state_hash(&state)?;
            if actual != expected && first_mismatch.is_none() {
                tracing::warn!(index, expected, actual, "replay diverged");
                first_mismatch = Some(ReplayMismatch {
                    action_index: index,
                    expected_hash: expected,
                    actual_hash: actual,
                });
            }
        }
    }

    Ok(ReplayResult {
        actions_applied: log.actions.len(),
        rejected,
        is_verified: first_mismatch.is_none(),
        first_mismatch,
        final_state: state,
    })
}
