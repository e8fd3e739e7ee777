//! Foundry Core -- the shared data model of the foundry game-state engine.
//!
//! Every other crate in the workspace depends on the types defined here. The
//! engine is a pure state-transition function: callers hand it a
//! [`state::GameState`] and an immutable [`rules::Rules`] document and get a
//! new state back. Nothing in this crate performs I/O.
//!
//! # Determinism
//!
//! All keyed collections are `BTreeMap`s and all randomness flows through
//! [`rng::SimRng`], whose seed is persisted in the state. Two calls with
//! identical inputs always serialize to identical bytes, which
//! [`hash::state_hash`] turns into a cheap equality check for replays.
//!
//! # Key Types
//!
//! - [`rules::Rules`] -- material, recipe, machine and generator catalogs plus
//!   the tunables of every subsystem. Never mutated by the engine.
//! - [`state::GameState`] -- the aggregate root, matching the persisted JSON.
//! - [`inventory::Inventory`] -- material dictionary with removal-at-zero.
//! - [`map::ExplorationMap`] -- tile grid consumed by exploration actions.
//! - [`error::ActionError`] -- expected, player-triggerable failures.
//! - [`event::ProductionEvent`] -- emitted when a machine completes a run.

pub mod error;
pub mod event;
pub mod hash;
pub mod id;
pub mod inventory;
pub mod map;
pub mod rng;
pub mod rules;
pub mod state;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_utils;
pub mod validation;

pub use error::{ActionError, RulesError};
pub use event::ProductionEvent;
pub use inventory::Inventory;
pub use rules::Rules;
pub use state::GameState;
