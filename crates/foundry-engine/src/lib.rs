//! Foundry Engine -- the game-state transition function.
//!
//! The single entry point is [`apply`]: given a state, the rules and a
//! player [`Action`], it returns the next state, an optional rejection
//! error, and any production events. A rejected action returns the input
//! state unchanged. The function performs no I/O and draws randomness only
//! from the seed stored in the state, so the same inputs always produce the
//! same output.
//!
//! # Modules
//!
//! - [`tick`] -- the per-tick pipeline run by `SIMULATE`.
//! - [`migration`] -- upgrades persisted states to the current schema.
//! - [`save`] -- new games, save acceptance and the binary save format.
//! - [`replay`] -- action logs with state-hash checkpoints.
//! - [`simulation`] -- an in-memory owner of one game.
//!
//! # Example
//!
//! ```
//! use foundry_engine::{apply, new_game, Action};
//! # fn demo(rules: &foundry_core::Rules) {
//! let state = new_game(rules, 42);
//! let result = apply(&state, rules, &Action::tick());
//! assert!(result.error.is_none());
//! assert_eq!(result.state.tick, 1);
//! # }
//! ```

mod action;
mod dispatch;
pub mod migration;
mod purchases;
pub mod replay;
pub mod save;
pub mod simulation;
mod structures;
pub mod tick;

pub use action::Action;
pub use dispatch::{ApplyResult, apply, apply_in_place};
pub use migration::{MigrationReport, migrate_game_state, migrate_in_place};
pub use purchases::inventory_space_cost;
pub use replay::{ReplayLog, ReplayResult, replay_and_verify};
pub use save::{SaveError, accept_save, decode_save, encode_save, new_game, state_from_json};
pub use simulation::{ExecutionMode, Simulation};
pub use tick::{TickReport, run_tick};
