//! Upgrading persisted states to the current schema.
//!
//! Field-level defaults are handled by serde when a legacy document loads.
//! This pass upgrades *contents*: map terrain from an older biome revision,
//! prototypes whose recipe inputs changed, and extraction-node rates. Running
//! it on an already-current state changes nothing.

use foundry_core::map::CURRENT_BIOME_VERSION;
use foundry_core::rules::Rules;
use foundry_core::state::{GameState, Prototype, PrototypeSlot};
use foundry_research::{build_prototype, unlock_recipe};

/// What a migration pass changed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MigrationReport {
    pub terrain_regenerated: bool,
    pub prototypes_reconciled: usize,
    pub prototypes_completed: usize,
    pub rates_normalized: usize,
}

impl MigrationReport {
    pub fn is_noop(&self) -> bool {
        *self == MigrationReport::default()
    }
}

/// Migrate a copy of `state`.
pub fn migrate_game_state(state: &GameState, rules: &Rules) -> GameState {
    let mut migrated = state.clone();
    migrate_in_place(&mut migrated, rules);
    migrated
}

/// Migrate `state` in place.
pub fn migrate_in_place(state: &mut GameState, rules: &Rules) -> MigrationReport {
    let mut report = MigrationReport::default();

    if let Some(map) = &state.exploration_map {
        if map.biome_version < CURRENT_BIOME_VERSION {
            state.exploration_map = Some(foundry_exploration::regenerate_terrain(map));
            report.terrain_regenerated = true;
        }
    }

    reconcile_prototypes(state, rules, &mut report);
    report.rates_normalized = normalize_rates(state, rules);

    if !report.is_noop() {
        tracing::info!(
            tick = state.tick,
            terrain = report.terrain_regenerated,
            prototypes = report.prototypes_reconciled,
            completed = report.prototypes_completed,
            rates = report.rates_normalized,
            "state migrated"
        );
    }
    report
}

/// Rebuild each prototype's slots from the current recipe. Slots for
/// materials that still apply keep their fill (capped at the new quantity);
/// fill in dropped slots or above the cap goes back to inventory.
fn reconcile_prototypes(state: &mut GameState, rules: &Rules, report: &mut MigrationReport) {
    let prototypes = std::mem::take(&mut state.research.awaiting_prototype);
    let mut kept = Vec::with_capacity(prototypes.len());
    let mut completed = Vec::new();

    for old in prototypes {
        let Ok(mut current) = build_prototype(rules, &old.recipe_id) else {
            tracing::warn!(recipe = %old.recipe_id, "prototype for unknown recipe left as is");
            kept.push(old);
            continue;
        };
        for slot in current.slots.iter_mut() {
            if let Some(previous) = old.slots.iter().find(|s| s.material == slot.material) {
                slot.filled = previous.filled.min(slot.quantity);
            }
        }
        for previous in &old.slots {
            let still_used = current.slots.iter().find(|s| s.material == previous.material);
            let refund = match still_used {
                Some(slot) => previous.filled.saturating_sub(slot.quantity),
                None => previous.filled,
            };
            state.inventory.add(&previous.material, refund);
        }

        if !same_shape(&old, &current) {
            report.prototypes_reconciled += 1;
        }
        if current.mode == old.mode && current.slots == old.slots {
            kept.push(old);
        } else if current.is_complete() {
            completed.push(current.recipe_id);
        } else {
            kept.push(current);
        }
    }

    state.research.awaiting_prototype = kept;
    for recipe in completed {
        unlock_recipe(state, &recipe);
        report.prototypes_completed += 1;
    }
}

fn same_shape(old: &Prototype, current: &Prototype) -> bool {
    let key = |slots: &[PrototypeSlot]| -> Vec<(String, u64)> {
        slots.iter().map(|s| (s.material.to_string(), s.quantity)).collect()
    };
    old.mode == current.mode && key(&old.slots) == key(&current.slots)
}

/// Set every node rate, on the state and on the map, to the standard rate.
fn normalize_rates(state: &mut GameState, rules: &Rules) -> usize {
    let standard = rules.exploration.node_rate_range.standard();
    let mut changed = 0;
    for node in state.extraction_nodes.iter_mut() {
        if node.rate != standard {
            node.rate = standard;
            changed += 1;
        }
    }
    if let Some(map) = state.exploration_map.as_mut() {
        for node in map.tiles.iter_mut().filter_map(|t| t.extraction_node.as_mut()) {
            if node.rate != standard {
                node.rate = standard;
                changed += 1;
            }
        }
    }
    changed
}
