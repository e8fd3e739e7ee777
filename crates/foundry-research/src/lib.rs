//! Research economy: research points, experiments and prototypes.
//!
//! # Overview
//!
//! Research points (RP) come from three sources: donating credits, donating
//! manufactured parts, and research facilities running on the floor. RP is
//! spent on experiments, which discover a recipe and open a prototype for
//! it. A discovered recipe only becomes usable once its prototype is
//! complete; completion appends it to `unlockedRecipes`.
//!
//! # Prototype modes
//!
//! - **Slots**: recipes with manufactured inputs. Each manufactured input is
//!   a slot filled by hand from inventory (`FILL_PROTOTYPE_SLOT`).
//! - **Flow**: recipes whose inputs are all raw. The slots draw their
//!   material from inventory a little every tick while research is active.

use foundry_core::error::{ActionError, RulesError};
use foundry_core::id::RecipeId;
use foundry_core::rules::Rules;
use foundry_core::state::{GameState, MachineStatus};

pub mod experiment;
pub mod prototype;

pub use experiment::{
    experiment_cost, roll_passive_discovery, run_experiment, run_targeted_experiment,
    select_recipe,
};
pub use prototype::{FillOutcome, SlotSelector, advance_flow, build_prototype, fill_slot};

// ---------------------------------------------------------------------------
// Ages
// ---------------------------------------------------------------------------

/// The player's current age: the highest age among unlocked recipes, or 1
/// before anything is unlocked.
pub fn current_age(state: &GameState, rules: &Rules) -> u32 {
    state
        .unlocked_recipes
        .iter()
        .filter_map(|r| rules.recipes.get(r))
        .map(|r| r.age)
        .max()
        .unwrap_or(1)
}

// ---------------------------------------------------------------------------
// Donations
// ---------------------------------------------------------------------------

/// Convert credits into research points at `creditsToRpRatio` credits per
/// point. Returns the points gained.
pub fn donate_credits(state: &mut GameState, rules: &Rules, amount: f64) -> Result<f64, ActionError> {
    if !amount.is_finite() || amount <= 0.0 {
        return Err(ActionError::InvalidAmount);
    }
    if state.credits < amount {
        return Err(ActionError::InsufficientCredits {
            needed: amount,
            available: state.credits,
        });
    }
    let points = amount / rules.research.credits_to_rp_ratio;
    state.credits -= amount;
    state.research.research_points += points;
    tracing::debug!(tick = state.tick, amount, points, "credits donated");
    Ok(points)
}

/// Research points a part donation is worth:
/// `basePrice x donationMultiplier[age] x quantity x donationFactor`.
pub fn part_value(rules: &Rules, item: &str, quantity: u64) -> Result<f64, RulesError> {
    let def = rules.material(item)?;
    let age = rules
        .research
        .age(def.age)
        .ok_or(RulesError::MissingAge(def.age))?;
    Ok(def.base_price * age.donation_multiplier * quantity as f64 * rules.research.donation_factor)
}

/// Donate manufactured parts from inventory for research points. Raw
/// materials are refused. Returns the points gained.
pub fn donate_parts(
    state: &mut GameState,
    rules: &Rules,
    item: &str,
    quantity: u64,
) -> Result<f64, ActionError> {
    if quantity == 0 {
        return Err(ActionError::InvalidQuantity);
    }
    let def = rules
        .material(item)
        .map_err(|_| ActionError::ItemNotFound(item.to_string()))?;
    if def.is_raw() {
        return Err(ActionError::RawDonation);
    }
    let available = state.inventory.quantity(item);
    if available < quantity {
        return Err(ActionError::InsufficientMaterial {
            material: item.to_string(),
            needed: quantity,
            available,
        });
    }
    let points = part_value(rules, item, quantity)?;
    let _ = state.inventory.remove(item, quantity);
    state.research.research_points += points;
    tracing::debug!(tick = state.tick, item, quantity, points, "parts donated");
    Ok(points)
}

// ---------------------------------------------------------------------------
// Facilities
// ---------------------------------------------------------------------------

/// RP produced this tick by enabled, unblocked research facilities. Zero
/// while research is paused.
pub fn facility_points(state: &GameState, rules: &Rules) -> Result<f64, RulesError> {
    if !state.research.active {
        return Ok(0.0);
    }
    let mut facilities = 0u32;
    for machine in &state.machines {
        if !machine.enabled || machine.status == MachineStatus::Blocked {
            continue;
        }
        if rules.machine(machine.machine_type.as_str())?.research_facility {
            facilities += 1;
        }
    }
    Ok(facilities as f64 * rules.research.rp_per_facility_tick)
}

/// Add this tick's facility output to the research pool.
pub fn accrue_facility_points(state: &mut GameState, rules: &Rules) -> Result<f64, RulesError> {
    let points = facility_points(state, rules)?;
    state.research.research_points += points;
    Ok(points)
}

// ---------------------------------------------------------------------------
// Discovery and unlock bookkeeping
// ---------------------------------------------------------------------------

/// Record a discovery and open its prototype.
pub(crate) fn discover(state: &mut GameState, rules: &Rules, recipe: &RecipeId) -> Result<(), RulesError> {
    let prototype = build_prototype(rules, recipe)?;
    tracing::info!(tick = state.tick, recipe = %recipe, "recipe discovered");
    // Nothing to fill: the prototype is done the moment it opens.
    if prototype.is_complete() {
        unlock_recipe(state, recipe);
        return Ok(());
    }
    if !state.is_discovered(recipe.as_str()) {
        state.discovered_recipes.push(recipe.clone());
    }
    state.research.awaiting_prototype.push(prototype);
    Ok(())
}

/// Make a recipe usable.
pub fn unlock_recipe(state: &mut GameState, recipe: &RecipeId) {
    if !state.is_discovered(recipe.as_str()) {
        state.discovered_recipes.push(recipe.clone());
    }
    if !state.is_unlocked(recipe.as_str()) {
        state.unlocked_recipes.push(recipe.clone());
        tracing::info!(tick = state.tick, recipe = %recipe, "recipe unlocked");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::id::MaterialId;
    use foundry_core::test_utils::{machine, place_machine, sample_rules, sample_state};

    #[test]
    fn discovery_without_requirements_unlocks_at_once() {
        let mut rules = sample_rules();
        for age in rules.research.ages.iter_mut() {
            age.prototype_multiplier = 0.0;
        }
        let mut state = sample_state(&rules);
        let gear = RecipeId::new("gear");
        discover(&mut state, &rules, &gear).unwrap();
        assert!(state.research.awaiting_prototype.is_empty());
        assert!(state.is_discovered("gear"));
        assert!(state.is_unlocked("gear"));
    }

    #[test]
    fn credit_donation_converts_at_ratio() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.credits = 100.0;
        let points = donate_credits(&mut state, &rules, 20.0).unwrap();
        assert_eq!(points, 10.0);
        assert_eq!(state.credits, 80.0);
        assert_eq!(state.research.research_points, 10.0);
    }

    #[test]
    fn credit_donation_rejects_overdraft_and_bad_amounts() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.credits = 5.0;
        let before = state.clone();
        assert!(donate_credits(&mut state, &rules, 6.0).unwrap_err().to_string().contains("credits"));
        assert_eq!(donate_credits(&mut state, &rules, 0.0), Err(ActionError::InvalidAmount));
        assert_eq!(donate_credits(&mut state, &rules, f64::NAN), Err(ActionError::InvalidAmount));
        assert_eq!(state, before);
    }

    #[test]
    fn part_donation_uses_age_multiplier_and_factor() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        // iron_plate: base 8, age 1 multiplier 1.0, factor 0.5.
        let points = donate_parts(&mut state, &rules, "iron_plate", 4).unwrap();
        assert_eq!(points, 16.0);
        assert_eq!(state.inventory.quantity("iron_plate"), 36);
    }

    #[test]
    fn raw_parts_are_refused() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.inventory.add(&MaterialId::new("iron_ore"), 5);
        assert_eq!(
            donate_parts(&mut state, &rules, "iron_ore", 5),
            Err(ActionError::RawDonation)
        );
        assert_eq!(state.inventory.quantity("iron_ore"), 5);
    }

    #[test]
    fn part_donation_needs_stock() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        assert!(matches!(
            donate_parts(&mut state, &rules, "gear", 1),
            Err(ActionError::InsufficientMaterial { .. })
        ));
        assert!(matches!(
            donate_parts(&mut state, &rules, "mithril", 1),
            Err(ActionError::ItemNotFound(_))
        ));
    }

    #[test]
    fn current_age_follows_unlocks() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        assert_eq!(current_age(&state, &rules), 1);
        state.unlocked_recipes.clear();
        assert_eq!(current_age(&state, &rules), 1);
        state.unlocked_recipes.push(RecipeId::new("gear"));
        assert_eq!(current_age(&state, &rules), 2);
    }

    #[test]
    fn facilities_produce_only_while_active() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        place_machine(&mut state, machine("lab_1", "lab", 0, 0));
        place_machine(&mut state, machine("furnace_1", "furnace", 4, 4));
        assert_eq!(accrue_facility_points(&mut state, &rules).unwrap(), 1.0);
        state.research.active = false;
        assert_eq!(accrue_facility_points(&mut state, &rules).unwrap(), 0.0);
        state.research.active = true;
        state.machines[0].status = MachineStatus::Blocked;
        assert_eq!(accrue_facility_points(&mut state, &rules).unwrap(), 0.0);
        assert_eq!(state.research.research_points, 1.0);
    }

    #[test]
    fn unlock_is_idempotent() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        let gear = RecipeId::new("gear");
        unlock_recipe(&mut state, &gear);
        unlock_recipe(&mut state, &gear);
        assert_eq!(state.unlocked_recipes.iter().filter(|r| **r == gear).count(), 1);
        assert!(state.is_discovered("gear"));
    }
}
