//! Experiments: spending research points to discover recipes.
//!
//! Random experiments pick among undiscovered recipes no more than one age
//! past the current age. Candidates fall into three buckets (older,
//! current, next) whose weight masses come from the rules; empty buckets
//! drop out and the remaining masses are renormalized. `Rules::validate`
//! requires the current bucket to carry at least 80% of the total, so a
//! current-age backlog is always strongly preferred.

use foundry_core::error::{ActionError, RulesError};
use foundry_core::id::RecipeId;
use foundry_core::rng::SimRng;
use foundry_core::rules::Rules;
use foundry_core::state::GameState;

use crate::{current_age, discover};

/// RP cost of an experiment at `age`.
pub fn experiment_cost(rules: &Rules, age: u32) -> Result<f64, RulesError> {
    rules
        .research
        .age(age)
        .map(|a| a.experiment_cost)
        .ok_or(RulesError::MissingAge(age))
}

/// Undiscovered recipes bucketed by age relative to `current`, each bucket
/// in recipe-id order.
fn buckets<'a>(state: &GameState, rules: &'a Rules, current: u32) -> [Vec<&'a RecipeId>; 3] {
    let mut older = Vec::new();
    let mut same = Vec::new();
    let mut next = Vec::new();
    for (id, recipe) in &rules.recipes {
        if state.is_discovered(id.as_str()) || state.is_unlocked(id.as_str()) {
            continue;
        }
        if recipe.age < current {
            older.push(id);
        } else if recipe.age == current {
            same.push(id);
        } else if recipe.age == current + 1 {
            next.push(id);
        }
    }
    [older, same, next]
}

/// Pick an undiscovered recipe by age-weighted random selection. `None`
/// when nothing is eligible.
pub fn select_recipe(state: &GameState, rules: &Rules, rng: &mut SimRng) -> Option<RecipeId> {
    let current = current_age(state, rules);
    let buckets = buckets(state, rules, current);
    let research = &rules.research;
    let weights = [
        research.older_age_weight,
        research.current_age_weight,
        research.next_age_weight,
    ];

    let total: f64 = buckets
        .iter()
        .zip(weights)
        .filter(|(bucket, _)| !bucket.is_empty())
        .map(|(_, w)| w.max(0.0))
        .sum();
    if total <= 0.0 {
        // Every non-empty bucket has zero weight: fall back to uniform.
        let all: Vec<&RecipeId> = buckets.iter().flatten().copied().collect();
        if all.is_empty() {
            return None;
        }
        let pick = rng.below(all.len() as u64) as usize;
        return all.get(pick).map(|r| (*r).clone());
    }

    let mut roll = rng.next_f64() * total;
    let mut chosen = None;
    for (bucket, weight) in buckets.iter().zip(weights) {
        if bucket.is_empty() {
            continue;
        }
        chosen = Some(bucket);
        let weight = weight.max(0.0);
        if roll < weight {
            break;
        }
        roll -= weight;
    }
    let bucket = chosen?;
    let pick = rng.below(bucket.len() as u64) as usize;
    bucket.get(pick).map(|r| (*r).clone())
}

/// Run a random experiment at the current age's cost.
pub fn run_experiment(state: &mut GameState, rules: &Rules, rng: &mut SimRng) -> Result<RecipeId, ActionError> {
    let cost = experiment_cost(rules, current_age(state, rules))?;
    let available = state.research.research_points;
    if available < cost {
        return Err(ActionError::InsufficientResearchPoints {
            needed: cost,
            available,
        });
    }
    let recipe = select_recipe(state, rules, rng).ok_or(ActionError::NothingToDiscover)?;
    state.research.research_points -= cost;
    discover(state, rules, &recipe)?;
    Ok(recipe)
}

/// Run an experiment aimed at a named recipe.
///
/// Costs `experimentCost[recipe.age] x targetedExperimentMultiplier` and is
/// refused for recipes more than one age past the current age.
pub fn run_targeted_experiment(state: &mut GameState, rules: &Rules, recipe: &str) -> Result<(), ActionError> {
    let def = rules
        .recipe(recipe)
        .map_err(|_| ActionError::RecipeNotFound(recipe.to_string()))?;
    if state.is_discovered(recipe) || state.is_unlocked(recipe) {
        return Err(ActionError::AlreadyDiscovered(recipe.to_string()));
    }
    if def.age > current_age(state, rules) + 1 {
        return Err(ActionError::AgeLocked {
            recipe: recipe.to_string(),
            age: def.age,
        });
    }
    let cost = experiment_cost(rules, def.age)? * rules.research.targeted_experiment_multiplier;
    let available = state.research.research_points;
    if available < cost {
        return Err(ActionError::InsufficientResearchPoints {
            needed: cost,
            available,
        });
    }
    state.research.research_points -= cost;
    discover(state, rules, &RecipeId::new(recipe))?;
    Ok(())
}

/// Free discovery rolled once per tick while research is active.
pub fn roll_passive_discovery(
    state: &mut GameState,
    rules: &Rules,
    rng: &mut SimRng,
) -> Result<Option<RecipeId>, RulesError> {
    if !state.research.active || !rng.chance(rules.research.passive_discovery_chance) {
        return Ok(None);
    }
    let Some(recipe) = select_recipe(state, rules, rng) else {
        return Ok(None);
    };
    discover(state, rules, &recipe)?;
    Ok(Some(recipe))
}
