//! Prototype construction and fulfillment.

use foundry_core::error::{ActionError, RulesError};
use foundry_core::id::{MaterialId, RecipeId};
use foundry_core::rules::Rules;
use foundry_core::state::{GameState, Prototype, PrototypeMode, PrototypeSlot};

use crate::unlock_recipe;

/// Build the prototype a freshly discovered recipe must complete.
///
/// Slot quantities are `ceil(inputQty x prototypeMultiplier[age])`. When the
/// recipe has manufactured inputs, only those become slots and its raw
/// inputs are waived. A raw-only recipe becomes a flow prototype whose slots
/// cover the raw inputs. Slots that would require nothing are left out.
pub fn build_prototype(rules: &Rules, recipe_id: &RecipeId) -> Result<Prototype, RulesError> {
    let recipe = rules.recipe(recipe_id.as_str())?;
    let multiplier = rules
        .research
        .age(recipe.age)
        .ok_or(RulesError::MissingAge(recipe.age))?
        .prototype_multiplier;

    let manufactured: Vec<(&MaterialId, u64)> = recipe
        .inputs
        .iter()
        .filter(|(m, _)| !rules.is_raw(m.as_str()))
        .map(|(m, q)| (m, *q))
        .collect();
    let (mode, inputs): (PrototypeMode, Vec<(&MaterialId, u64)>) = if manufactured.is_empty() {
        (
            PrototypeMode::Flow,
            recipe.inputs.iter().map(|(m, q)| (m, *q)).collect(),
        )
    } else {
        (PrototypeMode::Slots, manufactured)
    };

    let slots = inputs
        .into_iter()
        .map(|(material, quantity)| PrototypeSlot {
            material: material.clone(),
            quantity: (quantity as f64 * multiplier).ceil().max(0.0) as u64,
            filled: 0,
        })
        .filter(|slot| slot.quantity > 0)
        .collect();
    Ok(Prototype {
        recipe_id: recipe_id.clone(),
        mode,
        slots,
    })
}

/// Which slot a fill targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotSelector {
    Material(MaterialId),
    Index(usize),
}

/// Result of a slot fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FillOutcome {
    /// Units moved from inventory into the slot.
    pub moved: u64,
    /// Whether the fill completed the prototype and unlocked its recipe.
    pub unlocked: bool,
}

/// Move up to `quantity` units from inventory into a prototype slot.
///
/// The amount moved is clamped to `min(inventory, remaining capacity)`.
/// Filling the last open slot removes the prototype and unlocks its recipe.
pub fn fill_slot(
    state: &mut GameState,
    recipe: &str,
    selector: &SlotSelector,
    quantity: u64,
) -> Result<FillOutcome, ActionError> {
    if quantity == 0 {
        return Err(ActionError::InvalidQuantity);
    }
    let index = state
        .research
        .awaiting_prototype
        .iter()
        .position(|p| p.recipe_id.as_str() == recipe)
        .ok_or_else(|| ActionError::PrototypeNotFound(recipe.to_string()))?;
    let prototype = &state.research.awaiting_prototype[index];
    let slot_index = match selector {
        SlotSelector::Material(material) => prototype
            .slots
            .iter()
            .position(|s| &s.material == material)
            .ok_or_else(|| ActionError::SlotNotFound(material.to_string())),
        SlotSelector::Index(i) if *i < prototype.slots.len() => Ok(*i),
        SlotSelector::Index(i) => Err(ActionError::SlotNotFound(i.to_string())),
    }?;
    let slot = &prototype.slots[slot_index];
    if slot.is_full() {
        return Err(ActionError::SlotFull(slot.material.to_string()));
    }
    let available = state.inventory.quantity(slot.material.as_str());
    let moved = quantity.min(available).min(slot.remaining());
    if moved == 0 {
        return Err(ActionError::InsufficientMaterial {
            material: slot.material.to_string(),
            needed: quantity.min(slot.remaining()),
            available,
        });
    }

    let material = slot.material.clone();
    let _ = state.inventory.remove(material.as_str(), moved);
    state.research.awaiting_prototype[index].slots[slot_index].filled += moved;

    let unlocked = state.research.awaiting_prototype[index].is_complete();
    if unlocked {
        let done = state.research.awaiting_prototype.remove(index);
        unlock_recipe(state, &done.recipe_id);
    }
    Ok(FillOutcome { moved, unlocked })
}

/// Feed flow prototypes from inventory, `flowRatePerTick` units per slot.
/// Completed prototypes unlock their recipes. Returns the recipes unlocked.
pub fn advance_flow(state: &mut GameState, rules: &Rules) -> Vec<RecipeId> {
    if !state.research.active {
        return Vec::new();
    }
    let rate = rules.research.flow_rate_per_tick;
    let GameState {
        research,
        inventory,
        ..
    } = state;
    for prototype in research
        .awaiting_prototype
        .iter_mut()
        .filter(|p| p.mode == PrototypeMode::Flow)
    {
        for slot in prototype.slots.iter_mut() {
            let want = rate.min(slot.remaining());
            slot.filled += inventory.remove(slot.material.as_str(), want);
        }
    }

    let mut unlocked = Vec::new();
    let mut i = 0;
    while i < state.research.awaiting_prototype.len() {
        let prototype = &state.research.awaiting_prototype[i];
        if prototype.mode == PrototypeMode::Flow && prototype.is_complete() {
            let done = state.research.awaiting_prototype.remove(i);
            unlock_recipe(state, &done.recipe_id);
            unlocked.push(done.recipe_id);
        } else {
            i += 1;
        }
    }
    unlocked
}
