//! Credit-priced growth: floor chunks, inventory space, exploration and
//! extraction nodes.

use foundry_core::error::ActionError;
use foundry_core::id::NodeId;
use foundry_core::rules::Rules;
use foundry_core::state::{ExtractionNode, GameState};
use foundry_spatial::expansion::{next_purchase, purchase_floor};

fn charge(state: &mut GameState, cost: f64) -> Result<(), ActionError> {
    if state.credits < cost {
        return Err(ActionError::InsufficientCredits {
            needed: cost,
            available: state.credits,
        });
    }
    state.credits -= cost;
    Ok(())
}

pub(crate) fn buy_floor_space(state: &mut GameState, rules: &Rules) -> Result<(), ActionError> {
    let purchase = next_purchase(&state.floor_space, &rules.floor_space);
    charge(state, purchase.cost)?;
    purchase_floor(&mut state.floor_space, &purchase);
    tracing::info!(
        tick = state.tick,
        x = purchase.chunk.x,
        y = purchase.chunk.y,
        cost = purchase.cost,
        "floor chunk purchased"
    );
    Ok(())
}

/// Price of the next inventory upgrade: `baseCost x growth^purchases`.
pub fn inventory_space_cost(state: &GameState, rules: &Rules) -> f64 {
    let space = &rules.inventory_space;
    space.base_cost * space.cost_growth.powi(state.inventory_purchases as i32)
}

pub(crate) fn buy_inventory_space(state: &mut GameState, rules: &Rules) -> Result<(), ActionError> {
    let cost = inventory_space_cost(state, rules);
    charge(state, cost)?;
    state.inventory_space += rules.inventory_space.step;
    state.inventory_purchases += 1;
    tracing::info!(tick = state.tick, space = state.inventory_space, cost, "inventory space purchased");
    Ok(())
}

pub(crate) fn expand_exploration(state: &mut GameState, rules: &Rules) -> Result<(), ActionError> {
    let map = state
        .exploration_map
        .as_ref()
        .ok_or(ActionError::NoExplorationMap)?;
    let (explored, expansion) =
        foundry_exploration::explore_next(map, rules).ok_or(ActionError::NoNewTiles)?;
    charge(state, expansion.cost)?;
    state.exploration_map = Some(explored);
    tracing::info!(
        tick = state.tick,
        cx = expansion.chunk.cx,
        cy = expansion.chunk.cy,
        cells = expansion.cells_to_explore,
        cost = expansion.cost,
        "exploration expanded"
    );
    Ok(())
}

pub(crate) fn unlock_exploration_node(
    state: &mut GameState,
    rules: &Rules,
    x: u32,
    y: u32,
) -> Result<(), ActionError> {
    let map = state
        .exploration_map
        .as_ref()
        .ok_or(ActionError::NoExplorationMap)?;
    let node = foundry_exploration::lockable_node(map, x, y)?;
    let resource = node.resource_type.clone();
    let rate = node.rate;
    let cost = foundry_exploration::unlock_cost(&state.extraction_nodes, rules, resource.as_str());
    charge(state, cost)?;

    if let Some(node) = state
        .exploration_map
        .as_mut()
        .and_then(|m| m.tile_mut(x, y))
        .and_then(|t| t.extraction_node.as_mut())
    {
        node.unlocked = true;
    }
    state.extraction_nodes.push(ExtractionNode {
        id: NodeId::new(format!("node_{x}_{y}")),
        resource_type: resource.clone(),
        rate,
        active: true,
    });
    tracing::info!(tick = state.tick, x, y, resource = %resource, cost, "extraction node unlocked");
    Ok(())
}
