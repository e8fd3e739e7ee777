//! The per-tick simulation pipeline.
//!
//! One tick runs these phases in order:
//!
//! 1. **Advance**: bump `tick` and derive the tick's RNG from `rngSeed`.
//! 2. **Extraction**: each active node splits its rate across machines that
//!    need its resource, in deployment order; the rest goes to inventory.
//! 3. **Buffering**: running machines top their buffers up from inventory.
//! 4. **Production**: machines with satisfied inputs make progress and
//!    complete when their recipe's tick count is reached.
//! 5. **Energy**: recompute supply and demand, block or unblock machines.
//! 6. **Generators**: update `powered` from fuel and burn fuel.
//! 7. **Market**: recovery for items not sold last tick, then random events.
//! 8. **Research**: facility points, flow prototypes, passive discovery.
//!
//! The RNG seed written back at the end resumes the sequence next tick.

use foundry_core::error::RulesError;
use foundry_core::event::ProductionEvent;
use foundry_core::id::{RecipeId, Ticks};
use foundry_core::rng::SimRng;
use foundry_core::rules::Rules;
use foundry_core::state::{GameState, Machine, MachineStatus, MarketEvent};
use foundry_power::PowerEvent;
use foundry_research::{accrue_facility_points, advance_flow, roll_passive_discovery};

/// Everything one tick did besides mutating the state.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickReport {
    pub tick: Ticks,
    pub production_events: Vec<ProductionEvent>,
    pub power_events: Vec<PowerEvent>,
    pub market_events: Vec<MarketEvent>,
    pub research_points: f64,
    pub unlocked: Vec<RecipeId>,
    pub discovered: Option<RecipeId>,
}

/// Whether a machine takes part in extraction, buffering and production.
fn is_running(machine: &Machine) -> bool {
    machine.enabled && machine.status != MachineStatus::Blocked
}

fn extract(state: &mut GameState, rules: &Rules) -> Result<(), RulesError> {
    let GameState {
        extraction_nodes,
        machines,
        inventory,
        inventory_space,
        ..
    } = state;
    for node in extraction_nodes.iter().filter(|n| n.active) {
        let resource = &node.resource_type;
        let mut remaining = node.rate;
        for machine in machines.iter_mut() {
            if remaining == 0 {
                break;
            }
            let Some(recipe_id) = &machine.recipe_id else { continue };
            if !is_running(machine) {
                continue;
            }
            let recipe = rules.recipe(recipe_id.as_str())?;
            let Some(&required) = recipe.inputs.get(resource) else { continue };
            let missing = required.saturating_sub(machine.internal_buffer.quantity(resource.as_str()));
            let given = missing.min(remaining);
            machine.internal_buffer.add(resource, given);
            remaining -= given;
        }
        if remaining > 0 {
            let cap = rules.max_stack(resource.as_str(), *inventory_space)?;
            let room = cap.saturating_sub(inventory.quantity(resource.as_str()));
            inventory.add(resource, remaining.min(room));
        }
    }
    Ok(())
}

fn buffer_from_inventory(state: &mut GameState, rules: &Rules) -> Result<(), RulesError> {
    let GameState {
        machines, inventory, ..
    } = state;
    for machine in machines.iter_mut() {
        let Some(recipe_id) = &machine.recipe_id else { continue };
        if !is_running(machine) {
            continue;
        }
        let recipe = rules.recipe(recipe_id.as_str())?;
        for (material, &required) in &recipe.inputs {
            let missing = required.saturating_sub(machine.internal_buffer.quantity(material.as_str()));
            if missing == 0 {
                continue;
            }
            let taken = inventory.remove(material.as_str(), missing);
            machine.internal_buffer.add(material, taken);
        }
    }
    Ok(())
}

fn produce(state: &mut GameState, rules: &Rules) -> Result<Vec<ProductionEvent>, RulesError> {
    let GameState {
        machines,
        inventory,
        inventory_space,
        ..
    } = state;
    let mut events = Vec::new();
    for machine in machines.iter_mut() {
        let Some(recipe_id) = &machine.recipe_id else { continue };
        if !is_running(machine) {
            continue;
        }
        let recipe = rules.recipe(recipe_id.as_str())?;
        if !machine.internal_buffer.satisfies(&recipe.inputs) {
            continue;
        }
        let needed = recipe.ticks_to_complete.max(1);
        if machine.progress < needed {
            machine.progress += 1;
        }
        if machine.progress < needed {
            continue;
        }

        let mut fits = true;
        for (material, &quantity) in &recipe.outputs {
            let cap = rules.max_stack(material.as_str(), *inventory_space)?;
            if inventory.quantity(material.as_str()) + quantity > cap {
                fits = false;
                break;
            }
        }
        // A finished run waits at full progress until the output fits.
        if !fits {
            continue;
        }

        for (material, &quantity) in &recipe.inputs {
            let _ = machine.internal_buffer.remove(material.as_str(), quantity);
        }
        for (material, &quantity) in &recipe.outputs {
            inventory.add(material, quantity);
            events.push(ProductionEvent {
                machine_id: machine.id.clone(),
                item_id: material.clone(),
                quantity,
            });
        }
        machine.progress = 0;
    }
    Ok(events)
}

/// Advance the state by one tick.
pub fn run_tick(state: &mut GameState, rules: &Rules) -> Result<TickReport, RulesError> {
    // Sales recorded before this tick suppress that item's recovery.
    let sold_last_tick = foundry_market::sold_at(state, state.tick);
    state.tick += 1;
    let mut rng = SimRng::new(state.rng_seed);
    rng.next_u64();

    extract(state, rules)?;
    buffer_from_inventory(state, rules)?;
    let production_events = produce(state, rules)?;

    let mut power_events = foundry_power::balance(state, rules)?;
    power_events.extend(foundry_power::update_generators(state, rules)?);

    foundry_market::recover(state, rules, &sold_last_tick);
    let market_events = foundry_market::roll_events(state, rules, &mut rng);

    let research_points = accrue_facility_points(state, rules)?;
    let unlocked = advance_flow(state, rules);
    let discovered = roll_passive_discovery(state, rules, &mut rng)?;

    state.rng_seed = rng.current_seed();
    tracing::debug!(
        tick = state.tick,
        produced = production_events.len(),
        energy_produced = state.energy.produced,
        energy_consumed = state.energy.consumed,
        "tick complete"
    );
    Ok(TickReport {
        tick: state.tick,
        production_events,
        power_events,
        market_events,
        research_points,
        unlocked,
        discovered,
    })
}
