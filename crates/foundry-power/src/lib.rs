//! Energy allocation for the factory floor.
//!
//! The whole floor is one power network. Each tick the allocator sums the
//! output of powered generators against the draw of running machines, then
//! balances the two by blocking and unblocking machines.
//!
//! # Design
//!
//! - Deployment order is the priority order: the last machine added is the
//!   first to lose power and the first machine added is the first to get
//!   it back.
//! - A machine draws power when it is enabled, not blocked, and either has a
//!   recipe assigned or is a research facility.
//! - Events fire only on status *transitions*, not every tick.

use foundry_core::error::RulesError;
use foundry_core::id::{GeneratorId, MachineId, Ticks};
use foundry_core::rules::Rules;
use foundry_core::state::{Energy, GameState, Machine, MachineStatus};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Power events
// ---------------------------------------------------------------------------

/// Events emitted by the allocator on state transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PowerEvent {
    /// A machine lost power because demand exceeded supply.
    MachineBlocked { machine: MachineId, tick: Ticks },
    /// A blocked machine fit back under the available supply.
    MachineUnblocked { machine: MachineId, tick: Ticks },
    /// A generator stopped producing for lack of fuel.
    GeneratorStarved { generator: GeneratorId, tick: Ticks },
}

// ---------------------------------------------------------------------------
// Demand and supply
// ---------------------------------------------------------------------------

/// Whether the machine would draw power if it were not blocked.
pub fn wants_power(machine: &Machine, rules: &Rules) -> Result<bool, RulesError> {
    if !machine.enabled {
        return Ok(false);
    }
    let def = rules.machine(machine.machine_type.as_str())?;
    Ok(machine.recipe_id.is_some() || def.research_facility)
}

/// Current draw of a machine: zero when blocked or idle by configuration.
pub fn machine_demand(machine: &Machine, rules: &Rules) -> Result<f64, RulesError> {
    if machine.status == MachineStatus::Blocked {
        return Ok(0.0);
    }
    potential_demand(machine, rules)
}

/// Draw the machine would add if it were running.
fn potential_demand(machine: &Machine, rules: &Rules) -> Result<f64, RulesError> {
    if !wants_power(machine, rules)? {
        return Ok(0.0);
    }
    Ok(rules.machine(machine.machine_type.as_str())?.energy_consumption)
}

/// Sum generator output and machine draw.
///
/// `produced` counts generators with `powered == true`; `consumed` counts
/// machines that are enabled, not blocked, and have a recipe or are a
/// research facility.
pub fn calculate_energy(state: &GameState, rules: &Rules) -> Result<Energy, RulesError> {
    let mut produced = 0.0;
    for generator in state.generators.iter().filter(|g| g.powered) {
        produced += rules
            .generator(generator.generator_type.as_str())?
            .energy_output;
    }
    let mut consumed = 0.0;
    for machine in &state.machines {
        consumed += machine_demand(machine, rules)?;
    }
    Ok(Energy { produced, consumed })
}

// ---------------------------------------------------------------------------
// Balancing
// ---------------------------------------------------------------------------

/// Recompute energy and rebalance machine statuses.
///
/// Over capacity, machines are blocked in reverse deployment order until
/// consumption fits. Otherwise blocked machines are unblocked in deployment
/// order while the next one still fits; the first that does not fit stops
/// the pass. `state.energy` holds the final totals.
pub fn balance(state: &mut GameState, rules: &Rules) -> Result<Vec<PowerEvent>, RulesError> {
    let mut energy = calculate_energy(state, rules)?;
    let mut events = Vec::new();
    let tick = state.tick;

    if energy.consumed > energy.produced {
        for machine in state.machines.iter_mut().rev() {
            if energy.consumed <= energy.produced {
                break;
            }
            let demand = machine_demand(machine, rules)?;
            if demand <= 0.0 {
                continue;
            }
            machine.status = MachineStatus::Blocked;
            energy.consumed -= demand;
            tracing::debug!(tick, machine = %machine.id, "machine blocked for power");
            events.push(PowerEvent::MachineBlocked {
                machine: machine.id.clone(),
                tick,
            });
        }
    } else {
        for machine in state.machines.iter_mut() {
            if machine.status != MachineStatus::Blocked {
                continue;
            }
            let demand = potential_demand(machine, rules)?;
            if energy.consumed + demand > energy.produced {
                break;
            }
            machine.status = unblocked_status(machine);
            energy.consumed += demand;
            tracing::debug!(tick, machine = %machine.id, "machine unblocked");
            events.push(PowerEvent::MachineUnblocked {
                machine: machine.id.clone(),
                tick,
            });
        }
    }

    // Re-sum rather than trusting the running total.
    state.energy = calculate_energy(state, rules)?;
    Ok(events)
}

/// Status a machine takes when it leaves the blocked state.
pub fn unblocked_status(machine: &Machine) -> MachineStatus {
    if machine.recipe_id.is_some() {
        MachineStatus::Working
    } else {
        MachineStatus::Idle
    }
}

// ---------------------------------------------------------------------------
// Generator fuel
// ---------------------------------------------------------------------------

/// Update every generator's `powered` flag from fuel availability and burn
/// one tick of fuel for each generator that runs.
///
/// Disabled generators are unpowered. Fuel-less generators are powered
/// whenever enabled. Generators are fuelled in deployment order, so when
/// fuel runs short the earliest ones keep running.
pub fn update_generators(state: &mut GameState, rules: &Rules) -> Result<Vec<PowerEvent>, RulesError> {
    let mut events = Vec::new();
    let tick = state.tick;
    let GameState {
        generators,
        inventory,
        ..
    } = state;
    for generator in generators.iter_mut() {
        let was_powered = generator.powered;
        if !generator.enabled {
            generator.powered = false;
            continue;
        }
        let def = rules.generator(generator.generator_type.as_str())?;
        generator.powered = match &def.fuel {
            None => true,
            Some(fuel) => inventory.try_remove(fuel.material.as_str(), fuel.per_tick),
        };
        if was_powered && !generator.powered {
            tracing::debug!(tick, generator = %generator.id, "generator out of fuel");
            events.push(PowerEvent::GeneratorStarved {
                generator: generator.id.clone(),
                tick,
            });
        }
    }
    Ok(events)
}
