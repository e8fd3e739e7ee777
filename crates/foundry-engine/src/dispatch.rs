//! The action dispatcher: `(state, rules, action) -> (state', error?)`.

use foundry_core::error::ActionError;
use foundry_core::event::ProductionEvent;
use foundry_core::rng::SimRng;
use foundry_core::rules::Rules;
use foundry_core::state::GameState;
use foundry_research::SlotSelector;

use crate::action::Action;
use crate::{purchases, structures, tick};

/// The outcome of one action.
///
/// On rejection `state` is the input state, untouched, and `error` says why.
#[derive(Debug, Clone, PartialEq)]
pub struct ApplyResult {
    pub state: GameState,
    pub error: Option<ActionError>,
    pub production_events: Vec<ProductionEvent>,
}

impl ApplyResult {
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The human-readable rejection reason, if any.
    pub fn error_message(&self) -> Option<String> {
        self.error.as_ref().map(ToString::to_string)
    }
}

/// Apply `action` to a copy of `state`. The input is never modified.
pub fn apply(state: &GameState, rules: &Rules, action: &Action) -> ApplyResult {
    let mut next = state.clone();
    match apply_in_place(&mut next, rules, action) {
        Ok(production_events) => ApplyResult {
            state: next,
            error: None,
            production_events,
        },
        Err(error) => {
            tracing::debug!(tick = state.tick, action = action.name(), %error, "action rejected");
            ApplyResult {
                state: state.clone(),
                error: Some(error),
                production_events: Vec::new(),
            }
        }
    }
}

/// Apply `action` directly to `state`.
///
/// Player errors are detected before the first write, so an `Err` leaves
/// the state as it was. A [`foundry_core::RulesError`] surfacing mid-tick
/// can leave a partial tick behind; use [`apply`] when that matters.
pub fn apply_in_place(
    state: &mut GameState,
    rules: &Rules,
    action: &Action,
) -> Result<Vec<ProductionEvent>, ActionError> {
    let structural = match action {
        Action::AssignRecipe {
            machine_id,
            recipe_id,
            cheat,
        } => {
            structures::assign_recipe(state, rules, machine_id, recipe_id.as_ref(), *cheat)?;
            true
        }
        Action::BuildMachine {
            machine_type,
            quantity,
            cheat,
        } => {
            structures::build_machine(state, rules, machine_type, *quantity, *cheat)?;
            false
        }
        Action::BuildGenerator {
            generator_type,
            quantity,
            cheat,
        } => {
            structures::build_generator(state, rules, generator_type, *quantity, *cheat)?;
            false
        }
        Action::AddMachine { machine_type, x, y } => {
            structures::add_machine(state, rules, machine_type, *x, *y)?;
            true
        }
        Action::AddGenerator { generator_type, x, y } => {
            structures::add_generator(state, rules, generator_type, *x, *y)?;
            true
        }
        Action::RemoveMachine { id } => {
            structures::remove_machine(state, rules, id)?;
            true
        }
        Action::RemoveGenerator { id } => {
            structures::remove_generator(state, id)?;
            true
        }
        Action::MoveMachine { id, x, y } => {
            structures::move_machine(state, rules, id, *x, *y)?;
            false
        }
        Action::MoveGenerator { id, x, y } => {
            structures::move_generator(state, rules, id, *x, *y)?;
            false
        }
        Action::ToggleMachine { id } => {
            structures::toggle_machine(state, id)?;
            true
        }
        Action::ToggleGenerator { id } => {
            structures::toggle_generator(state, id)?;
            true
        }
        Action::UnblockMachine { id } => {
            structures::unblock_machine(state, id)?;
            true
        }
        Action::SellGoods { item_id, quantity } => {
            foundry_market::sell(state, rules, item_id.as_str(), *quantity)?;
            false
        }
        Action::DonateCredits { amount } => {
            foundry_research::donate_credits(state, rules, *amount)?;
            false
        }
        Action::DonateParts { item_id, quantity } => {
            foundry_research::donate_parts(state, rules, item_id.as_str(), *quantity)?;
            false
        }
        Action::RunExperiment => {
            let mut rng = SimRng::new(state.rng_seed);
            foundry_research::run_experiment(state, rules, &mut rng)?;
            state.rng_seed = rng.current_seed();
            false
        }
        Action::RunTargetedExperiment { recipe_id } => {
            foundry_research::run_targeted_experiment(state, rules, recipe_id.as_str())?;
            false
        }
        Action::FillPrototypeSlot {
            recipe_id,
            material_id,
            slot_index,
            quantity,
        } => {
            let selector = match (material_id, slot_index) {
                (Some(material), _) => SlotSelector::Material(material.clone()),
                (None, Some(index)) => SlotSelector::Index(*index),
                (None, None) => return Err(ActionError::MissingSlotSelector),
            };
            foundry_research::fill_slot(state, recipe_id.as_str(), &selector, *quantity)?;
            false
        }
        Action::ToggleResearch { active } => {
            state.research.active = *active;
            true
        }
        Action::BuyFloorSpace => {
            purchases::buy_floor_space(state, rules)?;
            false
        }
        Action::BuyInventorySpace => {
            purchases::buy_inventory_space(state, rules)?;
            false
        }
        Action::ExpandExploration => {
            purchases::expand_exploration(state, rules)?;
            false
        }
        Action::UnlockExplorationNode { x, y } => {
            purchases::unlock_exploration_node(state, rules, *x, *y)?;
            false
        }
        Action::Simulate { ticks } => return simulate(state, rules, ticks.unwrap_or(1)),
    };

    // Anything that changes supply or demand rebalances before returning.
    if structural {
        foundry_power::balance(state, rules)?;
    }
    Ok(Vec::new())
}

fn simulate(state: &mut GameState, rules: &Rules, ticks: u32) -> Result<Vec<ProductionEvent>, ActionError> {
    if ticks == 0 {
        return Err(ActionError::InvalidQuantity);
    }
    let mut events = Vec::new();
    for _ in 0..ticks {
        events.extend(tick::run_tick(state, rules)?.production_events);
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::id::{MachineTypeId, MaterialId, RecipeId};
    use foundry_core::state::MachineStatus;
    use foundry_core::test_utils::{generator, machine, place_generator, place_machine, sample_rules, sample_state};

    #[test]
    fn rejected_action_returns_input_state() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        let result = apply(
            &state,
            &rules,
            &Action::SellGoods {
                item_id: MaterialId::new("iron_ingot"),
                quantity: 500,
            },
        );
        assert_eq!(result.state, state);
        assert!(result.error_message().unwrap().contains("iron_ingot"));
    }

    #[test]
    fn successful_action_leaves_input_alone() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        let result = apply(
            &state,
            &rules,
            &Action::SellGoods {
                item_id: MaterialId::new("iron_ingot"),
                quantity: 5,
            },
        );
        assert!(result.is_ok());
        assert_eq!(state.inventory.quantity("iron_ingot"), 10);
        assert_eq!(result.state.inventory.quantity("iron_ingot"), 5);
        assert!(result.state.credits > state.credits);
    }

    #[test]
    fn deploy_refreshes_energy() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        let result = apply(
            &state,
            &rules,
            &Action::AddGenerator {
                generator_type: "solar_panel".into(),
                x: Some(0),
                y: Some(0),
            },
        );
        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(result.state.energy.produced, 20.0);
        assert_eq!(result.state.generators[0].id.as_str(), "generator_1");
    }

    #[test]
    fn overdrawing_deploy_blocks_the_newest_machine_at_once() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.built_machines.insert(MachineTypeId::new("furnace"), 3);
        let script = [
            Action::AddGenerator {
                generator_type: "solar_panel".into(),
                x: Some(6),
                y: Some(6),
            },
            Action::AddMachine {
                machine_type: MachineTypeId::new("furnace"),
                x: Some(0),
                y: Some(0),
            },
            Action::AddMachine {
                machine_type: MachineTypeId::new("furnace"),
                x: Some(2),
                y: Some(0),
            },
            Action::AddMachine {
                machine_type: MachineTypeId::new("furnace"),
                x: Some(4),
                y: Some(0),
            },
        ];
        for action in &script {
            state = apply(&state, &rules, action).state;
        }
        for id in ["machine_2", "machine_3", "machine_4"] {
            let assign = Action::AssignRecipe {
                machine_id: id.into(),
                recipe_id: Some(RecipeId::new("iron_ingot")),
                cheat: false,
            };
            let result = apply(&state, &rules, &assign);
            assert!(result.is_ok(), "{:?}", result.error);
            state = result.state;
            assert!(state.energy.consumed <= state.energy.produced, "after {id}: {:?}", state.energy);
        }
        let statuses: Vec<_> = state.machines.iter().map(|m| m.status).collect();
        assert_eq!(statuses, [MachineStatus::Working, MachineStatus::Working, MachineStatus::Blocked]);
        assert_eq!(state.energy.consumed, 20.0);
    }

    #[test]
    fn fill_needs_a_selector() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        let result = apply(
            &state,
            &rules,
            &Action::FillPrototypeSlot {
                recipe_id: RecipeId::new("gear"),
                material_id: None,
                slot_index: None,
                quantity: 1,
            },
        );
        assert_eq!(result.error, Some(ActionError::MissingSlotSelector));
    }

    #[test]
    fn simulate_runs_ticks_and_collects_events() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        let mut m = machine("m1", "press", 0, 0);
        m.recipe_id = Some(RecipeId::new("iron_plate"));
        m.status = MachineStatus::Working;
        place_machine(&mut state, m);
        place_generator(&mut state, generator("g1", "solar_panel", 4, 4));

        let result = apply(&state, &rules, &Action::Simulate { ticks: Some(4) });
        assert!(result.is_ok(), "{:?}", result.error);
        assert_eq!(result.state.tick, 4);
        // Two ticks per plate.
        assert_eq!(result.production_events.len(), 2);
        assert_eq!(result.state.inventory.quantity("iron_plate"), 42);
    }

    #[test]
    fn zero_tick_simulate_is_rejected() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        let result = apply(&state, &rules, &Action::Simulate { ticks: Some(0) });
        assert_eq!(result.error, Some(ActionError::InvalidQuantity));
        assert_eq!(result.state.tick, 0);
    }

    #[test]
    fn experiment_advances_the_seed() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.research.research_points = 100.0;
        let result = apply(&state, &rules, &Action::RunExperiment);
        assert!(result.is_ok(), "{:?}", result.error);
        assert_ne!(result.state.rng_seed, state.rng_seed);
        assert_eq!(result.state.research.research_points, 90.0);
        assert_eq!(result.state.discovered_recipes.len(), state.discovered_recipes.len() + 1);
    }

    #[test]
    fn build_then_deploy_machine() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        let built = apply(
            &state,
            &rules,
            &Action::BuildMachine {
                machine_type: MachineTypeId::new("furnace"),
                quantity: 1,
                cheat: false,
            },
        );
        assert!(built.is_ok());
        assert_eq!(built.state.built_machines[&MachineTypeId::new("furnace")], 3);
        assert_eq!(built.state.inventory.quantity("iron_plate"), 35);

        let deployed = apply(
            &built.state,
            &rules,
            &Action::AddMachine {
                machine_type: MachineTypeId::new("furnace"),
                x: Some(2),
                y: Some(2),
            },
        );
        assert!(deployed.is_ok(), "{:?}", deployed.error);
        assert_eq!(deployed.state.machines.len(), 1);
        assert_eq!(deployed.state.built_machines[&MachineTypeId::new("furnace")], 2);
    }
}
