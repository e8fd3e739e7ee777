//! Machine and generator handlers: recipes, build pools, deployment,
//! movement and toggles.
//!
//! Every handler finishes its checks before the first write, so a rejected
//! action leaves the state exactly as it found it.

use std::collections::BTreeMap;

use foundry_core::error::ActionError;
use foundry_core::id::{GeneratorId, GeneratorTypeId, MachineId, MachineTypeId, MaterialId, RecipeId};
use foundry_core::inventory::Inventory;
use foundry_core::rules::Rules;
use foundry_core::state::{Generator, GameState, Machine, MachineStatus, Placement, StructureKind};
use foundry_power::unblocked_status;
use foundry_spatial::validate_structure_placement;

/// Return buffered materials to the inventory. Raw materials are dropped
/// unless `keep_raw`.
fn refund_buffer(buffer: &mut Inventory, inventory: &mut Inventory, rules: &Rules, keep_raw: bool) {
    let taken = std::mem::take(buffer);
    for (material, quantity) in taken.iter() {
        if keep_raw || !rules.is_raw(material.as_str()) {
            inventory.add(material, quantity);
        }
    }
}

// ---------------------------------------------------------------------------
// Recipes
// ---------------------------------------------------------------------------

pub(crate) fn assign_recipe(
    state: &mut GameState,
    rules: &Rules,
    machine_id: &str,
    recipe: Option<&RecipeId>,
    cheat: bool,
) -> Result<(), ActionError> {
    let machine = state
        .machine(machine_id)
        .ok_or_else(|| ActionError::MachineNotFound(machine_id.to_string()))?;
    if let Some(recipe) = recipe {
        rules
            .recipe(recipe.as_str())
            .map_err(|_| ActionError::RecipeNotFound(recipe.to_string()))?;
        if !cheat && !state.is_unlocked(recipe.as_str()) {
            return Err(ActionError::RecipeNotUnlocked);
        }
        let def = rules.machine(machine.machine_type.as_str())?;
        if !def.allowed_recipes.contains(recipe) {
            return Err(ActionError::RecipeNotAllowed {
                machine_type: machine.machine_type.to_string(),
                recipe: recipe.to_string(),
            });
        }
    }
    if machine.recipe_id.as_ref() == recipe {
        return Ok(());
    }

    if let (true, Some(recipe)) = (cheat, recipe) {
        foundry_research::unlock_recipe(state, recipe);
    }
    let GameState {
        machines,
        inventory,
        ..
    } = state;
    if let Some(machine) = machines.iter_mut().find(|m| m.id.as_str() == machine_id) {
        refund_buffer(&mut machine.internal_buffer, inventory, rules, false);
        machine.recipe_id = recipe.cloned();
        machine.progress = 0;
        if machine.status != MachineStatus::Blocked {
            machine.status = unblocked_status(machine);
        }
    }
    tracing::debug!(machine = machine_id, recipe = ?recipe, cheat, "recipe assigned");
    Ok(())
}

// ---------------------------------------------------------------------------
// Build pools
// ---------------------------------------------------------------------------

/// Charge `quantity x cost` from inventory, or fail naming the first short
/// material.
fn charge_cost(
    inventory: &mut Inventory,
    cost: &BTreeMap<MaterialId, u64>,
    quantity: u64,
) -> Result<(), ActionError> {
    for (material, per_unit) in cost {
        let needed = per_unit.saturating_mul(quantity);
        let available = inventory.quantity(material.as_str());
        if available < needed {
            return Err(ActionError::InsufficientMaterial {
                material: material.to_string(),
                needed,
                available,
            });
        }
    }
    for (material, per_unit) in cost {
        let _ = inventory.remove(material.as_str(), per_unit * quantity);
    }
    Ok(())
}

/// The build count as a pool quantity and the pool size after adding it.
/// Counts that do not fit the pool are rejected before anything is charged.
fn grow_pool(current: u32, quantity: i64) -> Result<(u32, u32), ActionError> {
    let quantity = u32::try_from(quantity).map_err(|_| ActionError::InvalidBuildQuantity)?;
    let pool = current
        .checked_add(quantity)
        .ok_or(ActionError::InvalidBuildQuantity)?;
    Ok((quantity, pool))
}

pub(crate) fn build_machine(
    state: &mut GameState,
    rules: &Rules,
    machine_type: &MachineTypeId,
    quantity: i64,
    cheat: bool,
) -> Result<(), ActionError> {
    if quantity < 1 {
        return Err(ActionError::InvalidBuildQuantity);
    }
    let def = rules
        .machine(machine_type.as_str())
        .map_err(|_| ActionError::MachineTypeNotFound(machine_type.to_string()))?;
    let current = state.built_machines.get(machine_type).copied().unwrap_or(0);
    let (quantity, pool) = grow_pool(current, quantity)?;
    if !cheat {
        charge_cost(&mut state.inventory, &def.cost, u64::from(quantity))?;
    }
    state.built_machines.insert(machine_type.clone(), pool);
    tracing::info!(tick = state.tick, machine_type = %machine_type, quantity, cheat, "machines built");
    Ok(())
}

pub(crate) fn build_generator(
    state: &mut GameState,
    rules: &Rules,
    generator_type: &GeneratorTypeId,
    quantity: i64,
    cheat: bool,
) -> Result<(), ActionError> {
    if quantity < 1 {
        return Err(ActionError::InvalidBuildQuantity);
    }
    let def = rules
        .generator(generator_type.as_str())
        .map_err(|_| ActionError::GeneratorTypeNotFound(generator_type.to_string()))?;
    let current = state.built_generators.get(generator_type).copied().unwrap_or(0);
    let (quantity, pool) = grow_pool(current, quantity)?;
    if !cheat {
        charge_cost(&mut state.inventory, &def.cost, u64::from(quantity))?;
    }
    state.built_generators.insert(generator_type.clone(), pool);
    tracing::info!(tick = state.tick, generator_type = %generator_type, quantity, cheat, "generators built");
    Ok(())
}

// ---------------------------------------------------------------------------
// Deployment
// ---------------------------------------------------------------------------

/// Next unused structure id. Legacy saves may already hold ids past the
/// counter.
fn fresh_id(state: &mut GameState, prefix: &str) -> String {
    loop {
        let id = state.allocate_structure_id(prefix);
        if state.machine(&id).is_none() && state.generator(&id).is_none() {
            return id;
        }
    }
}

fn position(x: Option<i32>, y: Option<i32>) -> Result<(i32, i32), ActionError> {
    match (x, y) {
        (Some(x), Some(y)) => Ok((x, y)),
        _ => Err(ActionError::MissingPosition),
    }
}

pub(crate) fn add_machine(
    state: &mut GameState,
    rules: &Rules,
    machine_type: &MachineTypeId,
    x: Option<i32>,
    y: Option<i32>,
) -> Result<MachineId, ActionError> {
    if state.built_machines.get(machine_type).copied().unwrap_or(0) < 1 {
        return Err(ActionError::NoBuiltMachine(machine_type.to_string()));
    }
    let (x, y) = position(x, y)?;
    validate_structure_placement(state, rules, StructureKind::Machine, machine_type.as_str(), x, y, None)?;

    if let Some(count) = state.built_machines.get_mut(machine_type) {
        *count -= 1;
    }
    let id = MachineId::new(fresh_id(state, "machine"));
    state.floor_space.placements.push(Placement {
        id: id.to_string(),
        kind: StructureKind::Machine,
        structure_type: machine_type.to_string(),
        x,
        y,
    });
    state.machines.push(Machine {
        id: id.clone(),
        machine_type: machine_type.clone(),
        x,
        y,
        enabled: true,
        recipe_id: None,
        internal_buffer: Inventory::new(),
        status: MachineStatus::Idle,
        progress: 0,
    });
    tracing::debug!(tick = state.tick, machine = %id, x, y, "machine deployed");
    Ok(id)
}

pub(crate) fn add_generator(
    state: &mut GameState,
    rules: &Rules,
    generator_type: &GeneratorTypeId,
    x: Option<i32>,
    y: Option<i32>,
) -> Result<GeneratorId, ActionError> {
    if state.built_generators.get(generator_type).copied().unwrap_or(0) < 1 {
        return Err(ActionError::NoBuiltGenerator(generator_type.to_string()));
    }
    let (x, y) = position(x, y)?;
    validate_structure_placement(
        state,
        rules,
        StructureKind::Generator,
        generator_type.as_str(),
        x,
        y,
        None,
    )?;
    let fuelless = rules.generator(generator_type.as_str())?.fuel.is_none();

    if let Some(count) = state.built_generators.get_mut(generator_type) {
        *count -= 1;
    }
    let id = GeneratorId::new(fresh_id(state, "generator"));
    state.floor_space.placements.push(Placement {
        id: id.to_string(),
        kind: StructureKind::Generator,
        structure_type: generator_type.to_string(),
        x,
        y,
    });
    // Fuelled generators come up unpowered until the next fuel pass.
    state.generators.push(Generator {
        id: id.clone(),
        generator_type: generator_type.clone(),
        x,
        y,
        enabled: true,
        powered: fuelless,
    });
    tracing::debug!(tick = state.tick, generator = %id, x, y, "generator deployed");
    Ok(id)
}

pub(crate) fn remove_machine(state: &mut GameState, rules: &Rules, id: &str) -> Result<(), ActionError> {
    let index = state
        .machines
        .iter()
        .position(|m| m.id.as_str() == id)
        .ok_or_else(|| ActionError::MachineNotFound(id.to_string()))?;
    let mut machine = state.machines.remove(index);
    refund_buffer(&mut machine.internal_buffer, &mut state.inventory, rules, true);
    state.floor_space.placements.retain(|p| p.id != id);
    *state.built_machines.entry(machine.machine_type).or_insert(0) += 1;
    tracing::debug!(tick = state.tick, machine = id, "machine removed");
    Ok(())
}

pub(crate) fn remove_generator(state: &mut GameState, id: &str) -> Result<(), ActionError> {
    let index = state
        .generators
        .iter()
        .position(|g| g.id.as_str() == id)
        .ok_or_else(|| ActionError::GeneratorNotFound(id.to_string()))?;
    let generator = state.generators.remove(index);
    state.floor_space.placements.retain(|p| p.id != id);
    *state.built_generators.entry(generator.generator_type).or_insert(0) += 1;
    tracing::debug!(tick = state.tick, generator = id, "generator removed");
    Ok(())
}

pub(crate) fn move_machine(
    state: &mut GameState,
    rules: &Rules,
    id: &str,
    x: Option<i32>,
    y: Option<i32>,
) -> Result<(), ActionError> {
    let machine_type = state
        .machine(id)
        .map(|m| m.machine_type.clone())
        .ok_or_else(|| ActionError::MachineNotFound(id.to_string()))?;
    let (x, y) = position(x, y)?;
    validate_structure_placement(state, rules, StructureKind::Machine, machine_type.as_str(), x, y, Some(id))?;
    if let Some(machine) = state.machine_mut(id) {
        machine.x = x;
        machine.y = y;
    }
    if let Some(placement) = state.placement_mut(id) {
        placement.x = x;
        placement.y = y;
    }
    Ok(())
}

pub(crate) fn move_generator(
    state: &mut GameState,
    rules: &Rules,
    id: &str,
    x: Option<i32>,
    y: Option<i32>,
) -> Result<(), ActionError> {
    let generator_type = state
        .generator(id)
        .map(|g| g.generator_type.clone())
        .ok_or_else(|| ActionError::GeneratorNotFound(id.to_string()))?;
    let (x, y) = position(x, y)?;
    validate_structure_placement(
        state,
        rules,
        StructureKind::Generator,
        generator_type.as_str(),
        x,
        y,
        Some(id),
    )?;
    if let Some(generator) = state.generator_mut(id) {
        generator.x = x;
        generator.y = y;
    }
    if let Some(placement) = state.placement_mut(id) {
        placement.x = x;
        placement.y = y;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Toggles
// ---------------------------------------------------------------------------

pub(crate) fn toggle_machine(state: &mut GameState, id: &str) -> Result<(), ActionError> {
    let machine = state
        .machine_mut(id)
        .ok_or_else(|| ActionError::MachineNotFound(id.to_string()))?;
    machine.enabled = !machine.enabled;
    Ok(())
}

pub(crate) fn toggle_generator(state: &mut GameState, id: &str) -> Result<(), ActionError> {
    let generator = state
        .generator_mut(id)
        .ok_or_else(|| ActionError::GeneratorNotFound(id.to_string()))?;
    generator.enabled = !generator.enabled;
    if !generator.enabled {
        generator.powered = false;
    }
    Ok(())
}

pub(crate) fn unblock_machine(state: &mut GameState, id: &str) -> Result<(), ActionError> {
    let machine = state
        .machine_mut(id)
        .ok_or_else(|| ActionError::MachineNotFound(id.to_string()))?;
    if machine.status != MachineStatus::Blocked {
        return Err(ActionError::NotBlocked(id.to_string()));
    }
    machine.status = unblocked_status(machine);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::test_utils::{machine, place_machine, sample_rules, sample_state, widen_floor};
    use foundry_core::validation::check_invariants;

    fn setup() -> (Rules, GameState) {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        widen_floor(&mut state, &rules, 3);
        (rules, state)
    }

    #[test]
    fn assign_requires_unlock_unless_cheating() {
        let (rules, mut state) = setup();
        place_machine(&mut state, machine("m1", "furnace", 0, 0));
        let copper = RecipeId::new("copper_ingot");
        assert_eq!(
            assign_recipe(&mut state, &rules, "m1", Some(&copper), false),
            Err(ActionError::RecipeNotUnlocked)
        );
        assert_eq!(state.machines[0].recipe_id, None);

        assign_recipe(&mut state, &rules, "m1", Some(&copper), true).unwrap();
        assert_eq!(state.machines[0].recipe_id, Some(copper));
        assert_eq!(state.machines[0].status, MachineStatus::Working);
        assert!(state.is_unlocked("copper_ingot"));
    }

    #[test]
    fn assign_checks_machine_type() {
        let (rules, mut state) = setup();
        place_machine(&mut state, machine("m1", "furnace", 0, 0));
        let plate = RecipeId::new("iron_plate");
        assert!(matches!(
            assign_recipe(&mut state, &rules, "m1", Some(&plate), false),
            Err(ActionError::RecipeNotAllowed { .. })
        ));
        assert!(matches!(
            assign_recipe(&mut state, &rules, "ghost", None, false),
            Err(ActionError::MachineNotFound(_))
        ));
    }

    #[test]
    fn clearing_a_recipe_refunds_only_manufactured_inputs() {
        let (rules, mut state) = setup();
        let mut m = machine("m1", "press", 0, 0);
        m.recipe_id = Some(RecipeId::new("iron_plate"));
        m.internal_buffer.add(&MaterialId::new("iron_ingot"), 1);
        m.internal_buffer.add(&MaterialId::new("iron_ore"), 3);
        place_machine(&mut state, m);

        assign_recipe(&mut state, &rules, "m1", None, false).unwrap();
        assert_eq!(state.inventory.quantity("iron_ingot"), 11);
        assert_eq!(state.inventory.quantity("iron_ore"), 0);
        assert!(state.machines[0].internal_buffer.is_empty());
        assert_eq!(state.machines[0].status, MachineStatus::Idle);
    }

    #[test]
    fn build_charges_every_unit_or_nothing() {
        let (rules, mut state) = setup();
        // furnace costs 5 iron_plate; 40 in stock.
        build_machine(&mut state, &rules, &MachineTypeId::new("furnace"), 3, false).unwrap();
        assert_eq!(state.inventory.quantity("iron_plate"), 25);
        assert_eq!(state.built_machines[&MachineTypeId::new("furnace")], 5);

        let before = state.clone();
        let err = build_machine(&mut state, &rules, &MachineTypeId::new("furnace"), 6, false).unwrap_err();
        assert!(err.to_string().starts_with("Not enough"));
        assert_eq!(state, before);
        assert_eq!(
            build_machine(&mut state, &rules, &MachineTypeId::new("furnace"), 0, false),
            Err(ActionError::InvalidBuildQuantity)
        );
        build_machine(&mut state, &rules, &MachineTypeId::new("assembler"), 2, true).unwrap();
        assert_eq!(state.inventory.quantity("iron_plate"), 25);
    }

    #[test]
    fn build_counts_beyond_the_pool_are_rejected() {
        let (rules, mut state) = setup();
        let furnace = MachineTypeId::new("furnace");
        let before = state.clone();
        for quantity in [1i64 << 32, i64::MAX, u32::MAX as i64] {
            assert_eq!(
                build_machine(&mut state, &rules, &furnace, quantity, true),
                Err(ActionError::InvalidBuildQuantity),
                "quantity {quantity}"
            );
        }
        assert_eq!(state, before);

        let solar = GeneratorTypeId::new("solar_panel");
        state.built_generators.insert(solar.clone(), u32::MAX - 1);
        build_generator(&mut state, &rules, &solar, 1, true).unwrap();
        assert_eq!(state.built_generators[&solar], u32::MAX);
        assert_eq!(
            build_generator(&mut state, &rules, &solar, 1, true),
            Err(ActionError::InvalidBuildQuantity)
        );
        assert_eq!(state.built_generators[&solar], u32::MAX);
    }

    #[test]
    fn add_then_remove_round_trips_the_pool() {
        let (rules, mut state) = setup();
        let furnace = MachineTypeId::new("furnace");
        let id = add_machine(&mut state, &rules, &furnace, Some(2), Some(2)).unwrap();
        assert_eq!(id.as_str(), "machine_1");
        assert_eq!(state.built_machines[&furnace], 1);
        assert_eq!(state.floor_space.placements.len(), 1);

        state.machines[0].internal_buffer.add(&MaterialId::new("iron_ore"), 2);
        remove_machine(&mut state, &rules, "machine_1").unwrap();
        assert_eq!(state.built_machines[&furnace], 2);
        assert!(state.floor_space.placements.is_empty());
        // Removal refunds raw materials too.
        assert_eq!(state.inventory.quantity("iron_ore"), 2);
    }

    #[test]
    fn add_validates_pool_position_and_floor() {
        let (rules, mut state) = setup();
        let furnace = MachineTypeId::new("furnace");
        assert_eq!(
            add_machine(&mut state, &rules, &MachineTypeId::new("assembler"), Some(0), Some(0)),
            Err(ActionError::NoBuiltMachine("assembler".into()))
        );
        assert_eq!(
            add_machine(&mut state, &rules, &furnace, Some(0), None),
            Err(ActionError::MissingPosition)
        );
        assert_eq!(
            add_machine(&mut state, &rules, &furnace, Some(23), Some(0)),
            Err(ActionError::OutOfBounds)
        );
        add_machine(&mut state, &rules, &furnace, Some(0), Some(0)).unwrap();
        let err = add_machine(&mut state, &rules, &furnace, Some(1), Some(1)).unwrap_err();
        assert!(err.to_string().contains("collides"));
        assert_eq!(state.built_machines[&furnace], 1);
    }

    #[test]
    fn extreme_coordinates_are_out_of_bounds() {
        let (rules, mut state) = setup();
        let furnace = MachineTypeId::new("furnace");
        add_machine(&mut state, &rules, &furnace, Some(0), Some(0)).unwrap();
        let before = state.clone();
        for (x, y) in [(i32::MAX, 0), (0, i32::MAX), (i32::MIN, 0), (0, i32::MIN), (i32::MAX, i32::MAX)] {
            assert_eq!(
                add_machine(&mut state, &rules, &furnace, Some(x), Some(y)),
                Err(ActionError::OutOfBounds),
                "add at ({x}, {y})"
            );
            assert_eq!(
                move_machine(&mut state, &rules, "machine_1", Some(x), Some(y)),
                Err(ActionError::OutOfBounds),
                "move to ({x}, {y})"
            );
        }
        assert_eq!(state, before);
        assert!(check_invariants(&state, &rules).is_empty());
    }

    #[test]
    fn move_ignores_its_own_footprint() {
        let (rules, mut state) = setup();
        let furnace = MachineTypeId::new("furnace");
        add_machine(&mut state, &rules, &furnace, Some(0), Some(0)).unwrap();
        add_machine(&mut state, &rules, &furnace, Some(4), Some(0)).unwrap();
        move_machine(&mut state, &rules, "machine_1", Some(1), Some(0)).unwrap();
        assert_eq!((state.machines[0].x, state.floor_space.placements[0].x), (1, 1));
        assert!(matches!(
            move_machine(&mut state, &rules, "machine_1", Some(3), Some(0)),
            Err(ActionError::Collision(_))
        ));
        assert!(matches!(
            move_machine(&mut state, &rules, "machine_9", Some(3), Some(0)),
            Err(ActionError::MachineNotFound(_))
        ));
    }

    #[test]
    fn generators_deploy_and_toggle() {
        let (rules, mut state) = setup();
        let solar = GeneratorTypeId::new("solar_panel");
        let id = add_generator(&mut state, &rules, &solar, Some(0), Some(0)).unwrap();
        assert!(state.generators[0].powered);
        toggle_generator(&mut state, id.as_str()).unwrap();
        assert!(!state.generators[0].enabled && !state.generators[0].powered);
        move_generator(&mut state, &rules, id.as_str(), Some(5), Some(5)).unwrap();
        remove_generator(&mut state, id.as_str()).unwrap();
        assert_eq!(state.built_generators[&solar], 2);
        assert!(matches!(
            toggle_generator(&mut state, "generator_1"),
            Err(ActionError::GeneratorNotFound(_))
        ));
    }

    #[test]
    fn unblock_only_blocked_machines() {
        let (_rules, mut state) = setup();
        let mut m = machine("m1", "furnace", 0, 0);
        m.recipe_id = Some(RecipeId::new("iron_ingot"));
        place_machine(&mut state, m);
        assert_eq!(unblock_machine(&mut state, "m1"), Err(ActionError::NotBlocked("m1".into())));
        state.machines[0].status = MachineStatus::Blocked;
        unblock_machine(&mut state, "m1").unwrap();
        assert_eq!(state.machines[0].status, MachineStatus::Working);
        toggle_machine(&mut state, "m1").unwrap();
        assert!(!state.machines[0].enabled);
    }
}
