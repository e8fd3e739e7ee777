//! Shared test helpers for unit tests, integration tests and benchmarks.
//!
//! Gated behind `#[cfg(any(test, feature = "test-utils"))]` so downstream
//! crates can pull the sample rules in through the `test-utils` feature.

use std::collections::BTreeMap;

use crate::id::*;
use crate::inventory::Inventory;
use crate::rules::*;
use crate::state::*;

// ===========================================================================
// Catalog helpers
// ===========================================================================

fn material(name: &str, category: MaterialCategory, weight: f64, base_price: f64, age: u32) -> (MaterialId, MaterialDef) {
    (
        MaterialId::new(name),
        MaterialDef {
            name: name.replace('_', " "),
            category,
            weight,
            base_price,
            age,
        },
    )
}

fn qty(entries: &[(&str, u64)]) -> BTreeMap<MaterialId, u64> {
    entries
        .iter()
        .map(|(m, q)| (MaterialId::new(*m), *q))
        .collect()
}

fn recipe(id: &str, inputs: &[(&str, u64)], outputs: &[(&str, u64)], ticks: u32, age: u32) -> (RecipeId, RecipeDef) {
    (
        RecipeId::new(id),
        RecipeDef {
            name: id.replace('_', " "),
            inputs: qty(inputs),
            outputs: qty(outputs),
            ticks_to_complete: ticks,
            age,
        },
    )
}

fn machine_def(
    id: &str,
    size: (u32, u32),
    energy: f64,
    recipes: &[&str],
    cost: &[(&str, u64)],
    research_facility: bool,
) -> (MachineTypeId, MachineDef) {
    (
        MachineTypeId::new(id),
        MachineDef {
            name: id.replace('_', " "),
            size: StructureSize {
                width: size.0,
                height: size.1,
            },
            energy_consumption: energy,
            allowed_recipes: recipes.iter().map(|r| RecipeId::new(*r)).collect(),
            cost: qty(cost),
            research_facility,
        },
    )
}

// ===========================================================================
// Sample rules
// ===========================================================================

/// A compact three-age rules document.
///
/// Recipe ids are named after their output material. `iron_ingot` and
/// `iron_plate` start unlocked; `steel` is the only raw-only recipe past
/// age 1, so it prototypes in flow mode.
pub fn sample_rules() -> Rules {
    use MaterialCategory::*;

    let materials = [
        material("iron_ore", Raw, 1.0, 1.0, 1),
        material("copper_ore", Raw, 1.0, 1.5, 1),
        material("coal", Raw, 1.0, 0.5, 1),
        material("stone", Raw, 1.0, 0.5, 1),
        material("iron_ingot", Intermediate, 2.0, 5.0, 1),
        material("copper_ingot", Intermediate, 2.0, 6.0, 1),
        material("iron_plate", Intermediate, 2.0, 8.0, 1),
        material("steel", Intermediate, 2.0, 20.0, 2),
        material("gear", Intermediate, 1.0, 12.0, 2),
        material("circuit", Final, 1.0, 30.0, 2),
        material("engine", Final, 5.0, 120.0, 3),
    ]
    .into_iter()
    .collect();

    let recipes = [
        recipe("iron_ingot", &[("iron_ore", 2)], &[("iron_ingot", 1)], 1, 1),
        recipe("copper_ingot", &[("copper_ore", 2)], &[("copper_ingot", 1)], 1, 1),
        recipe("iron_plate", &[("iron_ingot", 2)], &[("iron_plate", 1)], 2, 1),
        recipe("steel", &[("iron_ore", 3), ("coal", 1)], &[("steel", 1)], 2, 2),
        recipe("gear", &[("iron_plate", 2)], &[("gear", 1)], 2, 2),
        recipe(
            "circuit",
            &[("copper_ingot", 3), ("iron_plate", 1)],
            &[("circuit", 1)],
            3,
            2,
        ),
        recipe(
            "engine",
            &[("gear", 4), ("circuit", 2), ("steel", 2)],
            &[("engine", 1)],
            5,
            3,
        ),
    ]
    .into_iter()
    .collect();

    let machines = [
        machine_def(
            "furnace",
            (2, 2),
            10.0,
            &["iron_ingot", "copper_ingot", "steel"],
            &[("iron_plate", 5)],
            false,
        ),
        machine_def("press", (2, 1), 15.0, &["iron_plate", "gear"], &[("iron_plate", 8)], false),
        machine_def(
            "assembler",
            (3, 3),
            25.0,
            &["circuit", "engine"],
            &[("iron_plate", 10), ("gear", 4)],
            false,
        ),
        machine_def("lab", (2, 2), 5.0, &[], &[("iron_plate", 6)], true),
    ]
    .into_iter()
    .collect();

    let generators = [
        (
            GeneratorTypeId::new("solar_panel"),
            GeneratorDef {
                name: "solar panel".into(),
                size: StructureSize::default(),
                energy_output: 20.0,
                fuel: None,
                cost: qty(&[("iron_plate", 4)]),
            },
        ),
        (
            GeneratorTypeId::new("coal_burner"),
            GeneratorDef {
                name: "coal burner".into(),
                size: StructureSize {
                    width: 2,
                    height: 2,
                },
                energy_output: 50.0,
                fuel: Some(FuelRequirement {
                    material: MaterialId::new("coal"),
                    per_tick: 1,
                }),
                cost: qty(&[("iron_plate", 6)]),
            },
        ),
    ]
    .into_iter()
    .collect();

    Rules {
        materials,
        recipes,
        machines,
        generators,
        market: MarketRules {
            min_popularity: 0.2,
            max_popularity: 2.0,
            decay_rate_base: 0.01,
            decay_rate_medium: 0.02,
            decay_rate_high: 0.04,
            base_tier_units: 10,
            medium_tier_units: 25,
            damage_per_oversold_unit: 0.05,
            recovery_rate: 0.01,
            damage_penalty_factor: 1.0,
            damage_healing_rate: 0.01,
            diversification_window: 50,
            diversification_bonuses: vec![
                DiversificationBonus {
                    unique_items: 3,
                    multiplier: 1.10,
                },
                DiversificationBonus {
                    unique_items: 5,
                    multiplier: 1.15,
                },
                DiversificationBonus {
                    unique_items: 7,
                    multiplier: 1.20,
                },
            ],
            obsolescence_rate: 0.05,
            obsolescence_max_debuff: 0.3,
            event_chance: 0.01,
            event_magnitude: 0.25,
            event_duration: 20,
            price_history_limit: 200,
            recent_sales_limit: 200,
        },
        research: ResearchRules {
            credits_to_rp_ratio: 2.0,
            donation_factor: 0.5,
            targeted_experiment_multiplier: 2.0,
            ages: vec![
                AgeResearch {
                    age: 1,
                    experiment_cost: 10.0,
                    prototype_multiplier: 2.0,
                    donation_multiplier: 1.0,
                },
                AgeResearch {
                    age: 2,
                    experiment_cost: 25.0,
                    prototype_multiplier: 1.5,
                    donation_multiplier: 1.5,
                },
                AgeResearch {
                    age: 3,
                    experiment_cost: 60.0,
                    prototype_multiplier: 1.0,
                    donation_multiplier: 2.0,
                },
            ],
            current_age_weight: 0.85,
            older_age_weight: 0.05,
            next_age_weight: 0.10,
            passive_discovery_chance: 0.001,
            rp_per_facility_tick: 1.0,
            flow_rate_per_tick: 2,
        },
        floor_space: FloorSpaceRules {
            chunk_size: 8,
            cost_per_cell: 1.0,
            expansion_scale_factor: 1.5,
            expansion_policy: ExpansionPolicy::Spiral,
        },
        inventory_space: InventorySpaceRules {
            initial: 200.0,
            step: 100.0,
            base_cost: 50.0,
            cost_growth: 1.5,
        },
        exploration: ExplorationRules {
            map_width: 32,
            map_height: 32,
            max_map_size: 128,
            chunk_size: 8,
            initial_explored_size: 8,
            cost_per_cell: 0.5,
            expansion_scale_factor: 1.2,
            node_chance: 0.05,
            node_rate_range: RateRange { min: 2, max: 6 },
            resources: vec![
                ResourceWeight {
                    material: MaterialId::new("iron_ore"),
                    weight: 5,
                },
                ResourceWeight {
                    material: MaterialId::new("copper_ore"),
                    weight: 3,
                },
                ResourceWeight {
                    material: MaterialId::new("coal"),
                    weight: 2,
                },
                ResourceWeight {
                    material: MaterialId::new("stone"),
                    weight: 1,
                },
            ],
            unlock_base_cost: 50.0,
            unlock_resource_multiplier: 1.5,
            unlock_global_multiplier: 1.1,
        },
        starting: StartingRules {
            credits: 500.0,
            inventory: qty(&[("iron_plate", 40), ("iron_ingot", 10)]),
            unlocked_recipes: vec![RecipeId::new("iron_ingot"), RecipeId::new("iron_plate")],
            built_machines: [(MachineTypeId::new("furnace"), 2), (MachineTypeId::new("press"), 1)]
                .into_iter()
                .collect(),
            built_generators: [(GeneratorTypeId::new("solar_panel"), 2)].into_iter().collect(),
        },
    }
}

// ===========================================================================
// State builders
// ===========================================================================

/// A state built from the rules' starting conditions with a single 8x8
/// floor chunk and no exploration map.
pub fn sample_state(rules: &Rules) -> GameState {
    let chunk = rules.floor_space.chunk_size;
    GameState {
        tick: 0,
        rng_seed: 42,
        credits: rules.starting.credits,
        floor_space: FloorSpace {
            width: chunk,
            height: chunk,
            chunks: vec![Chunk {
                x: 0,
                y: 0,
                width: chunk,
                height: chunk,
            }],
            placements: Vec::new(),
            purchases: 0,
        },
        inventory: Inventory::from(rules.starting.inventory.clone()),
        inventory_space: rules.inventory_space.initial,
        inventory_purchases: 0,
        machines: Vec::new(),
        generators: Vec::new(),
        built_machines: rules.starting.built_machines.clone(),
        built_generators: rules.starting.built_generators.clone(),
        extraction_nodes: Vec::new(),
        energy: Energy::default(),
        research: ResearchState::default(),
        market_popularity: BTreeMap::new(),
        market_damage: BTreeMap::new(),
        market_price_history: Vec::new(),
        market_recent_sales: Vec::new(),
        market_events: Vec::new(),
        discovered_recipes: rules.starting.unlocked_recipes.clone(),
        unlocked_recipes: rules.starting.unlocked_recipes.clone(),
        exploration_map: None,
        next_structure_id: 0,
    }
}

/// An idle, enabled machine with an empty buffer.
pub fn machine(id: &str, machine_type: &str, x: i32, y: i32) -> Machine {
    Machine {
        id: MachineId::new(id),
        machine_type: MachineTypeId::new(machine_type),
        x,
        y,
        enabled: true,
        recipe_id: None,
        internal_buffer: Inventory::new(),
        status: MachineStatus::Idle,
        progress: 0,
    }
}

/// An enabled, powered generator.
pub fn generator(id: &str, generator_type: &str, x: i32, y: i32) -> Generator {
    Generator {
        id: GeneratorId::new(id),
        generator_type: GeneratorTypeId::new(generator_type),
        x,
        y,
        enabled: true,
        powered: true,
    }
}

/// Deploy a machine directly, bypassing the build pool.
pub fn place_machine(state: &mut GameState, machine: Machine) {
    state.floor_space.placements.push(Placement {
        id: machine.id.to_string(),
        kind: StructureKind::Machine,
        structure_type: machine.machine_type.to_string(),
        x: machine.x,
        y: machine.y,
    });
    state.machines.push(machine);
}

/// Deploy a generator directly, bypassing the build pool.
pub fn place_generator(state: &mut GameState, generator: Generator) {
    state.floor_space.placements.push(Placement {
        id: generator.id.to_string(),
        kind: StructureKind::Generator,
        structure_type: generator.generator_type.to_string(),
        x: generator.x,
        y: generator.y,
    });
    state.generators.push(generator);
}

/// Widen the floor to `chunks x chunks` chunks so tests can place freely.
pub fn widen_floor(state: &mut GameState, rules: &Rules, chunks: u32) {
    let size = rules.floor_space.chunk_size;
    state.floor_space.chunks.clear();
    for cy in 0..chunks {
        for cx in 0..chunks {
            state.floor_space.chunks.push(Chunk {
                x: (cx * size) as i32,
                y: (cy * size) as i32,
                width: size,
                height: size,
            });
        }
    }
    state.floor_space.width = chunks * size;
    state.floor_space.height = chunks * size;
}
