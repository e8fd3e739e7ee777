//! The immutable rules document: material, recipe, machine and generator
//! catalogs plus the tunables for every subsystem.
//!
//! Rules are loaded once by the caller (see `foundry-data`) and are never
//! mutated by the engine. All catalogs are `BTreeMap`s so iteration order is
//! stable and simulation results do not depend on hash seeds.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::RulesError;
use crate::id::{GeneratorTypeId, MachineTypeId, MaterialId, RecipeId};

// ---------------------------------------------------------------------------
// Catalog entries
// ---------------------------------------------------------------------------

/// Broad material classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaterialCategory {
    Raw,
    Intermediate,
    Final,
    Equipment,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialDef {
    pub name: String,
    pub category: MaterialCategory,
    /// Weight per unit. The inventory cap for a material is
    /// `floor(inventorySpace / weight)`.
    pub weight: f64,
    pub base_price: f64,
    pub age: u32,
}

impl MaterialDef {
    pub fn is_raw(&self) -> bool {
        self.category == MaterialCategory::Raw
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecipeDef {
    pub name: String,
    pub inputs: BTreeMap<MaterialId, u64>,
    pub outputs: BTreeMap<MaterialId, u64>,
    pub ticks_to_complete: u32,
    pub age: u32,
}

/// Footprint of a structure on the floor grid, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StructureSize {
    pub width: u32,
    pub height: u32,
}

impl Default for StructureSize {
    fn default() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MachineDef {
    pub name: String,
    #[serde(default)]
    pub size: StructureSize,
    pub energy_consumption: f64,
    pub allowed_recipes: Vec<RecipeId>,
    /// Materials consumed per unit built.
    #[serde(default)]
    pub cost: BTreeMap<MaterialId, u64>,
    /// Research facilities draw power whenever enabled, recipe or not.
    #[serde(default)]
    pub research_facility: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FuelRequirement {
    pub material: MaterialId,
    pub per_tick: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratorDef {
    pub name: String,
    #[serde(default)]
    pub size: StructureSize,
    pub energy_output: f64,
    #[serde(default)]
    pub fuel: Option<FuelRequirement>,
    #[serde(default)]
    pub cost: BTreeMap<MaterialId, u64>,
}

// ---------------------------------------------------------------------------
// Subsystem tunables
// ---------------------------------------------------------------------------

/// A diversification tier: selling at least `unique_items` distinct items
/// within the window multiplies prices by `multiplier`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiversificationBonus {
    pub unique_items: usize,
    pub multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketRules {
    pub min_popularity: f64,
    pub max_popularity: f64,
    pub decay_rate_base: f64,
    pub decay_rate_medium: f64,
    pub decay_rate_high: f64,
    /// Units sold in one action before the medium tier starts.
    #[serde(default = "default_base_tier_units")]
    pub base_tier_units: u64,
    /// Units sold in one action (cumulative) before the high tier starts.
    #[serde(default = "default_medium_tier_units")]
    pub medium_tier_units: u64,
    /// Damage added per unit sold in the high tier.
    pub damage_per_oversold_unit: f64,
    pub recovery_rate: f64,
    pub damage_penalty_factor: f64,
    pub damage_healing_rate: f64,
    pub diversification_window: u64,
    pub diversification_bonuses: Vec<DiversificationBonus>,
    /// Price reduction per discovered recipe of the next age.
    pub obsolescence_rate: f64,
    pub obsolescence_max_debuff: f64,
    pub event_chance: f64,
    pub event_magnitude: f64,
    pub event_duration: u64,
    #[serde(default = "default_history_limit")]
    pub price_history_limit: usize,
    #[serde(default = "default_history_limit")]
    pub recent_sales_limit: usize,
}

fn default_base_tier_units() -> u64 {
    10
}

fn default_medium_tier_units() -> u64 {
    25
}

fn default_history_limit() -> usize {
    200
}

/// Per-age research tuning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgeResearch {
    pub age: u32,
    pub experiment_cost: f64,
    pub prototype_multiplier: f64,
    pub donation_multiplier: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchRules {
    /// Credits donated per research point gained.
    pub credits_to_rp_ratio: f64,
    /// Fixed factor applied to part donations.
    pub donation_factor: f64,
    pub targeted_experiment_multiplier: f64,
    pub ages: Vec<AgeResearch>,
    /// Relative weight mass of current-age recipes in experiment selection.
    pub current_age_weight: f64,
    /// Relative weight mass of recipes older than the current age.
    pub older_age_weight: f64,
    /// Relative weight mass of recipes one age ahead.
    pub next_age_weight: f64,
    pub passive_discovery_chance: f64,
    pub rp_per_facility_tick: f64,
    pub flow_rate_per_tick: u64,
}

impl ResearchRules {
    pub fn age(&self, age: u32) -> Option<&AgeResearch> {
        self.ages.iter().find(|a| a.age == age)
    }
}

/// How the floor grows with each purchase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpansionPolicy {
    Spiral,
    Fractal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorSpaceRules {
    /// Side length of one floor chunk, in cells.
    pub chunk_size: u32,
    pub cost_per_cell: f64,
    pub expansion_scale_factor: f64,
    pub expansion_policy: ExpansionPolicy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventorySpaceRules {
    pub initial: f64,
    pub step: f64,
    pub base_cost: f64,
    pub cost_growth: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RateRange {
    pub min: u64,
    pub max: u64,
}

impl RateRange {
    /// The standardized rate every extraction node is normalized to.
    pub fn standard(&self) -> u64 {
        (self.min + self.max) / 2
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceWeight {
    pub material: MaterialId,
    pub weight: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationRules {
    pub map_width: u32,
    pub map_height: u32,
    pub max_map_size: u32,
    pub chunk_size: u32,
    /// Side length of the square explored at the start of a game.
    pub initial_explored_size: u32,
    pub cost_per_cell: f64,
    pub expansion_scale_factor: f64,
    pub node_chance: f64,
    pub node_rate_range: RateRange,
    pub resources: Vec<ResourceWeight>,
    pub unlock_base_cost: f64,
    /// Cost multiplier per node of the same resource already unlocked.
    pub unlock_resource_multiplier: f64,
    /// Cost multiplier per node of any resource already unlocked.
    pub unlock_global_multiplier: f64,
}

/// Starting conditions used by new-game setup.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct StartingRules {
    pub credits: f64,
    pub inventory: BTreeMap<MaterialId, u64>,
    pub unlocked_recipes: Vec<RecipeId>,
    pub built_machines: BTreeMap<MachineTypeId, u32>,
    pub built_generators: BTreeMap<GeneratorTypeId, u32>,
}

// ---------------------------------------------------------------------------
// Rules
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rules {
    pub materials: BTreeMap<MaterialId, MaterialDef>,
    pub recipes: BTreeMap<RecipeId, RecipeDef>,
    pub machines: BTreeMap<MachineTypeId, MachineDef>,
    pub generators: BTreeMap<GeneratorTypeId, GeneratorDef>,
    pub market: MarketRules,
    pub research: ResearchRules,
    pub floor_space: FloorSpaceRules,
    pub inventory_space: InventorySpaceRules,
    pub exploration: ExplorationRules,
    #[serde(default)]
    pub starting: StartingRules,
}

impl Rules {
    pub fn material(&self, id: &str) -> Result<&MaterialDef, RulesError> {
        self.materials
            .get(id)
            .ok_or_else(|| RulesError::UnknownMaterial(id.to_string()))
    }

    pub fn recipe(&self, id: &str) -> Result<&RecipeDef, RulesError> {
        self.recipes
            .get(id)
            .ok_or_else(|| RulesError::UnknownRecipe(id.to_string()))
    }

    pub fn machine(&self, id: &str) -> Result<&MachineDef, RulesError> {
        self.machines
            .get(id)
            .ok_or_else(|| RulesError::UnknownMachineType(id.to_string()))
    }

    pub fn generator(&self, id: &str) -> Result<&GeneratorDef, RulesError> {
        self.generators
            .get(id)
            .ok_or_else(|| RulesError::UnknownGeneratorType(id.to_string()))
    }

    /// Maximum units of a material the inventory can hold at the given space.
    pub fn max_stack(&self, material: &str, inventory_space: f64) -> Result<u64, RulesError> {
        let def = self.material(material)?;
        if def.weight <= 0.0 {
            return Ok(u64::MAX);
        }
        Ok((inventory_space / def.weight).floor().max(0.0) as u64)
    }

    /// Whether the material is a raw resource. Unknown materials are treated
    /// as non-raw so refunds never silently drop them.
    pub fn is_raw(&self, material: &str) -> bool {
        self.materials.get(material).is_some_and(MaterialDef::is_raw)
    }

    /// The highest age any material or recipe belongs to.
    pub fn max_age(&self) -> u32 {
        self.recipes.values().map(|r| r.age).max().unwrap_or(1)
    }
}
