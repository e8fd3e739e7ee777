//! The mutable aggregate root threaded through every engine call.
//!
//! `GameState` is plain serde data matching the persisted JSON document.
//! Fields added after the first save format carry `#[serde(default)]` so
//! older documents still load; `foundry-engine`'s migration pass upgrades
//! their contents.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::{GeneratorId, GeneratorTypeId, MachineId, MachineTypeId, MaterialId, NodeId, RecipeId, Ticks};
use crate::inventory::Inventory;
use crate::map::ExplorationMap;

// ---------------------------------------------------------------------------
// Floor space
// ---------------------------------------------------------------------------

/// A purchased rectangle of floor, in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Chunk {
    pub fn contains_cell(&self, x: i32, y: i32) -> bool {
        let (x, y) = (i64::from(x), i64::from(y));
        x >= i64::from(self.x) && y >= i64::from(self.y) && x < self.right() && y < self.bottom()
    }

    /// Exclusive right edge. Widened so edges past `i32::MAX` stay exact.
    pub fn right(&self) -> i64 {
        i64::from(self.x) + i64::from(self.width)
    }

    /// Exclusive bottom edge.
    pub fn bottom(&self) -> i64 {
        i64::from(self.y) + i64::from(self.height)
    }

    pub fn cells(&self) -> u64 {
        self.width as u64 * self.height as u64
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StructureKind {
    Machine,
    Generator,
}

/// A structure's footprint record on the floor. The size is looked up from
/// the structure's rules entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Placement {
    pub id: String,
    pub kind: StructureKind,
    pub structure_type: String,
    pub x: i32,
    pub y: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FloorSpace {
    pub width: u32,
    pub height: u32,
    pub chunks: Vec<Chunk>,
    pub placements: Vec<Placement>,
    /// Number of chunks bought so far (drives the cost scaling).
    #[serde(default)]
    pub purchases: u32,
}

// ---------------------------------------------------------------------------
// Machines and generators
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MachineStatus {
    Idle,
    Working,
    Blocked,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Machine {
    pub id: MachineId,
    #[serde(rename = "type")]
    pub machine_type: MachineTypeId,
    pub x: i32,
    pub y: i32,
    pub enabled: bool,
    pub recipe_id: Option<RecipeId>,
    #[serde(default)]
    pub internal_buffer: Inventory,
    pub status: MachineStatus,
    /// Ticks accumulated toward the current recipe run.
    #[serde(default)]
    pub progress: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Generator {
    pub id: GeneratorId,
    #[serde(rename = "type")]
    pub generator_type: GeneratorTypeId,
    pub x: i32,
    pub y: i32,
    pub enabled: bool,
    #[serde(default)]
    pub powered: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractionNode {
    pub id: NodeId,
    pub resource_type: MaterialId,
    pub rate: u64,
    pub active: bool,
}

/// Recomputed every tick; never an authoritative input.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Energy {
    pub produced: f64,
    pub consumed: f64,
}

// ---------------------------------------------------------------------------
// Research
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrototypeMode {
    /// Raw-only recipes: slots fill passively from inventory.
    Flow,
    /// Slots filled manually with `FILL_PROTOTYPE_SLOT`.
    Slots,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrototypeSlot {
    pub material: MaterialId,
    pub quantity: u64,
    pub filled: u64,
}

impl PrototypeSlot {
    pub fn remaining(&self) -> u64 {
        self.quantity.saturating_sub(self.filled)
    }

    pub fn is_full(&self) -> bool {
        self.filled >= self.quantity
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prototype {
    pub recipe_id: RecipeId,
    pub mode: PrototypeMode,
    #[serde(default)]
    pub slots: Vec<PrototypeSlot>,
}

impl Prototype {
    pub fn is_complete(&self) -> bool {
        self.slots.iter().all(PrototypeSlot::is_full)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchState {
    pub active: bool,
    pub research_points: f64,
    #[serde(default)]
    pub awaiting_prototype: Vec<Prototype>,
}

impl Default for ResearchState {
    fn default() -> Self {
        Self {
            active: true,
            research_points: 0.0,
            awaiting_prototype: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Market
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricePoint {
    pub tick: Ticks,
    pub item_id: MaterialId,
    /// Average unit price realized by the sale.
    pub price: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentSale {
    pub tick: Ticks,
    pub item_id: MaterialId,
}

/// A timed price modifier on one item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketEvent {
    pub item_id: MaterialId,
    pub multiplier: f64,
    pub expires_at: Ticks,
}

// ---------------------------------------------------------------------------
// GameState
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameState {
    pub tick: Ticks,
    pub rng_seed: u64,
    pub credits: f64,
    pub floor_space: FloorSpace,
    pub inventory: Inventory,
    pub inventory_space: f64,
    #[serde(default)]
    pub inventory_purchases: u32,
    pub machines: Vec<Machine>,
    pub generators: Vec<Generator>,
    #[serde(default)]
    pub built_machines: BTreeMap<MachineTypeId, u32>,
    #[serde(default)]
    pub built_generators: BTreeMap<GeneratorTypeId, u32>,
    #[serde(default)]
    pub extraction_nodes: Vec<ExtractionNode>,
    #[serde(default)]
    pub energy: Energy,
    #[serde(default)]
    pub research: ResearchState,
    #[serde(default)]
    pub market_popularity: BTreeMap<MaterialId, f64>,
    #[serde(default)]
    pub market_damage: BTreeMap<MaterialId, f64>,
    #[serde(default)]
    pub market_price_history: Vec<PricePoint>,
    #[serde(default)]
    pub market_recent_sales: Vec<RecentSale>,
    #[serde(default)]
    pub market_events: Vec<MarketEvent>,
    #[serde(default)]
    pub discovered_recipes: Vec<RecipeId>,
    #[serde(default)]
    pub unlocked_recipes: Vec<RecipeId>,
    #[serde(default)]
    pub exploration_map: Option<ExplorationMap>,
    /// Next numeric suffix for structure ids.
    #[serde(default)]
    pub next_structure_id: u64,
}

impl GameState {
    pub fn machine(&self, id: &str) -> Option<&Machine> {
        self.machines.iter().find(|m| m.id.as_str() == id)
    }

    pub fn machine_mut(&mut self, id: &str) -> Option<&mut Machine> {
        self.machines.iter_mut().find(|m| m.id.as_str() == id)
    }

    pub fn generator(&self, id: &str) -> Option<&Generator> {
        self.generators.iter().find(|g| g.id.as_str() == id)
    }

    pub fn generator_mut(&mut self, id: &str) -> Option<&mut Generator> {
        self.generators.iter_mut().find(|g| g.id.as_str() == id)
    }

    pub fn placement_mut(&mut self, id: &str) -> Option<&mut Placement> {
        self.floor_space.placements.iter_mut().find(|p| p.id == id)
    }

    pub fn is_unlocked(&self, recipe: &str) -> bool {
        self.unlocked_recipes.iter().any(|r| r.as_str() == recipe)
    }

    pub fn is_discovered(&self, recipe: &str) -> bool {
        self.discovered_recipes.iter().any(|r| r.as_str() == recipe)
    }

    /// Market popularity of an item; untracked items sit at 1.0.
    pub fn popularity(&self, item: &str) -> f64 {
        self.market_popularity.get(item).copied().unwrap_or(1.0)
    }

    /// Allocate the next structure id with the given prefix (`machine_7`).
    pub fn allocate_structure_id(&mut self, prefix: &str) -> String {
        self.next_structure_id += 1;
        format!("{prefix}_{}", self.next_structure_id)
    }
}
