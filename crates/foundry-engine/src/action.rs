//! Player actions.
//!
//! Serialized as `{"type": "SELL_GOODS", "payload": {...}}` so the wire form
//! matches the JSON the owning service sends.

use foundry_core::id::{GeneratorTypeId, MachineTypeId, MaterialId, RecipeId};
use serde::{Deserialize, Serialize};

fn one() -> i64 {
    1
}

/// A discrete player action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "payload", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    /// Set or clear a machine's recipe. `cheat` skips the unlock check.
    #[serde(rename_all = "camelCase")]
    AssignRecipe {
        machine_id: String,
        recipe_id: Option<RecipeId>,
        #[serde(default)]
        cheat: bool,
    },
    /// Build machines into the undeployed pool. `cheat` skips the cost.
    #[serde(rename_all = "camelCase")]
    BuildMachine {
        #[serde(rename = "type")]
        machine_type: MachineTypeId,
        #[serde(default = "one")]
        quantity: i64,
        #[serde(default)]
        cheat: bool,
    },
    #[serde(rename_all = "camelCase")]
    BuildGenerator {
        #[serde(rename = "type")]
        generator_type: GeneratorTypeId,
        #[serde(default = "one")]
        quantity: i64,
        #[serde(default)]
        cheat: bool,
    },
    /// Deploy a built machine onto the floor.
    #[serde(rename_all = "camelCase")]
    AddMachine {
        #[serde(rename = "type")]
        machine_type: MachineTypeId,
        x: Option<i32>,
        y: Option<i32>,
    },
    #[serde(rename_all = "camelCase")]
    AddGenerator {
        #[serde(rename = "type")]
        generator_type: GeneratorTypeId,
        x: Option<i32>,
        y: Option<i32>,
    },
    RemoveMachine {
        id: String,
    },
    RemoveGenerator {
        id: String,
    },
    MoveMachine {
        id: String,
        x: Option<i32>,
        y: Option<i32>,
    },
    MoveGenerator {
        id: String,
        x: Option<i32>,
        y: Option<i32>,
    },
    ToggleMachine {
        id: String,
    },
    ToggleGenerator {
        id: String,
    },
    UnblockMachine {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    SellGoods {
        item_id: MaterialId,
        quantity: u64,
    },
    DonateCredits {
        amount: f64,
    },
    #[serde(rename_all = "camelCase")]
    DonateParts {
        item_id: MaterialId,
        quantity: u64,
    },
    RunExperiment,
    #[serde(rename_all = "camelCase")]
    RunTargetedExperiment {
        recipe_id: RecipeId,
    },
    /// Fill a prototype slot, named by material or by index.
    #[serde(rename_all = "camelCase")]
    FillPrototypeSlot {
        recipe_id: RecipeId,
        #[serde(default)]
        material_id: Option<MaterialId>,
        #[serde(default)]
        slot_index: Option<usize>,
        quantity: u64,
    },
    ToggleResearch {
        active: bool,
    },
    BuyFloorSpace,
    BuyInventorySpace,
    ExpandExploration,
    UnlockExplorationNode {
        x: u32,
        y: u32,
    },
    /// Run the tick pipeline `ticks` times (default 1).
    Simulate {
        #[serde(default)]
        ticks: Option<u32>,
    },
}

impl Action {
    /// The wire name of the action, for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Action::AssignRecipe { .. } => "ASSIGN_RECIPE",
            Action::BuildMachine { .. } => "BUILD_MACHINE",
            Action::BuildGenerator { .. } => "BUILD_GENERATOR",
            Action::AddMachine { .. } => "ADD_MACHINE",
            Action::AddGenerator { .. } => "ADD_GENERATOR",
            Action::RemoveMachine { .. } => "REMOVE_MACHINE",
            Action::RemoveGenerator { .. } => "REMOVE_GENERATOR",
            Action::MoveMachine { .. } => "MOVE_MACHINE",
            Action::MoveGenerator { .. } => "MOVE_GENERATOR",
            Action::ToggleMachine { .. } => "TOGGLE_MACHINE",
            Action::ToggleGenerator { .. } => "TOGGLE_GENERATOR",
            Action::UnblockMachine { .. } => "UNBLOCK_MACHINE",
            Action::SellGoods { .. } => "SELL_GOODS",
            Action::DonateCredits { .. } => "DONATE_CREDITS",
            Action::DonateParts { .. } => "DONATE_PARTS",
            Action::RunExperiment => "RUN_EXPERIMENT",
            Action::RunTargetedExperiment { .. } => "RUN_TARGETED_EXPERIMENT",
            Action::FillPrototypeSlot { .. } => "FILL_PROTOTYPE_SLOT",
            Action::ToggleResearch { .. } => "TOGGLE_RESEARCH",
            Action::BuyFloorSpace => "BUY_FLOOR_SPACE",
            Action::BuyInventorySpace => "BUY_INVENTORY_SPACE",
            Action::ExpandExploration => "EXPAND_EXPLORATION",
            Action::UnlockExplorationNode { .. } => "UNLOCK_EXPLORATION_NODE",
            Action::Simulate { .. } => "SIMULATE",
        }
    }

    /// One tick of simulation.
    pub fn tick() -> Self {
        Action::Simulate { ticks: None }
    }
}
