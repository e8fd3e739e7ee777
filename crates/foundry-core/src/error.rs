//! Error types shared by every engine crate.
//!
//! [`ActionError`] covers expected, player-triggerable failures: the action
//! is rejected and the prior state is returned unchanged. [`RulesError`]
//! means the rules document itself is inconsistent.

/// Inconsistencies in the rules document. These are configuration bugs, not
/// player errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RulesError {
    #[error("unknown material '{0}'")]
    UnknownMaterial(String),
    #[error("unknown recipe '{0}'")]
    UnknownRecipe(String),
    #[error("unknown machine type '{0}'")]
    UnknownMachineType(String),
    #[error("unknown generator type '{0}'")]
    UnknownGeneratorType(String),
    #[error("no research tuning for age {0}")]
    MissingAge(u32),
    #[error("{field} must be positive")]
    NonPositive { field: &'static str },
    #[error("{context} references unknown {kind} '{name}'")]
    DanglingReference {
        context: String,
        kind: &'static str,
        name: String,
    },
    #[error("current-age weight must carry at least 80% of the experiment weight mass")]
    WeakCurrentAgeWeight,
    #[error("invalid range for {field}: min {min} > max {max}")]
    InvalidRange {
        field: &'static str,
        min: u64,
        max: u64,
    },
}

/// Why an action was rejected.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ActionError {
    // -- Lookup --
    #[error("Machine {0} not found")]
    MachineNotFound(String),
    #[error("Generator {0} not found")]
    GeneratorNotFound(String),
    #[error("Recipe {0} not found")]
    RecipeNotFound(String),
    #[error("Item {0} not found")]
    ItemNotFound(String),
    #[error("Machine type {0} not found")]
    MachineTypeNotFound(String),
    #[error("Generator type {0} not found")]
    GeneratorTypeNotFound(String),
    #[error("Prototype for {0} not found")]
    PrototypeNotFound(String),
    #[error("Prototype slot {0} not found")]
    SlotNotFound(String),
    #[error("Prototype slot must be named by material or index")]
    MissingSlotSelector,

    // -- Validation --
    #[error("Build quantity must be at least 1")]
    InvalidBuildQuantity,
    #[error("Quantity must be at least 1")]
    InvalidQuantity,
    #[error("Amount must be positive")]
    InvalidAmount,
    #[error("Position x and y are required")]
    MissingPosition,
    #[error("Placement is out of bounds")]
    OutOfBounds,
    #[error("Placement collides with {0}")]
    Collision(String),
    #[error("Tile ({x}, {y}) is outside the map")]
    TileOutOfBounds { x: u32, y: u32 },

    // -- Resource --
    #[error("Not enough {material}: need {needed}, have {available}")]
    InsufficientMaterial {
        material: String,
        needed: u64,
        available: u64,
    },
    #[error("Not enough credits: need {needed:.2}, have {available:.2}")]
    InsufficientCredits { needed: f64, available: f64 },
    #[error("Not enough research points: need {needed:.2}, have {available:.2}")]
    InsufficientResearchPoints { needed: f64, available: f64 },
    #[error("No built {0} machines available")]
    NoBuiltMachine(String),
    #[error("No built {0} generators available")]
    NoBuiltGenerator(String),

    // -- Domain rule --
    #[error("Recipe not unlocked")]
    RecipeNotUnlocked,
    #[error("Machine type {machine_type} cannot run recipe {recipe}")]
    RecipeNotAllowed { machine_type: String, recipe: String },
    #[error("Machine {0} is not blocked")]
    NotBlocked(String),
    #[error("Raw materials cannot be donated")]
    RawDonation,
    #[error("No recipes left to discover")]
    NothingToDiscover,
    #[error("Recipe {0} is already discovered")]
    AlreadyDiscovered(String),
    #[error("Recipe {recipe} is age {age}, more than one age ahead")]
    AgeLocked { recipe: String, age: u32 },
    #[error("Prototype slot for {0} is already filled")]
    SlotFull(String),
    #[error("No new tiles to explore")]
    NoNewTiles,
    #[error("Exploration map has not been generated")]
    NoExplorationMap,
    #[error("Cannot unlock node at ({x}, {y}): tile not explored")]
    TileNotExplored { x: u32, y: u32 },
    #[error("Cannot unlock node at ({x}, {y}): no node on tile")]
    NoNodeOnTile { x: u32, y: u32 },
    #[error("Node at ({x}, {y}) is already unlocked")]
    NodeAlreadyUnlocked { x: u32, y: u32 },

    // -- Configuration --
    #[error("rules error: {0}")]
    Rules(#[from] RulesError),
}
