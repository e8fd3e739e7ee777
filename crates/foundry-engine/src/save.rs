//! New games, save acceptance and the binary save format.
//!
//! A binary save is a bitcode-encoded [`SaveFile`]: a [`SaveHeader`], the
//! state with its exploration map detached, and the map in compressed form.
//! The JSON document form is plain serde on [`GameState`].

use foundry_core::id::Ticks;
use foundry_core::inventory::Inventory;
use foundry_core::rules::Rules;
use foundry_core::state::{Chunk, FloorSpace, GameState};
use foundry_exploration::codec::{self, CodecError, CompressedMap};
use serde::{Deserialize, Serialize};

use crate::migration::migrate_in_place;

/// Magic number identifying a foundry save.
pub const SAVE_MAGIC: u32 = 0xF0DE_0001;

/// Current binary format version.
pub const FORMAT_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum SaveError {
    #[error("save is older than the stored state (stored tick {stored}, incoming tick {incoming})")]
    StaleTick { stored: Ticks, incoming: Ticks },
    #[error("invalid magic number: expected 0x{:08X}, got 0x{:08X}", SAVE_MAGIC, .0)]
    InvalidMagic(u32),
    #[error("save from future version {0} (this build supports up to {FORMAT_VERSION})")]
    FutureVersion(u32),
    #[error("bitcode encoding failed: {0}")]
    Encode(String),
    #[error("decoding failed: {0}")]
    Decode(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveHeader {
    pub magic: u32,
    pub version: u32,
    pub tick: Ticks,
}

impl SaveHeader {
    pub fn new(tick: Ticks) -> Self {
        Self {
            magic: SAVE_MAGIC,
            version: FORMAT_VERSION,
            tick,
        }
    }

    pub fn validate(&self) -> Result<(), SaveError> {
        if self.magic != SAVE_MAGIC {
            return Err(SaveError::InvalidMagic(self.magic));
        }
        if self.version > FORMAT_VERSION {
            return Err(SaveError::FutureVersion(self.version));
        }
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct SaveFile {
    header: SaveHeader,
    state: GameState,
    map: Option<CompressedMap>,
}

/// A fresh game: the rules' starting conditions on a single origin chunk
/// and a newly generated exploration map.
pub fn new_game(rules: &Rules, seed: u64) -> GameState {
    let chunk = rules.floor_space.chunk_size;
    let mut state = GameState {
        tick: 0,
        rng_seed: seed,
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
        energy: Default::default(),
        research: Default::default(),
        market_popularity: Default::default(),
        market_damage: Default::default(),
        market_price_history: Vec::new(),
        market_recent_sales: Vec::new(),
        market_events: Vec::new(),
        discovered_recipes: rules.starting.unlocked_recipes.clone(),
        unlocked_recipes: rules.starting.unlocked_recipes.clone(),
        exploration_map: None,
        next_structure_id: 0,
    };
    state.exploration_map = Some(foundry_exploration::generate_default(seed, rules));
    tracing::info!(seed, "new game created");
    state
}

/// Accept a client-submitted state against the tick of the stored one.
///
/// Older saves are refused; accepted ones are migrated before returning.
pub fn accept_save(stored_tick: Option<Ticks>, incoming: GameState, rules: &Rules) -> Result<GameState, SaveError> {
    if let Some(stored) = stored_tick {
        if incoming.tick < stored {
            tracing::warn!(stored, incoming = incoming.tick, "stale save rejected");
            return Err(SaveError::StaleTick {
                stored,
                incoming: incoming.tick,
            });
        }
    }
    let mut state = incoming;
    migrate_in_place(&mut state, rules);
    Ok(state)
}

/// Parse a JSON state document and migrate it. Fields missing from older
/// documents take their defaults.
pub fn state_from_json(json: &str, rules: &Rules) -> Result<GameState, SaveError> {
    let mut state: GameState = serde_json::from_str(json).map_err(|e| SaveError::Decode(e.to_string()))?;
    migrate_in_place(&mut state, rules);
    Ok(state)
}

/// Serialize a state to the binary save format.
pub fn encode_save(state: &GameState) -> Result<Vec<u8>, SaveError> {
    let mut detached = state.clone();
    let map = detached.exploration_map.take().map(|m| codec::compress(&m));
    let file = SaveFile {
        header: SaveHeader::new(state.tick),
        state: detached,
        map,
    };
    bitcode::serialize(&file).map_err(|e| SaveError::Encode(e.to_string()))
}

/// Deserialize a binary save. The header is validated before the map is
/// rebuilt.
pub fn decode_save(data: &[u8]) -> Result<GameState, SaveError> {
    let file: SaveFile = bitcode::deserialize(data).map_err(|e| SaveError::Decode(e.to_string()))?;
    file.header.validate()?;
    let mut state = file.state;
    state.exploration_map = file.map.as_ref().map(codec::expand).transpose()?;
    Ok(state)
}
