//! Floor-space grid: placement validation and chunk growth.
//!
//! The floor is the union of purchased [`Chunk`]s. A structure occupies the
//! rectangle `[x, x + w) x [y, y + h)` given by its rules entry. Placement is
//! valid when every occupied cell lies inside some chunk and no cell is
//! already taken by another placement.

use std::collections::BTreeMap;

use foundry_core::error::{ActionError, RulesError};
use foundry_core::rules::{Rules, StructureSize};
use foundry_core::state::{Chunk, FloorSpace, GameState, StructureKind};
use serde::{Deserialize, Serialize};

pub mod expansion;
pub use expansion::{FloorPurchase, chunk_sequence, next_purchase, purchase_floor};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// A cell on the floor grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GridPosition {
    pub x: i32,
    pub y: i32,
}

impl GridPosition {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// The footprint of a structure on the grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Footprint {
    pub width: u32,
    pub height: u32,
}

impl Footprint {
    pub fn single() -> Self {
        Self {
            width: 1,
            height: 1,
        }
    }

    /// Exclusive far corner when the top-left corner sits at `origin`, or
    /// `None` if the rectangle would run off the `i32` grid.
    pub fn far_corner(&self, origin: GridPosition) -> Option<GridPosition> {
        let x = i32::try_from(i64::from(origin.x) + i64::from(self.width)).ok()?;
        let y = i32::try_from(i64::from(origin.y) + i64::from(self.height)).ok()?;
        Some(GridPosition::new(x, y))
    }

    /// Cells covered when the top-left corner sits at `origin`, row by row.
    /// Empty if the rectangle does not fit the grid; see [`Footprint::far_corner`].
    pub fn tiles(&self, origin: GridPosition) -> impl Iterator<Item = GridPosition> {
        let end = self.far_corner(origin).unwrap_or(origin);
        let GridPosition { x, y } = origin;
        (y..end.y).flat_map(move |row| (x..end.x).map(move |col| GridPosition::new(col, row)))
    }
}

impl From<StructureSize> for Footprint {
    fn from(size: StructureSize) -> Self {
        Self {
            width: size.width,
            height: size.height,
        }
    }
}

/// Why a rectangle cannot be placed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PlacementError {
    #[error("Placement is out of bounds")]
    OutOfBounds,
    #[error("Placement collides with {0}")]
    Collides(String),
}

impl From<PlacementError> for ActionError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::OutOfBounds => ActionError::OutOfBounds,
            PlacementError::Collides(id) => ActionError::Collision(id),
        }
    }
}

/// Footprint of a structure type, looked up from its rules entry.
pub fn footprint_of(
    rules: &Rules,
    kind: StructureKind,
    structure_type: &str,
) -> Result<Footprint, RulesError> {
    let size = match kind {
        StructureKind::Machine => rules.machine(structure_type)?.size,
        StructureKind::Generator => rules.generator(structure_type)?.size,
    };
    Ok(size.into())
}

// ---------------------------------------------------------------------------
// FloorIndex
// ---------------------------------------------------------------------------

/// Occupancy map of the floor: which placement id covers each cell.
///
/// Built on demand from the placements stored in the state; the state itself
/// keeps only origins, and sizes come from the rules.
#[derive(Debug, Default)]
pub struct FloorIndex {
    tiles: BTreeMap<GridPosition, String>,
}

impl FloorIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index every placement in `floor`, skipping the one with id `ignore`
    /// (used when re-validating a move).
    pub fn build(floor: &FloorSpace, rules: &Rules, ignore: Option<&str>) -> Result<Self, RulesError> {
        let mut index = Self::new();
        for placement in &floor.placements {
            if ignore == Some(placement.id.as_str()) {
                continue;
            }
            let footprint = footprint_of(rules, placement.kind, &placement.structure_type)?;
            index.occupy(&placement.id, GridPosition::new(placement.x, placement.y), footprint);
        }
        Ok(index)
    }

    /// Mark every cell of the footprint as taken by `id`. Cells already
    /// taken keep their first owner.
    pub fn occupy(&mut self, id: &str, origin: GridPosition, footprint: Footprint) {
        for tile in footprint.tiles(origin) {
            self.tiles.entry(tile).or_insert_with(|| id.to_string());
        }
    }

    /// The placement id covering a cell, if any.
    pub fn occupant(&self, pos: GridPosition) -> Option<&str> {
        self.tiles.get(&pos).map(String::as_str)
    }

    pub fn is_occupied(&self, pos: GridPosition) -> bool {
        self.tiles.contains_key(&pos)
    }

    /// First placement intersecting the footprint, in row-major cell order.
    pub fn first_collision(&self, origin: GridPosition, footprint: Footprint) -> Option<&str> {
        footprint.tiles(origin).find_map(|tile| self.occupant(tile))
    }

    pub fn tile_count(&self) -> usize {
        self.tiles.len()
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Whether every cell of the footprint lies inside the union of `chunks`.
/// A footprint that is empty or runs off the grid is never covered.
pub fn is_covered(chunks: &[Chunk], origin: GridPosition, footprint: Footprint) -> bool {
    if footprint.width == 0 || footprint.height == 0 || footprint.far_corner(origin).is_none() {
        return false;
    }
    footprint
        .tiles(origin)
        .all(|tile| chunks.iter().any(|chunk| chunk.contains_cell(tile.x, tile.y)))
}

/// Check whether a `width x height` rectangle can be placed at `(x, y)`.
///
/// Bounds are checked before collisions, so a rectangle that is both out of
/// bounds and colliding reports [`PlacementError::OutOfBounds`]. `ignore`
/// excludes one placement id from the collision check.
pub fn can_place_at(
    state: &GameState,
    rules: &Rules,
    x: i32,
    y: i32,
    footprint: Footprint,
    ignore: Option<&str>,
) -> Result<Result<(), PlacementError>, RulesError> {
    let origin = GridPosition::new(x, y);
    if !is_covered(&state.floor_space.chunks, origin, footprint) {
        return Ok(Err(PlacementError::OutOfBounds));
    }
    let index = FloorIndex::build(&state.floor_space, rules, ignore)?;
    Ok(match index.first_collision(origin, footprint) {
        Some(id) => Err(PlacementError::Collides(id.to_string())),
        None => Ok(()),
    })
}

/// [`can_place_at`] for a structure type, folded into an [`ActionError`].
pub fn validate_structure_placement(
    state: &GameState,
    rules: &Rules,
    kind: StructureKind,
    structure_type: &str,
    x: i32,
    y: i32,
    ignore: Option<&str>,
) -> Result<(), ActionError> {
    let footprint = footprint_of(rules, kind, structure_type)?;
    can_place_at(state, rules, x, y, footprint, ignore)??;
    Ok(())
}
