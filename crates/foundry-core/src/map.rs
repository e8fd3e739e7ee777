//! Exploration-map data model.
//!
//! The core engine treats the map as mostly opaque: it reads tiles by
//! coordinate, checks the explored flag, and reads/flags extraction nodes.
//! Generation and growth live in `foundry-exploration`.

use serde::{Deserialize, Serialize};

use crate::id::MaterialId;

/// Biome revision the generator currently produces. Maps generated with an
/// older revision predate some terrain kinds and are regenerated on load.
pub const CURRENT_BIOME_VERSION: u32 = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Terrain {
    Plains,
    Forest,
    Desert,
    Mountain,
    Water,
    // Added in biome version 2.
    Tundra,
    Volcanic,
    Swamp,
}

impl Terrain {
    /// Terrain kinds available to the generator at a biome version.
    pub fn palette(biome_version: u32) -> &'static [Terrain] {
        const V1: [Terrain; 5] = [
            Terrain::Plains,
            Terrain::Forest,
            Terrain::Desert,
            Terrain::Mountain,
            Terrain::Water,
        ];
        const V2: [Terrain; 8] = [
            Terrain::Plains,
            Terrain::Forest,
            Terrain::Desert,
            Terrain::Mountain,
            Terrain::Water,
            Terrain::Tundra,
            Terrain::Volcanic,
            Terrain::Swamp,
        ];
        if biome_version >= 2 { &V2 } else { &V1 }
    }

    pub fn to_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(value: u8) -> Option<Terrain> {
        Terrain::palette(CURRENT_BIOME_VERSION)
            .get(value as usize)
            .copied()
    }
}

/// An extraction node sitting on a map tile. Locked until unlocked.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TileNode {
    pub resource_type: MaterialId,
    pub rate: u64,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tile {
    pub terrain: Terrain,
    pub explored: bool,
    pub extraction_node: Option<TileNode>,
}

/// An axis-aligned rectangle of tiles, `[x, x + width) x [y, y + height)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TileRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl TileRect {
    pub fn contains(&self, x: u32, y: u32) -> bool {
        x >= self.x && y >= self.y && x < self.x + self.width && y < self.y + self.height
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &TileRect) -> TileRect {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = (self.x + self.width).max(other.x + other.width);
        let bottom = (self.y + self.height).max(other.y + other.height);
        TileRect {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }
}

/// Chunk coordinates on the exploration chunk grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: u32,
    pub cy: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplorationMap {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    #[serde(default = "legacy_biome_version")]
    pub biome_version: u32,
    /// Row-major, `width * height` entries.
    pub tiles: Vec<Tile>,
    pub explored_bounds: TileRect,
    pub explored_chunks: Vec<ChunkCoord>,
}

fn legacy_biome_version() -> u32 {
    1
}

impl ExplorationMap {
    fn index(&self, x: u32, y: u32) -> Option<usize> {
        if x < self.width && y < self.height {
            Some(y as usize * self.width as usize + x as usize)
        } else {
            None
        }
    }

    pub fn tile(&self, x: u32, y: u32) -> Option<&Tile> {
        self.index(x, y).and_then(|i| self.tiles.get(i))
    }

    pub fn tile_mut(&mut self, x: u32, y: u32) -> Option<&mut Tile> {
        self.index(x, y).and_then(|i| self.tiles.get_mut(i))
    }

    /// Iterate `(x, y, tile)` in row-major order.
    pub fn iter_tiles(&self) -> impl Iterator<Item = (u32, u32, &Tile)> {
        let width = self.width.max(1);
        self.tiles
            .iter()
            .enumerate()
            .map(move |(i, t)| ((i as u32) % width, (i as u32) / width, t))
    }

    /// Every extraction node on the map, unlocked or not.
    pub fn nodes(&self) -> impl Iterator<Item = (u32, u32, &TileNode)> {
        self.iter_tiles()
            .filter_map(|(x, y, t)| t.extraction_node.as_ref().map(|n| (x, y, n)))
    }

    pub fn explored_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.explored).count()
    }
}
