//! Compact exploration-map encoding for save files.
//!
//! A generated map is almost entirely redundant: terrain comes in biome
//! blocks, the explored set is a handful of rectangles, and only a few
//! percent of tiles carry a node. The compressed form stores
//!
//! - terrain as row-major runs of `(terrain code, length)`,
//! - the explored flags as alternating run lengths, starting unexplored,
//! - nodes sparsely, as index deltas into a resource table.
//!
//! [`expand`] rebuilds a map equal to the one given to [`compress`].

use foundry_core::id::MaterialId;
use foundry_core::map::{ChunkCoord, ExplorationMap, Terrain, Tile, TileNode, TileRect};
use serde::{Deserialize, Serialize};

/// Reasons a compressed map cannot be rebuilt.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CodecError {
    #[error("unknown terrain code {0}")]
    UnknownTerrain(u8),
    #[error("{section} covers {actual} tiles, map has {expected}")]
    TileCountMismatch {
        section: &'static str,
        expected: usize,
        actual: usize,
    },
    #[error("node index {0} is outside the map")]
    NodeOutOfRange(usize),
    #[error("node references unknown resource slot {0}")]
    UnknownResource(u16),
    #[error("encode failed: {0}")]
    Encode(String),
    #[error("decode failed: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerrainRun {
    pub terrain: u8,
    pub length: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressedNode {
    /// Tile index distance from the previous node (from 0 for the first).
    pub gap: u32,
    pub resource: u16,
    pub rate: u64,
    pub unlocked: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressedMap {
    pub seed: u64,
    pub width: u32,
    pub height: u32,
    pub biome_version: u32,
    pub terrain: Vec<TerrainRun>,
    pub explored: Vec<u32>,
    pub resources: Vec<MaterialId>,
    pub nodes: Vec<CompressedNode>,
    pub explored_bounds: TileRect,
    pub explored_chunks: Vec<ChunkCoord>,
}

/// Compress a map. Infallible: every map has a compressed form.
pub fn compress(map: &ExplorationMap) -> CompressedMap {
    let mut terrain: Vec<TerrainRun> = Vec::new();
    let mut explored: Vec<u32> = Vec::new();
    let mut run_flag = false;
    let mut run_len = 0u32;
    let mut resources: Vec<MaterialId> = Vec::new();
    let mut nodes = Vec::new();
    let mut last_node = 0usize;

    for (i, tile) in map.tiles.iter().enumerate() {
        let code = tile.terrain.to_u8();
        match terrain.last_mut() {
            Some(run) if run.terrain == code => run.length += 1,
            _ => terrain.push(TerrainRun {
                terrain: code,
                length: 1,
            }),
        }

        if tile.explored != run_flag {
            explored.push(run_len);
            run_flag = tile.explored;
            run_len = 0;
        }
        run_len += 1;

        if let Some(node) = &tile.extraction_node {
            let slot = match resources.iter().position(|r| *r == node.resource_type) {
                Some(slot) => slot,
                None => {
                    resources.push(node.resource_type.clone());
                    resources.len() - 1
                }
            };
            nodes.push(CompressedNode {
                gap: (i - last_node) as u32,
                resource: slot as u16,
                rate: node.rate,
                unlocked: node.unlocked,
            });
            last_node = i;
        }
    }
    explored.push(run_len);

    CompressedMap {
        seed: map.seed,
        width: map.width,
        height: map.height,
        biome_version: map.biome_version,
        terrain,
        explored,
        resources,
        nodes,
        explored_bounds: map.explored_bounds,
        explored_chunks: map.explored_chunks.clone(),
    }
}

/// Rebuild the full tile map.
pub fn expand(compressed: &CompressedMap) -> Result<ExplorationMap, CodecError> {
    let expected = compressed.width as usize * compressed.height as usize;

    let mut terrain = Vec::with_capacity(expected);
    for run in &compressed.terrain {
        let kind = Terrain::from_u8(run.terrain).ok_or(CodecError::UnknownTerrain(run.terrain))?;
        let actual = terrain.len() + run.length as usize;
        if actual > expected {
            return Err(CodecError::TileCountMismatch {
                section: "terrain",
                expected,
                actual,
            });
        }
        terrain.extend(std::iter::repeat_n(kind, run.length as usize));
    }
    if terrain.len() != expected {
        return Err(CodecError::TileCountMismatch {
            section: "terrain",
            expected,
            actual: terrain.len(),
        });
    }

    let mut tiles: Vec<Tile> = terrain
        .into_iter()
        .map(|terrain| Tile {
            terrain,
            explored: false,
            extraction_node: None,
        })
        .collect();

    let mut cursor = 0usize;
    let mut flag = false;
    for &len in &compressed.explored {
        let end = cursor + len as usize;
        if end > expected {
            return Err(CodecError::TileCountMismatch {
                section: "explored",
                expected,
                actual: end,
            });
        }
        for tile in &mut tiles[cursor..end] {
            tile.explored = flag;
        }
        cursor = end;
        flag = !flag;
    }
    if cursor != expected {
        return Err(CodecError::TileCountMismatch {
            section: "explored",
            expected,
            actual: cursor,
        });
    }

    let mut index = 0usize;
    for node in &compressed.nodes {
        index += node.gap as usize;
        let resource = compressed
            .resources
            .get(node.resource as usize)
            .ok_or(CodecError::UnknownResource(node.resource))?;
        let tile = tiles.get_mut(index).ok_or(CodecError::NodeOutOfRange(index))?;
        tile.extraction_node = Some(TileNode {
            resource_type: resource.clone(),
            rate: node.rate,
            unlocked: node.unlocked,
        });
    }

    Ok(ExplorationMap {
        seed: compressed.seed,
        width: compressed.width,
        height: compressed.height,
        biome_version: compressed.biome_version,
        tiles,
        explored_bounds: compressed.explored_bounds,
        explored_chunks: compressed.explored_chunks.clone(),
    })
}

/// Encode a compressed map to bytes.
pub fn to_bytes(compressed: &CompressedMap) -> Result<Vec<u8>, CodecError> {
    bitcode::serialize(compressed).map_err(|e| CodecError::Encode(e.to_string()))
}

/// Decode bytes written by [`to_bytes`].
pub fn from_bytes(data: &[u8]) -> Result<CompressedMap, CodecError> {
    bitcode::deserialize(data).map_err(|e| CodecError::Decode(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{apply_expansion, generate, next_expansion};
    use foundry_core::test_utils::sample_rules;

    fn played_map() -> ExplorationMap {
        let rules = sample_rules();
        let mut map = generate(77, 128, 128, &rules);
        for _ in 0..5 {
            let e = next_expansion(&map, &rules).unwrap();
            apply_expansion(&mut map, &e);
        }
        let (x, y) = map
            .nodes()
            .find(|(x, y, _)| map.tile(*x, *y).is_some_and(|t| t.explored))
            .map(|(x, y, _)| (x, y))
            .unwrap_or((0, 0));
        if let Some(node) = map.tile_mut(x, y).and_then(|t| t.extraction_node.as_mut()) {
            node.unlocked = true;
        }
        map
    }

    #[test]
    fn round_trip_128() {
        let map = played_map();
        let compressed = compress(&map);
        assert_eq!(expand(&compressed).unwrap(), map);
    }

    #[test]
    fn bytes_round_trip_and_are_small() {
        let map = played_map();
        let bytes = to_bytes(&compress(&map)).unwrap();
        let back = expand(&from_bytes(&bytes).unwrap()).unwrap();
        assert_eq!(back, map);

        let json = serde_json::to_vec(&map).unwrap();
        assert!(
            bytes.len() * 20 < json.len(),
            "compressed {} vs json {}",
            bytes.len(),
            json.len()
        );
    }

    #[test]
    fn explored_runs_alternate() {
        let rules = sample_rules();
        let map = generate(1, 16, 16, &rules);
        let compressed = compress(&map);
        // 8 explored tiles per row for 8 rows, starting explored.
        assert_eq!(compressed.explored[0], 0);
        assert_eq!(compressed.explored[1], 8);
        assert_eq!(compressed.explored.iter().map(|&n| n as usize).sum::<usize>(), 256);
    }

    #[test]
    fn corrupt_input_is_rejected() {
        let rules = sample_rules();
        let good = compress(&generate(1, 16, 16, &rules));

        let mut bad = good.clone();
        bad.terrain[0].terrain = 99;
        assert_eq!(expand(&bad), Err(CodecError::UnknownTerrain(99)));

        let mut bad = good.clone();
        bad.terrain[0].length += 1;
        assert!(matches!(
            expand(&bad),
            Err(CodecError::TileCountMismatch { section: "terrain", .. })
        ));

        let mut bad = good.clone();
        bad.explored.pop();
        assert!(matches!(
            expand(&bad),
            Err(CodecError::TileCountMismatch { section: "explored", .. })
        ));

        let mut bad = good.clone();
        bad.nodes.push(CompressedNode {
            gap: 10_000,
            resource: 0,
            rate: 1,
            unlocked: false,
        });
        bad.resources.push(MaterialId::new("coal"));
        assert!(matches!(expand(&bad), Err(CodecError::NodeOutOfRange(_))));

        assert!(matches!(from_bytes(&[1, 2, 3]), Err(CodecError::Decode(_))));
    }
}
