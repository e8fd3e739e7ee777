//! Deterministic map generation.
//!
//! Every tile is a pure function of `(seed, x, y, biome_version)`, so a map
//! can be grown or regenerated in place without disturbing tiles that were
//! already generated. Terrain is chosen per biome block rather than per tile,
//! which gives contiguous regions and keeps the compressed terrain runs long.

use foundry_core::id::MaterialId;
use foundry_core::map::{
    CURRENT_BIOME_VERSION, ChunkCoord, ExplorationMap, Terrain, Tile, TileNode, TileRect,
};
use foundry_core::rng::{SimRng, hash_coords};
use foundry_core::rules::{ExplorationRules, ResourceWeight, Rules};

/// Side length, in tiles, of one biome block.
pub const BIOME_BLOCK: u32 = 8;

const TERRAIN_SALT: u64 = 0x51A7_E0B1_0000_7E22;
const NODE_SALT: u64 = 0x0D0E_5EED_0000_40DE;

/// Terrain at a tile for a biome revision.
pub fn terrain_at(seed: u64, x: u32, y: u32, biome_version: u32) -> Terrain {
    let palette = Terrain::palette(biome_version);
    let h = hash_coords(
        seed ^ TERRAIN_SALT,
        (x / BIOME_BLOCK) as i64,
        (y / BIOME_BLOCK) as i64,
    );
    palette[(h % palette.len() as u64) as usize]
}

fn pick_resource<'a>(resources: &'a [ResourceWeight], rng: &mut SimRng) -> Option<&'a MaterialId> {
    let total: u64 = resources.iter().map(|r| r.weight as u64).sum();
    if total == 0 {
        return None;
    }
    let mut roll = rng.below(total);
    for resource in resources {
        let weight = resource.weight as u64;
        if roll < weight {
            return Some(&resource.material);
        }
        roll -= weight;
    }
    None
}

/// The extraction node generated on a tile, if any. Water never carries one.
/// Generated nodes start locked at the standardized rate.
pub fn node_at(seed: u64, x: u32, y: u32, terrain: Terrain, rules: &ExplorationRules) -> Option<TileNode> {
    if terrain == Terrain::Water {
        return None;
    }
    let mut rng = SimRng::new(hash_coords(seed ^ NODE_SALT, x as i64, y as i64));
    if !rng.chance(rules.node_chance) {
        return None;
    }
    let resource = pick_resource(&rules.resources, &mut rng)?;
    Some(TileNode {
        resource_type: resource.clone(),
        rate: rules.node_rate_range.standard(),
        unlocked: false,
    })
}

/// A fresh, unexplored tile.
pub fn tile_at(seed: u64, x: u32, y: u32, biome_version: u32, rules: &ExplorationRules) -> Tile {
    let terrain = terrain_at(seed, x, y, biome_version);
    Tile {
        terrain,
        explored: false,
        extraction_node: node_at(seed, x, y, terrain, rules),
    }
}

/// Generate a `width x height` map with the starting square explored.
pub fn generate(seed: u64, width: u32, height: u32, rules: &Rules) -> ExplorationMap {
    let ex = &rules.exploration;
    let mut tiles = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            tiles.push(tile_at(seed, x, y, CURRENT_BIOME_VERSION, ex));
        }
    }

    let side = ex.initial_explored_size.min(width).min(height);
    let mut map = ExplorationMap {
        seed,
        width,
        height,
        biome_version: CURRENT_BIOME_VERSION,
        tiles,
        explored_bounds: TileRect {
            x: 0,
            y: 0,
            width: side,
            height: side,
        },
        explored_chunks: Vec::new(),
    };
    for y in 0..side {
        for x in 0..side {
            if let Some(tile) = map.tile_mut(x, y) {
                tile.explored = true;
            }
        }
    }
    let chunks = side.div_ceil(ex.chunk_size.max(1));
    for cy in 0..chunks {
        for cx in 0..chunks {
            map.explored_chunks.push(ChunkCoord { cx, cy });
        }
    }
    map
}

/// Generate a map at the configured starting size.
pub fn generate_default(seed: u64, rules: &Rules) -> ExplorationMap {
    generate(seed, rules.exploration.map_width, rules.exploration.map_height, rules)
}

/// Recompute every tile's terrain with the current biome revision. Explored
/// flags, nodes and bookkeeping are kept exactly.
pub fn regenerate_terrain(map: &ExplorationMap) -> ExplorationMap {
    let mut out = map.clone();
    let width = map.width.max(1);
    for (i, tile) in out.tiles.iter_mut().enumerate() {
        let (x, y) = (i as u32 % width, i as u32 / width);
        tile.terrain = terrain_at(map.seed, x, y, CURRENT_BIOME_VERSION);
    }
    out.biome_version = CURRENT_BIOME_VERSION;
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::test_utils::sample_rules;

    #[test]
    fn generation_is_deterministic() {
        let rules = sample_rules();
        assert_eq!(generate(7, 32, 32, &rules), generate(7, 32, 32, &rules));
        assert_ne!(generate(7, 32, 32, &rules), generate(8, 32, 32, &rules));
    }

    #[test]
    fn starting_square_is_explored() {
        let rules = sample_rules();
        let map = generate_default(3, &rules);
        assert_eq!((map.width, map.height), (32, 32));
        assert_eq!(map.explored_count(), 64);
        assert!(map.tile(7, 7).unwrap().explored);
        assert!(!map.tile(8, 0).unwrap().explored);
        assert_eq!(map.explored_chunks, vec![ChunkCoord { cx: 0, cy: 0 }]);
        assert_eq!(map.explored_bounds.width, 8);
    }

    #[test]
    fn nodes_avoid_water_and_use_standard_rate() {
        let rules = sample_rules();
        let map = generate(11, 128, 128, &rules);
        let standard = rules.exploration.node_rate_range.standard();
        let mut count = 0;
        for (x, y, node) in map.nodes() {
            count += 1;
            assert_ne!(map.tile(x, y).unwrap().terrain, Terrain::Water);
            assert_eq!(node.rate, standard);
            assert!(!node.unlocked);
        }
        // 5% of 16384 tiles, less water.
        assert!(count > 200, "only {count} nodes");
    }

    #[test]
    fn terrain_is_blocky() {
        let rules = sample_rules();
        let map = generate(5, 16, 16, &rules);
        let t = map.tile(0, 0).unwrap().terrain;
        assert!((0..BIOME_BLOCK).all(|x| map.tile(x, 3).unwrap().terrain == t));
    }

    #[test]
    fn regenerate_keeps_exploration_and_nodes() {
        let rules = sample_rules();
        let mut legacy = generate(21, 32, 32, &rules);
        legacy.biome_version = 1;
        for (i, tile) in legacy.tiles.iter_mut().enumerate() {
            tile.terrain = terrain_at(21, i as u32 % 32, i as u32 / 32, 1);
        }
        let upgraded = regenerate_terrain(&legacy);
        assert_eq!(upgraded.biome_version, CURRENT_BIOME_VERSION);
        assert_eq!(upgraded.explored_chunks, legacy.explored_chunks);
        for (old, new) in legacy.tiles.iter().zip(&upgraded.tiles) {
            assert_eq!(old.explored, new.explored);
            assert_eq!(old.extraction_node, new.extraction_node);
        }
        assert_eq!(upgraded, regenerate_terrain(&upgraded));
    }
}
