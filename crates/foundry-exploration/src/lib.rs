//! Exploration map: generation, chunk-by-chunk exploration, map growth,
//! extraction-node unlock pricing, and the compact map codec.
//!
//! The map starts at the configured size with a small square around the
//! origin explored. Each expansion explores one more chunk, the unexplored
//! chunk nearest the origin that borders explored ground. Once every chunk
//! of the current map is explored the map doubles in each dimension, up to
//! `maxMapSize`.

use std::collections::BTreeSet;

use foundry_core::error::ActionError;
use foundry_core::map::{ChunkCoord, ExplorationMap, TileNode, TileRect};
use foundry_core::rules::Rules;
use foundry_core::state::ExtractionNode;
use serde::{Deserialize, Serialize};

pub mod codec;
pub mod generate;

pub use codec::{CodecError, CompressedMap};
pub use generate::{generate, generate_default, regenerate_terrain};

/// A priced plan to explore one chunk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Expansion {
    pub chunk: ChunkCoord,
    pub chunk_rect: TileRect,
    pub new_bounds: TileRect,
    pub cells_to_explore: u64,
    pub cost: f64,
    /// The chunk touches the right or bottom edge of the generated map.
    pub at_map_edge: bool,
}

fn chunk_size(rules: &Rules) -> u32 {
    rules.exploration.chunk_size.max(1)
}

/// The tiles a chunk covers, clipped to the map.
pub fn chunk_rect(map: &ExplorationMap, rules: &Rules, chunk: ChunkCoord) -> TileRect {
    let size = chunk_size(rules);
    let x = chunk.cx * size;
    let y = chunk.cy * size;
    TileRect {
        x,
        y,
        width: size.min(map.width.saturating_sub(x)),
        height: size.min(map.height.saturating_sub(y)),
    }
}

fn unexplored_in(map: &ExplorationMap, rect: &TileRect) -> u64 {
    let mut cells = 0;
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            if map.tile(x, y).is_some_and(|t| !t.explored) {
                cells += 1;
            }
        }
    }
    cells
}

/// Chunks explored by the starting square; they never count towards the
/// expansion price.
fn initial_chunks(rules: &Rules) -> usize {
    let side = rules.exploration.initial_explored_size.div_ceil(chunk_size(rules)) as usize;
    side * side
}

/// Cost multiplier applied to the next expansion.
pub fn expansion_scale(map: &ExplorationMap, rules: &Rules) -> f64 {
    let done = map.explored_chunks.len().saturating_sub(initial_chunks(rules));
    rules.exploration.expansion_scale_factor.powi(done as i32)
}

/// The next chunk to explore within the current map bounds, or `None` when
/// nothing inside the generated map is left.
pub fn next_expansion(map: &ExplorationMap, rules: &Rules) -> Option<Expansion> {
    let size = chunk_size(rules);
    let cols = map.width.div_ceil(size);
    let rows = map.height.div_ceil(size);
    let explored: BTreeSet<ChunkCoord> = map.explored_chunks.iter().copied().collect();
    let borders_explored = |c: ChunkCoord| {
        explored.is_empty()
            || [(1i64, 0i64), (-1, 0), (0, 1), (0, -1)].iter().any(|(dx, dy)| {
                let (nx, ny) = (c.cx as i64 + dx, c.cy as i64 + dy);
                nx >= 0
                    && ny >= 0
                    && explored.contains(&ChunkCoord {
                        cx: nx as u32,
                        cy: ny as u32,
                    })
            })
    };

    let mut best: Option<((u32, u32, u32, u32), ChunkCoord, TileRect, u64)> = None;
    for cy in 0..rows {
        for cx in 0..cols {
            let chunk = ChunkCoord { cx, cy };
            if explored.contains(&chunk) || !borders_explored(chunk) {
                continue;
            }
            let rect = chunk_rect(map, rules, chunk);
            let cells = unexplored_in(map, &rect);
            if cells == 0 {
                continue;
            }
            // Ring around the origin first, then diagonal distance.
            let key = (cx.max(cy), cx + cy, cy, cx);
            if best.as_ref().is_none_or(|(k, ..)| key < *k) {
                best = Some((key, chunk, rect, cells));
            }
        }
    }

    let (_, chunk, rect, cells) = best?;
    Some(Expansion {
        chunk,
        chunk_rect: rect,
        new_bounds: map.explored_bounds.union(&rect),
        cells_to_explore: cells,
        cost: cells as f64 * rules.exploration.cost_per_cell * expansion_scale(map, rules),
        at_map_edge: rect.x + rect.width >= map.width || rect.y + rect.height >= map.height,
    })
}

/// Mark an expansion's chunk explored.
pub fn apply_expansion(map: &mut ExplorationMap, expansion: &Expansion) {
    let rect = expansion.chunk_rect;
    for y in rect.y..rect.y + rect.height {
        for x in rect.x..rect.x + rect.width {
            if let Some(tile) = map.tile_mut(x, y) {
                tile.explored = true;
            }
        }
    }
    if !map.explored_chunks.contains(&expansion.chunk) {
        map.explored_chunks.push(expansion.chunk);
    }
    map.explored_bounds = expansion.new_bounds;
}

/// Grow the map, doubling each dimension up to `maxMapSize`. Existing tiles
/// are kept; new tiles are generated unexplored. `None` at the maximum size.
pub fn expand(map: &ExplorationMap, rules: &Rules) -> Option<ExplorationMap> {
    let max = rules.exploration.max_map_size;
    if map.width >= max && map.height >= max {
        return None;
    }
    let width = (map.width.max(1) * 2).min(max).max(map.width);
    let height = (map.height.max(1) * 2).min(max).max(map.height);
    let mut tiles = Vec::with_capacity(width as usize * height as usize);
    for y in 0..height {
        for x in 0..width {
            let tile = match map.tile(x, y) {
                Some(existing) => existing.clone(),
                None => generate::tile_at(map.seed, x, y, map.biome_version, &rules.exploration),
            };
            tiles.push(tile);
        }
    }
    tracing::info!(
        from_width = map.width,
        from_height = map.height,
        width,
        height,
        "exploration map grown"
    );
    Some(ExplorationMap {
        width,
        height,
        tiles,
        ..map.clone()
    })
}

/// Plan and apply the next expansion, growing the map first when the
/// current one is fully explored. Returns the updated map and the priced
/// expansion, or `None` when nothing is left anywhere.
pub fn explore_next(map: &ExplorationMap, rules: &Rules) -> Option<(ExplorationMap, Expansion)> {
    let mut current = map.clone();
    loop {
        if let Some(expansion) = next_expansion(&current, rules) {
            apply_expansion(&mut current, &expansion);
            return Some((current, expansion));
        }
        current = expand(&current, rules)?;
    }
}

/// The locked node on an explored tile, ready to be unlocked.
pub fn lockable_node(map: &ExplorationMap, x: u32, y: u32) -> Result<&TileNode, ActionError> {
    let tile = map.tile(x, y).ok_or(ActionError::TileOutOfBounds { x, y })?;
    if !tile.explored {
        return Err(ActionError::TileNotExplored { x, y });
    }
    let node = tile
        .extraction_node
        .as_ref()
        .ok_or(ActionError::NoNodeOnTile { x, y })?;
    if node.unlocked {
        return Err(ActionError::NodeAlreadyUnlocked { x, y });
    }
    Ok(node)
}

/// Credit cost of unlocking one more node of `resource`:
/// `base x resourceMult^(same resource unlocked) x globalMult^(all unlocked)`.
pub fn unlock_cost(nodes: &[ExtractionNode], rules: &Rules, resource: &str) -> f64 {
    let ex = &rules.exploration;
    let same = nodes
        .iter()
        .filter(|n| n.resource_type.as_str() == resource)
        .count();
    ex.unlock_base_cost
        * ex.unlock_resource_multiplier.powi(same as i32)
        * ex.unlock_global_multiplier.powi(nodes.len() as i32)
}
