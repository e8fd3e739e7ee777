//! Floor growth: which chunk the next purchase adds and what it costs.
//!
//! Chunks are squares of `floorSpace.chunkSize` cells laid on a chunk grid
//! anchored at the origin. Each expansion policy defines an infinite ordering
//! of chunk-grid coordinates; a purchase adds the first coordinate in that
//! ordering the floor does not already own.

use std::collections::BTreeSet;

use foundry_core::rules::{ExpansionPolicy, FloorSpaceRules};
use foundry_core::state::{Chunk, FloorSpace};

/// A priced floor purchase, not yet applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FloorPurchase {
    pub chunk: Chunk,
    pub cost: f64,
}

/// Chunk-grid coordinate of the `n`-th chunk under a policy.
///
/// Spiral grows square rings around the origin: ring `k` first fills its
/// right wing `(k, 0..k)` and then its top wing `(0..=k, k)`. Fractal doubles
/// the covered rectangle, width first when it is square, height otherwise,
/// filling each new half row by row.
pub fn chunk_at(policy: ExpansionPolicy, n: u64) -> (u32, u32) {
    match policy {
        ExpansionPolicy::Spiral => {
            let k = n.isqrt();
            let o = n - k * k;
            if o < k {
                (k as u32, o as u32)
            } else {
                ((o - k) as u32, k as u32)
            }
        }
        ExpansionPolicy::Fractal => {
            if n == 0 {
                return (0, 0);
            }
            // Step s takes the area from 2^(s-1) to 2^s chunks.
            let s = n.ilog2() + 1;
            let j = n - (1u64 << (s - 1));
            let prior = s - 1;
            let w_before = 1u64 << prior.div_ceil(2);
            let h_before = 1u64 << (prior / 2);
            if w_before == h_before {
                ((w_before + j % w_before) as u32, (j / w_before) as u32)
            } else {
                ((j % w_before) as u32, (h_before + j / w_before) as u32)
            }
        }
    }
}

/// The infinite chunk ordering of a policy, starting at the origin chunk.
pub fn chunk_sequence(policy: ExpansionPolicy) -> impl Iterator<Item = (u32, u32)> {
    (0u64..).map(move |n| chunk_at(policy, n))
}

/// Cost of the next purchase: `cells x costPerCell x scale^purchases`.
pub fn purchase_cost(rules: &FloorSpaceRules, purchases: u32) -> f64 {
    let cells = rules.chunk_size as f64 * rules.chunk_size as f64;
    cells * rules.cost_per_cell * rules.expansion_scale_factor.powi(purchases as i32)
}

/// Price the next chunk for `floor` under `rules`.
pub fn next_purchase(floor: &FloorSpace, rules: &FloorSpaceRules) -> FloorPurchase {
    let size = rules.chunk_size.max(1);
    let owned: BTreeSet<(i64, i64)> = floor
        .chunks
        .iter()
        .map(|c| (c.x as i64 / size as i64, c.y as i64 / size as i64))
        .collect();
    let (cx, cy) = chunk_sequence(rules.expansion_policy)
        .find(|&(cx, cy)| !owned.contains(&(cx as i64, cy as i64)))
        .unwrap_or((0, 0));
    FloorPurchase {
        chunk: Chunk {
            x: (cx * size) as i32,
            y: (cy * size) as i32,
            width: size,
            height: size,
        },
        cost: purchase_cost(rules, floor.purchases),
    }
}

/// Apply a purchase: add the chunk, bump the purchase counter and grow the
/// floor's extent to cover it.
pub fn purchase_floor(floor: &mut FloorSpace, purchase: &FloorPurchase) {
    floor.chunks.push(purchase.chunk);
    floor.purchases += 1;
    let right = floor
        .chunks
        .iter()
        .map(|c| c.right().clamp(0, i64::from(u32::MAX)) as u32)
        .max()
        .unwrap_or(0);
    let bottom = floor
        .chunks
        .iter()
        .map(|c| c.bottom().clamp(0, i64::from(u32::MAX)) as u32)
        .max()
        .unwrap_or(0);
    floor.width = floor.width.max(right);
    floor.height = floor.height.max(bottom);
}

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::test_utils::{sample_rules, sample_state};

    #[test]
    fn spiral_fills_rings() {
        let first: Vec<_> = chunk_sequence(ExpansionPolicy::Spiral).take(9).collect();
        assert_eq!(
            first,
            vec![
                (0, 0),
                (1, 0),
                (0, 1),
                (1, 1),
                (2, 0),
                (2, 1),
                (0, 2),
                (1, 2),
                (2, 2),
            ]
        );
    }

    #[test]
    fn fractal_doubles_width_then_height() {
        let first: Vec<_> = chunk_sequence(ExpansionPolicy::Fractal).take(8).collect();
        assert_eq!(
            first,
            vec![
                (0, 0),
                (1, 0),
                (0, 1),
                (1, 1),
                (2, 0),
                (3, 0),
                (2, 1),
                (3, 1),
            ]
        );
        // Next step doubles height of the 4x2 rectangle.
        assert_eq!(chunk_at(ExpansionPolicy::Fractal, 8), (0, 2));
        assert_eq!(chunk_at(ExpansionPolicy::Fractal, 15), (3, 3));
    }

    #[test]
    fn sequences_never_repeat() {
        for policy in [ExpansionPolicy::Spiral, ExpansionPolicy::Fractal] {
            let seen: BTreeSet<_> = chunk_sequence(policy).take(256).collect();
            assert_eq!(seen.len(), 256);
        }
    }

    #[test]
    fn cost_scales_geometrically() {
        let rules = sample_rules();
        let floor = &rules.floor_space;
        let first = purchase_cost(floor, 0);
        let second = purchase_cost(floor, 1);
        assert_eq!(first, 64.0);
        assert!((second - first * floor.expansion_scale_factor).abs() < 1e-9);
    }

    #[test]
    fn purchase_skips_owned_chunks_and_grows_extent() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        let purchase = next_purchase(&state.floor_space, &rules.floor_space);
        assert_eq!((purchase.chunk.x, purchase.chunk.y), (8, 0));
        purchase_floor(&mut state.floor_space, &purchase);
        assert_eq!(state.floor_space.width, 16);
        assert_eq!(state.floor_space.height, 8);
        assert_eq!(state.floor_space.purchases, 1);

        let purchase = next_purchase(&state.floor_space, &rules.floor_space);
        assert_eq!((purchase.chunk.x, purchase.chunk.y), (0, 8));
        assert!(purchase.cost > 64.0);
    }
}
