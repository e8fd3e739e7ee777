//! Consistency checks for the rules document and for game states.
//!
//! [`Rules::validate`] runs once at load time so dangling references are
//! reported as configuration errors instead of surfacing mid-game.
//! [`check_invariants`] is the state-level audit used by tests and by the
//! save-acceptance path.

use std::collections::BTreeSet;

use crate::error::RulesError;
use crate::rules::{Rules, StructureSize};
use crate::state::{GameState, MachineStatus, Placement, StructureKind};

// ---------------------------------------------------------------------------
// Rules validation
// ---------------------------------------------------------------------------

impl Rules {
    /// Check every cross-reference and the tunables the engine divides by.
    pub fn validate(&self) -> Result<(), RulesError> {
        for (id, recipe) in &self.recipes {
            for material in recipe.inputs.keys().chain(recipe.outputs.keys()) {
                self.expect_material(material.as_str(), || format!("recipe {id}"))?;
            }
            if self.research.age(recipe.age).is_none() {
                return Err(RulesError::MissingAge(recipe.age));
            }
        }
        for (id, machine) in &self.machines {
            for recipe in &machine.allowed_recipes {
                if !self.recipes.contains_key(recipe) {
                    return Err(RulesError::DanglingReference {
                        context: format!("machine {id}"),
                        kind: "recipe",
                        name: recipe.to_string(),
                    });
                }
            }
            for material in machine.cost.keys() {
                self.expect_material(material.as_str(), || format!("machine {id} cost"))?;
            }
        }
        for (id, generator) in &self.generators {
            if let Some(fuel) = &generator.fuel {
                self.expect_material(fuel.material.as_str(), || format!("generator {id} fuel"))?;
            }
            for material in generator.cost.keys() {
                self.expect_material(material.as_str(), || format!("generator {id} cost"))?;
            }
        }
        for resource in &self.exploration.resources {
            self.expect_material(resource.material.as_str(), || "exploration resources".into())?;
        }
        for material in self.starting.inventory.keys() {
            self.expect_material(material.as_str(), || "starting inventory".into())?;
        }
        for recipe in &self.starting.unlocked_recipes {
            if !self.recipes.contains_key(recipe) {
                return Err(RulesError::DanglingReference {
                    context: "starting unlocked recipes".into(),
                    kind: "recipe",
                    name: recipe.to_string(),
                });
            }
        }

        if self.research.credits_to_rp_ratio <= 0.0 {
            return Err(RulesError::NonPositive {
                field: "research.creditsToRpRatio",
            });
        }
        if self.floor_space.chunk_size == 0 {
            return Err(RulesError::NonPositive {
                field: "floorSpace.chunkSize",
            });
        }
        if self.exploration.chunk_size == 0 {
            return Err(RulesError::NonPositive {
                field: "exploration.chunkSize",
            });
        }
        if self.market.damage_penalty_factor <= 0.0 {
            return Err(RulesError::NonPositive {
                field: "market.damagePenaltyFactor",
            });
        }
        let range = self.exploration.node_rate_range;
        if range.min > range.max {
            return Err(RulesError::InvalidRange {
                field: "exploration.nodeRateRange",
                min: range.min,
                max: range.max,
            });
        }

        let research = &self.research;
        let total = research.current_age_weight + research.older_age_weight + research.next_age_weight;
        if total <= 0.0 || research.current_age_weight / total < 0.8 {
            return Err(RulesError::WeakCurrentAgeWeight);
        }
        Ok(())
    }

    fn expect_material(
        &self,
        material: &str,
        context: impl FnOnce() -> String,
    ) -> Result<(), RulesError> {
        if self.materials.contains_key(material) {
            Ok(())
        } else {
            Err(RulesError::DanglingReference {
                context: context(),
                kind: "material",
                name: material.to_string(),
            })
        }
    }

    /// Footprint of a placed structure, looked up from its rules entry.
    pub fn placement_size(&self, placement: &Placement) -> Result<StructureSize, RulesError> {
        match placement.kind {
            StructureKind::Machine => self.machine(&placement.structure_type).map(|m| m.size),
            StructureKind::Generator => self.generator(&placement.structure_type).map(|g| g.size),
        }
    }
}

// ---------------------------------------------------------------------------
// State invariants
// ---------------------------------------------------------------------------

/// A broken state invariant.
#[derive(Debug, Clone, PartialEq)]
pub enum InvariantViolation {
    NegativeCredits(f64),
    NegativeResearchPoints(f64),
    ZeroInventoryEntry(String),
    OverlappingPlacements { a: String, b: String },
    PlacementOutsideFloor(String),
    OrphanPlacement(String),
    WorkingWithoutUnlockedRecipe(String),
    DuplicateStructureId(String),
}

/// Audit a state against the engine's invariants. An empty result means the
/// state is consistent.
pub fn check_invariants(state: &GameState, rules: &Rules) -> Vec<InvariantViolation> {
    let mut violations = Vec::new();

    if state.credits < 0.0 {
        violations.push(InvariantViolation::NegativeCredits(state.credits));
    }
    if state.research.research_points < 0.0 {
        violations.push(InvariantViolation::NegativeResearchPoints(
            state.research.research_points,
        ));
    }
    for (material, quantity) in state.inventory.iter() {
        if quantity == 0 {
            violations.push(InvariantViolation::ZeroInventoryEntry(material.to_string()));
        }
    }

    let mut ids = BTreeSet::new();
    let structure_ids = state
        .machines
        .iter()
        .map(|m| m.id.to_string())
        .chain(state.generators.iter().map(|g| g.id.to_string()));
    for id in structure_ids {
        if !ids.insert(id.clone()) {
            violations.push(InvariantViolation::DuplicateStructureId(id));
        }
    }

    let rects: Vec<(&Placement, Option<StructureSize>)> = state
        .floor_space
        .placements
        .iter()
        .map(|p| (p, rules.placement_size(p).ok()))
        .collect();
    for (i, (a, size_a)) in rects.iter().enumerate() {
        if !ids.contains(&a.id) {
            violations.push(InvariantViolation::OrphanPlacement(a.id.clone()));
        }
        let Some(size_a) = size_a else { continue };
        if !covered_by_chunks(state, a.x, a.y, *size_a) {
            violations.push(InvariantViolation::PlacementOutsideFloor(a.id.clone()));
        }
        for (b, size_b) in rects.iter().skip(i + 1) {
            let Some(size_b) = size_b else { continue };
            if overlaps(a.x, a.y, *size_a, b.x, b.y, *size_b) {
                violations.push(InvariantViolation::OverlappingPlacements {
                    a: a.id.clone(),
                    b: b.id.clone(),
                });
            }
        }
    }

    for machine in &state.machines {
        if machine.status == MachineStatus::Working {
            let unlocked = machine
                .recipe_id
                .as_ref()
                .is_some_and(|r| state.is_unlocked(r.as_str()));
            if !unlocked {
                violations.push(InvariantViolation::WorkingWithoutUnlockedRecipe(
                    machine.id.to_string(),
                ));
            }
        }
    }

    violations
}

/// Exclusive end of a span on the `i32` grid, or `None` if it leaves the grid.
fn span_end(start: i32, len: u32) -> Option<i32> {
    i32::try_from(i64::from(start) + i64::from(len)).ok()
}

fn overlaps(ax: i32, ay: i32, a: StructureSize, bx: i32, by: i32, b: StructureSize) -> bool {
    let (ax, ay, bx, by) = (i64::from(ax), i64::from(ay), i64::from(bx), i64::from(by));
    ax < bx + i64::from(b.width)
        && bx < ax + i64::from(a.width)
        && ay < by + i64::from(b.height)
        && by < ay + i64::from(a.height)
}

fn covered_by_chunks(state: &GameState, x: i32, y: i32, size: StructureSize) -> bool {
    let (Some(x_end), Some(y_end)) = (span_end(x, size.width), span_end(y, size.height)) else {
        return false;
    };
    (y..y_end).all(|cy| {
        (x..x_end).all(|cx| {
            state
                .floor_space
                .chunks
                .iter()
                .any(|chunk| chunk.contains_cell(cx, cy))
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::{MaterialId, RecipeId};
    use crate::test_utils::{machine, place_machine, sample_rules, sample_state};

    #[test]
    fn sample_rules_are_valid() {
        sample_rules().validate().unwrap();
    }

    #[test]
    fn dangling_recipe_material_is_reported() {
        let mut rules = sample_rules();
        rules
            .recipes
            .get_mut("iron_ingot")
            .unwrap()
            .inputs
            .insert(MaterialId::new("mithril"), 1);
        let err = rules.validate().unwrap_err();
        assert!(err.to_string().contains("mithril"), "{err}");
    }

    #[test]
    fn dangling_allowed_recipe_is_reported() {
        let mut rules = sample_rules();
        rules
            .machines
            .get_mut("furnace")
            .unwrap()
            .allowed_recipes
            .push(RecipeId::new("warp_core"));
        assert!(matches!(
            rules.validate(),
            Err(RulesError::DanglingReference { kind: "recipe", .. })
        ));
    }

    #[test]
    fn weak_current_age_weight_is_rejected() {
        let mut rules = sample_rules();
        rules.research.current_age_weight = 0.5;
        rules.research.next_age_weight = 0.5;
        assert_eq!(rules.validate(), Err(RulesError::WeakCurrentAgeWeight));
    }

    #[test]
    fn fresh_state_has_no_violations() {
        let rules = sample_rules();
        let state = sample_state(&rules);
        assert!(check_invariants(&state, &rules).is_empty());
    }

    #[test]
    fn overlapping_placements_are_reported() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        place_machine(&mut state, machine("machine_1", "furnace", 0, 0));
        place_machine(&mut state, machine("machine_2", "furnace", 1, 1));
        let violations = check_invariants(&state, &rules);
        assert!(violations.iter().any(|v| matches!(
            v,
            InvariantViolation::OverlappingPlacements { .. }
        )));
    }

    #[test]
    fn working_machine_needs_unlocked_recipe() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        let mut m = machine("machine_1", "furnace", 0, 0);
        m.recipe_id = Some(RecipeId::new("copper_ingot"));
        m.status = MachineStatus::Working;
        place_machine(&mut state, m);
        let violations = check_invariants(&state, &rules);
        assert_eq!(
            violations,
            vec![InvariantViolation::WorkingWithoutUnlockedRecipe("machine_1".into())]
        );
    }

    #[test]
    fn negative_credits_are_reported() {
        let rules = sample_rules();
        let mut state = sample_state(&rules);
        state.credits = -1.0;
        assert!(check_invariants(&state, &rules).contains(&InvariantViolation::NegativeCredits(-1.0)));
    }
}
