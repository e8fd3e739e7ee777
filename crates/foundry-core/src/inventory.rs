//! Material quantities keyed by id, for the player inventory and machine
//! buffers. Weight-based stack caps live in the rules
//! (`Rules::max_stack`); callers check them before adding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::MaterialId;

/// A typed material -> quantity dictionary.
///
/// Entries are removed when their quantity reaches zero, so an absent key and
/// a zero quantity are the same thing and a stored entry is always positive.
/// Used for the player inventory and for machine input buffers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<MaterialId, u64>",
    into = "BTreeMap<MaterialId, u64>"
)]
pub struct Inventory {
    items: BTreeMap<MaterialId, u64>,
}

impl Inventory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Quantity held of a material (0 when absent).
    pub fn quantity(&self, material: &str) -> u64 {
        self.items.get(material).copied().unwrap_or(0)
    }

    pub fn contains(&self, material: &str, quantity: u64) -> bool {
        self.quantity(material) >= quantity
    }

    /// Add units of a material. Adding zero is a no-op and never creates a key.
    pub fn add(&mut self, material: &MaterialId, quantity: u64) {
        if quantity == 0 {
            return;
        }
        *self.items.entry(material.clone()).or_insert(0) += quantity;
    }

    /// Remove up to `quantity` units. Returns the amount actually removed;
    /// the key disappears once it reaches zero.
    #[must_use = "returns the quantity actually removed, which may be less than requested"]
    pub fn remove(&mut self, material: &str, quantity: u64) -> u64 {
        let Some(held) = self.items.get_mut(material) else {
            return 0;
        };
        let removed = quantity.min(*held);
        *held -= removed;
        if *held == 0 {
            self.items.remove(material);
        }
        removed
    }

    /// Remove exactly `quantity` units, or nothing when fewer are held.
    pub fn try_remove(&mut self, material: &str, quantity: u64) -> bool {
        if !self.contains(material, quantity) {
            return false;
        }
        let _ = self.remove(material, quantity);
        true
    }

    /// Drop every unit of a material. Returns what was held.
    pub fn take_all(&mut self, material: &str) -> u64 {
        self.items.remove(material).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Iterate entries in material-id order.
    pub fn iter(&self) -> impl Iterator<Item = (&MaterialId, u64)> {
        self.items.iter().map(|(k, v)| (k, *v))
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Move every entry into `other`, leaving this inventory empty.
    pub fn drain_into(&mut self, other: &mut Inventory) {
        for (material, quantity) in std::mem::take(&mut self.items) {
            other.add(&material, quantity);
        }
    }

    /// Whether this inventory holds at least every quantity in `required`.
    pub fn satisfies(&self, required: &BTreeMap<MaterialId, u64>) -> bool {
        required.iter().all(|(m, q)| self.contains(m.as_str(), *q))
    }
}

impl FromIterator<(MaterialId, u64)> for Inventory {
    fn from_iter<T: IntoIterator<Item = (MaterialId, u64)>>(iter: T) -> Self {
        let mut inventory = Inventory::new();
        for (material, quantity) in iter {
            inventory.add(&material, quantity);
        }
        inventory
    }
}

impl From<BTreeMap<MaterialId, u64>> for Inventory {
    fn from(items: BTreeMap<MaterialId, u64>) -> Self {
        items.into_iter().collect()
    }
}

impl From<Inventory> for BTreeMap<MaterialId, u64> {
    fn from(inventory: Inventory) -> Self {
        inventory.items
    }
}
