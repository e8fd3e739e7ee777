use serde::{Deserialize, Serialize};

use crate::id::{MachineId, MaterialId};

/// Emitted once per output material each time a machine completes a recipe run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductionEvent {
    pub machine_id: MachineId,
    pub item_id: MaterialId,
    pub quantity: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serializes_with_camel_case_keys() {
        let event = ProductionEvent {
            machine_id: MachineId::new("machine_1"),
            item_id: MaterialId::new("iron_ingot"),
            quantity: 2,
        };
        let json = serde_json::to_string(&event).unwrap();
        assert_eq!(json, r#"{"machineId":"machine_1","itemId":"iron_ingot","quantity":2}"#);
    }
}
