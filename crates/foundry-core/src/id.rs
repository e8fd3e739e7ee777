use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

/// Ticks are the atomic unit of simulation time.
pub type Ticks = u64;

/// Declares a string-backed identifier. Serializes as a bare string so the
/// persisted JSON keeps plain keys, and borrows as `str` so maps keyed by the
/// id can be queried with string literals.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl Borrow<str> for $name {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }
    };
}

string_id!(
    /// Identifies a material in the rules catalog (`iron_ore`, `iron_ingot`, ...).
    MaterialId
);
string_id!(
    /// Identifies a recipe in the rules catalog.
    RecipeId
);
string_id!(
    /// Identifies a machine template in the rules catalog.
    MachineTypeId
);
string_id!(
    /// Identifies a generator template in the rules catalog.
    GeneratorTypeId
);
string_id!(
    /// Identifies a deployed machine instance.
    MachineId
);
string_id!(
    /// Identifies a deployed generator instance.
    GeneratorId
);
string_id!(
    /// Identifies an unlocked extraction node.
    NodeId
);
