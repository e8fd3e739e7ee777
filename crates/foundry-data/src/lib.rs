//! Loading the rules document from disk.
//!
//! A rules directory holds one `rules.ron`, `rules.json` or `rules.toml`.
//! The format is picked by extension; two files with the same base name in
//! different formats are an error rather than a silent preference.

pub mod loader;

pub use loader::{DataLoadError, Format, load_rules, load_rules_file, parse_rules};
