//! Format detection, file discovery and validated deserialization of the
//! rules document.

use std::path::{Path, PathBuf};

use foundry_core::error::RulesError;
use foundry_core::rules::{Rules, StartingRules};

/// Everything that can go wrong between a directory path and validated rules.
#[derive(Debug, thiserror::Error)]
pub enum DataLoadError {
    #[error("no {file}.ron, {file}.toml or {file}.json in {dir}")]
    MissingRequired { file: String, dir: PathBuf },

    #[error("{file} has no recognised extension (ron, toml, json)")]
    UnsupportedFormat { file: PathBuf },

    #[error("ambiguous rules source: both {a} and {b} exist")]
    ConflictingFormats { a: PathBuf, b: PathBuf },

    #[error("{file} could not be parsed: {detail}")]
    Parse { file: PathBuf, detail: String },

    /// The document parsed but references something it does not define.
    #[error("invalid rules in {file}: {source}")]
    Invalid {
        file: PathBuf,
        #[source]
        source: RulesError,
    },

    #[error("reading rules: {0}")]
    Io(#[from] std::io::Error),
}

/// Serialization formats accepted for the rules document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Format {
    Ron,
    Toml,
    Json,
}

impl Format {
    const ALL: [Format; 3] = [Format::Ron, Format::Toml, Format::Json];

    pub fn extension(self) -> &'static str {
        match self {
            Format::Ron => "ron",
            Format::Toml => "toml",
            Format::Json => "json",
        }
    }
}

pub fn detect_format(path: &Path) -> Result<Format, DataLoadError> {
    let ext = path.extension().and_then(|e| e.to_str());
    Format::ALL
        .into_iter()
        .find(|format| ext == Some(format.extension()))
        .ok_or_else(|| DataLoadError::UnsupportedFormat {
            file: path.to_path_buf(),
        })
}

/// Locate `{stem}.ron|toml|json` in `dir`. Finding more than one is an error,
/// since there is no sensible precedence between them.
pub fn find_data_file(dir: &Path, stem: &str) -> Result<Option<PathBuf>, DataLoadError> {
    let mut present = Format::ALL
        .into_iter()
        .map(|format| dir.join(stem).with_extension(format.extension()))
        .filter(|path| path.is_file());
    let first = present.next();
    match (first, present.next()) {
        (Some(a), Some(b)) => Err(DataLoadError::ConflictingFormats { a, b }),
        (first, _) => Ok(first),
    }
}

// ===========================================================================
// Loading
// ===========================================================================

/// Parse a rules document held in memory. `origin` names it in errors.
pub fn parse_rules(content: &str, format: Format, origin: &Path) -> Result<Rules, DataLoadError> {
    let parse_error = |detail: String| DataLoadError::Parse {
        file: origin.to_path_buf(),
        detail,
    };
    let rules: Rules = match format {
        Format::Ron => ron::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        Format::Json => serde_json::from_str(content).map_err(|e| parse_error(e.to_string()))?,
        Format::Toml => toml::from_str(content).map_err(|e| parse_error(e.to_string()))?,
    };
    rules.validate().map_err(|source| DataLoadError::Invalid {
        file: origin.to_path_buf(),
        source,
    })?;
    if rules.starting == StartingRules::default() {
        tracing::warn!(file = %origin.display(), "rules define no starting conditions");
    }
    Ok(rules)
}

/// Load and validate a single rules file.
pub fn load_rules_file(path: &Path) -> Result<Rules, DataLoadError> {
    let text = std::fs::read_to_string(path)?;
    let rules = parse_rules(&text, detect_format(path)?, path)?;
    tracing::info!(
        file = %path.display(),
        materials = rules.materials.len(),
        recipes = rules.recipes.len(),
        machines = rules.machines.len(),
        generators = rules.generators.len(),
        "rules loaded"
    );
    Ok(rules)
}

/// Load and validate the `rules` document from a directory.
pub fn load_rules(dir: &Path) -> Result<Rules, DataLoadError> {
    let path = find_data_file(dir, "rules")?.ok_or_else(|| DataLoadError::MissingRequired {
        file: "rules".to_string(),
        dir: dir.to_path_buf(),
    })?;
    load_rules_file(&path)
}

// ===========================================================================
// Tests
// ===========================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use foundry_core::id::RecipeId;
    use foundry_core::test_utils::sample_rules;
    use std::fs;

    /// Scratch directory removed on drop, so a failing assert still cleans up.
    struct Scratch(PathBuf);

    impl Scratch {
        fn new(tag: &str) -> Self {
            let path = std::env::temp_dir().join(format!("foundry-rules-{tag}-{}", std::process::id()));
            if path.exists() {
                fs::remove_dir_all(&path).unwrap();
            }
            fs::create_dir_all(&path).unwrap();
            Scratch(path)
        }

        fn put(&self, name: &str, contents: &str) {
            fs::write(self.0.join(name), contents).unwrap();
        }
    }

    impl Drop for Scratch {
        fn drop(&mut self) {
            fs::remove_dir_all(&self.0).ok();
        }
    }

    #[test]
    fn detect_format_by_extension() {
        assert_eq!(detect_format(Path::new("rules.ron")).unwrap(), Format::Ron);
        assert_eq!(detect_format(Path::new("rules.toml")).unwrap(), Format::Toml);
        assert_eq!(detect_format(Path::new("rules.json")).unwrap(), Format::Json);
        for bad in ["rules.yaml", "rules", "rules.RON.bak"] {
            assert!(detect_format(Path::new(bad)).is_err(), "{bad}");
        }
    }

    #[test]
    fn loads_each_format() {
        let rules = sample_rules();
        let encoded = [
            ("json", serde_json::to_string_pretty(&rules).unwrap()),
            ("ron", ron::to_string(&rules).unwrap()),
            ("toml", toml::to_string(&rules).unwrap()),
        ];
        for (ext, text) in encoded {
            let dir = Scratch::new(ext);
            dir.put(&format!("rules.{ext}"), &text);
            assert_eq!(load_rules(&dir.0).unwrap(), rules, "format {ext}");
        }
    }

    #[test]
    fn missing_rules_file() {
        let dir = Scratch::new("missing");
        dir.put("notes.txt", "nothing here");
        let err = load_rules(&dir.0).unwrap_err();
        assert!(matches!(err, DataLoadError::MissingRequired { .. }));
        assert!(err.to_string().contains("rules.ron"));
    }

    #[test]
    fn two_formats_side_by_side_are_ambiguous() {
        let dir = Scratch::new("conflict");
        dir.put("rules.ron", "()");
        dir.put("rules.json", "{}");
        assert!(matches!(load_rules(&dir.0), Err(DataLoadError::ConflictingFormats { .. })));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let err = parse_rules("{not json", Format::Json, Path::new("bad.json")).unwrap_err();
        assert!(matches!(err, DataLoadError::Parse { .. }));
        assert!(err.to_string().contains("bad.json"));
    }

    #[test]
    fn dangling_references_fail_validation() {
        let mut rules = sample_rules();
        rules.starting.unlocked_recipes.push(RecipeId::new("warp_drive"));
        let json = serde_json::to_string(&rules).unwrap();
        let err = parse_rules(&json, Format::Json, Path::new("rules.json")).unwrap_err();
        assert!(matches!(err, DataLoadError::Invalid { .. }));
        assert!(err.to_string().contains("warp_drive"));
    }
}
