//! TOML configuration file parsing.
use serde::de::DeserializeOwned;
use std::path::Path;

use crate::error::ConfigError;

/// Deserialize the TOML file at `path` into `T`.
///
/// A missing file deserializes from an empty document, so `T` should give
/// every field a default.
///
/// # Errors
///
/// Returns [`ConfigError::Io`] if the file exists but cannot be read and
/// [`ConfigError::InvalidSyntax`] if it is not valid TOML for `T`.
pub fn load_config<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = if path.exists() {
        std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?
    } else {
        tracing::debug!("no config at {}; using defaults", path.display());
        String::new()
    };

    toml::from_str(&content).map_err(|e| ConfigError::InvalidSyntax {
        path: path.display().to_string(),
        message: e.message().to_string(),
    })
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use std::collections::BTreeMap;

    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Sample {
        name: String,
        values: BTreeMap<String, String>,
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let sample: Sample = load_config(&dir.path().join("absent.toml")).unwrap();
        assert!(sample.name.is_empty());
        assert!(sample.values.is_empty());
    }

    #[test]
    fn reads_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("c.toml");
        std::fs::write(&path, "name = \"x\"\n[values]\na = \"1\"\n").unwrap();
        let sample: Sample = load_config(&path).unwrap();
        assert_eq!(sample.name, "x");
        assert_eq!(sample.values["a"], "1");
    }

    #[test]
    fn invalid_toml_names_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "name = [unclosed").unwrap();
        let err = load_config::<Sample>(&path).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidSyntax { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }
}
