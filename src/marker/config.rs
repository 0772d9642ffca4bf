//! Marker configuration
//!
//! Read from the JSON file the hosting platform drops next to the
//! submission. Keys use the platform's camelCase spelling:
//!
//! ```json
//! { "functions": { "fact": true }, "lang": "en", "resultFile": "result.txt" }
//! ```

use super::messages::Locale;
use crate::error::{Error, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings of one marking run
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MarkerConfig {
    /// Functions the learner must define, with optional metadata
    pub functions: BTreeMap<String, serde_json::Value>,
    /// Report language
    pub lang: Locale,
    /// Also journal internal traces and expectation numbers
    pub verbose: bool,
    /// Where the result record is written
    pub result_file: Option<PathBuf>,
    /// Skip checking that required functions exist
    pub dont_check_functions: bool,
    /// Expectation count announced by the exercise, reported verbatim
    pub total_expectations_count: u64,
}

impl MarkerConfig {
    /// Parse a configuration document
    pub fn from_json(text: &str) -> Result<Self> {
        serde_json::from_str(text).map_err(|e| Error::ConfigError(e.to_string()))
    }

    /// Load a configuration file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|e| {
            Error::ConfigError(format!("cannot read '{}': {}", path.display(), e))
        })?;
        Self::from_json(&text)
    }

    /// Names of the required functions, sorted
    pub fn function_names(&self) -> Vec<String> {
        self.functions.keys().cloned().collect()
    }

    /// The result file, which every run needs
    pub fn result_file(&self) -> Result<&Path> {
        self.result_file
            .as_deref()
            .ok_or_else(|| Error::ConfigError("missing resultFile".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_platform_keys() {
        let config = MarkerConfig::from_json(
            r#"{
                "functions": { "fact": true, "fibo": { "arity": 1 } },
                "lang": "en",
                "verbose": true,
                "resultFile": "/tmp/result.txt",
                "dontCheckFunctions": true,
                "totalExpectationsCount": 12
            }"#,
        )
        .unwrap();
        assert_eq!(config.function_names(), ["fact", "fibo"]);
        assert_eq!(config.lang, Locale::En);
        assert!(config.verbose);
        assert!(config.dont_check_functions);
        assert_eq!(config.total_expectations_count, 12);
        assert_eq!(config.result_file().unwrap(), Path::new("/tmp/result.txt"));
    }

    #[test]
    fn test_defaults() {
        let config = MarkerConfig::from_json("{}").unwrap();
        assert_eq!(config.lang, Locale::Fr);
        assert!(config.functions.is_empty());
        assert!(!config.verbose);
        assert!(config.result_file().is_err());
    }

    #[test]
    fn test_unknown_lang_falls_back() {
        let config = MarkerConfig::from_json(r#"{ "lang": "klingon" }"#).unwrap();
        assert_eq!(config.lang, Locale::Fr);
    }

    #[test]
    fn test_invalid_json_is_config_error() {
        let err = MarkerConfig::from_json("{ nope").unwrap_err();
        assert!(matches!(err, Error::ConfigError(_)));
    }
}
