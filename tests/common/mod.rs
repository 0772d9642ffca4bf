//! Shared test helpers for integration tests

use gradx::marker::{mark_sources, Locale, MarkerConfig, Outcome};
use gradx::{Runtime, Value};
use std::fs;

/// Run a script and return its completion value
#[allow(dead_code)]
pub fn run_js(code: &str) -> gradx::Result<Value> {
    let mut runtime = Runtime::new();
    runtime.eval(code)
}

/// Run a script and get the string representation of its value or error
#[allow(dead_code)]
pub fn run_js_string(code: &str) -> String {
    run_js(code)
        .map(|v| v.to_string())
        .unwrap_or_else(|e| e.exception_text())
}

/// A finished marking run
#[allow(dead_code)]
pub struct Marked {
    pub outcome: Outcome,
    /// Result record as found on disk
    pub record: String,
    _dir: tempfile::TempDir,
}

#[allow(dead_code)]
impl Marked {
    /// Journal lines of the record, without their `# ` prefix
    pub fn journal(&self) -> Vec<&str> {
        self.record
            .lines()
            .filter_map(|line| line.strip_prefix("# "))
            .collect()
    }

    /// Journal lines without the `##` traces
    pub fn report(&self) -> Vec<&str> {
        self.journal()
            .into_iter()
            .filter(|line| !line.starts_with("##"))
            .collect()
    }

    /// Value of one of the three counter lines
    pub fn counter(&self, name: &str) -> u64 {
        self.record
            .lines()
            .find_map(|line| line.strip_prefix(&format!("{}=", name)))
            .and_then(|n| n.parse().ok())
            .unwrap_or_else(|| panic!("no {} in record:\n{}", name, self.record))
    }
}

/// English configuration requiring `functions`
#[allow(dead_code)]
pub fn config(functions: &[&str]) -> MarkerConfig {
    let mut config = MarkerConfig {
        lang: Locale::En,
        ..MarkerConfig::default()
    };
    for name in functions {
        config
            .functions
            .insert(name.to_string(), serde_json::Value::Bool(true));
    }
    config
}

/// Mark `code` against `tests` with a result record in a fresh directory
#[allow(dead_code)]
pub fn mark(mut config: MarkerConfig, code: &str, tests: &str) -> Marked {
    let dir = tempfile::tempdir().unwrap();
    let sink = dir.path().join("result.txt");
    config.result_file = Some(sink.clone());
    let outcome = mark_sources(config, code, tests).unwrap();
    let record = fs::read_to_string(&sink).unwrap();
    Marked {
        outcome,
        record,
        _dir: dir,
    }
}
