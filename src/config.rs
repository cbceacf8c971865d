use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

/// Run configuration, loaded from YAML. Every field has a compiled
/// default so a missing config file just means "run with defaults".
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory scanned for `*.csv` input files.
    pub dataset_dir: PathBuf,
    /// DuckDB database file the repaired files are loaded into.
    pub db_path: PathBuf,
    /// Explicit file-prefix → destination-table map. The prefix is the
    /// part of the file stem before the first underscore.
    pub tables: HashMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        let mut tables = HashMap::new();
        tables.insert("user".to_string(), "users".to_string());
        tables.insert("marketing".to_string(), "marketing".to_string());
        Self {
            dataset_dir: PathBuf::from("dataset"),
            db_path: PathBuf::from("adlog.duckdb"),
            tables,
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_yaml::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }

    /// Destination table for an input file. The prefix is looked up in
    /// the configured map; a prefix with no mapping falls back to its
    /// literal name, which keeps the upstream naming convention working
    /// without enumerating every future prefix.
    pub fn table_for(&self, path: &Path) -> String {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let prefix = stem.split('_').next().unwrap_or(stem);
        self.tables
            .get(prefix)
            .cloned()
            .unwrap_or_else(|| prefix.to_string())
    }
}
