//! Data source configuration.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Locations of the two sales data sources.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Source A: JSON array of sale objects
    #[serde(default = "default_source_a_path")]
    pub source_a_path: PathBuf,
    /// Source B: CSV with header row
    #[serde(default = "default_source_b_path")]
    pub source_b_path: PathBuf,
    /// Read timeout per source in seconds
    #[serde(default = "default_read_timeout_secs")]
    pub read_timeout_secs: u64,
}

fn default_source_a_path() -> PathBuf {
    PathBuf::from("data/source_a.json")
}

fn default_source_b_path() -> PathBuf {
    PathBuf::from("data/source_b.csv")
}

fn default_read_timeout_secs() -> u64 {
    10
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            source_a_path: default_source_a_path(),
            source_b_path: default_source_b_path(),
            read_timeout_secs: default_read_timeout_secs(),
        }
    }
}

impl SourcesConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }
}
