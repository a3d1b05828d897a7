use serde::{Deserialize, Serialize};
use tracing::info;

use common::MaType;

/// Defaults applied when an analysis request leaves parameters out.
///
/// Example `config/analysis.toml`:
/// ```toml
/// periods = [5, 10, 20, 50, 200]
/// ma_type = "SMA"
/// confirmation_days = 2
/// ```
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct AnalysisConfig {
    /// Candidate MA periods swept by the optimizer.
    #[serde(default = "default_periods")]
    pub periods: Vec<usize>,
    #[serde(default)]
    pub ma_type: MaType,
    /// Days a crossover must persist before it counts.
    #[serde(default)]
    pub confirmation_days: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            periods: default_periods(),
            ma_type: MaType::default(),
            confirmation_days: 0,
        }
    }
}

fn default_periods() -> Vec<usize> {
    vec![5, 10, 20, 25, 50, 100, 150, 200]
}

impl AnalysisConfig {
    /// Load from a TOML file. A missing file yields the defaults; an
    /// unreadable or malformed one exits the process.
    pub fn load(path: &str) -> Self {
        if !std::path::Path::new(path).exists() {
            info!(path, "No analysis config file, using defaults");
            return Self::default();
        }
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!("Failed to read analysis config at '{path}': {e}")
        });
        toml::from_str(&content).unwrap_or_else(|e| {
            panic!("Failed to parse analysis config at '{path}': {e}")
        })
    }
}
