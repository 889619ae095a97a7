//! Configuration file support for DefectScope
//!
//! Loads analysis settings from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.defectscoperc.json` next to the input file
//! 3. `defectscope.config.json` next to the input file
//!
//! All fields are optional. CLI flags take precedence over config file values.

use crate::forecast::{ForecastSettings, DEFAULT_CLOSED_STATES, DEFAULT_RELIABLE_FROM_YEAR};
use crate::heatmap::DEFAULT_TOP_N;
use crate::pareto::DEFAULT_CUTOFF_PERCENT;
use crate::risk::RiskThresholds;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_HIGH_RISK_THRESHOLD: f64 = 70.0;
pub const DEFAULT_TOP_ROOT_CAUSES: usize = 5;

const RC_FILE: &str = ".defectscoperc.json";
const CONFIG_FILE: &str = "defectscope.config.json";

/// DefectScope configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DefectScopeConfig {
    /// First calendar year treated as reliable forecast data (default: 2022)
    #[serde(default)]
    pub forecast_from_year: Option<i32>,

    /// States that count as resolved (default: Closed, Resolved, Done, Verified)
    #[serde(default)]
    pub closed_states: Option<Vec<String>>,

    /// Axis size of the category heatmaps (default: 12)
    #[serde(default)]
    pub heatmap_top_n: Option<usize>,

    /// Risk score at or above which a defect is high risk (default: 70.0)
    #[serde(default)]
    pub high_risk_threshold: Option<f64>,

    /// Number of root causes to report (default: 5)
    #[serde(default)]
    pub top_root_causes: Option<usize>,

    /// Cumulative share that closes the Pareto vital few (default: 80.0)
    #[serde(default)]
    pub pareto_cutoff_percent: Option<f64>,
}

/// Configuration with every default applied
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ResolvedConfig {
    pub forecast_from_year: i32,
    pub closed_states: Vec<String>,
    pub heatmap_top_n: usize,
    pub high_risk_threshold: f64,
    pub top_root_causes: usize,
    pub pareto_cutoff_percent: f64,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl DefectScopeConfig {
    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        if let Some(year) = self.forecast_from_year {
            if !(1970..=9999).contains(&year) {
                anyhow::bail!("forecast_from_year must be within 1970..=9999 (got {})", year);
            }
        }

        if let Some(ref states) = self.closed_states {
            if states.is_empty() {
                anyhow::bail!("closed_states must not be empty");
            }
            if let Some(blank) = states.iter().position(|s| s.trim().is_empty()) {
                anyhow::bail!("closed_states[{}] must not be blank", blank);
            }
        }

        if let Some(n) = self.heatmap_top_n {
            if n == 0 {
                anyhow::bail!("heatmap_top_n must be at least 1 (got {})", n);
            }
        }

        for (name, value) in [
            ("high_risk_threshold", self.high_risk_threshold),
            ("pareto_cutoff_percent", self.pareto_cutoff_percent),
        ] {
            if let Some(v) = value {
                if !(v > 0.0 && v <= 100.0) {
                    anyhow::bail!("{} must be within (0, 100] (got {})", name, v);
                }
            }
        }

        Ok(())
    }

    /// Resolve config into a form ready for use
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;

        Ok(ResolvedConfig {
            forecast_from_year: self.forecast_from_year.unwrap_or(DEFAULT_RELIABLE_FROM_YEAR),
            closed_states: self.closed_states.clone().unwrap_or_else(|| {
                DEFAULT_CLOSED_STATES.iter().map(|s| s.to_string()).collect()
            }),
            heatmap_top_n: self.heatmap_top_n.unwrap_or(DEFAULT_TOP_N),
            high_risk_threshold: self
                .high_risk_threshold
                .unwrap_or(DEFAULT_HIGH_RISK_THRESHOLD),
            top_root_causes: self.top_root_causes.unwrap_or(DEFAULT_TOP_ROOT_CAUSES),
            pareto_cutoff_percent: self
                .pareto_cutoff_percent
                .unwrap_or(DEFAULT_CUTOFF_PERCENT),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        DefectScopeConfig::default().resolve()
    }

    pub fn forecast_settings(&self) -> ForecastSettings {
        ForecastSettings {
            reliable_from_year: self.forecast_from_year,
            closed_states: self.closed_states.clone(),
        }
    }

    pub fn risk_thresholds(&self) -> RiskThresholds {
        RiskThresholds {
            high: self.high_risk_threshold,
        }
    }
}

/// Discover and load a config file from a directory
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(DefectScopeConfig, PathBuf)>> {
    for name in [RC_FILE, CONFIG_FILE] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<DefectScopeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: DefectScopeConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config for an input file's directory
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (DefectScopeConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}
