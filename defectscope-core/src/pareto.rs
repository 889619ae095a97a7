//! Pareto ranking
//!
//! Ranks the groups of one dimension by total count and locates the
//! "vital few" prefix that reaches the cut-off share of all records.
//!
//! Global invariants enforced:
//! - Ranking is stable: equal totals keep first-seen order
//! - Cumulative percentage is non-decreasing and ends at 100 when non-empty
//! - A zero grand total never divides; the cut falls on the last index

use crate::aggregates::{DimensionalAggregates, GroupedCounts};
use serde::{Deserialize, Serialize};

/// Default vital-few cut-off (Pareto principle)
pub const DEFAULT_CUTOFF_PERCENT: f64 = 80.0;

/// One ranked group
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParetoEntry {
    pub key: String,
    pub sev2: usize,
    pub sev3: usize,
    pub total: usize,
    pub cumulative_percent: f64,
}

/// Ranked series for one dimension
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParetoSeries {
    pub entries: Vec<ParetoEntry>,
    pub grand_total: usize,
    /// 0-based index of the last vital-few entry; None for an empty series
    pub vital_few_index: Option<usize>,
    pub vital_few_count: usize,
}

impl ParetoSeries {
    pub fn keys(&self) -> Vec<&str> {
        self.entries.iter().map(|e| e.key.as_str()).collect()
    }

    /// 0-based rank of a key
    pub fn rank_of(&self, key: &str) -> Option<usize> {
        self.entries.iter().position(|e| e.key == key)
    }

    pub fn vital_few(&self) -> &[ParetoEntry] {
        &self.entries[..self.vital_few_count]
    }

    pub fn cumulative_percentages(&self) -> Vec<f64> {
        self.entries.iter().map(|e| e.cumulative_percent).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Rank a grouped-count mapping
pub fn build_pareto(counts: &GroupedCounts, cutoff_percent: f64) -> ParetoSeries {
    let mut ranked: Vec<(&String, usize, usize)> = counts
        .groups
        .iter()
        .map(|(key, c)| (key, c.sev2, c.sev3))
        .collect();
    // sort_by is stable, so ties keep first-seen order
    ranked.sort_by(|a, b| (b.1 + b.2).cmp(&(a.1 + a.2)));

    let grand_total: usize = ranked.iter().map(|(_, s2, s3)| s2 + s3).sum();

    let mut cumulative = 0usize;
    let entries: Vec<ParetoEntry> = ranked
        .into_iter()
        .map(|(key, sev2, sev3)| {
            let total = sev2 + sev3;
            cumulative += total;
            let cumulative_percent = if grand_total > 0 {
                (cumulative as f64 / grand_total as f64) * 100.0
            } else {
                0.0
            };
            ParetoEntry {
                key: key.clone(),
                sev2,
                sev3,
                total,
                cumulative_percent,
            }
        })
        .collect();

    let vital_few_index = if entries.is_empty() {
        None
    } else if grand_total == 0 {
        Some(entries.len() - 1)
    } else {
        Some(
            entries
                .iter()
                .position(|e| e.cumulative_percent >= cutoff_percent)
                .unwrap_or(entries.len() - 1),
        )
    };

    ParetoSeries {
        entries,
        grand_total,
        vital_few_count: vital_few_index.map(|i| i + 1).unwrap_or(0),
        vital_few_index,
    }
}

/// Independent Pareto series for the category, area and version dimensions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ParetoAnalysis {
    pub category: ParetoSeries,
    pub area: ParetoSeries,
    pub version: ParetoSeries,
}

pub fn compute_pareto_analysis(
    dimensions: &DimensionalAggregates,
    cutoff_percent: f64,
) -> ParetoAnalysis {
    ParetoAnalysis {
        category: build_pareto(&dimensions.category, cutoff_percent),
        area: build_pareto(&dimensions.area, cutoff_percent),
        version: build_pareto(&dimensions.version, cutoff_percent),
    }
}
