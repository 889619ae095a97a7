//! DefectScope core library - quality metrics over defect-tracker exports

// Global invariants enforced in this crate:
// - Only severities 2 and 3 enter the pipeline; the filter runs once, at normalization
// - No global mutable state; every stage returns a fresh value
// - No clocks: the reference instant is an input
// - Group and tie order is explicit (first-seen, stable sorts)
// - Risk scoring runs after the category Pareto ranking it reads
// - Identical input yields byte-for-byte identical output

pub mod aggregates;
pub mod classify;
pub mod config;
pub mod drilldown;
pub mod escape;
pub mod forecast;
pub mod health;
pub mod heatmap;
pub mod pareto;
pub mod record;
pub mod report;
pub mod risk;

#[cfg(test)]
mod test_support;

pub use classify::{Classification, Confidence, KeywordClassifier, RootCauseClassifier};
pub use config::ResolvedConfig;
pub use forecast::Forecast;
pub use record::{DefectRecord, RawDefect};
pub use report::{render_forecast_text, render_json, render_text, MetricsBundle};

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::{debug, info};

/// Parse a JSON array of raw defect rows
pub fn parse_raw_defects(json: &str) -> Result<Vec<RawDefect>> {
    serde_json::from_str(json).context("input must be a JSON array of defect objects")
}

/// Read raw defect rows from a JSON file
pub fn load_raw_defects(path: &Path) -> Result<Vec<RawDefect>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read defects file: {}", path.display()))?;
    parse_raw_defects(&content).with_context(|| format!("failed to parse {}", path.display()))
}

/// Run the full pipeline with the built-in keyword classifier
pub fn analyze(raw: &[RawDefect], as_of: NaiveDateTime, config: &ResolvedConfig) -> MetricsBundle {
    analyze_with_classifier(raw, as_of, config, &KeywordClassifier::new())
}

/// Run the full pipeline with a caller-supplied root-cause classifier
pub fn analyze_with_classifier(
    raw: &[RawDefect],
    as_of: NaiveDateTime,
    config: &ResolvedConfig,
    classifier: &dyn RootCauseClassifier,
) -> MetricsBundle {
    let records = record::normalize_all(raw, as_of);
    let dropped_records = raw.len() - records.len();
    debug!(
        records = records.len(),
        dropped = dropped_records,
        "normalized defects"
    );

    let classifications = classify::classify_all(&records, classifier);

    let dimensions = aggregates::compute_dimensional_aggregates(&records);
    let aging = aggregates::compute_aging_summary(&records);
    let escape = escape::compute_escape_summary(&records);
    debug!(
        escaped = escape.escaped,
        caught = escape.caught,
        "classified environments"
    );

    let pareto = pareto::compute_pareto_analysis(&dimensions, config.pareto_cutoff_percent);
    let heatmaps = heatmap::build_heatmaps(&records, config.heatmap_top_n);
    let risk = risk::score_records(&records, &pareto.category, &config.risk_thresholds());
    let category_health = health::compute_category_health(&records, &pareto.category);

    let forecast = forecast::compute_forecast(
        &records,
        escape.escape_rate,
        as_of.date(),
        &config.forecast_settings(),
    );

    let root_causes = aggregates::compute_root_cause_summary(
        &records,
        &classifications,
        &config.closed_states,
        config.top_root_causes,
    );
    let process = aggregates::compute_process_indicators(&dimensions);
    let drilldown = drilldown::build_drilldown(&records, &classifications);
    let filters = drilldown::build_filter_vocabulary(&records);

    info!(
        records = records.len(),
        high_risk = risk.high_risk_count(),
        escape_rate = escape.escape_rate,
        reliability = forecast.reliability.score,
        "analysis complete"
    );

    MetricsBundle {
        generator: None,
        as_of: as_of.date(),
        total_records: records.len(),
        dropped_records,
        aging,
        escape,
        dimensions,
        pareto,
        heatmaps,
        process,
        risk,
        category_health,
        root_causes,
        forecast,
        drilldown,
        filters,
    }
}

/// Run only the normalization, escape and forecasting stages
pub fn forecast_only(raw: &[RawDefect], as_of: NaiveDateTime, config: &ResolvedConfig) -> Forecast {
    let records = record::normalize_all(raw, as_of);
    let escape = escape::compute_escape_summary(&records);
    forecast::compute_forecast(
        &records,
        escape.escape_rate,
        as_of.date(),
        &config.forecast_settings(),
    )
}
