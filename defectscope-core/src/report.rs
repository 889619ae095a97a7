//! Reporting and output generation
//!
//! Global invariants enforced:
//! - Deterministic output ordering
//! - Byte-for-byte identical output across runs

use crate::aggregates::{AgingSummary, DimensionalAggregates, ProcessIndicators, RootCauseSummary};
use crate::drilldown::{DrillDownIndex, FilterVocabulary};
use crate::escape::EscapeSummary;
use crate::forecast::Forecast;
use crate::health::CategoryHealth;
use crate::heatmap::Heatmaps;
use crate::pareto::{ParetoAnalysis, ParetoSeries};
use crate::risk::{RiskAssessment, RiskSummary};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt::Write;

/// Rows shown per table in text output
const TEXT_TABLE_ROWS: usize = 10;

/// Every metric produced by one pipeline run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MetricsBundle {
    /// Build that produced the bundle, stamped by the caller
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generator: Option<String>,
    /// Reference date ages and the forecast horizon are computed from
    pub as_of: NaiveDate,
    /// Records that survived the severity filter
    pub total_records: usize,
    /// Records dropped for an unsupported or missing severity
    pub dropped_records: usize,
    pub aging: AgingSummary,
    pub escape: EscapeSummary,
    pub dimensions: DimensionalAggregates,
    pub pareto: ParetoAnalysis,
    pub heatmaps: Heatmaps,
    pub process: ProcessIndicators,
    pub risk: RiskSummary,
    pub category_health: Vec<CategoryHealth>,
    pub root_causes: RootCauseSummary,
    pub forecast: Forecast,
    pub drilldown: DrillDownIndex,
    pub filters: FilterVocabulary,
}

impl MetricsBundle {
    /// High-risk assessments, highest score first
    pub fn ranked_high_risk(&self) -> Vec<&RiskAssessment> {
        let mut ranked: Vec<&RiskAssessment> =
            self.risk.assessments.iter().filter(|a| a.high_risk).collect();
        ranked.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        ranked
    }
}

/// Render any report structure as pretty JSON
pub fn render_json<T: Serialize>(value: &T) -> String {
    serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
}

/// Render the full bundle as a text summary
pub fn render_text(bundle: &MetricsBundle) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "DefectScope report (as of {})", bundle.as_of);
    let _ = writeln!(
        out,
        "Records: {} analyzed, {} dropped (unsupported severity)",
        bundle.total_records, bundle.dropped_records
    );

    write_aging(&mut out, &bundle.aging);
    write_escape(&mut out, &bundle.escape);
    write_pareto(&mut out, "category", &bundle.pareto.category);
    write_pareto(&mut out, "area", &bundle.pareto.area);
    write_pareto(&mut out, "version", &bundle.pareto.version);
    write_risk(&mut out, bundle);
    write_health(&mut out, &bundle.category_health);
    write_root_causes(&mut out, &bundle.root_causes);
    write_process(&mut out, bundle);
    out.push('\n');
    out.push_str(&render_forecast_text(&bundle.forecast));

    out
}

fn write_aging(out: &mut String, aging: &AgingSummary) {
    let _ = writeln!(out, "\nAGING");
    let _ = writeln!(out, "{:<12} {:>6} {:>6} {:>6}", "BUCKET", "SEV2", "SEV3", "TOTAL");
    for bucket in &aging.buckets {
        let _ = writeln!(
            out,
            "{:<12} {:>6} {:>6} {:>6}",
            bucket.bucket.as_str(),
            bucket.counts.sev2,
            bucket.counts.sev3,
            bucket.counts.total()
        );
    }
    let _ = writeln!(
        out,
        "Average age: {:.1} days | >180 days: {} (sev2: {}) | >1 year: {}",
        aging.average_age_days,
        aging.older_than_180_days,
        aging.critical_older_than_180_days,
        aging.older_than_one_year
    );
}

fn write_escape(out: &mut String, escape: &EscapeSummary) {
    let _ = writeln!(out, "\nESCAPES");
    let _ = writeln!(
        out,
        "Escaped: {} | Caught: {} | Unknown environment: {} | Escape rate: {:.1}%",
        escape.escaped, escape.caught, escape.excluded, escape.escape_rate
    );
}

fn write_pareto(out: &mut String, label: &str, series: &ParetoSeries) {
    let _ = writeln!(
        out,
        "\nPARETO by {} (vital few: {} of {})",
        label,
        series.vital_few_count,
        series.entries.len()
    );
    let _ = writeln!(
        out,
        "{:<24} {:>6} {:>6} {:>6} {:>7}",
        "KEY", "SEV2", "SEV3", "TOTAL", "CUM%"
    );
    for entry in series.entries.iter().take(TEXT_TABLE_ROWS) {
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>6} {:>6} {:>7.1}",
            truncate_or_pad(&entry.key, 24),
            entry.sev2,
            entry.sev3,
            entry.total,
            entry.cumulative_percent
        );
    }
}

fn write_risk(out: &mut String, bundle: &MetricsBundle) {
    let risk = &bundle.risk;
    let _ = writeln!(
        out,
        "\nHIGH RISK (score >= {}): {} defects | average score {:.1}",
        risk.high_risk_threshold,
        risk.high_risk_count(),
        risk.average_score
    );
    let ranked = bundle.ranked_high_risk();
    if ranked.is_empty() {
        return;
    }
    let _ = writeln!(
        out,
        "{:<16} {:>6} {:>5} {:>5} {:>5} {:>5}",
        "ID", "SCORE", "AGE", "SEV", "ENV", "RANK"
    );
    for assessment in ranked.into_iter().take(TEXT_TABLE_ROWS) {
        let c = &assessment.components;
        let _ = writeln!(
            out,
            "{:<16} {:>6.1} {:>5.1} {:>5.0} {:>5.0} {:>5.0}",
            truncate_or_pad(&assessment.id, 16),
            assessment.score,
            c.age,
            c.severity,
            c.environment,
            c.category_rank
        );
    }
}

fn write_health(out: &mut String, health: &[CategoryHealth]) {
    let _ = writeln!(out, "\nCATEGORY HEALTH");
    let _ = writeln!(
        out,
        "{:<24} {:>6} {:>7} {:>8} {:>6} {:>6}",
        "CATEGORY", "COUNT", "ESC%", "AVG AGE", "SEV2%", "SCORE"
    );
    for h in health.iter().take(TEXT_TABLE_ROWS) {
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>7.1} {:>8.1} {:>6.1} {:>6.1}",
            truncate_or_pad(&h.category, 24),
            h.count,
            h.escape_rate,
            h.average_age_days,
            h.sev2_ratio * 100.0,
            h.score
        );
    }
}

fn write_root_causes(out: &mut String, causes: &RootCauseSummary) {
    let _ = writeln!(
        out,
        "\nTOP ROOT CAUSES (top 3 explain {:.1}%)",
        causes.top3_share_percent
    );
    let _ = writeln!(
        out,
        "{:<24} {:>6} {:>6} {:>6} {:>8}",
        "ROOT CAUSE", "COUNT", "OPEN", "SEV2", "PRIORITY"
    );
    for cause in &causes.top {
        let _ = writeln!(
            out,
            "{:<24} {:>6} {:>6} {:>6} {:>8}",
            truncate_or_pad(&cause.root_cause, 24),
            cause.count,
            cause.open,
            cause.sev2,
            cause.priority
        );
    }
}

fn write_process(out: &mut String, bundle: &MetricsBundle) {
    let p = &bundle.process;
    let _ = writeln!(out, "\nPROCESS");
    let _ = writeln!(
        out,
        "Design-stage: {} | Implementation: {} | Late-found: {} | Early-found: {}",
        p.design_stage, p.implementation, p.late_found, p.early_found
    );
    let _ = writeln!(
        out,
        "Code origin: {} | Design origin: {}",
        p.code_origin, p.design_origin
    );
    if let Some(ref cell) = bundle.heatmaps.sdlc_test_hotspot {
        let _ = writeln!(
            out,
            "Hotspot: {} x {} ({} defects)",
            cell.row, cell.column, cell.count
        );
    }
}

/// Render the forecast section on its own
pub fn render_forecast_text(forecast: &Forecast) -> String {
    let mut out = String::new();
    let inflow = &forecast.inflow;
    let burndown = &forecast.burndown;

    let _ = writeln!(out, "FORECAST (data from {})", forecast.reliable_from_year);
    let _ = writeln!(
        out,
        "Inflow: {:.1}/month over {} months | Resolution: {:.1}/month{}",
        inflow.average,
        inflow.months.len(),
        forecast.resolution.rate,
        if forecast.resolution.estimated {
            " (estimated)"
        } else {
            ""
        }
    );
    let _ = writeln!(
        out,
        "Backlog: {} open | {} closed | {} open sev2 ({} older than 90 days)",
        forecast.backlog.open,
        forecast.backlog.closed,
        forecast.backlog.open_sev2,
        forecast.backlog.open_sev2_older_than_90_days
    );

    let clear = match burndown.months_to_clear {
        Some(months) => format!(", clears in {:.1} months", months),
        None => String::new(),
    };
    let _ = writeln!(
        out,
        "Burndown: {} ({:+.1}/month{})",
        burndown.status.as_str(),
        burndown.net_monthly_change,
        clear
    );
    let b = &forecast.backlog_projection;
    let _ = writeln!(
        out,
        "Backlog by {}: {:.0} (range {:.0}-{:.0})",
        forecast.horizon_end, b.point, b.low, b.high
    );
    let q = &forecast.quarterly;
    let _ = writeln!(
        out,
        "Next quarter: {:.0} new defects (range {:.0}-{:.0})",
        q.point, q.low, q.high
    );
    let e = &forecast.expected_escapes;
    let _ = writeln!(
        out,
        "Expected escapes: {:.1} (range {:.1}-{:.1})",
        e.point, e.low, e.high
    );
    let r = &forecast.reliability;
    let _ = writeln!(
        out,
        "Reliability: {:.0}/100 {} (coverage {:.1}, volatility {:.1}, sample {:.1}, resolution {:.1}){}",
        r.score,
        r.label.as_str(),
        r.data_coverage,
        r.volatility,
        r.sample_size,
        r.resolution_data,
        if forecast.variance.estimated {
            " [variance assumed]"
        } else {
            ""
        }
    );

    out
}

/// Truncate or pad string to fixed width
fn truncate_or_pad(s: &str, width: usize) -> String {
    if s.chars().count() > width {
        let kept: String = s.chars().take(width.saturating_sub(3)).collect();
        format!("{}...", kept)
    } else {
        format!("{:<width$}", s, width = width)
    }
}
