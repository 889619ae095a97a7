//! Short-horizon defect forecasting
//!
//! Derives monthly inflow, resolution rate, backlog burndown, a six-month
//! backlog projection and a quarterly new-defect forecast from the record
//! set, each point estimate paired with an explicit interval, plus a
//! composite reliability score for the whole forecast.
//!
//! The confidence margin is 1.5 standard deviations of monthly inflow, an
//! approximate ~87% band under a normality assumption. It is a documented
//! heuristic, not a rigorous statistical bound.
//!
//! Global invariants enforced:
//! - No clock reads; "today" is an input
//! - No division by zero; empty inputs yield defined fallbacks
//! - Every forecast number carries its interval

use crate::escape::percentage;
use crate::record::{DefectRecord, Severity};
use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Records created before this year are outside the reliable-data window
pub const DEFAULT_RELIABLE_FROM_YEAR: i32 = 2022;

pub const DEFAULT_CLOSED_STATES: [&str; 4] = ["Closed", "Resolved", "Done", "Verified"];

/// Resolution rate assumed as a share of inflow when nothing is closed
const FALLBACK_RESOLUTION_RATIO: f64 = 0.8;

/// Month count used as the resolution divisor when no month is observed
const FALLBACK_DATA_MONTHS: usize = 12;

/// Below this many months the standard deviation is assumed, not measured
const MIN_MONTHS_FOR_VARIANCE: usize = 3;

/// Assumed standard deviation as a share of the mean in low-data mode
const LOW_DATA_STD_RATIO: f64 = 0.3;

const CONFIDENCE_MULTIPLIER: f64 = 1.5;
const PROJECTION_MONTHS: u32 = 6;
const PROJECTION_MARGIN_SCALE: f64 = 0.5;
const QUARTER_MONTHS: f64 = 3.0;

const COVERAGE_POINTS: f64 = 30.0;
const COVERAGE_FULL_MONTHS: f64 = 24.0;
const VOLATILITY_POINTS: f64 = 30.0;
const SAMPLE_POINTS: f64 = 20.0;
const SAMPLE_FULL_RECORDS: f64 = 100.0;
const RESOLUTION_DATA_POINTS: f64 = 20.0;

/// Settings for the forecasting stage
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSettings {
    pub reliable_from_year: i32,
    pub closed_states: Vec<String>,
}

impl Default for ForecastSettings {
    fn default() -> Self {
        ForecastSettings {
            reliable_from_year: DEFAULT_RELIABLE_FROM_YEAR,
            closed_states: DEFAULT_CLOSED_STATES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonthCount {
    /// `YYYY-MM`
    pub month: String,
    pub count: usize,
}

/// New defects per calendar month within the reliable-data window
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MonthlyInflow {
    /// Observed months, chronological
    pub months: Vec<MonthCount>,
    pub total: usize,
    /// total / observed months; 0 when no month is observed
    pub average: f64,
}

impl MonthlyInflow {
    pub fn counts(&self) -> Vec<usize> {
        self.months.iter().map(|m| m.count).collect()
    }
}

pub fn monthly_inflow(records: &[DefectRecord], reliable_from_year: i32) -> MonthlyInflow {
    let mut by_month: BTreeMap<(i32, u32), usize> = BTreeMap::new();
    for created in records.iter().filter_map(|r| r.created) {
        if created.year() >= reliable_from_year {
            *by_month.entry((created.year(), created.month())).or_insert(0) += 1;
        }
    }

    let months: Vec<MonthCount> = by_month
        .into_iter()
        .map(|((year, month), count)| MonthCount {
            month: format!("{:04}-{:02}", year, month),
            count,
        })
        .collect();
    let total: usize = months.iter().map(|m| m.count).sum();
    let average = if months.is_empty() {
        0.0
    } else {
        total as f64 / months.len() as f64
    };

    MonthlyInflow {
        months,
        total,
        average,
    }
}

/// Open/closed split of the backlog
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct BacklogSummary {
    pub open: usize,
    pub closed: usize,
    pub open_sev2: usize,
    pub open_sev2_older_than_90_days: usize,
}

impl BacklogSummary {
    pub fn open_percent(&self) -> f64 {
        percentage(self.open, self.open + self.closed)
    }
}

pub fn summarize_backlog(records: &[DefectRecord], closed_states: &[String]) -> BacklogSummary {
    let mut summary = BacklogSummary {
        open: 0,
        closed: 0,
        open_sev2: 0,
        open_sev2_older_than_90_days: 0,
    };
    for record in records {
        if record.is_closed(closed_states) {
            summary.closed += 1;
            continue;
        }
        summary.open += 1;
        if record.severity == Severity::High {
            summary.open_sev2 += 1;
            if record.age_days > 90 {
                summary.open_sev2_older_than_90_days += 1;
            }
        }
    }
    summary
}

/// Defects resolved per month
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ResolutionEstimate {
    pub closed: usize,
    /// Divisor used for the rate
    pub data_months: usize,
    pub rate: f64,
    /// True when no record is closed and the rate is 80% of inflow
    pub estimated: bool,
}

pub fn estimate_resolution(closed: usize, inflow: &MonthlyInflow) -> ResolutionEstimate {
    let data_months = if inflow.months.is_empty() {
        FALLBACK_DATA_MONTHS
    } else {
        inflow.months.len()
    };

    if closed > 0 {
        ResolutionEstimate {
            closed,
            data_months,
            rate: closed as f64 / data_months as f64,
            estimated: false,
        }
    } else {
        ResolutionEstimate {
            closed,
            data_months,
            rate: inflow.average * FALLBACK_RESOLUTION_RATIO,
            estimated: true,
        }
    }
}

/// Backlog direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BurndownStatus {
    Decreasing,
    Increasing,
    Stable,
}

impl BurndownStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            BurndownStatus::Decreasing => "decreasing",
            BurndownStatus::Increasing => "increasing",
            BurndownStatus::Stable => "stable",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Burndown {
    pub open_backlog: usize,
    pub inflow_rate: f64,
    pub resolution_rate: f64,
    /// resolution - inflow; positive shrinks the backlog
    pub net_monthly_change: f64,
    pub status: BurndownStatus,
    /// Only defined while the backlog is shrinking
    pub months_to_clear: Option<f64>,
}

pub fn project_burndown(open_backlog: usize, inflow_rate: f64, resolution_rate: f64) -> Burndown {
    let net_monthly_change = resolution_rate - inflow_rate;
    let (status, months_to_clear) = if net_monthly_change > 0.0 {
        (
            BurndownStatus::Decreasing,
            Some(open_backlog as f64 / net_monthly_change),
        )
    } else if net_monthly_change < 0.0 {
        (BurndownStatus::Increasing, None)
    } else {
        (BurndownStatus::Stable, None)
    };

    Burndown {
        open_backlog,
        inflow_rate,
        resolution_rate,
        net_monthly_change,
        status,
        months_to_clear,
    }
}

/// Spread of monthly inflow
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct VarianceEstimate {
    pub std_dev: f64,
    pub variance: f64,
    /// std_dev / mean x 100; 0 when the mean is 0
    pub coefficient_of_variation: f64,
    /// True when fewer than 3 months were observed and std_dev is assumed
    pub estimated: bool,
}

pub fn estimate_variance(monthly_counts: &[usize], mean: f64) -> VarianceEstimate {
    let (std_dev, variance, estimated) = if monthly_counts.len() >= MIN_MONTHS_FOR_VARIANCE {
        let n = monthly_counts.len() as f64;
        let sample_mean = monthly_counts.iter().sum::<usize>() as f64 / n;
        let variance = monthly_counts
            .iter()
            .map(|&c| (c as f64 - sample_mean).powi(2))
            .sum::<f64>()
            / (n - 1.0);
        (variance.sqrt(), variance, false)
    } else {
        let std_dev = mean * LOW_DATA_STD_RATIO;
        (std_dev, std_dev * std_dev, true)
    };

    let coefficient_of_variation = if mean > 0.0 {
        std_dev / mean * 100.0
    } else {
        0.0
    };

    VarianceEstimate {
        std_dev,
        variance,
        coefficient_of_variation,
        estimated,
    }
}

pub fn confidence_margin(std_dev: f64) -> f64 {
    CONFIDENCE_MULTIPLIER * std_dev
}

/// Point estimate with its interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Estimate {
    pub point: f64,
    pub low: f64,
    pub high: f64,
}

/// Backlog six months out
pub fn project_backlog(burndown: &Burndown, margin: f64) -> Estimate {
    let months = f64::from(PROJECTION_MONTHS);
    let backlog = burndown.open_backlog as f64;
    let point = match burndown.status {
        BurndownStatus::Increasing => backlog + burndown.net_monthly_change.abs() * months,
        _ => (backlog - burndown.net_monthly_change * months).max(0.0),
    };
    let spread = margin * months * PROJECTION_MARGIN_SCALE;
    Estimate {
        point,
        low: (point - spread).max(0.0),
        high: point + spread,
    }
}

/// New defects expected over the next quarter
pub fn forecast_quarter(average_monthly_inflow: f64, margin: f64) -> Estimate {
    let point = average_monthly_inflow * QUARTER_MONTHS;
    let spread = margin * QUARTER_MONTHS;
    Estimate {
        point,
        low: (point - spread).max(0.0),
        high: point + spread,
    }
}

/// Share of the quarterly forecast expected to escape
pub fn forecast_escapes(quarterly: &Estimate, escape_rate: f64) -> Estimate {
    let ratio = escape_rate / 100.0;
    Estimate {
        point: quarterly.point * ratio,
        low: quarterly.low * ratio,
        high: quarterly.high * ratio,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ReliabilityLabel {
    High,
    Medium,
    Low,
}

impl ReliabilityLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 70.0 {
            ReliabilityLabel::High
        } else if score >= 50.0 {
            ReliabilityLabel::Medium
        } else {
            ReliabilityLabel::Low
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ReliabilityLabel::High => "HIGH",
            ReliabilityLabel::Medium => "MEDIUM",
            ReliabilityLabel::Low => "LOW",
        }
    }
}

/// Composite confidence in the forecast, 0-100
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Reliability {
    pub score: f64,
    pub label: ReliabilityLabel,
    /// Up to 30 points, full at 24 data months (12 assumed when none observed)
    pub data_coverage: f64,
    /// Up to 30 points, falls linearly to 0 at CV 100%
    pub volatility: f64,
    /// Up to 20 points, full at 100 records
    pub sample_size: f64,
    /// 20 points when a resolution rate is available
    pub resolution_data: f64,
}

/// `data_months` is the same divisor the resolution rate used
pub fn reliability_score(
    data_months: usize,
    coefficient_of_variation: f64,
    record_count: usize,
    resolution_rate: f64,
) -> Reliability {
    let data_coverage = COVERAGE_POINTS * (data_months as f64 / COVERAGE_FULL_MONTHS).min(1.0);
    let volatility = VOLATILITY_POINTS * (1.0 - coefficient_of_variation / 100.0).max(0.0);
    let sample_size = SAMPLE_POINTS * (record_count as f64 / SAMPLE_FULL_RECORDS).min(1.0);
    let resolution_data = if resolution_rate > 0.0 {
        RESOLUTION_DATA_POINTS
    } else {
        0.0
    };

    let score = (data_coverage + volatility + sample_size + resolution_data).clamp(0.0, 100.0);
    Reliability {
        score,
        label: ReliabilityLabel::from_score(score),
        data_coverage,
        volatility,
        sample_size,
        resolution_data,
    }
}

/// Complete forecast bundle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Forecast {
    pub reliable_from_year: i32,
    pub inflow: MonthlyInflow,
    pub backlog: BacklogSummary,
    pub resolution: ResolutionEstimate,
    pub burndown: Burndown,
    pub variance: VarianceEstimate,
    pub confidence_margin: f64,
    /// Date the backlog projection refers to
    pub horizon_end: NaiveDate,
    pub backlog_projection: Estimate,
    pub quarterly: Estimate,
    pub expected_escapes: Estimate,
    pub reliability: Reliability,
}

/// Run every forecasting step over the filtered records
pub fn compute_forecast(
    records: &[DefectRecord],
    escape_rate: f64,
    today: NaiveDate,
    settings: &ForecastSettings,
) -> Forecast {
    let inflow = monthly_inflow(records, settings.reliable_from_year);
    let backlog = summarize_backlog(records, &settings.closed_states);
    let resolution = estimate_resolution(backlog.closed, &inflow);
    let burndown = project_burndown(backlog.open, inflow.average, resolution.rate);
    let variance = estimate_variance(&inflow.counts(), inflow.average);
    let margin = confidence_margin(variance.std_dev);
    let quarterly = forecast_quarter(inflow.average, margin);

    Forecast {
        reliable_from_year: settings.reliable_from_year,
        backlog_projection: project_backlog(&burndown, margin),
        expected_escapes: forecast_escapes(&quarterly, escape_rate),
        reliability: reliability_score(
            resolution.data_months,
            variance.coefficient_of_variation,
            records.len(),
            resolution.rate,
        ),
        horizon_end: today
            .checked_add_months(Months::new(PROJECTION_MONTHS))
            .unwrap_or(today),
        inflow,
        backlog,
        resolution,
        burndown,
        variance,
        confidence_margin: margin,
        quarterly,
    }
}
