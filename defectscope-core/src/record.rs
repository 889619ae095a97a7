//! Record normalization
//!
//! Turns raw, partially-populated defect rows into canonical [`DefectRecord`]s.
//!
//! Global invariants enforced:
//! - Only severities 2 and 3 survive normalization
//! - Every categorical field carries a non-empty label after normalization
//! - Age is never negative; absent or unparseable dates degrade to age 0
//! - The reference instant is an explicit input (no clock reads)

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

pub const DEFAULT_ID: &str = "Unknown";
pub const DEFAULT_CATEGORY: &str = "Unknown";
pub const DEFAULT_AREA: &str = "Unknown";
pub const DEFAULT_VERSION: &str = "Unknown";
pub const DEFAULT_STATE: &str = "Unknown";
pub const DEFAULT_SDLC_PHASE: &str = "Implementation";
pub const DEFAULT_TEST_PHASE: &str = "System Test";
pub const DEFAULT_DEFECT_ORIGIN: &str = "Code";

/// Area paths are hierarchical, segments separated by a backslash
const AREA_SEPARATOR: char = '\\';

/// Raw defect row as exported by the tracker
///
/// Every field is optional and loosely typed; [`normalize`] resolves defaults.
/// Keys not listed here are ignored on deserialization.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawDefect {
    #[serde(rename = "Bug ID", default)]
    pub id: Option<Value>,
    #[serde(rename = "Bug Title", default)]
    pub title: Option<Value>,
    #[serde(rename = "Description", default)]
    pub description: Option<Value>,
    #[serde(rename = "Bug Severity", default)]
    pub severity: Option<Value>,
    #[serde(rename = "Created Date", default)]
    pub created_date: Option<Value>,
    #[serde(rename = "Environment", default)]
    pub environment: Option<Value>,
    #[serde(rename = "Category", default)]
    pub category: Option<Value>,
    #[serde(rename = "Area Path", default)]
    pub area_path: Option<Value>,
    #[serde(rename = "Found in Version", default)]
    pub version: Option<Value>,
    #[serde(rename = "State", default)]
    pub state: Option<Value>,
    #[serde(rename = "SDLC_Phase", default)]
    pub sdlc_phase: Option<Value>,
    #[serde(rename = "Test_Phase", default)]
    pub test_phase: Option<Value>,
    #[serde(rename = "Defect_Origin", default)]
    pub defect_origin: Option<Value>,
}

/// Supported defect severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    High,   // 2
    Medium, // 3
}

impl Severity {
    /// Map a raw severity value; anything other than numeric 2 or 3 is unsupported
    pub fn from_value(value: &Value) -> Option<Self> {
        match value.as_f64() {
            Some(v) if v == 2.0 => Some(Severity::High),
            Some(v) if v == 3.0 => Some(Severity::Medium),
            _ => None,
        }
    }

    /// Numeric tracker level (2 or 3)
    pub fn level(&self) -> u8 {
        match self {
            Severity::High => 2,
            Severity::Medium => 3,
        }
    }
}

/// Environment in which the defect was first observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Environment {
    Production,
    Field,
    Test,
    Development,
    #[serde(rename = "Staging/UAT")]
    StagingUat,
    #[serde(rename = "CI/CD")]
    CiCd,
    Unknown,
}

impl Environment {
    /// Map a free-form environment label (case-insensitive)
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "production" => Environment::Production,
            "field" => Environment::Field,
            "test" => Environment::Test,
            "development" => Environment::Development,
            "staging/uat" | "staging" | "uat" => Environment::StagingUat,
            "ci/cd" | "ci/cd pipeline" => Environment::CiCd,
            _ => Environment::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Production => "Production",
            Environment::Field => "Field",
            Environment::Test => "Test",
            Environment::Development => "Development",
            Environment::StagingUat => "Staging/UAT",
            Environment::CiCd => "CI/CD",
            Environment::Unknown => "Unknown",
        }
    }

    /// Customer-facing environments
    pub fn is_customer_facing(&self) -> bool {
        matches!(self, Environment::Production | Environment::Field)
    }
}

/// Fixed age ranges, inclusive upper bounds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum AgingBucket {
    #[serde(rename = "0-30 days")]
    UpTo30,
    #[serde(rename = "31-90 days")]
    UpTo90,
    #[serde(rename = "91-180 days")]
    UpTo180,
    #[serde(rename = "181-365 days")]
    UpTo365,
    #[serde(rename = "> 1 year")]
    OverOneYear,
}

impl AgingBucket {
    /// All buckets, youngest first
    pub const ALL: [AgingBucket; 5] = [
        AgingBucket::UpTo30,
        AgingBucket::UpTo90,
        AgingBucket::UpTo180,
        AgingBucket::UpTo365,
        AgingBucket::OverOneYear,
    ];

    pub fn from_age_days(age_days: u32) -> Self {
        if age_days <= 30 {
            AgingBucket::UpTo30
        } else if age_days <= 90 {
            AgingBucket::UpTo90
        } else if age_days <= 180 {
            AgingBucket::UpTo180
        } else if age_days <= 365 {
            AgingBucket::UpTo365
        } else {
            AgingBucket::OverOneYear
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AgingBucket::UpTo30 => "0-30 days",
            AgingBucket::UpTo90 => "31-90 days",
            AgingBucket::UpTo180 => "91-180 days",
            AgingBucket::UpTo365 => "181-365 days",
            AgingBucket::OverOneYear => "> 1 year",
        }
    }
}

/// Canonical defect record; never mutated once built
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DefectRecord {
    pub id: String,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    /// Wall-clock creation instant, None when absent or unparseable
    pub created: Option<NaiveDateTime>,
    /// Date prefix of the raw created field (`YYYY-MM-DD`), for display
    pub created_date: String,
    pub age_days: u32,
    pub aging_bucket: AgingBucket,
    pub environment: Environment,
    pub category: String,
    /// Full hierarchical area path as exported
    pub area_path: String,
    /// Leaf segment of the area path; used for every area grouping
    pub area: String,
    pub version: String,
    pub state: String,
    pub sdlc_phase: String,
    pub test_phase: String,
    pub defect_origin: String,
}

impl DefectRecord {
    /// Check whether the record's state is one of the given closed states
    pub fn is_closed(&self, closed_states: &[String]) -> bool {
        closed_states.iter().any(|s| s == &self.state)
    }
}

/// Normalize one raw row against the reference instant `now`
///
/// Returns `None` for unsupported or missing severities.
pub fn normalize(raw: &RawDefect, now: NaiveDateTime) -> Option<DefectRecord> {
    let severity = raw.severity.as_ref().and_then(Severity::from_value)?;

    let id = label(raw.id.as_ref(), DEFAULT_ID);
    let raw_created = raw.created_date.as_ref().and_then(Value::as_str).unwrap_or("");
    let created = if raw_created.is_empty() {
        debug!(id = %id, "missing created date, age defaults to 0");
        None
    } else {
        let parsed = parse_created_date(raw_created);
        if parsed.is_none() {
            warn!(id = %id, created = raw_created, "unparseable created date, age defaults to 0");
        }
        parsed
    };

    let age_days = created.map(|c| age_in_days(c, now)).unwrap_or(0);
    let area_path = label(raw.area_path.as_ref(), DEFAULT_AREA);

    Some(DefectRecord {
        title: label(raw.title.as_ref(), ""),
        description: label(raw.description.as_ref(), ""),
        severity,
        created,
        created_date: raw_created.chars().take(10).collect(),
        age_days,
        aging_bucket: AgingBucket::from_age_days(age_days),
        environment: raw
            .environment
            .as_ref()
            .and_then(Value::as_str)
            .map(Environment::parse)
            .unwrap_or(Environment::Unknown),
        category: label(raw.category.as_ref(), DEFAULT_CATEGORY),
        area: area_leaf(&area_path),
        area_path,
        version: label(raw.version.as_ref(), DEFAULT_VERSION),
        state: label(raw.state.as_ref(), DEFAULT_STATE),
        sdlc_phase: label(raw.sdlc_phase.as_ref(), DEFAULT_SDLC_PHASE),
        test_phase: label(raw.test_phase.as_ref(), DEFAULT_TEST_PHASE),
        defect_origin: label(raw.defect_origin.as_ref(), DEFAULT_DEFECT_ORIGIN),
        id,
    })
}

/// Normalize a batch, preserving input order and dropping unsupported severities
pub fn normalize_all(raws: &[RawDefect], now: NaiveDateTime) -> Vec<DefectRecord> {
    raws.par_iter()
        .filter_map(|raw| normalize(raw, now))
        .collect()
}

/// Parse a created timestamp
///
/// Accepts RFC 3339 (offset kept as wall-clock time), naive ISO date-times
/// with `T` or space separator, and bare `YYYY-MM-DD` dates.
pub fn parse_created_date(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Whole days between `created` and `now`, clamped at zero
pub fn age_in_days(created: NaiveDateTime, now: NaiveDateTime) -> u32 {
    let days = (now - created).num_days();
    u32::try_from(days.max(0)).unwrap_or(u32::MAX)
}

/// Reduce a hierarchical area path to its leaf label
pub fn area_leaf(area_path: &str) -> String {
    match area_path.rsplit(AREA_SEPARATOR).next() {
        Some(leaf) if !leaf.is_empty() => leaf.to_string(),
        _ => DEFAULT_AREA.to_string(),
    }
}

/// Coerce a loosely typed value into a label, falling back to `default`
fn label(value: Option<&Value>, default: &str) -> String {
    match value {
        Some(Value::String(s)) if !s.is_empty() => s.clone(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => default.to_string(),
    }
}
