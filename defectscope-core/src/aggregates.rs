//! Aggregation views - grouped counts over normalized defects
//!
//! Computes derived aggregates from the filtered record set without modifying it.
//!
//! Global invariants enforced:
//! - Aggregates are strictly derived (rebuilt every run, never partially updated)
//! - Group order is first-seen order in the input stream
//! - Severity-split counts in any grouping sum to the filtered record count

use crate::classify::Classification;
use crate::record::{AgingBucket, DefectRecord, Severity};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Severity-split count for one group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct SeverityCounts {
    pub sev2: usize,
    pub sev3: usize,
}

impl SeverityCounts {
    pub fn record(&mut self, severity: Severity) {
        match severity {
            Severity::High => self.sev2 += 1,
            Severity::Medium => self.sev3 += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.sev2 + self.sev3
    }
}

/// Categorical dimension a record can be grouped by
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Dimension {
    Category,
    Area,
    Version,
    SdlcPhase,
    TestPhase,
    DefectOrigin,
}

impl Dimension {
    pub const ALL: [Dimension; 6] = [
        Dimension::Category,
        Dimension::Area,
        Dimension::Version,
        Dimension::SdlcPhase,
        Dimension::TestPhase,
        Dimension::DefectOrigin,
    ];

    /// Grouping key of a record along this dimension
    ///
    /// Area always groups by the leaf segment of the area path.
    pub fn key<'a>(&self, record: &'a DefectRecord) -> &'a str {
        match self {
            Dimension::Category => &record.category,
            Dimension::Area => &record.area,
            Dimension::Version => &record.version,
            Dimension::SdlcPhase => &record.sdlc_phase,
            Dimension::TestPhase => &record.test_phase,
            Dimension::DefectOrigin => &record.defect_origin,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Dimension::Category => "category",
            Dimension::Area => "area",
            Dimension::Version => "version",
            Dimension::SdlcPhase => "sdlc_phase",
            Dimension::TestPhase => "test_phase",
            Dimension::DefectOrigin => "defect_origin",
        }
    }
}

/// Severity-split counts keyed by group, in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupedCounts {
    pub groups: IndexMap<String, SeverityCounts>,
}

impl GroupedCounts {
    /// Group records along one dimension
    pub fn from_records(records: &[DefectRecord], dimension: Dimension) -> Self {
        let mut groups: IndexMap<String, SeverityCounts> = IndexMap::new();
        for record in records {
            groups
                .entry(dimension.key(record).to_string())
                .or_default()
                .record(record.severity);
        }
        GroupedCounts { groups }
    }

    /// Overall total per group, same order
    pub fn totals(&self) -> IndexMap<String, usize> {
        self.groups
            .iter()
            .map(|(k, c)| (k.clone(), c.total()))
            .collect()
    }

    /// Grand total across all groups
    pub fn total(&self) -> usize {
        self.groups.values().map(SeverityCounts::total).sum()
    }

    pub fn get(&self, key: &str) -> SeverityCounts {
        self.groups.get(key).copied().unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.groups.len()
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

/// Grouped counts for every categorical dimension
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DimensionalAggregates {
    pub category: GroupedCounts,
    pub area: GroupedCounts,
    pub version: GroupedCounts,
    pub sdlc_phase: GroupedCounts,
    pub test_phase: GroupedCounts,
    pub defect_origin: GroupedCounts,
}

impl DimensionalAggregates {
    pub fn get(&self, dimension: Dimension) -> &GroupedCounts {
        match dimension {
            Dimension::Category => &self.category,
            Dimension::Area => &self.area,
            Dimension::Version => &self.version,
            Dimension::SdlcPhase => &self.sdlc_phase,
            Dimension::TestPhase => &self.test_phase,
            Dimension::DefectOrigin => &self.defect_origin,
        }
    }
}

/// Compute grouped counts for all dimensions
pub fn compute_dimensional_aggregates(records: &[DefectRecord]) -> DimensionalAggregates {
    DimensionalAggregates {
        category: GroupedCounts::from_records(records, Dimension::Category),
        area: GroupedCounts::from_records(records, Dimension::Area),
        version: GroupedCounts::from_records(records, Dimension::Version),
        sdlc_phase: GroupedCounts::from_records(records, Dimension::SdlcPhase),
        test_phase: GroupedCounts::from_records(records, Dimension::TestPhase),
        defect_origin: GroupedCounts::from_records(records, Dimension::DefectOrigin),
    }
}

/// Severity split for one aging bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgingBucketCount {
    pub bucket: AgingBucket,
    pub counts: SeverityCounts,
}

/// Aging bucket x severity counts plus staleness indicators
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct AgingSummary {
    /// One entry per bucket, youngest first; empty buckets included
    pub buckets: Vec<AgingBucketCount>,
    pub average_age_days: f64,
    pub older_than_180_days: usize,
    /// Severity 2 and older than 180 days
    pub critical_older_than_180_days: usize,
    pub older_than_one_year: usize,
}

impl AgingSummary {
    pub fn counts(&self, bucket: AgingBucket) -> SeverityCounts {
        self.buckets
            .iter()
            .find(|b| b.bucket == bucket)
            .map(|b| b.counts)
            .unwrap_or_default()
    }
}

pub fn compute_aging_summary(records: &[DefectRecord]) -> AgingSummary {
    let mut buckets: Vec<AgingBucketCount> = AgingBucket::ALL
        .iter()
        .map(|&bucket| AgingBucketCount {
            bucket,
            counts: SeverityCounts::default(),
        })
        .collect();

    for record in records {
        if let Some(entry) = buckets.iter_mut().find(|b| b.bucket == record.aging_bucket) {
            entry.counts.record(record.severity);
        }
    }

    let total_age: u64 = records.iter().map(|r| u64::from(r.age_days)).sum();
    let average_age_days = if records.is_empty() {
        0.0
    } else {
        total_age as f64 / records.len() as f64
    };

    let bucket_total = |bucket: AgingBucket| {
        buckets
            .iter()
            .find(|b| b.bucket == bucket)
            .map(|b| b.counts.total())
            .unwrap_or(0)
    };
    let older_than_180_days =
        bucket_total(AgingBucket::UpTo365) + bucket_total(AgingBucket::OverOneYear);
    let older_than_one_year = bucket_total(AgingBucket::OverOneYear);
    let critical_older_than_180_days = records
        .iter()
        .filter(|r| r.severity == Severity::High && r.age_days > 180)
        .count();

    AgingSummary {
        buckets,
        average_age_days,
        older_than_180_days,
        critical_older_than_180_days,
        older_than_one_year,
    }
}

/// Impact of one root cause across the record set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RootCauseImpact {
    pub root_cause: String,
    pub count: usize,
    pub open: usize,
    pub sev2: usize,
    /// open + 2 x sev2
    pub priority: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RootCauseSummary {
    /// Ranked by count descending, ties in first-seen order
    pub top: Vec<RootCauseImpact>,
    /// Share of all records explained by the three largest causes
    pub top3_share_percent: f64,
}

/// Rank root causes by record count
///
/// `classifications` is parallel to `records`.
pub fn compute_root_cause_summary(
    records: &[DefectRecord],
    classifications: &[Classification],
    closed_states: &[String],
    limit: usize,
) -> RootCauseSummary {
    let mut causes: IndexMap<&str, RootCauseImpact> = IndexMap::new();

    for (record, classification) in records.iter().zip(classifications) {
        let impact = causes
            .entry(classification.root_cause.as_str())
            .or_insert_with(|| RootCauseImpact {
                root_cause: classification.root_cause.clone(),
                count: 0,
                open: 0,
                sev2: 0,
                priority: 0,
            });
        impact.count += 1;
        if !record.is_closed(closed_states) {
            impact.open += 1;
        }
        if record.severity == Severity::High {
            impact.sev2 += 1;
        }
    }

    let mut ranked: Vec<RootCauseImpact> = causes
        .into_values()
        .map(|mut impact| {
            impact.priority = impact.open + 2 * impact.sev2;
            impact
        })
        .collect();
    // stable: ties keep first-seen order
    ranked.sort_by(|a, b| b.count.cmp(&a.count));
    ranked.truncate(limit);

    let top3: usize = ranked.iter().take(3).map(|c| c.count).sum();
    let top3_share_percent = if records.is_empty() {
        0.0
    } else {
        top3 as f64 / records.len() as f64 * 100.0
    };

    RootCauseSummary {
        top: ranked,
        top3_share_percent,
    }
}

/// Process-improvement indicators derived from the SDLC, test-phase and
/// origin groupings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProcessIndicators {
    /// SDLC phase Design + Requirements
    pub design_stage: usize,
    pub implementation: usize,
    /// Found in System Test + Integration Test
    pub late_found: usize,
    /// Found in Unit Test
    pub early_found: usize,
    pub code_origin: usize,
    /// Origin Design + Requirements
    pub design_origin: usize,
}

pub fn compute_process_indicators(dimensions: &DimensionalAggregates) -> ProcessIndicators {
    let sdlc = |k: &str| dimensions.sdlc_phase.get(k).total();
    let test = |k: &str| dimensions.test_phase.get(k).total();
    let origin = |k: &str| dimensions.defect_origin.get(k).total();

    ProcessIndicators {
        design_stage: sdlc("Design") + sdlc("Requirements"),
        implementation: sdlc("Implementation"),
        late_found: test("System Test") + test("Integration Test"),
        early_found: test("Unit Test"),
        code_origin: origin("Code"),
        design_origin: origin("Design") + origin("Requirements"),
    }
}
