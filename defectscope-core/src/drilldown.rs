//! Drill-down index from group keys to the records behind them
//!
//! Built once per run so the presentation layer can list the defects behind
//! any Pareto bar or heatmap cell without re-filtering the record set.

use crate::aggregates::Dimension;
use crate::classify::{Classification, Confidence};
use crate::heatmap::top_k_by_frequency;
use crate::record::DefectRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const TITLE_PREVIEW_CHARS: usize = 80;
pub const AREA_FILTER_SIZE: usize = 20;
pub const VERSION_FILTER_SIZE: usize = 15;

/// Compact view of one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RecordSummary {
    pub id: String,
    pub title: String,
    pub severity: u8,
    pub state: String,
    pub root_cause: String,
    pub confidence: Confidence,
    pub area_path: String,
    pub sdlc_phase: String,
    pub test_phase: String,
    /// `YYYY-MM-DD`, empty when the record had no usable date
    pub created_date: String,
}

impl RecordSummary {
    pub fn new(record: &DefectRecord, classification: &Classification) -> Self {
        RecordSummary {
            id: record.id.clone(),
            title: truncate_chars(&record.title, TITLE_PREVIEW_CHARS),
            severity: record.severity.level(),
            state: record.state.clone(),
            root_cause: classification.root_cause.clone(),
            confidence: classification.confidence,
            area_path: record.area_path.clone(),
            sdlc_phase: record.sdlc_phase.clone(),
            test_phase: record.test_phase.clone(),
            created_date: record.created_date.clone(),
        }
    }
}

fn truncate_chars(s: &str, max: usize) -> String {
    match s.char_indices().nth(max) {
        Some((idx, _)) => s[..idx].to_string(),
        None => s.to_string(),
    }
}

/// Key of a matrix cell in the drill-down index
pub fn cell_key(row: &str, column: &str) -> String {
    format!("{}|{}", row, column)
}

pub type DrillDownMap = IndexMap<String, Vec<RecordSummary>>;

/// Record summaries per group key, keys in first-seen order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DrillDownIndex {
    pub by_category: DrillDownMap,
    pub by_area: DrillDownMap,
    pub by_version: DrillDownMap,
    /// Keyed by `category|area`
    pub category_area: DrillDownMap,
    /// Keyed by `category|version`
    pub category_version: DrillDownMap,
    /// Keyed by `sdlc_phase|test_phase`
    pub sdlc_test: DrillDownMap,
}

impl DrillDownIndex {
    pub fn group(&self, dimension: Dimension, key: &str) -> &[RecordSummary] {
        let map = match dimension {
            Dimension::Category => &self.by_category,
            Dimension::Area => &self.by_area,
            Dimension::Version => &self.by_version,
            _ => return &[],
        };
        map.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn category_area_cell(&self, category: &str, area: &str) -> &[RecordSummary] {
        self.category_area
            .get(&cell_key(category, area))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

/// Build the index; `classifications` is parallel to `records`
pub fn build_drilldown(
    records: &[DefectRecord],
    classifications: &[Classification],
) -> DrillDownIndex {
    let mut index = DrillDownIndex::default();

    for (record, classification) in records.iter().zip(classifications) {
        let summary = RecordSummary::new(record, classification);
        let push = |map: &mut DrillDownMap, key: String| {
            map.entry(key).or_default().push(summary.clone());
        };

        push(&mut index.by_category, record.category.clone());
        push(&mut index.by_area, record.area.clone());
        push(&mut index.by_version, record.version.clone());
        push(
            &mut index.category_area,
            cell_key(&record.category, &record.area),
        );
        push(
            &mut index.category_version,
            cell_key(&record.category, &record.version),
        );
        push(
            &mut index.sdlc_test,
            cell_key(&record.sdlc_phase, &record.test_phase),
        );
    }

    index
}

/// Option lists for the presentation layer's filters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct FilterVocabulary {
    /// Most frequent areas
    pub areas: Vec<String>,
    /// Lowest distinct versions in sorted order
    pub versions: Vec<String>,
}

pub fn build_filter_vocabulary(records: &[DefectRecord]) -> FilterVocabulary {
    let mut versions: Vec<String> = records.iter().map(|r| r.version.clone()).collect();
    versions.sort();
    versions.dedup();
    versions.truncate(VERSION_FILTER_SIZE);

    FilterVocabulary {
        areas: top_k_by_frequency(records, Dimension::Area, Some(AREA_FILTER_SIZE)),
        versions,
    }
}
