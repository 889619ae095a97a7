//! Cross-tabulated hotspot matrices
//!
//! Global invariants enforced:
//! - Axis truncation ranks by frequency over the whole filtered set, not by
//!   paired counts, so a frequent row/column pair can still hold 0
//! - Absent combinations are 0, never missing
//! - Frequency ties keep first-seen order

use crate::aggregates::Dimension;
use crate::record::DefectRecord;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default axis size for the category x area and category x version matrices
pub const DEFAULT_TOP_N: usize = 12;

/// A single matrix cell
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MatrixCell {
    pub row: String,
    pub column: String,
    pub count: usize,
}

/// Dense 2D count grid with ordered row and column labels
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Matrix {
    pub rows: Vec<String>,
    pub columns: Vec<String>,
    /// `cells[row][column]`
    pub cells: Vec<Vec<usize>>,
}

impl Matrix {
    pub fn get(&self, row: &str, column: &str) -> usize {
        let r = self.rows.iter().position(|x| x == row);
        let c = self.columns.iter().position(|x| x == column);
        match (r, c) {
            (Some(r), Some(c)) => self.cells[r][c],
            _ => 0,
        }
    }

    pub fn total(&self) -> usize {
        self.cells.iter().flatten().sum()
    }

    /// Highest-concentration cell; the first one in row-major order wins ties
    pub fn max_cell(&self) -> Option<MatrixCell> {
        let mut best: Option<MatrixCell> = None;
        for (r, row) in self.rows.iter().enumerate() {
            for (c, column) in self.columns.iter().enumerate() {
                let count = self.cells[r][c];
                if best.as_ref().map_or(true, |b| count > b.count) {
                    best = Some(MatrixCell {
                        row: row.clone(),
                        column: column.clone(),
                        count,
                    });
                }
            }
        }
        best
    }
}

/// Labels of one dimension ranked by frequency, optionally truncated to `k`
pub fn top_k_by_frequency(
    records: &[DefectRecord],
    dimension: Dimension,
    k: Option<usize>,
) -> Vec<String> {
    let mut frequency: IndexMap<&str, usize> = IndexMap::new();
    for record in records {
        *frequency.entry(dimension.key(record)).or_insert(0) += 1;
    }

    let mut ranked: Vec<(&str, usize)> = frequency.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    if let Some(k) = k {
        ranked.truncate(k);
    }
    ranked.into_iter().map(|(label, _)| label.to_string()).collect()
}

/// Count co-occurrences of two dimensions over the given label universes
///
/// Records whose row or column label falls outside the universes are not counted.
pub fn cross_tabulate(
    records: &[DefectRecord],
    row_dimension: Dimension,
    column_dimension: Dimension,
    rows: Vec<String>,
    columns: Vec<String>,
) -> Matrix {
    let mut pairs: HashMap<(&str, &str), usize> = HashMap::new();
    for record in records {
        *pairs
            .entry((row_dimension.key(record), column_dimension.key(record)))
            .or_insert(0) += 1;
    }

    let cells = rows
        .iter()
        .map(|row| {
            columns
                .iter()
                .map(|column| {
                    pairs
                        .get(&(row.as_str(), column.as_str()))
                        .copied()
                        .unwrap_or(0)
                })
                .collect()
        })
        .collect();

    Matrix {
        rows,
        columns,
        cells,
    }
}

/// Matrix over the top-`top_n` labels of each dimension
pub fn build_truncated_matrix(
    records: &[DefectRecord],
    row_dimension: Dimension,
    column_dimension: Dimension,
    top_n: usize,
) -> Matrix {
    let rows = top_k_by_frequency(records, row_dimension, Some(top_n));
    let columns = top_k_by_frequency(records, column_dimension, Some(top_n));
    cross_tabulate(records, row_dimension, column_dimension, rows, columns)
}

/// All hotspot matrices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Heatmaps {
    pub category_area: Matrix,
    pub category_version: Matrix,
    /// Full SDLC-phase x test-phase square; small closed vocabularies, never truncated
    pub sdlc_test: Matrix,
    pub sdlc_test_hotspot: Option<MatrixCell>,
}

pub fn build_heatmaps(records: &[DefectRecord], top_n: usize) -> Heatmaps {
    let category_area =
        build_truncated_matrix(records, Dimension::Category, Dimension::Area, top_n);
    let category_version =
        build_truncated_matrix(records, Dimension::Category, Dimension::Version, top_n);

    let sdlc_test = cross_tabulate(
        records,
        Dimension::SdlcPhase,
        Dimension::TestPhase,
        top_k_by_frequency(records, Dimension::SdlcPhase, None),
        top_k_by_frequency(records, Dimension::TestPhase, None),
    );
    let sdlc_test_hotspot = sdlc_test.max_cell();

    Heatmaps {
        category_area,
        category_version,
        sdlc_test,
        sdlc_test_hotspot,
    }
}
