//! Escape-rate calculation
//!
//! Escaped defects were first observed in customer-facing environments
//! (Production, Field); caught defects in pre-release ones (Test, Development,
//! Staging/UAT, CI/CD). Unknown environments count as neither and are left
//! out of the escape-rate denominator.

use crate::record::{DefectRecord, Environment};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// Escape classification of an environment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EscapeClass {
    Escaped,
    Caught,
    Excluded,
}

pub fn escape_class(environment: Environment) -> EscapeClass {
    match environment {
        Environment::Production | Environment::Field => EscapeClass::Escaped,
        Environment::Test
        | Environment::Development
        | Environment::StagingUat
        | Environment::CiCd => EscapeClass::Caught,
        Environment::Unknown => EscapeClass::Excluded,
    }
}

/// Percentage of `part` in `whole`; 0 when `whole` is 0
pub fn percentage(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// escaped / (escaped + caught) x 100, 0 when nothing is classified
pub fn escape_rate(escaped: usize, caught: usize) -> f64 {
    percentage(escaped, escaped + caught)
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct EscapeSummary {
    pub escaped: usize,
    pub caught: usize,
    /// Unknown-environment records, outside the denominator
    pub excluded: usize,
    pub escape_rate: f64,
    /// Record count per environment label, first-seen order
    pub environments: IndexMap<String, usize>,
}

pub fn compute_escape_summary(records: &[DefectRecord]) -> EscapeSummary {
    let mut escaped = 0;
    let mut caught = 0;
    let mut excluded = 0;
    let mut environments: IndexMap<String, usize> = IndexMap::new();

    for record in records {
        *environments
            .entry(record.environment.as_str().to_string())
            .or_insert(0) += 1;
        match escape_class(record.environment) {
            EscapeClass::Escaped => escaped += 1,
            EscapeClass::Caught => caught += 1,
            EscapeClass::Excluded => excluded += 1,
        }
    }

    EscapeSummary {
        escaped,
        caught,
        excluded,
        escape_rate: escape_rate(escaped, caught),
        environments,
    }
}

/// Share of a category's records that escaped
///
/// Unlike the overall rate, the denominator is every record in the category.
pub fn category_escape_rate(records: &[&DefectRecord]) -> f64 {
    let escaped = records
        .iter()
        .filter(|r| escape_class(r.environment) == EscapeClass::Escaped)
        .count();
    percentage(escaped, records.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{defect, DefectParams};

    fn env(environment: &'static str) -> DefectRecord {
        defect(DefectParams {
            environment,
            ..DefectParams::default()
        })
    }

    #[test]
    fn test_escape_classes() {
        assert_eq!(escape_class(Environment::Production), EscapeClass::Escaped);
        assert_eq!(escape_class(Environment::Field), EscapeClass::Escaped);
        assert_eq!(escape_class(Environment::Test), EscapeClass::Caught);
        assert_eq!(escape_class(Environment::Development), EscapeClass::Caught);
        assert_eq!(escape_class(Environment::StagingUat), EscapeClass::Caught);
        assert_eq!(escape_class(Environment::CiCd), EscapeClass::Caught);
        assert_eq!(escape_class(Environment::Unknown), EscapeClass::Excluded);
    }

    #[test]
    fn test_two_escaped_one_caught() {
        let summary =
            compute_escape_summary(&[env("Production"), env("Production"), env("Test")]);
        assert_eq!(summary.escaped, 2);
        assert_eq!(summary.caught, 1);
        assert!((summary.escape_rate - 66.666_666).abs() < 1e-3);
    }

    #[test]
    fn test_unknown_is_outside_denominator() {
        let summary = compute_escape_summary(&[env("Field"), env("Development"), env("Lab")]);
        assert_eq!(summary.excluded, 1);
        assert_eq!(summary.escape_rate, 50.0);
        assert_eq!(summary.environments.get("Unknown"), Some(&1));
    }

    #[test]
    fn test_zero_denominator_is_zero() {
        assert_eq!(escape_rate(0, 0), 0.0);
        let summary = compute_escape_summary(&[env("Unknown")]);
        assert_eq!(summary.escape_rate, 0.0);
        assert_eq!(compute_escape_summary(&[]).escape_rate, 0.0);
    }

    #[test]
    fn test_category_escape_rate_counts_all_records() {
        let records = [env("Production"), env("Unknown"), env("Test"), env("Field")];
        let refs: Vec<&DefectRecord> = records.iter().collect();
        assert_eq!(category_escape_rate(&refs), 50.0);
        assert_eq!(category_escape_rate(&[]), 0.0);
    }
}
