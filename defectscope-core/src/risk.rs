//! Per-defect risk score calculation
//!
//! Global invariants enforced:
//! - Deterministic risk calculations
//! - Each component is clamped to its cap before summing
//! - Final score lies in [0, 100]
//! - Category rank comes from the category Pareto series, so scoring runs after ranking

use crate::pareto::ParetoSeries;
use crate::record::{DefectRecord, Environment, Severity};
use serde::{Deserialize, Serialize};

pub const MAX_RISK_SCORE: f64 = 100.0;
pub const AGE_CAP: f64 = 30.0;
pub const DAYS_PER_AGE_POINT: f64 = 12.0;
pub const SEVERITY_HIGH_POINTS: f64 = 30.0;
pub const SEVERITY_MEDIUM_POINTS: f64 = 15.0;
pub const CUSTOMER_FACING_POINTS: f64 = 20.0;
pub const TEST_ENVIRONMENT_POINTS: f64 = 10.0;
pub const TOP_CATEGORY_POINTS: f64 = 20.0;
pub const SECOND_TIER_CATEGORY_POINTS: f64 = 10.0;

/// Risk components, each already clamped to its cap
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskComponents {
    pub age: f64,
    pub severity: f64,
    pub environment: f64,
    pub category_rank: f64,
}

impl RiskComponents {
    pub fn sum(&self) -> f64 {
        self.age + self.severity + self.environment + self.category_rank
    }
}

/// Configurable high-risk threshold
#[derive(Debug, Clone, Copy)]
pub struct RiskThresholds {
    pub high: f64,
}

impl Default for RiskThresholds {
    fn default() -> Self {
        RiskThresholds { high: 70.0 }
    }
}

/// Age factor: 1 point per 12 days, capped at 30
pub fn age_points(age_days: u32) -> f64 {
    (f64::from(age_days) / DAYS_PER_AGE_POINT).min(AGE_CAP)
}

pub fn severity_points(severity: Severity) -> f64 {
    match severity {
        Severity::High => SEVERITY_HIGH_POINTS,
        Severity::Medium => SEVERITY_MEDIUM_POINTS,
    }
}

pub fn environment_points(environment: Environment) -> f64 {
    match environment {
        Environment::Production | Environment::Field => CUSTOMER_FACING_POINTS,
        Environment::Test => TEST_ENVIRONMENT_POINTS,
        _ => 0.0,
    }
}

/// Category factor from the 0-based category rank
///
/// Ranks 0-2 (top three) score 20, ranks 3-5 score 10.
pub fn category_rank_points(rank: Option<usize>) -> f64 {
    match rank {
        Some(r) if r < 3 => TOP_CATEGORY_POINTS,
        Some(r) if r < 6 => SECOND_TIER_CATEGORY_POINTS,
        _ => 0.0,
    }
}

/// Calculate risk components for one record
pub fn calculate_risk_components(
    record: &DefectRecord,
    category_rank: Option<usize>,
) -> RiskComponents {
    RiskComponents {
        age: age_points(record.age_days),
        severity: severity_points(record.severity),
        environment: environment_points(record.environment),
        category_rank: category_rank_points(category_rank),
    }
}

/// Final score, capped at 100
pub fn calculate_risk_score(components: &RiskComponents) -> f64 {
    components.sum().clamp(0.0, MAX_RISK_SCORE)
}

/// Risk verdict for one record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskAssessment {
    pub id: String,
    pub score: f64,
    pub components: RiskComponents,
    pub high_risk: bool,
}

/// Risk scores for the whole record set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct RiskSummary {
    /// Parallel to the filtered records
    pub assessments: Vec<RiskAssessment>,
    pub high_risk_threshold: f64,
    pub high_risk_ids: Vec<String>,
    pub average_score: f64,
}

impl RiskSummary {
    pub fn high_risk_count(&self) -> usize {
        self.high_risk_ids.len()
    }
}

/// Score every record against the category ranking
pub fn score_records(
    records: &[DefectRecord],
    category_pareto: &ParetoSeries,
    thresholds: &RiskThresholds,
) -> RiskSummary {
    let assessments: Vec<RiskAssessment> = records
        .iter()
        .map(|record| {
            let components =
                calculate_risk_components(record, category_pareto.rank_of(&record.category));
            let score = calculate_risk_score(&components);
            RiskAssessment {
                id: record.id.clone(),
                score,
                components,
                high_risk: score >= thresholds.high,
            }
        })
        .collect();

    let high_risk_ids = assessments
        .iter()
        .filter(|a| a.high_risk)
        .map(|a| a.id.clone())
        .collect();
    let average_score = if assessments.is_empty() {
        0.0
    } else {
        assessments.iter().map(|a| a.score).sum::<f64>() / assessments.len() as f64
    };

    RiskSummary {
        assessments,
        high_risk_threshold: thresholds.high,
        high_risk_ids,
        average_score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::{Dimension, GroupedCounts};
    use crate::pareto::{build_pareto, DEFAULT_CUTOFF_PERCENT};
    use crate::test_support::{defect, defects, DefectParams};

    #[test]
    fn test_age_points_cap() {
        assert_eq!(age_points(0), 0.0);
        assert_eq!(age_points(12), 1.0);
        assert_eq!(age_points(180), 15.0);
        assert_eq!(age_points(360), 30.0);
        assert_eq!(age_points(5000), 30.0);
    }

    #[test]
    fn test_category_rank_points() {
        assert_eq!(category_rank_points(Some(0)), 20.0);
        assert_eq!(category_rank_points(Some(2)), 20.0);
        assert_eq!(category_rank_points(Some(3)), 10.0);
        assert_eq!(category_rank_points(Some(5)), 10.0);
        assert_eq!(category_rank_points(Some(6)), 0.0);
        assert_eq!(category_rank_points(None), 0.0);
    }

    #[test]
    fn test_environment_points() {
        assert_eq!(environment_points(Environment::Production), 20.0);
        assert_eq!(environment_points(Environment::Field), 20.0);
        assert_eq!(environment_points(Environment::Test), 10.0);
        assert_eq!(environment_points(Environment::StagingUat), 0.0);
        assert_eq!(environment_points(Environment::Unknown), 0.0);
    }

    #[test]
    fn test_maximum_score_is_capped() {
        let record = defect(DefectParams {
            severity: 2,
            environment: "Production",
            age_days: Some(1000),
            ..DefectParams::default()
        });
        let components = calculate_risk_components(&record, Some(0));
        assert_eq!(components.sum(), 100.0);
        assert_eq!(calculate_risk_score(&components), 100.0);
    }

    #[test]
    fn test_minimum_score() {
        let record = defect(DefectParams {
            severity: 3,
            environment: "Development",
            ..DefectParams::default()
        });
        let components = calculate_risk_components(&record, None);
        assert_eq!(calculate_risk_score(&components), 15.0);
    }

    #[test]
    fn test_score_records_uses_category_rank() {
        let mut records = defects(3, || DefectParams {
            category: "Big",
            severity: 2,
            environment: "Field",
            age_days: Some(240),
            ..DefectParams::default()
        });
        records.push(defect(DefectParams {
            id: "small",
            category: "Small",
            severity: 3,
            environment: "Test",
            age_days: Some(24),
            ..DefectParams::default()
        }));

        let pareto = build_pareto(
            &GroupedCounts::from_records(&records, Dimension::Category),
            DEFAULT_CUTOFF_PERCENT,
        );
        let summary = score_records(&records, &pareto, &RiskThresholds::default());

        // Big: 20 (age) + 30 + 20 + 20 (rank 0)
        assert_eq!(summary.assessments[0].score, 90.0);
        assert!(summary.assessments[0].high_risk);
        // Small: 2 (age) + 15 + 10 + 20 (rank 1)
        assert_eq!(summary.assessments[3].score, 47.0);
        assert!(!summary.assessments[3].high_risk);
        assert_eq!(summary.high_risk_count(), 3);
        assert!((summary.average_score - (90.0 * 3.0 + 47.0) / 4.0).abs() < 1e-9);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let record = defect(DefectParams {
            severity: 2,
            environment: "Production",
            ..DefectParams::default()
        });
        let pareto = build_pareto(
            &GroupedCounts::from_records(std::slice::from_ref(&record), Dimension::Category),
            DEFAULT_CUTOFF_PERCENT,
        );
        // 0 + 30 + 20 + 20 = 70
        let summary = score_records(&[record], &pareto, &RiskThresholds::default());
        assert_eq!(summary.assessments[0].score, 70.0);
        assert!(summary.assessments[0].high_risk);
    }

    #[test]
    fn test_empty_input() {
        let pareto = build_pareto(&GroupedCounts::default(), DEFAULT_CUTOFF_PERCENT);
        let summary = score_records(&[], &pareto, &RiskThresholds::default());
        assert_eq!(summary.average_score, 0.0);
        assert!(summary.assessments.is_empty());
    }
}
