//! Category health index
//!
//! 100 minus four independently capped penalties, clamped to [0, 100]:
//!
//! - volume: `min(30, count / 2)`
//! - escape: `escape_rate x 0.3`
//! - age: `min(20, average_age / 30)`
//! - severity: `sev2_ratio x 20`
//!
//! A category with no records scores 100.

use crate::escape::category_escape_rate;
use crate::pareto::ParetoSeries;
use crate::record::{DefectRecord, Severity};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

pub const PERFECT_HEALTH: f64 = 100.0;
pub const VOLUME_PENALTY_CAP: f64 = 30.0;
pub const ESCAPE_PENALTY_WEIGHT: f64 = 0.3;
pub const AGE_PENALTY_CAP: f64 = 20.0;
pub const SEVERITY_PENALTY_WEIGHT: f64 = 20.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct HealthPenalties {
    pub volume: f64,
    pub escape: f64,
    pub age: f64,
    pub severity: f64,
}

impl HealthPenalties {
    pub fn total(&self) -> f64 {
        self.volume + self.escape + self.age + self.severity
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct CategoryHealth {
    pub category: String,
    pub count: usize,
    /// Escaped share of every record in the category
    pub escape_rate: f64,
    pub average_age_days: f64,
    /// Fraction of severity-2 records, 0..=1
    pub sev2_ratio: f64,
    pub penalties: HealthPenalties,
    pub score: f64,
}

/// Health of one category from its records
pub fn category_health(category: &str, records: &[&DefectRecord]) -> CategoryHealth {
    if records.is_empty() {
        return CategoryHealth {
            category: category.to_string(),
            count: 0,
            escape_rate: 0.0,
            average_age_days: 0.0,
            sev2_ratio: 0.0,
            penalties: HealthPenalties::default(),
            score: PERFECT_HEALTH,
        };
    }

    let count = records.len();
    let escape_rate = category_escape_rate(records);
    let average_age_days =
        records.iter().map(|r| f64::from(r.age_days)).sum::<f64>() / count as f64;
    let sev2 = records
        .iter()
        .filter(|r| r.severity == Severity::High)
        .count();
    let sev2_ratio = sev2 as f64 / count as f64;

    let penalties = HealthPenalties {
        volume: (count as f64 / 2.0).min(VOLUME_PENALTY_CAP),
        escape: escape_rate * ESCAPE_PENALTY_WEIGHT,
        age: (average_age_days / 30.0).min(AGE_PENALTY_CAP),
        severity: sev2_ratio * SEVERITY_PENALTY_WEIGHT,
    };

    CategoryHealth {
        category: category.to_string(),
        count,
        escape_rate,
        average_age_days,
        sev2_ratio,
        score: (PERFECT_HEALTH - penalties.total()).clamp(0.0, PERFECT_HEALTH),
        penalties,
    }
}

/// Health of every category, in category Pareto order
pub fn compute_category_health(
    records: &[DefectRecord],
    category_pareto: &ParetoSeries,
) -> Vec<CategoryHealth> {
    let mut by_category: IndexMap<&str, Vec<&DefectRecord>> = IndexMap::new();
    for record in records {
        by_category
            .entry(record.category.as_str())
            .or_default()
            .push(record);
    }

    category_pareto
        .entries
        .iter()
        .map(|entry| {
            let members = by_category
                .get(entry.key.as_str())
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            category_health(&entry.key, members)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregates::{Dimension, GroupedCounts};
    use crate::pareto::{build_pareto, DEFAULT_CUTOFF_PERCENT};
    use crate::test_support::{defect, defects, DefectParams};

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_empty_category_is_healthy() {
        let health = category_health("Ghost", &[]);
        assert_eq!(health.score, 100.0);
        assert_eq!(health.penalties.total(), 0.0);
    }

    #[test]
    fn test_penalties() {
        let records = vec![
            defect(DefectParams { severity: 2, environment: "Production", age_days: Some(60), ..DefectParams::default() }),
            defect(DefectParams { severity: 3, environment: "Test", age_days: Some(120), ..DefectParams::default() }),
            defect(DefectParams { severity: 3, environment: "Unknown", age_days: Some(0), ..DefectParams::default() }),
            defect(DefectParams { severity: 3, environment: "Field", age_days: Some(180), ..DefectParams::default() }),
        ];
        let refs: Vec<&DefectRecord> = records.iter().collect();
        let health = category_health("General", &refs);

        assert_eq!(health.count, 4);
        assert!(close(health.escape_rate, 50.0));
        assert!(close(health.average_age_days, 90.0));
        assert!(close(health.sev2_ratio, 0.25));
        assert!(close(health.penalties.volume, 2.0));
        assert!(close(health.penalties.escape, 15.0));
        assert!(close(health.penalties.age, 3.0));
        assert!(close(health.penalties.severity, 5.0));
        assert!(close(health.score, 75.0));
    }

    #[test]
    fn test_caps_and_floor() {
        let records = defects(80, || DefectParams {
            severity: 2,
            environment: "Production",
            age_days: Some(1200),
            ..DefectParams::default()
        });
        let refs: Vec<&DefectRecord> = records.iter().collect();
        let health = category_health("General", &refs);

        assert_eq!(health.penalties.volume, 30.0);
        assert_eq!(health.penalties.age, 20.0);
        assert!(close(health.penalties.escape, 30.0));
        assert!(close(health.penalties.severity, 20.0));
        assert_eq!(health.score, 0.0);
    }

    #[test]
    fn test_follows_pareto_order() {
        let mut records = vec![defect(DefectParams { category: "Rare", ..DefectParams::default() })];
        records.extend(defects(3, || DefectParams { category: "Common", ..DefectParams::default() }));

        let pareto = build_pareto(
            &GroupedCounts::from_records(&records, Dimension::Category),
            DEFAULT_CUTOFF_PERCENT,
        );
        let health = compute_category_health(&records, &pareto);
        let order: Vec<&str> = health.iter().map(|h| h.category.as_str()).collect();
        assert_eq!(order, vec!["Common", "Rare"]);
        assert_eq!(health[0].count, 3);
        assert!(health.iter().all(|h| (0.0..=100.0).contains(&h.score)));
    }
}
