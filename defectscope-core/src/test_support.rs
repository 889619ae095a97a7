//! Record builders shared by unit tests

use crate::record::{
    age_in_days, area_leaf, parse_created_date, AgingBucket, DefectRecord, Environment, Severity,
    DEFAULT_DEFECT_ORIGIN, DEFAULT_SDLC_PHASE, DEFAULT_TEST_PHASE,
};
use chrono::{Duration, NaiveDate, NaiveDateTime};

/// Fixed reference instant for tests
pub fn test_now() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2025, 6, 30)
        .unwrap()
        .and_hms_opt(12, 0, 0)
        .unwrap()
}

pub struct DefectParams {
    pub id: &'static str,
    pub title: &'static str,
    pub severity: u8,
    pub category: &'static str,
    pub area_path: &'static str,
    pub version: &'static str,
    pub state: &'static str,
    pub environment: &'static str,
    /// Explicit created timestamp; wins over `age_days`
    pub created: Option<&'static str>,
    /// Age relative to [`test_now`] when `created` is absent
    pub age_days: Option<u32>,
    pub sdlc_phase: Option<&'static str>,
    pub test_phase: Option<&'static str>,
    pub defect_origin: Option<&'static str>,
}

impl Default for DefectParams {
    fn default() -> Self {
        DefectParams {
            id: "D-1",
            title: "",
            severity: 3,
            category: "General",
            area_path: "Product\\Core",
            version: "1.0",
            state: "Active",
            environment: "Unknown",
            created: None,
            age_days: None,
            sdlc_phase: None,
            test_phase: None,
            defect_origin: None,
        }
    }
}

pub fn defect(params: DefectParams) -> DefectRecord {
    let now = test_now();
    let created = match (params.created, params.age_days) {
        (Some(s), _) => parse_created_date(s),
        (None, Some(days)) => Some(now - Duration::days(i64::from(days))),
        (None, None) => None,
    };
    let age_days = created.map(|c| age_in_days(c, now)).unwrap_or(0);

    DefectRecord {
        id: params.id.to_string(),
        title: params.title.to_string(),
        description: String::new(),
        severity: if params.severity == 2 {
            Severity::High
        } else {
            Severity::Medium
        },
        created,
        created_date: created
            .map(|c| c.format("%Y-%m-%d").to_string())
            .unwrap_or_default(),
        age_days,
        aging_bucket: AgingBucket::from_age_days(age_days),
        environment: Environment::parse(params.environment),
        category: params.category.to_string(),
        area_path: params.area_path.to_string(),
        area: area_leaf(params.area_path),
        version: params.version.to_string(),
        state: params.state.to_string(),
        sdlc_phase: params.sdlc_phase.unwrap_or(DEFAULT_SDLC_PHASE).to_string(),
        test_phase: params.test_phase.unwrap_or(DEFAULT_TEST_PHASE).to_string(),
        defect_origin: params.defect_origin.unwrap_or(DEFAULT_DEFECT_ORIGIN).to_string(),
    }
}

/// `count` copies of one parameter set with sequential ids
pub fn defects(count: usize, make: impl Fn() -> DefectParams) -> Vec<DefectRecord> {
    (0..count)
        .map(|i| {
            let mut record = defect(make());
            record.id = format!("{}-{}", record.id, i);
            record
        })
        .collect()
}
