//! End-to-end pipeline tests over the shared defect fixture

use chrono::{NaiveDate, NaiveDateTime};
use defectscope_core::classify::Confidence;
use defectscope_core::forecast::BurndownStatus;
use defectscope_core::record::AgingBucket;
use defectscope_core::{analyze, forecast_only, load_raw_defects, parse_raw_defects, render_json};
use defectscope_core::{MetricsBundle, RawDefect, ResolvedConfig};
use std::path::PathBuf;

fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .join("tests")
        .join("fixtures")
        .join(name)
}

fn as_of() -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 7, 1)
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

fn fixture() -> Vec<RawDefect> {
    load_raw_defects(&fixture_path("defects.json")).unwrap()
}

fn fixture_bundle() -> MetricsBundle {
    analyze(&fixture(), as_of(), &ResolvedConfig::defaults().unwrap())
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_unsupported_severities_are_dropped() {
    let bundle = fixture_bundle();
    assert_eq!(bundle.total_records, 11);
    assert_eq!(bundle.dropped_records, 4);

    let ids: Vec<&str> = bundle
        .risk
        .assessments
        .iter()
        .map(|a| a.id.as_str())
        .collect();
    for dropped in ["3001", "3002", "3003", "3004"] {
        assert!(!ids.contains(&dropped), "{} must not be analyzed", dropped);
    }
    assert!(ids.contains(&"2001"), "numeric ids are coerced to strings");
}

#[test]
fn test_escape_summary() {
    let escape = fixture_bundle().escape;
    assert_eq!(escape.escaped, 5);
    assert_eq!(escape.caught, 5);
    assert_eq!(escape.excluded, 1);
    assert!(close(escape.escape_rate, 50.0));
    assert_eq!(escape.environments.get("CI/CD"), Some(&1));
}

#[test]
fn test_category_pareto() {
    let pareto = fixture_bundle().pareto.category;
    assert_eq!(
        pareto.keys(),
        vec!["Authentication", "UI", "Integration", "Performance"]
    );
    assert_eq!(pareto.grand_total, 11);
    assert_eq!(pareto.vital_few_count, 3);
    let authentication = &pareto.entries[0];
    assert_eq!((authentication.sev2, authentication.sev3), (4, 0));
}

#[test]
fn test_missing_version_gets_default_label() {
    let bundle = fixture_bundle();
    assert_eq!(bundle.dimensions.version.get("Unknown").total(), 1);
    assert_eq!(bundle.dimensions.version.get("3.0").total(), 1);
    assert_eq!(
        bundle.filters.versions,
        vec!["1.0", "2.0", "2.1", "2.2", "2.3", "3.0", "Unknown"]
    );
}

#[test]
fn test_heatmaps() {
    let heatmaps = fixture_bundle().heatmaps;
    let matrix = &heatmaps.category_area;
    assert_eq!(matrix.get("Authentication", "Login"), 3);
    assert_eq!(matrix.get("UI", "Dashboard"), 4);
    assert_eq!(matrix.get("UI", "Login"), 0);
    assert_eq!(matrix.total(), 11);

    let hotspot = heatmaps.sdlc_test_hotspot.unwrap();
    assert_eq!(hotspot.row, "Implementation");
    assert_eq!(hotspot.column, "System Test");
    assert_eq!(hotspot.count, 7);
}

#[test]
fn test_high_risk_records() {
    let risk = fixture_bundle().risk;
    assert_eq!(risk.high_risk_ids, vec!["1001", "1004", "2001", "1011"]);

    let legacy = risk.assessments.iter().find(|a| a.id == "1011").unwrap();
    // 30 (age cap) + 15 + 20 (Production) + 20 (UI ranks second)
    assert!(close(legacy.score, 85.0));
}

#[test]
fn test_high_risk_threshold_from_config() {
    let mut config = ResolvedConfig::defaults().unwrap();
    config.high_risk_threshold = 80.0;
    let bundle = analyze(&fixture(), as_of(), &config);
    assert_eq!(bundle.risk.high_risk_ids, vec!["1001", "1011"]);
    assert_eq!(bundle.risk.high_risk_threshold, 80.0);
}

#[test]
fn test_unparseable_date_degrades_to_age_zero() {
    let bundle = fixture_bundle();
    let tooltip = bundle.drilldown.by_category["UI"]
        .iter()
        .find(|s| s.id == "1008")
        .unwrap();
    assert_eq!(tooltip.created_date, "not-a-date");

    let assessment = bundle
        .risk
        .assessments
        .iter()
        .find(|a| a.id == "1008")
        .unwrap();
    assert_eq!(assessment.components.age, 0.0);
}

#[test]
fn test_forecast() {
    let forecast = fixture_bundle().forecast;

    // 2021 is outside the reliable window; the bad date has no month
    assert_eq!(forecast.inflow.months.len(), 7);
    assert_eq!(forecast.inflow.total, 9);
    assert!(close(forecast.inflow.average, 9.0 / 7.0));

    assert_eq!(forecast.backlog.open, 6);
    assert_eq!(forecast.backlog.closed, 5);
    assert_eq!(forecast.backlog.open_sev2, 3);
    assert_eq!(forecast.backlog.open_sev2_older_than_90_days, 2);

    assert!(close(forecast.resolution.rate, 5.0 / 7.0));
    assert!(!forecast.resolution.estimated);
    assert_eq!(forecast.burndown.status, BurndownStatus::Increasing);
    assert_eq!(forecast.burndown.months_to_clear, None);
    assert!(forecast.backlog_projection.point > 6.0);
    assert_eq!(
        forecast.horizon_end,
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    );
    assert!(!forecast.variance.estimated);
}

#[test]
fn test_forecast_only_matches_full_pipeline() {
    let config = ResolvedConfig::defaults().unwrap();
    let standalone = forecast_only(&fixture(), as_of(), &config);
    assert_eq!(standalone, fixture_bundle().forecast);
}

#[test]
fn test_drilldown_and_classification() {
    let bundle = fixture_bundle();
    let authentication: Vec<&str> = bundle.drilldown.by_category["Authentication"]
        .iter()
        .map(|s| s.id.as_str())
        .collect();
    assert_eq!(authentication, vec!["1001", "1004", "1006", "2001"]);

    let login = &bundle.drilldown.category_area["Authentication|Login"];
    assert_eq!(login.len(), 3);
    assert_eq!(login[0].root_cause, "Null Reference");
    assert_eq!(login[0].confidence, Confidence::High);
    assert_eq!(login[1].root_cause, "Concurrency");
}

#[test]
fn test_category_health_follows_pareto() {
    let bundle = fixture_bundle();
    let order: Vec<&str> = bundle
        .category_health
        .iter()
        .map(|h| h.category.as_str())
        .collect();
    assert_eq!(order, bundle.pareto.category.keys());
    assert!(bundle
        .category_health
        .iter()
        .all(|h| (0.0..=100.0).contains(&h.score)));
}

#[test]
fn test_three_record_scenario() {
    let raw = parse_raw_defects(
        r#"[
            {"Bug ID": "a", "Bug Severity": 2, "Created Date": "2024-06-21", "Environment": "Production"},
            {"Bug ID": "b", "Bug Severity": 3, "Created Date": "2024-06-21", "Environment": "Production"},
            {"Bug ID": "c", "Bug Severity": 2, "Created Date": "2024-06-21", "Environment": "Test"}
        ]"#,
    )
    .unwrap();
    let bundle = analyze(&raw, as_of(), &ResolvedConfig::defaults().unwrap());

    assert_eq!(bundle.escape.escaped, 2);
    assert_eq!(bundle.escape.caught, 1);
    assert!((bundle.escape.escape_rate - 66.7).abs() < 0.05);
    assert_eq!(bundle.aging.counts(AgingBucket::UpTo30).total(), 3);
    assert!(close(bundle.aging.average_age_days, 10.0));
}

#[test]
fn test_empty_input() {
    let bundle = analyze(&[], as_of(), &ResolvedConfig::defaults().unwrap());
    assert_eq!(bundle.total_records, 0);
    assert_eq!(bundle.escape.escape_rate, 0.0);
    assert!(bundle.pareto.category.is_empty());
    assert!(bundle.category_health.is_empty());
    assert_eq!(bundle.forecast.inflow.average, 0.0);
    assert_eq!(bundle.forecast.burndown.status, BurndownStatus::Stable);
    assert!(bundle.forecast.reliability.score >= 0.0);
}

#[test]
fn test_parse_rejects_non_array() {
    assert!(parse_raw_defects(r#"{"Bug ID": "1"}"#).is_err());
    assert!(load_raw_defects(&fixture_path("missing.json")).is_err());
}

#[test]
fn test_json_output_is_deterministic() {
    let first = render_json(&fixture_bundle());
    let second = render_json(&fixture_bundle());
    assert_eq!(first, second);

    let parsed: MetricsBundle = serde_json::from_str(&first).unwrap();
    assert_eq!(parsed.total_records, 11);
    assert_eq!(parsed.as_of, as_of().date());
    assert_eq!(parsed.generator, None);
    assert!(!first.contains("\"generator\""));
}

#[test]
fn test_generator_stamp_round_trips() {
    let bundle = MetricsBundle {
        generator: Some("defectscope 0.3.0".to_string()),
        ..fixture_bundle()
    };
    let json = render_json(&bundle);
    assert!(json.starts_with("{\n  \"generator\": \"defectscope 0.3.0\""));

    let parsed: MetricsBundle = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed.generator.as_deref(), Some("defectscope 0.3.0"));
    assert_eq!(parsed.total_records, bundle.total_records);
}

#[test]
fn test_text_output_mentions_every_section() {
    let text = defectscope_core::render_text(&fixture_bundle());
    for heading in [
        "AGING",
        "ESCAPES",
        "PARETO by category",
        "HIGH RISK",
        "CATEGORY HEALTH",
        "TOP ROOT CAUSES",
        "PROCESS",
        "FORECAST",
    ] {
        assert!(text.contains(heading), "missing section {}", heading);
    }
}
