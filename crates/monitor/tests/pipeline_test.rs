use chrono::{NaiveDate, TimeZone, Utc};
use ticket_monitor::{
    models::{AlertKind, Priority, RawAlert, Sector, Source, Status},
    pipeline::{
        annotate, classify, correlate, extract, filter, DateRange, DateRangePreset, FilterCriteria,
        Pipeline,
    },
    sources::{FallbackSource, TicketSource},
};

fn scenario() -> Vec<RawAlert> {
    vec![
        RawAlert::new(
            1,
            "GPU >= 95%",
            "Problem started at 10:00:00 on 2025.01.01\nHost: H1\nOriginal problem ID: 500",
            "2025-01-01T10:00:05Z",
        ),
        RawAlert::new(
            2,
            "Resolved",
            "Problem has been resolved at 10:05:00 on 2025.01.01\nOriginal problem ID: 500",
            "2025-01-01T10:05:05Z",
        ),
    ]
}

#[test]
fn start_and_resolve_correlate_to_one_resolved_group() {
    let alerts: Vec<_> = scenario().iter().map(annotate).collect();
    let groups = correlate(&alerts);

    assert_eq!(groups.len(), 1);
    let group = &groups["500"];
    assert_eq!(group.status, Status::Resolved);
    assert_eq!(group.host.as_deref(), Some("H1"));
    assert_eq!(group.first_occurrence, Some(Utc.with_ymd_and_hms(2025, 1, 1, 10, 0, 5).unwrap()));
    assert_eq!(group.last_update, Some(Utc.with_ymd_and_hms(2025, 1, 1, 10, 5, 5).unwrap()));
}

#[test]
fn pipeline_run_over_scenario() {
    let pipeline = Pipeline::default();
    let alerts = pipeline.annotate_all(&scenario());
    let now = Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap();

    let output = pipeline.run(&alerts, &FilterCriteria::default(), now);
    assert_eq!(output.problems.len(), 1);
    assert_eq!(output.stats.by_status.resolved, 1);
    assert_eq!(output.stats.by_status.in_progress, 1);
    assert_eq!(output.stats.ratios.resolved_pct, 50.0);

    // The resolved message has no sector keyword of its own.
    assert_eq!(alerts[1].sector, Sector::Unknown);
    assert_eq!(output.stats.avg_resolution(Sector::Unknown), 835.0);
}

#[test]
fn classification_is_deterministic() {
    let subject = "Zabbix: RCS-207-NWC1216 GPU >= 95% critical";
    let message = "Problem started at 12:42:53 on 2025.09.15\nfailed to render";

    let first = classify(subject, message);
    for _ in 0..10 {
        assert_eq!(classify(subject, message), first);
    }
    assert_eq!(first.status, Status::InProgress);
    assert_eq!(first.priority, Priority::High);
    assert_eq!(first.source, Source::Zabbix);
    assert_eq!(first.kind, AlertKind::Error);
    assert!(first.has_error);
}

#[test]
fn resolved_check_precedes_started_check() {
    let c = classify("", "Problem started at 10:00, then resolved at 10:05");
    assert_eq!(c.status, Status::Resolved);
}

#[test]
fn extraction_examples() {
    let fields = extract("Original problem ID: 11865562\nHost: RCS-207-NWC1216");
    assert_eq!(fields.problem_id.as_deref(), Some("11865562"));
    assert_eq!(fields.host.as_deref(), Some("RCS-207-NWC1216"));

    let fields = extract("Checked at 14:02:00, nothing else");
    assert!(fields.embedded_timestamp.is_none());
}

#[test]
fn filter_is_idempotent_and_inverted_range_is_empty() {
    let alerts: Vec<_> = scenario().iter().map(annotate).collect();
    let now = Utc.with_ymd_and_hms(2025, 1, 1, 18, 0, 0).unwrap();

    let criteria = FilterCriteria::default()
        .with_date_range(DateRangePreset::Today.resolve(&now))
        .with_search("problem");
    let once = filter(&alerts, &criteria);
    assert_eq!(once.len(), 2);
    assert_eq!(filter(&once, &criteria), once);

    let inverted = DateRange::new(
        Utc.with_ymd_and_hms(2025, 1, 2, 0, 0, 0).unwrap(),
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap(),
    );
    let criteria = FilterCriteria::default().with_date_range(inverted);
    assert!(filter(&alerts, &criteria).is_empty());

    let custom = DateRangePreset::Custom {
        start: NaiveDate::from_ymd_opt(2025, 1, 3).unwrap(),
        end: NaiveDate::from_ymd_opt(2025, 1, 1).unwrap(),
    };
    let criteria = FilterCriteria::default().with_date_range(custom.resolve(&now));
    assert!(filter(&alerts, &criteria).is_empty());
}

#[test]
fn fallback_rows_run_through_the_pipeline() {
    let raw = tokio_test::block_on(FallbackSource.fetch()).unwrap();
    let pipeline = Pipeline::default();
    let alerts = pipeline.annotate_all(&raw);

    let output = pipeline.run(&alerts, &FilterCriteria::default(), Utc::now());
    assert_eq!(output.stats.total, raw.len());
    assert!(output.problems.len() < raw.len());
    assert!(alerts.iter().any(|a| a.sector == Sector::Gpu));
}
