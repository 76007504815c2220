use approx::assert_abs_diff_eq;
use chrono::{Duration, NaiveDate};
use lunacast::ingest::{
    assemble_series, date_range, BatchReport, DailyRecord, DataSource, DayFailure, FailureKind,
    SyntheticSource,
};
use lunacast::location::Coordinate;
use lunacast::models::{AIR_TEMP, PRESSURE, WATER_TEMP, WIND_SPEED};
use lunar_math::label_for_date;
use lunar_math::smoothing::WATER_TEMP_ALPHA;
use pretty_assertions::assert_eq;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

fn record(day: &str, air: f64) -> DailyRecord {
    DailyRecord {
        date: date(day),
        air_temp_c: air,
        pressure_kpa: 101.0,
        wind_speed_m_s: 2.0,
    }
}

#[test]
fn test_date_range_inclusive() {
    let days = date_range(date("2024-02-27"), date("2024-03-01"));
    assert_eq!(days.len(), 4);
    assert_eq!(days[2], date("2024-02-29"));
    assert!(date_range(date("2024-03-02"), date("2024-03-01")).is_empty());
}

#[test]
fn test_batch_report_counts_failures() {
    let results = vec![
        Ok(record("2025-01-01", 1.0)),
        Err(DayFailure::new(date("2025-01-03"), FailureKind::Missing, "sentinel")),
        Err(DayFailure::new(date("2025-01-02"), FailureKind::Request, "timeout")),
        Ok(record("2025-01-04", 4.0)),
    ];

    let (records, report) = BatchReport::collect(results);

    assert_eq!(records.len(), 2);
    assert_eq!(report.requested, 4);
    assert_eq!(report.succeeded, 2);
    assert_eq!(report.failed(), 2);
    assert_eq!(report.count(FailureKind::Request), 1);
    assert_eq!(report.count(FailureKind::Parse), 0);
    assert_eq!(report.failures[0].date, date("2025-01-02"));
}

#[test]
fn test_assemble_fills_missing_days_and_labels_every_day() {
    let records = vec![record("2025-01-04", 4.0), record("2025-01-01", 1.0), record("2025-01-02", 2.0)];

    let series = assemble_series("test", records).unwrap();

    assert_eq!(series.len(), 4);
    assert_eq!(series.column(AIR_TEMP).unwrap(), &[1.0, 2.0, 2.0, 4.0]);
    assert_eq!(series.column(PRESSURE).unwrap(), &[101.0; 4]);
    assert_eq!(series.column(WIND_SPEED).unwrap(), &[2.0; 4]);
    for (day, label) in series.dates().iter().zip(series.moon_phases()) {
        assert_eq!(*label, Some(label_for_date(*day)));
    }

    let water = series.column(WATER_TEMP).unwrap();
    assert_abs_diff_eq!(water[0], 1.0);
    assert_abs_diff_eq!(water[1], WATER_TEMP_ALPHA * 2.0 + (1.0 - WATER_TEMP_ALPHA) * 1.0, epsilon = 1e-12);
}

#[test]
fn test_assemble_without_records_is_unavailable() {
    let err = assemble_series("test", Vec::new()).unwrap_err();
    assert_eq!(err.kind(), "data_unavailable");
}

#[test]
fn test_synthetic_source_is_deterministic() {
    let source = SyntheticSource::new(3);
    let kyiv = Coordinate::new(50.4501, 30.5234).unwrap();

    let a = source.fetch(&kyiv, date("2025-01-01"), date("2025-01-20")).unwrap();
    let b = source.fetch(&kyiv, date("2025-01-10"), date("2025-01-20")).unwrap();

    assert_eq!(a.len(), 20);
    assert_eq!(&a.column(PRESSURE).unwrap()[9..], b.column(PRESSURE).unwrap());
    assert_eq!(source.name(), "synthetic");
}

#[test]
fn test_synthetic_gaps_are_filled() {
    let gap = date("2025-01-05");
    let source = SyntheticSource::new(3).with_missing_days(vec![gap]);
    let kyiv = Coordinate::new(50.4501, 30.5234).unwrap();

    let series = source.fetch(&kyiv, date("2025-01-01"), date("2025-01-10")).unwrap();
    let air = series.column(AIR_TEMP).unwrap();

    assert_eq!(series.len(), 10);
    assert_eq!(air[4], air[3]);
    assert_eq!(series.dates()[4], gap);
    assert_eq!(series.dates()[9], gap + Duration::days(5));
}

#[test]
fn test_every_day_missing_is_unavailable() {
    let days = date_range(date("2025-01-01"), date("2025-01-03"));
    let source = SyntheticSource::new(3).with_missing_days(days);
    let kyiv = Coordinate::new(50.4501, 30.5234).unwrap();

    let err = source.fetch(&kyiv, date("2025-01-01"), date("2025-01-03")).unwrap_err();
    assert_eq!(err.kind(), "data_unavailable");
}

#[test]
fn test_inverted_range_is_rejected() {
    let kyiv = Coordinate::new(50.4501, 30.5234).unwrap();
    let err = SyntheticSource::new(3)
        .fetch(&kyiv, date("2025-01-03"), date("2025-01-01"))
        .unwrap_err();
    assert_eq!(err.kind(), "validation");
}
