use chrono::{Duration, NaiveDate};
use lunacast::data::DailySeries;
use lunacast::engine::ForecastEngine;
use lunacast::models::{ModelSpec, ModelTable, AIR_TEMP, PRESSURE, WIND_SPEED};
use lunacast::MoonPhase;
use lunar_math::label_for_date;
use pretty_assertions::assert_eq;
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use rstest::rstest;
use std::io::Cursor;

fn start() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 11, 1).unwrap()
}

/// Daily weather-like series with a weekly wobble and seeded noise
fn weather(days: usize, seed: u64) -> DailySeries {
    let mut rng = StdRng::seed_from_u64(seed);
    let noise = Normal::new(0.0, 0.4).unwrap();

    let dates: Vec<NaiveDate> = (0..days).map(|i| start() + Duration::days(i as i64)).collect();
    let labels = dates.iter().map(|d| Some(label_for_date(*d))).collect();

    let mut air = Vec::with_capacity(days);
    let mut pressure = Vec::with_capacity(days);
    let mut wind = Vec::with_capacity(days);
    for i in 0..days {
        let t = i as f64;
        air.push(8.0 - 0.05 * t + 1.5 * (t * std::f64::consts::TAU / 7.0).sin() + noise.sample(&mut rng));
        pressure.push(101.2 + 0.2 * (t / 5.0).cos() + 0.1 * noise.sample(&mut rng));
        wind.push(3.5 + 0.5 * noise.sample(&mut rng).abs());
    }

    DailySeries::new(
        dates,
        labels,
        vec![
            (AIR_TEMP.to_string(), air),
            (PRESSURE.to_string(), pressure),
            (WIND_SPEED.to_string(), wind),
        ],
    )
    .unwrap()
}

#[test]
fn test_forecast_shape_and_labels() {
    let series = weather(30, 1);
    assert_eq!(series.observed_labels(), MoonPhase::ALL.to_vec());
    let table = ForecastEngine::default().run(&series, 7).unwrap();

    assert_eq!(table.len(), 7);
    assert_eq!(
        table.targets(),
        &[AIR_TEMP.to_string(), PRESSURE.to_string(), WIND_SPEED.to_string()]
    );

    let observed = series.observed_labels();
    let last = series.last_date().unwrap();
    for (i, row) in table.rows().iter().enumerate() {
        assert_eq!(row.date, last + Duration::days(i as i64 + 1));
        assert!(observed.contains(&row.moon_phase), "{} was never observed", row.moon_phase);
        assert!(row.values.iter().all(|v| v.is_finite()));
    }
}

#[rstest]
#[case(1)]
#[case(3)]
#[case(14)]
fn test_horizon_controls_row_count(#[case] horizon: usize) {
    let table = ForecastEngine::default().run(&weather(45, 2), horizon).unwrap();
    assert_eq!(table.len(), horizon);
}

#[test]
fn test_future_labels_restricted_to_training_labels() {
    let mut series = weather(40, 3);
    // keep only two labels in training
    let labels: Vec<Option<MoonPhase>> = series
        .dates()
        .iter()
        .map(|d| match label_for_date(*d) {
            MoonPhase::FullMoon | MoonPhase::Waning | MoonPhase::LastQuarter => Some(MoonPhase::FullMoon),
            _ => Some(MoonPhase::NewMoon),
        })
        .collect();
    let columns = series
        .column_names()
        .iter()
        .map(|name| (name.clone(), series.column(name).unwrap().to_vec()))
        .collect();
    series = DailySeries::new(series.dates().to_vec(), labels, columns).unwrap();

    let table = ForecastEngine::default().run(&series, 10).unwrap();
    for row in table.rows() {
        assert!(matches!(row.moon_phase, MoonPhase::NewMoon | MoonPhase::FullMoon));
    }
}

#[test]
fn test_gapped_series_is_regularized() {
    let full = weather(40, 4);
    let keep: Vec<usize> = (0..full.len()).filter(|i| *i != 10 && *i != 11).collect();

    let dates: Vec<NaiveDate> = keep.iter().map(|&i| full.dates()[i]).collect();
    let labels = keep.iter().map(|&i| full.moon_phases()[i]).collect();
    let columns = full
        .column_names()
        .iter()
        .map(|name| {
            let column = full.column(name).unwrap();
            (name.clone(), keep.iter().map(|&i| column[i]).collect())
        })
        .collect();
    let gapped = DailySeries::new(dates, labels, columns).unwrap();
    assert!(gapped.has_gaps());

    let table = ForecastEngine::default().run(&gapped, 5).unwrap();

    assert_eq!(table.rows()[0].date, full.last_date().unwrap() + Duration::days(1));
    assert_eq!(table.len(), 5);
}

#[test]
fn test_too_short_series_fails_to_fit() {
    let err = ForecastEngine::default().run(&weather(5, 5), 3).unwrap_err();
    assert_eq!(err.kind(), "model_fit");
}

#[test]
fn test_series_without_targets_is_rejected() {
    let dates: Vec<NaiveDate> = (0..20).map(|i| start() + Duration::days(i)).collect();
    let labels = dates.iter().map(|d| Some(label_for_date(*d))).collect();
    let series = DailySeries::new(dates, labels, vec![("humidity".to_string(), vec![0.5; 20])]).unwrap();

    let err = ForecastEngine::default().run(&series, 3).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_zero_horizon_is_rejected() {
    let err = ForecastEngine::default().run(&weather(30, 6), 0).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_custom_model_table() {
    let table = ModelTable::new(vec![(AIR_TEMP.to_string(), ModelSpec::arima(1, 1, 0))]).unwrap();
    let engine = ForecastEngine::new(table);

    let forecast = engine.run(&weather(30, 7), 4).unwrap();

    assert_eq!(forecast.targets(), &[AIR_TEMP.to_string()]);
    assert!(forecast.column(PRESSURE).is_none());
    assert_eq!(forecast.column(AIR_TEMP).unwrap().len(), 4);
}

#[test]
fn test_backtest_scores_every_target() {
    let series = weather(60, 8);
    let report = ForecastEngine::default().backtest(&series, 7).unwrap();

    assert_eq!(report.holdout, 7);
    assert_eq!(report.accuracy.len(), 3);
    for (target, accuracy) in &report.accuracy {
        assert!(accuracy.rmse.is_finite(), "{} rmse not finite", target);
        assert!(accuracy.mae <= accuracy.rmse + 1e-12);
    }

    assert!(ForecastEngine::default().backtest(&series, 0).is_err());
    assert!(ForecastEngine::default().backtest(&series, 60).is_err());
}

#[test]
fn test_table_lookup_and_csv() {
    let table = ForecastEngine::default().run(&weather(30, 9), 3).unwrap();
    let last = table.rows()[2].clone();

    // dates past the horizon fall back to the final row
    let later = last.date + Duration::days(30);
    assert_eq!(table.row_for(later), Some(&last));
    assert_eq!(table.row_for(table.rows()[0].date), Some(&table.rows()[0]));

    let mut buffer = Cursor::new(Vec::new());
    table.write_csv_to(&mut buffer).unwrap();
    let text = String::from_utf8(buffer.into_inner()).unwrap();
    let mut lines = text.lines();

    assert_eq!(
        lines.next(),
        Some("date,moon_phase,air_temp_C,pressure_kPa,wind_speed_m_s")
    );
    assert_eq!(lines.count(), 3);
}
