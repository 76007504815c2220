use approx::assert_relative_eq;
use chrono::{Duration, NaiveDate};
use lunacast::utils::{forecast_accuracy, future_dates, infer_step};
use pretty_assertions::assert_eq;

fn date(s: &str) -> NaiveDate {
    s.parse().unwrap()
}

#[test]
fn test_infer_step() {
    let daily = [date("2025-01-01"), date("2025-01-02"), date("2025-01-03")];
    assert_eq!(infer_step(&daily), Duration::days(1));

    let weekly = [date("2025-01-01"), date("2025-01-08"), date("2025-01-15")];
    assert_eq!(infer_step(&weekly), Duration::days(7));

    let gapped = [date("2025-01-01"), date("2025-01-02"), date("2025-01-05")];
    assert_eq!(infer_step(&gapped), Duration::days(1));

    assert_eq!(infer_step(&[date("2025-01-01")]), Duration::days(1));
}

#[test]
fn test_future_dates() {
    let dates = future_dates(date("2024-12-30"), 3, Duration::days(1)).unwrap();
    assert_eq!(dates, vec![date("2024-12-31"), date("2025-01-01"), date("2025-01-02")]);
    assert!(future_dates(date("2024-12-30"), 0, Duration::days(1)).unwrap().is_empty());
}

#[test]
fn test_future_dates_past_calendar_end() {
    let err = future_dates(NaiveDate::MAX, 1, Duration::days(1)).unwrap_err();
    assert_eq!(err.kind(), "validation");
}

#[test]
fn test_forecast_accuracy() {
    let accuracy = forecast_accuracy(&[11.0, 19.0, 30.0], &[10.0, 20.0, 30.0]).unwrap();

    assert_relative_eq!(accuracy.mae, 2.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(accuracy.mse, 2.0 / 3.0, epsilon = 1e-12);
    assert_relative_eq!(accuracy.rmse, (2.0_f64 / 3.0).sqrt(), epsilon = 1e-12);
    assert!(accuracy.mape > 0.0 && accuracy.smape > 0.0);

    assert!(forecast_accuracy(&[1.0], &[1.0, 2.0]).is_err());
    assert!(forecast_accuracy(&[], &[]).is_err());
}
