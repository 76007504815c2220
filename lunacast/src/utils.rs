//! Utility functions for the lunacast crate

use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate};
use statrs::statistics::Statistics;

/// Infer the spacing of a date sequence
///
/// Returns the common step when every consecutive pair is equally spaced,
/// otherwise (or with fewer than two dates) one day.
pub fn infer_step(dates: &[NaiveDate]) -> Duration {
    let mut diffs = dates.windows(2).map(|w| w[1] - w[0]);
    match diffs.next() {
        Some(first) if first > Duration::zero() && diffs.all(|d| d == first) => first,
        _ => Duration::days(1),
    }
}

/// Create future dates for forecasting, stepping from `last`
///
/// # Errors
///
/// [`ForecastError::ValidationError`] if a date would leave the calendar range
pub fn future_dates(last: NaiveDate, horizon: usize, step: Duration) -> Result<Vec<NaiveDate>> {
    let mut dates = Vec::new();
    let mut current = last;

    for _ in 0..horizon {
        current = current
            .checked_add_signed(step)
            .ok_or_else(|| ForecastError::validation("horizon", "runs past the last representable date"))?;
        dates.push(current);
    }

    Ok(dates)
}

/// Calculate accuracy metrics for a forecast vs actual values
pub fn forecast_accuracy(forecast: &[f64], actual: &[f64]) -> Result<ForecastAccuracy> {
    if forecast.len() != actual.len() || forecast.is_empty() {
        return Err(ForecastError::validation(
            "forecast",
            "forecast and actual values must have the same non-zero length",
        ));
    }

    let errors: Vec<f64> = forecast
        .iter()
        .zip(actual.iter())
        .map(|(&f, &a)| a - f)
        .collect();

    let mae = errors.iter().map(|e| e.abs()).mean();
    let mse = errors.iter().map(|e| e.powi(2)).mean();
    let rmse = mse.sqrt();

    // zero actuals contribute nothing but still count towards n
    let n = forecast.len() as f64;
    let mape = actual
        .iter()
        .zip(errors.iter())
        .filter(|(&a, _)| a != 0.0)
        .map(|(&a, &e)| (e.abs() / a.abs()) * 100.0)
        .sum::<f64>()
        / n;

    let smape = actual
        .iter()
        .zip(forecast.iter())
        .map(|(&a, &f)| {
            let denom = a.abs() + f.abs();
            if denom == 0.0 {
                0.0
            } else {
                200.0 * (a - f).abs() / denom
            }
        })
        .mean();

    Ok(ForecastAccuracy {
        mae,
        mse,
        rmse,
        mape,
        smape,
    })
}

/// Forecast accuracy metrics
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastAccuracy {
    /// Mean Absolute Error
    pub mae: f64,
    /// Mean Squared Error
    pub mse: f64,
    /// Root Mean Squared Error
    pub rmse: f64,
    /// Mean Absolute Percentage Error
    pub mape: f64,
    /// Symmetric Mean Absolute Percentage Error
    pub smape: f64,
}

impl std::fmt::Display for ForecastAccuracy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "MAE {:.4}  MSE {:.4}  RMSE {:.4}  MAPE {:.2}%  SMAPE {:.2}%",
            self.mae, self.mse, self.rmse, self.mape, self.smape
        )
    }
}
