//! Per-target seasonal ARIMA forecasting over a daily series

use crate::data::{DailySeries, DATE_COLUMN, MOON_PHASE_COLUMN};
use crate::error::{ForecastError, Result};
use crate::exog::MoonDummies;
use crate::horizon::check_horizon;
use crate::models::sarimax::SarimaxModel;
use crate::models::{ForecastModel, ModelTable, TrainedForecastModel};
use crate::utils::{forecast_accuracy, future_dates, infer_step, ForecastAccuracy};
use chrono::{Duration, NaiveDate};
use lunar_math::MoonPhase;
use polars::prelude::*;
use std::borrow::Cow;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use tracing::{debug, info};

/// One forecast day
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRow {
    pub date: NaiveDate,
    pub moon_phase: MoonPhase,
    /// One value per target, in table order
    pub values: Vec<f64>,
}

/// Forecast rows for consecutive future dates
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastTable {
    targets: Vec<String>,
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    pub fn new(targets: Vec<String>, rows: Vec<ForecastRow>) -> Result<Self> {
        if let Some(row) = rows.iter().find(|r| r.values.len() != targets.len()) {
            return Err(ForecastError::validation(
                "forecast",
                format!(
                    "row {} has {} values for {} targets",
                    row.date,
                    row.values.len(),
                    targets.len()
                ),
            ));
        }
        Ok(Self { targets, rows })
    }

    pub fn targets(&self) -> &[String] {
        &self.targets
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Forecast values of one target
    pub fn column(&self, target: &str) -> Option<Vec<f64>> {
        let idx = self.targets.iter().position(|t| t == target)?;
        Some(self.rows.iter().map(|row| row.values[idx]).collect())
    }

    /// Value of `target` in `row`
    pub fn value(&self, row: &ForecastRow, target: &str) -> Option<f64> {
        let idx = self.targets.iter().position(|t| t == target)?;
        row.values.get(idx).copied()
    }

    /// Row for `date`, or the last row when that date is not forecast
    pub fn row_for(&self, date: NaiveDate) -> Option<&ForecastRow> {
        self.rows
            .iter()
            .find(|row| row.date == date)
            .or_else(|| self.rows.last())
    }

    /// Convert to a DataFrame: `date`, `moon_phase`, then one column per target
    pub fn to_dataframe(&self) -> Result<DataFrame> {
        let dates: Vec<String> = self.rows.iter().map(|r| r.date.to_string()).collect();
        let labels: Vec<&str> = self.rows.iter().map(|r| r.moon_phase.as_str()).collect();

        let mut series = vec![
            Series::new(DATE_COLUMN, dates),
            Series::new(MOON_PHASE_COLUMN, labels),
        ];
        for (idx, target) in self.targets.iter().enumerate() {
            let values: Vec<f64> = self.rows.iter().map(|r| r.values[idx]).collect();
            series.push(Series::new(target, values));
        }

        Ok(DataFrame::new(series)?)
    }

    pub fn write_csv_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        let mut df = self.to_dataframe()?;
        CsvWriter::new(writer).has_header(true).finish(&mut df)?;
        Ok(())
    }

    pub fn write_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut file = File::create(path)?;
        self.write_csv_to(&mut file)
    }
}

/// Accuracy of a holdout backtest, per target
#[derive(Debug, Clone, PartialEq)]
pub struct BacktestReport {
    pub holdout: usize,
    pub accuracy: Vec<(String, ForecastAccuracy)>,
}

/// Series ready for fitting together with its step
///
/// Irregular spacing of a daily series means missing days; those are filled
/// before fitting.
pub(crate) fn fitting_series(series: &DailySeries) -> (Cow<'_, DailySeries>, Duration) {
    let step = infer_step(series.dates());
    if step == Duration::days(1) && series.has_gaps() {
        (Cow::Owned(series.regularize()), step)
    } else {
        (Cow::Borrowed(series), step)
    }
}

/// Fits one SARIMAX per target with lunar dummy regressors
#[derive(Debug, Clone, Default)]
pub struct ForecastEngine {
    models: ModelTable,
}

impl ForecastEngine {
    pub fn new(models: ModelTable) -> Self {
        Self { models }
    }

    pub fn models(&self) -> &ModelTable {
        &self.models
    }

    /// Forecast `horizon` steps past the end of `series`
    ///
    /// Every target in the model table that the series carries is fitted.
    /// Any failed fit fails the whole forecast.
    pub fn run(&self, series: &DailySeries, horizon: usize) -> Result<ForecastTable> {
        if horizon == 0 {
            return Err(ForecastError::validation("horizon", "must be at least 1"));
        }
        check_horizon(horizon)?;
        let last = series
            .last_date()
            .ok_or_else(|| ForecastError::validation("series", "is empty"))?;

        let targets: Vec<&str> = self
            .models
            .targets()
            .filter(|t| series.column(t).is_some())
            .collect();
        if targets.is_empty() {
            return Err(ForecastError::validation(
                "series",
                format!(
                    "has none of the target columns {:?}",
                    self.models.targets().collect::<Vec<_>>()
                ),
            ));
        }

        let (prepared, step) = fitting_series(series);
        let series: &DailySeries = &prepared;

        let dummies = MoonDummies::fit(series.moon_phases());
        let train_x = dummies.encode(series.moon_phases());

        let dates = future_dates(last, horizon, step)?;
        let labels = dummies.future_labels(&dates);
        let future_labels: Vec<Option<MoonPhase>> = labels.iter().copied().map(Some).collect();
        let future_x = dummies.encode(&future_labels);

        debug!(
            observed = ?dummies.observed(),
            columns = ?dummies.column_names(),
            "Built lunar regressors"
        );

        let mut columns = Vec::with_capacity(targets.len());
        for target in &targets {
            let spec = self
                .models
                .get(target)
                .copied()
                .ok_or_else(|| ForecastError::ConfigError(format!("no model for {}", target)))?;
            let y = series
                .column(target)
                .ok_or_else(|| ForecastError::validation(*target, "column is missing"))?;

            let fitted = SarimaxModel::new(spec)?.fit(target, y, &train_x)?;
            debug!(variable = *target, aic = fitted.aic(), "Model selected");
            columns.push(fitted.forecast(horizon, &future_x)?);
        }

        let rows = dates
            .iter()
            .zip(labels)
            .enumerate()
            .map(|(i, (date, moon_phase))| ForecastRow {
                date: *date,
                moon_phase,
                values: columns.iter().map(|c| c[i]).collect(),
            })
            .collect();

        info!(
            horizon,
            targets = targets.len(),
            history = series.len(),
            "Forecast complete"
        );

        ForecastTable::new(targets.iter().map(|t| t.to_string()).collect(), rows)
    }

    /// Forecast the last `holdout` days from the rest and score the result
    pub fn backtest(&self, series: &DailySeries, holdout: usize) -> Result<BacktestReport> {
        if holdout == 0 || holdout >= series.len() {
            return Err(ForecastError::validation(
                "holdout",
                format!("must be between 1 and {}", series.len().saturating_sub(1)),
            ));
        }

        let split = series.len() - holdout;
        let train = series.slice(0, Some(split))?;
        let test = series.slice(split, None)?;
        let table = self.run(&train, holdout)?;

        let mut accuracy = Vec::with_capacity(table.targets().len());
        for target in table.targets() {
            let (forecast, actual) = match (table.column(target), test.column(target)) {
                (Some(f), Some(a)) => (f, a),
                _ => continue,
            };
            accuracy.push((target.clone(), forecast_accuracy(&forecast, actual)?));
        }

        Ok(BacktestReport { holdout, accuracy })
    }
}
