//! Historical data ingestion
//!
//! A [`DataSource`] turns a coordinate and an inclusive date range into a
//! validated [`DailySeries`] with the four target columns and moon labels.
//! Per-day problems are collected in a [`BatchReport`] rather than aborting
//! the fetch; only a range with nothing usable is an error.

use crate::data::{fill_missing, DailySeries};
use crate::error::{ForecastError, Result};
use crate::location::Coordinate;
use crate::models::{AIR_TEMP, PRESSURE, WATER_TEMP, WIND_SPEED};
use chrono::{Duration, NaiveDate};
use lunar_math::label_for_date;
use lunar_math::smoothing::estimate_water_temperature;
use std::collections::BTreeMap;
use std::fmt;
use tracing::{debug, info, warn};

pub mod open_meteo;
pub mod power;
pub mod synthetic;

pub use open_meteo::OpenMeteoSource;
pub use power::PowerSource;
pub use synthetic::SyntheticSource;

/// Provider of historical daily observations
pub trait DataSource: Send + Sync {
    /// Short provider name recorded in dataset manifests
    fn name(&self) -> &str;

    /// Fetch `start..=end` at `coordinate`
    ///
    /// # Errors
    ///
    /// [`ForecastError::DataUnavailableError`] when no day in the range
    /// produced usable values
    fn fetch(&self, coordinate: &Coordinate, start: NaiveDate, end: NaiveDate)
        -> Result<DailySeries>;
}

impl<T: DataSource + ?Sized> DataSource for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        coordinate: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<DailySeries> {
        (**self).fetch(coordinate, start, end)
    }
}

/// One day of observations with every value present
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DailyRecord {
    pub date: NaiveDate,
    pub air_temp_c: f64,
    pub pressure_kpa: f64,
    pub wind_speed_m_s: f64,
}

/// Why a single day was dropped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Transport error or non-success status
    Request,
    /// Response body did not have the expected shape
    Parse,
    /// Provider reported the missing-value sentinel
    Missing,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            FailureKind::Request => "request",
            FailureKind::Parse => "parse",
            FailureKind::Missing => "missing",
        };
        f.write_str(s)
    }
}

/// A day excluded from the batch
#[derive(Debug, Clone, PartialEq)]
pub struct DayFailure {
    pub date: NaiveDate,
    pub kind: FailureKind,
    pub reason: String,
}

impl DayFailure {
    pub fn new(date: NaiveDate, kind: FailureKind, reason: impl Into<String>) -> Self {
        Self {
            date,
            kind,
            reason: reason.into(),
        }
    }
}

/// Summary of a fail-soft batch of per-day work
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BatchReport {
    pub requested: usize,
    pub succeeded: usize,
    pub failures: Vec<DayFailure>,
}

impl BatchReport {
    /// Split per-day results into records and a report
    pub fn collect(
        results: Vec<std::result::Result<DailyRecord, DayFailure>>,
    ) -> (Vec<DailyRecord>, Self) {
        let requested = results.len();
        let mut records = Vec::with_capacity(requested);
        let mut failures = Vec::new();

        for result in results {
            match result {
                Ok(record) => records.push(record),
                Err(failure) => {
                    debug!(date = %failure.date, kind = %failure.kind, reason = %failure.reason, "Day excluded");
                    failures.push(failure);
                }
            }
        }
        failures.sort_by_key(|f| f.date);

        let report = Self {
            requested,
            succeeded: records.len(),
            failures,
        };
        (records, report)
    }

    pub fn failed(&self) -> usize {
        self.failures.len()
    }

    /// Count failures of one kind
    pub fn count(&self, kind: FailureKind) -> usize {
        self.failures.iter().filter(|f| f.kind == kind).count()
    }

    /// Emit the summary as a single log event
    pub fn log(&self, provider: &str) {
        if self.failures.is_empty() {
            info!(provider, requested = self.requested, "Fetched every requested day");
        } else {
            warn!(
                provider,
                requested = self.requested,
                succeeded = self.succeeded,
                request_errors = self.count(FailureKind::Request),
                parse_errors = self.count(FailureKind::Parse),
                missing = self.count(FailureKind::Missing),
                "Some days could not be fetched"
            );
        }
    }
}

/// Every calendar day in `start..=end`
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let mut dates = Vec::new();
    let mut day = start;
    while day <= end {
        dates.push(day);
        day += Duration::days(1);
    }
    dates
}

/// Reject an inverted range
pub fn check_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if end < start {
        return Err(ForecastError::validation(
            "date_range",
            format!("end {} is before start {}", end, start),
        ));
    }
    Ok(())
}

/// Build the merged daily series from per-day records
///
/// The result spans the first to the last record day with no gaps. Days
/// without a record are forward then backward filled. Water temperature is
/// the smoothed air temperature and every day gets its moon label.
pub fn assemble_series(provider: &str, records: Vec<DailyRecord>) -> Result<DailySeries> {
    let by_date: BTreeMap<NaiveDate, DailyRecord> =
        records.into_iter().map(|r| (r.date, r)).collect();

    let (first, last) = match (by_date.keys().next(), by_date.keys().next_back()) {
        (Some(first), Some(last)) => (*first, *last),
        _ => {
            return Err(ForecastError::unavailable(
                provider,
                "no usable days in the requested range",
            ))
        }
    };

    let dates = date_range(first, last);
    let pick = |f: fn(&DailyRecord) -> f64| -> Vec<Option<f64>> {
        dates
            .iter()
            .map(|d| by_date.get(d).map(f).filter(|v| v.is_finite()))
            .collect()
    };

    let fill = |name: &str, values: Vec<Option<f64>>| -> Result<Vec<f64>> {
        fill_missing(&values)
            .ok_or_else(|| ForecastError::unavailable(provider, format!("no values for {}", name)))
    };

    let air = fill(AIR_TEMP, pick(|r| r.air_temp_c))?;
    let pressure = fill(PRESSURE, pick(|r| r.pressure_kpa))?;
    let wind = fill(WIND_SPEED, pick(|r| r.wind_speed_m_s))?;
    let water = estimate_water_temperature(&air)?;

    let labels = dates.iter().map(|d| Some(label_for_date(*d))).collect();

    if dates.len() > by_date.len() {
        debug!(
            provider,
            filled = dates.len() - by_date.len(),
            "Filled days missing from the source"
        );
    }

    DailySeries::new(
        dates,
        labels,
        vec![
            (AIR_TEMP.to_string(), air),
            (PRESSURE.to_string(), pressure),
            (WIND_SPEED.to_string(), wind),
            (WATER_TEMP.to_string(), water),
        ],
    )
}
