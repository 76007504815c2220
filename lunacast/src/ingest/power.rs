//! NASA POWER daily point client
//!
//! POWER is queried one calendar day per request so a single bad day only
//! costs that day. Requests run on a bounded rayon pool.

use super::{assemble_series, check_range, date_range, BatchReport, DailyRecord, DataSource, DayFailure, FailureKind};
use crate::config::ForecastConfig;
use crate::data::{DailySeries, MISSING_SENTINEL};
use crate::error::{ForecastError, Result};
use crate::location::Coordinate;
use chrono::NaiveDate;
use rayon::prelude::*;
use reqwest::blocking::Client;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::info;

/// Daily point endpoint
pub const POWER_DAILY_URL: &str = "https://power.larc.nasa.gov/api/temporal/daily/point";
/// Requested parameters: 2 m temperature, surface pressure (kPa), 10 m wind
pub const POWER_PARAMETERS: [&str; 3] = ["T2M", "PS", "WS10M"];

#[derive(Debug, Deserialize)]
struct PowerResponse {
    properties: PowerProperties,
}

#[derive(Debug, Deserialize)]
struct PowerProperties {
    parameter: HashMap<String, HashMap<String, f64>>,
}

/// NASA POWER data source
#[derive(Debug, Clone)]
pub struct PowerSource {
    client: Client,
    base_url: String,
    workers: usize,
}

impl PowerSource {
    /// Build a client from the pipeline configuration
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        Self::with_settings(POWER_DAILY_URL, config.worker_pool_width, config.request_timeout)
    }

    /// Build a client against a specific endpoint
    pub fn with_settings(base_url: impl Into<String>, workers: usize, timeout: Duration) -> Result<Self> {
        if workers == 0 {
            return Err(ForecastError::ConfigError(
                "POWER worker pool needs at least one worker".to_string(),
            ));
        }
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
            workers,
        })
    }

    /// Fetch every day in the range, collecting per-day failures
    pub fn fetch_batch(
        &self,
        coordinate: &Coordinate,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<(Vec<DailyRecord>, BatchReport)> {
        check_range(start, end)?;
        let dates = date_range(start, end);

        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.workers)
            .thread_name(|i| format!("power-fetch-{}", i))
            .build()
            .map_err(|e| ForecastError::ConfigError(format!("worker pool: {}", e)))?;

        info!(
            coordinate = %coordinate,
            days = dates.len(),
            workers = self.workers,
            "Fetching NASA POWER daily values"
        );

        let results: Vec<_> = pool.install(|| {
            dates
                .par_iter()
                .map(|date| self.fetch_day(coordinate, *date))
                .collect()
        });

        let (records, report) = BatchReport::collect(results);
        report.log(self.name());
        Ok((records, report))
    }

    fn fetch_day(
        &self,
        coordinate: &Coordinate,
        date: NaiveDate,
    ) -> std::result::Result<DailyRecord, DayFailure> {
        let stamp = date.format("%Y%m%d").to_string();
        let request_failed = |e: reqwest::Error| DayFailure::new(date, FailureKind::Request, e.to_string());

        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("parameters", POWER_PARAMETERS.join(",")),
                ("community", "RE".to_string()),
                ("longitude", format!("{:.4}", coordinate.longitude())),
                ("latitude", format!("{:.4}", coordinate.latitude())),
                ("start", stamp.clone()),
                ("end", stamp.clone()),
                ("format", "JSON".to_string()),
            ])
            .send()
            .map_err(request_failed)?
            .error_for_status()
            .map_err(request_failed)?;

        let body: PowerResponse = response
            .json()
            .map_err(|e| DayFailure::new(date, FailureKind::Parse, e.to_string()))?;

        parse_day(&body.properties.parameter, date, &stamp)
    }
}

fn parse_day(
    parameter: &HashMap<String, HashMap<String, f64>>,
    date: NaiveDate,
    stamp: &str,
) -> std::result::Result<DailyRecord, DayFailure> {
    let mut values = [0.0; 3];
    let mut missing = Vec::new();

    for (slot, name) in values.iter_mut().zip(POWER_PARAMETERS) {
        let value = parameter
            .get(name)
            .and_then(|series| series.get(stamp))
            .copied()
            .ok_or_else(|| {
                DayFailure::new(date, FailureKind::Parse, format!("{} has no value for {}", name, stamp))
            })?;
        if value == MISSING_SENTINEL || !value.is_finite() {
            missing.push(name);
        }
        *slot = value;
    }

    if !missing.is_empty() {
        return Err(DayFailure::new(
            date,
            FailureKind::Missing,
            format!("sentinel for {}", missing.join(",")),
        ));
    }

    Ok(DailyRecord {
        date,
        air_temp_c: values[0],
        pressure_kpa: values[1],
        wind_speed_m_s: values[2],
    })
}

impl DataSource for PowerSource {
    fn name(&self) -> &str {
        "nasa-power"
    }

    fn fetch(&self, coordinate: &Coordinate, start: NaiveDate, end: NaiveDate) -> Result<DailySeries> {
        let (records, report) = self.fetch_batch(coordinate, start, end)?;
        if records.is_empty() {
            return Err(ForecastError::unavailable(
                self.name(),
                format!("all {} days failed", report.requested),
            ));
        }
        assemble_series(self.name(), records)
    }
}
