//! Open-Meteo historical archive client
//!
//! A single hourly request covers the whole range; hours are averaged into
//! UTC calendar days.

use super::{assemble_series, check_range, BatchReport, DailyRecord, DataSource, DayFailure, FailureKind};
use crate::config::ForecastConfig;
use crate::data::{parse_date, DailySeries};
use crate::error::{ForecastError, Result};
use crate::location::Coordinate;
use chrono::NaiveDate;
use reqwest::blocking::Client;
use serde::Deserialize;
use statrs::statistics::Statistics;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::info;

/// Archive endpoint
pub const OPEN_METEO_ARCHIVE_URL: &str = "https://archive-api.open-meteo.com/v1/archive";
/// Hourly variables requested from the archive
pub const HOURLY_VARIABLES: [&str; 3] = ["temperature_2m", "surface_pressure", "wind_speed_10m"];

#[derive(Debug, Deserialize)]
struct ArchiveResponse {
    hourly: HourlyBlock,
}

#[derive(Debug, Deserialize)]
struct HourlyBlock {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    /// hPa
    surface_pressure: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
}

/// Open-Meteo archive data source
#[derive(Debug, Clone)]
pub struct OpenMeteoSource {
    client: Client,
    base_url: String,
}

impl OpenMeteoSource {
    pub fn new(config: &ForecastConfig) -> Result<Self> {
        Self::with_settings(OPEN_METEO_ARCHIVE_URL, config.request_timeout)
    }

    pub fn with_settings(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: Client::builder().timeout(timeout).build()?,
            base_url: base_url.into(),
        })
    }

    fn request(&self, coordinate: &Coordinate, start: NaiveDate, end: NaiveDate) -> Result<HourlyBlock> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[
                ("latitude", format!("{:.4}", coordinate.latitude())),
                ("longitude", format!("{:.4}", coordinate.longitude())),
                ("start_date", start.to_string()),
                ("end_date", end.to_string()),
                ("hourly", HOURLY_VARIABLES.join(",")),
                ("wind_speed_unit", "ms".to_string()),
                ("timezone", "UTC".to_string()),
            ])
            .send()
            .map_err(|e| ForecastError::unavailable(self.name(), e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ForecastError::unavailable(
                self.name(),
                format!("archive returned {}", status),
            ));
        }

        let body: ArchiveResponse = response
            .json()
            .map_err(|e| ForecastError::unavailable(self.name(), format!("malformed response: {}", e)))?;
        Ok(body.hourly)
    }
}

/// Hourly values of one day, one bucket per variable
type DayBuckets = [Vec<f64>; 3];

/// Average hourly values into daily records
fn aggregate_daily(hourly: &HourlyBlock) -> Vec<std::result::Result<DailyRecord, DayFailure>> {
    let mut days: BTreeMap<NaiveDate, DayBuckets> = BTreeMap::new();

    for (i, stamp) in hourly.time.iter().enumerate() {
        let Some(date) = parse_date(stamp) else {
            continue;
        };
        let bucket = days.entry(date).or_default();
        let columns = [&hourly.temperature_2m, &hourly.surface_pressure, &hourly.wind_speed_10m];
        for (values, column) in bucket.iter_mut().zip(columns) {
            if let Some(v) = column.get(i).copied().flatten().filter(|v| v.is_finite()) {
                values.push(v);
            }
        }
    }

    days.into_iter()
        .map(|(date, [temp, pressure, wind])| {
            if temp.is_empty() || pressure.is_empty() || wind.is_empty() {
                return Err(DayFailure::new(date, FailureKind::Missing, "no hourly values"));
            }
            Ok(DailyRecord {
                date,
                air_temp_c: temp.mean(),
                pressure_kpa: pressure.mean() / 10.0,
                wind_speed_m_s: wind.mean(),
            })
        })
        .collect()
}

impl DataSource for OpenMeteoSource {
    fn name(&self) -> &str {
        "open-meteo"
    }

    fn fetch(&self, coordinate: &Coordinate, start: NaiveDate, end: NaiveDate) -> Result<DailySeries> {
        check_range(start, end)?;
        info!(coordinate = %coordinate, %start, %end, "Fetching Open-Meteo archive");

        let hourly = self.request(coordinate, start, end)?;
        let (records, report) = BatchReport::collect(aggregate_daily(&hourly));
        report.log(self.name());

        assemble_series(self.name(), records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_aggregate_daily_means() {
        let hourly = HourlyBlock {
            time: vec![
                "2024-05-01T00:00".into(),
                "2024-05-01T01:00".into(),
                "2024-05-02T00:00".into(),
            ],
            temperature_2m: vec![Some(10.0), Some(12.0), None],
            surface_pressure: vec![Some(1000.0), Some(1010.0), Some(990.0)],
            wind_speed_10m: vec![Some(2.0), None, Some(3.0)],
        };

        let days = aggregate_daily(&hourly);
        assert_eq!(days.len(), 2);

        let first = days[0].as_ref().unwrap();
        assert!((first.air_temp_c - 11.0).abs() < 1e-12);
        assert!((first.pressure_kpa - 100.5).abs() < 1e-12);
        assert!((first.wind_speed_m_s - 2.0).abs() < 1e-12);

        let second = days[1].as_ref().unwrap_err();
        assert_eq!(second.kind, FailureKind::Missing);
    }
}
