//! Runtime configuration for forecast requests

use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Days between "today" and the last date the historical source has published
pub const DEFAULT_LAG_DAYS: u32 = 3;
/// Radius within which a query reuses a stored coordinate
pub const DEFAULT_MATCH_RADIUS_KM: f64 = 20.0;
/// Concurrent per-day requests during ingestion
pub const DEFAULT_WORKER_POOL_WIDTH: usize = 10;
/// Per-request HTTP timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;
/// Days of history fetched for a new dataset
pub const DEFAULT_LOOKBACK_DAYS: u32 = 400;
/// Largest accepted source lag
pub const MAX_LAG_DAYS: u32 = 3650;
/// Largest accepted forecast horizon in steps
pub const MAX_HORIZON_DAYS: usize = 3660;

/// Historical data provider used to build datasets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    /// NASA POWER daily point API, one request per day
    Power,
    /// Open-Meteo hourly archive, aggregated to daily means
    OpenMeteo,
    /// Seeded offline generator
    Synthetic,
}

impl SourceKind {
    pub fn as_str(self) -> &'static str {
        match self {
            SourceKind::Power => "power",
            SourceKind::OpenMeteo => "open-meteo",
            SourceKind::Synthetic => "synthetic",
        }
    }
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SourceKind {
    type Err = ForecastError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "power" | "nasa" | "nasa-power" => Ok(SourceKind::Power),
            "open-meteo" | "openmeteo" | "open_meteo" => Ok(SourceKind::OpenMeteo),
            "synthetic" => Ok(SourceKind::Synthetic),
            other => Err(ForecastError::ConfigError(format!(
                "unknown data source '{}'",
                other
            ))),
        }
    }
}

/// Configuration for the forecasting pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Publication lag of the historical source in days
    pub lag_days: u32,
    /// Coordinate reuse radius in kilometres
    pub match_radius_km: f64,
    /// Width of the ingestion worker pool
    pub worker_pool_width: usize,
    /// Timeout applied to each ingestion HTTP request
    pub request_timeout: Duration,
    /// Days of history per dataset
    pub lookback_days: u32,
    /// Root directory of the dataset cache
    pub data_root: PathBuf,
    /// JSON file holding previously accepted coordinates
    pub coordinate_store: PathBuf,
    /// Which historical source builds new datasets
    pub source: SourceKind,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        let data_root = PathBuf::from("./data");
        Self {
            lag_days: DEFAULT_LAG_DAYS,
            match_radius_km: DEFAULT_MATCH_RADIUS_KM,
            worker_pool_width: DEFAULT_WORKER_POOL_WIDTH,
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            lookback_days: DEFAULT_LOOKBACK_DAYS,
            coordinate_store: data_root.join("saved_coords.json"),
            data_root,
            source: SourceKind::Power,
        }
    }
}

impl ForecastConfig {
    /// Load configuration from `LUNACAST_*` environment variables
    ///
    /// Unset or unparseable variables fall back to the defaults.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let data_root = env::var("LUNACAST_DATA_ROOT")
            .ok()
            .map(PathBuf::from)
            .unwrap_or(defaults.data_root);
        let coordinate_store = env::var("LUNACAST_COORDINATE_STORE")
            .ok()
            .map(PathBuf::from)
            .unwrap_or_else(|| data_root.join("saved_coords.json"));

        Self {
            lag_days: env::var("LUNACAST_LAG_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lag_days),
            match_radius_km: env::var("LUNACAST_MATCH_RADIUS_KM")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.match_radius_km),
            worker_pool_width: env::var("LUNACAST_WORKERS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.worker_pool_width),
            request_timeout: env::var("LUNACAST_REQUEST_TIMEOUT_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.request_timeout),
            lookback_days: env::var("LUNACAST_LOOKBACK_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.lookback_days),
            data_root,
            coordinate_store,
            source: env::var("LUNACAST_SOURCE")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.source),
        }
    }

    /// Point the cache and coordinate store at a new root directory
    #[must_use]
    pub fn with_data_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.data_root = root.into();
        self.coordinate_store = self.data_root.join("saved_coords.json");
        self
    }

    /// Check that every value is usable
    ///
    /// # Errors
    ///
    /// Returns [`ForecastError::ConfigError`] naming the first bad value
    pub fn validate(&self) -> Result<()> {
        if !self.match_radius_km.is_finite() || self.match_radius_km < 0.0 {
            return Err(ForecastError::ConfigError(format!(
                "match_radius_km must be a non-negative number, got {}",
                self.match_radius_km
            )));
        }
        if self.worker_pool_width == 0 {
            return Err(ForecastError::ConfigError(
                "worker_pool_width must be at least 1".to_string(),
            ));
        }
        if self.request_timeout.is_zero() {
            return Err(ForecastError::ConfigError(
                "request_timeout must be positive".to_string(),
            ));
        }
        if self.lag_days > MAX_LAG_DAYS {
            return Err(ForecastError::ConfigError(format!(
                "lag_days must be at most {}, got {}",
                MAX_LAG_DAYS, self.lag_days
            )));
        }
        if self.lookback_days < 2 {
            return Err(ForecastError::ConfigError(format!(
                "lookback_days must be at least 2, got {}",
                self.lookback_days
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = ForecastConfig::default();
        assert_eq!(config.lag_days, 3);
        assert_eq!(config.lookback_days, 400);
        assert_eq!(
            config.coordinate_store,
            PathBuf::from("./data").join("saved_coords.json")
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rejects_zero_workers() {
        let config = ForecastConfig {
            worker_pool_width: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ForecastError::ConfigError(_))
        ));
    }

    #[test]
    fn test_rejects_oversized_lag() {
        let config = ForecastConfig {
            lag_days: u32::MAX,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ForecastError::ConfigError(_))
        ));

        let at_limit = ForecastConfig {
            lag_days: MAX_LAG_DAYS,
            ..Default::default()
        };
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn test_source_kind_parse() {
        assert_eq!("open-meteo".parse::<SourceKind>().unwrap(), SourceKind::OpenMeteo);
        assert_eq!("POWER".parse::<SourceKind>().unwrap(), SourceKind::Power);
        assert!("carrier-pigeon".parse::<SourceKind>().is_err());
    }
}
