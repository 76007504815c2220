//! End-to-end forecast requests
//!
//! horizon → coordinate resolution → dataset cache → engine → optional CSV.
//! A coordinate that missed the store is registered only once its dataset
//! has been built.

use crate::cache::{validate_activity, DatasetCache, DatasetKey};
use crate::config::ForecastConfig;
use crate::data::DataLoader;
use crate::engine::{ForecastEngine, ForecastTable};
use crate::error::{ForecastError, Result};
use crate::horizon::{HorizonCalculator, HorizonPlan};
use crate::ingest::DataSource;
use crate::location::Coordinate;
use crate::resolver::{CoordinateResolver, CoordinateStore};
use chrono::{DateTime, NaiveDate, Utc};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// What the forecast should reach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    /// Forecast through this calendar date
    Date(NaiveDate),
    /// Forecast this many days past the as-of date
    Horizon(usize),
}

/// A forecast request
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastRequest {
    pub activity: String,
    pub latitude: f64,
    pub longitude: f64,
    pub target: Target,
    /// Overrides the configured source lag
    pub lag_days: Option<u32>,
    /// Where to write the forecast CSV, if anywhere
    pub output_dir: Option<PathBuf>,
}

impl ForecastRequest {
    pub fn new(activity: impl Into<String>, latitude: f64, longitude: f64, target: Target) -> Self {
        Self {
            activity: activity.into(),
            latitude,
            longitude,
            target,
            lag_days: None,
            output_dir: None,
        }
    }

    #[must_use]
    pub fn with_lag_days(mut self, lag_days: u32) -> Self {
        self.lag_days = Some(lag_days);
        self
    }

    #[must_use]
    pub fn with_output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.output_dir = Some(dir.into());
        self
    }
}

/// Result of a successful request
#[derive(Debug, Clone)]
pub struct ForecastOutcome {
    pub asof: NaiveDate,
    pub horizon: usize,
    /// Requested target date, when the request named one
    pub target_date: Option<NaiveDate>,
    /// Coordinate the dataset is keyed on
    pub coordinate: Coordinate,
    /// Whether a stored coordinate was reused
    pub reused: bool,
    pub dataset_dir: PathBuf,
    pub table: ForecastTable,
    pub output_path: Option<PathBuf>,
}

/// Forecast CSV file name
///
/// `merged_forecast_<h>[_to_<target>]_<activity>_<token>_asof_<asof>_<stamp>.csv`
pub fn output_file_name(
    horizon: usize,
    target: Option<NaiveDate>,
    activity: &str,
    coordinate: &Coordinate,
    asof: NaiveDate,
    stamp: DateTime<Utc>,
) -> String {
    format!(
        "merged_forecast_{}{}_{}_{}_asof_{}_{}.csv",
        horizon,
        target_suffix(target),
        activity.replace('/', "_"),
        coordinate.token(),
        asof,
        stamp.format("%Y%m%dT%H%M%SZ")
    )
}

/// Forecast CSV file name for a forecast made straight from a CSV file
pub fn csv_output_file_name(horizon: usize, target: Option<NaiveDate>, stamp: DateTime<Utc>) -> String {
    format!(
        "merged_forecast_{}{}_from_csv_{}.csv",
        horizon,
        target_suffix(target),
        stamp.format("%Y%m%dT%H%M%SZ")
    )
}

fn target_suffix(target: Option<NaiveDate>) -> String {
    target.map(|t| format!("_to_{}", t)).unwrap_or_default()
}

/// Runs forecast requests against a data source and coordinate store
#[derive(Debug)]
pub struct Orchestrator<D, S> {
    config: ForecastConfig,
    resolver: CoordinateResolver<S>,
    cache: DatasetCache<D>,
    engine: ForecastEngine,
    today: Option<NaiveDate>,
}

impl<D: DataSource, S: CoordinateStore> Orchestrator<D, S> {
    /// Create an orchestrator; the configuration is validated first
    pub fn new(config: ForecastConfig, source: D, store: S) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            resolver: CoordinateResolver::new(store, config.match_radius_km),
            cache: DatasetCache::new(&config.data_root, config.lookback_days, source),
            engine: ForecastEngine::default(),
            today: None,
            config,
        })
    }

    #[must_use]
    pub fn with_engine(mut self, engine: ForecastEngine) -> Self {
        self.engine = engine;
        self
    }

    /// Pin "today" instead of reading the UTC clock
    #[must_use]
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = Some(today);
        self
    }

    pub fn config(&self) -> &ForecastConfig {
        &self.config
    }

    pub fn resolver(&self) -> &CoordinateResolver<S> {
        &self.resolver
    }

    pub fn cache(&self) -> &DatasetCache<D> {
        &self.cache
    }

    pub fn engine(&self) -> &ForecastEngine {
        &self.engine
    }

    fn today(&self) -> NaiveDate {
        self.today.unwrap_or_else(|| Utc::now().date_naive())
    }

    /// Plan the horizon for a request
    pub fn plan(&self, request: &ForecastRequest) -> Result<HorizonPlan> {
        let calculator = HorizonCalculator::new(request.lag_days.unwrap_or(self.config.lag_days));
        match request.target {
            Target::Date(date) => calculator.compute_at(self.today(), date),
            Target::Horizon(horizon) => calculator.explicit_at(self.today(), horizon),
        }
    }

    /// Run one forecast request end to end
    pub fn run(&self, request: &ForecastRequest) -> Result<ForecastOutcome> {
        validate_activity(&request.activity)?;
        let query = Coordinate::new(request.latitude, request.longitude)?.quantized();

        let plan = self.plan(request)?;
        info!(
            activity = %request.activity,
            coordinate = %query,
            asof = %plan.asof,
            horizon = plan.horizon,
            "Starting forecast"
        );

        let resolution = self.resolver.find_existing(query);
        let key = DatasetKey::new(&request.activity, resolution.coordinate, plan.asof)?;
        let series = self.cache.ensure(&key)?;

        let coordinate = if resolution.found {
            resolution.coordinate
        } else {
            let registered = self.resolver.register(resolution.coordinate)?;
            if registered != resolution.coordinate {
                warn!(
                    requested = %resolution.coordinate,
                    registered = %registered,
                    "A nearby coordinate was registered concurrently"
                );
            }
            key.coordinate()
        };

        let table = self.engine.run(&series, plan.horizon)?;
        let target_date = match request.target {
            Target::Date(date) => Some(date),
            Target::Horizon(_) => None,
        };

        let output_path = match &request.output_dir {
            Some(dir) => {
                let name = output_file_name(
                    plan.horizon,
                    target_date,
                    &request.activity,
                    &coordinate,
                    plan.asof,
                    Utc::now(),
                );
                Some(write_table(&table, dir, &name)?)
            }
            None => None,
        };

        Ok(ForecastOutcome {
            asof: plan.asof,
            horizon: plan.horizon,
            target_date,
            coordinate,
            reused: resolution.found,
            dataset_dir: self.cache.dataset_dir(&key),
            table,
            output_path,
        })
    }

    /// Forecast a merged CSV directly, bypassing the cache and store
    ///
    /// A target date is measured from the last date in the file.
    pub fn forecast_from_csv<P: AsRef<Path>>(&self, path: P, target: Target) -> Result<ForecastTable> {
        let series = DataLoader::from_csv(path)?;
        let last = series
            .last_date()
            .ok_or_else(|| ForecastError::validation("series", "is empty"))?;

        let horizon = match target {
            Target::Horizon(horizon) => horizon,
            Target::Date(date) => {
                let days = (date - last).num_days();
                if days < 1 {
                    return Err(ForecastError::HorizonError {
                        target: date,
                        asof: last,
                        horizon: days,
                    });
                }
                days as usize
            }
        };
        self.engine.run(&series, horizon)
    }
}

/// Write a forecast table into `dir`, creating the directory if needed
pub fn write_table(table: &ForecastTable, dir: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(dir)?;
    let path = dir.join(name);
    table.write_csv(&path)?;
    info!(path = %path.display(), rows = table.len(), "Wrote forecast");
    Ok(path)
}
