//! # Lunacast
//!
//! Lunar-conditioned seasonal ARIMA forecasts of outdoor conditions at a
//! coordinate: air temperature, surface pressure, wind speed and an estimated
//! water temperature, each paired with the moon phase of the forecast day.
//!
//! ## Features
//!
//! - Forecast horizon planning around the upstream source lag
//! - Nearest-known coordinate reuse within a match radius
//! - On-disk dataset cache keyed by activity, coordinate and as-of date
//! - Daily ingestion from NASA POWER or Open-Meteo, plus a seeded offline source
//! - One SARIMAX per target with moon phase dummy regressors
//! - Optional qualitative scoring of each forecast day
//!
//! ## Quick Start
//!
//! ```no_run
//! use chrono::NaiveDate;
//! use lunacast::config::ForecastConfig;
//! use lunacast::ingest::synthetic::SyntheticSource;
//! use lunacast::orchestrator::{ForecastRequest, Orchestrator, Target};
//! use lunacast::resolver::MemoryCoordinateStore;
//!
//! let config = ForecastConfig::default().with_data_root("data");
//! let orchestrator = Orchestrator::new(config, SyntheticSource::new(7), MemoryCoordinateStore::new())?;
//!
//! let target = NaiveDate::from_ymd_opt(2025, 1, 10).unwrap();
//! let request = ForecastRequest::new("fishing", 50.4501, 30.5234, Target::Date(target));
//! let outcome = orchestrator.run(&request)?;
//!
//! for row in outcome.table.rows() {
//!     println!("{} {} {:?}", row.date, row.moon_phase, row.values);
//! }
//! # Ok::<(), lunacast::ForecastError>(())
//! ```

pub mod cache;
pub mod config;
pub mod data;
pub mod engine;
pub mod error;
pub mod evaluation;
pub mod exog;
pub mod horizon;
pub mod ingest;
pub mod location;
pub mod logging;
pub mod models;
pub mod orchestrator;
pub mod resolver;
pub mod utils;

// Re-export commonly used types
pub use crate::config::ForecastConfig;
pub use crate::data::{DailySeries, DataLoader};
pub use crate::engine::{ForecastEngine, ForecastTable};
pub use crate::error::{ForecastError, Result};
pub use crate::location::Coordinate;
pub use crate::models::{ForecastModel, ModelSpec, TrainedForecastModel};
pub use crate::orchestrator::{ForecastRequest, Orchestrator, Target};
pub use lunar_math::MoonPhase;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const NAME: &str = env!("CARGO_PKG_NAME");
