//! Error types for the lunacast crate

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use std::path::PathBuf;
use thiserror::Error;

/// Custom error types for the lunacast crate
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed request input: coordinate, activity slug, date range, series shape
    #[error("Validation error on '{field}': {reason}")]
    ValidationError { field: String, reason: String },

    /// Ingestion could not produce a usable series
    #[error("Data unavailable from {provider}: {reason}")]
    DataUnavailableError { provider: String, reason: String },

    /// Target date is not strictly after the as-of date
    #[error("Horizon error: target {target} gives horizon {horizon} from as-of {asof}")]
    HorizonError {
        target: NaiveDate,
        asof: NaiveDate,
        horizon: i64,
    },

    /// Seasonal ARIMA fit failed for a target variable
    #[error("Model fit error for '{target}': {reason}")]
    ModelFitError { target: String, reason: String },

    /// Persisted dataset, manifest or coordinate store is unreadable
    #[error("Cache corruption at {}: {reason}", path.display())]
    CacheCorruptionError { path: PathBuf, reason: String },

    /// Evaluation collaborator failed or returned malformed output
    #[error("Evaluation error: {0}")]
    EvaluationError(String),

    /// Invalid configuration value
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Error from lunar/numerical calculations
    #[error("Math error: {0}")]
    MathError(#[from] lunar_math::MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error from JSON encoding or decoding
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Error from the csv writer
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// Error from HTTP transport
    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl ForecastError {
    /// Shorthand for a [`ForecastError::ValidationError`]
    pub fn validation(field: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::ValidationError {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ForecastError::ModelFitError`]
    pub fn model_fit(target: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::ModelFitError {
            target: target.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ForecastError::DataUnavailableError`]
    pub fn unavailable(provider: impl Into<String>, reason: impl Into<String>) -> Self {
        ForecastError::DataUnavailableError {
            provider: provider.into(),
            reason: reason.into(),
        }
    }

    /// Shorthand for a [`ForecastError::CacheCorruptionError`]
    pub fn corruption(path: impl Into<PathBuf>, reason: impl ToString) -> Self {
        ForecastError::CacheCorruptionError {
            path: path.into(),
            reason: reason.to_string(),
        }
    }

    /// Stable machine-readable name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            ForecastError::ValidationError { .. } => "validation",
            ForecastError::DataUnavailableError { .. } => "data_unavailable",
            ForecastError::HorizonError { .. } => "horizon",
            ForecastError::ModelFitError { .. } => "model_fit",
            ForecastError::CacheCorruptionError { .. } => "cache_corruption",
            ForecastError::EvaluationError(_) => "evaluation",
            ForecastError::ConfigError(_) => "config",
            ForecastError::MathError(_) => "math",
            ForecastError::IoError(_) => "io",
            ForecastError::JsonError(_) => "json",
            ForecastError::CsvError(_) => "csv",
            ForecastError::HttpError(_) => "http",
            ForecastError::PolarsError(_) => "polars",
        }
    }
}
