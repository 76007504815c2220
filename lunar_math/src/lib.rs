//! # Lunar Math
//!
//! Pure calculations behind lunacast's forecasts. The crate does no I/O.
//!
//! - [`moon`]: lunar phase fraction and canonical phase labels
//! - [`geo`]: haversine distance and coordinate quantization
//! - [`smoothing`]: exponential smoothing (water temperature estimate)
//! - [`linalg`]: small least-squares solver for regression starting values
//! - [`optimize`]: Nelder–Mead minimiser used by the seasonal ARIMA fit

use num_traits::Float;
use thiserror::Error;

pub mod geo;
pub mod linalg;
pub mod moon;
pub mod optimize;
pub mod smoothing;

pub use moon::{label_for_date, nearest_label, phase_fraction, MoonPhase, SYNODIC_MONTH};

/// Errors that can occur in lunar and numerical calculations
#[derive(Error, Debug)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for lunar math operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Distance between two positions on a unit cycle, in [0, 0.5]
pub fn circular_distance<T: Float>(a: T, b: T) -> T {
    let d = (a - b).abs();
    d.min(T::one() - d)
}
