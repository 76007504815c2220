//! Exponential smoothing used to derive slow-moving series
//!
//! The estimated water temperature is an exponential moving average of daily
//! mean air temperature, seeded by the first observation.

use crate::{MathError, Result};

/// Smoothing factor applied to air temperature when estimating water temperature
pub const WATER_TEMP_ALPHA: f64 = 0.12;

/// Simple exponential smoothing seeded by the first value
#[derive(Debug, Clone)]
pub struct ExponentialSmoothing {
    alpha: f64,
    level: Option<f64>,
    values_seen: usize,
}

impl ExponentialSmoothing {
    /// Create a new Exponential Smoothing with the specified alpha
    pub fn new(alpha: f64) -> Result<Self> {
        if alpha <= 0.0 || alpha > 1.0 {
            return Err(MathError::InvalidInput(
                "Alpha must be in (0, 1]".to_string(),
            ));
        }

        Ok(Self {
            alpha,
            level: None,
            values_seen: 0,
        })
    }

    /// Update the smoothed level with a new value
    pub fn update(&mut self, value: f64) -> Result<f64> {
        if !value.is_finite() {
            return Err(MathError::InvalidInput(format!(
                "Cannot smooth non-finite value {}",
                value
            )));
        }
        self.values_seen += 1;

        let level = match self.level {
            None => value,
            // level += alpha * (value - level)
            Some(previous) => previous + self.alpha * (value - previous),
        };
        self.level = Some(level);

        Ok(level)
    }

    /// Get the current smoothed value
    pub fn value(&self) -> Result<f64> {
        self.level.ok_or_else(|| {
            MathError::InsufficientData("No data available for exponential smoothing".to_string())
        })
    }

    /// Number of values folded into the level so far
    pub fn values_seen(&self) -> usize {
        self.values_seen
    }

    /// Get the current alpha value
    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    /// Reset the smoothing, clearing all values
    pub fn reset(&mut self) {
        self.level = None;
        self.values_seen = 0;
    }
}

/// Smooth a whole series, returning one level per input value
pub fn smooth_series(values: &[f64], alpha: f64) -> Result<Vec<f64>> {
    let mut smoother = ExponentialSmoothing::new(alpha)?;
    values.iter().map(|&v| smoother.update(v)).collect()
}

/// Water temperature estimate for a run of daily mean air temperatures
pub fn estimate_water_temperature(air_temps: &[f64]) -> Result<Vec<f64>> {
    smooth_series(air_temps, WATER_TEMP_ALPHA)
}
