//! Forecasting models and their per-target configuration

use crate::error::{ForecastError, Result};
use std::fmt::{self, Debug};

/// Trained forecast model
pub trait TrainedForecastModel: Debug {
    /// Point forecast for `horizon` steps given future regressors
    ///
    /// `future_exog` is column-major with the same columns used in training.
    fn forecast(&self, horizon: usize, future_exog: &[Vec<f64>]) -> Result<Vec<f64>>;

    /// Name of the model
    fn name(&self) -> &str;
}

/// Forecast model that can be fitted to a series with regressors
pub trait ForecastModel: Debug + Clone {
    /// The type of trained model produced
    type Trained: TrainedForecastModel;

    /// Fit to `y` with column-major regressors `exog`
    fn fit(&self, target: &str, y: &[f64], exog: &[Vec<f64>]) -> Result<Self::Trained>;

    /// Get the name of the model
    fn name(&self) -> String;
}

/// Seasonal ARIMA orders: (p,d,q)(P,D,Q,s)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ModelSpec {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    /// Seasonal period in steps
    pub period: usize,
}

impl ModelSpec {
    /// Create a spec from the non-seasonal and seasonal order tuples
    pub const fn new(order: (usize, usize, usize), seasonal: (usize, usize, usize, usize)) -> Self {
        Self {
            p: order.0,
            d: order.1,
            q: order.2,
            seasonal_p: seasonal.0,
            seasonal_d: seasonal.1,
            seasonal_q: seasonal.2,
            period: seasonal.3,
        }
    }

    /// Non-seasonal spec with no seasonal component
    pub const fn arima(p: usize, d: usize, q: usize) -> Self {
        Self::new((p, d, q), (0, 0, 0, 0))
    }

    pub fn has_seasonal(&self) -> bool {
        self.seasonal_p + self.seasonal_d + self.seasonal_q > 0
    }

    /// Number of ARMA coefficients to estimate
    pub fn arma_params(&self) -> usize {
        self.p + self.q + self.seasonal_p + self.seasonal_q
    }

    /// Observations consumed by differencing
    pub fn differencing_span(&self) -> usize {
        self.d + self.period * self.seasonal_d
    }

    /// Check that a seasonal component has a usable period
    pub fn validate(&self) -> Result<()> {
        if self.has_seasonal() && self.period < 2 {
            return Err(ForecastError::ConfigError(format!(
                "seasonal period must be at least 2 for {}",
                self
            )));
        }
        Ok(())
    }
}

impl fmt::Display for ModelSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SARIMA({},{},{})({},{},{},{})",
            self.p, self.d, self.q, self.seasonal_p, self.seasonal_d, self.seasonal_q, self.period
        )
    }
}

/// Air temperature column
pub const AIR_TEMP: &str = "air_temp_C";
/// Surface pressure column
pub const PRESSURE: &str = "pressure_kPa";
/// 10 m wind speed column
pub const WIND_SPEED: &str = "wind_speed_m_s";
/// Estimated water temperature column
pub const WATER_TEMP: &str = "estimated_water_temp_C";

/// Ordered target variables with their model orders
#[derive(Debug, Clone, PartialEq)]
pub struct ModelTable {
    entries: Vec<(String, ModelSpec)>,
}

impl ModelTable {
    pub fn new(entries: Vec<(String, ModelSpec)>) -> Result<Self> {
        for (name, spec) in &entries {
            spec.validate()
                .map_err(|e| ForecastError::ConfigError(format!("{}: {}", name, e)))?;
        }
        Ok(Self { entries })
    }

    pub fn entries(&self) -> &[(String, ModelSpec)] {
        &self.entries
    }

    pub fn get(&self, target: &str) -> Option<&ModelSpec> {
        self.entries
            .iter()
            .find(|(name, _)| name == target)
            .map(|(_, spec)| spec)
    }

    pub fn targets(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }
}

impl Default for ModelTable {
    fn default() -> Self {
        Self {
            entries: vec![
                (AIR_TEMP.to_string(), ModelSpec::new((1, 1, 3), (0, 0, 1, 7))),
                (PRESSURE.to_string(), ModelSpec::new((1, 1, 2), (0, 0, 1, 7))),
                (WIND_SPEED.to_string(), ModelSpec::new((1, 1, 3), (0, 0, 1, 7))),
                (WATER_TEMP.to_string(), ModelSpec::new((1, 1, 3), (0, 0, 1, 7))),
            ],
        }
    }
}

pub mod sarimax;
pub mod selection;

pub use selection::{OrderChoice, OrderGrid, OrderSelection};
