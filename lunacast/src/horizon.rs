//! As-of date and horizon arithmetic
//!
//! Historical sources publish with a delay, so the newest usable day is
//! `today - lag`. A forecast for a target date then needs
//! `target - asof` daily steps.

use crate::config::{MAX_HORIZON_DAYS, MAX_LAG_DAYS};
use crate::error::{ForecastError, Result};
use chrono::{Duration, NaiveDate, Utc};

/// Forecast horizon together with the as-of date it is counted from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonPlan {
    /// Number of daily steps to forecast
    pub horizon: usize,
    /// Last day of historical data
    pub asof: NaiveDate,
}

/// Converts target dates into horizons for a source with a fixed lag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HorizonCalculator {
    lag_days: u32,
}

impl HorizonCalculator {
    pub fn new(lag_days: u32) -> Self {
        Self { lag_days }
    }

    pub fn lag_days(&self) -> u32 {
        self.lag_days
    }

    /// As-of date for a given "today"
    ///
    /// # Errors
    ///
    /// [`ForecastError::ValidationError`] if the lag exceeds
    /// [`MAX_LAG_DAYS`] or reaches before the earliest representable date
    pub fn asof(&self, today: NaiveDate) -> Result<NaiveDate> {
        if self.lag_days > MAX_LAG_DAYS {
            return Err(ForecastError::validation(
                "lag_days",
                format!("must be at most {}, got {}", MAX_LAG_DAYS, self.lag_days),
            ));
        }
        today
            .checked_sub_signed(Duration::days(i64::from(self.lag_days)))
            .ok_or_else(|| ForecastError::validation("lag_days", "reaches before the earliest date"))
    }

    /// Plan a forecast reaching `target`, using the current UTC date
    pub fn compute(&self, target: NaiveDate) -> Result<HorizonPlan> {
        self.compute_at(Utc::now().date_naive(), target)
    }

    /// Plan a forecast reaching `target` as seen from `today`
    ///
    /// # Errors
    ///
    /// [`ForecastError::HorizonError`] if `target` is not after the as-of date
    pub fn compute_at(&self, today: NaiveDate, target: NaiveDate) -> Result<HorizonPlan> {
        let asof = self.asof(today)?;
        let horizon = (target - asof).num_days();
        if horizon <= 0 {
            return Err(ForecastError::HorizonError {
                target,
                asof,
                horizon,
            });
        }

        let horizon = horizon as usize;
        check_horizon(horizon)?;
        Ok(HorizonPlan { horizon, asof })
    }

    /// Use a caller-chosen horizon counted from today's as-of date
    pub fn explicit(&self, horizon: usize) -> Result<HorizonPlan> {
        self.explicit_at(Utc::now().date_naive(), horizon)
    }

    /// Like [`HorizonCalculator::explicit`] with an injected "today"
    pub fn explicit_at(&self, today: NaiveDate, horizon: usize) -> Result<HorizonPlan> {
        let asof = self.asof(today)?;
        if horizon == 0 {
            return Err(ForecastError::HorizonError {
                target: asof,
                asof,
                horizon: 0,
            });
        }

        check_horizon(horizon)?;
        Ok(HorizonPlan { horizon, asof })
    }
}

/// Reject horizons beyond [`MAX_HORIZON_DAYS`]
pub fn check_horizon(horizon: usize) -> Result<()> {
    if horizon > MAX_HORIZON_DAYS {
        return Err(ForecastError::validation(
            "horizon",
            format!("must be at most {}, got {}", MAX_HORIZON_DAYS, horizon),
        ));
    }
    Ok(())
}

impl Default for HorizonCalculator {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_LAG_DAYS)
    }
}
