//! Order selection by AIC over a grid of seasonal ARIMA specs
//!
//! Offline tooling for choosing the per-target orders that [`ModelTable`]
//! carries. Forecast requests never search; they use a fixed table.

use super::sarimax::SarimaxModel;
use super::{ForecastModel, ModelSpec, ModelTable};
use crate::data::DailySeries;
use crate::engine::fitting_series;
use crate::error::{ForecastError, Result};
use crate::exog::MoonDummies;
use chrono::Duration;
use rayon::prelude::*;
use tracing::{debug, info};

/// Seasonal period matching the spacing of a series, 0 for none
pub fn seasonal_period(step: Duration) -> usize {
    match step.num_days() {
        1 => 7,
        7 => 52,
        28..=31 => 12,
        _ => 0,
    }
}

/// Candidate (p,d,q) and (P,D,Q,s) orders
#[derive(Debug, Clone, PartialEq)]
pub struct OrderGrid {
    orders: Vec<(usize, usize, usize)>,
    seasonal: Vec<(usize, usize, usize, usize)>,
}

impl OrderGrid {
    pub fn new(orders: Vec<(usize, usize, usize)>, seasonal: Vec<(usize, usize, usize, usize)>) -> Self {
        let seasonal = if seasonal.is_empty() {
            vec![(0, 0, 0, 0)]
        } else {
            seasonal
        };
        Self { orders, seasonal }
    }

    /// p, q in 0..=3 and d in 0..=2, crossed with P, D, Q in {0, 1}
    ///
    /// A period below 2 leaves out the seasonal part.
    pub fn for_period(period: usize) -> Self {
        let mut orders = Vec::with_capacity(48);
        for p in 0..=3 {
            for d in 0..=2 {
                for q in 0..=3 {
                    orders.push((p, d, q));
                }
            }
        }

        let mut seasonal = Vec::with_capacity(8);
        if period > 1 {
            for sp in 0..=1 {
                for sd in 0..=1 {
                    for sq in 0..=1 {
                        seasonal.push((sp, sd, sq, period));
                    }
                }
            }
        }
        Self::new(orders, seasonal)
    }

    pub fn specs(&self) -> Vec<ModelSpec> {
        self.orders
            .iter()
            .flat_map(|&order| self.seasonal.iter().map(move |&s| ModelSpec::new(order, s)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.orders.len() * self.seasonal.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Search outcome for one target
#[derive(Debug, Clone, PartialEq)]
pub struct OrderChoice {
    pub target: String,
    /// Lowest-AIC spec with its AIC; `None` when no candidate could be fitted
    pub best: Option<(ModelSpec, f64)>,
    /// Candidates that failed to fit
    pub failed: usize,
}

/// Search outcome for every target present in a series
#[derive(Debug, Clone, PartialEq)]
pub struct OrderSelection {
    pub period: usize,
    pub exog_columns: usize,
    pub choices: Vec<OrderChoice>,
}

impl OrderSelection {
    /// Model table of the targets that found a spec
    pub fn table(&self) -> Result<ModelTable> {
        let entries: Vec<(String, ModelSpec)> = self
            .choices
            .iter()
            .filter_map(|c| c.best.map(|(spec, _)| (c.target.clone(), spec)))
            .collect();
        if entries.is_empty() {
            return Err(ForecastError::model_fit("*", "no candidate order could be fitted"));
        }
        ModelTable::new(entries)
    }
}

impl ModelTable {
    /// Pick the lowest-AIC spec from `grid` for each default target in `series`
    ///
    /// Candidates are fitted in parallel. On equal AIC the earlier grid entry
    /// wins.
    pub fn select_by_aic(series: &DailySeries, grid: &OrderGrid) -> Result<OrderSelection> {
        if series.is_empty() {
            return Err(ForecastError::validation("series", "is empty"));
        }
        let defaults = ModelTable::default();
        let targets: Vec<&str> = defaults.targets().filter(|t| series.column(t).is_some()).collect();
        if targets.is_empty() {
            return Err(ForecastError::validation(
                "series",
                format!("has none of the target columns {:?}", defaults.targets().collect::<Vec<_>>()),
            ));
        }

        let (prepared, step) = fitting_series(series);
        let series: &DailySeries = &prepared;
        let dummies = MoonDummies::fit(series.moon_phases());
        let exog = dummies.encode(series.moon_phases());
        let specs = grid.specs();

        let mut choices = Vec::with_capacity(targets.len());
        for target in targets {
            let y = series
                .column(target)
                .ok_or_else(|| ForecastError::validation(target, "column is missing"))?;

            let scores: Vec<Option<f64>> = specs
                .par_iter()
                .map(|spec| {
                    let fitted = SarimaxModel::new(*spec).and_then(|m| m.fit(target, y, &exog));
                    match fitted {
                        Ok(f) if f.aic().is_finite() => Some(f.aic()),
                        Ok(_) => None,
                        Err(e) => {
                            debug!(variable = target, spec = %spec, error = %e, "Candidate skipped");
                            None
                        }
                    }
                })
                .collect();

            let failed = scores.iter().filter(|s| s.is_none()).count();
            let best = specs
                .iter()
                .zip(&scores)
                .filter_map(|(spec, score)| score.map(|aic| (*spec, aic)))
                .min_by(|a, b| a.1.total_cmp(&b.1));

            match best {
                Some((spec, aic)) => info!(variable = target, spec = %spec, aic, "Best order"),
                None => info!(variable = target, candidates = specs.len(), "No candidate order fitted"),
            }
            choices.push(OrderChoice {
                target: target.to_string(),
                best,
                failed,
            });
        }

        Ok(OrderSelection {
            period: seasonal_period(step),
            exog_columns: dummies.column_names().len(),
            choices,
        })
    }
}
