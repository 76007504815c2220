//! Regression with seasonal ARIMA errors
//!
//! The model is `y = X·β + u` where `u` follows a SARIMA(p,d,q)(P,D,Q,s)
//! process. Fitting differences both sides with `(1−B)^d (1−B^s)^D`, then
//! minimises the conditional sum of squares of the ARMA innovations jointly
//! over β and the ARMA coefficients. Coefficients are unconstrained:
//! no stationarity or invertibility is enforced.

use crate::error::{ForecastError, Result};
use crate::models::{ForecastModel, ModelSpec, TrainedForecastModel};
use lunar_math::linalg::ridge_least_squares;
use lunar_math::optimize::{nelder_mead, NelderMeadOptions};
use tracing::debug;

/// Ridge penalty for the starting regression coefficients
const START_RIDGE: f64 = 1e-8;
/// Differenced regressors below this magnitude everywhere carry no signal
const ZERO_COLUMN_EPS: f64 = 1e-12;

/// Seasonal ARIMA model with exogenous regressors
#[derive(Debug, Clone)]
pub struct SarimaxModel {
    name: String,
    spec: ModelSpec,
    options: NelderMeadOptions,
}

/// SARIMAX model fitted to one target series
#[derive(Debug, Clone)]
pub struct FittedSarimax {
    name: String,
    target: String,
    spec: ModelSpec,
    /// One coefficient per regressor column; pinned columns are 0
    beta: Vec<f64>,
    ar: Vec<f64>,
    ma: Vec<f64>,
    seasonal_ar: Vec<f64>,
    seasonal_ma: Vec<f64>,
    css: f64,
    n_obs: usize,
    n_params: usize,
    converged: bool,
    /// Regression errors `u = y − X·β` in levels
    errors: Vec<f64>,
    /// Differenced regression errors
    differenced: Vec<f64>,
    /// ARMA innovations over `differenced`; zero before the first AR lag
    residuals: Vec<f64>,
}

impl SarimaxModel {
    /// Create a new SARIMAX model for the given orders
    pub fn new(spec: ModelSpec) -> Result<Self> {
        spec.validate()?;
        Ok(Self {
            name: spec.to_string(),
            spec,
            options: NelderMeadOptions::default(),
        })
    }

    /// Override the optimiser settings
    #[must_use]
    pub fn with_options(mut self, options: NelderMeadOptions) -> Self {
        self.options = options;
        self
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Split an ARMA parameter slice into (φ, θ, Φ, Θ)
    fn split_arma<'a>(&self, arma: &'a [f64]) -> (&'a [f64], &'a [f64], &'a [f64], &'a [f64]) {
        let (ar, rest) = arma.split_at(self.spec.p);
        let (ma, rest) = rest.split_at(self.spec.q);
        let (sar, sma) = rest.split_at(self.spec.seasonal_p);
        (ar, ma, sar, sma)
    }
}

impl ForecastModel for SarimaxModel {
    type Trained = FittedSarimax;

    fn fit(&self, target: &str, y: &[f64], exog: &[Vec<f64>]) -> Result<FittedSarimax> {
        let spec = self.spec;
        let n = y.len();

        if exog.iter().any(|column| column.len() != n) {
            return Err(ForecastError::validation(
                target,
                "regressor columns must match the series length",
            ));
        }
        if y.iter().chain(exog.iter().flatten()).any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit(target, "series contains non-finite values"));
        }

        let span = spec.differencing_span();
        if n <= span {
            return Err(ForecastError::model_fit(
                target,
                format!("{} observations cannot be differenced by {}", n, span),
            ));
        }

        let delta = differencing_polynomial(&spec);
        let wy = apply_filter(&delta, y);
        let wx: Vec<Vec<f64>> = exog.iter().map(|column| apply_filter(&delta, column)).collect();

        let free: Vec<usize> = (0..wx.len())
            .filter(|&j| wx[j].iter().any(|v| v.abs() > ZERO_COLUMN_EPS))
            .collect();
        let free_cols: Vec<Vec<f64>> = free.iter().map(|&j| wx[j].clone()).collect();

        let ar_order = spec.p + spec.period * spec.seasonal_p;
        let n_eff = wy.len().saturating_sub(ar_order);
        let n_params = free.len() + spec.arma_params();
        if n_eff <= n_params + 1 {
            return Err(ForecastError::model_fit(
                target,
                format!(
                    "{} usable observations for {} parameters in {}",
                    n_eff, n_params, self.name
                ),
            ));
        }

        let mut start = if free_cols.is_empty() {
            Vec::new()
        } else {
            ridge_least_squares(&free_cols, &wy, START_RIDGE).unwrap_or_else(|e| {
                debug!(variable = target, error = %e, "Starting regression failed, using zeros");
                vec![0.0; free_cols.len()]
            })
        };
        start.extend(std::iter::repeat(0.0).take(spec.arma_params()));

        let objective = |params: &[f64]| -> f64 {
            let (beta, arma) = params.split_at(free_cols.len());
            let w = subtract_regression(&wy, &free_cols, beta);
            let (ar, ma, sar, sma) = self.split_arma(arma);
            let e = css_residuals(
                &w,
                &ar_lags(ar, sar, spec.period),
                &ma_lags(ma, sma, spec.period),
            );
            e.iter().map(|v| v * v).sum::<f64>() / n_eff as f64
        };

        // one restart from the first optimum helps the simplex settle
        let first = nelder_mead(&objective, &start, &self.options)?;
        let best = nelder_mead(&objective, &first.point, &self.options)?;
        if !best.value.is_finite() || best.value == f64::MAX {
            return Err(ForecastError::model_fit(
                target,
                "objective is not finite at the optimum",
            ));
        }

        let (beta_free, arma) = best.point.split_at(free.len());
        let mut beta = vec![0.0; exog.len()];
        for (&j, &b) in free.iter().zip(beta_free) {
            beta[j] = b;
        }
        let (ar, ma, sar, sma) = self.split_arma(arma);

        let errors = subtract_regression(y, exog, &beta);
        let differenced = apply_filter(&delta, &errors);
        let residuals = css_residuals(
            &differenced,
            &ar_lags(ar, sar, spec.period),
            &ma_lags(ma, sma, spec.period),
        );
        let css: f64 = residuals.iter().map(|v| v * v).sum();

        debug!(
            variable = target,
            model = %self.name,
            css,
            iterations = first.iterations + best.iterations,
            converged = best.converged,
            pinned = exog.len() - free.len(),
            "Fitted seasonal ARIMA"
        );

        Ok(FittedSarimax {
            name: self.name.clone(),
            target: target.to_string(),
            spec,
            beta,
            ar: ar.to_vec(),
            ma: ma.to_vec(),
            seasonal_ar: sar.to_vec(),
            seasonal_ma: sma.to_vec(),
            css,
            n_obs: n_eff,
            n_params,
            converged: best.converged,
            errors,
            differenced,
            residuals,
        })
    }

    fn name(&self) -> String {
        self.name.clone()
    }
}

impl FittedSarimax {
    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn spec(&self) -> &ModelSpec {
        &self.spec
    }

    /// Regression coefficients, one per regressor column
    pub fn beta(&self) -> &[f64] {
        &self.beta
    }

    pub fn ar(&self) -> &[f64] {
        &self.ar
    }

    pub fn ma(&self) -> &[f64] {
        &self.ma
    }

    pub fn seasonal_ar(&self) -> &[f64] {
        &self.seasonal_ar
    }

    pub fn seasonal_ma(&self) -> &[f64] {
        &self.seasonal_ma
    }

    /// Conditional sum of squared innovations
    pub fn css(&self) -> f64 {
        self.css
    }

    /// Observations entering the sum of squares
    pub fn n_obs(&self) -> usize {
        self.n_obs
    }

    /// Akaike information criterion from the conditional sum of squares
    pub fn aic(&self) -> f64 {
        let n = self.n_obs as f64;
        n * (self.css / n).ln() + 2.0 * self.n_params as f64
    }

    pub fn converged(&self) -> bool {
        self.converged
    }

    pub fn residuals(&self) -> &[f64] {
        &self.residuals
    }
}

impl TrainedForecastModel for FittedSarimax {
    fn forecast(&self, horizon: usize, future_exog: &[Vec<f64>]) -> Result<Vec<f64>> {
        if future_exog.len() != self.beta.len() {
            return Err(ForecastError::validation(
                "future_exog",
                format!(
                    "expected {} regressor columns, got {}",
                    self.beta.len(),
                    future_exog.len()
                ),
            ));
        }
        if future_exog.iter().any(|column| column.len() != horizon) {
            return Err(ForecastError::validation(
                "future_exog",
                format!("every regressor column needs {} rows", horizon),
            ));
        }

        let ar = ar_lags(&self.ar, &self.seasonal_ar, self.spec.period);
        let ma = ma_lags(&self.ma, &self.seasonal_ma, self.spec.period);
        let delta = differencing_polynomial(&self.spec);

        let mut w = self.differenced.clone();
        let mut e = self.residuals.clone();
        let mut u = self.errors.clone();
        let mut forecast = Vec::with_capacity(horizon);

        for step in 0..horizon {
            let next_w = lagged_sum(&w, &ar) + lagged_sum(&e, &ma);
            w.push(next_w);
            e.push(0.0);

            // invert the differencing: delta[0] is 1
            let next_u = next_w
                - delta
                    .iter()
                    .enumerate()
                    .skip(1)
                    .map(|(j, d)| d * u[u.len() - j])
                    .sum::<f64>();
            u.push(next_u);

            let regression: f64 = self
                .beta
                .iter()
                .zip(future_exog)
                .map(|(b, column)| b * column[step])
                .sum();
            forecast.push(next_u + regression);
        }

        if forecast.iter().any(|v| !v.is_finite()) {
            return Err(ForecastError::model_fit(
                self.target.clone(),
                "forecast diverged to non-finite values",
            ));
        }

        Ok(forecast)
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// Multiply two polynomials in the backshift operator
pub fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    if a.is_empty() || b.is_empty() {
        return Vec::new();
    }
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// `1 + sign·c₁·B^s + sign·c₂·B^{2s} + ...`
fn seasonal_poly(coefs: &[f64], period: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coefs.len() * period + 1];
    poly[0] = 1.0;
    for (j, c) in coefs.iter().enumerate() {
        poly[(j + 1) * period] = sign * c;
    }
    poly
}

/// Coefficients of `(1−B)^d (1−B^s)^D`, starting with the lag-0 term
pub fn differencing_polynomial(spec: &ModelSpec) -> Vec<f64> {
    let mut poly = vec![1.0];
    for _ in 0..spec.d {
        poly = poly_mul(&poly, &[1.0, -1.0]);
    }
    for _ in 0..spec.seasonal_d {
        poly = poly_mul(&poly, &seasonal_poly(&[1.0], spec.period, -1.0));
    }
    poly
}

/// Expanded AR lag weights `a` with `w_t = Σ a_k w_{t−k} + ...`
pub fn ar_lags(ar: &[f64], seasonal_ar: &[f64], period: usize) -> Vec<f64> {
    let mut nonseasonal = vec![1.0];
    nonseasonal.extend(ar.iter().map(|c| -c));
    let product = poly_mul(&nonseasonal, &seasonal_poly(seasonal_ar, period, -1.0));
    product.iter().skip(1).map(|c| -c).collect()
}

/// Expanded MA lag weights `b` with `w_t = ... + e_t + Σ b_k e_{t−k}`
pub fn ma_lags(ma: &[f64], seasonal_ma: &[f64], period: usize) -> Vec<f64> {
    let mut nonseasonal = vec![1.0];
    nonseasonal.extend_from_slice(ma);
    let product = poly_mul(&nonseasonal, &seasonal_poly(seasonal_ma, period, 1.0));
    product.into_iter().skip(1).collect()
}

/// Apply a backshift polynomial, dropping the first `poly.len() − 1` points
pub fn apply_filter(poly: &[f64], x: &[f64]) -> Vec<f64> {
    let span = poly.len().saturating_sub(1);
    (span..x.len())
        .map(|t| poly.iter().enumerate().map(|(j, c)| c * x[t - j]).sum())
        .collect()
}

fn subtract_regression(y: &[f64], columns: &[Vec<f64>], beta: &[f64]) -> Vec<f64> {
    y.iter()
        .enumerate()
        .map(|(t, v)| {
            v - columns
                .iter()
                .zip(beta)
                .map(|(column, b)| b * column[t])
                .sum::<f64>()
        })
        .collect()
}

/// `Σ_k weights[k−1] · history[len−k]`, treating values before the start as 0
fn lagged_sum(history: &[f64], weights: &[f64]) -> f64 {
    let len = history.len();
    weights
        .iter()
        .enumerate()
        .filter_map(|(i, c)| len.checked_sub(i + 1).map(|idx| c * history[idx]))
        .sum()
}

/// Conditional innovations: zero until every AR lag is available
pub fn css_residuals(w: &[f64], ar: &[f64], ma: &[f64]) -> Vec<f64> {
    let start = ar.len();
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let ar_part = lagged_sum(&w[..t], ar);
        let ma_part = lagged_sum(&e[..t], ma);
        e[t] = w[t] - ar_part - ma_part;
    }
    e
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: &[f64], b: &[f64]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-12)
    }

    #[test]
    fn test_differencing_polynomial() {
        let spec = ModelSpec::new((0, 1, 0), (0, 1, 0, 7));
        let poly = differencing_polynomial(&spec);
        let mut expected = vec![0.0; 9];
        expected[0] = 1.0;
        expected[1] = -1.0;
        expected[7] = -1.0;
        expected[8] = 1.0;
        assert!(close(&poly, &expected));
    }

    #[test]
    fn test_expanded_ar_lags() {
        // (1 - 0.5B)(1 - 0.3B^4) = 1 - 0.5B - 0.3B^4 + 0.15B^5
        let a = ar_lags(&[0.5], &[0.3], 4);
        assert!(close(&a, &[0.5, 0.0, 0.0, 0.3, -0.15]));
    }

    #[test]
    fn test_expanded_ma_lags() {
        let b = ma_lags(&[0.4], &[0.2], 3);
        assert!(close(&b, &[0.4, 0.0, 0.2, 0.08]));
    }

    #[test]
    fn test_first_difference() {
        let spec = ModelSpec::arima(0, 1, 0);
        let w = apply_filter(&differencing_polynomial(&spec), &[1.0, 4.0, 9.0, 16.0]);
        assert!(close(&w, &[3.0, 5.0, 7.0]));
    }

    #[test]
    fn test_css_residuals_start_after_ar_lags() {
        let e = css_residuals(&[1.0, 2.0, 3.0], &[1.0], &[]);
        assert!(close(&e, &[0.0, 1.0, 1.0]));
    }

    #[test]
    fn test_random_walk_forecast_is_flat() {
        let y = [3.0, 5.0, 4.0, 6.0, 5.0, 7.0, 6.0, 8.0];
        let model = SarimaxModel::new(ModelSpec::arima(0, 1, 0)).unwrap();
        let fitted = model.fit("level", &y, &[]).unwrap();
        let forecast = fitted.forecast(3, &[]).unwrap();
        assert!(close(&forecast, &[8.0, 8.0, 8.0]));
    }

    #[test]
    fn test_regression_on_trend_column() {
        let t: Vec<f64> = (0..40).map(f64::from).collect();
        let y: Vec<f64> = t.iter().map(|x| 2.0 + 0.5 * x).collect();
        let model = SarimaxModel::new(ModelSpec::arima(0, 1, 0)).unwrap();
        let fitted = model.fit("trend", &y, &[t.clone()]).unwrap();

        assert!((fitted.beta()[0] - 0.5).abs() < 1e-4);
        let future = vec![vec![40.0, 41.0]];
        let forecast = fitted.forecast(2, &future).unwrap();
        assert!((forecast[0] - 22.0).abs() < 1e-3);
        assert!((forecast[1] - 22.5).abs() < 1e-3);
    }

    #[test]
    fn test_zero_column_is_pinned() {
        let y: Vec<f64> = (0..30).map(|i| (i as f64 * 0.7).sin()).collect();
        let zeros = vec![0.0; 30];
        let model = SarimaxModel::new(ModelSpec::arima(1, 0, 0)).unwrap();
        let fitted = model.fit("wave", &y, &[zeros]).unwrap();
        assert_eq!(fitted.beta(), &[0.0]);
    }

    #[test]
    fn test_too_short_series() {
        let model = SarimaxModel::new(ModelSpec::new((1, 1, 3), (0, 0, 1, 7))).unwrap();
        let err = model.fit("air_temp_C", &[1.0, 2.0, 3.0, 4.0], &[]).unwrap_err();
        assert!(matches!(err, ForecastError::ModelFitError { .. }));
    }
}
