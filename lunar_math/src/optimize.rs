//! Derivative-free minimisation (Nelder–Mead simplex)

use crate::{MathError, Result};

/// Tuning for [`nelder_mead`]
#[derive(Debug, Clone)]
pub struct NelderMeadOptions {
    /// Iteration cap; defaults to 400 per dimension
    pub max_iterations: Option<usize>,
    /// Stop once the spread of simplex values falls below this
    pub tolerance: f64,
    /// Offset applied to each coordinate when building the initial simplex
    pub initial_step: f64,
}

impl Default for NelderMeadOptions {
    fn default() -> Self {
        Self {
            max_iterations: None,
            tolerance: 1e-10,
            initial_step: 0.1,
        }
    }
}

/// Outcome of a minimisation
#[derive(Debug, Clone)]
pub struct Minimum {
    /// Best point found
    pub point: Vec<f64>,
    /// Objective at `point`
    pub value: f64,
    /// Iterations used
    pub iterations: usize,
    /// Whether the tolerance was reached before the iteration cap
    pub converged: bool,
}

/// Minimise `objective` starting from `start`
///
/// Non-finite objective values are treated as `f64::MAX` so the simplex
/// steps away from regions where the objective blows up.
pub fn nelder_mead<F>(objective: F, start: &[f64], options: &NelderMeadOptions) -> Result<Minimum>
where
    F: Fn(&[f64]) -> f64,
{
    let n = start.len();
    let eval = |x: &[f64]| {
        let v = objective(x);
        if v.is_finite() {
            v
        } else {
            f64::MAX
        }
    };

    if n == 0 {
        return Ok(Minimum {
            point: Vec::new(),
            value: eval(start),
            iterations: 0,
            converged: true,
        });
    }
    if start.iter().any(|v| !v.is_finite()) {
        return Err(MathError::InvalidInput(
            "Starting point must be finite".to_string(),
        ));
    }

    let max_iterations = options.max_iterations.unwrap_or(400 * n);
    let (alpha, gamma, rho, sigma) = (1.0, 2.0, 0.5, 0.5);

    let mut simplex: Vec<(Vec<f64>, f64)> = Vec::with_capacity(n + 1);
    simplex.push((start.to_vec(), eval(start)));
    for i in 0..n {
        let mut vertex = start.to_vec();
        vertex[i] += if vertex[i].abs() > 1e-8 {
            options.initial_step * vertex[i].abs().max(1.0)
        } else {
            options.initial_step
        };
        let value = eval(&vertex);
        simplex.push((vertex, value));
    }

    let mut iterations = 0;
    let mut converged = false;

    while iterations < max_iterations {
        simplex.sort_by(|a, b| a.1.total_cmp(&b.1));

        let best = simplex[0].1;
        let worst = simplex[n].1;
        if (worst - best).abs() <= options.tolerance * (best.abs() + 1.0) {
            converged = true;
            break;
        }
        iterations += 1;

        // centroid of every vertex but the worst
        let mut centroid = vec![0.0; n];
        for (vertex, _) in simplex.iter().take(n) {
            for (c, v) in centroid.iter_mut().zip(vertex) {
                *c += v / n as f64;
            }
        }

        let along = |coef: f64| -> Vec<f64> {
            centroid
                .iter()
                .zip(&simplex[n].0)
                .map(|(c, w)| c + coef * (w - c))
                .collect()
        };

        let reflected = along(-alpha);
        let reflected_value = eval(&reflected);

        if reflected_value < simplex[0].1 {
            let expanded = along(-gamma);
            let expanded_value = eval(&expanded);
            simplex[n] = if expanded_value < reflected_value {
                (expanded, expanded_value)
            } else {
                (reflected, reflected_value)
            };
            continue;
        }

        if reflected_value < simplex[n - 1].1 {
            simplex[n] = (reflected, reflected_value);
            continue;
        }

        let contracted = if reflected_value < simplex[n].1 {
            along(-rho)
        } else {
            along(rho)
        };
        let contracted_value = eval(&contracted);
        if contracted_value < simplex[n].1.min(reflected_value) {
            simplex[n] = (contracted, contracted_value);
            continue;
        }

        // shrink towards the best vertex
        let best_point = simplex[0].0.clone();
        for (vertex, value) in simplex.iter_mut().skip(1) {
            for (v, b) in vertex.iter_mut().zip(&best_point) {
                *v = b + sigma * (*v - b);
            }
            *value = eval(vertex);
        }
    }

    simplex.sort_by(|a, b| a.1.total_cmp(&b.1));
    let (point, value) = simplex.swap_remove(0);

    Ok(Minimum {
        point,
        value,
        iterations,
        converged,
    })
}
