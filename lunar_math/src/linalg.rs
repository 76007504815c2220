//! Small dense linear algebra for regression starting values

use crate::{MathError, Result};

/// Solve `a * x = b` by Gaussian elimination with partial pivoting
///
/// `a` is a row-major square matrix.
pub fn solve(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Result<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return Err(MathError::InvalidInput(format!(
            "Expected a {n}x{n} system"
        )));
    }

    for col in 0..n {
        let pivot = (col..n)
            .max_by(|&i, &j| a[i][col].abs().total_cmp(&a[j][col].abs()))
            .unwrap_or(col);
        if a[pivot][col].abs() < 1e-12 {
            return Err(MathError::CalculationError(
                "Singular system in least squares".to_string(),
            ));
        }
        a.swap(col, pivot);
        b.swap(col, pivot);

        for row in (col + 1)..n {
            let factor = a[row][col] / a[col][col];
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row][k] -= factor * a[col][k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0; n];
    for row in (0..n).rev() {
        let tail: f64 = ((row + 1)..n).map(|k| a[row][k] * x[k]).sum();
        x[row] = (b[row] - tail) / a[row][row];
    }

    Ok(x)
}

/// Ridge-regularised least squares: minimise |y - X beta|^2 + ridge * |beta|^2
///
/// `columns` holds the regressors column-wise, each as long as `y`.
pub fn ridge_least_squares(columns: &[Vec<f64>], y: &[f64], ridge: f64) -> Result<Vec<f64>> {
    let k = columns.len();
    if k == 0 {
        return Ok(Vec::new());
    }
    if columns.iter().any(|c| c.len() != y.len()) {
        return Err(MathError::InvalidInput(
            "Regressor columns must match the response length".to_string(),
        ));
    }
    if y.is_empty() {
        return Err(MathError::InsufficientData(
            "No observations for least squares".to_string(),
        ));
    }

    let dot = |a: &[f64], b: &[f64]| a.iter().zip(b).map(|(x, y)| x * y).sum::<f64>();

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for i in 0..k {
        for j in i..k {
            let v = dot(&columns[i], &columns[j]);
            xtx[i][j] = v;
            xtx[j][i] = v;
        }
        xtx[i][i] += ridge;
        xty[i] = dot(&columns[i], y);
    }

    solve(xtx, xty)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_solve_two_by_two() {
        let a = vec![vec![2.0, 1.0], vec![1.0, 3.0]];
        let x = solve(a, vec![3.0, 5.0]).unwrap();
        assert!((x[0] - 0.8).abs() < 1e-12);
        assert!((x[1] - 1.4).abs() < 1e-12);
    }

    #[test]
    fn test_solve_needs_pivoting() {
        let a = vec![vec![0.0, 1.0], vec![1.0, 0.0]];
        let x = solve(a, vec![2.0, 3.0]).unwrap();
        assert_eq!(x, vec![3.0, 2.0]);
    }

    #[test]
    fn test_singular_system() {
        let a = vec![vec![1.0, 2.0], vec![2.0, 4.0]];
        assert!(solve(a, vec![1.0, 2.0]).is_err());
    }

    #[test]
    fn test_least_squares_recovers_coefficients() {
        let x1: Vec<f64> = (0..20).map(|i| i as f64).collect();
        let x2: Vec<f64> = (0..20).map(|i| ((i * 7) % 5) as f64).collect();
        let y: Vec<f64> = x1.iter().zip(&x2).map(|(a, b)| 2.0 * a - 0.5 * b).collect();

        let beta = ridge_least_squares(&[x1, x2], &y, 0.0).unwrap();
        assert!((beta[0] - 2.0).abs() < 1e-9);
        assert!((beta[1] + 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_ridge_handles_zero_column() {
        let zeros = vec![0.0; 5];
        let ones = vec![1.0; 5];
        let y = vec![3.0; 5];
        let beta = ridge_least_squares(&[zeros, ones], &y, 1e-8).unwrap();
        assert!(beta[0].abs() < 1e-9);
        assert!((beta[1] - 3.0).abs() < 1e-6);
    }
}
