//! Penalised least squares on small dense design matrices.
//!
//! The normal equations are solved by Cholesky factorisation. A tiny jitter
//! is added to the diagonal so rank-deficient designs (e.g. a Fourier column
//! that is constant over a short window) still factorise.

use crate::error::{AnomalyError, Result};

const JITTER: f64 = 1e-8;

/// Solve `A x = b` for a symmetric positive definite `A`.
///
/// Returns `None` when the factorisation meets a non-positive pivot.
pub fn solve_spd(a: &[Vec<f64>], b: &[f64]) -> Option<Vec<f64>> {
    let n = b.len();
    if a.len() != n || a.iter().any(|row| row.len() != n) {
        return None;
    }

    let mut l = vec![vec![0.0; n]; n];
    for i in 0..n {
        for j in 0..=i {
            let s: f64 = (0..j).map(|k| l[i][k] * l[j][k]).sum();
            let v = a[i][j] - s;
            if i == j {
                if v <= 0.0 || !v.is_finite() {
                    return None;
                }
                l[i][i] = v.sqrt();
            } else {
                l[i][j] = v / l[j][j];
            }
        }
    }

    let mut z = vec![0.0; n];
    for i in 0..n {
        let s: f64 = (0..i).map(|k| l[i][k] * z[k]).sum();
        z[i] = (b[i] - s) / l[i][i];
    }

    let mut x = vec![0.0; n];
    for i in (0..n).rev() {
        let s: f64 = (i + 1..n).map(|k| l[k][i] * x[k]).sum();
        x[i] = (z[i] - s) / l[i][i];
    }
    Some(x)
}

/// Ridge regression: minimise `|y - X b|^2 + sum(penalty_j * b_j^2)`.
///
/// `rows` holds one design row per observation. `penalties` has one entry
/// per column; use zero for unpenalised columns such as the intercept.
pub fn ridge_least_squares(rows: &[Vec<f64>], y: &[f64], penalties: &[f64]) -> Result<Vec<f64>> {
    if rows.is_empty() {
        return Err(AnomalyError::InsufficientData { needed: 1, got: 0 });
    }
    if rows.len() != y.len() {
        return Err(AnomalyError::InvalidParameter(format!(
            "{} design rows but {} targets",
            rows.len(),
            y.len()
        )));
    }
    let k = penalties.len();
    if rows.iter().any(|r| r.len() != k) {
        return Err(AnomalyError::InvalidParameter(format!(
            "design rows must have {} columns",
            k
        )));
    }

    let mut xtx = vec![vec![0.0; k]; k];
    let mut xty = vec![0.0; k];
    for (row, &target) in rows.iter().zip(y) {
        for i in 0..k {
            xty[i] += row[i] * target;
            for j in 0..=i {
                xtx[i][j] += row[i] * row[j];
            }
        }
    }
    for i in 0..k {
        for j in 0..i {
            xtx[j][i] = xtx[i][j];
        }
        xtx[i][i] += penalties[i] + JITTER;
    }

    solve_spd(&xtx, &xty)
        .ok_or_else(|| AnomalyError::fit_failed("least squares", "normal equations are singular"))
}

/// Inner product of two equally sized slices.
pub fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn recovers_exact_linear_relationship() {
        // y = 2 + 3x
        let rows: Vec<Vec<f64>> = (1..=5).map(|x| vec![1.0, x as f64]).collect();
        let y: Vec<f64> = (1..=5).map(|x| 2.0 + 3.0 * x as f64).collect();
        let beta = ridge_least_squares(&rows, &y, &[0.0, 0.0]).unwrap();
        assert_relative_eq!(beta[0], 2.0, epsilon = 1e-6);
        assert_relative_eq!(beta[1], 3.0, epsilon = 1e-6);
    }

    #[test]
    fn penalty_shrinks_coefficient() {
        let rows: Vec<Vec<f64>> = (1..=5).map(|x| vec![1.0, x as f64]).collect();
        let y: Vec<f64> = (1..=5).map(|x| 2.0 + 3.0 * x as f64).collect();
        let free = ridge_least_squares(&rows, &y, &[0.0, 0.0]).unwrap();
        let shrunk = ridge_least_squares(&rows, &y, &[0.0, 100.0]).unwrap();
        assert!(shrunk[1].abs() < free[1].abs());
    }

    #[test]
    fn zero_column_is_tolerated() {
        let rows: Vec<Vec<f64>> = (0..4).map(|x| vec![1.0, 0.0, x as f64]).collect();
        let y = vec![1.0, 2.0, 3.0, 4.0];
        let beta = ridge_least_squares(&rows, &y, &[0.0, 0.0, 0.0]).unwrap();
        assert_relative_eq!(beta[1], 0.0, epsilon = 1e-6);
        assert_relative_eq!(beta[2], 1.0, epsilon = 1e-4);
    }

    #[test]
    fn mismatched_shapes_are_rejected() {
        assert!(ridge_least_squares(&[vec![1.0]], &[1.0, 2.0], &[0.0]).is_err());
        assert!(ridge_least_squares(&[vec![1.0, 2.0]], &[1.0], &[0.0]).is_err());
        assert!(ridge_least_squares(&[], &[], &[0.0]).is_err());
    }

    #[test]
    fn spd_solver_rejects_indefinite_matrix() {
        assert!(solve_spd(&[vec![0.0]], &[1.0]).is_none());
        let x = solve_spd(&[vec![4.0, 2.0], vec![2.0, 3.0]], &[2.0, 1.0]).unwrap();
        assert_relative_eq!(x[0], 0.5, epsilon = 1e-12);
        assert_relative_eq!(x[1], 0.0, epsilon = 1e-12);
    }
}
