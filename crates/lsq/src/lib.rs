#![deny(warnings)]

//! Dense nonlinear least squares for corp-pilot.
//!
//! A small Levenberg-Marquardt implementation sized for the pricing
//! solver's five-unknown systems: forward-difference Jacobian, Gaussian
//! elimination with partial pivoting on the damped normal equations, and
//! deterministic seeded restarts when the caller's starting point stalls.
//!
//! The residual closure writes `f(x)` into a caller-provided slice; the
//! solver minimizes `||f(x)||^2`.

use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use thiserror::Error;

/// Errors produced by the solver.
#[derive(Debug, Error, PartialEq)]
pub enum SolveError {
    /// The problem shape is unusable: no unknowns, no residuals, or a
    /// non-finite starting point.
    #[error("invalid least-squares problem: {0}")]
    InvalidProblem(&'static str),
    /// No attempt drove the residual norm under the tolerance.
    #[error("did not converge after {iterations} iterations (residual norm {residual_norm:.3e})")]
    DidNotConverge { iterations: usize, residual_norm: f64 },
}

/// Solver knobs. `Default` suits the small, well-scaled systems this
/// crate exists for.
#[derive(Clone, Copy, Debug)]
pub struct Options {
    /// Iteration cap per attempt (initial seed or restart).
    pub max_iterations: usize,
    /// Convergence threshold on the residual 2-norm.
    pub tolerance: f64,
    /// Starting Levenberg damping factor.
    pub initial_damping: f64,
    /// Extra attempts from perturbed starting points after a stall.
    pub restarts: usize,
    /// Seed for the restart perturbations; fixed so runs reproduce.
    pub seed: u64,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-10,
            initial_damping: 1e-3,
            restarts: 8,
            seed: 42,
        }
    }
}

/// A converged solve.
#[derive(Clone, Debug, PartialEq)]
pub struct Solution {
    /// Values of the unknowns.
    pub values: Vec<f64>,
    /// Final residual 2-norm.
    pub residual_norm: f64,
    /// Iterations spent across all attempts.
    pub iterations: usize,
}

/// Minimize `||residuals(x)||^2` starting from `initial`.
///
/// `residuals` writes the `n_residuals` residual values at `x` into its
/// output slice. Convergence means the residual 2-norm fell to
/// `options.tolerance` or below; anything else, after the initial attempt
/// and every restart, is a [`SolveError::DidNotConverge`].
pub fn solve<F>(
    residuals: F,
    initial: &[f64],
    n_residuals: usize,
    options: &Options,
) -> Result<Solution, SolveError>
where
    F: Fn(&[f64], &mut [f64]),
{
    if initial.is_empty() {
        return Err(SolveError::InvalidProblem("no unknowns"));
    }
    if n_residuals == 0 {
        return Err(SolveError::InvalidProblem("no residuals"));
    }
    if initial.iter().any(|v| !v.is_finite()) {
        return Err(SolveError::InvalidProblem("non-finite starting point"));
    }

    let mut rng = ChaCha8Rng::seed_from_u64(options.seed);
    let mut total_iterations = 0;
    let mut best_values = initial.to_vec();
    let mut best_norm = f64::INFINITY;

    for attempt in 0..=options.restarts {
        let start: Vec<f64> = if attempt == 0 {
            initial.to_vec()
        } else {
            initial
                .iter()
                .map(|v| {
                    let scale: f64 = rng.gen_range(0.5..1.5);
                    let offset: f64 = rng.gen_range(-0.5..0.5);
                    v * scale + offset * (1.0 + v.abs()) * 0.1
                })
                .collect()
        };
        let (values, residual_norm, iterations) = minimize(&residuals, start, n_residuals, options);
        total_iterations += iterations;
        if residual_norm < best_norm {
            best_norm = residual_norm;
            best_values = values;
        }
        if best_norm <= options.tolerance {
            break;
        }
    }

    if best_norm <= options.tolerance {
        Ok(Solution {
            values: best_values,
            residual_norm: best_norm,
            iterations: total_iterations,
        })
    } else {
        Err(SolveError::DidNotConverge {
            iterations: total_iterations,
            residual_norm: best_norm,
        })
    }
}

/// One Levenberg-Marquardt descent from a fixed starting point. Returns
/// the best point reached, its residual norm, and the iterations spent.
fn minimize<F>(
    residuals: &F,
    mut x: Vec<f64>,
    n_residuals: usize,
    options: &Options,
) -> (Vec<f64>, f64, usize)
where
    F: Fn(&[f64], &mut [f64]),
{
    let n = x.len();
    let mut r = vec![0.0; n_residuals];
    residuals(&x, &mut r);
    let mut cost = sum_squares(&r);
    let mut lambda = options.initial_damping;
    let mut iterations = 0;

    while iterations < options.max_iterations {
        if cost.sqrt() <= options.tolerance {
            break;
        }
        iterations += 1;

        // Forward-difference Jacobian, one residual sweep per column.
        let mut jacobian = vec![vec![0.0; n]; n_residuals];
        let mut probe = vec![0.0; n_residuals];
        let mut usable = cost.is_finite();
        if usable {
            for col in 0..n {
                let step = 1e-7 * (1.0 + x[col].abs());
                let saved = x[col];
                x[col] = saved + step;
                residuals(&x, &mut probe);
                x[col] = saved;
                for row in 0..n_residuals {
                    let slope = (probe[row] - r[row]) / step;
                    if !slope.is_finite() {
                        usable = false;
                    }
                    jacobian[row][col] = slope;
                }
            }
        }
        if !usable {
            // Non-finite region; no step direction to be had here.
            break;
        }

        // Damped normal equations: (JtJ + lambda * diag) * delta = -Jt r.
        let mut lhs = vec![vec![0.0; n]; n];
        let mut rhs = vec![0.0; n];
        for i in 0..n {
            for j in 0..n {
                let mut sum = 0.0;
                for row in 0..n_residuals {
                    sum += jacobian[row][i] * jacobian[row][j];
                }
                lhs[i][j] = sum;
            }
            let mut gradient = 0.0;
            for row in 0..n_residuals {
                gradient += jacobian[row][i] * r[row];
            }
            rhs[i] = -gradient;
        }
        for i in 0..n {
            // Marquardt scaling, with a small absolute term so columns
            // the residuals ignore stay solvable.
            lhs[i][i] = lhs[i][i] * (1.0 + lambda) + lambda * 1e-12;
        }

        let delta = match solve_linear(lhs, rhs) {
            Some(delta) => delta,
            None => {
                lambda *= 10.0;
                if lambda > 1e12 {
                    break;
                }
                continue;
            }
        };

        let trial: Vec<f64> = x.iter().zip(&delta).map(|(xi, di)| xi + di).collect();
        let mut trial_r = vec![0.0; n_residuals];
        residuals(&trial, &mut trial_r);
        let trial_cost = sum_squares(&trial_r);

        if trial_cost.is_finite() && trial_cost < cost {
            x = trial;
            r = trial_r;
            cost = trial_cost;
            lambda = (lambda * 0.1).max(1e-12);
            // Vanishing steps mean a stall at a local minimum.
            let step_size = delta.iter().fold(0.0f64, |acc, d| acc.max(d.abs()));
            let magnitude = x.iter().fold(1.0f64, |acc, v| acc.max(v.abs()));
            if step_size <= 1e-14 * magnitude {
                break;
            }
        } else {
            lambda *= 10.0;
            if lambda > 1e12 {
                break;
            }
        }
    }

    let norm = cost.sqrt();
    (x, norm, iterations)
}

fn sum_squares(values: &[f64]) -> f64 {
    values.iter().map(|v| v * v).sum()
}

/// Gaussian elimination with partial pivoting. Returns `None` for a
/// numerically singular system.
fn solve_linear(mut a: Vec<Vec<f64>>, mut b: Vec<f64>) -> Option<Vec<f64>> {
    let n = b.len();
    for col in 0..n {
        let mut pivot = col;
        for row in (col + 1)..n {
            if a[row][col].abs() > a[pivot][col].abs() {
                pivot = row;
            }
        }
        if !a[pivot][col].is_finite() || a[pivot][col].abs() < 1e-300 {
            return None;
        }
        a.swap(col, pivot);
        b.swap(col, pivot);
        let lead = a[col].clone();
        let lead_b = b[col];
        for row in (col + 1)..n {
            let factor = a[row][col] / lead[col];
            for k in col..n {
                a[row][k] -= factor * lead[k];
            }
            b[row] -= factor * lead_b;
        }
    }
    let mut x = vec![0.0; n];
    for col in (0..n).rev() {
        let mut sum = b[col];
        for k in (col + 1)..n {
            sum -= a[col][k] * x[k];
        }
        x[col] = sum / a[col][col];
        if !x[col].is_finite() {
            return None;
        }
    }
    Some(x)
}
