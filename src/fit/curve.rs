//! Four-parameter logistic (4PL) fit for a single sample.
//!
//! Model:
//!
//! ```text
//! viability(d) = bottom + (top - bottom) / (1 + (d / ic50)^hill)
//! ```
//!
//! We minimise the sum of squared residuals with a box-constrained
//! Levenberg–Marquardt iteration:
//!
//! - parameters are `θ = [top, bottom, ln(ic50), hill]`; working on `ln(ic50)`
//!   keeps the Jacobian columns on comparable scales (doses are ~1e-4..1e-1)
//! - a coordinate sitting on a bound whose gradient points out of the box is
//!   held fixed, and the damped system is solved over the remaining ones
//! - the damping term uses Marquardt's diagonal scaling
//!
//! The iteration stops when the projected gradient is orthogonal to the
//! residuals (`gtol`), on a small relative cost decrease or a small step that
//! was not cut short by a bound, or at zero cost. When the damping saturates
//! the search falls back to a projected gradient step and only stops once no
//! representable step along it lowers the cost by more than `ftol`. Running
//! out of model evaluations is a fit failure.
//!
//! The fit is restarted from a handful of starting points spread over the
//! ic50 range and hill slopes, and the lowest cost wins.

use nalgebra::{DMatrix, DVector};

use crate::domain::{CurveFitConfig, CurveParameters};
use crate::error::{AnalysisError, Result};
use crate::math::{median, r_squared, solve_least_squares};

const TOP_BOUNDS: (f64, f64) = (0.5, 1.5);
const BOTTOM_BOUNDS: (f64, f64) = (0.0, 0.5);
const HILL_BOUNDS: (f64, f64) = (0.1, 10.0);

const LAMBDA_INIT: f64 = 1e-3;
const LAMBDA_MIN: f64 = 1e-12;
const LAMBDA_MAX: f64 = 1e12;

/// ic50 starting points, evenly spaced on the log-dose range.
const IC50_STARTS: usize = 5;
const HILL_STARTS: [f64; 3] = [0.5, 1.5, 4.0];

/// Evaluate the 4PL model.
pub fn four_pl(dose: f64, top: f64, bottom: f64, ic50: f64, hill_slope: f64) -> f64 {
    bottom + (top - bottom) / (1.0 + (dose / ic50).powf(hill_slope))
}

/// Fits 4PL curves with fixed bounds and an evaluation cap.
#[derive(Debug, Clone)]
pub struct CurveFitter {
    config: CurveFitConfig,
}

impl Default for CurveFitter {
    fn default() -> Self {
        Self::new(CurveFitConfig::default())
    }
}

impl CurveFitter {
    pub fn new(config: CurveFitConfig) -> Self {
        Self { config }
    }

    /// Fit one sample's raw (unscaled) doses and viabilities.
    pub fn fit(&self, doses: &[f64], viabilities: &[f64]) -> Result<CurveParameters> {
        validate_input(doses, viabilities)?;

        let dose_min = doses.iter().copied().fold(f64::INFINITY, f64::min);
        let dose_max = doses.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        if dose_max <= dose_min {
            return Err(AnalysisError::FitFailure(format!(
                "ic50 bounds collapse: every dose equals {dose_min}"
            )));
        }

        let bounds = Bounds {
            lower: [TOP_BOUNDS.0, BOTTOM_BOUNDS.0, dose_min.ln(), HILL_BOUNDS.0],
            upper: [TOP_BOUNDS.1, BOTTOM_BOUNDS.1, dose_max.ln(), HILL_BOUNDS.1],
        };

        // Strict `<` keeps the earliest start on ties.
        let mut best: Option<([f64; 4], f64)> = None;
        let mut last_error = None;
        for start in starting_points(doses, viabilities, &bounds) {
            match self.minimise(doses, viabilities, start, &bounds) {
                Ok((theta, cost)) => {
                    if best.is_none_or(|(_, best_cost)| cost < best_cost) {
                        best = Some((theta, cost));
                    }
                }
                Err(err) => last_error = Some(err),
            }
        }
        let Some((theta, _)) = best else {
            return Err(last_error
                .unwrap_or_else(|| AnalysisError::FitFailure("no starting point".into())));
        };

        let params = CurveParameters {
            top: theta[0],
            bottom: theta[1],
            ic50: theta[2].exp().clamp(dose_min, dose_max),
            hill_slope: theta[3],
            r_squared: None,
        };
        let fitted: Vec<f64> = doses
            .iter()
            .map(|&d| four_pl(d, params.top, params.bottom, params.ic50, params.hill_slope))
            .collect();

        Ok(CurveParameters {
            r_squared: r_squared(viabilities, &fitted),
            ..params
        })
    }

    /// One bounded LM run. Returns the final `θ` and its cost.
    fn minimise(
        &self,
        x: &[f64],
        y: &[f64],
        start: [f64; 4],
        bounds: &Bounds,
    ) -> Result<([f64; 4], f64)> {
        let mut budget = Budget::new(self.config.max_evaluations);
        let mut theta = start;
        let mut current_cost = sum_squared_residuals(x, y, &theta);
        let mut lambda = LAMBDA_INIT;

        if !current_cost.is_finite() {
            return Err(AnalysisError::FitFailure("non-finite residuals at the initial guess".into()));
        }

        loop {
            if current_cost == 0.0 {
                return Ok((theta, current_cost));
            }

            let (jac, resid) = jacobian(x, y, &theta);
            let jt = jac.transpose();
            let jtj = &jt * &jac;
            let grad = &jt * &resid;
            let free = bounds.free_coordinates(&theta, &grad);

            if gradient_cosine(&jtj, &grad, current_cost, &free) <= self.config.gtol {
                return Ok((theta, current_cost));
            }

            // Inner loop: raise the damping until a step lowers the cost.
            loop {
                if lambda > LAMBDA_MAX {
                    let mut direction = [0.0; 4];
                    for i in 0..4 {
                        if free[i] {
                            direction[i] = grad[i];
                        }
                    }
                    match projected_gradient_step(x, y, &theta, current_cost, &direction, bounds, &mut budget)? {
                        Some((next, next_cost)) => {
                            let improvement = current_cost - next_cost;
                            if improvement <= self.config.ftol * current_cost {
                                return Ok((next, next_cost));
                            }
                            theta = next;
                            current_cost = next_cost;
                            lambda = LAMBDA_INIT;
                            break;
                        }
                        None => return Ok((theta, current_cost)),
                    }
                }

                let Some(delta) = damped_step(&jtj, &grad, &free, lambda) else {
                    lambda *= 10.0;
                    continue;
                };

                budget.spend()?;
                let raw = [
                    theta[0] + delta[0],
                    theta[1] + delta[1],
                    theta[2] + delta[2],
                    theta[3] + delta[3],
                ];
                let trial = bounds.project(raw);
                let truncated = trial != raw;
                let trial_cost = sum_squared_residuals(x, y, &trial);

                if trial_cost.is_finite() && trial_cost < current_cost {
                    let step_norm = norm(&sub(&trial, &theta));
                    let improvement = current_cost - trial_cost;
                    // A step clipped by a bound says nothing about convergence.
                    let converged = !truncated
                        && (improvement <= self.config.ftol * current_cost
                            || step_norm <= self.config.xtol * (norm(&theta) + self.config.xtol));

                    theta = trial;
                    current_cost = trial_cost;
                    lambda = (lambda / 10.0).max(LAMBDA_MIN);

                    if converged {
                        return Ok((theta, current_cost));
                    }
                    break;
                }

                lambda *= 10.0;
            }
        }
    }
}

/// Model evaluations left for one LM run.
struct Budget {
    used: usize,
    max: usize,
}

impl Budget {
    /// The initial-guess evaluation is already spent.
    fn new(max: usize) -> Self {
        Self { used: 1, max: max.max(1) }
    }

    fn spend(&mut self) -> Result<()> {
        if self.used >= self.max {
            return Err(AnalysisError::FitFailure(format!(
                "no convergence within {} evaluations",
                self.max
            )));
        }
        self.used += 1;
        Ok(())
    }
}

struct Bounds {
    lower: [f64; 4],
    upper: [f64; 4],
}

impl Bounds {
    fn project(&self, theta: [f64; 4]) -> [f64; 4] {
        let mut out = theta;
        for i in 0..4 {
            out[i] = theta[i].clamp(self.lower[i], self.upper[i]);
        }
        out
    }

    /// Coordinates the next step may move. `grad` is `Jᵀr`, the descent
    /// direction of the cost.
    fn free_coordinates(&self, theta: &[f64; 4], grad: &DVector<f64>) -> [bool; 4] {
        let mut free = [true; 4];
        for i in 0..4 {
            let outward = (theta[i] <= self.lower[i] && grad[i] <= 0.0)
                || (theta[i] >= self.upper[i] && grad[i] >= 0.0);
            free[i] = !outward;
        }
        free
    }
}

fn starting_points(doses: &[f64], viabilities: &[f64], bounds: &Bounds) -> Vec<[f64; 4]> {
    let ic50_guess = median(doses).unwrap_or_else(|| bounds.lower[2].exp());
    let mut starts = vec![bounds.project([1.0, 0.0, ic50_guess.ln(), 1.0])];

    let top = viabilities.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let bottom = viabilities.iter().copied().fold(f64::INFINITY, f64::min);
    let (lo, hi) = (bounds.lower[2], bounds.upper[2]);
    for k in 0..IC50_STARTS {
        let ln_ic50 = lo + (k as f64 + 0.5) / IC50_STARTS as f64 * (hi - lo);
        for &hill in &HILL_STARTS {
            starts.push(bounds.project([top, bottom, ln_ic50, hill]));
        }
    }
    starts
}

/// Largest `|J_iᵀr| / (|J_i|·|r|)` over the free coordinates.
fn gradient_cosine(jtj: &DMatrix<f64>, grad: &DVector<f64>, cost: f64, free: &[bool; 4]) -> f64 {
    let resid_norm = cost.sqrt();
    (0..4)
        .filter(|&i| free[i])
        .map(|i| {
            let col_norm = jtj[(i, i)].sqrt();
            if col_norm == 0.0 || resid_norm == 0.0 {
                0.0
            } else {
                grad[i].abs() / (col_norm * resid_norm)
            }
        })
        .fold(0.0, f64::max)
}

/// Solve `(JᵀJ + λ·diag(JᵀJ)) δ = Jᵀr` over the free coordinates; fixed ones
/// get a zero step.
fn damped_step(jtj: &DMatrix<f64>, grad: &DVector<f64>, free: &[bool; 4], lambda: f64) -> Option<[f64; 4]> {
    let idx: Vec<usize> = (0..4).filter(|&i| free[i]).collect();
    let mut delta = [0.0; 4];
    if idx.is_empty() {
        return Some(delta);
    }

    let k = idx.len();
    let mut damped = DMatrix::<f64>::zeros(k, k);
    let mut rhs = DVector::<f64>::zeros(k);
    for (a, &i) in idx.iter().enumerate() {
        rhs[a] = grad[i];
        for (b, &j) in idx.iter().enumerate() {
            damped[(a, b)] = jtj[(i, j)];
        }
        damped[(a, a)] += lambda * jtj[(i, i)].max(1e-12);
    }

    let solved = solve_least_squares(&damped, &rhs)?;
    for (a, &i) in idx.iter().enumerate() {
        delta[i] = solved[a];
    }
    Some(delta)
}

/// Backtracking search along the projected descent direction. `None` once
/// the step no longer moves `θ` without having lowered the cost.
fn projected_gradient_step(
    x: &[f64],
    y: &[f64],
    theta: &[f64; 4],
    current_cost: f64,
    direction: &[f64; 4],
    bounds: &Bounds,
    budget: &mut Budget,
) -> Result<Option<([f64; 4], f64)>> {
    let length = norm(direction);
    if length == 0.0 {
        return Ok(None);
    }

    let mut alpha = 1.0 / length;
    loop {
        let trial = bounds.project([
            theta[0] + alpha * direction[0],
            theta[1] + alpha * direction[1],
            theta[2] + alpha * direction[2],
            theta[3] + alpha * direction[3],
        ]);
        if trial == *theta {
            return Ok(None);
        }

        budget.spend()?;
        let trial_cost = sum_squared_residuals(x, y, &trial);
        if trial_cost.is_finite() && trial_cost < current_cost {
            return Ok(Some((trial, trial_cost)));
        }
        alpha *= 0.5;
    }
}

fn validate_input(doses: &[f64], viabilities: &[f64]) -> Result<()> {
    if doses.is_empty() {
        return Err(AnalysisError::FitFailure("no observations".into()));
    }
    if doses.len() != viabilities.len() {
        return Err(AnalysisError::FitFailure(format!(
            "length mismatch: {} doses vs {} viabilities",
            doses.len(),
            viabilities.len()
        )));
    }
    if doses.iter().any(|d| !(d.is_finite() && *d > 0.0)) {
        return Err(AnalysisError::FitFailure("doses must be finite and > 0".into()));
    }
    if viabilities.iter().any(|v| !v.is_finite()) {
        return Err(AnalysisError::FitFailure("non-finite viability".into()));
    }
    Ok(())
}

fn sum_squared_residuals(x: &[f64], y: &[f64], theta: &[f64; 4]) -> f64 {
    let ic50 = theta[2].exp();
    x.iter()
        .zip(y)
        .map(|(&d, &obs)| {
            let r = obs - four_pl(d, theta[0], theta[1], ic50, theta[3]);
            r * r
        })
        .sum()
}

/// Jacobian of the model w.r.t. `θ` and the residual vector `y - f(x; θ)`.
fn jacobian(x: &[f64], y: &[f64], theta: &[f64; 4]) -> (DMatrix<f64>, DVector<f64>) {
    let [top, bottom, ln_ic50, hill] = *theta;
    let ic50 = ln_ic50.exp();
    let span = top - bottom;
    let n = x.len();

    let mut jac = DMatrix::<f64>::zeros(n, 4);
    let mut resid = DVector::<f64>::zeros(n);

    for i in 0..n {
        let ratio = x[i] / ic50;
        let u = ratio.powf(hill);
        let denom = 1.0 + u;
        let f = bottom + span / denom;
        let shape = u / (denom * denom);

        jac[(i, 0)] = 1.0 / denom;
        jac[(i, 1)] = u / denom;
        jac[(i, 2)] = span * hill * shape;
        jac[(i, 3)] = -span * shape * ratio.ln();
        resid[i] = y[i] - f;
    }

    (jac, resid)
}

fn sub(a: &[f64; 4], b: &[f64; 4]) -> [f64; 4] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2], a[3] - b[3]]
}

fn norm(v: &[f64; 4]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}
