//! Least-squares step solver.
//!
//! The curve fitter solves a small damped normal-equation system at every
//! Levenberg–Marquardt iteration:
//!
//! ```text
//! (JᵀJ + λ·D) δ = Jᵀr
//! ```
//!
//! The system is 4×4 but can be rank deficient (e.g. when the plateaus
//! coincide the ic50 and hill columns vanish), so we solve with SVD and a
//! truncation tolerance instead of a Cholesky factorisation.

use nalgebra::{DMatrix, DVector};

/// Solve a least squares problem using SVD.
///
/// Returns `None` if no finite solution is found at any tolerance.
pub fn solve_least_squares(x: &DMatrix<f64>, y: &DVector<f64>) -> Option<DVector<f64>> {
    let svd = x.clone().svd(true, true);

    for &tol in &[1e-12, 1e-10, 1e-8] {
        if let Ok(beta) = svd.solve(y, tol) {
            if beta.iter().all(|v| v.is_finite()) {
                return Some(beta);
            }
        }
    }

    None
}
