//! Covariance update policies.
//!
//! A policy consumes the ranked, evaluated candidates of the current
//! generation and adapts the mean, covariance matrix, evolution paths and
//! step size of the [`CmaSolutions`] in place. Two policies ship with the
//! crate:
//!
//! | Policy | Flavor | Notes |
//! |--------|--------|-------|
//! | [`StandardUpdate`] | [`UpdateFlavor::Standard`] | rank-one + rank-mu, always positive definite |
//! | [`ActiveUpdate`] | [`UpdateFlavor::Active`] | also subtracts the worst candidates; checked by Cholesky |
//!
//! Custom policies implement [`CovarianceUpdate`] and are installed with
//! [`CmaStrategy::with_update`](crate::CmaStrategy::with_update).

mod active;
mod standard;

pub use active::ActiveUpdate;
pub use standard::StandardUpdate;

use nalgebra::{DMatrix, DVector};

use crate::parameters::{CmaParameters, UpdateFlavor};
use crate::sampler::GaussianSampler;
use crate::solutions::CmaSolutions;
use crate::status::Failure;

/// Adapts the search distribution from one ranked generation.
pub trait CovarianceUpdate {
    /// Update `solutions.xmean`, `solutions.cov` and `solutions.sigma` in place.
    ///
    /// `solutions.candidates` is already sorted by ascending fitness. The
    /// sampler provides `C^{-1/2}` of the transform used for this generation.
    ///
    /// # Errors
    ///
    /// Returns a [`Failure`] when the updated covariance is no longer a valid
    /// (finite, positive definite) matrix. The engine records it as a fatal
    /// run status; the update is not repaired.
    fn update(
        &self,
        parameters: &CmaParameters,
        sampler: &GaussianSampler,
        solutions: &mut CmaSolutions,
    ) -> Result<(), Failure>;
}

/// Policy implementing the given flavor.
#[must_use]
pub fn policy_for(flavor: UpdateFlavor) -> Box<dyn CovarianceUpdate> {
    match flavor {
        UpdateFlavor::Standard => Box::new(StandardUpdate),
        UpdateFlavor::Active => Box::new(ActiveUpdate),
    }
}

/// Quantities shared by both policies once the mean has moved.
struct Step {
    /// Steps `(x_i - old_mean) / sigma` of all ranked candidates.
    ys: Vec<DVector<f64>>,
    /// Stall indicator of the step-size path (0 or 1).
    h_sigma: f64,
    /// Norm of the updated step-size path.
    psigma_norm: f64,
}

/// Recombine the mean and advance both evolution paths.
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
fn advance_paths(
    parameters: &CmaParameters,
    sampler: &GaussianSampler,
    solutions: &mut CmaSolutions,
) -> Step {
    let n = parameters.dim();
    let sigma = solutions.sigma;
    let c_sigma = parameters.c_sigma();
    let c_c = parameters.c_c();
    let mu_eff = parameters.mu_eff();

    let old_mean = solutions.xmean.clone();
    let mut new_mean = DVector::zeros(n);
    for (w, c) in parameters.weights().iter().zip(&solutions.candidates) {
        new_mean += *w * &c.x;
    }

    let ys: Vec<DVector<f64>> = solutions
        .candidates
        .iter()
        .map(|c| (&c.x - &old_mean) / sigma)
        .collect();

    let y_w = (&new_mean - &old_mean) / sigma;

    solutions.psigma = (1.0 - c_sigma) * &solutions.psigma
        + (c_sigma * (2.0 - c_sigma) * mu_eff).sqrt() * sampler.inv_sqrt_apply(&y_w);

    // Generations seen so far, this one included.
    let generations = (solutions.nevals / parameters.lambda()).max(1);
    let psigma_norm = solutions.psigma.norm();
    let threshold = (1.0 - (1.0 - c_sigma).powi(2 * generations as i32)).sqrt()
        * (1.4 + 2.0 / (n as f64 + 1.0))
        * parameters.chi_n();
    let h_sigma = if psigma_norm < threshold { 1.0 } else { 0.0 };

    solutions.pc = (1.0 - c_c) * &solutions.pc
        + h_sigma * (c_c * (2.0 - c_c) * mu_eff).sqrt() * &y_w;

    solutions.xmean = new_mean;

    Step {
        ys,
        h_sigma,
        psigma_norm,
    }
}

/// Cumulative step-size adaptation.
fn adapt_sigma(parameters: &CmaParameters, solutions: &mut CmaSolutions, psigma_norm: f64) {
    solutions.sigma *= ((parameters.c_sigma() / parameters.d_sigma())
        * (psigma_norm / parameters.chi_n() - 1.0))
        .exp();
}

/// Weight of the old covariance: `1 - c1 - c_mu * sum(w) + c1 * delta(h_sigma)`.
fn old_weight(parameters: &CmaParameters, h_sigma: f64, weight_sum: f64) -> f64 {
    let c_c = parameters.c_c();
    let delta_h = (1.0 - h_sigma) * c_c * (2.0 - c_c);
    1.0 - parameters.c1() - parameters.c_mu() * weight_sum + parameters.c1() * delta_h
}

/// Blend old covariance, rank-one and weighted rank-mu terms.
///
/// `weighted` pairs each step with its (possibly negative) weight. In
/// separable mode only the diagonal is touched.
fn blend_covariance(
    parameters: &CmaParameters,
    solutions: &mut CmaSolutions,
    old_weight: f64,
    weighted: &[(f64, &DVector<f64>)],
) {
    let c1 = parameters.c1();
    let c_mu = parameters.c_mu();

    if parameters.separable() {
        let n = parameters.dim();
        for i in 0..n {
            let rank_mu: f64 = weighted.iter().map(|(w, y)| w * y[i] * y[i]).sum();
            solutions.cov[(i, i)] = old_weight * solutions.cov[(i, i)]
                + c1 * solutions.pc[i] * solutions.pc[i]
                + c_mu * rank_mu;
        }
        return;
    }

    let mut rank_mu = DMatrix::zeros(parameters.dim(), parameters.dim());
    for (w, y) in weighted {
        rank_mu.ger(*w, *y, *y, 1.0);
    }

    let mut cov = old_weight * &solutions.cov;
    cov.ger(c1, &solutions.pc, &solutions.pc, 1.0);
    cov += c_mu * rank_mu;

    // Enforce symmetry.
    solutions.cov = (&cov + cov.transpose()) * 0.5;
}

/// Every entry of the covariance is finite.
fn check_finite(cov: &DMatrix<f64>) -> Result<(), Failure> {
    if cov.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Failure::IndefiniteCovariance)
    }
}
