use nalgebra::Cholesky;

use super::{CovarianceUpdate, adapt_sigma, advance_paths, blend_covariance, check_finite, old_weight};
use crate::parameters::CmaParameters;
use crate::sampler::GaussianSampler;
use crate::solutions::CmaSolutions;
use crate::status::Failure;

/// Active covariance update: the standard update plus a negatively weighted
/// rank-mu term built from the worst `lambda - mu` candidates.
///
/// Each negative contribution is rescaled by `n / ||C^{-1/2} y||^2` so that
/// long unsuccessful steps do not dominate. The negative weights are
/// bounded when the parameters are derived, but the subtraction can still
/// make the matrix indefinite on adversarial rankings. The result is checked
/// with a Cholesky factorization (a positive diagonal in separable mode) and
/// a failed check is reported as [`Failure::IndefiniteCovariance`].
#[derive(Clone, Copy, Debug, Default)]
pub struct ActiveUpdate;

impl CovarianceUpdate for ActiveUpdate {
    #[allow(clippy::cast_precision_loss)]
    fn update(
        &self,
        parameters: &CmaParameters,
        sampler: &GaussianSampler,
        solutions: &mut CmaSolutions,
    ) -> Result<(), Failure> {
        let n = parameters.dim() as f64;
        let mu = parameters.mu();

        let step = advance_paths(parameters, sampler, solutions);

        let mut weighted: Vec<(f64, _)> = parameters
            .weights()
            .iter()
            .copied()
            .zip(&step.ys)
            .collect();
        for (w, y) in parameters
            .negative_weights()
            .iter()
            .zip(step.ys.iter().skip(mu))
        {
            let mahalanobis_sq = sampler.inv_sqrt_apply(y).norm_squared();
            if mahalanobis_sq > 0.0 {
                weighted.push((w * n / mahalanobis_sq, y));
            }
        }

        let weight_sum = parameters.weights().sum() + parameters.negative_weights().sum();
        let old = old_weight(parameters, step.h_sigma, weight_sum);
        blend_covariance(parameters, solutions, old, &weighted);

        adapt_sigma(parameters, solutions, step.psigma_norm);

        check_finite(&solutions.cov)?;
        if !solutions.sigma.is_finite() {
            return Err(Failure::IndefiniteCovariance);
        }

        let positive_definite = if parameters.separable() {
            solutions.cov.diagonal().iter().all(|&v| v > 0.0)
        } else {
            Cholesky::new(solutions.cov.clone()).is_some()
        };
        if positive_definite {
            Ok(())
        } else {
            Err(Failure::IndefiniteCovariance)
        }
    }
}
