use super::{CovarianceUpdate, adapt_sigma, advance_paths, blend_covariance, check_finite, old_weight};
use crate::parameters::CmaParameters;
use crate::sampler::GaussianSampler;
use crate::solutions::CmaSolutions;
use crate::status::Failure;

/// Rank-one plus rank-mu covariance update with cumulative step-size adaptation.
///
/// The new mean is the weighted recombination of the best `mu` candidates.
/// The covariance blends its decayed old value with the outer product of
/// the rank-one path (`c1`) and the weighted spread of the selected steps
/// (`c_mu`). All weights are positive, so the result stays positive
/// definite; only non-finite entries are reported.
#[derive(Clone, Copy, Debug, Default)]
pub struct StandardUpdate;

impl CovarianceUpdate for StandardUpdate {
    fn update(
        &self,
        parameters: &CmaParameters,
        sampler: &GaussianSampler,
        solutions: &mut CmaSolutions,
    ) -> Result<(), Failure> {
        let step = advance_paths(parameters, sampler, solutions);

        let weighted: Vec<(f64, _)> = parameters
            .weights()
            .iter()
            .copied()
            .zip(&step.ys)
            .collect();
        let old = old_weight(parameters, step.h_sigma, parameters.weights().sum());
        blend_covariance(parameters, solutions, old, &weighted);

        adapt_sigma(parameters, solutions, step.psigma_norm);

        check_finite(&solutions.cov)?;
        if solutions.sigma.is_finite() {
            Ok(())
        } else {
            Err(Failure::IndefiniteCovariance)
        }
    }
}
