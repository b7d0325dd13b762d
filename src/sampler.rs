//! Multivariate normal sampler backed by an eigendecomposition of the covariance.
//!
//! Draws are `mean + sigma * B * D * z` with `z ~ N(0, I)`, where `B` holds
//! the eigenvectors of `C` and `D` the square roots of its eigenvalues. In
//! diagonal (separable) mode `B` is the identity and `D` is the elementwise
//! square root of the diagonal, so no eigendecomposition is ever computed.
//!
//! The sampler never decides on its own when to refresh its transform: the
//! caller triggers that through [`GaussianSampler::set_covar`] or
//! [`GaussianSampler::set_diagonal`].

use nalgebra::{DMatrix, DVector};
use rand::rngs::StdRng;
use rand::{RngExt, SeedableRng};

use crate::status::Failure;

/// Sampling transform derived from the covariance.
#[derive(Clone, Debug)]
enum Transform {
    /// Full covariance: eigenvectors `B`, eigenvalues, and `B * D`.
    Full {
        eigenvalues: DVector<f64>,
        eigenvectors: DMatrix<f64>,
        sqrt_eigenvalues: DVector<f64>,
        transform: DMatrix<f64>,
    },
    /// Diagonal covariance: variances and their square roots.
    Diagonal {
        variances: DVector<f64>,
        deviations: DVector<f64>,
    },
}

/// Seeded sampler for `N(mean, sigma^2 * C)`.
pub struct GaussianSampler {
    mean: DVector<f64>,
    transform: Transform,
    rng: StdRng,
}

impl GaussianSampler {
    /// Standard normal sampler in `dim` dimensions with a fixed seed.
    #[must_use]
    pub fn new(dim: usize, seed: u64) -> Self {
        Self {
            mean: DVector::zeros(dim),
            transform: Transform::Diagonal {
                variances: DVector::from_element(dim, 1.0),
                deviations: DVector::from_element(dim, 1.0),
            },
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Dimension of the distribution.
    #[must_use]
    pub fn dim(&self) -> usize {
        self.mean.len()
    }

    /// Sets the distribution mean.
    pub fn set_mean(&mut self, mean: &DVector<f64>) {
        self.mean.clone_from(mean);
    }

    /// Eigendecompose `cov` and install the resulting transform.
    ///
    /// The matrix is symmetrized before decomposition. On error the previous
    /// transform is kept untouched.
    ///
    /// # Errors
    ///
    /// Returns [`Failure::EigenDecomposition`] if an eigenvalue is not finite
    /// and [`Failure::IndefiniteCovariance`] if one is negative.
    pub fn set_covar(&mut self, cov: &DMatrix<f64>) -> Result<(), Failure> {
        let symmetric = (cov + cov.transpose()) * 0.5;
        let eigen = symmetric.symmetric_eigen();

        if eigen.eigenvalues.iter().any(|v| !v.is_finite()) {
            return Err(Failure::EigenDecomposition);
        }
        if eigen.eigenvalues.iter().any(|&v| v < 0.0) {
            return Err(Failure::IndefiniteCovariance);
        }

        let sqrt_eigenvalues = eigen.eigenvalues.map(f64::sqrt);
        let mut transform = eigen.eigenvectors.clone();
        for (mut column, &d) in transform.column_iter_mut().zip(sqrt_eigenvalues.iter()) {
            column *= d;
        }

        self.transform = Transform::Full {
            eigenvalues: eigen.eigenvalues,
            eigenvectors: eigen.eigenvectors,
            sqrt_eigenvalues,
            transform,
        };
        Ok(())
    }

    /// Install a diagonal covariance without any decomposition.
    ///
    /// # Errors
    ///
    /// Returns [`Failure::IndefiniteCovariance`] if a variance is negative or
    /// not finite.
    pub fn set_diagonal(&mut self, variances: &DVector<f64>) -> Result<(), Failure> {
        if variances.iter().any(|&v| !v.is_finite() || v < 0.0) {
            return Err(Failure::IndefiniteCovariance);
        }
        self.transform = Transform::Diagonal {
            variances: variances.clone(),
            deviations: variances.map(f64::sqrt),
        };
        Ok(())
    }

    /// Whether the installed transform is diagonal.
    #[must_use]
    pub const fn is_diagonal(&self) -> bool {
        matches!(self.transform, Transform::Diagonal { .. })
    }

    /// Eigenvalues of the installed covariance (the variances in diagonal mode).
    #[must_use]
    pub fn eigenvalues(&self) -> &DVector<f64> {
        match &self.transform {
            Transform::Full { eigenvalues, .. } => eigenvalues,
            Transform::Diagonal { variances, .. } => variances,
        }
    }

    /// Eigenvectors of the installed covariance (identity in diagonal mode).
    #[must_use]
    pub fn eigenvectors(&self) -> DMatrix<f64> {
        match &self.transform {
            Transform::Full { eigenvectors, .. } => eigenvectors.clone(),
            Transform::Diagonal { variances, .. } => {
                DMatrix::identity(variances.len(), variances.len())
            }
        }
    }

    /// Apply `C^{-1/2}` of the installed covariance to `v`.
    ///
    /// Zero eigenvalues map to a zero component rather than infinity.
    #[must_use]
    pub fn inv_sqrt_apply(&self, v: &DVector<f64>) -> DVector<f64> {
        match &self.transform {
            Transform::Full {
                eigenvectors,
                sqrt_eigenvalues,
                ..
            } => {
                let projected = eigenvectors.tr_mul(v);
                let scaled = projected.zip_map(sqrt_eigenvalues, inv_or_zero);
                eigenvectors * scaled
            }
            Transform::Diagonal { deviations, .. } => v.zip_map(deviations, inv_or_zero),
        }
    }

    /// Draw `lambda` samples from `N(mean, sigma^2 * C)` as columns of a `dim x lambda` matrix.
    pub fn samples(&mut self, lambda: usize, sigma: f64) -> DMatrix<f64> {
        let n = self.dim();
        let rng = &mut self.rng;
        let z = DMatrix::from_fn(n, lambda, |_, _| sample_standard_normal(rng));

        let mut pop = match &self.transform {
            Transform::Full { transform, .. } => transform * z,
            Transform::Diagonal { deviations, .. } => {
                let mut scaled = z;
                for mut column in scaled.column_iter_mut() {
                    column.component_mul_assign(deviations);
                }
                scaled
            }
        };

        pop *= sigma;
        for mut column in pop.column_iter_mut() {
            column += &self.mean;
        }
        pop
    }
}

fn inv_or_zero(x: f64, d: f64) -> f64 {
    if d > 0.0 { x / d } else { 0.0 }
}

/// Sample a value from the standard normal distribution using Box-Muller transform.
fn sample_standard_normal(rng: &mut StdRng) -> f64 {
    let u1: f64 = rng.random_range(f64::EPSILON..=1.0);
    let u2: f64 = rng.random_range(0.0_f64..=core::f64::consts::TAU);
    (-2.0 * u1.ln()).sqrt() * u2.cos()
}
