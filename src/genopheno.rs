//! Mapping from the internal search space to the space the fitness sees.
//!
//! The engine only ever stores and adapts genotype vectors. Before each
//! evaluation the whole population is mapped column-wise through a
//! [`GenoPheno`] transform, and [`CmaStrategy::best_phenotype`] applies the
//! same mapping to report results. Any closure
//! `Fn(&DMatrix<f64>) -> DMatrix<f64>` is a transform:
//!
//! ```
//! use cmaes_engine::GenoPheno;
//! use nalgebra::DMatrix;
//!
//! // Scale the first coordinate by 10.
//! let scale = |g: &DMatrix<f64>| {
//!     let mut p = g.clone();
//!     p.row_mut(0).scale_mut(10.0);
//!     p
//! };
//! let pop = DMatrix::from_element(2, 3, 1.0);
//! assert_eq!(scale.pheno(&pop)[(0, 1)], 10.0);
//! ```
//!
//! [`CmaStrategy::best_phenotype`]: crate::CmaStrategy::best_phenotype

use nalgebra::{DMatrix, DVector};

/// Genotype-to-phenotype transform applied before fitness evaluation.
pub trait GenoPheno {
    /// Map a `dim x lambda` genotype population to phenotype space.
    fn pheno(&self, genotypes: &DMatrix<f64>) -> DMatrix<f64>;

    /// Map a single genotype vector.
    fn pheno_vector(&self, genotype: &DVector<f64>) -> DVector<f64> {
        let column = DMatrix::from_column_slice(genotype.len(), 1, genotype.as_slice());
        self.pheno(&column).column(0).into_owned()
    }
}

/// Identity transform: phenotype equals genotype.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTransform;

impl GenoPheno for NoTransform {
    fn pheno(&self, genotypes: &DMatrix<f64>) -> DMatrix<f64> {
        genotypes.clone()
    }

    fn pheno_vector(&self, genotype: &DVector<f64>) -> DVector<f64> {
        genotype.clone()
    }
}

impl<F> GenoPheno for F
where
    F: Fn(&DMatrix<f64>) -> DMatrix<f64>,
{
    fn pheno(&self, genotypes: &DMatrix<f64>) -> DMatrix<f64> {
        self(genotypes)
    }
}
