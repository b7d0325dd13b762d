use cmaes_engine::prelude::*;
use nalgebra::DMatrix;

use crate::test_functions::{constant, ellipsoid, sphere};

fn quiet(x0: &[f64], sigma0: f64) -> CmaParametersBuilder {
    CmaParameters::builder(x0, sigma0).seed(42).quiet(true)
}

#[test]
fn sphere_5d_converges_and_stops_by_criterion() {
    let params = quiet(&[5.0; 5], 1.0).build().unwrap();
    let sols = cmaes(sphere, params).unwrap();

    let best = sols.best_seen_candidate().unwrap();
    assert!(best.fvalue < 1e-10, "best fitness {} not below 1e-10", best.fvalue);
    assert!(
        sols.status().code() > 0,
        "expected a successful stop, got {:?}",
        sols.status()
    );
    assert!(
        !matches!(
            sols.status(),
            RunStatus::Stopped(StopReason::AutoMaxIter | StopReason::MaxIter)
        ),
        "stopped on an iteration cap: {:?}",
        sols.status()
    );
    assert!(sols.niter < 1000, "took {} generations", sols.niter);
}

#[test]
fn fixed_coordinate_is_held_exactly() {
    let params = quiet(&[5.0; 5], 1.0).fix(2, 3.0).build().unwrap();
    let sols = cmaes(sphere, params).unwrap();

    assert_eq!(sols.xmean[2], 3.0);
    for i in [0, 1, 3, 4] {
        assert!(
            sols.xmean[i].abs() < 1e-3,
            "coordinate {i} did not converge: {}",
            sols.xmean[i]
        );
    }
    let best = sols.best_seen_candidate().unwrap();
    assert_eq!(best.x[2], 3.0);
    assert!((best.fvalue - 9.0).abs() < 1e-6);
}

#[test]
fn flat_fitness_stops_quickly() {
    let params = quiet(&[1.0; 4], 1.0).build().unwrap();
    let sols = cmaes(constant, params).unwrap();

    assert!(
        matches!(
            sols.status(),
            RunStatus::Stopped(StopReason::EqualFunVals | StopReason::TolHistFun)
        ),
        "unexpected status {:?}",
        sols.status()
    );
    assert!(sols.niter < 20, "flat fitness ran {} generations", sols.niter);
}

#[test]
fn active_flavor_converges_on_sphere() {
    let params = quiet(&[3.0; 6], 1.0)
        .flavor(UpdateFlavor::Active)
        .build()
        .unwrap();
    let sols = cmaes(sphere, params).unwrap();
    assert!(sols.best_seen_candidate().unwrap().fvalue < 1e-10);
    assert!(sols.status().code() > 0);
}

#[test]
fn learns_ill_conditioned_ellipsoid() {
    let params = quiet(&[1.0; 5], 0.5).build().unwrap();
    let sols = cmaes(ellipsoid, params).unwrap();

    let best = sols.best_seen_candidate().unwrap().fvalue;
    assert!(best < 1e-8, "ellipsoid best {best}");
    // The adapted distribution is elongated along the first axis.
    assert!(sols.condition_number() > 1e2);
}

#[test]
fn separable_mode_keeps_diagonal_covariance() {
    let params = quiet(&[1.0; 8], 0.5).separable(true).build().unwrap();
    let sols = cmaes(ellipsoid, params).unwrap();

    let best = sols.best_seen_candidate().unwrap().fvalue;
    assert!(best < 1e-8, "separable ellipsoid best {best}");
    let off_diagonal = &sols.cov - DMatrix::from_diagonal(&sols.cov.diagonal());
    assert_eq!(off_diagonal.norm(), 0.0);
    assert_eq!(sols.leigenvectors, DMatrix::identity(8, 8));
    assert_eq!(sols.leigenvalues, sols.cov.diagonal());
    assert!(!sols.updated_eigen);
}

#[test]
fn same_seed_reproduces_the_run() {
    let run = || {
        let params = quiet(&[2.0, -1.0, 0.5, 3.0], 0.7).seed(1234).build().unwrap();
        cmaes(sphere, params).unwrap()
    };
    let a = run();
    let b = run();

    assert_eq!(a.nevals, b.nevals);
    assert_eq!(a.xmean, b.xmean);
    assert_eq!(
        a.best_seen_candidate().unwrap().fvalue,
        b.best_seen_candidate().unwrap().fvalue
    );
    assert_eq!(a.status(), b.status());
}

#[test]
fn unseeded_runs_record_their_seed() {
    let params = CmaParameters::builder(&[1.0; 3], 1.0).quiet(true).build().unwrap();
    let seed = params.seed();
    let replay = CmaParameters::builder(&[1.0; 3], 1.0)
        .quiet(true)
        .seed(seed)
        .build()
        .unwrap();

    let a = cmaes(sphere, params).unwrap();
    let b = cmaes(sphere, replay).unwrap();
    assert_eq!(a.xmean, b.xmean);
}

#[test]
fn genopheno_transform_is_applied_before_evaluation() {
    // Fitness sees 2x the genotype and is minimized at phenotype 4.
    let params = quiet(&[0.0; 3], 1.0).build().unwrap();
    let shifted = |x: &[f64]| x.iter().map(|v| (v - 4.0).powi(2)).sum::<f64>();
    let mut strategy = CmaStrategy::new(shifted, params)
        .unwrap()
        .with_genopheno(|g: &DMatrix<f64>| g * 2.0);
    strategy.optimize().unwrap();

    let pheno = strategy.best_phenotype().unwrap();
    let geno = &strategy.solutions().best_seen_candidate().unwrap().x;
    for i in 0..3 {
        assert!((pheno[i] - 4.0).abs() < 1e-4, "phenotype {}", pheno[i]);
        assert!((geno[i] - 2.0).abs() < 1e-4, "genotype {}", geno[i]);
    }
}
