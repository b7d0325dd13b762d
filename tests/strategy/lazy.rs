use std::cell::RefCell;
use std::ops::ControlFlow;
use std::rc::Rc;

use cmaes_engine::prelude::*;

use crate::test_functions::{ellipsoid, sphere};

/// Generations at which the eigendecomposition was refreshed.
fn refresh_generations(params: CmaParameters) -> Vec<usize> {
    let refreshed = Rc::new(RefCell::new(Vec::new()));
    let log = Rc::clone(&refreshed);
    let mut strategy = CmaStrategy::new(sphere, params)
        .unwrap()
        .with_progress(move |_, sols| {
            assert!(sols.eigeniter <= sols.niter);
            if sols.updated_eigen {
                assert_eq!(sols.eigeniter, sols.niter);
                log.borrow_mut().push(sols.niter);
            }
            ControlFlow::Continue(())
        });
    strategy.optimize().unwrap();
    assert_eq!(
        strategy.solutions().status(),
        RunStatus::Stopped(StopReason::MaxIter)
    );
    refreshed.take()
}

fn params(lazy: bool, threshold: usize) -> CmaParameters {
    CmaParameters::builder(&[1.0; 10], 0.5)
        .lazy_update(lazy)
        .lazy_threshold(threshold)
        .max_iter(20)
        .seed(6)
        .quiet(true)
        .build()
        .unwrap()
}

#[test]
fn lazy_refresh_every_threshold_plus_one_generations() {
    assert_eq!(refresh_generations(params(true, 3)), vec![0, 4, 8, 12, 16]);
    assert_eq!(refresh_generations(params(true, 6)), vec![0, 7, 14]);
}

#[test]
fn zero_threshold_refreshes_every_generation() {
    assert_eq!(
        refresh_generations(params(true, 0)),
        (0..20).collect::<Vec<_>>()
    );
}

#[test]
fn disabled_lazy_update_ignores_threshold() {
    assert_eq!(
        refresh_generations(params(false, 100)),
        (0..20).collect::<Vec<_>>()
    );
}

#[test]
fn default_threshold_matches_learning_rates() {
    let p = CmaParameters::builder(&[0.0; 100], 1.0).build().unwrap();
    let expected = (1.0 / ((p.c1() + p.c_mu()) * 100.0 * 10.0)).floor() as usize;
    assert_eq!(p.lazy_threshold(), expected);
    assert!(p.lazy_threshold() >= 1);
}

#[test]
fn stale_eigendecomposition_still_converges() {
    let params = CmaParameters::builder(&[1.0; 6], 0.5)
        .lazy_update(true)
        .lazy_threshold(5)
        .seed(12)
        .quiet(true)
        .build()
        .unwrap();
    let sols = cmaes(ellipsoid, params).unwrap();
    assert!(sols.best_seen_candidate().unwrap().fvalue < 1e-8);
}
