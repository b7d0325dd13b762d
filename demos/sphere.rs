//! Minimize a 10-dimensional sphere with the one-call entry point.
//!
//! Run with: `cargo run --example sphere --features tracing`

use cmaes_engine::prelude::*;

fn main() -> cmaes_engine::Result<()> {
    let params = CmaParameters::builder(&[3.0; 10], 1.0)
        .seed(2024)
        .flavor(UpdateFlavor::Active)
        .build()?;
    let lambda = params.lambda();

    let sols = cmaes(|x: &[f64]| x.iter().map(|v| v * v).sum::<f64>(), params)?;

    let best = sols
        .best_seen_candidate()
        .expect("a finished run has evaluated at least one generation");
    println!(
        "{:?} (code {}) after {} generations of {lambda} ({} evaluations)",
        sols.status(),
        sols.status().code(),
        sols.niter + 1,
        sols.nevals,
    );
    println!("best f = {:.3e}, sigma = {:.3e}", best.fvalue, sols.sigma);
    println!("condition number of C: {:.3e}", sols.condition_number());

    Ok(())
}
