use cmaes_engine::prelude::*;

use crate::test_functions::sphere;

fn tempdir() -> std::path::PathBuf {
    use std::sync::atomic::{AtomicU64, Ordering};
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let id = COUNTER.fetch_add(1, Ordering::Relaxed);
    let dir =
        std::env::temp_dir().join(format!("cmaes_telemetry_test_{}_{id}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    dir
}

#[test]
fn one_row_per_generation_with_expected_columns() {
    let dir = tempdir();
    let path = dir.join("progress.dat");
    let n = 3;
    let params = CmaParameters::builder(&[1.0; 3], 0.5)
        .telemetry_path(&path)
        .max_iter(5)
        .seed(2)
        .quiet(true)
        .build()
        .unwrap();
    let lambda = params.lambda();
    cmaes(sphere, params).unwrap();

    let contents = std::fs::read_to_string(&path).unwrap();
    let rows: Vec<Vec<f64>> = contents
        .lines()
        .map(|l| l.split_whitespace().map(|v| v.parse().unwrap()).collect())
        .collect();
    assert_eq!(rows.len(), 5);
    for (g, row) in rows.iter().enumerate() {
        assert_eq!(row.len(), 3 * n + 5, "row {g}");
        assert_eq!(row[1] as usize, lambda * (g + 1), "cumulative evaluations");
        assert!(row[0] >= 0.0);
        assert!(row[2] > 0.0, "step size");
        assert!(row[3] >= 1.0, "condition proxy");
        assert!(row[3 * n + 4] >= 0.0, "elapsed ms");
    }

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn unopenable_sink_fails_construction() {
    let dir = tempdir();
    // A directory cannot be opened as the telemetry file.
    let params = CmaParameters::builder(&[1.0; 2], 0.5)
        .telemetry_path(&dir)
        .quiet(true)
        .build()
        .unwrap();
    let result = CmaStrategy::new(sphere, params);
    assert!(matches!(result, Err(Error::Telemetry(_))));

    std::fs::remove_dir_all(&dir).unwrap();
}

#[test]
fn repeated_stop_writes_one_row_per_generation() {
    let dir = tempdir();
    let path = dir.join("progress.dat");
    let params = CmaParameters::builder(&[1.0; 2], 0.5)
        .telemetry_path(&path)
        .max_iter(4)
        .seed(6)
        .quiet(true)
        .build()
        .unwrap();
    let mut strategy = CmaStrategy::new(sphere, params).unwrap();

    while !strategy.stop() {
        assert!(!strategy.stop());
        let population = strategy.ask();
        strategy.eval(&population, &population);
        strategy.tell();
        strategy.inc_iter();
    }
    assert!(strategy.stop());

    let contents = std::fs::read_to_string(&path).unwrap();
    assert_eq!(contents.lines().count(), 4);

    std::fs::remove_dir_all(&dir).unwrap();
}
