use topic_optimizer::minimizer::{
    Acquisition, ForestMinimizer, ForestOptions, GpMinimizer, GpOptions, Kernel, Minimizer,
    TreeEstimator,
};
use topic_optimizer::space::{Dimension, SearchSpace};

use crate::all_kinds;

fn line() -> SearchSpace {
    SearchSpace::new().with("x", Dimension::real(0.0, 1.0))
}

fn bowl(point: &[topic_optimizer::ParamValue]) -> f64 {
    (point[0].as_f64().unwrap_or(0.0) - 0.7).powi(2)
}

#[test]
fn every_strategy_finds_the_bowl() {
    for kind in all_kinds() {
        let result = kind
            .build(&line(), 5, Some(11))
            .run(&mut |p| Ok(bowl(p)), 30)
            .unwrap();
        assert!(result.fun < 0.01, "{}: {}", kind.name(), result.fun);
    }
}

#[test]
fn extra_trees_and_acquisitions_run() {
    for acquisition in [Acquisition::ei(), Acquisition::pi(), Acquisition::default()] {
        let options = ForestOptions {
            estimator: TreeEstimator::ExtraTrees,
            n_trees: 15,
            max_depth: Some(4),
            acquisition,
            n_points: 200,
            ..ForestOptions::default()
        };
        let mut m = ForestMinimizer::new(line(), options, 4, Some(6));
        let result = m.run(&mut |p| Ok(bowl(p)), 15).unwrap();
        assert_eq!(result.func_vals.len(), 15);
        assert!(result.fun < 0.05, "{acquisition:?}: {}", result.fun);
    }
}

#[test]
fn every_kernel_fits_mixed_spaces() {
    let space = SearchSpace::new()
        .with("eta", Dimension::log_real(1e-4, 1.0))
        .with("k", Dimension::integer(2, 30))
        .with("solver", Dimension::categorical(["em", "vb", "gibbs"]));
    for kernel in [Kernel::Rbf, Kernel::Matern12, Kernel::Matern32, Kernel::Matern52] {
        let options = GpOptions {
            kernel,
            acquisition: Acquisition::ei(),
            n_points: 200,
            ..GpOptions::default()
        };
        let mut m = GpMinimizer::new(space.clone(), options, 3, Some(8));
        let result = m
            .run(
                &mut |p| {
                    let eta = p[0].as_f64().unwrap_or(1.0);
                    let k = p[1].as_i64().unwrap_or(0) as f64;
                    Ok(eta.log10().abs() + (k - 12.0).abs() / 10.0)
                },
                10,
            )
            .unwrap();
        for point in &result.x_iters {
            space.check_point(point).unwrap();
        }
    }
}

#[test]
fn resumed_surrogate_uses_history_immediately() {
    let history: Vec<Vec<topic_optimizer::ParamValue>> = (0..=10)
        .map(|i| vec![topic_optimizer::ParamValue::Float(f64::from(i) / 10.0)])
        .collect();
    let values: Vec<f64> = history.iter().map(|p| bowl(p)).collect();

    let mut m = GpMinimizer::new(line(), GpOptions::default(), 10, Some(4));
    m.prepare_resume(10);
    m.tell(&history, &values).unwrap();
    let next = m.ask().unwrap()[0].as_f64().unwrap();
    assert!((0.55..0.85).contains(&next), "proposed {next}");
    assert_eq!(m.random_starts_left(), 0);
}
