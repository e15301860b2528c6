use std::sync::Arc;

use topic_optimizer::prelude::*;

use crate::support::{bowl, matrix_score, mixed_space};

fn config(parallel: bool) -> OptimizerConfig {
    OptimizerConfig::builder()
        .n_calls(9)
        .n_trials(4)
        .n_random_starts(3)
        .minimizer(MinimizerKind::GaussianProcess(GpOptions {
            n_points: 200,
            ..GpOptions::default()
        }))
        .checkpoint_every(3)
        .random_state(21)
        .parallel_trials(parallel)
        .build()
}

#[test]
fn parallel_trials_match_sequential_run() {
    let sequential_store = Arc::new(MemoryCheckpointStore::new());
    let sequential = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config(false))
        .checkpoint_store(sequential_store.clone())
        .optimize()
        .unwrap();

    let parallel_store = Arc::new(MemoryCheckpointStore::new());
    let model = bowl();
    let parallel = Optimizer::new(&model, &(), mixed_space(), matrix_score("bowl"), config(true))
        .checkpoint_store(parallel_store.clone())
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 36);
    assert_eq!(parallel.trials, sequential.trials);
    assert_eq!(parallel.best_trial, sequential.best_trial);
    assert_eq!(parallel.iterations.len(), 36);
    assert_eq!(parallel_store.keys(), sequential_store.keys());
    for key in 0..4 {
        let handle = CheckpointHandle::new("partial_result", key);
        assert_eq!(
            parallel_store.load(&handle).unwrap(),
            sequential_store.load(&handle).unwrap()
        );
    }
}

#[test]
fn every_trial_contributes_to_the_log() {
    let best = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config(true))
        .checkpoint_store(Arc::new(MemoryCheckpointStore::new()))
        .optimize()
        .unwrap();

    for trial in 0..4 {
        let logged = best.iterations.iter().filter(|r| r.trial == trial).count();
        assert_eq!(logged, 9);
    }
}
