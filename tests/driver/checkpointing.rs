use std::sync::Arc;

use topic_optimizer::prelude::*;

use crate::support::{FailingModel, bowl, matrix_score, mixed_space, temp_dir};

fn small_forest() -> MinimizerKind {
    MinimizerKind::Forest(ForestOptions {
        n_trees: 20,
        n_points: 300,
        ..ForestOptions::default()
    })
}

#[test]
fn forest_checkpoints_reload_full_history() {
    let dir = temp_dir("forest_checkpoints");
    let config = OptimizerConfig::builder()
        .n_calls(20)
        .n_trials(3)
        .n_random_starts(5)
        .minimizer(small_forest())
        .random_state(17)
        .checkpoint(CheckpointConfig {
            interval: 5,
            base_name: "lda".to_owned(),
            directory: dir.clone(),
        })
        .build();

    let best = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config)
        .optimize()
        .unwrap();

    let store = FileCheckpointStore::new(&dir);
    for trial in &best.trials {
        let handle = CheckpointHandle::new("lda", trial.trial);
        assert!(dir.join(format!("lda_{}.json", trial.trial)).exists());
        let saved = store.load(&handle).unwrap();
        assert_eq!(saved.x_iters.len(), 20);
        assert_eq!(saved.x_iters, trial.history.points());
        assert_eq!(saved.func_vals, trial.func_vals());
        assert_eq!(saved.n_evaluations, 20);
        assert_eq!(saved.chunks_completed, 4);
        assert_eq!(saved.minimizer, "forest");
        assert_eq!(saved.param_names, ["k", "prior", "x"]);
        assert_eq!(trial.chunks_completed, 4);
    }

    std::fs::remove_dir_all(&dir).ok();
}

#[test]
fn resume_extends_history_with_a_larger_budget() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let config = |n_calls, resume| {
        OptimizerConfig::builder()
            .n_calls(n_calls)
            .n_trials(3)
            .n_random_starts(3)
            .minimizer(MinimizerKind::gaussian_process())
            .random_state(8)
            .checkpoint_every(5)
            .resume(resume)
            .build()
    };

    let first = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config(10, false))
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap();
    assert_eq!(store.len(), 3);

    let model = bowl();
    let resumed = Optimizer::new(&model, &(), mixed_space(), matrix_score("bowl"), config(15, true))
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 15);
    for (before, after) in first.trials.iter().zip(&resumed.trials) {
        assert_eq!(after.history.len(), 15);
        assert_eq!(after.n_evaluations, 15);
        assert_eq!(after.chunks_completed, 3);
        assert_eq!(&after.history.records()[..10], before.history.records());
    }
    // Restored evaluations are part of the report's iteration log.
    assert_eq!(resumed.iterations.len(), 45);
    assert!(resumed.best_score >= first.best_score);
}

#[test]
fn resume_with_spent_budget_evaluates_nothing() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let config = |resume| {
        OptimizerConfig::builder()
            .n_calls(6)
            .n_trials(3)
            .minimizer(MinimizerKind::Random)
            .random_state(2)
            .checkpoint_every(3)
            .resume(resume)
            .build()
    };

    let first = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config(false))
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap();

    let model = bowl();
    let again = Optimizer::new(&model, &(), mixed_space(), matrix_score("bowl"), config(true))
        .checkpoint_store(store)
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 0);
    assert_eq!(again.trials, first.trials);
    assert_eq!(again.best_trial, first.best_trial);
}

#[test]
fn failed_chunk_is_not_checkpointed() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let config = OptimizerConfig::builder()
        .n_calls(10)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .checkpoint_every(5)
        .build();

    // Trial 0 completes its first chunk; trial 1 fails on its third call.
    let err = Optimizer::new(&FailingModel::new(7), &(), mixed_space(), matrix_score("m"), config)
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap_err();

    assert!(matches!(
        err,
        Error::Trial {
            trial: 1,
            chunk: 0,
            ..
        }
    ));
    assert!(err.to_string().contains("training diverged on call 7"));
    assert_eq!(store.keys(), ["partial_result_0"]);
    assert_eq!(
        store
            .load(&CheckpointHandle::new("partial_result", 0))
            .unwrap()
            .x_iters
            .len(),
        5
    );
}

#[test]
fn resume_from_missing_checkpoint_is_fatal() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let config = OptimizerConfig::builder()
        .n_calls(10)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .checkpoint_every(5)
        .build();
    Optimizer::new(&FailingModel::new(7), &(), mixed_space(), matrix_score("m"), config.clone())
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap_err();

    let model = bowl();
    let resume = OptimizerConfig {
        resume: true,
        ..config
    };
    let err = Optimizer::new(&model, &(), mixed_space(), matrix_score("m"), resume)
        .checkpoint_store(store)
        .optimize()
        .unwrap_err();

    assert!(err.is_checkpoint_error());
    assert!(matches!(err, Error::CheckpointNotFound { ref key } if key == "partial_result_1"));
    assert_eq!(model.calls(), 0);
}

#[test]
fn resume_rejects_checkpoint_of_another_space() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let config = |resume| {
        OptimizerConfig::builder()
            .n_calls(4)
            .n_trials(3)
            .minimizer(MinimizerKind::Random)
            .checkpoint_every(2)
            .resume(resume)
            .build()
    };
    Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("m"), config(false))
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap();

    let wider = mixed_space().with("eta", Dimension::real(0.0, 1.0));
    let err = Optimizer::new(&bowl(), &(), wider, matrix_score("m"), config(true))
        .checkpoint_store(store.clone())
        .optimize()
        .unwrap_err();
    assert!(matches!(
        err,
        Error::CheckpointDimensionMismatch {
            expected: 4,
            got: 3,
            ..
        }
    ));

    store.insert_raw("partial_result_0", "{\"version\": 1, \"trial_index\": ");
    let err = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("m"), config(true))
        .checkpoint_store(store)
        .optimize()
        .unwrap_err();
    assert!(matches!(err, Error::CheckpointCorrupt { .. }));
}

#[test]
fn short_chunks_still_take_every_random_start() {
    let run = |minimizer: MinimizerKind| {
        let config = OptimizerConfig::builder()
            .n_calls(9)
            .n_trials(3)
            .n_random_starts(9)
            .minimizer(minimizer)
            .random_state(23)
            .checkpoint_every(3)
            .build();
        Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config)
            .checkpoint_store(Arc::new(MemoryCheckpointStore::new()))
            .optimize()
            .unwrap()
    };

    // Nine random starts over three chunks of three: every point is drawn
    // exactly as a purely random search with the same seeds draws it.
    let random = run(MinimizerKind::Random);
    for kind in [small_forest(), MinimizerKind::gaussian_process()] {
        let best = run(kind.clone());
        for (trial, expected) in best.trials.iter().zip(&random.trials) {
            assert_eq!(trial.chunks_completed, 3, "{}", kind.name());
            assert_eq!(trial.history.points(), expected.history.points(), "{}", kind.name());
        }
    }
}
