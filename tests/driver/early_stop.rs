use std::sync::Arc;

use topic_optimizer::prelude::*;

use crate::support::{ScriptedModel, matrix_score, mixed_space};

fn config(n_calls: usize, window: usize, random_starts: usize) -> OptimizerConfig {
    OptimizerConfig::builder()
        .n_calls(n_calls)
        .n_trials(3)
        .n_random_starts(random_starts)
        .minimizer(MinimizerKind::Random)
        .early_stop(window)
        .random_state(4)
        .build()
}

#[test]
fn flat_objective_stops_after_warm_up_and_window() {
    let model = ScriptedModel::new(vec![0.5]);
    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("flat"), config(30, 3, 2))
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 18);
    for trial in &best.trials {
        assert!(trial.early_stopped());
        assert_eq!(trial.stop_reason, Some(StopReason::EarlyStopped { n_evaluations: 6 }));
        assert_eq!(trial.history.len(), 6);
        assert_eq!(trial.chunks_completed, 2);
    }
    // Stopped trials still report their result.
    assert_eq!(best.best_score, 0.5);
}

#[test]
fn never_stops_during_random_starts() {
    let model = ScriptedModel::new(vec![0.5]);
    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("flat"), config(30, 3, 10))
        .optimize()
        .unwrap();

    for trial in &best.trials {
        assert_eq!(trial.stop_reason, Some(StopReason::EarlyStopped { n_evaluations: 15 }));
        assert!(trial.history.len() >= 10 + 3);
    }
}

#[test]
fn improving_trials_spend_the_whole_budget() {
    let model = ScriptedModel::new((0..90).map(f64::from).collect());
    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("up"), config(30, 3, 0))
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 90);
    for trial in &best.trials {
        assert_eq!(trial.stop_reason, Some(StopReason::BudgetExhausted));
        assert_eq!(trial.history.len(), 30);
        assert_eq!(trial.chunks_completed, 10);
    }
}

#[test]
fn early_stop_is_checkpointed() {
    let store = Arc::new(MemoryCheckpointStore::new());
    let config = OptimizerConfig {
        checkpoint: Some(CheckpointConfig {
            interval: 2,
            ..CheckpointConfig::default()
        }),
        ..config(20, 3, 0)
    };
    assert_eq!(config.chunk_size(), 2);

    let best = Optimizer::new(
        &ScriptedModel::new(vec![1.0]),
        &(),
        mixed_space(),
        matrix_score("flat"),
        config,
    )
    .checkpoint_store(store.clone())
    .optimize()
    .unwrap();

    for trial in &best.trials {
        assert_eq!(trial.history.len(), 4);
        let saved = store
            .load(&CheckpointHandle::new("partial_result", trial.trial))
            .unwrap();
        assert_eq!(
            saved.stop_reason,
            Some(StopReason::EarlyStopped { n_evaluations: 4 })
        );
        assert_eq!(saved.func_vals, [-1.0; 4]);
    }
}

#[test]
fn warm_start_does_not_count_towards_the_warm_up() {
    let model = ScriptedModel::new(vec![0.5]);
    let warm: Vec<HyperparameterVector> = (2..8)
        .map(|k| {
            let mut point = HyperparameterVector::new();
            point.insert("x".into(), ParamValue::Float(0.5));
            point.insert("k".into(), ParamValue::Int(k));
            point.insert("prior".into(), ParamValue::from("symmetric"));
            point
        })
        .collect();
    let config = OptimizerConfig {
        warm_start: Some(WarmStart {
            points: warm,
            scores: vec![0.5; 6],
        }),
        ..config(30, 2, 5)
    };

    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("flat"), config)
        .optimize()
        .unwrap();

    // Five random starts plus a window of two, in chunks of two.
    assert_eq!(model.calls(), 24);
    for trial in &best.trials {
        assert_eq!(trial.stop_reason, Some(StopReason::EarlyStopped { n_evaluations: 8 }));
        assert_eq!(trial.n_evaluations, 8);
        assert_eq!(trial.history.len(), 14);
        assert_eq!(trial.chunks_completed, 4);
    }
}
