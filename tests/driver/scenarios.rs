use topic_optimizer::prelude::*;

use crate::support::{ScriptedModel, bowl, matrix_score, mixed_space, temp_dir};

#[test]
fn three_random_trials_run_full_budget() {
    let model = bowl();
    let config = OptimizerConfig::builder()
        .n_calls(10)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .random_state(1)
        .build();

    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("bowl"), config)
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 30);
    assert_eq!(best.trials.len(), 3);
    for (i, trial) in best.trials.iter().enumerate() {
        assert_eq!(trial.trial, i);
        assert_eq!(trial.history.len(), 10);
        assert_eq!(trial.scores.len(), 10);
        assert_eq!(trial.n_evaluations, 10);
        assert_eq!(trial.stop_reason, Some(StopReason::BudgetExhausted));
        let max = trial.scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(trial.best_score, max);
    }

    let winner = best
        .trials
        .iter()
        .max_by(|a, b| a.best_score.total_cmp(&b.best_score).then(b.trial.cmp(&a.trial)))
        .unwrap();
    assert_eq!(best.best_trial, winner.trial);
    assert_eq!(best.best_score, winner.best_score);
    assert_eq!(best.best_hyperparameters, winner.best_hyperparameters);
    assert_eq!(best.hyperparameter_names, ["k", "prior", "x"]);
    assert_eq!(best.metric, "bowl");
    assert_eq!(best.minimizer, "random");
    assert_eq!(best.iterations.len(), 30);
}

#[test]
fn maximize_negates_for_minimizer_and_restores_score() {
    let model = ScriptedModel::new(vec![0.1, 0.5, 0.3]);
    let config = OptimizerConfig::builder()
        .n_calls(3)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .maximize()
        .build();

    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("script"), config)
        .optimize()
        .unwrap();

    for trial in &best.trials {
        assert_eq!(trial.func_vals(), [-0.1, -0.5, -0.3]);
        assert_eq!(trial.scores, [0.1, 0.5, 0.3]);
        assert_eq!(trial.best_score, 0.5);
    }
    assert_eq!(best.best_score, 0.5);
    // All trials tie; the first wins.
    assert_eq!(best.best_trial, 0);
    assert_eq!(best.convergence(1).unwrap(), [0.1, 0.5, 0.5]);
}

#[test]
fn minimize_keeps_sign() {
    let model = ScriptedModel::new(vec![0.4, 0.2, 0.9]);
    let config = OptimizerConfig::builder()
        .n_calls(3)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .minimize()
        .build();

    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("script"), config)
        .optimize()
        .unwrap();

    assert_eq!(best.trials[0].func_vals(), [0.4, 0.2, 0.9]);
    assert_eq!(best.best_score, 0.2);
    assert_eq!(best.direction, Direction::Minimize);
}

#[test]
fn extra_metrics_are_logged_under_distinct_names() {
    let model = ScriptedModel::new(vec![0.25]);
    let config = OptimizerConfig::builder()
        .n_calls(2)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .build();

    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("npmi"), config)
        .extra_metric(matrix_score("npmi"))
        .extra_metric(metric_fn("diversity", |_: &ModelOutput| Ok(f64::NAN)))
        .optimize()
        .unwrap();

    assert_eq!(best.iterations.len(), 6);
    let names: Vec<&str> = best.iterations[0]
        .metrics
        .iter()
        .map(|m| m.name.as_str())
        .collect();
    assert_eq!(names, ["npmi", "npmi 2", "diversity"]);
    assert_eq!(best.metric_values("npmi 2"), vec![0.25; 6]);
    assert!(best.metric_values("diversity").iter().all(|v| v.is_nan()));
    assert!(best.metric_values("perplexity").is_empty());
}

#[test]
fn warm_start_is_seen_but_not_charged() {
    let model = ScriptedModel::new(vec![0.2]);
    let mut good = HyperparameterVector::new();
    good.insert("x".into(), ParamValue::Float(0.3));
    good.insert("k".into(), ParamValue::Int(6));
    good.insert("prior".into(), ParamValue::from("asymmetric"));
    let config = OptimizerConfig::builder()
        .n_calls(4)
        .n_trials(3)
        .minimizer(MinimizerKind::gaussian_process())
        .n_random_starts(2)
        .random_state(5)
        .warm_start(vec![good.clone()], vec![0.9])
        .build();

    let best = Optimizer::new(&model, &(), mixed_space(), matrix_score("s"), config)
        .optimize()
        .unwrap();

    assert_eq!(model.calls(), 12);
    for trial in &best.trials {
        assert_eq!(trial.history.len(), 5);
        assert_eq!(trial.n_evaluations, 4);
        assert_eq!(trial.func_vals()[0], -0.9);
        assert!(trial.history.records()[0].metrics.is_empty());
    }
    assert_eq!(best.best_score, 0.9);
    assert_eq!(best.best_hyperparameters, good);
    // The log only holds real evaluations.
    assert_eq!(best.iterations.len(), 12);
}

#[test]
fn seeded_runs_are_reproducible() {
    let run = || {
        let config = OptimizerConfig::builder()
            .n_calls(12)
            .n_trials(3)
            .minimizer(MinimizerKind::Forest(ForestOptions {
                n_trees: 10,
                n_points: 200,
                ..ForestOptions::default()
            }))
            .n_random_starts(4)
            .early_stop(4)
            .random_state(99)
            .build();
        Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config)
            .optimize()
            .unwrap()
    };
    let (a, b) = (run(), run());
    assert_eq!(a.trials, b.trials);
    assert_ne!(a.trials[0].history, a.trials[1].history);
}

#[test]
fn report_is_written_and_reloads() {
    let dir = temp_dir("report");
    let config = OptimizerConfig::builder()
        .n_calls(5)
        .n_trials(3)
        .minimizer(MinimizerKind::Random)
        .random_state(3)
        .report(&dir, "run")
        .build();

    let best = Optimizer::new(&bowl(), &(), mixed_space(), matrix_score("bowl"), config)
        .optimize()
        .unwrap();

    let loaded = BestEvaluation::load_json(dir.join("run.json")).unwrap();
    assert_eq!(loaded, best);
    let stats = loaded.score_statistics().unwrap();
    assert_eq!(stats.best, best.best_score);
    assert!(stats.std >= 0.0);

    std::fs::remove_dir_all(&dir).ok();
}
