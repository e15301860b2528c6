use topic_optimizer::minimizer::Minimizer;
use topic_optimizer::space::{Dimension, SearchSpace};
use topic_optimizer::{Error, ParamValue};

use crate::all_kinds;

fn space() -> SearchSpace {
    SearchSpace::new()
        .with("alpha", Dimension::log_real(1e-3, 1.0))
        .with("k", Dimension::integer(2, 50))
        .with("init", Dimension::categorical(["random", "nndsvd"]))
}

fn objective(point: &[ParamValue]) -> f64 {
    let alpha = point[0].as_f64().unwrap_or(1.0);
    let init = if point[1].as_str() == Some("nndsvd") { 0.0 } else { 0.1 };
    let k = point[2].as_i64().unwrap_or(0) as f64;
    alpha.ln().abs() / 10.0 + init + (k - 20.0).abs() / 50.0
}

#[test]
fn run_evaluates_exactly_n_calls_points_inside_the_space() {
    for kind in all_kinds() {
        let mut m = kind.build(&space(), 4, Some(1));
        let result = m.run(&mut |p| Ok(objective(p)), 12).unwrap();
        assert_eq!(result.func_vals.len(), 12, "{}", kind.name());
        assert_eq!(result.minimizer, kind.name());
        for point in &result.x_iters {
            space().check_point(point).unwrap();
        }
        assert!(result.func_vals.contains(&result.fun));
    }
}

#[test]
fn seeded_minimizers_are_deterministic() {
    for kind in all_kinds() {
        let run = || {
            kind.build(&space(), 3, Some(77))
                .run(&mut |p| Ok(objective(p)), 8)
                .unwrap()
        };
        assert_eq!(run(), run(), "{}", kind.name());
    }
}

#[test]
fn told_points_do_not_consume_random_starts() {
    for kind in all_kinds().into_iter().skip(1) {
        let mut m = kind.build(&space(), 5, Some(2));
        let point = vec![
            ParamValue::Float(0.1),
            ParamValue::from("random"),
            ParamValue::Int(10),
        ];
        m.tell(&[point.clone(), point.clone(), point], &[0.3, 0.2, 0.1])
            .unwrap();
        assert_eq!(m.random_starts_left(), 5);

        let x = m.ask().unwrap();
        m.tell(&[x], &[1.0]).unwrap();
        assert_eq!(m.random_starts_left(), 4);
        assert_eq!(m.x_iters().len(), 4);
    }
}

#[test]
fn prepare_resume_drops_only_spent_random_starts() {
    for kind in all_kinds().into_iter().skip(1) {
        let mut m = kind.build(&space(), 10, Some(3));
        m.prepare_resume(4);
        assert_eq!(m.random_starts_left(), 6, "{}", kind.name());
        let result = m.run(&mut |p| Ok(objective(p)), 2).unwrap();
        assert_eq!(result.random_starts_left, 4, "{}", kind.name());
    }
}

#[test]
fn resume_after_all_random_starts_goes_straight_to_the_model() {
    for kind in all_kinds() {
        let mut m = kind.build(&space(), 10, Some(3));
        m.prepare_resume(10);
        assert_eq!(m.random_starts_left(), 0);

        m.tell(
            &[
                vec![
                    ParamValue::Float(0.5),
                    ParamValue::from("nndsvd"),
                    ParamValue::Int(20),
                ],
                vec![
                    ParamValue::Float(0.01),
                    ParamValue::from("random"),
                    ParamValue::Int(3),
                ],
            ],
            &[0.07, 0.8],
        )
        .unwrap();
        let result = m.run(&mut |p| Ok(objective(p)), 3).unwrap();
        assert_eq!(result.func_vals.len(), 5);
        assert_eq!(&result.func_vals[..2], [0.07, 0.8]);
        assert_eq!(result.random_starts_left, 0);
    }
}

#[test]
fn ties_report_first_best_point() {
    for kind in all_kinds() {
        let mut m = kind.build(&space(), 0, None);
        let points: Vec<Vec<ParamValue>> = [2, 3, 4]
            .into_iter()
            .map(|k| {
                vec![
                    ParamValue::Float(0.5),
                    ParamValue::from("random"),
                    ParamValue::Int(k),
                ]
            })
            .collect();
        m.tell(&points, &[1.0, 0.5, 0.5]).unwrap();
        let result = m.result().unwrap();
        assert_eq!(result.fun, 0.5);
        assert_eq!(result.x, points[1]);
    }
}

#[test]
fn bad_observations_are_rejected() {
    for kind in all_kinds() {
        let mut m = kind.build(&space(), 0, None);
        assert!(matches!(
            m.tell(&[vec![ParamValue::Float(0.5)]], &[1.0]),
            Err(Error::DimensionMismatch {
                expected: 3,
                got: 1
            })
        ));
        let point = vec![
            ParamValue::Float(0.5),
            ParamValue::from("lda"),
            ParamValue::Int(3),
        ];
        assert!(matches!(
            m.tell(&[point], &[1.0]),
            Err(Error::ValueOutOfDomain { .. })
        ));
        let point = vec![
            ParamValue::Float(0.5),
            ParamValue::from("random"),
            ParamValue::Int(3),
        ];
        assert!(m.tell(&[point], &[f64::NAN]).is_err());
        assert!(matches!(m.result(), Err(Error::NoEvaluations)));
    }
}
