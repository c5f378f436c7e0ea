use congeal_registration::profile::{derive_iteration_budgets, derive_sample_sizes};
use congeal_registration::{Schedule, ScheduleConfig, Stage, STAGE_COUNT};
use proptest::prelude::*;

#[test]
fn test_canonical_schedule() {
    let schedule = Schedule::derive(&ScheduleConfig::default(), 2).unwrap();
    let bandwidths: Vec<f64> = schedule.iter().map(|p| p.bandwidth).collect();
    assert_eq!(bandwidths, vec![30.0, 10.0, 10.0, 5.0]);
    let steps: Vec<usize> = schedule.iter().map(|p| p.steps).collect();
    assert_eq!(steps, vec![10, 3, 2, 2]);
    let stages: Vec<Stage> = schedule.iter().map(|p| p.stage).collect();
    assert_eq!(stages, Stage::ORDER.to_vec());
}

#[test]
fn test_every_stage_tolerance_is_below_its_step() {
    for stage in Stage::ORDER {
        assert!(
            stage.tolerance_bounds().strictly_below(&stage.step_bounds()),
            "{} tolerance not below step",
            stage
        );
    }
}

#[test]
fn test_schedule_config_from_json() {
    let config: ScheduleConfig =
        serde_json::from_str(r#"{ "fiber_count": 500, "steps_per_stage": [4, 2, 1, 1] }"#).unwrap();
    assert_eq!(config.fiber_count, 500);
    assert_eq!(config.steps_per_stage, [4, 2, 1, 1]);
    assert_eq!(config.bandwidths, ScheduleConfig::default().bandwidths);

    let schedule = Schedule::derive(&config, 3).unwrap();
    assert_eq!(schedule.profile(Stage::Finest).sample_size, 200);
    assert_eq!(schedule.total_compute_calls(), 2 * 4 + 4 * (2 + 1 + 1));
}

proptest! {
    #[test]
    fn prop_sample_sizes_are_floored_and_increasing(fiber_count in 10usize..5000) {
        let fractions = ScheduleConfig::default().sample_fractions;
        let sizes = derive_sample_sizes(fiber_count, &fractions).unwrap();
        for i in 0..STAGE_COUNT {
            let expected = (fiber_count as f64 * fractions[i]).floor() as usize;
            prop_assert_eq!(sizes[i], expected);
            prop_assert!(sizes[i] >= 1);
        }
        for i in 1..STAGE_COUNT {
            prop_assert!(sizes[i] >= sizes[i - 1]);
        }
    }

    #[test]
    fn prop_budgets_follow_subject_count(n in 2usize..200) {
        prop_assert_eq!(derive_iteration_budgets(n), [10 * n, 10 * n, 15 * n, 30 * n]);
    }

    #[test]
    fn prop_derivation_is_pure(fiber_count in 10usize..2000, n in 2usize..40) {
        let config = ScheduleConfig::new(fiber_count);
        let a = Schedule::derive(&config, n).unwrap();
        let b = Schedule::derive(&config, n).unwrap();
        prop_assert_eq!(&a, &b);
        prop_assert_eq!(a.total_compute_calls(), 2 * 10 + 4 * (3 + 2 + 2));
        for profile in a.iter() {
            prop_assert!(profile.validate().is_ok());
        }
    }
}
