use snake_lab::{Scenario, Step};
use snake_core::{SessionMode, ThresholdBound};

const THRESHOLD_ELLIPSOID: &str = include_str!("../scenarios/threshold_ellipsoid.json");

#[test]
fn bundled_scenario_segments_the_ellipsoid() {
    let scenario = Scenario::from_json(THRESHOLD_ELLIPSOID).expect("scenario parses");
    assert_eq!(scenario.steps[0], Step::EnterSnakeMode {
        mode: SessionMode::ThresholdSnake
    });
    let (lab, report) = scenario.run().expect("scenario runs");
    assert_eq!(report.label, "threshold_ellipsoid");
    assert_eq!(report.steps, scenario.steps.len());
    assert!(report.iterations > 0);
    assert!(report.dice > 0.99, "dice = {}", report.dice);
    assert_eq!(report.segmented_voxels, lab.segmented_voxels());
    assert!(report.updates > 0);
    assert!(lab.threshold_preview.borrow().preview);
    assert_eq!(lab.wizard.mode(), SessionMode::Inactive);
}

#[test]
fn failing_step_is_reported_by_index() {
    let json = r#"{
        "steps": [
            { "op": "enter_snake_mode", "mode": "edge-snake" },
            { "op": "set_cluster_count", "value": 4 }
        ]
    }"#;
    let scenario = Scenario::from_json(json).unwrap();
    let err = scenario.run().err().expect("clustering without the stage fails");
    let message = err.to_string();
    assert!(message.starts_with("step 1"), "{message}");
    assert!(format!("{err:#}").contains("clustering"), "{err:#}");
}

#[test]
fn defaults_fill_missing_sections() {
    let scenario = Scenario::from_json(
        r#"{ "steps": [{ "op": "set_threshold", "bound": "lower", "value": 10 }] }"#,
    )
    .unwrap();
    assert_eq!(scenario.config.max_clusters, 20);
    assert_eq!(scenario.volume.dims, [32, 32, 16]);
    assert_eq!(
        scenario.steps,
        vec![Step::SetThreshold {
            bound: ThresholdBound::Lower,
            value: 10.0
        }]
    );
}

#[test]
fn unknown_operations_are_rejected() {
    assert!(Scenario::from_json(r#"{ "steps": [{ "op": "paint" }] }"#).is_err());
}
