use glam::DVec3;
use snake_core::{
    Capability, ErrorKind, EvolutionPhase, PreprocessingStage, SessionConfig, SessionMode,
    ThresholdBound, UpdateEvent,
};
use snake_lab::cpu::VolumeSpec;
use snake_lab::LabSession;

fn lab() -> LabSession {
    LabSession::new(&VolumeSpec::default(), SessionConfig::default())
}

fn center_cursor(lab: &LabSession) -> DVec3 {
    (lab.volume.geometry().dims / 2).as_dvec3()
}

#[test]
fn threshold_snake_recovers_the_ellipsoid() {
    let mut lab = lab();
    let wizard = &mut lab.wizard;
    wizard.enter_snake_mode(SessionMode::ThresholdSnake).unwrap();
    wizard.set_threshold(ThresholdBound::Upper, 1000.0).unwrap();
    wizard.set_threshold(ThresholdBound::Lower, 400.0).unwrap();
    wizard
        .enter_preprocessing(PreprocessingStage::Threshold)
        .unwrap();
    wizard.apply_preprocessing().unwrap();
    wizard.close_preprocessing();
    assert!(wizard.is_enabled(Capability::SpeedAvailable));

    let cursor = center_cursor(&lab);
    let wizard = &mut lab.wizard;
    wizard.add_bubble_at_cursor(cursor);
    wizard.enter_evolution().unwrap();
    wizard.set_step_size(10).unwrap();
    for _ in 0..4 {
        wizard.perform_evolution_step().unwrap();
    }
    assert!(wizard.iteration_count() > 0);
    wizard.leave_evolution(true).unwrap();

    assert_eq!(wizard.mode(), SessionMode::Inactive);
    assert_eq!(wizard.evolution_phase(), EvolutionPhase::Committed);
    let ws = lab.workspace.borrow();
    assert_eq!(ws.undo_labels, ["Automatic Segmentation"]);
    assert!(ws.working.is_none());
    assert!(ws.showing_persistent);
    drop(ws);
    assert!(lab.dice() > 0.99, "dice = {}", lab.dice());
}

#[test]
fn clustering_stage_drives_a_gmm_snake() {
    let mut lab = lab();
    let wizard = &mut lab.wizard;
    wizard.enter_snake_mode(SessionMode::ThresholdSnake).unwrap();
    wizard.enter_preprocessing(PreprocessingStage::Gmm).unwrap();
    assert_eq!(wizard.cluster_count().unwrap().value, 3);
    wizard.set_cluster_count(2).unwrap();
    for _ in 0..15 {
        wizard.iterate_clustering().unwrap();
    }
    let bright = {
        let model = wizard.mixture_model().unwrap();
        (0..model.len())
            .max_by(|&a, &b| {
                let ma = model.component(a).map_or(0.0, |c| c.mean);
                let mb = model.component(b).map_or(0.0, |c| c.mean);
                ma.total_cmp(&mb)
            })
            .unwrap()
    };
    assert!(wizard.set_cluster_foreground(bright, true).unwrap());
    assert!(wizard.last_updates().contains(&UpdateEvent::GmmModified));
    {
        let uploaded = lab.gmm_preview.borrow();
        assert_eq!(uploaded.mixture.len(), 2);
        assert!(uploaded.mixture[bright].is_foreground());
    }

    let wizard = &mut lab.wizard;
    wizard.apply_preprocessing().unwrap();
    let cursor = center_cursor(&lab);
    let wizard = &mut lab.wizard;
    wizard.add_bubble_at_cursor(cursor);
    wizard.enter_evolution().unwrap();
    wizard.step_evolution(40).unwrap();
    wizard.leave_evolution(true).unwrap();
    assert!(lab.dice() > 0.95, "dice = {}", lab.dice());
}

#[test]
fn gmm_speed_without_foreground_is_an_engine_error() {
    let mut lab = lab();
    let wizard = &mut lab.wizard;
    wizard.enter_snake_mode(SessionMode::ThresholdSnake).unwrap();
    wizard.enter_preprocessing(PreprocessingStage::Gmm).unwrap();
    let err = wizard.apply_preprocessing().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Domain);
    assert!(!wizard.is_enabled(Capability::SpeedAvailable));
}

#[test]
fn evolution_before_speed_fails_and_leaves_no_trace() {
    let mut lab = lab();
    let cursor = center_cursor(&lab);
    let wizard = &mut lab.wizard;
    wizard.enter_snake_mode(SessionMode::EdgeSnake).unwrap();
    wizard.add_bubble_at_cursor(cursor);
    assert!(wizard.enter_evolution().is_err());
    assert_eq!(wizard.evolution_phase(), EvolutionPhase::Uninitialized);
    wizard.cancel_snake_mode();
    assert_eq!(lab.segmented_voxels(), 0);
    assert!(lab.workspace.borrow().undo_labels.is_empty());
}

#[test]
fn manual_segmentation_seeds_the_contour() {
    let mut lab = lab();
    let mut seed = vec![false; lab.volume.voxels().len()];
    let geometry = lab.volume.geometry();
    let center = snake_lab::cpu::volume::voxel_index(&geometry, geometry.dims / 2);
    seed[center] = true;
    lab.set_manual_seed(Some(seed));

    let wizard = &mut lab.wizard;
    wizard.enter_snake_mode(SessionMode::ThresholdSnake).unwrap();
    wizard.set_threshold(ThresholdBound::Upper, 1000.0).unwrap();
    wizard.set_threshold(ThresholdBound::Lower, 400.0).unwrap();
    wizard
        .enter_preprocessing(PreprocessingStage::Threshold)
        .unwrap();
    wizard.apply_preprocessing().unwrap();
    assert!(wizard.bubbles().is_empty());
    assert!(wizard.is_enabled(Capability::InitializationValid));
    wizard.enter_evolution().unwrap();
    wizard.step_evolution(60).unwrap();
    wizard.leave_evolution(true).unwrap();
    assert!(lab.dice() > 0.99, "dice = {}", lab.dice());
}

#[test]
fn edge_snake_stays_inside_the_strong_gradient() {
    let mut lab = LabSession::new(
        &VolumeSpec {
            noise: 0.0,
            ..VolumeSpec::default()
        },
        SessionConfig::default(),
    );
    let cursor = center_cursor(&lab);
    let wizard = &mut lab.wizard;
    wizard.enter_snake_mode(SessionMode::EdgeSnake).unwrap();
    let curve: Vec<_> = wizard.evaluate_edge_function(5).unwrap().collect();
    assert!(curve.windows(2).all(|w| w[1].1 <= w[0].1));

    wizard.enter_preprocessing(PreprocessingStage::Edge).unwrap();
    wizard.apply_preprocessing().unwrap();
    wizard.add_bubble_at_cursor(cursor);
    wizard.enter_evolution().unwrap();
    wizard.step_evolution(60).unwrap();
    wizard.leave_evolution(true).unwrap();

    let truth = lab.volume.truth().iter().filter(|&&t| t).count();
    let segmented = lab.segmented_voxels();
    assert!(segmented > 0);
    assert!(segmented <= truth, "{segmented} > {truth}");
}
