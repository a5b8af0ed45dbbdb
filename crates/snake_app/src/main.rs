//! Headless driver: replays a wizard scenario against the CPU lab collaborators.

use std::{env, path::PathBuf};

use anyhow::{bail, Context, Result};
use glam::DVec3;
use snake_core::{PreprocessingStage, SessionConfig, SessionMode, ThresholdBound, UpdateEvent};
use snake_lab::{cpu::VolumeSpec, LabSession, Scenario};
use tracer::init_tracing;
use tracing::{info, trace};

struct CliOptions {
    scenario: Option<PathBuf>,
    steps: usize,
}

fn main() -> Result<()> {
    init_tracing();
    let options = parse_options()?;

    let report = match options.scenario {
        Some(ref path) => {
            info!("loading scenario from {}", path.display());
            let scenario = Scenario::load(path)?;
            scenario.run()?.1
        }
        None => {
            let mut lab = LabSession::new(&VolumeSpec::default(), SessionConfig::default());
            let iterations = run_default(&mut lab, options.steps)?;
            println!(
                "default threshold run: {iterations} iterations, {} voxels, dice {:.4}",
                lab.segmented_voxels(),
                lab.dice()
            );
            return Ok(());
        }
    };
    println!(
        "{}: {} steps, {} iterations, {} voxels, dice {:.4}, {} updates",
        report.label,
        report.steps,
        report.iterations,
        report.segmented_voxels,
        report.dice,
        report.updates
    );
    Ok(())
}

/// Threshold snake seeded at the volume center, evolved `steps` iterations.
fn run_default(lab: &mut LabSession, steps: usize) -> Result<usize> {
    let center: DVec3 = (lab.volume.geometry().dims / 2).as_dvec3();
    let wizard = &mut lab.wizard;
    wizard.subscribe(Box::new(|event: UpdateEvent| {
        trace!(?event, "update");
    }));
    wizard.enter_snake_mode(SessionMode::ThresholdSnake)?;
    let (_, max) = lab.volume.intensity_range();
    let wizard = &mut lab.wizard;
    wizard.set_threshold(ThresholdBound::Upper, f64::from(max))?;
    wizard.set_threshold(ThresholdBound::Lower, 0.5 * f64::from(max))?;
    wizard.enter_preprocessing(PreprocessingStage::Threshold)?;
    wizard.apply_preprocessing()?;
    wizard.close_preprocessing();
    wizard.add_bubble_at_cursor(center);
    wizard
        .enter_evolution()
        .context("failed to initialize the contour")?;
    let taken = wizard.step_evolution(steps)?;
    wizard.leave_evolution(true)?;
    Ok(taken)
}

fn parse_options() -> Result<CliOptions> {
    let mut opts = CliOptions {
        scenario: None,
        steps: 40,
    };
    for arg in env::args().skip(1) {
        if let Some(value) = arg.strip_prefix("--scenario=") {
            opts.scenario = Some(PathBuf::from(value));
        } else if let Some(value) = arg.strip_prefix("--steps=") {
            opts.steps = value.parse().context("invalid --steps value")?;
        } else {
            bail!("unrecognized argument: {arg}");
        }
    }
    Ok(opts)
}

mod tracer {
    pub fn init_tracing() {
        let _ = tracing_subscriber::fmt().try_init();
    }
}
