//! Lifecycle of the iterative contour evolution: initialize, step, rewind, commit.

use tracing::{debug, info, warn};

use crate::collab::{EvolutionEngine, SegmentationHost, Seeds};
use crate::error::{Result, SnakeError};
use crate::events::{Broadcaster, UpdateEvent};

const STAGE: &str = "evolution engine";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EvolutionPhase {
    #[default]
    Uninitialized,
    Active,
    /// Stopped without merging; re-entering the stage starts over.
    Terminated,
    Committed,
}

pub struct EvolutionController {
    engine: Box<dyn EvolutionEngine>,
    phase: EvolutionPhase,
    iterations: usize,
}

impl EvolutionController {
    pub fn new(engine: Box<dyn EvolutionEngine>) -> Self {
        Self {
            engine,
            phase: EvolutionPhase::Uninitialized,
            iterations: 0,
        }
    }

    pub fn phase(&self) -> EvolutionPhase {
        self.phase
    }

    pub fn is_active(&self) -> bool {
        self.phase == EvolutionPhase::Active
    }

    /// Zero whenever the evolution is not running.
    pub fn iteration_count(&self) -> usize {
        if self.is_active() {
            self.iterations
        } else {
            0
        }
    }

    /// Initializes the engine from `seeds`. `initialization_valid` is the gate's verdict.
    pub fn enter_stage(
        &mut self,
        seeds: Seeds<'_>,
        initialization_valid: bool,
        events: &mut Broadcaster,
    ) -> Result<()> {
        if self.is_active() {
            self.engine.terminate();
        }
        self.phase = EvolutionPhase::Uninitialized;
        self.iterations = 0;
        if !initialization_valid {
            warn!("evolution stage entered without seeds");
            return Err(SnakeError::InitializationFailed);
        }
        let ok = self
            .engine
            .initialize(seeds)
            .map_err(SnakeError::engine(STAGE))?;
        if !ok {
            warn!(bubbles = seeds.bubbles.len(), "engine rejected the initialization");
            return Err(SnakeError::InitializationFailed);
        }
        self.phase = EvolutionPhase::Active;
        info!(bubbles = seeds.bubbles.len(), "evolution initialized");
        events.emit(UpdateEvent::EvolutionIteration);
        Ok(())
    }

    /// Advances by up to `step_size` iterations. Ignored unless active.
    pub fn step(&mut self, step_size: usize, events: &mut Broadcaster) -> Result<usize> {
        if !self.is_active() {
            debug!(phase = ?self.phase, "step ignored");
            return Ok(0);
        }
        let taken = self
            .engine
            .step(step_size)
            .map_err(SnakeError::engine(STAGE))?;
        self.iterations += taken;
        debug!(taken, total = self.iterations, "evolution stepped");
        events.emit(UpdateEvent::EvolutionIteration);
        Ok(taken)
    }

    pub fn rewind(&mut self, events: &mut Broadcaster) {
        if self.is_active() {
            self.engine.rewind();
            self.iterations = 0;
            debug!("evolution rewound");
        }
        events.emit(UpdateEvent::EvolutionIteration);
    }

    /// Stops stepping; with `commit` the result is merged into the persistent segmentation.
    pub fn leave_stage(
        &mut self,
        commit: bool,
        undo_label: &str,
        host: &mut dyn SegmentationHost,
        events: &mut Broadcaster,
    ) -> Result<()> {
        if self.is_active() {
            self.engine.terminate();
            self.phase = EvolutionPhase::Terminated;
        }
        if !commit {
            debug!(iterations = self.iterations, "evolution stopped without commit");
            events.emit(UpdateEvent::EvolutionIteration);
            return Ok(());
        }
        host.merge_working_volume_into_persistent()
            .map_err(SnakeError::engine("segmentation merge"))?;
        host.record_undo_checkpoint(undo_label);
        host.switch_to_persistent_image_data();
        host.release_working_data();
        info!(iterations = self.iterations, "evolution committed");
        self.phase = EvolutionPhase::Committed;
        self.iterations = 0;
        events.emit(UpdateEvent::EvolutionIteration);
        Ok(())
    }

    /// Forgets any run without touching the host, e.g. when the session is cancelled.
    pub fn reset(&mut self) {
        if self.is_active() {
            self.engine.terminate();
        }
        self.phase = EvolutionPhase::Uninitialized;
        self.iterations = 0;
    }
}
