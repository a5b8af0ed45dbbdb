//! Snake Lab: CPU collaborators and scripted scenarios for exercising wizard sessions headlessly.

#[path = "../cpu/mod.rs"]
pub mod cpu;

pub mod rig;
pub mod scenario;

pub use rig::LabSession;
pub use scenario::{Scenario, ScenarioReport, Step};
