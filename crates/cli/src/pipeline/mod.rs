//! Session orchestration module.

mod orchestrator;
mod stats;

pub use orchestrator::{Session, SessionConfig, StopReason};
pub use stats::{RunStats, StatsSink};
