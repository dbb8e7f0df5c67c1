pub mod config;
pub mod generator;
pub mod loop_worker;

pub use config::{GeneratorConfig, PlayArea};
pub use generator::{ReactionEvent, TargetGenerator, TargetOutcome};
pub use loop_worker::{run_targets, TargetRunOutcome};
