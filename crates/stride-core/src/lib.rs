pub mod generator;
pub mod orchestrator;
pub mod plan;
pub mod queue;
pub mod social;
