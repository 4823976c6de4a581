pub mod orchestrator;
pub mod router;
pub mod trigger;
