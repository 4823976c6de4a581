pub mod engine;
pub mod handler_target;
pub mod invoke;
pub mod state_machine;
pub mod step_execution;
