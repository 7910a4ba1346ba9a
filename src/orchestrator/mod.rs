pub mod discovery_mode;
pub mod engine;
pub mod flow_stack;
pub mod stage_mode;
