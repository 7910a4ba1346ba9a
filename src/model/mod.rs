pub mod configuration;
pub mod context_model;
pub mod identifier_model;
