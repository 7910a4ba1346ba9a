pub mod builder;
pub mod snapshot_model;
