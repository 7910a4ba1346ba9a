//! Context detection and flow orchestration for in-app guidance.
//!
//! Each detection cycle takes a [`Snapshot`](snapshot::snapshot_model::Snapshot)
//! of the host UI, validates the configured rules against it, and drives a
//! renderer through the winning target. [`GuideEngine`](orchestrator::engine::GuideEngine)
//! is the entry point; [`DetectionLoop`](runtime::detection_loop::DetectionLoop)
//! runs it at a fixed cadence.

pub mod arbiter;
pub mod cli;
pub mod click;
pub mod collab;
pub mod error;
pub mod identifier;
pub mod model;
pub mod orchestrator;
pub mod policy;
pub mod replay;
pub mod report;
pub mod runtime;
pub mod snapshot;
pub mod trigger;
