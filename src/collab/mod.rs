pub mod analytics;
pub mod jsonl_sink;
pub mod renderer;
