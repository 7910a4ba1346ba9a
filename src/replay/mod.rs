pub mod runner;
pub mod scenario_model;
pub mod scripted_web;
