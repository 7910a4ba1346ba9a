use std::path::{Path, PathBuf};

use crate::cli::config::EngineSettings;
use crate::error::GuideError;
use crate::model::configuration::Configuration;
use crate::replay::runner::ScenarioRunner;
use crate::replay::scenario_model::load_scenarios;
use crate::report::console::format_console_report;
use crate::report::report_model::ReplaySuiteReport;

// ============================================================================
// validate subcommand
// ============================================================================

/// Load a configuration, print a summary and return whether it is valid.
pub fn cmd_validate(config_path: &str, verbose: u8) -> Result<bool, Box<dyn std::error::Error>> {
    let config = Configuration::read(Path::new(config_path))?;
    let issues = config.issues();

    println!(
        "{}: {} assists, {} discoveries, {} flows, {} native / {} web identifiers",
        config_path,
        config.assists.len(),
        config.discoveries.len(),
        config.flows.len(),
        config.native_identifiers.len(),
        config.web_identifiers.len()
    );
    println!("fingerprint {}", config.fingerprint());

    if verbose > 0 {
        for flow in &config.flows {
            let stages: usize = flow.pages.iter().map(|p| p.stages.len()).sum();
            eprintln!(
                "  flow {} '{}': {} pages, {} stages",
                flow.id,
                flow.name,
                flow.pages.len(),
                stages
            );
        }
    }

    if issues.is_empty() {
        println!("configuration is valid");
        return Ok(true);
    }

    println!("{} issue(s):", issues.len());
    for issue in &issues {
        println!("  - {}", issue);
    }
    Ok(false)
}

// ============================================================================
// run subcommand
// ============================================================================

/// Replay scenarios and return whether all passed.
pub fn cmd_run(
    scenario_path: &str,
    config_path: Option<&str>,
    store: Option<&str>,
    analytics: Option<&str>,
    output: Option<&str>,
    settings: &EngineSettings,
    verbose: u8,
) -> Result<bool, Box<dyn std::error::Error>> {
    let scenarios = load_scenarios(Path::new(scenario_path))?;

    if scenarios.is_empty() {
        eprintln!("No scenarios found at: {}", scenario_path);
        return Ok(true);
    }

    let base = match config_path {
        Some(path) => Configuration::load(Path::new(path))?,
        None => Configuration::default(),
    };
    let fingerprint = base.fingerprint();

    let mut runner = ScenarioRunner::new(base).with_options(settings.engine_options());
    if let Some(path) = store {
        runner = runner.with_store(PathBuf::from(path));
    }
    if let Some(path) = analytics {
        runner = runner.with_analytics(PathBuf::from(path));
    }

    if verbose > 0 {
        eprintln!("Replaying {} scenarios...", scenarios.len());
    }

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| GuideError::Io {
            path: "tokio runtime".to_string(),
            source: e,
        })?;

    let start = std::time::Instant::now();
    let results = rt.block_on(runner.run_all(&scenarios));
    let duration = start.elapsed().as_millis();

    let report = ReplaySuiteReport::from_results(scenario_path, results)
        .with_duration(duration)
        .with_fingerprint(&fingerprint);
    let all_passed = report.all_passed();
    let output_content = format_console_report(&report);

    match output {
        Some(path) => std::fs::write(path, &output_content)?,
        None => print!("{}", output_content),
    }

    Ok(all_passed)
}
