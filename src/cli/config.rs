use std::time::Duration;

use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

use crate::identifier::native::LocaleSettings;
use crate::orchestrator::engine::EngineOptions;

// ============================================================================
// CLI Argument Parsing (clap derive)
// ============================================================================

#[derive(Parser, Debug)]
#[command(
    name = "guide-engine",
    version,
    about = "Context detection and flow orchestration for in-app guidance"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Verbosity level (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Path to engine settings file (default: guide-engine.yaml in current dir)
    #[arg(long, global = true)]
    pub settings: Option<String>,

    /// User language for localized text constraints
    #[arg(long, global = true)]
    pub language: Option<String>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Load a guidance configuration and report invariant violations
    Validate {
        /// Guidance configuration file (.json or .yaml)
        #[arg(long)]
        config: String,
    },

    /// Replay scenarios against the engine
    Run {
        /// Scenario YAML file or directory of YAML files
        #[arg(long)]
        scenario: String,

        /// Guidance configuration shared by every scenario
        #[arg(long)]
        config: Option<String>,

        /// JSON file persisting suppression counters across scenarios
        #[arg(long)]
        store: Option<String>,

        /// Append lifecycle events to this JSONL file
        #[arg(long)]
        analytics: Option<String>,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<String>,
    },
}

// ============================================================================
// Settings File Model (optional YAML)
// ============================================================================

/// Optional YAML settings file: `guide-engine.yaml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineSettings {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_ms: u64,

    #[serde(default = "default_base_locale")]
    pub base_locale: String,

    #[serde(default)]
    pub user_language: Option<String>,

    /// Message handler name web click bindings post to
    #[serde(default = "default_click_handler")]
    pub click_handler: String,

    #[serde(default = "default_evaluation_timeout")]
    pub evaluation_timeout_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            poll_interval_ms: default_poll_interval(),
            base_locale: default_base_locale(),
            user_language: None,
            click_handler: default_click_handler(),
            evaluation_timeout_ms: default_evaluation_timeout(),
        }
    }
}

impl EngineSettings {
    pub fn engine_options(&self) -> EngineOptions {
        EngineOptions {
            locale: LocaleSettings {
                user_language: self.user_language.clone(),
                base_locale: self.base_locale.clone(),
            },
            click_handler: self.click_handler.clone(),
            evaluation_timeout: self.evaluation_timeout(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn evaluation_timeout(&self) -> Duration {
        Duration::from_millis(self.evaluation_timeout_ms)
    }
}

// Serde default helpers
fn default_poll_interval() -> u64 { 1000 }
fn default_base_locale() -> String { "en".to_string() }
fn default_click_handler() -> String { "guideClick".to_string() }
fn default_evaluation_timeout() -> u64 { 2000 }

// ============================================================================
// Settings File Loading
// ============================================================================

/// Load settings from a YAML file. Returns defaults if file is missing or malformed.
pub fn load_settings(path: Option<&str>) -> EngineSettings {
    let settings_path = path.unwrap_or("guide-engine.yaml");
    match std::fs::read_to_string(settings_path) {
        Ok(content) => serde_yaml::from_str(&content).unwrap_or_default(),
        Err(_) => EngineSettings::default(),
    }
}

/// Settings file values with CLI overrides applied.
pub fn resolve_settings(cli: &Cli) -> EngineSettings {
    let mut settings = load_settings(cli.settings.as_deref());
    if let Some(language) = &cli.language {
        settings.user_language = Some(language.clone());
    }
    settings
}

/// `RUST_LOG`-style filter for a `-v` count.
pub fn log_filter(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}
