use serde::{Deserialize, Serialize};

use crate::replay::scenario_model::ScenarioResult;

// ============================================================================
// Replay suite report: aggregates multiple ScenarioResult instances
// ============================================================================

/// Aggregated report for a batch of replayed scenarios.
///
/// Built from a `Vec<ScenarioResult>` via `from_results()` and rendered by
/// the console reporter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReplaySuiteReport {
    pub suite_name: String,

    pub total: usize,

    pub passed: usize,

    pub failed: usize,

    /// Wall-clock duration of the replay in milliseconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u128>,

    /// Configuration fingerprint the scenarios ran against
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fingerprint: Option<String>,

    pub scenario_results: Vec<ScenarioResult>,
}

impl ReplaySuiteReport {
    pub fn from_results(suite_name: &str, results: Vec<ScenarioResult>) -> Self {
        let total = results.len();
        let passed = results.iter().filter(|r| r.passed).count();
        Self {
            suite_name: suite_name.to_string(),
            total,
            passed,
            failed: total - passed,
            duration_ms: None,
            fingerprint: None,
            scenario_results: results,
        }
    }

    pub fn with_duration(mut self, duration_ms: u128) -> Self {
        self.duration_ms = Some(duration_ms);
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: &str) -> Self {
        self.fingerprint = Some(fingerprint.to_string());
        self
    }

    pub fn all_passed(&self) -> bool {
        self.failed == 0
    }
}
