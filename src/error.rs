use thiserror::Error;

/// A single configuration invariant violation found at load time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Where the problem was found, e.g. `flow 3 / page "Checkout"`
    pub location: String,
    pub message: String,
}

impl std::fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}

#[derive(Debug, Error)]
pub enum GuideError {
    /// Configuration file could not be read
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse/serialize failure
    #[error("JSON error ({context}): {source}")]
    Json {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse failure
    #[error("YAML error ({context}): {source}")]
    Yaml {
        context: String,
        #[source]
        source: serde_yaml::Error,
    },

    /// The Flow/Page/Stage graph or context table cannot be interpreted
    #[error("invalid configuration ({} issue(s)): {}", .0.len(), format_issues(.0))]
    InvalidConfiguration(Vec<ConfigIssue>),

    /// A replay scenario could not be executed
    #[error("scenario error: {0}")]
    Scenario(String),
}

fn format_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|i| i.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Failure of a single embedded-content predicate evaluation.
///
/// Never escapes the validator: a failing container simply contributes no
/// passing ids.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EvaluationError {
    #[error("embedded container {0} is not available")]
    NoContainer(String),

    #[error("script evaluation failed: {0}")]
    Script(String),

    #[error("script evaluation timed out after {0} ms")]
    Timeout(u64),

    #[error("unexpected evaluation result: {0}")]
    BadResult(String),
}
