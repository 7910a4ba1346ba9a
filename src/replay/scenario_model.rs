use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::click::listeners::WindowKind;
use crate::collab::analytics::LifecycleKind;
use crate::collab::renderer::DismissAction;
use crate::error::GuideError;
use crate::model::configuration::Configuration;
use crate::orchestrator::engine::Mode;
use crate::snapshot::snapshot_model::Rect;

/// A scripted session: UI snapshots, user input and renderer
/// acknowledgements replayed against an engine, with expectations checked
/// along the way.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Scenario {
    /// Human-readable name for this scenario
    pub name: String,

    /// Merged over the configuration given to the runner
    #[serde(default)]
    pub configuration: Option<Configuration>,

    /// Ordered list of steps to replay
    pub steps: Vec<ScenarioStep>,
}

/// A single replay step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "step", rename_all = "snake_case")]
pub enum ScenarioStep {
    /// Replace the UI and run one detection cycle
    Snapshot {
        #[serde(default)]
        screen: Option<String>,
        #[serde(default)]
        elements: Vec<ElementSpec>,
        /// Embedded web containers keyed by id, visited in key order
        #[serde(default)]
        web: BTreeMap<String, ScriptedContainer>,
    },

    /// Run another detection cycle on the last snapshot
    Poll,

    /// Move the virtual clock forward and fire due delay triggers
    Advance { ms: u64 },

    /// Pointer-up at a screen location
    Tap {
        x: f64,
        y: f64,
        #[serde(default)]
        window: WindowKind,
    },

    /// Message from a web click binding
    WebClick { token: String },

    /// Renderer finished presenting the live target
    Presented,

    /// Renderer dismissed the live target
    Dismissed {
        #[serde(default)]
        by_user: bool,
        #[serde(default)]
        auto_dismissed: bool,
        #[serde(default)]
        action: Option<DismissAction>,
    },

    /// User accepted the entry affordance
    AcceptEntry,

    /// User ended the running flow
    EndSession,

    /// Check engine and collaborator state
    Expect { expectations: Vec<Expectation> },
}

/// Native element in a scenario snapshot. Children nest.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ElementSpec {
    #[serde(rename = "type", default)]
    pub type_tag: String,
    #[serde(default)]
    pub accessibility_id: Option<String>,
    #[serde(default)]
    pub accessibility_label: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub placeholder: Option<String>,
    #[serde(default)]
    pub frame: Rect,
    #[serde(default)]
    pub hidden: bool,
    #[serde(default)]
    pub screen: Option<String>,
    #[serde(default)]
    pub children: Vec<ElementSpec>,
}

/// How a scripted web container answers evaluations.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ScriptedContainer {
    #[serde(default)]
    pub frame: Rect,
    /// Ids whose element exists
    #[serde(default)]
    pub present: Vec<String>,
    /// Ids whose attribute constraints hold
    #[serde(default)]
    pub attributes_ok: Vec<String>,
    #[serde(default)]
    pub rects: BTreeMap<String, Rect>,
    /// Every evaluation fails
    #[serde(default)]
    pub fails: bool,
}

/// A single expectation checked by an `expect` step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Expectation {
    /// The live target has this name
    Target { name: String },

    /// Nothing is live or armed
    NoTarget,

    /// A delay trigger is armed for this name
    Armed { name: String },

    Mode { mode: Mode },

    EntryAffordance { visible: bool },

    FlowDepth { depth: usize },

    /// The current page of the active flow
    Page { name: String },

    /// Lifecycle events of this kind were emitted, `count` times if given
    Event {
        kind: LifecycleKind,
        #[serde(default)]
        count: Option<usize>,
    },

    /// The renderer was asked to show `name` exactly `count` times
    Shown { name: String, count: usize },

    /// The renderer was asked to dismiss `name` at least once
    DismissRequested { name: String },

    Listeners { native: usize, web: usize },
}

impl Scenario {
    pub fn from_yaml(text: &str) -> Result<Self, GuideError> {
        serde_yaml::from_str(text).map_err(|e| GuideError::Yaml {
            context: "scenario".to_string(),
            source: e,
        })
    }
}

/// Load one scenario file, or every `.yaml`/`.yml` file of a directory in
/// name order.
pub fn load_scenarios(path: &Path) -> Result<Vec<Scenario>, GuideError> {
    let files = if path.is_dir() {
        let entries = std::fs::read_dir(path).map_err(|e| GuideError::Io {
            path: path.display().to_string(),
            source: e,
        })?;
        let mut files: Vec<PathBuf> = entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| ext == "yaml" || ext == "yml")
            })
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    };

    files
        .iter()
        .map(|file| {
            let text = std::fs::read_to_string(file).map_err(|e| GuideError::Io {
                path: file.display().to_string(),
                source: e,
            })?;
            serde_yaml::from_str(&text).map_err(|e| GuideError::Yaml {
                context: file.display().to_string(),
                source: e,
            })
        })
        .collect()
}

// ============================================================================
// Results
// ============================================================================

/// Result of evaluating a single expectation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExpectationResult {
    /// Which step this expectation belongs to (0-indexed)
    pub step_index: usize,

    pub expectation: Expectation,

    pub passed: bool,

    /// Actual value found
    pub actual: Option<String>,

    pub message: Option<String>,
}

/// Result of replaying one scenario.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioResult {
    pub scenario_name: String,

    /// Whether every step ran and every expectation held
    pub passed: bool,

    pub steps_run: usize,

    pub expectation_results: Vec<ExpectationResult>,

    /// Error that stopped the replay, as opposed to a failed expectation
    pub error: Option<String>,
}
