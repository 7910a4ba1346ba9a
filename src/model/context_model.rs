use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Opaque instructions handed to the renderer untouched.
pub type InstructionPayload = Value;

// ============================================================================
// Triggers and anchors
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    #[default]
    Instant,
    Delay {
        ms: u64,
    },
    /// Fires only when the user taps the resolved anchor
    Event,
}

impl Trigger {
    /// Instant and Delay triggers are fired by the engine itself.
    pub fn is_automatic(&self) -> bool {
        !matches!(self, Trigger::Event)
    }
}

/// Which identifier an overlay attaches to.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum AnchorSpec {
    /// First native id, else first web id, else detached
    #[default]
    Default,
    Native(String),
    Web(String),
    Detached,
}

// ============================================================================
// Termination frequency
// ============================================================================

/// Caps how often an Assist or Discovery may be shown. `-1` means uncapped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "rule", rename_all = "camelCase")]
pub enum TerminationFrequency {
    #[default]
    Always,
    NSession {
        count: i64,
    },
    PerApp {
        count: i64,
    },
    NDismissByUser {
        count: i64,
    },
    EverySessionUntilDismissed,
    EverySessionUntilFlowComplete,
    PlayOnce,
    /// Never auto-displayed; reachable only through the entry affordance
    Manual,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageFrequency {
    #[serde(default)]
    pub per_flow: Option<i64>,
}

impl StageFrequency {
    /// The cap, or `None` when uncapped.
    pub fn cap(&self) -> Option<u32> {
        match self.per_flow {
            Some(n) if n > 0 => Some(n as u32),
            _ => None,
        }
    }
}

// ============================================================================
// Keys
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextKind {
    #[default]
    Assist,
    Discovery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextKey {
    pub kind: ContextKind,
    pub id: i64,
}

impl ContextKey {
    pub fn assist(id: i64) -> Self {
        Self {
            kind: ContextKind::Assist,
            id,
        }
    }

    pub fn discovery(id: i64) -> Self {
        Self {
            kind: ContextKind::Discovery,
            id,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StageKey {
    pub flow_id: i64,
    pub page: String,
    pub stage: String,
}

/// Identity of whatever the engine is currently targeting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKey {
    Context(ContextKey),
    Stage(StageKey),
}

impl TargetKey {
    pub fn context(&self) -> Option<ContextKey> {
        match self {
            TargetKey::Context(key) => Some(*key),
            TargetKey::Stage(_) => None,
        }
    }

    pub fn stage(&self) -> Option<&StageKey> {
        match self {
            TargetKey::Stage(key) => Some(key),
            TargetKey::Context(_) => None,
        }
    }
}

// ============================================================================
// Rules
// ============================================================================

/// Anything the arbiter can validate against a snapshot.
pub trait Rule {
    fn name(&self) -> &str;
    fn weight(&self) -> f64;
    fn native_ids(&self) -> &[String];
    fn web_ids(&self) -> &[String];

    fn trigger(&self) -> Trigger {
        Trigger::Instant
    }

    fn anchor(&self) -> &AnchorSpec {
        &DEFAULT_ANCHOR
    }
}

static DEFAULT_ANCHOR: AnchorSpec = AnchorSpec::Default;

/// An Assist or a Discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Context {
    /// Assigned from the list the context was loaded from
    #[serde(skip)]
    pub kind: ContextKind,
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub native_identifier_ids: Vec<String>,
    #[serde(default)]
    pub web_identifier_ids: Vec<String>,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub anchor: AnchorSpec,
    #[serde(default)]
    pub termination_frequency: TerminationFrequency,
    /// Flow pushed when a Discovery is accepted
    #[serde(default)]
    pub flow_id: Option<i64>,
    #[serde(default)]
    pub instruction: InstructionPayload,
}

impl Context {
    pub fn new(kind: ContextKind, id: i64, name: &str) -> Self {
        Self {
            kind,
            id,
            name: name.to_string(),
            weight: 0.0,
            native_identifier_ids: Vec::new(),
            web_identifier_ids: Vec::new(),
            trigger: Trigger::Instant,
            anchor: AnchorSpec::Default,
            termination_frequency: TerminationFrequency::Always,
            flow_id: None,
            instruction: Value::Null,
        }
    }

    pub fn key(&self) -> ContextKey {
        ContextKey {
            kind: self.kind,
            id: self.id,
        }
    }
}

impl Rule for Context {
    fn name(&self) -> &str {
        &self.name
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn native_ids(&self) -> &[String] {
        &self.native_identifier_ids
    }
    fn web_ids(&self) -> &[String] {
        &self.web_identifier_ids
    }
    fn trigger(&self) -> Trigger {
        self.trigger
    }
    fn anchor(&self) -> &AnchorSpec {
        &self.anchor
    }
}

// ============================================================================
// Flows
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Flow {
    pub id: i64,
    #[serde(default)]
    pub name: String,
    pub pages: Vec<Page>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub native_identifier_ids: Vec<String>,
    #[serde(default)]
    pub web_identifier_ids: Vec<String>,
    #[serde(default)]
    pub stages: Vec<Stage>,
}

impl Rule for Page {
    fn name(&self) -> &str {
        &self.name
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn native_ids(&self) -> &[String] {
        &self.native_identifier_ids
    }
    fn web_ids(&self) -> &[String] {
        &self.web_identifier_ids
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub name: String,
    #[serde(default)]
    pub weight: f64,
    #[serde(default)]
    pub native_identifier_ids: Vec<String>,
    #[serde(default)]
    pub web_identifier_ids: Vec<String>,
    #[serde(default)]
    pub trigger: Trigger,
    #[serde(default)]
    pub anchor: AnchorSpec,
    #[serde(default)]
    pub is_success: bool,
    #[serde(default)]
    pub termination_frequency: StageFrequency,
    /// Flow pushed on top of the current one when this stage completes
    #[serde(default)]
    pub branch_flow_id: Option<i64>,
    #[serde(default)]
    pub instruction: InstructionPayload,
}

impl Stage {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            weight: 0.0,
            native_identifier_ids: Vec::new(),
            web_identifier_ids: Vec::new(),
            trigger: Trigger::Instant,
            anchor: AnchorSpec::Default,
            is_success: false,
            termination_frequency: StageFrequency::default(),
            branch_flow_id: None,
            instruction: Value::Null,
        }
    }
}

impl Rule for Stage {
    fn name(&self) -> &str {
        &self.name
    }
    fn weight(&self) -> f64 {
        self.weight
    }
    fn native_ids(&self) -> &[String] {
        &self.native_identifier_ids
    }
    fn web_ids(&self) -> &[String] {
        &self.web_identifier_ids
    }
    fn trigger(&self) -> Trigger {
        self.trigger
    }
    fn anchor(&self) -> &AnchorSpec {
        &self.anchor
    }
}
