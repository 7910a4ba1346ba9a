use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LifecycleKind {
    StartScreen,
    OptIn,
    OptOut,
    InstructionSeen,
    FlowSuccess,
    FlowStop,
    FlowDisable,
}

/// One lifecycle notification, tagged with whatever was active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub timestamp_ms: u128,
    pub kind: LifecycleKind,
    pub context: Option<String>,
    pub page: Option<String>,
    pub flow: Option<String>,
    pub flow_id: Option<i64>,
}

impl LifecycleEvent {
    pub fn now(kind: LifecycleKind) -> Self {
        Self {
            timestamp_ms: SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .map(|d| d.as_millis())
                .unwrap_or(0),
            kind,
            context: None,
            page: None,
            flow: None,
            flow_id: None,
        }
    }

    pub fn with_context(mut self, name: impl ToString) -> Self {
        self.context = Some(name.to_string());
        self
    }

    pub fn with_page(mut self, name: Option<&str>) -> Self {
        self.page = name.map(str::to_string);
        self
    }

    pub fn with_flow(mut self, id: i64, name: &str) -> Self {
        self.flow_id = Some(id);
        self.flow = Some(name.to_string());
        self
    }
}

/// Receives lifecycle notifications. Payload shaping and upload happen
/// elsewhere.
pub trait AnalyticsSink {
    fn emit(&mut self, event: &LifecycleEvent);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullAnalytics;

impl AnalyticsSink for NullAnalytics {
    fn emit(&mut self, _event: &LifecycleEvent) {}
}
