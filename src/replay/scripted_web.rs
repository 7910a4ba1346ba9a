use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::EvaluationError;
use crate::identifier::web::{
    ATTRIBUTES_MARKER, CLICK_BINDING_MARKER, PRESENCE_MARKER, RECT_MARKER, WebContentAdapter, js_string,
};
use crate::replay::scenario_model::ScriptedContainer;
use crate::snapshot::snapshot_model::ContainerRef;

/// Kind of script the engine asked a container to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScriptKind {
    Presence,
    Attributes,
    Rect,
    ClickBinding,
    Unknown,
}

impl ScriptKind {
    pub fn of(script: &str) -> Self {
        if script.starts_with(PRESENCE_MARKER) {
            ScriptKind::Presence
        } else if script.starts_with(ATTRIBUTES_MARKER) {
            ScriptKind::Attributes
        } else if script.starts_with(RECT_MARKER) {
            ScriptKind::Rect
        } else if script.starts_with(CLICK_BINDING_MARKER) {
            ScriptKind::ClickBinding
        } else {
            ScriptKind::Unknown
        }
    }
}

/// Embedded-content adapter answering from declared container contents
/// instead of running scripts.
#[derive(Debug, Default)]
pub struct ScriptedWebAdapter {
    containers: Mutex<BTreeMap<String, ScriptedContainer>>,
    log: Mutex<Vec<(ContainerRef, ScriptKind)>>,
}

impl ScriptedWebAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_containers(containers: BTreeMap<String, ScriptedContainer>) -> Self {
        Self {
            containers: Mutex::new(containers),
            log: Mutex::new(Vec::new()),
        }
    }

    pub fn set_containers(&self, containers: BTreeMap<String, ScriptedContainer>) {
        let mut guard = self.containers.lock().unwrap_or_else(|e| e.into_inner());
        *guard = containers;
    }

    /// Every evaluation so far, in order.
    pub fn evaluations(&self) -> Vec<(ContainerRef, ScriptKind)> {
        self.log.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, kind: ScriptKind) -> usize {
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .iter()
            .filter(|(_, k)| *k == kind)
            .count()
    }

    fn answer(&self, script: &str, kind: ScriptKind, container: &ContainerRef) -> Result<String, EvaluationError> {
        let containers = self.containers.lock().unwrap_or_else(|e| e.into_inner());
        let Some(scripted) = containers.get(&container.0) else {
            return Err(EvaluationError::NoContainer(container.0.clone()));
        };
        if scripted.fails {
            return Err(EvaluationError::Script(format!("{} refused evaluation", container)));
        }

        match kind {
            ScriptKind::Presence => Ok(mentioned(script, &scripted.present)),
            ScriptKind::Attributes => Ok(mentioned(script, &scripted.attributes_ok)),
            ScriptKind::Rect => {
                let rect = scripted
                    .rects
                    .iter()
                    .find(|(id, _)| script.starts_with(&format!("{} {} */", RECT_MARKER, js_string(id))))
                    .map(|(_, rect)| *rect);
                match rect {
                    Some(rect) => serde_json::to_string(&rect).map_err(|e| EvaluationError::BadResult(e.to_string())),
                    None => Ok("null".to_string()),
                }
            }
            ScriptKind::ClickBinding => Ok("\"ok\"".to_string()),
            ScriptKind::Unknown => Err(EvaluationError::Script("unrecognized script".to_string())),
        }
    }
}

/// JSON list of the `ids` the script refers to.
fn mentioned(script: &str, ids: &[String]) -> String {
    let found: Vec<&String> = ids
        .iter()
        .filter(|id| script.contains(&format!("push({})", js_string(id))))
        .collect();
    serde_json::to_string(&found).unwrap_or_else(|_| "[]".to_string())
}

#[async_trait]
impl WebContentAdapter for ScriptedWebAdapter {
    async fn evaluate(&self, script: &str, container: &ContainerRef) -> Result<String, EvaluationError> {
        let kind = ScriptKind::of(script);
        self.log
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((container.clone(), kind));
        self.answer(script, kind, container)
    }
}
