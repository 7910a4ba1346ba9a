use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use tokio::time;
use tracing::{debug, warn};

use crate::error::EvaluationError;
use crate::model::configuration::Configuration;
use crate::model::identifier_model::WebIdentifier;
use crate::snapshot::snapshot_model::{ContainerRef, EmbeddedContainer, Rect, Snapshot};

pub const PRESENCE_MARKER: &str = "/* guide:presence */";
pub const ATTRIBUTES_MARKER: &str = "/* guide:attributes */";
pub const RECT_MARKER: &str = "/* guide:rect";
pub const CLICK_BINDING_MARKER: &str = "/* guide:click-binding */";

/// Runs scripts inside embedded web content.
#[async_trait]
pub trait WebContentAdapter: Send + Sync {
    /// Evaluate `script` in `container` and return its string result.
    async fn evaluate(&self, script: &str, container: &ContainerRef) -> Result<String, EvaluationError>;
}

/// Adapter for hosts without embedded web content.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoWebContent;

#[async_trait]
impl WebContentAdapter for NoWebContent {
    async fn evaluate(&self, _script: &str, container: &ContainerRef) -> Result<String, EvaluationError> {
        Err(EvaluationError::NoContainer(container.0.clone()))
    }
}

/// Bounds every evaluation of the wrapped adapter. A timeout is reported as
/// an evaluation failure for that container.
pub struct TimeoutWebAdapter {
    inner: Arc<dyn WebContentAdapter>,
    limit: Duration,
}

impl TimeoutWebAdapter {
    pub fn new(inner: Arc<dyn WebContentAdapter>, limit: Duration) -> Self {
        Self { inner, limit }
    }
}

#[async_trait]
impl WebContentAdapter for TimeoutWebAdapter {
    async fn evaluate(&self, script: &str, container: &ContainerRef) -> Result<String, EvaluationError> {
        match time::timeout(self.limit, self.inner.evaluate(script, container)).await {
            Ok(result) => result,
            Err(_) => {
                warn!(container = %container.0, limit_ms = self.limit.as_millis() as u64, "web evaluation timed out");
                Err(EvaluationError::Timeout(self.limit.as_millis() as u64))
            }
        }
    }
}

// ============================================================================
// Script builders
// ============================================================================

/// JS string literal for `value`.
pub fn js_string(value: &str) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "\"\"".to_string())
}

/// One script reporting which of `ids` have their element present.
pub fn presence_script<'a>(ids: impl IntoIterator<Item = (&'a str, &'a WebIdentifier)>) -> String {
    let mut script = format!("{}\n(function(){{var found=[];\n", PRESENCE_MARKER);
    for (id, identifier) in ids {
        script.push_str(&format!(
            "try{{if({}){{found.push({})}}}}catch(e){{}}\n",
            identifier.dom_descriptor,
            js_string(id)
        ));
    }
    script.push_str("return JSON.stringify(found);})()");
    script
}

/// One script reporting which of `ids` satisfy their attribute constraints.
pub fn attribute_script<'a>(ids: impl IntoIterator<Item = (&'a str, &'a WebIdentifier)>) -> String {
    let mut script = format!("{}\n(function(){{var passed=[];\n", ATTRIBUTES_MARKER);
    for (id, identifier) in ids {
        let constraint = identifier.attribute_constraints.as_deref().unwrap_or("true");
        script.push_str(&format!(
            "try{{var el={};if(el&&({})){{passed.push({})}}}}catch(e){{}}\n",
            identifier.dom_descriptor,
            constraint,
            js_string(id)
        ));
    }
    script.push_str("return JSON.stringify(passed);})()");
    script
}

/// Script returning the element's bounding rect as JSON, or `null`.
pub fn rect_script(id: &str, identifier: &WebIdentifier) -> String {
    format!(
        "{} {} */\n(function(){{try{{var el={};if(!el){{return null;}}var r=el.getBoundingClientRect();\
         return JSON.stringify({{x:r.left,y:r.top,width:r.width,height:r.height}});}}catch(e){{return null;}}}})()",
        RECT_MARKER,
        js_string(id),
        identifier.dom_descriptor
    )
}

pub fn parse_id_list(result: &str) -> Result<Vec<String>, EvaluationError> {
    serde_json::from_str(result.trim()).map_err(|e| EvaluationError::BadResult(e.to_string()))
}

pub fn parse_rect(result: &str) -> Option<Rect> {
    let trimmed = result.trim();
    if trimmed.is_empty() || trimmed == "null" {
        return None;
    }
    serde_json::from_str(trimmed).ok()
}

// ============================================================================
// Batched resolution
// ============================================================================

#[derive(Debug, Default)]
struct WebCheck {
    /// Ids not yet found passing in any container
    remaining: BTreeSet<String>,
    passing: HashSet<String>,
}

/// Resolve which web identifiers pass, visiting containers one at a time.
///
/// Each container receives one presence script and, for present ids, one
/// attribute script. Ids found passing are not re-checked in later
/// containers. A container whose evaluation fails contributes nothing.
pub async fn resolve_web_ids<'a>(
    adapter: &dyn WebContentAdapter,
    config: &Configuration,
    ids: impl IntoIterator<Item = &'a String>,
    snapshot: &Snapshot,
) -> HashSet<String> {
    let mut remaining = BTreeSet::new();
    for id in ids {
        match config.web_identifier(id) {
            None => debug!(id = %id, "web identifier missing from configuration"),
            Some(identifier) => {
                let in_scope = identifier
                    .scope_to_screen
                    .as_deref()
                    .map(|screen| snapshot.is_active_screen(screen))
                    .unwrap_or(true);
                if in_scope {
                    remaining.insert(id.clone());
                }
            }
        }
    }

    if remaining.is_empty() {
        return HashSet::new();
    }

    let initial = WebCheck {
        remaining,
        passing: HashSet::new(),
    };

    let result = stream::iter(snapshot.containers.iter())
        .fold(initial, move |state, container| async move {
            check_container(adapter, config, state, container).await
        })
        .await;

    result.passing
}

async fn check_container(
    adapter: &dyn WebContentAdapter,
    config: &Configuration,
    mut state: WebCheck,
    container: &EmbeddedContainer,
) -> WebCheck {
    if state.remaining.is_empty() {
        return state;
    }

    let presence = presence_script(with_identifiers(config, state.remaining.iter()));
    let present = match adapter.evaluate(&presence, &container.id).await.and_then(|r| parse_id_list(&r)) {
        Ok(ids) => ids,
        Err(e) => {
            warn!(container = %container.id, error = %e, "presence check failed");
            return state;
        }
    };

    let present: Vec<String> = present
        .into_iter()
        .filter(|id| state.remaining.contains(id))
        .collect();
    if present.is_empty() {
        return state;
    }

    let (constrained, mut passing_here): (Vec<String>, Vec<String>) =
        present.into_iter().partition(|id| {
            config
                .web_identifier(id)
                .map(|w| w.attribute_constraints.is_some())
                .unwrap_or(false)
        });

    if !constrained.is_empty() {
        let script = attribute_script(with_identifiers(config, constrained.iter()));
        match adapter.evaluate(&script, &container.id).await.and_then(|r| parse_id_list(&r)) {
            Ok(ids) => passing_here.extend(ids.into_iter().filter(|id| constrained.contains(id))),
            Err(e) => warn!(container = %container.id, error = %e, "attribute check failed"),
        }
    }

    for id in passing_here {
        state.remaining.remove(&id);
        state.passing.insert(id);
    }
    state
}

/// Bounding rect of the identifier's element in the first container that
/// yields one.
pub async fn resolve_web_rect(
    adapter: &dyn WebContentAdapter,
    id: &str,
    identifier: &WebIdentifier,
    snapshot: &Snapshot,
) -> Option<(Rect, ContainerRef)> {
    let script = rect_script(id, identifier);
    for container in &snapshot.containers {
        match adapter.evaluate(&script, &container.id).await {
            Ok(result) => {
                if let Some(rect) = parse_rect(&result) {
                    return Some((rect, container.id.clone()));
                }
            }
            Err(e) => debug!(container = %container.id, error = %e, "rect lookup failed"),
        }
    }
    None
}

fn with_identifiers<'a>(
    config: &'a Configuration,
    ids: impl Iterator<Item = &'a String>,
) -> impl Iterator<Item = (&'a str, &'a WebIdentifier)> {
    ids.filter_map(move |id| config.web_identifier(id).map(|w| (id.as_str(), w)))
}
