use std::collections::{BTreeMap, BTreeSet, HashMap};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::identifier::validator::{Anchor, ElementRef};
use crate::identifier::web::{CLICK_BINDING_MARKER, js_string};
use crate::model::configuration::Configuration;
use crate::model::context_model::{ContextKind, TargetKey};
use crate::snapshot::snapshot_model::{ContainerRef, Point};
use crate::trigger::scheduler::Target;

// ============================================================================
// Incoming click events
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    #[default]
    Application,
    /// System keyboard window; never hit-tested
    RemoteKeyboard,
}

/// Pointer-up event from the platform event source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    pub location: Point,
    #[serde(default)]
    pub window: WindowKind,
}

/// Message posted back by a click binding inside embedded content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebClickMessage {
    pub token: String,
}

/// Script to run in one embedded container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WebBinding {
    pub container: ContainerRef,
    pub script: String,
}

// ============================================================================
// Registry
// ============================================================================

/// Click observers for Event-triggered targets.
///
/// Rebuilt from scratch whenever a new valid set is computed. Native
/// listeners hold the element captured in that cycle's snapshot; web
/// listeners are script bindings, one script per container.
#[derive(Debug)]
pub struct ClickListenerRegistry {
    handler_name: String,
    native: Vec<(Target, ElementRef)>,
    web: HashMap<String, Target>,
    bound_containers: BTreeSet<ContainerRef>,
}

impl ClickListenerRegistry {
    pub fn new(handler_name: &str) -> Self {
        Self {
            handler_name: handler_name.to_string(),
            native: Vec::new(),
            web: HashMap::new(),
            bound_containers: BTreeSet::new(),
        }
    }

    pub fn native_count(&self) -> usize {
        self.native.len()
    }

    pub fn web_count(&self) -> usize {
        self.web.len()
    }

    pub fn is_empty(&self) -> bool {
        self.native.is_empty() && self.web.is_empty()
    }

    /// Replace every listener with `targets`. Returns the scripts to inject:
    /// one per container with bindings, plus a teardown-only script for
    /// containers that no longer have any.
    pub fn rebuild(&mut self, targets: Vec<Target>, config: &Configuration) -> Vec<WebBinding> {
        self.native.clear();
        self.web.clear();

        let mut by_container: BTreeMap<ContainerRef, Vec<(String, String)>> = BTreeMap::new();

        for target in targets {
            match &target.anchor {
                Anchor::NativeView { target: element, .. } => {
                    let element = *element;
                    self.native.push((target, element));
                }
                Anchor::WebRect {
                    identifier,
                    container,
                    ..
                } => {
                    let Some(web_identifier) = config.web_identifier(identifier) else {
                        debug!(identifier = %identifier, "click binding skipped, identifier missing");
                        continue;
                    };
                    let token = click_token(&target.key);
                    by_container
                        .entry(container.clone())
                        .or_default()
                        .push((web_identifier.dom_descriptor.clone(), token.clone()));
                    self.web.insert(token, target);
                }
                Anchor::Detached => {
                    debug!(target = %target.name, "detached target cannot receive clicks");
                }
            }
        }

        let mut bindings: Vec<WebBinding> = by_container
            .iter()
            .map(|(container, binds)| WebBinding {
                container: container.clone(),
                script: binding_script(&self.handler_name, binds),
            })
            .collect();

        for stale in self.bound_containers.iter() {
            if !by_container.contains_key(stale) {
                bindings.push(WebBinding {
                    container: stale.clone(),
                    script: binding_script(&self.handler_name, &[]),
                });
            }
        }

        self.bound_containers = by_container.into_keys().collect();
        debug!(
            native = self.native.len(),
            web = self.web.len(),
            "click listeners rebuilt"
        );
        bindings
    }

    /// Remove every listener.
    pub fn clear(&mut self) -> Vec<WebBinding> {
        self.rebuild(Vec::new(), &Configuration::default())
    }

    /// Hit-test in reverse registration order; the first containing frame
    /// wins.
    pub fn hit_test(&self, event: &PointerEvent) -> Option<Target> {
        if event.window == WindowKind::RemoteKeyboard {
            return None;
        }
        self.native
            .iter()
            .rev()
            .find(|(_, element)| element.frame.contains(event.location))
            .map(|(target, _)| target.clone())
    }

    pub fn on_web_message(&self, message: &WebClickMessage) -> Option<Target> {
        self.web.get(&message.token).cloned()
    }
}

/// Token posted back by a web binding for `key`.
pub fn click_token(key: &TargetKey) -> String {
    match key {
        TargetKey::Context(k) => {
            let kind = match k.kind {
                ContextKind::Assist => "assist",
                ContextKind::Discovery => "discovery",
            };
            format!("{}:{}", kind, k.id)
        }
        TargetKey::Stage(s) => format!("stage:{}:{}:{}", s.flow_id, s.page, s.stage),
    }
}

fn binding_script(handler: &str, binds: &[(String, String)]) -> String {
    let mut script = format!(
        "{}\n(function(){{var w=window;var old=w.__guideClickBindings||[];\
         old.forEach(function(b){{b.el.removeEventListener('click',b.fn,true);}});var next=[];\n\
         var bind=function(el,token){{if(!el){{return;}}var fn=function(){{\
         w.webkit.messageHandlers[{}].postMessage(token);}};\
         el.addEventListener('click',fn,true);next.push({{el:el,fn:fn}});}};\n",
        CLICK_BINDING_MARKER,
        js_string(handler)
    );
    for (descriptor, token) in binds {
        script.push_str(&format!(
            "try{{bind({},{});}}catch(e){{}}\n",
            descriptor,
            js_string(token)
        ));
    }
    script.push_str("w.__guideClickBindings=next;return \"ok\";})()");
    script
}
