use std::collections::{BTreeSet, HashSet};

use serde::Serialize;
use tracing::debug;

use crate::identifier::native::{LocaleSettings, find_matches, identifier_passes, walk_relation};
use crate::identifier::web::{WebContentAdapter, resolve_web_ids, resolve_web_rect};
use crate::model::configuration::Configuration;
use crate::model::context_model::{AnchorSpec, Rule};
use crate::snapshot::snapshot_model::{ContainerRef, ElementHandle, Rect, Snapshot};

// ============================================================================
// Anchors
// ============================================================================

/// A resolved native element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ElementRef {
    pub handle: ElementHandle,
    pub reference: u64,
    pub frame: Rect,
}

/// Where an overlay attaches.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Anchor {
    /// `view` places the overlay, `target` receives clicks
    NativeView { view: ElementRef, target: ElementRef },
    WebRect {
        identifier: String,
        rect: Rect,
        container: ContainerRef,
    },
    /// Not attached to any element
    Detached,
}

/// Ids found passing in one snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassingIds {
    pub native: HashSet<String>,
    pub web: HashSet<String>,
}

impl PassingIds {
    /// Every required id passes; rules without ids pass vacuously.
    pub fn admits<R: Rule + ?Sized>(&self, rule: &R) -> bool {
        rule.native_ids().iter().all(|id| self.native.contains(id))
            && rule.web_ids().iter().all(|id| self.web.contains(id))
    }
}

// ============================================================================
// Validator
// ============================================================================

/// Resolves identifier presence and anchors against a snapshot.
pub struct IdentifierValidator<'a> {
    config: &'a Configuration,
    web: &'a dyn WebContentAdapter,
    locale: &'a LocaleSettings,
}

impl<'a> IdentifierValidator<'a> {
    pub fn new(config: &'a Configuration, web: &'a dyn WebContentAdapter, locale: &'a LocaleSettings) -> Self {
        Self { config, web, locale }
    }

    /// Whether a native identifier is present. Unknown ids fail.
    pub fn native_passes(&self, id: &str, snapshot: &Snapshot) -> bool {
        match self.config.native_identifier(id) {
            Some(identifier) => identifier_passes(identifier, snapshot, self.locale),
            None => {
                debug!(id, "native identifier missing from configuration");
                false
            }
        }
    }

    pub async fn resolve_passing_ids(
        &self,
        native_ids: &BTreeSet<String>,
        web_ids: &BTreeSet<String>,
        snapshot: &Snapshot,
    ) -> PassingIds {
        let native = native_ids
            .iter()
            .filter(|id| self.native_passes(id, snapshot))
            .cloned()
            .collect();

        let web = if web_ids.is_empty() {
            HashSet::new()
        } else {
            resolve_web_ids(self.web, self.config, web_ids.iter(), snapshot).await
        };

        PassingIds { native, web }
    }

    pub async fn resolve_anchor(&self, identifier_id: &str, is_web: bool, snapshot: &Snapshot) -> Option<Anchor> {
        if is_web {
            let identifier = self.config.web_identifier(identifier_id)?;
            let (rect, container) = resolve_web_rect(self.web, identifier_id, identifier, snapshot).await?;
            return Some(Anchor::WebRect {
                identifier: identifier_id.to_string(),
                rect,
                container,
            });
        }

        let identifier = self.config.native_identifier(identifier_id)?;
        let view = *find_matches(identifier, snapshot, self.locale).first()?;
        let target = if identifier.anchor_is_target {
            view
        } else {
            walk_relation(snapshot, view, &identifier.relation_to_target)?
        };

        Some(Anchor::NativeView {
            view: element_ref(snapshot, view)?,
            target: element_ref(snapshot, target)?,
        })
    }

    /// Anchor for a rule, following its `AnchorSpec`.
    pub async fn resolve_rule_anchor<R: Rule + ?Sized>(&self, rule: &R, snapshot: &Snapshot) -> Option<Anchor> {
        match rule.anchor() {
            AnchorSpec::Detached => Some(Anchor::Detached),
            AnchorSpec::Native(id) => self.resolve_anchor(id, false, snapshot).await,
            AnchorSpec::Web(id) => self.resolve_anchor(id, true, snapshot).await,
            AnchorSpec::Default => {
                if let Some(id) = rule.native_ids().first() {
                    self.resolve_anchor(id, false, snapshot).await
                } else if let Some(id) = rule.web_ids().first() {
                    self.resolve_anchor(id, true, snapshot).await
                } else {
                    Some(Anchor::Detached)
                }
            }
        }
    }
}

fn element_ref(snapshot: &Snapshot, handle: ElementHandle) -> Option<ElementRef> {
    snapshot.element(handle).map(|el| ElementRef {
        handle,
        reference: el.reference,
        frame: el.frame,
    })
}
