use serde::{Deserialize, Serialize};

use crate::model::identifier_model::{LocalizedText, NativeIdentifier, RelationStep, RequiredProps};
use crate::snapshot::snapshot_model::{ElementDescriptor, ElementHandle, Snapshot};

/// Language used to resolve localized text constraints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocaleSettings {
    /// Current user language, e.g. `de`
    pub user_language: Option<String>,
    /// Key used when the user language has no entry
    pub base_locale: String,
}

impl Default for LocaleSettings {
    fn default() -> Self {
        Self {
            user_language: None,
            base_locale: "en".to_string(),
        }
    }
}

impl LocaleSettings {
    pub fn resolve<'t>(&self, text: &'t LocalizedText) -> Option<&'t str> {
        self.user_language
            .as_ref()
            .and_then(|lang| text.get(lang))
            .or_else(|| text.get(&self.base_locale))
            .map(String::as_str)
    }
}

/// Elements matching `identifier` in `snapshot`, after nesting.
///
/// Identifiers without property constraints never produce elements; their
/// presence is decided by [`identifier_passes`].
pub fn find_matches(
    identifier: &NativeIdentifier,
    snapshot: &Snapshot,
    locale: &LocaleSettings,
) -> Vec<ElementHandle> {
    let Some(props) = &identifier.required_props else {
        return Vec::new();
    };

    if let Some(screen) = &identifier.scope_to_screen {
        if !snapshot.is_active_screen(screen) {
            return Vec::new();
        }
    }

    snapshot
        .handles()
        .filter(|h| {
            snapshot
                .element(*h)
                .map(|el| {
                    el.visible
                        && in_scope(el, identifier.scope_to_screen.as_deref())
                        && props_match(el, props, locale)
                })
                .unwrap_or(false)
        })
        .filter_map(|h| apply_nesting(snapshot, h, &identifier.nesting_path))
        .collect()
}

/// Whether the identifier is present in the snapshot.
pub fn identifier_passes(
    identifier: &NativeIdentifier,
    snapshot: &Snapshot,
    locale: &LocaleSettings,
) -> bool {
    if identifier.required_props.is_none() {
        // Legacy identifiers were validated before they were stored.
        return true;
    }
    !find_matches(identifier, snapshot, locale).is_empty()
}

/// Walk `steps` starting at `from`. `None` if any step leaves the tree.
pub fn walk_relation(
    snapshot: &Snapshot,
    from: ElementHandle,
    steps: &[RelationStep],
) -> Option<ElementHandle> {
    steps.iter().try_fold(from, |current, step| match step {
        RelationStep::Parent => snapshot.parent_of(current),
        RelationStep::ChildAt(index) => snapshot.child_at(current, *index),
        RelationStep::SiblingAt(index) => snapshot
            .parent_of(current)
            .and_then(|parent| snapshot.child_at(parent, *index)),
    })
}

fn apply_nesting(snapshot: &Snapshot, start: ElementHandle, path: &[usize]) -> Option<ElementHandle> {
    path.iter()
        .try_fold(start, |current, index| snapshot.child_at(current, *index))
}

fn in_scope(el: &ElementDescriptor, screen: Option<&str>) -> bool {
    match screen {
        Some(screen) => el.screen.as_deref() == Some(screen),
        None => true,
    }
}

fn props_match(el: &ElementDescriptor, props: &RequiredProps, locale: &LocaleSettings) -> bool {
    exact(&props.accessibility_id, &el.accessibility_id)
        && exact(&props.accessibility_label, &el.accessibility_label)
        && exact(&props.tag, &el.tag)
        && localized(&props.text, &el.text, locale)
        && localized(&props.placeholder, &el.placeholder, locale)
}

fn exact(expected: &Option<String>, actual: &Option<String>) -> bool {
    match expected {
        Some(expected) => actual.as_deref() == Some(expected.as_str()),
        None => true,
    }
}

fn localized(expected: &Option<LocalizedText>, actual: &Option<String>, locale: &LocaleSettings) -> bool {
    match expected {
        None => true,
        Some(text) => match locale.resolve(text) {
            Some(expected) => actual.as_deref() == Some(expected),
            // No entry for the user language or the base locale
            None => false,
        },
    }
}
