use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Text keyed by language code, e.g. `{"en": "Save", "de": "Speichern"}`.
pub type LocalizedText = BTreeMap<String, String>;

/// Describes how to find a native UI element in a snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NativeIdentifier {
    /// Property constraints. `None` means the identifier carries no
    /// resolvable constraints and always passes.
    #[serde(default, alias = "idParameters")]
    pub required_props: Option<RequiredProps>,

    /// Only match while this screen is active
    #[serde(default)]
    pub scope_to_screen: Option<String>,

    /// Child indices to descend through after property matching
    #[serde(default)]
    pub nesting_path: Vec<usize>,

    /// Walk from the anchor to the click target
    #[serde(default)]
    pub relation_to_target: Vec<RelationStep>,

    #[serde(default = "default_true")]
    pub anchor_is_target: bool,
}

impl NativeIdentifier {
    /// Identifier with only property constraints.
    pub fn with_props(props: RequiredProps) -> Self {
        Self {
            required_props: Some(props),
            scope_to_screen: None,
            nesting_path: Vec::new(),
            relation_to_target: Vec::new(),
            anchor_is_target: true,
        }
    }
}

/// Property predicates; every present field must match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredProps {
    #[serde(default)]
    pub accessibility_id: Option<String>,
    #[serde(default)]
    pub accessibility_label: Option<String>,
    #[serde(default)]
    pub tag: Option<String>,
    #[serde(default)]
    pub text: Option<LocalizedText>,
    #[serde(default)]
    pub placeholder: Option<LocalizedText>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "step", content = "index", rename_all = "snake_case")]
pub enum RelationStep {
    Parent,
    ChildAt(usize),
    SiblingAt(usize),
}

/// Describes an element inside embedded web content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebIdentifier {
    /// Script expression evaluating to the element (or null)
    pub dom_descriptor: String,

    #[serde(default)]
    pub scope_to_screen: Option<String>,

    /// Script expression over `el` that must be truthy
    #[serde(default)]
    pub attribute_constraints: Option<String>,
}

fn default_true() -> bool {
    true
}
