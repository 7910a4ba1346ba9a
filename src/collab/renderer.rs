use serde::{Deserialize, Serialize};

use crate::trigger::scheduler::Target;

/// Overlay layer the engine drives. Implemented outside this crate.
pub trait Renderer {
    /// Show guidance for a newly identified target.
    fn new_target_identified(&mut self, target: &Target);

    /// The shown target is still valid; refresh its position.
    fn same_target_identified(&mut self, target: &Target);

    /// Engine-initiated removal. Not acknowledged through `dismissed`.
    fn dismiss_target(&mut self, target: &Target);

    /// Show or hide the manual entry point for a Discovery.
    fn show_entry_affordance(&mut self, visible: bool);

    fn no_context_detected(&mut self) {}

    fn stage_not_identified(&mut self) {}
}

/// What the user chose when an overlay went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DismissAction {
    /// Start the Discovery's flow
    OptIn,
    OptOut,
    /// Never show this Discovery automatically again
    Disable,
    /// End the running flow
    Stop,
    Next,
}

/// Renderer acknowledgement that the live overlay was dismissed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DismissAck {
    #[serde(default)]
    pub by_user: bool,
    #[serde(default)]
    pub auto_dismissed: bool,
    #[serde(default)]
    pub action: Option<DismissAction>,
}

impl DismissAck {
    pub fn by_user(action: Option<DismissAction>) -> Self {
        Self {
            by_user: true,
            auto_dismissed: false,
            action,
        }
    }

    pub fn auto() -> Self {
        Self {
            by_user: false,
            auto_dismissed: true,
            action: None,
        }
    }
}

/// Renderer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn new_target_identified(&mut self, _target: &Target) {}
    fn same_target_identified(&mut self, _target: &Target) {}
    fn dismiss_target(&mut self, _target: &Target) {}
    fn show_entry_affordance(&mut self, _visible: bool) {}
}
