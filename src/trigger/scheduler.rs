use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::debug;

use crate::identifier::validator::Anchor;
use crate::model::context_model::{InstructionPayload, TargetKey, Trigger};

/// Something the renderer can show.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Target {
    pub key: TargetKey,
    pub name: String,
    pub anchor: Anchor,
    pub instruction: InstructionPayload,
}

/// Renderer-facing outcome of a scheduler transition.
#[derive(Debug, Clone, PartialEq)]
pub enum TriggerEvent {
    NewTarget(Target),
    /// Already showing; refresh the anchor position
    SameTarget(Target),
    /// A fired target was replaced or vanished
    Dismiss(Target),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Armed { deadline: Instant },
    Fired,
}

#[derive(Debug, Clone)]
struct Tracked {
    target: Target,
    phase: Phase,
}

/// Tracks the currently targeted rule: `Idle -> Fired` for instant
/// triggers, `Idle -> Armed -> Fired` for delays.
#[derive(Debug, Default)]
pub struct TriggerScheduler {
    tracked: Option<Tracked>,
}

impl TriggerScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Offer this cycle's winner.
    ///
    /// Event triggers are offered only after a click and fire like instant
    /// ones.
    pub fn offer(&mut self, target: Target, trigger: Trigger, now: Instant) -> Vec<TriggerEvent> {
        if let Some(tracked) = &mut self.tracked {
            if tracked.target.key == target.key {
                return match tracked.phase {
                    Phase::Fired => {
                        tracked.target.anchor = target.anchor.clone();
                        vec![TriggerEvent::SameTarget(target)]
                    }
                    // Keep the anchor captured when the delay was armed.
                    Phase::Armed { .. } => Vec::new(),
                };
            }
        }

        let mut events = self.clear();

        match trigger {
            Trigger::Delay { ms } => {
                debug!(target = %target.name, ms, "arming delay trigger");
                self.tracked = Some(Tracked {
                    target,
                    phase: Phase::Armed {
                        deadline: now + Duration::from_millis(ms),
                    },
                });
            }
            Trigger::Instant | Trigger::Event => {
                events.push(TriggerEvent::NewTarget(target.clone()));
                self.tracked = Some(Tracked {
                    target,
                    phase: Phase::Fired,
                });
            }
        }

        events
    }

    /// Nothing won this cycle: cancel an armed delay silently, dismiss a
    /// fired target.
    pub fn clear(&mut self) -> Vec<TriggerEvent> {
        match self.tracked.take() {
            Some(Tracked {
                target,
                phase: Phase::Fired,
            }) => vec![TriggerEvent::Dismiss(target)],
            Some(Tracked { target, .. }) => {
                debug!(target = %target.name, "cancelling armed delay");
                Vec::new()
            }
            None => Vec::new(),
        }
    }

    /// Fire an armed delay whose deadline has passed. Fires at most once.
    pub fn fire_due(&mut self, now: Instant) -> Option<TriggerEvent> {
        let tracked = self.tracked.as_mut()?;
        match tracked.phase {
            Phase::Armed { deadline } if now >= deadline => {
                tracked.phase = Phase::Fired;
                debug!(target = %tracked.target.name, "delay trigger fired");
                Some(TriggerEvent::NewTarget(tracked.target.clone()))
            }
            _ => None,
        }
    }

    /// The fired (on-screen) target.
    pub fn live(&self) -> Option<&Target> {
        self.tracked
            .as_ref()
            .filter(|t| t.phase == Phase::Fired)
            .map(|t| &t.target)
    }

    /// Key of the armed or fired target.
    pub fn targeted(&self) -> Option<&TargetKey> {
        self.tracked.as_ref().map(|t| &t.target.key)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        match self.tracked.as_ref()?.phase {
            Phase::Armed { deadline } => Some(deadline),
            Phase::Fired => None,
        }
    }

    /// Forget `key` without a dismiss event, e.g. after the renderer
    /// reported it dismissed.
    pub fn release(&mut self, key: &TargetKey) -> Option<Target> {
        if self.targeted() == Some(key) {
            self.tracked.take().map(|t| t.target)
        } else {
            None
        }
    }

    pub fn reset(&mut self) {
        self.tracked = None;
    }
}
