use std::collections::{HashMap, HashSet};

use tracing::debug;

use crate::model::context_model::{Context, ContextKey, Page, Stage, TerminationFrequency};
use crate::policy::counter_store::{Counter, CounterStore, Marker};

/// Filters contexts by persisted counters and in-session completion.
pub struct SuppressionPolicy {
    store: Box<dyn CounterStore>,
    completed: HashSet<ContextKey>,
    stages: StageFrequencyTracker,
}

impl SuppressionPolicy {
    pub fn new(store: Box<dyn CounterStore>) -> Self {
        Self {
            store,
            completed: HashSet::new(),
            stages: StageFrequencyTracker::default(),
        }
    }

    pub fn store(&self) -> &dyn CounterStore {
        self.store.as_ref()
    }

    // ------------------------------------------------------------------------
    // Eligibility
    // ------------------------------------------------------------------------

    /// Contexts that may auto-display this cycle.
    ///
    /// The live context is always kept, appended at the end when the filter
    /// would have dropped it.
    pub fn eligible<'c>(&self, all: &'c [Context], live: Option<ContextKey>) -> Vec<&'c Context> {
        let mut eligible: Vec<&Context> = all.iter().filter(|c| self.auto_eligible(c)).collect();

        if let Some(live) = live {
            if !eligible.iter().any(|c| c.key() == live) {
                if let Some(context) = all.iter().find(|c| c.key() == live) {
                    debug!(context = %context.name, "keeping live context eligible");
                    eligible.push(context);
                }
            }
        }

        eligible
    }

    /// Discoveries that should only offer the entry affordance: muted,
    /// completed this session, or manual by frequency. Terminated ones are
    /// never offered.
    pub fn manual_discoveries<'c>(&self, all: &'c [Context]) -> Vec<&'c Context> {
        all.iter().filter(|c| self.is_manual(c)).collect()
    }

    pub fn is_manual(&self, context: &Context) -> bool {
        let key = context.key();
        if self.store.is_marked(Marker::Terminated, key) {
            return false;
        }
        self.store.is_marked(Marker::Muted, key)
            || self.completed.contains(&key)
            || context.termination_frequency == TerminationFrequency::Manual
    }

    fn auto_eligible(&self, context: &Context) -> bool {
        let key = context.key();
        if self.completed.contains(&key) {
            return false;
        }
        if self.store.is_marked(Marker::Muted, key) || self.store.is_marked(Marker::Terminated, key) {
            return false;
        }
        self.frequency_allows(context)
    }

    fn frequency_allows(&self, context: &Context) -> bool {
        let key = context.key();
        let presented = self.store.count(Counter::Presented, key);
        let dismissed = self.store.count(Counter::DismissedByUser, key);

        match context.termination_frequency {
            TerminationFrequency::Always => true,
            TerminationFrequency::NSession { count } | TerminationFrequency::PerApp { count } => {
                under_cap(presented, count)
            }
            TerminationFrequency::NDismissByUser { count } => under_cap(dismissed, count),
            TerminationFrequency::EverySessionUntilDismissed => dismissed == 0,
            TerminationFrequency::EverySessionUntilFlowComplete => {
                self.store.count(Counter::FlowCompleted, key) == 0
            }
            TerminationFrequency::PlayOnce => presented == 0,
            TerminationFrequency::Manual => false,
        }
    }

    // ------------------------------------------------------------------------
    // Acknowledgements
    // ------------------------------------------------------------------------

    pub fn mark_completed(&mut self, key: ContextKey) {
        self.completed.insert(key);
    }

    pub fn is_completed(&self, key: ContextKey) -> bool {
        self.completed.contains(&key)
    }

    pub fn record_presented(&mut self, key: ContextKey) {
        self.store.increment(Counter::Presented, key);
    }

    pub fn record_dismissed(&mut self, key: ContextKey, by_user: bool) {
        if by_user {
            self.store.increment(Counter::DismissedByUser, key);
        }
        self.completed.insert(key);
    }

    pub fn record_flow_completed(&mut self, key: ContextKey) {
        self.store.increment(Counter::FlowCompleted, key);
    }

    pub fn record_opt_out(&mut self, key: ContextKey) {
        self.store.set_marked(Marker::OptedOut, key, true);
        self.completed.insert(key);
    }

    pub fn mute(&mut self, key: ContextKey) {
        self.store.set_marked(Marker::Muted, key, true);
    }

    pub fn unmute(&mut self, key: ContextKey) {
        self.store.set_marked(Marker::Muted, key, false);
    }

    pub fn terminate(&mut self, key: ContextKey) {
        self.store.set_marked(Marker::Terminated, key, true);
    }

    // ------------------------------------------------------------------------
    // Stages
    // ------------------------------------------------------------------------

    /// Stages of `page` that have not exhausted their per-flow cap.
    pub fn stages_to_check<'p>(&self, flow_id: i64, page: &'p Page) -> Vec<&'p Stage> {
        page.stages
            .iter()
            .filter(|s| !self.stages.is_pruned(flow_id, &page.name, &s.name))
            .collect()
    }

    /// Count a completed stage. Returns `true` when the stage is now pruned.
    pub fn record_stage_played(&mut self, flow_id: i64, page: &str, stage: &Stage) -> bool {
        self.stages.record(flow_id, page, stage)
    }

    pub fn stage_played_count(&self, flow_id: i64, page: &str, stage: &str) -> u32 {
        self.stages.played(flow_id, page, stage)
    }

    pub fn reset_stage_counters(&mut self) {
        self.stages = StageFrequencyTracker::default();
    }

    /// Forget everything held for the current session. Persisted counters
    /// are kept.
    pub fn reset_session(&mut self) {
        self.completed.clear();
        self.reset_stage_counters();
    }
}

fn under_cap(value: i64, cap: i64) -> bool {
    cap < 0 || value < cap
}

/// Flow id, page name, stage name. Stage names are only unique per page.
type StageSlot = (i64, String, String);

fn slot(flow_id: i64, page: &str, stage: &str) -> StageSlot {
    (flow_id, page.to_string(), stage.to_string())
}

/// Per-flow-instance stage counters.
#[derive(Debug, Default)]
struct StageFrequencyTracker {
    played: HashMap<StageSlot, u32>,
    pruned: HashSet<StageSlot>,
}

impl StageFrequencyTracker {
    fn record(&mut self, flow_id: i64, page: &str, stage: &Stage) -> bool {
        let count = self.played.entry(slot(flow_id, page, &stage.name)).or_insert(0);
        *count += 1;

        match stage.termination_frequency.cap() {
            Some(cap) if *count >= cap => {
                debug!(stage = %stage.name, count = *count, "stage reached per-flow cap");
                self.pruned.insert(slot(flow_id, page, &stage.name));
                true
            }
            _ => false,
        }
    }

    fn played(&self, flow_id: i64, page: &str, stage: &str) -> u32 {
        self.played.get(&slot(flow_id, page, stage)).copied().unwrap_or(0)
    }

    fn is_pruned(&self, flow_id: i64, page: &str, stage: &str) -> bool {
        self.pruned.contains(&slot(flow_id, page, stage))
    }
}
