use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::click::listeners::{ClickListenerRegistry, PointerEvent, WebBinding, WebClickMessage};
use crate::collab::analytics::{AnalyticsSink, LifecycleEvent, LifecycleKind, NullAnalytics};
use crate::collab::renderer::{DismissAck, DismissAction, NullRenderer, Renderer};
use crate::error::GuideError;
use crate::identifier::native::LocaleSettings;
use crate::identifier::validator::Anchor;
use crate::identifier::web::{NoWebContent, TimeoutWebAdapter, WebContentAdapter};
use crate::model::configuration::Configuration;
use crate::model::context_model::{Context, ContextKey, ContextKind, TargetKey, Trigger};
use crate::orchestrator::flow_stack::{FlowFrame, FlowStack};
use crate::policy::counter_store::{CounterStore, MemoryCounterStore};
use crate::policy::suppression::SuppressionPolicy;
use crate::snapshot::snapshot_model::Snapshot;
use crate::trigger::scheduler::{Target, TriggerEvent, TriggerScheduler};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    /// Arbitrating Assists and Discoveries
    Discovery,
    /// Walking the active flow's pages and stages
    Stage,
}

/// Why detection polling is held.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PauseReason {
    Click,
    OverlayConfiguring,
    ConfigurationReplace,
}

/// Engine knobs that are not part of the guidance configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub locale: LocaleSettings,
    /// Message handler web click bindings post to
    pub click_handler: String,
    /// Upper bound on a single web evaluation
    pub evaluation_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            locale: LocaleSettings::default(),
            click_handler: "guideClick".to_string(),
            evaluation_timeout: Duration::from_millis(2000),
        }
    }
}

/// External collaborators the engine talks to.
pub struct Collaborators {
    pub renderer: Box<dyn Renderer>,
    pub analytics: Box<dyn AnalyticsSink>,
    pub web: Arc<dyn WebContentAdapter>,
    pub store: Box<dyn CounterStore>,
}

impl Default for Collaborators {
    fn default() -> Self {
        Self {
            renderer: Box::new(NullRenderer),
            analytics: Box::new(NullAnalytics),
            web: Arc::new(NoWebContent),
            store: Box::new(MemoryCounterStore::new()),
        }
    }
}

/// Context detection and flow orchestration.
///
/// Owns the flow stack, suppression state, trigger scheduler and click
/// listeners. Every method runs to completion on the caller's thread; the
/// detection loop guarantees cycles never overlap.
pub struct GuideEngine {
    pub(super) config: Arc<Configuration>,
    pub(super) fingerprint: String,
    pub(super) locale: LocaleSettings,
    pub(super) mode: Mode,
    pub(super) flow_stack: FlowStack,
    pub(super) policy: SuppressionPolicy,
    pub(super) scheduler: TriggerScheduler,
    pub(super) clicks: ClickListenerRegistry,
    pub(super) renderer: Box<dyn Renderer>,
    pub(super) analytics: Box<dyn AnalyticsSink>,
    pub(super) web: Arc<dyn WebContentAdapter>,
    pub(super) current_page: Option<String>,
    pub(super) entry_affordance: Option<i64>,
    pub(super) affordance_visible: bool,
    pub(super) pending_bindings: Vec<WebBinding>,
    paused: BTreeSet<PauseReason>,
    cycle: u64,
}

impl GuideEngine {
    /// Build an engine for a validated configuration.
    pub fn new(config: Configuration, options: EngineOptions, collab: Collaborators) -> Result<Self, GuideError> {
        let config = config.normalized();
        config.validate()?;
        let fingerprint = config.fingerprint();
        info!(
            assists = config.assists.len(),
            discoveries = config.discoveries.len(),
            flows = config.flows.len(),
            fingerprint = %fingerprint,
            "guidance configuration loaded"
        );

        Ok(Self {
            config: Arc::new(config),
            fingerprint,
            locale: options.locale,
            mode: Mode::Discovery,
            flow_stack: FlowStack::new(),
            policy: SuppressionPolicy::new(collab.store),
            scheduler: TriggerScheduler::new(),
            clicks: ClickListenerRegistry::new(&options.click_handler),
            renderer: collab.renderer,
            analytics: collab.analytics,
            web: Arc::new(TimeoutWebAdapter::new(collab.web, options.evaluation_timeout)),
            current_page: None,
            entry_affordance: None,
            affordance_visible: false,
            pending_bindings: Vec::new(),
            paused: BTreeSet::new(),
            cycle: 0,
        })
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn configuration(&self) -> &Configuration {
        &self.config
    }

    pub fn fingerprint(&self) -> &str {
        &self.fingerprint
    }

    pub fn flow_stack(&self) -> &FlowStack {
        &self.flow_stack
    }

    pub fn current_page(&self) -> Option<&str> {
        self.current_page.as_deref()
    }

    /// The on-screen target, if any.
    pub fn live_target(&self) -> Option<&Target> {
        self.scheduler.live()
    }

    /// Armed or fired target.
    pub fn targeted(&self) -> Option<&TargetKey> {
        self.scheduler.targeted()
    }

    pub fn policy(&self) -> &SuppressionPolicy {
        &self.policy
    }

    pub fn policy_mut(&mut self) -> &mut SuppressionPolicy {
        &mut self.policy
    }

    pub fn click_listeners(&self) -> &ClickListenerRegistry {
        &self.clicks
    }

    pub fn entry_affordance_visible(&self) -> bool {
        self.affordance_visible
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.scheduler.next_deadline()
    }

    pub fn cycles_run(&self) -> u64 {
        self.cycle
    }

    // ------------------------------------------------------------------------
    // Polling gate
    // ------------------------------------------------------------------------

    pub fn is_polling(&self) -> bool {
        self.paused.is_empty()
    }

    pub fn pause_polling(&mut self, reason: PauseReason) {
        self.paused.insert(reason);
    }

    pub fn resume_polling(&mut self, reason: PauseReason) {
        self.paused.remove(&reason);
    }

    // ------------------------------------------------------------------------
    // Detection
    // ------------------------------------------------------------------------

    /// Run one detection cycle against `snapshot`.
    pub async fn detect(&mut self, snapshot: &Snapshot, now: Instant) {
        self.cycle += 1;
        debug!(cycle = self.cycle, mode = ?self.mode, "detection cycle");

        let web = Arc::clone(&self.web);
        self.flush_bindings(web.as_ref()).await;

        match self.mode {
            Mode::Discovery => self.detect_discovery(snapshot, now).await,
            Mode::Stage => self.detect_stage(snapshot, now).await,
        }
    }

    /// Fire an armed delay trigger whose deadline passed.
    pub fn fire_due_timers(&mut self, now: Instant) {
        if let Some(event) = self.scheduler.fire_due(now) {
            self.apply_events(vec![event]);
        }
    }

    // ------------------------------------------------------------------------
    // Clicks
    // ------------------------------------------------------------------------

    /// Hit-test a pointer-up event against native listeners. Returns whether
    /// a target was dispatched.
    pub fn handle_pointer(&mut self, event: &PointerEvent, now: Instant) -> bool {
        match self.clicks.hit_test(event) {
            Some(target) => self.dispatch_click(target, now),
            None => false,
        }
    }

    /// Message posted by a web click binding.
    pub fn handle_web_click(&mut self, message: &WebClickMessage, now: Instant) -> bool {
        match self.clicks.on_web_message(message) {
            Some(target) => self.dispatch_click(target, now),
            None => {
                debug!(token = %message.token, "web click for unknown token");
                false
            }
        }
    }

    fn dispatch_click(&mut self, target: Target, now: Instant) -> bool {
        if !self.target_in_scope(&target.key) {
            debug!(target = %target.name, "ignoring click on stale listener");
            return false;
        }

        self.pause_polling(PauseReason::Click);
        info!(target = %target.name, "click dispatched");
        let events = self.scheduler.offer(target, Trigger::Instant, now);
        self.apply_events(events);
        self.resume_polling(PauseReason::Click);
        true
    }

    /// Whether a target still belongs to the current mode and flow stack.
    pub(super) fn target_in_scope(&self, key: &TargetKey) -> bool {
        match (self.mode, key) {
            (Mode::Discovery, TargetKey::Context(_)) => true,
            (Mode::Stage, TargetKey::Stage(stage)) => self.flow_stack.contains(stage.flow_id),
            _ => false,
        }
    }

    // ------------------------------------------------------------------------
    // Renderer acknowledgements
    // ------------------------------------------------------------------------

    /// The renderer finished presenting the live target.
    pub fn on_presented(&mut self) {
        let Some(target) = self.scheduler.live().cloned() else {
            return;
        };

        match &target.key {
            TargetKey::Context(key) => {
                self.policy.record_presented(*key);
                let kind = match key.kind {
                    ContextKind::Discovery => LifecycleKind::StartScreen,
                    ContextKind::Assist => LifecycleKind::InstructionSeen,
                };
                self.emit(LifecycleEvent::now(kind).with_context(&target.name));
            }
            TargetKey::Stage(key) => {
                let event = self
                    .flow_event(LifecycleKind::InstructionSeen, key.flow_id)
                    .with_context(&target.name)
                    .with_page(Some(&key.page));
                self.emit(event);
            }
        }
    }

    /// The renderer dismissed the live target.
    pub fn on_dismissed(&mut self, ack: DismissAck) {
        let Some(target) = self.scheduler.live().cloned() else {
            return;
        };
        self.scheduler.release(&target.key);
        debug!(target = %target.name, ?ack, "target dismissed");

        match &target.key {
            TargetKey::Context(key) => self.context_dismissed(*key, &target.name, ack),
            TargetKey::Stage(key) => match ack.action {
                Some(DismissAction::Stop) => self.end_stage_session(),
                Some(DismissAction::Disable) => self.disable_running_flow(),
                _ => self.complete_stage(key),
            },
        }
    }

    fn context_dismissed(&mut self, key: ContextKey, name: &str, ack: DismissAck) {
        match ack.action {
            Some(DismissAction::OptIn) if key.kind == ContextKind::Discovery => {
                self.policy.mark_completed(key);
                self.start_flow_for(key.id);
            }
            Some(DismissAction::OptOut) => {
                self.policy.record_dismissed(key, ack.by_user);
                self.policy.record_opt_out(key);
                self.emit(LifecycleEvent::now(LifecycleKind::OptOut).with_context(name));
            }
            Some(DismissAction::Disable) => {
                self.policy.mute(key);
                self.policy.mark_completed(key);
                self.emit(LifecycleEvent::now(LifecycleKind::FlowDisable).with_context(name));
            }
            _ => self.policy.record_dismissed(key, ack.by_user),
        }
    }

    /// Accept the entry affordance: push the offered Discovery's flow.
    pub fn accept_entry_affordance(&mut self) -> bool {
        match self.entry_affordance {
            Some(discovery_id) => self.start_flow_for(discovery_id),
            None => false,
        }
    }

    /// Push the flow of Discovery `discovery_id` and switch to Stage mode.
    pub fn start_flow_for(&mut self, discovery_id: i64) -> bool {
        let config = Arc::clone(&self.config);
        let key = ContextKey::discovery(discovery_id);
        let Some(discovery) = config.context(key) else {
            warn!(discovery_id, "unknown discovery");
            return false;
        };
        let Some(flow) = discovery.flow_id.and_then(|id| config.flow(id)) else {
            warn!(discovery = %discovery.name, "discovery has no flow to start");
            return false;
        };

        let events = self.scheduler.clear();
        self.apply_events(events);
        self.set_entry_affordance(None);

        self.emit(
            LifecycleEvent::now(LifecycleKind::OptIn)
                .with_context(&discovery.name)
                .with_flow(flow.id, &flow.name),
        );

        self.policy.reset_stage_counters();
        self.push_flow(FlowFrame {
            flow_id: flow.id,
            origin: Some(discovery.id),
        });
        true
    }

    // ------------------------------------------------------------------------
    // Configuration replacement
    // ------------------------------------------------------------------------

    /// Swap the configuration and reset all managers. Returns `false` when
    /// the new configuration is identical to the current one.
    pub fn replace_configuration(&mut self, config: Configuration, reset_mode: bool) -> Result<bool, GuideError> {
        let config = config.normalized();
        config.validate()?;
        let fingerprint = config.fingerprint();
        if fingerprint == self.fingerprint {
            debug!("configuration unchanged");
            return Ok(false);
        }

        self.pause_polling(PauseReason::ConfigurationReplace);

        if let Some(live) = self.scheduler.live().cloned() {
            self.renderer.dismiss_target(&live);
        }
        self.scheduler.reset();
        self.flow_stack.clear();
        self.policy.reset_session();
        self.current_page = None;
        self.set_entry_affordance(None);
        let teardown = self.clicks.clear();
        self.pending_bindings.extend(teardown);
        if reset_mode {
            self.mode = Mode::Discovery;
        }

        info!(fingerprint = %fingerprint, "configuration replaced");
        self.config = Arc::new(config);
        self.fingerprint = fingerprint;

        self.resume_polling(PauseReason::ConfigurationReplace);
        Ok(true)
    }

    /// Merge a sub-configuration without resetting any state.
    pub fn append_configuration(&mut self, sub: Configuration) -> Result<(), GuideError> {
        let mut merged = (*self.config).clone();
        merged.merge(sub);
        merged.validate()?;

        self.fingerprint = merged.fingerprint();
        self.config = Arc::new(merged);
        info!(fingerprint = %self.fingerprint, "sub-configuration appended");
        Ok(())
    }

    /// Start a fresh session: persisted counters survive, everything held in
    /// memory is dropped.
    pub fn reset_session(&mut self) {
        if let Some(live) = self.scheduler.live().cloned() {
            self.renderer.dismiss_target(&live);
        }
        self.scheduler.reset();
        self.flow_stack.clear();
        self.policy.reset_session();
        self.current_page = None;
        self.set_entry_affordance(None);
        let teardown = self.clicks.clear();
        self.pending_bindings.extend(teardown);
        self.mode = Mode::Discovery;
    }

    // ------------------------------------------------------------------------
    // Shared helpers
    // ------------------------------------------------------------------------

    /// Forward scheduler transitions to the renderer and suppression state.
    pub(super) fn apply_events(&mut self, events: Vec<TriggerEvent>) {
        for event in events {
            match event {
                TriggerEvent::NewTarget(target) => {
                    if !self.target_in_scope(&target.key) {
                        debug!(target = %target.name, "dropping target outside the active flow");
                        self.scheduler.release(&target.key);
                        continue;
                    }
                    info!(target = %target.name, "new target identified");
                    self.renderer.new_target_identified(&target);
                }
                TriggerEvent::SameTarget(target) => {
                    self.renderer.same_target_identified(&target);
                }
                TriggerEvent::Dismiss(target) => {
                    info!(target = %target.name, "dismissing replaced target");
                    self.renderer.dismiss_target(&target);
                    match &target.key {
                        TargetKey::Context(key) => self.policy.record_dismissed(*key, false),
                        TargetKey::Stage(key) => self.complete_stage(key),
                    }
                }
            }
        }
    }

    /// Replace click listeners and inject web bindings.
    pub(super) async fn install_listeners(&mut self, targets: Vec<Target>, config: &Configuration, web: &dyn WebContentAdapter) {
        let bindings = self.clicks.rebuild(targets, config);
        self.pending_bindings.extend(bindings);
        self.flush_bindings(web).await;
    }

    async fn flush_bindings(&mut self, web: &dyn WebContentAdapter) {
        for binding in std::mem::take(&mut self.pending_bindings) {
            if let Err(e) = web.evaluate(&binding.script, &binding.container).await {
                warn!(container = %binding.container, error = %e, "click binding injection failed");
            }
        }
    }

    pub(super) fn set_entry_affordance(&mut self, discovery: Option<i64>) {
        self.entry_affordance = discovery;
        self.show_affordance(discovery.is_some());
    }

    pub(super) fn show_affordance(&mut self, visible: bool) {
        if visible != self.affordance_visible {
            self.affordance_visible = visible;
            self.renderer.show_entry_affordance(visible);
        }
    }

    pub(super) fn live_context(&self) -> Option<ContextKey> {
        self.scheduler.live().and_then(|t| t.key.context())
    }

    pub(super) fn emit(&mut self, event: LifecycleEvent) {
        debug!(kind = ?event.kind, "lifecycle event");
        self.analytics.emit(&event);
    }

    pub(super) fn flow_event(&self, kind: LifecycleKind, flow_id: i64) -> LifecycleEvent {
        let name = self
            .config
            .flow(flow_id)
            .map(|f| f.name.clone())
            .unwrap_or_default();
        LifecycleEvent::now(kind)
            .with_flow(flow_id, &name)
            .with_page(self.current_page.as_deref())
    }
}

pub(super) fn context_target(context: &Context, anchor: Anchor) -> Target {
    Target {
        key: TargetKey::Context(context.key()),
        name: context.name.clone(),
        anchor,
        instruction: context.instruction.clone(),
    }
}
