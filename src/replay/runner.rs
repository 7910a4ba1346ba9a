use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tracing::{debug, info};

use crate::click::listeners::{PointerEvent, WebClickMessage};
use crate::collab::analytics::{AnalyticsSink, LifecycleEvent, LifecycleKind};
use crate::collab::jsonl_sink::JsonlAnalyticsSink;
use crate::collab::renderer::{DismissAck, Renderer};
use crate::error::GuideError;
use crate::model::configuration::Configuration;
use crate::model::context_model::TargetKey;
use crate::orchestrator::engine::{Collaborators, EngineOptions, GuideEngine};
use crate::policy::counter_store::{CounterStore, JsonFileCounterStore, MemoryCounterStore};
use crate::replay::scenario_model::{
    ElementSpec, Expectation, ExpectationResult, Scenario, ScenarioResult, ScenarioStep,
};
use crate::replay::scripted_web::ScriptedWebAdapter;
use crate::snapshot::builder::SnapshotBuilder;
use crate::snapshot::snapshot_model::{ElementDescriptor, ElementHandle, Point, Snapshot};
use crate::trigger::scheduler::Target;

// ============================================================================
// Recording collaborators
// ============================================================================

/// One call the engine made on its renderer.
#[derive(Debug, Clone, PartialEq)]
pub enum RenderCall {
    NewTarget(String),
    SameTarget(String),
    Dismiss(String),
    EntryAffordance(bool),
    NoContextDetected,
    StageNotIdentified,
}

/// Renderer that records every call. Clones share the same log.
#[derive(Debug, Clone, Default)]
pub struct RecordingRenderer {
    calls: Arc<Mutex<Vec<RenderCall>>>,
}

impl RecordingRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RenderCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Number of `new_target_identified` calls for `name`.
    pub fn shown(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RenderCall::NewTarget(n) if n == name))
            .count()
    }

    pub fn dismissed(&self, name: &str) -> usize {
        self.calls()
            .iter()
            .filter(|c| matches!(c, RenderCall::Dismiss(n) if n == name))
            .count()
    }

    fn record(&self, call: RenderCall) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).push(call);
    }
}

impl Renderer for RecordingRenderer {
    fn new_target_identified(&mut self, target: &Target) {
        self.record(RenderCall::NewTarget(target.name.clone()));
    }

    fn same_target_identified(&mut self, target: &Target) {
        self.record(RenderCall::SameTarget(target.name.clone()));
    }

    fn dismiss_target(&mut self, target: &Target) {
        self.record(RenderCall::Dismiss(target.name.clone()));
    }

    fn show_entry_affordance(&mut self, visible: bool) {
        self.record(RenderCall::EntryAffordance(visible));
    }

    fn no_context_detected(&mut self) {
        self.record(RenderCall::NoContextDetected);
    }

    fn stage_not_identified(&mut self) {
        self.record(RenderCall::StageNotIdentified);
    }
}

/// Analytics sink that keeps every event, optionally forwarding to another
/// sink. Clones share the same log.
#[derive(Clone, Default)]
pub struct RecordingAnalytics {
    events: Arc<Mutex<Vec<LifecycleEvent>>>,
    forward: Option<Arc<Mutex<Box<dyn AnalyticsSink + Send>>>>,
}

impl RecordingAnalytics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn forwarding(sink: Box<dyn AnalyticsSink + Send>) -> Self {
        Self {
            events: Arc::default(),
            forward: Some(Arc::new(Mutex::new(sink))),
        }
    }

    pub fn events(&self) -> Vec<LifecycleEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn count(&self, kind: LifecycleKind) -> usize {
        self.events().iter().filter(|e| e.kind == kind).count()
    }
}

impl AnalyticsSink for RecordingAnalytics {
    fn emit(&mut self, event: &LifecycleEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event.clone());
        if let Some(forward) = &self.forward {
            forward.lock().unwrap_or_else(|e| e.into_inner()).emit(event);
        }
    }
}

// ============================================================================
// Runner
// ============================================================================

/// Replays scenarios against fresh engines.
pub struct ScenarioRunner {
    base: Configuration,
    options: EngineOptions,
    store_path: Option<PathBuf>,
    analytics_path: Option<PathBuf>,
}

impl ScenarioRunner {
    pub fn new(base: Configuration) -> Self {
        Self {
            base,
            options: EngineOptions::default(),
            store_path: None,
            analytics_path: None,
        }
    }

    pub fn with_options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    /// Persist counters to `path`; scenarios then share suppression state.
    pub fn with_store(mut self, path: PathBuf) -> Self {
        self.store_path = Some(path);
        self
    }

    pub fn with_analytics(mut self, path: PathBuf) -> Self {
        self.analytics_path = Some(path);
        self
    }

    pub async fn run_all(&self, scenarios: &[Scenario]) -> Vec<ScenarioResult> {
        let mut results = Vec::with_capacity(scenarios.len());
        for scenario in scenarios {
            results.push(self.run(scenario).await);
        }
        results
    }

    /// Replay one scenario.
    pub async fn run(&self, scenario: &Scenario) -> ScenarioResult {
        info!(scenario = %scenario.name, steps = scenario.steps.len(), "replaying scenario");

        let mut replay = match self.start(scenario) {
            Ok(replay) => replay,
            Err(e) => {
                return ScenarioResult {
                    scenario_name: scenario.name.clone(),
                    passed: false,
                    steps_run: 0,
                    expectation_results: Vec::new(),
                    error: Some(format!("Failed to start engine: {}", e)),
                };
            }
        };

        for (i, step) in scenario.steps.iter().enumerate() {
            if let Err(e) = replay.execute(step, i).await {
                return ScenarioResult {
                    scenario_name: scenario.name.clone(),
                    passed: false,
                    steps_run: i + 1,
                    expectation_results: replay.results,
                    error: Some(format!("Step {} failed: {}", i, e)),
                };
            }
        }

        let passed = replay.results.iter().all(|r| r.passed);
        ScenarioResult {
            scenario_name: scenario.name.clone(),
            passed,
            steps_run: scenario.steps.len(),
            expectation_results: replay.results,
            error: None,
        }
    }

    fn start(&self, scenario: &Scenario) -> Result<Replay, GuideError> {
        let mut config = self.base.clone();
        if let Some(own) = &scenario.configuration {
            config.merge(own.clone());
        }

        let store: Box<dyn CounterStore> = match &self.store_path {
            Some(path) => Box::new(JsonFileCounterStore::open(path)?),
            None => Box::new(MemoryCounterStore::new()),
        };
        let analytics = match &self.analytics_path {
            Some(path) => RecordingAnalytics::forwarding(Box::new(JsonlAnalyticsSink::new(&path.display().to_string()))),
            None => RecordingAnalytics::new(),
        };
        let renderer = RecordingRenderer::new();
        let web = Arc::new(ScriptedWebAdapter::new());

        let collab = Collaborators {
            renderer: Box::new(renderer.clone()),
            analytics: Box::new(analytics.clone()),
            web: web.clone(),
            store,
        };
        let engine = GuideEngine::new(config, self.options.clone(), collab)?;

        Ok(Replay {
            engine,
            renderer,
            analytics,
            web,
            start: Instant::now(),
            elapsed: Duration::ZERO,
            last_snapshot: None,
            results: Vec::new(),
        })
    }
}

/// State of one scenario being replayed.
struct Replay {
    engine: GuideEngine,
    renderer: RecordingRenderer,
    analytics: RecordingAnalytics,
    web: Arc<ScriptedWebAdapter>,
    /// Virtual clock origin
    start: Instant,
    elapsed: Duration,
    last_snapshot: Option<Snapshot>,
    results: Vec<ExpectationResult>,
}

impl Replay {
    fn now(&self) -> Instant {
        self.start + self.elapsed
    }

    async fn execute(&mut self, step: &ScenarioStep, step_index: usize) -> Result<(), GuideError> {
        debug!(step_index, ?step, "replay step");
        match step {
            ScenarioStep::Snapshot { screen, elements, web } => {
                let mut builder = match screen {
                    Some(screen) => SnapshotBuilder::new().screen(screen),
                    None => SnapshotBuilder::new(),
                };
                for element in elements {
                    push_element(&mut builder, element, None);
                }
                for (id, container) in web {
                    builder.container(id, container.frame);
                }
                self.web.set_containers(web.clone());

                let snapshot = builder.build();
                self.engine.detect(&snapshot, self.now()).await;
                self.last_snapshot = Some(snapshot);
                Ok(())
            }

            ScenarioStep::Poll => {
                let snapshot = self
                    .last_snapshot
                    .take()
                    .ok_or_else(|| GuideError::Scenario("poll before any snapshot".to_string()))?;
                self.engine.detect(&snapshot, self.now()).await;
                self.last_snapshot = Some(snapshot);
                Ok(())
            }

            ScenarioStep::Advance { ms } => {
                self.elapsed += Duration::from_millis(*ms);
                let now = self.now();
                self.engine.fire_due_timers(now);
                Ok(())
            }

            ScenarioStep::Tap { x, y, window } => {
                let event = PointerEvent {
                    location: Point { x: *x, y: *y },
                    window: *window,
                };
                let now = self.now();
                self.engine.handle_pointer(&event, now);
                Ok(())
            }

            ScenarioStep::WebClick { token } => {
                let now = self.now();
                self.engine
                    .handle_web_click(&WebClickMessage { token: token.clone() }, now);
                Ok(())
            }

            ScenarioStep::Presented => {
                self.engine.on_presented();
                Ok(())
            }

            ScenarioStep::Dismissed {
                by_user,
                auto_dismissed,
                action,
            } => {
                self.engine.on_dismissed(DismissAck {
                    by_user: *by_user,
                    auto_dismissed: *auto_dismissed,
                    action: *action,
                });
                Ok(())
            }

            ScenarioStep::AcceptEntry => {
                if !self.engine.accept_entry_affordance() {
                    return Err(GuideError::Scenario("no entry affordance to accept".to_string()));
                }
                Ok(())
            }

            ScenarioStep::EndSession => {
                self.engine.end_stage_session();
                Ok(())
            }

            ScenarioStep::Expect { expectations } => {
                for expectation in expectations {
                    let result = self.check(expectation, step_index);
                    self.results.push(result);
                }
                Ok(())
            }
        }
    }

    fn check(&self, expectation: &Expectation, step_index: usize) -> ExpectationResult {
        let (passed, actual, failure) = match expectation {
            Expectation::Target { name } => {
                let live = self.engine.live_target().map(|t| t.name.clone());
                let passed = live.as_deref() == Some(name.as_str());
                (passed, live, format!("live target is not '{}'", name))
            }
            Expectation::NoTarget => {
                let targeted = self.engine.targeted().map(|k| format!("{:?}", k));
                (targeted.is_none(), targeted, "a target is still set".to_string())
            }
            Expectation::Armed { name } => {
                let armed = match (self.engine.next_deadline(), self.engine.targeted()) {
                    (Some(_), Some(_)) => self.armed_name(),
                    _ => None,
                };
                let passed = armed.as_deref() == Some(name.as_str());
                (passed, armed, format!("no delay armed for '{}'", name))
            }
            Expectation::Mode { mode } => {
                let actual = self.engine.mode();
                (actual == *mode, Some(format!("{:?}", actual)), format!("mode is not {:?}", mode))
            }
            Expectation::EntryAffordance { visible } => {
                let actual = self.engine.entry_affordance_visible();
                (
                    actual == *visible,
                    Some(actual.to_string()),
                    format!("entry affordance visibility is not {}", visible),
                )
            }
            Expectation::FlowDepth { depth } => {
                let actual = self.engine.flow_stack().len();
                (
                    actual == *depth,
                    Some(actual.to_string()),
                    format!("flow stack depth is {} but expected {}", actual, depth),
                )
            }
            Expectation::Page { name } => {
                let actual = self.engine.current_page().map(str::to_string);
                let passed = actual.as_deref() == Some(name.as_str());
                (passed, actual, format!("current page is not '{}'", name))
            }
            Expectation::Event { kind, count } => {
                let actual = self.analytics.count(*kind);
                let passed = match count {
                    Some(expected) => actual == *expected,
                    None => actual > 0,
                };
                (
                    passed,
                    Some(actual.to_string()),
                    format!("{:?} emitted {} time(s)", kind, actual),
                )
            }
            Expectation::Shown { name, count } => {
                let actual = self.renderer.shown(name);
                (
                    actual == *count,
                    Some(actual.to_string()),
                    format!("'{}' shown {} time(s) but expected {}", name, actual, count),
                )
            }
            Expectation::DismissRequested { name } => {
                let actual = self.renderer.dismissed(name);
                (
                    actual > 0,
                    Some(actual.to_string()),
                    format!("'{}' was never dismissed", name),
                )
            }
            Expectation::Listeners { native, web } => {
                let listeners = self.engine.click_listeners();
                let actual = (listeners.native_count(), listeners.web_count());
                (
                    actual == (*native, *web),
                    Some(format!("native={} web={}", actual.0, actual.1)),
                    format!("expected native={} web={}", native, web),
                )
            }
        };

        ExpectationResult {
            step_index,
            expectation: expectation.clone(),
            passed,
            actual,
            message: if passed { None } else { Some(failure) },
        }
    }

    /// Name of the armed target, resolved through the configuration.
    fn armed_name(&self) -> Option<String> {
        match self.engine.targeted()? {
            TargetKey::Context(key) => self.engine.configuration().context(*key).map(|c| c.name.clone()),
            TargetKey::Stage(key) => Some(key.stage.clone()),
        }
    }
}

fn push_element(builder: &mut SnapshotBuilder, spec: &ElementSpec, parent: Option<ElementHandle>) {
    let mut element = ElementDescriptor::new(&spec.type_tag).with_frame(spec.frame);
    element.accessibility_id = spec.accessibility_id.clone();
    element.accessibility_label = spec.accessibility_label.clone();
    element.tag = spec.tag.clone();
    element.text = spec.text.clone();
    element.placeholder = spec.placeholder.clone();
    element.screen = spec.screen.clone();
    element.visible = !spec.hidden;

    let handle = builder.push(element, parent);
    for child in &spec.children {
        push_element(builder, child, Some(handle));
    }
}
