use std::collections::BTreeSet;
use std::sync::Arc;

use guide_engine::collab::renderer::Renderer;
use guide_engine::identifier::web::WebContentAdapter;
use guide_engine::model::configuration::Configuration;
use guide_engine::model::context_model::{Context, ContextKind, Flow, Page, Rule, Stage, Trigger};
use guide_engine::model::identifier_model::{NativeIdentifier, RequiredProps, WebIdentifier};
use guide_engine::orchestrator::engine::{Collaborators, EngineOptions, GuideEngine};
use guide_engine::policy::counter_store::MemoryCounterStore;
use guide_engine::replay::runner::{RecordingAnalytics, RecordingRenderer};
use guide_engine::replay::scripted_web::ScriptedWebAdapter;
use guide_engine::snapshot::builder::SnapshotBuilder;
use guide_engine::snapshot::snapshot_model::{ElementDescriptor, Rect, Snapshot};

// ============================================================================
// Rules
// ============================================================================

fn ids(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

pub fn assist(id: i64, name: &str, weight: f64, native: &[&str]) -> Context {
    let mut c = Context::new(ContextKind::Assist, id, name);
    c.weight = weight;
    c.native_identifier_ids = ids(native);
    c
}

pub fn discovery(id: i64, name: &str, weight: f64, native: &[&str], flow_id: Option<i64>) -> Context {
    let mut c = Context::new(ContextKind::Discovery, id, name);
    c.weight = weight;
    c.native_identifier_ids = ids(native);
    c.flow_id = flow_id;
    c
}

pub fn with_trigger(mut context: Context, trigger: Trigger) -> Context {
    context.trigger = trigger;
    context
}

pub fn stage(name: &str, native: &[&str]) -> Stage {
    let mut s = Stage::new(name);
    s.native_identifier_ids = ids(native);
    s
}

pub fn success_stage(name: &str, native: &[&str]) -> Stage {
    let mut s = stage(name, native);
    s.is_success = true;
    s
}

pub fn page(name: &str, weight: f64, native: &[&str], stages: Vec<Stage>) -> Page {
    Page {
        name: name.to_string(),
        weight,
        native_identifier_ids: ids(native),
        web_identifier_ids: Vec::new(),
        stages,
    }
}

pub fn flow(id: i64, name: &str, pages: Vec<Page>) -> Flow {
    Flow {
        id,
        name: name.to_string(),
        pages,
    }
}

// ============================================================================
// Configuration
// ============================================================================

/// Identifier matching an element by accessibility id.
pub fn native_identifier(accessibility_id: &str) -> NativeIdentifier {
    NativeIdentifier::with_props(RequiredProps {
        accessibility_id: Some(accessibility_id.to_string()),
        ..Default::default()
    })
}

pub fn web_identifier(selector: &str) -> WebIdentifier {
    WebIdentifier {
        dom_descriptor: format!("document.querySelector('{}')", selector),
        scope_to_screen: None,
        attribute_constraints: None,
    }
}

/// Configuration where every referenced native id `x` matches the element
/// whose accessibility id is `x`.
pub fn config(assists: Vec<Context>, discoveries: Vec<Context>, flows: Vec<Flow>) -> Configuration {
    let mut config = Configuration {
        assists,
        discoveries,
        flows,
        ..Default::default()
    }
    .normalized();

    let mut referenced = BTreeSet::new();
    for c in config.assists.iter().chain(config.discoveries.iter()) {
        referenced.extend(c.native_ids().iter().cloned());
    }
    for f in &config.flows {
        for p in &f.pages {
            referenced.extend(p.native_ids().iter().cloned());
            for s in &p.stages {
                referenced.extend(s.native_ids().iter().cloned());
            }
        }
    }
    for id in referenced {
        let identifier = native_identifier(&id);
        config.native_identifiers.insert(id, identifier);
    }
    config
}

// ============================================================================
// Snapshots
// ============================================================================

/// One visible element per accessibility id, stacked vertically, 100x40
/// each.
pub fn snapshot_with(present: &[&str]) -> Snapshot {
    let mut builder = SnapshotBuilder::new().screen("Main");
    for (i, id) in present.iter().enumerate() {
        builder.push(
            ElementDescriptor::new("Button")
                .with_accessibility_id(id)
                .with_frame(frame_of(i))
                .on_screen("Main"),
            None,
        );
    }
    builder.build()
}

/// Frame `snapshot_with` gives the element at `index`.
pub fn frame_of(index: usize) -> Rect {
    Rect::new(0.0, index as f64 * 50.0, 100.0, 40.0)
}

// ============================================================================
// Engine
// ============================================================================

pub struct Harness {
    pub engine: GuideEngine,
    pub renderer: RecordingRenderer,
    pub analytics: RecordingAnalytics,
    pub web: Arc<ScriptedWebAdapter>,
}

pub fn harness(config: Configuration) -> Harness {
    let renderer = RecordingRenderer::new();
    let analytics = RecordingAnalytics::new();
    let web = Arc::new(ScriptedWebAdapter::new());
    let engine = engine_with(config, Box::new(renderer.clone()), Box::new(analytics.clone()), web.clone());
    Harness {
        engine,
        renderer,
        analytics,
        web,
    }
}

pub fn engine_with(
    config: Configuration,
    renderer: Box<dyn Renderer>,
    analytics: Box<dyn guide_engine::collab::analytics::AnalyticsSink>,
    web: Arc<dyn WebContentAdapter>,
) -> GuideEngine {
    let collab = Collaborators {
        renderer,
        analytics,
        web,
        store: Box::new(MemoryCounterStore::new()),
    };
    GuideEngine::new(config, EngineOptions::default(), collab).expect("fixture configuration is valid")
}
