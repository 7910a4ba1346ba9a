use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use guide_engine::collab::renderer::DismissAck;
use guide_engine::error::EvaluationError;
use guide_engine::identifier::web::{TimeoutWebAdapter, WebContentAdapter};
use guide_engine::model::context_model::Trigger;
use guide_engine::replay::scripted_web::ScriptedWebAdapter;
use guide_engine::orchestrator::engine::{Collaborators, EngineOptions, GuideEngine};
use guide_engine::policy::counter_store::MemoryCounterStore;
use guide_engine::replay::runner::{RecordingAnalytics, RecordingRenderer};
use guide_engine::runtime::detection_loop::{DetectionLoop, EngineInput};
use guide_engine::snapshot::builder::SnapshotBuilder;
use guide_engine::snapshot::snapshot_model::{ContainerRef, ElementDescriptor, Rect, ScopeHint, Snapshot, SnapshotProvider};

use crate::common::fixtures::{assist, config, harness, snapshot_with, web_identifier, with_trigger};

mod common;

/// Always reports the same UI and counts how often it was asked.
struct FixedProvider {
    snapshot: Snapshot,
    calls: usize,
}

impl FixedProvider {
    fn showing(ids: &[&str]) -> Self {
        Self {
            snapshot: snapshot_with(ids),
            calls: 0,
        }
    }
}

impl SnapshotProvider for FixedProvider {
    fn snapshot(&mut self, _scope: ScopeHint) -> Snapshot {
        self.calls += 1;
        self.snapshot.clone()
    }
}

// ============================================================================
// 1. Detection loop
// ============================================================================

#[tokio::test(start_paused = true)]
async fn polls_at_interval_until_shutdown() {
    let h = harness(config(vec![assist(1, "tip", 0.0, &["a"])], vec![], vec![]));
    let (detection, tx) = DetectionLoop::new(h.engine, FixedProvider::showing(&["a"]), Duration::from_millis(100));

    let (engine, _) = tokio::join!(detection.run(), async {
        tokio::time::sleep(Duration::from_millis(350)).await;
        tx.send(EngineInput::Shutdown).await.expect("loop is running");
    });

    assert!(engine.cycles_run() >= 3);
    assert_eq!(engine.live_target().map(|t| t.name.as_str()), Some("tip"));
    assert_eq!(h.renderer.shown("tip"), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_senders_stops_loop() {
    let h = harness(config(vec![], vec![], vec![]));
    let (detection, tx) = DetectionLoop::new(h.engine, FixedProvider::showing(&[]), Duration::from_millis(100));
    drop(tx);

    let engine = detection.with_scope(ScopeHint::ActiveScreen).run().await;
    assert!(engine.cycles_run() <= 1);
}

#[tokio::test(start_paused = true)]
async fn overlay_configuring_pauses_polling() {
    let h = harness(config(vec![assist(1, "tip", 0.0, &["a"])], vec![], vec![]));
    let (detection, tx) = DetectionLoop::new(h.engine, FixedProvider::showing(&["a"]), Duration::from_millis(100));

    let (engine, _) = tokio::join!(detection.run(), async {
        tokio::time::sleep(Duration::from_millis(150)).await;
        tx.send(EngineInput::OverlayConfiguring(true)).await.expect("loop is running");
        tokio::time::sleep(Duration::from_millis(500)).await;
        tx.send(EngineInput::Shutdown).await.expect("loop is running");
    });

    assert_eq!(engine.cycles_run(), 2);
    assert!(!engine.is_polling());
}

#[tokio::test(start_paused = true)]
async fn delay_trigger_fires_between_polls() {
    let later = with_trigger(assist(1, "later", 0.0, &["a"]), Trigger::Delay { ms: 250 });
    let h = harness(config(vec![later], vec![], vec![]));
    let (detection, tx) = DetectionLoop::new(h.engine, FixedProvider::showing(&["a"]), Duration::from_secs(10));

    let renderer = h.renderer.clone();
    let (engine, _) = tokio::join!(detection.run(), async {
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(renderer.shown("later"), 0);
        tokio::time::sleep(Duration::from_millis(300)).await;
        tx.send(EngineInput::Shutdown).await.expect("loop is running");
    });

    assert_eq!(engine.cycles_run(), 1);
    assert_eq!(h.renderer.shown("later"), 1);
    assert!(engine.next_deadline().is_none());
}

#[tokio::test(start_paused = true)]
async fn host_acknowledgements_reach_engine() {
    let h = harness(config(vec![assist(1, "tip", 0.0, &["a"])], vec![], vec![]));
    let (detection, tx) = DetectionLoop::new(h.engine, FixedProvider::showing(&["a"]), Duration::from_millis(100));

    let (engine, _) = tokio::join!(detection.run(), async {
        tokio::time::sleep(Duration::from_millis(50)).await;
        tx.send(EngineInput::Presented).await.expect("loop is running");
        tx.send(EngineInput::Dismissed(DismissAck::by_user(None)))
            .await
            .expect("loop is running");
        tokio::time::sleep(Duration::from_millis(200)).await;
        tx.send(EngineInput::Shutdown).await.expect("loop is running");
    });

    // Dismissed for this session: later polls leave it hidden
    assert!(engine.live_target().is_none());
    assert_eq!(h.renderer.shown("tip"), 1);
    assert_eq!(h.analytics.events().len(), 1);
}

// ============================================================================
// 2. Evaluation timeout
// ============================================================================

struct SlowAdapter;

#[async_trait]
impl WebContentAdapter for SlowAdapter {
    async fn evaluate(&self, _script: &str, _container: &ContainerRef) -> Result<String, EvaluationError> {
        tokio::time::sleep(Duration::from_secs(5)).await;
        Ok("[]".to_string())
    }
}

#[tokio::test(start_paused = true)]
async fn slow_evaluation_times_out() {
    let adapter = TimeoutWebAdapter::new(Arc::new(SlowAdapter), Duration::from_millis(100));
    let result = adapter.evaluate("1", &ContainerRef("web".into())).await;
    assert_eq!(result, Err(EvaluationError::Timeout(100)));
}

#[tokio::test]
async fn fast_evaluation_passes_through() {
    let adapter = TimeoutWebAdapter::new(Arc::new(ScriptedWebAdapter::new()), Duration::from_secs(1));
    let result = adapter.evaluate("1", &ContainerRef("missing".into())).await;
    assert_eq!(result, Err(EvaluationError::NoContainer("missing".into())));
}

/// Never answers.
struct HangingAdapter;

#[async_trait]
impl WebContentAdapter for HangingAdapter {
    async fn evaluate(&self, _script: &str, _container: &ContainerRef) -> Result<String, EvaluationError> {
        std::future::pending().await
    }
}

#[tokio::test(start_paused = true)]
async fn hanging_container_does_not_stall_detection() {
    let mut web_tip = assist(1, "web-tip", 10.0, &[]);
    web_tip.web_identifier_ids = vec!["buy".to_string()];
    let mut config = config(vec![web_tip, assist(2, "tip", 1.0, &["a"])], vec![], vec![]);
    config.web_identifiers.insert("buy".into(), web_identifier("#buy"));

    let renderer = RecordingRenderer::new();
    let collab = Collaborators {
        renderer: Box::new(renderer.clone()),
        analytics: Box::new(RecordingAnalytics::new()),
        web: Arc::new(HangingAdapter),
        store: Box::new(MemoryCounterStore::new()),
    };
    let options = EngineOptions {
        evaluation_timeout: Duration::from_millis(100),
        ..Default::default()
    };
    let mut engine = GuideEngine::new(config, options, collab).expect("valid configuration");

    let mut builder = SnapshotBuilder::new().screen("Main");
    builder.push(
        ElementDescriptor::new("Button")
            .with_accessibility_id("a")
            .with_frame(Rect::new(0.0, 0.0, 100.0, 40.0))
            .on_screen("Main"),
        None,
    );
    builder.container("shop", Rect::new(0.0, 100.0, 300.0, 300.0));
    let snapshot = builder.build();

    let started = tokio::time::Instant::now();
    engine.detect(&snapshot, started.into_std()).await;

    // The web rule fails for the stalled container; the native one still wins
    assert!(started.elapsed() >= Duration::from_millis(100));
    assert_eq!(engine.live_target().map(|t| t.name.as_str()), Some("tip"));
    assert_eq!(renderer.shown("web-tip"), 0);
}

#[test]
fn default_options_bound_evaluations() {
    assert_eq!(EngineOptions::default().evaluation_timeout, Duration::from_millis(2000));
}
