use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::click::listeners::{PointerEvent, WebClickMessage};
use crate::collab::renderer::DismissAck;
use crate::model::configuration::Configuration;
use crate::orchestrator::engine::{GuideEngine, PauseReason};
use crate::snapshot::snapshot_model::{ScopeHint, SnapshotProvider};

/// Input fed to the loop by the host.
#[derive(Debug)]
pub enum EngineInput {
    Pointer(PointerEvent),
    WebClick(WebClickMessage),
    Presented,
    Dismissed(DismissAck),
    /// The renderer is laying out an overlay; hold polling until `false`
    OverlayConfiguring(bool),
    AcceptEntry,
    EndSession,
    ReplaceConfiguration { config: Configuration, reset_mode: bool },
    AppendConfiguration(Configuration),
    Shutdown,
}

/// Drives a [`GuideEngine`] at a fixed poll cadence.
///
/// Polls, host inputs and delay deadlines are multiplexed on one task, so a
/// detection cycle always runs to completion before anything else touches
/// the engine.
pub struct DetectionLoop<P: SnapshotProvider> {
    engine: GuideEngine,
    provider: P,
    inputs: mpsc::Receiver<EngineInput>,
    poll_interval: Duration,
    scope: ScopeHint,
}

impl<P: SnapshotProvider> DetectionLoop<P> {
    pub fn new(engine: GuideEngine, provider: P, poll_interval: Duration) -> (Self, mpsc::Sender<EngineInput>) {
        let (tx, rx) = mpsc::channel(64);
        let detection = Self {
            engine,
            provider,
            inputs: rx,
            poll_interval,
            scope: ScopeHint::All,
        };
        (detection, tx)
    }

    pub fn with_scope(mut self, scope: ScopeHint) -> Self {
        self.scope = scope;
        self
    }

    /// Run until `Shutdown` arrives or every sender is dropped. Returns the
    /// engine so callers can inspect its final state.
    pub async fn run(mut self) -> GuideEngine {
        let mut poll = time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(interval_ms = self.poll_interval.as_millis() as u64, "detection loop started");

        loop {
            let deadline = self.engine.next_deadline();

            tokio::select! {
                _ = poll.tick() => {
                    if !self.engine.is_polling() {
                        debug!("poll skipped, detection paused");
                        continue;
                    }
                    let snapshot = self.provider.snapshot(self.scope);
                    self.engine.detect(&snapshot, now()).await;
                }
                _ = wait_until(deadline) => {
                    self.engine.fire_due_timers(now());
                }
                input = self.inputs.recv() => {
                    match input {
                        Some(EngineInput::Shutdown) | None => break,
                        Some(input) => self.apply(input),
                    }
                }
            }
        }

        info!(cycles = self.engine.cycles_run(), "detection loop stopped");
        self.engine
    }

    fn apply(&mut self, input: EngineInput) {
        match input {
            EngineInput::Pointer(event) => {
                self.engine.handle_pointer(&event, now());
            }
            EngineInput::WebClick(message) => {
                self.engine.handle_web_click(&message, now());
            }
            EngineInput::Presented => self.engine.on_presented(),
            EngineInput::Dismissed(ack) => self.engine.on_dismissed(ack),
            EngineInput::OverlayConfiguring(true) => self.engine.pause_polling(PauseReason::OverlayConfiguring),
            EngineInput::OverlayConfiguring(false) => self.engine.resume_polling(PauseReason::OverlayConfiguring),
            EngineInput::AcceptEntry => {
                self.engine.accept_entry_affordance();
            }
            EngineInput::EndSession => self.engine.end_stage_session(),
            EngineInput::ReplaceConfiguration { config, reset_mode } => {
                if let Err(e) = self.engine.replace_configuration(config, reset_mode) {
                    warn!(error = %e, "configuration replacement rejected");
                }
            }
            EngineInput::AppendConfiguration(config) => {
                if let Err(e) = self.engine.append_configuration(config) {
                    warn!(error = %e, "sub-configuration rejected");
                }
            }
            EngineInput::Shutdown => {}
        }
    }
}

fn now() -> std::time::Instant {
    time::Instant::now().into_std()
}

async fn wait_until(deadline: Option<std::time::Instant>) {
    match deadline {
        Some(deadline) => time::sleep_until(time::Instant::from_std(deadline)).await,
        None => std::future::pending().await,
    }
}
