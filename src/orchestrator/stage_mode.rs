use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info, warn};

use crate::arbiter::arbiter::{find_valid, heaviest, pick_winner};
use crate::collab::analytics::LifecycleKind;
use crate::identifier::validator::{Anchor, IdentifierValidator};
use crate::model::context_model::{ContextKey, Page, Stage, StageKey, TargetKey};
use crate::orchestrator::engine::{GuideEngine, Mode};
use crate::orchestrator::flow_stack::FlowFrame;
use crate::snapshot::snapshot_model::Snapshot;
use crate::trigger::scheduler::Target;

fn stage_target(flow_id: i64, page: &Page, stage: &Stage, anchor: Anchor) -> Target {
    Target {
        key: TargetKey::Stage(StageKey {
            flow_id,
            page: page.name.clone(),
            stage: stage.name.clone(),
        }),
        name: stage.name.clone(),
        anchor,
        instruction: stage.instruction.clone(),
    }
}

impl GuideEngine {
    /// Walk the flow stack from the top looking for a page and stage that
    /// validate against `snapshot`.
    pub(super) async fn detect_stage(&mut self, snapshot: &Snapshot, now: Instant) {
        if self.flow_stack.is_empty() {
            debug!("stage mode without an active flow");
            self.show_affordance(true);
            self.stage_not_found().await;
            return;
        }

        let config = Arc::clone(&self.config);
        let web = Arc::clone(&self.web);
        let locale = self.locale.clone();
        let validator = IdentifierValidator::new(&config, web.as_ref(), &locale);
        let live = self.scheduler.live().and_then(|t| t.key.stage().cloned());

        self.flow_stack.reset_lookup();
        let mut frame = self.flow_stack.current().copied();

        while let Some(FlowFrame { flow_id, .. }) = frame {
            let Some(flow) = config.flow(flow_id) else {
                warn!(flow_id, "flow on the stack is missing from configuration");
                frame = self.flow_stack.look_at_parent().copied();
                continue;
            };

            let pages: Vec<&Page> = flow.pages.iter().collect();
            let valid_pages = find_valid(&validator, &pages, snapshot).await;
            let Some(page) = heaviest(valid_pages) else {
                debug!(flow = %flow.name, "no page matched, trying parent flow");
                frame = self.flow_stack.look_at_parent().copied();
                continue;
            };

            if self.flow_stack.index_from_last() > 0 {
                info!(flow = %flow.name, "falling back to parent flow");
            }
            self.flow_stack.commit();
            self.current_page = Some(page.name.clone());

            let stages = self.policy.stages_to_check(flow_id, page);
            let valid = find_valid(&validator, &stages, snapshot).await;
            if valid.is_empty() {
                debug!(page = %page.name, "no stage matched, trying parent flow");
                frame = self.flow_stack.look_at_parent().copied();
                continue;
            }

            let is_live = |stage: &Stage| {
                live.as_ref()
                    .is_some_and(|k| k.flow_id == flow_id && k.page == page.name && k.stage == stage.name)
            };
            let arbitration = pick_winner(&validator, &valid, snapshot, is_live).await;

            let listen: Vec<Target> = arbitration
                .listen
                .into_iter()
                .map(|(stage, anchor)| stage_target(flow_id, page, stage, anchor))
                .collect();
            let listening = !listen.is_empty();
            self.install_listeners(listen, &config, web.as_ref()).await;

            match arbitration.winner {
                Some((stage, anchor)) => {
                    debug!(page = %page.name, stage = %stage.name, "stage identified");
                    let events = self
                        .scheduler
                        .offer(stage_target(flow_id, page, stage, anchor), stage.trigger, now);
                    self.apply_events(events);
                }
                None => {
                    let events = self.scheduler.clear();
                    self.apply_events(events);
                    if !listening {
                        self.renderer.stage_not_identified();
                    }
                }
            }
            return;
        }

        self.flow_stack.reset_lookup();
        self.current_page = None;
        self.stage_not_found().await;
    }

    async fn stage_not_found(&mut self) {
        let config = Arc::clone(&self.config);
        let web = Arc::clone(&self.web);
        self.install_listeners(Vec::new(), &config, web.as_ref()).await;

        let events = self.scheduler.clear();
        self.apply_events(events);
        self.renderer.stage_not_identified();
    }

    pub(super) fn push_flow(&mut self, frame: FlowFrame) {
        let name = self
            .config
            .flow(frame.flow_id)
            .map(|f| f.name.clone())
            .unwrap_or_default();
        self.flow_stack.push(frame);
        if self.mode != Mode::Stage {
            info!(flow = %name, "switching to stage mode");
        } else {
            info!(flow = %name, depth = self.flow_stack.len(), "flow pushed");
        }
        self.mode = Mode::Stage;
    }

    /// Count a finished stage, then pop the flow on success or push its
    /// branch flow. Only the top flow is popped or branched from.
    pub(super) fn complete_stage(&mut self, key: &StageKey) {
        let config = Arc::clone(&self.config);
        let Some(stage) = config
            .flow(key.flow_id)
            .and_then(|f| f.pages.iter().find(|p| p.name == key.page))
            .and_then(|p| p.stages.iter().find(|s| s.name == key.stage))
        else {
            warn!(stage = %key.stage, "completed stage is missing from configuration");
            return;
        };

        if self.policy.record_stage_played(key.flow_id, &key.page, stage) {
            debug!(stage = %stage.name, "stage pruned for this flow");
        }

        // A parent-flow fallback may have cut this stage's flow off the stack
        if self.flow_stack.top().map(|f| f.flow_id) != Some(key.flow_id) {
            debug!(stage = %stage.name, flow_id = key.flow_id, "stage's flow is no longer on top, counted only");
            return;
        }

        if stage.is_success {
            let event = self.flow_event(LifecycleKind::FlowSuccess, key.flow_id);
            self.emit(event);

            if let Some(popped) = self.flow_stack.pop() {
                info!(flow_id = popped.flow_id, "flow completed");
                if let Some(origin) = popped.origin {
                    self.policy.record_flow_completed(ContextKey::discovery(origin));
                }
            }
            self.policy.reset_stage_counters();

            if self.flow_stack.is_empty() {
                info!("flow stack empty, switching to discovery mode");
                self.mode = Mode::Discovery;
                self.current_page = None;
            }
        } else if let Some(branch) = stage.branch_flow_id {
            self.push_flow(FlowFrame {
                flow_id: branch,
                origin: None,
            });
        }
    }

    /// End the stage session on user request.
    pub fn end_stage_session(&mut self) {
        self.close_stage_session(LifecycleKind::FlowStop);
    }

    /// Stop the running flow and keep its Discovery from displaying again.
    pub fn disable_running_flow(&mut self) {
        if let Some(origin) = self.flow_stack.root().and_then(|f| f.origin) {
            let key = ContextKey::discovery(origin);
            self.policy.mute(key);
            self.policy.mark_completed(key);
        }
        self.close_stage_session(LifecycleKind::FlowDisable);
    }

    fn close_stage_session(&mut self, kind: LifecycleKind) {
        if let Some(top) = self.flow_stack.top().copied() {
            let event = self.flow_event(kind, top.flow_id);
            self.emit(event);
        }

        if let Some(live) = self.scheduler.live().cloned() {
            self.renderer.dismiss_target(&live);
        }
        self.scheduler.reset();
        self.flow_stack.clear();
        self.policy.reset_stage_counters();
        self.current_page = None;
        let teardown = self.clicks.clear();
        self.pending_bindings.extend(teardown);

        info!(?kind, "stage session ended");
        self.mode = Mode::Discovery;
    }
}
