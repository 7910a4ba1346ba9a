use std::sync::Arc;
use std::time::Instant;

use tracing::{debug, info};

use crate::arbiter::arbiter::{find_valid, pick_winner};
use crate::identifier::validator::IdentifierValidator;
use crate::model::context_model::{Context, ContextKind};
use crate::orchestrator::engine::{GuideEngine, context_target};
use crate::snapshot::snapshot_model::Snapshot;
use crate::trigger::scheduler::Target;

impl GuideEngine {
    /// Arbitrate Assists and Discoveries for one snapshot.
    pub(super) async fn detect_discovery(&mut self, snapshot: &Snapshot, now: Instant) {
        let config = Arc::clone(&self.config);
        let web = Arc::clone(&self.web);
        let locale = self.locale.clone();
        let validator = IdentifierValidator::new(&config, web.as_ref(), &locale);

        let live = self.live_context();
        let mut candidates: Vec<&Context> = self.policy.eligible(&config.assists, live);
        candidates.extend(self.policy.eligible(&config.discoveries, live));

        // Manual discoveries compete too, but only to offer the entry point.
        for discovery in self.policy.manual_discoveries(&config.discoveries) {
            if !candidates.iter().any(|c| c.key() == discovery.key()) {
                candidates.push(discovery);
            }
        }
        debug!(candidates = candidates.len(), "discovery candidates");

        let valid = find_valid(&validator, &candidates, snapshot).await;
        let arbitration = pick_winner(&validator, &valid, snapshot, |c: &Context| Some(c.key()) == live).await;

        let listen: Vec<Target> = arbitration
            .listen
            .into_iter()
            .map(|(context, anchor)| context_target(context, anchor))
            .collect();
        self.install_listeners(listen, &config, web.as_ref()).await;

        let Some((winner, anchor)) = arbitration.winner else {
            let events = self.scheduler.clear();
            self.apply_events(events);
            self.set_entry_affordance(None);
            self.renderer.no_context_detected();
            return;
        };

        let is_live = Some(winner.key()) == live;
        if winner.kind == ContextKind::Discovery && !is_live && self.policy.is_manual(winner) {
            debug!(discovery = %winner.name, "offering entry affordance");
            let events = self.scheduler.clear();
            self.apply_events(events);
            self.set_entry_affordance(Some(winner.id));
            return;
        }

        if !is_live {
            info!(context = %winner.name, kind = ?winner.kind, weight = winner.weight, "context won arbitration");
        }
        self.set_entry_affordance(None);
        let events = self
            .scheduler
            .offer(context_target(winner, anchor), winner.trigger, now);
        self.apply_events(events);
    }
}
