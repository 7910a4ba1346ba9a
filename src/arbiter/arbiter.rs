use std::collections::BTreeSet;

use tracing::debug;

use crate::identifier::validator::{Anchor, IdentifierValidator};
use crate::model::context_model::Rule;
use crate::snapshot::snapshot_model::Snapshot;

/// Outcome of one arbitration round.
#[derive(Debug)]
pub struct Arbitration<'r, R: ?Sized> {
    /// Rule to trigger and its resolved anchor
    pub winner: Option<(&'r R, Anchor)>,
    /// Event-triggered rules that need click listeners. Only filled when no
    /// automatic candidate exists.
    pub listen: Vec<(&'r R, Anchor)>,
}

impl<'r, R: ?Sized> Arbitration<'r, R> {
    pub fn nothing() -> Self {
        Self {
            winner: None,
            listen: Vec::new(),
        }
    }
}

/// Rules whose required ids all pass, in input order. All ids are resolved
/// in a single validator call.
pub async fn find_valid<'r, R: Rule + ?Sized>(
    validator: &IdentifierValidator<'_>,
    rules: &[&'r R],
    snapshot: &Snapshot,
) -> Vec<&'r R> {
    if rules.is_empty() {
        return Vec::new();
    }

    let native: BTreeSet<String> = rules
        .iter()
        .flat_map(|r| r.native_ids().iter().cloned())
        .collect();
    let web: BTreeSet<String> = rules
        .iter()
        .flat_map(|r| r.web_ids().iter().cloned())
        .collect();

    let passing = validator.resolve_passing_ids(&native, &web, snapshot).await;

    rules
        .iter()
        .copied()
        .filter(|r| passing.admits(*r))
        .collect()
}

/// Highest weight wins; on equal weight the earlier rule is kept.
pub fn heaviest<'r, R: Rule + ?Sized>(rules: impl IntoIterator<Item = &'r R>) -> Option<&'r R> {
    rules.into_iter().fold(None, |best, rule| match best {
        None => Some(rule),
        Some(current) if current.weight() < rule.weight() => Some(rule),
        Some(current) => Some(current),
    })
}

/// Pick the rule to trigger among `valid`.
///
/// Candidates are the automatically triggered rules plus the live rule
/// (whatever its trigger). When no automatic candidate exists, every valid
/// Event rule with a resolvable anchor is returned in `listen`.
pub async fn pick_winner<'r, R: Rule + ?Sized>(
    validator: &IdentifierValidator<'_>,
    valid: &[&'r R],
    snapshot: &Snapshot,
    is_live: impl Fn(&R) -> bool,
) -> Arbitration<'r, R> {
    let has_automatic = valid.iter().any(|r| r.trigger().is_automatic());

    let candidate = heaviest(
        valid
            .iter()
            .copied()
            .filter(|r| r.trigger().is_automatic() || is_live(*r)),
    );

    let winner = match candidate {
        Some(rule) => match validator.resolve_rule_anchor(rule, snapshot).await {
            Some(anchor) => Some((rule, anchor)),
            None => {
                debug!(rule = rule.name(), "winner anchor unresolved");
                None
            }
        },
        None => None,
    };

    let mut listen = Vec::new();
    if !has_automatic {
        for rule in valid.iter().copied().filter(|r| !r.trigger().is_automatic()) {
            match validator.resolve_rule_anchor(rule, snapshot).await {
                Some(anchor) => listen.push((rule, anchor)),
                None => debug!(rule = rule.name(), "event rule anchor unresolved"),
            }
        }
    }

    Arbitration { winner, listen }
}
