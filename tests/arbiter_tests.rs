use guide_engine::arbiter::arbiter::{find_valid, heaviest, pick_winner};
use guide_engine::identifier::native::LocaleSettings;
use guide_engine::identifier::validator::{Anchor, IdentifierValidator};
use guide_engine::identifier::web::NoWebContent;
use guide_engine::model::context_model::{Context, Rule, Trigger};

use crate::common::fixtures::{assist, config, snapshot_with, with_trigger};

mod common;

fn names<R: Rule + ?Sized>(rules: &[&R]) -> Vec<String> {
    rules.iter().map(|r| r.name().to_string()).collect()
}

// ============================================================================
// 1. Weight ordering
// ============================================================================

#[test]
fn heaviest_picks_highest_weight() {
    let rules = [
        assist(1, "light", 1.0, &[]),
        assist(2, "heavy", 5.0, &[]),
        assist(3, "medium", 3.0, &[]),
    ];
    assert_eq!(heaviest(rules.iter()).map(|c| c.name.as_str()), Some("heavy"));
}

#[test]
fn equal_weight_keeps_earlier_rule() {
    let rules = [
        assist(1, "first", 2.0, &[]),
        assist(2, "second", 2.0, &[]),
        assist(3, "third", 1.0, &[]),
    ];
    assert_eq!(heaviest(rules.iter()).map(|c| c.name.as_str()), Some("first"));
}

#[test]
fn heaviest_of_nothing_is_none() {
    let empty: Vec<Context> = Vec::new();
    assert!(heaviest(empty.iter()).is_none());
}

// ============================================================================
// 2. Validity
// ============================================================================

#[tokio::test]
async fn find_valid_keeps_input_order() {
    let a = assist(1, "needs-a", 0.0, &["a"]);
    let b = assist(2, "needs-b", 0.0, &["b"]);
    let ab = assist(3, "needs-ab", 0.0, &["a", "b"]);
    let none = assist(4, "needs-nothing", 0.0, &[]);
    let config = config(vec![a.clone(), b.clone(), ab.clone(), none.clone()], vec![], vec![]);

    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);
    let rules = vec![&none, &ab, &b, &a];

    let valid = find_valid(&validator, &rules, &snapshot_with(&["a"])).await;
    assert_eq!(names(&valid), vec!["needs-nothing", "needs-a"]);
}

#[tokio::test]
async fn find_valid_on_empty_input() {
    let config = config(vec![], vec![], vec![]);
    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);
    let rules: Vec<&Context> = Vec::new();
    assert!(find_valid(&validator, &rules, &snapshot_with(&["a"])).await.is_empty());
}

// ============================================================================
// 3. Winner selection
// ============================================================================

#[tokio::test]
async fn automatic_winner_resolves_anchor() {
    let tip = assist(1, "tip", 1.0, &["a"]);
    let better = assist(2, "better", 2.0, &["b"]);
    let config = config(vec![tip.clone(), better.clone()], vec![], vec![]);
    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);
    let snapshot = snapshot_with(&["a", "b"]);

    let valid = vec![&tip, &better];
    let result = pick_winner(&validator, &valid, &snapshot, |_| false).await;

    let (winner, anchor) = result.winner.expect("a winner");
    assert_eq!(winner.name, "better");
    match anchor {
        Anchor::NativeView { view, .. } => assert_eq!(view.handle.0, 1),
        other => panic!("expected native anchor, got {:?}", other),
    }
    assert!(result.listen.is_empty());
}

#[tokio::test]
async fn event_rules_only_produce_listeners() {
    let first = with_trigger(assist(1, "tap-a", 5.0, &["a"]), Trigger::Event);
    let second = with_trigger(assist(2, "tap-b", 1.0, &["b"]), Trigger::Event);
    let config = config(vec![first.clone(), second.clone()], vec![], vec![]);
    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);

    let valid = vec![&first, &second];
    let result = pick_winner(&validator, &valid, &snapshot_with(&["a", "b"]), |_| false).await;

    assert!(result.winner.is_none());
    let listening: Vec<&str> = result.listen.iter().map(|(r, _)| r.name.as_str()).collect();
    assert_eq!(listening, vec!["tap-a", "tap-b"]);
}

#[tokio::test]
async fn event_rules_are_ignored_next_to_automatic_ones() {
    let tap = with_trigger(assist(1, "tap", 9.0, &["a"]), Trigger::Event);
    let auto = assist(2, "auto", 1.0, &["b"]);
    let config = config(vec![tap.clone(), auto.clone()], vec![], vec![]);
    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);

    let valid = vec![&tap, &auto];
    let result = pick_winner(&validator, &valid, &snapshot_with(&["a", "b"]), |_| false).await;

    assert_eq!(result.winner.map(|(r, _)| r.name.as_str()), Some("auto"));
    assert!(result.listen.is_empty());
}

#[tokio::test]
async fn live_event_rule_competes_as_candidate() {
    let tap = with_trigger(assist(1, "tap", 9.0, &["a"]), Trigger::Event);
    let auto = assist(2, "auto", 1.0, &["b"]);
    let config = config(vec![tap.clone(), auto.clone()], vec![], vec![]);
    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);

    let valid = vec![&tap, &auto];
    let result = pick_winner(&validator, &valid, &snapshot_with(&["a", "b"]), |r: &Context| r.id == 1).await;

    assert_eq!(result.winner.map(|(r, _)| r.name.as_str()), Some("tap"));
}

#[tokio::test]
async fn unresolvable_winner_anchor_yields_no_winner() {
    let mut tip = assist(1, "tip", 1.0, &["a"]);
    tip.anchor = guide_engine::model::context_model::AnchorSpec::Native("nowhere".into());
    let config = config(vec![tip.clone()], vec![], vec![]);
    let locale = LocaleSettings::default();
    let validator = IdentifierValidator::new(&config, &NoWebContent, &locale);

    let valid = vec![&tip];
    let result = pick_winner(&validator, &valid, &snapshot_with(&["a"]), |_| false).await;
    assert!(result.winner.is_none());
}
