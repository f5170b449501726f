//! Follow-up rule evaluator.
//!
//! Each rule is a pure predicate over one entity's signal bundle and returns
//! zero or one `FollowupItem`. Rules do no I/O. A rule whose preconditions
//! are unmet (insufficient data, still loading) simply does not fire — that
//! is not an error condition.

use crate::types::{EntitySignals, FeedContext, FollowupItem, FollowupKind, PrimaryInsight};

/// Expected-return magnitude at which an unexpressed view becomes an alert.
pub const EV_ALERT_THRESHOLD: f64 = 0.15;

/// Function signature for a follow-up rule.
pub type FollowupRule = fn(&EntitySignals, &FeedContext) -> Option<FollowupItem>;

/// A registered rule. The registry order is the fixed priority order, for
/// both list ordering and primary-insight selection.
pub struct RuleEntry {
    pub kind: FollowupKind,
    pub name: &'static str,
    pub rule: FollowupRule,
}

/// The fixed rule set: decision-research gap > rating-EV mismatch >
/// high-EV-no-idea.
pub fn rule_set() -> &'static [RuleEntry] {
    static RULES: [RuleEntry; 3] = [
        RuleEntry {
            kind: FollowupKind::DecisionResearchGap,
            name: "rule_decision_research_gap",
            rule: rule_decision_research_gap,
        },
        RuleEntry {
            kind: FollowupKind::RatingEvMismatch,
            name: "rule_rating_ev_mismatch",
            rule: rule_rating_ev_mismatch,
        },
        RuleEntry {
            kind: FollowupKind::HighEvNoIdea,
            name: "rule_high_ev_no_idea",
            rule: rule_high_ev_no_idea,
        },
    ];
    &RULES
}

/// Run every rule for one entity, in priority order. At most one item per
/// (entity, kind) by construction.
pub fn evaluate_followups(signals: &EntitySignals, ctx: &FeedContext) -> Vec<FollowupItem> {
    let mut items = Vec::new();
    for entry in rule_set() {
        if let Some(item) = (entry.rule)(signals, ctx) {
            log::debug!("{} fired for {}", entry.name, signals.entity_id);
            items.push(item);
        }
    }
    items
}

/// The headline of the highest-priority non-suppressed firing rule. Falls
/// back to a neutral activity summary when nothing fires, and `None` when
/// there is nothing to report at all.
pub fn select_primary_insight(
    followups: &[FollowupItem],
    signals: &EntitySignals,
) -> Option<PrimaryInsight> {
    let mut candidates: Vec<&FollowupItem> =
        followups.iter().filter(|f| !f.is_suppressed).collect();
    candidates.sort_by_key(|f| f.kind);

    if let Some(first) = candidates.first() {
        return Some(PrimaryInsight {
            headline: first.headline.clone(),
            kind: Some(first.kind),
        });
    }

    if signals.active_idea_count > 0 {
        let n = signals.active_idea_count;
        return Some(PrimaryInsight {
            headline: format!("{} active idea{}", n, if n == 1 { "" } else { "s" }),
            kind: None,
        });
    }

    None
}

// ---------------------------------------------------------------------------
// Rule 1: Decision-research gap
// ---------------------------------------------------------------------------

/// The most recent decision is strictly newer than the most recent research
/// update (or no research update exists): the thesis no longer reflects the
/// position.
fn rule_decision_research_gap(
    signals: &EntitySignals,
    ctx: &FeedContext,
) -> Option<FollowupItem> {
    let decision = signals.last_decision.as_ref()?;

    if let Some(research_at) = signals.last_research_update {
        if decision.decided_at <= research_at {
            return None;
        }
    }

    let days_since = (ctx.now - decision.decided_at).num_days().max(0);
    Some(FollowupItem {
        kind: FollowupKind::DecisionResearchGap,
        entity_id: signals.entity_id.clone(),
        headline: format!(
            "{} {} {}d ago with no thesis update",
            decision.action, signals.entity_id, days_since
        ),
        detail: format!(
            "The last research update on {} predates the {} decision. Capture what changed.",
            signals.entity_id,
            decision.action.to_lowercase()
        ),
        cta_label: "Update thesis".to_string(),
        cta_action: "update_thesis".to_string(),
        is_suppressed: false,
    })
}

// ---------------------------------------------------------------------------
// Rule 2: Rating-EV mismatch
// ---------------------------------------------------------------------------

/// Relays the upstream-computed inconsistency between the stated rating
/// direction and the probability-weighted EV direction.
fn rule_rating_ev_mismatch(signals: &EntitySignals, _ctx: &FeedContext) -> Option<FollowupItem> {
    let conflict = signals.rating_ev_conflict.as_ref()?;
    Some(FollowupItem {
        kind: FollowupKind::RatingEvMismatch,
        entity_id: signals.entity_id.clone(),
        headline: conflict.headline.clone(),
        detail: conflict.detail.clone(),
        cta_label: "Review rating".to_string(),
        cta_action: "review_rating".to_string(),
        is_suppressed: false,
    })
}

// ---------------------------------------------------------------------------
// Rule 3: High EV, no idea
// ---------------------------------------------------------------------------

/// A large expected move with no active idea to express it.
fn rule_high_ev_no_idea(signals: &EntitySignals, _ctx: &FeedContext) -> Option<FollowupItem> {
    let expected_return = signals.expected_return?;
    if expected_return.abs() < EV_ALERT_THRESHOLD || signals.active_idea_count > 0 {
        return None;
    }

    let pct = (expected_return.abs() * 100.0).round() as i64;
    let direction = if expected_return >= 0.0 {
        "upside"
    } else {
        "downside"
    };

    Some(FollowupItem {
        kind: FollowupKind::HighEvNoIdea,
        entity_id: signals.entity_id.clone(),
        headline: format!(
            "{} has {}% {} and no active idea",
            signals.entity_id, pct, direction
        ),
        detail: format!(
            "Probability-weighted expected return of {:.1}% with zero active trade ideas.",
            expected_return * 100.0
        ),
        cta_label: "Draft idea".to_string(),
        cta_action: "draft_idea".to_string(),
        is_suppressed: false,
    })
}
