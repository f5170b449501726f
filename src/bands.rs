//! Band assignment engine.
//!
//! An ordered list of `{predicate, band}` rule records evaluated
//! top-to-bottom; the first match wins. Pure, no side effects, no
//! dependency on build order: repeated calls with identical input yield
//! identical bands. Unclassifiable items fall through to `Aware` so nothing
//! silently vanishes.

use crate::types::{AttentionItem, Band, BandSummary, SourceType};

// ---------------------------------------------------------------------------
// Thresholds
// ---------------------------------------------------------------------------

/// Urgency at or above this is the critical floor (overdue deliverables,
/// conflicted ratings, gap/mismatch follow-ups).
pub const URGENCY_NOW_FLOOR: f64 = 0.85;

/// A pending idea older than this is an overdue decision.
pub const IDEA_STALL_NOW_DAYS: i64 = 10;

/// Rating changes this fresh still warrant a look.
pub const RATING_FRESH_SOON_DAYS: i64 = 2;

/// How many item ids a band summary highlights.
const HIGHLIGHT_COUNT: usize = 3;

/// One entry in the assignment cascade.
struct BandRule {
    name: &'static str,
    applies: fn(&AttentionItem) -> bool,
    band: Band,
}

/// Evaluated top-to-bottom; first match wins.
static BAND_RULES: [BandRule; 9] = [
    BandRule {
        name: "followup_critical",
        applies: |i| i.source_type == SourceType::FollowUp && i.urgency >= URGENCY_NOW_FLOOR,
        band: Band::Now,
    },
    BandRule {
        name: "followup_advisory",
        applies: |i| i.source_type == SourceType::FollowUp,
        band: Band::Soon,
    },
    BandRule {
        name: "deliverable_overdue",
        applies: |i| i.source_type == SourceType::Deliverable && i.urgency >= URGENCY_NOW_FLOOR,
        band: Band::Now,
    },
    BandRule {
        name: "deliverable_due_window",
        applies: |i| i.source_type == SourceType::Deliverable && i.urgency >= 0.7,
        band: Band::Soon,
    },
    BandRule {
        name: "rating_conflict",
        applies: |i| i.source_type == SourceType::RatingChange && i.urgency >= URGENCY_NOW_FLOOR,
        band: Band::Now,
    },
    BandRule {
        name: "rating_fresh",
        applies: |i| {
            i.source_type == SourceType::RatingChange && i.age_days <= RATING_FRESH_SOON_DAYS
        },
        band: Band::Soon,
    },
    BandRule {
        name: "idea_stalled",
        applies: |i| i.source_type == SourceType::Idea && i.age_days >= IDEA_STALL_NOW_DAYS,
        band: Band::Now,
    },
    BandRule {
        name: "idea_in_motion",
        applies: |i| i.source_type == SourceType::Idea && i.urgency >= 0.6,
        band: Band::Soon,
    },
    BandRule {
        name: "proposal_in_flight",
        applies: |i| i.source_type == SourceType::Proposal,
        band: Band::Soon,
    },
];

/// Map an item to its priority band. Never fails; unknown combinations
/// default to the lowest-priority band.
pub fn assign_band(item: &AttentionItem) -> Band {
    for rule in &BAND_RULES {
        if (rule.applies)(item) {
            log::trace!("band rule {} matched {}", rule.name, item.id);
            return rule.band;
        }
    }
    Band::Aware
}

/// Pure reduction over the items already assigned to one band.
pub fn compute_band_summary(band: Band, items: &[AttentionItem]) -> BandSummary {
    let mut ranked: Vec<&AttentionItem> = items.iter().collect();
    ranked.sort_by(|a, b| {
        b.urgency
            .partial_cmp(&a.urgency)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.age_days.cmp(&a.age_days))
            .then(a.id.cmp(&b.id))
    });

    BandSummary {
        band,
        count: items.len(),
        highlighted: ranked
            .iter()
            .take(HIGHLIGHT_COUNT)
            .map(|i| i.id.clone())
            .collect(),
        aggregate_urgency: items.iter().map(|i| i.urgency).fold(0.0_f64, f64::max),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn item(id: &str, source: SourceType, urgency: f64, age: i64) -> AttentionItem {
        let now = Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap();
        AttentionItem {
            id: id.to_string(),
            source_type: source,
            entity_id: "acme".to_string(),
            portfolio_ids: vec![],
            title: String::new(),
            detail: String::new(),
            urgency,
            created_at: now - Duration::days(age),
            updated_at: now - Duration::days(age),
            age_days: age,
            band: None,
            child_leg_ids: Vec::new(),
            dedupe_key: None,
            pairing: None,
        }
    }

    #[test]
    fn assignment_is_deterministic() {
        let i = item("dlv-1", SourceType::Deliverable, 0.95, 2);
        let first = assign_band(&i);
        for _ in 0..10 {
            assert_eq!(assign_band(&i), first);
        }
    }

    #[test]
    fn overdue_deliverable_lands_in_now() {
        assert_eq!(
            assign_band(&item("dlv-1", SourceType::Deliverable, 0.95, 2)),
            Band::Now
        );
    }

    #[test]
    fn deliverable_inside_window_lands_in_soon() {
        assert_eq!(
            assign_band(&item("dlv-2", SourceType::Deliverable, 0.75, 2)),
            Band::Soon
        );
    }

    #[test]
    fn scheduled_deliverable_stays_aware() {
        assert_eq!(
            assign_band(&item("dlv-3", SourceType::Deliverable, 0.40, 2)),
            Band::Aware
        );
    }

    #[test]
    fn conflicted_rating_is_now_routine_rating_ages_out() {
        assert_eq!(
            assign_band(&item("rc-1", SourceType::RatingChange, 0.90, 1)),
            Band::Now
        );
        assert_eq!(
            assign_band(&item("rc-2", SourceType::RatingChange, 0.55, 1)),
            Band::Soon
        );
        assert_eq!(
            assign_band(&item("rc-3", SourceType::RatingChange, 0.55, 5)),
            Band::Aware
        );
    }

    #[test]
    fn stalled_idea_escalates_to_now() {
        assert_eq!(
            assign_band(&item("idea-1", SourceType::Idea, 0.55, 12)),
            Band::Now
        );
        assert_eq!(
            assign_band(&item("idea-2", SourceType::Idea, 0.75, 3)),
            Band::Soon
        );
        assert_eq!(
            assign_band(&item("idea-3", SourceType::Idea, 0.40, 3)),
            Band::Aware
        );
    }

    #[test]
    fn critical_followup_is_now_advisory_is_soon() {
        assert_eq!(
            assign_band(&item("fu-1", SourceType::FollowUp, 0.90, 0)),
            Band::Now
        );
        assert_eq!(
            assign_band(&item("fu-2", SourceType::FollowUp, 0.65, 0)),
            Band::Soon
        );
    }

    #[test]
    fn stale_research_defaults_to_aware() {
        assert_eq!(
            assign_band(&item("doc-1", SourceType::StaleResearch, 0.45, 90)),
            Band::Aware
        );
    }

    #[test]
    fn summary_counts_and_highlights_by_urgency_then_age() {
        let items = vec![
            item("a", SourceType::Deliverable, 0.75, 1),
            item("b", SourceType::Deliverable, 0.95, 1),
            item("c", SourceType::Deliverable, 0.75, 9),
            item("d", SourceType::Deliverable, 0.40, 1),
        ];
        let summary = compute_band_summary(Band::Soon, &items);
        assert_eq!(summary.count, 4);
        assert_eq!(summary.highlighted, vec!["b", "c", "a"]);
        assert_eq!(summary.aggregate_urgency, 0.95);
    }

    #[test]
    fn empty_band_summary_is_zeroed() {
        let summary = compute_band_summary(Band::Now, &[]);
        assert_eq!(summary.count, 0);
        assert!(summary.highlighted.is_empty());
        assert_eq!(summary.aggregate_urgency, 0.0);
    }
}
