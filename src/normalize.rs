//! Item normalization: raw per-source records → canonical `AttentionItem`s.
//!
//! Each normalizer is a pure function over one source's records plus the
//! build context. A record missing a required field is skipped individually
//! with a logged warning; normalization never aborts the whole batch on one
//! bad record.

use chrono::{DateTime, Utc};

use crate::records::{
    RawDeliverable, RawIdea, RawProposal, RawRatingChange, RawResearchDoc, SourceRecords,
};
use crate::types::{AttentionItem, FeedContext, IdeaStage, PairLeg, SourceType};

// ---------------------------------------------------------------------------
// Urgency classification thresholds
// ---------------------------------------------------------------------------

/// A pending idea this old with no decision gets an urgency escalation.
pub const IDEA_STALL_ESCALATION_DAYS: i64 = 10;
const IDEA_STALL_URGENCY_BUMP: f64 = 0.15;

const RATING_CONFLICT_URGENCY: f64 = 0.90;
const RATING_ROUTINE_URGENCY: f64 = 0.55;

/// Research review staleness tiers, in days since last review.
pub const RESEARCH_STALE_CRITICAL_DAYS: i64 = 120;
pub const RESEARCH_STALE_WARN_DAYS: i64 = 90;

/// A deliverable due within this window is urgent-but-not-critical.
pub const DELIVERABLE_DUE_WINDOW_DAYS: i64 = 3;
const DELIVERABLE_OVERDUE_URGENCY: f64 = 0.95;
const DELIVERABLE_DUE_SOON_URGENCY: f64 = 0.75;
const DELIVERABLE_SCHEDULED_URGENCY: f64 = 0.40;

const PROPOSAL_IN_FLIGHT_URGENCY: f64 = 0.70;

/// Normalize every source into one flat item list, in fixed source order.
pub fn normalize(records: &SourceRecords, ctx: &FeedContext) -> Vec<AttentionItem> {
    let mut items = Vec::new();
    items.extend(normalize_ideas(&records.ideas, ctx));
    items.extend(normalize_rating_changes(&records.rating_changes, ctx));
    items.extend(normalize_stale_research(&records.stale_research, ctx));
    items.extend(normalize_deliverables(&records.deliverables, ctx));
    items.extend(normalize_proposals(&records.proposals, ctx));
    items
}

fn age_days(created_at: DateTime<Utc>, now: DateTime<Utc>) -> i64 {
    (now - created_at).num_days().max(0)
}

// ---------------------------------------------------------------------------
// Source 1: Trade ideas
// ---------------------------------------------------------------------------

/// Pending ideas awaiting a decision. Executed ideas are no longer pending
/// work and are skipped here; they still count toward pipeline stats.
pub fn normalize_ideas(ideas: &[RawIdea], ctx: &FeedContext) -> Vec<AttentionItem> {
    let mut items = Vec::new();
    for idea in ideas {
        let (entity_id, stage, created_at) =
            match (&idea.entity_id, idea.stage, idea.created_at) {
                (Some(e), Some(s), Some(c)) => (e.clone(), s, c),
                _ => {
                    log::warn!("skipping idea {} with missing fields", idea.id);
                    continue;
                }
            };
        let age = age_days(created_at, ctx.now);
        let base = match stage {
            IdeaStage::Working => 0.80,
            IdeaStage::Approved => 0.75,
            IdeaStage::Proposed => 0.60,
            IdeaStage::Draft => 0.40,
            IdeaStage::Executed => continue,
        };
        let urgency = if age >= IDEA_STALL_ESCALATION_DAYS {
            (base + IDEA_STALL_URGENCY_BUMP).min(1.0)
        } else {
            base
        };

        let title = idea
            .title
            .clone()
            .unwrap_or_else(|| format!("Idea on {}", entity_id));
        let detail = format!("Pending decision for {}d", age);

        items.push(AttentionItem {
            id: idea.id.clone(),
            source_type: SourceType::Idea,
            entity_id,
            portfolio_ids: idea.portfolio_ids.clone(),
            title,
            detail,
            urgency,
            created_at,
            updated_at: idea.updated_at.unwrap_or(created_at),
            age_days: age,
            band: None,
            child_leg_ids: Vec::new(),
            dedupe_key: Some(idea.id.clone()),
            pairing: None,
        });
    }
    items
}

// ---------------------------------------------------------------------------
// Source 2: Rating changes
// ---------------------------------------------------------------------------

pub fn normalize_rating_changes(
    changes: &[RawRatingChange],
    ctx: &FeedContext,
) -> Vec<AttentionItem> {
    let mut items = Vec::new();
    for change in changes {
        let (entity_id, new_rating, created_at) =
            match (&change.entity_id, &change.new_rating, change.created_at) {
                (Some(e), Some(n), Some(c)) => (e.clone(), n.clone(), c),
                _ => {
                    log::warn!("skipping rating change {} with missing fields", change.id);
                    continue;
                }
            };

        let urgency = if change.ev_conflict {
            RATING_CONFLICT_URGENCY
        } else {
            RATING_ROUTINE_URGENCY
        };

        let title = match &change.old_rating {
            Some(old) => format!("{} rating {} → {}", entity_id, old, new_rating),
            None => format!("{} rated {}", entity_id, new_rating),
        };
        let detail = match (&change.conflict_note, change.ev_conflict) {
            (Some(note), _) => note.clone(),
            (None, true) => "Rating direction disagrees with expected value".to_string(),
            (None, false) => "Routine rating update".to_string(),
        };

        items.push(AttentionItem {
            id: change.id.clone(),
            source_type: SourceType::RatingChange,
            entity_id,
            portfolio_ids: change.portfolio_ids.clone(),
            title,
            detail,
            urgency,
            created_at,
            updated_at: change.updated_at.unwrap_or(created_at),
            age_days: age_days(created_at, ctx.now),
            band: None,
            child_leg_ids: Vec::new(),
            dedupe_key: None,
            pairing: None,
        });
    }
    items
}

// ---------------------------------------------------------------------------
// Source 3: Stale research
// ---------------------------------------------------------------------------

pub fn normalize_stale_research(
    docs: &[RawResearchDoc],
    ctx: &FeedContext,
) -> Vec<AttentionItem> {
    let mut items = Vec::new();
    for doc in docs {
        let (entity_id, last_reviewed_at) = match (&doc.entity_id, doc.last_reviewed_at) {
            (Some(e), Some(r)) => (e.clone(), r),
            _ => {
                log::warn!("skipping research doc {} with missing fields", doc.id);
                continue;
            }
        };

        let stale_days = age_days(last_reviewed_at, ctx.now);
        let urgency = if stale_days >= RESEARCH_STALE_CRITICAL_DAYS {
            0.55
        } else if stale_days >= RESEARCH_STALE_WARN_DAYS {
            0.45
        } else {
            0.30
        };

        let title = doc
            .title
            .clone()
            .unwrap_or_else(|| format!("Thesis on {}", entity_id));
        let created_at = doc.created_at.unwrap_or(last_reviewed_at);

        items.push(AttentionItem {
            id: doc.id.clone(),
            source_type: SourceType::StaleResearch,
            entity_id,
            portfolio_ids: doc.portfolio_ids.clone(),
            title,
            detail: format!("Not reviewed in {}d", stale_days),
            urgency,
            created_at,
            updated_at: doc.updated_at.unwrap_or(created_at),
            age_days: age_days(created_at, ctx.now),
            band: None,
            child_leg_ids: Vec::new(),
            dedupe_key: None,
            pairing: None,
        });
    }
    items
}

// ---------------------------------------------------------------------------
// Source 4: Deliverables
// ---------------------------------------------------------------------------

pub fn normalize_deliverables(
    deliverables: &[RawDeliverable],
    ctx: &FeedContext,
) -> Vec<AttentionItem> {
    let mut items = Vec::new();
    for deliverable in deliverables {
        let (due_at, created_at) = match (deliverable.due_at, deliverable.created_at) {
            (Some(d), Some(c)) => (d, c),
            _ => {
                log::warn!(
                    "skipping deliverable {} with missing fields",
                    deliverable.id
                );
                continue;
            }
        };

        let days_until_due = (due_at - ctx.now).num_days();
        let (urgency, due_label) = if due_at <= ctx.now {
            let overdue = (ctx.now - due_at).num_days();
            (
                DELIVERABLE_OVERDUE_URGENCY,
                format!("Overdue by {}d", overdue.max(1)),
            )
        } else if days_until_due < DELIVERABLE_DUE_WINDOW_DAYS {
            (
                DELIVERABLE_DUE_SOON_URGENCY,
                format!("Due in {}d", days_until_due.max(1)),
            )
        } else {
            (
                DELIVERABLE_SCHEDULED_URGENCY,
                format!("Due in {}d", days_until_due),
            )
        };

        let title = deliverable
            .title
            .clone()
            .unwrap_or_else(|| format!("Deliverable {}", deliverable.id));
        // Desk-level deliverables have no asset; scope them to the desk.
        let entity_id = deliverable
            .entity_id
            .clone()
            .unwrap_or_else(|| "desk".to_string());

        items.push(AttentionItem {
            id: deliverable.id.clone(),
            source_type: SourceType::Deliverable,
            entity_id,
            portfolio_ids: deliverable.portfolio_ids.clone(),
            title,
            detail: due_label,
            urgency,
            created_at,
            updated_at: deliverable.updated_at.unwrap_or(created_at),
            age_days: age_days(created_at, ctx.now),
            band: None,
            child_leg_ids: Vec::new(),
            dedupe_key: None,
            pairing: None,
        });
    }
    items
}

// ---------------------------------------------------------------------------
// Source 5: Proposals
// ---------------------------------------------------------------------------

pub fn normalize_proposals(proposals: &[RawProposal], ctx: &FeedContext) -> Vec<AttentionItem> {
    let mut items = Vec::new();
    for proposal in proposals {
        let (entity_id, created_at) = match (&proposal.entity_id, proposal.created_at) {
            (Some(e), Some(c)) => (e.clone(), c),
            _ => {
                log::warn!("skipping proposal {} with missing fields", proposal.id);
                continue;
            }
        };

        // Both halves of the pairing metadata are required to merge legs.
        let pairing = match (&proposal.pair_key, proposal.side) {
            (Some(key), Some(role)) => Some(PairLeg {
                key: key.clone(),
                role,
            }),
            _ => None,
        };

        let side_label = proposal
            .side
            .map(|s| s.as_str().to_string())
            .unwrap_or_else(|| "order".to_string());
        let title = format!("{} {}", capitalize(&side_label), entity_id);
        let detail = match &proposal.status {
            Some(status) => format!("Proposal {}", status),
            None => "Proposal in flight".to_string(),
        };

        items.push(AttentionItem {
            id: proposal.id.clone(),
            source_type: SourceType::Proposal,
            entity_id,
            portfolio_ids: proposal.portfolio_ids.clone(),
            title,
            detail,
            urgency: PROPOSAL_IN_FLIGHT_URGENCY,
            created_at,
            updated_at: proposal.updated_at.unwrap_or(created_at),
            age_days: age_days(created_at, ctx.now),
            band: None,
            child_leg_ids: Vec::new(),
            dedupe_key: proposal.linked_idea_id.clone(),
            pairing,
        });
    }
    items
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
