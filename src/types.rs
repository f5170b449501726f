//! Canonical view-model types for the attention feed.
//!
//! `AttentionItem` and `FollowupItem` are ephemeral: they are recomputed on
//! every feed build and owned by that build's pass. Nothing here is stored
//! back — in particular `band` is derived fresh each time and never treated
//! as authoritative state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// =============================================================================
// Source taxonomy
// =============================================================================

/// Where an attention item came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceType {
    /// Pending trade idea awaiting a decision.
    Idea,
    /// Analyst rating change on a covered asset.
    RatingChange,
    /// Research document past its review window.
    StaleResearch,
    /// Dated deliverable (memo, model refresh, committee pack).
    Deliverable,
    /// In-flight order proposal, possibly one leg of a pair.
    Proposal,
    /// Derived cross-signal alert, produced by the rule evaluator.
    FollowUp,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::Idea => "idea",
            SourceType::RatingChange => "rating_change",
            SourceType::StaleResearch => "stale_research",
            SourceType::Deliverable => "deliverable",
            SourceType::Proposal => "proposal",
            SourceType::FollowUp => "follow_up",
        }
    }
}

impl std::fmt::Display for SourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// `FeedError::SourceFetch` carries a `SourceType` in a field named `source`,
// which thiserror treats as the error's source and therefore requires to
// implement `std::error::Error`. Display and Debug are already provided above.
impl std::error::Error for SourceType {}

/// Lifecycle stage of a trade idea, used for pipeline stats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IdeaStage {
    Draft,
    Proposed,
    Approved,
    Working,
    Executed,
}

/// Side of a paired proposal leg.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LegRole {
    Buy,
    Sell,
}

impl LegRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            LegRole::Buy => "buy",
            LegRole::Sell => "sell",
        }
    }
}

/// Pairing metadata carried by proposal legs that belong to one transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PairLeg {
    pub key: String,
    pub role: LegRole,
}

// =============================================================================
// Attention items and bands
// =============================================================================

/// Priority tier assigned to an item for display ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Now,
    Soon,
    Aware,
}

impl Band {
    pub fn as_str(&self) -> &'static str {
        match self {
            Band::Now => "now",
            Band::Soon => "soon",
            Band::Aware => "aware",
        }
    }
}

/// One normalized work item in the attention feed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionItem {
    /// Unique within a single feed build.
    pub id: String,
    pub source_type: SourceType,
    /// Asset (or portfolio) the item is about.
    pub entity_id: String,
    /// Owning portfolio context, for scoped filtering.
    #[serde(default)]
    pub portfolio_ids: Vec<String>,
    pub title: String,
    pub detail: String,
    /// Source-supplied urgency classification in [0, 1].
    pub urgency: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Derived at normalization time: now − created_at.
    pub age_days: i64,
    /// Derived per build; never persisted across builds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub band: Option<Band>,
    /// Leg ids folded into this item by a pair merge; empty otherwise.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub child_leg_ids: Vec<String>,
    /// Underlying id shared across sources, for cross-source dedup.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dedupe_key: Option<String>,
    /// Set on proposal legs eligible for pair merging.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pairing: Option<PairLeg>,
}

// =============================================================================
// Follow-ups
// =============================================================================

/// The fixed follow-up rule set. Lower discriminant = higher priority, for
/// both list ordering and primary-insight selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FollowupKind {
    /// A decision happened with no newer research update.
    DecisionResearchGap = 0,
    /// Stated rating direction disagrees with probability-weighted EV.
    RatingEvMismatch = 1,
    /// Large expected value with no active idea to express it.
    HighEvNoIdea = 2,
}

impl FollowupKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FollowupKind::DecisionResearchGap => "decision_research_gap",
            FollowupKind::RatingEvMismatch => "rating_ev_mismatch",
            FollowupKind::HighEvNoIdea => "high_ev_no_idea",
        }
    }

    /// Urgency carried into the feed when the rule fires. The gap and
    /// mismatch rules clear the critical band floor; high-EV does not.
    pub fn base_urgency(&self) -> f64 {
        match self {
            FollowupKind::DecisionResearchGap => 0.90,
            FollowupKind::RatingEvMismatch => 0.85,
            FollowupKind::HighEvNoIdea => 0.65,
        }
    }
}

/// A derived alert computed from cross-signal comparisons for one entity.
/// Exactly one instance per (entity, kind) per build.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowupItem {
    pub kind: FollowupKind,
    pub entity_id: String,
    pub headline: String,
    pub detail: String,
    pub cta_label: String,
    pub cta_action: String,
    /// Derived from the suppression store at read time.
    #[serde(default)]
    pub is_suppressed: bool,
}

/// The single headline the feed leads with.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryInsight {
    pub headline: String,
    /// `None` when the headline is a neutral activity fallback.
    pub kind: Option<FollowupKind>,
}

// =============================================================================
// Entity signals (follow-up evaluator input)
// =============================================================================

/// The most recent decision action recorded for an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionSignal {
    /// Display verb, e.g. "Trimmed", "Added", "Exited".
    pub action: String,
    pub decided_at: DateTime<Utc>,
}

/// Upstream-computed rating/EV inconsistency flag. Headline and detail are
/// supplied by that computation; the evaluator only relays them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingConflict {
    pub headline: String,
    pub detail: String,
}

/// Per-entity signal bundle consumed by the follow-up rules. Missing fields
/// mean the corresponding rule simply does not fire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySignals {
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_decision: Option<DecisionSignal>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_research_update: Option<DateTime<Utc>>,
    /// Probability-weighted expected return, e.g. 0.20 for +20%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_return: Option<f64>,
    #[serde(default)]
    pub active_idea_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_ev_conflict: Option<RatingConflict>,
}

// =============================================================================
// Composed feed
// =============================================================================

/// Pure reduction over the items already assigned to one band.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BandSummary {
    pub band: Band,
    pub count: usize,
    /// Top item ids by (urgency desc, age desc).
    pub highlighted: Vec<String>,
    /// Peak urgency across the band; 0.0 when empty.
    pub aggregate_urgency: f64,
}

/// Idea counts by pipeline stage, computed over the unfiltered raw idea set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStats {
    pub draft: usize,
    pub proposed: usize,
    pub approved: usize,
    pub working: usize,
    pub executed: usize,
    pub total: usize,
}

/// Whether every source contributed to this build.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum FeedStatus {
    Complete,
    Partial { missing: Vec<SourceType> },
}

/// The banded, filtered, sorted view model handed to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttentionFeed {
    pub now: Vec<AttentionItem>,
    pub soon: Vec<AttentionItem>,
    pub aware: Vec<AttentionItem>,
    pub summaries: Vec<BandSummary>,
    pub total_count: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub primary_insight: Option<PrimaryInsight>,
    pub pipeline_stats: PipelineStats,
    #[serde(flatten)]
    pub status: FeedStatus,
}

/// Context filters applied during composition.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedFilters {
    /// Restrict to items owned by one portfolio.
    #[serde(default)]
    pub portfolio: Option<String>,
    /// Keep only items at or above the urgent floor.
    #[serde(default)]
    pub urgent_only: bool,
}

/// Build context passed through the pipeline. Carrying `now` explicitly keeps
/// age computation and suppression expiry deterministic under test.
#[derive(Debug, Clone)]
pub struct FeedContext {
    pub now: DateTime<Utc>,
    pub owner_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn followup_kind_orders_by_priority() {
        assert!(FollowupKind::DecisionResearchGap < FollowupKind::RatingEvMismatch);
        assert!(FollowupKind::RatingEvMismatch < FollowupKind::HighEvNoIdea);
    }

    #[test]
    fn source_type_serializes_snake_case() {
        let json = serde_json::to_string(&SourceType::RatingChange).unwrap();
        assert_eq!(json, "\"rating_change\"");
        let json = serde_json::to_string(&SourceType::FollowUp).unwrap();
        assert_eq!(json, "\"follow_up\"");
    }

    #[test]
    fn feed_status_tags_partial_with_missing_sources() {
        let status = FeedStatus::Partial {
            missing: vec![SourceType::Deliverable],
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "partial");
        assert_eq!(json["missing"][0], "deliverable");
    }
}
