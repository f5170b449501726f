//! Raw per-source record shapes.
//!
//! Sources hand the engine already-fetched arrays of these records; storage
//! and query execution live behind the adapter seam in `fetch`. Fields a
//! source can legitimately omit are `Option` so the normalizer can skip a
//! bad record individually instead of aborting the batch.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{IdeaStage, LegRole, SourceType};

/// A pending trade idea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawIdea {
    pub id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub portfolio_ids: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub stage: Option<IdeaStage>,
    /// Probability-weighted expected return, e.g. 0.20 for +20%.
    #[serde(default)]
    pub expected_return: Option<f64>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An analyst rating change on a covered asset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawRatingChange {
    pub id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub portfolio_ids: Vec<String>,
    #[serde(default)]
    pub old_rating: Option<String>,
    #[serde(default)]
    pub new_rating: Option<String>,
    /// Upstream-computed flag: rating direction disagrees with EV direction.
    #[serde(default)]
    pub ev_conflict: bool,
    #[serde(default)]
    pub conflict_note: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A research document past its review window.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawResearchDoc {
    pub id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub portfolio_ids: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub last_reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// A dated deliverable: memo, model refresh, committee pack.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawDeliverable {
    pub id: String,
    /// Deliverables may be desk-level rather than tied to one asset.
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub portfolio_ids: Vec<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub due_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An in-flight order proposal, possibly one leg of a paired transaction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawProposal {
    pub id: String,
    #[serde(default)]
    pub entity_id: Option<String>,
    #[serde(default)]
    pub portfolio_ids: Vec<String>,
    #[serde(default)]
    pub side: Option<LegRole>,
    /// Shared key linking the legs of one paired transaction.
    #[serde(default)]
    pub pair_key: Option<String>,
    /// The idea this proposal advances, if any. Drives cross-source dedup:
    /// a proposal outranks the idea it came from.
    #[serde(default)]
    pub linked_idea_id: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// One fetched batch from a single source.
#[derive(Debug, Clone, PartialEq)]
pub enum SourceBatch {
    Ideas(Vec<RawIdea>),
    RatingChanges(Vec<RawRatingChange>),
    StaleResearch(Vec<RawResearchDoc>),
    Deliverables(Vec<RawDeliverable>),
    Proposals(Vec<RawProposal>),
}

impl SourceBatch {
    pub fn source_type(&self) -> SourceType {
        match self {
            SourceBatch::Ideas(_) => SourceType::Idea,
            SourceBatch::RatingChanges(_) => SourceType::RatingChange,
            SourceBatch::StaleResearch(_) => SourceType::StaleResearch,
            SourceBatch::Deliverables(_) => SourceType::Deliverable,
            SourceBatch::Proposals(_) => SourceType::Proposal,
        }
    }
}

/// Everything the composer consumes for one build. A source that failed to
/// fetch degrades to an empty list here and is named in `missing_sources`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourceRecords {
    pub ideas: Vec<RawIdea>,
    pub rating_changes: Vec<RawRatingChange>,
    pub stale_research: Vec<RawResearchDoc>,
    pub deliverables: Vec<RawDeliverable>,
    pub proposals: Vec<RawProposal>,
    pub missing_sources: Vec<SourceType>,
}

impl SourceRecords {
    /// Fold a fetched batch into the container.
    pub fn absorb(&mut self, batch: SourceBatch) {
        match batch {
            SourceBatch::Ideas(v) => self.ideas.extend(v),
            SourceBatch::RatingChanges(v) => self.rating_changes.extend(v),
            SourceBatch::StaleResearch(v) => self.stale_research.extend(v),
            SourceBatch::Deliverables(v) => self.deliverables.extend(v),
            SourceBatch::Proposals(v) => self.proposals.extend(v),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn absorb_routes_batches_to_the_right_list() {
        let mut records = SourceRecords::default();
        records.absorb(SourceBatch::Ideas(vec![RawIdea {
            id: "idea-1".to_string(),
            entity_id: Some("acme".to_string()),
            portfolio_ids: vec![],
            title: None,
            stage: Some(IdeaStage::Draft),
            expected_return: None,
            created_at: None,
            updated_at: None,
        }]));
        records.absorb(SourceBatch::Deliverables(Vec::new()));

        assert_eq!(records.ideas.len(), 1);
        assert!(records.deliverables.is_empty());
        assert!(records.missing_sources.is_empty());
    }

    #[test]
    fn raw_records_tolerate_sparse_json() {
        let idea: RawIdea = serde_json::from_str(r#"{"id": "idea-9"}"#).unwrap();
        assert_eq!(idea.id, "idea-9");
        assert!(idea.entity_id.is_none());
        assert!(idea.stage.is_none());

        let proposal: RawProposal =
            serde_json::from_str(r#"{"id": "ord-1", "side": "buy"}"#).unwrap();
        assert_eq!(proposal.side, Some(LegRole::Buy));
        assert!(proposal.pair_key.is_none());
    }
}
