//! Time-boxed suppression ("snooze") state.
//!
//! Two independent mechanisms share one record shape but never one key:
//! an arbitrary-duration per-item snooze (session scope) and a fixed
//! 24-hour per-(entity, follow-up-type) mute (durable scope). Expiry is
//! lazy — a record whose window has passed is treated as absent by the read
//! path; physical deletion is an optional optimization.

use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

use crate::error::FeedError;
use crate::types::FollowupKind;

/// Follow-up mutes always run this long.
pub const FOLLOWUP_MUTE_HOURS: i64 = 24;

/// What a suppression record targets.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum SuppressTarget {
    Item(String),
    Followup(FollowupKind),
}

/// Which mechanism a record belongs to. Distinct scopes keep the two
/// mechanisms from ever shadowing each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewScope {
    /// Per-item snoozes, local to the session.
    Session,
    /// Per-follow-up-type mutes, durable across sessions.
    Durable,
}

/// Full scope key for one suppression record.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ScopeKey {
    pub owner_id: String,
    pub entity_id: String,
    pub target: SuppressTarget,
    pub view_scope: ViewScope,
}

impl ScopeKey {
    pub fn item(owner_id: &str, entity_id: &str, item_id: &str) -> Self {
        ScopeKey {
            owner_id: owner_id.to_string(),
            entity_id: entity_id.to_string(),
            target: SuppressTarget::Item(item_id.to_string()),
            view_scope: ViewScope::Session,
        }
    }

    pub fn followup(owner_id: &str, entity_id: &str, kind: FollowupKind) -> Self {
        ScopeKey {
            owner_id: owner_id.to_string(),
            entity_id: entity_id.to_string(),
            target: SuppressTarget::Followup(kind),
            view_scope: ViewScope::Durable,
        }
    }
}

/// Storage seam for suppression records. The engine only ever needs point
/// reads and last-write-wins upserts; no cross-key transaction.
pub trait SuppressionStore: Send + Sync {
    fn get(&self, key: &ScopeKey) -> Option<DateTime<Utc>>;
    fn upsert(&self, key: ScopeKey, until: DateTime<Utc>) -> Result<(), FeedError>;
}

/// True iff a live record covers `now`. Expired records read as absent.
pub fn is_suppressed(store: &dyn SuppressionStore, key: &ScopeKey, now: DateTime<Utc>) -> bool {
    match store.get(key) {
        Some(until) => until > now,
        None => false,
    }
}

/// Snooze one item for an arbitrary number of hours. Idempotent upsert:
/// repeated calls move the window, they never duplicate the record.
pub fn snooze_item(
    store: &dyn SuppressionStore,
    owner_id: &str,
    entity_id: &str,
    item_id: &str,
    hours: i64,
    now: DateTime<Utc>,
) -> Result<(), FeedError> {
    if hours <= 0 {
        return Err(FeedError::InvalidSnoozeDuration(hours));
    }
    let key = ScopeKey::item(owner_id, entity_id, item_id);
    store.upsert(key, now + Duration::hours(hours))
}

/// Mute one follow-up type on one entity for the fixed 24-hour window.
pub fn mute_followup(
    store: &dyn SuppressionStore,
    owner_id: &str,
    entity_id: &str,
    kind: FollowupKind,
    now: DateTime<Utc>,
) -> Result<(), FeedError> {
    let key = ScopeKey::followup(owner_id, entity_id, kind);
    store.upsert(key, now + Duration::hours(FOLLOWUP_MUTE_HOURS))
}

/// In-memory store backing both scopes. `DashMap` gives last-write-wins
/// upserts under concurrent writers to the same key without a partially
/// written or duplicated record.
#[derive(Default)]
pub struct MemorySuppressionStore {
    records: DashMap<ScopeKey, DateTime<Utc>>,
}

impl MemorySuppressionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop records whose window has passed. Purely an optimization — the
    /// read path already ignores them.
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let before = self.records.len();
        self.records.retain(|_, until| *until > now);
        before - self.records.len()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl SuppressionStore for MemorySuppressionStore {
    fn get(&self, key: &ScopeKey) -> Option<DateTime<Utc>> {
        self.records.get(key).map(|entry| *entry.value())
    }

    fn upsert(&self, key: ScopeKey, until: DateTime<Utc>) -> Result<(), FeedError> {
        self.records.insert(key, until);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::sync::Arc;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 15, 12, 0, 0).unwrap()
    }

    #[test]
    fn snoozed_item_hidden_inside_window_visible_after() {
        let store = MemorySuppressionStore::new();
        let now = t0();
        snooze_item(&store, "pm-1", "acme", "idea-1", 4, now).unwrap();

        let key = ScopeKey::item("pm-1", "acme", "idea-1");
        assert!(is_suppressed(&store, &key, now + Duration::minutes(1)));
        assert!(is_suppressed(&store, &key, now + Duration::hours(3)));
        // Boundary: at exactly T+H the record is inert.
        assert!(!is_suppressed(&store, &key, now + Duration::hours(4)));
        assert!(!is_suppressed(&store, &key, now + Duration::hours(5)));
    }

    #[test]
    fn zero_or_negative_duration_is_rejected() {
        let store = MemorySuppressionStore::new();
        assert!(snooze_item(&store, "pm-1", "acme", "idea-1", 0, t0()).is_err());
        assert!(snooze_item(&store, "pm-1", "acme", "idea-1", -2, t0()).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn re_snooze_moves_the_window_without_duplicating() {
        let store = MemorySuppressionStore::new();
        let now = t0();
        snooze_item(&store, "pm-1", "acme", "idea-1", 2, now).unwrap();
        snooze_item(&store, "pm-1", "acme", "idea-1", 8, now).unwrap();

        assert_eq!(store.len(), 1);
        let key = ScopeKey::item("pm-1", "acme", "idea-1");
        assert!(is_suppressed(&store, &key, now + Duration::hours(5)));
    }

    #[test]
    fn followup_mute_runs_exactly_twenty_four_hours() {
        let store = MemorySuppressionStore::new();
        let now = t0();
        mute_followup(&store, "pm-1", "acme", FollowupKind::HighEvNoIdea, now).unwrap();

        let key = ScopeKey::followup("pm-1", "acme", FollowupKind::HighEvNoIdea);
        assert!(is_suppressed(&store, &key, now + Duration::hours(23)));
        assert!(!is_suppressed(&store, &key, now + Duration::hours(24)));
    }

    #[test]
    fn item_and_followup_scopes_never_conflate() {
        let store = MemorySuppressionStore::new();
        let now = t0();
        mute_followup(&store, "pm-1", "acme", FollowupKind::DecisionResearchGap, now).unwrap();

        // Muting the follow-up type does not hide any raw item...
        let item_key = ScopeKey::item("pm-1", "acme", "idea-1");
        assert!(!is_suppressed(&store, &item_key, now + Duration::hours(1)));

        // ...and snoozing an item does not hide the follow-up type.
        let store2 = MemorySuppressionStore::new();
        snooze_item(&store2, "pm-1", "acme", "idea-1", 48, now).unwrap();
        let fu_key = ScopeKey::followup("pm-1", "acme", FollowupKind::DecisionResearchGap);
        assert!(!is_suppressed(&store2, &fu_key, now + Duration::hours(1)));
    }

    #[test]
    fn purge_drops_only_expired_records() {
        let store = MemorySuppressionStore::new();
        let now = t0();
        snooze_item(&store, "pm-1", "acme", "idea-1", 1, now).unwrap();
        snooze_item(&store, "pm-1", "acme", "idea-2", 10, now).unwrap();

        let purged = store.purge_expired(now + Duration::hours(2));
        assert_eq!(purged, 1);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn concurrent_writers_to_one_key_converge_to_a_single_record() {
        let store = Arc::new(MemorySuppressionStore::new());
        let now = t0();

        let mut handles = Vec::new();
        for hours in 1..=16_i64 {
            let store = Arc::clone(&store);
            handles.push(std::thread::spawn(move || {
                snooze_item(store.as_ref(), "pm-1", "acme", "idea-1", hours, now)
            }));
        }
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        // Exactly one record survives, holding one of the written windows.
        assert_eq!(store.len(), 1);
        let until = store
            .get(&ScopeKey::item("pm-1", "acme", "idea-1"))
            .expect("record");
        assert!(until > now && until <= now + Duration::hours(16));
    }
}
