//! Feed composition.
//!
//! `compose_feed` is the pure pipeline: normalize → merge/dedup → evaluate
//! follow-ups → filter → drop suppressed → band → sort → summarize. It does
//! no I/O, holds no locks, and yields identical output for identical input
//! regardless of thread or call order. `FeedEngine` wraps it with the
//! mutable edges: suppression writes, completion delegation, and
//! discard-on-supersede publishing.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::RwLock;

use crate::bands::{assign_band, compute_band_summary};
use crate::dedupe::merge_and_dedup;
use crate::error::FeedError;
use crate::followups::evaluate_followups;
use crate::latency;
use crate::normalize::normalize;
use crate::records::SourceRecords;
use crate::suppress::{
    is_suppressed, mute_followup, snooze_item, ScopeKey, SuppressionStore,
};
use crate::types::{
    AttentionFeed, AttentionItem, Band, EntitySignals, FeedContext, FeedFilters, FeedStatus,
    FollowupItem, FollowupKind, PipelineStats, PrimaryInsight, SourceType,
};

/// p95 budget for one full composition pass.
const COMPOSE_LATENCY_BUDGET_MS: u128 = 50;

/// Floor for the "urgent only" context filter.
pub const URGENT_FILTER_FLOOR: f64 = 0.7;

// ---------------------------------------------------------------------------
// Entity context resolution
// ---------------------------------------------------------------------------

/// Resolves which portfolios own an entity, for scoped filtering of items
/// (like follow-ups) that don't carry portfolio ids of their own.
pub trait EntityContextResolver: Send + Sync {
    fn portfolios_for(&self, entity_id: &str) -> Vec<String>;
}

/// Map-backed resolver for callers that already hold the entity→portfolio
/// assignment.
#[derive(Default)]
pub struct StaticEntityContext {
    map: HashMap<String, Vec<String>>,
}

impl StaticEntityContext {
    pub fn new(map: HashMap<String, Vec<String>>) -> Self {
        StaticEntityContext { map }
    }
}

impl EntityContextResolver for StaticEntityContext {
    fn portfolios_for(&self, entity_id: &str) -> Vec<String> {
        self.map.get(entity_id).cloned().unwrap_or_default()
    }
}

/// External mutation for "mark done". The engine only delegates; completing
/// an item is not feed state.
pub trait DoneSink: Send + Sync {
    fn mark_done(&self, id: &str) -> Result<(), FeedError>;
}

// ---------------------------------------------------------------------------
// Pure composition
// ---------------------------------------------------------------------------

/// Build the banded, filtered, sorted view model for one pass.
#[allow(clippy::too_many_arguments)]
pub fn compose_feed(
    records: &SourceRecords,
    entity_signals: &[EntitySignals],
    filters: &FeedFilters,
    resolver: &dyn EntityContextResolver,
    item_snoozes: &dyn SuppressionStore,
    followup_mutes: &dyn SuppressionStore,
    ctx: &FeedContext,
) -> AttentionFeed {
    let started = Instant::now();

    let items = normalize(records, ctx);
    let mut all = merge_and_dedup(items);

    // Follow-ups per distinct entity, suppression marked at read time.
    let followups = evaluate_entity_followups(entity_signals, followup_mutes, ctx);
    let primary_insight = select_feed_primary(&followups, entity_signals);
    all.extend(
        followups
            .iter()
            .filter(|f| !f.is_suppressed)
            .map(|f| followup_to_item(f, resolver, ctx)),
    );

    // Context filters.
    if let Some(portfolio) = &filters.portfolio {
        all.retain(|i| {
            i.portfolio_ids.iter().any(|p| p == portfolio)
                || resolver
                    .portfolios_for(&i.entity_id)
                    .iter()
                    .any(|p| p == portfolio)
        });
    }
    if filters.urgent_only {
        all.retain(|i| i.urgency >= URGENT_FILTER_FLOOR);
    }

    // Drop snoozed items.
    all.retain(|i| {
        !is_suppressed(
            item_snoozes,
            &ScopeKey::item(&ctx.owner_id, &i.entity_id, &i.id),
            ctx.now,
        )
    });

    // Band, partition, sort.
    let mut now_band = Vec::new();
    let mut soon_band = Vec::new();
    let mut aware_band = Vec::new();
    for mut item in all {
        let band = assign_band(&item);
        item.band = Some(band);
        match band {
            Band::Now => now_band.push(item),
            Band::Soon => soon_band.push(item),
            Band::Aware => aware_band.push(item),
        }
    }
    sort_within_band(&mut now_band);
    sort_within_band(&mut soon_band);
    sort_within_band(&mut aware_band);

    let summaries = vec![
        compute_band_summary(Band::Now, &now_band),
        compute_band_summary(Band::Soon, &soon_band),
        compute_band_summary(Band::Aware, &aware_band),
    ];
    let total_count = now_band.len() + soon_band.len() + aware_band.len();

    // Stage counts are not band-dependent: always over the unfiltered raw set.
    let pipeline_stats = compute_pipeline_stats(records);

    let status = if records.missing_sources.is_empty() {
        FeedStatus::Complete
    } else {
        latency::increment_degraded("compose_feed");
        FeedStatus::Partial {
            missing: records.missing_sources.clone(),
        }
    };

    let elapsed_ms = started.elapsed().as_millis();
    latency::record_latency("compose_feed", elapsed_ms, COMPOSE_LATENCY_BUDGET_MS);
    if elapsed_ms > COMPOSE_LATENCY_BUDGET_MS {
        log::warn!(
            "compose_feed exceeded latency budget: {}ms > {}ms ({} items)",
            elapsed_ms,
            COMPOSE_LATENCY_BUDGET_MS,
            total_count
        );
    } else {
        log::debug!("compose_feed completed in {}ms ({} items)", elapsed_ms, total_count);
    }

    AttentionFeed {
        now: now_band,
        soon: soon_band,
        aware: aware_band,
        summaries,
        total_count,
        primary_insight,
        pipeline_stats,
        status,
    }
}

/// Evaluate the rule set per distinct entity, in entity order, and mark
/// suppression from the durable mute store.
fn evaluate_entity_followups(
    entity_signals: &[EntitySignals],
    followup_mutes: &dyn SuppressionStore,
    ctx: &FeedContext,
) -> Vec<FollowupItem> {
    let mut seen = Vec::new();
    let mut followups = Vec::new();

    let mut ordered: Vec<&EntitySignals> = entity_signals.iter().collect();
    ordered.sort_by(|a, b| a.entity_id.cmp(&b.entity_id));

    for signals in ordered {
        if seen.contains(&signals.entity_id) {
            continue;
        }
        seen.push(signals.entity_id.clone());

        let mut items = evaluate_followups(signals, ctx);
        for item in &mut items {
            item.is_suppressed = is_suppressed(
                followup_mutes,
                &ScopeKey::followup(&ctx.owner_id, &item.entity_id, item.kind),
                ctx.now,
            );
        }
        followups.extend(items);
    }
    followups
}

/// Feed-level primary insight: highest-priority non-suppressed follow-up
/// across all entities, else a neutral activity summary, else nothing.
fn select_feed_primary(
    followups: &[FollowupItem],
    entity_signals: &[EntitySignals],
) -> Option<PrimaryInsight> {
    let mut candidates: Vec<&FollowupItem> =
        followups.iter().filter(|f| !f.is_suppressed).collect();
    candidates.sort_by(|a, b| a.kind.cmp(&b.kind).then(a.entity_id.cmp(&b.entity_id)));

    if let Some(first) = candidates.first() {
        return Some(PrimaryInsight {
            headline: first.headline.clone(),
            kind: Some(first.kind),
        });
    }

    let active: usize = entity_signals.iter().map(|s| s.active_idea_count).sum();
    if active > 0 {
        return Some(PrimaryInsight {
            headline: format!("{} active idea{}", active, if active == 1 { "" } else { "s" }),
            kind: None,
        });
    }
    None
}

fn followup_to_item(
    followup: &FollowupItem,
    resolver: &dyn EntityContextResolver,
    ctx: &FeedContext,
) -> AttentionItem {
    AttentionItem {
        id: format!("fu-{}-{}", followup.entity_id, followup.kind.as_str()),
        source_type: SourceType::FollowUp,
        entity_id: followup.entity_id.clone(),
        portfolio_ids: resolver.portfolios_for(&followup.entity_id),
        title: followup.headline.clone(),
        detail: followup.detail.clone(),
        urgency: followup.kind.base_urgency(),
        created_at: ctx.now,
        updated_at: ctx.now,
        age_days: 0,
        band: None,
        child_leg_ids: Vec::new(),
        dedupe_key: None,
        pairing: None,
    }
}

/// Urgency descending, then age descending, then id for a stable total order.
fn sort_within_band(items: &mut [AttentionItem]) {
    items.sort_by(|a, b| {
        b.urgency
            .partial_cmp(&a.urgency)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(b.age_days.cmp(&a.age_days))
            .then(a.id.cmp(&b.id))
    });
}

/// Idea counts by stage over the unfiltered raw idea set. Ideas missing a
/// stage are uncountable and skipped.
pub fn compute_pipeline_stats(records: &SourceRecords) -> PipelineStats {
    let mut stats = PipelineStats::default();
    for idea in &records.ideas {
        let stage = match idea.stage {
            Some(s) => s,
            None => continue,
        };
        match stage {
            crate::types::IdeaStage::Draft => stats.draft += 1,
            crate::types::IdeaStage::Proposed => stats.proposed += 1,
            crate::types::IdeaStage::Approved => stats.approved += 1,
            crate::types::IdeaStage::Working => stats.working += 1,
            crate::types::IdeaStage::Executed => stats.executed += 1,
        }
        stats.total += 1;
    }
    stats
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

/// Ticket for one build attempt. A build superseded by a newer trigger
/// fails to publish and its result is discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildTicket {
    generation: u64,
}

/// Stateful shell around the pure composer: suppression writes, completion
/// delegation, and the currently published feed.
pub struct FeedEngine {
    owner_id: String,
    item_snoozes: Arc<dyn SuppressionStore>,
    followup_mutes: Arc<dyn SuppressionStore>,
    resolver: Arc<dyn EntityContextResolver>,
    done_sink: Option<Arc<dyn DoneSink>>,
    generation: AtomicU64,
    published: RwLock<Option<(u64, AttentionFeed)>>,
}

impl FeedEngine {
    pub fn new(
        owner_id: &str,
        item_snoozes: Arc<dyn SuppressionStore>,
        followup_mutes: Arc<dyn SuppressionStore>,
        resolver: Arc<dyn EntityContextResolver>,
    ) -> Self {
        FeedEngine {
            owner_id: owner_id.to_string(),
            item_snoozes,
            followup_mutes,
            resolver,
            done_sink: None,
            generation: AtomicU64::new(0),
            published: RwLock::new(None),
        }
    }

    pub fn with_done_sink(mut self, sink: Arc<dyn DoneSink>) -> Self {
        self.done_sink = Some(sink);
        self
    }

    /// Start a build. Any earlier outstanding ticket is superseded.
    pub fn begin_build(&self) -> BuildTicket {
        BuildTicket {
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }
    }

    /// Run the pure composer against the engine's stores.
    pub fn compose(
        &self,
        records: &SourceRecords,
        entity_signals: &[EntitySignals],
        filters: &FeedFilters,
        now: chrono::DateTime<chrono::Utc>,
    ) -> AttentionFeed {
        let ctx = FeedContext {
            now,
            owner_id: self.owner_id.clone(),
        };
        compose_feed(
            records,
            entity_signals,
            filters,
            self.resolver.as_ref(),
            self.item_snoozes.as_ref(),
            self.followup_mutes.as_ref(),
            &ctx,
        )
    }

    /// Install a finished build — unless a newer trigger superseded it, in
    /// which case the result is discarded, never merged into newer state.
    pub fn publish(&self, ticket: BuildTicket, feed: AttentionFeed) -> bool {
        if ticket.generation != self.generation.load(Ordering::SeqCst) {
            log::debug!(
                "discarding superseded feed build (gen {})",
                ticket.generation
            );
            return false;
        }
        *self.published.write() = Some((ticket.generation, feed));
        log::info!("published feed build gen {}", ticket.generation);
        true
    }

    pub fn latest(&self) -> Option<AttentionFeed> {
        self.published.read().as_ref().map(|(_, feed)| feed.clone())
    }

    /// Snooze one item for `hours`. On `Err` the snooze is not-yet-applied;
    /// the caller may retry.
    pub fn snooze(
        &self,
        entity_id: &str,
        item_id: &str,
        hours: i64,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), FeedError> {
        snooze_item(
            self.item_snoozes.as_ref(),
            &self.owner_id,
            entity_id,
            item_id,
            hours,
            now,
        )
    }

    /// Mute one follow-up type on one entity for the fixed 24h window.
    pub fn mute_followup(
        &self,
        entity_id: &str,
        kind: FollowupKind,
        now: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), FeedError> {
        mute_followup(
            self.followup_mutes.as_ref(),
            &self.owner_id,
            entity_id,
            kind,
            now,
        )
    }

    /// Delegate completion to the external mutation.
    pub fn mark_done(&self, id: &str) -> Result<(), FeedError> {
        match &self.done_sink {
            Some(sink) => sink.mark_done(id),
            None => Err(FeedError::NoCompletionDelegate),
        }
    }
}
