//! Deduplication and pair merging over the normalized item set.
//!
//! Two pure steps: drop cross-source duplicates by precedence, then collapse
//! paired proposal legs into one synthetic item. Both are order-independent:
//! any permutation of the same input set yields the same output, and the
//! result is returned in canonical id order.

use std::collections::HashMap;

use sha2::{Digest, Sha256};

use crate::types::{AttentionItem, LegRole, SourceType};

/// Fixed cross-source precedence, highest first. A proposal outranks the
/// idea it advanced; everything outranks a derived follow-up.
const SOURCE_PRECEDENCE: [SourceType; 6] = [
    SourceType::Proposal,
    SourceType::Idea,
    SourceType::RatingChange,
    SourceType::Deliverable,
    SourceType::StaleResearch,
    SourceType::FollowUp,
];

fn precedence(source: SourceType) -> usize {
    SOURCE_PRECEDENCE
        .iter()
        .position(|s| *s == source)
        .unwrap_or(SOURCE_PRECEDENCE.len())
}

/// Compute a stable fingerprint from key components.
pub fn fingerprint(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part.as_bytes());
        hasher.update(b"|");
    }
    format!("{:x}", hasher.finalize())
}

/// Collapse multi-leg pairs and remove cross-source duplicates.
pub fn merge_and_dedup(items: Vec<AttentionItem>) -> Vec<AttentionItem> {
    let deduped = drop_cross_source_duplicates(items);
    let mut merged = merge_paired_legs(deduped);
    merged.sort_by(|a, b| a.id.cmp(&b.id));
    merged
}

// ---------------------------------------------------------------------------
// Step 1: Cross-source dedup
// ---------------------------------------------------------------------------

/// Items from different sources referencing the same underlying id keep only
/// the highest-precedence one. Ties break on lexicographic id so the result
/// never depends on input order.
fn drop_cross_source_duplicates(items: Vec<AttentionItem>) -> Vec<AttentionItem> {
    let mut keep: HashMap<String, AttentionItem> = HashMap::new();
    let mut unkeyed = Vec::new();

    for item in items {
        let key = match &item.dedupe_key {
            Some(k) => k.clone(),
            None => {
                unkeyed.push(item);
                continue;
            }
        };

        match keep.get(&key) {
            Some(existing) => {
                let challenger = (precedence(item.source_type), item.id.clone());
                let incumbent = (precedence(existing.source_type), existing.id.clone());
                if challenger < incumbent {
                    log::debug!(
                        "dedup: {} supersedes {} for key {}",
                        item.id,
                        existing.id,
                        key
                    );
                    keep.insert(key, item);
                }
            }
            None => {
                keep.insert(key, item);
            }
        }
    }

    unkeyed.extend(keep.into_values());
    unkeyed
}

// ---------------------------------------------------------------------------
// Step 2: Pair merge
// ---------------------------------------------------------------------------

/// Legs sharing a pairing key with complementary buy/sell roles collapse
/// into one synthetic item. A lone leg with no partner passes through as a
/// normal single item.
fn merge_paired_legs(items: Vec<AttentionItem>) -> Vec<AttentionItem> {
    let mut groups: HashMap<String, Vec<AttentionItem>> = HashMap::new();
    let mut singles = Vec::new();

    for item in items {
        match &item.pairing {
            Some(pair) => groups.entry(pair.key.clone()).or_default().push(item),
            None => singles.push(item),
        }
    }

    for (key, mut legs) in groups {
        let has_buy = leg_role_present(&legs, LegRole::Buy);
        let has_sell = leg_role_present(&legs, LegRole::Sell);

        if legs.len() < 2 || !has_buy || !has_sell {
            // No complementary partner — not a mergeable pair.
            singles.extend(legs);
            continue;
        }

        // Canonical leg order so the synthetic item is input-order-independent.
        legs.sort_by(|a, b| a.id.cmp(&b.id));
        singles.push(build_synthetic_pair(&key, &legs));
    }

    singles
}

fn leg_role_present(legs: &[AttentionItem], role: LegRole) -> bool {
    legs.iter()
        .any(|l| l.pairing.as_ref().map(|p| p.role) == Some(role))
}

fn build_synthetic_pair(key: &str, legs: &[AttentionItem]) -> AttentionItem {
    let side_entities = |role: LegRole| -> Vec<String> {
        legs.iter()
            .filter(|l| l.pairing.as_ref().map(|p| p.role) == Some(role))
            .map(|l| l.entity_id.clone())
            .collect()
    };
    let buys = side_entities(LegRole::Buy);
    let sells = side_entities(LegRole::Sell);

    // Callers guarantee at least two legs.
    let first = &legs[0];
    let created_at = legs
        .iter()
        .map(|l| l.created_at)
        .min()
        .unwrap_or(first.created_at);
    let updated_at = legs
        .iter()
        .map(|l| l.updated_at)
        .max()
        .unwrap_or(first.updated_at);
    // Age of the pair is the age of its earliest leg.
    let age_days = legs.iter().map(|l| l.age_days).max().unwrap_or(0);
    let urgency = legs.iter().map(|l| l.urgency).fold(0.0_f64, f64::max);

    let mut portfolio_ids: Vec<String> = legs
        .iter()
        .flat_map(|l| l.portfolio_ids.iter().cloned())
        .collect();
    portfolio_ids.sort();
    portfolio_ids.dedup();

    let mut entity_ids: Vec<String> = legs.iter().map(|l| l.entity_id.clone()).collect();
    entity_ids.sort();

    AttentionItem {
        id: format!("pair-{}", &fingerprint(&[key])[..12]),
        source_type: SourceType::Proposal,
        entity_id: entity_ids[0].clone(),
        portfolio_ids,
        title: format!("Pair: buy {} / sell {}", buys.join("+"), sells.join("+")),
        detail: legs
            .iter()
            .map(|l| l.title.as_str())
            .collect::<Vec<_>>()
            .join("; "),
        urgency,
        created_at,
        updated_at,
        age_days,
        band: None,
        child_leg_ids: legs.iter().map(|l| l.id.clone()).collect(),
        dedupe_key: None,
        pairing: None,
    }
}
