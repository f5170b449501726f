//! Vigil — unified attention and decision prioritization engine.
//!
//! Ingests heterogeneous work-item signals about tracked entities (pending
//! ideas, rating changes, stale research, deliverables, proposals),
//! normalizes them into one canonical shape, merges paired legs and
//! cross-source duplicates, evaluates derived follow-up alerts, assigns
//! priority bands, and applies time-boxed suppression. A pure in-process
//! composition layer: no storage, no wire format, no UI.

pub mod bands;
pub mod cache;
pub mod dedupe;
mod error;
pub mod feed;
pub mod fetch;
pub mod followups;
mod latency;
pub mod normalize;
pub mod records;
pub mod suppress;
pub mod types;

pub use error::FeedError;
pub use feed::{compose_feed, DoneSink, EntityContextResolver, FeedEngine, StaticEntityContext};
pub use latency::{get_rollups, OpLatencyRollup};
pub use suppress::{MemorySuppressionStore, SuppressionStore};
