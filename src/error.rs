//! Error types for feed composition.
//!
//! Errors are classified by recoverability:
//! - Retryable: suppression write failures, source fetch failures
//! - NonRetryable: bad caller input, missing delegates

use thiserror::Error;

use crate::types::SourceType;

/// Error types surfaced by the attention feed engine.
#[derive(Debug, Error)]
pub enum FeedError {
    // Retryable errors
    #[error("Suppression write failed: {0}")]
    SuppressionWrite(String),

    #[error("Source fetch failed for {source}: {message}")]
    SourceFetch {
        source: SourceType,
        message: String,
    },

    // Non-retryable errors
    #[error("Invalid snooze duration: {0}h")]
    InvalidSnoozeDuration(i64),

    #[error("Completion delegate failed for {id}: {message}")]
    MarkDone { id: String, message: String },

    #[error("No completion delegate configured")]
    NoCompletionDelegate,
}

impl FeedError {
    /// Returns true if the caller may retry the operation as-is.
    ///
    /// A failed suppression write means the snooze is not-yet-applied; the
    /// feed must not assume it succeeded until a retry confirms it.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            FeedError::SuppressionWrite(_) | FeedError::SourceFetch { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn suppression_write_is_retryable() {
        let err = FeedError::SuppressionWrite("store offline".to_string());
        assert!(err.is_retryable());
    }

    #[test]
    fn invalid_duration_is_not_retryable() {
        assert!(!FeedError::InvalidSnoozeDuration(0).is_retryable());
        assert!(!FeedError::NoCompletionDelegate.is_retryable());
    }

    #[test]
    fn source_fetch_message_names_the_source() {
        let err = FeedError::SourceFetch {
            source: SourceType::Proposal,
            message: "timeout".to_string(),
        };
        assert!(err.to_string().contains("proposal"));
    }
}
