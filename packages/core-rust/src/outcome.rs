use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::FlushBatch;

/// Why a drained batch could not be persisted.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
pub enum PersistError {
    /// The sink returned an error.
    #[error("sink error: {0}")]
    Sink(String),
    /// The sink did not finish within the persist timeout.
    #[error("persist timed out after {timeout_ms} ms")]
    Timeout { timeout_ms: u64 },
}

/// Result of one drain-and-persist cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlushOutcome {
    /// The batch was applied by the sink.
    Flushed { posts: usize, views: u64 },
    /// Nothing was pending; the sink was not called.
    Empty,
    /// The sink failed. The drained batch is handed back so the caller can
    /// decide whether to re-queue it; otherwise it is lost.
    PersistFailed {
        batch: FlushBatch,
        error: PersistError,
    },
}

impl FlushOutcome {
    /// Metric label / status string for this outcome.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flushed { .. } => "flushed",
            Self::Empty => "empty",
            Self::PersistFailed { .. } => "persist_failed",
        }
    }

    #[must_use]
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::PersistFailed { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PostId;

    #[test]
    fn status_strings() {
        assert_eq!(FlushOutcome::Empty.as_str(), "empty");
        assert_eq!(
            FlushOutcome::Flushed { posts: 1, views: 3 }.as_str(),
            "flushed"
        );

        let failed = FlushOutcome::PersistFailed {
            batch: FlushBatch::from_counts([(PostId::new("abc").unwrap(), 2)]),
            error: PersistError::Timeout { timeout_ms: 50 },
        };
        assert_eq!(failed.as_str(), "persist_failed");
        assert!(failed.is_failure());
        assert!(!FlushOutcome::Empty.is_failure());
    }

    #[test]
    fn persist_error_messages() {
        assert_eq!(
            PersistError::Timeout { timeout_ms: 50 }.to_string(),
            "persist timed out after 50 ms"
        );
        assert_eq!(
            PersistError::Sink("db down".to_string()).to_string(),
            "sink error: db down"
        );
    }
}
