//! Update tagging — change sources and per-batch bookkeeping.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Where a change notification came from.
///
/// Sources feed diagnostics and heuristics only; they never alter which
/// operations get re-evaluated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum UpdateSource {
    /// The evaluated frame/time moved.
    TimeChange,
    /// A user edited the underlying data.
    UserEdit,
    /// Propagated downstream along a relation.
    Relations,
    /// Visibility of an entity changed.
    Visibility,
}

impl std::fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::TimeChange => "time_change",
            Self::UserEdit => "user_edit",
            Self::Relations => "relations",
            Self::Visibility => "visibility",
        };
        f.write_str(name)
    }
}

/// Records tagging activity between evaluations.
///
/// One tracker lives in each graph. Every operation tag is recorded here so
/// the scheduler can tell whether anything is pending and logs can report
/// which sources drove an update batch.
#[derive(Debug, Default)]
pub struct UpdateTracker {
    tagged_operations: u64,
    by_source: HashMap<UpdateSource, u64>,
}

impl UpdateTracker {
    /// Create an empty tracker.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one operation tag from the given source.
    pub fn record(&mut self, source: UpdateSource) {
        self.tagged_operations += 1;
        *self.by_source.entry(source).or_insert(0) += 1;
    }

    /// Total operation tags recorded since the last reset.
    #[must_use]
    pub fn tagged_count(&self) -> u64 {
        self.tagged_operations
    }

    /// Operation tags recorded for one source since the last reset.
    #[must_use]
    pub fn count_for(&self, source: UpdateSource) -> u64 {
        self.by_source.get(&source).copied().unwrap_or(0)
    }

    /// Returns `true` if any tagging happened since the last reset.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        self.tagged_operations > 0
    }

    /// Clear all counts. Called after each evaluation batch.
    pub fn reset(&mut self) {
        self.tagged_operations = 0;
        self.by_source.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_and_count() {
        let mut tracker = UpdateTracker::new();
        assert!(!tracker.has_pending());

        tracker.record(UpdateSource::UserEdit);
        tracker.record(UpdateSource::UserEdit);
        tracker.record(UpdateSource::TimeChange);

        assert!(tracker.has_pending());
        assert_eq!(tracker.tagged_count(), 3);
        assert_eq!(tracker.count_for(UpdateSource::UserEdit), 2);
        assert_eq!(tracker.count_for(UpdateSource::TimeChange), 1);
        assert_eq!(tracker.count_for(UpdateSource::Relations), 0);
    }

    #[test]
    fn test_reset_clears_counts() {
        let mut tracker = UpdateTracker::new();
        tracker.record(UpdateSource::Visibility);
        tracker.reset();
        assert!(!tracker.has_pending());
        assert_eq!(tracker.tagged_count(), 0);
        assert_eq!(tracker.count_for(UpdateSource::Visibility), 0);
    }
}
