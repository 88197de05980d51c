//! Per-batch evaluation statistics.

use serde::{Deserialize, Serialize};

/// Summary of one evaluation batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EvalStats {
    /// The frame that was evaluated.
    pub frame: f64,
    /// Operations in the schedule.
    pub operations_total: usize,
    /// Operations whose callback ran because they were tagged.
    pub operations_evaluated: usize,
    /// Operations skipped because they were clean.
    pub operations_skipped: usize,
    /// Operations tagged by flush propagation before the walk.
    pub operations_flushed: usize,
    /// Wavefront stages walked.
    pub stages: usize,
}
