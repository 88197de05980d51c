//! The evaluator — walks the finalized schedule and re-executes tagged
//! operations.

use tracing::{debug, info};
use uuid::Uuid;

use depgraph_graph::Graph;
use depgraph_node::OpContext;

use crate::config::EvalConfig;
use crate::stats::EvalStats;

/// Evaluation misuse.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// The graph was never finalized; there is no schedule to walk.
    #[error("cannot evaluate an unfinalized graph")]
    GraphNotFinalized,
}

/// Walks a finalized graph's schedule, stage by stage in topological order,
/// running the callback of every operation whose needs-update flag is set.
///
/// The evaluator holds no graph state of its own; one evaluator can serve
/// many graphs, and each run is synchronous and run-to-completion.
#[derive(Debug)]
pub struct Evaluator {
    config: EvalConfig,
    instance_id: String,
}

impl Evaluator {
    /// Create a new evaluator.
    #[must_use]
    pub fn new(config: EvalConfig) -> Self {
        let instance_id = Uuid::new_v4().to_string();
        Self {
            config,
            instance_id,
        }
    }

    /// Returns the unique instance id for this evaluator.
    #[must_use]
    pub fn instance_id(&self) -> &str {
        &self.instance_id
    }

    /// Returns the evaluator's label.
    #[must_use]
    pub fn label(&self) -> &str {
        &self.config.label
    }

    /// Evaluate one batch at `frame`.
    ///
    /// 1. Optionally flush tags downstream along relations.
    /// 2. Walk the stages in order; run every tagged operation's callback.
    /// 3. Clear the tag flags of everything that ran.
    /// 4. Reset the graph's update tracker.
    ///
    /// # Errors
    ///
    /// Returns [`EvalError::GraphNotFinalized`] when the graph has no
    /// schedule yet.
    pub fn evaluate(&self, graph: &mut Graph, frame: f64) -> Result<EvalStats, EvalError> {
        if !graph.is_finalized() {
            return Err(EvalError::GraphNotFinalized);
        }

        let flushed = if self.config.flush {
            graph.flush_updates().map_err(|_| EvalError::GraphNotFinalized)?
        } else {
            0
        };

        let mut stats = EvalStats {
            frame,
            operations_total: graph.op_count(),
            operations_flushed: flushed,
            stages: graph.stages().len(),
            ..EvalStats::default()
        };

        info!(
            evaluator = self.config.label,
            instance_id = self.instance_id,
            frame,
            pending = graph.tracker().tagged_count(),
            "evaluation start"
        );

        let stages: Vec<Vec<usize>> = graph
            .stages()
            .iter()
            .map(|stage| stage.ops.clone())
            .collect();

        for (stage_idx, stage_ops) in stages.iter().enumerate() {
            for &idx in stage_ops {
                let addr = graph.schedule()[idx];
                let Some(op) = graph.op_mut(addr) else {
                    continue;
                };
                if !op.needs_update() {
                    stats.operations_skipped += 1;
                    continue;
                }
                let mut ctx = OpContext {
                    frame,
                    entity: addr.entity,
                };
                (op.callback)(&mut ctx);
                op.clear_update_flags();
                stats.operations_evaluated += 1;
                debug!(
                    evaluator = self.config.label,
                    stage = stage_idx,
                    op = %op.key(),
                    "operation evaluated"
                );
            }
        }

        graph.tracker_mut().reset();

        info!(
            evaluator = self.config.label,
            frame,
            evaluated = stats.operations_evaluated,
            skipped = stats.operations_skipped,
            flushed = stats.operations_flushed,
            "evaluation complete"
        );
        Ok(stats)
    }
}
