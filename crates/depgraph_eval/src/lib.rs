//! # depgraph_eval
//!
//! Evaluation runtime for the dependency-graph core.
//!
//! An [`Evaluator`] walks a finalized graph's schedule stage by stage,
//! re-executes every operation whose needs-update flag is set, clears the
//! flags, and reports an [`EvalStats`] summary.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use depgraph_eval::{EvalConfig, Evaluator};
//! use depgraph_graph::Graph;
//! use depgraph_node::ComponentTypeRegistry;
//!
//! let mut graph = Graph::new(ComponentTypeRegistry::builtin());
//! // ... build entities, components, operations, relations ...
//! graph.finalize_build().unwrap();
//!
//! let evaluator = Evaluator::new(EvalConfig::new("viewport"));
//! let stats = evaluator.evaluate(&mut graph, 1.0).unwrap();
//! println!("evaluated {} operations", stats.operations_evaluated);
//! ```

pub mod config;
pub mod runner;
pub mod stats;

pub use config::EvalConfig;
pub use runner::{EvalError, Evaluator};
pub use stats::EvalStats;
