//! # depgraph_graph
//!
//! Graph layer of the dependency-graph evaluation core.
//!
//! This crate provides:
//!
//! - [`EntityNode`] — per-entity ownership of component nodes.
//! - [`Relation`] / [`OpRef`] — symbolic dependency edges between
//!   operations, resolved at finalize.
//! - [`scheduler`] — wavefront stage computation over resolved edges.
//! - [`Graph`] — the whole thing: build, finalize, tag, flush.

pub mod entity;
pub mod graph;
pub mod relation;
pub mod scheduler;

pub use entity::{ComponentKey, EntityNode};
pub use graph::{Graph, GraphError};
pub use relation::{OpAddress, OpRef, Relation};
pub use scheduler::{Stage, compute_stages, topological_order};
