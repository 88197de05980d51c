//! # depgraph_node
//!
//! Node primitives for the dependency-graph evaluation core — the layer
//! that decides what recomputation is necessary when scene data changes.
//!
//! This crate provides:
//!
//! - [`OperationKey`] / [`OperationCode`] — identity of one evaluation step.
//! - [`OperationNode`] — the smallest schedulable unit: a callback plus a
//!   dirty-flag bitset.
//! - [`ComponentNode`] — per-subsystem container of operations, with the
//!   one-way map→list storage transition at finalize.
//! - [`ComponentTypeRegistry`] — component kinds, recalculation masks, and
//!   factories.
//! - [`UpdateTracker`] / [`UpdateSource`] — change-tagging bookkeeping.

pub mod component;
pub mod key;
pub mod operation;
pub mod owner;
pub mod registry;
pub mod tag;

pub use component::{ComponentData, ComponentNode};
pub use key::{OperationCode, OperationKey};
pub use operation::{ComponentHandle, EvalFn, OpContext, OperationFlags, OperationNode};
pub use owner::{EntityId, EntityIdAllocator};
pub use registry::{
    ComponentFactory, ComponentKind, ComponentTypeInfo, ComponentTypeRegistry, RecalcFlags,
    RegistryError,
};
pub use tag::{UpdateSource, UpdateTracker};
