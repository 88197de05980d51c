//! Relations — directed evaluation-order edges between operations.
//!
//! During the build phase relations are recorded symbolically, since
//! operations have no stable position until their components finalize. At
//! graph finalize each endpoint resolves to an index in the flat schedule
//! table.

use depgraph_node::{EntityId, OperationKey};

use crate::entity::ComponentKey;

/// Symbolic reference to one operation, valid in any build state.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OpRef {
    /// The entity owning the operation's component.
    pub entity: EntityId,
    /// The component within the entity.
    pub component: ComponentKey,
    /// The operation within the component.
    pub key: OperationKey,
}

impl OpRef {
    /// Build a reference from its parts.
    #[must_use]
    pub fn new(entity: EntityId, component: ComponentKey, key: OperationKey) -> Self {
        Self {
            entity,
            component,
            key,
        }
    }
}

impl std::fmt::Display for OpRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}/{}", self.entity, self.component, self.key)
    }
}

/// A labelled dependency edge: `from` must evaluate before `to`.
#[derive(Debug, Clone)]
pub struct Relation {
    /// The upstream operation.
    pub from: OpRef,
    /// The downstream operation.
    pub to: OpRef,
    /// Diagnostic label (e.g. `"parent transform"`).
    pub label: String,
}

/// Stable address of an operation after graph finalize: the owning entity,
/// the component's index within it, and the operation's index within the
/// component's finalized list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpAddress {
    /// The owning entity.
    pub entity: EntityId,
    /// Component index within the entity.
    pub component: usize,
    /// Operation index within the component's finalized list.
    pub op: usize,
}
