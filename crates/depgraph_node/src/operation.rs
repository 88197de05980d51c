//! Operation nodes — the smallest schedulable unit of work.
//!
//! An [`OperationNode`] wraps one evaluation callback together with its
//! identity fields and a dirty-flag bitset. Operations are owned by their
//! component; the node only keeps a non-owning [`ComponentHandle`] back to
//! it.

use bitflags::bitflags;
use tracing::trace;

use crate::key::{OperationCode, OperationKey};
use crate::owner::EntityId;
use crate::registry::ComponentKind;
use crate::tag::{UpdateSource, UpdateTracker};

bitflags! {
    /// Per-operation dirty state.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct OperationFlags: u32 {
        /// The operation must re-execute on the next evaluation.
        const NEEDS_UPDATE = 1 << 0;
        /// The tag came from a direct change to this operation's data, not
        /// from flush propagation.
        const DIRECTLY_MODIFIED = 1 << 1;
        /// The tag was caused by a user edit.
        const USER_MODIFIED = 1 << 2;
    }
}

/// The value handed to every operation callback during evaluation.
#[derive(Debug, Clone)]
pub struct OpContext {
    /// The frame being evaluated.
    pub frame: f64,
    /// The entity whose component owns the operation.
    pub entity: EntityId,
}

/// The callable evaluation step wrapped by an operation node.
///
/// `Send + Sync` so a finalized graph can be walked from worker threads.
pub type EvalFn = Box<dyn Fn(&mut OpContext) + Send + Sync>;

/// Non-owning address of the component that owns an operation.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentHandle {
    /// The owning entity.
    pub entity: EntityId,
    /// The owning component's kind.
    pub kind: ComponentKind,
    /// The owning component's name (empty for single-instance kinds).
    pub name: String,
}

impl std::fmt::Display for ComponentHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}/{}", self.entity, self.kind)
        } else {
            write!(f, "{}/{}[{}]", self.entity, self.kind, self.name)
        }
    }
}

/// One schedulable unit of recomputation inside a component.
pub struct OperationNode {
    /// What the operation does.
    pub opcode: OperationCode,
    /// Name distinguishing same-opcode operations.
    pub name: String,
    /// Secondary disambiguator.
    pub name_tag: i32,
    /// Dirty state.
    pub flags: OperationFlags,
    /// Back-reference to the owning component.
    pub owner: ComponentHandle,
    /// The evaluation step to run when the operation is dirty.
    pub callback: EvalFn,
}

impl OperationNode {
    /// Create a new clean operation owned by `owner`.
    #[must_use]
    pub fn new(
        callback: EvalFn,
        opcode: OperationCode,
        name: impl Into<String>,
        name_tag: i32,
        owner: ComponentHandle,
    ) -> Self {
        Self {
            opcode,
            name: name.into(),
            name_tag,
            flags: OperationFlags::empty(),
            owner,
            callback,
        }
    }

    /// The identity key of this operation.
    #[must_use]
    pub fn key(&self) -> OperationKey {
        OperationKey::new(self.opcode, self.name.clone(), self.name_tag)
    }

    /// Content comparison against a key, cheapest fields first.
    #[must_use]
    pub fn matches(&self, key: &OperationKey) -> bool {
        self.opcode == key.opcode && self.name_tag == key.name_tag && self.name == key.name
    }

    /// Returns `true` if the operation is marked for re-evaluation.
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.flags.contains(OperationFlags::NEEDS_UPDATE)
    }

    /// Mark this operation as needing re-evaluation and record the tag.
    ///
    /// Re-tagging an already-dirty operation is recorded again (the tracker
    /// counts tag events, not distinct dirty operations).
    pub fn tag_update(&mut self, tracker: &mut UpdateTracker, source: UpdateSource) {
        self.flags.insert(OperationFlags::NEEDS_UPDATE);
        match source {
            UpdateSource::UserEdit => {
                self.flags
                    .insert(OperationFlags::DIRECTLY_MODIFIED | OperationFlags::USER_MODIFIED);
            }
            UpdateSource::TimeChange | UpdateSource::Visibility => {
                self.flags.insert(OperationFlags::DIRECTLY_MODIFIED);
            }
            UpdateSource::Relations => {}
        }
        tracker.record(source);
        trace!(op = %self.key(), %source, "operation tagged");
    }

    /// Clear all tag flags. Called by the evaluator after the callback ran.
    pub fn clear_update_flags(&mut self) {
        self.flags.remove(
            OperationFlags::NEEDS_UPDATE
                | OperationFlags::DIRECTLY_MODIFIED
                | OperationFlags::USER_MODIFIED,
        );
    }
}

impl std::fmt::Debug for OperationNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OperationNode")
            .field("opcode", &self.opcode)
            .field("name", &self.name)
            .field("name_tag", &self.name_tag)
            .field("flags", &self.flags)
            .field("owner", &self.owner)
            .finish_non_exhaustive()
    }
}
