//! Component nodes — per-subsystem containers of operation nodes.
//!
//! A [`ComponentNode`] holds every operation for one subsystem (transform,
//! geometry, animation, …) of one entity. During graph construction the
//! operations live in a hashmap keyed by [`OperationKey`] for O(1)
//! deduplication; [`ComponentNode::finalize_build`] converts that map into a
//! flat list for fast iteration during evaluation. The two storages are the
//! variants of one enum, so exactly one is ever active and the transition is
//! one-way.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use tracing::{debug, warn};

use crate::key::{OperationCode, OperationKey};
use crate::operation::{ComponentHandle, EvalFn, OperationNode};
use crate::owner::EntityId;
use crate::registry::ComponentKind;
use crate::tag::{UpdateSource, UpdateTracker};

/// Which container currently owns the component's operations.
///
/// `Building` → `Finalized` is a one-way transition; replacing the variant
/// drops the map allocation itself, not just its contents.
#[derive(Debug)]
enum OpStorage {
    /// Build phase: keyed for O(1) lookup and duplicate detection.
    Building(HashMap<OperationKey, OperationNode>),
    /// Evaluation phase: flat list, lookups degrade to a linear scan.
    Finalized(Vec<OperationNode>),
}

/// Kind-specific payload resolved by [`ComponentNode::init`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ComponentData {
    /// No kind-specific state.
    #[default]
    Generic,
    /// Bone components resolve their subdata into the bone they drive.
    Bone {
        /// The resolved bone name, `None` until `init` ran.
        bone: Option<String>,
    },
}

/// The evaluation state for one subsystem of one entity.
#[derive(Debug)]
pub struct ComponentNode {
    /// The registered kind of this component.
    pub kind: ComponentKind,
    /// Instance name; empty for single-instance kinds, e.g. a bone name for
    /// per-bone components.
    pub name: String,
    /// Non-owning back-reference to the owning entity.
    pub owner: EntityId,
    /// Whether changes to this component are user-visible.
    pub affects_directly_visible: bool,
    storage: OpStorage,
    entry: Option<OperationKey>,
    exit: Option<OperationKey>,
    data: ComponentData,
}

impl ComponentNode {
    /// Create an empty component in the Building state.
    #[must_use]
    pub fn new(kind: ComponentKind, owner: EntityId, name: impl Into<String>) -> Self {
        Self::with_data(kind, owner, name, ComponentData::Generic)
    }

    /// Create an empty component carrying kind-specific payload. Used by the
    /// registry factories.
    #[must_use]
    pub fn with_data(
        kind: ComponentKind,
        owner: EntityId,
        name: impl Into<String>,
        data: ComponentData,
    ) -> Self {
        Self {
            kind,
            name: name.into(),
            owner,
            affects_directly_visible: true,
            storage: OpStorage::Building(HashMap::new()),
            entry: None,
            exit: None,
            data,
        }
    }

    /// Kind-specific setup hook, called once right after construction.
    ///
    /// The base behavior only records the owner; Bone components resolve
    /// `subdata` into the bone they drive.
    pub fn init(&mut self, owner: EntityId, subdata: &str) {
        self.owner = owner;
        if let ComponentData::Bone { bone } = &mut self.data {
            *bone = (!subdata.is_empty()).then(|| subdata.to_string());
            debug!(component = %self.handle(), subdata, "bone component resolved");
        }
    }

    /// The non-owning handle operations use to refer back to this component.
    #[must_use]
    pub fn handle(&self) -> ComponentHandle {
        ComponentHandle {
            entity: self.owner,
            kind: self.kind,
            name: self.name.clone(),
        }
    }

    /// Kind-specific payload resolved by [`ComponentNode::init`].
    #[must_use]
    pub fn data(&self) -> &ComponentData {
        &self.data
    }

    /// Returns `true` once [`ComponentNode::finalize_build`] has run.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        matches!(self.storage, OpStorage::Finalized(_))
    }

    /// Number of operations currently owned, in either storage.
    #[must_use]
    pub fn op_count(&self) -> usize {
        match &self.storage {
            OpStorage::Building(map) => map.len(),
            OpStorage::Finalized(list) => list.len(),
        }
    }

    /// Iterate the operations in whichever storage is active.
    pub fn operations(&self) -> impl Iterator<Item = &OperationNode> {
        let (map_iter, list_iter) = match &self.storage {
            OpStorage::Building(map) => (Some(map.values()), None),
            OpStorage::Finalized(list) => (None, Some(list.iter())),
        };
        map_iter
            .into_iter()
            .flatten()
            .chain(list_iter.into_iter().flatten())
    }

    /// The operation at a list position. Positions only exist once the
    /// component is finalized; in the Building state this returns `None`.
    #[must_use]
    pub fn op_at(&self, idx: usize) -> Option<&OperationNode> {
        match &self.storage {
            OpStorage::Building(_) => None,
            OpStorage::Finalized(list) => list.get(idx),
        }
    }

    /// Mutable access to the operation at a list position; `None` in the
    /// Building state.
    #[must_use]
    pub fn op_at_mut(&mut self, idx: usize) -> Option<&mut OperationNode> {
        match &mut self.storage {
            OpStorage::Building(_) => None,
            OpStorage::Finalized(list) => list.get_mut(idx),
        }
    }

    /// Look up an operation by key.
    ///
    /// O(1) during the build phase; a linear content scan after finalize.
    /// Hot paths should cache the result rather than calling this
    /// repeatedly on a finalized component.
    #[must_use]
    pub fn find_op(&self, key: &OperationKey) -> Option<&OperationNode> {
        match &self.storage {
            OpStorage::Building(map) => map.get(key),
            OpStorage::Finalized(list) => list.iter().find(|op| op.matches(key)),
        }
    }

    /// Mutable lookup by key, same cost profile as [`ComponentNode::find_op`].
    #[must_use]
    pub fn find_op_mut(&mut self, key: &OperationKey) -> Option<&mut OperationNode> {
        match &mut self.storage {
            OpStorage::Building(map) => map.get_mut(key),
            OpStorage::Finalized(list) => list.iter_mut().find(|op| op.matches(key)),
        }
    }

    /// Like [`ComponentNode::find_op`] but panics when the operation does
    /// not exist.
    ///
    /// Only call this when prior construction logic guarantees existence; a
    /// miss is a build-graph programming error.
    #[must_use]
    pub fn get_op(&self, key: &OperationKey) -> &OperationNode {
        match self.find_op(key) {
            Some(op) => op,
            None => panic!(
                "operation {} not found in component {}",
                key.identifier(),
                self.handle()
            ),
        }
    }

    /// Returns `true` if an operation with this key exists.
    #[must_use]
    pub fn has_op(&self, key: &OperationKey) -> bool {
        self.find_op(key).is_some()
    }

    /// Register an operation.
    ///
    /// If an operation with the same key already exists this is a
    /// build-logic error: a diagnostic is emitted and the existing node's
    /// callback and identity fields are overwritten (last write wins).
    /// After finalize the map fast path is gone; the call still works via a
    /// linear scan but is logged, since the build pass should be over.
    pub fn add_op(
        &mut self,
        callback: EvalFn,
        opcode: OperationCode,
        name: &str,
        name_tag: i32,
    ) -> &mut OperationNode {
        let key = OperationKey::new(opcode, name, name_tag);
        let owner = self.handle();
        match &mut self.storage {
            OpStorage::Building(map) => match map.entry(key) {
                Entry::Occupied(slot) => {
                    warn!(
                        component = %owner,
                        op = %slot.key(),
                        "operation already registered, overwriting"
                    );
                    let node = slot.into_mut();
                    node.callback = callback;
                    node.opcode = opcode;
                    node.name = name.to_string();
                    node.name_tag = name_tag;
                    node
                }
                Entry::Vacant(slot) => {
                    slot.insert(OperationNode::new(callback, opcode, name, name_tag, owner))
                }
            },
            OpStorage::Finalized(list) => {
                warn!(
                    component = %owner,
                    op = %key,
                    "operation added after finalize, using linear scan"
                );
                if let Some(pos) = list.iter().position(|op| op.matches(&key)) {
                    let node = &mut list[pos];
                    node.callback = callback;
                    node.opcode = opcode;
                    node.name = name.to_string();
                    node.name_tag = name_tag;
                    node
                } else {
                    let idx = list.len();
                    list.push(OperationNode::new(callback, opcode, name, name_tag, owner));
                    &mut list[idx]
                }
            }
        }
    }

    /// Record which operation external edges should enter through.
    ///
    /// May be called at most once per component instance.
    pub fn set_entry_operation(&mut self, key: OperationKey) {
        debug_assert!(
            self.entry.is_none(),
            "entry operation of {} set twice",
            self.handle()
        );
        self.entry = Some(key);
    }

    /// Record which operation external edges should leave through.
    ///
    /// May be called at most once per component instance.
    pub fn set_exit_operation(&mut self, key: OperationKey) {
        debug_assert!(
            self.exit.is_none(),
            "exit operation of {} set twice",
            self.handle()
        );
        self.exit = Some(key);
    }

    /// The operation external edges enter through.
    ///
    /// Falls back to the sole operation when exactly one exists (and caches
    /// that choice); `None` when the component has several operations and no
    /// explicit entry — a valid, expected state the caller must handle.
    #[must_use]
    pub fn get_entry_operation(&mut self) -> Option<&OperationNode> {
        if self.entry.is_none() {
            self.entry = self.sole_op_key();
        }
        let key = self.entry.clone()?;
        self.find_op(&key)
    }

    /// The operation external edges leave through; same fallback and caching
    /// as [`ComponentNode::get_entry_operation`].
    #[must_use]
    pub fn get_exit_operation(&mut self) -> Option<&OperationNode> {
        if self.exit.is_none() {
            self.exit = self.sole_op_key();
        }
        let key = self.exit.clone()?;
        self.find_op(&key)
    }

    fn sole_op_key(&self) -> Option<OperationKey> {
        if self.op_count() != 1 {
            return None;
        }
        match &self.storage {
            OpStorage::Building(map) => map.keys().next().cloned(),
            OpStorage::Finalized(list) => list.first().map(OperationNode::key),
        }
    }

    /// Destroy every owned operation; repeated calls are no-ops.
    ///
    /// The cached entry/exit keys are cleared as well — they would otherwise
    /// name destroyed operations.
    pub fn clear_operations(&mut self) {
        match &mut self.storage {
            OpStorage::Building(map) => map.clear(),
            OpStorage::Finalized(list) => list.clear(),
        }
        self.entry = None;
        self.exit = None;
    }

    /// Mark this component's operations as needing re-evaluation.
    ///
    /// When an entry operation is known and already dirty the cascade
    /// short-circuits: the rest of the component was (or will be) reached
    /// through the entry's own propagation. Valid in both storage states.
    pub fn tag_update(&mut self, tracker: &mut UpdateTracker, source: UpdateSource) {
        let entry_dirty = self
            .entry
            .as_ref()
            .and_then(|key| self.find_op(key))
            .is_some_and(OperationNode::needs_update);
        if entry_dirty {
            debug!(component = %self.handle(), %source, "entry already dirty, skipping cascade");
            return;
        }

        match &mut self.storage {
            OpStorage::Building(map) => {
                for op in map.values_mut() {
                    op.tag_update(tracker, source);
                }
            }
            OpStorage::Finalized(list) => {
                for op in list.iter_mut() {
                    op.tag_update(tracker, source);
                }
            }
        }
    }

    /// One-way transition from map storage to list storage.
    ///
    /// Every operation is preserved; the order of the resulting list is
    /// whatever the map yields and stays stable from here on. The map
    /// allocation itself is dropped. A second call is logged and ignored.
    pub fn finalize_build(&mut self) {
        match std::mem::replace(&mut self.storage, OpStorage::Finalized(Vec::new())) {
            OpStorage::Building(map) => {
                let ops: Vec<OperationNode> = map.into_values().collect();
                debug!(component = %self.handle(), ops = ops.len(), "component finalized");
                self.storage = OpStorage::Finalized(ops);
            }
            OpStorage::Finalized(list) => {
                warn!(component = %self.handle(), "finalize_build called twice");
                self.storage = OpStorage::Finalized(list);
            }
        }
    }
}
