//! Component kinds and the component type registry.
//!
//! Each component kind registers once, before any graph is built, with its
//! coarse recalculation mask and a factory that allocates the right
//! [`ComponentNode`] variant. The registry is an explicit value handed to
//! graph construction — tests get a fresh one instead of sharing global
//! state.

use std::collections::HashMap;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::component::{ComponentData, ComponentNode};
use crate::owner::EntityId;

/// The registered kinds of component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ComponentKind {
    /// Entity-level parameter evaluation.
    Parameters,
    /// Animation curve evaluation.
    Animation,
    /// Object transform evaluation.
    Transform,
    /// Geometry (mesh/curve) evaluation.
    Geometry,
    /// Armature pose evaluation.
    Pose,
    /// Per-bone evaluation inside a pose.
    Bone,
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Parameters => "parameters",
            Self::Animation => "animation",
            Self::Transform => "transform",
            Self::Geometry => "geometry",
            Self::Pose => "pose",
            Self::Bone => "bone",
        };
        f.write_str(name)
    }
}

bitflags! {
    /// Coarse recalculation mask.
    ///
    /// External change notifications carry one of these masks; the graph
    /// resolves it through the registry to the component kinds that need
    /// tagging.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct RecalcFlags: u32 {
        /// Entity parameters changed.
        const PARAMETERS = 1 << 0;
        /// Animation data changed.
        const ANIMATION = 1 << 1;
        /// Transform channels changed.
        const TRANSFORM = 1 << 2;
        /// Geometry data changed.
        const GEOMETRY = 1 << 3;
        /// Pose or bone data changed.
        const POSE = 1 << 4;
    }
}

/// Allocates a component of one kind for the given owner and instance name.
pub type ComponentFactory = fn(EntityId, &str) -> ComponentNode;

/// One registered component kind.
#[derive(Debug, Clone)]
pub struct ComponentTypeInfo {
    /// The kind being registered.
    pub kind: ComponentKind,
    /// The recalculation mask that selects this kind for tagging.
    pub recalc: RecalcFlags,
    /// Allocates a correctly-typed component instance.
    pub factory: ComponentFactory,
}

/// Registration misuse.
#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    /// The kind was registered before; registration is purely additive and
    /// never replaces an entry.
    #[error("component kind '{0}' is already registered")]
    AlreadyRegistered(ComponentKind),
}

/// Table of registered component kinds, immutable after startup.
#[derive(Debug, Default)]
pub struct ComponentTypeRegistry {
    entries: HashMap<ComponentKind, ComponentTypeInfo>,
}

impl ComponentTypeRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in kinds.
    #[must_use]
    pub fn builtin() -> Self {
        let mut registry = Self::new();
        for info in [
            ComponentTypeInfo {
                kind: ComponentKind::Parameters,
                recalc: RecalcFlags::PARAMETERS,
                factory: new_parameters,
            },
            ComponentTypeInfo {
                kind: ComponentKind::Animation,
                recalc: RecalcFlags::ANIMATION,
                factory: new_animation,
            },
            ComponentTypeInfo {
                kind: ComponentKind::Transform,
                recalc: RecalcFlags::TRANSFORM,
                factory: new_transform,
            },
            ComponentTypeInfo {
                kind: ComponentKind::Geometry,
                recalc: RecalcFlags::GEOMETRY,
                factory: new_geometry,
            },
            ComponentTypeInfo {
                kind: ComponentKind::Pose,
                recalc: RecalcFlags::POSE,
                factory: new_pose,
            },
            ComponentTypeInfo {
                kind: ComponentKind::Bone,
                recalc: RecalcFlags::POSE,
                factory: new_bone,
            },
        ] {
            registry.entries.insert(info.kind, info);
        }
        registry
    }

    /// Register a component kind. Registration is additive only.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::AlreadyRegistered`] if the kind exists.
    pub fn register(&mut self, info: ComponentTypeInfo) -> Result<(), RegistryError> {
        if self.entries.contains_key(&info.kind) {
            return Err(RegistryError::AlreadyRegistered(info.kind));
        }
        self.entries.insert(info.kind, info);
        Ok(())
    }

    /// Returns the registration entry for a kind.
    #[must_use]
    pub fn get(&self, kind: ComponentKind) -> Option<&ComponentTypeInfo> {
        self.entries.get(&kind)
    }

    /// Returns the recalculation mask registered for a kind.
    #[must_use]
    pub fn recalc_flags(&self, kind: ComponentKind) -> Option<RecalcFlags> {
        self.entries.get(&kind).map(|info| info.recalc)
    }

    /// Resolve a recalculation mask to the kinds it selects.
    #[must_use]
    pub fn kinds_for(&self, flags: RecalcFlags) -> Vec<ComponentKind> {
        let mut kinds: Vec<ComponentKind> = self
            .entries
            .values()
            .filter(|info| info.recalc.intersects(flags))
            .map(|info| info.kind)
            .collect();
        kinds.sort();
        kinds
    }

    /// Allocate a component of the given kind through its factory.
    #[must_use]
    pub fn create(&self, kind: ComponentKind, owner: EntityId, name: &str) -> Option<ComponentNode> {
        self.entries.get(&kind).map(|info| (info.factory)(owner, name))
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if no kinds are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn new_parameters(owner: EntityId, name: &str) -> ComponentNode {
    ComponentNode::new(ComponentKind::Parameters, owner, name)
}

fn new_animation(owner: EntityId, name: &str) -> ComponentNode {
    ComponentNode::new(ComponentKind::Animation, owner, name)
}

fn new_transform(owner: EntityId, name: &str) -> ComponentNode {
    ComponentNode::new(ComponentKind::Transform, owner, name)
}

fn new_geometry(owner: EntityId, name: &str) -> ComponentNode {
    ComponentNode::new(ComponentKind::Geometry, owner, name)
}

fn new_pose(owner: EntityId, name: &str) -> ComponentNode {
    ComponentNode::new(ComponentKind::Pose, owner, name)
}

fn new_bone(owner: EntityId, name: &str) -> ComponentNode {
    ComponentNode::with_data(
        ComponentKind::Bone,
        owner,
        name,
        ComponentData::Bone { bone: None },
    )
}
