//! Entity nodes — per-entity ownership of component nodes.

use std::collections::HashMap;

use tracing::debug;

use depgraph_node::{
    ComponentKind, ComponentNode, ComponentTypeRegistry, EntityId, RecalcFlags, UpdateSource,
    UpdateTracker,
};

/// Identifies one component instance within an entity.
///
/// Most kinds have a single unnamed instance; per-bone components use the
/// bone name to keep several instances of the same kind apart.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ComponentKey {
    /// The component's kind.
    pub kind: ComponentKind,
    /// The instance name, empty for single-instance kinds.
    pub name: String,
}

impl ComponentKey {
    /// Key for the sole instance of a kind.
    #[must_use]
    pub fn of(kind: ComponentKind) -> Self {
        Self {
            kind,
            name: String::new(),
        }
    }

    /// Key for a named instance (e.g. a per-bone component).
    #[must_use]
    pub fn named(kind: ComponentKind, name: impl Into<String>) -> Self {
        Self {
            kind,
            name: name.into(),
        }
    }
}

impl std::fmt::Display for ComponentKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.name.is_empty() {
            write!(f, "{}", self.kind)
        } else {
            write!(f, "{}[{}]", self.kind, self.name)
        }
    }
}

/// One entity under evaluation, owning its component nodes.
///
/// Components are stored in a vector so their indices stay stable once the
/// graph is finalized; the side index maps keys to positions.
#[derive(Debug)]
pub struct EntityNode {
    /// The entity's id within the graph.
    pub id: EntityId,
    /// Human-readable name for diagnostics.
    pub name: String,
    /// Whether the entity is visible to the user; invisible entities still
    /// evaluate but their components report as not directly visible.
    pub is_directly_visible: bool,
    components: Vec<ComponentNode>,
    index: HashMap<ComponentKey, usize>,
}

impl EntityNode {
    /// Create an entity node with no components.
    #[must_use]
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            is_directly_visible: true,
            components: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Number of owned components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.components.len()
    }

    /// Iterate the owned components in index order.
    pub fn components(&self) -> impl Iterator<Item = &ComponentNode> {
        self.components.iter()
    }

    /// Look up a component by key.
    #[must_use]
    pub fn component(&self, key: &ComponentKey) -> Option<&ComponentNode> {
        self.index.get(key).map(|&idx| &self.components[idx])
    }

    /// Mutable lookup by key.
    #[must_use]
    pub fn component_mut(&mut self, key: &ComponentKey) -> Option<&mut ComponentNode> {
        self.index
            .get(key)
            .copied()
            .map(|idx| &mut self.components[idx])
    }

    /// The stable index of a component, for addressing operations.
    #[must_use]
    pub fn component_index(&self, key: &ComponentKey) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// The component at a stable index.
    #[must_use]
    pub fn component_at(&self, idx: usize) -> Option<&ComponentNode> {
        self.components.get(idx)
    }

    /// Mutable access to the component at a stable index.
    #[must_use]
    pub fn component_at_mut(&mut self, idx: usize) -> Option<&mut ComponentNode> {
        self.components.get_mut(idx)
    }

    /// Fetch or create the component for `key`, allocating through the
    /// registry factory and running `init` with `subdata` on creation.
    ///
    /// Returns `None` when the kind is not registered.
    pub fn get_or_add_component(
        &mut self,
        registry: &ComponentTypeRegistry,
        key: ComponentKey,
        subdata: &str,
    ) -> Option<&mut ComponentNode> {
        if let Some(&idx) = self.index.get(&key) {
            return Some(&mut self.components[idx]);
        }
        let mut component = registry.create(key.kind, self.id, &key.name)?;
        component.init(self.id, subdata);
        component.affects_directly_visible = self.is_directly_visible;
        let idx = self.components.len();
        debug!(entity = %self.id, component = %key, "component created");
        self.components.push(component);
        self.index.insert(key, idx);
        Some(&mut self.components[idx])
    }

    /// Tag every owned component.
    pub fn tag_update(&mut self, tracker: &mut UpdateTracker, source: UpdateSource) {
        for component in &mut self.components {
            component.tag_update(tracker, source);
        }
    }

    /// Tag only the components whose registered recalculation mask
    /// intersects `flags`.
    pub fn tag_recalc(
        &mut self,
        registry: &ComponentTypeRegistry,
        flags: RecalcFlags,
        tracker: &mut UpdateTracker,
        source: UpdateSource,
    ) {
        for component in &mut self.components {
            let selected = registry
                .recalc_flags(component.kind)
                .is_some_and(|mask| mask.intersects(flags));
            if selected {
                component.tag_update(tracker, source);
            }
        }
    }

    /// Finalize every owned component. Returns the total operation count.
    pub fn finalize_build(&mut self) -> usize {
        let mut ops = 0;
        for component in &mut self.components {
            component.finalize_build();
            ops += component.op_count();
        }
        ops
    }
}

#[cfg(test)]
mod tests {
    use depgraph_node::{EvalFn, OperationCode, OperationKey};

    use super::*;

    fn noop() -> EvalFn {
        Box::new(|_| {})
    }

    fn test_entity() -> EntityNode {
        EntityNode::new(EntityId::from_raw(1), "cube")
    }

    #[test]
    fn test_get_or_add_is_idempotent() {
        let registry = ComponentTypeRegistry::builtin();
        let mut entity = test_entity();

        entity
            .get_or_add_component(&registry, ComponentKey::of(ComponentKind::Transform), "")
            .expect("transform is registered");
        entity
            .get_or_add_component(&registry, ComponentKey::of(ComponentKind::Transform), "")
            .expect("transform is registered");

        assert_eq!(entity.component_count(), 1);
    }

    #[test]
    fn test_named_instances_are_distinct() {
        let registry = ComponentTypeRegistry::builtin();
        let mut entity = test_entity();

        entity
            .get_or_add_component(
                &registry,
                ComponentKey::named(ComponentKind::Bone, "hand.L"),
                "hand.L",
            )
            .expect("bone is registered");
        entity
            .get_or_add_component(
                &registry,
                ComponentKey::named(ComponentKind::Bone, "hand.R"),
                "hand.R",
            )
            .expect("bone is registered");

        assert_eq!(entity.component_count(), 2);
        assert!(
            entity
                .component(&ComponentKey::named(ComponentKind::Bone, "hand.L"))
                .is_some()
        );
    }

    #[test]
    fn test_unregistered_kind_returns_none() {
        let registry = ComponentTypeRegistry::new();
        let mut entity = test_entity();
        let result =
            entity.get_or_add_component(&registry, ComponentKey::of(ComponentKind::Pose), "");
        assert!(result.is_none());
        assert_eq!(entity.component_count(), 0);
    }

    #[test]
    fn test_tag_update_cascades_to_all_components() {
        let registry = ComponentTypeRegistry::builtin();
        let mut entity = test_entity();
        let mut tracker = UpdateTracker::new();

        let transform = entity
            .get_or_add_component(&registry, ComponentKey::of(ComponentKind::Transform), "")
            .expect("transform is registered");
        transform.add_op(
            noop(),
            OperationCode::TransformFinal,
            "",
            OperationKey::NO_NAME_TAG,
        );
        let geometry = entity
            .get_or_add_component(&registry, ComponentKey::of(ComponentKind::Geometry), "")
            .expect("geometry is registered");
        geometry.add_op(
            noop(),
            OperationCode::GeometryEval,
            "",
            OperationKey::NO_NAME_TAG,
        );

        entity.tag_update(&mut tracker, UpdateSource::UserEdit);
        assert_eq!(tracker.tagged_count(), 2);
    }

    #[test]
    fn test_tag_recalc_selects_by_mask() {
        let registry = ComponentTypeRegistry::builtin();
        let mut entity = test_entity();
        let mut tracker = UpdateTracker::new();

        for kind in [ComponentKind::Transform, ComponentKind::Geometry] {
            let component = entity
                .get_or_add_component(&registry, ComponentKey::of(kind), "")
                .expect("kind is registered");
            component.add_op(noop(), OperationCode::Operation, "", OperationKey::NO_NAME_TAG);
        }

        entity.tag_recalc(
            &registry,
            RecalcFlags::GEOMETRY,
            &mut tracker,
            UpdateSource::UserEdit,
        );

        // Only the geometry component's single operation was tagged.
        assert_eq!(tracker.tagged_count(), 1);
        let geometry = entity
            .component(&ComponentKey::of(ComponentKind::Geometry))
            .expect("geometry exists");
        let op = geometry
            .find_op(&OperationKey::from_opcode(OperationCode::Operation))
            .expect("operation exists");
        assert!(op.needs_update());
    }

    #[test]
    fn test_finalize_build_counts_operations() {
        let registry = ComponentTypeRegistry::builtin();
        let mut entity = test_entity();
        let transform = entity
            .get_or_add_component(&registry, ComponentKey::of(ComponentKind::Transform), "")
            .expect("transform is registered");
        transform.add_op(
            noop(),
            OperationCode::TransformInit,
            "",
            OperationKey::NO_NAME_TAG,
        );
        transform.add_op(
            noop(),
            OperationCode::TransformFinal,
            "",
            OperationKey::NO_NAME_TAG,
        );

        assert_eq!(entity.finalize_build(), 2);
        let transform = entity
            .component(&ComponentKey::of(ComponentKind::Transform))
            .expect("transform exists");
        assert!(transform.is_finalized());
    }
}
