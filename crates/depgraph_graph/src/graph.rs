//! The dependency graph — entity ownership, relations, and the finalized
//! schedule.
//!
//! A [`Graph`] is built in two phases. During the build phase entities,
//! components, operations, and symbolic relations are added freely. A
//! single [`Graph::finalize_build`] call then finalizes every component,
//! assigns each operation a stable index in a flat schedule table, resolves
//! relations to edges over those indices, and computes the wavefront
//! stages. After that, tagging and flushing drive what the evaluator
//! re-executes.

use std::collections::HashMap;

use tracing::{info, warn};

use depgraph_node::{
    ComponentKind, ComponentNode, ComponentTypeRegistry, EntityId, EntityIdAllocator,
    OperationKey, OperationNode, RecalcFlags, UpdateSource, UpdateTracker,
};

use crate::entity::{ComponentKey, EntityNode};
use crate::relation::{OpAddress, OpRef, Relation};
use crate::scheduler::{self, Stage};

/// Graph-level misuse.
#[derive(Debug, thiserror::Error)]
pub enum GraphError {
    /// The entity id is not part of this graph.
    #[error("entity {0} not found in graph")]
    UnknownEntity(EntityId),

    /// The component kind has no registry entry.
    #[error("component kind '{0}' is not registered")]
    UnknownComponentKind(ComponentKind),

    /// Structural mutation attempted after [`Graph::finalize_build`].
    #[error("graph is already finalized")]
    AlreadyFinalized,

    /// Schedule access attempted before [`Graph::finalize_build`].
    #[error("graph is not finalized yet")]
    NotFinalized,
}

/// The dependency graph for one scene.
#[derive(Debug)]
pub struct Graph {
    registry: ComponentTypeRegistry,
    allocator: EntityIdAllocator,
    entities: HashMap<EntityId, EntityNode>,
    relations: Vec<Relation>,
    ops: Vec<OpAddress>,
    edges: Vec<Vec<usize>>,
    stages: Vec<Stage>,
    topo: Vec<usize>,
    tracker: UpdateTracker,
    finalized: bool,
}

impl Graph {
    /// Create an empty graph using the given component type registry.
    #[must_use]
    pub fn new(registry: ComponentTypeRegistry) -> Self {
        Self {
            registry,
            allocator: EntityIdAllocator::new(),
            entities: HashMap::new(),
            relations: Vec::new(),
            ops: Vec::new(),
            edges: Vec::new(),
            stages: Vec::new(),
            topo: Vec::new(),
            tracker: UpdateTracker::new(),
            finalized: false,
        }
    }

    /// The registry this graph resolves component kinds through.
    #[must_use]
    pub fn registry(&self) -> &ComponentTypeRegistry {
        &self.registry
    }

    /// Returns `true` once [`Graph::finalize_build`] has run.
    #[must_use]
    pub fn is_finalized(&self) -> bool {
        self.finalized
    }

    /// Add an entity to the graph.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AlreadyFinalized`] after finalize.
    pub fn add_entity(&mut self, name: impl Into<String>) -> Result<EntityId, GraphError> {
        if self.finalized {
            return Err(GraphError::AlreadyFinalized);
        }
        let id = self.allocator.allocate();
        self.entities.insert(id, EntityNode::new(id, name));
        Ok(id)
    }

    /// Returns the entity node for an id.
    #[must_use]
    pub fn entity(&self, id: EntityId) -> Option<&EntityNode> {
        self.entities.get(&id)
    }

    /// Mutable access to an entity node.
    #[must_use]
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut EntityNode> {
        self.entities.get_mut(&id)
    }

    /// Number of entities in the graph.
    #[must_use]
    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    /// Fetch or create a component on an entity, running `init` with
    /// `subdata` on creation.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AlreadyFinalized`] after finalize,
    /// [`GraphError::UnknownEntity`] for a foreign id, and
    /// [`GraphError::UnknownComponentKind`] when the registry has no entry
    /// for the kind.
    pub fn add_component(
        &mut self,
        id: EntityId,
        key: ComponentKey,
        subdata: &str,
    ) -> Result<&mut ComponentNode, GraphError> {
        if self.finalized {
            return Err(GraphError::AlreadyFinalized);
        }
        let kind = key.kind;
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GraphError::UnknownEntity(id))?;
        entity
            .get_or_add_component(&self.registry, key, subdata)
            .ok_or(GraphError::UnknownComponentKind(kind))
    }

    /// Mutable access to a component, if it exists.
    #[must_use]
    pub fn component_mut(
        &mut self,
        id: EntityId,
        key: &ComponentKey,
    ) -> Option<&mut ComponentNode> {
        self.entities.get_mut(&id)?.component_mut(key)
    }

    /// Record a dependency edge: `from` must evaluate before `to`.
    ///
    /// Endpoints are symbolic until finalize; an endpoint that never
    /// resolves is logged and dropped there.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AlreadyFinalized`] after finalize.
    pub fn add_relation(
        &mut self,
        from: OpRef,
        to: OpRef,
        label: impl Into<String>,
    ) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::AlreadyFinalized);
        }
        self.relations.push(Relation {
            from,
            to,
            label: label.into(),
        });
        Ok(())
    }

    /// Number of recorded relations (resolved or not).
    #[must_use]
    pub fn relation_count(&self) -> usize {
        self.relations.len()
    }

    /// One-shot transition of the whole graph into its evaluation shape.
    ///
    /// Finalizes every component, builds the flat schedule table (entities
    /// in id order for a stable layout), resolves relations to edges, and
    /// computes the wavefront stages.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::AlreadyFinalized`] on a second call.
    pub fn finalize_build(&mut self) -> Result<(), GraphError> {
        if self.finalized {
            return Err(GraphError::AlreadyFinalized);
        }

        let mut ids: Vec<EntityId> = self.entities.keys().copied().collect();
        ids.sort_unstable();

        let mut table: Vec<OpAddress> = Vec::new();
        for &id in &ids {
            let Some(entity) = self.entities.get_mut(&id) else {
                continue;
            };
            entity.finalize_build();
            for (comp_idx, component) in entity.components().enumerate() {
                for op_idx in 0..component.op_count() {
                    table.push(OpAddress {
                        entity: id,
                        component: comp_idx,
                        op: op_idx,
                    });
                }
            }
        }

        let index_of: HashMap<OpAddress, usize> = table
            .iter()
            .enumerate()
            .map(|(idx, &addr)| (addr, idx))
            .collect();

        let mut edges: Vec<Vec<usize>> = vec![Vec::new(); table.len()];
        let mut resolved = 0usize;
        for relation in &self.relations {
            let endpoints = Self::resolve_ref_in(&self.entities, &relation.from)
                .zip(Self::resolve_ref_in(&self.entities, &relation.to));
            let Some((from_addr, to_addr)) = endpoints else {
                warn!(
                    from = %relation.from,
                    to = %relation.to,
                    label = relation.label,
                    "relation endpoint did not resolve, dropping edge"
                );
                continue;
            };
            let from_idx = index_of[&from_addr];
            let to_idx = index_of[&to_addr];
            if !edges[from_idx].contains(&to_idx) {
                edges[from_idx].push(to_idx);
            }
            resolved += 1;
        }

        let stages = scheduler::compute_stages(table.len(), &edges);
        self.topo = scheduler::topological_order(&stages);

        info!(
            entities = self.entities.len(),
            ops = table.len(),
            relations = self.relations.len(),
            resolved,
            stages = stages.len(),
            "graph finalized"
        );

        self.ops = table;
        self.edges = edges;
        self.stages = stages;
        self.finalized = true;
        Ok(())
    }

    /// The flat schedule table. Empty before finalize.
    #[must_use]
    pub fn schedule(&self) -> &[OpAddress] {
        &self.ops
    }

    /// The wavefront stages. Empty before finalize.
    #[must_use]
    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    /// The topological order over the schedule table.
    #[must_use]
    pub fn topo_order(&self) -> &[usize] {
        &self.topo
    }

    /// Total number of operations in the finalized schedule.
    #[must_use]
    pub fn op_count(&self) -> usize {
        self.ops.len()
    }

    /// The operation at a schedule address.
    #[must_use]
    pub fn op(&self, addr: OpAddress) -> Option<&OperationNode> {
        self.entities
            .get(&addr.entity)?
            .component_at(addr.component)?
            .op_at(addr.op)
    }

    /// Mutable access to the operation at a schedule address.
    #[must_use]
    pub fn op_mut(&mut self, addr: OpAddress) -> Option<&mut OperationNode> {
        self.entities
            .get_mut(&addr.entity)?
            .component_at_mut(addr.component)?
            .op_at_mut(addr.op)
    }

    /// Resolve a symbolic operation reference to its schedule address.
    /// Only meaningful after finalize.
    #[must_use]
    pub fn find_operation(&self, op_ref: &OpRef) -> Option<OpAddress> {
        Self::resolve_ref_in(&self.entities, op_ref)
    }

    fn resolve_ref_in(
        entities: &HashMap<EntityId, EntityNode>,
        op_ref: &OpRef,
    ) -> Option<OpAddress> {
        let entity = entities.get(&op_ref.entity)?;
        let comp_idx = entity.component_index(&op_ref.component)?;
        let component = entity.component_at(comp_idx)?;
        let op_idx = component
            .operations()
            .position(|op| op.matches(&op_ref.key))?;
        Some(OpAddress {
            entity: op_ref.entity,
            component: comp_idx,
            op: op_idx,
        })
    }

    /// Tag every component of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] for a foreign id.
    pub fn tag_entity(&mut self, id: EntityId, source: UpdateSource) -> Result<(), GraphError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GraphError::UnknownEntity(id))?;
        entity.tag_update(&mut self.tracker, source);
        Ok(())
    }

    /// Tag one component of an entity.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] for a foreign id; a missing
    /// component is a silent no-op (nothing to recompute).
    pub fn tag_component(
        &mut self,
        id: EntityId,
        key: &ComponentKey,
        source: UpdateSource,
    ) -> Result<(), GraphError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GraphError::UnknownEntity(id))?;
        if let Some(component) = entity.component_mut(key) {
            component.tag_update(&mut self.tracker, source);
        }
        Ok(())
    }

    /// Tag an entity's components selected by a recalculation mask.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::UnknownEntity`] for a foreign id.
    pub fn tag_recalc(
        &mut self,
        id: EntityId,
        flags: RecalcFlags,
        source: UpdateSource,
    ) -> Result<(), GraphError> {
        let entity = self
            .entities
            .get_mut(&id)
            .ok_or(GraphError::UnknownEntity(id))?;
        entity.tag_recalc(&self.registry, flags, &mut self.tracker, source);
        Ok(())
    }

    /// Tag every animation component in the graph because the evaluated
    /// frame moved.
    pub fn tag_time_update(&mut self) {
        for entity in self.entities.values_mut() {
            entity.tag_recalc(
                &self.registry,
                RecalcFlags::ANIMATION,
                &mut self.tracker,
                UpdateSource::TimeChange,
            );
        }
    }

    /// Propagate needs-update state downstream along resolved edges, in
    /// topological order. Returns how many operations were newly tagged.
    ///
    /// # Errors
    ///
    /// Returns [`GraphError::NotFinalized`] before finalize — edges only
    /// exist afterwards.
    pub fn flush_updates(&mut self) -> Result<usize, GraphError> {
        if !self.finalized {
            return Err(GraphError::NotFinalized);
        }

        let order = self.topo.clone();
        let mut propagated = 0usize;
        for idx in order {
            let addr = self.ops[idx];
            let dirty = self.op(addr).is_some_and(OperationNode::needs_update);
            if !dirty {
                continue;
            }
            for j in 0..self.edges[idx].len() {
                let target = self.edges[idx][j];
                let target_addr = self.ops[target];
                let Some(entity) = self.entities.get_mut(&target_addr.entity) else {
                    continue;
                };
                let Some(component) = entity.component_at_mut(target_addr.component) else {
                    continue;
                };
                let Some(op) = component.op_at_mut(target_addr.op) else {
                    continue;
                };
                if !op.needs_update() {
                    op.tag_update(&mut self.tracker, UpdateSource::Relations);
                    propagated += 1;
                }
            }
        }
        Ok(propagated)
    }

    /// The update tracker for this graph.
    #[must_use]
    pub fn tracker(&self) -> &UpdateTracker {
        &self.tracker
    }

    /// Mutable access to the update tracker (the evaluator resets it after
    /// each batch).
    pub fn tracker_mut(&mut self) -> &mut UpdateTracker {
        &mut self.tracker
    }

    /// Convenience for tests and builders: the key of an operation inside a
    /// component of an entity, as a symbolic reference.
    #[must_use]
    pub fn op_ref(id: EntityId, key: ComponentKey, op: OperationKey) -> OpRef {
        OpRef::new(id, key, op)
    }
}

#[cfg(test)]
mod tests {
    use depgraph_node::{ComponentKind, EvalFn, OperationCode};

    use super::*;

    fn noop() -> EvalFn {
        Box::new(|_| {})
    }

    const NO_TAG: i32 = OperationKey::NO_NAME_TAG;

    /// One entity with animation → transform(init → final) wired up.
    fn build_test_graph() -> (Graph, EntityId) {
        let mut graph = Graph::new(ComponentTypeRegistry::builtin());
        let id = graph.add_entity("cube").expect("graph is building");

        let animation = graph
            .add_component(id, ComponentKey::of(ComponentKind::Animation), "")
            .expect("animation is registered");
        animation.add_op(noop(), OperationCode::AnimationEval, "", NO_TAG);

        let transform = graph
            .add_component(id, ComponentKey::of(ComponentKind::Transform), "")
            .expect("transform is registered");
        transform.add_op(noop(), OperationCode::TransformInit, "", NO_TAG);
        transform.add_op(noop(), OperationCode::TransformFinal, "", NO_TAG);
        transform.set_entry_operation(OperationKey::from_opcode(OperationCode::TransformInit));
        transform.set_exit_operation(OperationKey::from_opcode(OperationCode::TransformFinal));

        graph
            .add_relation(
                Graph::op_ref(
                    id,
                    ComponentKey::of(ComponentKind::Animation),
                    OperationKey::from_opcode(OperationCode::AnimationEval),
                ),
                Graph::op_ref(
                    id,
                    ComponentKey::of(ComponentKind::Transform),
                    OperationKey::from_opcode(OperationCode::TransformInit),
                ),
                "animated transform",
            )
            .expect("graph is building");
        graph
            .add_relation(
                Graph::op_ref(
                    id,
                    ComponentKey::of(ComponentKind::Transform),
                    OperationKey::from_opcode(OperationCode::TransformInit),
                ),
                Graph::op_ref(
                    id,
                    ComponentKey::of(ComponentKind::Transform),
                    OperationKey::from_opcode(OperationCode::TransformFinal),
                ),
                "transform chain",
            )
            .expect("graph is building");

        (graph, id)
    }

    #[test]
    fn test_finalize_builds_schedule() {
        let (mut graph, _) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        assert!(graph.is_finalized());
        assert_eq!(graph.op_count(), 3);
        assert_eq!(graph.topo_order().len(), 3);
        assert!(!graph.stages().is_empty());
    }

    #[test]
    fn test_finalize_twice_is_an_error() {
        let (mut graph, _) = build_test_graph();
        graph.finalize_build().expect("first finalize");
        assert!(matches!(
            graph.finalize_build(),
            Err(GraphError::AlreadyFinalized)
        ));
    }

    #[test]
    fn test_structural_mutation_after_finalize_is_an_error() {
        let (mut graph, id) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        assert!(matches!(
            graph.add_entity("late"),
            Err(GraphError::AlreadyFinalized)
        ));
        assert!(matches!(
            graph.add_component(id, ComponentKey::of(ComponentKind::Geometry), ""),
            Err(GraphError::AlreadyFinalized)
        ));
    }

    #[test]
    fn test_schedule_respects_relations() {
        let (mut graph, id) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        let pos = |opcode: OperationCode, kind: ComponentKind| {
            let addr = graph
                .find_operation(&Graph::op_ref(
                    id,
                    ComponentKey::of(kind),
                    OperationKey::from_opcode(opcode),
                ))
                .expect("operation resolves");
            let idx = graph
                .schedule()
                .iter()
                .position(|&a| a == addr)
                .expect("address is in the table");
            graph
                .topo_order()
                .iter()
                .position(|&i| i == idx)
                .expect("index is scheduled")
        };

        let anim = pos(OperationCode::AnimationEval, ComponentKind::Animation);
        let init = pos(OperationCode::TransformInit, ComponentKind::Transform);
        let fin = pos(OperationCode::TransformFinal, ComponentKind::Transform);
        assert!(anim < init);
        assert!(init < fin);
    }

    #[test]
    fn test_unresolvable_relation_is_dropped() {
        let (mut graph, id) = build_test_graph();
        graph
            .add_relation(
                Graph::op_ref(
                    id,
                    ComponentKey::of(ComponentKind::Geometry),
                    OperationKey::from_opcode(OperationCode::GeometryEval),
                ),
                Graph::op_ref(
                    id,
                    ComponentKey::of(ComponentKind::Transform),
                    OperationKey::from_opcode(OperationCode::TransformInit),
                ),
                "missing source",
            )
            .expect("graph is building");

        // Finalize succeeds; the dangling edge simply does not exist.
        graph.finalize_build().expect("finalize tolerates bad edges");
        assert_eq!(graph.op_count(), 3);
    }

    #[test]
    fn test_tag_entity_records_in_tracker() {
        let (mut graph, id) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        graph
            .tag_entity(id, UpdateSource::UserEdit)
            .expect("entity exists");
        assert_eq!(graph.tracker().tagged_count(), 3);
        assert_eq!(graph.tracker().count_for(UpdateSource::UserEdit), 3);
    }

    #[test]
    fn test_tag_unknown_entity_is_an_error() {
        let (mut graph, _) = build_test_graph();
        assert!(matches!(
            graph.tag_entity(EntityId::from_raw(999), UpdateSource::UserEdit),
            Err(GraphError::UnknownEntity(_))
        ));
    }

    #[test]
    fn test_flush_propagates_downstream() {
        let (mut graph, id) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        // Tag only the animation component; flush must reach both
        // transform operations through the relation chain.
        graph
            .tag_component(id, &ComponentKey::of(ComponentKind::Animation), UpdateSource::TimeChange)
            .expect("entity exists");
        let propagated = graph.flush_updates().expect("graph is finalized");
        assert_eq!(propagated, 2);

        let addr = graph
            .find_operation(&Graph::op_ref(
                id,
                ComponentKey::of(ComponentKind::Transform),
                OperationKey::from_opcode(OperationCode::TransformFinal),
            ))
            .expect("operation resolves");
        assert!(graph.op(addr).expect("address is valid").needs_update());
        assert_eq!(graph.tracker().count_for(UpdateSource::Relations), 2);
    }

    #[test]
    fn test_flush_before_finalize_is_an_error() {
        let (mut graph, _) = build_test_graph();
        assert!(matches!(
            graph.flush_updates(),
            Err(GraphError::NotFinalized)
        ));
    }

    #[test]
    fn test_tag_recalc_uses_registry_mask() {
        let (mut graph, id) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        graph
            .tag_recalc(id, RecalcFlags::TRANSFORM, UpdateSource::UserEdit)
            .expect("entity exists");
        // Both transform operations, nothing else.
        assert_eq!(graph.tracker().tagged_count(), 2);
    }

    #[test]
    fn test_tag_time_update_targets_animation() {
        let (mut graph, _) = build_test_graph();
        graph.finalize_build().expect("first finalize");

        graph.tag_time_update();
        assert_eq!(graph.tracker().tagged_count(), 1);
        assert_eq!(graph.tracker().count_for(UpdateSource::TimeChange), 1);
    }
}
