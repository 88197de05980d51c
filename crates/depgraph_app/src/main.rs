//! # depgraph_app — demo scene
//!
//! Builds a small dependency graph — an animated cube and a two-bone
//! armature — then drives it the way an editor session would:
//!
//! 1. Build entities, components, operations, and relations.
//! 2. Finalize the graph into its evaluation shape.
//! 3. Tag a user edit and evaluate.
//! 4. Move the frame, tag the time change, and evaluate again.
//!
//! Each batch's statistics are printed as JSON.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use glam::{Mat4, Vec3};
use tracing::info;
use tracing_subscriber::EnvFilter;

use depgraph_eval::{EvalConfig, Evaluator};
use depgraph_graph::{ComponentKey, Graph, OpRef};
use depgraph_node::{
    ComponentKind, ComponentTypeRegistry, EntityId, EvalFn, OperationCode, OperationKey,
    UpdateSource,
};

/// Results the demo callbacks write into; stands in for real scene data.
#[derive(Debug, Default)]
struct SceneState {
    angles: HashMap<EntityId, f32>,
    world_matrices: HashMap<EntityId, Mat4>,
}

type SharedState = Arc<Mutex<SceneState>>;

const NO_TAG: i32 = OperationKey::NO_NAME_TAG;

fn main() -> Result<()> {
    // Initialise structured logging.
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    info!("depgraph demo starting");

    let state: SharedState = Arc::new(Mutex::new(SceneState::default()));
    let mut graph = Graph::new(ComponentTypeRegistry::builtin());

    let cube = build_cube(&mut graph, &state)?;
    let armature = build_armature(&mut graph)?;
    graph.finalize_build()?;

    let evaluator = Evaluator::new(EvalConfig::new("demo"));

    // A user edit touches the cube's transform channels.
    graph.tag_entity(cube, UpdateSource::UserEdit)?;
    graph.tag_entity(armature, UpdateSource::UserEdit)?;
    let stats = evaluator.evaluate(&mut graph, 1.0)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    // The frame moves: only animated data needs tagging, the flush pulls
    // the dependent transform operations back in.
    graph.tag_time_update();
    let stats = evaluator.evaluate(&mut graph, 2.0)?;
    println!("{}", serde_json::to_string_pretty(&stats)?);

    let state = state.lock().expect("state lock");
    if let Some(matrix) = state.world_matrices.get(&cube) {
        info!(cube = %cube, translation = %matrix.w_axis.truncate(), "final cube transform");
    }

    info!("depgraph demo shut down");
    Ok(())
}

/// An animated cube: animation drives the spin angle, the transform chain
/// turns it into a world matrix, geometry depends on the final transform.
fn build_cube(graph: &mut Graph, state: &SharedState) -> Result<EntityId> {
    let id = graph.add_entity("cube")?;

    let anim_state = Arc::clone(state);
    let animation = graph.add_component(id, ComponentKey::of(ComponentKind::Animation), "")?;
    animation.add_op(
        Box::new(move |ctx| {
            let mut scene = anim_state.lock().expect("state lock");
            scene.angles.insert(ctx.entity, ctx.frame as f32 * 0.1);
        }),
        OperationCode::AnimationEval,
        "",
        NO_TAG,
    );

    let transform = graph.add_component(id, ComponentKey::of(ComponentKind::Transform), "")?;
    transform.add_op(noop(), OperationCode::TransformInit, "", NO_TAG);
    transform.add_op(noop(), OperationCode::TransformLocal, "", NO_TAG);
    let final_state = Arc::clone(state);
    transform.add_op(
        Box::new(move |ctx| {
            let mut scene = final_state.lock().expect("state lock");
            let angle = scene.angles.get(&ctx.entity).copied().unwrap_or(0.0);
            let matrix = Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))
                * Mat4::from_rotation_y(angle);
            scene.world_matrices.insert(ctx.entity, matrix);
        }),
        OperationCode::TransformFinal,
        "",
        NO_TAG,
    );
    transform.set_entry_operation(OperationKey::from_opcode(OperationCode::TransformInit));
    transform.set_exit_operation(OperationKey::from_opcode(OperationCode::TransformFinal));

    let geometry = graph.add_component(id, ComponentKey::of(ComponentKind::Geometry), "")?;
    geometry.add_op(noop(), OperationCode::GeometryEval, "", NO_TAG);

    // animation → transform chain → geometry
    let transform_key = ComponentKey::of(ComponentKind::Transform);
    graph.add_relation(
        op(id, ComponentKey::of(ComponentKind::Animation), OperationCode::AnimationEval),
        op(id, transform_key.clone(), OperationCode::TransformInit),
        "animated transform",
    )?;
    graph.add_relation(
        op(id, transform_key.clone(), OperationCode::TransformInit),
        op(id, transform_key.clone(), OperationCode::TransformLocal),
        "transform chain",
    )?;
    graph.add_relation(
        op(id, transform_key.clone(), OperationCode::TransformLocal),
        op(id, transform_key.clone(), OperationCode::TransformFinal),
        "transform chain",
    )?;
    graph.add_relation(
        op(id, transform_key, OperationCode::TransformFinal),
        op(id, ComponentKey::of(ComponentKind::Geometry), OperationCode::GeometryEval),
        "geometry follows transform",
    )?;

    Ok(id)
}

/// A two-bone armature: pose init fans out to per-bone components, which
/// join back into pose done.
fn build_armature(graph: &mut Graph) -> Result<EntityId> {
    let id = graph.add_entity("armature")?;

    let pose = graph.add_component(id, ComponentKey::of(ComponentKind::Pose), "")?;
    pose.add_op(noop(), OperationCode::PoseInit, "", NO_TAG);
    pose.add_op(noop(), OperationCode::PoseDone, "", NO_TAG);
    pose.set_entry_operation(OperationKey::from_opcode(OperationCode::PoseInit));
    pose.set_exit_operation(OperationKey::from_opcode(OperationCode::PoseDone));

    for bone in ["hand.L", "hand.R"] {
        let key = ComponentKey::named(ComponentKind::Bone, bone);
        let component = graph.add_component(id, key.clone(), bone)?;
        component.add_op(noop(), OperationCode::BoneLocal, bone, 0);
        component.add_op(noop(), OperationCode::BoneReady, bone, 0);
        component.add_op(noop(), OperationCode::BoneDone, bone, 0);

        graph.add_relation(
            op(id, ComponentKey::of(ComponentKind::Pose), OperationCode::PoseInit),
            bone_op(id, key.clone(), OperationCode::BoneLocal, bone),
            "pose fan-out",
        )?;
        graph.add_relation(
            bone_op(id, key.clone(), OperationCode::BoneLocal, bone),
            bone_op(id, key.clone(), OperationCode::BoneReady, bone),
            "bone chain",
        )?;
        graph.add_relation(
            bone_op(id, key.clone(), OperationCode::BoneReady, bone),
            bone_op(id, key.clone(), OperationCode::BoneDone, bone),
            "bone chain",
        )?;
        graph.add_relation(
            bone_op(id, key, OperationCode::BoneDone, bone),
            op(id, ComponentKey::of(ComponentKind::Pose), OperationCode::PoseDone),
            "pose join",
        )?;
    }

    Ok(id)
}

fn noop() -> EvalFn {
    Box::new(|_| {})
}

fn op(id: EntityId, component: ComponentKey, opcode: OperationCode) -> OpRef {
    OpRef::new(id, component, OperationKey::from_opcode(opcode))
}

fn bone_op(id: EntityId, component: ComponentKey, opcode: OperationCode, bone: &str) -> OpRef {
    OpRef::new(id, component, OperationKey::new(opcode, bone, 0))
}
