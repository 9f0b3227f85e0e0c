use glam::Mat4;
use hecs::{Entity, World};

use crate::components::{Children, GlobalTransform, Parent, Pose, PreviousPose};

/// Recomputes every `GlobalTransform` from the pose hierarchy, top down.
///
/// Entities with a `Pose` and no `Parent` are roots; their subtrees are
/// walked depth-first, each child composing the parent's world matrix with
/// its own local matrix. Physics bodies carry a `PreviousPose` snapshot from
/// the start of the last fixed step, and `alpha` (0..1, how far the render
/// frame sits inside the current step) blends snapshot and live pose so
/// motion stays smooth between fixed ticks.
pub fn transform_propagation_system(world: &mut World, alpha: f32) {
    let mut stack: Vec<(Entity, Mat4)> = world
        .query::<&Pose>()
        .without::<&Parent>()
        .iter()
        .map(|(entity, _)| (entity, Mat4::IDENTITY))
        .collect();

    while let Some((entity, parent_world)) = stack.pop() {
        let world_matrix = parent_world * blended_local_matrix(world, entity, alpha);

        if let Ok(mut global) = world.get::<&mut GlobalTransform>(entity) {
            global.0 = world_matrix;
        }
        if let Ok(children) = world.get::<&Children>(entity) {
            stack.extend(children.0.iter().map(|&child| (child, world_matrix)));
        }
    }
}

/// One entity's local matrix, blended toward its last physics snapshot.
/// Translation lerps and rotation slerps; scale is not animated by physics.
fn blended_local_matrix(world: &World, entity: Entity, alpha: f32) -> Mat4 {
    let Ok(pose) = world.get::<&Pose>(entity) else {
        return Mat4::IDENTITY;
    };

    match world.get::<&PreviousPose>(entity) {
        Ok(prev) => {
            let position = prev.position.lerp(pose.position, alpha);
            let rotation = prev.rotation.slerp(pose.rotation, alpha).normalize();
            Mat4::from_scale_rotation_translation(pose.scale, rotation, position)
        }
        Err(_) => pose.matrix(),
    }
}
