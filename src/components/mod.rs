mod mesh;
mod physics;

pub use mesh::TriangleMesh;
pub use physics::{BodyKind, CollisionEvent, Respawnable, RigidBody, Suspension, WorldGeometry};

use glam::{Mat4, Quat, Vec3};
use hecs::{Entity, World};

/// Spatial transform with position, rotation, and scale (local space).
///
/// The rotation must stay a unit quaternion; the integrator renormalizes it
/// after every incremental rotation.
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Pose {
    pub fn new(position: Vec3) -> Self {
        Self {
            position,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }

    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.position)
    }
}

/// Computed world-space transform matrix, updated by the propagation system.
pub struct GlobalTransform(pub Mat4);

/// Points to the parent entity in the transform hierarchy.
pub struct Parent(pub Entity);

/// Lists child entities in the transform hierarchy.
pub struct Children(pub Vec<Entity>);

/// Pose captured at the start of the last physics step. Transform
/// propagation blends between this snapshot and the live pose by the
/// accumulator alpha so rendered motion stays smooth between fixed ticks.
pub struct PreviousPose {
    pub position: Vec3,
    pub rotation: Quat,
}

/// Attach `child` under `parent`, reparenting it away from any previous
/// parent first.
pub fn attach_child(world: &mut World, parent: Entity, child: Entity) {
    if let Ok(old_parent) = world.get::<&Parent>(child).map(|p| p.0) {
        if old_parent == parent {
            return;
        }
        if let Ok(mut siblings) = world.get::<&mut Children>(old_parent) {
            siblings.0.retain(|&e| e != child);
        }
    }

    let _ = world.insert_one(child, Parent(parent));

    let appended = match world.get::<&mut Children>(parent) {
        Ok(mut children) => {
            children.0.push(child);
            true
        }
        Err(_) => false,
    };
    if !appended {
        let _ = world.insert_one(parent, Children(vec![child]));
    }
}

/// Detach `child` from `parent`, making it a hierarchy root again.
pub fn detach_child(world: &mut World, parent: Entity, child: Entity) {
    if let Ok(mut children) = world.get::<&mut Children>(parent) {
        children.0.retain(|&e| e != child);
    }
    let points_here = world
        .get::<&Parent>(child)
        .map(|p| p.0 == parent)
        .unwrap_or(false);
    if points_here {
        let _ = world.remove_one::<Parent>(child);
    }
}
