use glam::{Mat3, Vec3};
use hecs::{Entity, World};

use crate::components::{Pose, RigidBody, Suspension};
use crate::context::{DebugRaycast, PhysicsContext};
use crate::systems::raycast::{cast_ray_world, Ray, RaycastHit};

/// Per-wheel probe cluster: a center ray plus four parallel offsets, all in
/// body-local space. Keeping the closest hit across the cluster stops wheels
/// from tunneling through box corners.
const PROBE_OFFSETS: [Vec3; 5] = [
    Vec3::new(0.0, 0.0, 0.0),
    Vec3::new(0.3, 0.0, 0.0),
    Vec3::new(-0.3, 0.0, 0.0),
    Vec3::new(0.0, 0.0, 0.3),
    Vec3::new(0.0, 0.0, -0.3),
];

const WHEEL_DEBUG_COLORS: [Vec3; 4] = [
    Vec3::new(1.0, 0.0, 0.0),
    Vec3::new(0.0, 1.0, 0.0),
    Vec3::new(0.0, 0.0, 1.0),
    Vec3::new(0.0, 1.0, 1.0),
];

/// Cast each wheel's probe cluster down along the body's local down axis and
/// turn ground contact into spring/damper forces at the wheel lever arms.
///
/// Also derives the body's aggregate ground normal from the per-wheel hit
/// normals; with no grounded wheel it falls back to world up.
pub(crate) fn apply_suspension_forces(world: &World, entity: Entity, ctx: &mut PhysicsContext) {
    let (position, rotation) = match world.get::<&Pose>(entity) {
        Ok(pose) => (pose.position, pose.rotation),
        Err(_) => return,
    };
    let suspension = match world.get::<&Suspension>(entity) {
        Ok(s) => s.clone(),
        Err(_) => return,
    };
    let Ok(mut body) = world.get::<&mut RigidBody>(entity) else {
        return;
    };

    let rotation_matrix = Mat3::from_quat(rotation);
    let ray_direction = (rotation_matrix * Vec3::NEG_Y).normalize();

    let mut grounded_wheels = 0;
    let mut combined_normal = Vec3::ZERO;

    for (wheel_index, wheel_local) in suspension.wheel_positions.iter().enumerate() {
        let arm = rotation_matrix * *wheel_local;
        let wheel_world = position + arm;
        let color = WHEEL_DEBUG_COLORS[wheel_index % WHEEL_DEBUG_COLORS.len()];

        // Closest hit across the whole probe cluster wins.
        let mut closest: Option<(RaycastHit, Ray)> = None;
        for offset in &PROBE_OFFSETS {
            let origin = wheel_world + rotation_matrix * *offset;
            let ray = Ray::new(origin, ray_direction);
            let hit = cast_ray_world(world, &ray);

            if let Some(hit) = hit {
                let is_closer = closest
                    .as_ref()
                    .map_or(true, |(best, _)| hit.distance < best.distance);
                if is_closer {
                    closest = Some((hit, ray));
                }
            }
            ctx.debug_raycasts.push(DebugRaycast { ray, hit, color });
        }

        let Some((mut hit, ray)) = closest else {
            continue;
        };
        if hit.distance >= suspension.height {
            continue;
        }

        grounded_wheels += 1;
        // Hit normals face the ray.
        if hit.normal.dot(ray.direction) > 0.0 {
            hit.normal = -hit.normal;
        }
        combined_normal += hit.normal;

        let compression = suspension.height - hit.distance;
        let spring_force = compression * suspension.stiffness;
        let spring_direction = -ray.direction;

        let point_velocity = body.angular_velocity.cross(arm) + body.velocity;
        let velocity_along_normal = point_velocity.dot(spring_direction);
        let damping_force = velocity_along_normal * suspension.damping;

        let force = spring_direction * (spring_force - damping_force);
        body.forces += force;
        body.torques += arm.cross(force);
    }

    if grounded_wheels > 0 {
        body.is_grounded = true;
        body.ground_normal = if combined_normal.length_squared() > 1e-3 {
            combined_normal.normalize()
        } else {
            Vec3::Y
        };
    } else {
        body.ground_normal = Vec3::Y;
    }
}
