use glam::{Quat, Vec3};
use hecs::{Entity, World};
use log::debug;

use crate::components::{Pose, PreviousPose, Respawnable, RigidBody, Suspension};
use crate::context::{PhysicsContext, StepReport};
use crate::systems::collision::{detect_collisions, resolve_collision};
use crate::systems::raycast::{cast_ray_world, Ray};
use crate::systems::suspension::apply_suspension_forces;

/// Fixed simulation tick. The driver runs this zero or more times per
/// rendered frame to catch up with wall time.
pub const PHYSICS_DT: f32 = 1.0 / 250.0;

/// Frame spikes longer than this are clamped so the accumulator can't
/// spiral into an unbounded number of catch-up steps.
const MAX_FRAME_DT: f32 = 0.25;

/// How far the chassis center may sink toward the floor before the
/// short-range probe pushes it back out.
const CHASSIS_CLEARANCE: f32 = 0.3;

/// Angular speeds below this (squared) skip orientation integration.
const MIN_SPIN_SQUARED: f32 = 1e-4;

/// Advance the simulation by one fixed step, in the strict order:
/// suspension + force integration, motion + floor probe + accumulator
/// clear, pairwise collision detection and resolution, respawn check.
///
/// Static bodies are never written; the step is a bounded synchronous
/// computation with no error path (degenerate inputs degrade to no-ops).
pub fn physics_step(world: &mut World, ctx: &mut PhysicsContext, dt: f32) -> StepReport {
    ctx.debug_raycasts.clear();
    let mut report = StepReport::default();

    let dynamic_bodies: Vec<Entity> = world
        .query::<(&Pose, &RigidBody)>()
        .iter()
        .filter(|(_, (_, body))| body.kind.is_dynamic())
        .map(|(entity, _)| entity)
        .collect();

    // Snapshot poses for render interpolation before anything moves.
    for &entity in &dynamic_bodies {
        let snapshot = world.get::<&Pose>(entity).map(|pose| PreviousPose {
            position: pose.position,
            rotation: pose.rotation,
        });
        if let Ok(snapshot) = snapshot {
            let _ = world.insert_one(entity, snapshot);
        }
    }

    // 1. Forces: reset per-step flags, run suspension, apply gravity,
    //    integrate the accumulators into the velocities.
    for &entity in &dynamic_bodies {
        if let Ok(mut body) = world.get::<&mut RigidBody>(entity) {
            body.reset_step_flags();
        }

        if world.get::<&Suspension>(entity).is_ok() {
            apply_suspension_forces(world, entity, ctx);
        }

        if let Ok(mut body) = world.get::<&mut RigidBody>(entity) {
            // Unit mass, so gravity enters the accumulator directly.
            body.forces += ctx.gravity;

            let linear_acceleration = body.forces * body.inverse_mass;
            body.velocity += linear_acceleration * dt;

            let angular_acceleration = body.torques * body.inverse_inertia;
            body.angular_velocity += angular_acceleration * dt;
        }
    }

    // 2. Motion: drag, position and orientation integration, then the floor
    //    probe, then the accumulators are cleared for the next step.
    for &entity in &dynamic_bodies {
        integrate_motion(world, entity, dt);
        resolve_chassis_probe(world, entity);

        if let Ok(mut body) = world.get::<&mut RigidBody>(entity) {
            body.forces = Vec3::ZERO;
            body.torques = Vec3::ZERO;
        }
    }

    // 3. Collisions: detect on the already-integrated poses, then resolve.
    let events = detect_collisions(world);
    for event in &events {
        resolve_collision(world, ctx, event, &mut report);
    }
    report.collisions = events;

    // 4. Respawn: respawn-eligible bodies that fell out of the world get
    //    teleported back to the spawn point with their velocity cleared.
    let fallen: Vec<Entity> = world
        .query::<(&Pose, &RigidBody, &Respawnable)>()
        .iter()
        .filter(|(_, (pose, body, _))| {
            body.kind.is_dynamic() && pose.position.y < ctx.respawn_y_threshold
        })
        .map(|(entity, _)| entity)
        .collect();
    for entity in fallen {
        if let (Ok(mut pose), Ok(mut body)) = (
            world.get::<&mut Pose>(entity),
            world.get::<&mut RigidBody>(entity),
        ) {
            pose.position = ctx.respawn_position;
            body.velocity = Vec3::ZERO;
            body.is_respawning = true;
            debug!("{entity:?} fell out of bounds, respawning");
            report.respawned.push(entity);
        }
    }

    report
}

/// Drive the fixed-step simulation from a variable-rate frame: clamp and
/// accumulate frame time, step while a full tick fits, and return the merged
/// report plus the interpolation alpha (0..1) for rendering between ticks.
pub fn run_fixed_steps(
    world: &mut World,
    ctx: &mut PhysicsContext,
    accumulator: &mut f32,
    frame_dt: f32,
) -> (StepReport, f32) {
    *accumulator += frame_dt.min(MAX_FRAME_DT);

    let mut report = StepReport::default();
    while *accumulator >= PHYSICS_DT {
        report.merge(physics_step(world, ctx, PHYSICS_DT));
        *accumulator -= PHYSICS_DT;
    }

    (report, *accumulator / PHYSICS_DT)
}

/// Semi-implicit Euler motion update for one body: grounded anisotropic drag
/// in the body frame, unconditional angular drag, position integration, and
/// incremental axis-angle orientation integration with renormalization.
fn integrate_motion(world: &World, entity: Entity, dt: f32) {
    let (Ok(mut pose), Ok(mut body)) = (
        world.get::<&mut Pose>(entity),
        world.get::<&mut RigidBody>(entity),
    ) else {
        return;
    };

    if body.is_grounded {
        // Tire-grip model: damp forward and lateral speed independently in
        // the body's local frame.
        let inverse_rotation = pose.rotation.conjugate();
        let mut local_velocity = inverse_rotation * body.velocity;
        local_velocity.z *= body.linear_drag;
        local_velocity.x *= body.lateral_grip;
        body.velocity = pose.rotation * local_velocity;
    }
    let angular_drag = body.angular_drag;
    body.angular_velocity *= angular_drag;

    pose.position += body.velocity * dt;

    if body.angular_velocity.length_squared() > MIN_SPIN_SQUARED {
        let spin = body.angular_velocity.length();
        let delta = Quat::from_axis_angle(body.angular_velocity / spin, spin * dt);
        pose.rotation = (delta * pose.rotation).normalize();
    }
}

/// Short-range downward probe that pops the chassis back above the floor
/// when a hard landing buried it. Stop-gap until a proper contact solver
/// handles deep vertical penetration.
fn resolve_chassis_probe(world: &World, entity: Entity) {
    let position = match world.get::<&Pose>(entity) {
        Ok(pose) => pose.position,
        Err(_) => return,
    };

    let ray = Ray::new(position, Vec3::NEG_Y);
    let Some(hit) = cast_ray_world(world, &ray) else {
        return;
    };
    if hit.distance >= CHASSIS_CLEARANCE {
        return;
    }

    let (Ok(mut pose), Ok(mut body)) = (
        world.get::<&mut Pose>(entity),
        world.get::<&mut RigidBody>(entity),
    ) else {
        return;
    };

    pose.position += Vec3::Y * (CHASSIS_CLEARANCE - hit.distance);
    if body.velocity.y < 0.0 {
        body.velocity.y = 0.0;
    }
    body.is_grounded = true;
    body.velocity.x *= 0.998;
    body.velocity.z *= 0.998;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{BodyKind, GlobalTransform, TriangleMesh, WorldGeometry};
    use approx::assert_relative_eq;
    use glam::Mat4;

    fn zero_gravity_ctx() -> PhysicsContext {
        let mut ctx = PhysicsContext::new();
        ctx.gravity = Vec3::ZERO;
        ctx
    }

    #[test]
    fn unforced_body_at_rest_stays_put() {
        let mut world = World::new();
        let mut pose = Pose::new(Vec3::new(1.0, 2.0, 3.0));
        pose.rotation = Quat::from_rotation_y(0.3);
        let start_rotation = pose.rotation;
        let entity = world.spawn((pose, RigidBody::new(BodyKind::Dynamic, Vec3::ONE)));
        let mut ctx = zero_gravity_ctx();

        for _ in 0..100 {
            physics_step(&mut world, &mut ctx, PHYSICS_DT);
        }

        let pose = world.get::<&Pose>(entity).unwrap();
        assert_eq!(pose.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(pose.rotation, start_rotation);
    }

    #[test]
    fn gravity_integrates_into_velocity_then_position() {
        let mut world = World::new();
        let entity = world.spawn((
            Pose::new(Vec3::new(0.0, 50.0, 0.0)),
            RigidBody::new(BodyKind::Dynamic, Vec3::ONE),
        ));
        let mut ctx = PhysicsContext::new();

        physics_step(&mut world, &mut ctx, PHYSICS_DT);

        let body = world.get::<&RigidBody>(entity).unwrap();
        assert_relative_eq!(body.velocity.y, -9.8 * PHYSICS_DT, epsilon = 1e-5);
        // Accumulators are cleared at the end of the step.
        assert_eq!(body.forces, Vec3::ZERO);
        assert_eq!(body.torques, Vec3::ZERO);

        let pose = world.get::<&Pose>(entity).unwrap();
        assert!(pose.position.y < 50.0);
    }

    #[test]
    fn grounded_drag_bleeds_lateral_speed_faster_than_forward() {
        let mut world = World::new();
        let mut body = RigidBody::new(BodyKind::Dynamic, Vec3::ONE);
        body.is_grounded = true;
        // Sliding diagonally: +x is lateral, -z is forward at identity heading.
        body.velocity = Vec3::new(3.0, 0.0, -3.0);
        let entity = world.spawn((Pose::new(Vec3::ZERO), body));

        integrate_motion(&world, entity, PHYSICS_DT);

        let body = world.get::<&RigidBody>(entity).unwrap();
        assert_relative_eq!(body.velocity.x, 3.0 * 0.90, epsilon = 1e-4);
        assert_relative_eq!(body.velocity.z, -3.0 * 0.995, epsilon = 1e-4);
        assert!(body.velocity.x.abs() < body.velocity.z.abs());
    }

    #[test]
    fn grounded_drag_follows_the_body_frame() {
        let mut world = World::new();
        let mut pose = Pose::new(Vec3::ZERO);
        // Heading rotated 90 degrees, so world -x is this body's forward axis.
        pose.rotation = Quat::from_rotation_y(std::f32::consts::FRAC_PI_2);
        let mut body = RigidBody::new(BodyKind::Dynamic, Vec3::ONE);
        body.is_grounded = true;
        body.velocity = Vec3::new(-2.0, 0.0, 0.0);
        let entity = world.spawn((pose, body));

        integrate_motion(&world, entity, PHYSICS_DT);

        let body = world.get::<&RigidBody>(entity).unwrap();
        // Pure forward motion only sees the forward drag, not the grip.
        assert_relative_eq!(body.velocity.x, -2.0 * 0.995, epsilon = 1e-4);
        assert!(body.velocity.z.abs() < 1e-4);
    }

    #[test]
    fn spin_advances_orientation_about_its_axis_and_stays_unit() {
        let mut world = World::new();
        let mut body = RigidBody::new(BodyKind::Dynamic, Vec3::ONE);
        body.angular_velocity = Vec3::new(0.0, 2.0, 0.0);
        body.angular_drag = 1.0;
        let entity = world.spawn((Pose::new(Vec3::ZERO), body));
        let mut ctx = zero_gravity_ctx();

        for _ in 0..50 {
            physics_step(&mut world, &mut ctx, PHYSICS_DT);
        }

        let pose = world.get::<&Pose>(entity).unwrap();
        let expected = Quat::from_rotation_y(2.0 * PHYSICS_DT * 50.0);
        assert!((pose.rotation * Vec3::X - expected * Vec3::X).length() < 1e-3);
        assert_relative_eq!(pose.rotation.length(), 1.0, epsilon = 1e-5);
    }

    #[test]
    fn fallen_body_respawns_at_spawn_point() {
        let mut world = World::new();
        let mut body = RigidBody::new(BodyKind::Dynamic, Vec3::ONE);
        body.velocity = Vec3::new(12.0, -30.0, 4.0);
        let entity = world.spawn((Pose::new(Vec3::new(0.0, -25.0, 0.0)), body, Respawnable));
        let mut ctx = PhysicsContext::new();

        let report = physics_step(&mut world, &mut ctx, PHYSICS_DT);

        let pose = world.get::<&Pose>(entity).unwrap();
        let body = world.get::<&RigidBody>(entity).unwrap();
        assert_eq!(pose.position, ctx.respawn_position);
        assert_eq!(body.velocity, Vec3::ZERO);
        assert!(body.is_respawning);
        assert_eq!(report.respawned, vec![entity]);
    }

    #[test]
    fn body_without_respawnable_marker_keeps_falling() {
        let mut world = World::new();
        let entity = world.spawn((
            Pose::new(Vec3::new(0.0, -25.0, 0.0)),
            RigidBody::new(BodyKind::Dynamic, Vec3::ONE),
        ));
        let mut ctx = PhysicsContext::new();

        let report = physics_step(&mut world, &mut ctx, PHYSICS_DT);

        let pose = world.get::<&Pose>(entity).unwrap();
        assert!(pose.position.y < -25.0);
        assert!(report.respawned.is_empty());
    }

    #[test]
    fn static_pose_is_never_mutated() {
        let mut world = World::new();
        let floor = world.spawn((
            Pose::new(Vec3::ZERO),
            RigidBody::new(BodyKind::Static, Vec3::new(10.0, 1.0, 10.0)),
        ));
        // Overlapping dynamic box resting in the floor's top face.
        let box_entity = world.spawn((
            Pose::new(Vec3::new(0.0, 0.9, 0.0)),
            RigidBody::new(BodyKind::Dynamic, Vec3::ONE),
        ));
        let mut ctx = PhysicsContext::new();

        let report = physics_step(&mut world, &mut ctx, PHYSICS_DT);
        assert_eq!(report.collisions.len(), 1);

        let floor_pose = world.get::<&Pose>(floor).unwrap();
        assert_eq!(floor_pose.position, Vec3::ZERO);
        assert_eq!(floor_pose.rotation, Quat::IDENTITY);

        // The dynamic box was pushed out and marked grounded.
        let box_pose = world.get::<&Pose>(box_entity).unwrap();
        assert!(box_pose.position.y > 0.9);
        let body = world.get::<&RigidBody>(box_entity).unwrap();
        assert!(body.is_grounded);
    }

    #[test]
    fn resolved_contact_has_no_residual_approach() {
        let mut world = World::new();
        let mut body_a = RigidBody::new(BodyKind::Dynamic, Vec3::splat(2.0));
        body_a.velocity = Vec3::new(5.0, 0.0, 0.0);
        let a = world.spawn((Pose::new(Vec3::ZERO), body_a));

        let mut body_b = RigidBody::new(BodyKind::Dynamic, Vec3::splat(1.0));
        body_b.velocity = Vec3::new(-5.0, 0.0, 0.0);
        let b = world.spawn((Pose::new(Vec3::new(1.4, 0.0, 0.0)), body_b));

        let mut ctx = zero_gravity_ctx();
        let report = physics_step(&mut world, &mut ctx, PHYSICS_DT);
        assert_eq!(report.collisions.len(), 1);

        let event = &report.collisions[0];
        let (velocity_a, velocity_b) = {
            let body_a = world.get::<&RigidBody>(a).unwrap();
            let body_b = world.get::<&RigidBody>(b).unwrap();
            (body_a.velocity, body_b.velocity)
        };
        // Orient the relative velocity the same way the event normal is.
        let relative = if event.entity_a == a {
            velocity_b - velocity_a
        } else {
            velocity_a - velocity_b
        };
        assert!(relative.dot(event.normal) >= -1e-4);

        let body_a = world.get::<&RigidBody>(a).unwrap();
        assert!(body_a.last_impact_impulse > 0.0);
    }

    #[test]
    fn ramp_contact_is_flagged_and_reported() {
        let mut world = World::new();
        world.spawn((
            Pose::new(Vec3::ZERO),
            RigidBody::new(BodyKind::Ramp, Vec3::new(4.0, 1.0, 4.0)),
        ));
        let car = world.spawn((
            Pose::new(Vec3::new(0.0, 0.9, 0.0)),
            RigidBody::new(BodyKind::Dynamic, Vec3::ONE),
        ));
        let mut ctx = PhysicsContext::new();

        let report = physics_step(&mut world, &mut ctx, PHYSICS_DT);

        let body = world.get::<&RigidBody>(car).unwrap();
        assert!(body.is_on_ramp);
        assert_eq!(report.ramp_contacts, vec![car]);
    }

    #[test]
    fn chassis_probe_stops_floor_penetration() {
        let mut world = World::new();
        world.spawn((
            WorldGeometry,
            GlobalTransform(Mat4::IDENTITY),
            TriangleMesh::new(vec![
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(-5.0, 0.0, 5.0),
                Vec3::new(5.0, 0.0, 5.0),
                Vec3::new(-5.0, 0.0, -5.0),
                Vec3::new(5.0, 0.0, 5.0),
                Vec3::new(5.0, 0.0, -5.0),
            ]),
        ));
        let mut body = RigidBody::new(BodyKind::Dynamic, Vec3::ONE);
        body.velocity = Vec3::new(0.0, -20.0, 0.0);
        // Chassis center just above the floor, sinking fast.
        let car = world.spawn((Pose::new(Vec3::new(0.0, 0.1, 0.0)), body));
        let mut ctx = zero_gravity_ctx();

        physics_step(&mut world, &mut ctx, PHYSICS_DT);

        let pose = world.get::<&Pose>(car).unwrap();
        let body = world.get::<&RigidBody>(car).unwrap();
        assert_relative_eq!(pose.position.y, CHASSIS_CLEARANCE, epsilon = 1e-3);
        assert!(body.velocity.y >= 0.0);
        assert!(body.is_grounded);
    }

    #[test]
    fn accumulator_runs_whole_steps_and_reports_alpha() {
        let mut world = World::new();
        let entity = world.spawn((
            Pose::new(Vec3::new(0.0, 50.0, 0.0)),
            RigidBody::new(BodyKind::Dynamic, Vec3::ONE),
        ));
        let mut ctx = PhysicsContext::new();
        let mut accumulator = 0.0;

        let (_, alpha) = run_fixed_steps(&mut world, &mut ctx, &mut accumulator, 2.5 * PHYSICS_DT);

        // Two whole steps of gravity, half a step left over.
        let body = world.get::<&RigidBody>(entity).unwrap();
        assert_relative_eq!(body.velocity.y, -9.8 * 2.0 * PHYSICS_DT, epsilon = 1e-5);
        assert_relative_eq!(alpha, 0.5, epsilon = 1e-3);
    }
}
