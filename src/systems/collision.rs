use glam::{Mat3, Quat, Vec3};
use hecs::{Entity, World};

use crate::components::{BodyKind, CollisionEvent, GlobalTransform, Pose, RigidBody, TriangleMesh};
use crate::context::{PhysicsContext, StepReport};

/// Ignore MTVs shorter than this; they are numerically meaningless contacts.
const MIN_PENETRATION: f32 = 1e-5;
/// Near-zero restitution: impacts are effectively inelastic.
const RESTITUTION: f32 = 0.1;
/// Cross-product axes shorter than this come from near-parallel edge pairs.
const PARALLEL_AXIS_EPSILON: f32 = 1e-6;

/// An oriented bounding box: a box of full extents `size` centered on
/// `center` and aligned to the axes of `rotation`.
#[derive(Clone, Copy)]
pub struct Obb {
    pub center: Vec3,
    pub rotation: Quat,
    pub size: Vec3,
}

impl Obb {
    /// SAT overlap query returning the minimum translation vector, oriented
    /// from `self`'s center toward `other`'s center, or `None` when the
    /// boxes are disjoint.
    ///
    /// Candidate axes are the 3 local axes of each box plus the pairwise
    /// cross products, with near-parallel pairs filtered out — at most 15,
    /// held in a stack array so the hot path never allocates.
    pub fn collision_response(&self, other: &Obb) -> Option<Vec3> {
        let mut axes = [Vec3::ZERO; 15];
        let axis_count = projection_axes(self, other, &mut axes);

        let mut minimum_overlap = f32::MAX;
        let mut mtv_axis: Option<Vec3> = None;

        for axis in &axes[..axis_count] {
            let (min_a, max_a) = self.project(*axis);
            let (min_b, max_b) = other.project(*axis);
            if max_a < min_b || max_b < min_a {
                // A separating axis exists; the boxes are disjoint.
                return None;
            }

            let overlap = max_a.min(max_b) - min_a.max(min_b);
            if overlap < minimum_overlap {
                minimum_overlap = overlap;
                mtv_axis = Some(*axis);
            }
        }

        let mut axis = mtv_axis?;
        let center_to_center = other.center - self.center;
        if center_to_center.dot(axis) < 0.0 {
            axis = -axis;
        }

        Some(axis * minimum_overlap)
    }

    fn axes(&self) -> [Vec3; 3] {
        let rotation = Mat3::from_quat(self.rotation);
        [rotation.x_axis, rotation.y_axis, rotation.z_axis]
    }

    fn corners(&self) -> [Vec3; 8] {
        let half = self.size * 0.5;
        let [x, y, z] = self.axes();
        let dx = x * half.x;
        let dy = y * half.y;
        let dz = z * half.z;
        let c = self.center;

        [
            c + dx + dy + dz,
            c + dx + dy - dz,
            c + dx - dy + dz,
            c + dx - dy - dz,
            c - dx + dy + dz,
            c - dx + dy - dz,
            c - dx - dy + dz,
            c - dx - dy - dz,
        ]
    }

    /// Project all 8 corners onto `axis`, returning the [min, max] interval.
    fn project(&self, axis: Vec3) -> (f32, f32) {
        let mut min = f32::MAX;
        let mut max = f32::MIN;
        for corner in self.corners() {
            let d = corner.dot(axis);
            min = min.min(d);
            max = max.max(d);
        }
        (min, max)
    }
}

/// Fill `out` with the candidate separating axes for the pair, returning how
/// many were written.
fn projection_axes(a: &Obb, b: &Obb, out: &mut [Vec3; 15]) -> usize {
    let a_axes = a.axes();
    let b_axes = b.axes();

    let mut count = 0;
    for axis in a_axes.iter().chain(b_axes.iter()) {
        out[count] = *axis;
        count += 1;
    }

    for a_axis in &a_axes {
        for b_axis in &b_axes {
            let cross = a_axis.cross(*b_axis);
            if cross.length_squared() > PARALLEL_AXIS_EPSILON {
                out[count] = cross.normalize();
                count += 1;
            }
        }
    }

    count
}

struct BodyEntry {
    entity: Entity,
    kind: BodyKind,
    obb: Obb,
}

/// Brute-force O(n²) pairwise OBB detection. Each OBB is refreshed from its
/// owning entity's pose before testing. Pairs where neither body is dynamic
/// are skipped.
pub(crate) fn detect_collisions(world: &World) -> Vec<CollisionEvent> {
    let entries: Vec<BodyEntry> = world
        .query::<(&Pose, &RigidBody)>()
        .iter()
        .map(|(entity, (pose, body))| BodyEntry {
            entity,
            kind: body.kind,
            obb: Obb {
                center: pose.position,
                rotation: pose.rotation,
                size: body.obb_size,
            },
        })
        .collect();

    let mut events = Vec::new();
    for i in 0..entries.len() {
        for j in (i + 1)..entries.len() {
            let a = &entries[i];
            let b = &entries[j];
            if !a.kind.is_dynamic() && !b.kind.is_dynamic() {
                continue;
            }

            if let Some(mtv) = a.obb.collision_response(&b.obb) {
                let penetration = mtv.length();
                if penetration > MIN_PENETRATION {
                    events.push(CollisionEvent {
                        entity_a: a.entity,
                        entity_b: b.entity,
                        normal: mtv / penetration,
                        penetration,
                    });
                }
            }
        }
    }

    events
}

#[derive(Clone, Copy)]
struct BodyState {
    kind: BodyKind,
    inverse_mass: f32,
    inverse_inertia: f32,
    velocity: Vec3,
    angular_velocity: Vec3,
    position: Vec3,
}

fn read_state(world: &World, entity: Entity) -> Option<BodyState> {
    let body = world.get::<&RigidBody>(entity).ok()?;
    let pose = world.get::<&Pose>(entity).ok()?;
    Some(BodyState {
        kind: body.kind,
        inverse_mass: body.inverse_mass,
        inverse_inertia: body.inverse_inertia,
        velocity: body.velocity,
        angular_velocity: body.angular_velocity,
        position: pose.position,
    })
}

/// Impulse-based response for one contact: mass-proportional positional
/// correction, then a normal impulse with angular terms applied to both
/// dynamic participants. The contact point is approximated as the midpoint
/// of the two entity positions rather than a true manifold point.
pub(crate) fn resolve_collision(
    world: &World,
    ctx: &mut PhysicsContext,
    event: &CollisionEvent,
    report: &mut StepReport,
) {
    let (Some(mut a), Some(mut b)) = (
        read_state(world, event.entity_a),
        read_state(world, event.entity_b),
    ) else {
        return;
    };
    let normal = event.normal;

    let total_inverse_mass = a.inverse_mass + b.inverse_mass;
    if total_inverse_mass <= 0.0 {
        return;
    }

    // Split the penetration in proportion to inverse mass.
    let correction = normal * (event.penetration / total_inverse_mass);
    if a.kind.is_dynamic() {
        if let Ok(mut pose) = world.get::<&mut Pose>(event.entity_a) {
            pose.position -= correction * a.inverse_mass;
            a.position = pose.position;
        }
    }
    if b.kind.is_dynamic() {
        if let Ok(mut pose) = world.get::<&mut Pose>(event.entity_b) {
            pose.position += correction * b.inverse_mass;
            b.position = pose.position;
        }
    }

    let contact_point = (a.position + b.position) * 0.5;
    let ra = contact_point - a.position;
    let rb = contact_point - b.position;

    // Contact-point velocities include the angular contribution.
    let velocity_a = a.velocity + a.angular_velocity.cross(ra);
    let velocity_b = b.velocity + b.angular_velocity.cross(rb);
    let velocity_along_normal = (velocity_b - velocity_a).dot(normal);
    // Separating already; impulses never pull.
    if velocity_along_normal > 0.0 {
        apply_contact_flags(world, event, &a, &b, report);
        return;
    }

    let raw_impulse = -(1.0 + RESTITUTION) * velocity_along_normal;
    let impact_radius = (raw_impulse * 0.05).clamp(0.5, 2.5);
    let impact_force = raw_impulse * 0.1;

    let term_a = if a.inverse_inertia > 0.0 {
        ra.cross(normal).length_squared() * a.inverse_inertia
    } else {
        0.0
    };
    let term_b = if b.inverse_inertia > 0.0 {
        rb.cross(normal).length_squared() * b.inverse_inertia
    } else {
        0.0
    };

    let denominator = total_inverse_mass + term_a + term_b;
    let j = if denominator > 0.0 {
        raw_impulse / denominator
    } else {
        0.0
    };
    let impulse = normal * j;

    if j > 10.0 {
        log::trace!(
            "hard impact between {:?} and {:?}: impulse {j:.2}",
            event.entity_a,
            event.entity_b
        );
    }

    if a.kind.is_dynamic() {
        if let Ok(mut body) = world.get::<&mut RigidBody>(event.entity_a) {
            body.velocity -= impulse * a.inverse_mass;
            body.angular_velocity -= ra.cross(impulse) * a.inverse_inertia;
            body.last_impact_impulse += j;
        }
        deform_at_contact(world, ctx, event.entity_a, contact_point, impact_force, impact_radius);
    }
    if b.kind.is_dynamic() {
        if let Ok(mut body) = world.get::<&mut RigidBody>(event.entity_b) {
            body.velocity += impulse * b.inverse_mass;
            body.angular_velocity += rb.cross(impulse) * b.inverse_inertia;
            body.last_impact_impulse += j;
        }
        deform_at_contact(world, ctx, event.entity_b, contact_point, impact_force, impact_radius);
    }

    apply_contact_flags(world, event, &a, &b, report);
}

/// Grounding heuristic plus ramp-contact reporting. The vertical-component
/// thresholds are a cheap stand-in for contact-manifold classification.
fn apply_contact_flags(
    world: &World,
    event: &CollisionEvent,
    a: &BodyState,
    b: &BodyState,
    report: &mut StepReport,
) {
    if a.kind.is_dynamic() {
        if let Ok(mut body) = world.get::<&mut RigidBody>(event.entity_a) {
            if event.normal.y < 0.5 {
                body.is_grounded = true;
            }
            if b.kind == BodyKind::Ramp {
                body.is_on_ramp = true;
                report.ramp_contacts.push(event.entity_a);
            }
        }
    }
    if b.kind.is_dynamic() {
        if let Ok(mut body) = world.get::<&mut RigidBody>(event.entity_b) {
            if event.normal.y > -0.5 {
                body.is_grounded = true;
            }
            if a.kind == BodyKind::Ramp {
                body.is_on_ramp = true;
                report.ramp_contacts.push(event.entity_b);
            }
        }
    }
}

/// Cosmetic impact dent on the entity's mesh, if it has one. The contact
/// point is mapped into the entity's local space through the propagated
/// world matrix; a parented body's pose alone is only parent-relative.
fn deform_at_contact(
    world: &World,
    ctx: &mut PhysicsContext,
    entity: Entity,
    contact_point: Vec3,
    force: f32,
    radius: f32,
) {
    let world_matrix = match world.get::<&GlobalTransform>(entity) {
        Ok(global) => global.0,
        Err(_) => match world.get::<&Pose>(entity) {
            Ok(pose) => pose.matrix(),
            Err(_) => return,
        },
    };
    let local_point = world_matrix.inverse().transform_point3(contact_point);
    if let Ok(mut mesh) = world.get::<&mut TriangleMesh>(entity) {
        mesh.apply_deformation(local_point, force, radius, &mut ctx.rng);
    }
}
