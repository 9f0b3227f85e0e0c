use glam::Vec3;
use hecs::Entity;

/// What role a body plays in the simulation.
///
/// `Static` and `Ramp` bodies are immovable: infinite mass, never integrated,
/// never repositioned. `Ramp` additionally reports ramp contact to colliding
/// dynamic bodies so gameplay can react to it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BodyKind {
    Static,
    Dynamic,
    Ramp,
}

impl BodyKind {
    pub fn is_dynamic(self) -> bool {
        matches!(self, BodyKind::Dynamic)
    }
}

/// Rigid-body state attached to an entity with a [`Pose`](crate::components::Pose).
///
/// `forces` and `torques` are per-step accumulators: suspension and external
/// controllers add into them during a step, and the step clears them after
/// integration. They are not persistent state.
pub struct RigidBody {
    pub kind: BodyKind,
    /// Full extents of the body's oriented bounding box, per local axis.
    pub obb_size: Vec3,

    /// Linear velocity, world space.
    pub velocity: Vec3,
    /// Angular velocity, world space.
    pub angular_velocity: Vec3,
    /// Per-step force accumulator.
    pub forces: Vec3,
    /// Per-step torque accumulator.
    pub torques: Vec3,

    /// 0 for static bodies, 1 for dynamic bodies (unit mass).
    pub inverse_mass: f32,
    /// Scalar inertia proxy from the box cross-section; 0 for static bodies.
    pub inverse_inertia: f32,

    /// Aggregate ground normal from the suspension, world up when airborne.
    pub ground_normal: Vec3,
    pub is_grounded: bool,
    pub is_on_ramp: bool,
    pub is_respawning: bool,
    /// Scalar magnitude of impulses resolved against this body in the last
    /// step. Read by external damage/stunt logic; this core only produces it.
    pub last_impact_impulse: f32,

    /// Forward-axis velocity retention per step while grounded.
    pub linear_drag: f32,
    /// Lateral-axis velocity retention per step while grounded (tire grip).
    pub lateral_grip: f32,
    /// Angular velocity retention per step, applied unconditionally.
    pub angular_drag: f32,

    /// Vehicle tuning constants, opaque to the physics core; consumed by the
    /// external vehicle controller.
    pub turn_speed: f32,
    pub acceleration_factor: f32,
}

impl RigidBody {
    /// `obb_size` is the full extent of the collision box on each local axis.
    pub fn new(kind: BodyKind, obb_size: Vec3) -> Self {
        let (inverse_mass, inverse_inertia) = match kind {
            BodyKind::Static | BodyKind::Ramp => (0.0, 0.0),
            BodyKind::Dynamic => {
                // Unit mass; scalar inertia from the box cross-section,
                // I = m(w² + d²)/12 about the vertical axis.
                let cross = obb_size.x * obb_size.x + obb_size.z * obb_size.z;
                let inverse_inertia = if cross > 1e-6 { 12.0 / cross } else { 0.0 };
                (1.0, inverse_inertia)
            }
        };

        Self {
            kind,
            obb_size,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            forces: Vec3::ZERO,
            torques: Vec3::ZERO,
            inverse_mass,
            inverse_inertia,
            ground_normal: Vec3::Y,
            is_grounded: false,
            is_on_ramp: false,
            is_respawning: false,
            last_impact_impulse: 0.0,
            linear_drag: 0.995,
            lateral_grip: 0.90,
            angular_drag: 0.95,
            turn_speed: 2.5,
            acceleration_factor: 100.0,
        }
    }

    /// Clear the per-step contact and respawn flags. Called at the start of
    /// every step, before suspension and integration.
    pub(crate) fn reset_step_flags(&mut self) {
        self.is_grounded = false;
        self.is_on_ramp = false;
        self.is_respawning = false;
        self.last_impact_impulse = 0.0;
    }
}

/// Raycast spring/damper suspension configuration for a vehicle body.
///
/// Pure configuration: per-step wheel contact results are transient and never
/// persisted here.
#[derive(Clone)]
pub struct Suspension {
    /// Spring constant, force per meter of compression.
    pub stiffness: f32,
    /// Damping against velocity along the contact normal.
    pub damping: f32,
    /// Rest height: wheel rays shorter than this count as ground contact.
    pub height: f32,
    /// Wheel mount points in body-local space.
    pub wheel_positions: Vec<Vec3>,
}

impl Suspension {
    pub fn new(stiffness: f32, damping: f32, height: f32, wheel_positions: Vec<Vec3>) -> Self {
        Self {
            stiffness,
            damping,
            height,
            wheel_positions,
        }
    }
}

/// Marker: static raycastable world geometry (track, ground, walls).
/// Suspension and chassis probes cast against entities carrying this.
pub struct WorldGeometry;

/// Marker: entity is teleported back to the spawn point when it falls below
/// the world's respawn threshold.
pub struct Respawnable;

/// Collision contact produced by the detection phase.
/// `normal` always points from `entity_a` toward `entity_b`.
pub struct CollisionEvent {
    pub entity_a: Entity,
    pub entity_b: Entity,
    pub normal: Vec3,
    pub penetration: f32,
}
