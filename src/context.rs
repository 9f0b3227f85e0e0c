use glam::Vec3;
use hecs::Entity;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::components::CollisionEvent;
use crate::systems::{Ray, RaycastHit};

const DEFAULT_GRAVITY: Vec3 = Vec3::new(0.0, -9.8, 0.0);
const DEFAULT_RESPAWN_Y: f32 = -20.0;
const DEFAULT_RESPAWN_POSITION: Vec3 = Vec3::new(0.0, 10.0, 0.0);

/// One recorded suspension/probe raycast, kept for debug visualization.
/// Rebuilt every step; carries no semantic weight for the simulation.
pub struct DebugRaycast {
    pub ray: Ray,
    pub hit: Option<RaycastHit>,
    pub color: Vec3,
}

/// Simulation configuration plus per-step scratch state, constructed once by
/// the caller and passed by reference into the step. Replaces any notion of
/// process-wide mutable state in the physics core.
pub struct PhysicsContext {
    pub gravity: Vec3,
    /// Bodies below this height get teleported back to the spawn point.
    pub respawn_y_threshold: f32,
    pub respawn_position: Vec3,
    /// Raycast records for the external debug renderer, cleared each step.
    pub debug_raycasts: Vec<DebugRaycast>,
    pub(crate) rng: SmallRng,
}

impl PhysicsContext {
    pub fn new() -> Self {
        Self::with_seed(0)
    }

    /// Seeds the jitter source used by impact deformation. The simulation
    /// itself is deterministic regardless of seed.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            gravity: DEFAULT_GRAVITY,
            respawn_y_threshold: DEFAULT_RESPAWN_Y,
            respawn_position: DEFAULT_RESPAWN_POSITION,
            debug_raycasts: Vec::new(),
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for PhysicsContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Everything a step produced that gameplay code may want to react to:
/// resolved contacts, respawned bodies, and ramp touches.
#[derive(Default)]
pub struct StepReport {
    pub collisions: Vec<CollisionEvent>,
    pub respawned: Vec<Entity>,
    pub ramp_contacts: Vec<Entity>,
}

impl StepReport {
    pub(crate) fn merge(&mut self, other: StepReport) {
        self.collisions.extend(other.collisions);
        self.respawned.extend(other.respawned);
        self.ramp_contacts.extend(other.ramp_contacts);
    }
}
