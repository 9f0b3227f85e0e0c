//! Fixed-timestep rigid-body physics core for vehicle games.
//!
//! Entities live in a caller-owned [`hecs::World`]; this crate supplies the
//! components (poses, rigid bodies, suspensions, triangle meshes) and the
//! systems that step them: OBB/SAT collision detection with impulse-based
//! resolution, raycast spring/damper suspension, triangle-mesh raycasting,
//! and out-of-bounds respawning.
//!
//! The only simulation entry point is [`physics_step`] (or the accumulator
//! driver [`run_fixed_steps`]); everything else — rendering, input, asset
//! loading, vehicle steering — belongs to the caller. A [`PhysicsContext`]
//! built once by the caller carries gravity, respawn configuration, and the
//! per-step debug-raycast log.

pub mod components;
pub mod context;
pub mod systems;

pub use components::{
    attach_child, detach_child, BodyKind, Children, CollisionEvent, GlobalTransform, Parent, Pose,
    PreviousPose, Respawnable, RigidBody, Suspension, TriangleMesh, WorldGeometry,
};
pub use context::{DebugRaycast, PhysicsContext, StepReport};
pub use systems::{
    cast_ray, cast_ray_world, physics_step, run_fixed_steps, transform_propagation_system, Obb,
    Ray, RaycastHit, PHYSICS_DT,
};
