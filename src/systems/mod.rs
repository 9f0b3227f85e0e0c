mod collision;
mod physics;
mod raycast;
mod suspension;
mod transform;

pub use collision::Obb;
pub use physics::{physics_step, run_fixed_steps, PHYSICS_DT};
pub use raycast::{cast_ray, cast_ray_world, Ray, RaycastHit};
pub use transform::transform_propagation_system;
