use glam::{Mat3, Mat4, Vec3};
use hecs::World;

use crate::components::{GlobalTransform, TriangleMesh, WorldGeometry};

const EPSILON: f32 = 1e-6;

/// A ray query: origin plus normalized direction, world space.
#[derive(Clone, Copy)]
pub struct Ray {
    pub origin: Vec3,
    pub direction: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, direction: Vec3) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero(),
        }
    }
}

/// Result of a triangle raycast, world space.
#[derive(Clone, Copy)]
pub struct RaycastHit {
    /// True world-space distance from the query ray's origin.
    pub distance: f32,
    pub point: Vec3,
    /// Face normal of the hit triangle, unit length.
    pub normal: Vec3,
}

/// Cast a world-space ray against one entity's triangle mesh, returning the
/// closest hit.
///
/// The ray is transformed into the mesh's local space through the inverse of
/// `world_matrix`, tested with Möller–Trumbore per triangle, and the winning
/// hit is mapped back out: point through the world matrix, normal through its
/// inverse-transpose so non-uniform scale doesn't skew it. The reported
/// distance is measured in world space, since the local-space parameter is
/// scaled by the transform.
pub fn cast_ray(ray: &Ray, world_matrix: &Mat4, mesh: &TriangleMesh) -> Option<RaycastHit> {
    let world_to_local = world_matrix.inverse();
    let local_origin = world_to_local.transform_point3(ray.origin);
    let local_direction = world_to_local.transform_vector3(ray.direction).normalize_or_zero();
    if local_direction == Vec3::ZERO {
        return None;
    }

    let mut closest_t = f32::MAX;
    let mut result: Option<RaycastHit> = None;

    for i in 0..mesh.triangle_count() {
        let [v0, v1, v2] = mesh.triangle(i);
        let edge1 = v1 - v0;
        let edge2 = v2 - v0;

        let ray_cross_edge = local_direction.cross(edge2);
        let determinant = edge1.dot(ray_cross_edge);
        // Ray parallel to the triangle plane.
        if determinant.abs() < EPSILON {
            continue;
        }

        let inverse_determinant = 1.0 / determinant;
        let to_v0 = local_origin - v0;
        let u = to_v0.dot(ray_cross_edge) * inverse_determinant;
        if !(0.0..=1.0).contains(&u) {
            continue;
        }

        let to_v0_cross_edge = to_v0.cross(edge1);
        let v = local_direction.dot(to_v0_cross_edge) * inverse_determinant;
        if v < 0.0 || u + v > 1.0 {
            continue;
        }

        let t = edge2.dot(to_v0_cross_edge) * inverse_determinant;
        if t > EPSILON && t < closest_t {
            closest_t = t;

            let local_point = local_origin + local_direction * t;
            let world_point = world_matrix.transform_point3(local_point);
            let normal_matrix = Mat3::from_mat4(*world_matrix).inverse().transpose();
            let world_normal = (normal_matrix * edge1.cross(edge2)).normalize();

            result = Some(RaycastHit {
                distance: ray.origin.distance(world_point),
                point: world_point,
                normal: world_normal,
            });
        }
    }

    result
}

/// Cast a ray against every [`WorldGeometry`] entity, returning the globally
/// closest hit. Used by the suspension and the chassis floor probe.
pub fn cast_ray_world(world: &World, ray: &Ray) -> Option<RaycastHit> {
    let mut best: Option<RaycastHit> = None;

    for (_, (_geom, global, mesh)) in world
        .query::<(&WorldGeometry, &GlobalTransform, &TriangleMesh)>()
        .iter()
    {
        if let Some(hit) = cast_ray(ray, &global.0, mesh) {
            let is_closer = best.as_ref().map_or(true, |b| hit.distance < b.distance);
            if is_closer {
                best = Some(hit);
            }
        }
    }

    best
}
