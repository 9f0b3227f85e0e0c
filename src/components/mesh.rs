use glam::Vec3;
use rand::Rng;

/// Triangle soup in entity-local space, used for raycasting and impact
/// deformation. Every consecutive run of three positions is one triangle.
pub struct TriangleMesh {
    positions: Vec<Vec3>,
}

impl TriangleMesh {
    /// `positions.len()` must be a multiple of 3; a trailing partial triangle
    /// is ignored by the queries.
    pub fn new(positions: Vec<Vec3>) -> Self {
        Self { positions }
    }

    pub fn triangle_count(&self) -> usize {
        self.positions.len() / 3
    }

    pub fn triangle(&self, index: usize) -> [Vec3; 3] {
        let i = index * 3;
        [self.positions[i], self.positions[i + 1], self.positions[i + 2]]
    }

    pub fn positions(&self) -> &[Vec3] {
        &self.positions
    }

    /// Dent the mesh around a local-space impact point: vertices within
    /// `radius` move toward the local origin, scaled by proximity to the
    /// impact, with a little jitter so repeated hits don't look stamped.
    ///
    /// Cosmetic only; collision response never reads the deformed positions.
    pub fn apply_deformation(
        &mut self,
        impact_point: Vec3,
        force: f32,
        radius: f32,
        rng: &mut impl Rng,
    ) {
        let r_squared = radius * radius;

        for vertex in &mut self.positions {
            let d_squared = vertex.distance_squared(impact_point);
            if d_squared >= r_squared {
                continue;
            }

            let intensity = (radius - d_squared.sqrt()) / radius;
            let amount = force * intensity * 0.05;
            let to_center = (-*vertex).normalize_or_zero();
            let noise = (rng.gen::<f32>() - 0.5) * 0.05;

            *vertex += to_center * amount + Vec3::splat(noise);
        }
    }
}
