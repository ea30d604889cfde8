use super::{Matrix4, Vector3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vector3,
    // Expected to be unit length.
    pub direction: Vector3,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit {
    /// Distance along the ray to the first surface crossing.
    pub t0: f32,
    pub point: Vector3,
}

impl Ray {
    pub const fn new(origin: Vector3, direction: Vector3) -> Self {
        Self { origin, direction }
    }

    /// Picking ray through the canvas pixel `(x, y)`.
    ///
    /// The pixel is mapped to the far plane in NDC, un-projected through the
    /// inverse of `view_proj`, and the direction is taken from `origin` towards it.
    pub fn from_screen(x: f32, y: f32, width: f32, height: f32, view_proj: &Matrix4, origin: Vector3) -> Ray {
        let ndc = Vector3::new((x / width) * 2.0 - 1.0, -(y / height) * 2.0 + 1.0, 1.0);
        let world = ndc.transform_mat4(&Matrix4::invert(view_proj));
        Ray::new(origin, world.subtract(origin).normalize())
    }

    /// Analytic ray/sphere test. Spheres behind the origin never hit.
    pub fn intersect_sphere(&self, center: Vector3, radius: f32) -> Option<RayHit> {
        let oc = center.subtract(self.origin);
        let t = oc.dot(self.direction);
        if t < 0.0 {
            log::trace!("ray miss: sphere at {center:?} behind origin");
            return None;
        }

        let h2 = oc.dot(oc) - t * t;
        let r2 = radius * radius;
        if h2 > r2 {
            log::trace!("ray miss: closest approach {} > radius {radius}", h2.sqrt());
            return None;
        }

        let t0 = t - (r2 - h2).sqrt();
        Some(RayHit {
            t0,
            point: self.origin.add(self.direction.multiply_scalar(t0)),
        })
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn hits_sphere_in_front() {
        let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, 1.0));
        let hit = ray.intersect_sphere(Vector3::new(0.0, 0.0, 5.0), 1.0).unwrap();
        assert_eq!(hit.t0, 4.0);
        assert_eq!(hit.point, Vector3::new(0.0, 0.0, 4.0));
    }

    #[test]
    fn misses_offset_sphere() {
        let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, 1.0));
        assert!(ray.intersect_sphere(Vector3::new(5.0, 5.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn misses_sphere_behind_origin() {
        let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, 1.0));
        assert!(ray.intersect_sphere(Vector3::new(0.0, 0.0, -5.0), 1.0).is_none());
    }

    #[test]
    fn camera_ray_hits_unit_sphere_at_origin() {
        let ray = Ray::new(Vector3::new(0.0, 0.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        let hit = ray.intersect_sphere(Vector3::new(0.0, 0.0, 0.0), 1.0).unwrap();
        assert_eq!(hit.t0, 4.0);
        assert_eq!(hit.point, Vector3::new(0.0, 0.0, -1.0));
    }

    #[test]
    fn camera_ray_misses_sphere_off_axis() {
        let ray = Ray::new(Vector3::new(0.0, 0.0, -5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(ray.intersect_sphere(Vector3::new(5.0, 5.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn ray_past_the_sphere_misses() {
        let ray = Ray::new(Vector3::new(0.0, 0.0, 5.0), Vector3::new(0.0, 0.0, 1.0));
        assert!(ray.intersect_sphere(Vector3::new(0.0, 0.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn grazing_hit_counts() {
        let ray = Ray::new(Vector3::ZERO, Vector3::new(0.0, 0.0, 1.0));
        let hit = ray.intersect_sphere(Vector3::new(1.0, 0.0, 3.0), 1.0).unwrap();
        assert_eq!(hit.t0, 3.0);
    }

    #[test]
    fn screen_center_points_along_view_axis() {
        // Camera at the origin looking down -Z.
        let view_proj = Matrix4::from(glam::Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0));
        let ray = Ray::from_screen(50.0, 50.0, 100.0, 100.0, &view_proj, Vector3::ZERO);
        assert_relative_eq!(ray.direction.length(), 1.0, epsilon = 1e-5);
        assert_relative_eq!(ray.direction.x, 0.0, epsilon = 1e-4);
        assert_relative_eq!(ray.direction.y, 0.0, epsilon = 1e-4);
        assert_relative_eq!(ray.direction.z, -1.0, epsilon = 1e-4);
    }

    #[test]
    fn screen_top_left_points_up_and_left() {
        let view_proj = Matrix4::from(glam::Mat4::perspective_rh(1.0, 1.0, 0.1, 100.0));
        let ray = Ray::from_screen(0.0, 0.0, 100.0, 100.0, &view_proj, Vector3::ZERO);
        assert!(ray.direction.x < 0.0);
        assert!(ray.direction.y > 0.0);
    }
}
