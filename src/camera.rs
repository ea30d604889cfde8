use glam::{Mat4, Quat, Vec3};

use crate::math::{Matrix4, Vector3};

/// What the renderer needs from a camera.
pub trait Camera {
    fn position(&self) -> Vector3;
    fn view_matrix(&self) -> Matrix4;
    fn projection_matrix(&self) -> Matrix4;
    fn view_proj(&self) -> Matrix4;
    /// Focal lengths `fx, fy` in pixels.
    fn focal(&self) -> [f32; 2];
    /// Rebuilds the matrices for a drawing buffer of `width` x `height`.
    fn update(&mut self, width: u32, height: u32);
}

/// Pinhole camera with focal lengths in pixels. Camera space looks down +Z
/// with +Y pointing down the screen.
#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    pub position: Vec3,
    pub rotation: Quat,
    pub fx: f32,
    pub fy: f32,
    pub near: f32,
    pub far: f32,
    projection: Matrix4,
    view: Matrix4,
    view_proj: Matrix4,
}

impl Default for PerspectiveCamera {
    fn default() -> Self {
        Self::new(Vec3::new(0.0, 0.0, -5.0), Quat::IDENTITY)
    }
}

impl PerspectiveCamera {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        let mut camera = Self {
            position,
            rotation,
            fx: 1159.588,
            fy: 1164.66,
            near: 0.2,
            far: 200.0,
            projection: Matrix4::IDENTITY,
            view: Matrix4::IDENTITY,
            view_proj: Matrix4::IDENTITY,
        };
        camera.update_view();
        camera
    }

    pub fn with_focal(mut self, fx: f32, fy: f32) -> Self {
        self.fx = fx;
        self.fy = fy;
        self
    }

    pub fn with_clip(mut self, near: f32, far: f32) -> Self {
        self.near = near;
        self.far = far;
        self
    }

    pub fn set_position(&mut self, position: Vec3) {
        self.position = position;
        self.update_view();
    }

    /// Turns the camera so `target` is straight ahead.
    pub fn look_at(&mut self, target: Vec3) {
        let view = Mat4::look_at_lh(self.position, target, Vec3::NEG_Y);
        self.rotation = Quat::from_mat4(&view.inverse()).normalize();
        self.update_view();
    }

    fn update_view(&mut self) {
        let world = Mat4::from_rotation_translation(self.rotation, self.position);
        self.view = Matrix4::from(world.inverse());
        self.view_proj = self.projection.multiply(&self.view);
    }
}

impl Camera for PerspectiveCamera {
    fn position(&self) -> Vector3 {
        Vector3::from(self.position)
    }

    fn view_matrix(&self) -> Matrix4 {
        self.view
    }

    fn projection_matrix(&self) -> Matrix4 {
        self.projection
    }

    fn view_proj(&self) -> Matrix4 {
        self.view_proj
    }

    fn focal(&self) -> [f32; 2] {
        [self.fx, self.fy]
    }

    fn update(&mut self, width: u32, height: u32) {
        let (w, h) = (width.max(1) as f32, height.max(1) as f32);
        let (near, far) = (self.near, self.far);
        #[rustfmt::skip]
        let projection = Matrix4::from_array([
            2.0 * self.fx / w, 0.0, 0.0, 0.0,
            0.0, -2.0 * self.fy / h, 0.0, 0.0,
            0.0, 0.0, far / (far - near), 1.0,
            0.0, 0.0, -(far * near) / (far - near), 0.0,
        ]);
        self.projection = projection;
        self.update_view();
    }
}
