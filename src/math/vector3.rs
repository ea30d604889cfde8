use std::ops::{Add, Mul, Neg, Sub};

use bytemuck::{Pod, Zeroable};
use serde::{Deserialize, Serialize};

use super::Matrix4;

/// Immutable 3-vector. Every operation returns a new value.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable, Serialize, Deserialize)]
pub struct Vector3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vector3 {
    pub const ZERO: Vector3 = Vector3::new(0.0, 0.0, 0.0);

    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn add(self, v: Vector3) -> Vector3 {
        Vector3::new(self.x + v.x, self.y + v.y, self.z + v.z)
    }

    pub fn add_scalar(self, s: f32) -> Vector3 {
        Vector3::new(self.x + s, self.y + s, self.z + s)
    }

    pub fn subtract(self, v: Vector3) -> Vector3 {
        Vector3::new(self.x - v.x, self.y - v.y, self.z - v.z)
    }

    pub fn subtract_scalar(self, s: f32) -> Vector3 {
        Vector3::new(self.x - s, self.y - s, self.z - s)
    }

    pub fn multiply(self, v: Vector3) -> Vector3 {
        Vector3::new(self.x * v.x, self.y * v.y, self.z * v.z)
    }

    pub fn multiply_scalar(self, s: f32) -> Vector3 {
        Vector3::new(self.x * s, self.y * s, self.z * s)
    }

    /// `self + (v - self) * t`. `t` is not clamped.
    pub fn lerp(self, v: Vector3, t: f32) -> Vector3 {
        self.add(v.subtract(self).multiply_scalar(t))
    }

    pub fn length(self) -> f32 {
        self.dot(self).sqrt()
    }

    pub fn distance_to(self, v: Vector3) -> f32 {
        self.subtract(v).length()
    }

    pub fn dot(self, v: Vector3) -> f32 {
        self.x * v.x + self.y * v.y + self.z * v.z
    }

    /// Divides by the length. A zero vector produces NaN components.
    pub fn normalize(self) -> Vector3 {
        let len = self.length();
        Vector3::new(self.x / len, self.y / len, self.z / len)
    }

    /// Homogeneous transform of the point `(x, y, z, 1)` followed by the
    /// perspective divide. A zero `w` produces non-finite components.
    pub fn transform_mat4(self, m: &Matrix4) -> Vector3 {
        let e = &m.buffer;
        let (x, y, z) = (self.x, self.y, self.z);
        let w = 1.0 / (e[3] * x + e[7] * y + e[11] * z + e[15]);
        Vector3::new(
            (e[0] * x + e[4] * y + e[8] * z + e[12]) * w,
            (e[1] * x + e[5] * y + e[9] * z + e[13]) * w,
            (e[2] * x + e[6] * y + e[10] * z + e[14]) * w,
        )
    }

    pub fn from_matrix_position(m: &Matrix4) -> Vector3 {
        Vector3::new(m.buffer[12], m.buffer[13], m.buffer[14])
    }

    pub fn to_array(self) -> [f32; 3] {
        [self.x, self.y, self.z]
    }
}

impl Add for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: Vector3) -> Vector3 {
        Vector3::add(self, rhs)
    }
}

impl Add<f32> for Vector3 {
    type Output = Vector3;
    fn add(self, rhs: f32) -> Vector3 {
        self.add_scalar(rhs)
    }
}

impl Sub for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: Vector3) -> Vector3 {
        self.subtract(rhs)
    }
}

impl Sub<f32> for Vector3 {
    type Output = Vector3;
    fn sub(self, rhs: f32) -> Vector3 {
        self.subtract_scalar(rhs)
    }
}

impl Mul for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: Vector3) -> Vector3 {
        self.multiply(rhs)
    }
}

impl Mul<f32> for Vector3 {
    type Output = Vector3;
    fn mul(self, rhs: f32) -> Vector3 {
        self.multiply_scalar(rhs)
    }
}

impl Neg for Vector3 {
    type Output = Vector3;
    fn neg(self) -> Vector3 {
        Vector3::new(-self.x, -self.y, -self.z)
    }
}

impl From<[f32; 3]> for Vector3 {
    fn from([x, y, z]: [f32; 3]) -> Self {
        Vector3::new(x, y, z)
    }
}

impl From<glam::Vec3> for Vector3 {
    fn from(v: glam::Vec3) -> Self {
        Vector3::new(v.x, v.y, v.z)
    }
}

impl From<Vector3> for glam::Vec3 {
    fn from(v: Vector3) -> Self {
        glam::Vec3::new(v.x, v.y, v.z)
    }
}
