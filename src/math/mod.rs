mod matrix4;
mod ray;
mod vector3;

pub use matrix4::Matrix4;
pub use ray::{Ray, RayHit};
pub use vector3::Vector3;
