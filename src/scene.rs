//! Splat scenes: geometry the renderer uploads plus change notification.

use bytemuck::{Pod, Zeroable};
use glam::{Mat3, Quat, Vec3};
use half::f16;

use crate::config::TEXTURE_WIDTH;
use crate::error::SceneError;
use crate::gl::TextureImage;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

/// What the renderer needs from a scene.
pub trait Scene {
    /// Flat `xyz` triples.
    fn positions(&self) -> &[f32];
    fn vertex_count(&self) -> usize;
    /// RGBA32UI covariance/color payload, two texels per point.
    fn texture(&self) -> TextureImage<'_>;
    /// Registers `listener` to run whenever the geometry changes.
    fn subscribe(&mut self, listener: Box<dyn FnMut()>) -> ListenerId;
    /// Returns false if `id` was not registered.
    fn unsubscribe(&mut self, id: ListenerId) -> bool;
}

// Observer list shared by scene implementations.
#[derive(Default)]
pub struct Listeners {
    next_id: u64,
    entries: Vec<(ListenerId, Box<dyn FnMut()>)>,
}

impl Listeners {
    pub fn add(&mut self, listener: Box<dyn FnMut()>) -> ListenerId {
        let id = ListenerId(self.next_id);
        self.next_id += 1;
        self.entries.push((id, listener));
        id
    }

    pub fn remove(&mut self, id: ListenerId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(existing, _)| *existing != id);
        self.entries.len() != before
    }

    pub fn notify(&mut self) {
        for (_, listener) in self.entries.iter_mut() {
            listener();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Splat {
    pub position: Vec3,
    pub scale: Vec3,
    pub rotation: Quat,
    pub color: [u8; 4],
}

impl Splat {
    /// `Σ = (R S)(R S)^T`.
    pub fn covariance(&self) -> Mat3 {
        let r = Mat3::from_quat(self.rotation);
        let rs = Mat3::from_cols(r.x_axis * self.scale.x, r.y_axis * self.scale.y, r.z_axis * self.scale.z);
        rs * rs.transpose()
    }
}

// One record of the `.splat` format.
#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
struct SplatRecord {
    position: [f32; 3],
    scale: [f32; 3],
    color: [u8; 4],
    // w, x, y, z mapped from [0, 255] to [-1, 1).
    rotation: [u8; 4],
}

pub const SPLAT_RECORD_SIZE: usize = std::mem::size_of::<SplatRecord>();

impl From<SplatRecord> for Splat {
    fn from(record: SplatRecord) -> Self {
        let [w, x, y, z] = record.rotation.map(|b| (b as f32 - 128.0) / 128.0);
        let rotation = Quat::from_xyzw(x, y, z, w);
        let rotation = if rotation.length_squared() > 0.0 {
            rotation.normalize()
        } else {
            Quat::IDENTITY
        };
        Splat {
            position: Vec3::from_array(record.position),
            scale: Vec3::from_array(record.scale),
            rotation,
            color: record.color,
        }
    }
}

fn pack_half2(a: f32, b: f32) -> u32 {
    (f16::from_f32(a).to_bits() as u32) | ((f16::from_f32(b).to_bits() as u32) << 16)
}

/// Encodes splats into the texture layout the vertex shader reads.
///
/// Point `i` occupies texels `((i & 0x3ff) << 1, i >> 10)` and the one to its
/// right: the first holds the position bits, the second the covariance
/// (scaled by 4, as half pairs) and the RGBA8 color.
pub fn encode_texture(splats: &[Splat]) -> (u32, Vec<u32>) {
    let height = (2 * splats.len() as u32).div_ceil(TEXTURE_WIDTH);
    let mut data = vec![0u32; (TEXTURE_WIDTH * height * 4) as usize];

    for (i, splat) in splats.iter().enumerate() {
        let x = ((i as u32 & 0x3ff) << 1) as usize;
        let y = (i as u32 >> 10) as usize;
        let base = (y * TEXTURE_WIDTH as usize + x) * 4;

        data[base] = splat.position.x.to_bits();
        data[base + 1] = splat.position.y.to_bits();
        data[base + 2] = splat.position.z.to_bits();

        let sigma = splat.covariance() * 4.0;
        data[base + 4] = pack_half2(sigma.x_axis.x, sigma.y_axis.x);
        data[base + 5] = pack_half2(sigma.z_axis.x, sigma.y_axis.y);
        data[base + 6] = pack_half2(sigma.z_axis.y, sigma.z_axis.z);
        data[base + 7] = u32::from_le_bytes(splat.color);
    }

    (height, data)
}

/// In-memory splat scene.
#[derive(Default)]
pub struct SplatScene {
    splats: Vec<Splat>,
    positions: Vec<f32>,
    texture_height: u32,
    texture_data: Vec<u32>,
    listeners: Listeners,
}

impl SplatScene {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_splats(splats: Vec<Splat>) -> Self {
        let mut scene = Self::default();
        scene.load(splats);
        scene
    }

    /// Decodes a buffer of 32-byte `.splat` records.
    pub fn from_splat_bytes(bytes: &[u8]) -> Result<Self, SceneError> {
        Ok(Self::from_splats(decode_splat_bytes(bytes)?))
    }

    pub fn splats(&self) -> &[Splat] {
        &self.splats
    }

    /// Replaces the geometry and notifies every listener.
    pub fn set_splats(&mut self, splats: Vec<Splat>) {
        self.load(splats);
        log::debug!("scene changed, {} splats, notifying {} listeners", self.splats.len(), self.listeners.len());
        self.listeners.notify();
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    fn load(&mut self, splats: Vec<Splat>) {
        self.positions = splats.iter().flat_map(|s| s.position.to_array()).collect();
        let (height, data) = encode_texture(&splats);
        self.texture_height = height;
        self.texture_data = data;
        self.splats = splats;
    }
}

pub fn decode_splat_bytes(bytes: &[u8]) -> Result<Vec<Splat>, SceneError> {
    if bytes.len() % SPLAT_RECORD_SIZE != 0 {
        return Err(SceneError::Truncated {
            len: bytes.len(),
            record: SPLAT_RECORD_SIZE,
        });
    }
    Ok(bytes
        .chunks_exact(SPLAT_RECORD_SIZE)
        .map(|chunk| Splat::from(bytemuck::pod_read_unaligned::<SplatRecord>(chunk)))
        .collect())
}

impl Scene for SplatScene {
    fn positions(&self) -> &[f32] {
        &self.positions
    }

    fn vertex_count(&self) -> usize {
        self.splats.len()
    }

    fn texture(&self) -> TextureImage<'_> {
        TextureImage {
            width: TEXTURE_WIDTH,
            height: self.texture_height,
            data: &self.texture_data,
        }
    }

    fn subscribe(&mut self, listener: Box<dyn FnMut()>) -> ListenerId {
        self.listeners.add(listener)
    }

    fn unsubscribe(&mut self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }
}
