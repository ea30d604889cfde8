//! Thin GL abstraction.
//!
//! Every operation receives the objects it acts on explicitly, so no caller
//! depends on whatever happens to be bound in the context. The WebGL2 backend
//! binds, acts and restores inside each call; the headless backend records the
//! call for inspection.

pub mod headless;
#[cfg(target_arch = "wasm32")]
pub mod webgl;

use bitflags::bitflags;

use crate::error::GlResult;
use crate::math::{Matrix4, Vector3};

pub use headless::HeadlessGl;
#[cfg(target_arch = "wasm32")]
pub use webgl::WebGl2Context;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ShaderStage {
    Vertex,
    Fragment,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BufferUsage {
    StaticDraw,
    DynamicDraw,
    StreamCopy,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Primitive {
    Points,
    TriangleFan,
}

bitflags! {
    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    pub struct ClearFlags: u32 {
        const DEPTH = 0x0100;
        const COLOR = 0x4000;
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttribKind {
    Float,
    // Bound with vertexAttribIPointer, read as `int` in GLSL.
    Int,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct AttribLayout {
    pub location: u32,
    pub size: i32,
    pub kind: AttribKind,
    pub divisor: u32,
}

impl AttribLayout {
    pub const fn float(location: u32, size: i32) -> Self {
        Self { location, size, kind: AttribKind::Float, divisor: 0 }
    }

    pub const fn int(location: u32, size: i32) -> Self {
        Self { location, size, kind: AttribKind::Int, divisor: 0 }
    }

    pub const fn with_divisor(mut self, divisor: u32) -> Self {
        self.divisor = divisor;
        self
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Uniform {
    Bool(bool),
    Int(i32),
    Float(f32),
    Vec2([f32; 2]),
    Vec3([f32; 3]),
    Mat4(Matrix4),
}

impl From<bool> for Uniform {
    fn from(v: bool) -> Self {
        Uniform::Bool(v)
    }
}

impl From<f32> for Uniform {
    fn from(v: f32) -> Self {
        Uniform::Float(v)
    }
}

impl From<[f32; 2]> for Uniform {
    fn from(v: [f32; 2]) -> Self {
        Uniform::Vec2(v)
    }
}

impl From<Vector3> for Uniform {
    fn from(v: Vector3) -> Self {
        Uniform::Vec3(v.to_array())
    }
}

impl From<Matrix4> for Uniform {
    fn from(m: Matrix4) -> Self {
        Uniform::Mat4(m)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BlendFactor {
    One,
    OneMinusDstAlpha,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BlendFunc {
    pub src_rgb: BlendFactor,
    pub dst_rgb: BlendFactor,
    pub src_alpha: BlendFactor,
    pub dst_alpha: BlendFactor,
}

/// Fixed-function state applied once per initialization.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RenderState {
    pub depth_test: bool,
    // `None` disables blending. The equation is always FUNC_ADD.
    pub blend: Option<BlendFunc>,
}

impl RenderState {
    /// Front-to-back "under" compositing of sorted splats.
    pub const SPLAT: RenderState = RenderState {
        depth_test: false,
        blend: Some(BlendFunc {
            src_rgb: BlendFactor::OneMinusDstAlpha,
            dst_rgb: BlendFactor::One,
            src_alpha: BlendFactor::OneMinusDstAlpha,
            dst_alpha: BlendFactor::One,
        }),
    };
}

/// RGBA32UI image, four `u32` per texel.
#[derive(Clone, Copy, Debug)]
pub struct TextureImage<'a> {
    pub width: u32,
    pub height: u32,
    pub data: &'a [u32],
}

pub trait GlContext {
    type Shader: Clone;
    type Program: Clone;
    type Buffer: Clone;
    type Texture: Clone;
    type VertexArray: Clone;
    type TransformFeedback: Clone;
    type UniformLocation: Clone;

    // === SURFACE ===
    fn drawing_buffer_size(&self) -> (u32, u32);
    fn client_size(&self) -> (u32, u32);
    fn set_drawing_buffer_size(&self, width: u32, height: u32);
    fn viewport(&self, width: u32, height: u32);

    // === PROGRAMS ===
    fn create_shader(&self, stage: ShaderStage) -> GlResult<Self::Shader>;
    /// Returns the info log on failure.
    fn compile_shader(&self, shader: &Self::Shader, source: &str) -> Result<(), String>;
    fn create_program(&self) -> GlResult<Self::Program>;
    /// Attaches both stages, registers the transform-feedback varyings
    /// (separate attribs) and links. Returns the info log on failure.
    fn link_program(
        &self,
        program: &Self::Program,
        vertex: &Self::Shader,
        fragment: &Self::Shader,
        feedback_varyings: &[&str],
    ) -> Result<(), String>;
    fn use_program(&self, program: &Self::Program);
    fn uniform_location(&self, program: &Self::Program, name: &str) -> Option<Self::UniformLocation>;
    fn attrib_location(&self, program: &Self::Program, name: &str) -> Option<u32>;
    /// A `None` location is silently ignored, as in WebGL.
    fn set_uniform(&self, program: &Self::Program, location: Option<&Self::UniformLocation>, value: Uniform);

    // === RESOURCES ===
    fn create_buffer(&self) -> GlResult<Self::Buffer>;
    fn buffer_data(&self, buffer: &Self::Buffer, data: &[u8], usage: BufferUsage);
    fn create_vertex_array(&self) -> GlResult<Self::VertexArray>;
    fn vertex_attrib(&self, vertex_array: &Self::VertexArray, buffer: &Self::Buffer, layout: AttribLayout);
    fn create_texture(&self) -> GlResult<Self::Texture>;
    /// Uploads with NEAREST filtering and CLAMP_TO_EDGE wrapping and leaves
    /// the texture bound to `unit`.
    fn upload_texture(&self, texture: &Self::Texture, unit: u32, image: &TextureImage<'_>);
    fn create_transform_feedback(&self) -> GlResult<Self::TransformFeedback>;

    // === DRAW ===
    fn apply_render_state(&self, state: &RenderState);
    fn clear(&self, color: [f32; 4], mask: ClearFlags);
    fn draw_arrays_instanced(
        &self,
        program: &Self::Program,
        vertex_array: &Self::VertexArray,
        primitive: Primitive,
        first: i32,
        count: i32,
        instances: i32,
    );
    /// Runs `count` points through `program` with rasterization disabled,
    /// capturing varying 0 into `output`.
    fn transform_feedback_pass(
        &self,
        program: &Self::Program,
        input: &Self::VertexArray,
        feedback: &Self::TransformFeedback,
        output: &Self::Buffer,
        count: i32,
    );

    // === RELEASE ===
    fn delete_shader(&self, shader: &Self::Shader);
    fn delete_program(&self, program: &Self::Program);
    fn delete_buffer(&self, buffer: &Self::Buffer);
    fn delete_texture(&self, texture: &Self::Texture);
    fn delete_vertex_array(&self, vertex_array: &Self::VertexArray);
    fn delete_transform_feedback(&self, feedback: &Self::TransformFeedback);
}

/// Any object a session owns, kept so it can be released later.
pub enum GlObject<G: GlContext> {
    Shader(G::Shader),
    Program(G::Program),
    Buffer(G::Buffer),
    Texture(G::Texture),
    VertexArray(G::VertexArray),
    TransformFeedback(G::TransformFeedback),
}

impl<G: GlContext> GlObject<G> {
    pub fn delete(&self, gl: &G) {
        match self {
            GlObject::Shader(o) => gl.delete_shader(o),
            GlObject::Program(o) => gl.delete_program(o),
            GlObject::Buffer(o) => gl.delete_buffer(o),
            GlObject::Texture(o) => gl.delete_texture(o),
            GlObject::VertexArray(o) => gl.delete_vertex_array(o),
            GlObject::TransformFeedback(o) => gl.delete_transform_feedback(o),
        }
    }
}

pub fn release_all<G: GlContext>(gl: &G, objects: &mut Vec<GlObject<G>>) {
    // Reverse creation order.
    while let Some(object) = objects.pop() {
        object.delete(gl);
    }
}

/// Tracks every object created through it. If dropped without `commit`, the
/// objects are deleted, so a failed initialization leaks nothing.
pub struct Allocation<'a, G: GlContext> {
    gl: &'a G,
    objects: Vec<GlObject<G>>,
}

impl<'a, G: GlContext> Allocation<'a, G> {
    pub fn new(gl: &'a G) -> Self {
        Self { gl, objects: Vec::new() }
    }

    pub fn shader(&mut self, stage: ShaderStage) -> GlResult<G::Shader> {
        let shader = self.gl.create_shader(stage)?;
        self.objects.push(GlObject::Shader(shader.clone()));
        Ok(shader)
    }

    pub fn program(&mut self) -> GlResult<G::Program> {
        let program = self.gl.create_program()?;
        self.objects.push(GlObject::Program(program.clone()));
        Ok(program)
    }

    pub fn buffer(&mut self) -> GlResult<G::Buffer> {
        let buffer = self.gl.create_buffer()?;
        self.objects.push(GlObject::Buffer(buffer.clone()));
        Ok(buffer)
    }

    pub fn texture(&mut self) -> GlResult<G::Texture> {
        let texture = self.gl.create_texture()?;
        self.objects.push(GlObject::Texture(texture.clone()));
        Ok(texture)
    }

    pub fn vertex_array(&mut self) -> GlResult<G::VertexArray> {
        let vertex_array = self.gl.create_vertex_array()?;
        self.objects.push(GlObject::VertexArray(vertex_array.clone()));
        Ok(vertex_array)
    }

    pub fn transform_feedback(&mut self) -> GlResult<G::TransformFeedback> {
        let feedback = self.gl.create_transform_feedback()?;
        self.objects.push(GlObject::TransformFeedback(feedback.clone()));
        Ok(feedback)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Hands ownership of the tracked objects to the caller.
    pub fn commit(mut self) -> Vec<GlObject<G>> {
        std::mem::take(&mut self.objects)
    }
}

impl<G: GlContext> Drop for Allocation<'_, G> {
    fn drop(&mut self) {
        if !self.objects.is_empty() {
            log::warn!("releasing {} GL objects from abandoned allocation", self.objects.len());
            release_all(self.gl, &mut self.objects);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::headless::{HeadlessGl, ObjectKind};
    use super::*;
    use crate::error::GlError;

    #[test]
    fn dropped_allocation_releases_objects() {
        let gl = HeadlessGl::new(800, 600);
        {
            let mut alloc = Allocation::new(&gl);
            alloc.program().unwrap();
            alloc.buffer().unwrap();
            alloc.texture().unwrap();
            assert_eq!(alloc.len(), 3);
            assert_eq!(gl.live_objects(), 3);
        }
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn committed_allocation_survives_until_released() {
        let gl = HeadlessGl::new(800, 600);
        let mut objects = {
            let mut alloc = Allocation::new(&gl);
            alloc.shader(ShaderStage::Vertex).unwrap();
            alloc.vertex_array().unwrap();
            alloc.transform_feedback().unwrap();
            alloc.commit()
        };
        assert_eq!(gl.live_objects(), 3);
        release_all(&gl, &mut objects);
        assert!(objects.is_empty());
        assert_eq!(gl.live_objects(), 0);
        assert_eq!(gl.created_count(ObjectKind::TransformFeedback), 1);
    }

    #[test]
    fn allocation_failure_propagates() {
        let gl = HeadlessGl::new(800, 600);
        gl.fail_after_allocations(1);
        let mut alloc = Allocation::new(&gl);
        assert!(alloc.buffer().is_ok());
        assert_eq!(alloc.buffer(), Err(GlError::ContextLost));
        drop(alloc);
        assert_eq!(gl.live_objects(), 0);
    }

    #[test]
    fn splat_blend_state_is_under_operator() {
        let blend = RenderState::SPLAT.blend.unwrap();
        assert!(!RenderState::SPLAT.depth_test);
        assert_eq!(blend.src_rgb, BlendFactor::OneMinusDstAlpha);
        assert_eq!(blend.dst_rgb, BlendFactor::One);
        assert_eq!(ClearFlags::COLOR.bits(), 0x4000);
    }
}
