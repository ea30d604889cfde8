//! Recording GL backend for native builds.
//!
//! Objects are plain ids; every call is appended to a log that tests and the
//! demo binary inspect. Buffers keep their bytes so uploads can be checked,
//! and transform-feedback passes are simulated by summing the float
//! attributes bound to the input vertex array.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet};

use super::{
    AttribKind, AttribLayout, BufferUsage, ClearFlags, GlContext, Primitive, RenderState, ShaderStage,
    TextureImage, Uniform,
};
use crate::error::{GlError, GlResult};
use crate::shaders;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct GlId(pub u32);

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ObjectKind {
    Shader,
    Program,
    Buffer,
    Texture,
    VertexArray,
    TransformFeedback,
}

#[derive(Clone, Debug, PartialEq)]
pub enum GlCall {
    SetDrawingBufferSize(u32, u32),
    Viewport(u32, u32),
    Create(ObjectKind, GlId),
    Delete(ObjectKind, GlId),
    CompileShader(GlId, ShaderStage),
    LinkProgram { program: GlId, feedback_varyings: Vec<String> },
    UseProgram(GlId),
    Uniform { name: String, value: Uniform },
    BufferData { buffer: GlId, len: usize, usage: BufferUsage },
    VertexAttrib { vertex_array: GlId, buffer: GlId, layout: AttribLayout },
    UploadTexture { texture: GlId, unit: u32, width: u32, height: u32 },
    RenderState(RenderState),
    Clear(ClearFlags),
    DrawArraysInstanced { program: GlId, vertex_array: GlId, primitive: Primitive, first: i32, count: i32, instances: i32 },
    TransformFeedbackPass { program: GlId, input: GlId, output: GlId, count: i32 },
}

// Attribute locations handed out by `attrib_location`, by position.
const ATTRIBUTES: [&str; 4] = [
    shaders::ATTR_POSITION,
    shaders::ATTR_INDEX,
    shaders::ATTR_PARTICLE_SOURCE,
    shaders::ATTR_PARTICLE,
];

#[derive(Default)]
struct State {
    next_id: u32,
    drawing_size: (u32, u32),
    client_size: (u32, u32),
    live: HashMap<GlId, ObjectKind>,
    created: HashMap<ObjectKind, usize>,
    invalid_deletes: usize,
    shaders: HashMap<GlId, (ShaderStage, bool)>,
    linked: HashSet<GlId>,
    buffers: HashMap<GlId, Vec<u8>>,
    attribs: HashMap<GlId, Vec<(AttribLayout, GlId)>>,
    uniforms: HashMap<String, Uniform>,
    calls: Vec<GlCall>,
    failing_stage: Option<ShaderStage>,
    context_lost: bool,
    allocations_left: Option<usize>,
}

pub struct HeadlessGl {
    state: RefCell<State>,
}

impl HeadlessGl {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            state: RefCell::new(State {
                next_id: 1,
                drawing_size: (width, height),
                client_size: (width, height),
                ..Default::default()
            }),
        }
    }

    // === FAILURE INJECTION ===

    /// Every later compile of `stage` fails with an info log.
    pub fn fail_compile(&self, stage: ShaderStage) {
        self.state.borrow_mut().failing_stage = Some(stage);
    }

    pub fn lose_context(&self) {
        self.state.borrow_mut().context_lost = true;
    }

    pub fn restore_context(&self) {
        let mut state = self.state.borrow_mut();
        state.context_lost = false;
        state.allocations_left = None;
    }

    /// Loses the context after `count` more successful object creations.
    pub fn fail_after_allocations(&self, count: usize) {
        self.state.borrow_mut().allocations_left = Some(count);
    }

    pub fn set_client_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().client_size = (width, height);
    }

    // === INSPECTION ===

    pub fn calls(&self) -> Vec<GlCall> {
        self.state.borrow().calls.clone()
    }

    pub fn take_calls(&self) -> Vec<GlCall> {
        std::mem::take(&mut self.state.borrow_mut().calls)
    }

    pub fn live_objects(&self) -> usize {
        self.state.borrow().live.len()
    }

    pub fn live_of(&self, kind: ObjectKind) -> usize {
        self.state.borrow().live.values().filter(|k| **k == kind).count()
    }

    pub fn created_count(&self, kind: ObjectKind) -> usize {
        self.state.borrow().created.get(&kind).copied().unwrap_or(0)
    }

    pub fn invalid_deletes(&self) -> usize {
        self.state.borrow().invalid_deletes
    }

    pub fn uniform(&self, name: &str) -> Option<Uniform> {
        self.state.borrow().uniforms.get(name).copied()
    }

    pub fn buffer_contents(&self, buffer: GlId) -> Option<Vec<u8>> {
        self.state.borrow().buffers.get(&buffer).cloned()
    }

    pub fn buffer_f32(&self, buffer: GlId) -> Option<Vec<f32>> {
        self.buffer_contents(buffer).map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        })
    }

    pub fn buffer_u32(&self, buffer: GlId) -> Option<Vec<u32>> {
        self.buffer_contents(buffer).map(|bytes| {
            bytes
                .chunks_exact(4)
                .map(|c| u32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect()
        })
    }

    pub fn draw_count(&self) -> usize {
        self.count_calls(|call| matches!(call, GlCall::DrawArraysInstanced { .. }))
    }

    pub fn count_calls(&self, pred: impl Fn(&GlCall) -> bool) -> usize {
        self.state.borrow().calls.iter().filter(|call| pred(call)).count()
    }

    fn record(&self, call: GlCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn create(&self, kind: ObjectKind) -> GlResult<GlId> {
        let mut state = self.state.borrow_mut();
        if let Some(left) = state.allocations_left {
            if left == 0 {
                state.context_lost = true;
            } else {
                state.allocations_left = Some(left - 1);
            }
        }
        if state.context_lost {
            return Err(GlError::ContextLost);
        }
        let id = GlId(state.next_id);
        state.next_id += 1;
        state.live.insert(id, kind);
        *state.created.entry(kind).or_default() += 1;
        state.calls.push(GlCall::Create(kind, id));
        Ok(id)
    }

    fn delete(&self, kind: ObjectKind, id: GlId) {
        let mut state = self.state.borrow_mut();
        match state.live.remove(&id) {
            Some(found) if found == kind => {
                state.buffers.remove(&id);
                state.attribs.remove(&id);
                state.calls.push(GlCall::Delete(kind, id));
            }
            Some(found) => {
                log::warn!("delete of {id:?} as {kind:?}, but it is a {found:?}");
                state.live.insert(id, found);
                state.invalid_deletes += 1;
            }
            None => {
                log::warn!("delete of unknown {kind:?} {id:?}");
                state.invalid_deletes += 1;
            }
        }
    }
}

impl GlContext for HeadlessGl {
    type Shader = GlId;
    type Program = GlId;
    type Buffer = GlId;
    type Texture = GlId;
    type VertexArray = GlId;
    type TransformFeedback = GlId;
    type UniformLocation = String;

    fn drawing_buffer_size(&self) -> (u32, u32) {
        self.state.borrow().drawing_size
    }

    fn client_size(&self) -> (u32, u32) {
        self.state.borrow().client_size
    }

    fn set_drawing_buffer_size(&self, width: u32, height: u32) {
        self.state.borrow_mut().drawing_size = (width, height);
        self.record(GlCall::SetDrawingBufferSize(width, height));
    }

    fn viewport(&self, width: u32, height: u32) {
        self.record(GlCall::Viewport(width, height));
    }

    fn create_shader(&self, stage: ShaderStage) -> GlResult<GlId> {
        let id = self.create(ObjectKind::Shader)?;
        self.state.borrow_mut().shaders.insert(id, (stage, false));
        Ok(id)
    }

    fn compile_shader(&self, shader: &GlId, source: &str) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        let failing = state.failing_stage;
        let Some((stage, compiled)) = state.shaders.get_mut(shader) else {
            return Err(format!("unknown shader {shader:?}"));
        };
        let stage = *stage;
        let ok = failing != Some(stage) && !source.trim().is_empty();
        *compiled = ok;
        state.calls.push(GlCall::CompileShader(*shader, stage));
        if ok {
            Ok(())
        } else {
            Err(format!("ERROR: 0:1: {stage:?} shader rejected"))
        }
    }

    fn create_program(&self) -> GlResult<GlId> {
        self.create(ObjectKind::Program)
    }

    fn link_program(
        &self,
        program: &GlId,
        vertex: &GlId,
        fragment: &GlId,
        feedback_varyings: &[&str],
    ) -> Result<(), String> {
        let mut state = self.state.borrow_mut();
        state.calls.push(GlCall::LinkProgram {
            program: *program,
            feedback_varyings: feedback_varyings.iter().map(|v| v.to_string()).collect(),
        });
        let compiled = |id: &GlId| state.shaders.get(id).is_some_and(|(_, ok)| *ok);
        if compiled(vertex) && compiled(fragment) {
            state.linked.insert(*program);
            Ok(())
        } else {
            Err("ERROR: one or more attached shaders not successfully compiled".to_string())
        }
    }

    fn use_program(&self, program: &GlId) {
        self.record(GlCall::UseProgram(*program));
    }

    fn uniform_location(&self, program: &GlId, name: &str) -> Option<String> {
        self.state.borrow().linked.contains(program).then(|| name.to_string())
    }

    fn attrib_location(&self, program: &GlId, name: &str) -> Option<u32> {
        if !self.state.borrow().linked.contains(program) {
            return None;
        }
        ATTRIBUTES.iter().position(|attr| *attr == name).map(|i| i as u32)
    }

    fn set_uniform(&self, _program: &GlId, location: Option<&String>, value: Uniform) {
        let Some(name) = location else { return };
        let mut state = self.state.borrow_mut();
        state.uniforms.insert(name.clone(), value);
        state.calls.push(GlCall::Uniform { name: name.clone(), value });
    }

    fn create_buffer(&self) -> GlResult<GlId> {
        self.create(ObjectKind::Buffer)
    }

    fn buffer_data(&self, buffer: &GlId, data: &[u8], usage: BufferUsage) {
        let mut state = self.state.borrow_mut();
        state.buffers.insert(*buffer, data.to_vec());
        state.calls.push(GlCall::BufferData { buffer: *buffer, len: data.len(), usage });
    }

    fn create_vertex_array(&self) -> GlResult<GlId> {
        self.create(ObjectKind::VertexArray)
    }

    fn vertex_attrib(&self, vertex_array: &GlId, buffer: &GlId, layout: AttribLayout) {
        let mut state = self.state.borrow_mut();
        let bindings = state.attribs.entry(*vertex_array).or_default();
        bindings.retain(|(existing, _)| existing.location != layout.location);
        bindings.push((layout, *buffer));
        state.calls.push(GlCall::VertexAttrib { vertex_array: *vertex_array, buffer: *buffer, layout });
    }

    fn create_texture(&self) -> GlResult<GlId> {
        self.create(ObjectKind::Texture)
    }

    fn upload_texture(&self, texture: &GlId, unit: u32, image: &TextureImage<'_>) {
        self.record(GlCall::UploadTexture {
            texture: *texture,
            unit,
            width: image.width,
            height: image.height,
        });
    }

    fn create_transform_feedback(&self) -> GlResult<GlId> {
        self.create(ObjectKind::TransformFeedback)
    }

    fn apply_render_state(&self, render_state: &RenderState) {
        self.record(GlCall::RenderState(*render_state));
    }

    fn clear(&self, _color: [f32; 4], mask: ClearFlags) {
        self.record(GlCall::Clear(mask));
    }

    fn draw_arrays_instanced(
        &self,
        program: &GlId,
        vertex_array: &GlId,
        primitive: Primitive,
        first: i32,
        count: i32,
        instances: i32,
    ) {
        self.record(GlCall::DrawArraysInstanced {
            program: *program,
            vertex_array: *vertex_array,
            primitive,
            first,
            count,
            instances,
        });
    }

    fn transform_feedback_pass(&self, program: &GlId, input: &GlId, _feedback: &GlId, output: &GlId, count: i32) {
        let mut state = self.state.borrow_mut();
        let floats = count.max(0) as usize * 3;
        let mut sum = vec![0.0f32; floats];
        let sources: Vec<GlId> = state
            .attribs
            .get(input)
            .map(|bindings| {
                bindings
                    .iter()
                    .filter(|(layout, _)| layout.kind == AttribKind::Float && layout.size == 3)
                    .map(|(_, buffer)| *buffer)
                    .collect()
            })
            .unwrap_or_default();
        for source in sources {
            let Some(bytes) = state.buffers.get(&source) else { continue };
            let values: Vec<f32> = bytes
                .chunks_exact(4)
                .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
                .collect();
            for (acc, v) in sum.iter_mut().zip(values) {
                *acc += v;
            }
        }
        state.buffers.insert(*output, bytemuck::cast_slice(&sum).to_vec());
        state.calls.push(GlCall::TransformFeedbackPass {
            program: *program,
            input: *input,
            output: *output,
            count,
        });
    }

    fn delete_shader(&self, shader: &GlId) {
        self.state.borrow_mut().shaders.remove(shader);
        self.delete(ObjectKind::Shader, *shader);
    }

    fn delete_program(&self, program: &GlId) {
        self.state.borrow_mut().linked.remove(program);
        self.delete(ObjectKind::Program, *program);
    }

    fn delete_buffer(&self, buffer: &GlId) {
        self.delete(ObjectKind::Buffer, *buffer);
    }

    fn delete_texture(&self, texture: &GlId) {
        self.delete(ObjectKind::Texture, *texture);
    }

    fn delete_vertex_array(&self, vertex_array: &GlId) {
        self.delete(ObjectKind::VertexArray, *vertex_array);
    }

    fn delete_transform_feedback(&self, feedback: &GlId) {
        self.delete(ObjectKind::TransformFeedback, *feedback);
    }
}
