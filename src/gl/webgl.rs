//! WebGL2 backend over `web-sys`.

use js_sys::{Array, Object, Uint32Array};
use wasm_bindgen::{JsCast, JsValue};
use web_sys::{
    HtmlCanvasElement, WebGl2RenderingContext as Gl, WebGlBuffer, WebGlProgram, WebGlShader, WebGlTexture,
    WebGlTransformFeedback, WebGlUniformLocation, WebGlVertexArrayObject,
};

use super::{
    AttribKind, AttribLayout, BlendFactor, BufferUsage, ClearFlags, GlContext, Primitive, RenderState, ShaderStage,
    TextureImage, Uniform,
};
use crate::error::{GlError, GlResult};

pub struct WebGl2Context {
    gl: Gl,
    canvas: HtmlCanvasElement,
}

impl WebGl2Context {
    pub fn from_canvas(canvas: HtmlCanvasElement) -> GlResult<Self> {
        let options = Object::new();
        js_sys::Reflect::set(&options, &"antialias".into(), &JsValue::FALSE)
            .map_err(|e| GlError::Unavailable(format!("{e:?}")))?;

        let gl = canvas
            .get_context_with_context_options("webgl2", &options)
            .map_err(|e| GlError::Unavailable(format!("{e:?}")))?
            .ok_or_else(|| GlError::Unavailable("canvas has no webgl2 context".to_string()))?
            .dyn_into::<Gl>()
            .map_err(|_| GlError::Unavailable("context is not WebGL2".to_string()))?;

        log::info!("WebGL2 context created ({}x{})", canvas.width(), canvas.height());
        Ok(Self { gl, canvas })
    }

    pub fn canvas(&self) -> &HtmlCanvasElement {
        &self.canvas
    }

    pub fn raw(&self) -> &Gl {
        &self.gl
    }

    fn allocated<T>(&self, object: Option<T>, what: &'static str) -> GlResult<T> {
        object.ok_or_else(|| {
            if self.gl.is_context_lost() {
                GlError::ContextLost
            } else {
                GlError::Allocation(what)
            }
        })
    }
}

fn stage_enum(stage: ShaderStage) -> u32 {
    match stage {
        ShaderStage::Vertex => Gl::VERTEX_SHADER,
        ShaderStage::Fragment => Gl::FRAGMENT_SHADER,
    }
}

fn usage_enum(usage: BufferUsage) -> u32 {
    match usage {
        BufferUsage::StaticDraw => Gl::STATIC_DRAW,
        BufferUsage::DynamicDraw => Gl::DYNAMIC_DRAW,
        BufferUsage::StreamCopy => Gl::STREAM_COPY,
    }
}

fn primitive_enum(primitive: Primitive) -> u32 {
    match primitive {
        Primitive::Points => Gl::POINTS,
        Primitive::TriangleFan => Gl::TRIANGLE_FAN,
    }
}

fn blend_enum(factor: BlendFactor) -> u32 {
    match factor {
        BlendFactor::One => Gl::ONE,
        BlendFactor::OneMinusDstAlpha => Gl::ONE_MINUS_DST_ALPHA,
    }
}

impl GlContext for WebGl2Context {
    type Shader = WebGlShader;
    type Program = WebGlProgram;
    type Buffer = WebGlBuffer;
    type Texture = WebGlTexture;
    type VertexArray = WebGlVertexArrayObject;
    type TransformFeedback = WebGlTransformFeedback;
    type UniformLocation = WebGlUniformLocation;

    fn drawing_buffer_size(&self) -> (u32, u32) {
        (self.canvas.width(), self.canvas.height())
    }

    fn client_size(&self) -> (u32, u32) {
        (self.canvas.client_width().max(0) as u32, self.canvas.client_height().max(0) as u32)
    }

    fn set_drawing_buffer_size(&self, width: u32, height: u32) {
        self.canvas.set_width(width);
        self.canvas.set_height(height);
    }

    fn viewport(&self, width: u32, height: u32) {
        self.gl.viewport(0, 0, width as i32, height as i32);
    }

    fn create_shader(&self, stage: ShaderStage) -> GlResult<WebGlShader> {
        self.allocated(self.gl.create_shader(stage_enum(stage)), "shader")
    }

    fn compile_shader(&self, shader: &WebGlShader, source: &str) -> Result<(), String> {
        self.gl.shader_source(shader, source);
        self.gl.compile_shader(shader);
        if self
            .gl
            .get_shader_parameter(shader, Gl::COMPILE_STATUS)
            .as_bool()
            .unwrap_or(false)
        {
            Ok(())
        } else {
            Err(self
                .gl
                .get_shader_info_log(shader)
                .unwrap_or_else(|| "unknown compile error".to_string()))
        }
    }

    fn create_program(&self) -> GlResult<WebGlProgram> {
        self.allocated(self.gl.create_program(), "program")
    }

    fn link_program(
        &self,
        program: &WebGlProgram,
        vertex: &WebGlShader,
        fragment: &WebGlShader,
        feedback_varyings: &[&str],
    ) -> Result<(), String> {
        self.gl.attach_shader(program, vertex);
        self.gl.attach_shader(program, fragment);
        if !feedback_varyings.is_empty() {
            let varyings: Array = feedback_varyings.iter().map(|v| JsValue::from_str(v)).collect();
            self.gl
                .transform_feedback_varyings(program, &varyings, Gl::SEPARATE_ATTRIBS);
        }
        self.gl.link_program(program);
        if self
            .gl
            .get_program_parameter(program, Gl::LINK_STATUS)
            .as_bool()
            .unwrap_or(false)
        {
            Ok(())
        } else {
            Err(self
                .gl
                .get_program_info_log(program)
                .unwrap_or_else(|| "unknown link error".to_string()))
        }
    }

    fn use_program(&self, program: &WebGlProgram) {
        self.gl.use_program(Some(program));
    }

    fn uniform_location(&self, program: &WebGlProgram, name: &str) -> Option<WebGlUniformLocation> {
        self.gl.get_uniform_location(program, name)
    }

    fn attrib_location(&self, program: &WebGlProgram, name: &str) -> Option<u32> {
        let location = self.gl.get_attrib_location(program, name);
        (location >= 0).then_some(location as u32)
    }

    fn set_uniform(&self, program: &WebGlProgram, location: Option<&WebGlUniformLocation>, value: Uniform) {
        if location.is_none() {
            return;
        }
        self.gl.use_program(Some(program));
        match value {
            Uniform::Bool(v) => self.gl.uniform1i(location, v as i32),
            Uniform::Int(v) => self.gl.uniform1i(location, v),
            Uniform::Float(v) => self.gl.uniform1f(location, v),
            Uniform::Vec2([x, y]) => self.gl.uniform2f(location, x, y),
            Uniform::Vec3([x, y, z]) => self.gl.uniform3f(location, x, y, z),
            Uniform::Mat4(m) => self.gl.uniform_matrix4fv_with_f32_array(location, false, m.as_slice()),
        }
    }

    fn create_buffer(&self) -> GlResult<WebGlBuffer> {
        self.allocated(self.gl.create_buffer(), "buffer")
    }

    fn buffer_data(&self, buffer: &WebGlBuffer, data: &[u8], usage: BufferUsage) {
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, Some(buffer));
        self.gl.buffer_data_with_u8_array(Gl::ARRAY_BUFFER, data, usage_enum(usage));
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, None);
    }

    fn create_vertex_array(&self) -> GlResult<WebGlVertexArrayObject> {
        self.allocated(self.gl.create_vertex_array(), "vertex array")
    }

    fn vertex_attrib(&self, vertex_array: &WebGlVertexArrayObject, buffer: &WebGlBuffer, layout: AttribLayout) {
        self.gl.bind_vertex_array(Some(vertex_array));
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, Some(buffer));
        self.gl.enable_vertex_attrib_array(layout.location);
        match layout.kind {
            AttribKind::Float => {
                self.gl
                    .vertex_attrib_pointer_with_i32(layout.location, layout.size, Gl::FLOAT, false, 0, 0)
            }
            AttribKind::Int => self
                .gl
                .vertex_attrib_i_pointer_with_i32(layout.location, layout.size, Gl::INT, 0, 0),
        }
        self.gl.vertex_attrib_divisor(layout.location, layout.divisor);
        self.gl.bind_vertex_array(None);
        self.gl.bind_buffer(Gl::ARRAY_BUFFER, None);
    }

    fn create_texture(&self) -> GlResult<WebGlTexture> {
        self.allocated(self.gl.create_texture(), "texture")
    }

    fn upload_texture(&self, texture: &WebGlTexture, unit: u32, image: &TextureImage<'_>) {
        self.gl.active_texture(Gl::TEXTURE0 + unit);
        self.gl.bind_texture(Gl::TEXTURE_2D, Some(texture));
        self.gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_S, Gl::CLAMP_TO_EDGE as i32);
        self.gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_WRAP_T, Gl::CLAMP_TO_EDGE as i32);
        self.gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MIN_FILTER, Gl::NEAREST as i32);
        self.gl.tex_parameteri(Gl::TEXTURE_2D, Gl::TEXTURE_MAG_FILTER, Gl::NEAREST as i32);

        let pixels = Uint32Array::from(image.data);
        if let Err(e) = self
            .gl
            .tex_image_2d_with_i32_and_i32_and_i32_and_format_and_type_and_opt_array_buffer_view(
                Gl::TEXTURE_2D,
                0,
                Gl::RGBA32UI as i32,
                image.width as i32,
                image.height as i32,
                0,
                Gl::RGBA_INTEGER,
                Gl::UNSIGNED_INT,
                Some(&*pixels),
            )
        {
            log::error!("texture upload failed: {e:?}");
        }
    }

    fn create_transform_feedback(&self) -> GlResult<WebGlTransformFeedback> {
        self.allocated(self.gl.create_transform_feedback(), "transform feedback")
    }

    fn apply_render_state(&self, state: &RenderState) {
        if state.depth_test {
            self.gl.enable(Gl::DEPTH_TEST);
        } else {
            self.gl.disable(Gl::DEPTH_TEST);
        }
        match state.blend {
            Some(blend) => {
                self.gl.enable(Gl::BLEND);
                self.gl.blend_func_separate(
                    blend_enum(blend.src_rgb),
                    blend_enum(blend.dst_rgb),
                    blend_enum(blend.src_alpha),
                    blend_enum(blend.dst_alpha),
                );
                self.gl.blend_equation_separate(Gl::FUNC_ADD, Gl::FUNC_ADD);
            }
            None => self.gl.disable(Gl::BLEND),
        }
    }

    fn clear(&self, [r, g, b, a]: [f32; 4], mask: ClearFlags) {
        self.gl.clear_color(r, g, b, a);
        self.gl.clear(mask.bits());
    }

    fn draw_arrays_instanced(
        &self,
        program: &WebGlProgram,
        vertex_array: &WebGlVertexArrayObject,
        primitive: Primitive,
        first: i32,
        count: i32,
        instances: i32,
    ) {
        self.gl.use_program(Some(program));
        self.gl.bind_vertex_array(Some(vertex_array));
        self.gl.draw_arrays_instanced(primitive_enum(primitive), first, count, instances);
        self.gl.bind_vertex_array(None);
    }

    fn transform_feedback_pass(
        &self,
        program: &WebGlProgram,
        input: &WebGlVertexArrayObject,
        feedback: &WebGlTransformFeedback,
        output: &WebGlBuffer,
        count: i32,
    ) {
        self.gl.use_program(Some(program));
        self.gl.bind_vertex_array(Some(input));
        self.gl.enable(Gl::RASTERIZER_DISCARD);
        self.gl.bind_transform_feedback(Gl::TRANSFORM_FEEDBACK, Some(feedback));
        self.gl.bind_buffer_base(Gl::TRANSFORM_FEEDBACK_BUFFER, 0, Some(output));

        self.gl.begin_transform_feedback(Gl::POINTS);
        self.gl.draw_arrays(Gl::POINTS, 0, count);
        self.gl.end_transform_feedback();

        self.gl.bind_buffer_base(Gl::TRANSFORM_FEEDBACK_BUFFER, 0, None);
        self.gl.bind_transform_feedback(Gl::TRANSFORM_FEEDBACK, None);
        self.gl.disable(Gl::RASTERIZER_DISCARD);
        self.gl.bind_vertex_array(None);
    }

    fn delete_shader(&self, shader: &WebGlShader) {
        self.gl.delete_shader(Some(shader));
    }

    fn delete_program(&self, program: &WebGlProgram) {
        self.gl.delete_program(Some(program));
    }

    fn delete_buffer(&self, buffer: &WebGlBuffer) {
        self.gl.delete_buffer(Some(buffer));
    }

    fn delete_texture(&self, texture: &WebGlTexture) {
        self.gl.delete_texture(Some(texture));
    }

    fn delete_vertex_array(&self, vertex_array: &WebGlVertexArrayObject) {
        self.gl.delete_vertex_array(Some(vertex_array));
    }

    fn delete_transform_feedback(&self, feedback: &WebGlTransformFeedback) {
        self.gl.delete_transform_feedback(Some(feedback));
    }
}
