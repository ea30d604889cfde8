use super::compute::ParticleCompute;
use crate::camera::Camera;
use crate::config::{QUAD_VERTICES, SPLAT_TEXTURE_UNIT};
use crate::error::GlResult;
use crate::gl::{
    Allocation, AttribLayout, BufferUsage, GlContext, GlObject, RenderState, ShaderStage, Uniform, release_all,
};
use crate::pass::ShaderPass;
use crate::scene::Scene;
use crate::shaders::*;
use crate::sort::{SceneGeometry, SortRequest, SortResponse, SortWorker, WorkerSpawner};

pub(crate) struct UniformLocations<G: GlContext> {
    pub projection: Option<G::UniformLocation>,
    pub view: Option<G::UniformLocation>,
    pub focal: Option<G::UniformLocation>,
    pub viewport: Option<G::UniformLocation>,
    pub time: Option<G::UniformLocation>,
    pub texture: Option<G::UniformLocation>,
    pub mouse: Option<G::UniformLocation>,
    pub camera_position: Option<G::UniformLocation>,
    pub clicked: Option<G::UniformLocation>,
    pub ray_direction: Option<G::UniformLocation>,
}

impl<G: GlContext> UniformLocations<G> {
    fn lookup(gl: &G, program: &G::Program) -> Self {
        Self {
            projection: gl.uniform_location(program, U_PROJECTION),
            view: gl.uniform_location(program, U_VIEW),
            focal: gl.uniform_location(program, U_FOCAL),
            viewport: gl.uniform_location(program, U_VIEWPORT),
            time: gl.uniform_location(program, U_TIME),
            texture: gl.uniform_location(program, U_TEXTURE),
            mouse: gl.uniform_location(program, U_MOUSE),
            camera_position: gl.uniform_location(program, U_CAMERA_POSITION),
            clicked: gl.uniform_location(program, U_CLICKED),
            ray_direction: gl.uniform_location(program, U_RAY_DIRECTION),
        }
    }
}

/// Everything one initialization created. `release` is the only way the
/// objects are freed.
pub(crate) struct Session<G: GlContext, W: SortWorker> {
    objects: Vec<GlObject<G>>,
    pub program: G::Program,
    pub vertex_array: G::VertexArray,
    pub index_buffer: G::Buffer,
    pub uniforms: UniformLocations<G>,
    pub compute: ParticleCompute<G>,
    worker: Option<W>,
    pub loaded: bool,
}

impl<G: GlContext, W: SortWorker> Session<G, W> {
    pub fn set(&self, gl: &G, location: &Option<G::UniformLocation>, value: impl Into<Uniform>) {
        gl.set_uniform(&self.program, location.as_ref(), value.into());
    }

    /// Newest reply from this session's worker.
    pub fn poll_sort(&mut self) -> Option<Vec<u32>> {
        match self.worker.as_mut()?.latest()? {
            SortResponse::SortedIndices(order) => Some(order),
        }
    }

    pub fn post(&mut self, request: SortRequest) {
        if let Some(worker) = self.worker.as_mut() {
            if let Err(e) = worker.post(request) {
                log::debug!("sort request dropped: {e}");
            }
        }
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    pub fn release(mut self, gl: &G) {
        if let Some(mut worker) = self.worker.take() {
            worker.terminate();
        }
        log::debug!("releasing {} GL objects", self.objects.len());
        release_all(gl, &mut self.objects);
    }
}

fn compile<G: GlContext>(gl: &G, shader: &G::Shader, source: &str, what: &str) {
    if let Err(info) = gl.compile_shader(shader, source) {
        log::error!("{what} shader failed to compile: {info}");
    }
}

/// Builds a session in the fixed initialization order. Shader errors are
/// logged and tolerated; an allocation failure releases whatever was created
/// and is returned.
pub(crate) fn create<G, S>(
    gl: &G,
    spawner: &mut S,
    scene: &dyn Scene,
    camera: &mut dyn Camera,
    passes: &mut [Box<dyn ShaderPass<G>>],
    time: f32,
) -> GlResult<Session<G, S::Worker>>
where
    G: GlContext,
    S: WorkerSpawner,
{
    let vertex_count = scene.vertex_count();

    let mut worker = match spawner.spawn() {
        Ok(worker) => Some(worker),
        Err(e) => {
            log::error!("{e}; splats will not be drawn until the next initialization");
            None
        }
    };
    if let Some(worker) = worker.as_mut() {
        let geometry = SceneGeometry {
            positions: scene.positions().to_vec(),
            vertex_count,
        };
        if let Err(e) = worker.post(SortRequest::LoadScene(geometry)) {
            log::error!("failed to send scene to sort worker: {e}");
        }
    }

    let (width, height) = gl.drawing_buffer_size();
    gl.viewport(width, height);

    let mut alloc = Allocation::new(gl);

    // === PROGRAM ===
    let vertex = alloc.shader(ShaderStage::Vertex)?;
    compile(gl, &vertex, SPLAT_VERTEX, "vertex");
    let fragment = alloc.shader(ShaderStage::Fragment)?;
    compile(gl, &fragment, SPLAT_FRAGMENT, "fragment");
    let program = alloc.program()?;
    if let Err(info) = gl.link_program(&program, &vertex, &fragment, &[]) {
        log::error!("splat program failed to link: {info}");
    }
    gl.use_program(&program);
    gl.apply_render_state(&RenderState::SPLAT);

    // === CAMERA UNIFORMS ===
    let uniforms = UniformLocations::<G>::lookup(gl, &program);
    camera.update(width, height);
    let set = |location: &Option<G::UniformLocation>, value: Uniform| {
        gl.set_uniform(&program, location.as_ref(), value);
    };
    set(&uniforms.projection, camera.projection_matrix().into());
    set(&uniforms.viewport, Uniform::Vec2([width as f32, height as f32]));
    set(&uniforms.focal, Uniform::Vec2(camera.focal()));
    set(&uniforms.view, camera.view_matrix().into());
    set(&uniforms.time, Uniform::Float(time));

    // === GEOMETRY ===
    let vertex_array = alloc.vertex_array()?;
    let quad = alloc.buffer()?;
    gl.buffer_data(&quad, bytemuck::cast_slice(&QUAD_VERTICES), BufferUsage::StaticDraw);
    if let Some(location) = gl.attrib_location(&program, ATTR_POSITION) {
        gl.vertex_attrib(&vertex_array, &quad, AttribLayout::float(location, 2));
    }

    let index_buffer = alloc.buffer()?;
    if let Some(location) = gl.attrib_location(&program, ATTR_INDEX) {
        gl.vertex_attrib(&vertex_array, &index_buffer, AttribLayout::int(location, 1).with_divisor(1));
    }

    // === TEXTURE ===
    let texture = alloc.texture()?;
    gl.upload_texture(&texture, SPLAT_TEXTURE_UNIT, &scene.texture());
    set(&uniforms.texture, Uniform::Int(SPLAT_TEXTURE_UNIT as i32));

    for pass in passes.iter_mut() {
        pass.init(gl, &program);
    }

    let compute = ParticleCompute::create(gl, &mut alloc, scene.positions(), vertex_count)?;

    let objects = alloc.commit();
    log::info!("renderer initialized: {vertex_count} splats, {} GL objects", objects.len());

    Ok(Session {
        objects,
        program,
        vertex_array,
        index_buffer,
        uniforms,
        compute,
        worker,
        loaded: false,
    })
}
