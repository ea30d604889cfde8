//! Splat renderer: owns the GL resources of one scene/camera pair and drives
//! the sort worker and the compute pass frame by frame.

mod compute;
mod session;

use std::cell::Cell;
use std::rc::Rc;

use crate::config::RendererConfig;
use crate::gl::{BufferUsage, ClearFlags, GlContext, Primitive};
use crate::math::{Ray, RayHit, Vector3};
use crate::pass::{FadeInPass, ShaderPass};
use crate::scene::ListenerId;
use crate::sort::{SortRequest, WorkerSpawner};
use crate::{SharedCamera, SharedScene};

use session::Session;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RendererState {
    Uninitialized,
    Initialized,
    Disposed,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub frames_drawn: u64,
    pub frames_skipped: u64,
    pub initializations: u64,
    pub disposals: u64,
    pub sort_results: u64,
}

#[derive(Clone, Copy, Debug, Default)]
struct Pointer {
    mouse: [f32; 2],
    clicked: bool,
    pick_ray: Option<Ray>,
}

fn same<T: ?Sized>(a: &Rc<T>, b: &Rc<T>) -> bool {
    std::ptr::addr_eq(Rc::as_ptr(a), Rc::as_ptr(b))
}

pub struct Renderer<G: GlContext + 'static, S: WorkerSpawner> {
    gl: G,
    spawner: S,
    config: RendererConfig,
    passes: Vec<Box<dyn ShaderPass<G>>>,
    state: RendererState,

    scene: Option<SharedScene>,
    camera: Option<SharedCamera>,
    subscription: Option<ListenerId>,
    scene_changed: Rc<Cell<bool>>,

    session: Option<Session<G, S::Worker>>,
    time: f32,
    pointer: Pointer,
    stats: FrameStats,
}

impl<G: GlContext + 'static, S: WorkerSpawner> Renderer<G, S> {
    /// Renderer with the default fade-in pass.
    pub fn new(gl: G, spawner: S) -> Self {
        Self::with_passes(gl, spawner, vec![Box::new(FadeInPass::<G>::default())])
    }

    pub fn with_passes(gl: G, spawner: S, passes: Vec<Box<dyn ShaderPass<G>>>) -> Self {
        let mut renderer = Self {
            gl,
            spawner,
            config: RendererConfig::default(),
            passes,
            state: RendererState::Uninitialized,
            scene: None,
            camera: None,
            subscription: None,
            scene_changed: Rc::new(Cell::new(false)),
            session: None,
            time: 0.0,
            pointer: Pointer::default(),
            stats: FrameStats::default(),
        };
        renderer.resize();
        renderer
    }

    pub fn with_config(mut self, config: RendererConfig) -> Self {
        self.config = config;
        self
    }

    // === ACCESSORS ===

    pub fn gl(&self) -> &G {
        &self.gl
    }

    pub fn spawner(&self) -> &S {
        &self.spawner
    }

    pub fn config(&self) -> &RendererConfig {
        &self.config
    }

    pub fn state(&self) -> RendererState {
        self.state
    }

    pub fn is_loaded(&self) -> bool {
        self.session.as_ref().is_some_and(|s| s.loaded)
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frame_stats(&self) -> FrameStats {
        self.stats
    }

    pub fn last_pick_ray(&self) -> Option<Ray> {
        self.pointer.pick_ray
    }

    pub fn is_pointer_down(&self) -> bool {
        self.pointer.clicked
    }

    /// GL objects owned by the current session, zero when not initialized.
    pub fn session_objects(&self) -> usize {
        self.session.as_ref().map_or(0, |s| s.object_count())
    }

    /// Accumulated particle positions written by the latest compute pass.
    pub fn particle_buffer(&self) -> Option<&G::Buffer> {
        self.session.as_ref().map(|s| s.compute.current())
    }

    pub fn compute_passes(&self) -> u64 {
        self.session.as_ref().map_or(0, |s| s.compute.passes())
    }

    // === SIZE ===

    /// Matches the drawing buffer to the canvas' displayed size.
    pub fn resize(&mut self) {
        let client = self.gl.client_size();
        if client != self.gl.drawing_buffer_size() {
            self.set_size(client.0, client.1);
        }
    }

    pub fn set_size(&mut self, width: u32, height: u32) {
        self.gl.set_drawing_buffer_size(width, height);
        let Some(camera) = self.camera.clone() else { return };

        self.gl.viewport(width, height);
        let mut camera = camera.borrow_mut();
        camera.update(width, height);
        if let Some(session) = &self.session {
            session.set(&self.gl, &session.uniforms.projection, camera.projection_matrix());
            session.set(&self.gl, &session.uniforms.viewport, [width as f32, height as f32]);
        }
    }

    // === FRAME ===

    pub fn render(&mut self, scene: &SharedScene, camera: &SharedCamera) {
        let scene_swapped = !self.scene.as_ref().is_some_and(|s| same(s, scene));
        let camera_swapped = !self.camera.as_ref().is_some_and(|c| same(c, camera));

        if scene_swapped || camera_swapped {
            self.dispose();
            if scene_swapped {
                self.attach_scene(scene);
            }
            self.camera = Some(camera.clone());
            self.scene_changed.set(false);
            self.initialize();
        } else if self.scene_changed.replace(false) {
            log::info!("scene changed, rebuilding GPU resources");
            self.dispose();
            self.initialize();
        }

        self.frame();
    }

    /// Releases every GL object of the current session and stops its worker.
    /// Does nothing unless initialized.
    pub fn dispose(&mut self) {
        if self.state != RendererState::Initialized {
            return;
        }
        if let Some(session) = self.session.take() {
            session.release(&self.gl);
        }
        self.state = RendererState::Disposed;
        self.stats.disposals += 1;
        log::info!("renderer disposed");
    }

    fn attach_scene(&mut self, scene: &SharedScene) {
        self.detach_scene();
        let flag = self.scene_changed.clone();
        let id = scene.borrow_mut().subscribe(Box::new(move || flag.set(true)));
        self.subscription = Some(id);
        self.scene = Some(scene.clone());
    }

    fn detach_scene(&mut self) {
        let (Some(scene), Some(id)) = (self.scene.take(), self.subscription.take()) else {
            return;
        };
        match scene.try_borrow_mut() {
            Ok(mut scene) => {
                scene.unsubscribe(id);
            }
            Err(_) => log::warn!("scene busy, change listener {id:?} left registered"),
        }
    }

    fn initialize(&mut self) {
        let (Some(scene), Some(camera)) = (self.scene.clone(), self.camera.clone()) else {
            return;
        };
        let scene = scene.borrow();
        let mut camera = camera.borrow_mut();

        match session::create(&self.gl, &mut self.spawner, &*scene, &mut *camera, &mut self.passes, self.time) {
            Ok(session) => {
                self.session = Some(session);
                self.state = RendererState::Initialized;
                self.stats.initializations += 1;
            }
            Err(e) => log::error!("renderer initialization abandoned: {e}"),
        }
    }

    fn frame(&mut self) {
        let (Some(scene), Some(camera)) = (self.scene.clone(), self.camera.clone()) else {
            return;
        };

        if let Some(session) = self.session.as_mut() {
            if let Some(order) = session.poll_sort() {
                self.gl
                    .buffer_data(&session.index_buffer, bytemuck::cast_slice(&order), BufferUsage::DynamicDraw);
                session.loaded = true;
                self.stats.sort_results += 1;
                log::trace!("applied depth order for {} splats", order.len());
            }
        }

        let (width, height) = self.gl.drawing_buffer_size();
        let mut camera = camera.borrow_mut();
        camera.update(width, height);
        if let Some(session) = self.session.as_mut() {
            session.post(SortRequest::UpdateViewProj(camera.view_proj()));
        }

        let vertex_count = scene.borrow().vertex_count();
        let session = match self.session.as_mut() {
            Some(session) if session.loaded && vertex_count > 0 => session,
            _ => {
                self.gl.clear(self.config.clear_color, ClearFlags::COLOR);
                self.stats.frames_skipped += 1;
                return;
            }
        };

        self.time += self.config.time_step;
        session.set(&self.gl, &session.uniforms.time, self.time);
        session.set(&self.gl, &session.uniforms.mouse, self.pointer.mouse);

        for pass in self.passes.iter_mut() {
            pass.render(&self.gl);
        }

        session.set(&self.gl, &session.uniforms.view, camera.view_matrix());
        self.gl.clear(self.config.clear_color, ClearFlags::COLOR);
        self.gl.draw_arrays_instanced(
            &session.program,
            &session.vertex_array,
            Primitive::TriangleFan,
            0,
            4,
            vertex_count as i32,
        );

        session.compute.run(&self.gl);
        self.stats.frames_drawn += 1;
    }

    // === POINTER ===

    pub fn set_mouse_position(&mut self, x: f32, y: f32) {
        self.pointer.mouse = [x, y];
    }

    pub fn pointer_down(&mut self) {
        self.pointer.clicked = true;
        let Some(camera) = &self.camera else { return };
        let position = camera.borrow().position();
        if let Some(session) = &self.session {
            session.set(&self.gl, &session.uniforms.camera_position, position);
            session.set(&self.gl, &session.uniforms.clicked, true);
        }
    }

    /// Casts the picking ray through the last mouse position.
    pub fn pointer_up(&mut self) {
        self.pointer.clicked = false;
        let Some(camera) = &self.camera else { return };
        let (position, view_proj) = {
            let camera = camera.borrow();
            (camera.position(), camera.view_proj())
        };
        let (width, height) = self.gl.drawing_buffer_size();
        let [x, y] = self.pointer.mouse;
        let ray = Ray::from_screen(x, y, width as f32, height as f32, &view_proj, position);
        self.pointer.pick_ray = Some(ray);

        if let Some(session) = &self.session {
            session.set(&self.gl, &session.uniforms.clicked, false);
            session.set(&self.gl, &session.uniforms.ray_direction, ray.direction);
            session.set(&self.gl, &session.uniforms.camera_position, position);
        }
    }

    /// Tests the last picking ray against a sphere.
    pub fn intersect(&self, center: Vector3, radius: f32) -> Option<RayHit> {
        self.pointer.pick_ray?.intersect_sphere(center, radius)
    }
}

impl<G: GlContext + 'static, S: WorkerSpawner> Drop for Renderer<G, S> {
    fn drop(&mut self) {
        self.dispose();
        self.detach_scene();
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;

    use approx::assert_relative_eq;

    use super::*;
    use crate::camera::PerspectiveCamera;
    use crate::gl::headless::{GlCall, GlId, ObjectKind};
    use crate::gl::{
        AttribKind, AttribLayout, BlendFactor, BlendFunc, HeadlessGl, RenderState, ShaderStage, Uniform,
    };
    use crate::math::Matrix4;
    use crate::scene::{Scene, SplatScene};
    use crate::shaders::{
        U_CLICKED, U_FOCAL, U_PROJECTION, U_RAY_DIRECTION, U_TEXTURE, U_TIME, U_USE_DEPTH_FADE, U_VIEWPORT,
    };
    use crate::sort::SortResponse;
    use crate::testing::{ScriptedSpawner, WorkerProbe, row_of_splats};

    struct Fixture {
        renderer: Renderer<HeadlessGl, ScriptedSpawner>,
        probe: Rc<RefCell<WorkerProbe>>,
        scene: Rc<RefCell<SplatScene>>,
        shared_scene: SharedScene,
        camera: SharedCamera,
    }

    impl Fixture {
        fn render(&mut self) {
            self.renderer.render(&self.shared_scene, &self.camera);
        }

        fn gl(&self) -> &HeadlessGl {
            self.renderer.gl()
        }

        fn deliver(&self, worker: usize, order: Vec<u32>) {
            self.probe.borrow_mut().deliver(worker, SortResponse::SortedIndices(order));
        }
    }

    fn fixture_with(gl: HeadlessGl, splats: usize) -> Fixture {
        let probe = WorkerProbe::shared();
        let renderer = Renderer::new(gl, ScriptedSpawner::new(&probe));
        let scene = Rc::new(RefCell::new(SplatScene::from_splats(row_of_splats(splats))));
        let shared_scene: SharedScene = scene.clone();
        let camera: SharedCamera = Rc::new(RefCell::new(PerspectiveCamera::default()));
        Fixture {
            renderer,
            probe,
            scene,
            shared_scene,
            camera,
        }
    }

    fn fixture(splats: usize) -> Fixture {
        fixture_with(HeadlessGl::new(320, 240), splats)
    }

    fn position_of(calls: &[GlCall], pred: impl Fn(&GlCall) -> bool) -> Option<usize> {
        calls.iter().position(pred)
    }

    fn index_buffer(gl: &HeadlessGl) -> Option<GlId> {
        gl.calls().iter().rev().find_map(|call| match call {
            GlCall::BufferData {
                buffer,
                usage: BufferUsage::DynamicDraw,
                ..
            } => Some(*buffer),
            _ => None,
        })
    }

    #[test]
    fn initialization_sets_fixed_pipeline_state() {
        let mut f = fixture(3);
        f.render();
        let calls = f.gl().calls();

        let render_state = calls.iter().find_map(|c| match c {
            GlCall::RenderState(state) => Some(*state),
            _ => None,
        });
        assert_eq!(
            render_state,
            Some(RenderState {
                depth_test: false,
                blend: Some(BlendFunc {
                    src_rgb: BlendFactor::OneMinusDstAlpha,
                    dst_rgb: BlendFactor::One,
                    src_alpha: BlendFactor::OneMinusDstAlpha,
                    dst_alpha: BlendFactor::One,
                }),
            })
        );

        let attribs: Vec<(GlId, AttribLayout)> = calls
            .iter()
            .filter_map(|c| match c {
                GlCall::VertexAttrib { buffer, layout, .. } => Some((*buffer, *layout)),
                _ => None,
            })
            .collect();
        let (quad, quad_layout) = attribs[0];
        assert_eq!(quad_layout, AttribLayout { location: 0, size: 2, kind: AttribKind::Float, divisor: 0 });
        assert_eq!(
            f.gl().buffer_f32(quad).unwrap(),
            vec![-2.0, -2.0, 2.0, -2.0, 2.0, 2.0, -2.0, 2.0]
        );
        let (_, index_layout) = attribs[1];
        assert_eq!(index_layout, AttribLayout { location: 1, size: 1, kind: AttribKind::Int, divisor: 1 });

        let texture = calls.iter().find_map(|c| match c {
            GlCall::UploadTexture { unit, width, height, .. } => Some((*unit, *width, *height)),
            _ => None,
        });
        assert_eq!(texture, Some((0, 2048, 1)));
        assert_eq!(f.gl().uniform(U_TEXTURE), Some(Uniform::Int(0)));
        assert_eq!(f.gl().uniform(U_FOCAL), Some(Uniform::Vec2([1159.588, 1164.66])));
        assert_eq!(f.gl().uniform(U_VIEWPORT), Some(Uniform::Vec2([320.0, 240.0])));
        assert_eq!(f.gl().uniform(U_TIME), Some(Uniform::Float(0.0)));

        let uniform_set = |name: &str| {
            position_of(&calls, |c| matches!(c, GlCall::Uniform { name: n, .. } if n == name)).unwrap()
        };
        let use_program = position_of(&calls, |c| matches!(c, GlCall::UseProgram(_))).unwrap();
        let state = position_of(&calls, |c| matches!(c, GlCall::RenderState(_))).unwrap();
        let quad_attrib = position_of(&calls, |c| matches!(c, GlCall::VertexAttrib { .. })).unwrap();
        let upload = position_of(&calls, |c| matches!(c, GlCall::UploadTexture { .. })).unwrap();
        let tf_program = position_of(&calls, |c| {
            matches!(c, GlCall::LinkProgram { feedback_varyings, .. } if !feedback_varyings.is_empty())
        })
        .unwrap();

        assert!(use_program < state);
        assert!(state < uniform_set(U_PROJECTION));
        assert!(uniform_set(U_PROJECTION) < uniform_set(U_FOCAL));
        assert!(uniform_set(U_TIME) < quad_attrib);
        assert!(quad_attrib < upload);
        assert!(upload < uniform_set(U_TEXTURE));
        assert!(uniform_set(U_TEXTURE) < uniform_set(U_USE_DEPTH_FADE));
        assert!(uniform_set(U_USE_DEPTH_FADE) < tf_program);
    }

    #[test]
    fn set_size_before_render_only_resizes_drawing_buffer() {
        let mut f = fixture(3);
        f.renderer.set_size(640, 480);

        assert_eq!(f.gl().calls(), vec![GlCall::SetDrawingBufferSize(640, 480)]);
        assert_eq!(f.gl().drawing_buffer_size(), (640, 480));
        assert_eq!(f.camera.borrow().projection_matrix(), Matrix4::IDENTITY);
        assert_eq!(f.renderer.state(), RendererState::Uninitialized);
    }

    #[test]
    fn dispose_before_render_does_nothing() {
        let mut f = fixture(3);
        f.renderer.dispose();
        assert!(f.gl().calls().is_empty());
        assert_eq!(f.renderer.state(), RendererState::Uninitialized);
        assert_eq!(f.renderer.frame_stats().disposals, 0);
    }

    #[test]
    fn first_render_initializes_once() {
        let mut f = fixture(3);
        f.render();
        f.render();

        assert_eq!(f.renderer.state(), RendererState::Initialized);
        assert_eq!(f.renderer.frame_stats().initializations, 1);
        assert_eq!(f.probe.borrow().spawned, 1);
        assert_eq!(f.gl().created_count(ObjectKind::Program), 2);
        assert_eq!(f.scene.borrow().listener_count(), 1);

        let probe = f.probe.borrow();
        let posted = probe.posted_by(0);
        match posted[0] {
            SortRequest::LoadScene(geometry) => {
                assert_eq!(geometry.vertex_count, 3);
                assert_eq!(geometry.positions.len(), 9);
            }
            other => panic!("expected scene first, got {other:?}"),
        }
        assert!(posted[1..].iter().all(|r| matches!(r, SortRequest::UpdateViewProj(_))));
        assert_eq!(posted.len(), 3);
    }

    #[test]
    fn nothing_is_drawn_until_a_depth_order_arrives() {
        let mut f = fixture(3);
        f.render();
        assert_eq!(f.gl().draw_count(), 0);
        assert!(!f.renderer.is_loaded());
        assert_eq!(f.renderer.frame_stats().frames_skipped, 1);
        assert_eq!(f.renderer.time(), 0.0);

        f.deliver(0, vec![2, 1, 0]);
        f.render();

        assert!(f.renderer.is_loaded());
        assert_eq!(f.gl().draw_count(), 1);
        let draw = f.gl().calls().into_iter().find(|c| matches!(c, GlCall::DrawArraysInstanced { .. }));
        match draw {
            Some(GlCall::DrawArraysInstanced {
                primitive,
                first,
                count,
                instances,
                ..
            }) => {
                assert_eq!(primitive, Primitive::TriangleFan);
                assert_eq!((first, count, instances), (0, 4, 3));
            }
            other => panic!("missing draw: {other:?}"),
        }
        let buffer = index_buffer(f.gl()).unwrap();
        assert_eq!(f.gl().buffer_u32(buffer).unwrap(), vec![2, 1, 0]);
        assert_eq!(f.renderer.time(), f.renderer.config().time_step);
    }

    #[test]
    fn only_newest_pending_order_is_uploaded() {
        let mut f = fixture(2);
        f.render();
        f.deliver(0, vec![0, 1]);
        f.deliver(0, vec![1, 0]);
        f.render();

        assert_eq!(f.renderer.frame_stats().sort_results, 1);
        let buffer = index_buffer(f.gl()).unwrap();
        assert_eq!(f.gl().buffer_u32(buffer).unwrap(), vec![1, 0]);
    }

    #[test]
    fn scene_swap_reinitializes_and_moves_subscription() {
        let mut f = fixture(3);
        f.render();

        let other = Rc::new(RefCell::new(SplatScene::from_splats(row_of_splats(5))));
        let other_shared: SharedScene = other.clone();
        f.renderer.render(&other_shared, &f.camera);

        let stats = f.renderer.frame_stats();
        assert_eq!(stats.initializations, 2);
        assert_eq!(stats.disposals, 1);
        assert_eq!(f.probe.borrow().terminated, vec![0]);
        assert_eq!(f.scene.borrow().listener_count(), 0);
        assert_eq!(other.borrow().listener_count(), 1);
        assert_eq!(f.gl().live_objects(), f.renderer.session_objects());
        assert_eq!(f.gl().invalid_deletes(), 0);
    }

    #[test]
    fn camera_swap_reinitializes_but_keeps_subscription() {
        let mut f = fixture(3);
        f.render();

        let camera: SharedCamera = Rc::new(RefCell::new(PerspectiveCamera::default()));
        f.renderer.render(&f.shared_scene, &camera);

        assert_eq!(f.renderer.frame_stats().initializations, 2);
        assert_eq!(f.scene.borrow().listener_count(), 1);
        assert_eq!(f.probe.borrow().spawned, 2);
    }

    #[test]
    fn dispose_releases_every_object() {
        let mut f = fixture(3);
        f.render();
        assert!(f.gl().live_objects() > 0);

        f.renderer.dispose();
        assert_eq!(f.renderer.state(), RendererState::Disposed);
        assert_eq!(f.gl().live_objects(), 0);
        assert_eq!(f.gl().invalid_deletes(), 0);
        assert_eq!(f.probe.borrow().terminated, vec![0]);
        assert_eq!(f.renderer.session_objects(), 0);

        f.renderer.dispose();
        assert_eq!(f.renderer.frame_stats().disposals, 1);
        assert_eq!(f.gl().invalid_deletes(), 0);
    }

    #[test]
    fn disposed_renderer_clears_until_swapped() {
        let mut f = fixture(3);
        f.render();
        f.renderer.dispose();
        f.render();

        assert_eq!(f.renderer.state(), RendererState::Disposed);
        assert_eq!(f.renderer.frame_stats().initializations, 1);
        assert_eq!(f.gl().live_objects(), 0);
        assert_eq!(f.gl().draw_count(), 0);

        let other: SharedScene = Rc::new(RefCell::new(SplatScene::from_splats(row_of_splats(1))));
        f.renderer.render(&other, &f.camera);
        assert_eq!(f.renderer.state(), RendererState::Initialized);
    }

    #[test]
    fn scene_change_reinitializes_exactly_once() {
        let mut f = fixture(3);
        f.render();
        f.scene.borrow_mut().set_splats(row_of_splats(5));
        f.render();
        f.render();

        let stats = f.renderer.frame_stats();
        assert_eq!(stats.initializations, 2);
        assert_eq!(stats.disposals, 1);

        let probe = f.probe.borrow();
        match probe.posted_by(1)[0] {
            SortRequest::LoadScene(geometry) => assert_eq!(geometry.vertex_count, 5),
            other => panic!("expected scene first, got {other:?}"),
        }
    }

    #[test]
    fn replies_from_a_replaced_worker_are_ignored() {
        let mut f = fixture(3);
        f.render();
        let other: SharedScene = Rc::new(RefCell::new(SplatScene::from_splats(row_of_splats(3))));
        f.renderer.render(&other, &f.camera);

        f.deliver(0, vec![0, 1, 2]);
        f.renderer.render(&other, &f.camera);
        assert!(!f.renderer.is_loaded());
        assert_eq!(f.gl().draw_count(), 0);

        f.deliver(1, vec![2, 1, 0]);
        f.renderer.render(&other, &f.camera);
        assert_eq!(f.gl().draw_count(), 1);
    }

    #[test]
    fn empty_scene_never_draws() {
        let mut f = fixture(0);
        f.render();
        f.deliver(0, vec![]);
        f.render();

        assert_eq!(f.renderer.state(), RendererState::Initialized);
        assert_eq!(f.gl().draw_count(), 0);
        assert_eq!(f.renderer.frame_stats().frames_skipped, 2);
        assert_eq!(f.renderer.compute_passes(), 0);
    }

    #[test]
    fn shader_failure_is_not_fatal() {
        let gl = HeadlessGl::new(320, 240);
        gl.fail_compile(ShaderStage::Vertex);
        let mut f = fixture_with(gl, 3);
        f.render();

        assert_eq!(f.renderer.state(), RendererState::Initialized);
        assert_eq!(f.gl().uniform(U_PROJECTION), None);

        f.deliver(0, vec![0, 1, 2]);
        f.render();
        assert_eq!(f.gl().draw_count(), 1);
    }

    #[test]
    fn allocation_failure_leaks_nothing() {
        let gl = HeadlessGl::new(320, 240);
        gl.fail_after_allocations(4);
        let mut f = fixture_with(gl, 3);
        f.render();

        assert_ne!(f.renderer.state(), RendererState::Initialized);
        assert_eq!(f.gl().live_objects(), 0);
        assert_eq!(f.gl().invalid_deletes(), 0);
        assert_eq!(f.probe.borrow().terminated, vec![0]);
        assert_eq!(f.renderer.frame_stats().frames_skipped, 1);
        assert_eq!(f.renderer.frame_stats().initializations, 0);
    }

    #[test]
    fn worker_spawn_failure_keeps_renderer_unloaded() {
        let mut f = fixture(3);
        f.probe.borrow_mut().fail_spawn = true;
        f.render();
        f.render();

        assert_eq!(f.renderer.state(), RendererState::Initialized);
        assert!(!f.renderer.is_loaded());
        assert_eq!(f.gl().draw_count(), 0);
    }

    #[test]
    fn compute_pass_follows_the_draw() {
        let mut f = fixture(3);
        f.render();
        f.deliver(0, vec![0, 1, 2]);
        f.gl().take_calls();
        f.render();

        let calls = f.gl().calls();
        let draw = position_of(&calls, |c| matches!(c, GlCall::DrawArraysInstanced { .. })).unwrap();
        let compute = position_of(&calls, |c| matches!(c, GlCall::TransformFeedbackPass { .. })).unwrap();
        let clear = position_of(&calls, |c| matches!(c, GlCall::Clear(_))).unwrap();
        assert!(clear < draw);
        assert!(draw < compute);
        assert_eq!(f.renderer.compute_passes(), 1);

        let buffer = *f.renderer.particle_buffer().unwrap();
        assert_eq!(f.gl().buffer_f32(buffer).unwrap(), f.scene.borrow().positions().to_vec());
    }

    #[test]
    fn set_size_updates_projection_and_viewport() {
        let mut f = fixture(3);
        f.render();
        f.renderer.set_size(640, 480);

        assert_eq!(f.gl().drawing_buffer_size(), (640, 480));
        assert_eq!(f.gl().uniform(U_VIEWPORT), Some(Uniform::Vec2([640.0, 480.0])));
        assert!(f.gl().calls().contains(&GlCall::Viewport(640, 480)));
        let projection = f.camera.borrow().projection_matrix();
        assert_eq!(f.gl().uniform(U_PROJECTION), Some(Uniform::Mat4(projection)));
    }

    #[test]
    fn resize_follows_client_size() {
        let mut f = fixture(3);
        f.render();
        f.renderer.resize();
        assert!(!f.gl().calls().iter().any(|c| matches!(c, GlCall::SetDrawingBufferSize(..))));

        f.gl().set_client_size(800, 600);
        f.renderer.resize();
        assert_eq!(f.gl().drawing_buffer_size(), (800, 600));
        assert_eq!(f.gl().uniform(U_VIEWPORT), Some(Uniform::Vec2([800.0, 600.0])));
    }

    #[test]
    fn pointer_release_casts_pick_ray() {
        let mut f = fixture(3);
        f.render();
        f.renderer.set_mouse_position(160.0, 120.0);
        f.renderer.pointer_down();
        assert!(f.renderer.is_pointer_down());
        assert_eq!(f.gl().uniform(U_CLICKED), Some(Uniform::Bool(true)));

        f.renderer.pointer_up();
        assert!(!f.renderer.is_pointer_down());
        assert_eq!(f.gl().uniform(U_CLICKED), Some(Uniform::Bool(false)));

        let ray = f.renderer.last_pick_ray().unwrap();
        assert_relative_eq!(ray.direction.z, 1.0, epsilon = 1e-4);
        assert_eq!(f.gl().uniform(U_RAY_DIRECTION), Some(Uniform::Vec3(ray.direction.to_array())));

        let hit = f.renderer.intersect(Vector3::new(0.0, 0.0, 0.0), 1.0).unwrap();
        assert_relative_eq!(hit.t0, 4.0, epsilon = 1e-3);
        assert!(f.renderer.intersect(Vector3::new(10.0, 10.0, 0.0), 1.0).is_none());
    }

    #[test]
    fn drop_unsubscribes_and_releases() {
        let f = fixture(3);
        let Fixture {
            mut renderer,
            probe,
            scene,
            shared_scene,
            camera,
        } = f;
        renderer.render(&shared_scene, &camera);
        drop(renderer);

        assert_eq!(scene.borrow().listener_count(), 0);
        assert_eq!(probe.borrow().terminated, vec![0]);
    }
}
