//! JavaScript bindings. The page owns the animation loop and calls
//! `render` once per `requestAnimationFrame`.
//!
//! `JsRenderer` sorts in a module worker. `web/sort-worker.js` is that
//! worker: it loads this package, feeds every message to a `JsDepthSorter`
//! and posts back the `{ depthIndex }` replies.

use std::cell::RefCell;
use std::rc::Rc;

use glam::Vec3;
use js_sys::{Object, Reflect, Uint32Array};
use wasm_bindgen::prelude::*;
use web_sys::HtmlCanvasElement;

use crate::camera::PerspectiveCamera;
use crate::gl::WebGl2Context;
use crate::math::Vector3;
use crate::renderer::Renderer;
use crate::scene::{SplatScene, decode_splat_bytes};
use crate::sort::{DepthSorter, SortRequest, WebWorkerSpawner};
use crate::{SharedCamera, SharedScene};

fn js_error(e: impl std::fmt::Display) -> JsValue {
    JsValue::from_str(&e.to_string())
}

#[wasm_bindgen(start)]
pub fn start() {
    crate::init_logging();
    log::info!("wsplat loaded");
}

#[wasm_bindgen]
pub struct JsScene {
    scene: Rc<RefCell<SplatScene>>,
    shared: SharedScene,
}

#[wasm_bindgen]
impl JsScene {
    #[wasm_bindgen(constructor)]
    pub fn new() -> JsScene {
        Self::wrap(SplatScene::new())
    }

    #[wasm_bindgen(js_name = fromSplatBytes)]
    pub fn from_splat_bytes(bytes: &[u8]) -> Result<JsScene, JsValue> {
        SplatScene::from_splat_bytes(bytes).map(Self::wrap).map_err(js_error)
    }

    /// Replaces the splats. A renderer drawing this scene rebuilds on its
    /// next frame.
    #[wasm_bindgen(js_name = setSplatBytes)]
    pub fn set_splat_bytes(&self, bytes: &[u8]) -> Result<(), JsValue> {
        let splats = decode_splat_bytes(bytes).map_err(js_error)?;
        self.scene.borrow_mut().set_splats(splats);
        Ok(())
    }

    #[wasm_bindgen(getter, js_name = vertexCount)]
    pub fn vertex_count(&self) -> usize {
        self.scene.borrow().splats().len()
    }

    fn wrap(scene: SplatScene) -> JsScene {
        let scene = Rc::new(RefCell::new(scene));
        let shared: SharedScene = scene.clone();
        JsScene { scene, shared }
    }
}

#[wasm_bindgen]
pub struct JsCamera {
    camera: Rc<RefCell<PerspectiveCamera>>,
    shared: SharedCamera,
}

#[wasm_bindgen]
impl JsCamera {
    #[wasm_bindgen(constructor)]
    pub fn new() -> JsCamera {
        let camera = Rc::new(RefCell::new(PerspectiveCamera::default()));
        let shared: SharedCamera = camera.clone();
        JsCamera { camera, shared }
    }

    #[wasm_bindgen(js_name = setPosition)]
    pub fn set_position(&self, x: f32, y: f32, z: f32) {
        self.camera.borrow_mut().set_position(Vec3::new(x, y, z));
    }

    #[wasm_bindgen(js_name = lookAt)]
    pub fn look_at(&self, x: f32, y: f32, z: f32) {
        self.camera.borrow_mut().look_at(Vec3::new(x, y, z));
    }

    #[wasm_bindgen(js_name = setFocal)]
    pub fn set_focal(&self, fx: f32, fy: f32) {
        let mut camera = self.camera.borrow_mut();
        camera.fx = fx;
        camera.fy = fy;
    }
}

#[wasm_bindgen]
pub struct JsRenderer {
    renderer: Renderer<WebGl2Context, WebWorkerSpawner>,
}

#[wasm_bindgen]
impl JsRenderer {
    /// `worker_url` points at `web/sort-worker.js` or a script that forwards
    /// messages to a `JsDepthSorter` the same way.
    #[wasm_bindgen(constructor)]
    pub fn new(canvas: HtmlCanvasElement, worker_url: &str) -> Result<JsRenderer, JsValue> {
        let gl = WebGl2Context::from_canvas(canvas).map_err(js_error)?;
        Ok(JsRenderer {
            renderer: Renderer::new(gl, WebWorkerSpawner::new(worker_url)),
        })
    }

    pub fn render(&mut self, scene: &JsScene, camera: &JsCamera) {
        self.renderer.render(&scene.shared, &camera.shared);
    }

    pub fn resize(&mut self) {
        self.renderer.resize();
    }

    #[wasm_bindgen(js_name = setSize)]
    pub fn set_size(&mut self, width: u32, height: u32) {
        self.renderer.set_size(width, height);
    }

    pub fn dispose(&mut self) {
        self.renderer.dispose();
    }

    #[wasm_bindgen(js_name = setMousePosition)]
    pub fn set_mouse_position(&mut self, x: f32, y: f32) {
        self.renderer.set_mouse_position(x, y);
    }

    #[wasm_bindgen(js_name = pointerDown)]
    pub fn pointer_down(&mut self) {
        self.renderer.pointer_down();
    }

    #[wasm_bindgen(js_name = pointerUp)]
    pub fn pointer_up(&mut self) {
        self.renderer.pointer_up();
    }

    /// Distance along the last picking ray to the sphere, if it is hit.
    pub fn intersect(&self, x: f32, y: f32, z: f32, radius: f32) -> Option<f32> {
        self.renderer.intersect(Vector3::new(x, y, z), radius).map(|hit| hit.t0)
    }

    #[wasm_bindgen(getter, js_name = isLoaded)]
    pub fn is_loaded(&self) -> bool {
        self.renderer.is_loaded()
    }
}

/// Worker-side half of the sort protocol.
#[wasm_bindgen]
pub struct JsDepthSorter {
    sorter: DepthSorter,
}

#[wasm_bindgen]
impl JsDepthSorter {
    #[wasm_bindgen(constructor)]
    pub fn new() -> JsDepthSorter {
        JsDepthSorter {
            sorter: DepthSorter::new(),
        }
    }

    /// Handles one incoming message. Returns the `{ depthIndex }` reply to
    /// post back, or `undefined` when there is nothing to send.
    pub fn handle(&mut self, message: JsValue) -> Result<JsValue, JsValue> {
        let request: SortRequest = serde_wasm_bindgen::from_value(message).map_err(js_error)?;
        let order = match request {
            SortRequest::LoadScene(geometry) => {
                self.sorter.load(geometry);
                return Ok(JsValue::UNDEFINED);
            }
            SortRequest::UpdateViewProj(view_proj) => self.sorter.sort(&view_proj),
        };
        let Some(order) = order else {
            return Ok(JsValue::UNDEFINED);
        };
        let reply = Object::new();
        Reflect::set(&reply, &"depthIndex".into(), &Uint32Array::from(order.as_slice()))?;
        Ok(reply.into())
    }
}
