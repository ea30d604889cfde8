//! Gaussian splat renderer for WebGL2.
//!
//! The renderer draws one instanced billboard per splat, in the depth order a
//! background sort worker computes, and advances a transform-feedback
//! particle pass after every drawn frame. On native targets the same renderer
//! runs against [`gl::HeadlessGl`] and a thread-backed sort worker.

pub mod camera;
pub mod config;
pub mod error;
pub mod gl;
pub mod math;
pub mod pass;
pub mod renderer;
pub mod scene;
pub mod shaders;
pub mod sort;

#[cfg(test)]
mod testing;
#[cfg(target_arch = "wasm32")]
pub mod wasm;

use std::cell::RefCell;
use std::rc::Rc;

pub use camera::{Camera, PerspectiveCamera};
pub use config::RendererConfig;
pub use error::{GlError, SceneError, WorkerError};
pub use math::{Matrix4, Ray, RayHit, Vector3};
pub use renderer::{FrameStats, Renderer, RendererState};
pub use scene::{Scene, Splat, SplatScene};

/// Scene handle shared between the embedder and the renderer. The renderer
/// compares handles by identity to detect a swap.
pub type SharedScene = Rc<RefCell<dyn Scene>>;

pub type SharedCamera = Rc<RefCell<dyn Camera>>;

/// Installs the platform logger. Safe to call more than once.
pub fn init_logging() {
    cfg_if::cfg_if! {
        if #[cfg(target_arch = "wasm32")] {
            console_error_panic_hook::set_once();
            if console_log::init_with_level(log::Level::Info).is_err() {
                web_sys::console::warn_1(&"logger already initialized".into());
            }
        } else {
            let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).try_init();
        }
    }
}
