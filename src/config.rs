// Renderer constants. Grouped into `RendererConfig` so embedders can override
// the per-frame step and clear color.

// Simulation time added per drawn frame.
pub const FRAME_TIME_STEP: f32 = 1.0 / 60.0;

// Billboard quad drawn as a TRIANGLE_FAN for every splat instance.
pub const QUAD_VERTICES: [f32; 8] = [-2.0, -2.0, 2.0, -2.0, 2.0, 2.0, -2.0, 2.0];

pub const CLEAR_COLOR: [f32; 4] = [0.0, 0.0, 0.0, 0.0];

// Width of the covariance/color texture in texels.
pub const TEXTURE_WIDTH: u32 = 2048;

// Texture unit the splat texture is bound to.
pub const SPLAT_TEXTURE_UNIT: u32 = 0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RendererConfig {
    pub time_step: f32,
    pub clear_color: [f32; 4],
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            time_step: FRAME_TIME_STEP,
            clear_color: CLEAR_COLOR,
        }
    }
}

impl RendererConfig {
    pub fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    pub fn with_clear_color(mut self, clear_color: [f32; 4]) -> Self {
        self.clear_color = clear_color;
        self
    }
}
