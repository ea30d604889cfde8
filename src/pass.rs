use crate::gl::{GlContext, Uniform};
use crate::shaders::{U_DEPTH_FADE, U_USE_DEPTH_FADE};

/// Per-frame hook into the splat program.
///
/// `init` runs once per renderer initialization with the freshly linked
/// program, `render` once per drawn frame before the draw call.
pub trait ShaderPass<G: GlContext> {
    fn init(&mut self, gl: &G, program: &G::Program);
    fn render(&mut self, gl: &G);
}

struct FadeUniforms<G: GlContext> {
    program: G::Program,
    use_depth_fade: Option<G::UniformLocation>,
    depth_fade: Option<G::UniformLocation>,
}

// Grows splats in from the camera outwards after every (re)initialization.
pub struct FadeInPass<G: GlContext> {
    speed: f32,
    value: f32,
    active: bool,
    uniforms: Option<FadeUniforms<G>>,
}

impl<G: GlContext> FadeInPass<G> {
    pub fn new(speed: f32) -> Self {
        Self {
            speed,
            value: 0.0,
            active: false,
            uniforms: None,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    fn set(&self, gl: &G, uniforms: &FadeUniforms<G>) {
        gl.set_uniform(&uniforms.program, uniforms.use_depth_fade.as_ref(), Uniform::Bool(self.active));
        gl.set_uniform(&uniforms.program, uniforms.depth_fade.as_ref(), Uniform::Float(self.value));
    }
}

impl<G: GlContext> Default for FadeInPass<G> {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl<G: GlContext> ShaderPass<G> for FadeInPass<G> {
    fn init(&mut self, gl: &G, program: &G::Program) {
        let uniforms = FadeUniforms {
            program: program.clone(),
            use_depth_fade: gl.uniform_location(program, U_USE_DEPTH_FADE),
            depth_fade: gl.uniform_location(program, U_DEPTH_FADE),
        };
        self.value = 0.0;
        self.active = true;
        self.set(gl, &uniforms);
        self.uniforms = Some(uniforms);
    }

    fn render(&mut self, gl: &G) {
        if !self.active {
            return;
        }
        self.value = (self.value + self.speed * 0.01).min(1.0);
        if self.value >= 1.0 {
            self.active = false;
        }
        if let Some(uniforms) = &self.uniforms {
            self.set(gl, uniforms);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::HeadlessGl;
    use crate::gl::ShaderStage;

    fn linked_program(gl: &HeadlessGl) -> <HeadlessGl as GlContext>::Program {
        let vs = gl.create_shader(ShaderStage::Vertex).unwrap();
        let fs = gl.create_shader(ShaderStage::Fragment).unwrap();
        gl.compile_shader(&vs, "void main() {}").unwrap();
        gl.compile_shader(&fs, "void main() {}").unwrap();
        let program = gl.create_program().unwrap();
        gl.link_program(&program, &vs, &fs, &[]).unwrap();
        program
    }

    #[test]
    fn init_enables_fade_from_zero() {
        let gl = HeadlessGl::new(100, 100);
        let program = linked_program(&gl);
        let mut pass = FadeInPass::<HeadlessGl>::default();
        pass.init(&gl, &program);
        assert_eq!(gl.uniform(U_USE_DEPTH_FADE), Some(Uniform::Bool(true)));
        assert_eq!(gl.uniform(U_DEPTH_FADE), Some(Uniform::Float(0.0)));
    }

    #[test]
    fn render_ramps_to_one_then_disables() {
        let gl = HeadlessGl::new(100, 100);
        let program = linked_program(&gl);
        let mut pass = FadeInPass::<HeadlessGl>::new(25.0);
        pass.init(&gl, &program);

        pass.render(&gl);
        assert_eq!(gl.uniform(U_DEPTH_FADE), Some(Uniform::Float(0.25)));
        assert!(pass.is_active());

        for _ in 0..3 {
            pass.render(&gl);
        }
        assert_eq!(pass.value(), 1.0);
        assert!(!pass.is_active());
        assert_eq!(gl.uniform(U_USE_DEPTH_FADE), Some(Uniform::Bool(false)));

        let before = gl.calls().len();
        pass.render(&gl);
        assert_eq!(gl.calls().len(), before);
    }

    #[test]
    fn reinit_restarts_fade() {
        let gl = HeadlessGl::new(100, 100);
        let program = linked_program(&gl);
        let mut pass = FadeInPass::<HeadlessGl>::new(200.0);
        pass.init(&gl, &program);
        pass.render(&gl);
        assert!(!pass.is_active());
        pass.init(&gl, &program);
        assert!(pass.is_active());
        assert_eq!(pass.value(), 0.0);
    }
}
