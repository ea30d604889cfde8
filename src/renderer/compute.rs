use crate::error::GlResult;
use crate::gl::{AttribLayout, Allocation, BufferUsage, GlContext, ShaderStage};
use crate::shaders::{ATTR_PARTICLE, ATTR_PARTICLE_SOURCE, FEEDBACK_VARYINGS, PARTICLE_FRAGMENT, PARTICLE_VERTEX};

/// Transform-feedback accumulation of particle positions.
///
/// Each pass writes `accumulator + source` for every point. WebGL2 refuses a
/// buffer bound as both attribute and feedback target, so the accumulator is
/// a pair: pass N reads `front` and writes the other, then they swap.
pub(crate) struct ParticleCompute<G: GlContext> {
    program: G::Program,
    feedback: G::TransformFeedback,
    accumulators: [G::Buffer; 2],
    // inputs[i] binds the source positions and accumulators[i].
    inputs: [G::VertexArray; 2],
    front: usize,
    count: i32,
    passes: u64,
}

impl<G: GlContext> ParticleCompute<G> {
    pub fn create(gl: &G, alloc: &mut Allocation<'_, G>, positions: &[f32], vertex_count: usize) -> GlResult<Self> {
        let count = vertex_count.min(positions.len() / 3);

        let vertex = alloc.shader(ShaderStage::Vertex)?;
        let fragment = alloc.shader(ShaderStage::Fragment)?;
        let program = alloc.program()?;
        if let Err(info) = gl.compile_shader(&vertex, PARTICLE_VERTEX) {
            log::error!("particle vertex shader failed to compile: {info}");
        }
        if let Err(info) = gl.compile_shader(&fragment, PARTICLE_FRAGMENT) {
            log::error!("particle fragment shader failed to compile: {info}");
        }
        if let Err(info) = gl.link_program(&program, &vertex, &fragment, &FEEDBACK_VARYINGS) {
            log::error!("particle program failed to link: {info}");
        }

        let source = alloc.buffer()?;
        gl.buffer_data(&source, bytemuck::cast_slice(&positions[..count * 3]), BufferUsage::StaticDraw);

        let zeros = vec![0.0f32; count * 3];
        let accumulators = [alloc.buffer()?, alloc.buffer()?];
        for accumulator in &accumulators {
            gl.buffer_data(accumulator, bytemuck::cast_slice(&zeros), BufferUsage::StreamCopy);
        }

        let source_location = gl.attrib_location(&program, ATTR_PARTICLE_SOURCE);
        let particle_location = gl.attrib_location(&program, ATTR_PARTICLE);
        let inputs = [alloc.vertex_array()?, alloc.vertex_array()?];
        for (input, accumulator) in inputs.iter().zip(&accumulators) {
            if let Some(location) = source_location {
                gl.vertex_attrib(input, &source, AttribLayout::float(location, 3));
            }
            if let Some(location) = particle_location {
                gl.vertex_attrib(input, accumulator, AttribLayout::float(location, 3));
            }
        }

        let feedback = alloc.transform_feedback()?;

        Ok(Self {
            program,
            feedback,
            accumulators,
            inputs,
            front: 0,
            count: count as i32,
            passes: 0,
        })
    }

    pub fn run(&mut self, gl: &G) {
        if self.count == 0 {
            return;
        }
        let back = 1 - self.front;
        gl.transform_feedback_pass(
            &self.program,
            &self.inputs[self.front],
            &self.feedback,
            &self.accumulators[back],
            self.count,
        );
        self.front = back;
        self.passes += 1;
    }

    /// The accumulator written by the most recent pass.
    pub fn current(&self) -> &G::Buffer {
        &self.accumulators[self.front]
    }

    pub fn passes(&self) -> u64 {
        self.passes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gl::HeadlessGl;
    use crate::gl::headless::ObjectKind;

    #[test]
    fn accumulates_source_positions_each_pass() {
        let gl = HeadlessGl::new(100, 100);
        let mut alloc = Allocation::new(&gl);
        let positions = [1.0, 2.0, 3.0, -1.0, 0.5, 0.0];
        let mut compute = ParticleCompute::create(&gl, &mut alloc, &positions, 2).unwrap();
        let _objects = alloc.commit();

        assert_eq!(gl.buffer_f32(*compute.current()).unwrap(), vec![0.0; 6]);
        compute.run(&gl);
        assert_eq!(gl.buffer_f32(*compute.current()).unwrap(), positions.to_vec());
        compute.run(&gl);
        compute.run(&gl);
        assert_eq!(gl.buffer_f32(*compute.current()).unwrap(), vec![3.0, 6.0, 9.0, -3.0, 1.5, 0.0]);
        assert_eq!(compute.passes(), 3);
    }

    #[test]
    fn empty_scene_runs_nothing() {
        let gl = HeadlessGl::new(100, 100);
        let mut alloc = Allocation::new(&gl);
        let mut compute = ParticleCompute::create(&gl, &mut alloc, &[], 0).unwrap();
        compute.run(&gl);
        assert_eq!(compute.passes(), 0);
        assert_eq!(gl.count_calls(|c| matches!(c, crate::gl::headless::GlCall::TransformFeedbackPass { .. })), 0);
    }

    #[test]
    fn creates_program_with_feedback_varying() {
        let gl = HeadlessGl::new(100, 100);
        let mut alloc = Allocation::new(&gl);
        ParticleCompute::create(&gl, &mut alloc, &[0.0; 3], 1).unwrap();
        assert_eq!(gl.live_of(ObjectKind::TransformFeedback), 1);
        assert_eq!(gl.live_of(ObjectKind::Buffer), 3);
        assert_eq!(gl.live_of(ObjectKind::VertexArray), 2);
        assert!(gl.calls().iter().any(|c| matches!(
            c,
            crate::gl::headless::GlCall::LinkProgram { feedback_varyings, .. }
                if feedback_varyings == &vec!["oParticlePosition".to_string()]
        )));
    }
}
