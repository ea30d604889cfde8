//! Error types shared by the GL, worker and scene layers.

use thiserror::Error;

pub type GlResult<T> = Result<T, GlError>;

/// Failures talking to the GL context.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GlError {
    #[error("failed to allocate {0}")]
    Allocation(&'static str),

    #[error("GL context lost")]
    ContextLost,

    #[error("WebGL2 unavailable: {0}")]
    Unavailable(String),
}

/// Failures on the renderer side of the sort-worker channel.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WorkerError {
    #[error("failed to spawn sort worker: {0}")]
    Spawn(String),

    #[error("sort worker terminated")]
    Terminated,

    #[error("failed to post message: {0}")]
    Post(String),
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    #[error("splat buffer of {len} bytes is not a multiple of the {record}-byte record")]
    Truncated { len: usize, record: usize },
}
