//! Depth-sort worker protocol.
//!
//! The renderer posts the scene once per initialization and the current
//! view-projection every frame; the worker answers with splat indices in
//! draw order. Replies are not correlated with requests.

mod depth;
pub mod thread;
#[cfg(target_arch = "wasm32")]
pub mod web;

use serde::{Deserialize, Serialize};

use crate::error::WorkerError;
use crate::math::Matrix4;

pub use depth::{DepthSorter, depth_sort};
pub use thread::{ThreadSpawner, ThreadWorker};
#[cfg(target_arch = "wasm32")]
pub use web::{WebWorker, WebWorkerSpawner};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneGeometry {
    pub positions: Vec<f32>,
    pub vertex_count: usize,
}

/// Renderer to worker.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SortRequest {
    #[serde(rename = "scene")]
    LoadScene(SceneGeometry),
    #[serde(rename = "viewProj")]
    UpdateViewProj(Matrix4),
}

/// Worker to renderer.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum SortResponse {
    #[serde(rename = "depthIndex")]
    SortedIndices(Vec<u32>),
}

pub trait SortWorker {
    /// Fire-and-forget.
    fn post(&mut self, request: SortRequest) -> Result<(), WorkerError>;
    /// Next pending reply, if any. Never blocks.
    fn try_recv(&mut self) -> Option<SortResponse>;
    /// Stops the worker. Later replies are dropped.
    fn terminate(&mut self);

    /// Drains pending replies and keeps the newest.
    fn latest(&mut self) -> Option<SortResponse> {
        let mut latest = None;
        while let Some(response) = self.try_recv() {
            latest = Some(response);
        }
        latest
    }
}

pub trait WorkerSpawner {
    type Worker: SortWorker;

    fn spawn(&mut self) -> Result<Self::Worker, WorkerError>;
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn load_scene_wire_shape() {
        let request = SortRequest::LoadScene(SceneGeometry {
            positions: vec![1.0, 2.0, 3.0],
            vertex_count: 1,
        });
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({ "scene": { "positions": [1.0, 2.0, 3.0], "vertexCount": 1 } })
        );
    }

    #[test]
    fn view_proj_wire_shape() {
        let value = serde_json::to_value(SortRequest::UpdateViewProj(Matrix4::IDENTITY)).unwrap();
        let buffer = value["viewProj"]["buffer"].as_array().unwrap();
        assert_eq!(buffer.len(), 16);
        assert_eq!(buffer[0], json!(1.0));
        assert_eq!(buffer[15], json!(1.0));
    }

    #[test]
    fn depth_index_wire_shape() {
        let response = SortResponse::SortedIndices(vec![2, 0, 1]);
        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value, json!({ "depthIndex": [2, 0, 1] }));
        let parsed: SortResponse = serde_json::from_value(value).unwrap();
        assert_eq!(parsed, response);
    }
}
