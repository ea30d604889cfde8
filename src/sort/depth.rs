use super::SceneGeometry;
use crate::math::Matrix4;

const BUCKETS: usize = 256 * 256;

// Re-sorting is skipped while the view direction stays within this tolerance.
const DIRECTION_EPSILON: f32 = 0.01;

/// Orders points by ascending view depth with a 16-bit counting sort.
///
/// The key is `view_proj[2] * x + view_proj[6] * y + view_proj[10] * z`,
/// scaled by 4096 and truncated, then quantized into 65536 buckets over the
/// observed range. Points in the same bucket keep their input order.
pub fn depth_sort(positions: &[f32], vertex_count: usize, view_proj: &Matrix4) -> Vec<u32> {
    let count = vertex_count.min(positions.len() / 3);
    if count == 0 {
        return Vec::new();
    }
    let m = &view_proj.buffer;

    let keys: Vec<i32> = positions
        .chunks_exact(3)
        .take(count)
        .map(|p| ((m[2] * p[0] + m[6] * p[1] + m[10] * p[2]) * 4096.0) as i32)
        .collect();
    let (min, max) = keys
        .iter()
        .fold((i32::MAX, i32::MIN), |(lo, hi), &k| (lo.min(k), hi.max(k)));

    let range = (max as i64 - min as i64) as f64;
    let scale = if range > 0.0 { BUCKETS as f64 / range } else { 0.0 };
    let buckets: Vec<usize> = keys
        .iter()
        .map(|&k| (((k as i64 - min as i64) as f64 * scale) as usize).min(BUCKETS - 1))
        .collect();

    let mut counts = vec![0u32; BUCKETS];
    for &b in &buckets {
        counts[b] += 1;
    }
    let mut starts = vec![0u32; BUCKETS];
    for i in 1..BUCKETS {
        starts[i] = starts[i - 1] + counts[i - 1];
    }

    let mut order = vec![0u32; count];
    for (i, &b) in buckets.iter().enumerate() {
        order[starts[b] as usize] = i as u32;
        starts[b] += 1;
    }
    order
}

/// Worker-side sort state: the loaded scene and the last view it sorted for.
#[derive(Default)]
pub struct DepthSorter {
    scene: Option<SceneGeometry>,
    last_view_proj: Option<Matrix4>,
}

impl DepthSorter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, scene: SceneGeometry) {
        log::debug!("sorter loaded {} points", scene.vertex_count);
        self.scene = Some(scene);
        self.last_view_proj = None;
    }

    /// Sorts for `view_proj`, or returns `None` when no scene is loaded or the
    /// view direction has not moved since the last sort.
    pub fn sort(&mut self, view_proj: &Matrix4) -> Option<Vec<u32>> {
        let scene = self.scene.as_ref()?;
        if let Some(last) = &self.last_view_proj {
            let (a, b) = (&last.buffer, &view_proj.buffer);
            let dot = a[2] * b[2] + a[6] * b[6] + a[10] * b[10];
            if (dot - 1.0).abs() < DIRECTION_EPSILON {
                return None;
            }
        }
        self.last_view_proj = Some(*view_proj);
        Some(depth_sort(&scene.positions, scene.vertex_count, view_proj))
    }
}
