#[cfg(not(target_arch = "wasm32"))]
fn run_headless_demo() {
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;

    use glam::{Quat, Vec3};
    use wsplat::gl::HeadlessGl;
    use wsplat::sort::ThreadSpawner;
    use wsplat::{PerspectiveCamera, Renderer, SharedCamera, SharedScene, Splat, SplatScene};

    const SPLATS: usize = 4096;
    const FRAMES: usize = 120;
    const ORBIT_RADIUS: f32 = 6.0;

    // Spiral of splats with a hue sweep.
    let splats = (0..SPLATS)
        .map(|i| {
            let t = i as f32 / SPLATS as f32;
            let angle = t * std::f32::consts::TAU * 8.0;
            let color = [(255.0 * t) as u8, (255.0 * (1.0 - t)) as u8, 180, 255];
            Splat {
                position: Vec3::new(angle.cos() * 2.0, t * 4.0 - 2.0, angle.sin() * 2.0),
                scale: Vec3::splat(0.02 + 0.03 * t),
                rotation: Quat::from_rotation_y(angle),
                color,
            }
        })
        .collect();

    let camera = Rc::new(RefCell::new(PerspectiveCamera::default()));
    let scene: SharedScene = Rc::new(RefCell::new(SplatScene::from_splats(splats)));
    let shared_camera: SharedCamera = camera.clone();

    let mut renderer = Renderer::new(HeadlessGl::new(1280, 720), ThreadSpawner::new());

    for frame in 0..FRAMES {
        let angle = frame as f32 / FRAMES as f32 * std::f32::consts::TAU;
        {
            let mut camera = camera.borrow_mut();
            camera.set_position(Vec3::new(angle.sin() * ORBIT_RADIUS, 1.0, -angle.cos() * ORBIT_RADIUS));
            camera.look_at(Vec3::ZERO);
        }
        renderer.render(&scene, &shared_camera);
        // Give the sort thread a chance to answer before the next frame.
        std::thread::sleep(Duration::from_millis(2));
    }

    let stats = renderer.frame_stats();
    log::info!(
        "{} frames drawn, {} skipped, {} depth orders applied, {} compute passes",
        stats.frames_drawn,
        stats.frames_skipped,
        stats.sort_results,
        renderer.compute_passes()
    );

    renderer.set_mouse_position(640.0, 360.0);
    renderer.pointer_down();
    renderer.pointer_up();
    match renderer.intersect(wsplat::Vector3::new(0.0, 0.0, 0.0), 2.0) {
        Some(hit) => log::info!("pick ray hits the spiral at {:?}", hit.point),
        None => log::info!("pick ray misses the spiral"),
    }

    renderer.dispose();
    log::info!("{} GL objects live after dispose", renderer.gl().live_objects());
}

fn main() {
    wsplat::init_logging();

    #[cfg(not(target_arch = "wasm32"))]
    {
        run_headless_demo();
    }

    #[cfg(target_arch = "wasm32")]
    {
        log::info!("WASM target - entry point is in lib.rs");
    }
}
