use std::{path::Path, time::Duration};

use anyhow::{Context, anyhow, bail};
use glow::HasContext;
use sdl2::{event::Event, event::WindowEvent, keyboard::Keycode};

use crate::{
    abs::*,
    config::ViewerConfig,
    mesh::MeshData,
    scene::{Camera, Scene, SceneObject, aspect_ratio},
};

mod abs;
mod config;
mod logging;
mod mesh;
mod scene;

fn main() {
    let args: Vec<String> = std::env::args().collect();
    if args.len() != 2 {
        let program = args.first().map(String::as_str).unwrap_or("meshview");
        eprintln!("Usage: {} <mesh file>", program);
        std::process::exit(1);
    }

    if let Err(e) = logging::init() {
        eprintln!("Failed to set up logging: {}", e);
    }

    if let Err(e) = run(Path::new(&args[1])) {
        log::error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load_config() -> anyhow::Result<ViewerConfig> {
    match ViewerConfig::default_path() {
        Some(path) => {
            let config = ViewerConfig::load(&path).map_err(|e| anyhow!("invalid config {}", e))?;
            log::debug!("Settings from {}: {:?}", path.display(), config);
            Ok(config)
        }
        None => Ok(ViewerConfig::default()),
    }
}

fn run(mesh_path: &Path) -> anyhow::Result<()> {
    let config = load_config()?;

    let mesh = MeshData::load(mesh_path)
        .with_context(|| format!("Failed to load mesh {}", mesh_path.display()))?;
    log::info!(
        "Loaded {}: {} vertices, {} faces",
        mesh_path.display(),
        mesh.vertex_count(),
        mesh.face_count()
    );
    if let Some((face, index)) = mesh.first_out_of_range_index() {
        bail!(
            "Face {} of {} references vertex {}, but there are only {} vertices",
            face + 1,
            mesh_path.display(),
            index,
            mesh.vertex_count()
        );
    }

    let mut app =
        App::new(&config.window).map_err(|e| anyhow!("Failed to create window: {}", e))?;

    unsafe {
        if config.window.samples > 0 {
            app.gl.enable(glow::MULTISAMPLE);
        }
        app.gl.enable(glow::DEPTH_TEST);
    }

    let gpu_mesh = Mesh::new(
        &app.gl,
        &mesh.vertices(),
        &mesh.flat_indices(),
        glow::TRIANGLES,
    )
    .map_err(|e| anyhow!("Failed to upload mesh: {}", e))?;
    log::debug!("Uploaded {} indices", gpu_mesh.index_count());
    drop(mesh);

    let program = ShaderProgram::from_files(&app.gl, &config.shaders.sources())
        .context("Failed to build shader program")?;

    let mut scene = Scene {
        object: SceneObject::new(gpu_mesh, program),
        camera: Camera::new(&config.camera),
        light_dir: config.render.light_dir(),
    };

    let mut aspect = aspect_ratio(app.drawable_size());
    let clear_color = config.render.clear_color();
    let frame_delay = Duration::from_millis(config.animation.frame_delay_ms);

    'running: loop {
        for event in app.event_pump.poll_iter() {
            match event {
                Event::Quit { .. }
                | Event::KeyDown {
                    keycode: Some(Keycode::Escape),
                    ..
                } => break 'running,
                Event::Window {
                    win_event: WindowEvent::Resized(..),
                    ..
                } => {
                    // The event carries window coordinates, the viewport wants pixels.
                    let drawable = app.window.drawable_size();
                    unsafe {
                        app.gl.viewport(0, 0, drawable.0 as i32, drawable.1 as i32);
                    }
                    aspect = aspect_ratio(drawable);
                }
                _ => {}
            }
        }

        unsafe {
            app.gl
                .clear_color(clear_color.x, clear_color.y, clear_color.z, clear_color.w);
            app.gl
                .clear(glow::COLOR_BUFFER_BIT | glow::DEPTH_BUFFER_BIT);
        }

        std::thread::sleep(frame_delay);

        scene.object.rotate(config.animation.rotation_step);
        scene.camera.update(aspect);
        scene.render();

        app.window.gl_swap_window();
    }

    Ok(())
}
