mod app;
mod camera;
mod gpu;
mod mesh;

#[cfg(test)]
mod tests;

// Re-export public API
pub use camera::{Camera, FrameTransforms};
pub use gpu::{Attachment, DebugView, GBuffer, GpuContext, Renderer, ShaderPipe};
pub use mesh::{bounding_sphere, needs_upright_fix, Mesh, Vertex};

fn main() {
    env_logger::init();

    let args: Vec<String> = std::env::args().collect();

    let mesh_path = match args.get(1) {
        Some(path) => path.clone(),
        None => {
            eprintln!("Usage: {} scene.obj", args.first().map(String::as_str).unwrap_or("toon"));
            std::process::exit(1);
        }
    };

    if let Err(e) = app::run(mesh_path) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
