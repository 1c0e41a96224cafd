//! Host loop: window, input, and per-frame dispatch.

use std::sync::Arc;
use std::time::Instant;

use winit::{
    application::ApplicationHandler,
    event::{ElementState, KeyEvent, WindowEvent},
    event_loop::{ActiveEventLoop, ControlFlow, EventLoop},
    keyboard::{Key, KeyCode, PhysicalKey},
    window::{Window, WindowId},
};

use crate::camera::Camera;
use crate::gpu::{GpuContext, Renderer};
use crate::mesh::{needs_upright_fix, Mesh};

const WINDOW_WIDTH: f64 = 600.0;
const WINDOW_HEIGHT: f64 = 400.0;

struct AppState {
    gpu_ctx: GpuContext,
    renderer: Renderer,
    mesh: Mesh,
    camera: Camera,
    /// Quantization steepness uniform, tuned with F/f. Passed through
    /// verbatim; there is no documented valid range.
    factor: f32,
    last_frame: Instant,
}

impl AppState {
    fn new(window: Arc<Window>, mesh_path: &str) -> Result<Self, String> {
        let gpu_ctx = GpuContext::new(window)?;
        let mesh = Mesh::load(&gpu_ctx, mesh_path)?;
        let camera = Camera::new(mesh.centre, mesh.radius, needs_upright_fix(mesh_path));
        let renderer = Renderer::new(&gpu_ctx)?;

        Ok(Self {
            gpu_ctx,
            renderer,
            mesh,
            camera,
            factor: 0.0,
            last_frame: Instant::now(),
        })
    }

    fn update_and_render(&mut self) -> Result<(), String> {
        let now = Instant::now();
        let dt = now.duration_since(self.last_frame).as_secs_f32();
        self.last_frame = now;

        self.camera.advance(dt);
        let frame = self.camera.frame(self.gpu_ctx.aspect());
        self.renderer
            .render(&self.gpu_ctx, &self.mesh, &frame, self.factor)
    }

    fn show_status(&self) {
        let status = self.renderer.status_message();
        println!("{}", status);
        self.gpu_ctx.set_title(&format!("toon shading - {}", status));
    }
}

pub struct App {
    mesh_path: String,
    state: Option<AppState>,
    error: Option<String>,
}

impl App {
    pub fn new(mesh_path: String) -> Self {
        Self {
            mesh_path,
            state: None,
            error: None,
        }
    }

    fn fail(&mut self, event_loop: &ActiveEventLoop, error: String) {
        self.error = Some(error);
        event_loop.exit();
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.state.is_some() {
            return;
        }

        let window_attrs = Window::default_attributes()
            .with_title("toon shading")
            .with_inner_size(winit::dpi::LogicalSize::new(WINDOW_WIDTH, WINDOW_HEIGHT));

        let window = match event_loop.create_window(window_attrs) {
            Ok(window) => Arc::new(window),
            Err(e) => {
                self.fail(event_loop, format!("Failed to create window: {}", e));
                return;
            }
        };

        match AppState::new(window, &self.mesh_path) {
            Ok(state) => {
                state.show_status();
                self.state = Some(state);
            }
            Err(e) => self.fail(event_loop, e),
        }
    }

    fn window_event(&mut self, event_loop: &ActiveEventLoop, _id: WindowId, event: WindowEvent) {
        let state = match &mut self.state {
            Some(s) => s,
            None => return,
        };

        // Collected here so the state borrow ends before we record it.
        let mut fatal: Option<String> = None;

        match event {
            WindowEvent::CloseRequested => {
                event_loop.exit();
            }

            WindowEvent::Resized(size) => {
                // Redundant resizes to the current dimensions are ignored.
                if (size.width, size.height) == state.gpu_ctx.size {
                    return;
                }
                state.gpu_ctx.resize((size.width, size.height));
                if let Err(e) = state.renderer.resize(&state.gpu_ctx) {
                    fatal = Some(e);
                }
            }

            WindowEvent::KeyboardInput {
                event:
                    KeyEvent {
                        physical_key: PhysicalKey::Code(key),
                        logical_key,
                        state: ElementState::Pressed,
                        ..
                    },
                ..
            } => match key {
                KeyCode::Escape => event_loop.exit(),

                KeyCode::KeyP => {
                    state.camera.paused = !state.camera.paused;
                }

                KeyCode::KeyD => {
                    state.renderer.cycle_debug();
                    state.show_status();
                }

                // Uppercase increases, lowercase decreases.
                KeyCode::KeyF => {
                    if matches!(&logical_key, Key::Character(c) if c.as_str() == "F") {
                        state.factor += 0.01;
                    } else {
                        state.factor -= 0.01;
                    }
                    println!("factor = {}", state.factor);
                }

                KeyCode::ArrowUp => state.camera.dolly(1.0 / 1.1),
                KeyCode::ArrowDown => state.camera.dolly(1.1),
                KeyCode::ArrowLeft => state.camera.zoom(1.1),
                KeyCode::ArrowRight => state.camera.zoom(1.0 / 1.1),

                KeyCode::Slash => {
                    println!("p     - pause");
                    println!("d     - cycle debug views");
                    println!("F     - increase factor");
                    println!("f     - decrease factor");
                    println!("up    - move farther");
                    println!("down  - move closer");
                    println!("left  - zoom out");
                    println!("right - zoom in");
                }

                _ => {}
            },

            WindowEvent::RedrawRequested => {
                if let Err(e) = state.update_and_render() {
                    fatal = Some(e);
                }
            }

            _ => {}
        }

        if let Some(e) = fatal {
            self.fail(event_loop, e);
        }
    }

    fn about_to_wait(&mut self, _event_loop: &ActiveEventLoop) {
        if let Some(state) = &self.state {
            // Continuous redraw; the present call paces us to vsync.
            state.gpu_ctx.request_redraw();
        }
    }
}

/// Run the viewer until the window closes or a fatal error occurs.
pub fn run(mesh_path: String) -> Result<(), String> {
    let event_loop =
        EventLoop::new().map_err(|e| format!("Failed to create event loop: {}", e))?;
    event_loop.set_control_flow(ControlFlow::Poll);

    let mut app = App::new(mesh_path);
    event_loop
        .run_app(&mut app)
        .map_err(|e| format!("Event loop error: {}", e))?;

    match app.error {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
