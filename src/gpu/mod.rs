//! GPU rendering module using wgpu
//!
//! Provides the device/surface context, the multi-attachment geometry
//! buffer, shader loading, and the three-pass toon renderer.

pub mod blit;
pub mod context;
pub mod gbuffer;
pub mod renderer;
pub mod shader_pipe;

pub use context::GpuContext;
pub use gbuffer::{Attachment, GBuffer, NUM_GBUFFERS};
pub use renderer::{DebugView, Renderer};
pub use shader_pipe::ShaderPipe;
