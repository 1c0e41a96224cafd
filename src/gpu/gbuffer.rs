//! Geometry buffer: the multi-attachment offscreen render target shared by
//! all three passes.
//!
//! Attachment layout (fixed, indexed by [`Attachment`]):
//! - 0 `Colour`    (Rgba16Float): surface albedo in linear RGB
//! - 1 `Normal`    (Rgba16Float): view-space unit normal (zero = background)
//! - 2 `Depth`     (Rgba16Float): normalized depth replicated into RGB
//! - 3 `Laplacian` (Rgba16Float): edge mask written by pass 2
//!
//! plus one Depth32Float image used for depth testing in pass 1. All images
//! share the framebuffer pixel size and are sampled nearest by the passes;
//! they carry geometric data, not photographic color.

use super::context::GpuContext;

/// Role of each color attachment, in draw-target order.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(usize)]
pub enum Attachment {
    Colour = 0,
    Normal = 1,
    Depth = 2,
    Laplacian = 3,
}

/// Number of color attachments the renderer uses.
pub const NUM_GBUFFERS: usize = 4;

/// Minimum color-attachment capability required of the device.
pub const MIN_COLOR_ATTACHMENTS: u32 = 5;

/// Format of every color attachment.
pub const GBUFFER_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba16Float;

/// Format of the depth image.
pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

impl Attachment {
    /// Clear value for this attachment. Colour and depth clear to white so
    /// the background survives a pass-through display; a zero-length normal
    /// marks background pixels for pass 3.
    pub fn clear_value(self) -> wgpu::Color {
        match self {
            Attachment::Colour | Attachment::Depth => wgpu::Color::WHITE,
            Attachment::Normal | Attachment::Laplacian => wgpu::Color::TRANSPARENT,
        }
    }
}

/// Offscreen render target with N color images plus a depth image.
///
/// Owns its textures exclusively; dropping the GBuffer releases them. The
/// renderer rebuilds the whole thing on every window resize.
pub struct GBuffer {
    #[allow(dead_code)]
    textures: Vec<wgpu::Texture>,
    views: Vec<wgpu::TextureView>,
    #[allow(dead_code)]
    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
    size: (u32, u32),
}

impl GBuffer {
    /// Allocate `num_attachments` color images plus a depth image, all sized
    /// to the context's framebuffer (which may differ from the logical
    /// window size on high-DPI displays).
    ///
    /// Fails if the device cannot attach that many color targets, if the
    /// framebuffer size is degenerate, or if allocation raises a validation
    /// error (the incomplete-framebuffer case).
    pub fn new(ctx: &GpuContext, num_attachments: usize) -> Result<Self, String> {
        let max = ctx.device.limits().max_color_attachments;
        let needed = MIN_COLOR_ATTACHMENTS.max(num_attachments as u32);
        if max < needed {
            return Err(format!(
                "Can only attach {} color targets on this device, but {} are needed",
                max, needed
            ));
        }

        let (width, height) = ctx.size;
        if width == 0 || height == 0 {
            return Err(format!("Degenerate framebuffer size {}x{}", width, height));
        }

        let extent = wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        };

        // Capture any validation error raised during allocation so the
        // failure names its cause instead of surfacing as a later panic.
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);

        let mut textures = Vec::with_capacity(num_attachments);
        let mut views = Vec::with_capacity(num_attachments);
        for i in 0..num_attachments {
            let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
                label: Some(&format!("GBuffer Attachment {}", i)),
                size: extent,
                mip_level_count: 1,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: GBUFFER_FORMAT,
                usage: wgpu::TextureUsages::RENDER_ATTACHMENT
                    | wgpu::TextureUsages::TEXTURE_BINDING,
                view_formats: &[],
            });
            views.push(texture.create_view(&Default::default()));
            textures.push(texture);
        }

        let depth_texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("GBuffer Depth"),
            size: extent,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let depth_view = depth_texture.create_view(&Default::default());

        if let Some(error) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(format!("Incomplete G-buffer: {}", error));
        }

        Ok(Self {
            textures,
            views,
            depth_texture,
            depth_view,
            size: (width, height),
        })
    }

    /// Pixel dimensions of every attachment.
    pub fn size(&self) -> (u32, u32) {
        self.size
    }

    /// (1/width, 1/height), for addressing neighbour texels in pass 2.
    pub fn texel_size(&self) -> [f32; 2] {
        [1.0 / self.size.0 as f32, 1.0 / self.size.1 as f32]
    }

    /// View of color attachment `a`, for sampling or blitting.
    pub fn view(&self, a: Attachment) -> &wgpu::TextureView {
        &self.views[a as usize]
    }

    /// Color-attachment list for a render pass writing the given subset of
    /// draw targets, each cleared to its fixed clear value.
    pub fn color_attachments(
        &self,
        subset: &[Attachment],
    ) -> Vec<Option<wgpu::RenderPassColorAttachment<'_>>> {
        subset
            .iter()
            .map(|&a| {
                Some(wgpu::RenderPassColorAttachment {
                    view: self.view(a),
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(a.clear_value()),
                        store: wgpu::StoreOp::Store,
                    },
                })
            })
            .collect()
    }

    /// Depth attachment for pass 1, cleared to the far plane.
    pub fn depth_attachment(&self) -> wgpu::RenderPassDepthStencilAttachment<'_> {
        wgpu::RenderPassDepthStencilAttachment {
            view: &self.depth_view,
            depth_ops: Some(wgpu::Operations {
                load: wgpu::LoadOp::Clear(1.0),
                store: wgpu::StoreOp::Store,
            }),
            stencil_ops: None,
        }
    }
}
