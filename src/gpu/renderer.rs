//! Three-pass toon renderer.
//!
//! Pass 1 rasterizes the mesh into the G-buffer (albedo, view-space normal,
//! normalized depth). Pass 2 runs a 3x3 Laplacian over normals and depth to
//! write an edge mask into attachment 3. Pass 3 composites the quantized
//! shaded image with the outlines into the window surface. The passes are
//! submitted in order on the one queue, so read-after-write between them is
//! serialized by the driver.

use crate::camera::FrameTransforms;
use crate::mesh::{Mesh, Vertex};

use super::blit::BlitPipeline;
use super::context::GpuContext;
use super::gbuffer::{Attachment, GBuffer, DEPTH_FORMAT, GBUFFER_FORMAT, NUM_GBUFFERS};
use super::shader_pipe::ShaderPipe;

/// Which image the final draw presents. Cycles Dummy -> Pass1 -> Pass2 ->
/// Pass3 -> Dummy; Pass3 is the normal toon output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DebugView {
    /// Pass-through of attachment 0, bypassing passes 2 and 3.
    Dummy,
    /// Four-quadrant view of all color attachments.
    Pass1,
    /// The Laplacian edge mask, full screen.
    Pass2,
    /// The full toon composite.
    Pass3,
}

impl DebugView {
    pub fn next(self) -> DebugView {
        match self {
            DebugView::Dummy => DebugView::Pass1,
            DebugView::Pass1 => DebugView::Pass2,
            DebugView::Pass2 => DebugView::Pass3,
            DebugView::Pass3 => DebugView::Dummy,
        }
    }

    pub fn status_message(self) -> String {
        match self {
            DebugView::Dummy => "Program output".to_string(),
            DebugView::Pass1 => "After pass 1".to_string(),
            DebugView::Pass2 => "After pass 2".to_string(),
            DebugView::Pass3 => "After pass 3".to_string(),
        }
    }
}

/// Pass-1 uniforms: the model, model-view, and model-view-projection
/// transforms, as column-major mat4x4.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Pass1Uniforms {
    m: [[f32; 4]; 4],
    mv: [[f32; 4]; 4],
    mvp: [[f32; 4]; 4],
}

/// Pass-2 uniforms: (1/width, 1/height) for neighbour-texel addressing.
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Pass2Uniforms {
    texel_size: [f32; 2],
    _pad: [f32; 2],
}

/// Pass-3 uniforms: light direction in view space and the interactively
/// tuned quantization factor (passed through verbatim, never clamped).
#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct Pass3Uniforms {
    light_dir: [f32; 3],
    factor: f32,
}

struct GeometryPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
}

struct EdgePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct CompositePass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    uniform_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,
}

struct DummyPass {
    pipeline: wgpu::RenderPipeline,
    bind_group_layout: wgpu::BindGroupLayout,
    bind_group: wgpu::BindGroup,
}

/// Owns the G-buffer and the four pass programs; sequences the per-frame
/// pipeline. Dropped members release their GPU objects in reverse
/// construction order.
pub struct Renderer {
    gbuffer: GBuffer,
    sampler_nearest: wgpu::Sampler,
    pass1: GeometryPass,
    pass2: EdgePass,
    pass3: CompositePass,
    dummy: DummyPass,
    blit: BlitPipeline,
    // One blit bind group per color attachment, rebuilt with the G-buffer.
    blit_bindings: Vec<wgpu::BindGroup>,
    pub debug: DebugView,
}

impl Renderer {
    pub fn new(ctx: &GpuContext) -> Result<Self, String> {
        let gbuffer = GBuffer::new(ctx, NUM_GBUFFERS)?;

        // The passes read the G-buffer nearest: its texels are geometric
        // data, and filtering between them would invent geometry.
        let sampler_nearest = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("GBuffer Sampler (Nearest)"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Nearest,
            min_filter: wgpu::FilterMode::Nearest,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        let pass1_prog = ShaderPipe::new(ctx, "pass1.vert.wgsl", "pass1.frag.wgsl")?;
        let pass2_prog = ShaderPipe::new(ctx, "pass2.vert.wgsl", "pass2.frag.wgsl")?;
        let pass3_prog = ShaderPipe::new(ctx, "pass3.vert.wgsl", "pass3.frag.wgsl")?;
        let dummy_prog = ShaderPipe::new(ctx, "dummy.vert.wgsl", "dummy.frag.wgsl")?;

        let pass1 = Self::build_pass1(ctx, &pass1_prog);
        let pass2 = Self::build_pass2(ctx, &pass2_prog, &gbuffer, &sampler_nearest);
        let pass3 = Self::build_pass3(ctx, &pass3_prog, &gbuffer, &sampler_nearest);
        let dummy = Self::build_dummy(ctx, &dummy_prog, &gbuffer, &sampler_nearest);

        let blit = BlitPipeline::new(ctx);
        let blit_bindings = Self::build_blit_bindings(ctx, &blit, &gbuffer);

        Ok(Self {
            gbuffer,
            sampler_nearest,
            pass1,
            pass2,
            pass3,
            dummy,
            blit,
            blit_bindings,
            debug: DebugView::Pass3, // initially show the finished composite
        })
    }

    /// Rebuild the G-buffer and everything that referenced its views for a
    /// new framebuffer size. The old G-buffer is released first; no pass
    /// state survives.
    pub fn resize(&mut self, ctx: &GpuContext) -> Result<(), String> {
        self.gbuffer = GBuffer::new(ctx, NUM_GBUFFERS)?;
        self.pass2.bind_group = Self::pass2_bind_group(
            ctx,
            &self.pass2.bind_group_layout,
            &self.pass2.uniform_buffer,
            &self.gbuffer,
            &self.sampler_nearest,
        );
        self.pass3.bind_group = Self::pass3_bind_group(
            ctx,
            &self.pass3.bind_group_layout,
            &self.pass3.uniform_buffer,
            &self.gbuffer,
            &self.sampler_nearest,
        );
        self.dummy.bind_group = Self::dummy_bind_group(
            ctx,
            &self.dummy.bind_group_layout,
            &self.gbuffer,
            &self.sampler_nearest,
        );
        self.blit_bindings = Self::build_blit_bindings(ctx, &self.blit, &self.gbuffer);
        Ok(())
    }

    pub fn cycle_debug(&mut self) {
        self.debug = self.debug.next();
    }

    pub fn status_message(&self) -> String {
        self.debug.status_message()
    }

    /// Render one frame: geometry fill, edge detection, then the composite
    /// (or the selected debug view) into the window surface.
    pub fn render(
        &mut self,
        ctx: &GpuContext,
        mesh: &Mesh,
        frame: &FrameTransforms,
        factor: f32,
    ) -> Result<(), String> {
        let output = match ctx.surface.get_current_texture() {
            Ok(output) => output,
            // Transient losses happen around resizes; reconfigure and skip.
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                ctx.surface.configure(&ctx.device, &ctx.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => return Ok(()),
            Err(e) => return Err(format!("Failed to acquire frame: {}", e)),
        };
        let surface_view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        self.upload_uniforms(ctx, frame, factor);

        let mut encoder = ctx
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        // Pass 1: rasterize the mesh into attachments {0, 1, 2} + depth.
        error_scope_begin(ctx);
        {
            let attachments = self
                .gbuffer
                .color_attachments(&[Attachment::Colour, Attachment::Normal, Attachment::Depth]);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pass 1 (Geometry)"),
                color_attachments: &attachments,
                depth_stencil_attachment: Some(self.gbuffer.depth_attachment()),
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            let mesh_binding = self.pass1_bind_group(ctx, mesh);
            pass.set_pipeline(&self.pass1.pipeline);
            pass.set_bind_group(0, &mesh_binding, &[]);
            pass.set_vertex_buffer(0, mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..mesh.index_count, 0, 0..1);
        }
        error_scope_end(ctx, "pass 1")?;

        // Pass 2: Laplacian of normals and depth into attachment 3 only.
        error_scope_begin(ctx);
        {
            let attachments = self.gbuffer.color_attachments(&[Attachment::Laplacian]);
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pass 2 (Edges)"),
                color_attachments: &attachments,
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            pass.set_pipeline(&self.pass2.pipeline);
            pass.set_bind_group(0, &self.pass2.bind_group, &[]);
            pass.draw(0..3, 0..1);
        }
        error_scope_end(ctx, "pass 2")?;

        // Final pass to the window, depending on the debug view.
        error_scope_begin(ctx);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Pass 3 (Composite)"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &surface_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::WHITE),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                timestamp_writes: None,
                occlusion_query_set: None,
            });

            match self.debug {
                DebugView::Pass3 => {
                    pass.set_pipeline(&self.pass3.pipeline);
                    pass.set_bind_group(0, &self.pass3.bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
                DebugView::Dummy => {
                    pass.set_pipeline(&self.dummy.pipeline);
                    pass.set_bind_group(0, &self.dummy.bind_group, &[]);
                    pass.draw(0..3, 0..1);
                }
                DebugView::Pass2 => {
                    self.blit
                        .draw(&mut pass, &self.blit_bindings[Attachment::Laplacian as usize]);
                }
                DebugView::Pass1 => {
                    self.draw_gbuffers(ctx, &mut pass);
                }
            }
        }
        error_scope_end(ctx, "pass 3")?;

        error_scope_begin(ctx);
        ctx.queue.submit(std::iter::once(encoder.finish()));
        error_scope_end(ctx, "submit")?;

        output.present();

        Ok(())
    }

    /// Debug aid: blit the four color attachments into the four quadrants
    /// of the window. Lower-left = 0, upper-left = 1, upper-right = 2,
    /// lower-right = 3 (viewport origin is the top-left corner).
    fn draw_gbuffers(&self, ctx: &GpuContext, pass: &mut wgpu::RenderPass<'_>) {
        let (w, h) = (ctx.size.0 as f32, ctx.size.1 as f32);
        let (hw, hh) = (w / 2.0, h / 2.0);

        let quadrants = [
            (Attachment::Colour, 0.0, hh),
            (Attachment::Normal, 0.0, 0.0),
            (Attachment::Depth, hw, 0.0),
            (Attachment::Laplacian, hw, hh),
        ];
        for (attachment, x, y) in quadrants {
            pass.set_viewport(x, y, hw, hh, 0.0, 1.0);
            self.blit.draw(pass, &self.blit_bindings[attachment as usize]);
        }
        pass.set_viewport(0.0, 0.0, w, h, 0.0, 1.0);
    }

    fn upload_uniforms(&self, ctx: &GpuContext, frame: &FrameTransforms, factor: f32) {
        let pass1 = Pass1Uniforms {
            m: frame.m.to_cols_array_2d(),
            mv: frame.mv.to_cols_array_2d(),
            mvp: frame.mvp.to_cols_array_2d(),
        };
        ctx.queue
            .write_buffer(&self.pass1.uniform_buffer, 0, bytemuck::cast_slice(&[pass1]));

        let pass2 = Pass2Uniforms {
            texel_size: self.gbuffer.texel_size(),
            _pad: [0.0; 2],
        };
        ctx.queue
            .write_buffer(&self.pass2.uniform_buffer, 0, bytemuck::cast_slice(&[pass2]));

        let pass3 = Pass3Uniforms {
            light_dir: frame.light_dir.to_array(),
            factor,
        };
        ctx.queue
            .write_buffer(&self.pass3.uniform_buffer, 0, bytemuck::cast_slice(&[pass3]));
    }

    // ---- pass construction ------------------------------------------------

    fn build_pass1(ctx: &GpuContext, prog: &ShaderPipe) -> GeometryPass {
        let device = &ctx.device;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pass 1 Bind Group Layout"),
            entries: &[
                // M / MV / MVP
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                // albedo texture
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass 1 Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        // One fragment target per written attachment: colour, normal, depth.
        let targets = [
            Some(wgpu::ColorTargetState {
                format: GBUFFER_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: GBUFFER_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
            Some(wgpu::ColorTargetState {
                format: GBUFFER_FORMAT,
                blend: None,
                write_mask: wgpu::ColorWrites::ALL,
            }),
        ];

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Pass 1 Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &prog.vertex,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::layout()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &prog.fragment,
                entry_point: Some("fs_main"),
                targets: &targets,
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: None, // OBJ meshes are not reliably wound
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pass 1 Uniform Buffer"),
            size: std::mem::size_of::<Pass1Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        GeometryPass {
            pipeline,
            bind_group_layout,
            uniform_buffer,
        }
    }

    fn pass1_bind_group(&self, ctx: &GpuContext, mesh: &Mesh) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pass 1 Bind Group"),
            layout: &self.pass1.bind_group_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: self.pass1.uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(&mesh.texture_view),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::Sampler(&mesh.sampler),
                },
            ],
        })
    }

    fn build_pass2(
        ctx: &GpuContext,
        prog: &ShaderPipe,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> EdgePass {
        let device = &ctx.device;

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        // Attachments 0-2 on bindings 1-3, in slot order.
        for i in 1..=3 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 4,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pass 2 Bind Group Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass 2 Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Pass 2 Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &prog.vertex,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &prog.fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: GBUFFER_FORMAT,
                    blend: None,
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pass 2 Uniform Buffer"),
            size: std::mem::size_of::<Pass2Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group =
            Self::pass2_bind_group(ctx, &bind_group_layout, &uniform_buffer, gbuffer, sampler);

        EdgePass {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            bind_group,
        }
    }

    fn pass2_bind_group(
        ctx: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pass 2 Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Colour)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Normal)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn build_pass3(
        ctx: &GpuContext,
        prog: &ShaderPipe,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> CompositePass {
        let device = &ctx.device;

        let mut entries = vec![wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }];
        // All four attachments on bindings 1-4, in slot order.
        for i in 1..=4 {
            entries.push(wgpu::BindGroupLayoutEntry {
                binding: i,
                visibility: wgpu::ShaderStages::FRAGMENT,
                ty: wgpu::BindingType::Texture {
                    sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    view_dimension: wgpu::TextureViewDimension::D2,
                    multisampled: false,
                },
                count: None,
            });
        }
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 5,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
            count: None,
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Pass 3 Bind Group Layout"),
            entries: &entries,
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Pass 3 Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Pass 3 Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &prog.vertex,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &prog.fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let uniform_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Pass 3 Uniform Buffer"),
            size: std::mem::size_of::<Pass3Uniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group =
            Self::pass3_bind_group(ctx, &bind_group_layout, &uniform_buffer, gbuffer, sampler);

        CompositePass {
            pipeline,
            bind_group_layout,
            uniform_buffer,
            bind_group,
        }
    }

    fn pass3_bind_group(
        ctx: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        uniform_buffer: &wgpu::Buffer,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Pass 3 Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: uniform_buffer.as_entire_binding(),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Colour)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Normal)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::TextureView(
                        gbuffer.view(Attachment::Laplacian),
                    ),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn build_dummy(
        ctx: &GpuContext,
        prog: &ShaderPipe,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> DummyPass {
        let device = &ctx.device;

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Dummy Bind Group Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Dummy Pipeline Layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("Dummy Pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &prog.vertex,
                entry_point: Some("vs_main"),
                buffers: &[],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &prog.fragment,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: ctx.format(),
                    blend: Some(wgpu::BlendState::REPLACE),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState::default(),
            depth_stencil: None,
            multisample: wgpu::MultisampleState::default(),
            multiview: None,
            cache: None,
        });

        let bind_group = Self::dummy_bind_group(ctx, &bind_group_layout, gbuffer, sampler);

        DummyPass {
            pipeline,
            bind_group_layout,
            bind_group,
        }
    }

    fn dummy_bind_group(
        ctx: &GpuContext,
        layout: &wgpu::BindGroupLayout,
        gbuffer: &GBuffer,
        sampler: &wgpu::Sampler,
    ) -> wgpu::BindGroup {
        ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Dummy Bind Group"),
            layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(Attachment::Colour)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
            ],
        })
    }

    fn build_blit_bindings(
        ctx: &GpuContext,
        blit: &BlitPipeline,
        gbuffer: &GBuffer,
    ) -> Vec<wgpu::BindGroup> {
        [
            Attachment::Colour,
            Attachment::Normal,
            Attachment::Depth,
            Attachment::Laplacian,
        ]
        .iter()
        .map(|&a| blit.bind_group(ctx, gbuffer.view(a)))
        .collect()
    }
}

// GPU errors are polled per pass in debug builds; a non-empty queue aborts
// the frame with the call-site label. Release builds skip the polling.

fn error_scope_begin(ctx: &GpuContext) {
    if cfg!(debug_assertions) {
        ctx.device.push_error_scope(wgpu::ErrorFilter::Validation);
    }
}

fn error_scope_end(ctx: &GpuContext, site: &str) -> Result<(), String> {
    if cfg!(debug_assertions) {
        if let Some(error) = pollster::block_on(ctx.device.pop_error_scope()) {
            return Err(format!("{}: GPU error: {}", site, error));
        }
    }
    Ok(())
}
