//! Wavefront OBJ mesh with its albedo texture.
//!
//! Loads positions, normals, and texture coordinates (triangulated, single
//! index), reconstructs missing normals from face geometry, and computes the
//! bounding sphere used for camera placement. The first material's diffuse
//! texture becomes the albedo; meshes without one get a 1x1 white texture.

use std::path::Path;

use glam::Vec3;
use wgpu::util::DeviceExt;

use crate::gpu::GpuContext;

/// Interleaved vertex as pass 1 consumes it.
#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub uv: [f32; 2],
}

impl Vertex {
    pub fn layout() -> wgpu::VertexBufferLayout<'static> {
        const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<Vertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBUTES,
        }
    }
}

pub struct Mesh {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
    pub texture_view: wgpu::TextureView,
    pub sampler: wgpu::Sampler,
    #[allow(dead_code)]
    texture: wgpu::Texture,
    /// Centre of the bounding sphere, in object coordinates.
    pub centre: Vec3,
    /// Radius of the bounding sphere.
    pub radius: f32,
}

impl Mesh {
    pub fn load(ctx: &GpuContext, path: &str) -> Result<Self, String> {
        let (models, materials) = tobj::load_obj(path, &tobj::GPU_LOAD_OPTIONS)
            .map_err(|e| format!("Failed to load mesh {}: {}", path, e))?;
        if models.is_empty() {
            return Err(format!("Mesh {} contains no geometry", path));
        }

        let mut vertices: Vec<Vertex> = Vec::new();
        let mut indices: Vec<u32> = Vec::new();
        for model in &models {
            let mesh = &model.mesh;
            let base = vertices.len() as u32;
            let count = mesh.positions.len() / 3;
            for i in 0..count {
                let position = [
                    mesh.positions[3 * i],
                    mesh.positions[3 * i + 1],
                    mesh.positions[3 * i + 2],
                ];
                let normal = if mesh.normals.len() >= 3 * (i + 1) {
                    [
                        mesh.normals[3 * i],
                        mesh.normals[3 * i + 1],
                        mesh.normals[3 * i + 2],
                    ]
                } else {
                    [0.0; 3]
                };
                // OBJ puts the texture origin at the bottom-left; wgpu
                // samples from the top-left.
                let uv = if mesh.texcoords.len() >= 2 * (i + 1) {
                    [mesh.texcoords[2 * i], 1.0 - mesh.texcoords[2 * i + 1]]
                } else {
                    [0.0; 2]
                };
                vertices.push(Vertex {
                    position,
                    normal,
                    uv,
                });
            }
            indices.extend(mesh.indices.iter().map(|&i| base + i));
        }

        if models.iter().any(|m| m.mesh.normals.is_empty()) {
            reconstruct_normals(&mut vertices, &indices);
        }

        let positions: Vec<Vec3> = vertices.iter().map(|v| Vec3::from(v.position)).collect();
        let (centre, radius) = bounding_sphere(&positions);
        log::info!(
            "Loaded {}: {} vertices, {} triangles, radius {:.3}",
            path,
            vertices.len(),
            indices.len() / 3,
            radius
        );

        let vertex_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Vertex Buffer"),
                contents: bytemuck::cast_slice(&vertices),
                usage: wgpu::BufferUsages::VERTEX,
            });
        let index_buffer = ctx
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Mesh Index Buffer"),
                contents: bytemuck::cast_slice(&indices),
                usage: wgpu::BufferUsages::INDEX,
            });

        let (texture, texture_view) = load_albedo(ctx, path, materials)?;

        let sampler = ctx.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Albedo Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            address_mode_w: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Nearest,
            ..Default::default()
        });

        Ok(Self {
            vertex_buffer,
            index_buffer,
            index_count: indices.len() as u32,
            texture_view,
            sampler,
            texture,
            centre,
            radius,
        })
    }
}

/// Bounding-box centre plus the farthest-vertex radius.
pub fn bounding_sphere(positions: &[Vec3]) -> (Vec3, f32) {
    if positions.is_empty() {
        return (Vec3::ZERO, 0.0);
    }
    let mut min = positions[0];
    let mut max = positions[0];
    for &p in positions {
        min = min.min(p);
        max = max.max(p);
    }
    let centre = (min + max) * 0.5;
    let radius = positions
        .iter()
        .map(|p| p.distance(centre))
        .fold(0.0f32, f32::max);
    (centre, radius)
}

/// The torso model was digitized lying down and needs an extra -90 degree
/// rotation about X to stand upright.
pub fn needs_upright_fix(path: &str) -> bool {
    path.ends_with("torso.obj")
}

/// Area-weighted face normals accumulated per vertex.
pub(crate) fn reconstruct_normals(vertices: &mut [Vertex], indices: &[u32]) {
    let mut accum = vec![Vec3::ZERO; vertices.len()];
    for tri in indices.chunks_exact(3) {
        let (a, b, c) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        let pa = Vec3::from(vertices[a].position);
        let pb = Vec3::from(vertices[b].position);
        let pc = Vec3::from(vertices[c].position);
        let n = (pb - pa).cross(pc - pa);
        accum[a] += n;
        accum[b] += n;
        accum[c] += n;
    }
    for (v, n) in vertices.iter_mut().zip(accum) {
        v.normal = n.normalize_or_zero().to_array();
    }
}

fn load_albedo(
    ctx: &GpuContext,
    obj_path: &str,
    materials: Result<Vec<tobj::Material>, tobj::LoadError>,
) -> Result<(wgpu::Texture, wgpu::TextureView), String> {
    let diffuse = materials
        .ok()
        .and_then(|mats| mats.into_iter().find_map(|m| m.diffuse_texture));

    let (pixels, width, height) = match diffuse {
        Some(name) => {
            // Texture paths in the MTL are relative to the OBJ's directory.
            let tex_path = Path::new(obj_path)
                .parent()
                .unwrap_or_else(|| Path::new("."))
                .join(&name);
            let img = image::open(&tex_path)
                .map_err(|e| format!("Failed to load texture {}: {}", tex_path.display(), e))?
                .to_rgba8();
            let (w, h) = img.dimensions();
            (img.into_raw(), w, h)
        }
        None => {
            log::info!("Mesh {} has no diffuse texture, using white", obj_path);
            (vec![255u8; 4], 1, 1)
        }
    };

    let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Albedo Texture"),
        size: wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    ctx.queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        &pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d {
            width,
            height,
            depth_or_array_layers: 1,
        },
    );

    let view = texture.create_view(&Default::default());
    Ok((texture, view))
}
