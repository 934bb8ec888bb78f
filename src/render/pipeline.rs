use anyhow::Result;
use bytemuck::{Pod, Zeroable};
use wgpu;

use super::gpu::GpuContext;
use crate::scene::cage::CageGeometry;
use crate::scene::color::Color;
use crate::scene::scanner::{ScanOverlay, SCAN_POINTS};
use crate::scene::terrain::{TerrainMesh, TerrainVertex};
use crate::scene::LineVertex;

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

#[repr(C)]
#[derive(Clone, Copy, Debug, Pod, Zeroable)]
pub struct SceneUniforms {
    pub view_proj: [[f32; 4]; 4],
    pub light_dir: [f32; 3],
    pub time: f32,
}

/// The four fixed pipelines of the scene: opaque terrain triangles, cage
/// line list, crest line strip, and the alpha-blended curtain.
pub struct ScenePipelines {
    pub terrain: wgpu::RenderPipeline,
    pub curtain: wgpu::RenderPipeline,
    pub line_list: wgpu::RenderPipeline,
    pub line_strip: wgpu::RenderPipeline,
    pub bind_group_layout: wgpu::BindGroupLayout,
}

impl ScenePipelines {
    pub fn new(device: &wgpu::Device, texture_format: wgpu::TextureFormat) -> Result<Self> {
        let terrain_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("terrain_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("terrain.wgsl").into()),
        });
        let line_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("line_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("line.wgsl").into()),
        });

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("scene_bind_group_layout"),
            entries: &[
                // @binding(0): SceneUniforms
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
            ],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("scene_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            push_constant_ranges: &[],
        });

        let terrain_attrs =
            wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x3];
        let terrain_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<TerrainVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &terrain_attrs,
        };

        let line_attrs = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x4];
        let line_layout = wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<LineVertex>() as u64,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &line_attrs,
        };

        let terrain = build_pipeline(
            device,
            "terrain_pipeline",
            &pipeline_layout,
            &terrain_shader,
            terrain_layout.clone(),
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::BlendState::REPLACE,
            true,
            texture_format,
        );
        let curtain = build_pipeline(
            device,
            "curtain_pipeline",
            &pipeline_layout,
            &line_shader,
            line_layout.clone(),
            wgpu::PrimitiveTopology::TriangleList,
            wgpu::BlendState::ALPHA_BLENDING,
            false,
            texture_format,
        );
        let line_list = build_pipeline(
            device,
            "cage_line_pipeline",
            &pipeline_layout,
            &line_shader,
            line_layout.clone(),
            wgpu::PrimitiveTopology::LineList,
            wgpu::BlendState::ALPHA_BLENDING,
            false,
            texture_format,
        );
        let line_strip = build_pipeline(
            device,
            "crest_line_pipeline",
            &pipeline_layout,
            &line_shader,
            line_layout,
            wgpu::PrimitiveTopology::LineStrip,
            wgpu::BlendState::ALPHA_BLENDING,
            false,
            texture_format,
        );

        Ok(Self {
            terrain,
            curtain,
            line_list,
            line_strip,
            bind_group_layout,
        })
    }
}

#[allow(clippy::too_many_arguments)]
fn build_pipeline(
    device: &wgpu::Device,
    label: &str,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    vertex_layout: wgpu::VertexBufferLayout,
    topology: wgpu::PrimitiveTopology,
    blend: wgpu::BlendState,
    depth_write: bool,
    texture_format: wgpu::TextureFormat,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[vertex_layout],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some("fs_main"),
            targets: &[Some(wgpu::ColorTargetState {
                format: texture_format,
                blend: Some(blend),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: Some(wgpu::DepthStencilState {
            format: DEPTH_FORMAT,
            depth_write_enabled: depth_write,
            depth_compare: wgpu::CompareFunction::Less,
            stencil: Default::default(),
            bias: Default::default(),
        }),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

/// GPU-side geometry state. Cage and overlay buffers are allocated once
/// (their sizes are fixed by config and `SCAN_POINTS`); terrain buffers
/// are reallocated whole whenever a new grid is published.
pub struct SceneBuffers {
    pub uniforms: wgpu::Buffer,
    pub bind_group: wgpu::BindGroup,
    pub cage_vertices: wgpu::Buffer,
    pub cage_vertex_count: u32,
    pub terrain_vertices: Option<wgpu::Buffer>,
    pub terrain_indices: Option<wgpu::Buffer>,
    pub terrain_index_count: u32,
    pub crest_vertices: wgpu::Buffer,
    pub curtain_vertices: wgpu::Buffer,
    pub curtain_indices: wgpu::Buffer,
    pub curtain_index_count: u32,
    pub overlay_visible: bool,
}

impl SceneBuffers {
    pub fn new(gpu: &GpuContext, layout: &wgpu::BindGroupLayout, cage: &CageGeometry) -> Self {
        let uniforms = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("scene_uniforms"),
            size: std::mem::size_of::<SceneUniforms>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = gpu.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("scene_bind_group"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniforms.as_entire_binding(),
            }],
        });

        let cage_vertices = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("cage_vertices"),
            size: (cage.lines.len() * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&cage_vertices, 0, bytemuck::cast_slice(&cage.lines));

        let crest_vertices = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("crest_vertices"),
            size: (SCAN_POINTS * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let curtain_vertices = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("curtain_vertices"),
            size: (2 * SCAN_POINTS * std::mem::size_of::<LineVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let curtain_indices = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("curtain_indices"),
            size: ((SCAN_POINTS - 1) * 6 * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            uniforms,
            bind_group,
            cage_vertices,
            cage_vertex_count: cage.lines.len() as u32,
            terrain_vertices: None,
            terrain_indices: None,
            terrain_index_count: 0,
            crest_vertices,
            curtain_vertices,
            curtain_indices,
            curtain_index_count: 0,
            overlay_visible: false,
        }
    }

    pub fn write_uniforms(&self, gpu: &GpuContext, uniforms: &SceneUniforms) {
        gpu.queue
            .write_buffer(&self.uniforms, 0, bytemuck::bytes_of(uniforms));
    }

    /// Replace the terrain grid buffers. Always a fresh allocation: a
    /// buffer sized for one grid is never reused for a different one.
    pub fn upload_terrain(&mut self, gpu: &GpuContext, mesh: &TerrainMesh) {
        let vertices = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain_vertices"),
            size: (mesh.vertices.len() * std::mem::size_of::<TerrainVertex>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&vertices, 0, bytemuck::cast_slice(&mesh.vertices));

        let indices = gpu.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("terrain_indices"),
            size: (mesh.indices.len() * std::mem::size_of::<u32>()) as u64,
            usage: wgpu::BufferUsages::INDEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        gpu.queue
            .write_buffer(&indices, 0, bytemuck::cast_slice(&mesh.indices));

        let (t, f) = mesh.dims();
        log::debug!("Uploaded terrain buffers for {t}x{f} grid");

        self.terrain_vertices = Some(vertices);
        self.terrain_indices = Some(indices);
        self.terrain_index_count = mesh.indices.len() as u32;
    }

    pub fn upload_overlay(
        &mut self,
        gpu: &GpuContext,
        overlay: Option<&ScanOverlay>,
        crest_color: Color,
        curtain_color: Color,
    ) {
        let Some(overlay) = overlay else {
            self.overlay_visible = false;
            return;
        };

        let crest: Vec<LineVertex> = overlay
            .crest
            .iter()
            .map(|&position| LineVertex {
                position,
                color: crest_color.with_alpha(0.95),
            })
            .collect();
        gpu.queue
            .write_buffer(&self.crest_vertices, 0, bytemuck::cast_slice(&crest));

        let curtain: Vec<LineVertex> = overlay
            .curtain_positions
            .iter()
            .map(|&position| LineVertex {
                position,
                color: curtain_color.with_alpha(0.3),
            })
            .collect();
        gpu.queue
            .write_buffer(&self.curtain_vertices, 0, bytemuck::cast_slice(&curtain));
        gpu.queue.write_buffer(
            &self.curtain_indices,
            0,
            bytemuck::cast_slice(&overlay.curtain_indices),
        );

        self.curtain_index_count = overlay.curtain_indices.len() as u32;
        self.overlay_visible = true;
    }
}
