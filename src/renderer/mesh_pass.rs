use crate::camera3d::Camera3D;
use crate::environment::EnvironmentGpu;
use crate::mesh::MeshVertex;
use crate::scene::LightsSnapshot;
use glam::{Mat3, Mat4, Vec3};
use std::sync::Arc;
use winit::dpi::PhysicalSize;

use super::{MeshDraw, DEPTH_FORMAT};

const MODEL_UNIFORM_STRIDE: u64 = 256;

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct GlobalsUniform {
    view_proj: [[f32; 4]; 4],
    light_view_proj: [[f32; 4]; 4],
    camera_pos: [f32; 4],
    ambient: [f32; 4],
    key_dir: [f32; 4],
    key_color: [f32; 4],
    fog_color_near: [f32; 4],
    fog_far_mips: [f32; 4],
    point0_pos_range: [f32; 4],
    point0_color_intensity: [f32; 4],
    point1_pos_range: [f32; 4],
    point1_color_intensity: [f32; 4],
    spot_pos_angle: [f32; 4],
    spot_dir_penumbra: [f32; 4],
    spot_color_intensity: [f32; 4],
}

#[repr(C)]
#[derive(Clone, Copy, bytemuck::Pod, bytemuck::Zeroable)]
struct ModelUniform {
    model: [[f32; 4]; 4],
    normal0: [f32; 4],
    normal1: [f32; 4],
    normal2: [f32; 4],
}

pub struct MeshPass {
    opaque_pipeline: wgpu::RenderPipeline,
    transparent_pipeline: wgpu::RenderPipeline,
    globals_buffer: wgpu::Buffer,
    globals_bind_group: wgpu::BindGroup,
    environment_layout: wgpu::BindGroupLayout,
    environment_bind: Option<(usize, wgpu::BindGroup)>,
    material_layout: Arc<wgpu::BindGroupLayout>,
    model_layout: wgpu::BindGroupLayout,
    model_buffer: wgpu::Buffer,
    model_bind_group: wgpu::BindGroup,
    model_capacity: usize,
}

impl MeshPass {
    pub fn new(device: &wgpu::Device, surface_format: wgpu::TextureFormat, shadow_view: &wgpu::TextureView) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("Mesh Shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("../../assets/shaders/mesh_pbr.wgsl").into()),
        });

        let globals_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Globals BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Depth,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Comparison),
                    count: None,
                },
            ],
        });

        let environment_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Environment BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 3,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let material_layout = Arc::new(device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Material BGL"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        multisampled: false,
                        view_dimension: wgpu::TextureViewDimension::D2,
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
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
        }));

        let model_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Model BGL"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: true,
                    min_binding_size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
                },
                count: None,
            }],
        });

        let globals_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Globals Buffer"),
            size: std::mem::size_of::<GlobalsUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let shadow_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Shadow Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            compare: Some(wgpu::CompareFunction::LessEqual),
            ..Default::default()
        });
        let globals_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Globals BG"),
            layout: &globals_layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: globals_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(shadow_view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&shadow_sampler) },
            ],
        });

        let (model_buffer, model_bind_group, model_capacity) =
            Self::create_model_buffer(device, &model_layout, 64);

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("Mesh Pipeline Layout"),
            bind_group_layouts: &[&globals_layout, &environment_layout, &material_layout, &model_layout],
            push_constant_ranges: &[],
        });

        let make_pipeline = |label: &str, blend: Option<wgpu::BlendState>, depth_write: bool| {
            device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(label),
                layout: Some(&pipeline_layout),
                vertex: wgpu::VertexState {
                    module: &shader,
                    entry_point: Some("vs_main"),
                    buffers: &[MeshVertex::layout()],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &shader,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: surface_format,
                        blend,
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    cull_mode: Some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: Some(wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: depth_write,
                    depth_compare: wgpu::CompareFunction::Less,
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState::default(),
                multiview: None,
                cache: None,
            })
        };

        let opaque_pipeline = make_pipeline("Mesh Opaque", None, true);
        let transparent_pipeline =
            make_pipeline("Mesh Transparent", Some(wgpu::BlendState::ALPHA_BLENDING), false);

        Self {
            opaque_pipeline,
            transparent_pipeline,
            globals_buffer,
            globals_bind_group,
            environment_layout,
            environment_bind: None,
            material_layout,
            model_layout,
            model_buffer,
            model_bind_group,
            model_capacity,
        }
    }

    fn create_model_buffer(
        device: &wgpu::Device,
        layout: &wgpu::BindGroupLayout,
        capacity: usize,
    ) -> (wgpu::Buffer, wgpu::BindGroup, usize) {
        let buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Model Buffer"),
            size: capacity as u64 * MODEL_UNIFORM_STRIDE,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Model BG"),
            layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                    buffer: &buffer,
                    offset: 0,
                    size: wgpu::BufferSize::new(std::mem::size_of::<ModelUniform>() as u64),
                }),
            }],
        });
        (buffer, bind_group, capacity)
    }

    pub fn material_layout(&self) -> Arc<wgpu::BindGroupLayout> {
        self.material_layout.clone()
    }

    pub(super) fn model_layout_ref(&self) -> &wgpu::BindGroupLayout {
        &self.model_layout
    }

    pub(super) fn model_bind_group(&self) -> &wgpu::BindGroup {
        &self.model_bind_group
    }

    pub(super) fn model_offset(index: usize) -> u32 {
        (index as u64 * MODEL_UNIFORM_STRIDE) as u32
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn write_globals(
        &mut self,
        queue: &wgpu::Queue,
        camera: &Camera3D,
        lights: &LightsSnapshot,
        light_view_proj: Mat4,
        fog_color: Vec3,
        fog_near: f32,
        fog_far: f32,
        env_mip_count: u32,
        viewport: PhysicalSize<u32>,
    ) {
        let spot = lights.spot.unwrap_or_default();
        let uniform = GlobalsUniform {
            view_proj: camera.view_projection(viewport).to_cols_array_2d(),
            light_view_proj: light_view_proj.to_cols_array_2d(),
            camera_pos: camera.position.extend(1.0).to_array(),
            ambient: lights.ambient.extend(0.0).to_array(),
            key_dir: lights.key_direction.extend(0.0).to_array(),
            key_color: lights.key_color.extend(0.0).to_array(),
            fog_color_near: fog_color.extend(fog_near).to_array(),
            fog_far_mips: [fog_far, env_mip_count as f32, 0.0, 0.0],
            point0_pos_range: lights.points[0].position.extend(lights.points[0].range).to_array(),
            point0_color_intensity: lights.points[0]
                .color
                .extend(if lights.point_count > 0 { lights.points[0].intensity } else { 0.0 })
                .to_array(),
            point1_pos_range: lights.points[1].position.extend(lights.points[1].range).to_array(),
            point1_color_intensity: lights.points[1]
                .color
                .extend(if lights.point_count > 1 { lights.points[1].intensity } else { 0.0 })
                .to_array(),
            spot_pos_angle: spot.position.extend(spot.angle.cos()).to_array(),
            spot_dir_penumbra: spot.direction.extend(spot.penumbra).to_array(),
            spot_color_intensity: spot
                .color
                .extend(if lights.spot.is_some() { spot.intensity } else { 0.0 })
                .to_array(),
        };
        queue.write_buffer(&self.globals_buffer, 0, bytemuck::bytes_of(&uniform));
    }

    pub(super) fn prepare_models(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        draws: &[MeshDraw],
    ) {
        if draws.is_empty() {
            return;
        }
        if draws.len() > self.model_capacity {
            let mut capacity = self.model_capacity.max(64);
            while capacity < draws.len() {
                capacity *= 2;
            }
            let (buffer, bind_group, cap) = Self::create_model_buffer(device, &self.model_layout, capacity);
            self.model_buffer = buffer;
            self.model_bind_group = bind_group;
            self.model_capacity = cap;
        }
        let mut staging = vec![0u8; draws.len() * MODEL_UNIFORM_STRIDE as usize];
        for (index, draw) in draws.iter().enumerate() {
            let normal = Mat3::from_mat4(draw.model).inverse().transpose();
            let uniform = ModelUniform {
                model: draw.model.to_cols_array_2d(),
                normal0: normal.x_axis.extend(0.0).to_array(),
                normal1: normal.y_axis.extend(0.0).to_array(),
                normal2: normal.z_axis.extend(0.0).to_array(),
            };
            let offset = index * MODEL_UNIFORM_STRIDE as usize;
            staging[offset..offset + std::mem::size_of::<ModelUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
        }
        queue.write_buffer(&self.model_buffer, 0, &staging);
    }

    fn ensure_environment_bind(&mut self, device: &wgpu::Device, environment: &EnvironmentGpu) {
        let id = environment as *const EnvironmentGpu as usize;
        if matches!(self.environment_bind.as_ref(), Some((cached, _)) if *cached == id) {
            return;
        }
        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Environment BG"),
            layout: &self.environment_layout,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(environment.diffuse_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(environment.specular_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(environment.brdf_view()),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::Sampler(environment.sampler()),
                },
            ],
        });
        self.environment_bind = Some((id, bind_group));
    }

    #[allow(clippy::too_many_arguments)]
    pub(super) fn encode(
        &mut self,
        device: &wgpu::Device,
        encoder: &mut wgpu::CommandEncoder,
        target: &wgpu::TextureView,
        depth: &wgpu::TextureView,
        clear_color: wgpu::Color,
        environment: &EnvironmentGpu,
        draws: &[MeshDraw],
    ) {
        self.ensure_environment_bind(device, environment);
        let Some((_, environment_bind)) = self.environment_bind.as_ref() else {
            return;
        };
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Mesh Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                depth_slice: None,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(clear_color),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            occlusion_query_set: None,
            timestamp_writes: None,
        });
        pass.set_bind_group(0, &self.globals_bind_group, &[]);
        pass.set_bind_group(1, environment_bind, &[]);
        let mut transparent_active = false;
        pass.set_pipeline(&self.opaque_pipeline);
        for (index, draw) in draws.iter().enumerate() {
            if draw.material.transparent && !transparent_active {
                pass.set_pipeline(&self.transparent_pipeline);
                transparent_active = true;
            }
            pass.set_bind_group(2, draw.material.bind_group.as_ref(), &[]);
            pass.set_bind_group(3, &self.model_bind_group, &[Self::model_offset(index)]);
            pass.set_vertex_buffer(0, draw.mesh.vertex_buffer.slice(..));
            pass.set_index_buffer(draw.mesh.index_buffer.slice(..), wgpu::IndexFormat::Uint32);
            pass.draw_indexed(0..draw.mesh.index_count, 0, 0..1);
        }
    }
}
