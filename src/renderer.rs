mod mesh_pass;
mod particle_pass;
mod shadow_pass;

use crate::camera3d::Camera3D;
use crate::config::WindowConfig;
use crate::environment::EnvironmentGpu;
use crate::material_registry::MaterialGpu;
use crate::mesh::Mesh;
use crate::scene::LightsSnapshot;
use anyhow::{anyhow, Context, Result};
use glam::{Mat4, Vec3};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::event_loop::ActiveEventLoop;
use winit::window::Window;

pub use mesh_pass::MeshPass;
pub use particle_pass::{ParticleInstance, ParticlePass, ParticleUniforms};
pub use shadow_pass::{ShadowPass, SHADOW_MAP_RESOLUTION};

pub const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

pub struct MeshGpu {
    pub vertex_buffer: wgpu::Buffer,
    pub index_buffer: wgpu::Buffer,
    pub index_count: u32,
}

#[derive(Clone)]
pub struct MeshDraw {
    pub mesh: Arc<MeshGpu>,
    pub material: Arc<MaterialGpu>,
    pub model: Mat4,
}

/// Everything one frame needs from the scene, already extracted.
pub struct FrameDraws<'a> {
    pub camera: &'a Camera3D,
    pub lights: &'a LightsSnapshot,
    pub environment: &'a EnvironmentGpu,
    pub draws: Vec<MeshDraw>,
    pub particles: Option<(&'a [ParticleInstance], ParticleUniforms)>,
    pub fog_color: Vec3,
    pub fog_near: f32,
    pub fog_far: f32,
}

pub struct Renderer {
    surface: Option<wgpu::Surface<'static>>,
    device: Option<wgpu::Device>,
    queue: Option<wgpu::Queue>,
    config: Option<wgpu::SurfaceConfiguration>,
    size: PhysicalSize<u32>,
    window: Option<Arc<Window>>,
    vsync: bool,
    title: String,
    fullscreen: bool,

    depth_view: Option<wgpu::TextureView>,
    mesh_pass: Option<MeshPass>,
    shadow_pass: Option<ShadowPass>,
    particle_pass: Option<ParticlePass>,
    meshes: HashMap<String, Arc<MeshGpu>>,
    clear_color: wgpu::Color,
}

impl Renderer {
    pub fn new(window: &WindowConfig) -> Self {
        Self {
            surface: None,
            device: None,
            queue: None,
            config: None,
            size: PhysicalSize::new(window.width.max(1), window.height.max(1)),
            window: None,
            vsync: window.vsync,
            title: window.title.clone(),
            fullscreen: window.fullscreen,
            depth_view: None,
            mesh_pass: None,
            shadow_pass: None,
            particle_pass: None,
            meshes: HashMap::new(),
            clear_color: wgpu::Color { r: 0.039, g: 0.039, b: 0.039, a: 1.0 },
        }
    }

    pub fn set_clear_color(&mut self, color: Vec3) {
        self.clear_color =
            wgpu::Color { r: color.x as f64, g: color.y as f64, b: color.z as f64, a: 1.0 };
    }

    pub fn ensure_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        if self.window.is_some() {
            return Ok(());
        }
        let mut attributes =
            Window::default_attributes().with_title(self.title.clone()).with_inner_size(self.size);
        if self.fullscreen {
            attributes = attributes.with_fullscreen(Some(winit::window::Fullscreen::Borderless(None)));
        }
        let window =
            Arc::new(event_loop.create_window(attributes).context("Failed to create window")?);
        pollster::block_on(self.init_wgpu(&window))?;
        self.window = Some(window);
        self.recreate_depth()?;
        self.init_pipelines()?;
        Ok(())
    }

    async fn init_wgpu(&mut self, window: &Arc<Window>) -> Result<()> {
        let instance = wgpu::Instance::default();
        let surface =
            instance.create_surface(window.clone()).context("Failed to create wgpu surface")?;
        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .context("No suitable GPU adapter")?;
        let required_limits = wgpu::Limits::downlevel_webgl2_defaults().using_resolution(adapter.limits());
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                experimental_features: wgpu::ExperimentalFeatures::default(),
                memory_hints: wgpu::MemoryHints::default(),
                trace: wgpu::Trace::default(),
            })
            .await
            .context("Failed to acquire GPU device")?;

        let caps = surface.get_capabilities(&adapter);
        let format = caps.formats.iter().copied().find(|f| f.is_srgb()).unwrap_or(caps.formats[0]);
        let size = window.inner_size();
        let present_mode =
            if self.vsync { wgpu::PresentMode::Fifo } else { wgpu::PresentMode::AutoNoVsync };
        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: caps.alpha_modes[0],
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        self.size = size;
        self.surface = Some(surface);
        self.device = Some(device);
        self.queue = Some(queue);
        self.config = Some(config);
        Ok(())
    }

    fn init_pipelines(&mut self) -> Result<()> {
        let device = self.device.as_ref().ok_or_else(|| anyhow!("Renderer has no device"))?;
        let format = self.config.as_ref().ok_or_else(|| anyhow!("Renderer has no surface"))?.format;
        let mut shadow_pass = ShadowPass::new(device);
        let mesh_pass = MeshPass::new(device, format, shadow_pass.map_view());
        shadow_pass.init_pipeline(device, mesh_pass.model_layout_ref());
        let particle_pass = ParticlePass::new(device, format);
        self.shadow_pass = Some(shadow_pass);
        self.mesh_pass = Some(mesh_pass);
        self.particle_pass = Some(particle_pass);
        Ok(())
    }

    fn recreate_depth(&mut self) -> Result<()> {
        let device = self.device.as_ref().ok_or_else(|| anyhow!("Renderer has no device"))?;
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth"),
            size: wgpu::Extent3d {
                width: self.size.width.max(1),
                height: self.size.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.depth_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        Ok(())
    }

    pub fn device(&self) -> Result<&wgpu::Device> {
        self.device.as_ref().ok_or_else(|| anyhow!("Renderer has no device"))
    }

    pub fn queue(&self) -> Result<&wgpu::Queue> {
        self.queue.as_ref().ok_or_else(|| anyhow!("Renderer has no queue"))
    }

    pub fn surface_format(&self) -> Result<wgpu::TextureFormat> {
        self.config.as_ref().map(|c| c.format).ok_or_else(|| anyhow!("Renderer has no surface"))
    }

    pub fn size(&self) -> PhysicalSize<u32> {
        self.size
    }

    pub fn window(&self) -> Option<&Window> {
        self.window.as_deref()
    }

    pub fn pixels_per_point(&self) -> f32 {
        self.window.as_ref().map(|w| w.scale_factor() as f32).unwrap_or(1.0)
    }

    pub fn material_bind_layout(&self) -> Result<Arc<wgpu::BindGroupLayout>> {
        self.mesh_pass
            .as_ref()
            .map(|pass| pass.material_layout())
            .ok_or_else(|| anyhow!("Mesh pipeline not initialized"))
    }

    pub fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.size = new_size;
        if new_size.width == 0 || new_size.height == 0 {
            return;
        }
        if let (Some(surface), Some(device), Some(config)) =
            (&self.surface, &self.device, &mut self.config)
        {
            config.width = new_size.width;
            config.height = new_size.height;
            surface.configure(device, config);
        }
        if let Err(err) = self.recreate_depth() {
            eprintln!("[renderer] depth recreate failed: {err:?}");
        }
    }

    /// Uploads the mesh on first sight; later calls are cache hits.
    pub fn ensure_mesh(&mut self, key: &str, mesh: &Mesh) -> Result<Arc<MeshGpu>> {
        if let Some(existing) = self.meshes.get(key) {
            return Ok(existing.clone());
        }
        let device = self.device()?;
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(key),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(key),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });
        let gpu = Arc::new(MeshGpu {
            vertex_buffer,
            index_buffer,
            index_count: mesh.indices.len() as u32,
        });
        self.meshes.insert(key.to_string(), gpu.clone());
        Ok(gpu)
    }

    pub fn mesh(&self, key: &str) -> Option<Arc<MeshGpu>> {
        self.meshes.get(key).cloned()
    }

    /// Renders one frame: shadow pass, opaque meshes, transparent meshes
    /// back-to-front, then the particle field.
    pub fn render_frame(&mut self, frame: FrameDraws) -> Result<FramePresent> {
        let FrameDraws {
            camera,
            lights,
            environment,
            mut draws,
            particles,
            fog_color,
            fog_near,
            fog_far,
        } = frame;
        let surface = self.surface.as_ref().ok_or_else(|| anyhow!("Renderer has no surface"))?;
        let device = self.device.as_ref().ok_or_else(|| anyhow!("Renderer has no device"))?;
        let queue = self.queue.as_ref().ok_or_else(|| anyhow!("Renderer has no queue"))?;
        let depth_view =
            self.depth_view.as_ref().ok_or_else(|| anyhow!("Renderer has no depth target"))?;
        let mesh_pass = self.mesh_pass.as_mut().ok_or_else(|| anyhow!("Mesh pipeline missing"))?;
        let shadow_pass =
            self.shadow_pass.as_mut().ok_or_else(|| anyhow!("Shadow pipeline missing"))?;
        let particle_pass =
            self.particle_pass.as_mut().ok_or_else(|| anyhow!("Particle pipeline missing"))?;

        // Opaque first, then transparent back-to-front.
        let camera_pos = camera.position;
        draws.sort_by(|a, b| match (a.material.transparent, b.material.transparent) {
            (false, true) => std::cmp::Ordering::Less,
            (true, false) => std::cmp::Ordering::Greater,
            (false, false) => std::cmp::Ordering::Equal,
            (true, true) => {
                let da = a.model.w_axis.truncate().distance_squared(camera_pos);
                let db = b.model.w_axis.truncate().distance_squared(camera_pos);
                db.total_cmp(&da)
            }
        });

        let light_view_proj = shadow_pass.light_matrix(lights.key_direction);
        mesh_pass.write_globals(
            queue,
            camera,
            lights,
            light_view_proj,
            fog_color,
            fog_near,
            fog_far,
            environment.specular_mip_count(),
            self.size,
        );
        mesh_pass.prepare_models(device, queue, &draws);
        shadow_pass.prepare(queue, light_view_proj);

        let surface_texture =
            surface.get_current_texture().context("Failed to acquire surface frame")?;
        let view = surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Frame") });

        shadow_pass.encode(&mut encoder, mesh_pass, &draws);
        mesh_pass.encode(device, &mut encoder, &view, depth_view, self.clear_color, environment, &draws);
        if let Some((instances, uniforms)) = particles {
            particle_pass.encode(device, queue, &mut encoder, &view, depth_view, instances, uniforms);
        }

        queue.submit(std::iter::once(encoder.finish()));
        Ok(FramePresent { surface_texture })
    }
}

/// Holds the acquired frame so the overlay can draw on top before present.
pub struct FramePresent {
    surface_texture: wgpu::SurfaceTexture,
}

impl FramePresent {
    pub fn view(&self) -> wgpu::TextureView {
        self.surface_texture.texture.create_view(&wgpu::TextureViewDescriptor::default())
    }

    pub fn present(self) {
        self.surface_texture.present();
    }
}
