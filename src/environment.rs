use crate::renderer::Renderer;
use anyhow::Result;
use glam::{Vec2, Vec3};
use half::f16;
use image::{DynamicImage, ImageReader};
use std::f32::consts::{PI, TAU};
use std::sync::Arc;

const DIFFUSE_RESOLUTION: u32 = 16;
const SPECULAR_BASE_RESOLUTION: u32 = 32;
const SPECULAR_MIP_COUNT: u32 = 4;
const BRDF_LUT_SIZE: u32 = 64;
const DIFFUSE_SAMPLE_COUNT: usize = 32;
const SPECULAR_SAMPLE_COUNT: usize = 64;
const BRDF_SAMPLE_COUNT: usize = 64;

/// Rate limiter for the reflection capture. The refresh is the most
/// expensive per-frame candidate, so it runs on its own interval rather
/// than at frame rate.
#[derive(Debug, Clone, Copy)]
pub struct ReflectionProbe {
    pub interval: f32,
    pub center: Vec3,
    last_refresh: Option<f32>,
}

impl ReflectionProbe {
    pub fn new(interval: f32) -> Self {
        Self { interval: interval.max(0.0), center: Vec3::ZERO, last_refresh: None }
    }

    pub fn refresh_due(&self, now: f32) -> bool {
        match self.last_refresh {
            None => true,
            Some(last) => now - last >= self.interval,
        }
    }

    pub fn mark_refreshed(&mut self, now: f32, center: Vec3) {
        self.last_refresh = Some(now);
        self.center = center;
    }
}

/// Image-based lighting for the stage: a generated showroom gradient,
/// prefiltered on the CPU and uploaded as half-float cubemaps. The probe
/// re-centers the capture on the car as it moves.
pub struct Environment {
    maps: EnvironmentMaps,
    /// A backdrop loaded from disk, if the stage config named one. `None`
    /// means the generated showroom gradient, which tracks the car.
    backdrop: Option<HdrImage>,
    gpu: Option<Arc<EnvironmentGpu>>,
    pub probe: ReflectionProbe,
}

impl Environment {
    pub fn new(interval: f32, backdrop_path: Option<&str>) -> Self {
        let backdrop = backdrop_path.and_then(|path| match load_hdr_image(path) {
            Ok(image) => Some(image),
            Err(err) => {
                eprintln!("[environment] backdrop '{path}' unavailable: {err:?}. Using the generated stage.");
                None
            }
        });
        let image = match backdrop.as_ref() {
            Some(image) => image.clone(),
            None => generate_showroom_hdr(Vec3::ZERO),
        };
        Self {
            maps: EnvironmentMaps::from_hdr(&image),
            backdrop,
            gpu: None,
            probe: ReflectionProbe::new(interval),
        }
    }

    /// Recomputes the capture centered on the car. Callers are expected to
    /// gate this behind `probe.refresh_due`.
    pub fn refresh(&mut self, now: f32, center: Vec3) {
        // A file backdrop is static; only the generated stage tracks the car.
        if self.backdrop.is_none() {
            let image = generate_showroom_hdr(center);
            self.maps = EnvironmentMaps::from_hdr(&image);
            self.gpu = None;
        }
        self.probe.mark_refreshed(now, center);
    }

    pub fn ensure_gpu(&mut self, renderer: &Renderer) -> Result<Arc<EnvironmentGpu>> {
        if let Some(gpu) = self.gpu.as_ref() {
            return Ok(gpu.clone());
        }
        let gpu = Arc::new(EnvironmentGpu::new(renderer, &self.maps)?);
        self.gpu = Some(gpu.clone());
        Ok(gpu)
    }
}

struct EnvironmentMaps {
    diffuse: Cubemap,
    specular: PrefilteredCubemap,
    brdf: Lut2D,
}

struct Cubemap {
    size: u32,
    faces: [Vec<f32>; 6],
}

struct PrefilteredCubemap {
    base_size: u32,
    levels: Vec<CubemapLevel>,
}

struct CubemapLevel {
    size: u32,
    faces: [Vec<f32>; 6],
}

struct Lut2D {
    width: u32,
    height: u32,
    data: Vec<f32>,
}

#[derive(Clone)]
struct HdrImage {
    width: u32,
    height: u32,
    pixels: Vec<Vec3>,
}

pub struct EnvironmentGpu {
    _diffuse_texture: wgpu::Texture,
    diffuse_view: wgpu::TextureView,
    _specular_texture: wgpu::Texture,
    specular_view: wgpu::TextureView,
    _brdf_texture: wgpu::Texture,
    brdf_view: wgpu::TextureView,
    sampler: wgpu::Sampler,
    specular_mip_count: u32,
}

impl EnvironmentMaps {
    fn from_hdr(image: &HdrImage) -> Self {
        let diffuse = compute_diffuse_cubemap(image, DIFFUSE_RESOLUTION);
        let specular = compute_specular_cubemap(image, SPECULAR_BASE_RESOLUTION, SPECULAR_MIP_COUNT);
        let brdf = compute_brdf_lut(BRDF_LUT_SIZE);
        Self { diffuse, specular, brdf }
    }
}

fn f32_to_f16_bits(data: &[f32]) -> Vec<u16> {
    data.iter().map(|value| f16::from_f32(*value).to_bits()).collect()
}

impl EnvironmentGpu {
    fn new(renderer: &Renderer, maps: &EnvironmentMaps) -> Result<Self> {
        let device = renderer.device()?;
        let queue = renderer.queue()?;

        let make_cube = |label: &str, size: u32, mips: u32| {
            device.create_texture(&wgpu::TextureDescriptor {
                label: Some(label),
                size: wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 6 },
                mip_level_count: mips,
                sample_count: 1,
                dimension: wgpu::TextureDimension::D2,
                format: wgpu::TextureFormat::Rgba16Float,
                usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
                view_formats: &[],
            })
        };

        let diffuse_texture = make_cube("Stage Diffuse Cube", maps.diffuse.size, 1);
        for (face, data) in maps.diffuse.faces.iter().enumerate() {
            write_cube_face(queue, &diffuse_texture, 0, face as u32, maps.diffuse.size, data);
        }
        let diffuse_view = diffuse_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Stage Diffuse View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            ..Default::default()
        });

        let mip_count = maps.specular.levels.len().max(1) as u32;
        let specular_texture = make_cube("Stage Specular Cube", maps.specular.base_size, mip_count);
        for (level_idx, level) in maps.specular.levels.iter().enumerate() {
            for (face, data) in level.faces.iter().enumerate() {
                write_cube_face(queue, &specular_texture, level_idx as u32, face as u32, level.size, data);
            }
        }
        let specular_view = specular_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Stage Specular View"),
            dimension: Some(wgpu::TextureViewDimension::Cube),
            base_mip_level: 0,
            mip_level_count: Some(mip_count),
            ..Default::default()
        });

        let brdf_texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Stage BRDF LUT"),
            size: wgpu::Extent3d { width: maps.brdf.width, height: maps.brdf.height, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba16Float,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        let brdf_half = f32_to_f16_bits(&maps.brdf.data);
        queue.write_texture(
            wgpu::TexelCopyTextureInfo {
                texture: &brdf_texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            bytemuck::cast_slice(&brdf_half),
            wgpu::TexelCopyBufferLayout {
                offset: 0,
                bytes_per_row: Some(maps.brdf.width * 8),
                rows_per_image: Some(maps.brdf.height),
            },
            wgpu::Extent3d { width: maps.brdf.width, height: maps.brdf.height, depth_or_array_layers: 1 },
        );
        let brdf_view = brdf_texture.create_view(&wgpu::TextureViewDescriptor {
            label: Some("Stage BRDF View"),
            dimension: Some(wgpu::TextureViewDimension::D2),
            ..Default::default()
        });

        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Stage Environment Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        Ok(Self {
            _diffuse_texture: diffuse_texture,
            diffuse_view,
            _specular_texture: specular_texture,
            specular_view,
            _brdf_texture: brdf_texture,
            brdf_view,
            sampler,
            specular_mip_count: mip_count,
        })
    }

    pub fn diffuse_view(&self) -> &wgpu::TextureView {
        &self.diffuse_view
    }

    pub fn specular_view(&self) -> &wgpu::TextureView {
        &self.specular_view
    }

    pub fn brdf_view(&self) -> &wgpu::TextureView {
        &self.brdf_view
    }

    pub fn sampler(&self) -> &wgpu::Sampler {
        &self.sampler
    }

    pub fn specular_mip_count(&self) -> u32 {
        self.specular_mip_count
    }
}

fn write_cube_face(
    queue: &wgpu::Queue,
    texture: &wgpu::Texture,
    mip: u32,
    face: u32,
    size: u32,
    data: &[f32],
) {
    let half = f32_to_f16_bits(data);
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture,
            mip_level: mip,
            origin: wgpu::Origin3d { x: 0, y: 0, z: face },
            aspect: wgpu::TextureAspect::All,
        },
        bytemuck::cast_slice(&half),
        wgpu::TexelCopyBufferLayout { offset: 0, bytes_per_row: Some(size * 8), rows_per_image: Some(size) },
        wgpu::Extent3d { width: size, height: size, depth_or_array_layers: 1 },
    );
}

fn load_hdr_image(path: &str) -> Result<HdrImage> {
    let reader = ImageReader::open(path)?.with_guessed_format()?;
    let dyn_img = reader.decode()?;
    Ok(convert_to_hdr(&dyn_img))
}

fn convert_to_hdr(image: &DynamicImage) -> HdrImage {
    let rgb = image.to_rgb32f();
    let width = rgb.width();
    let height = rgb.height();
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for pixel in rgb.pixels() {
        let [r, g, b] = pixel.0;
        pixels.push(Vec3::new(r, g, b));
    }
    HdrImage { width, height, pixels }
}

/// Dark showroom wrap: near-black dome, a faint cool ceiling, a warm accent
/// glow that tracks the capture center so reflections slide over the car.
fn generate_showroom_hdr(center: Vec3) -> HdrImage {
    let width = 128u32;
    let height = 64u32;
    let accent_u = 0.15 + center.x * 0.01;
    let accent_v = 0.45 - center.z * 0.01;
    let mut pixels = Vec::with_capacity((width * height) as usize);
    for y in 0..height {
        let v = y as f32 / (height - 1) as f32;
        for x in 0..width {
            let u = x as f32 / (width - 1) as f32;
            let ceiling = (1.0 - v).powf(2.0);
            let floor = v.powf(3.0);
            let mut color = Vec3::new(0.015, 0.015, 0.02)
                + Vec3::new(0.04, 0.05, 0.08) * ceiling
                + Vec3::new(0.05, 0.045, 0.04) * floor;
            let accent = Vec2::new(u - accent_u, v - accent_v);
            let glow = ((1.0 - accent.length() * 4.0).max(0.0)).powf(3.0);
            color += Vec3::new(1.0, 0.42, 0.21) * glow * 2.5;
            let rim = Vec2::new(u - 0.7, v - 0.4);
            let cool = ((1.0 - rim.length() * 5.0).max(0.0)).powf(3.0);
            color += Vec3::new(0.0, 0.83, 1.0) * cool * 1.2;
            pixels.push(color);
        }
    }
    HdrImage { width, height, pixels }
}

fn compute_diffuse_cubemap(image: &HdrImage, size: u32) -> Cubemap {
    let mut faces: [Vec<f32>; 6] = std::array::from_fn(|_| vec![0.0; (size * size * 4) as usize]);
    for (face, data) in faces.iter_mut().enumerate() {
        for y in 0..size {
            for x in 0..size {
                let dir = cubemap_direction(face, x, y, size);
                let mut result = Vec3::ZERO;
                let mut weight_sum = 0.0f32;
                for sample in 0..DIFFUSE_SAMPLE_COUNT {
                    let xi = hammersley(sample as u32, DIFFUSE_SAMPLE_COUNT as u32);
                    let sample_dir = cosine_sample_hemisphere(dir, xi);
                    let n_dot_l = dir.dot(sample_dir).max(0.0);
                    if n_dot_l > 0.0 {
                        result += sample_equirect(image, sample_dir) * n_dot_l;
                        weight_sum += n_dot_l;
                    }
                }
                if weight_sum > 0.0 {
                    result /= weight_sum;
                }
                let idx = ((y * size + x) * 4) as usize;
                data[idx] = result.x;
                data[idx + 1] = result.y;
                data[idx + 2] = result.z;
                data[idx + 3] = 1.0;
            }
        }
    }
    Cubemap { size, faces }
}

fn compute_specular_cubemap(image: &HdrImage, base_size: u32, mip_count: u32) -> PrefilteredCubemap {
    let mut levels = Vec::new();
    let max_level = mip_count.max(1);
    for mip in 0..max_level {
        let size = (base_size >> mip).max(1);
        let roughness = mip as f32 / (max_level as f32 - 1.0).max(1.0);
        let mut faces: [Vec<f32>; 6] = std::array::from_fn(|_| vec![0.0; (size * size * 4) as usize]);
        for (face, data) in faces.iter_mut().enumerate() {
            for y in 0..size {
                for x in 0..size {
                    let r = cubemap_direction(face, x, y, size);
                    let mut color = Vec3::ZERO;
                    let mut weight_sum = 0.0f32;
                    for sample in 0..SPECULAR_SAMPLE_COUNT {
                        let xi = hammersley(sample as u32, SPECULAR_SAMPLE_COUNT as u32);
                        let h = importance_sample_ggx(r, xi, roughness);
                        let l = reflect(-r, h).normalize();
                        let n_dot_l = r.dot(l).max(0.0);
                        if n_dot_l > 0.0 {
                            color += sample_equirect(image, l) * n_dot_l;
                            weight_sum += n_dot_l;
                        }
                    }
                    if weight_sum > 0.0 {
                        color /= weight_sum;
                    }
                    let idx = ((y * size + x) * 4) as usize;
                    data[idx] = color.x;
                    data[idx + 1] = color.y;
                    data[idx + 2] = color.z;
                    data[idx + 3] = 1.0;
                }
            }
        }
        levels.push(CubemapLevel { size, faces });
    }
    PrefilteredCubemap { base_size, levels }
}

fn compute_brdf_lut(size: u32) -> Lut2D {
    let mut data = vec![0.0f32; (size * size * 4) as usize];
    for y in 0..size {
        let roughness = (y as f32 + 0.5) / size as f32;
        for x in 0..size {
            let n_dot_v = (x as f32 + 0.5) / size as f32;
            let (a, b) = integrate_brdf(n_dot_v, roughness);
            let idx = ((y * size + x) * 4) as usize;
            data[idx] = a;
            data[idx + 1] = b;
            data[idx + 2] = 0.0;
            data[idx + 3] = 1.0;
        }
    }
    Lut2D { width: size, height: size, data }
}

fn sample_equirect(image: &HdrImage, dir: Vec3) -> Vec3 {
    let d = dir.normalize();
    let theta = d.y.clamp(-1.0, 1.0).acos();
    let phi = d.z.atan2(d.x);
    let u = (phi + PI) / TAU;
    let v = theta / PI;
    let x = u * (image.width as f32 - 1.0);
    let y = v * (image.height as f32 - 1.0);
    let x0 = x.floor();
    let y0 = y.floor();
    let tx = x - x0;
    let ty = y - y0;

    let ix0 = x0.rem_euclid(image.width as f32) as u32;
    let ix1 = (x0 + 1.0).rem_euclid(image.width as f32) as u32;
    let iy0 = y0.clamp(0.0, (image.height - 1) as f32) as u32;
    let iy1 = (y0 + 1.0).clamp(0.0, (image.height - 1) as f32) as u32;

    let c00 = image.pixel(ix0, iy0);
    let c10 = image.pixel(ix1, iy0);
    let c01 = image.pixel(ix0, iy1);
    let c11 = image.pixel(ix1, iy1);

    let c0 = c00 * (1.0 - tx) + c10 * tx;
    let c1 = c01 * (1.0 - tx) + c11 * tx;
    c0 * (1.0 - ty) + c1 * ty
}

fn cubemap_direction(face: usize, x: u32, y: u32, size: u32) -> Vec3 {
    let a = (2.0 * (x as f32 + 0.5) / size as f32) - 1.0;
    let b = (2.0 * (y as f32 + 0.5) / size as f32) - 1.0;
    match face {
        0 => Vec3::new(1.0, -b, -a),
        1 => Vec3::new(-1.0, -b, a),
        2 => Vec3::new(a, 1.0, b),
        3 => Vec3::new(a, -1.0, -b),
        4 => Vec3::new(a, -b, 1.0),
        _ => Vec3::new(-a, -b, -1.0),
    }
    .normalize()
}

fn cosine_sample_hemisphere(normal: Vec3, xi: Vec2) -> Vec3 {
    let r = xi.x.sqrt();
    let theta = TAU * xi.y;
    let x = r * theta.cos();
    let y = r * theta.sin();
    let z = (1.0 - xi.x).sqrt();
    tangent_to_world(normal, Vec3::new(x, y, z))
}

fn importance_sample_ggx(normal: Vec3, xi: Vec2, roughness: f32) -> Vec3 {
    let a = roughness.max(0.001);
    let phi = TAU * xi.x;
    let cos_theta = ((1.0 - xi.y) / (1.0 + (a * a - 1.0) * xi.y)).sqrt();
    let sin_theta = (1.0 - cos_theta * cos_theta).max(0.0).sqrt();
    let h = Vec3::new(phi.cos() * sin_theta, phi.sin() * sin_theta, cos_theta);
    tangent_to_world(normal, h)
}

fn tangent_to_world(normal: Vec3, vec: Vec3) -> Vec3 {
    let up = if normal.z.abs() < 0.999 { Vec3::Z } else { Vec3::X };
    let tangent = normal.cross(up).normalize();
    let bitangent = normal.cross(tangent);
    tangent * vec.x + bitangent * vec.y + normal * vec.z
}

fn reflect(v: Vec3, n: Vec3) -> Vec3 {
    v - 2.0 * v.dot(n) * n
}

fn hammersley(i: u32, n: u32) -> Vec2 {
    Vec2::new(i as f32 / n as f32, radical_inverse_vdc(i))
}

fn radical_inverse_vdc(bits: u32) -> f32 {
    let mut b = bits;
    b = (b << 16) | (b >> 16);
    b = ((b & 0x5555_5555) << 1) | ((b & 0xAAAA_AAAA) >> 1);
    b = ((b & 0x3333_3333) << 2) | ((b & 0xCCCC_CCCC) >> 2);
    b = ((b & 0x0F0F_0F0F) << 4) | ((b & 0xF0F0_F0F0) >> 4);
    b = ((b & 0x00FF_00FF) << 8) | ((b & 0xFF00_FF00) >> 8);
    (b as f32) * 2.328_306_4e-10
}

fn integrate_brdf(n_dot_v: f32, roughness: f32) -> (f32, f32) {
    let normal = Vec3::new(0.0, 0.0, 1.0);
    let v = Vec3::new((1.0 - n_dot_v * n_dot_v).sqrt(), 0.0, n_dot_v);
    let mut a = 0.0f32;
    let mut b = 0.0f32;
    for i in 0..BRDF_SAMPLE_COUNT {
        let xi = hammersley(i as u32, BRDF_SAMPLE_COUNT as u32);
        let h = importance_sample_ggx(normal, xi, roughness);
        let l = reflect(-v, h);
        let n_dot_l = l.z.max(0.0);
        let n_dot_h = h.z.max(0.0);
        let v_dot_h = v.dot(h).max(0.0);
        if n_dot_l > 0.0 {
            let g = geometry_smith(normal, v, l, roughness);
            let g_vis = (g * v_dot_h) / (n_dot_h * n_dot_v).max(1e-4);
            let fc = (1.0 - v_dot_h).powi(5);
            a += (1.0 - fc) * g_vis;
            b += fc * g_vis;
        }
    }
    let scale = 1.0 / BRDF_SAMPLE_COUNT as f32;
    (a * scale, b * scale)
}

fn geometry_smith(normal: Vec3, v: Vec3, l: Vec3, roughness: f32) -> f32 {
    let n_dot_v = normal.dot(v).max(0.0);
    let n_dot_l = normal.dot(l).max(0.0);
    geometry_schlick_ggx(n_dot_v, roughness) * geometry_schlick_ggx(n_dot_l, roughness)
}

fn geometry_schlick_ggx(n_dot_v: f32, roughness: f32) -> f32 {
    let r = roughness + 1.0;
    let k = (r * r) * 0.125;
    n_dot_v / (n_dot_v * (1.0 - k) + k)
}

impl HdrImage {
    fn pixel(&self, x: u32, y: u32) -> Vec3 {
        let idx = (y * self.width + x) as usize;
        self.pixels[idx]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probe_is_due_immediately_then_throttled() {
        let mut probe = ReflectionProbe::new(0.5);
        assert!(probe.refresh_due(10.0));
        probe.mark_refreshed(10.0, Vec3::ZERO);
        assert!(!probe.refresh_due(10.2));
        assert!(!probe.refresh_due(10.49));
        assert!(probe.refresh_due(10.5));
    }

    #[test]
    fn probe_interval_is_independent_of_call_rate() {
        let mut probe = ReflectionProbe::new(1.0);
        probe.mark_refreshed(0.0, Vec3::ZERO);
        let mut refreshes = 0;
        for frame in 1..=600 {
            let now = frame as f32 / 60.0;
            if probe.refresh_due(now) {
                probe.mark_refreshed(now, Vec3::ZERO);
                refreshes += 1;
            }
        }
        assert!(refreshes <= 10, "600 frames over 10s must refresh at most 10 times, got {refreshes}");
    }

    #[test]
    fn capture_center_shifts_the_accent_glow() {
        let at_origin = generate_showroom_hdr(Vec3::ZERO);
        let at_car = generate_showroom_hdr(Vec3::new(6.0, 0.0, -6.0));
        assert_eq!(at_origin.pixels.len(), at_car.pixels.len());
        let differing =
            at_origin.pixels.iter().zip(&at_car.pixels).filter(|(a, b)| (**a - **b).length() > 1e-4).count();
        assert!(differing > 0, "recentering must change the capture");
    }

    #[test]
    fn missing_backdrop_falls_back_to_the_generated_stage() {
        let environment = Environment::new(0.5, Some("does/not/exist.hdr"));
        assert!(environment.backdrop.is_none());
        assert_eq!(environment.maps.diffuse.size, DIFFUSE_RESOLUTION);
    }

    #[test]
    fn backdrop_conversion_keeps_dimensions() {
        let dyn_img = DynamicImage::new_rgb8(8, 4);
        let hdr = convert_to_hdr(&dyn_img);
        assert_eq!(hdr.width, 8);
        assert_eq!(hdr.height, 4);
        assert_eq!(hdr.pixels.len(), 32);
    }

    #[test]
    fn prefiltered_maps_have_the_configured_shape() {
        let image = generate_showroom_hdr(Vec3::ZERO);
        let maps = EnvironmentMaps::from_hdr(&image);
        assert_eq!(maps.diffuse.size, DIFFUSE_RESOLUTION);
        assert_eq!(maps.specular.levels.len(), SPECULAR_MIP_COUNT as usize);
        assert_eq!(maps.specular.levels[0].size, SPECULAR_BASE_RESOLUTION);
        assert_eq!(maps.brdf.width, BRDF_LUT_SIZE);
        for level in &maps.specular.levels {
            for face in &level.faces {
                assert!(face.iter().all(|v| v.is_finite()));
            }
        }
    }
}
