use crate::mesh::{ImportedMaterial, MaterialTextureBinding, VehicleImport};
use crate::renderer::Renderer;
use anyhow::{anyhow, Result};
use bytemuck::{Pod, Zeroable};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;

pub const DEFAULT_MATERIAL_KEY: &str = "material::default";

#[repr(C)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct MaterialUniform {
    base_color_factor: [f32; 4],
    emissive_factor: [f32; 4],
    params: [f32; 4], // metallic, roughness, alpha, has_base_color_texture
}

#[derive(Clone, Debug)]
pub struct MaterialDefinition {
    pub key: String,
    pub label: String,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub transparent: bool,
    pub base_color_texture: Option<MaterialTextureBinding>,
}

impl MaterialDefinition {
    pub fn default_definition() -> Self {
        Self {
            key: DEFAULT_MATERIAL_KEY.to_string(),
            label: "Default".to_string(),
            base_color_factor: [1.0, 1.0, 1.0, 1.0],
            metallic_factor: 0.0,
            roughness_factor: 1.0,
            emissive_factor: [0.0, 0.0, 0.0],
            transparent: false,
            base_color_texture: None,
        }
    }
}

/// Styling class for a vehicle part, chosen by substring match on the part
/// name. Case-insensitive; first match in declaration order wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartStyle {
    Body,
    Wheel,
    Glass,
    Trim,
}

pub fn style_for_part(name: &str) -> PartStyle {
    let lower = name.to_ascii_lowercase();
    if ["body", "chassis"].iter().any(|tag| lower.contains(tag)) {
        PartStyle::Body
    } else if ["wheel", "rim", "tire"].iter().any(|tag| lower.contains(tag)) {
        PartStyle::Wheel
    } else if ["glass", "window", "windshield"].iter().any(|tag| lower.contains(tag)) {
        PartStyle::Glass
    } else {
        PartStyle::Trim
    }
}

/// Applies the showroom styling rule to a loaded vehicle: every material is
/// normalized to the single PBR lighting model and the named-part overrides
/// (copper body, dark metallic wheels, transparent glass) are swapped in.
pub fn apply_showroom_styling(import: &mut VehicleImport) {
    let originals: HashMap<String, ImportedMaterial> =
        import.materials.iter().map(|mat| (mat.key.clone(), mat.clone())).collect();
    let mut styled: Vec<MaterialDefinition> = Vec::new();
    let mut styled_keys: HashMap<String, usize> = HashMap::new();

    for part in &mut import.parts {
        let style = style_for_part(&part.name);
        let source = part.material.as_ref().and_then(|key| originals.get(key));
        let key = match (style, part.material.as_ref()) {
            (PartStyle::Trim, Some(key)) => key.clone(),
            (PartStyle::Trim, None) => format!("styled::{}", part.name),
            _ => format!("styled::{}", part.name),
        };
        if let Some(&existing) = styled_keys.get(&key) {
            part.material = Some(styled[existing].key.clone());
            continue;
        }
        let definition = styled_definition(&key, &part.name, style, source);
        styled_keys.insert(key, styled.len());
        part.material = Some(definition.key.clone());
        styled.push(definition);
    }

    import.materials.clear();
    import.materials.extend(styled.iter().map(|def| ImportedMaterial {
        key: def.key.clone(),
        label: def.label.clone(),
        base_color_factor: def.base_color_factor,
        metallic_factor: def.metallic_factor,
        roughness_factor: def.roughness_factor,
        emissive_factor: def.emissive_factor,
        base_color_texture: def.base_color_texture.clone(),
    }));
}

pub fn styled_definition(
    key: &str,
    part_name: &str,
    style: PartStyle,
    source: Option<&ImportedMaterial>,
) -> MaterialDefinition {
    match style {
        PartStyle::Body => MaterialDefinition {
            key: key.to_string(),
            label: format!("{part_name} (body)"),
            base_color_factor: [0.72, 0.32, 0.12, 1.0],
            metallic_factor: 0.9,
            roughness_factor: 0.25,
            emissive_factor: [0.25, 0.08, 0.02],
            transparent: false,
            base_color_texture: None,
        },
        PartStyle::Wheel => MaterialDefinition {
            key: key.to_string(),
            label: format!("{part_name} (wheel)"),
            base_color_factor: [0.06, 0.06, 0.07, 1.0],
            metallic_factor: 1.0,
            roughness_factor: 0.45,
            emissive_factor: [0.0, 0.0, 0.0],
            transparent: false,
            base_color_texture: None,
        },
        PartStyle::Glass => MaterialDefinition {
            key: key.to_string(),
            label: format!("{part_name} (glass)"),
            base_color_factor: [0.18, 0.26, 0.32, 0.25],
            metallic_factor: 0.0,
            roughness_factor: 0.05,
            emissive_factor: [0.0, 0.0, 0.0],
            transparent: true,
            base_color_texture: None,
        },
        PartStyle::Trim => {
            let mut def = match source {
                Some(mat) => MaterialDefinition {
                    key: key.to_string(),
                    label: mat.label.clone(),
                    base_color_factor: mat.base_color_factor,
                    metallic_factor: mat.metallic_factor,
                    roughness_factor: mat.roughness_factor,
                    emissive_factor: mat.emissive_factor,
                    transparent: mat.base_color_factor[3] < 0.999,
                    base_color_texture: mat.base_color_texture.clone(),
                },
                None => {
                    let mut fallback = MaterialDefinition::default_definition();
                    fallback.key = key.to_string();
                    fallback.label = part_name.to_string();
                    fallback
                }
            };
            // Normalize to the stage lighting model.
            def.roughness_factor = def.roughness_factor.clamp(0.05, 1.0);
            def.metallic_factor = def.metallic_factor.clamp(0.0, 1.0);
            def
        }
    }
}

pub struct MaterialRegistry {
    materials: HashMap<String, MaterialEntry>,
    textures: HashMap<String, TextureData>,
    sampler: Option<Arc<wgpu::Sampler>>,
    white_texture: Option<Arc<wgpu::TextureView>>,
}

struct MaterialEntry {
    definition: MaterialDefinition,
    gpu: Option<Arc<MaterialGpu>>,
}

struct TextureData {
    width: u32,
    height: u32,
    data: Vec<u8>,
    view: Option<Arc<wgpu::TextureView>>,
    srgb: bool,
}

pub struct MaterialGpu {
    pub bind_group: Arc<wgpu::BindGroup>,
    pub transparent: bool,
    _uniform_buffer: Arc<wgpu::Buffer>,
}

impl MaterialRegistry {
    pub fn new() -> Self {
        let mut registry = Self {
            materials: HashMap::new(),
            textures: HashMap::new(),
            sampler: None,
            white_texture: None,
        };
        registry.insert(MaterialDefinition::default_definition());
        registry
    }

    pub fn default_key(&self) -> &str {
        DEFAULT_MATERIAL_KEY
    }

    pub fn has(&self, key: &str) -> bool {
        self.materials.contains_key(key)
    }

    pub fn definition(&self, key: &str) -> Option<&MaterialDefinition> {
        self.materials.get(key).map(|entry| &entry.definition)
    }

    pub fn insert(&mut self, definition: MaterialDefinition) {
        self.materials
            .insert(definition.key.clone(), MaterialEntry { definition, gpu: None });
    }

    pub fn register_import(&mut self, import: &VehicleImport) {
        for texture in &import.textures {
            self.textures.insert(
                texture.key.clone(),
                TextureData {
                    width: texture.width,
                    height: texture.height,
                    data: texture.data.clone(),
                    view: None,
                    srgb: true,
                },
            );
        }
        for material in &import.materials {
            self.insert(MaterialDefinition {
                key: material.key.clone(),
                label: material.label.clone(),
                base_color_factor: material.base_color_factor,
                metallic_factor: material.metallic_factor,
                roughness_factor: material.roughness_factor,
                emissive_factor: material.emissive_factor,
                transparent: material.base_color_factor[3] < 0.999,
                base_color_texture: material.base_color_texture.clone(),
            });
        }
    }

    pub fn is_transparent(&self, key: &str) -> bool {
        self.definition(key).map(|def| def.transparent).unwrap_or(false)
    }

    pub fn prepare_gpu(&mut self, key: &str, renderer: &mut Renderer) -> Result<Arc<MaterialGpu>> {
        if let Some(gpu) = self.materials.get(key).and_then(|entry| entry.gpu.clone()) {
            return Ok(gpu);
        }
        let sampler = self.ensure_sampler(renderer)?;
        let white = self.ensure_white_texture(renderer)?;
        let definition = self
            .materials
            .get(key)
            .map(|entry| entry.definition.clone())
            .ok_or_else(|| anyhow!("Material '{key}' not registered"))?;

        let base_color_view = match definition.base_color_texture.as_ref() {
            Some(binding) => match self.ensure_texture_view(&binding.texture_key, renderer) {
                Ok(view) => Some(view),
                Err(err) => {
                    eprintln!("[material] texture '{}' unavailable: {err:?}", binding.texture_key);
                    None
                }
            },
            None => None,
        };

        let device = renderer.device()?;
        let uniform = MaterialUniform {
            base_color_factor: definition.base_color_factor,
            emissive_factor: [
                definition.emissive_factor[0],
                definition.emissive_factor[1],
                definition.emissive_factor[2],
                0.0,
            ],
            params: [
                definition.metallic_factor,
                definition.roughness_factor,
                definition.base_color_factor[3],
                if base_color_view.is_some() { 1.0 } else { 0.0 },
            ],
        };
        let uniform_buffer = Arc::new(device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Material Uniform"),
            contents: bytemuck::bytes_of(&uniform),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        }));
        let view = base_color_view.unwrap_or(white);
        let layout = renderer.material_bind_layout()?;
        let bind_group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Material BG"),
            layout: &layout,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: uniform_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&sampler) },
            ],
        }));
        let gpu = Arc::new(MaterialGpu {
            bind_group,
            transparent: definition.transparent,
            _uniform_buffer: uniform_buffer,
        });
        if let Some(entry) = self.materials.get_mut(key) {
            entry.gpu = Some(gpu.clone());
        }
        Ok(gpu)
    }

    fn ensure_sampler(&mut self, renderer: &Renderer) -> Result<Arc<wgpu::Sampler>> {
        if let Some(sampler) = self.sampler.as_ref() {
            return Ok(sampler.clone());
        }
        let device = renderer.device()?;
        let sampler = Arc::new(device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Material Sampler"),
            address_mode_u: wgpu::AddressMode::Repeat,
            address_mode_v: wgpu::AddressMode::Repeat,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        }));
        self.sampler = Some(sampler.clone());
        Ok(sampler)
    }

    fn ensure_white_texture(&mut self, renderer: &Renderer) -> Result<Arc<wgpu::TextureView>> {
        if let Some(view) = self.white_texture.as_ref() {
            return Ok(view.clone());
        }
        let view = Arc::new(upload_rgba_texture(renderer, 1, 1, &[255, 255, 255, 255], true, "White")?);
        self.white_texture = Some(view.clone());
        Ok(view)
    }

    fn ensure_texture_view(&mut self, key: &str, renderer: &Renderer) -> Result<Arc<wgpu::TextureView>> {
        let entry =
            self.textures.get_mut(key).ok_or_else(|| anyhow!("Texture '{key}' not registered"))?;
        if let Some(view) = entry.view.as_ref() {
            return Ok(view.clone());
        }
        let view = Arc::new(upload_rgba_texture(
            renderer,
            entry.width,
            entry.height,
            &entry.data,
            entry.srgb,
            key,
        )?);
        entry.view = Some(view.clone());
        Ok(view)
    }
}

impl Default for MaterialRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn upload_rgba_texture(
    renderer: &Renderer,
    width: u32,
    height: u32,
    data: &[u8],
    srgb: bool,
    label: &str,
) -> Result<wgpu::TextureView> {
    let device = renderer.device()?;
    let queue = renderer.queue()?;
    let format =
        if srgb { wgpu::TextureFormat::Rgba8UnormSrgb } else { wgpu::TextureFormat::Rgba8Unorm };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        wgpu::TexelCopyTextureInfo {
            texture: &texture,
            mip_level: 0,
            origin: wgpu::Origin3d::ZERO,
            aspect: wgpu::TextureAspect::All,
        },
        data,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(width * 4),
            rows_per_image: Some(height),
        },
        wgpu::Extent3d { width, height, depth_or_array_layers: 1 },
    );
    Ok(texture.create_view(&wgpu::TextureViewDescriptor::default()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn styling_rule_matches_substrings() {
        assert_eq!(style_for_part("CarBody_low"), PartStyle::Body);
        assert_eq!(style_for_part("front_chassis"), PartStyle::Body);
        assert_eq!(style_for_part("Wheel_FL"), PartStyle::Wheel);
        assert_eq!(style_for_part("rim_rear"), PartStyle::Wheel);
        assert_eq!(style_for_part("WINDSHIELD"), PartStyle::Glass);
        assert_eq!(style_for_part("side_window_l"), PartStyle::Glass);
        assert_eq!(style_for_part("exhaust_tip"), PartStyle::Trim);
    }

    #[test]
    fn body_style_is_copper_with_glow() {
        let def = styled_definition("styled::body", "body", PartStyle::Body, None);
        assert!(def.metallic_factor > 0.5);
        assert!(def.emissive_factor.iter().any(|&c| c > 0.0), "body must glow");
        assert!(!def.transparent);
    }

    #[test]
    fn glass_style_is_transparent() {
        let def = styled_definition("styled::glass", "window", PartStyle::Glass, None);
        assert!(def.transparent);
        assert!(def.base_color_factor[3] < 1.0);
    }

    #[test]
    fn trim_style_normalizes_source_material() {
        let source = ImportedMaterial {
            key: "m".to_string(),
            label: "paint".to_string(),
            base_color_factor: [0.5, 0.5, 0.5, 1.0],
            metallic_factor: 3.0,
            roughness_factor: 0.0,
            emissive_factor: [0.0, 0.0, 0.0],
            base_color_texture: None,
        };
        let def = styled_definition("styled::trim", "mirror", PartStyle::Trim, Some(&source));
        assert!(def.metallic_factor <= 1.0);
        assert!(def.roughness_factor >= 0.05);
        assert_eq!(def.label, "paint");
    }

    #[test]
    fn registry_has_permanent_default() {
        let registry = MaterialRegistry::new();
        assert!(registry.has(DEFAULT_MATERIAL_KEY));
        assert!(!registry.is_transparent(DEFAULT_MATERIAL_KEY));
    }
}
