use anyhow::{anyhow, bail, Context, Result};
use glam::{Mat4, Quat, Vec2, Vec3, Vec4};
use gltf::mesh::Mode;
use std::collections::HashMap;
use std::path::Path;

#[repr(C)]
#[derive(Clone, Copy, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MeshVertex {
    pub position: [f32; 3],
    pub normal: [f32; 3],
    pub tangent: [f32; 4],
    pub uv: [f32; 2],
}

impl MeshVertex {
    pub fn new(position: Vec3, normal: Vec3, tangent: Vec4, uv: Vec2) -> Self {
        Self {
            position: position.to_array(),
            normal: normal.to_array(),
            tangent: tangent.to_array(),
            uv: uv.to_array(),
        }
    }

    pub fn layout<'a>() -> wgpu::VertexBufferLayout<'a> {
        use std::mem;
        wgpu::VertexBufferLayout {
            array_stride: mem::size_of::<MeshVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &[
                wgpu::VertexAttribute {
                    offset: 0,
                    shader_location: 0,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 12,
                    shader_location: 1,
                    format: wgpu::VertexFormat::Float32x3,
                },
                wgpu::VertexAttribute {
                    offset: 24,
                    shader_location: 2,
                    format: wgpu::VertexFormat::Float32x4,
                },
                wgpu::VertexAttribute {
                    offset: 40,
                    shader_location: 3,
                    format: wgpu::VertexFormat::Float32x2,
                },
            ],
        }
    }
}

#[derive(Clone, Debug)]
pub struct Mesh {
    pub vertices: Vec<MeshVertex>,
    pub indices: Vec<u32>,
    pub bounds: MeshBounds,
}

#[derive(Clone, Debug)]
pub struct MeshBounds {
    pub min: Vec3,
    pub max: Vec3,
    pub center: Vec3,
    pub radius: f32,
}

#[derive(Clone, Debug)]
pub struct ImportedTexture {
    pub key: String,
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

#[derive(Clone, Debug)]
pub struct MaterialTextureBinding {
    pub texture_key: String,
    pub srgb: bool,
}

#[derive(Clone, Debug)]
pub struct ImportedMaterial {
    pub key: String,
    pub label: String,
    pub base_color_factor: [f32; 4],
    pub metallic_factor: f32,
    pub roughness_factor: f32,
    pub emissive_factor: [f32; 3],
    pub base_color_texture: Option<MaterialTextureBinding>,
}

/// One renderable piece of the vehicle: the node's mesh plus its rest pose.
/// `parent` is the composed transform of every ancestor node, so an animated
/// local TRS recomposes as `parent * TRS`.
#[derive(Clone, Debug)]
pub struct ImportedPart {
    pub name: String,
    pub mesh: Mesh,
    pub parent: Mat4,
    pub rest_translation: Vec3,
    pub rest_rotation: Quat,
    pub rest_scale: Vec3,
    pub material: Option<String>,
}

impl ImportedPart {
    pub fn rest_local(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.rest_scale, self.rest_rotation, self.rest_translation)
    }
}

#[derive(Clone, Debug)]
pub struct Keyframe<T: Copy> {
    pub time: f32,
    pub value: T,
}

#[derive(Clone, Debug, Default)]
pub struct NodeTrack {
    pub node: String,
    pub translations: Vec<Keyframe<Vec3>>,
    pub rotations: Vec<Keyframe<Quat>>,
    pub scales: Vec<Keyframe<Vec3>>,
}

impl NodeTrack {
    pub fn sample_translation(&self, t: f32) -> Option<Vec3> {
        sample_keyframes(&self.translations, t, Vec3::lerp)
    }

    pub fn sample_rotation(&self, t: f32) -> Option<Quat> {
        sample_keyframes(&self.rotations, t, |a, b, s| a.slerp(b, s))
    }

    pub fn sample_scale(&self, t: f32) -> Option<Vec3> {
        sample_keyframes(&self.scales, t, Vec3::lerp)
    }

    fn is_empty(&self) -> bool {
        self.translations.is_empty() && self.rotations.is_empty() && self.scales.is_empty()
    }

    fn end_time(&self) -> f32 {
        let last = |frames: &[Keyframe<Vec3>]| frames.last().map(|k| k.time).unwrap_or(0.0);
        let rot_last = self.rotations.last().map(|k| k.time).unwrap_or(0.0);
        last(&self.translations).max(rot_last).max(last(&self.scales))
    }
}

/// A glTF animation reduced to per-node TRS tracks. Clips loop.
#[derive(Clone, Debug)]
pub struct NodeClip {
    pub name: String,
    pub duration: f32,
    pub tracks: Vec<NodeTrack>,
}

impl NodeClip {
    pub fn track_for(&self, node: &str) -> Option<&NodeTrack> {
        self.tracks.iter().find(|track| track.node == node)
    }
}

#[derive(Clone, Debug)]
pub struct VehicleImport {
    pub parts: Vec<ImportedPart>,
    pub materials: Vec<ImportedMaterial>,
    pub textures: Vec<ImportedTexture>,
    pub clips: Vec<NodeClip>,
}

fn sample_keyframes<T, F>(frames: &[Keyframe<T>], t: f32, lerp: F) -> Option<T>
where
    T: Copy,
    F: Fn(T, T, f32) -> T,
{
    let first = frames.first()?;
    if frames.len() == 1 || t <= first.time {
        return Some(first.value);
    }
    let last = frames.last()?;
    if t >= last.time {
        return Some(last.value);
    }
    let next_idx = frames.partition_point(|frame| frame.time <= t);
    let prev = &frames[next_idx - 1];
    let next = &frames[next_idx];
    let span = (next.time - prev.time).max(1e-6);
    Some(lerp(prev.value, next.value, (t - prev.time) / span))
}

impl Mesh {
    pub fn new(vertices: Vec<MeshVertex>, indices: Vec<u32>) -> Self {
        let bounds = MeshBounds::from_vertices(&vertices);
        Self { vertices, indices, bounds }
    }

    /// Axis-aligned box with the given full extents, centered on the origin.
    pub fn cuboid(extents: Vec3) -> Self {
        let h = extents * 0.5;
        let positions = [
            Vec3::new(-h.x, -h.y, -h.z),
            Vec3::new(h.x, -h.y, -h.z),
            Vec3::new(h.x, h.y, -h.z),
            Vec3::new(-h.x, h.y, -h.z),
            Vec3::new(-h.x, -h.y, h.z),
            Vec3::new(h.x, -h.y, h.z),
            Vec3::new(h.x, h.y, h.z),
            Vec3::new(-h.x, h.y, h.z),
        ];
        let normals = [
            Vec3::new(0.0, 0.0, -1.0),
            Vec3::new(0.0, 0.0, 1.0),
            Vec3::new(-1.0, 0.0, 0.0),
            Vec3::new(1.0, 0.0, 0.0),
            Vec3::new(0.0, 1.0, 0.0),
            Vec3::new(0.0, -1.0, 0.0),
        ];
        let uv_quad = [Vec2::new(0.0, 0.0), Vec2::new(1.0, 0.0), Vec2::new(1.0, 1.0), Vec2::new(0.0, 1.0)];
        let mut vertices = Vec::with_capacity(24);
        let mut write_face = |corners: [usize; 4], normal: Vec3| {
            for (i, &corner) in corners.iter().enumerate() {
                vertices.push(MeshVertex::new(
                    positions[corner],
                    normal,
                    Vec4::new(1.0, 0.0, 0.0, 1.0),
                    uv_quad[i],
                ));
            }
        };
        write_face([0, 3, 2, 1], normals[0]); // back
        write_face([4, 5, 6, 7], normals[1]); // front
        write_face([0, 4, 7, 3], normals[2]); // left
        write_face([1, 2, 6, 5], normals[3]); // right
        write_face([3, 7, 6, 2], normals[4]); // top
        write_face([0, 1, 5, 4], normals[5]); // bottom

        let mut indices = Vec::with_capacity(36);
        for face in 0..6u32 {
            let base = face * 4;
            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        compute_tangents(&mut vertices, &indices);
        Self::new(vertices, indices)
    }

    /// Cylinder along the Y axis with closed caps.
    pub fn cylinder(radius: f32, height: f32, segments: u32) -> Self {
        let segments = segments.max(3);
        let half = height * 0.5;
        let mut vertices = Vec::new();
        let mut indices = Vec::new();

        // side
        for i in 0..=segments {
            let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
            let (sin, cos) = angle.sin_cos();
            let normal = Vec3::new(cos, 0.0, sin);
            let u = i as f32 / segments as f32;
            for (y, v) in [(half, 0.0), (-half, 1.0)] {
                vertices.push(MeshVertex::new(
                    Vec3::new(cos * radius, y, sin * radius),
                    normal,
                    Vec4::new(-sin, 0.0, cos, 1.0),
                    Vec2::new(u, v),
                ));
            }
        }
        for i in 0..segments {
            let base = i * 2;
            indices.extend_from_slice(&[base, base + 1, base + 2, base + 2, base + 1, base + 3]);
        }

        // caps
        for (y, normal) in [(half, Vec3::Y), (-half, Vec3::NEG_Y)] {
            let center = vertices.len() as u32;
            vertices.push(MeshVertex::new(
                Vec3::new(0.0, y, 0.0),
                normal,
                Vec4::new(1.0, 0.0, 0.0, 1.0),
                Vec2::new(0.5, 0.5),
            ));
            for i in 0..=segments {
                let angle = i as f32 / segments as f32 * std::f32::consts::TAU;
                let (sin, cos) = angle.sin_cos();
                vertices.push(MeshVertex::new(
                    Vec3::new(cos * radius, y, sin * radius),
                    normal,
                    Vec4::new(1.0, 0.0, 0.0, 1.0),
                    Vec2::new(cos * 0.5 + 0.5, sin * 0.5 + 0.5),
                ));
            }
            for i in 0..segments {
                let a = center + 1 + i;
                let b = center + 2 + i;
                if normal.y > 0.0 {
                    indices.extend_from_slice(&[center, b, a]);
                } else {
                    indices.extend_from_slice(&[center, a, b]);
                }
            }
        }
        Self::new(vertices, indices)
    }

    /// Latitude/longitude sphere.
    pub fn uv_sphere(radius: f32, sectors: u32, stacks: u32) -> Self {
        let sectors = sectors.max(3);
        let stacks = stacks.max(2);
        let mut vertices = Vec::new();
        let mut indices = Vec::new();
        for stack in 0..=stacks {
            let v = stack as f32 / stacks as f32;
            let phi = v * std::f32::consts::PI;
            for sector in 0..=sectors {
                let u = sector as f32 / sectors as f32;
                let theta = u * std::f32::consts::TAU;
                let normal = Vec3::new(phi.sin() * theta.cos(), phi.cos(), phi.sin() * theta.sin());
                vertices.push(MeshVertex::new(
                    normal * radius,
                    normal,
                    Vec4::new(-theta.sin(), 0.0, theta.cos(), 1.0),
                    Vec2::new(u, v),
                ));
            }
        }
        let ring = sectors + 1;
        for stack in 0..stacks {
            for sector in 0..sectors {
                let a = stack * ring + sector;
                let b = a + ring;
                indices.extend_from_slice(&[a, b, a + 1, a + 1, b, b + 1]);
            }
        }
        Self::new(vertices, indices)
    }

    /// Flat XZ plane facing +Y, centered on the origin.
    pub fn plane(width: f32, depth: f32) -> Self {
        let hw = width * 0.5;
        let hd = depth * 0.5;
        let mut vertices = vec![
            MeshVertex::new(Vec3::new(-hw, 0.0, -hd), Vec3::Y, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::new(0.0, 0.0)),
            MeshVertex::new(Vec3::new(hw, 0.0, -hd), Vec3::Y, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::new(1.0, 0.0)),
            MeshVertex::new(Vec3::new(hw, 0.0, hd), Vec3::Y, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::new(1.0, 1.0)),
            MeshVertex::new(Vec3::new(-hw, 0.0, hd), Vec3::Y, Vec4::new(1.0, 0.0, 0.0, 1.0), Vec2::new(0.0, 1.0)),
        ];
        let indices = vec![0, 2, 1, 0, 3, 2];
        compute_tangents(&mut vertices, &indices);
        Self::new(vertices, indices)
    }
}

/// Imports a vehicle as named parts: one part per (node, primitive) so the
/// styling rule can key off node names and the mixer can pose nodes.
pub fn load_gltf_vehicle(path: impl AsRef<Path>) -> Result<VehicleImport> {
    let path_ref = path.as_ref();
    let (document, buffers, images) = gltf::import(path_ref)
        .with_context(|| format!("Failed to import glTF from {}", path_ref.display()))?;

    let mut textures = Vec::new();
    let mut texture_key_map: HashMap<usize, String> = HashMap::new();
    for texture in document.textures() {
        let source = texture.source();
        let image_data = images
            .get(source.index())
            .ok_or_else(|| anyhow!("Image index {} missing in {}", source.index(), path_ref.display()))?;
        let pixels = convert_image_to_rgba(image_data)?;
        let key = format!("{}::tex{}", path_ref.display(), texture.index());
        textures.push(ImportedTexture {
            key: key.clone(),
            width: image_data.width,
            height: image_data.height,
            data: pixels,
        });
        texture_key_map.insert(texture.index(), key);
    }

    let mut materials = Vec::new();
    let mut material_key_map: HashMap<usize, String> = HashMap::new();
    for (mat_index, material) in document.materials().enumerate() {
        let label = material.name().map(|s| s.to_string()).unwrap_or_else(|| format!("material_{mat_index}"));
        let key = format!("{}::{}", path_ref.display(), label);
        material_key_map.insert(material.index().unwrap_or(mat_index), key.clone());
        let pbr = material.pbr_metallic_roughness();
        let base_color_texture = pbr.base_color_texture().and_then(|info| {
            texture_key_map
                .get(&info.texture().index())
                .map(|key_str| MaterialTextureBinding { texture_key: key_str.clone(), srgb: true })
        });
        materials.push(ImportedMaterial {
            key,
            label,
            base_color_factor: pbr.base_color_factor(),
            metallic_factor: pbr.metallic_factor(),
            roughness_factor: pbr.roughness_factor(),
            emissive_factor: material.emissive_factor(),
            base_color_texture,
        });
    }

    let mut parts = Vec::new();
    let scene = document
        .default_scene()
        .or_else(|| document.scenes().next())
        .ok_or_else(|| anyhow!("No scenes in {}", path_ref.display()))?;
    for node in scene.nodes() {
        collect_node_parts(&node, Mat4::IDENTITY, &buffers, &material_key_map, &mut parts)?;
    }
    if parts.is_empty() {
        bail!("No triangle meshes found in {}", path_ref.display());
    }

    let node_names: HashMap<usize, String> = document
        .nodes()
        .map(|node| (node.index(), node_label(&node)))
        .collect();
    let mut clips = Vec::new();
    for (clip_index, animation) in document.animations().enumerate() {
        let name =
            animation.name().map(|s| s.to_string()).unwrap_or_else(|| format!("clip_{clip_index}"));
        let mut tracks: HashMap<String, NodeTrack> = HashMap::new();
        for channel in animation.channels() {
            let target = channel.target().node();
            let Some(node_name) = node_names.get(&target.index()) else { continue };
            let reader = channel.reader(|buffer| Some(&buffers[buffer.index()]));
            let Some(inputs) = reader.read_inputs() else { continue };
            let times: Vec<f32> = inputs.collect();
            let track = tracks
                .entry(node_name.clone())
                .or_insert_with(|| NodeTrack { node: node_name.clone(), ..Default::default() });
            match reader.read_outputs() {
                Some(gltf::animation::util::ReadOutputs::Translations(values)) => {
                    track.translations = times
                        .iter()
                        .zip(values)
                        .map(|(&time, value)| Keyframe { time, value: Vec3::from_array(value) })
                        .collect();
                }
                Some(gltf::animation::util::ReadOutputs::Rotations(values)) => {
                    track.rotations = times
                        .iter()
                        .zip(values.into_f32())
                        .map(|(&time, value)| Keyframe { time, value: Quat::from_array(value) })
                        .collect();
                }
                Some(gltf::animation::util::ReadOutputs::Scales(values)) => {
                    track.scales = times
                        .iter()
                        .zip(values)
                        .map(|(&time, value)| Keyframe { time, value: Vec3::from_array(value) })
                        .collect();
                }
                _ => {}
            }
        }
        let mut tracks: Vec<NodeTrack> = tracks.into_values().filter(|track| !track.is_empty()).collect();
        tracks.sort_by(|a, b| a.node.cmp(&b.node));
        if tracks.is_empty() {
            continue;
        }
        let duration = tracks.iter().map(NodeTrack::end_time).fold(0.0f32, f32::max);
        clips.push(NodeClip { name, duration, tracks });
    }

    Ok(VehicleImport { parts, materials, textures, clips })
}

fn node_label(node: &gltf::Node) -> String {
    node.name().map(|s| s.to_string()).unwrap_or_else(|| format!("node_{}", node.index()))
}

fn collect_node_parts(
    node: &gltf::Node,
    parent: Mat4,
    buffers: &[gltf::buffer::Data],
    material_key_map: &HashMap<usize, String>,
    parts: &mut Vec<ImportedPart>,
) -> Result<()> {
    let (rest_translation, rest_rotation, rest_scale) = match node.transform() {
        gltf::scene::Transform::Matrix { matrix } => {
            let mat = Mat4::from_cols_array_2d(&matrix);
            let (scale, rotation, translation) = mat.to_scale_rotation_translation();
            (translation, rotation, scale)
        }
        gltf::scene::Transform::Decomposed { translation, rotation, scale } => {
            (Vec3::from_array(translation), Quat::from_array(rotation), Vec3::from_array(scale))
        }
    };
    let local = Mat4::from_scale_rotation_translation(rest_scale, rest_rotation, rest_translation);

    if let Some(mesh) = node.mesh() {
        let base_name = node_label(node);
        for (primitive_index, primitive) in mesh.primitives().enumerate() {
            if primitive.mode() != Mode::Triangles {
                continue;
            }
            let reader = primitive.reader(|buffer| Some(&buffers[buffer.index()]));
            let positions: Vec<Vec3> = reader
                .read_positions()
                .ok_or_else(|| anyhow!("POSITION attribute missing on node '{base_name}'"))?
                .map(Vec3::from_array)
                .collect();
            if positions.is_empty() {
                continue;
            }
            let indices: Vec<u32> = reader
                .read_indices()
                .map(|read| read.into_u32().collect())
                .unwrap_or_else(|| (0..positions.len() as u32).collect());
            let mut normals: Vec<Vec3> = reader
                .read_normals()
                .map(|it| it.map(Vec3::from_array).collect())
                .unwrap_or_default();
            if normals.len() != positions.len() || normals.iter().all(|n| n.length_squared() == 0.0) {
                normals = compute_normals(&positions, &indices);
            }
            let mut tex_coords: Vec<Vec2> = reader
                .read_tex_coords(0)
                .map(|coords| coords.into_f32().map(Vec2::from_array).collect())
                .unwrap_or_default();
            if tex_coords.len() != positions.len() {
                tex_coords.resize(positions.len(), Vec2::ZERO);
            }
            let mut vertices: Vec<MeshVertex> = positions
                .iter()
                .enumerate()
                .map(|(i, pos)| {
                    let normal = normals.get(i).copied().unwrap_or(Vec3::Y).normalize_or_zero();
                    MeshVertex::new(*pos, normal, Vec4::new(1.0, 0.0, 0.0, 1.0), tex_coords[i])
                })
                .collect();
            compute_tangents(&mut vertices, &indices);

            let name = if primitive_index == 0 {
                base_name.clone()
            } else {
                format!("{base_name}_{primitive_index}")
            };
            let material =
                primitive.material().index().and_then(|idx| material_key_map.get(&idx).cloned());
            parts.push(ImportedPart {
                name,
                mesh: Mesh::new(vertices, indices),
                parent,
                rest_translation,
                rest_rotation,
                rest_scale,
                material,
            });
        }
    }

    let global = parent * local;
    for child in node.children() {
        collect_node_parts(&child, global, buffers, material_key_map, parts)?;
    }
    Ok(())
}

fn convert_image_to_rgba(image: &gltf::image::Data) -> Result<Vec<u8>> {
    match image.format {
        gltf::image::Format::R8 => {
            let mut out = Vec::with_capacity(image.pixels.len() * 4);
            for &value in &image.pixels {
                out.extend_from_slice(&[value, value, value, 255]);
            }
            Ok(out)
        }
        gltf::image::Format::R8G8 => {
            let mut out = Vec::with_capacity(image.pixels.len() / 2 * 4);
            for chunk in image.pixels.chunks_exact(2) {
                out.extend_from_slice(&[chunk[0], chunk[1], 0, 255]);
            }
            Ok(out)
        }
        gltf::image::Format::R8G8B8 => {
            let mut out = Vec::with_capacity(image.pixels.len() / 3 * 4);
            for chunk in image.pixels.chunks_exact(3) {
                out.extend_from_slice(&[chunk[0], chunk[1], chunk[2], 255]);
            }
            Ok(out)
        }
        gltf::image::Format::R8G8B8A8 => Ok(image.pixels.clone()),
        other => bail!("Unsupported image format {:?}", other),
    }
}

fn compute_normals(positions: &[Vec3], indices: &[u32]) -> Vec<Vec3> {
    let mut normals = vec![Vec3::ZERO; positions.len()];
    for tri in indices.chunks(3) {
        if tri.len() < 3 {
            continue;
        }
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= positions.len() || i1 >= positions.len() || i2 >= positions.len() {
            continue;
        }
        let normal = (positions[i1] - positions[i0]).cross(positions[i2] - positions[i0]);
        if normal.length_squared() > 0.0 {
            normals[i0] += normal;
            normals[i1] += normal;
            normals[i2] += normal;
        }
    }
    for normal in &mut normals {
        *normal = if normal.length_squared() > 0.0 { normal.normalize() } else { Vec3::Y };
    }
    normals
}

fn compute_tangents(vertices: &mut [MeshVertex], indices: &[u32]) {
    if vertices.is_empty() || indices.is_empty() {
        return;
    }
    let mut tan1 = vec![Vec3::ZERO; vertices.len()];
    let mut tan2 = vec![Vec3::ZERO; vertices.len()];

    for tri in indices.chunks(3) {
        if tri.len() < 3 {
            continue;
        }
        let (i0, i1, i2) = (tri[0] as usize, tri[1] as usize, tri[2] as usize);
        if i0 >= vertices.len() || i1 >= vertices.len() || i2 >= vertices.len() {
            continue;
        }
        let v0 = Vec3::from_array(vertices[i0].position);
        let v1 = Vec3::from_array(vertices[i1].position);
        let v2 = Vec3::from_array(vertices[i2].position);
        let uv0 = Vec2::from_array(vertices[i0].uv);
        let uv1 = Vec2::from_array(vertices[i1].uv);
        let uv2 = Vec2::from_array(vertices[i2].uv);

        let delta_pos1 = v1 - v0;
        let delta_pos2 = v2 - v0;
        let delta_uv1 = uv1 - uv0;
        let delta_uv2 = uv2 - uv0;

        let denom = delta_uv1.x * delta_uv2.y - delta_uv1.y * delta_uv2.x;
        if denom.abs() < 1e-8 {
            continue;
        }
        let r = 1.0 / denom;
        let sdir = (delta_pos1 * delta_uv2.y - delta_pos2 * delta_uv1.y) * r;
        let tdir = (delta_pos2 * delta_uv1.x - delta_pos1 * delta_uv2.x) * r;
        tan1[i0] += sdir;
        tan1[i1] += sdir;
        tan1[i2] += sdir;
        tan2[i0] += tdir;
        tan2[i1] += tdir;
        tan2[i2] += tdir;
    }

    for (i, vertex) in vertices.iter_mut().enumerate() {
        let normal = Vec3::from_array(vertex.normal);
        let t1 = tan1[i];
        if t1.length_squared() > 0.0 {
            let tangent = (t1 - normal * normal.dot(t1)).normalize_or_zero();
            let w = if normal.cross(t1).dot(tan2[i]) < 0.0 { -1.0 } else { 1.0 };
            vertex.tangent = [tangent.x, tangent.y, tangent.z, w];
        } else {
            vertex.tangent = [1.0, 0.0, 0.0, 1.0];
        }
    }
}

impl MeshBounds {
    pub fn from_vertices(vertices: &[MeshVertex]) -> Self {
        if vertices.is_empty() {
            return MeshBounds { min: Vec3::ZERO, max: Vec3::ZERO, center: Vec3::ZERO, radius: 0.0 };
        }
        let mut min = Vec3::splat(f32::INFINITY);
        let mut max = Vec3::splat(f32::NEG_INFINITY);
        for vertex in vertices {
            let pos = Vec3::from_array(vertex.position);
            min = min.min(pos);
            max = max.max(pos);
        }
        let center = (min + max) * 0.5;
        let mut radius: f32 = 0.0;
        for vertex in vertices {
            radius = radius.max((Vec3::from_array(vertex.position) - center).length());
        }
        MeshBounds { min, max, center, radius }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cuboid_matches_extents() {
        let mesh = Mesh::cuboid(Vec3::new(4.0, 1.0, 2.0));
        assert_eq!(mesh.vertices.len(), 24);
        assert_eq!(mesh.indices.len(), 36);
        assert!((mesh.bounds.min - Vec3::new(-2.0, -0.5, -1.0)).length() < 1e-6);
        assert!((mesh.bounds.max - Vec3::new(2.0, 0.5, 1.0)).length() < 1e-6);
    }

    #[test]
    fn cylinder_stays_within_radius() {
        let mesh = Mesh::cylinder(0.4, 0.3, 16);
        for vertex in &mesh.vertices {
            let pos = Vec3::from_array(vertex.position);
            let radial = Vec2::new(pos.x, pos.z).length();
            assert!(radial <= 0.4 + 1e-5);
            assert!(pos.y.abs() <= 0.15 + 1e-5);
        }
    }

    #[test]
    fn sphere_vertices_lie_on_surface() {
        let mesh = Mesh::uv_sphere(0.25, 12, 8);
        for vertex in &mesh.vertices {
            let len = Vec3::from_array(vertex.position).length();
            assert!((len - 0.25).abs() < 1e-5, "vertex off surface: {len}");
        }
    }

    #[test]
    fn keyframe_sampling_clamps_and_lerps() {
        let track = NodeTrack {
            node: "body".to_string(),
            translations: vec![
                Keyframe { time: 0.0, value: Vec3::ZERO },
                Keyframe { time: 1.0, value: Vec3::new(2.0, 0.0, 0.0) },
            ],
            ..Default::default()
        };
        assert_eq!(track.sample_translation(-1.0), Some(Vec3::ZERO));
        assert_eq!(track.sample_translation(0.5), Some(Vec3::new(1.0, 0.0, 0.0)));
        assert_eq!(track.sample_translation(5.0), Some(Vec3::new(2.0, 0.0, 0.0)));
        assert_eq!(track.sample_rotation(0.5), None, "absent channel samples as None");
    }
}
