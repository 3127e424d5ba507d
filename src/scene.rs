use crate::config::{AppConfig, DriveVariant};
use crate::fallback::CarBlueprint;
use crate::loader::CarSource;
use crate::material_registry::{MaterialDefinition, MaterialRegistry, DEFAULT_MATERIAL_KEY};
use crate::mesh::{Mesh, NodeClip};
use bevy_ecs::prelude::*;
use glam::{Mat4, Quat, Vec3};
use rand::Rng;
use std::collections::HashMap;

pub const GROUND_MESH_KEY: &str = "stage::ground";
pub const GROUND_MATERIAL_KEY: &str = "stage::ground";

// ---------- Components ----------

#[derive(Component, Clone, Copy, Debug, PartialEq)]
pub struct Transform3D {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform3D {
    fn default() -> Self {
        Self { translation: Vec3::ZERO, rotation: Quat::IDENTITY, scale: Vec3::ONE }
    }
}

impl Transform3D {
    pub fn matrix(&self) -> Mat4 {
        Mat4::from_scale_rotation_translation(self.scale, self.rotation, self.translation)
    }
}

/// Exact pose snapshot for the driving-mode round trip.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl From<Transform3D> for Pose {
    fn from(t: Transform3D) -> Self {
        Self { translation: t.translation, rotation: t.rotation, scale: t.scale }
    }
}

impl From<Pose> for Transform3D {
    fn from(p: Pose) -> Self {
        Self { translation: p.translation, rotation: p.rotation, scale: p.scale }
    }
}

/// Link to the owning assembly root; an entity id, not a back-reference.
#[derive(Component, Clone, Copy)]
pub struct Parent(pub Entity);

/// Marker for the single active car root.
#[derive(Component)]
pub struct CarRoot;

/// A named piece of the car. `ancestors` is the composed transform of the
/// part's ancestor nodes inside the model, so an animated local pose
/// recomposes as `ancestors * local`.
#[derive(Component)]
pub struct CarPart {
    pub name: String,
    pub ancestors: Mat4,
}

#[derive(Component, Clone)]
pub struct MeshRef(pub String);

#[derive(Component, Clone)]
pub struct MaterialRef(pub String);

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum LightKind {
    Ambient,
    Directional { direction: Vec3 },
    Point,
    Spot { direction: Vec3, angle: f32, penumbra: f32 },
}

#[derive(Clone, Copy, Debug)]
pub struct LightPulse {
    pub amplitude: f32,
    pub frequency: f32,
    pub phase: f32,
}

#[derive(Clone, Copy, Debug)]
pub struct LightOrbit {
    pub radius: f32,
    pub height: f32,
    pub speed: f32,
    pub phase: f32,
}

#[derive(Component)]
pub struct Light {
    pub name: &'static str,
    pub kind: LightKind,
    pub color: Vec3,
    /// Center of the pulse; left untouched by the per-frame updater.
    pub base_intensity: f32,
    /// What the renderer samples; rewritten every frame while lights are on.
    pub intensity: f32,
    pub range: f32,
    /// Toggled by the `lights` action. Ambient and key lights stay on.
    pub switchable: bool,
    pub pulse: Option<LightPulse>,
    pub orbit: Option<LightOrbit>,
    /// Pre-toggle magnitude, captured lazily on the first disable.
    pub stored_base: Option<f32>,
}

// ---------- Resources ----------

/// Mode flags: written by the interaction dispatcher, read by the per-frame
/// updater. The event loop serializes both, so no locking is needed.
#[derive(Resource, Clone, Debug)]
pub struct AnimationState {
    pub auto_rotate: bool,
    pub lights_on: bool,
    pub driving: bool,
    pub drive_entered_at: Option<f32>,
    pub return_pose: Option<Pose>,
}

impl Default for AnimationState {
    fn default() -> Self {
        Self {
            auto_rotate: true,
            lights_on: true,
            driving: false,
            drive_entered_at: None,
            return_pose: None,
        }
    }
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct DriveSettings {
    pub variant: DriveVariant,
    pub radius: f32,
    pub speed: f32,
}

#[derive(Resource, Clone, Copy, Debug)]
pub struct IdleMotion {
    pub baseline: f32,
    pub amplitude: f32,
    pub frequency: f32,
    /// Applied only while auto-rotate is off.
    pub yaw_rate: f32,
}

impl Default for IdleMotion {
    fn default() -> Self {
        Self { baseline: -1.0, amplitude: 0.12, frequency: 1.0, yaw_rate: 0.12 }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Particle {
    pub position: Vec3,
    pub velocity: Vec3,
    pub size: f32,
    pub opacity: f32,
}

/// Decorative drifting points around the stage. Positions advance on the
/// CPU; the field's slow yaw and shader time ride along as uniforms.
#[derive(Resource)]
pub struct ParticleField {
    pub particles: Vec<Particle>,
    pub half_extent: Vec3,
    pub rotation: f32,
    pub rotation_rate: f32,
    pub time: f32,
    pub color: Vec3,
}

impl ParticleField {
    pub fn seeded(count: u32, half_extent: Vec3) -> Self {
        let mut rng = rand::thread_rng();
        let particles = (0..count)
            .map(|_| Particle {
                position: Vec3::new(
                    rng.gen_range(-half_extent.x..half_extent.x),
                    rng.gen_range(-half_extent.y..half_extent.y),
                    rng.gen_range(-half_extent.z..half_extent.z),
                ),
                velocity: Vec3::new(
                    rng.gen_range(-0.25..0.25),
                    rng.gen_range(-0.25..0.25),
                    rng.gen_range(-0.25..0.25),
                ),
                size: rng.gen_range(1.0..3.0),
                opacity: rng.gen_range(0.2..0.7),
            })
            .collect();
        Self {
            particles,
            half_extent,
            rotation: 0.0,
            rotation_rate: 0.02,
            time: 0.0,
            color: Vec3::new(1.0, 0.42, 0.21),
        }
    }
}

#[derive(Resource, Default)]
pub struct MeshLibrary {
    meshes: HashMap<String, Mesh>,
}

impl MeshLibrary {
    pub fn insert(&mut self, key: impl Into<String>, mesh: Mesh) {
        self.meshes.insert(key.into(), mesh);
    }

    pub fn get(&self, key: &str) -> Option<&Mesh> {
        self.meshes.get(key)
    }
}

/// Clip-based animation carried by the loaded model, advanced by the mixer.
#[derive(Resource, Default)]
pub struct CarClips {
    pub clips: Vec<NodeClip>,
    pub time: f32,
}

// ---------- Draw extraction ----------

pub struct MeshDrawInfo {
    pub mesh_key: String,
    pub material_key: String,
    pub model: Mat4,
}

#[derive(Clone, Copy, Default)]
pub struct PointLightInfo {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub range: f32,
}

#[derive(Clone, Copy, Default)]
pub struct SpotLightInfo {
    pub position: Vec3,
    pub direction: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub angle: f32,
    pub penumbra: f32,
}

/// Flattened light rig for the renderer's uniform block.
#[derive(Clone, Copy, Default)]
pub struct LightsSnapshot {
    pub ambient: Vec3,
    pub key_direction: Vec3,
    pub key_color: Vec3,
    pub points: [PointLightInfo; 2],
    pub point_count: u32,
    pub spot: Option<SpotLightInfo>,
}

// ---------- Stage ----------

/// Owns the entity arena for one showroom stage. Built once at startup; the
/// car joins later, once the load race resolves.
pub struct Stage {
    pub world: World,
}

impl Stage {
    pub fn new(config: &AppConfig) -> Self {
        let mut world = World::new();
        world.insert_resource(AnimationState::default());
        world.insert_resource(DriveSettings {
            variant: config.drive.variant,
            radius: config.drive.radius,
            speed: config.drive.speed,
        });
        world.insert_resource(IdleMotion {
            baseline: config.stage.ground_height + 1.0,
            ..Default::default()
        });
        world.insert_resource(ParticleField::seeded(
            config.stage.particle_count,
            Vec3::new(12.0, 6.0, 12.0),
        ));
        world.insert_resource(CarClips::default());

        let mut library = MeshLibrary::default();
        library.insert(GROUND_MESH_KEY, Mesh::plane(config.stage.ground_extent, config.stage.ground_extent));
        world.insert_resource(library);

        let mut stage = Self { world };
        stage.spawn_ground(config.stage.ground_height);
        stage.spawn_light_rig();
        stage
    }

    fn spawn_ground(&mut self, height: f32) {
        self.world.spawn((
            Transform3D { translation: Vec3::new(0.0, height, 0.0), ..Default::default() },
            MeshRef(GROUND_MESH_KEY.to_string()),
            MaterialRef(GROUND_MATERIAL_KEY.to_string()),
        ));
    }

    fn spawn_light_rig(&mut self) {
        self.world.spawn((
            Transform3D::default(),
            Light {
                name: "ambient",
                kind: LightKind::Ambient,
                color: Vec3::splat(0.25),
                base_intensity: 0.3,
                intensity: 0.3,
                range: 0.0,
                switchable: false,
                pulse: None,
                orbit: None,
                stored_base: None,
            },
        ));
        self.world.spawn((
            Transform3D { translation: Vec3::new(10.0, 10.0, 5.0), ..Default::default() },
            Light {
                name: "key",
                kind: LightKind::Directional { direction: Vec3::new(-10.0, -10.0, -5.0).normalize() },
                color: Vec3::ONE,
                base_intensity: 1.0,
                intensity: 1.0,
                range: 0.0,
                switchable: false,
                pulse: None,
                orbit: None,
                stored_base: None,
            },
        ));
        self.world.spawn((
            Transform3D { translation: Vec3::new(-5.0, 5.0, 5.0), ..Default::default() },
            Light {
                name: "accent",
                kind: LightKind::Point,
                color: Vec3::new(1.0, 0.42, 0.21),
                base_intensity: 2.0,
                intensity: 2.0,
                range: 20.0,
                switchable: true,
                pulse: Some(LightPulse { amplitude: 0.6, frequency: 2.1, phase: 0.0 }),
                orbit: Some(LightOrbit {
                    radius: 7.07,
                    height: 5.0,
                    speed: 0.4,
                    phase: std::f32::consts::FRAC_PI_2 * 3.0,
                }),
                stored_base: None,
            },
        ));
        self.world.spawn((
            Transform3D { translation: Vec3::new(5.0, 3.0, -5.0), ..Default::default() },
            Light {
                name: "rim",
                kind: LightKind::Point,
                color: Vec3::new(0.0, 0.83, 1.0),
                base_intensity: 1.0,
                intensity: 1.0,
                range: 15.0,
                switchable: true,
                pulse: Some(LightPulse {
                    amplitude: 0.35,
                    frequency: 1.7,
                    phase: std::f32::consts::FRAC_PI_3,
                }),
                orbit: None,
                stored_base: None,
            },
        ));
        self.world.spawn((
            Transform3D { translation: Vec3::new(0.0, 15.0, 0.0), ..Default::default() },
            Light {
                name: "spot",
                kind: LightKind::Spot {
                    direction: Vec3::NEG_Y,
                    angle: std::f32::consts::FRAC_PI_6,
                    penumbra: 0.2,
                },
                color: Vec3::ONE,
                base_intensity: 1.0,
                intensity: 1.0,
                range: 30.0,
                switchable: true,
                pulse: Some(LightPulse {
                    amplitude: 0.25,
                    frequency: 1.3,
                    phase: std::f32::consts::FRAC_PI_2,
                }),
                orbit: None,
                stored_base: None,
            },
        ));
    }

    pub fn has_car(&mut self) -> bool {
        self.car_root().is_some()
    }

    pub fn car_root(&mut self) -> Option<Entity> {
        let mut query = self.world.query_filtered::<Entity, With<CarRoot>>();
        query.iter(&self.world).next()
    }

    /// Installs the race winner. The outcome is irrevocable; a second call
    /// is a bug upstream and is ignored with a complaint.
    pub fn spawn_car(&mut self, source: CarSource, scale: f32, materials: &mut MaterialRegistry) {
        if self.has_car() {
            eprintln!("[scene] car already present; ignoring a second spawn");
            return;
        }
        match source {
            CarSource::Fallback(blueprint) => self.spawn_fallback_car(&blueprint, materials),
            CarSource::Loaded(import) => self.spawn_loaded_car(*import, scale, materials),
        }
    }

    fn spawn_fallback_car(&mut self, blueprint: &CarBlueprint, materials: &mut MaterialRegistry) {
        let root = self
            .world
            .spawn((
                CarRoot,
                Transform3D { translation: blueprint.root_offset, ..Default::default() },
            ))
            .id();
        for part in &blueprint.parts {
            let mesh_key = format!("fallback::{}", part.name);
            materials.insert(part.material.clone());
            self.world.resource_mut::<MeshLibrary>().insert(mesh_key.clone(), part.mesh.clone());
            self.world.spawn((
                CarPart { name: part.name.clone(), ancestors: Mat4::IDENTITY },
                Transform3D {
                    translation: part.translation,
                    rotation: part.rotation,
                    scale: Vec3::ONE,
                },
                MeshRef(mesh_key),
                MaterialRef(part.material.key.clone()),
                Parent(root),
            ));
        }
    }

    fn spawn_loaded_car(
        &mut self,
        import: crate::mesh::VehicleImport,
        scale: f32,
        materials: &mut MaterialRegistry,
    ) {
        materials.register_import(&import);
        let baseline = self.world.resource::<IdleMotion>().baseline;
        let root = self
            .world
            .spawn((
                CarRoot,
                Transform3D {
                    translation: Vec3::new(0.0, baseline, 0.0),
                    rotation: Quat::IDENTITY,
                    scale: Vec3::splat(scale),
                },
            ))
            .id();
        for part in &import.parts {
            let mesh_key = format!("model::{}", part.name);
            self.world.resource_mut::<MeshLibrary>().insert(mesh_key.clone(), part.mesh.clone());
            let material_key =
                part.material.clone().unwrap_or_else(|| DEFAULT_MATERIAL_KEY.to_string());
            self.world.spawn((
                CarPart { name: part.name.clone(), ancestors: part.parent },
                Transform3D {
                    translation: part.rest_translation,
                    rotation: part.rest_rotation,
                    scale: part.rest_scale,
                },
                MeshRef(mesh_key),
                MaterialRef(material_key),
                Parent(root),
            ));
        }
        if !import.clips.is_empty() {
            let mut car_clips = self.world.resource_mut::<CarClips>();
            car_clips.clips = import.clips;
            car_clips.time = 0.0;
        }
    }

    pub fn ground_material_definition() -> MaterialDefinition {
        MaterialDefinition {
            key: GROUND_MATERIAL_KEY.to_string(),
            label: "Ground".to_string(),
            base_color_factor: [0.1, 0.1, 0.1, 0.5],
            metallic_factor: 0.0,
            roughness_factor: 0.9,
            emissive_factor: [0.0, 0.0, 0.0],
            transparent: true,
            base_color_texture: None,
        }
    }

    // ----- Interaction dispatcher mutations -----

    /// `rotate` action: flips the persisted preference.
    pub fn toggle_auto_rotate(&mut self) -> bool {
        let mut state = self.world.resource_mut::<AnimationState>();
        state.auto_rotate = !state.auto_rotate;
        state.auto_rotate
    }

    /// `lights` action. Disabling drives intensities to zero and captures
    /// each light's pre-toggle base lazily; enabling restores the captured
    /// magnitude, not whatever the pulse last wrote.
    pub fn toggle_lights(&mut self) -> bool {
        let lights_on = {
            let mut state = self.world.resource_mut::<AnimationState>();
            state.lights_on = !state.lights_on;
            state.lights_on
        };
        let mut query = self.world.query::<&mut Light>();
        for mut light in query.iter_mut(&mut self.world) {
            if !light.switchable {
                continue;
            }
            if lights_on {
                let restored = light.stored_base.unwrap_or(light.base_intensity);
                light.base_intensity = restored;
                light.intensity = restored;
            } else {
                if light.stored_base.is_none() {
                    light.stored_base = Some(light.base_intensity);
                }
                light.base_intensity = 0.0;
                light.intensity = 0.0;
            }
        }
        lights_on
    }

    /// `doors` action: enter driving mode with an exact return snapshot, or
    /// leave it by restoring that snapshot verbatim.
    pub fn toggle_driving(&mut self, elapsed: f32) -> bool {
        let Some(root) = self.car_root() else {
            return false;
        };
        let currently_driving = self.world.resource::<AnimationState>().driving;
        if currently_driving {
            let pose = {
                let mut state = self.world.resource_mut::<AnimationState>();
                state.driving = false;
                state.drive_entered_at = None;
                state.return_pose.take()
            };
            if let (Some(pose), Some(mut transform)) = (pose, self.world.get_mut::<Transform3D>(root)) {
                *transform = pose.into();
            }
            false
        } else {
            let snapshot = self.world.get::<Transform3D>(root).copied().map(Pose::from);
            let mut state = self.world.resource_mut::<AnimationState>();
            state.driving = true;
            state.drive_entered_at = Some(elapsed);
            state.return_pose = snapshot;
            true
        }
    }

    // ----- Extraction -----

    pub fn collect_mesh_draws(&mut self) -> Vec<MeshDrawInfo> {
        let mut draws = Vec::new();
        let mut parts = self
            .world
            .query::<(&Transform3D, &MeshRef, &MaterialRef, Option<&CarPart>, Option<&Parent>)>();
        for (transform, mesh, material, car_part, parent) in parts.iter(&self.world) {
            let assembly = parent
                .and_then(|link| self.world.get::<Transform3D>(link.0))
                .map(|root| root.matrix())
                .unwrap_or(Mat4::IDENTITY);
            let model = match car_part {
                Some(part) => assembly * part.ancestors * transform.matrix(),
                None => assembly * transform.matrix(),
            };
            draws.push(MeshDrawInfo {
                mesh_key: mesh.0.clone(),
                material_key: material.0.clone(),
                model,
            });
        }
        draws
    }

    pub fn collect_lights(&mut self) -> LightsSnapshot {
        let mut snapshot = LightsSnapshot::default();
        let mut query = self.world.query::<(&Transform3D, &Light)>();
        for (transform, light) in query.iter(&self.world) {
            match light.kind {
                LightKind::Ambient => {
                    snapshot.ambient = light.color * light.intensity;
                }
                LightKind::Directional { direction } => {
                    snapshot.key_direction = direction;
                    snapshot.key_color = light.color * light.intensity;
                }
                LightKind::Point => {
                    if (snapshot.point_count as usize) < snapshot.points.len() {
                        snapshot.points[snapshot.point_count as usize] = PointLightInfo {
                            position: transform.translation,
                            color: light.color,
                            intensity: light.intensity,
                            range: light.range,
                        };
                        snapshot.point_count += 1;
                    }
                }
                LightKind::Spot { direction, angle, penumbra } => {
                    snapshot.spot = Some(SpotLightInfo {
                        position: transform.translation,
                        direction,
                        color: light.color,
                        intensity: light.intensity,
                        angle,
                        penumbra,
                    });
                }
            }
        }
        snapshot
    }

    pub fn car_position(&mut self) -> Option<Vec3> {
        let root = self.car_root()?;
        self.world.get::<Transform3D>(root).map(|t| t.translation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fallback::build_fallback_car;

    fn test_stage() -> Stage {
        Stage::new(&AppConfig::default())
    }

    #[test]
    fn bootstrap_builds_the_light_rig_once() {
        let mut stage = test_stage();
        let snapshot = stage.collect_lights();
        assert_eq!(snapshot.point_count, 2);
        assert!(snapshot.spot.is_some());
        assert!(snapshot.ambient.length() > 0.0);
        assert!(!stage.has_car(), "car joins only after the load race");
    }

    #[test]
    fn second_car_spawn_is_rejected() {
        let mut stage = test_stage();
        let mut materials = MaterialRegistry::new();
        stage.spawn_car(CarSource::Fallback(build_fallback_car()), 1.0, &mut materials);
        let first_root = stage.car_root().expect("car spawned");
        stage.spawn_car(CarSource::Fallback(build_fallback_car()), 1.0, &mut materials);
        let mut roots = stage.world.query_filtered::<Entity, With<CarRoot>>();
        assert_eq!(roots.iter(&stage.world).count(), 1, "exactly one car entity may exist");
        assert_eq!(stage.car_root(), Some(first_root));
    }

    #[test]
    fn lights_toggle_round_trips_exactly() {
        let mut stage = test_stage();
        let before: Vec<(String, f32)> = {
            let mut query = stage.world.query::<&Light>();
            query
                .iter(&stage.world)
                .filter(|light| light.switchable)
                .map(|light| (light.name.to_string(), light.base_intensity))
                .collect()
        };
        assert!(!stage.toggle_lights());
        {
            let mut query = stage.world.query::<&Light>();
            for light in query.iter(&stage.world).filter(|light| light.switchable) {
                assert_eq!(light.intensity, 0.0);
            }
        }
        assert!(stage.toggle_lights());
        let mut query = stage.world.query::<&Light>();
        for light in query.iter(&stage.world).filter(|light| light.switchable) {
            let (_, original) = before
                .iter()
                .find(|(name, _)| name == light.name)
                .expect("light survives the toggle");
            assert_eq!(light.base_intensity, *original, "{} must restore exactly", light.name);
        }
    }

    #[test]
    fn driving_toggle_restores_the_exact_snapshot() {
        let mut stage = test_stage();
        let mut materials = MaterialRegistry::new();
        stage.spawn_car(CarSource::Fallback(build_fallback_car()), 1.0, &mut materials);
        let root = stage.car_root().expect("car root");
        let before = *stage.world.get::<Transform3D>(root).expect("car transform");

        assert!(stage.toggle_driving(2.5));
        {
            let mut transform = stage.world.get_mut::<Transform3D>(root).expect("car transform");
            transform.translation = Vec3::new(4.2, -0.3, 1.8);
            transform.rotation = Quat::from_rotation_y(1.1);
        }
        assert!(!stage.toggle_driving(9.0));
        let after = *stage.world.get::<Transform3D>(root).expect("car transform");
        assert_eq!(after, before, "exit must restore the entry snapshot, not an animated return");
    }

    #[test]
    fn driving_toggle_without_a_car_is_a_no_op() {
        let mut stage = test_stage();
        assert!(!stage.toggle_driving(1.0));
        assert!(!stage.world.resource::<AnimationState>().driving);
    }
}
