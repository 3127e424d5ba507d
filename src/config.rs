use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Deserialize)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    pub vsync: bool,
    pub fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self { title: "Showroom".to_string(), width: 1280, height: 720, vsync: true, fullscreen: false }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    #[serde(default = "ModelConfig::default_path")]
    pub path: String,
    /// Deadline for the load race before the procedural car takes over.
    #[serde(default = "ModelConfig::default_timeout_seconds")]
    pub timeout_seconds: f32,
    #[serde(default = "ModelConfig::default_scale")]
    pub scale: f32,
    #[serde(default)]
    pub force_fallback: bool,
}

impl ModelConfig {
    fn default_path() -> String {
        "assets/models/showcar.glb".to_string()
    }

    const fn default_timeout_seconds() -> f32 {
        4.0
    }

    const fn default_scale() -> f32 {
        1.5
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            path: Self::default_path(),
            timeout_seconds: Self::default_timeout_seconds(),
            scale: Self::default_scale(),
            force_fallback: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CameraConfig {
    #[serde(default = "CameraConfig::default_fov_degrees")]
    pub fov_degrees: f32,
    #[serde(default = "CameraConfig::default_min_distance")]
    pub min_distance: f32,
    #[serde(default = "CameraConfig::default_max_distance")]
    pub max_distance: f32,
    #[serde(default = "CameraConfig::default_damping")]
    pub damping: f32,
    /// Matches the conventional orbit-control scale: 2.0 is one revolution
    /// every 30 seconds.
    #[serde(default = "CameraConfig::default_auto_rotate_speed")]
    pub auto_rotate_speed: f32,
}

impl CameraConfig {
    const fn default_fov_degrees() -> f32 {
        75.0
    }

    const fn default_min_distance() -> f32 {
        3.0
    }

    const fn default_max_distance() -> f32 {
        15.0
    }

    const fn default_damping() -> f32 {
        0.05
    }

    const fn default_auto_rotate_speed() -> f32 {
        2.0
    }
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov_degrees: Self::default_fov_degrees(),
            min_distance: Self::default_min_distance(),
            max_distance: Self::default_max_distance(),
            damping: Self::default_damping(),
            auto_rotate_speed: Self::default_auto_rotate_speed(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct StageConfig {
    #[serde(default = "StageConfig::default_background")]
    pub background: [f32; 3],
    #[serde(default = "StageConfig::default_fog_near")]
    pub fog_near: f32,
    #[serde(default = "StageConfig::default_fog_far")]
    pub fog_far: f32,
    #[serde(default = "StageConfig::default_ground_extent")]
    pub ground_extent: f32,
    #[serde(default = "StageConfig::default_ground_height")]
    pub ground_height: f32,
    #[serde(default = "StageConfig::default_particle_count")]
    pub particle_count: u32,
    /// Optional equirectangular backdrop image; the generated showroom
    /// gradient is used when absent.
    #[serde(default)]
    pub backdrop: Option<String>,
}

impl StageConfig {
    const fn default_background() -> [f32; 3] {
        [0.039, 0.039, 0.039]
    }

    const fn default_fog_near() -> f32 {
        50.0
    }

    const fn default_fog_far() -> f32 {
        200.0
    }

    const fn default_ground_extent() -> f32 {
        200.0
    }

    const fn default_ground_height() -> f32 {
        -2.0
    }

    const fn default_particle_count() -> u32 {
        50
    }
}

impl Default for StageConfig {
    fn default() -> Self {
        Self {
            background: Self::default_background(),
            fog_near: Self::default_fog_near(),
            fog_far: Self::default_fog_far(),
            ground_extent: Self::default_ground_extent(),
            ground_height: Self::default_ground_height(),
            particle_count: Self::default_particle_count(),
            backdrop: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DriveVariant {
    #[default]
    FigureEight,
    StraightSweep,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DriveConfig {
    #[serde(default)]
    pub variant: DriveVariant,
    #[serde(default = "DriveConfig::default_radius")]
    pub radius: f32,
    #[serde(default = "DriveConfig::default_speed")]
    pub speed: f32,
}

impl DriveConfig {
    const fn default_radius() -> f32 {
        6.0
    }

    const fn default_speed() -> f32 {
        0.6
    }
}

impl Default for DriveConfig {
    fn default() -> Self {
        Self { variant: DriveVariant::default(), radius: Self::default_radius(), speed: Self::default_speed() }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReflectionConfig {
    /// Minimum interval between probe refreshes, independent of frame rate.
    #[serde(default = "ReflectionConfig::default_interval_seconds")]
    pub interval_seconds: f32,
    #[serde(default = "ReflectionConfig::default_resolution")]
    pub resolution: u32,
}

impl ReflectionConfig {
    const fn default_interval_seconds() -> f32 {
        0.5
    }

    const fn default_resolution() -> u32 {
        32
    }
}

impl Default for ReflectionConfig {
    fn default() -> Self {
        Self { interval_seconds: Self::default_interval_seconds(), resolution: Self::default_resolution() }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub window: WindowConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub camera: CameraConfig,
    #[serde(default)]
    pub stage: StageConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub reflection: ReflectionConfig,
}

#[derive(Debug, Clone, Default)]
pub struct AppConfigOverrides {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub vsync: Option<bool>,
    pub model_path: Option<String>,
    pub force_fallback: Option<bool>,
}

impl AppConfig {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes =
            fs::read(path).with_context(|| format!("Failed to read config file {}", path.display()))?;
        let cfg = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        Ok(cfg)
    }

    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        match Self::load(path) {
            Ok(cfg) => cfg,
            Err(err) => {
                eprintln!("Config load error: {err:?}. Falling back to defaults.");
                Self::default()
            }
        }
    }

    pub fn apply_overrides(&mut self, overrides: &AppConfigOverrides) {
        if let Some(width) = overrides.width {
            self.window.width = width;
        }
        if let Some(height) = overrides.height {
            self.window.height = height;
        }
        if let Some(vsync) = overrides.vsync {
            self.window.vsync = vsync;
        }
        if let Some(path) = overrides.model_path.as_ref() {
            self.model.path = path.clone();
        }
        if let Some(force) = overrides.force_fallback {
            self.model.force_fallback = force;
        }
    }
}

impl AppConfigOverrides {
    pub fn is_empty(&self) -> bool {
        self.width.is_none()
            && self.height.is_none()
            && self.vsync.is_none()
            && self.model_path.is_none()
            && self.force_fallback.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults_match_showroom_stage() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.window.width, 1280);
        assert_eq!(cfg.camera.fov_degrees, 75.0);
        assert_eq!(cfg.camera.min_distance, 3.0);
        assert_eq!(cfg.camera.max_distance, 15.0);
        assert_eq!(cfg.stage.particle_count, 50);
        assert_eq!(cfg.drive.variant, DriveVariant::FigureEight);
        assert!(cfg.model.timeout_seconds >= 3.0 && cfg.model.timeout_seconds <= 5.0);
    }

    #[test]
    fn partial_config_fills_missing_sections() {
        let dir = tempfile::tempdir().expect("temp dir");
        let path = dir.path().join("app.json");
        let mut file = fs::File::create(&path).expect("create config");
        write!(
            file,
            "{}",
            r#"{"window":{"title":"Demo","width":800,"height":600,"vsync":false,"fullscreen":false},
                "model":{"path":"custom.glb"}}"#
        )
        .expect("write config");

        let cfg = AppConfig::load(&path).expect("load config");
        assert_eq!(cfg.window.width, 800);
        assert_eq!(cfg.model.path, "custom.glb");
        assert_eq!(cfg.model.scale, 1.5);
        assert_eq!(cfg.reflection.interval_seconds, 0.5);
    }

    #[test]
    fn overrides_layer_on_top() {
        let mut cfg = AppConfig::default();
        let overrides = AppConfigOverrides {
            width: Some(1920),
            vsync: Some(false),
            model_path: Some("other.glb".to_string()),
            force_fallback: Some(true),
            ..Default::default()
        };
        cfg.apply_overrides(&overrides);
        assert_eq!(cfg.window.width, 1920);
        assert_eq!(cfg.window.height, 720);
        assert!(!cfg.window.vsync);
        assert_eq!(cfg.model.path, "other.glb");
        assert!(cfg.model.force_fallback);
    }
}
