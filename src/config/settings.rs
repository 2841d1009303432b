use std::fs;
use std::path::{Path, PathBuf};

use cgmath::{Deg, Point3, Vector3};
use log::info;
use serde::Deserialize;

use crate::scene_pkg::texture::TextureSlot;

pub const DEFAULT_CONFIG_FILE: &str = "lumen.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config value: {0}")]
    Invalid(String),
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for WindowConfig {
    fn default() -> Self {
        WindowConfig {
            width: 1280,
            height: 720,
            title: "Lumen".to_string(),
        }
    }
}

/// Assets loaded at start-up. Every path is optional.
#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct SceneConfig {
    pub model: Option<PathBuf>,
    pub albedo: Option<PathBuf>,
    pub normal: Option<PathBuf>,
    pub metallic: Option<PathBuf>,
    pub roughness: Option<PathBuf>,
    pub ao: Option<PathBuf>,
}

impl SceneConfig {
    pub fn textures(&self) -> impl Iterator<Item = (TextureSlot, &Path)> {
        let paths = [&self.albedo, &self.normal, &self.metallic, &self.roughness, &self.ao];
        TextureSlot::ALL
            .into_iter()
            .zip(paths)
            .filter_map(|(slot, path)| path.as_deref().map(|path| (slot, path)))
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct CameraConfig {
    pub position: [f32; 3],
    pub front: [f32; 3],
    pub world_up: [f32; 3],
    pub mouse_sensitivity: f32,
    pub movement_speed: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        CameraConfig {
            position: [0.0, 0.0, 3.0],
            front: [0.0, 0.0, -1.0],
            world_up: [0.0, 1.0, 0.0],
            mouse_sensitivity: 0.1,
            movement_speed: 2.5,
        }
    }
}

impl CameraConfig {
    pub fn position(&self) -> Point3<f32> {
        self.position.into()
    }

    pub fn front(&self) -> Vector3<f32> {
        self.front.into()
    }

    pub fn world_up(&self) -> Vector3<f32> {
        self.world_up.into()
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProjectionConfig {
    pub fov_degrees: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for ProjectionConfig {
    fn default() -> Self {
        ProjectionConfig {
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
        }
    }
}

impl ProjectionConfig {
    pub fn fov(&self) -> Deg<f32> {
        Deg(self.fov_degrees)
    }
}

/// Rates of the continuous controls, all per second of frame time.
#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlsConfig {
    /// degrees per second
    pub rotate_speed: f32,
    pub translate_speed: f32,
    /// fraction of the current scale per second
    pub zoom_rate: f32,
    pub light_speed: f32,
    /// degrees per second of spot cone widening
    pub cone_speed: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        ControlsConfig {
            rotate_speed: 90.0,
            translate_speed: 1.5,
            zoom_rate: 0.5,
            light_speed: 2.0,
            cone_speed: 20.0,
        }
    }
}

#[derive(Clone, Debug, Default, Deserialize, PartialEq)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub scene: SceneConfig,
    pub camera: CameraConfig,
    pub projection: ProjectionConfig,
    pub controls: ControlsConfig,
}

impl ViewerConfig {
    /// Loads the file named on the command line, else `lumen.toml` when it
    /// exists in the working directory, else the built-in defaults.
    pub fn load(cli_path: Option<PathBuf>) -> Result<ViewerConfig, ConfigError> {
        match cli_path {
            Some(path) => ViewerConfig::from_file(&path),
            None if Path::new(DEFAULT_CONFIG_FILE).is_file() => {
                ViewerConfig::from_file(Path::new(DEFAULT_CONFIG_FILE))
            }
            None => {
                info!("no {} found, using default settings", DEFAULT_CONFIG_FILE);
                Ok(ViewerConfig::default())
            }
        }
    }

    pub fn from_file(path: &Path) -> Result<ViewerConfig, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config: ViewerConfig = toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        info!("settings loaded from {}", path.display());
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let projection = &self.projection;
        if !(projection.fov_degrees > 0.0 && projection.fov_degrees < 180.0) {
            return Err(ConfigError::Invalid(format!(
                "projection.fov_degrees must be in (0, 180), got {}",
                projection.fov_degrees
            )));
        }
        if !(projection.near > 0.0 && projection.far > projection.near) {
            return Err(ConfigError::Invalid(format!(
                "projection needs 0 < near < far, got near {} far {}",
                projection.near, projection.far
            )));
        }
        if self.window.width == 0 || self.window.height == 0 {
            return Err(ConfigError::Invalid("window size must be non-zero".into()));
        }
        let controls = &self.controls;
        if !(controls.zoom_rate >= 0.0 && controls.zoom_rate < 1.0) {
            return Err(ConfigError::Invalid(format!(
                "controls.zoom_rate must be in [0, 1), got {}",
                controls.zoom_rate
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let config: ViewerConfig = toml::from_str("").unwrap();
        assert_eq!(config, ViewerConfig::default());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: ViewerConfig = toml::from_str(
            r#"
[window]
title = "bust"

[scene]
model = "assets/bust.obj"
albedo = "assets/albedo.png"
roughness = "assets/roughness.png"

[camera]
position = [0.0, 1.0, 5.0]

[projection]
fov_degrees = 60.0
"#,
        )
        .unwrap();

        assert_eq!(config.window.title, "bust");
        assert_eq!(config.window.width, 1280);
        assert_eq!(config.camera.position(), Point3::new(0.0, 1.0, 5.0));
        assert_eq!(config.camera.movement_speed, 2.5);
        assert_eq!(config.projection.fov(), Deg(60.0));
        assert_eq!(config.projection.far, 100.0);

        let textures: Vec<TextureSlot> = config.scene.textures().map(|(slot, _)| slot).collect();
        assert_eq!(textures, vec![TextureSlot::Albedo, TextureSlot::Roughness]);
    }

    #[test]
    fn inverted_clip_planes_are_rejected() {
        let config: ViewerConfig = toml::from_str("[projection]\nnear = 10.0\nfar = 1.0\n").unwrap();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn file_errors_name_the_path() {
        let missing = Path::new("/no/such/lumen.toml");
        let err = ViewerConfig::from_file(missing).unwrap_err();
        assert!(err.to_string().contains("/no/such/lumen.toml"));

        let path = std::env::temp_dir().join(format!("lumen-config-{}.toml", std::process::id()));
        fs::write(&path, "[window\nwidth = 3").unwrap();
        assert!(matches!(ViewerConfig::from_file(&path), Err(ConfigError::Parse { .. })));
        fs::remove_file(&path).ok();
    }
}
