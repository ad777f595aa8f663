//! Viewer settings.
//!
//! Every value has a default, so a config file only needs to name what it changes. The file is
//! JSON and is looked up at `$MESHVIEW_CONFIG`, or `meshview/config.json` inside the platform
//! config directory.

use std::path::{Path, PathBuf};

use glam::{Vec3, Vec4};
use serde::Deserialize;

use crate::abs::ShaderSources;

pub const CONFIG_ENV: &str = "MESHVIEW_CONFIG";

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct WindowConfig {
    pub title: String,
    pub width: u32,
    pub height: u32,
    /// Requested OpenGL core profile version, major then minor.
    pub gl_version: [u8; 2],
    /// Multisample count, 0 disables multisampling.
    pub samples: u8,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            title: "OpenGL Scene".to_string(),
            width: 512,
            height: 512,
            gl_version: [4, 6],
            samples: 4,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct CameraConfig {
    /// Vertical field of view in radians.
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    /// Distance from the camera to the object along Z.
    pub distance: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            fov: std::f32::consts::FRAC_PI_2,
            near: 0.1,
            far: 2000.0,
            distance: 5.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct AnimationConfig {
    /// Rotation about the Y axis applied every frame, in radians.
    pub rotation_step: f32,
    pub frame_delay_ms: u64,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            rotation_step: 0.0174533,
            frame_delay_ms: 10,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub clear_color: [f32; 4],
    pub light_dir: [f32; 3],
}

impl RenderConfig {
    pub fn clear_color(&self) -> Vec4 {
        Vec4::from_array(self.clear_color)
    }

    pub fn light_dir(&self) -> Vec3 {
        Vec3::from_array(self.light_dir).normalize_or(Vec3::Y)
    }
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            clear_color: [0.2, 0.3, 0.3, 1.0],
            light_dir: [0.3, 1.0, 0.5],
        }
    }
}

#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct ShaderConfig {
    pub vertex: PathBuf,
    pub geometry: Option<PathBuf>,
    pub fragment: PathBuf,
}

impl ShaderConfig {
    pub fn sources(&self) -> ShaderSources {
        ShaderSources::new(&self.vertex, self.geometry.clone(), &self.fragment)
    }
}

impl Default for ShaderConfig {
    fn default() -> Self {
        Self {
            vertex: PathBuf::from("shaders/vertex.glsl"),
            geometry: None,
            fragment: PathBuf::from("shaders/fragment.glsl"),
        }
    }
}

/// All viewer settings.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct ViewerConfig {
    pub window: WindowConfig,
    pub camera: CameraConfig,
    pub animation: AnimationConfig,
    pub render: RenderConfig,
    pub shaders: ShaderConfig,
}

impl ViewerConfig {
    /// Parses settings from a JSON document.
    pub fn from_json(s: &str) -> Result<Self, String> {
        serde_json::from_str(s).map_err(|e| e.to_string())
    }

    /// Where the config file is looked up, if anywhere.
    pub fn default_path() -> Option<PathBuf> {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) => Some(PathBuf::from(path)),
            None => dirs::config_dir().map(|dir| dir.join("meshview").join("config.json")),
        }
    }

    /// Loads settings from `path`. A missing file gives the defaults.
    pub fn load(path: &Path) -> Result<Self, String> {
        match std::fs::read_to_string(path) {
            Ok(contents) => {
                Self::from_json(&contents).map_err(|e| format!("{}: {}", path.display(), e))
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config at {}, using defaults", path.display());
                Ok(Self::default())
            }
            Err(e) => Err(format!("{}: {}", path.display(), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ViewerConfig::default();
        assert_eq!(config.window.width, 512);
        assert_eq!(config.window.gl_version, [4, 6]);
        assert_eq!(config.camera.far, 2000.0);
        assert_eq!(config.shaders.geometry, None);
        assert_eq!(config.shaders.sources().stages().len(), 2);
    }

    #[test]
    fn test_partial_json() {
        let config = ViewerConfig::from_json(
            r#"{ "window": { "title": "Bunny" }, "shaders": { "geometry": "shaders/wire.geom" } }"#,
        )
        .unwrap();
        assert_eq!(config.window.title, "Bunny");
        assert_eq!(config.window.height, 512);
        assert_eq!(
            config.shaders.geometry,
            Some(PathBuf::from("shaders/wire.geom"))
        );
        assert_eq!(config.shaders.vertex, PathBuf::from("shaders/vertex.glsl"));
        assert_eq!(config.animation, AnimationConfig::default());
    }

    #[test]
    fn test_malformed_json() {
        assert!(ViewerConfig::from_json("{ \"window\": 3 }").is_err());
        assert!(ViewerConfig::from_json("not json").is_err());
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let config = ViewerConfig::load(Path::new("no/such/meshview.json")).unwrap();
        assert_eq!(config, ViewerConfig::default());
    }

    #[test]
    fn test_light_dir_normalized() {
        let render = RenderConfig {
            light_dir: [0.0, 2.0, 0.0],
            ..Default::default()
        };
        assert_eq!(render.light_dir(), Vec3::Y);

        let render = RenderConfig {
            light_dir: [0.0; 3],
            ..Default::default()
        };
        assert_eq!(render.light_dir(), Vec3::Y);
    }
}
