use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::cli::Cli;

/// On-disk configuration (`camtile.toml`), layered under the CLI flags:
/// missing sections fall back to defaults, and every CLI flag overrides
/// its config counterpart.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub window: WindowSection,
    pub source: SourceSection,
    pub params: ParamsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSection {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f32>,
}

impl Default for WindowSection {
    fn default() -> Self {
        Self {
            width: 1280,
            height: 720,
            fps: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceSection {
    pub camera_index: u32,
    pub image: Option<PathBuf>,
    pub shader: Option<PathBuf>,
}

/// Startup parameter overrides; anything unset is derived from the
/// window size at launch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParamsSection {
    pub tile_size: Option<u32>,
    pub scale: Option<f32>,
    pub rotation: Option<u32>,
}

impl AppConfig {
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("failed to read config file at {}", path.display()))?;
            let config: Self = toml::from_str(&contents)
                .with_context(|| format!("failed to parse config file at {}", path.display()))?;
            Ok(config)
        } else {
            Ok(Self::default())
        }
    }

    pub fn apply_cli(&mut self, cli: &Cli) {
        if let Some((width, height)) = cli.size {
            self.window.width = width;
            self.window.height = height;
        }
        if let Some(fps) = cli.fps {
            self.window.fps = Some(fps);
        }
        if let Some(camera) = cli.camera {
            self.source.camera_index = camera;
        }
        if let Some(image) = &cli.image {
            self.source.image = Some(image.clone());
        }
        if let Some(shader) = &cli.shader {
            self.source.shader = Some(shader.clone());
        }
        if let Some(tile_size) = cli.tile_size {
            self.params.tile_size = Some(tile_size);
        }
        if let Some(scale) = cli.scale {
            self.params.scale = Some(scale);
        }
        if let Some(rotation) = cli.rotation {
            self.params.rotation = Some(rotation);
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize configuration to TOML")
    }
}

/// Resolves the config file path: an explicit `--config` wins, then the
/// `CAMTILE_CONFIG_DIR` override, then the platform config dir.
pub fn config_file(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(dir) = env::var("CAMTILE_CONFIG_DIR") {
        return PathBuf::from(dir).join("camtile.toml");
    }
    directories_next::ProjectDirs::from("", "", "camtile")
        .map(|dirs| dirs.config_dir().join("camtile.toml"))
        .unwrap_or_else(|| PathBuf::from("camtile.toml"))
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[test]
    fn missing_file_yields_defaults() {
        let dir = tempfile::TempDir::new().unwrap();
        let config = AppConfig::load_or_default(&dir.path().join("camtile.toml")).unwrap();
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.window.width, 1280);
    }

    #[test]
    fn partial_files_fall_back_per_section() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("camtile.toml");
        fs::write(&path, "[params]\ntile_size = 12\n").unwrap();

        let config = AppConfig::load_or_default(&path).unwrap();
        assert_eq!(config.params.tile_size, Some(12));
        assert_eq!(config.window.height, 720);
        assert_eq!(config.source.camera_index, 0);
    }

    #[test]
    fn cli_flags_override_the_file() {
        let mut config = AppConfig::default();
        config.params.tile_size = Some(12);
        config.window.fps = Some(30.0);

        let cli = Cli::parse_from([
            "camtile",
            "--tile-size",
            "24",
            "--camera",
            "1",
            "--size",
            "800x600",
        ]);
        config.apply_cli(&cli);

        assert_eq!(config.params.tile_size, Some(24));
        assert_eq!(config.source.camera_index, 1);
        assert_eq!((config.window.width, config.window.height), (800, 600));
        assert_eq!(config.window.fps, Some(30.0), "untouched flags survive");
    }

    #[test]
    fn config_round_trips_through_toml() {
        let mut config = AppConfig::default();
        config.params.rotation = Some(10);
        config.source.image = Some(PathBuf::from("/tmp/photo.jpg"));

        let rendered = config.to_toml().unwrap();
        let parsed: AppConfig = toml::from_str(&rendered).unwrap();
        assert_eq!(parsed, config);
    }
}
