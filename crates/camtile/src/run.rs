use anyhow::Result;
use renderer::{EffectParams, RendererConfig};
use tracing_subscriber::EnvFilter;

use crate::cli::Cli;
use crate::config::{config_file, AppConfig};

pub fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

pub fn run(cli: Cli) -> Result<()> {
    let config_path = config_file(cli.config.as_deref());
    let mut config = AppConfig::load_or_default(&config_path)?;
    config.apply_cli(&cli);
    tracing::debug!(config = %config_path.display(), "resolved configuration");

    if cli.print_config {
        print!("{}", config.to_toml()?);
        return Ok(());
    }

    let renderer_config = renderer_config_from(&config);
    tracing::info!(
        webcam = renderer_config.params.use_webcam,
        camera = renderer_config.camera_index,
        "starting camtile"
    );
    renderer::run_windowed(renderer_config)
}

fn renderer_config_from(config: &AppConfig) -> RendererConfig {
    let width = config.window.width.max(1);
    let height = config.window.height.max(1);

    let mut params = EffectParams::for_window_height(height);
    if let Some(tile_size) = config.params.tile_size {
        params.tile_size_px = tile_size;
    }
    if let Some(scale) = config.params.scale {
        params.scale = scale;
    }
    if let Some(rotation) = config.params.rotation {
        params.rotation_deg = rotation;
    }
    params.use_webcam = config.source.image.is_none();

    RendererConfig {
        surface_size: (width, height),
        shader_source: config.source.shader.clone(),
        target_fps: config.window.fps,
        params,
        camera_index: config.source.camera_index,
        initial_image: config.source.image.clone(),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn defaults_start_in_webcam_mode() {
        let config = AppConfig::default();
        let renderer_config = renderer_config_from(&config);
        assert!(renderer_config.params.use_webcam);
        assert!(renderer_config.initial_image.is_none());
        assert_eq!(renderer_config.surface_size, (1280, 720));
    }

    #[test]
    fn a_configured_image_switches_the_startup_mode() {
        let mut config = AppConfig::default();
        config.source.image = Some(PathBuf::from("/tmp/photo.png"));

        let renderer_config = renderer_config_from(&config);
        assert!(!renderer_config.params.use_webcam);
        assert_eq!(
            renderer_config.initial_image,
            Some(PathBuf::from("/tmp/photo.png"))
        );
    }

    #[test]
    fn parameter_overrides_replace_the_derived_defaults() {
        let mut config = AppConfig::default();
        config.params.tile_size = Some(24);
        config.params.scale = Some(0.5);
        config.params.rotation = Some(15);

        let params = renderer_config_from(&config).params;
        assert_eq!(params.tile_size_px, 24);
        assert_eq!(params.scale, 0.5);
        assert_eq!(params.rotation_deg, 15);
    }
}
