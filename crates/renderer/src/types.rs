use std::path::PathBuf;

/// Widget bounds for the tile-size control, in pixels.
pub(crate) const TILE_SIZE_MIN: u32 = 2;
pub(crate) const TILE_SIZE_MAX: u32 = 50;

/// Widget bounds for the zoom control.
pub(crate) const SCALE_MAX: f32 = 2.0;
pub(crate) const SCALE_STEP: f64 = 0.1;

/// Widget bound for the rotation control, in degrees.
pub(crate) const ROTATION_MAX_DEG: u32 = 20;

const DEFAULT_SCALE: f32 = 1.5;
const DEFAULT_TILE_FRACTION: f32 = 0.06;

/// The mutable parameter set behind the control panel.
///
/// Ranges are enforced by the panel widgets, not re-validated here.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EffectParams {
    /// Tile edge length in pixels, 2-50.
    pub tile_size_px: u32,
    /// Sample zoom factor, 0.0-2.0.
    pub scale: f32,
    /// Rotation of the tile grid in degrees, 0-20.
    pub rotation_deg: u32,
    /// Whether the webcam supplies pixels (as opposed to a loaded image).
    pub use_webcam: bool,
}

impl EffectParams {
    /// Builds the startup parameter set for a window of the given height.
    pub fn for_window_height(height: u32) -> Self {
        Self {
            tile_size_px: default_tile_size(height),
            scale: DEFAULT_SCALE,
            rotation_deg: 0,
            use_webcam: true,
        }
    }
}

/// The default tile size tracks the window: 6% of its height, kept
/// inside the widget bounds.
pub(crate) fn default_tile_size(window_height: u32) -> u32 {
    let tile = (DEFAULT_TILE_FRACTION * window_height as f32).floor() as u32;
    tile.clamp(TILE_SIZE_MIN, TILE_SIZE_MAX)
}

/// Immutable configuration passed to the renderer at start-up.
#[derive(Debug, Clone)]
pub struct RendererConfig {
    /// Initial window size in physical pixels; the surface is resized to
    /// the source's aspect ratio as soon as one is adopted.
    pub surface_size: (u32, u32),
    /// Fragment shader to load instead of the bundled mosaic effect.
    pub shader_source: Option<PathBuf>,
    /// Optional FPS cap; `None` renders every display frame.
    pub target_fps: Option<f32>,
    /// Startup parameter values for the control panel.
    pub params: EffectParams,
    /// OS camera index used whenever the webcam is (re)activated.
    pub camera_index: u32,
    /// When set, start in image mode with this file instead of the webcam.
    pub initial_image: Option<PathBuf>,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            surface_size: (1280, 720),
            shader_source: None,
            target_fps: None,
            params: EffectParams::for_window_height(720),
            camera_index: 0,
            initial_image: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_tile_size_tracks_window_height() {
        assert_eq!(default_tile_size(800), 48);
        assert_eq!(default_tile_size(500), 30);
    }

    #[test]
    fn default_tile_size_is_clamped_to_widget_bounds() {
        assert_eq!(default_tile_size(2000), TILE_SIZE_MAX);
        assert_eq!(default_tile_size(10), TILE_SIZE_MIN);
        assert_eq!(default_tile_size(0), TILE_SIZE_MIN);
    }

    #[test]
    fn startup_params_default_to_webcam() {
        let params = EffectParams::for_window_height(720);
        assert!(params.use_webcam);
        assert_eq!(params.scale, 1.5);
        assert_eq!(params.rotation_deg, 0);
        assert_eq!(params.tile_size_px, 43);
    }
}
