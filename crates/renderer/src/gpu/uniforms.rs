use bytemuck::{Pod, Zeroable};

use crate::types::EffectParams;

/// CPU mirror of the std140 effect uniform block.
///
/// The field order must match the block declared in `compile.rs`.
#[repr(C, align(16))]
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) struct EffectUniforms {
    /// Tile edge as a fraction of the surface height.
    pub tile_scale: f32,
    pub scale: f32,
    /// Grid rotation in radians.
    pub rotation: f32,
    pub _padding0: f32,
}

unsafe impl Zeroable for EffectUniforms {}
unsafe impl Pod for EffectUniforms {}

impl EffectUniforms {
    /// Applies the documented parameter transforms: tile size relative
    /// to the surface height, rotation converted to radians, scale
    /// passed through unchanged.
    pub fn from_params(params: &EffectParams, surface_height: u32) -> Self {
        Self {
            tile_scale: params.tile_size_px as f32 / surface_height.max(1) as f32,
            scale: params.scale,
            rotation: (params.rotation_deg as f32).to_radians(),
            _padding0: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(tile_size_px: u32, scale: f32, rotation_deg: u32) -> EffectParams {
        EffectParams {
            tile_size_px,
            scale,
            rotation_deg,
            use_webcam: true,
        }
    }

    #[test]
    fn tile_scale_is_relative_to_surface_height() {
        for tile in [2u32, 10, 25, 50] {
            for height in [480u32, 720, 1080] {
                let uniforms = EffectUniforms::from_params(&params(tile, 1.0, 0), height);
                assert_eq!(uniforms.tile_scale, tile as f32 / height as f32);
            }
        }
    }

    #[test]
    fn rotation_is_converted_to_radians() {
        for degrees in 0..=20u32 {
            let uniforms = EffectUniforms::from_params(&params(10, 1.0, degrees), 720);
            let expected = degrees as f32 * std::f32::consts::PI / 180.0;
            assert!((uniforms.rotation - expected).abs() < 1e-6);
        }
    }

    #[test]
    fn scale_passes_through_unchanged() {
        for step in 0..=20u32 {
            let scale = step as f32 * 0.1;
            let uniforms = EffectUniforms::from_params(&params(10, scale, 0), 720);
            assert_eq!(uniforms.scale, scale);
        }
    }

    #[test]
    fn zero_surface_height_does_not_divide_by_zero() {
        let uniforms = EffectUniforms::from_params(&params(10, 1.0, 0), 0);
        assert!(uniforms.tile_scale.is_finite());
    }

    #[test]
    fn block_size_matches_the_declared_std140_layout() {
        assert_eq!(std::mem::size_of::<EffectUniforms>(), 16);
    }
}
