use std::mem::offset_of;

use tracing::warn;

use crate::gpu::EffectUniforms;

/// Name -> buffer-offset mapping over the effect uniform block.
///
/// Built once after the pipeline is created and read-only afterwards;
/// it would have to be rebuilt if the program were ever rebuilt, which
/// the current startup-only loader never does. Every named uniform push
/// goes through [`UniformRegistry::offset`].
pub(crate) struct UniformRegistry {
    entries: Vec<UniformEntry>,
}

#[derive(Debug, Clone, Copy)]
struct UniformEntry {
    name: &'static str,
    offset: wgpu::BufferAddress,
}

impl UniformRegistry {
    /// Enumerates the uniforms of the effect block in declaration order.
    pub(crate) fn for_effect_block() -> Self {
        Self {
            entries: vec![
                UniformEntry {
                    name: "u_tile_scale",
                    offset: offset_of!(EffectUniforms, tile_scale) as wgpu::BufferAddress,
                },
                UniformEntry {
                    name: "u_scale",
                    offset: offset_of!(EffectUniforms, scale) as wgpu::BufferAddress,
                },
                UniformEntry {
                    name: "u_rotation",
                    offset: offset_of!(EffectUniforms, rotation) as wgpu::BufferAddress,
                },
            ],
        }
    }

    /// Looks up the byte offset for a uniform name. Unknown names are
    /// reported once per call site and otherwise ignored by callers.
    pub(crate) fn offset(&self, name: &str) -> Option<wgpu::BufferAddress> {
        let found = self
            .entries
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.offset);
        if found.is_none() {
            warn!(name, "no such uniform in the effect block");
        }
        found
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_follow_std140_scalar_packing() {
        let registry = UniformRegistry::for_effect_block();
        assert_eq!(registry.offset("u_tile_scale"), Some(0));
        assert_eq!(registry.offset("u_scale"), Some(4));
        assert_eq!(registry.offset("u_rotation"), Some(8));
    }

    #[test]
    fn unknown_names_are_rejected() {
        let registry = UniformRegistry::for_effect_block();
        assert_eq!(registry.offset("u_missing"), None);
    }
}
