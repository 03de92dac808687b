mod context;
mod pipeline;
mod source;
mod state;
mod uniforms;

pub(crate) use state::GpuState;
pub(crate) use uniforms::EffectUniforms;
