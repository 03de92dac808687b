mod compile;
mod gpu;
mod panel;
mod registry;
mod types;
mod window;

pub use types::{EffectParams, RendererConfig};
pub use window::run_windowed;
