use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use capture::{FrameSourceManager, SourceUpdate};
use tracing::{error, info, warn};
use winit::application::ApplicationHandler;
use winit::dpi::{LogicalSize, PhysicalSize};
use winit::event::WindowEvent;
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::window::{Window, WindowId};

use crate::compile;
use crate::gpu::{EffectUniforms, GpuState};
use crate::panel::{ControlPanel, PanelActions};
use crate::types::{EffectParams, RendererConfig};

/// Backing-buffer contribution of the display scale factor is capped so
/// high-density displays do not quadruple the fill cost.
const MAX_BACKING_SCALE: f64 = 2.0;

/// Opens the window and runs the render loop until the window closes.
///
/// This call blocks for the lifetime of the application.
pub fn run_windowed(config: RendererConfig) -> Result<()> {
    let event_loop =
        EventLoop::new().map_err(|err| anyhow!("failed to create event loop: {err}"))?;
    let mut app = App {
        config,
        active: None,
        failure: None,
    };
    event_loop
        .run_app(&mut app)
        .map_err(|err| anyhow!("window event loop error: {err}"))?;

    match app.failure {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

struct App {
    config: RendererConfig,
    active: Option<ActiveState>,
    failure: Option<anyhow::Error>,
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.active.is_some() {
            return;
        }
        match ActiveState::new(event_loop, &self.config) {
            Ok(state) => self.active = Some(state),
            Err(err) => {
                self.failure = Some(err);
                event_loop.exit();
            }
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        window_id: WindowId,
        event: WindowEvent,
    ) {
        let Some(state) = self.active.as_mut() else {
            return;
        };
        if window_id != state.window.id() {
            return;
        }

        if state.panel.on_window_event(&state.window, &event) {
            return;
        }

        match event {
            WindowEvent::CloseRequested | WindowEvent::Destroyed => {
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                state.handle_resize(new_size);
            }
            WindowEvent::RedrawRequested => match state.redraw() {
                Ok(()) => state.pacer.mark_rendered(Instant::now()),
                Err(wgpu::SurfaceError::Lost) | Err(wgpu::SurfaceError::Outdated) => {
                    state.gpu.resize(state.gpu.size());
                }
                Err(wgpu::SurfaceError::OutOfMemory) => {
                    error!("surface out of memory; exiting");
                    event_loop.exit();
                }
                Err(other) => {
                    warn!(error = ?other, "surface error; retrying next frame");
                }
            },
            _ => {}
        }
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        let Some(state) = self.active.as_ref() else {
            return;
        };
        let now = Instant::now();
        if state.pacer.ready_for_frame(now) {
            state.window.request_redraw();
            event_loop.set_control_flow(ControlFlow::Wait);
        } else if let Some(deadline) = state.pacer.next_deadline() {
            event_loop.set_control_flow(ControlFlow::WaitUntil(deadline));
        }
    }
}

/// Everything the running application owns: the window, GPU state, the
/// control panel, the frame source manager, and the shared parameters.
struct ActiveState {
    window: Arc<Window>,
    gpu: GpuState,
    panel: ControlPanel,
    sources: FrameSourceManager,
    params: EffectParams,
    pacer: FramePacer,
    source_aspect: Option<f64>,
}

impl ActiveState {
    fn new(event_loop: &ActiveEventLoop, config: &RendererConfig) -> Result<Self> {
        let size = PhysicalSize::new(config.surface_size.0.max(1), config.surface_size.1.max(1));
        let attributes = Window::default_attributes()
            .with_title("camtile")
            .with_inner_size(size);
        let window = Arc::new(
            event_loop
                .create_window(attributes)
                .map_err(|err| anyhow!("failed to create window: {err}"))?,
        );

        let fragment_source = compile::load_fragment_source(config.shader_source.as_deref())?;
        let params = config.params;
        let inner = window.inner_size();
        let gpu = GpuState::new(
            window.clone(),
            inner,
            &fragment_source,
            &EffectUniforms::from_params(&params, inner.height),
        )?;
        let panel = ControlPanel::new(gpu.device(), gpu.surface_format(), &window);

        let mut sources = FrameSourceManager::new(config.camera_index);
        if let Some(path) = &config.initial_image {
            info!(path = %path.display(), "starting in image mode");
            match std::fs::read(path) {
                Ok(bytes) => sources.load_image(bytes),
                Err(err) => {
                    error!(path = %path.display(), error = %err, "failed to read initial image")
                }
            }
        } else if params.use_webcam {
            sources.activate_webcam();
        }

        Ok(Self {
            window,
            gpu,
            panel,
            sources,
            params,
            pacer: FramePacer::new(config.target_fps),
            source_aspect: None,
        })
    }

    /// One display frame: apply pending source updates, run the panel,
    /// push any changed uniforms, then draw and present.
    fn redraw(&mut self) -> Result<(), wgpu::SurfaceError> {
        for update in self.sources.poll() {
            match update {
                SourceUpdate::SourceChanged { width, height } => self.adopt_source(width, height),
                SourceUpdate::Frame(frame) => self.gpu.upload_frame(&frame),
            }
        }

        let (panel_frame, actions) = self.panel.run(&self.window, &mut self.params);
        self.apply_panel_actions(actions);

        self.gpu.render(&mut self.panel, panel_frame)
    }

    fn apply_panel_actions(&mut self, actions: PanelActions) {
        if let Some(enabled) = actions.webcam_toggled {
            self.sources.set_webcam_enabled(enabled);
        }
        if let Some(path) = actions.image_picked {
            match std::fs::read(&path) {
                Ok(bytes) => self.sources.load_image(bytes),
                Err(err) => {
                    error!(path = %path.display(), error = %err, "failed to read selected image")
                }
            }
        }

        let height = self.gpu.size().height;
        if actions.tile_size_changed {
            self.gpu.set_uniform_f32(
                "u_tile_scale",
                self.params.tile_size_px as f32 / height.max(1) as f32,
            );
        }
        if actions.scale_changed {
            self.gpu.set_uniform_f32("u_scale", self.params.scale);
        }
        if actions.rotation_changed {
            self.gpu
                .set_uniform_f32("u_rotation", (self.params.rotation_deg as f32).to_radians());
        }
    }

    /// Adopts a source's native dimensions: reallocate the texture,
    /// resize surface and window to the source aspect ratio, and re-push
    /// the height-dependent uniforms.
    fn adopt_source(&mut self, width: u32, height: u32) {
        self.gpu.adopt_source(width, height);

        let aspect = width as f64 / height.max(1) as f64;
        self.source_aspect = Some(aspect);

        let scale_factor = self.window.scale_factor();
        let inner = self.window.inner_size();
        let target = surface_size_for_source(inner.height, scale_factor, aspect);
        info!(
            source_width = width,
            source_height = height,
            surface_width = target.width,
            surface_height = target.height,
            "resizing to source aspect ratio"
        );
        self.gpu.resize(target);
        self.push_all_uniforms();

        let logical_height = inner.height as f64 / scale_factor;
        let _ = self.window.request_inner_size(LogicalSize::new(
            logical_height * aspect,
            logical_height,
        ));
    }

    fn handle_resize(&mut self, new_size: PhysicalSize<u32>) {
        let target = match self.source_aspect {
            Some(aspect) => {
                surface_size_for_source(new_size.height, self.window.scale_factor(), aspect)
            }
            None => new_size,
        };
        self.gpu.resize(target);
        self.push_all_uniforms();
    }

    fn push_all_uniforms(&self) {
        self.gpu.push_uniforms(&EffectUniforms::from_params(
            &self.params,
            self.gpu.size().height,
        ));
    }
}

/// Computes the backing-buffer size for a source aspect ratio: the
/// window's logical height times the (capped) scale factor, with the
/// width following the source.
fn surface_size_for_source(
    window_physical_height: u32,
    scale_factor: f64,
    aspect: f64,
) -> PhysicalSize<u32> {
    let logical_height = window_physical_height as f64 / scale_factor.max(0.01);
    let height = (logical_height * scale_factor.min(MAX_BACKING_SCALE))
        .round()
        .max(1.0);
    let width = (height * aspect).round().max(1.0);
    PhysicalSize::new(width as u32, height as u32)
}

/// Paces redraws to an optional FPS cap; uncapped means one redraw per
/// display frame.
struct FramePacer {
    interval: Option<Duration>,
    next_frame: Instant,
}

impl FramePacer {
    fn new(target_fps: Option<f32>) -> Self {
        Self {
            interval: target_fps
                .filter(|fps| *fps > 0.0)
                .map(|fps| Duration::from_secs_f32(1.0 / fps)),
            next_frame: Instant::now(),
        }
    }

    fn ready_for_frame(&self, now: Instant) -> bool {
        match self.interval {
            None => true,
            Some(_) => now >= self.next_frame,
        }
    }

    fn mark_rendered(&mut self, now: Instant) {
        if let Some(interval) = self.interval {
            self.next_frame = now + interval;
        }
    }

    fn next_deadline(&self) -> Option<Instant> {
        self.interval.map(|_| self.next_frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn surface_width_follows_source_aspect() {
        let size = surface_size_for_source(1080, 1.0, 16.0 / 9.0);
        assert_eq!(size.height, 1080);
        assert_eq!(size.width, 1920);

        let portrait = surface_size_for_source(1080, 1.0, 3.0 / 4.0);
        assert_eq!(portrait.width, 810);
    }

    #[test]
    fn backing_scale_is_capped_at_two() {
        // Physical height 1080 at 3x means a 360 logical height; the
        // backing buffer uses at most 2x of that.
        let size = surface_size_for_source(1080, 3.0, 1.0);
        assert_eq!(size.height, 720);
        assert_eq!(size.width, 720);

        // Below the cap the backing buffer keeps the full density.
        let size = surface_size_for_source(1080, 1.5, 1.0);
        assert_eq!(size.height, 1080);
    }

    #[test]
    fn surface_size_never_collapses_to_zero() {
        let size = surface_size_for_source(0, 1.0, 1.5);
        assert!(size.width >= 1 && size.height >= 1);
    }

    #[test]
    fn uncapped_pacer_is_always_ready() {
        let mut pacer = FramePacer::new(None);
        let now = Instant::now();
        assert!(pacer.ready_for_frame(now));
        pacer.mark_rendered(now);
        assert!(pacer.ready_for_frame(now));
        assert!(pacer.next_deadline().is_none());
    }

    #[test]
    fn capped_pacer_waits_out_the_frame_interval() {
        let mut pacer = FramePacer::new(Some(10.0));
        let now = Instant::now();
        assert!(pacer.ready_for_frame(now));
        pacer.mark_rendered(now);
        assert!(!pacer.ready_for_frame(now));
        assert_eq!(pacer.next_deadline(), Some(now + Duration::from_millis(100)));
        assert!(pacer.ready_for_frame(now + Duration::from_millis(101)));
    }
}
