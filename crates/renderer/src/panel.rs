use std::path::PathBuf;

use egui_wgpu::ScreenDescriptor;
use winit::event::WindowEvent;
use winit::window::Window;

use crate::types::{
    EffectParams, ROTATION_MAX_DEG, SCALE_MAX, SCALE_STEP, TILE_SIZE_MAX, TILE_SIZE_MIN,
};

/// Side effects requested by this frame's panel interaction. Parameter
/// edits have already been applied to the shared [`EffectParams`]; the
/// flags tell the caller which uniform values to push.
#[derive(Debug, Default)]
pub(crate) struct PanelActions {
    pub webcam_toggled: Option<bool>,
    pub image_picked: Option<PathBuf>,
    pub tile_size_changed: bool,
    pub scale_changed: bool,
    pub rotation_changed: bool,
}

/// Tessellated panel output carried from [`ControlPanel::run`] to
/// [`ControlPanel::paint`] within the same redraw.
pub(crate) struct PanelFrame {
    clipped: Vec<egui::ClippedPrimitive>,
    textures_delta: egui::TexturesDelta,
    pixels_per_point: f32,
}

/// The floating control panel: five live controls bound to
/// [`EffectParams`] plus the webcam toggle and file-picker actions.
pub(crate) struct ControlPanel {
    context: egui::Context,
    state: egui_winit::State,
    renderer: egui_wgpu::Renderer,
}

impl ControlPanel {
    pub(crate) fn new(
        device: &wgpu::Device,
        surface_format: wgpu::TextureFormat,
        window: &Window,
    ) -> Self {
        let context = egui::Context::default();
        let state = egui_winit::State::new(
            context.clone(),
            egui::ViewportId::ROOT,
            window,
            None,
            None,
            None,
        );
        let renderer = egui_wgpu::Renderer::new(device, surface_format, None, 1, false);

        Self {
            context,
            state,
            renderer,
        }
    }

    /// Feeds a window event to the panel; returns true when the panel
    /// consumed it (pointer over a widget, text entry, ...).
    pub(crate) fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        self.state.on_window_event(window, event).consumed
    }

    /// Runs the panel UI for this frame, mutating `params` in place and
    /// reporting which controls changed.
    pub(crate) fn run(
        &mut self,
        window: &Window,
        params: &mut EffectParams,
    ) -> (PanelFrame, PanelActions) {
        let mut actions = PanelActions::default();
        let raw_input = self.state.take_egui_input(window);
        let full_output = self.context.run(raw_input, |ctx| {
            egui::Window::new("controls")
                .default_pos([16.0, 16.0])
                .resizable(false)
                .show(ctx, |ui| {
                    if ui.checkbox(&mut params.use_webcam, "use webcam").changed() {
                        actions.webcam_toggled = Some(params.use_webcam);
                    }
                    if ui.button("load image").clicked() {
                        let picked = rfd::FileDialog::new()
                            .add_filter("image", &["png", "jpg", "jpeg", "bmp", "gif"])
                            .pick_file();
                        if picked.is_some() {
                            params.use_webcam = false;
                        }
                        actions.image_picked = picked;
                    }
                    if ui
                        .add(
                            egui::Slider::new(
                                &mut params.tile_size_px,
                                TILE_SIZE_MIN..=TILE_SIZE_MAX,
                            )
                            .text("tile size"),
                        )
                        .changed()
                    {
                        actions.tile_size_changed = true;
                    }
                    if ui
                        .add(
                            egui::Slider::new(&mut params.scale, 0.0..=SCALE_MAX)
                                .step_by(SCALE_STEP)
                                .text("scale"),
                        )
                        .changed()
                    {
                        actions.scale_changed = true;
                    }
                    if ui
                        .add(
                            egui::Slider::new(&mut params.rotation_deg, 0..=ROTATION_MAX_DEG)
                                .text("rotation angle"),
                        )
                        .changed()
                    {
                        actions.rotation_changed = true;
                    }
                });
        });

        self.state
            .handle_platform_output(window, full_output.platform_output);
        let clipped = self
            .context
            .tessellate(full_output.shapes, full_output.pixels_per_point);

        (
            PanelFrame {
                clipped,
                textures_delta: full_output.textures_delta,
                pixels_per_point: full_output.pixels_per_point,
            },
            actions,
        )
    }

    /// Draws the tessellated panel on top of the already-rendered frame.
    pub(crate) fn paint(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        frame: PanelFrame,
        size_in_pixels: [u32; 2],
    ) {
        for (id, delta) in &frame.textures_delta.set {
            self.renderer.update_texture(device, queue, *id, delta);
        }

        let screen = ScreenDescriptor {
            size_in_pixels,
            pixels_per_point: frame.pixels_per_point,
        };
        let _callback_buffers =
            self.renderer
                .update_buffers(device, queue, encoder, &frame.clipped, &screen);

        {
            let mut render_pass = encoder
                .begin_render_pass(&wgpu::RenderPassDescriptor {
                    label: Some("panel pass"),
                    color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                        view,
                        depth_slice: None,
                        resolve_target: None,
                        ops: wgpu::Operations {
                            load: wgpu::LoadOp::Load,
                            store: wgpu::StoreOp::Store,
                        },
                    })],
                    depth_stencil_attachment: None,
                    occlusion_query_set: None,
                    timestamp_writes: None,
                })
                .forget_lifetime();
            self.renderer.render(&mut render_pass, &frame.clipped, &screen);
        }

        for id in &frame.textures_delta.free {
            self.renderer.free_texture(id);
        }
    }
}
