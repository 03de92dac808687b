use std::sync::Arc;

use anyhow::Result;
use capture::SourceFrame;
use tracing::debug;
use wgpu::util::DeviceExt;
use winit::dpi::PhysicalSize;
use winit::window::Window;

use crate::panel::{ControlPanel, PanelFrame};
use crate::registry::UniformRegistry;

use super::context::GpuContext;
use super::pipeline::EffectPipeline;
use super::source::SourceTexture;
use super::uniforms::EffectUniforms;

/// All GPU state for the effect: device/surface, the linked program,
/// the uniform block plus its name registry, and the source texture.
pub(crate) struct GpuState {
    context: GpuContext,
    pipeline: EffectPipeline,
    uniform_buffer: wgpu::Buffer,
    uniform_bind_group: wgpu::BindGroup,
    registry: UniformRegistry,
    source: SourceTexture,
    source_bind_group: wgpu::BindGroup,
}

impl GpuState {
    pub(crate) fn new(
        window: Arc<Window>,
        size: PhysicalSize<u32>,
        fragment_source: &str,
        initial_uniforms: &EffectUniforms,
    ) -> Result<Self> {
        let context = GpuContext::new(window, size)?;
        let pipeline = EffectPipeline::new(&context.device, context.surface_format, fragment_source)?;
        let registry = UniformRegistry::for_effect_block();

        let uniform_buffer = context
            .device
            .create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("effect uniforms"),
                contents: bytemuck::bytes_of(initial_uniforms),
                usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            });
        let uniform_bind_group = context.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("uniform bind group"),
            layout: &pipeline.uniform_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: uniform_buffer.as_entire_binding(),
            }],
        });

        let source = SourceTexture::placeholder(&context.device, &context.queue);
        let source_bind_group = source.bind_group(&context.device, &pipeline.source_layout);

        Ok(Self {
            context,
            pipeline,
            uniform_buffer,
            uniform_bind_group,
            registry,
            source,
            source_bind_group,
        })
    }

    pub(crate) fn device(&self) -> &wgpu::Device {
        &self.context.device
    }

    pub(crate) fn surface_format(&self) -> wgpu::TextureFormat {
        self.context.surface_format
    }

    pub(crate) fn size(&self) -> PhysicalSize<u32> {
        self.context.size
    }

    pub(crate) fn resize(&mut self, new_size: PhysicalSize<u32>) {
        self.context.resize(new_size);
    }

    /// Reallocates the source texture for a newly adopted source.
    pub(crate) fn adopt_source(&mut self, width: u32, height: u32) {
        debug!(width, height, "allocating texture for new frame source");
        self.source = SourceTexture::new(&self.context.device, width, height);
        self.source_bind_group = self
            .source
            .bind_group(&self.context.device, &self.pipeline.source_layout);
    }

    /// Refreshes the source texture from the latest decoded frame.
    pub(crate) fn upload_frame(&self, frame: &SourceFrame) {
        self.source.upload(&self.context.queue, frame);
    }

    /// Pushes one named uniform through the registry. Unknown names are
    /// logged by the registry and ignored.
    pub(crate) fn set_uniform_f32(&self, name: &str, value: f32) {
        if let Some(offset) = self.registry.offset(name) {
            self.context
                .queue
                .write_buffer(&self.uniform_buffer, offset, bytemuck::bytes_of(&value));
        }
    }

    /// Rewrites the whole uniform block at once (startup and resizes).
    pub(crate) fn push_uniforms(&self, uniforms: &EffectUniforms) {
        self.context
            .queue
            .write_buffer(&self.uniform_buffer, 0, bytemuck::bytes_of(uniforms));
    }

    /// Draws the full-screen quad, then the control panel overlay, and
    /// presents.
    pub(crate) fn render(
        &mut self,
        panel: &mut ControlPanel,
        panel_frame: PanelFrame,
    ) -> Result<(), wgpu::SurfaceError> {
        let frame = self.context.surface.get_current_texture()?;
        let view = frame
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());
        let mut encoder =
            self.context
                .device
                .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                    label: Some("render encoder"),
                });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("effect pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                        store: wgpu::StoreOp::Store,
                    },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            render_pass.set_pipeline(&self.pipeline.pipeline);
            render_pass.set_bind_group(0, &self.uniform_bind_group, &[]);
            render_pass.set_bind_group(1, &self.source_bind_group, &[]);
            render_pass.draw(0..4, 0..1);
        }

        panel.paint(
            &self.context.device,
            &self.context.queue,
            &mut encoder,
            &view,
            panel_frame,
            [self.context.config.width, self.context.config.height],
        );

        self.context.queue.submit(Some(encoder.finish()));
        frame.present();
        Ok(())
    }
}
