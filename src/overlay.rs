use crate::input::CarControl;
use crate::renderer::{FramePresent, Renderer};
use crate::scene::AnimationState;
use anyhow::{anyhow, Result};
use egui::Context as EguiCtx;
use egui_wgpu::{Renderer as EguiRenderer, RendererOptions, ScreenDescriptor};
use egui_winit::State as EguiWinit;
use winit::event::WindowEvent;
use winit::window::Window;

/// Thin egui layer: the loading indicator plus the three car-control
/// buttons. Everything else on screen is the 3D stage.
pub struct Overlay {
    ctx: EguiCtx,
    state: Option<EguiWinit>,
    painter: Option<EguiRenderer>,
}

impl Overlay {
    pub fn new() -> Self {
        Self { ctx: EguiCtx::default(), state: None, painter: None }
    }

    pub fn ensure(&mut self, window: &Window, renderer: &Renderer) -> Result<()> {
        if self.state.is_none() {
            self.state = Some(EguiWinit::new(
                self.ctx.clone(),
                egui::ViewportId::ROOT,
                window,
                Some(renderer.pixels_per_point()),
                window.theme(),
                None,
            ));
        }
        if self.painter.is_none() {
            let device = renderer.device()?;
            let format = renderer.surface_format()?;
            self.painter = Some(EguiRenderer::new(device, format, RendererOptions::default()));
        }
        Ok(())
    }

    /// Returns true when egui consumed the event.
    pub fn on_window_event(&mut self, window: &Window, event: &WindowEvent) -> bool {
        match self.state.as_mut() {
            Some(state) => state.on_window_event(window, event).consumed,
            None => false,
        }
    }

    pub fn draw(
        &mut self,
        renderer: &Renderer,
        frame: &FramePresent,
        progress: Option<&str>,
        animation: &AnimationState,
    ) -> Result<Vec<CarControl>> {
        let window = renderer.window().ok_or_else(|| anyhow!("Overlay has no window"))?;
        let state = self.state.as_mut().ok_or_else(|| anyhow!("Overlay not attached"))?;
        let painter = self.painter.as_mut().ok_or_else(|| anyhow!("Overlay painter missing"))?;
        let device = renderer.device()?;
        let queue = renderer.queue()?;

        let mut controls = Vec::new();
        let raw_input = state.take_egui_input(window);
        let full_output = self.ctx.run(raw_input, |ctx| {
            if let Some(text) = progress {
                egui::Area::new(egui::Id::new("loading-indicator"))
                    .anchor(egui::Align2::CENTER_CENTER, [0.0, 0.0])
                    .show(ctx, |ui| {
                        ui.label(egui::RichText::new(text).size(18.0).strong());
                    });
            }
            egui::TopBottomPanel::bottom("car-controls").show(ctx, |ui| {
                ui.horizontal(|ui| {
                    let rotate_label =
                        if animation.auto_rotate { "Rotate: on" } else { "Rotate: off" };
                    if ui.button(rotate_label).clicked() {
                        controls.extend(CarControl::from_action("rotate"));
                    }
                    let lights_label = if animation.lights_on { "Lights: on" } else { "Lights: off" };
                    if ui.button(lights_label).clicked() {
                        controls.extend(CarControl::from_action("lights"));
                    }
                    let drive_label = if animation.driving { "Park" } else { "Drive" };
                    if ui.button(drive_label).clicked() {
                        controls.extend(CarControl::from_action("doors"));
                    }
                });
            });
        });
        state.handle_platform_output(window, full_output.platform_output);

        let pixels_per_point = self.ctx.pixels_per_point();
        let paint_jobs = self.ctx.tessellate(full_output.shapes, pixels_per_point);
        let size = renderer.size();
        let screen = ScreenDescriptor {
            size_in_pixels: [size.width, size.height],
            pixels_per_point,
        };
        for (id, delta) in &full_output.textures_delta.set {
            painter.update_texture(device, queue, *id, delta);
        }
        let view = frame.view();
        let mut encoder =
            device.create_command_encoder(&wgpu::CommandEncoderDescriptor { label: Some("Overlay") });
        let mut extra = painter.update_buffers(device, queue, &mut encoder, &paint_jobs, &screen);
        {
            let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Overlay Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &view,
                    depth_slice: None,
                    resolve_target: None,
                    ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
                })],
                depth_stencil_attachment: None,
                occlusion_query_set: None,
                timestamp_writes: None,
            });
            let pass = unsafe {
                std::mem::transmute::<&mut wgpu::RenderPass<'_>, &mut wgpu::RenderPass<'static>>(&mut pass)
            };
            painter.render(pass, &paint_jobs, &screen);
        }
        extra.push(encoder.finish());
        queue.submit(extra);
        for id in &full_output.textures_delta.free {
            painter.free_texture(id);
        }
        Ok(controls)
    }
}

impl Default for Overlay {
    fn default() -> Self {
        Self::new()
    }
}
