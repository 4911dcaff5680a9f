pub mod timer;

use std::collections::VecDeque;

use winit::window::Window;

use self::timer::FramePhase;
use crate::render::GpuState;
use crate::tooltip::Tooltip;

/// Number of frame times to keep in the histogram.
const FRAME_HISTORY_LEN: usize = 300;
/// How often to log FPS and ingest counters (seconds).
const LOG_INTERVAL: f64 = 5.0;

/// Pipeline counters the app copies in each frame.
#[derive(Debug, Default, Clone, Copy)]
pub struct ChartStats {
    pub window_samples: usize,
    pub capacity: usize,
    pub value_range: Option<(f64, f64)>,
    pub decode_backlog: usize,
    pub appended: u64,
    pub malformed: u64,
    pub feed_connected: bool,
    pub reconnects: u64,
    pub skipped_frames: u64,
}

/// Tooltip plus F12 diagnostics, drawn with egui on top of the chart.
pub struct DebugOverlay {
    pub egui_ctx: egui::Context,
    pub egui_state: egui_winit::State,
    pub egui_renderer: egui_wgpu::Renderer,

    pub visible: bool,

    /// Rolling window of frame times (seconds).
    frame_times: VecDeque<f64>,

    /// Computed stats.
    pub fps: f64,
    pub frame_time_avg: f64,
    pub frame_time_min: f64,
    pub frame_time_max: f64,

    /// Smoothed per-phase durations, copied from the app's timers.
    pub phase_durations_us: [f64; 5],

    /// Updated by app each frame.
    pub chart_stats: ChartStats,
    pub tooltip: Option<Tooltip>,

    frame_count: u64,
    log_timer: f64,
    log_frame_count: u32,
    log_frame_sum: f64,
}

impl DebugOverlay {
    pub fn new(window: &Window, gpu: &GpuState) -> Self {
        let egui_ctx = egui::Context::default();

        let egui_state = egui_winit::State::new(
            egui_ctx.clone(),
            egui::ViewportId::ROOT,
            window,
            Some(window.scale_factor() as f32),
            None,
            Some(gpu.device.limits().max_texture_dimension_2d as usize),
        );

        let egui_renderer = egui_wgpu::Renderer::new(
            &gpu.device,
            gpu.surface_config.format,
            egui_wgpu::RendererOptions {
                depth_stencil_format: None,
                msaa_samples: 1,
                dithering: true,
                predictable_texture_filtering: false,
            },
        );

        Self {
            egui_ctx,
            egui_state,
            egui_renderer,
            visible: false,
            frame_times: VecDeque::with_capacity(FRAME_HISTORY_LEN),
            fps: 0.0,
            frame_time_avg: 0.0,
            frame_time_min: 0.0,
            frame_time_max: 0.0,
            phase_durations_us: [0.0; 5],
            chart_stats: ChartStats::default(),
            tooltip: None,
            frame_count: 0,
            log_timer: 0.0,
            log_frame_count: 0,
            log_frame_sum: 0.0,
        }
    }

    /// Record a frame time, update rolling stats, and periodically log.
    pub fn record_frame(&mut self, dt: f64) {
        self.frame_count += 1;
        if self.frame_times.len() == FRAME_HISTORY_LEN {
            self.frame_times.pop_front();
        }
        self.frame_times.push_back(dt);

        let len = self.frame_times.len();
        let mut sum = 0.0;
        let mut min = f64::MAX;
        let mut max = 0.0f64;
        for &t in &self.frame_times {
            sum += t;
            min = min.min(t);
            max = max.max(t);
        }
        self.frame_time_avg = sum / len as f64;
        self.frame_time_min = min;
        self.frame_time_max = max;
        self.fps = 1.0 / self.frame_time_avg;

        // Periodic log (every 5s).
        self.log_frame_count += 1;
        self.log_frame_sum += dt;
        self.log_timer += dt;

        if self.log_timer >= LOG_INTERVAL {
            let avg_ms = (self.log_frame_sum / self.log_frame_count as f64) * 1000.0;
            let fps = self.log_frame_count as f64 / self.log_timer;
            let s = &self.chart_stats;
            log::info!(
                "FPS: {:.0} | avg: {:.2}ms | window: {} samples | appended: {} | backlog: {} | skipped frames: {}",
                fps,
                avg_ms,
                s.window_samples,
                s.appended,
                s.decode_backlog,
                s.skipped_frames,
            );
            self.log_timer = 0.0;
            self.log_frame_count = 0;
            self.log_frame_sum = 0.0;
        }
    }

    pub fn toggle(&mut self) {
        self.visible = !self.visible;
    }

    /// Forward a winit event to egui. Returns true if egui consumed it.
    pub fn on_window_event(
        &mut self,
        window: &Window,
        event: &winit::event::WindowEvent,
    ) -> bool {
        let response = self.egui_state.on_window_event(window, event);
        response.consumed
    }

    /// Run the egui frame and produce paint output.
    /// Returns (clipped_primitives, textures_delta, screen_descriptor).
    pub fn run_frame(
        &mut self,
        window: &Window,
        screen_w: u32,
        screen_h: u32,
    ) -> (
        Vec<egui::epaint::ClippedPrimitive>,
        egui::TexturesDelta,
        egui_wgpu::ScreenDescriptor,
    ) {
        let raw_input = self.egui_state.take_egui_input(window);

        let ui_state = UiSnapshot {
            visible: self.visible,
            fps: self.fps,
            frame_time_avg: self.frame_time_avg,
            frame_time_min: self.frame_time_min,
            frame_time_max: self.frame_time_max,
            frame_times: self.frame_times.iter().copied().collect(),
            phase_durations: self.phase_durations_us,
            stats: self.chart_stats,
            tooltip: self.tooltip.clone(),
        };

        let ctx = self.egui_ctx.clone();
        let full_output = ctx.run(raw_input, |ctx| {
            draw_ui(ctx, &ui_state);
        });

        self.egui_state
            .handle_platform_output(window, full_output.platform_output);

        let pixels_per_point = full_output.pixels_per_point;
        let clipped_primitives = self.egui_ctx.tessellate(full_output.shapes, pixels_per_point);

        let screen_descriptor = egui_wgpu::ScreenDescriptor {
            size_in_pixels: [screen_w, screen_h],
            pixels_per_point,
        };

        (clipped_primitives, full_output.textures_delta, screen_descriptor)
    }

    /// Upload egui textures and buffers. Call before the egui render pass.
    pub fn prepare_egui(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        primitives: &[egui::epaint::ClippedPrimitive],
        textures_delta: &egui::TexturesDelta,
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) -> Vec<wgpu::CommandBuffer> {
        for (id, image_delta) in &textures_delta.set {
            self.egui_renderer
                .update_texture(device, queue, *id, image_delta);
        }

        self.egui_renderer
            .update_buffers(device, queue, encoder, primitives, screen_descriptor)
    }

    /// Render egui into the given render pass.
    pub fn render_egui(
        &self,
        render_pass: &mut wgpu::RenderPass<'static>,
        primitives: &[egui::epaint::ClippedPrimitive],
        screen_descriptor: &egui_wgpu::ScreenDescriptor,
    ) {
        self.egui_renderer
            .render(render_pass, primitives, screen_descriptor);
    }

    /// Free textures after present.
    pub fn free_textures(&mut self, textures_delta: &egui::TexturesDelta) {
        for &id in &textures_delta.free {
            self.egui_renderer.free_texture(&id);
        }
    }
}

// ---------------------------------------------------------------------------
// UI snapshot + free-function draw (avoids borrow conflicts with egui_ctx)
// ---------------------------------------------------------------------------

struct UiSnapshot {
    visible: bool,
    fps: f64,
    frame_time_avg: f64,
    frame_time_min: f64,
    frame_time_max: f64,
    frame_times: Vec<f64>,
    phase_durations: [f64; 5],
    stats: ChartStats,
    tooltip: Option<Tooltip>,
}

fn draw_ui(ctx: &egui::Context, s: &UiSnapshot) {
    if let Some(tip) = &s.tooltip {
        draw_tooltip(ctx, tip);
    }

    if !s.visible {
        return;
    }

    let panel_frame = egui::Frame::NONE
        .fill(egui::Color32::from_rgba_unmultiplied(20, 20, 20, 220))
        .corner_radius(6.0)
        .inner_margin(10.0);

    egui::Window::new("Diagnostics")
        .default_pos([10.0, 10.0])
        .default_width(320.0)
        .resizable(true)
        .frame(panel_frame)
        .show(ctx, |ui| {
            ui.style_mut().visuals.override_text_color = Some(egui::Color32::from_gray(220));

            // --- Performance ---
            ui.heading("Performance");
            ui.label(format!("FPS: {:.1}", s.fps));
            ui.label(format!(
                "Frame: {:.2}ms avg | {:.2} min | {:.2} max",
                s.frame_time_avg * 1000.0,
                s.frame_time_min * 1000.0,
                s.frame_time_max * 1000.0,
            ));
            ui.add_space(4.0);

            // --- Frame time histogram ---
            if !s.frame_times.is_empty() {
                let max_time = s
                    .frame_times
                    .iter()
                    .copied()
                    .fold(0.0f64, f64::max)
                    .max(0.020);

                let (response, painter) =
                    ui.allocate_painter(egui::vec2(300.0, 60.0), egui::Sense::hover());
                let rect = response.rect;

                let bar_width = rect.width() / s.frame_times.len() as f32;
                let target_y = rect.bottom() - (0.01667 / max_time as f32) * rect.height();

                for (i, &t) in s.frame_times.iter().enumerate() {
                    let h = (t / max_time) as f32 * rect.height();
                    let x = rect.left() + i as f32 * bar_width;
                    let color = if t > 0.01667 {
                        egui::Color32::from_rgb(255, 100, 80)
                    } else {
                        egui::Color32::from_rgb(80, 200, 120)
                    };
                    painter.rect_filled(
                        egui::Rect::from_min_max(
                            egui::pos2(x, rect.bottom() - h),
                            egui::pos2(x + bar_width - 1.0, rect.bottom()),
                        ),
                        0.0,
                        color,
                    );
                }

                // 16.67ms target line
                painter.line_segment(
                    [
                        egui::pos2(rect.left(), target_y),
                        egui::pos2(rect.right(), target_y),
                    ],
                    egui::Stroke::new(1.0, egui::Color32::from_rgb(255, 255, 100)),
                );
            }
            ui.add_space(4.0);

            // --- Phase timers ---
            ui.heading("Frame Phases");
            let total: f64 = s.phase_durations.iter().sum::<f64>().max(1.0);
            for phase in FramePhase::ALL {
                let us = s.phase_durations[phase as usize];
                ui.label(
                    egui::RichText::new(format!(
                        "{:<8} {:>6.0}us ({:>2.0}%)",
                        phase.label(),
                        us,
                        us / total * 100.0
                    ))
                    .monospace(),
                );
            }
            ui.add_space(4.0);

            // --- Pipeline ---
            let st = &s.stats;
            ui.heading("Pipeline");
            ui.label(format!(
                "Window: {} / {} samples ({:.1}%)",
                st.window_samples,
                st.capacity,
                st.window_samples as f64 / st.capacity.max(1) as f64 * 100.0,
            ));
            if let Some((lo, hi)) = st.value_range {
                ui.label(format!("Range: {lo:.0} .. {hi:.0}"));
            }
            ui.label(format!(
                "Appended: {} | Malformed: {}",
                st.appended, st.malformed
            ));
            ui.label(format!("Decode backlog: {}", st.decode_backlog));
            ui.label(format!("Skipped frames: {}", st.skipped_frames));
            ui.label(format!(
                "Feed: {} | Reconnects: {}",
                if st.feed_connected { "connected" } else { "retrying" },
                st.reconnects
            ));
            ui.add_space(4.0);
            ui.label("F12: Toggle | ESC: Quit");
        });
}

fn draw_tooltip(ctx: &egui::Context, tip: &Tooltip) {
    let tooltip_frame = egui::Frame::NONE
        .fill(egui::Color32::from_rgba_unmultiplied(30, 30, 30, 230))
        .corner_radius(4.0)
        .inner_margin(6.0);

    egui::Window::new("value_tooltip")
        .title_bar(false)
        .fixed_pos([tip.screen_pos.x, tip.screen_pos.y])
        .resizable(false)
        .frame(tooltip_frame)
        .show(ctx, |ui| {
            ui.style_mut().visuals.override_text_color = Some(egui::Color32::from_gray(230));
            ui.label(egui::RichText::new(format!("Value: {:.2}", tip.value)).strong());
            ui.label(format!("Time:  {}", tip.time_label));
        });
}
