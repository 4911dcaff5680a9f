use std::sync::Arc;

use crossbeam_channel::Receiver;
use glam::Vec2;
use instant::Instant;
use winit::application::ApplicationHandler;
use winit::event::{ElementState, WindowEvent};
use winit::event_loop::{ActiveEventLoop, ControlFlow, EventLoop};
use winit::keyboard::{KeyCode, PhysicalKey};
use winit::window::{Window, WindowAttributes, WindowId};

use crate::config::Config;
use crate::debug::timer::{FramePhase, PhaseTimers};
use crate::debug::{ChartStats, DebugOverlay};
use crate::error::{ChartError, Result};
use crate::ingest::Ingress;
use crate::render::GpuState;
use crate::session::{self, ChartSession};
use crate::tooltip::{self, Tooltip};
use crate::transport::{self, FeedHandle};

const WINDOW_TITLE: &str = "pps-chart";
/// Initial window size (logical pixels).
const INITIAL_SIZE: (f64, f64) = (1280.0, 720.0);

// ---------------------------------------------------------------------------
// App
// ---------------------------------------------------------------------------

/// Top-level application state.
struct App {
    config: Config,
    window: Option<Arc<Window>>,
    gpu: Option<GpuState>,
    overlay: Option<DebugOverlay>,

    // Sample pipeline
    session: ChartSession,
    ingress_rx: Receiver<Ingress>,
    feed: FeedHandle,

    // Frame timing
    last_frame_time: Option<Instant>,
    timers: PhaseTimers,

    /// Last cursor position in physical pixels, `None` when outside.
    pointer: Option<Vec2>,

    /// Rendering stopped after device loss; the window stays up.
    halted: bool,
    /// Error that ended the event loop, reported by `run`.
    fatal: Option<ChartError>,
}

impl App {
    fn new(
        config: Config,
        session: ChartSession,
        ingress_rx: Receiver<Ingress>,
        feed: FeedHandle,
    ) -> Self {
        Self {
            config,
            window: None,
            gpu: None,
            overlay: None,
            session,
            ingress_rx,
            feed,
            last_frame_time: None,
            timers: PhaseTimers::new(),
            pointer: None,
            halted: false,
            fatal: None,
        }
    }

    fn init_window(&mut self, event_loop: &ActiveEventLoop) -> Result<()> {
        let attrs = WindowAttributes::default()
            .with_title(WINDOW_TITLE)
            .with_inner_size(winit::dpi::LogicalSize::new(INITIAL_SIZE.0, INITIAL_SIZE.1));
        let window = Arc::new(event_loop.create_window(attrs)?);

        let size = window.inner_size();
        log::info!("Chart window created: {}x{}", size.width, size.height);

        let gpu = GpuState::new(window.clone(), &self.config)?;
        self.overlay = Some(DebugOverlay::new(&window, &gpu));
        self.gpu = Some(gpu);
        self.window = Some(window);
        Ok(())
    }

    /// Drain the feed channel into the session.
    fn pump_ingress(&mut self) {
        for msg in self.ingress_rx.try_iter() {
            self.session.on_ingress(msg);
        }
    }

    fn halt_on_device_loss(&mut self) -> bool {
        if self.halted {
            return true;
        }
        let Some(reason) = self.gpu.as_ref().and_then(|gpu| gpu.lost_reason()) else {
            return false;
        };
        log::error!("Rendering halted after device loss: {reason}");
        if let Some(window) = &self.window {
            window.set_title(&format!("{WINDOW_TITLE} - GPU device lost: {reason}"));
        }
        self.halted = true;
        true
    }

    /// Hover lookup for the tooltip.
    fn update_tooltip(&mut self, now_ns: i64) {
        let (Some(window), Some(overlay)) = (&self.window, &mut self.overlay) else {
            return;
        };
        overlay.tooltip = self.pointer.and_then(|pointer| {
            let width = window.inner_size().width as f32;
            let target = tooltip::pointer_target_ns(
                pointer.x,
                width,
                now_ns,
                self.session.horizon_ns(),
            );
            let hit = self.session.value_at(target)?;
            let scale = window.scale_factor() as f32;
            Some(Tooltip::new(pointer / scale, hit))
        });
    }

    fn refresh_overlay_stats(&mut self) {
        let (Some(gpu), Some(overlay)) = (&self.gpu, &mut self.overlay) else {
            return;
        };
        let ingest = self.session.stats();
        overlay.phase_durations_us = self.timers.durations_us;
        overlay.chart_stats = ChartStats {
            window_samples: self.session.ring().len(),
            capacity: self.session.ring().capacity(),
            value_range: self.session.value_range(),
            decode_backlog: self.session.decode_backlog(),
            appended: ingest.appended,
            malformed: ingest.malformed,
            feed_connected: self.feed.is_connected(),
            reconnects: self.feed.reconnects(),
            skipped_frames: gpu.staging.skipped_frames(),
        };
    }

    fn redraw(&mut self) {
        if self.halt_on_device_loss() {
            return;
        }

        // --- Timing ---
        let now = Instant::now();
        if let (Some(last), Some(overlay)) = (self.last_frame_time, &mut self.overlay) {
            overlay.record_frame(now.duration_since(last).as_secs_f64());
        }
        self.last_frame_time = Some(now);

        // --- CPU side: ingest, evict, project ---
        self.pump_ingress();
        let now_ns = session::now_ns();
        let has_data = !self.session.tick(now_ns, &mut self.timers).is_empty();
        self.update_tooltip(now_ns);
        self.refresh_overlay_stats();

        let (Some(window), Some(gpu), Some(overlay)) =
            (&self.window, &mut self.gpu, &mut self.overlay)
        else {
            return;
        };

        // An empty window still draws grid and axes, without staging.
        let slot = if !has_data {
            None
        } else {
            match gpu.staging.acquire(&gpu.device) {
                Some(slot) => Some(slot),
                None => {
                    log::trace!("Staging slot busy, skipping frame");
                    return;
                }
            }
        };

        let Some(mut frame) = gpu.begin_frame() else {
            return;
        };

        // --- Stage ---
        self.timers.begin();
        let data_count = match slot {
            Some(slot) => gpu.upload_vertices(slot, &mut frame.encoder, self.session.vertices()),
            None => 0,
        };
        self.timers.end(FramePhase::Stage);

        // --- Render ---
        self.timers.begin();
        gpu.draw_chart(&mut frame.encoder, &frame.view, data_count);

        let (primitives, textures_delta, screen_desc) =
            overlay.run_frame(window, gpu.surface_config.width, gpu.surface_config.height);
        let extra_cmd_bufs = overlay.prepare_egui(
            &gpu.device,
            &gpu.queue,
            &mut frame.encoder,
            &primitives,
            &textures_delta,
            &screen_desc,
        );
        {
            let mut egui_pass = GpuState::begin_egui_pass(&mut frame.encoder, &frame.view);
            overlay.render_egui(&mut egui_pass, &primitives, &screen_desc);
        }

        gpu.finish_frame(frame.encoder, frame.output, extra_cmd_bufs);
        if let Some(slot) = slot {
            gpu.staging.recycle(slot);
        }
        overlay.free_textures(&textures_delta);
        self.timers.end(FramePhase::Render);
    }
}

impl ApplicationHandler for App {
    fn resumed(&mut self, event_loop: &ActiveEventLoop) {
        if self.window.is_some() {
            return;
        }

        if let Err(e) = self.init_window(event_loop) {
            self.fatal = Some(e);
            event_loop.exit();
            return;
        }
        log::info!("wgpu + chart pipeline initialized");

        // Continuous render loop
        event_loop.set_control_flow(ControlFlow::Poll);
    }

    fn about_to_wait(&mut self, event_loop: &ActiveEventLoop) {
        if self.halted {
            event_loop.set_control_flow(ControlFlow::Wait);
            return;
        }
        if let Some(w) = &self.window {
            w.request_redraw();
        }
    }

    fn window_event(
        &mut self,
        event_loop: &ActiveEventLoop,
        _window_id: WindowId,
        event: WindowEvent,
    ) {
        if let (Some(window), Some(overlay)) = (&self.window, &mut self.overlay) {
            overlay.on_window_event(window, &event);
        }

        match event {
            WindowEvent::CloseRequested => {
                log::info!("Close requested, exiting");
                event_loop.exit();
            }
            WindowEvent::Resized(new_size) => {
                if let Some(gpu) = &mut self.gpu {
                    gpu.resize(new_size.width, new_size.height);
                }
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.pointer = Some(Vec2::new(position.x as f32, position.y as f32));
            }
            WindowEvent::CursorLeft { .. } => {
                self.pointer = None;
            }
            WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                match event.physical_key {
                    PhysicalKey::Code(KeyCode::F12) if !event.repeat => {
                        if let Some(overlay) = &mut self.overlay {
                            overlay.toggle();
                            log::info!(
                                "Diagnostics overlay: {}",
                                if overlay.visible { "ON" } else { "OFF" }
                            );
                        }
                    }
                    PhysicalKey::Code(KeyCode::Escape) => {
                        log::info!("ESC pressed, exiting");
                        event_loop.exit();
                    }
                    _ => {}
                }
            }
            WindowEvent::RedrawRequested => self.redraw(),
            _ => {}
        }
    }
}

/// Entry point: start the feed and the decoders, then run the event loop.
pub fn run(config: Config) -> Result<()> {
    config.validate()?;

    let session = ChartSession::new(&config)?;
    let (tx, rx) = crossbeam_channel::unbounded();
    let feed = transport::spawn(config.url.clone(), tx)?;
    log::info!(
        "Feeding from {} | capacity {} | horizon {}s | {} decoders",
        config.url,
        config.capacity,
        config.horizon_secs,
        config.workers
    );

    let event_loop = EventLoop::new()?;
    let mut app = App::new(config, session, rx, feed);
    event_loop.run_app(&mut app)?;

    if let Some(gpu) = &app.gpu {
        log::info!(
            "Submitted {} frames, skipped {}",
            gpu.staging.frames_submitted(),
            gpu.staging.skipped_frames()
        );
    }

    match app.fatal.take() {
        Some(e) => Err(e),
        None => Ok(()),
    }
}
