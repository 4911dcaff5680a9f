pub mod guides;
pub mod pipeline;
pub mod projector;
pub mod sequencer;
pub mod staging;
pub mod vertex;

use std::sync::{Arc, Mutex};
use winit::window::Window;

use crate::config::Config;
use crate::error::{ChartError, Result};

use self::pipeline::ChartPipeline;
use self::staging::StagingRing;
use self::vertex::ChartVertex;

/// Core GPU state: device, queue, surface, chart pipeline and staging ring.
pub struct GpuState {
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub surface: wgpu::Surface<'static>,
    pub surface_config: wgpu::SurfaceConfiguration,
    pub chart: ChartPipeline,
    pub staging: StagingRing,
    /// Set by the device-lost callback.
    lost: Arc<Mutex<Option<String>>>,
}

/// Intermediate frame state returned by `begin_frame`.
pub struct FrameContext {
    pub output: wgpu::SurfaceTexture,
    pub view: wgpu::TextureView,
    pub encoder: wgpu::CommandEncoder,
}

impl GpuState {
    /// Initialize wgpu, the chart pipeline and the staging ring.
    pub fn new(window: Arc<Window>, config: &Config) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor::default());
        let surface = instance.create_surface(window)?;

        let adapter = pollster::block_on(instance.request_adapter(&wgpu::RequestAdapterOptions {
            power_preference: wgpu::PowerPreference::HighPerformance,
            compatible_surface: Some(&surface),
            force_fallback_adapter: false,
        }))
        .map_err(|e| ChartError::Gpu(format!("no suitable GPU adapter: {e}")))?;

        log::info!(
            "GPU adapter: {:?} ({:?})",
            adapter.get_info().name,
            adapter.get_info().backend
        );

        // The data vertex buffer and every staging slot hold a full ring.
        let needed = (config.capacity * std::mem::size_of::<ChartVertex>()) as u64;
        let mut required_limits = wgpu::Limits::default();
        let adapter_limits = adapter.limits();
        if needed > required_limits.max_buffer_size {
            if needed > adapter_limits.max_buffer_size {
                return Err(ChartError::Gpu(format!(
                    "capacity {} needs {} byte buffers, adapter allows {}",
                    config.capacity, needed, adapter_limits.max_buffer_size
                )));
            }
            required_limits.max_buffer_size = needed;
        }

        let (device, queue) = pollster::block_on(adapter.request_device(
            &wgpu::DeviceDescriptor {
                label: Some("pps_chart_device"),
                required_features: wgpu::Features::empty(),
                required_limits,
                ..Default::default()
            },
        ))
        .map_err(|e| ChartError::Gpu(format!("failed to create device: {e}")))?;

        let lost = Arc::new(Mutex::new(None));
        let lost_flag = lost.clone();
        device.set_device_lost_callback(move |reason, message| {
            log::error!("GPU device lost ({reason:?}): {message}");
            if let Ok(mut slot) = lost_flag.lock() {
                *slot = Some(format!("{reason:?}: {message}"));
            }
        });

        let surface_caps = surface.get_capabilities(&adapter);
        let format = surface_caps
            .formats
            .iter()
            .find(|f| **f == wgpu::TextureFormat::Bgra8UnormSrgb)
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| ChartError::Gpu("surface reports no formats".into()))?;

        // Prefer Mailbox (no CPU-blocking on missed deadlines) with Fifo fallback.
        let present_mode = if surface_caps
            .present_modes
            .contains(&wgpu::PresentMode::Mailbox)
        {
            log::info!("Using PresentMode::Mailbox");
            wgpu::PresentMode::Mailbox
        } else {
            log::info!("Mailbox unavailable, falling back to PresentMode::Fifo");
            wgpu::PresentMode::Fifo
        };

        log::info!("Surface: format={:?}", format);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode,
            alpha_mode: wgpu::CompositeAlphaMode::Auto,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &surface_config);

        let chart = ChartPipeline::new(
            &device,
            format,
            config.capacity,
            config.horizon_secs,
            config.grid_step_secs,
        );
        let staging = StagingRing::new(&device, config.frames_in_flight, config.capacity);
        log::info!(
            "Chart pipeline ready: {} vertices max, {} staging slots",
            config.capacity,
            config.frames_in_flight
        );

        Ok(Self {
            device,
            queue,
            surface,
            surface_config,
            chart,
            staging,
            lost,
        })
    }

    /// Resize the surface.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.surface_config.width = width;
        self.surface_config.height = height;
        self.surface.configure(&self.device, &self.surface_config);
    }

    /// Reason string if the device has been lost.
    pub fn lost_reason(&self) -> Option<String> {
        self.lost.lock().ok().and_then(|slot| slot.clone())
    }

    /// Acquire the next surface texture and create a command encoder.
    /// Returns None if the surface is lost/outdated (caller should skip this frame).
    pub fn begin_frame(&self) -> Option<FrameContext> {
        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.surface_config);
                return None;
            }
            Err(wgpu::SurfaceError::OutOfMemory) => {
                log::error!("GPU out of memory");
                return None;
            }
            Err(e) => {
                log::warn!("Surface error: {e:?}");
                return None;
            }
        };

        let view = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame_encoder"),
            });

        Some(FrameContext {
            output,
            view,
            encoder,
        })
    }

    /// Stage this frame's vertices and record the copy into the vertex buffer.
    /// Returns the vertex count to draw.
    pub fn upload_vertices(
        &mut self,
        slot: usize,
        encoder: &mut wgpu::CommandEncoder,
        vertices: &[ChartVertex],
    ) -> u32 {
        let count = vertices.len().min(self.chart.max_vertices);
        self.staging
            .upload(slot, encoder, &vertices[..count], &self.chart.vertex_buffer);
        count as u32
    }

    /// Grid, axes and data in one cleared pass.
    pub fn draw_chart(
        &self,
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
        data_count: u32,
    ) {
        sequencer::encode_chart(encoder, view, &self.chart, data_count);
    }

    /// Create an egui render pass that preserves existing content (LoadOp::Load).
    /// Returns a 'static render pass suitable for egui_wgpu::Renderer::render().
    pub fn begin_egui_pass(
        encoder: &mut wgpu::CommandEncoder,
        view: &wgpu::TextureView,
    ) -> wgpu::RenderPass<'static> {
        let render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("egui_render_pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view,
                resolve_target: None,
                depth_slice: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        render_pass.forget_lifetime()
    }

    /// Submit the command encoder and present.
    pub fn finish_frame(
        &self,
        encoder: wgpu::CommandEncoder,
        output: wgpu::SurfaceTexture,
        extra_cmd_bufs: Vec<wgpu::CommandBuffer>,
    ) {
        self.queue.submit(
            extra_cmd_bufs
                .into_iter()
                .chain(std::iter::once(encoder.finish())),
        );
        output.present();
    }
}
