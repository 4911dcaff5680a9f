use wgpu::util::DeviceExt;

use super::guides::{grid_vertices, AXIS_VERTICES};
use super::vertex::ChartVertex;

/// All GPU resources for the chart: two pipelines sharing one shader, the
/// fixed guide geometry and the persistent data vertex buffer.
pub struct ChartPipeline {
    /// Line strip for the live series.
    pub data_pipeline: wgpu::RenderPipeline,
    /// Line list for grid and axes.
    pub guide_pipeline: wgpu::RenderPipeline,
    pub grid_buffer: wgpu::Buffer,
    pub grid_count: u32,
    pub axis_buffer: wgpu::Buffer,
    pub axis_count: u32,
    /// Copy target for the staging ring. Holds up to `max_vertices`.
    pub vertex_buffer: wgpu::Buffer,
    pub max_vertices: usize,
}

impl ChartPipeline {
    pub fn new(
        device: &wgpu::Device,
        format: wgpu::TextureFormat,
        max_vertices: usize,
        horizon_secs: f64,
        grid_step_secs: f64,
    ) -> Self {
        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("chart_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/chart.wgsl").into()),
        });

        // No bindings: vertices arrive already in NDC.
        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("chart_pipeline_layout"),
            bind_group_layouts: &[],
            push_constant_ranges: &[],
        });

        let data_pipeline = line_pipeline(
            device,
            &pipeline_layout,
            &shader,
            format,
            "data_pipeline",
            "fs_data",
            wgpu::PrimitiveTopology::LineStrip,
        );
        let guide_pipeline = line_pipeline(
            device,
            &pipeline_layout,
            &shader,
            format,
            "guide_pipeline",
            "fs_guide",
            wgpu::PrimitiveTopology::LineList,
        );

        let grid = grid_vertices(horizon_secs, grid_step_secs);
        // Zero-sized vertex buffers are invalid; keep one dummy vertex.
        let grid_contents = if grid.is_empty() {
            vec![ChartVertex::default()]
        } else {
            grid.clone()
        };
        let grid_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("grid_vertex_buffer"),
            contents: bytemuck::cast_slice(&grid_contents),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let axis_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("axis_vertex_buffer"),
            contents: bytemuck::cast_slice(&AXIS_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let vertex_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("data_vertex_buffer"),
            size: (max_vertices.max(1) * std::mem::size_of::<ChartVertex>())
                as wgpu::BufferAddress,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        Self {
            data_pipeline,
            guide_pipeline,
            grid_buffer,
            grid_count: grid.len() as u32,
            axis_buffer,
            axis_count: AXIS_VERTICES.len() as u32,
            vertex_buffer,
            max_vertices,
        }
    }
}

fn line_pipeline(
    device: &wgpu::Device,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    format: wgpu::TextureFormat,
    label: &str,
    fragment_entry: &str,
    topology: wgpu::PrimitiveTopology,
) -> wgpu::RenderPipeline {
    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),
        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            buffers: &[ChartVertex::layout()],
            compilation_options: Default::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(fragment_entry),
            targets: &[Some(wgpu::ColorTargetState {
                format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: Default::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}
