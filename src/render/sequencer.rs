use super::pipeline::ChartPipeline;

/// Clear color for the plot (dark grey).
pub const CLEAR_COLOR: wgpu::Color = wgpu::Color {
    r: 0.1,
    g: 0.1,
    b: 0.1,
    a: 1.0,
};

/// Draw passes in layering order, back to front.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawPass {
    Grid,
    Axes,
    Data,
}

impl DrawPass {
    pub const ORDER: [DrawPass; 3] = [Self::Grid, Self::Axes, Self::Data];
}

/// Passes to issue this frame. The data pass drops out when the window is empty.
pub fn passes_for(data_count: u32) -> impl Iterator<Item = DrawPass> {
    DrawPass::ORDER
        .into_iter()
        .filter(move |p| *p != DrawPass::Data || data_count > 0)
}

/// Clear the target once, then draw grid, axes and the data strip.
pub fn encode_chart(
    encoder: &mut wgpu::CommandEncoder,
    view: &wgpu::TextureView,
    pipeline: &ChartPipeline,
    data_count: u32,
) {
    let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
        label: Some("chart_render_pass"),
        color_attachments: &[Some(wgpu::RenderPassColorAttachment {
            view,
            resolve_target: None,
            depth_slice: None,
            ops: wgpu::Operations {
                load: wgpu::LoadOp::Clear(CLEAR_COLOR),
                store: wgpu::StoreOp::Store,
            },
        })],
        depth_stencil_attachment: None,
        timestamp_writes: None,
        occlusion_query_set: None,
    });

    for pass in passes_for(data_count) {
        match pass {
            DrawPass::Grid => {
                if pipeline.grid_count == 0 {
                    continue;
                }
                render_pass.set_pipeline(&pipeline.guide_pipeline);
                render_pass.set_vertex_buffer(0, pipeline.grid_buffer.slice(..));
                render_pass.draw(0..pipeline.grid_count, 0..1);
            }
            DrawPass::Axes => {
                render_pass.set_pipeline(&pipeline.guide_pipeline);
                render_pass.set_vertex_buffer(0, pipeline.axis_buffer.slice(..));
                render_pass.draw(0..pipeline.axis_count, 0..1);
            }
            DrawPass::Data => {
                render_pass.set_pipeline(&pipeline.data_pipeline);
                render_pass.set_vertex_buffer(0, pipeline.vertex_buffer.slice(..));
                render_pass.draw(0..data_count, 0..1);
            }
        }
    }
}
