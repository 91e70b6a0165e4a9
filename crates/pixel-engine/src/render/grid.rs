use bytemuck::{Pod, Zeroable};
use wgpu::util::DeviceExt;

use pixel_view::grid::InstanceBuffer;
use pixel_view::math::Mat4;

use crate::paint::Color;
use crate::render::{RenderCtx, RenderTarget};

use super::common::{
    min_binding_size, premul_alpha_blend, QuadVertex, PICK_FORMAT, QUAD_FILL_INDICES,
    QUAD_LINE_INDICES, QUAD_VERTICES,
};

/// Number of palette entries addressable by fill id.
pub const PALETTE_LEN: usize = 8;

/// Colors used by [`GridRenderer`]. Fill ids index `palette` (clamped).
#[derive(Debug, Clone)]
pub struct GridStyle {
    pub palette: [Color; PALETTE_LEN],
    pub line_color: Color,
    /// Composited over the hovered cell.
    pub hover_color: Color,
}

impl Default for GridStyle {
    fn default() -> Self {
        let hex = |s: &str| Color::from_hex(s).unwrap_or_default();
        Self {
            palette: [
                hex("#17181c"), // empty
                hex("#e84a5f"),
                hex("#ff847c"),
                hex("#fecea8"),
                hex("#99b898"),
                hex("#2a9d8f"),
                hex("#457b9d"),
                hex("#f4a261"),
            ],
            line_color: Color::from_straight(0.2, 0.2, 0.24, 1.0),
            hover_color: Color::from_straight(1.0, 1.0, 1.0, 0.35),
        }
    }
}

/// Per-frame view parameters.
#[derive(Debug, Copy, Clone)]
pub struct GridView {
    pub pan_zoom: Mat4,
    pub origin_at: [f32; 3],
    /// Cell edge in device pixels at zoom 1 (`GridStreamer::dpr_size`).
    pub cell_size: f32,
    pub hover: Option<(i32, i32)>,
}

/// Instanced grid renderer with an integer picking target.
///
/// Each frame draws every streamed cell twice: filled quads, then outlines.
/// Both write `(x, y, fill, 1)` into the picking texture (outlines with an empty
/// write mask, so only fills land there).
#[derive(Default)]
pub struct GridRenderer {
    style: GridStyle,

    pipeline_format: Option<wgpu::TextureFormat>,
    fill_pipeline: Option<wgpu::RenderPipeline>,
    line_pipeline: Option<wgpu::RenderPipeline>,

    bind_group_layout: Option<wgpu::BindGroupLayout>,
    bind_group: Option<wgpu::BindGroup>,
    uniform_ubo: Option<wgpu::Buffer>,

    quad_vbo: Option<wgpu::Buffer>,
    fill_ibo: Option<wgpu::Buffer>,
    line_ibo: Option<wgpu::Buffer>,

    instance_vbo: Option<wgpu::Buffer>,
    instance_capacity: usize,
    instance_count: u32,
    staging: Vec<GridInstance>,

    pick_texture: Option<wgpu::Texture>,
    pick_view: Option<wgpu::TextureView>,
    pick_size: (u32, u32),
}

impl GridRenderer {
    pub fn new(style: GridStyle) -> Self {
        Self {
            style,
            ..Self::default()
        }
    }

    pub fn style(&self) -> &GridStyle {
        &self.style
    }

    /// Overwrites the whole instance buffer with the streamer's window.
    pub fn upload_instances(&mut self, ctx: &RenderCtx<'_>, instances: &InstanceBuffer) {
        self.staging.clear();
        self.staging.extend(
            instances
                .iter()
                .map(|[x, y, fill]| GridInstance { cell: [x, y, fill, 0] }),
        );
        self.instance_count = self.staging.len() as u32;
        if self.staging.is_empty() {
            return;
        }

        self.ensure_instance_capacity(ctx, self.staging.len());
        let Some(vbo) = self.instance_vbo.as_ref() else { return };
        ctx.queue.write_buffer(vbo, 0, bytemuck::cast_slice(&self.staging));
    }

    /// Picking texture and its size, once the first frame has been rendered.
    pub fn pick_target(&self) -> Option<(&wgpu::Texture, (u32, u32))> {
        self.pick_texture.as_ref().map(|t| (t, self.pick_size))
    }

    pub fn render(&mut self, ctx: &RenderCtx<'_>, target: &mut RenderTarget<'_>, view: &GridView) {
        self.ensure_pipeline(ctx);
        self.ensure_static_buffers(ctx);
        self.ensure_bindings(ctx);
        self.ensure_pick_target(ctx);

        if let Some(ubo) = self.uniform_ubo.as_ref() {
            let u = GridUniform::new(&self.style, view, ctx.surface_size);
            ctx.queue.write_buffer(ubo, 0, bytemuck::bytes_of(&u));
        }

        let Some(fill_pipeline) = self.fill_pipeline.as_ref() else { return };
        let Some(line_pipeline) = self.line_pipeline.as_ref() else { return };
        let Some(bind_group) = self.bind_group.as_ref() else { return };
        let Some(quad_vbo) = self.quad_vbo.as_ref() else { return };
        let Some(fill_ibo) = self.fill_ibo.as_ref() else { return };
        let Some(line_ibo) = self.line_ibo.as_ref() else { return };
        let Some(pick_view) = self.pick_view.as_ref() else { return };

        let mut rpass = target.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("pixel grid pass"),
            color_attachments: &[
                Some(wgpu::RenderPassColorAttachment {
                    view: target.color_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Load,
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
                Some(wgpu::RenderPassColorAttachment {
                    view: pick_view,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                }),
            ],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
            multiview_mask: None,
        });

        // The pass still clears the picking target when nothing is streamed.
        let Some(instance_vbo) = self.instance_vbo.as_ref() else { return };
        if self.instance_count == 0 {
            return;
        }
        let instances = 0..self.instance_count;

        rpass.set_bind_group(0, bind_group, &[]);
        rpass.set_vertex_buffer(0, quad_vbo.slice(..));
        rpass.set_vertex_buffer(1, instance_vbo.slice(..));

        rpass.set_pipeline(fill_pipeline);
        rpass.set_index_buffer(fill_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..QUAD_FILL_INDICES.len() as u32, 0, instances.clone());

        rpass.set_pipeline(line_pipeline);
        rpass.set_index_buffer(line_ibo.slice(..), wgpu::IndexFormat::Uint16);
        rpass.draw_indexed(0..QUAD_LINE_INDICES.len() as u32, 0, instances);
    }

    fn ensure_pipeline(&mut self, ctx: &RenderCtx<'_>) {
        if self.pipeline_format == Some(ctx.surface_format) && self.fill_pipeline.is_some() {
            return;
        }

        let shader = ctx.device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("pixel grid shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/grid.wgsl").into()),
        });

        let bind_group_layout = ctx
            .device
            .create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some("pixel grid bgl"),
                entries: &[wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX | wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: min_binding_size::<GridUniform>(),
                    },
                    count: None,
                }],
            });

        let pipeline_layout = ctx
            .device
            .create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                label: Some("pixel grid pipeline layout"),
                bind_group_layouts: &[&bind_group_layout],
                immediate_size: 0,
            });

        let fill = create_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            PipelineKind::Fill,
        );
        let line = create_pipeline(
            ctx,
            &pipeline_layout,
            &shader,
            PipelineKind::Line,
        );

        self.pipeline_format = Some(ctx.surface_format);
        self.fill_pipeline = Some(fill);
        self.line_pipeline = Some(line);
        self.bind_group_layout = Some(bind_group_layout);

        self.bind_group = None;
        self.uniform_ubo = None;
    }

    fn ensure_bindings(&mut self, ctx: &RenderCtx<'_>) {
        if self.bind_group.is_some() && self.uniform_ubo.is_some() {
            return;
        }
        let Some(bgl) = self.bind_group_layout.as_ref() else { return };

        let ubo = ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixel grid ubo"),
            size: std::mem::size_of::<GridUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        let bind_group = ctx.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("pixel grid bind group"),
            layout: bgl,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: ubo.as_entire_binding(),
            }],
        });

        self.uniform_ubo = Some(ubo);
        self.bind_group = Some(bind_group);
    }

    fn ensure_static_buffers(&mut self, ctx: &RenderCtx<'_>) {
        if self.quad_vbo.is_some() && self.fill_ibo.is_some() && self.line_ibo.is_some() {
            return;
        }

        self.quad_vbo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pixel grid quad vbo"),
            contents: bytemuck::cast_slice(&QUAD_VERTICES),
            usage: wgpu::BufferUsages::VERTEX,
        }));
        self.fill_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pixel grid fill ibo"),
            contents: bytemuck::cast_slice(&QUAD_FILL_INDICES),
            usage: wgpu::BufferUsages::INDEX,
        }));
        // Padded to 6 indices: buffer sizes must be a multiple of 4 bytes.
        let mut line = [0u16; 6];
        line[..QUAD_LINE_INDICES.len()].copy_from_slice(&QUAD_LINE_INDICES);
        self.line_ibo = Some(ctx.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("pixel grid line ibo"),
            contents: bytemuck::cast_slice(&line),
            usage: wgpu::BufferUsages::INDEX,
        }));
    }

    fn ensure_pick_target(&mut self, ctx: &RenderCtx<'_>) {
        if self.pick_texture.is_some() && self.pick_size == ctx.surface_size {
            return;
        }
        let (width, height) = ctx.surface_size;

        let texture = ctx.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("pixel pick target"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: PICK_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        log::debug!("pick target {width}x{height}");

        self.pick_texture = Some(texture);
        self.pick_view = Some(view);
        self.pick_size = ctx.surface_size;
    }

    fn ensure_instance_capacity(&mut self, ctx: &RenderCtx<'_>, required_instances: usize) {
        if required_instances <= self.instance_capacity && self.instance_vbo.is_some() {
            return;
        }

        let new_cap = required_instances.next_power_of_two().max(256);
        self.instance_vbo = Some(ctx.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("pixel grid instance vbo"),
            size: (new_cap * std::mem::size_of::<GridInstance>()) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        }));
        self.instance_capacity = new_cap;
    }
}

#[derive(Debug, Copy, Clone, Eq, PartialEq)]
enum PipelineKind {
    Fill,
    Line,
}

fn create_pipeline(
    ctx: &RenderCtx<'_>,
    layout: &wgpu::PipelineLayout,
    shader: &wgpu::ShaderModule,
    kind: PipelineKind,
) -> wgpu::RenderPipeline {
    let (label, entry, topology, strip_index_format, pick_writes) = match kind {
        PipelineKind::Fill => (
            "pixel grid fill pipeline",
            "fs_fill",
            wgpu::PrimitiveTopology::TriangleList,
            None,
            wgpu::ColorWrites::ALL,
        ),
        PipelineKind::Line => (
            "pixel grid line pipeline",
            "fs_line",
            wgpu::PrimitiveTopology::LineStrip,
            Some(wgpu::IndexFormat::Uint16),
            wgpu::ColorWrites::empty(),
        ),
    };

    ctx.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(label),
        layout: Some(layout),

        vertex: wgpu::VertexState {
            module: shader,
            entry_point: Some("vs_main"),
            compilation_options: Default::default(),
            buffers: &[QuadVertex::layout(), GridInstance::layout()],
        },

        fragment: Some(wgpu::FragmentState {
            module: shader,
            entry_point: Some(entry),
            compilation_options: Default::default(),
            targets: &[
                Some(wgpu::ColorTargetState {
                    format: ctx.surface_format,
                    blend: Some(premul_alpha_blend()),
                    write_mask: wgpu::ColorWrites::ALL,
                }),
                // Integer formats are not blendable.
                Some(wgpu::ColorTargetState {
                    format: PICK_FORMAT,
                    blend: None,
                    write_mask: pick_writes,
                }),
            ],
        }),

        primitive: wgpu::PrimitiveState {
            topology,
            strip_index_format,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            polygon_mode: wgpu::PolygonMode::Fill,
            unclipped_depth: false,
            conservative: false,
        },

        depth_stencil: None,
        multisample: wgpu::MultisampleState::default(),
        multiview_mask: None,
        cache: None,
    })
}

/// Uniform block mirrored by `Uniforms` in `grid.wgsl`.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub(super) struct GridUniform {
    projection: [[f32; 4]; 4],
    pan_zoom: [[f32; 4]; 4],
    origin_at: [f32; 4],
    hover: [i32; 4],
    size: [f32; 4],
    line_color: [f32; 4],
    hover_color: [f32; 4],
    palette: [[f32; 4]; PALETTE_LEN],
}

impl GridUniform {
    fn new(style: &GridStyle, view: &GridView, surface_size: (u32, u32)) -> Self {
        let (w, h) = (surface_size.0.max(1) as f32, surface_size.1.max(1) as f32);
        let projection = Mat4::orthographic(0.0, w, h, 0.0, 0.0, 1.0);
        let [ox, oy, zoom] = view.origin_at;
        let hover = match view.hover {
            Some((x, y)) => [x, y, 1, 0],
            None => [0, 0, 0, 0],
        };

        Self {
            projection: projection.to_cols_array_2d(),
            pan_zoom: view.pan_zoom.to_cols_array_2d(),
            origin_at: [ox, oy, zoom, 0.0],
            hover,
            size: [view.cell_size, 0.0, 0.0, 0.0],
            line_color: style.line_color.to_array(),
            hover_color: style.hover_color.to_array(),
            palette: style.palette.map(Color::to_array),
        }
    }
}

/// One streamed cell, `(x, y, fill, 0)`. Vertex strides must be 4-byte aligned,
/// so the `i16` triple is padded to four lanes.
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
struct GridInstance {
    cell: [i16; 4],
}

impl GridInstance {
    const ATTRS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![1 => Sint16x4];

    fn layout() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GridInstance>() as u64,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRS,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn view(hover: Option<(i32, i32)>) -> GridView {
        GridView {
            pan_zoom: Mat4::identity().scale([3.0, 3.0, 1.0]),
            origin_at: [0.0, 0.0, 3.0],
            cell_size: 24.0,
            hover,
        }
    }

    #[test]
    fn uniform_encodes_hover_flag() {
        let style = GridStyle::default();
        let u = GridUniform::new(&style, &view(Some((0, -4))), (800, 600));
        assert_eq!(u.hover, [0, -4, 1, 0]);

        let u = GridUniform::new(&style, &view(None), (800, 600));
        assert_eq!(u.hover[2], 0);
    }

    #[test]
    fn uniform_projection_covers_surface() {
        let u = GridUniform::new(&GridStyle::default(), &view(None), (800, 600));
        let proj = Mat4::from_cols_array(bytemuck::cast(u.projection));
        let br = proj.transform_point([800.0, 600.0, 0.0]);
        assert!((br[0] - 1.0).abs() < 1e-5 && (br[1] + 1.0).abs() < 1e-5);
        assert_eq!(u.size[0], 24.0);
        assert_eq!(u.pan_zoom[0][0], 3.0);
    }

    #[test]
    fn instance_is_eight_bytes() {
        assert_eq!(std::mem::size_of::<GridInstance>(), 8);
    }

    #[test]
    fn default_palette_parses() {
        let style = GridStyle::default();
        assert!(style.palette.iter().all(|c| c.a == 1.0));
    }
}
