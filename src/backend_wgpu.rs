//! The reference [`RasterBackend`] implementation, targeting wgpu.
//!
//! wgpu bakes stencil behavior into `RenderPipeline` state rather than
//! allowing it to be mutated per draw call, so this backend keeps one
//! prebuilt pipeline per [`StencilOp`], with the actual comparison function
//! and stencil reference for a [`StencilTest`] set dynamically (wgpu does
//! allow `set_stencil_reference` per draw, so `Equal(n)`/`NotEqualZero`
//! share one pipeline each and only vary the reference value). Pipelines and
//! gradient bind groups are kept behind `Arc` so they can be cheaply cloned
//! out of their cache before a render pass borrows the rest of `self`.

use std::sync::Arc;

use ahash::HashMap;
use wgpu::util::DeviceExt;

use crate::backend::{FrameInfo, GradientMesh, Mesh, RasterBackend, StencilOp, StencilTest};
use crate::color::Color;
use crate::error::TarpError;
use crate::id::GradientId;
use crate::vertex::{GradientVertexGpu, PositionVertex};

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ProjectionUniform {
    projection: [[f32; 4]; 4],
}

#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
struct ColorUniform {
    color: [f32; 4],
}

fn stencil_face_state(op: StencilOp, compare: wgpu::CompareFunction, front: bool) -> wgpu::StencilFaceState {
    let pass_op = match (op, front) {
        (StencilOp::Replace, _) => wgpu::StencilOperation::Replace,
        (StencilOp::Invert, _) => wgpu::StencilOperation::Invert,
        (StencilOp::IncrementDecrementWrap, true) => wgpu::StencilOperation::IncrementWrap,
        (StencilOp::IncrementDecrementWrap, false) => wgpu::StencilOperation::DecrementWrap,
        (StencilOp::Keep, _) => wgpu::StencilOperation::Keep,
        (StencilOp::ZeroCover, _) => wgpu::StencilOperation::Zero,
        (StencilOp::InvertCover, _) => wgpu::StencilOperation::Invert,
    };
    wgpu::StencilFaceState {
        compare,
        fail_op: wgpu::StencilOperation::Keep,
        depth_fail_op: wgpu::StencilOperation::Keep,
        pass_op,
    }
}

fn stencil_state_for(op: StencilOp, compare: wgpu::CompareFunction) -> wgpu::StencilState {
    wgpu::StencilState {
        front: stencil_face_state(op, compare, true),
        back: stencil_face_state(op, compare, false),
        read_mask: 0xff,
        write_mask: 0xff,
    }
}

/// Each `(op, compare)` pair gets its own pipeline; `compare` only ever takes
/// one of these three shapes, since [`StencilTest::Equal`]'s reference value
/// is supplied dynamically via `set_stencil_reference` rather than baked in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum CompareShape {
    Always,
    Equal,
    NotEqual,
}

impl From<StencilTest> for CompareShape {
    fn from(test: StencilTest) -> Self {
        match test {
            StencilTest::Always => CompareShape::Always,
            StencilTest::Equal(_) => CompareShape::Equal,
            StencilTest::NotEqualZero => CompareShape::NotEqual,
        }
    }
}

impl From<CompareShape> for wgpu::CompareFunction {
    fn from(shape: CompareShape) -> Self {
        match shape {
            CompareShape::Always => wgpu::CompareFunction::Always,
            CompareShape::Equal => wgpu::CompareFunction::Equal,
            CompareShape::NotEqual => wgpu::CompareFunction::NotEqual,
        }
    }
}

fn stencil_reference(test: StencilTest) -> u32 {
    match test {
        StencilTest::Equal(value) => value as u32,
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    op: StencilOpKey,
    compare: CompareShape,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum StencilOpKey {
    Replace,
    Invert,
    IncrementDecrementWrap,
    Keep,
    ZeroCover,
    InvertCover,
}

impl From<StencilOp> for StencilOpKey {
    fn from(op: StencilOp) -> Self {
        match op {
            StencilOp::Replace => StencilOpKey::Replace,
            StencilOp::Invert => StencilOpKey::Invert,
            StencilOp::IncrementDecrementWrap => StencilOpKey::IncrementDecrementWrap,
            StencilOp::Keep => StencilOpKey::Keep,
            StencilOp::ZeroCover => StencilOpKey::ZeroCover,
            StencilOp::InvertCover => StencilOpKey::InvertCover,
        }
    }
}

struct GradientRamp {
    #[allow(dead_code)]
    texture: wgpu::Texture,
    bind_group: Arc<wgpu::BindGroup>,
}

/// The reference wgpu-backed implementation of [`RasterBackend`].
pub struct WgpuBackend {
    device: Arc<wgpu::Device>,
    queue: Arc<wgpu::Queue>,
    target_format: wgpu::TextureFormat,

    depth_stencil_texture: Option<wgpu::Texture>,
    depth_stencil_view: Option<wgpu::TextureView>,

    solid_shader: wgpu::ShaderModule,
    gradient_shader: wgpu::ShaderModule,
    solid_bgl: wgpu::BindGroupLayout,
    gradient_bgl: wgpu::BindGroupLayout,
    gradient_sampler: wgpu::Sampler,

    solid_pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,
    gradient_pipelines: HashMap<PipelineKey, Arc<wgpu::RenderPipeline>>,

    projection_buffer: wgpu::Buffer,
    color_buffer: wgpu::Buffer,
    solid_bind_group: Arc<wgpu::BindGroup>,

    gradient_ramps: HashMap<GradientId, GradientRamp>,

    current_target: Option<wgpu::TextureView>,
    current_encoder: Option<wgpu::CommandEncoder>,
}

impl WgpuBackend {
    /// Creates a new backend targeting `target_format` (typically the
    /// surface's preferred format). The stencil/depth texture is allocated
    /// lazily on the first `begin_frame` call, once the viewport size is
    /// known.
    pub fn new(device: Arc<wgpu::Device>, queue: Arc<wgpu::Queue>, target_format: wgpu::TextureFormat) -> Result<Self, TarpError> {
        let solid_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tarp solid shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/solid.wgsl").into()),
        });
        let gradient_shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("tarp gradient shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("shaders/gradient.wgsl").into()),
        });

        let solid_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tarp solid bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, has_dynamic_offset: false, min_binding_size: None },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, has_dynamic_offset: false, min_binding_size: None },
                    count: None,
                },
            ],
        });

        let gradient_bgl = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("tarp gradient bind group layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX,
                    ty: wgpu::BindingType::Buffer { ty: wgpu::BufferBindingType::Uniform, has_dynamic_offset: false, min_binding_size: None },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture { multisampled: false, view_dimension: wgpu::TextureViewDimension::D1, sample_type: wgpu::TextureSampleType::Float { filterable: true } },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let gradient_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("tarp gradient ramp sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let projection_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tarp projection uniform"),
            size: std::mem::size_of::<ProjectionUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let color_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("tarp color uniform"),
            size: std::mem::size_of::<ColorUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let solid_bind_group = Arc::new(device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tarp solid bind group"),
            layout: &solid_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: projection_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: color_buffer.as_entire_binding() },
            ],
        }));

        Ok(WgpuBackend {
            device,
            queue,
            target_format,
            depth_stencil_texture: None,
            depth_stencil_view: None,
            solid_shader,
            gradient_shader,
            solid_bgl,
            gradient_bgl,
            gradient_sampler,
            solid_pipelines: HashMap::default(),
            gradient_pipelines: HashMap::default(),
            projection_buffer,
            color_buffer,
            solid_bind_group,
            gradient_ramps: HashMap::default(),
            current_target: None,
            current_encoder: None,
        })
    }

    fn ensure_depth_stencil(&mut self, size: (u32, u32)) {
        let needs_alloc = match &self.depth_stencil_texture {
            Some(tex) => tex.size().width != size.0 || tex.size().height != size.1,
            None => true,
        };
        if !needs_alloc {
            return;
        }
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tarp depth-stencil"),
            size: wgpu::Extent3d { width: size.0.max(1), height: size.1.max(1), depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Depth24PlusStencil8,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        self.depth_stencil_view = Some(texture.create_view(&wgpu::TextureViewDescriptor::default()));
        self.depth_stencil_texture = Some(texture);
    }

    fn solid_pipeline(&mut self, op: StencilOp, test: StencilTest) -> Arc<wgpu::RenderPipeline> {
        let key = PipelineKey { op: op.into(), compare: test.into() };
        if let Some(existing) = self.solid_pipelines.get(&key) {
            return existing.clone();
        }
        let pipeline = Arc::new(create_pipeline(&self.device, self.target_format, &self.solid_bgl, &self.solid_shader, op, test, false));
        self.solid_pipelines.insert(key, pipeline.clone());
        pipeline
    }

    fn gradient_pipeline(&mut self, op: StencilOp, test: StencilTest) -> Arc<wgpu::RenderPipeline> {
        let key = PipelineKey { op: op.into(), compare: test.into() };
        if let Some(existing) = self.gradient_pipelines.get(&key) {
            return existing.clone();
        }
        let pipeline = Arc::new(create_pipeline(&self.device, self.target_format, &self.gradient_bgl, &self.gradient_shader, op, test, true));
        self.gradient_pipelines.insert(key, pipeline.clone());
        pipeline
    }

    /// Binds the target view for the frame currently being recorded. Callers
    /// own swapchain/surface acquisition; this only needs the resulting
    /// view.
    pub fn set_target(&mut self, view: wgpu::TextureView) {
        self.current_target = Some(view);
    }
}

#[allow(clippy::too_many_arguments)]
fn create_pipeline(
    device: &wgpu::Device,
    target_format: wgpu::TextureFormat,
    bgl: &wgpu::BindGroupLayout,
    shader: &wgpu::ShaderModule,
    op: StencilOp,
    test: StencilTest,
    gradient: bool,
) -> wgpu::RenderPipeline {
    let compare: wgpu::CompareFunction = CompareShape::from(test).into();
    let stencil = stencil_state_for(op, compare);
    let depth_stencil = wgpu::DepthStencilState {
        format: wgpu::TextureFormat::Depth24PlusStencil8,
        depth_write_enabled: false,
        depth_compare: wgpu::CompareFunction::Always,
        stencil,
        bias: wgpu::DepthBiasState::default(),
    };

    let layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("tarp pipeline layout"),
        bind_group_layouts: &[bgl],
        push_constant_ranges: &[],
    });

    // Stencil-only passes (building a fill fan or a clip mask) must not
    // write color at all, since their geometry is allowed to overlap itself.
    // The cover passes draw the actual color while resetting the raster bits
    // the stencil pass set, so they write color too.
    let writes_color = matches!(op, StencilOp::Keep | StencilOp::ZeroCover | StencilOp::InvertCover);
    let color_target = wgpu::ColorTargetState {
        format: target_format,
        blend: Some(wgpu::BlendState {
            color: wgpu::BlendComponent { src_factor: wgpu::BlendFactor::SrcAlpha, dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha, operation: wgpu::BlendOperation::Add },
            alpha: wgpu::BlendComponent { src_factor: wgpu::BlendFactor::One, dst_factor: wgpu::BlendFactor::OneMinusSrcAlpha, operation: wgpu::BlendOperation::Add },
        }),
        write_mask: if writes_color { wgpu::ColorWrites::ALL } else { wgpu::ColorWrites::empty() },
    };

    let position_layout = PositionVertex::desc();
    let gradient_layout = GradientVertexGpu::desc();
    let buffers: [wgpu::VertexBufferLayout; 1] = if gradient { [gradient_layout] } else { [position_layout] };

    device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some("tarp render pipeline"),
        layout: Some(&layout),
        vertex: wgpu::VertexState { module: shader, entry_point: "vs_main", buffers: &buffers, compilation_options: Default::default() },
        fragment: Some(wgpu::FragmentState { module: shader, entry_point: "fs_main", targets: &[Some(color_target)], compilation_options: Default::default() }),
        primitive: wgpu::PrimitiveState::default(),
        depth_stencil: Some(depth_stencil),
        multisample: wgpu::MultisampleState::default(),
        multiview: None,
        cache: None,
    })
}

impl RasterBackend for WgpuBackend {
    fn begin_frame(&mut self, info: FrameInfo) -> Result<(), TarpError> {
        self.ensure_depth_stencil(info.viewport_size);
        let projection = ProjectionUniform { projection: info.projection.to_array() };
        self.queue.write_buffer(&self.projection_buffer, 0, bytemuck::bytes_of(&projection));
        self.current_encoder = Some(self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("tarp frame encoder"),
        }));
        Ok(())
    }

    fn end_frame(&mut self) -> Result<(), TarpError> {
        if let Some(encoder) = self.current_encoder.take() {
            self.queue.submit(std::iter::once(encoder.finish()));
        }
        self.current_target = None;
        Ok(())
    }

    fn draw_solid(&mut self, mesh: Mesh<'_>, color: Color, op: StencilOp, test: StencilTest) {
        if mesh.vertices.is_empty() {
            return;
        }
        let vertices: Vec<PositionVertex> = mesh.vertices.iter().map(|v| PositionVertex { position: [v.x, v.y] }).collect();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tarp solid vertex buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        self.queue.write_buffer(&self.color_buffer, 0, bytemuck::bytes_of(&ColorUniform { color: color.to_array() }));

        let pipeline = self.solid_pipeline(op, test);
        let bind_group = self.solid_bind_group.clone();
        let reference = stencil_reference(test);

        let Some(target) = self.current_target.as_ref() else {
            tracing::warn!("draw_solid called with no target bound; call set_target first");
            return;
        };
        let Some(depth_view) = self.depth_stencil_view.as_ref() else {
            tracing::warn!("draw_solid called before begin_frame allocated a depth-stencil texture");
            return;
        };
        let Some(encoder) = self.current_encoder.as_mut() else {
            tracing::warn!("draw_solid called outside of begin_frame/end_frame");
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tarp solid pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
                stencil_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_stencil_reference(reference);
        pass.set_bind_group(0, &*bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..vertices.len() as u32, 0..1);
    }

    fn draw_gradient(&mut self, mesh: GradientMesh<'_>, op: StencilOp, test: StencilTest) {
        if mesh.vertices.is_empty() {
            return;
        }
        let Some(ramp) = self.gradient_ramps.get(&mesh.gradient_id) else {
            tracing::warn!(gradient = %mesh.gradient_id, "draw_gradient called before upload_gradient_ramp");
            return;
        };
        let bind_group = ramp.bind_group.clone();
        let vertices: Vec<GradientVertexGpu> = mesh.vertices.iter().map(|v| GradientVertexGpu { position: [v.pos.x, v.pos.y], tc: v.tc }).collect();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("tarp gradient vertex buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });

        let pipeline = self.gradient_pipeline(op, test);
        let reference = stencil_reference(test);

        let Some(target) = self.current_target.as_ref() else {
            tracing::warn!("draw_gradient called with no target bound; call set_target first");
            return;
        };
        let Some(depth_view) = self.depth_stencil_view.as_ref() else {
            tracing::warn!("draw_gradient called before begin_frame allocated a depth-stencil texture");
            return;
        };
        let Some(encoder) = self.current_encoder.as_mut() else {
            tracing::warn!("draw_gradient called outside of begin_frame/end_frame");
            return;
        };

        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tarp gradient pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target,
                resolve_target: None,
                ops: wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
                stencil_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Load, store: wgpu::StoreOp::Store }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        pass.set_pipeline(&pipeline);
        pass.set_stencil_reference(reference);
        pass.set_bind_group(0, &*bind_group, &[]);
        pass.set_vertex_buffer(0, vertex_buffer.slice(..));
        pass.draw(0..vertices.len() as u32, 0..1);
    }

    fn upload_gradient_ramp(&mut self, gradient_id: GradientId, ramp: &[[u8; 4]]) {
        let width = ramp.len() as u32;
        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("tarp gradient ramp"),
            size: wgpu::Extent3d { width, height: 1, depth_or_array_layers: 1 },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D1,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.queue.write_texture(
            wgpu::ImageCopyTexture { texture: &texture, mip_level: 0, origin: wgpu::Origin3d::ZERO, aspect: wgpu::TextureAspect::All },
            bytemuck::cast_slice(ramp),
            wgpu::ImageDataLayout { offset: 0, bytes_per_row: Some(width * 4), rows_per_image: None },
            wgpu::Extent3d { width, height: 1, depth_or_array_layers: 1 },
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = Arc::new(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("tarp gradient bind group"),
            layout: &self.gradient_bgl,
            entries: &[
                wgpu::BindGroupEntry { binding: 0, resource: self.projection_buffer.as_entire_binding() },
                wgpu::BindGroupEntry { binding: 1, resource: wgpu::BindingResource::TextureView(&view) },
                wgpu::BindGroupEntry { binding: 2, resource: wgpu::BindingResource::Sampler(&self.gradient_sampler) },
            ],
        }));
        self.gradient_ramps.insert(gradient_id, GradientRamp { texture, bind_group });
    }

    fn clear_stencil(&mut self) {
        let (Some(depth_view), Some(encoder)) = (self.depth_stencil_view.as_ref(), self.current_encoder.as_mut()) else {
            return;
        };
        encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("tarp clear stencil"),
            color_attachments: &[],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: depth_view,
                depth_ops: None,
                stencil_ops: Some(wgpu::Operations { load: wgpu::LoadOp::Clear(0), store: wgpu::StoreOp::Store }),
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
    }
}
