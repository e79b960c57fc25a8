//! GPU vertex layouts used by the wgpu backend.

use wgpu::VertexBufferLayout;

/// A plain device-space position, used for solid-color fill/stroke/clip
/// geometry.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct PositionVertex {
    pub position: [f32; 2],
}

impl PositionVertex {
    pub fn desc() -> VertexBufferLayout<'static> {
        const ATTRIBS: [wgpu::VertexAttribute; 1] = wgpu::vertex_attr_array![0 => Float32x2];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PositionVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBS,
        }
    }
}

/// Device-space position plus a gradient ramp-texture coordinate, used for
/// linear/radial gradient cover passes.
#[repr(C)]
#[derive(Copy, Clone, Debug, bytemuck::Pod, bytemuck::Zeroable)]
pub struct GradientVertexGpu {
    pub position: [f32; 2],
    pub tc: f32,
}

impl GradientVertexGpu {
    pub fn desc() -> VertexBufferLayout<'static> {
        const ATTRIBS: [wgpu::VertexAttribute; 2] =
            wgpu::vertex_attr_array![0 => Float32x2, 1 => Float32];
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<GradientVertexGpu>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &ATTRIBS,
        }
    }
}
