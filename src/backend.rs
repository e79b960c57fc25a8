//! The GPU driver abstraction the rasterizer draws through.
//!
//! A concrete backend owns the actual device/queue/pipelines for one GPU
//! API; [`crate::raster::Rasterizer`] only ever talks to this trait, so a
//! new target API is added by implementing it once, not by touching the
//! stencil-pass orchestration. [`crate::backend_wgpu`] is the one
//! implementation shipped with this crate.

use crate::color::Color;
use crate::error::TarpError;
use crate::geometry::{Mat4, Vec2};
use crate::gradient::GradientVertex;

/// Which stencil-buffer operation a draw call should perform, expressed the
/// way the rasterizer reasons about fill rules and clip composition rather
/// than in terms of any one GPU API's enum names. A concrete backend is
/// expected to have one prebuilt pipeline per variant, since most GPU APIs
/// (wgpu included) bake the stencil op into pipeline state rather than
/// allowing it to be mutated per draw call the way desktop GL does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilOp {
    /// Unconditionally writes `value` into the stencil buffer. Used for the
    /// even-odd fill's invert pass and for building a clip mask.
    Replace,
    /// Inverts (XORs the low bit of) the stencil value. Used for even-odd
    /// fill and for even-odd-style clip composition.
    Invert,
    /// Increments (wrapping) on front-facing triangles and decrements
    /// (wrapping) on back-facing triangles in the same draw, implementing
    /// the non-zero fill rule's winding-number accumulation in one pass.
    IncrementDecrementWrap,
    /// Leaves the stencil buffer untouched. Used only for clip-mask building
    /// passes that must test the previously-accumulated plane without
    /// disturbing it.
    Keep,
    /// Zeros the stencil value. Used by the fill cover pass: it draws the
    /// filled color while simultaneously clearing the raster bits the
    /// stencil pass set, so the next shape's `NotEqualZero`/`Equal` test
    /// isn't corrupted by this shape's leftover coverage.
    ZeroCover,
    /// Inverts the stencil value. Used by the stroke cover pass for the same
    /// reason `ZeroCover` is used for fills: the stroke's stencil pass always
    /// sets the bit with `Replace`, so inverting it back off during the
    /// cover pass clears it.
    InvertCover,
}

/// Which stencil comparison a cover/draw pass tests against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StencilTest {
    /// Passes where the stencil value is nonzero (the non-zero fill rule,
    /// and the general "inside any clip region" test).
    NotEqualZero,
    /// Passes only where the stencil value exactly equals a reference value
    /// (nested clipping against a specific plane's reference count).
    Equal(u8),
    Always,
}

/// One triangle-list mesh of plain (untextured) vertices, in device space.
#[derive(Debug, Clone)]
pub struct Mesh<'a> {
    pub vertices: &'a [Vec2],
}

/// A gradient-sampled triangle-list mesh: device-space position plus ramp
/// texture coordinate per vertex.
#[derive(Debug, Clone)]
pub struct GradientMesh<'a> {
    pub vertices: &'a [GradientVertex],
    pub gradient_id: crate::id::GradientId,
}

/// Per-frame state a backend needs before any draw calls: the
/// device-to-clip-space projection and the render target it draws into.
#[derive(Debug, Clone, Copy)]
pub struct FrameInfo {
    pub projection: Mat4,
    pub viewport_size: (u32, u32),
}

/// The abstraction the rasterizer draws through. A real implementation owns
/// a device/queue and a set of prebuilt pipelines, one per `StencilOp` x
/// `StencilTest` combination the rasterizer actually uses.
pub trait RasterBackend {
    /// Called once per frame before any draw calls.
    fn begin_frame(&mut self, info: FrameInfo) -> Result<(), TarpError>;

    /// Called once per frame after all draw calls; backends that batch
    /// commands should submit them here.
    fn end_frame(&mut self) -> Result<(), TarpError>;

    /// Draws `mesh` with the given flat color, writing to the stencil buffer
    /// per `op` and testing against it per `test`.
    fn draw_solid(&mut self, mesh: Mesh<'_>, color: Color, op: StencilOp, test: StencilTest);

    /// Draws `mesh`, sampling `gradient_id`'s ramp texture at each vertex's
    /// `tc`, writing/testing the stencil buffer the same way as
    /// `draw_solid`.
    fn draw_gradient(&mut self, mesh: GradientMesh<'_>, op: StencilOp, test: StencilTest);

    /// Registers (or re-uploads, if already registered) the ramp texture
    /// data for a gradient.
    fn upload_gradient_ramp(&mut self, gradient_id: crate::id::GradientId, ramp: &[[u8; 4]]);

    /// Clears the stencil buffer to zero, e.g. at the start of a frame or
    /// after `reset_clipping`.
    fn clear_stencil(&mut self);
}
