//! A GPU-accelerated vector-graphics rasterizer built on stencil-buffer
//! fill/stroke techniques: paths built from lines and cubic/quadratic
//! Béziers, even-odd and non-zero fills, miter/round/bevel stroking with
//! dashing, linear and radial gradients, and a bounded nested clipping
//! stack.
//!
//! The crate is organized bottom-up:
//!
//! - [`geometry`], [`color`] — vector/matrix/transform/color primitives.
//! - [`path`] — the path builder and its contour/segment representation.
//! - [`flatten`] — adaptive Bézier flattening into polylines.
//! - [`style`] — paint, fill rule, and stroke style types.
//! - [`stroker`] — turns a flattened contour into stroke triangle geometry.
//! - [`gradient`] — gradient paint definitions and their cover-pass fans.
//! - [`cache`] — the per-path [`cache::RenderCache`] with piecewise dirty
//!   tracking.
//! - [`backend`] — the [`backend::RasterBackend`] trait a GPU driver
//!   implements; [`backend_wgpu`] is the wgpu-backed implementation shipped
//!   with this crate.
//! - [`raster`] — stencil-pass orchestration and the nested clipping stack.
//! - [`context`] — [`context::Context`], the public entry point tying all of
//!   the above together.
//! - [`error`] — the [`error::TarpError`] taxonomy and thread-local
//!   last-error accessor.
//! - [`id`] — the [`id::GradientId`] handle type.

pub mod backend;
pub mod backend_wgpu;
pub mod cache;
pub mod color;
pub mod context;
pub mod error;
pub mod flatten;
pub mod geometry;
pub mod gradient;
pub mod id;
pub mod path;
pub mod raster;
pub mod style;
pub mod stroker;
pub mod vertex;

pub use backend::{FrameInfo, GradientMesh, Mesh, RasterBackend, StencilOp, StencilTest};
pub use backend_wgpu::WgpuBackend;
pub use cache::RenderCache;
pub use color::Color;
pub use context::{CacheHandle, Context, PathHandle, DEFAULT_TOLERANCE};
pub use error::{last_error_message, TarpError};
pub use geometry::{AffineTransform, Bounds, Mat4, Vec2};
pub use gradient::{ColorStop, Gradient, GradientBuilder, GradientKind};
pub use id::GradientId;
pub use path::Path;
pub use raster::{ClippingStack, Rasterizer, MAX_CLIP_DEPTH};
pub use style::{FillRule, Paint, Style, StrokeCap, StrokeJoin, StrokeStyle};
