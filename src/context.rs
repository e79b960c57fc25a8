//! The public drawing context: frame lifecycle, transform/projection state,
//! path/gradient registration, and the immediate-mode draw calls.

use ahash::HashMap;

use crate::backend::{FrameInfo, RasterBackend};
use crate::cache::RenderCache;
use crate::error::{record, TarpError};
use crate::geometry::{AffineTransform, Mat4};
use crate::gradient::Gradient;
use crate::id::GradientId;
use crate::path::Path;
use crate::raster::Rasterizer;
use crate::style::Style;

/// Default flattening tolerance, in device pixels, applied when a context is
/// created with [`Context::new`]. Callers drawing at unusual zoom levels can
/// override it with [`Context::set_tolerance`].
pub const DEFAULT_TOLERANCE: f32 = 0.25;

/// An opaque handle to a path tracked by a [`Context`], returned by
/// [`Context::create_path`]. Paths are owned by the context that created
/// them; using a handle with a different context is a programmer error
/// reported as [`TarpError::InvalidHandle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PathHandle(u64);

/// An opaque handle to a render cache tracked by a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CacheHandle(u64);

struct PathEntry {
    path: Path,
    cache: RenderCache,
}

/// The main entry point: owns path/gradient/cache storage, the current
/// transform and projection, and the clip stack, and drives a
/// [`RasterBackend`] to actually draw.
pub struct Context<B: RasterBackend> {
    backend: B,
    rasterizer: Rasterizer,

    transform: AffineTransform,
    projection: Mat4,
    tolerance: f32,

    next_path_id: u64,
    paths: HashMap<u64, PathEntry>,

    next_cache_id: u64,
    standalone_caches: HashMap<u64, RenderCache>,

    gradients: HashMap<GradientId, Gradient>,
}

impl<B: RasterBackend> Context<B> {
    pub fn new(backend: B) -> Self {
        tracing::debug!("creating rasterization context");
        Context {
            backend,
            rasterizer: Rasterizer::new(),
            transform: AffineTransform::IDENTITY,
            projection: Mat4::IDENTITY,
            tolerance: DEFAULT_TOLERANCE,
            next_path_id: 1,
            paths: HashMap::default(),
            next_cache_id: 1,
            standalone_caches: HashMap::default(),
            gradients: HashMap::default(),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn set_tolerance(&mut self, tolerance: f32) {
        self.tolerance = tolerance.max(1e-3);
    }

    /// Sets the projection matrix used to map device space to clip space for
    /// the remainder of the frame.
    pub fn set_projection(&mut self, projection: Mat4) {
        self.projection = projection;
    }

    /// Replaces the current drawing transform outright.
    pub fn set_transform(&mut self, transform: AffineTransform) {
        self.transform = transform;
    }

    /// Composes `transform` onto the current drawing transform:
    /// `self.transform = self.transform * transform`.
    pub fn apply_transform(&mut self, transform: AffineTransform) {
        self.transform = self.transform.multiply(&transform);
    }

    pub fn reset_transform(&mut self) {
        self.transform = AffineTransform::IDENTITY;
    }

    pub fn current_transform(&self) -> AffineTransform {
        self.transform
    }

    pub fn begin_frame(&mut self, viewport_size: (u32, u32)) -> Result<(), TarpError> {
        tracing::trace!(?viewport_size, "begin_frame");
        self.rasterizer.begin_frame(
            &mut self.backend,
            FrameInfo { projection: self.projection, viewport_size },
        )
    }

    pub fn end_frame(&mut self) -> Result<(), TarpError> {
        self.rasterizer.end_frame(&mut self.backend)
    }

    /// Registers a new, empty path and returns its handle. Build geometry
    /// into it via [`Context::path_mut`].
    pub fn create_path(&mut self) -> PathHandle {
        let id = self.next_path_id;
        self.next_path_id += 1;
        self.paths.insert(id, PathEntry { path: Path::new(), cache: RenderCache::new() });
        PathHandle(id)
    }

    pub fn path_mut(&mut self, handle: PathHandle) -> Result<&mut Path, TarpError> {
        let entry = self.paths.get_mut(&handle.0).ok_or_else(|| {
            record(TarpError::InvalidHandle(format!("unknown path handle {}", handle.0)))
        })?;
        entry.cache.mark_all_dirty();
        Ok(&mut entry.path)
    }

    pub fn remove_path(&mut self, handle: PathHandle) {
        self.paths.remove(&handle.0);
    }

    pub fn register_gradient(&mut self, gradient: Gradient) -> GradientId {
        let id = gradient.id;
        self.gradients.insert(id, gradient);
        id
    }

    pub fn gradient(&self, id: GradientId) -> Option<&Gradient> {
        self.gradients.get(&id)
    }

    /// Rebuilds `handle`'s render cache under the current transform/style if
    /// dirty, then draws it. This is the common case: build once per
    /// logical shape, draw every frame without rebuilding if nothing changed.
    pub fn draw_path(&mut self, handle: PathHandle, style: &Style) -> Result<(), TarpError> {
        let entry = self.paths.get_mut(&handle.0).ok_or_else(|| {
            record(TarpError::InvalidHandle(format!("unknown path handle {}", handle.0)))
        })?;
        let fill_gradient = match style.fill_paint {
            crate::style::Paint::Gradient(id) => self.gradients.get(&id).cloned(),
            _ => None,
        };
        let stroke_gradient = match style.stroke_paint {
            crate::style::Paint::Gradient(id) => self.gradients.get(&id).cloned(),
            _ => None,
        };
        entry.cache.rebuild(
            &entry.path,
            style,
            &self.transform,
            self.tolerance,
            fill_gradient.as_ref(),
            stroke_gradient.as_ref(),
        );
        let gradients = &self.gradients;
        self.rasterizer.draw(&mut self.backend, &entry.cache, style, |id| gradients.get(&id).cloned());
        Ok(())
    }

    /// Forces a rebuild of `handle`'s cache without drawing it, useful for
    /// pre-warming expensive geometry (e.g. a long dashed stroke) outside the
    /// hot path of a frame.
    pub fn cache_path(&mut self, handle: PathHandle, style: &Style) -> Result<(), TarpError> {
        let entry = self.paths.get_mut(&handle.0).ok_or_else(|| {
            record(TarpError::InvalidHandle(format!("unknown path handle {}", handle.0)))
        })?;
        let fill_gradient = match style.fill_paint {
            crate::style::Paint::Gradient(id) => self.gradients.get(&id).cloned(),
            _ => None,
        };
        let stroke_gradient = match style.stroke_paint {
            crate::style::Paint::Gradient(id) => self.gradients.get(&id).cloned(),
            _ => None,
        };
        entry.cache.rebuild(&entry.path, style, &self.transform, self.tolerance, fill_gradient.as_ref(), stroke_gradient.as_ref());
        Ok(())
    }

    /// Draws an already-built, standalone render cache directly, bypassing
    /// any associated path (e.g. a cache built once and shared by many
    /// contexts' worth of geometry that never changes).
    pub fn draw_render_cache(&mut self, cache: &RenderCache, style: &Style) {
        let gradients = &self.gradients;
        self.rasterizer.draw(&mut self.backend, cache, style, |id| gradients.get(&id).cloned());
    }

    pub fn create_standalone_cache(&mut self) -> CacheHandle {
        let id = self.next_cache_id;
        self.next_cache_id += 1;
        self.standalone_caches.insert(id, RenderCache::new());
        CacheHandle(id)
    }

    pub fn standalone_cache_mut(&mut self, handle: CacheHandle) -> Result<&mut RenderCache, TarpError> {
        self.standalone_caches.get_mut(&handle.0).ok_or_else(|| {
            record(TarpError::InvalidHandle(format!("unknown cache handle {}", handle.0)))
        })
    }

    /// Pushes `handle`'s current fill geometry as a new clip region,
    /// intersected with whatever clipping is already active.
    pub fn begin_clipping(&mut self, handle: PathHandle, fill_rule: crate::style::FillRule) -> Result<(), TarpError> {
        let entry = self.paths.get(&handle.0).ok_or_else(|| {
            record(TarpError::InvalidHandle(format!("unknown path handle {}", handle.0)))
        })?;
        self.rasterizer.clip_stack.begin_clipping(&mut self.backend, &entry.cache, fill_rule)
    }

    pub fn end_clipping(&mut self) {
        self.rasterizer.clip_stack.end_clipping(&mut self.backend);
    }

    pub fn reset_clipping(&mut self) {
        self.rasterizer.clip_stack.reset_clipping(&mut self.backend);
    }

    pub fn clip_depth(&self) -> usize {
        self.rasterizer.clip_stack.depth()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{GradientMesh, Mesh, StencilOp, StencilTest};
    use crate::color::Color;
    use crate::geometry::Vec2;
    use crate::style::{FillRule, Paint, Style};

    #[derive(Default)]
    struct NullBackend;

    impl RasterBackend for NullBackend {
        fn begin_frame(&mut self, _info: FrameInfo) -> Result<(), TarpError> {
            Ok(())
        }
        fn end_frame(&mut self) -> Result<(), TarpError> {
            Ok(())
        }
        fn draw_solid(&mut self, _mesh: Mesh<'_>, _color: Color, _op: StencilOp, _test: StencilTest) {}
        fn draw_gradient(&mut self, _mesh: GradientMesh<'_>, _op: StencilOp, _test: StencilTest) {}
        fn upload_gradient_ramp(&mut self, _gradient_id: GradientId, _ramp: &[[u8; 4]]) {}
        fn clear_stencil(&mut self) {}
    }

    #[test]
    fn path_mut_on_a_fresh_context_with_no_paths_is_an_error() {
        let mut ctx = Context::new(NullBackend);
        assert!(ctx.path_mut(PathHandle(1)).is_err());
        let handle = ctx.create_path();
        assert!(ctx.path_mut(handle).is_ok());
    }

    #[test]
    fn draw_path_with_unknown_handle_reports_invalid_handle() {
        let mut ctx = Context::new(NullBackend);
        let bogus = PathHandle(9999);
        let style = Style::fill(Paint::Color(Color::BLACK));
        assert!(matches!(ctx.draw_path(bogus, &style), Err(TarpError::InvalidHandle(_))));
    }

    #[test]
    fn draw_path_rebuilds_a_dirty_cache_and_draws() {
        let mut ctx = Context::new(NullBackend);
        let handle = ctx.create_path();
        ctx.path_mut(handle).unwrap().add_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let style = Style::fill(Paint::Color(Color::BLACK));
        assert!(ctx.draw_path(handle, &style).is_ok());
    }

    #[test]
    fn clip_depth_tracks_push_and_pop() {
        let mut ctx = Context::new(NullBackend);
        let handle = ctx.create_path();
        ctx.path_mut(handle).unwrap().add_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        ctx.cache_path(handle, &Style::fill(Paint::Color(Color::BLACK))).unwrap();
        assert_eq!(ctx.clip_depth(), 0);
        ctx.begin_clipping(handle, FillRule::NonZero).unwrap();
        assert_eq!(ctx.clip_depth(), 1);
        ctx.end_clipping();
        assert_eq!(ctx.clip_depth(), 0);
    }

    #[test]
    fn removed_path_handle_becomes_invalid() {
        let mut ctx = Context::new(NullBackend);
        let handle = ctx.create_path();
        ctx.remove_path(handle);
        assert!(ctx.path_mut(handle).is_err());
    }
}
