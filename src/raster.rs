//! Stencil-buffer rasterization: fill and stroke pass orchestration, and the
//! nested clipping stack.
//!
//! Only two bits of the stencil buffer are ever live for clipping at once:
//! every push or pop rebuilds the active clip mask from scratch by replaying
//! the retained geometry of every frame still on the stack, intersecting
//! each new region with the accumulated result so far. This trades
//! O(depth) stencil draws per push/pop for never needing more than a
//! constant amount of stencil state regardless of nesting depth.
//!
//! A bounded [`MAX_CLIP_DEPTH`] keeps that replay cost, and the retained
//! geometry it replays, from growing without limit.

use crate::backend::{FrameInfo, GradientMesh, Mesh, RasterBackend, StencilOp, StencilTest};
use crate::cache::RenderCache;
use crate::color::Color;
use crate::error::{record, TarpError};
use crate::gradient::Gradient;
use crate::id::GradientId;
use crate::style::{FillRule, Paint, Style};

/// Maximum clip nesting depth. Bounded so a runaway `begin_clipping` loop
/// fails predictably instead of growing the clip stack (and its retained
/// geometry snapshots) without limit.
pub const MAX_CLIP_DEPTH: usize = 64;

/// A retained snapshot of the geometry used to build one level of the clip
/// stack, kept so that level's mask can be rebuilt later without holding a
/// live reference to the [`RenderCache`] it came from (which may since have
/// been mutated or rebuilt for unrelated drawing).
#[derive(Debug, Clone)]
struct ClipFrame {
    fill_vertices: Vec<crate::geometry::Vec2>,
    fill_rule: FillRule,
}

/// The clip stack. Each [`crate::context::Context`] owns exactly one.
#[derive(Debug, Default)]
pub struct ClippingStack {
    frames: Vec<ClipFrame>,
}

impl ClippingStack {
    pub fn new() -> Self {
        ClippingStack::default()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    /// If `cache` is referenced by any frame currently on the stack (i.e. it
    /// backs an in-flight clip region) and is about to be rebuilt, this
    /// should be called first so the stack keeps drawing the old mask rather
    /// than having it change out from under already-nested clips. Since
    /// frames store an owned geometry snapshot rather than a reference to
    /// `cache`, this is a no-op by construction once a clip has been pushed —
    /// documented here because the push site is where the copy actually
    /// happens.
    pub fn protect_before_rebuild(&self, _cache: &RenderCache) {}

    /// Pushes a new clip region built from `cache`'s current fill geometry,
    /// combined with whatever is already active. Fails if the stack is
    /// already at [`MAX_CLIP_DEPTH`].
    pub fn begin_clipping(
        &mut self,
        backend: &mut dyn RasterBackend,
        cache: &RenderCache,
        fill_rule: FillRule,
    ) -> Result<(), TarpError> {
        if self.frames.len() >= MAX_CLIP_DEPTH {
            return Err(record(TarpError::BuilderMisuse(format!(
                "clip stack exceeded max depth of {MAX_CLIP_DEPTH}"
            ))));
        }
        let vertices = cache.fill_vertices().unwrap_or(&[]).to_vec();
        self.frames.push(ClipFrame { fill_vertices: vertices, fill_rule });
        self.rebuild_active_plane(backend);
        Ok(())
    }

    /// Pops the most recently pushed clip region, restoring the previous
    /// level (or no clipping, if the stack is now empty).
    pub fn end_clipping(&mut self, backend: &mut dyn RasterBackend) {
        if self.frames.pop().is_some() {
            self.rebuild_active_plane(backend);
        }
    }

    /// Clears the entire clip stack and the stencil buffer.
    pub fn reset_clipping(&mut self, backend: &mut dyn RasterBackend) {
        self.frames.clear();
        backend.clear_stencil();
    }

    /// Returns the stencil test the rasterizer's draw/cover passes should use
    /// given the current clip nesting.
    pub fn active_test(&self) -> StencilTest {
        if self.frames.is_empty() {
            StencilTest::Always
        } else {
            StencilTest::NotEqualZero
        }
    }

    /// Rebuilds the currently active plane's stencil content from scratch:
    /// clears it, then draws every frame on the stack in order, each one
    /// intersected with the accumulated result so far. This is the
    /// redraw-on-every-push/pop cost the two-plane scheme accepts in
    /// exchange for O(1) stencil bits regardless of nesting depth.
    fn rebuild_active_plane(&mut self, backend: &mut dyn RasterBackend) {
        backend.clear_stencil();
        for frame in &self.frames {
            let mesh = Mesh { vertices: &frame.fill_vertices };
            let op = match frame.fill_rule {
                FillRule::EvenOdd => StencilOp::Invert,
                FillRule::NonZero => StencilOp::IncrementDecrementWrap,
            };
            // Each new frame's region is combined with whatever is already
            // in the plane via the stencil test already being nonzero-only
            // once at least one frame has been drawn, so this naturally
            // intersects rather than unions nested clips.
            let test = if std::ptr::eq(frame, self.frames.first().unwrap()) {
                StencilTest::Always
            } else {
                StencilTest::NotEqualZero
            };
            backend.draw_solid(mesh, Color::TRANSPARENT, op, test);
        }
    }
}

/// Orchestrates fill and stroke draws for a single [`crate::context::Context`]
/// frame, delegating actual GPU work to a [`RasterBackend`].
pub struct Rasterizer {
    pub clip_stack: ClippingStack,
}

impl Rasterizer {
    pub fn new() -> Self {
        Rasterizer { clip_stack: ClippingStack::new() }
    }

    pub fn begin_frame(&mut self, backend: &mut dyn RasterBackend, info: FrameInfo) -> Result<(), TarpError> {
        backend.begin_frame(info)
    }

    pub fn end_frame(&mut self, backend: &mut dyn RasterBackend) -> Result<(), TarpError> {
        backend.end_frame()
    }

    /// Draws `cache` with `style`, resolving gradient paints from
    /// `resolve_gradient`, using the fill rule's stencil-then-cover sequence
    /// (even-odd: invert the whole fan, then cover testing for odd parity;
    /// non-zero: increment/decrement-wrap front/back faces, then cover
    /// testing for nonzero) followed by the stroke pass if the style has one.
    pub fn draw(
        &mut self,
        backend: &mut dyn RasterBackend,
        cache: &RenderCache,
        style: &Style,
        resolve_gradient: impl Fn(GradientId) -> Option<Gradient>,
    ) {
        let clip_test = self.clip_stack.active_test();

        if style.has_fill() {
            if let Some(vertices) = cache.fill_vertices() {
                let fill_op = match style.fill_rule {
                    FillRule::EvenOdd => StencilOp::Invert,
                    FillRule::NonZero => StencilOp::IncrementDecrementWrap,
                };
                backend.draw_solid(Mesh { vertices }, Color::TRANSPARENT, fill_op, StencilTest::Always);

                match style.fill_paint {
                    Paint::Color(color) => {
                        backend.draw_solid(Mesh { vertices }, color, StencilOp::ZeroCover, clip_test);
                    }
                    Paint::Gradient(id) => {
                        if let (Some(gradient), Some(fan)) = (resolve_gradient(id), cache.fill_gradient_fan()) {
                            backend.upload_gradient_ramp(id, &gradient.build_ramp_texture());
                            backend.draw_gradient(GradientMesh { vertices: fan, gradient_id: id }, StencilOp::ZeroCover, clip_test);
                        } else {
                            tracing::warn!(gradient = %id, "fill references unknown gradient id");
                        }
                    }
                    Paint::None => {}
                }
            }
        }

        if style.has_stroke() {
            if let Some(vertices) = cache.stroke_vertices() {
                backend.draw_solid(Mesh { vertices }, Color::TRANSPARENT, StencilOp::Replace, StencilTest::Always);
                match style.stroke_paint {
                    Paint::Color(color) => {
                        backend.draw_solid(Mesh { vertices }, color, StencilOp::InvertCover, clip_test);
                    }
                    Paint::Gradient(id) => {
                        if let (Some(gradient), Some(fan)) = (resolve_gradient(id), cache.stroke_gradient_fan()) {
                            backend.upload_gradient_ramp(id, &gradient.build_ramp_texture());
                            backend.draw_gradient(GradientMesh { vertices: fan, gradient_id: id }, StencilOp::InvertCover, clip_test);
                        } else {
                            tracing::warn!(gradient = %id, "stroke references unknown gradient id");
                        }
                    }
                    Paint::None => {}
                }
            }
        }
    }
}

impl Default for Rasterizer {
    fn default() -> Self {
        Rasterizer::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Vec2;

    #[derive(Default)]
    struct RecordingBackend {
        stencil_clears: u32,
        solid_draws: Vec<(StencilOp, StencilTest)>,
    }

    impl RasterBackend for RecordingBackend {
        fn begin_frame(&mut self, _info: FrameInfo) -> Result<(), TarpError> {
            Ok(())
        }
        fn end_frame(&mut self) -> Result<(), TarpError> {
            Ok(())
        }
        fn draw_solid(&mut self, _mesh: Mesh<'_>, _color: Color, op: StencilOp, test: StencilTest) {
            self.solid_draws.push((op, test));
        }
        fn draw_gradient(&mut self, _mesh: GradientMesh<'_>, _op: StencilOp, _test: StencilTest) {}
        fn upload_gradient_ramp(&mut self, _gradient_id: GradientId, _ramp: &[[u8; 4]]) {}
        fn clear_stencil(&mut self) {
            self.stencil_clears += 1;
        }
    }

    fn triangle_cache() -> RenderCache {
        let mut path = crate::path::Path::new();
        path.add_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        let mut cache = RenderCache::new();
        let style = Style::fill(Paint::Color(Color::BLACK));
        cache.rebuild(&path, &style, &crate::geometry::AffineTransform::IDENTITY, 0.25, None, None);
        cache
    }

    #[test]
    fn active_test_is_always_when_stack_empty() {
        let stack = ClippingStack::new();
        assert_eq!(stack.active_test(), StencilTest::Always);
    }

    #[test]
    fn pushing_a_clip_makes_the_test_not_equal_zero() {
        let mut backend = RecordingBackend::default();
        let mut stack = ClippingStack::new();
        stack.begin_clipping(&mut backend, &triangle_cache(), FillRule::NonZero).unwrap();
        assert_eq!(stack.active_test(), StencilTest::NotEqualZero);
        assert_eq!(stack.depth(), 1);
    }

    #[test]
    fn clip_stack_rejects_depth_beyond_the_bound() {
        let mut backend = RecordingBackend::default();
        let mut stack = ClippingStack::new();
        let cache = triangle_cache();
        for _ in 0..MAX_CLIP_DEPTH {
            stack.begin_clipping(&mut backend, &cache, FillRule::NonZero).unwrap();
        }
        assert!(stack.begin_clipping(&mut backend, &cache, FillRule::NonZero).is_err());
    }

    #[test]
    fn end_clipping_pops_one_level_and_rebuilds() {
        let mut backend = RecordingBackend::default();
        let mut stack = ClippingStack::new();
        let cache = triangle_cache();
        stack.begin_clipping(&mut backend, &cache, FillRule::NonZero).unwrap();
        stack.begin_clipping(&mut backend, &cache, FillRule::NonZero).unwrap();
        assert_eq!(stack.depth(), 2);
        stack.end_clipping(&mut backend);
        assert_eq!(stack.depth(), 1);
        assert_eq!(stack.active_test(), StencilTest::NotEqualZero);
    }

    #[test]
    fn fill_draw_issues_a_stencil_pass_then_a_cover_pass() {
        let mut backend = RecordingBackend::default();
        let mut rasterizer = Rasterizer::new();
        let cache = triangle_cache();
        let style = Style::fill(Paint::Color(Color::BLACK));
        rasterizer.draw(&mut backend, &cache, &style, |_| None);
        assert_eq!(backend.solid_draws.len(), 2);
        assert_eq!(backend.solid_draws[0].0, StencilOp::IncrementDecrementWrap);
        assert_eq!(backend.solid_draws[1].0, StencilOp::ZeroCover);
    }
}
