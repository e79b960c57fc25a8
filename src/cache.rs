//! Render caches: flattened, tessellated geometry for a path plus the dirty
//! bits that decide whether each piece needs to be rebuilt before the next
//! draw.
//!
//! A cache is rebuilt lazily and piecewise: changing only the stroke style
//! after a cache was built re-tessellates the stroke mesh but reuses the
//! already-flattened fill fan, and vice versa. This mirrors the source
//! rasterizer's per-cache dirty bits rather than treating any path edit as a
//! reason to redo all of the work.
//!
//! Dirtiness comes from two independent sources. A path edit is signaled
//! explicitly by the caller via [`RenderCache::mark_all_dirty`], since the
//! cache has no way to notice a contour was mutated on its own. Everything
//! else — the style, the fill/stroke gradients, and the transform — is
//! compared against a snapshot taken at the end of the previous
//! [`rebuild`](RenderCache::rebuild) call, so `draw_path(handle, &style_a)`
//! followed by `draw_path(handle, &style_b)` picks up `style_b`'s stroke and
//! paint without the caller having to remember to flag anything.

use crate::flatten::{FlatPath, Flattener};
use crate::geometry::{AffineTransform, Bounds, Vec2};
use crate::gradient::{build_fan, Gradient, GradientVertex};
use crate::path::Path;
use crate::stroker::{stroke_contour, StrokeMesh};
use crate::style::Style;

/// Re-tessellation below this scale delta is skipped; the existing polyline
/// structure is reused and merely re-transformed. Matches the device-pixel
/// scale of "imperceptible" used elsewhere for tolerance budgets.
const SCALE_DIRTY_EPSILON: f32 = 1e-3;

/// Which parts of a [`RenderCache`] are out of date with respect to the
/// path, style and transform it was last built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct DirtyFlags {
    geometry: bool,
    stroke: bool,
    fill_gradient: bool,
    stroke_gradient: bool,
}

impl DirtyFlags {
    fn all() -> Self {
        DirtyFlags { geometry: true, stroke: true, fill_gradient: true, stroke_gradient: true }
    }
}

impl Default for DirtyFlags {
    fn default() -> Self {
        DirtyFlags::all()
    }
}

/// The anchor-fan fill geometry for one flattened path: for each contour, a
/// triangle fan from the contour's first vertex to every edge. Self-overlap
/// within and across contours is resolved by the rasterizer's stencil pass,
/// not here; a concave or self-intersecting contour produces perfectly valid
/// (if overlapping) fan geometry for that purpose.
#[derive(Debug, Clone, Default)]
pub struct FillGeometry {
    pub vertices: Vec<Vec2>,
}

fn build_fill_fan(flat: &FlatPath) -> FillGeometry {
    let mut vertices = Vec::new();
    for contour in &flat.contours {
        if contour.vertices.len() < 3 {
            continue;
        }
        let anchor = contour.vertices[0].pos;
        for window in contour.vertices.windows(2) {
            vertices.extend_from_slice(&[anchor, window[0].pos, window[1].pos]);
        }
    }
    FillGeometry { vertices }
}

/// A fully (or partially) built cache of a path's device-space geometry,
/// ready to be drawn or re-used as a clip mask.
#[derive(Debug, Clone, Default)]
pub struct RenderCache {
    dirty: DirtyFlags,
    transform: AffineTransform,
    last_scale: f32,
    last_style: Option<Style>,
    last_fill_gradient: Option<Gradient>,
    last_stroke_gradient: Option<Gradient>,

    /// Flattened polylines in the path's own local space; re-tessellated
    /// only when the path is edited or the transform's scale changes.
    flattened_local: Option<FlatPath>,
    /// `flattened_local` mapped into device space by the current transform;
    /// cheap to recompute on any transform change, including a pure pan.
    flattened_device: Option<FlatPath>,
    fill_geometry: Option<FillGeometry>,
    stroke_mesh: Option<StrokeMesh>,
    fill_gradient_fan: Option<Vec<GradientVertex>>,
    stroke_gradient_fan: Option<Vec<GradientVertex>>,

    pub bounds: Bounds,
}

impl RenderCache {
    pub fn new() -> Self {
        RenderCache { dirty: DirtyFlags::all(), last_scale: 1.0, ..Default::default() }
    }

    /// Marks every part of the cache dirty, e.g. after the source path's
    /// contours were edited.
    pub fn mark_all_dirty(&mut self) {
        self.dirty = DirtyFlags::all();
    }

    pub fn fill_vertices(&self) -> Option<&[Vec2]> {
        self.fill_geometry.as_ref().map(|g| g.vertices.as_slice())
    }

    pub fn stroke_vertices(&self) -> Option<&[Vec2]> {
        self.stroke_mesh.as_ref().map(|m| m.vertices.as_slice())
    }

    pub fn fill_gradient_fan(&self) -> Option<&[GradientVertex]> {
        self.fill_gradient_fan.as_deref()
    }

    pub fn stroke_gradient_fan(&self) -> Option<&[GradientVertex]> {
        self.stroke_gradient_fan.as_deref()
    }

    /// Rebuilds whichever parts of the cache are dirty. `tolerance` is the
    /// flattening tolerance in device units at unit scale; it is divided by
    /// the transform's [`AffineTransform::transform_scale`] to get the
    /// tolerance used for local-space subdivision, so zooming in doesn't
    /// leave curves visibly faceted. The transform's average scale factor is
    /// used separately for non-scaling-stroke width correction.
    pub fn rebuild(
        &mut self,
        path: &Path,
        style: &Style,
        transform: &AffineTransform,
        tolerance: f32,
        fill_gradient: Option<&Gradient>,
        stroke_gradient: Option<&Gradient>,
    ) {
        let scale = transform.transform_scale();
        let scale_changed = (scale - self.last_scale).abs() > SCALE_DIRTY_EPSILON;
        let transform_changed = self.transform != *transform;

        if scale_changed {
            self.dirty.geometry = true;
        }
        let stroke_style_changed = match &self.last_style {
            Some(last) => last.stroke_style != style.stroke_style || last.stroke_paint != style.stroke_paint,
            None => true,
        };
        if stroke_style_changed {
            self.dirty.stroke = true;
        }
        if fill_gradient != self.last_fill_gradient.as_ref() {
            self.dirty.fill_gradient = true;
        }
        if stroke_gradient != self.last_stroke_gradient.as_ref() {
            self.dirty.stroke_gradient = true;
        }

        let mut device_dirty = transform_changed;

        if self.dirty.geometry {
            tracing::trace!("rebuilding local flattened geometry for dirty render cache");
            let local_tolerance = tolerance / scale;
            let flattener = Flattener::new(local_tolerance);
            self.flattened_local = Some(flattener.flatten(path));
            self.dirty.geometry = false;
            // Changing the underlying geometry invalidates any already-built
            // stroke mesh even if the stroke style itself didn't change.
            self.dirty.stroke = true;
            device_dirty = true;
        }

        self.transform = *transform;
        self.last_scale = scale;

        if device_dirty {
            tracing::trace!("re-projecting flattened geometry into device space");
            if let Some(local) = &self.flattened_local {
                let device = local.transformed(transform);
                self.bounds = device.bounds;
                self.fill_geometry = Some(build_fill_fan(&device));
                self.flattened_device = Some(device);
                self.dirty.stroke = true;
            }
        }

        if self.dirty.stroke {
            if style.has_stroke() {
                tracing::trace!("rebuilding stroke mesh for dirty render cache");
                if let Some(device) = &self.flattened_device {
                    let effective_width = if style.stroke_style.non_scaling {
                        style.stroke_style.width / transform.average_scale()
                    } else {
                        style.stroke_style.width
                    };
                    let mut mesh = StrokeMesh::default();
                    for contour in &device.contours {
                        let contour_mesh = stroke_contour(contour, &style.stroke_style, effective_width);
                        mesh.vertices.extend(contour_mesh.vertices);
                    }
                    self.bounds = self.bounds.expand(effective_width * 0.5 + 1.0);
                    self.stroke_mesh = Some(mesh);
                }
            } else {
                self.stroke_mesh = None;
            }
            self.dirty.stroke = false;
        }

        if self.dirty.fill_gradient {
            self.fill_gradient_fan = fill_gradient.map(|g| build_fan(g, self.bounds.min, self.bounds.max));
            self.dirty.fill_gradient = false;
        }

        if self.dirty.stroke_gradient {
            self.stroke_gradient_fan = stroke_gradient.map(|g| build_fan(g, self.bounds.min, self.bounds.max));
            self.dirty.stroke_gradient = false;
        }

        self.last_style = Some(style.clone());
        self.last_fill_gradient = fill_gradient.cloned();
        self.last_stroke_gradient = stroke_gradient.cloned();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::style::{Paint, Style, StrokeStyle};

    fn rect_path() -> Path {
        let mut path = Path::new();
        path.add_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 10.0));
        path
    }

    #[test]
    fn fresh_cache_rebuild_produces_fill_geometry() {
        let mut cache = RenderCache::new();
        let style = Style::fill(Paint::Color(crate::color::Color::BLACK));
        cache.rebuild(&rect_path(), &style, &AffineTransform::IDENTITY, 0.25, None, None);
        assert!(cache.fill_vertices().is_some());
        assert!(!cache.fill_vertices().unwrap().is_empty());
    }

    #[test]
    fn style_only_rebuild_skips_reflattening() {
        let mut cache = RenderCache::new();
        let mut style = Style::fill(Paint::Color(crate::color::Color::BLACK));
        cache.rebuild(&rect_path(), &style, &AffineTransform::IDENTITY, 0.25, None, None);
        let fill_before = cache.fill_vertices().unwrap().to_vec();

        // Only the stroke style changes; geometry should be reused rather
        // than reflattened.
        style.stroke_paint = Paint::Color(crate::color::Color::WHITE);
        style.stroke_style = StrokeStyle { width: 3.0, ..Default::default() };
        cache.rebuild(&rect_path(), &style, &AffineTransform::IDENTITY, 0.25, None, None);

        assert_eq!(cache.fill_vertices().unwrap(), fill_before.as_slice());
        assert!(cache.stroke_vertices().is_some());
    }

    #[test]
    fn transform_change_forces_geometry_and_stroke_rebuild() {
        let mut cache = RenderCache::new();
        let mut style = Style::fill(Paint::Color(crate::color::Color::BLACK));
        style.stroke_paint = Paint::Color(crate::color::Color::WHITE);
        cache.rebuild(&rect_path(), &style, &AffineTransform::IDENTITY, 0.25, None, None);
        let before = cache.fill_vertices().unwrap().to_vec();

        let moved = AffineTransform::translation(100.0, 0.0);
        cache.rebuild(&rect_path(), &style, &moved, 0.25, None, None);
        let after = cache.fill_vertices().unwrap();
        assert_ne!(before.as_slice(), after);
    }

    #[test]
    fn stroke_bounds_expand_by_half_the_effective_width() {
        let mut cache = RenderCache::new();
        let mut style = Style::fill(Paint::Color(crate::color::Color::BLACK));
        style.stroke_paint = Paint::Color(crate::color::Color::WHITE);
        style.stroke_style = StrokeStyle { width: 4.0, ..Default::default() };
        cache.rebuild(&rect_path(), &style, &AffineTransform::IDENTITY, 0.25, None, None);

        // bounds.expand(effective_width * 0.5 + 1.0) with width=4 adds 3.0 on
        // every side beyond the unstroked rect's [0,10] extent.
        assert!(cache.bounds.min.x <= -2.9);
        assert!(cache.bounds.max.x >= 12.9);
    }
}
