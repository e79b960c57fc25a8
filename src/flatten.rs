//! Adaptive flattening of paths into polylines.
//!
//! Curves are subdivided with recursive de Casteljau bisection, using an
//! explicit stack rather than true recursion (bounded to a fixed maximum
//! depth, matching the original rasterizer's stack-based flattener), and a
//! flatness test that compares the squared distance of each control point
//! from the chord to a tolerance in the path's own local space. Flattening
//! never looks at a transform directly: [`RenderCache`](crate::cache::RenderCache)
//! derives the tolerance from the transform's scale before constructing a
//! [`Flattener`], then maps the resulting polyline into device space
//! separately via [`FlatPath::transformed`].

use crate::geometry::{AffineTransform, Bounds, Vec2};
use crate::path::{Contour, Path, Segment};

/// Vertices closer than this are treated as coincident: a manually-closed
/// contour's final vertex and its start point, or consecutive flattened
/// samples along a degenerate curve.
const COINCIDENT_EPSILON: f32 = 1e-4;

/// Maximum recursion depth for curve subdivision; a cubic this deep is
/// already flat to sub-pixel tolerance for any sane transform, and bounding
/// the depth keeps worst-case flattening cost finite for degenerate input.
pub const MAX_FLATTEN_DEPTH: u32 = 16;

/// A point produced by flattening, tagged with whether it is a "joint": the
/// shared endpoint between two curve segments (as opposed to the single
/// endpoint of a straight line segment). Stroking uses this to decide whether
/// a join needs to be inserted at all, since naively flattened straight
/// corners should still get miter/round/bevel treatment but consecutive
/// samples along one curve should not.
///
/// The first vertex of a contour is never a joint: there is no preceding
/// segment for it to join against.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatVertex {
    pub pos: Vec2,
    pub joint: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FlatContour {
    pub vertices: Vec<FlatVertex>,
    pub closed: bool,
}

#[derive(Debug, Clone, Default)]
pub struct FlatPath {
    pub contours: Vec<FlatContour>,
    pub bounds: Bounds,
}

impl FlatPath {
    /// Maps every vertex through `transform`, recomputing bounds. Unlike
    /// [`Flattener::flatten`], this makes no subdivision decisions: it's the
    /// cheap half of rebuilding a render cache after a transform change,
    /// reusing whatever polyline structure flattening already settled on and
    /// just moving it. A pure translation or rotation of the current
    /// transform only ever needs this, not a re-flatten.
    pub fn transformed(&self, transform: &AffineTransform) -> FlatPath {
        let mut bounds = Bounds::EMPTY;
        let contours = self
            .contours
            .iter()
            .map(|contour| {
                let vertices: Vec<FlatVertex> = contour
                    .vertices
                    .iter()
                    .map(|v| {
                        let pos = transform.apply_point(v.pos);
                        bounds.add_point(pos);
                        FlatVertex { pos, joint: v.joint }
                    })
                    .collect();
                FlatContour { vertices, closed: contour.closed }
            })
            .collect();
        FlatPath { contours, bounds }
    }
}

/// Flattens a path into polylines in the path's own local coordinate space.
///
/// `tolerance` is the maximum allowed deviation, in local-space units,
/// between the true curve and its polyline approximation. Callers deriving
/// this from a device-space tolerance budget should divide by the current
/// transform's scale first (see
/// [`AffineTransform::transform_scale`](crate::geometry::AffineTransform::transform_scale)),
/// so the same subdivision structure can be reused (via
/// [`FlatPath::transformed`]) across any transform change that doesn't alter
/// scale, such as a pure pan.
pub struct Flattener {
    tolerance_squared: f32,
}

impl Flattener {
    pub fn new(tolerance: f32) -> Self {
        Flattener { tolerance_squared: tolerance * tolerance }
    }

    pub fn flatten(&self, path: &Path) -> FlatPath {
        let mut bounds = Bounds::EMPTY;
        let mut contours = Vec::with_capacity(path.contours().len());
        for contour in path.contours() {
            let flat = self.flatten_contour(contour, &mut bounds);
            if !flat.vertices.is_empty() {
                contours.push(flat);
            }
        }
        FlatPath { contours, bounds }
    }

    fn flatten_contour(&self, contour: &Contour, bounds: &mut Bounds) -> FlatContour {
        let mut vertices: Vec<FlatVertex> = Vec::new();
        let mut cursor = Vec2::ZERO;
        let mut first = true;

        for segment in &contour.segments {
            match *segment {
                Segment::MoveTo { to } => {
                    cursor = to;
                    bounds.add_point(to);
                    vertices.push(FlatVertex { pos: to, joint: false });
                    first = false;
                }
                Segment::LineTo { to } => {
                    cursor = to;
                    bounds.add_point(to);
                    vertices.push(FlatVertex { pos: to, joint: !first });
                    first = false;
                }
                Segment::CubicTo { control1, control2, to } => {
                    self.flatten_cubic(cursor, control1, control2, to, &mut vertices, bounds, !first);
                    cursor = to;
                    first = false;
                }
                Segment::Close => {
                    if let Some(start) = vertices.first().map(|v| v.pos) {
                        let is_coincident = vertices
                            .last()
                            .map(|last| last.pos.distance(start) <= COINCIDENT_EPSILON)
                            .unwrap_or(false);
                        if !is_coincident {
                            vertices.push(FlatVertex { pos: start, joint: true });
                        }
                    }
                }
            }
        }

        FlatContour { vertices, closed: contour.closed }
    }

    /// Adaptively subdivides the cubic `p0..p3` using an explicit stack of
    /// work items (each a 4-point cubic plus remaining depth), pushing
    /// `p3`-anchored polyline vertices as segments are found flat enough.
    /// `joint_first` marks whether the very first emitted vertex (`p3` of the
    /// deepest left-most split, which is really this curve's start point
    /// joining a previous segment) should be tagged as a joint.
    fn flatten_cubic(
        &self,
        p0: Vec2,
        p1: Vec2,
        p2: Vec2,
        p3: Vec2,
        out: &mut Vec<FlatVertex>,
        bounds: &mut Bounds,
        joint_first: bool,
    ) {
        // Stack entries store (p0, p1, p2, p3, depth). We never need to push
        // p0's vertex on the way down; only p3 endpoints are emitted, in
        // order, by an in-order (left-subtree-first) traversal.
        let mut stack: Vec<(Vec2, Vec2, Vec2, Vec2, u32)> = vec![(p0, p1, p2, p3, 0)];
        let mut emitted_any = false;

        while let Some((a0, a1, a2, a3, depth)) = stack.pop() {
            if depth >= MAX_FLATTEN_DEPTH || self.is_flat(a0, a1, a2, a3) {
                bounds.add_point(a3);
                out.push(FlatVertex { pos: a3, joint: if !emitted_any { joint_first } else { true } });
                emitted_any = true;
                continue;
            }
            // de Casteljau bisection at t = 0.5.
            let p01 = a0.lerp(a1, 0.5);
            let p12 = a1.lerp(a2, 0.5);
            let p23 = a2.lerp(a3, 0.5);
            let p012 = p01.lerp(p12, 0.5);
            let p123 = p12.lerp(p23, 0.5);
            let p0123 = p012.lerp(p123, 0.5);
            // Push right half first so the left half pops (and is processed)
            // first, preserving left-to-right emission order.
            stack.push((p0123, p123, p23, a3, depth + 1));
            stack.push((a0, p01, p012, p0123, depth + 1));
        }
    }

    /// Flatness test: the cubic is considered flat enough when both interior
    /// control points lie within tolerance of the chord `p0-p3`, using the
    /// standard `d^2 <= tolerance^2` squared-distance-to-line test scaled by
    /// the chord's squared length to avoid a sqrt per candidate segment.
    fn is_flat(&self, p0: Vec2, p1: Vec2, p2: Vec2, p3: Vec2) -> bool {
        let chord = p3 - p0;
        let chord_len_sq = chord.length_squared();
        if chord_len_sq < 1e-12 {
            let d1 = p1 - p0;
            let d2 = p2 - p0;
            return d1.length_squared() <= self.tolerance_squared && d2.length_squared() <= self.tolerance_squared;
        }
        let dev = |p: Vec2| -> f32 {
            let v = p - p0;
            let cross = chord.cross(v);
            (cross * cross) / chord_len_sq
        };
        dev(p1) <= self.tolerance_squared && dev(p2) <= self.tolerance_squared
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::Path;

    #[test]
    fn first_vertex_of_a_contour_is_never_a_joint() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(10.0, 0.0)).unwrap();
        path.line_to(Vec2::new(10.0, 10.0)).unwrap();

        let flat = Flattener::new(0.25).flatten(&path);
        let vertices = &flat.contours[0].vertices;
        assert!(!vertices[0].joint);
        assert!(vertices[1].joint);
    }

    #[test]
    fn straight_line_flattens_to_its_two_endpoints() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(100.0, 0.0)).unwrap();

        let flat = Flattener::new(0.25).flatten(&path);
        assert_eq!(flat.contours[0].vertices.len(), 2);
    }

    #[test]
    fn tighter_tolerance_never_emits_fewer_points_on_a_curved_segment() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.cubic_to(Vec2::new(0.0, 50.0), Vec2::new(100.0, 50.0), Vec2::new(100.0, 0.0)).unwrap();

        let loose = Flattener::new(5.0).flatten(&path);
        let tight = Flattener::new(0.05).flatten(&path);
        assert!(tight.contours[0].vertices.len() >= loose.contours[0].vertices.len());
    }

    #[test]
    fn flattening_stays_within_max_depth() {
        // A cubic with wildly diverging control points stresses the
        // recursion bound rather than converging quickly.
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.cubic_to(Vec2::new(1e6, -1e6), Vec2::new(-1e6, 1e6), Vec2::new(1.0, 0.0)).unwrap();
        let flat = Flattener::new(0.25).flatten(&path);
        // Each bisection doubles the number of stack entries; depth 16 bounds
        // the point count well under 2^17.
        assert!(flat.contours[0].vertices.len() < 1 << 17);
    }

    #[test]
    fn bounds_cover_every_emitted_vertex() {
        let mut path = Path::new();
        path.move_to(Vec2::new(-5.0, -5.0));
        path.cubic_to(Vec2::new(-5.0, 20.0), Vec2::new(20.0, 20.0), Vec2::new(20.0, -5.0)).unwrap();

        let flat = Flattener::new(0.1).flatten(&path);
        for v in &flat.contours[0].vertices {
            assert!(v.pos.x >= flat.bounds.min.x - 1e-4 && v.pos.x <= flat.bounds.max.x + 1e-4);
            assert!(v.pos.y >= flat.bounds.min.y - 1e-4 && v.pos.y <= flat.bounds.max.y + 1e-4);
        }
    }
}
