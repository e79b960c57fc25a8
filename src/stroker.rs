//! Stroke tessellation: turns a flattened polyline into the triangle soup of
//! quads, joins and caps that the rasterizer draws through its stencil
//! "replace, then invert-cover" stroke pass (see [`crate::raster`]).
//!
//! Self-overlapping stroke geometry (sharp miters, tight dash corners) is
//! expected to double-cover some pixels; that is resolved downstream by the
//! stencil pass, not here. This module's only job is correct outline
//! geometry and correct dash traversal.

use crate::flatten::{FlatContour, FlatVertex};
use crate::geometry::Vec2;
use crate::style::{StrokeCap, StrokeJoin, StrokeStyle};

/// A flat triangle-list mesh in device space, ready for upload.
#[derive(Debug, Clone, Default)]
pub struct StrokeMesh {
    pub vertices: Vec<Vec2>,
}

impl StrokeMesh {
    fn push_quad(&mut self, a: Vec2, b: Vec2, c: Vec2, d: Vec2) {
        self.vertices.extend_from_slice(&[a, b, c, a, c, d]);
    }

    fn push_triangle(&mut self, a: Vec2, b: Vec2, c: Vec2) {
        self.vertices.extend_from_slice(&[a, b, c]);
    }
}

/// Number of segments used to approximate a round join or cap; matches the
/// angular subdivision the original library used for round joins (a join
/// never needs as many segments as a full circle, but reusing one constant
/// keeps curvature visually consistent with round caps).
const ROUND_SEGMENTS_PER_PI: f32 = 16.0;

/// Strokes a single flattened contour, honoring dashing if `style` has a
/// non-empty dash pattern, and returns the resulting triangle mesh.
///
/// `effective_width` should already have any non-scaling-stroke correction
/// applied by the caller (dividing the nominal width by the transform's
/// average scale), since this function works entirely in device space.
pub fn stroke_contour(contour: &FlatContour, style: &StrokeStyle, effective_width: f32) -> StrokeMesh {
    let mut mesh = StrokeMesh::default();
    let half_width = effective_width.max(0.0) * 0.5;
    if half_width <= 0.0 || contour.vertices.len() < 2 {
        return mesh;
    }

    if style.dash_pattern.is_empty() || style.dash_pattern.iter().all(|d| *d <= 0.0) {
        stroke_polyline(&contour.vertices, contour.closed, style, half_width, &mut mesh);
    } else {
        for run in dash_runs(contour, style) {
            stroke_polyline(&run, false, style, half_width, &mut mesh);
        }
    }
    mesh
}

/// Strokes one open or closed run of points with no further dash splitting.
fn stroke_polyline(points: &[FlatVertex], closed: bool, style: &StrokeStyle, half_width: f32, mesh: &mut StrokeMesh) {
    if points.len() < 2 {
        return;
    }

    let n = points.len();
    for i in 0..n - 1 {
        let p0 = points[i].pos;
        let p1 = points[i + 1].pos;
        let dir = (p1 - p0).normalized();
        let normal = dir.perp() * half_width;
        mesh.push_quad(p0 + normal, p1 + normal, p1 - normal, p0 - normal);
    }
    if closed {
        let p0 = points[n - 1].pos;
        let p1 = points[0].pos;
        let dir = (p1 - p0).normalized();
        let normal = dir.perp() * half_width;
        mesh.push_quad(p0 + normal, p1 + normal, p1 - normal, p0 - normal);
    }

    let join_range = if closed { 0..n } else { 1..n - 1 };
    for i in join_range {
        let prev = points[(i + n - 1) % n].pos;
        let cur = points[i].pos;
        let next = points[(i + 1) % n].pos;
        join(mesh, prev, cur, next, half_width, style.join, style.miter_limit);
    }

    if !closed {
        let start = points[0].pos;
        let start_dir = (start - points[1].pos).normalized();
        cap(mesh, start, start_dir, half_width, style.cap);

        let end = points[n - 1].pos;
        let end_dir = (end - points[n - 2].pos).normalized();
        cap(mesh, end, end_dir, half_width, style.cap);
    }
}

/// Emits the join geometry at `cur`, the vertex shared by the incoming edge
/// `prev->cur` and the outgoing edge `cur->next`.
fn join(mesh: &mut StrokeMesh, prev: Vec2, cur: Vec2, next: Vec2, half_width: f32, kind: StrokeJoin, miter_limit: f32) {
    let in_dir = (cur - prev).normalized();
    let out_dir = (next - cur).normalized();
    if in_dir.length_squared() < 1e-9 || out_dir.length_squared() < 1e-9 {
        return;
    }
    let in_normal = in_dir.perp() * half_width;
    let out_normal = out_dir.perp() * half_width;

    // Cross product sign tells us which side is the inner (overlapping) side
    // and which is the outer side that actually needs a join filled in.
    let turn = in_dir.cross(out_dir);
    let (outer_a, outer_b, sign) = if turn < 0.0 {
        (cur + in_normal, cur + out_normal, 1.0)
    } else {
        (cur - in_normal, cur - out_normal, -1.0)
    };

    // The inner side is guaranteed to already overlap the adjacent quads, so
    // only the outer wedge needs explicit geometry.
    mesh.push_triangle(cur, outer_a, outer_b);

    match kind {
        StrokeJoin::Bevel => {}
        StrokeJoin::Round => {
            let radial_a = outer_a - cur;
            let radial_b = outer_b - cur;
            let angle_total = radial_a.normalized().dot(radial_b.normalized()).clamp(-1.0, 1.0).acos();
            let segments = ((angle_total / std::f32::consts::PI) * ROUND_SEGMENTS_PER_PI).ceil().max(1.0) as usize;
            arc_fan(mesh, cur, radial_a, radial_b, segments);
        }
        StrokeJoin::Miter => {
            let angle = in_dir.dot(out_dir).clamp(-1.0, 1.0).acos();
            let half_angle = (std::f32::consts::PI - angle) / 2.0;
            let miter_len_ratio = if half_angle.sin().abs() > 1e-5 { 1.0 / half_angle.sin() } else { f32::MAX };
            if miter_len_ratio > miter_limit {
                return; // falls back to the bevel triangle already emitted
            }
            let bisector = (outer_a - cur + (outer_b - cur)).normalized();
            if bisector.length_squared() < 1e-9 {
                return;
            }
            let miter_point = cur + bisector * (half_width * miter_len_ratio);
            mesh.push_triangle(cur, outer_a, miter_point);
            mesh.push_triangle(cur, miter_point, outer_b);
        }
    }
}

/// Emits cap geometry at a contour endpoint. `outward` points away from the
/// contour, along the tangent of the final edge.
fn cap(mesh: &mut StrokeMesh, at: Vec2, outward: Vec2, half_width: f32, kind: StrokeCap) {
    let normal = outward.perp() * half_width;
    match kind {
        StrokeCap::Butt => {}
        StrokeCap::Square => {
            let ext = outward * half_width;
            mesh.push_quad(at + normal, at + normal + ext, at - normal + ext, at - normal);
        }
        StrokeCap::Round => {
            let segments = ROUND_SEGMENTS_PER_PI as usize;
            arc_fan(mesh, at, normal, -normal, segments);
        }
    }
}

/// Fans out a triangle strip from `center` across the arc spanned by the two
/// radial vectors `from`/`to` (both relative to `center`), rotating `from`
/// toward `to` the short way around in `segments` equal angular steps.
fn arc_fan(mesh: &mut StrokeMesh, center: Vec2, from: Vec2, to: Vec2, segments: usize) {
    let angle_total = {
        let a = from.normalized();
        let b = to.normalized();
        let dot = a.dot(b).clamp(-1.0, 1.0);
        let mut a_angle = dot.acos();
        if a.cross(b) < 0.0 {
            a_angle = -a_angle;
        }
        a_angle
    };
    let step = angle_total / segments as f32;
    let mut prev_point = center + from;
    for s in 1..=segments {
        let next_point = if s == segments {
            center + to
        } else {
            let (sin, cos) = (step * s as f32).sin_cos();
            center + Vec2::new(from.x * cos - from.y * sin, from.x * sin + from.y * cos)
        };
        mesh.push_triangle(center, prev_point, next_point);
        prev_point = next_point;
    }
}

/// Splits a (possibly closed) flattened contour into a sequence of open
/// polyline runs corresponding to the "on" segments of the dash pattern,
/// honoring `style.dash_offset`.
///
/// Negative or zero offsets are normalized by walking the dash array
/// backward, accumulating pattern length until the running total exceeds the
/// offset's magnitude, exactly as the source library's dash-state
/// initialization did, so a negative offset behaves the same as an
/// equivalent positive one congruent mod the pattern's total length.
fn dash_runs(contour: &FlatContour, style: &StrokeStyle) -> Vec<Vec<FlatVertex>> {
    let pattern = &style.dash_pattern;
    let total: f32 = pattern.iter().sum();
    if total <= 0.0 {
        return vec![contour.vertices.clone()];
    }

    let mut offset = style.dash_offset % total;
    if offset < 0.0 {
        offset += total;
    }

    // Find starting dash index and remaining length within it.
    let mut index = 0usize;
    let mut remaining = offset;
    loop {
        let seg_len = pattern[index % pattern.len()];
        if remaining < seg_len || seg_len <= 0.0 {
            break;
        }
        remaining -= seg_len;
        index += 1;
    }
    let mut dash_index = index % pattern.len();
    let mut dash_remaining = pattern[dash_index] - remaining;
    let mut on = dash_index % 2 == 0;

    let points = &contour.vertices;
    let n = points.len();
    let edge_count = if contour.closed { n } else { n - 1 };

    let mut runs: Vec<Vec<FlatVertex>> = Vec::new();
    let mut current_run: Vec<FlatVertex> = Vec::new();
    if on {
        current_run.push(points[0]);
    }

    for i in 0..edge_count {
        let mut p0 = points[i].pos;
        let p1 = points[(i + 1) % n].pos;
        let mut edge_len = p0.distance(p1);
        let dir = if edge_len > 1e-9 { (p1 - p0) / edge_len } else { Vec2::ZERO };

        while edge_len > 0.0 {
            if dash_remaining >= edge_len {
                dash_remaining -= edge_len;
                if on {
                    current_run.push(FlatVertex { pos: p1, joint: true });
                }
                edge_len = 0.0;
            } else {
                let boundary = p0 + dir * dash_remaining;
                edge_len -= dash_remaining;
                p0 = boundary;
                if on {
                    current_run.push(FlatVertex { pos: boundary, joint: true });
                    runs.push(std::mem::take(&mut current_run));
                } else {
                    current_run.clear();
                    current_run.push(FlatVertex { pos: boundary, joint: false });
                }
                on = !on;
                dash_index = (dash_index + 1) % pattern.len();
                dash_remaining = pattern[dash_index].max(0.0);
            }
        }
    }
    if on && current_run.len() > 1 {
        runs.push(current_run);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn flat_open(points: &[(f32, f32)]) -> FlatContour {
        FlatContour {
            vertices: points.iter().enumerate().map(|(i, &(x, y))| FlatVertex { pos: Vec2::new(x, y), joint: i != 0 }).collect(),
            closed: false,
        }
    }

    #[test]
    fn straight_segment_produces_a_single_quad() {
        let contour = flat_open(&[(0.0, 0.0), (10.0, 0.0)]);
        let style = StrokeStyle { width: 2.0, ..Default::default() };
        let mesh = stroke_contour(&contour, &style, style.width);
        // one quad = two triangles = six vertices, no joins/caps beyond butt.
        assert_eq!(mesh.vertices.len(), 6);
    }

    #[test]
    fn zero_width_stroke_produces_no_geometry() {
        let contour = flat_open(&[(0.0, 0.0), (10.0, 0.0)]);
        let style = StrokeStyle { width: 0.0, ..Default::default() };
        let mesh = stroke_contour(&contour, &style, 0.0);
        assert!(mesh.vertices.is_empty());
    }

    #[test]
    fn round_cap_emits_a_fan() {
        let contour = flat_open(&[(0.0, 0.0), (10.0, 0.0)]);
        let style = StrokeStyle { width: 2.0, cap: StrokeCap::Round, ..Default::default() };
        let mesh = stroke_contour(&contour, &style, style.width);
        // two quads' worth plus two round-cap fans.
        assert!(mesh.vertices.len() > 6);
    }

    #[test]
    fn sharp_miter_beyond_limit_falls_back_to_bevel() {
        // A near-180-degree reversal produces an extreme miter ratio.
        let contour = FlatContour {
            vertices: vec![
                FlatVertex { pos: Vec2::new(0.0, 0.0), joint: false },
                FlatVertex { pos: Vec2::new(10.0, 0.0), joint: true },
                FlatVertex { pos: Vec2::new(0.1, 0.0), joint: true },
            ],
            closed: false,
        };
        let style = StrokeStyle { width: 2.0, join: StrokeJoin::Miter, miter_limit: 4.0, ..Default::default() };
        let bevel_style = StrokeStyle { join: StrokeJoin::Bevel, ..style.clone() };

        let miter_mesh = stroke_contour(&contour, &style, style.width);
        let bevel_mesh = stroke_contour(&contour, &bevel_style, bevel_style.width);
        // The miter join falls back to exactly the bevel triangle once the
        // ratio exceeds the limit, so both meshes end up the same size.
        assert_eq!(miter_mesh.vertices.len(), bevel_mesh.vertices.len());
    }

    #[test]
    fn dash_pattern_splits_a_line_into_alternating_runs() {
        let contour = FlatContour {
            vertices: (0..=10).map(|i| FlatVertex { pos: Vec2::new(i as f32 * 10.0, 0.0), joint: i != 0 }).collect(),
            closed: false,
        };
        let style = StrokeStyle { width: 2.0, dash_pattern: vec![20.0, 20.0], ..Default::default() };
        let runs = dash_runs(&contour, &style);
        // total length 100, dash period 40 (20 on/20 off) -> 3 "on" runs.
        assert_eq!(runs.len(), 3);
        for run in &runs {
            assert!(run.len() >= 2);
        }
    }

    #[test]
    fn negative_dash_offset_normalizes_into_pattern_range() {
        let contour = FlatContour {
            vertices: (0..=10).map(|i| FlatVertex { pos: Vec2::new(i as f32 * 10.0, 0.0), joint: i != 0 }).collect(),
            closed: false,
        };
        let positive = StrokeStyle { width: 2.0, dash_pattern: vec![20.0, 20.0], dash_offset: 10.0, ..Default::default() };
        let negative = StrokeStyle { dash_offset: 10.0 - 40.0, ..positive.clone() };
        assert_eq!(dash_runs(&contour, &positive).len(), dash_runs(&contour, &negative).len());
    }
}
