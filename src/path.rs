//! Path data model and turtle-style builder API.
//!
//! A [`Path`] is a sequence of [`Contour`]s, each a sequence of [`Segment`]s
//! built incrementally with `move_to`/`line_to`/`cubic_to`/`close`, plus the
//! handful of convenience shapes (`add_rect`, `add_ellipse`, `add_circle`)
//! that expand to those primitives. Geometry is only ever appended; edits are
//! done by discarding and rebuilding a contour, matching the immediate-mode
//! shape it is meant to describe.

use crate::error::{record, TarpError};
use crate::geometry::Vec2;

/// A single drawing instruction within a contour.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Segment {
    /// Starts a new sub-path at `to`. Always the first segment of a contour.
    MoveTo { to: Vec2 },
    LineTo { to: Vec2 },
    /// Cubic Bezier with two control points.
    CubicTo { control1: Vec2, control2: Vec2, to: Vec2 },
    /// Closes the contour back to its starting point with a straight line.
    Close,
}

impl Segment {
    /// The on-curve endpoint this segment advances to, if any (`Close` has
    /// none of its own; the caller already knows the contour's start point).
    pub fn end_point(&self) -> Option<Vec2> {
        match *self {
            Segment::MoveTo { to } | Segment::LineTo { to } | Segment::CubicTo { to, .. } => Some(to),
            Segment::Close => None,
        }
    }
}

/// One contiguous sub-path: a `move_to` followed by zero or more drawing
/// segments, optionally closed.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Contour {
    pub segments: Vec<Segment>,
    pub closed: bool,
    start: Vec2,
    last: Vec2,
}

impl Contour {
    fn new(start: Vec2) -> Self {
        Contour { segments: vec![Segment::MoveTo { to: start }], closed: false, start, last: start }
    }

    /// Number of drawing segments after the initial `move_to`, i.e. the
    /// number of curve/line segments this contour actually traces.
    pub fn drawn_segment_count(&self) -> usize {
        self.segments
            .iter()
            .filter(|s| !matches!(s, Segment::MoveTo { .. } | Segment::Close))
            .count()
    }

    pub fn start_point(&self) -> Vec2 {
        self.start
    }

    pub fn last_point(&self) -> Vec2 {
        self.last
    }
}

/// A builder-style geometric path made of one or more contours.
///
/// Errors on malformed use (e.g. `line_to` before any `move_to`) are reported
/// both as a `Result` return from the call that triggered them and recorded
/// in the thread-local last-error slot, so existing call sites that log the
/// boolean success of a draw call still see the failure.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Path {
    contours: Vec<Contour>,
    current_contour_index: Option<usize>,
}

/// Number of cubic Bezier segments used to approximate a full ellipse, and
/// the corresponding control-point offset fraction for a unit circle quadrant
/// (the classic four-cubic circle approximation).
pub const ELLIPSE_KAPPA: f32 = 0.552_284_75;

/// Distance below which `close()` treats the contour's last-drawn point as
/// already coincident with its start, skipping the closing segment.
const CLOSE_EPSILON: f32 = 1e-4;

impl Path {
    pub fn new() -> Self {
        Path::default()
    }

    pub fn contours(&self) -> &[Contour] {
        &self.contours
    }

    pub fn is_empty(&self) -> bool {
        self.contours.is_empty()
    }

    pub fn clear(&mut self) {
        self.contours.clear();
        self.current_contour_index = None;
    }

    fn current_contour_mut(&mut self) -> Result<&mut Contour, TarpError> {
        match self.current_contour_index {
            Some(idx) => Ok(&mut self.contours[idx]),
            None => Err(record(TarpError::BuilderMisuse(
                "no current contour; call move_to first".into(),
            ))),
        }
    }

    /// Starts a new contour at `to`, making it the current contour.
    pub fn move_to(&mut self, to: Vec2) {
        self.contours.push(Contour::new(to));
        self.current_contour_index = Some(self.contours.len() - 1);
    }

    pub fn line_to(&mut self, to: Vec2) -> Result<(), TarpError> {
        let contour = self.current_contour_mut()?;
        contour.segments.push(Segment::LineTo { to });
        contour.last = to;
        Ok(())
    }

    pub fn cubic_to(&mut self, control1: Vec2, control2: Vec2, to: Vec2) -> Result<(), TarpError> {
        let contour = self.current_contour_mut()?;
        contour.segments.push(Segment::CubicTo { control1, control2, to });
        contour.last = to;
        Ok(())
    }

    /// Quadratic Bezier, raised to an equivalent cubic (`control = p0 +
    /// 2/3*(q - p0)` from each end), since the flattener only handles cubics.
    pub fn quad_to(&mut self, control: Vec2, to: Vec2) -> Result<(), TarpError> {
        let from = self.current_contour_mut()?.last;
        let control1 = from + (control - from) * (2.0 / 3.0);
        let control2 = to + (control - to) * (2.0 / 3.0);
        self.cubic_to(control1, control2, to)
    }

    /// Closes the current contour back to its start point.
    ///
    /// Contours with fewer than two drawn segments (e.g. a bare `move_to`, or
    /// a single `line_to` immediately closed) produce no closing segment at
    /// all: there is no meaningful edge to draw back to the start, and
    /// emitting one would fabricate geometry from an uninitialized "last
    /// position" the way the original implementation did. Likewise, if the
    /// caller already drew back to the start point themselves, no closing
    /// segment is appended: a zero-length edge would only add a spurious
    /// duplicate vertex once flattened.
    pub fn close(&mut self) -> Result<(), TarpError> {
        let contour = self.current_contour_mut()?;
        let already_at_start = (contour.last.x - contour.start.x).abs() < CLOSE_EPSILON
            && (contour.last.y - contour.start.y).abs() < CLOSE_EPSILON;
        if contour.drawn_segment_count() < 2 || already_at_start {
            contour.closed = true;
            contour.last = contour.start;
            return Ok(());
        }
        contour.segments.push(Segment::Close);
        contour.closed = true;
        contour.last = contour.start;
        Ok(())
    }

    /// Appends a rectangle contour, starting at the top-left corner and
    /// winding clockwise in a y-down device space.
    pub fn add_rect(&mut self, origin: Vec2, size: Vec2) {
        self.move_to(origin);
        let _ = self.line_to(Vec2::new(origin.x + size.x, origin.y));
        let _ = self.line_to(Vec2::new(origin.x + size.x, origin.y + size.y));
        let _ = self.line_to(Vec2::new(origin.x, origin.y + size.y));
        let _ = self.close();
    }

    /// Appends an axis-aligned ellipse, approximated by four cubic Bezier
    /// quadrants using [`ELLIPSE_KAPPA`].
    pub fn add_ellipse(&mut self, center: Vec2, radii: Vec2) {
        let kx = radii.x * ELLIPSE_KAPPA;
        let ky = radii.y * ELLIPSE_KAPPA;
        let top = Vec2::new(center.x, center.y - radii.y);
        let right = Vec2::new(center.x + radii.x, center.y);
        let bottom = Vec2::new(center.x, center.y + radii.y);
        let left = Vec2::new(center.x - radii.x, center.y);

        self.move_to(top);
        let _ = self.cubic_to(
            Vec2::new(top.x + kx, top.y),
            Vec2::new(right.x, right.y - ky),
            right,
        );
        let _ = self.cubic_to(
            Vec2::new(right.x, right.y + ky),
            Vec2::new(bottom.x + kx, bottom.y),
            bottom,
        );
        let _ = self.cubic_to(
            Vec2::new(bottom.x - kx, bottom.y),
            Vec2::new(left.x, left.y + ky),
            left,
        );
        let _ = self.cubic_to(
            Vec2::new(left.x, left.y - ky),
            Vec2::new(top.x - kx, top.y),
            top,
        );
        let _ = self.close();
    }

    pub fn add_circle(&mut self, center: Vec2, radius: f32) {
        self.add_ellipse(center, Vec2::new(radius, radius));
    }

    /// Appends an SVG-style elliptical arc from the current point to `to`,
    /// using the endpoint parameterization from the SVG spec (as implemented
    /// by nanosvg): out-of-range radii are scaled up just enough to be
    /// feasible, the arc center is recovered from the two endpoints plus the
    /// radii and flags, and the sweep is split into cubic segments no larger
    /// than 90 degrees each, each using the `4/3*(1-cos(d/2))/sin(d/2)`
    /// control-point formula.
    #[allow(clippy::too_many_arguments)]
    pub fn arc_to(
        &mut self,
        radii: Vec2,
        x_rotation_deg: f32,
        large_arc: bool,
        sweep: bool,
        to: Vec2,
    ) -> Result<(), TarpError> {
        let from = self.current_contour_mut()?.last;
        if (from.x - to.x).abs() < 1e-6 && (from.y - to.y).abs() < 1e-6 {
            return Ok(());
        }

        let mut rx = radii.x.abs();
        let mut ry = radii.y.abs();
        if rx < 1e-6 || ry < 1e-6 {
            return self.line_to(to);
        }

        let phi = x_rotation_deg.to_radians();
        let (sin_phi, cos_phi) = phi.sin_cos();

        // Step 1: compute (x1', y1'), the midpoint-relative, unrotated coords.
        let dx2 = (from.x - to.x) / 2.0;
        let dy2 = (from.y - to.y) / 2.0;
        let x1p = cos_phi * dx2 + sin_phi * dy2;
        let y1p = -sin_phi * dx2 + cos_phi * dy2;

        // Step 2: correct out-of-range radii.
        let lambda = (x1p * x1p) / (rx * rx) + (y1p * y1p) / (ry * ry);
        if lambda > 1.0 {
            let scale = lambda.sqrt();
            rx *= scale;
            ry *= scale;
        }

        // Step 3: compute (cx', cy'), the unrotated center.
        let rx_sq = rx * rx;
        let ry_sq = ry * ry;
        let x1p_sq = x1p * x1p;
        let y1p_sq = y1p * y1p;
        let sign = if large_arc == sweep { -1.0 } else { 1.0 };
        let num = (rx_sq * ry_sq - rx_sq * y1p_sq - ry_sq * x1p_sq).max(0.0);
        let denom = rx_sq * y1p_sq + ry_sq * x1p_sq;
        let co = if denom > 1e-12 { sign * (num / denom).sqrt() } else { 0.0 };
        let cxp = co * (rx * y1p / ry);
        let cyp = co * -(ry * x1p / rx);

        // Step 4: recover (cx, cy) from (cx', cy').
        let cx = cos_phi * cxp - sin_phi * cyp + (from.x + to.x) / 2.0;
        let cy = sin_phi * cxp + cos_phi * cyp + (from.y + to.y) / 2.0;

        let angle = |ux: f32, uy: f32, vx: f32, vy: f32| -> f32 {
            let dot = (ux * vx + uy * vy) / ((ux * ux + uy * uy).sqrt() * (vx * vx + vy * vy).sqrt());
            let a = dot.clamp(-1.0, 1.0).acos();
            if ux * vy - uy * vx < 0.0 { -a } else { a }
        };

        let theta1 = angle(1.0, 0.0, (x1p - cxp) / rx, (y1p - cyp) / ry);
        let mut delta_theta = angle(
            (x1p - cxp) / rx,
            (y1p - cyp) / ry,
            (-x1p - cxp) / rx,
            (-y1p - cyp) / ry,
        );
        if !sweep && delta_theta > 0.0 {
            delta_theta -= 2.0 * std::f32::consts::PI;
        } else if sweep && delta_theta < 0.0 {
            delta_theta += 2.0 * std::f32::consts::PI;
        }

        let segment_count = (delta_theta.abs() / (std::f32::consts::PI / 2.0)).ceil().max(1.0) as usize;
        let delta = delta_theta / segment_count as f32;
        let kappa = 4.0 / 3.0 * (1.0 - (delta / 2.0).cos()) / (delta / 2.0).sin().max(1e-6) * delta.signum();

        let point_at = |theta: f32| -> Vec2 {
            let x = cx + rx * theta.cos() * cos_phi - ry * theta.sin() * sin_phi;
            let y = cy + rx * theta.cos() * sin_phi + ry * theta.sin() * cos_phi;
            Vec2::new(x, y)
        };
        let tangent_at = |theta: f32| -> Vec2 {
            let x = -rx * theta.sin() * cos_phi - ry * theta.cos() * sin_phi;
            let y = -rx * theta.sin() * sin_phi + ry * theta.cos() * cos_phi;
            Vec2::new(x, y)
        };

        let mut theta = theta1;
        for i in 0..segment_count {
            let theta_next = theta + delta;
            let p0 = if i == 0 { from } else { point_at(theta) };
            let p3 = if i == segment_count - 1 { to } else { point_at(theta_next) };
            let t0 = tangent_at(theta);
            let t1 = tangent_at(theta_next);
            let c1 = p0 + t0 * kappa;
            let c2 = p3 - t1 * kappa;
            self.cubic_to(c1, c2, p3)?;
            theta = theta_next;
        }
        Ok(())
    }

    /// Removes the contour at `index`, adjusting the current-contour pointer
    /// so it still refers to the same logical contour (or becomes `None` if
    /// the removed contour was the current one, or is shifted down by one if
    /// it pointed past the removed index).
    pub fn remove_contour(&mut self, index: usize) -> Result<(), TarpError> {
        if index >= self.contours.len() {
            return Err(record(TarpError::InvalidHandle(format!(
                "contour index {index} out of range"
            ))));
        }
        self.contours.remove(index);
        self.current_contour_index = match self.current_contour_index {
            Some(current) if current == index => {
                if self.contours.is_empty() {
                    None
                } else {
                    Some(index.min(self.contours.len() - 1))
                }
            }
            Some(current) if current > index => Some(current - 1),
            other => other,
        };
        Ok(())
    }

    /// Computes the unflattened control-point bounding box, a cheap upper
    /// bound used before a full flatten when only a rough extent is needed.
    pub fn control_bounds(&self) -> crate::geometry::Bounds {
        let mut bounds = crate::geometry::Bounds::EMPTY;
        for contour in &self.contours {
            for segment in &contour.segments {
                match *segment {
                    Segment::MoveTo { to } | Segment::LineTo { to } => bounds.add_point(to),
                    Segment::CubicTo { control1, control2, to } => {
                        bounds.add_point(control1);
                        bounds.add_point(control2);
                        bounds.add_point(to);
                    }
                    Segment::Close => {}
                }
            }
        }
        bounds
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn close_on_short_contour_emits_no_close_segment() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.close().unwrap();
        assert!(!path.contours()[0].segments.iter().any(|s| matches!(s, Segment::Close)));
        assert!(path.contours()[0].closed);
    }

    #[test]
    fn close_on_real_contour_emits_close_segment() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.line_to(Vec2::new(10.0, 0.0)).unwrap();
        path.line_to(Vec2::new(10.0, 10.0)).unwrap();
        path.close().unwrap();
        assert!(matches!(path.contours()[0].segments.last(), Some(Segment::Close)));
    }

    #[test]
    fn line_to_before_move_to_is_an_error() {
        let mut path = Path::new();
        assert!(path.line_to(Vec2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn remove_contour_adjusts_current_index() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.move_to(Vec2::new(1.0, 1.0));
        path.move_to(Vec2::new(2.0, 2.0));
        // current points at the third contour (index 2).
        path.remove_contour(0).unwrap();
        // the former index-2 contour is now index 1.
        path.line_to(Vec2::new(9.0, 9.0)).unwrap();
        assert_eq!(path.contours().len(), 2);
        assert_eq!(path.contours()[1].last_point(), Vec2::new(9.0, 9.0));
    }

    #[test]
    fn remove_current_contour_clears_current_index() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.remove_contour(0).unwrap();
        assert!(path.line_to(Vec2::new(1.0, 1.0)).is_err());
    }

    #[test]
    fn add_rect_produces_four_line_segments_and_closes() {
        let mut path = Path::new();
        path.add_rect(Vec2::new(0.0, 0.0), Vec2::new(10.0, 20.0));
        let contour = &path.contours()[0];
        assert_eq!(contour.drawn_segment_count(), 3);
        assert!(contour.closed);
    }

    #[test]
    fn add_circle_produces_four_cubics() {
        let mut path = Path::new();
        path.add_circle(Vec2::new(0.0, 0.0), 5.0);
        let contour = &path.contours()[0];
        let cubic_count = contour.segments.iter().filter(|s| matches!(s, Segment::CubicTo { .. })).count();
        assert_eq!(cubic_count, 4);
    }

    #[test]
    fn arc_to_half_circle_reaches_target_point() {
        let mut path = Path::new();
        path.move_to(Vec2::new(-10.0, 0.0));
        path.arc_to(Vec2::new(10.0, 10.0), 0.0, false, true, Vec2::new(10.0, 0.0)).unwrap();
        let last = path.contours()[0].last_point();
        assert!((last.x - 10.0).abs() < 1e-3);
        assert!((last.y - 0.0).abs() < 1e-3);
    }

    #[test]
    fn arc_to_degenerate_radius_falls_back_to_line() {
        let mut path = Path::new();
        path.move_to(Vec2::new(0.0, 0.0));
        path.arc_to(Vec2::new(0.0, 0.0), 0.0, false, true, Vec2::new(5.0, 5.0)).unwrap();
        assert!(matches!(path.contours()[0].segments.last(), Some(Segment::LineTo { to }) if *to == Vec2::new(5.0, 5.0)));
    }
}
