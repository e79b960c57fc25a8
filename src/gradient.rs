//! Gradient paints: color stop lists, ramp-texture sampling data, and the
//! fan geometry used to draw a gradient-filled region.

use crate::color::Color;
use crate::error::{record, TarpError};
use crate::geometry::Vec2;
use crate::id::GradientId;

/// One color stop in a gradient ramp.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ColorStop {
    pub offset: f32,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GradientKind {
    Linear { start: Vec2, end: Vec2 },
    Radial { center: Vec2, radius: Vec2, focal: Vec2 },
}

/// Width of the 1D ramp texture sampled by the gradient shader. A power of
/// two large enough that banding is imperceptible for any reasonable number
/// of stops, and fine enough that a hard-edged stop transition doesn't lose
/// more than a texel's width of precision.
pub const RAMP_TEXTURE_WIDTH: usize = 1024;

/// A gradient paint: an ordered, finalized list of color stops plus its
/// linear/radial geometry. Built once via [`GradientBuilder`], then
/// registered with a [`Context`](crate::context::Context) and referenced from
/// a [`Style`](crate::style::Style) by its [`GradientId`].
#[derive(Debug, Clone, PartialEq)]
pub struct Gradient {
    pub id: GradientId,
    pub kind: GradientKind,
    stops: Vec<ColorStop>,
}

/// Incrementally builds a [`Gradient`]; stops may be added in any order and
/// are sorted and deduplicated when [`finish`](GradientBuilder::finish) is
/// called.
#[derive(Debug, Clone)]
pub struct GradientBuilder {
    kind: GradientKind,
    stops: Vec<ColorStop>,
}

impl GradientBuilder {
    pub fn linear(start: Vec2, end: Vec2) -> Self {
        GradientBuilder { kind: GradientKind::Linear { start, end }, stops: Vec::new() }
    }

    /// `focal` defaults to `center` for a concentric radial gradient; pass a
    /// point inside the ellipse for an off-center focal highlight.
    pub fn radial(center: Vec2, radius: Vec2, focal: Vec2) -> Self {
        GradientBuilder { kind: GradientKind::Radial { center, radius, focal }, stops: Vec::new() }
    }

    pub fn add_stop(mut self, offset: f32, color: Color) -> Self {
        self.stops.push(ColorStop { offset: offset.clamp(0.0, 1.0), color });
        self
    }

    /// Sorts stops by offset, then removes later duplicates at exactly equal
    /// offsets (first-seen wins), matching the original ramp-texture
    /// generator's tie-breaking rule. Requires at least one stop.
    pub fn finish(mut self) -> Result<Gradient, TarpError> {
        if self.stops.is_empty() {
            return Err(record(TarpError::BuilderMisuse(
                "gradient must have at least one color stop".into(),
            )));
        }
        self.stops.sort_by(|a, b| a.offset.partial_cmp(&b.offset).unwrap_or(std::cmp::Ordering::Equal));
        let mut deduped: Vec<ColorStop> = Vec::with_capacity(self.stops.len());
        for stop in self.stops {
            if deduped.last().map(|last: &ColorStop| last.offset == stop.offset).unwrap_or(false) {
                continue;
            }
            deduped.push(stop);
        }
        Ok(Gradient { id: GradientId::next(), kind: self.kind, stops: deduped })
    }
}

impl Gradient {
    pub fn stops(&self) -> &[ColorStop] {
        &self.stops
    }

    /// Samples the gradient at `t` in `[0, 1]` by linear interpolation
    /// between the two bracketing stops, clamping to the end colors outside
    /// the stop range. Used both to build the ramp texture and, for backends
    /// without texture sampling, to sample directly.
    pub fn sample(&self, t: f32) -> Color {
        let t = t.clamp(0.0, 1.0);
        if self.stops.len() == 1 {
            return self.stops[0].color;
        }
        if t <= self.stops[0].offset {
            return self.stops[0].color;
        }
        let last = self.stops.len() - 1;
        if t >= self.stops[last].offset {
            return self.stops[last].color;
        }
        for window in self.stops.windows(2) {
            let (a, b) = (window[0], window[1]);
            if t >= a.offset && t <= b.offset {
                let span = (b.offset - a.offset).max(1e-6);
                return a.color.lerp(b.color, (t - a.offset) / span);
            }
        }
        self.stops[last].color
    }

    /// Builds the 1D RGBA8 ramp texture data the backend uploads and samples
    /// from during the gradient cover pass.
    pub fn build_ramp_texture(&self) -> Vec<[u8; 4]> {
        (0..RAMP_TEXTURE_WIDTH)
            .map(|i| {
                let t = i as f32 / (RAMP_TEXTURE_WIDTH - 1) as f32;
                let c = self.sample(t).clamped();
                [
                    (c.r * 255.0).round() as u8,
                    (c.g * 255.0).round() as u8,
                    (c.b * 255.0).round() as u8,
                    (c.a * 255.0).round() as u8,
                ]
            })
            .collect()
    }
}

/// One vertex of a gradient cover-pass fan: device-space position plus the
/// ramp-texture coordinate (`tc.x` in `[0, 1]`) to sample at that point.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GradientVertex {
    pub pos: Vec2,
    pub tc: f32,
}

/// Number of edge subdivisions used to approximate the unit circle when
/// building a radial gradient's fan geometry.
const RADIAL_FAN_SEGMENTS: usize = 64;

/// Builds the triangle-fan cover geometry for `gradient`, clipped to
/// `bounds_in_gradient_space` (the device-space bounding quad of the path
/// being painted, expressed in the same space the gradient's own geometry
/// was defined in — callers are responsible for keeping gradient and path
/// coordinates in the same space at draw time, since transforming only one
/// of the two independently reproduces the source implementation's
/// non-scaling-stroke gradient-misalignment defect).
pub fn build_fan(gradient: &Gradient, bounds_min: Vec2, bounds_max: Vec2) -> Vec<GradientVertex> {
    match gradient.kind {
        GradientKind::Linear { start, end } => build_linear_fan(start, end, bounds_min, bounds_max),
        GradientKind::Radial { center, radius, focal } => build_radial_fan(center, radius, focal, bounds_min, bounds_max),
    }
}

fn build_linear_fan(start: Vec2, end: Vec2, bounds_min: Vec2, bounds_max: Vec2) -> Vec<GradientVertex> {
    let axis = end - start;
    let axis_len_sq = axis.length_squared().max(1e-9);
    let project = |p: Vec2| -> f32 { (p - start).dot(axis) / axis_len_sq };

    let corners = [
        Vec2::new(bounds_min.x, bounds_min.y),
        Vec2::new(bounds_max.x, bounds_min.y),
        Vec2::new(bounds_max.x, bounds_max.y),
        Vec2::new(bounds_min.x, bounds_max.y),
    ];
    corners
        .iter()
        .map(|&p| GradientVertex { pos: p, tc: project(p) })
        .collect()
}

/// Returns a point's gradient parameter `t` given its position in the
/// ellipse's unit-circle space and the (already-clamped) focal point in that
/// same space: the ratio of the point's distance from the focal point to the
/// distance from the focal point to where the same ray exits the unit
/// circle. This is exactly `1.0` on the ellipse rim, less than `1.0` inside
/// it, and greater than `1.0` for a point beyond the rim (e.g. a paint
/// bounds corner that falls outside the gradient's own ellipse), which is
/// the intended behavior: such a point samples past the last color stop.
fn radial_tc(point_unit: Vec2, focal_unit: Vec2) -> f32 {
    let offset = point_unit - focal_unit;
    let dist = offset.length();
    if dist < 1e-6 {
        return 0.0;
    }
    let dir = offset * (1.0 / dist);
    let b = 2.0 * focal_unit.dot(dir);
    let c = focal_unit.length_squared() - 1.0;
    let disc = (b * b - 4.0 * c).max(0.0).sqrt();
    let t_edge = ((-b + disc) / 2.0).max(1e-6);
    dist / t_edge
}

/// Builds a radial gradient's fan by walking the paint bounds' four corners
/// (the region the cover pass actually needs to shade), subdividing each
/// edge so the gradient parameter varies smoothly across it rather than
/// being interpolated linearly in device space, and computing each vertex's
/// `tc` via [`radial_tc`] so the fan correctly covers bounds that extend
/// beyond the gradient's own ellipse.
fn build_radial_fan(center: Vec2, radius: Vec2, focal: Vec2, bounds_min: Vec2, bounds_max: Vec2) -> Vec<GradientVertex> {
    let rx = radius.x.max(1e-6);
    let ry = radius.y.max(1e-6);
    // Clamp the focal point to stay strictly inside the unit circle so every
    // ray from it exits through exactly one point on the rim.
    let focal_unit = Vec2::new((focal.x - center.x) / rx, (focal.y - center.y) / ry);
    let focal_len = focal_unit.length();
    let focal_unit = if focal_len >= 0.999 {
        focal_unit * (0.999 / focal_len.max(1e-6))
    } else {
        focal_unit
    };

    let to_unit = |p: Vec2| Vec2::new((p.x - center.x) / rx, (p.y - center.y) / ry);

    // Corners in the order maxX-minY, maxX-maxY, minX-maxY, minX-minY, which
    // walks the bounds rect counter-clockwise starting from the corner
    // nearest the positive x-axis.
    let corners = [
        Vec2::new(bounds_max.x, bounds_min.y),
        Vec2::new(bounds_max.x, bounds_max.y),
        Vec2::new(bounds_min.x, bounds_max.y),
        Vec2::new(bounds_min.x, bounds_min.y),
    ];

    let segments_per_edge = (RADIAL_FAN_SEGMENTS / 4).max(1);
    let mut vertices = Vec::with_capacity(RADIAL_FAN_SEGMENTS + 4);
    vertices.push(GradientVertex { pos: center + Vec2::new(focal_unit.x * rx, focal_unit.y * ry), tc: 0.0 });

    for edge in 0..4 {
        let a = corners[edge];
        let b = corners[(edge + 1) % 4];
        for step in 0..segments_per_edge {
            let t = step as f32 / segments_per_edge as f32;
            let pos = a + (b - a) * t;
            let tc = radial_tc(to_unit(pos), focal_unit);
            vertices.push(GradientVertex { pos, tc });
        }
    }
    // Close the fan back to the first rim vertex.
    let tc = radial_tc(to_unit(corners[0]), focal_unit);
    vertices.push(GradientVertex { pos: corners[0], tc });

    vertices
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finish_requires_at_least_one_stop() {
        let result = GradientBuilder::linear(Vec2::ZERO, Vec2::new(1.0, 0.0)).finish();
        assert!(result.is_err());
    }

    #[test]
    fn finish_sorts_stops_by_offset() {
        let gradient = GradientBuilder::linear(Vec2::ZERO, Vec2::new(1.0, 0.0))
            .add_stop(0.8, Color::WHITE)
            .add_stop(0.2, Color::BLACK)
            .finish()
            .unwrap();
        let offsets: Vec<f32> = gradient.stops().iter().map(|s| s.offset).collect();
        assert_eq!(offsets, vec![0.2, 0.8]);
    }

    #[test]
    fn finish_dedups_exact_offset_ties_keeping_first_seen() {
        let gradient = GradientBuilder::linear(Vec2::ZERO, Vec2::new(1.0, 0.0))
            .add_stop(0.5, Color::BLACK)
            .add_stop(0.5, Color::WHITE)
            .finish()
            .unwrap();
        assert_eq!(gradient.stops().len(), 1);
        assert_eq!(gradient.stops()[0].color, Color::BLACK);
    }

    #[test]
    fn sample_clamps_outside_stop_range() {
        let gradient = GradientBuilder::linear(Vec2::ZERO, Vec2::new(1.0, 0.0))
            .add_stop(0.25, Color::BLACK)
            .add_stop(0.75, Color::WHITE)
            .finish()
            .unwrap();
        assert_eq!(gradient.sample(0.0), Color::BLACK);
        assert_eq!(gradient.sample(1.0), Color::WHITE);
    }

    #[test]
    fn sample_interpolates_between_bracketing_stops() {
        let gradient = GradientBuilder::linear(Vec2::ZERO, Vec2::new(1.0, 0.0))
            .add_stop(0.0, Color::rgba(0.0, 0.0, 0.0, 1.0))
            .add_stop(1.0, Color::rgba(1.0, 1.0, 1.0, 1.0))
            .finish()
            .unwrap();
        let mid = gradient.sample(0.5);
        assert!((mid.r - 0.5).abs() < 1e-5);
    }

    #[test]
    fn ramp_texture_has_expected_width_and_endpoints() {
        let gradient = GradientBuilder::linear(Vec2::ZERO, Vec2::new(1.0, 0.0))
            .add_stop(0.0, Color::BLACK)
            .add_stop(1.0, Color::WHITE)
            .finish()
            .unwrap();
        let ramp = gradient.build_ramp_texture();
        assert_eq!(ramp.len(), RAMP_TEXTURE_WIDTH);
        assert_eq!(ramp[0], [0, 0, 0, 255]);
        assert_eq!(ramp[RAMP_TEXTURE_WIDTH - 1], [255, 255, 255, 255]);
    }

    #[test]
    fn linear_fan_tc_matches_projection_onto_axis() {
        let gradient = GradientBuilder::linear(Vec2::new(0.0, 0.0), Vec2::new(10.0, 0.0))
            .add_stop(0.0, Color::BLACK)
            .add_stop(1.0, Color::WHITE)
            .finish()
            .unwrap();
        let fan = build_fan(&gradient, Vec2::new(0.0, 0.0), Vec2::new(10.0, 5.0));
        let left_tc: Vec<f32> = fan.iter().filter(|v| v.pos.x == 0.0).map(|v| v.tc).collect();
        let right_tc: Vec<f32> = fan.iter().filter(|v| v.pos.x == 10.0).map(|v| v.tc).collect();
        assert!(left_tc.iter().all(|&tc| (tc - 0.0).abs() < 1e-5));
        assert!(right_tc.iter().all(|&tc| (tc - 1.0).abs() < 1e-5));
    }

    #[test]
    fn radial_fan_focal_point_is_clamped_inside_the_ellipse() {
        let gradient = GradientBuilder::radial(Vec2::ZERO, Vec2::new(5.0, 5.0), Vec2::new(5.0, 0.0))
            .add_stop(0.0, Color::BLACK)
            .add_stop(1.0, Color::WHITE)
            .finish()
            .unwrap();
        let fan = build_fan(&gradient, Vec2::new(-5.0, -5.0), Vec2::new(5.0, 5.0));
        let focal_vertex = fan[0];
        assert!(focal_vertex.pos.distance(Vec2::ZERO) < 5.0);
    }
}
