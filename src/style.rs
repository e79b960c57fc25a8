//! Paint and style types shared by fill and stroke draw calls.

use crate::color::Color;
use crate::id::GradientId;

/// How overlapping contours of a path combine to decide the filled region.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FillRule {
    #[default]
    NonZero,
    EvenOdd,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokeCap {
    #[default]
    Butt,
    Round,
    Square,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StrokeJoin {
    #[default]
    Miter,
    Round,
    Bevel,
}

/// What a fill or stroke draws with: nothing, a flat color, or a reference
/// to a previously registered gradient.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum Paint {
    #[default]
    None,
    Color(Color),
    Gradient(GradientId),
}

/// Stroke-only geometric parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct StrokeStyle {
    pub width: f32,
    pub cap: StrokeCap,
    pub join: StrokeJoin,
    /// Miter limit as a ratio of stroke width; joins exceeding it fall back
    /// to a bevel, matching the standard SVG/Cairo behavior.
    pub miter_limit: f32,
    /// Alternating on/off lengths; empty means a solid stroke.
    pub dash_pattern: Vec<f32>,
    pub dash_offset: f32,
    /// When `true`, the stroke keeps a constant width in device pixels
    /// regardless of the current transform's scale.
    pub non_scaling: bool,
}

impl Default for StrokeStyle {
    fn default() -> Self {
        StrokeStyle {
            width: 1.0,
            cap: StrokeCap::default(),
            join: StrokeJoin::default(),
            miter_limit: 10.0,
            dash_pattern: Vec::new(),
            dash_offset: 0.0,
            non_scaling: false,
        }
    }
}

/// Full paint state for one `draw_path` call: independent fill and stroke
/// paints (either may be `Paint::None` to skip that pass) plus the fill rule
/// and stroke geometry parameters.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Style {
    pub fill_paint: Paint,
    pub fill_rule: FillRule,
    pub stroke_paint: Paint,
    pub stroke_style: StrokeStyle,
}

impl Style {
    pub fn fill(paint: Paint) -> Self {
        Style { fill_paint: paint, ..Default::default() }
    }

    pub fn has_fill(&self) -> bool {
        !matches!(self.fill_paint, Paint::None)
    }

    pub fn has_stroke(&self) -> bool {
        !matches!(self.stroke_paint, Paint::None) && self.stroke_style.width > 0.0
    }
}
