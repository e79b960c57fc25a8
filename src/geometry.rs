//! 2D vector and affine transform primitives shared across the crate.
//!
//! These mirror the small set of vector/matrix helpers the original stencil
//! rasterizer kept private to its translation unit: a 2-component point/vector,
//! a 2x2 linear part, and a 2x3 affine transform (2x2 + translation) with a
//! `decompose` that pulls scale/rotation/skew apart for non-scaling-stroke and
//! text-like use cases.

use std::ops::{Add, Div, Mul, Neg, Sub};

/// A 2D point or vector. Used interchangeably for positions, directions and
/// control points throughout path flattening and stroking.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Vec2 {
    pub x: f32,
    pub y: f32,
}

impl Default for Vec2 {
    fn default() -> Self {
        Vec2::ZERO
    }
}

impl Vec2 {
    pub const ZERO: Vec2 = Vec2 { x: 0.0, y: 0.0 };

    pub fn new(x: f32, y: f32) -> Self {
        Vec2 { x, y }
    }

    pub fn length(self) -> f32 {
        (self.x * self.x + self.y * self.y).sqrt()
    }

    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    pub fn normalized(self) -> Vec2 {
        let len = self.length();
        if len < f32::EPSILON {
            Vec2::ZERO
        } else {
            Vec2::new(self.x / len, self.y / len)
        }
    }

    /// Perpendicular vector, rotated 90 degrees counter-clockwise.
    pub fn perp(self) -> Vec2 {
        Vec2::new(-self.y, self.x)
    }

    pub fn dot(self, other: Vec2) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (the z component of the 3D cross product).
    pub fn cross(self, other: Vec2) -> f32 {
        self.x * other.y - self.y * other.x
    }

    pub fn lerp(self, other: Vec2, t: f32) -> Vec2 {
        Vec2::new(self.x + (other.x - self.x) * t, self.y + (other.y - self.y) * t)
    }

    pub fn distance(self, other: Vec2) -> f32 {
        (self - other).length()
    }
}

impl Add for Vec2 {
    type Output = Vec2;
    fn add(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vec2 {
    type Output = Vec2;
    fn sub(self, rhs: Vec2) -> Vec2 {
        Vec2::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vec2 {
    type Output = Vec2;
    fn mul(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vec2 {
    type Output = Vec2;
    fn div(self, rhs: f32) -> Vec2 {
        Vec2::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vec2 {
    type Output = Vec2;
    fn neg(self) -> Vec2 {
        Vec2::new(-self.x, -self.y)
    }
}

/// An axis-aligned bounding box, half-open in neither axis (min/max inclusive).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Vec2,
    pub max: Vec2,
}

impl Default for Bounds {
    fn default() -> Self {
        Bounds::EMPTY
    }
}

impl Bounds {
    pub const EMPTY: Bounds = Bounds {
        min: Vec2 { x: f32::MAX, y: f32::MAX },
        max: Vec2 { x: f32::MIN, y: f32::MIN },
    };

    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y
    }

    pub fn add_point(&mut self, p: Vec2) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
    }

    pub fn union(&mut self, other: Bounds) {
        if other.is_empty() {
            return;
        }
        self.add_point(other.min);
        self.add_point(other.max);
    }

    /// Grows the box uniformly by `amount` in every direction, e.g. to account
    /// for stroke half-width when computing a render cache's dirty bounds.
    pub fn expand(&self, amount: f32) -> Bounds {
        if self.is_empty() {
            return *self;
        }
        Bounds {
            min: Vec2::new(self.min.x - amount, self.min.y - amount),
            max: Vec2::new(self.max.x + amount, self.max.y + amount),
        }
    }

    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }
}

/// The linear (2x2) part of an affine transform, in row-major order:
/// `[a b; c d]`, applied as `x' = a*x + c*y`, `y' = b*x + d*y`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat2 {
    pub a: f32,
    pub b: f32,
    pub c: f32,
    pub d: f32,
}

impl Mat2 {
    pub const IDENTITY: Mat2 = Mat2 { a: 1.0, b: 0.0, c: 0.0, d: 1.0 };

    pub fn determinant(&self) -> f32 {
        self.a * self.d - self.b * self.c
    }

    pub fn apply(&self, v: Vec2) -> Vec2 {
        Vec2::new(self.a * v.x + self.c * v.y, self.b * v.x + self.d * v.y)
    }

    pub fn multiply(&self, other: &Mat2) -> Mat2 {
        Mat2 {
            a: self.a * other.a + self.c * other.b,
            b: self.b * other.a + self.d * other.b,
            c: self.a * other.c + self.c * other.d,
            d: self.b * other.c + self.d * other.d,
        }
    }

    pub fn inverse(&self) -> Option<Mat2> {
        let det = self.determinant();
        if det.abs() < 1e-12 {
            return None;
        }
        let inv_det = 1.0 / det;
        Some(Mat2 {
            a: self.d * inv_det,
            b: -self.b * inv_det,
            c: -self.c * inv_det,
            d: self.a * inv_det,
        })
    }
}

/// Decomposed linear part: isotropic scale along each axis plus a rotation,
/// with any residual skew folded into `skew_x`. Used to derive a
/// non-scaling-stroke correction factor and to estimate per-axis flattening
/// tolerance under a non-uniform transform.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Decomposed {
    pub translation: Vec2,
    pub rotation: f32,
    pub scale: Vec2,
    pub skew_x: f32,
}

/// A 2D affine transform: linear part plus translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AffineTransform {
    pub matrix: Mat2,
    pub translation: Vec2,
}

impl Default for AffineTransform {
    fn default() -> Self {
        AffineTransform::IDENTITY
    }
}

impl AffineTransform {
    pub const IDENTITY: AffineTransform = AffineTransform {
        matrix: Mat2::IDENTITY,
        translation: Vec2::ZERO,
    };

    pub fn translation(x: f32, y: f32) -> Self {
        AffineTransform { matrix: Mat2::IDENTITY, translation: Vec2::new(x, y) }
    }

    pub fn scaling(sx: f32, sy: f32) -> Self {
        AffineTransform {
            matrix: Mat2 { a: sx, b: 0.0, c: 0.0, d: sy },
            translation: Vec2::ZERO,
        }
    }

    pub fn rotation(radians: f32) -> Self {
        let (s, c) = radians.sin_cos();
        AffineTransform {
            matrix: Mat2 { a: c, b: s, c: -s, d: c },
            translation: Vec2::ZERO,
        }
    }

    pub fn apply_point(&self, p: Vec2) -> Vec2 {
        self.matrix.apply(p) + self.translation
    }

    /// Transforms a vector (direction), ignoring translation.
    pub fn apply_vector(&self, v: Vec2) -> Vec2 {
        self.matrix.apply(v)
    }

    /// Composes `self * other`, i.e. applying the result to a point is
    /// equivalent to applying `other` first, then `self`.
    pub fn multiply(&self, other: &AffineTransform) -> AffineTransform {
        AffineTransform {
            matrix: self.matrix.multiply(&other.matrix),
            translation: self.matrix.apply(other.translation) + self.translation,
        }
    }

    pub fn inverse(&self) -> Option<AffineTransform> {
        let inv_matrix = self.matrix.inverse()?;
        Some(AffineTransform {
            matrix: inv_matrix,
            translation: -inv_matrix.apply(self.translation),
        })
    }

    /// Decomposes the linear part into scale/rotation/skew, QR-style: the
    /// first column gives rotation and x-scale, the remainder of the second
    /// column (after removing the rotated component) gives y-scale and skew.
    pub fn decompose(&self) -> Decomposed {
        let m = &self.matrix;
        let scale_x = Vec2::new(m.a, m.b).length();
        let rotation = m.b.atan2(m.a);
        let (s, c) = rotation.sin_cos();
        // Remove the rotation from the second column to isolate scale/skew.
        let c2 = Vec2::new(m.c, m.d);
        let skew_x = c2.dot(Vec2::new(c, s));
        let scale_y_vec = c2 - Vec2::new(c, s) * skew_x;
        let scale_y = scale_y_vec.length() * if m.determinant() < 0.0 { -1.0 } else { 1.0 };
        let skew_x = if scale_y.abs() > f32::EPSILON { skew_x / scale_y } else { 0.0 };
        Decomposed {
            translation: self.translation,
            rotation,
            scale: Vec2::new(scale_x, scale_y),
            skew_x,
        }
    }

    /// A scalar factor approximating how much this transform stretches
    /// lengths, used to keep non-scaling strokes a constant width in device
    /// pixels regardless of the current transform.
    pub fn average_scale(&self) -> f32 {
        let d = self.decompose();
        ((d.scale.x.abs() + d.scale.y.abs()) * 0.5).max(1e-6)
    }

    /// The larger of the two axis scale factors, used to derive a flattening
    /// tolerance and to decide whether a render cache's geometry needs
    /// re-tessellating: `max(|scale.x|, |scale.y|)` rather than
    /// [`average_scale`](Self::average_scale)'s mean, since it's the more
    /// stretched axis that determines how coarse a polyline approximation
    /// can get away with staying under a given device-space tolerance.
    pub fn transform_scale(&self) -> f32 {
        let d = self.decompose();
        d.scale.x.abs().max(d.scale.y.abs()).max(1e-6)
    }
}

/// A column-major 4x4 matrix, used only for the projection matrix handed to
/// the GPU backend (orthographic or perspective), matching wgpu's expected
/// clip-space convention (z in `[0, 1]`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Mat4 {
    pub cols: [[f32; 4]; 4],
}

impl Mat4 {
    pub const IDENTITY: Mat4 = Mat4 {
        cols: [
            [1.0, 0.0, 0.0, 0.0],
            [0.0, 1.0, 0.0, 0.0],
            [0.0, 0.0, 1.0, 0.0],
            [0.0, 0.0, 0.0, 1.0],
        ],
    };

    /// Standard orthographic projection mapping `[left, right] x [bottom, top]`
    /// to wgpu clip space, with near/far mapped to `[0, 1]`.
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let rl = right - left;
        let tb = top - bottom;
        let fn_ = far - near;
        Mat4 {
            cols: [
                [2.0 / rl, 0.0, 0.0, 0.0],
                [0.0, 2.0 / tb, 0.0, 0.0],
                [0.0, 0.0, 1.0 / fn_, 0.0],
                [-(right + left) / rl, -(top + bottom) / tb, -near / fn_, 1.0],
            ],
        }
    }

    pub fn to_array(&self) -> [[f32; 4]; 4] {
        self.cols
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn affine_inverse_round_trips() {
        let t = AffineTransform::translation(3.0, -2.0)
            .multiply(&AffineTransform::rotation(0.4))
            .multiply(&AffineTransform::scaling(2.0, 0.5));
        let inv = t.inverse().expect("non-degenerate transform must invert");
        let p = Vec2::new(7.0, -11.0);
        let round_tripped = inv.apply_point(t.apply_point(p));
        assert!((round_tripped.x - p.x).abs() < 1e-4);
        assert!((round_tripped.y - p.y).abs() < 1e-4);
    }

    #[test]
    fn decompose_recovers_uniform_scale() {
        let t = AffineTransform::scaling(2.5, 2.5).multiply(&AffineTransform::rotation(0.9));
        let d = t.decompose();
        assert!((d.scale.x - 2.5).abs() < 1e-4);
        assert!((d.scale.y - 2.5).abs() < 1e-4);
        assert!((t.average_scale() - 2.5).abs() < 1e-4);
    }

    #[test]
    fn singular_matrix_has_no_inverse() {
        let degenerate = AffineTransform { matrix: Mat2 { a: 1.0, b: 2.0, c: 2.0, d: 4.0 }, translation: Vec2::ZERO };
        assert!(degenerate.inverse().is_none());
    }

    #[test]
    fn bounds_union_and_expand() {
        let mut bounds = Bounds::EMPTY;
        bounds.add_point(Vec2::new(0.0, 0.0));
        bounds.add_point(Vec2::new(10.0, 4.0));
        assert_eq!(bounds.width(), 10.0);
        assert_eq!(bounds.height(), 4.0);

        let expanded = bounds.expand(1.0);
        assert_eq!(expanded.min, Vec2::new(-1.0, -1.0));
        assert_eq!(expanded.max, Vec2::new(11.0, 5.0));
    }

    #[test]
    fn vec2_perp_is_rotation_by_quarter_turn() {
        let v = Vec2::new(1.0, 0.0);
        assert_eq!(v.perp(), Vec2::new(0.0, 1.0));
        assert!((v.perp().length() - v.length()).abs() < 1e-6);
    }
}
