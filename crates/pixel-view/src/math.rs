//! 4x4 affine matrix math.
//!
//! Layout is column-major (`m[col * 4 + row]`), matching what WGSL `mat4x4<f32>`
//! uniforms expect. The grid only uses the 2D subset (z fixed at 0), but the
//! operations are full 3D so matrices can be uploaded unchanged.
//!
//! `Mat4` is a plain `Copy` value. The `*_in_place` / `*_into` variants exist for
//! the per-frame paths that want to reuse an existing matrix.

use core::ops::Mul;
use std::fmt;

/// Returned by [`Mat4::invert`] when the determinant is zero or non-finite.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct InvalidTransform;

impl fmt::Display for InvalidTransform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "matrix has no inverse")
    }
}

impl std::error::Error for InvalidTransform {}

/// Column-major 4x4 `f32` matrix.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Mat4(pub [f32; 16]);

impl Default for Mat4 {
    fn default() -> Self {
        Self::identity()
    }
}

impl Mat4 {
    #[inline]
    pub const fn identity() -> Self {
        Self([
            1.0, 0.0, 0.0, 0.0, //
            0.0, 1.0, 0.0, 0.0, //
            0.0, 0.0, 1.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ])
    }

    #[inline]
    pub const fn from_cols_array(m: [f32; 16]) -> Self {
        Self(m)
    }

    #[inline]
    pub fn as_array(&self) -> &[f32; 16] {
        &self.0
    }

    /// Column-major 4x4 nested array, the shape `bytemuck` uniform structs use.
    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        let m = &self.0;
        [
            [m[0], m[1], m[2], m[3]],
            [m[4], m[5], m[6], m[7]],
            [m[8], m[9], m[10], m[11]],
            [m[12], m[13], m[14], m[15]],
        ]
    }

    /// X scale factor (element 0). For the uniform pan/zoom transforms this is the zoom.
    #[inline]
    pub fn scale_x(&self) -> f32 {
        self.0[0]
    }

    /// XY translation (elements 12, 13).
    #[inline]
    pub fn translation(&self) -> [f32; 2] {
        [self.0[12], self.0[13]]
    }

    #[inline]
    pub fn is_finite(&self) -> bool {
        self.0.iter().all(|v| v.is_finite())
    }

    /// Returns `self * T(v)`.
    #[inline]
    pub fn translate(&self, v: [f32; 3]) -> Mat4 {
        let mut out = *self;
        out.translate_in_place(v);
        out
    }

    /// `self = self * T(v)`.
    pub fn translate_in_place(&mut self, v: [f32; 3]) {
        let m = &mut self.0;
        let [x, y, z] = v;
        for row in 0..4 {
            m[12 + row] += m[row] * x + m[4 + row] * y + m[8 + row] * z;
        }
    }

    /// Returns `self * S(v)`.
    #[inline]
    pub fn scale(&self, v: [f32; 3]) -> Mat4 {
        let mut out = *self;
        out.scale_in_place(v);
        out
    }

    /// `self = self * S(v)`.
    pub fn scale_in_place(&mut self, v: [f32; 3]) {
        let m = &mut self.0;
        for (col, s) in v.into_iter().enumerate() {
            for row in 0..4 {
                m[col * 4 + row] *= s;
            }
        }
    }

    /// Returns `self * rhs`.
    #[inline]
    pub fn multiply(&self, rhs: &Mat4) -> Mat4 {
        let mut out = Mat4::identity();
        self.multiply_into(rhs, &mut out);
        out
    }

    /// Writes `self * rhs` into `out`.
    pub fn multiply_into(&self, rhs: &Mat4, out: &mut Mat4) {
        let a = &self.0;
        let b = &rhs.0;
        let mut r = [0.0f32; 16];
        for col in 0..4 {
            for row in 0..4 {
                r[col * 4 + row] = a[row] * b[col * 4]
                    + a[4 + row] * b[col * 4 + 1]
                    + a[8 + row] * b[col * 4 + 2]
                    + a[12 + row] * b[col * 4 + 3];
            }
        }
        out.0 = r;
    }

    /// Inverse matrix.
    ///
    /// Pan/zoom transforms are compositions of invertible translations and scales,
    /// so this only fails on corrupted input.
    pub fn invert(&self) -> Result<Mat4, InvalidTransform> {
        let a = &self.0;
        let (a00, a01, a02, a03) = (a[0], a[1], a[2], a[3]);
        let (a10, a11, a12, a13) = (a[4], a[5], a[6], a[7]);
        let (a20, a21, a22, a23) = (a[8], a[9], a[10], a[11]);
        let (a30, a31, a32, a33) = (a[12], a[13], a[14], a[15]);

        let b00 = a00 * a11 - a01 * a10;
        let b01 = a00 * a12 - a02 * a10;
        let b02 = a00 * a13 - a03 * a10;
        let b03 = a01 * a12 - a02 * a11;
        let b04 = a01 * a13 - a03 * a11;
        let b05 = a02 * a13 - a03 * a12;
        let b06 = a20 * a31 - a21 * a30;
        let b07 = a20 * a32 - a22 * a30;
        let b08 = a20 * a33 - a23 * a30;
        let b09 = a21 * a32 - a22 * a31;
        let b10 = a21 * a33 - a23 * a31;
        let b11 = a22 * a33 - a23 * a32;

        let det = b00 * b11 - b01 * b10 + b02 * b09 + b03 * b08 - b04 * b07 + b05 * b06;
        if det == 0.0 || !det.is_finite() {
            return Err(InvalidTransform);
        }
        let inv = 1.0 / det;

        Ok(Mat4([
            (a11 * b11 - a12 * b10 + a13 * b09) * inv,
            (a02 * b10 - a01 * b11 - a03 * b09) * inv,
            (a31 * b05 - a32 * b04 + a33 * b03) * inv,
            (a22 * b04 - a21 * b05 - a23 * b03) * inv,
            (a12 * b08 - a10 * b11 - a13 * b07) * inv,
            (a00 * b11 - a02 * b08 + a03 * b07) * inv,
            (a32 * b02 - a30 * b05 - a33 * b01) * inv,
            (a20 * b05 - a22 * b02 + a23 * b01) * inv,
            (a10 * b10 - a11 * b08 + a13 * b06) * inv,
            (a01 * b08 - a00 * b10 - a03 * b06) * inv,
            (a30 * b04 - a31 * b02 + a33 * b00) * inv,
            (a21 * b02 - a20 * b04 - a23 * b00) * inv,
            (a11 * b07 - a10 * b09 - a12 * b06) * inv,
            (a00 * b09 - a01 * b07 + a02 * b06) * inv,
            (a31 * b01 - a30 * b03 - a32 * b00) * inv,
            (a20 * b03 - a21 * b01 + a22 * b00) * inv,
        ]))
    }

    /// Transforms a point, dividing by the homogeneous `w`.
    ///
    /// A zero `w` is treated as 1 (affine matrices never produce one).
    pub fn transform_point(&self, v: [f32; 3]) -> [f32; 3] {
        let m = &self.0;
        let [x, y, z] = v;
        let mut w = m[3] * x + m[7] * y + m[11] * z + m[15];
        if w == 0.0 {
            w = 1.0;
        }
        [
            (m[0] * x + m[4] * y + m[8] * z + m[12]) / w,
            (m[1] * x + m[5] * y + m[9] * z + m[13]) / w,
            (m[2] * x + m[6] * y + m[10] * z + m[14]) / w,
        ]
    }

    /// Orthographic projection.
    ///
    /// X/Y map `[left, right]` / `[bottom, top]` to `[-1, 1]`. Depth maps to `[0, 1]`
    /// (wgpu clip space), so a plane at `z = 0` with `near = 0` stays visible.
    pub fn orthographic(left: f32, right: f32, bottom: f32, top: f32, near: f32, far: f32) -> Mat4 {
        let rw = 1.0 / (right - left);
        let rh = 1.0 / (top - bottom);
        let rd = 1.0 / (near - far);
        Mat4([
            2.0 * rw, 0.0, 0.0, 0.0, //
            0.0, 2.0 * rh, 0.0, 0.0, //
            0.0, 0.0, rd, 0.0, //
            -(left + right) * rw,
            -(top + bottom) * rh,
            near * rd,
            1.0,
        ])
    }
}

impl Mul for Mat4 {
    type Output = Mat4;
    #[inline]
    fn mul(self, rhs: Mat4) -> Mat4 {
        self.multiply(&rhs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() <= 1e-4 * (1.0 + a.abs().max(b.abs()))
    }

    fn approx_mat(a: &Mat4, b: &Mat4) -> bool {
        a.0.iter().zip(b.0.iter()).all(|(x, y)| approx(*x, *y))
    }

    // ── composition ───────────────────────────────────────────────────────

    #[test]
    fn identity_is_neutral_for_multiply() {
        let m = Mat4::identity().translate([3.0, -2.0, 0.0]).scale([2.0, 2.0, 1.0]);
        assert_eq!(m * Mat4::identity(), m);
        assert_eq!(Mat4::identity() * m, m);
    }

    #[test]
    fn translate_then_scale_applies_scale_first_to_points() {
        // T * S: the point is scaled, then moved.
        let m = Mat4::identity().translate([10.0, 20.0, 0.0]).scale([2.0, 3.0, 1.0]);
        let p = m.transform_point([1.0, 1.0, 0.0]);
        assert_eq!(p, [12.0, 23.0, 0.0]);
    }

    #[test]
    fn translate_in_place_matches_multiply() {
        let base = Mat4::identity().scale([4.0, 4.0, 1.0]);
        let mut in_place = base;
        in_place.translate_in_place([1.5, -2.0, 0.0]);
        let t = Mat4::identity().translate([1.5, -2.0, 0.0]);
        assert!(approx_mat(&in_place, &(base * t)));
        assert_eq!(in_place.translation(), [6.0, -8.0]);
    }

    #[test]
    fn multiply_into_reuses_output() {
        let a = Mat4::identity().translate([1.0, 2.0, 3.0]);
        let b = Mat4::identity().scale([2.0, 2.0, 2.0]);
        let mut out = Mat4::identity();
        a.multiply_into(&b, &mut out);
        assert_eq!(out, a.multiply(&b));
    }

    #[test]
    fn pivot_zoom_keeps_pivot_fixed() {
        let pivot = [50.0, 30.0, 0.0];
        let m = Mat4::identity()
            .translate(pivot)
            .scale([2.5, 2.5, 1.0])
            .translate([-pivot[0], -pivot[1], 0.0]);
        let p = m.transform_point(pivot);
        assert!(approx(p[0], 50.0) && approx(p[1], 30.0));
    }

    // ── inverse ───────────────────────────────────────────────────────────

    #[test]
    fn invert_round_trips() {
        let m = Mat4::identity()
            .translate([12.0, -7.0, 0.0])
            .scale([3.0, 3.0, 1.0])
            .translate([-4.0, 9.0, 0.0]);
        let inv = m.invert().unwrap();
        assert!(approx_mat(&(m * inv), &Mat4::identity()));

        let p = m.transform_point([5.0, 6.0, 0.0]);
        let back = inv.transform_point(p);
        assert!(approx(back[0], 5.0) && approx(back[1], 6.0));
    }

    #[test]
    fn invert_singular_is_an_error() {
        let flat = Mat4::identity().scale([1.0, 1.0, 0.0]);
        assert_eq!(flat.invert(), Err(InvalidTransform));
    }

    // ── projection ────────────────────────────────────────────────────────

    #[test]
    fn orthographic_maps_screen_corners_to_ndc() {
        let (w, h) = (800.0, 600.0);
        let proj = Mat4::orthographic(0.0, w, h, 0.0, 0.0, 1.0);

        let tl = proj.transform_point([0.0, 0.0, 0.0]);
        assert!(approx(tl[0], -1.0) && approx(tl[1], 1.0));

        let br = proj.transform_point([w, h, 0.0]);
        assert!(approx(br[0], 1.0) && approx(br[1], -1.0));

        // z = 0 lands inside wgpu's [0, 1] depth range.
        assert!((0.0..=1.0).contains(&tl[2]));
    }

    #[test]
    fn cols_array_2d_is_column_major() {
        let m = Mat4::identity().translate([7.0, 8.0, 9.0]);
        assert_eq!(m.to_cols_array_2d()[3], [7.0, 8.0, 9.0, 1.0]);
    }
}
