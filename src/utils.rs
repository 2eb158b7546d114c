use crate::{RgbD, Texel, Vec3d};
use glam::{DMat3, DVec4};

pub trait FloatExt {
    fn sq(self) -> Self;
    fn lerp(self, other: Self, t: Self) -> Self;
    fn saturate(self) -> Self;
    /// linear step, the linear counterpart of `smoothstep`
    fn linstep(self, lower: Self, upper: Self) -> Self;
}

impl FloatExt for f64 {
    fn sq(self) -> Self {
        self * self
    }
    fn lerp(self, other: Self, t: Self) -> Self {
        #[allow(clippy::suboptimal_flops)]
        {
            self * (1.0 - t) + other * t
        }
    }
    fn saturate(self) -> Self {
        self.clamp(0.0, 1.0)
    }
    fn linstep(self, lower: Self, upper: Self) -> Self {
        ((self - lower) / (upper - lower)).saturate()
    }
}

pub trait SafeCast<Target> {
    fn safe_cast(self) -> Target;
}

impl SafeCast<DVec4> for Texel {
    fn safe_cast(self) -> DVec4 {
        DVec4 {
            x: self.x as f64,
            y: self.y as f64,
            z: self.z as f64,
            w: self.w as f64,
        }
    }
}

impl SafeCast<RgbD> for Texel {
    fn safe_cast(self) -> RgbD {
        RgbD {
            x: self.x as f64,
            y: self.y as f64,
            z: self.z as f64,
        }
    }
}

pub trait VecExt {
    type Scalar;
    #[must_use]
    fn luminance(self) -> Self::Scalar;
    #[must_use]
    fn sq(self) -> Self;
    #[must_use]
    fn saturate(self) -> Self;
}

impl VecExt for Vec3d {
    type Scalar = f64;

    fn sq(self) -> Self {
        self * self
    }

    /// Returns the perceived brightness of the color (Rec. 709 weights)
    fn luminance(self) -> Self::Scalar {
        let lfac = Self::new(0.2126, 0.7152, 0.0722);
        self.dot(lfac)
    }

    fn saturate(self) -> Self {
        self.clamp(Self::ZERO, Self::ONE)
    }
}

/// mirrors `vec` around `n`. Both are expected to point away from the surface.
pub fn reflect(n: Vec3d, vec: Vec3d) -> Vec3d {
    n * (n.dot(vec) * 2.0) - vec
}

pub fn pow5(v: f64) -> f64 {
    let v2 = v * v;
    v2 * v2 * v
}

/// Builds a matrix whose rows are the given axes. Multiplying a vector with it expresses the
/// vector in that frame, the transposed matrix brings it back.
#[must_use]
pub fn frame_from_rows(x: Vec3d, y: Vec3d, z: Vec3d) -> DMat3 {
    DMat3::from_cols(x, y, z).transpose()
}

/// Orthonormal frame with `z` as its third axis and `x` pointing towards `towards`
/// (projected into the plane orthogonal to `z`). If `towards` is parallel to `z` any
/// orthonormal frame is returned.
#[must_use]
pub fn frame_towards(z: Vec3d, towards: Vec3d) -> DMat3 {
    let (x, y) = match z.cross(towards).try_normalize() {
        Some(y) => (y.cross(z).normalize(), y),
        None => z.any_orthonormal_pair(),
    };
    frame_from_rows(x, y, z)
}

#[cfg(test)]
mod tests {
    use super::{frame_towards, reflect, FloatExt, VecExt};
    use crate::{test_utils::assert_eq_approx_abs, RgbD, Vec3d};

    #[test]
    fn reflect_mirrors_around_normal() {
        let v = Vec3d::new(1.0, 0.0, 1.0).normalize();
        let r = reflect(Vec3d::Z, v);
        assert_eq_approx_abs!(r, Vec3d::new(-v.x, 0.0, v.z), Vec3d::splat(1e-12));
    }

    #[test]
    fn frame_towards_puts_target_on_positive_x() {
        let n = Vec3d::new(0.2, -0.3, 0.9).normalize();
        let v = Vec3d::new(-0.5, 0.4, 0.6).normalize();
        let frame = frame_towards(n, v);
        let local = frame * v;
        assert!(local.x > 0.0);
        assert_eq_approx_abs!(local.y, 0.0, 1e-12);
        assert_eq_approx_abs!(frame * n, Vec3d::Z, Vec3d::splat(1e-12));
    }

    #[test]
    fn frame_towards_handles_parallel_input() {
        let frame = frame_towards(Vec3d::Z, Vec3d::Z);
        assert!(frame.determinant().is_finite());
        assert_eq_approx_abs!(frame * Vec3d::Z, Vec3d::Z, Vec3d::splat(1e-12));
    }

    #[test]
    fn linstep_saturates() {
        assert_eq_approx_abs!(0.1_f64.linstep(0.2, 1.0), 0.0, 1e-12);
        assert_eq_approx_abs!(0.6_f64.linstep(0.2, 1.0), 0.5, 1e-12);
        assert_eq_approx_abs!(2.0_f64.linstep(0.2, 1.0), 1.0, 1e-12);
    }

    #[test]
    fn luminance_of_white_is_one() {
        assert_eq_approx_abs!(RgbD::ONE.luminance(), 1.0, 1e-12);
    }
}
