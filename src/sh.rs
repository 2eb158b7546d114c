//! Spherical harmonics with 4 (L1) and 9 (L2) coefficients per color channel.
//!
//! Coefficients are stored in the order `Y00, Y1-1, Y10, Y11, Y2-2, Y2-1, Y20, Y21, Y22` of the
//! real, orthonormal basis including the Condon-Shortley phase. The lightmap baker writes the
//! same order and normalization, a mismatch silently corrupts the reconstructed lighting.
//!
//! # Mathematical background
//! * Peter-Pike Sloan. Stupid Spherical Harmonics (SH) Tricks. *GDC*, 2008.
//! * Ravi Ramamoorthi and Pat Hanrahan. An efficient representation for irradiance
//!     environment maps. *SIGGRAPH*, 2001.

use std::{
    f64::consts,
    ops::{Add, AddAssign, Mul},
};

use glam::DMat3;

use crate::{RgbD, Vec3d};

const Y00: f64 = 0.282_094_791_773_878_1;
const Y1: f64 = 0.488_602_511_902_919_9;
/// `Y2-2`, `Y2-1` and `Y21`
const Y2_OFF_DIAGONAL: f64 = 1.092_548_430_592_079;
const Y20: f64 = 0.315_391_565_252_520_05;
const Y22: f64 = 0.546_274_215_296_039_5;

/// Zonal coefficients of the clamped cosine kernel per band
const COSINE_A0: f64 = consts::PI;
const COSINE_A1: f64 = 2.0 * consts::PI / 3.0;
const COSINE_A2: f64 = consts::PI / 4.0;

fn basis4(d: Vec3d) -> [f64; 4] {
    [Y00, -Y1 * d.y, Y1 * d.z, -Y1 * d.x]
}

#[allow(clippy::suboptimal_flops)]
fn basis9(d: Vec3d) -> [f64; 9] {
    [
        Y00,
        -Y1 * d.y,
        Y1 * d.z,
        -Y1 * d.x,
        Y2_OFF_DIAGONAL * d.x * d.y,
        -Y2_OFF_DIAGONAL * d.y * d.z,
        Y20 * (3.0 * d.z * d.z - 1.0),
        -Y2_OFF_DIAGONAL * d.x * d.z,
        Y22 * (d.x * d.x - d.y * d.y),
    ]
}

fn weighted_sum<const N: usize>(coefficients: &[RgbD; N], weights: &[f64; N]) -> RgbD {
    coefficients
        .iter()
        .zip(weights)
        .fold(RgbD::ZERO, |sum, (c, w)| sum + *c * *w)
}

fn dot_coefficients<const N: usize>(a: &[RgbD; N], b: &[RgbD; N]) -> RgbD {
    a.iter().zip(b).fold(RgbD::ZERO, |sum, (a, b)| sum + *a * *b)
}

/// Band 1 of a single channel is a linear function `Y1 * dot(v, d)`
fn rotate_band1(c1: f64, c2: f64, c3: f64, frame: DMat3) -> [f64; 3] {
    let v = frame.transpose() * Vec3d::new(-c3, -c1, c2);
    [-v.y, v.z, -v.x]
}

/// Band 2 of a single channel is a quadratic form `d^T Q d` with a symmetric traceless `Q`
fn rotate_band2(c: [f64; 5], frame: DMat3) -> [f64; 5] {
    let [c4, c5, c6, c7, c8] = c;
    let q_xy = 0.5 * c4 * Y2_OFF_DIAGONAL;
    let q_yz = -0.5 * c5 * Y2_OFF_DIAGONAL;
    let q_xz = -0.5 * c7 * Y2_OFF_DIAGONAL;
    #[allow(clippy::suboptimal_flops)]
    let q_xx = -c6 * Y20 + c8 * Y22;
    #[allow(clippy::suboptimal_flops)]
    let q_yy = -c6 * Y20 - c8 * Y22;
    let q_zz = 2.0 * c6 * Y20;
    let q = DMat3::from_cols(
        Vec3d::new(q_xx, q_xy, q_xz),
        Vec3d::new(q_xy, q_yy, q_yz),
        Vec3d::new(q_xz, q_yz, q_zz),
    );

    let r = frame.transpose() * q * frame;
    [
        2.0 * r.x_axis.y / Y2_OFF_DIAGONAL,
        -2.0 * r.y_axis.z / Y2_OFF_DIAGONAL,
        r.z_axis.z / (2.0 * Y20),
        -2.0 * r.x_axis.z / Y2_OFF_DIAGONAL,
        (r.x_axis.x - r.y_axis.y) / (2.0 * Y22),
    ]
}

/// L1 spherical harmonics, one [`RgbD`] per basis function
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sh4 {
    pub coefficients: [RgbD; 4],
}

/// L2 spherical harmonics, one [`RgbD`] per basis function
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Sh9 {
    pub coefficients: [RgbD; 9],
}

impl Sh4 {
    pub const ZERO: Self = Self {
        coefficients: [RgbD::ZERO; 4],
    };

    #[must_use]
    pub const fn new(coefficients: [RgbD; 4]) -> Self {
        Self { coefficients }
    }

    /// Projects radiance arriving from a single direction onto the basis
    #[must_use]
    pub fn project_radiance(direction: Vec3d, radiance: RgbD) -> Self {
        Self {
            coefficients: basis4(direction).map(|w| radiance * w),
        }
    }

    /// Reconstructs the band limited signal in the given direction
    #[must_use]
    pub fn evaluate(&self, direction: Vec3d) -> RgbD {
        debug_assert!(direction.is_normalized());
        weighted_sum(&self.coefficients, &basis4(direction))
    }

    /// Treats the coefficients as radiance and returns the irradiance that arrives at a
    /// surface with the given normal
    #[must_use]
    pub fn irradiance(&self, normal: Vec3d) -> RgbD {
        debug_assert!(normal.is_normalized());
        let [b0, b1, b2, b3] = basis4(normal);
        let kernel = [
            b0 * COSINE_A0,
            b1 * COSINE_A1,
            b2 * COSINE_A1,
            b3 * COSINE_A1,
        ];
        weighted_sum(&self.coefficients, &kernel)
    }

    /// Per channel integral over the sphere of the product of both signals
    #[must_use]
    pub fn dot(&self, other: &Self) -> RgbD {
        dot_coefficients(&self.coefficients, &other.coefficients)
    }

    /// see [`Sh9::rotate`]
    #[must_use]
    pub fn rotate(&self, frame: DMat3) -> Self {
        let mut result = *self;
        for channel in 0..3 {
            let c = &self.coefficients;
            let band1 = rotate_band1(c[1][channel], c[2][channel], c[3][channel], frame);
            for (i, value) in band1.into_iter().enumerate() {
                result.coefficients[i + 1][channel] = value;
            }
        }
        result
    }
}

impl Sh9 {
    pub const ZERO: Self = Self {
        coefficients: [RgbD::ZERO; 9],
    };

    /// Coefficient indices of every band, starting with band 0
    pub const BANDS: [std::ops::Range<usize>; 3] = [0..1, 1..4, 4..9];

    #[must_use]
    pub const fn new(coefficients: [RgbD; 9]) -> Self {
        Self { coefficients }
    }

    /// Projects radiance arriving from a single direction onto the basis
    #[must_use]
    pub fn project_radiance(direction: Vec3d, radiance: RgbD) -> Self {
        Self {
            coefficients: basis9(direction).map(|w| radiance * w),
        }
    }

    /// Reconstructs the band limited signal in the given direction
    #[must_use]
    pub fn evaluate(&self, direction: Vec3d) -> RgbD {
        debug_assert!(direction.is_normalized());
        weighted_sum(&self.coefficients, &basis9(direction))
    }

    /// Treats the coefficients as radiance and returns the irradiance that arrives at a
    /// surface with the given normal
    #[must_use]
    pub fn irradiance(&self, normal: Vec3d) -> RgbD {
        debug_assert!(normal.is_normalized());
        let mut kernel = basis9(normal);
        kernel[0] *= COSINE_A0;
        kernel[1..4].iter_mut().for_each(|w| *w *= COSINE_A1);
        kernel[4..9].iter_mut().for_each(|w| *w *= COSINE_A2);
        weighted_sum(&self.coefficients, &kernel)
    }

    /// Per channel integral over the sphere of the product of both signals. Since the basis is
    /// orthonormal this is a plain dot product of the coefficients.
    #[must_use]
    pub fn dot(&self, other: &Self) -> RgbD {
        dot_coefficients(&self.coefficients, &other.coefficients)
    }

    /// Rotates a signal that is defined in a local frame into the space the frame is expressed
    /// in. The rows of `frame` are the local x, y and z axes. Afterwards
    /// `rotated.evaluate(d) == self.evaluate(frame * d)`.
    ///
    /// Every band is transformed by an orthogonal matrix, therefore the energy per band is
    /// preserved.
    #[must_use]
    pub fn rotate(&self, frame: DMat3) -> Self {
        let mut result = *self;
        for channel in 0..3 {
            let c = &self.coefficients;
            let band1 = rotate_band1(c[1][channel], c[2][channel], c[3][channel], frame);
            let band2 = rotate_band2(
                [
                    c[4][channel],
                    c[5][channel],
                    c[6][channel],
                    c[7][channel],
                    c[8][channel],
                ],
                frame,
            );
            for (i, value) in band1.into_iter().chain(band2).enumerate() {
                result.coefficients[i + 1][channel] = value;
            }
        }
        result
    }

    /// Per channel sum of the squared coefficients of a band
    #[must_use]
    pub fn band_energy(&self, band: usize) -> RgbD {
        self.coefficients[Self::BANDS[band].clone()]
            .iter()
            .fold(RgbD::ZERO, |sum, c| sum + *c * *c)
    }

    /// Drops band 2
    #[must_use]
    pub fn truncate(&self) -> Sh4 {
        Sh4::from(*self)
    }
}

impl From<Sh9> for Sh4 {
    fn from(sh: Sh9) -> Self {
        let [c0, c1, c2, c3, ..] = sh.coefficients;
        Self::new([c0, c1, c2, c3])
    }
}

impl From<Sh4> for Sh9 {
    fn from(sh: Sh4) -> Self {
        let mut coefficients = [RgbD::ZERO; 9];
        coefficients[..4].copy_from_slice(&sh.coefficients);
        Self::new(coefficients)
    }
}

macro_rules! impl_sh_ops {
    ($sh:ty) => {
        impl Add for $sh {
            type Output = Self;
            fn add(mut self, rhs: Self) -> Self {
                self += rhs;
                self
            }
        }

        impl AddAssign for $sh {
            fn add_assign(&mut self, rhs: Self) {
                for (lhs, rhs) in self.coefficients.iter_mut().zip(rhs.coefficients) {
                    *lhs += rhs;
                }
            }
        }

        impl Mul<f64> for $sh {
            type Output = Self;
            fn mul(self, rhs: f64) -> Self {
                Self {
                    coefficients: self.coefficients.map(|c| c * rhs),
                }
            }
        }
    };
}

impl_sh_ops!(Sh4);
impl_sh_ops!(Sh9);

#[cfg(test)]
mod tests {
    use std::f64::consts;

    use glam::DMat3;

    use super::{Sh4, Sh9, Y00};
    use crate::{
        test_utils::{self, assert_eq_approx_abs},
        RgbD, Vec3d,
    };

    fn random_sh9(rd: &mut fastrand::Rng) -> Sh9 {
        let mut coefficients = [RgbD::ZERO; 9];
        for c in &mut coefficients {
            *c = RgbD::new(rd.f64(), rd.f64(), rd.f64()) * 2.0 - 1.0;
        }
        Sh9::new(coefficients)
    }

    #[test]
    fn basis_is_orthonormal() {
        for i in 0..9 {
            for j in 0..9 {
                let integral = test_utils::integrate_sphere(
                    |d| {
                        let b = super::basis9(d);
                        b[i] * b[j]
                    },
                    300,
                );
                let expected = if i == j { 1.0 } else { 0.0 };
                assert_eq_approx_abs!(integral, expected, 1e-3, "i: {i}, j: {j}");
            }
        }
    }

    #[test]
    fn irradiance_of_a_directional_light() {
        // the L2 approximation of the clamped cosine is within 0.1 of the real thing
        let light = Vec3d::new(0.3, -0.2, 0.9).normalize();
        let sh = Sh9::project_radiance(light, RgbD::ONE);
        let mut rd = fastrand::Rng::with_seed(5);
        for _ in 0..1000 {
            let n = test_utils::spherical_sample(&mut rd);
            let expected = n.dot(light).max(0.0);
            assert_eq_approx_abs!(sh.irradiance(n), RgbD::splat(expected), RgbD::splat(0.1));
        }
    }

    #[test]
    fn irradiance_peak_of_a_directional_light() {
        let sh = Sh9::project_radiance(Vec3d::Z, RgbD::ONE);
        assert_eq_approx_abs!(sh.irradiance(Vec3d::Z), RgbD::splat(1.0625), RgbD::splat(1e-9));
        let sh = Sh4::project_radiance(Vec3d::Z, RgbD::ONE);
        assert_eq_approx_abs!(sh.irradiance(Vec3d::Z), RgbD::splat(0.75), RgbD::splat(1e-9));
    }

    #[test]
    fn constant_signal_survives_band_reduction() {
        let constant = RgbD::new(0.5, 1.0, 2.0);
        let mut sh9 = Sh9::ZERO;
        sh9.coefficients[0] = constant;
        let sh4 = Sh4::from(sh9);
        let mut rd = fastrand::Rng::with_seed(9);
        for _ in 0..100 {
            let n = test_utils::spherical_sample(&mut rd);
            assert_eq_approx_abs!(sh4.irradiance(n), sh9.irradiance(n), RgbD::splat(1e-12));
            assert_eq_approx_abs!(
                sh4.irradiance(n),
                constant * Y00 * consts::PI,
                RgbD::splat(1e-12)
            );
            assert_eq_approx_abs!(sh4.evaluate(n), constant * Y00, RgbD::splat(1e-12));
        }
    }

    #[test]
    fn rotation_preserves_band_energy() {
        let mut rd = fastrand::Rng::with_seed(1);
        let sh = random_sh9(&mut rd);
        let frames = [
            DMat3::IDENTITY,
            test_utils::random_frame(&mut rd),
            test_utils::random_frame(&mut rd),
        ];
        for frame in frames {
            let rotated = sh.rotate(frame);
            for band in 0..3 {
                assert_eq_approx_abs!(
                    rotated.band_energy(band),
                    sh.band_energy(band),
                    RgbD::splat(1e-9)
                );
            }
        }
    }

    #[test]
    fn identity_rotation_is_identity() {
        let mut rd = fastrand::Rng::with_seed(2);
        let sh = random_sh9(&mut rd);
        let rotated = sh.rotate(DMat3::IDENTITY);
        for (a, b) in rotated.coefficients.iter().zip(sh.coefficients) {
            assert_eq_approx_abs!(*a, b, RgbD::splat(1e-12));
        }
    }

    #[test]
    fn rotation_moves_the_signal() {
        let mut rd = fastrand::Rng::with_seed(4);
        for _ in 0..20 {
            let sh = random_sh9(&mut rd);
            let frame = test_utils::random_frame(&mut rd);
            let rotated = sh.rotate(frame);
            let sh4 = sh.truncate();
            let rotated4 = sh4.rotate(frame);
            for _ in 0..20 {
                let d = test_utils::spherical_sample(&mut rd);
                assert_eq_approx_abs!(
                    rotated.evaluate(d),
                    sh.evaluate(frame * d),
                    RgbD::splat(1e-9)
                );
                assert_eq_approx_abs!(
                    rotated4.evaluate(d),
                    sh4.evaluate(frame * d),
                    RgbD::splat(1e-9)
                );
            }
        }
    }

    #[test]
    fn dot_product_is_the_product_integral() {
        let mut rd = fastrand::Rng::with_seed(6);
        let a = random_sh9(&mut rd);
        let b = random_sh9(&mut rd);
        let integral = test_utils::integrate_sphere(|d| a.evaluate(d).x * b.evaluate(d).x, 300);
        assert_eq_approx_abs!(a.dot(&b).x, integral, 1e-3);
    }

    #[test]
    fn zero_extension_round_trips() {
        let mut rd = fastrand::Rng::with_seed(8);
        let sh4 = random_sh9(&mut rd).truncate();
        assert_eq!(Sh9::from(sh4).truncate(), sh4);
        assert_eq!(Sh9::from(sh4).band_energy(2), RgbD::ZERO);
    }
}
