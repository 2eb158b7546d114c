//! The H-basis: an orthonormal basis over the upper hemisphere, built from shifted and
//! hemispherically restricted spherical harmonics. Lightmaps encoded this way store irradiance,
//! so evaluating the basis directly gives the irradiance for a tangent space normal.
//!
//! # Mathematical background
//! * Ralf Habel and Michael Wimmer. Efficient Irradiance Normal Mapping. *I3D*, 2010.

use std::f64::consts;

use crate::{RgbD, Vec3d};

/// `1 / sqrt(2 pi)`
const K0: f64 = 0.398_942_280_401_432_7;
/// `sqrt(3 / (2 pi))`
const K1: f64 = 0.690_988_298_942_670_9;
/// `sqrt(15 / (2 pi))`
const K4: f64 = 1.545_097_539_310_992_5;
/// `sqrt(15 / (8 pi))`
const K5: f64 = 0.772_548_769_655_496_3;

#[allow(clippy::suboptimal_flops)]
fn basis(d: Vec3d) -> [f64; 6] {
    [
        K0,
        -K1 * d.y,
        K1 * (2.0 * d.z - 1.0),
        -K1 * d.x,
        K4 * d.x * d.y,
        K5 * (d.x * d.x - d.y * d.y),
    ]
}

fn evaluate<const N: usize>(coefficients: &[RgbD; N], direction: Vec3d) -> RgbD {
    debug_assert!(direction.is_normalized());
    coefficients
        .iter()
        .zip(basis(direction))
        .fold(RgbD::ZERO, |sum, (c, w)| sum + *c * w)
}

/// Four coefficient H-basis (bands 0 and 1)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct H4 {
    pub coefficients: [RgbD; 4],
}

/// Six coefficient H-basis (bands 0, 1 and the two sectoral functions of band 2)
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct H6 {
    pub coefficients: [RgbD; 6],
}

impl H4 {
    #[must_use]
    pub const fn new(coefficients: [RgbD; 4]) -> Self {
        Self { coefficients }
    }

    /// Reconstructs the stored irradiance for the given tangent space normal
    #[must_use]
    pub fn evaluate(&self, normal: Vec3d) -> RgbD {
        evaluate(&self.coefficients, normal)
    }
}

impl H6 {
    #[must_use]
    pub const fn new(coefficients: [RgbD; 6]) -> Self {
        Self { coefficients }
    }

    /// Reconstructs the stored irradiance for the given tangent space normal
    #[must_use]
    pub fn evaluate(&self, normal: Vec3d) -> RgbD {
        evaluate(&self.coefficients, normal)
    }

    /// Projects a function over the upper hemisphere onto the basis. Used to encode
    /// irradiance, e.g. for tests and offline tools.
    #[must_use]
    pub fn project<F: Fn(Vec3d) -> RgbD>(f: F, resolution: usize) -> Self {
        // midpoint rule over (cos theta, phi), every cell has the same solid angle
        let mut coefficients = [RgbD::ZERO; 6];
        let cell = 2.0 * consts::PI / (2 * resolution * resolution) as f64;
        for i in 0..resolution {
            for j in 0..(2 * resolution) {
                let cos_theta = (i as f64 + 0.5) / resolution as f64;
                let phi = (j as f64 + 0.5) / (2 * resolution) as f64 * 2.0 * consts::PI;
                #[allow(clippy::suboptimal_flops)]
                let sin_theta = (1.0 - cos_theta * cos_theta).sqrt();
                let (sin_phi, cos_phi) = phi.sin_cos();
                let d = Vec3d::new(sin_theta * cos_phi, sin_theta * sin_phi, cos_theta);
                let value = f(d);
                for (c, w) in coefficients.iter_mut().zip(basis(d)) {
                    *c += value * w * cell;
                }
            }
        }
        Self { coefficients }
    }
}

impl From<H6> for H4 {
    fn from(h: H6) -> Self {
        let [c0, c1, c2, c3, ..] = h.coefficients;
        Self::new([c0, c1, c2, c3])
    }
}
