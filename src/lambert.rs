//! Lambertian diffuse reflection, the diffuse part of every material in this crate
use std::f64::consts;

use crate::RgbD;

/// The Lambertian BRDF. It is constant over all directions.
///
/// # Arguments
/// * `albedo` - every component should be in \[0,1\] to preserve physical validity.
#[must_use]
pub fn diffuse(albedo: RgbD) -> RgbD {
    albedo / consts::PI
}

/// Outgoing radiance of a Lambertian surface lit by the given irradiance.
#[must_use]
pub fn radiance_from_irradiance(albedo: RgbD, irradiance: RgbD) -> RgbD {
    diffuse(albedo) * irradiance
}
