//! Direct lighting with the analytic BRDFs: Lambertian diffuse plus GGX specular with Schlick
//! Fresnel.

use crate::{
    ggx::GGX,
    lambert,
    utils::{self, FloatExt},
    MaterialSample, RgbD, Vec3d,
};

/// Contains the Data that is returned by [`direct_light`]
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DirectLightResponse {
    /// Outgoing radiance towards the viewer
    pub radiance: RgbD,

    /// Irradiance that arrived at the surface. This is tracked independently of the
    /// specular gating, since it feeds the luminance output.
    pub irradiance: RgbD,
}

/// Schlick's approximation of the Fresnel term
///
/// # Arguments
/// * `specular_albedo` - reflectance at normal incidence
/// * `h` - the half vector / micro surface normal
/// * `l` - direction towards the light
#[must_use]
pub fn fresnel_schlick(specular_albedo: RgbD, h: Vec3d, l: Vec3d) -> RgbD {
    let pow_term = utils::pow5(1.0 - l.dot(h).saturate());
    specular_albedo + (RgbD::ONE - specular_albedo) * pow_term
}

/// Radiance reflected towards `v` from a light arriving from `l` with the given peak
/// irradiance (the irradiance at normal incidence).
///
/// Specular is only evaluated for lights in front of the surface, while the irradiance is
/// always accumulated with `max(0, n.l)`.
#[must_use]
pub fn direct_light(
    n: Vec3d,
    l: Vec3d,
    light_color: RgbD,
    material: &MaterialSample,
    v: Vec3d,
) -> DirectLightResponse {
    let mut lighting = lambert::diffuse(material.diffuse_albedo);
    let n_dot_l = n.dot(l).saturate();
    if n_dot_l > 0.0 {
        // v == -l has no half vector, it can only happen at grazing angles where n.l is ~0
        if let Some(h) = (v + l).try_normalize() {
            let fresnel = fresnel_schlick(material.specular_albedo, h, l);
            let specular = GGX::from_remapped(material.sqrt_roughness).specular(n, h, v, l);
            lighting += fresnel * specular;
        }
    }

    DirectLightResponse {
        radiance: lighting * n_dot_l * light_color,
        irradiance: light_color * n_dot_l,
    }
}

/// Picks the point on the sun disk that is closest to the mirror direction. Using it as light
/// direction gives the specular highlight the size of the sun instead of a single point.
///
/// # Arguments
/// * `sun_direction` - direction towards the center of the sun
/// * `angular_radius` - half the angle that the sun subtends, in radians
/// * `n` - surface normal
/// * `v` - direction towards the viewer
#[must_use]
pub fn sun_disk_direction(sun_direction: Vec3d, angular_radius: f64, n: Vec3d, v: Vec3d) -> Vec3d {
    let r = utils::reflect(n, v);
    let (sin_radius, cos_radius) = angular_radius.sin_cos();
    let d_dot_r = sun_direction.dot(r);
    if d_dot_r >= cos_radius {
        return r;
    }
    let Some(s) = (r - sun_direction * d_dot_r).try_normalize() else {
        return sun_direction;
    };
    #[allow(clippy::suboptimal_flops)]
    let closest = sun_direction * cos_radius + s * sin_radius;
    closest.normalize()
}
