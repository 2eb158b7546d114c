//! Spherical Gaussians (SG) and anisotropic spherical Gaussians (ASG).
//!
//! An SG is the lobe `amplitude * exp(sharpness * (dot(axis, dir) - 1))`. SGs describe both the
//! lobes of SG lightmaps and small spherical lights, and they have closed form products and
//! integrals, which makes it cheap to combine them with a BRDF.
//!
//! # Mathematical background
//! * Jiaping Wang et al. All-Frequency Rendering of Dynamic, Spatially-Varying Reflectance.
//!     *SIGGRAPH Asia*, 2009.
//! * Kun Xu et al. Anisotropic Spherical Gaussians. *SIGGRAPH Asia*, 2013.
//! * Matt Pettineo. SG Series. <https://therealmjp.github.io/posts/sg-series-part-1-a-brief-and-incomplete-history-of-baked-lighting-representations/>
//! * Stephen Hill. Fitted SG-cosine convolution. <https://therealmjp.github.io/posts/sg-series-part-3-diffuse-lighting-from-an-sg-light-source/>

use std::f64::consts;

use crate::{
    brdf,
    ggx::GGX,
    utils::{self, FloatExt},
    RgbD, Vec3d,
};

/// Lower bound of every SG sharpness. Keeps the warp and integral formulas finite.
pub const MIN_SHARPNESS: f64 = 1e-4;

/// Lower bound of the roughness that is used to build the NDF lobe
pub const MIN_ROUGHNESS: f64 = 1e-4;

/// Number of polar steps of [`SgIrradianceMode::InnerProduct`]
const INNER_PRODUCT_STEPS: usize = 128;

/// How the cosine weighted integral of an SG is approximated
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SgIrradianceMode {
    /// Treats the lobe as a point light in the direction of its axis. Cheapest, least accurate
    /// for wide lobes.
    Punctual,

    /// Polynomial fit of the SG-cosine convolution.
    #[default]
    Fitted,

    /// Integrates the product of the lobe and the clamped cosine: the azimuth in closed form
    /// and the polar angle with exponentially spaced steps. Most expensive, used as reference.
    InnerProduct,
}

/// How the NDF lobe is warped into the domain of the light before the two are convolved
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SgSpecularMode {
    /// Isotropic SG warp
    Standard,

    /// Anisotropic warp, accounts for the stretching of the reflection lobe at grazing view
    /// angles
    #[default]
    Anisotropic,
}

/// `amplitude * exp(sharpness * (dot(axis, dir) - 1))`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SphericalGaussian {
    axis: Vec3d,
    sharpness: f64,
    amplitude: RgbD,
}

/// An anisotropic spherical Gaussian, `amplitude * saturate(dot(z, dir)) *
/// exp(-sharpness_x * dot(x, dir)^2 - sharpness_y * dot(y, dir)^2)`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AnisotropicSphericalGaussian {
    pub basis_x: Vec3d,
    pub basis_y: Vec3d,
    pub basis_z: Vec3d,
    pub sharpness_x: f64,
    pub sharpness_y: f64,
    pub amplitude: RgbD,
}

impl SphericalGaussian {
    /// # Arguments
    /// * `axis` - must be normalized
    /// * `sharpness` - clamped to [`MIN_SHARPNESS`]
    #[must_use]
    pub fn new(axis: Vec3d, sharpness: f64, amplitude: RgbD) -> Self {
        debug_assert!(axis.is_normalized());
        Self {
            axis,
            sharpness: sharpness.max(MIN_SHARPNESS),
            amplitude,
        }
    }

    #[must_use]
    pub const fn axis(&self) -> Vec3d {
        self.axis
    }

    #[must_use]
    pub const fn sharpness(&self) -> f64 {
        self.sharpness
    }

    #[must_use]
    pub const fn amplitude(&self) -> RgbD {
        self.amplitude
    }

    /// Converts a spherical light into a lobe whose integral matches the irradiance the light
    /// delivers at normal incidence. The lobe falls off to 10% at the silhouette of the light.
    ///
    /// # Arguments
    /// * `direction` - normalized direction towards the center of the light
    /// * `radius` - radius of the light source
    /// * `radiance` - radiance emitted by the surface of the light
    /// * `distance` - distance to the center of the light
    #[must_use]
    pub fn from_sphere_light(direction: Vec3d, radius: f64, radiance: RgbD, distance: f64) -> Self {
        let sin_radius = (radius / distance.max(f64::MIN_POSITIVE)).clamp(0.0, 1.0);
        let angular_radius = sin_radius.asin();
        // 1 - cos without cancellation for tiny lights
        let one_minus_cos = 2.0 * (0.5 * angular_radius).sin().sq();
        let sharpness = (consts::LN_10 / one_minus_cos.max(f64::MIN_POSITIVE)).max(MIN_SHARPNESS);
        let solid_angle = 2.0 * consts::PI * one_minus_cos;
        let integral_per_amplitude = 2.0 * consts::PI * -(-2.0 * sharpness).exp_m1() / sharpness;
        Self::new(
            direction,
            sharpness,
            radiance * (solid_angle / integral_per_amplitude),
        )
    }

    /// An SG fit of the GGX normal distribution around `normal`
    ///
    /// # Arguments
    /// * `roughness` - the GGX `alpha`, clamped to [`MIN_ROUGHNESS`]
    #[must_use]
    pub fn ggx_distribution(normal: Vec3d, roughness: f64) -> Self {
        let m2 = roughness.max(MIN_ROUGHNESS).sq();
        Self::new(normal, 2.0 / m2, RgbD::splat(1.0 / (consts::PI * m2)))
    }

    #[must_use]
    pub fn evaluate(&self, direction: Vec3d) -> RgbD {
        self.amplitude * (self.sharpness * (self.axis.dot(direction) - 1.0)).exp()
    }

    /// The product of two SGs is an SG again
    #[must_use]
    pub fn product(&self, other: &Self) -> Self {
        let lm = self.sharpness + other.sharpness;
        let um = (self.axis * self.sharpness + other.axis * other.sharpness) / lm;
        let um_length = um.length();
        let axis = um.try_normalize().unwrap_or(self.axis);
        Self::new(
            axis,
            lm * um_length,
            self.amplitude * other.amplitude * (lm * (um_length - 1.0)).exp(),
        )
    }

    /// Integral over the whole sphere
    #[must_use]
    pub fn integral(&self) -> RgbD {
        let exp_term = -(-2.0 * self.sharpness).exp_m1();
        self.amplitude * (2.0 * consts::PI * exp_term / self.sharpness)
    }

    /// Integral over the whole sphere, assuming the lobe is sharp
    #[must_use]
    pub fn approximate_integral(&self) -> RgbD {
        self.amplitude * (2.0 * consts::PI / self.sharpness)
    }

    /// Integral over the sphere of the product of both lobes
    #[must_use]
    pub fn inner_product(&self, other: &Self) -> RgbD {
        let um_length = (self.axis * self.sharpness + other.axis * other.sharpness).length();
        let expo = (um_length - self.sharpness - other.sharpness).exp()
            * self.amplitude
            * other.amplitude;
        // (1 - exp(-2u)) / u goes to 2 for opposite lobes of equal sharpness
        let other_term = if um_length > 1e-9 {
            -(-2.0 * um_length).exp_m1() / um_length
        } else {
            2.0
        };
        expo * (2.0 * consts::PI * other_term)
    }

    /// Irradiance that the lobe delivers to a surface with the given normal
    #[must_use]
    pub fn irradiance(&self, normal: Vec3d, mode: SgIrradianceMode) -> RgbD {
        debug_assert!(normal.is_normalized());
        match mode {
            SgIrradianceMode::Punctual => self.irradiance_punctual(normal),
            SgIrradianceMode::Fitted => self.irradiance_fitted(normal),
            SgIrradianceMode::InnerProduct => self.irradiance_inner_product(normal),
        }
    }

    fn irradiance_punctual(&self, normal: Vec3d) -> RgbD {
        let cosine = self.axis.dot(normal).saturate();
        self.approximate_integral() * cosine
    }

    fn irradiance_fitted(&self, normal: Vec3d) -> RgbD {
        let mu_dot_n = self.axis.dot(normal);
        let lambda = self.sharpness;

        let c0 = 0.36;
        let c1 = 1.0 / (4.0 * c0);

        let eml = (-lambda).exp();
        let em2l = eml * eml;
        let rl = 1.0 / lambda;

        #[allow(clippy::suboptimal_flops)]
        let scale = 1.0 + 2.0 * em2l - rl;
        #[allow(clippy::suboptimal_flops)]
        let bias = (eml - em2l) * rl - em2l;

        let x = (1.0 - scale).max(0.0).sqrt();
        let x0 = c0 * mu_dot_n;
        let x1 = c1 * x;

        let n = x0 + x1;
        let y = if x1 > 0.0 && x0.abs() <= x1 {
            n * n / x
        } else {
            mu_dot_n.saturate()
        };

        #[allow(clippy::suboptimal_flops)]
        let result = scale * y + bias;
        self.approximate_integral() * result.max(0.0)
    }

    fn irradiance_inner_product(&self, normal: Vec3d) -> RgbD {
        let cos_0 = self.axis.dot(normal).clamp(-1.0, 1.0);
        let sin_0 = (1.0 - cos_0 * cos_0).max(0.0).sqrt();
        let lambda = self.sharpness;

        // int_0^2pi max(0, a + b cos(phi)) dphi
        let azimuthal = |t: f64| {
            let a = t * cos_0;
            let b = (1.0 - t * t).max(0.0).sqrt() * sin_0;
            if a >= b {
                2.0 * consts::PI * a
            } else if a <= -b {
                0.0
            } else {
                let ratio = -a / b;
                let phi = ratio.acos();
                #[allow(clippy::suboptimal_flops)]
                let integral = 2.0 * (a * phi + b * (1.0 - ratio * ratio).sqrt());
                integral
            }
        };

        // s = 1 - t is distributed proportional to exp(-lambda s) on [0, 2]
        let mass = -(-2.0 * lambda).exp_m1();
        let sum: f64 = (0..INNER_PRODUCT_STEPS)
            .map(|i| {
                let u = (i as f64 + 0.5) / INNER_PRODUCT_STEPS as f64;
                let s = -(-u * mass).ln_1p() / lambda;
                azimuthal(1.0 - s)
            })
            .sum();
        self.amplitude * (mass / lambda * sum / INNER_PRODUCT_STEPS as f64)
    }
}

impl AnisotropicSphericalGaussian {
    #[must_use]
    pub fn evaluate(&self, direction: Vec3d) -> RgbD {
        let s_term = self.basis_z.dot(direction).saturate();
        let lambda_term = self.sharpness_x * self.basis_x.dot(direction).sq();
        let mu_term = self.sharpness_y * self.basis_y.dot(direction).sq();
        self.amplitude * s_term * (-lambda_term - mu_term).exp()
    }

    /// Convolution with an isotropic SG, evaluated in the direction of the SG axis
    #[must_use]
    pub fn convolve(&self, sg: &SphericalGaussian) -> RgbD {
        // the ASG paper defines isotropic SGs as exp(2 nu (dot(v, axis) - 1))
        let nu = sg.sharpness() * 0.5;
        let convolved = Self {
            sharpness_x: (nu * self.sharpness_x) / (nu + self.sharpness_x),
            sharpness_y: (nu * self.sharpness_y) / (nu + self.sharpness_y),
            amplitude: RgbD::splat(
                consts::PI / ((nu + self.sharpness_x) * (nu + self.sharpness_y)).sqrt(),
            ),
            ..*self
        };
        convolved.evaluate(sg.axis()) * sg.amplitude() * self.amplitude
    }
}

/// Moves the NDF lobe from the half vector domain into the domain of incident light
fn warp_distribution(ndf: &SphericalGaussian, view: Vec3d) -> SphericalGaussian {
    let axis = utils::reflect(ndf.axis(), view);
    let sharpness = ndf.sharpness() / (4.0 * ndf.axis().dot(view).max(1e-4));
    SphericalGaussian::new(axis, sharpness, ndf.amplitude())
}

/// Like [`warp_distribution`] but stretches the lobe orthogonal to the plane of reflection
fn warp_distribution_anisotropic(
    ndf: &SphericalGaussian,
    view: Vec3d,
) -> AnisotropicSphericalGaussian {
    let basis_z = utils::reflect(ndf.axis(), view);
    let (basis_x, basis_y) = match ndf.axis().cross(basis_z).try_normalize() {
        Some(basis_x) => (basis_x, basis_z.cross(basis_x).normalize()),
        None => basis_z.any_orthonormal_pair(),
    };
    let dot_dir_o = view.dot(ndf.axis()).max(0.1);
    AnisotropicSphericalGaussian {
        basis_x,
        basis_y,
        basis_z,
        sharpness_x: ndf.sharpness() / (8.0 * dot_dir_o * dot_dir_o),
        sharpness_y: ndf.sharpness() / 8.0,
        amplitude: ndf.amplitude(),
    }
}

/// Specular response of a GGX surface to an SG light.
///
/// # Arguments
/// * `light` - the lighting lobe
/// * `normal` - surface normal
/// * `roughness` - the GGX `alpha`
/// * `view` - direction towards the viewer
/// * `specular_albedo` - reflectance at normal incidence
/// * `mode` - how the NDF is warped
#[must_use]
pub fn specular(
    light: &SphericalGaussian,
    normal: Vec3d,
    roughness: f64,
    view: Vec3d,
    specular_albedo: RgbD,
    mode: SgSpecularMode,
) -> RgbD {
    let ndf = SphericalGaussian::ggx_distribution(normal, roughness);
    let (convolved, warp_dir) = match mode {
        SgSpecularMode::Standard => {
            let warped = warp_distribution(&ndf, view);
            (warped.inner_product(light), warped.axis())
        }
        SgSpecularMode::Anisotropic => {
            let warped = warp_distribution_anisotropic(&ndf, view);
            (warped.convolve(light), warped.basis_z)
        }
    };

    // visibility, fresnel and cosine are evaluated at the center of the warped lobe
    let ggx = GGX {
        alpha: roughness.max(MIN_ROUGHNESS),
    };
    let n_dot_l = normal.dot(warp_dir).saturate();
    let n_dot_v = normal.dot(view).saturate();
    let visibility = ggx.visibility(n_dot_l, n_dot_v);
    let fresnel = (warp_dir + view).try_normalize().map_or(RgbD::ONE, |h| {
        brdf::fresnel_schlick(specular_albedo, h, warp_dir)
    });

    (convolved * visibility * fresnel * n_dot_l).max(RgbD::ZERO)
}
