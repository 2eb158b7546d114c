//! An implementation of the GGX Distribution

use crate::{utils::FloatExt, Vec3d};
use std::f64::consts;

/// The isotropic GGX (Trowbridge-Reitz) microfacet distribution together with its matching
/// Smith masking-shadowing term. Used for the direct specular term in [`crate::brdf`].
///
/// # Mathematical background
/// * [Microfacet Models for Refraction through Rough Surfaces](https://www.cs.cornell.edu/~srm/publications/EGSR07-btdf.pdf)
/// * [Understanding the Masking-Shadowing Function in Microfacet-Based BRDFs](https://jcgt.org/published/0003/02/03/)
#[derive(Clone, Copy, Debug)]
pub struct GGX {
    /// This roughness value is not perceived linearly. The following formula is a good
    /// approximation for choosing roughness values.
    /// alpha = perceived_roughness^2
    pub alpha: f64,
}

impl GGX {
    /// Creates the distribution from the perceptual roughness stored in roughness maps.
    #[must_use]
    pub fn from_remapped(sqrt_roughness: f64) -> Self {
        Self {
            alpha: sqrt_roughness.sq(),
        }
    }

    /// Distribution of normals / Normal Distribution Function
    /// This is the $D$ term in typical Cook-Torance / GGX model
    #[must_use]
    pub fn ndf(&self, n_dot_h: f64) -> f64 {
        let m2 = self.alpha.sq();
        #[allow(clippy::suboptimal_flops)]
        let denom = consts::PI * (n_dot_h.sq() * (m2 - 1.0) + 1.0).sq();
        m2 / denom
    }

    /// One half of the separable Smith visibility term. The product of two of these already
    /// contains the `1 / (4 n.l n.v)` normalization of the microfacet BRDF.
    #[must_use]
    pub fn visibility_g1(&self, n_dot_x: f64) -> f64 {
        let m2 = self.alpha.sq();
        #[allow(clippy::suboptimal_flops)]
        let root = (m2 + (1.0 - m2) * n_dot_x.sq()).sqrt();
        1.0 / (n_dot_x + root)
    }

    /// Masking-Shadowing divided by `4 n.l n.v`
    #[must_use]
    pub fn visibility(&self, n_dot_l: f64, n_dot_v: f64) -> f64 {
        self.visibility_g1(n_dot_l) * self.visibility_g1(n_dot_v)
    }

    /// The microfacet specular BRDF without the Fresnel term.
    ///
    /// # Arguments
    /// * `n` - surface normal
    /// * `h` - half vector between `v` and `l`
    /// * `v` - direction towards the viewer
    /// * `l` - direction towards the light
    #[must_use]
    pub fn specular(&self, n: Vec3d, h: Vec3d, v: Vec3d, l: Vec3d) -> f64 {
        let n_dot_h = n.dot(h).saturate();
        let n_dot_l = n.dot(l).saturate();
        let n_dot_v = n.dot(v).saturate();
        self.ndf(n_dot_h) * self.visibility(n_dot_l, n_dot_v)
    }
}
