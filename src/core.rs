/// used for colors
pub type RgbD = glam::f64::DVec3;
/// used for colors
pub type RgbF = glam::f32::Vec3;

/// used for direction vectors
pub type Vec3d = glam::f64::DVec3;
/// used for direction vectors
pub type Vec2d = glam::f64::DVec2;

/// A single texel as it is stored in a texture. Textures keep [f32] data for a minimal memory
/// footprint, lighting math widens them to [f64].
pub type Texel = glam::f32::Vec4;

/// The largest value that is written to the half float render target.
pub const FP16_MAX: f64 = 65000.0;

/// Everything about a surface point that the lighting code needs. Built once per invocation by
/// [`crate::shading::Renderer`] and never modified afterwards.
#[derive(Clone, Copy, Debug)]
pub struct ShadingPoint {
    /// world space position
    pub position: Vec3d,

    /// world space shading normal (after normal mapping). Unit length.
    pub normal: Vec3d,

    /// the same normal, expressed in the tangent frame. Unit length.
    pub normal_ts: Vec3d,

    /// direction from the surface towards the camera in world space. Unit length.
    pub view: Vec3d,

    /// direction from the surface towards the camera in tangent space. Unit length.
    pub view_ts: Vec3d,

    /// view space depth, used for cascade selection
    pub depth_vs: f64,

    /// screen space derivatives of the shadow projected position (before the cascade
    /// offset and scale are applied)
    pub shadow_pos_dx: Vec3d,

    /// see [`ShadingPoint::shadow_pos_dx`]
    pub shadow_pos_dy: Vec3d,
}

/// Material parameters at a surface point.
#[derive(Clone, Copy, Debug)]
pub struct MaterialSample {
    /// Lambertian albedo. Every component should be in \[0,1\].
    pub diffuse_albedo: RgbD,

    /// Reflectance at normal incidence (`F0`).
    pub specular_albedo: RgbD,

    /// Perceptual roughness as stored in the roughness map. Should be in \[0,1\].
    pub sqrt_roughness: f64,
}

impl MaterialSample {
    /// The GGX `alpha`. Roughness is stored perceptually and squared before use.
    #[must_use]
    pub fn roughness(&self) -> f64 {
        self.sqrt_roughness * self.sqrt_roughness
    }
}

/// The result of shading a single point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingOutput {
    /// HDR radiance, clamped to [`FP16_MAX`]
    pub radiance: RgbD,

    /// Rec. 709 luminance of the irradiance that arrived at the point. Used by temporal
    /// filters and denoisers.
    pub luminance: f64,

    /// Screen space motion in normalized render target units
    pub motion: Vec2d,
}
