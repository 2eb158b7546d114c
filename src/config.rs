//! Per-frame parameters of the renderer and their validation.
//!
//! All structs are plain data with public fields and a [`Default`] that produces a sensible
//! scene. They are validated once by [`crate::shading::Renderer::new`], the per-point
//! evaluation assumes valid parameters.

use log::warn;
use thiserror::Error;

use crate::{
    lightmap::BakeMode,
    sg::{SgIrradianceMode, SgSpecularMode},
    shadow::ShadowSettings,
    RgbD, Vec2d, Vec3d,
};

/// Everything that can be wrong with the parameters or resources handed to the renderer
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("cascade splits must be strictly increasing, got {0:?}")]
    CascadeSplitsNotIncreasing([f64; 4]),

    #[error("bake mode {mode} needs {required} lightmap layers, but only {available} are available")]
    MissingLightmapLayers {
        mode: BakeMode,
        required: usize,
        available: usize,
    },

    #[error("the sun shadow map needs {required} cascade layers, found {available}")]
    MissingShadowCascades { required: usize, available: usize },

    #[error("bake mode {mode} needs {expected} SG basis directions, found {found}")]
    SgBasisMismatch {
        mode: BakeMode,
        expected: usize,
        found: usize,
    },

    #[error("bake mode {mode} needs the specular lookup textures for indirect specular")]
    MissingSpecularLut { mode: BakeMode },

    #[error("invalid value {value} for `{name}`")]
    InvalidParameter { name: &'static str, value: f64 },
}

/// The directional light
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SunLight {
    /// Normalized direction towards the sun
    pub direction: Vec3d,

    /// Illuminance at normal incidence
    pub illuminance: RgbD,

    /// Half the angle the sun disk subtends, in radians
    pub angular_radius: f64,
}

impl Default for SunLight {
    fn default() -> Self {
        Self {
            direction: Vec3d::new(0.26, -0.16, 0.987).normalize(),
            illuminance: RgbD::new(10.0, 9.5, 8.5),
            angular_radius: 0.004_667,
        }
    }
}

/// The spherical area light
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AreaLight {
    pub position: Vec3d,

    /// Radiance emitted by the surface of the sphere
    pub radiance: RgbD,

    /// Radius of the sphere. Also the near plane of its shadow cube map.
    pub size: f64,

    /// Added to the receiver depth of the cube map comparison
    pub shadow_bias: f64,
}

impl Default for AreaLight {
    fn default() -> Self {
        Self {
            position: Vec3d::new(0.0, 0.0, 5.0),
            radiance: RgbD::splat(10.0),
            size: 0.5,
            shadow_bias: 1e-5,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    /// World space position
    pub position: Vec3d,

    /// Size of the render target in pixels
    pub render_target_size: Vec2d,

    /// Sub pixel offset of the current frame, in pixels
    pub jitter: Vec2d,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position: Vec3d::new(0.0, -10.0, 5.0),
            render_target_size: Vec2d::new(1280.0, 720.0),
            jitter: Vec2d::ZERO,
        }
    }
}

/// Feature toggles and material tweaks
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadingConfig {
    /// Master switch of the sun and the area light
    pub enable_direct_lighting: bool,
    pub enable_sun: bool,

    /// Use the point on the sun disk closest to the reflection vector as light direction
    pub sun_area_light_approximation: bool,
    pub enable_area_light: bool,
    pub enable_area_light_shadows: bool,

    /// Master switch of the baked lighting
    pub enable_indirect_lighting: bool,
    pub enable_indirect_diffuse: bool,
    pub enable_indirect_specular: bool,

    /// Output only the indirect specular term
    pub view_indirect_specular: bool,

    /// When disabled the albedo is white
    pub enable_albedo_maps: bool,
    pub enable_normal_maps: bool,

    /// Blends between the geometric normal (0) and the normal map (1)
    pub normal_map_intensity: f64,
    pub roughness_scale: f64,
    pub metallic_offset: f64,

    /// Tint the sun visibility by cascade
    pub visualize_cascades: bool,

    pub bake_mode: BakeMode,
    pub sg_irradiance_mode: SgIrradianceMode,
    pub sg_specular_mode: SgSpecularMode,
}

impl Default for ShadingConfig {
    fn default() -> Self {
        Self {
            enable_direct_lighting: true,
            enable_sun: true,
            sun_area_light_approximation: true,
            enable_area_light: false,
            enable_area_light_shadows: true,
            enable_indirect_lighting: true,
            enable_indirect_diffuse: true,
            enable_indirect_specular: true,
            view_indirect_specular: false,
            enable_albedo_maps: true,
            enable_normal_maps: true,
            normal_map_intensity: 1.0,
            roughness_scale: 1.0,
            metallic_offset: 0.0,
            visualize_cascades: false,
            bake_mode: BakeMode::default(),
            sg_irradiance_mode: SgIrradianceMode::default(),
            sg_specular_mode: SgSpecularMode::default(),
        }
    }
}

/// The lights, the camera and the shadow setup of a frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Scene {
    pub sun: SunLight,
    pub area_light: AreaLight,
    pub camera: Camera,
    pub shadow: ShadowSettings,
}

fn check(name: &'static str, value: f64, valid: bool) -> Result<(), ConfigError> {
    if valid && value.is_finite() {
        Ok(())
    } else {
        Err(ConfigError::InvalidParameter { name, value })
    }
}

fn check_color(name: &'static str, color: RgbD) -> Result<(), ConfigError> {
    let min = color.min_element();
    check(name, min, min >= 0.0 && color.is_finite())
}

/// Checks the parameters that do not depend on any resource
///
/// # Errors
/// The first problem found, see [`ConfigError`]
pub fn validate(config: &ShadingConfig, scene: &Scene) -> Result<(), ConfigError> {
    let result = validate_parameters(config, scene);
    if let Err(err) = &result {
        warn!("Rejected shading parameters: {err}");
    }
    result
}

fn validate_parameters(config: &ShadingConfig, scene: &Scene) -> Result<(), ConfigError> {
    let Scene {
        sun,
        area_light,
        camera,
        shadow,
    } = scene;
    if !shadow.cascades.is_increasing() {
        return Err(ConfigError::CascadeSplitsNotIncreasing(
            shadow.cascades.splits(),
        ));
    }
    check(
        "shadow.positive_exponent",
        shadow.positive_exponent,
        shadow.positive_exponent > 0.0,
    )?;
    check(
        "shadow.negative_exponent",
        shadow.negative_exponent,
        shadow.negative_exponent > 0.0,
    )?;
    check(
        "shadow.light_bleeding_reduction",
        shadow.light_bleeding_reduction,
        (0.0..1.0).contains(&shadow.light_bleeding_reduction),
    )?;

    let sun_length = sun.direction.length();
    check("sun.direction", sun_length, (sun_length - 1.0).abs() < 1e-6)?;
    check("sun.angular_radius", sun.angular_radius, sun.angular_radius >= 0.0)?;
    check_color("sun.illuminance", sun.illuminance)?;

    check("area_light.size", area_light.size, area_light.size > 0.0)?;
    check_color("area_light.radiance", area_light.radiance)?;
    check("area_light.shadow_bias", area_light.shadow_bias, true)?;

    let min_size = camera.render_target_size.min_element();
    check("camera.render_target_size", min_size, min_size > 0.0)?;

    check(
        "normal_map_intensity",
        config.normal_map_intensity,
        (0.0..=1.0).contains(&config.normal_map_intensity),
    )?;
    check(
        "roughness_scale",
        config.roughness_scale,
        config.roughness_scale >= 0.0,
    )?;
    check("metallic_offset", config.metallic_offset, true)?;
    Ok(())
}
