//! The per-point shading pipeline: material sampling, normal mapping, direct lighting from the
//! sun and the area light, baked indirect lighting, and the outputs for the temporal filters.

use glam::{DMat3, DVec4};
use log::{debug, trace, warn};
#[cfg(feature = "parallel")]
use rayon::prelude::*;

use crate::{
    brdf,
    config::{self, ConfigError, Scene, ShadingConfig},
    lambert,
    lightmap::{BakedLighting, ReconstructionContext, SgBasis, SpecularLut},
    sg::{self, SphericalGaussian},
    shadow::{AreaLightShadow, SunShadow, CASCADE_COUNT},
    texture::{DepthCubemap, Texture2d, Texture2dArray},
    utils::{self, FloatExt, SafeCast, VecExt},
    MaterialSample, RgbD, ShadingOutput, ShadingPoint, Vec2d, Vec3d, FP16_MAX,
};

/// Specular reflectance of dielectrics
const DIELECTRIC_SPECULAR: f64 = 0.03;

/// The interpolated vertex attributes of a surface point
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SurfaceInput {
    /// world space position
    pub position: Vec3d,

    /// interpolated vertex normal, tangent and bitangent. They do not need to be normalized.
    pub normal: Vec3d,
    pub tangent: Vec3d,
    pub bitangent: Vec3d,

    /// texture coordinate of the material maps
    pub uv: Vec2d,
    pub lightmap_uv: Vec2d,

    /// view space depth
    pub depth_vs: f64,

    /// screen space derivatives of the shadow space position
    pub shadow_pos_dx: Vec3d,
    pub shadow_pos_dy: Vec3d,

    /// clip space position in the current and the previous frame
    pub clip_position: DVec4,
    pub prev_clip_position: DVec4,
}

/// The material textures
#[derive(Clone, Copy)]
pub struct MaterialMaps<'a> {
    /// linear albedo in `.rgb`
    pub albedo: &'a dyn Texture2d,

    /// tangent space normal, `.xy` in \[0,1\]
    pub normal: &'a dyn Texture2d,

    /// sqrt of the GGX alpha in `.x`
    pub roughness: &'a dyn Texture2d,
    pub metallic: &'a dyn Texture2d,
}

/// All textures a frame reads from. They are borrowed for the lifetime of the [`Renderer`].
#[derive(Clone, Copy)]
pub struct Resources<'a> {
    pub material: MaterialMaps<'a>,

    /// EVSM moments, one layer per cascade
    pub sun_shadow_map: &'a dyn Texture2dArray,
    pub area_light_shadow_map: &'a dyn DepthCubemap,
    pub lightmap: &'a dyn Texture2dArray,

    /// Only required for indirect specular of the SH modes
    pub specular_lut: Option<SpecularLut<'a>>,
    pub sg_basis: &'a SgBasis,
}

impl Resources<'_> {
    /// Checks that the resources provide everything the configured modes read
    ///
    /// # Errors
    /// [`ConfigError::MissingShadowCascades`], [`ConfigError::MissingLightmapLayers`],
    /// [`ConfigError::SgBasisMismatch`] or [`ConfigError::MissingSpecularLut`]
    pub fn validate(&self, config: &ShadingConfig) -> Result<(), ConfigError> {
        let result = self.check(config);
        if let Err(err) = &result {
            warn!("Rejected shading resources: {err}");
        }
        result
    }

    fn check(&self, config: &ShadingConfig) -> Result<(), ConfigError> {
        if config.enable_direct_lighting && config.enable_sun {
            let available = self.sun_shadow_map.layer_count();
            if available < CASCADE_COUNT {
                return Err(ConfigError::MissingShadowCascades {
                    required: CASCADE_COUNT,
                    available,
                });
            }
        }
        if !(config.enable_indirect_lighting || config.view_indirect_specular) {
            return Ok(());
        }
        let mode = config.bake_mode;
        let required = mode.slice_count();
        let available = self.lightmap.layer_count();
        if available < required {
            return Err(ConfigError::MissingLightmapLayers {
                mode,
                required,
                available,
            });
        }
        if let Some(expected) = mode.sg_count() {
            let found = self.sg_basis.directions.len();
            if found != expected {
                return Err(ConfigError::SgBasisMismatch {
                    mode,
                    expected,
                    found,
                });
            }
        }
        if mode.uses_specular_lut()
            && config.enable_indirect_lighting
            && config.enable_indirect_specular
            && self.specular_lut.is_none()
        {
            return Err(ConfigError::MissingSpecularLut { mode });
        }
        Ok(())
    }
}

impl MaterialSample {
    /// Samples the material maps with the metallic workflow
    #[must_use]
    pub fn from_maps(maps: &MaterialMaps<'_>, uv: Vec2d, config: &ShadingConfig) -> Self {
        let albedo: RgbD = if config.enable_albedo_maps {
            maps.albedo.sample(uv).safe_cast()
        } else {
            RgbD::ONE
        };
        let metallic = (maps.metallic.sample(uv).x as f64 + config.metallic_offset).saturate();
        let sqrt_roughness =
            (maps.roughness.sample(uv).x as f64 * config.roughness_scale).saturate();

        Self {
            diffuse_albedo: albedo * (1.0 - metallic),
            specular_albedo: RgbD::splat(DIELECTRIC_SPECULAR).lerp(albedo, metallic),
            sqrt_roughness,
        }
    }
}

/// Normalizes the interpolated tangent frame. Each vector is normalized on its own, zero length
/// vectors are replaced.
fn tangent_frame(input: &SurfaceInput) -> (Vec3d, Vec3d, Vec3d) {
    let normal = input.normal.try_normalize().unwrap_or(Vec3d::Z);
    match (input.tangent.try_normalize(), input.bitangent.try_normalize()) {
        (Some(tangent), Some(bitangent)) => (tangent, bitangent, normal),
        _ => {
            let (tangent, bitangent) = normal.any_orthonormal_pair();
            (tangent, bitangent, normal)
        }
    }
}

/// Decodes a two channel normal map texel
fn decode_normal(texel: Vec2d, intensity: f64) -> Vec3d {
    let xy = texel * 2.0 - 1.0;
    let z = (1.0 - xy.length_squared().saturate()).sqrt();
    Vec3d::Z
        .lerp(Vec3d::new(xy.x, xy.y, z), intensity)
        .try_normalize()
        .unwrap_or(Vec3d::Z)
}

fn to_screen(clip: DVec4, render_target_size: Vec2d) -> Option<Vec2d> {
    if clip.w <= 0.0 {
        return None;
    }
    let ndc = clip.truncate().truncate() / clip.w;
    Some((ndc * Vec2d::new(0.5, -0.5) + 0.5) * render_target_size)
}

/// Screen space motion between two frames, in render target units with the jitter of the
/// current frame removed. Zero if a position lies behind the camera.
#[must_use]
pub fn motion_vector(
    clip_position: DVec4,
    prev_clip_position: DVec4,
    render_target_size: Vec2d,
    jitter: Vec2d,
) -> Vec2d {
    match (
        to_screen(clip_position, render_target_size),
        to_screen(prev_clip_position, render_target_size),
    ) {
        (Some(current), Some(previous)) => (current - previous - jitter) / render_target_size,
        _ => Vec2d::ZERO,
    }
}

/// Shades surface points for a single frame
pub struct Renderer<'a> {
    config: ShadingConfig,
    scene: Scene,
    resources: Resources<'a>,
}

impl<'a> Renderer<'a> {
    /// Validates the configuration against the resources
    ///
    /// # Errors
    /// The first problem that was found, see [`ConfigError`]
    pub fn new(
        config: ShadingConfig,
        scene: Scene,
        resources: Resources<'a>,
    ) -> Result<Self, ConfigError> {
        debug!(
            "Creating renderer; bake_mode={}, direct={}, indirect={}, sg_irradiance={:?}, sg_specular={:?}",
            config.bake_mode,
            config.enable_direct_lighting,
            config.enable_indirect_lighting,
            config.sg_irradiance_mode,
            config.sg_specular_mode
        );
        config::validate(&config, &scene)?;
        resources.validate(&config)?;
        Ok(Self {
            config,
            scene,
            resources,
        })
    }

    #[must_use]
    pub const fn config(&self) -> &ShadingConfig {
        &self.config
    }

    #[must_use]
    pub const fn scene(&self) -> &Scene {
        &self.scene
    }

    /// Builds the shading point and the material of a surface
    #[must_use]
    pub fn prepare(&self, input: &SurfaceInput) -> (ShadingPoint, MaterialSample) {
        let (tangent, bitangent, vertex_normal) = tangent_frame(input);
        // rows are the tangent frame, world to tangent space
        let world_to_tangent = utils::frame_from_rows(tangent, bitangent, vertex_normal);
        let tangent_to_world = DMat3::from_cols(tangent, bitangent, vertex_normal);

        let normal_ts = if self.config.enable_normal_maps {
            let texel = self.resources.material.normal.sample(input.uv);
            decode_normal(
                Vec2d::new(texel.x as f64, texel.y as f64),
                self.config.normal_map_intensity,
            )
        } else {
            Vec3d::Z
        };
        let normal = (tangent_to_world * normal_ts)
            .try_normalize()
            .unwrap_or(vertex_normal);

        let view = (self.scene.camera.position - input.position)
            .try_normalize()
            .unwrap_or(normal);
        let view_ts = (world_to_tangent * view).try_normalize().unwrap_or(Vec3d::Z);

        let point = ShadingPoint {
            position: input.position,
            normal,
            normal_ts,
            view,
            view_ts,
            depth_vs: input.depth_vs,
            shadow_pos_dx: input.shadow_pos_dx,
            shadow_pos_dy: input.shadow_pos_dy,
        };
        let material = MaterialSample::from_maps(&self.resources.material, input.uv, &self.config);
        (point, material)
    }

    /// Shades a single surface point
    #[must_use]
    pub fn shade(&self, input: &SurfaceInput) -> ShadingOutput {
        let (point, material) = self.prepare(input);
        let camera = &self.scene.camera;
        ShadingOutput {
            motion: motion_vector(
                input.clip_position,
                input.prev_clip_position,
                camera.render_target_size,
                camera.jitter,
            ),
            ..self.shade_surface(&point, &material, input.lightmap_uv)
        }
    }

    /// Shades a prepared point. The motion vector of the result is zero.
    #[must_use]
    pub fn shade_surface(
        &self,
        point: &ShadingPoint,
        material: &MaterialSample,
        lightmap_uv: Vec2d,
    ) -> ShadingOutput {
        let mut radiance = RgbD::ZERO;
        let mut irradiance = RgbD::ZERO;

        if self.config.enable_direct_lighting {
            if self.config.enable_sun {
                let response = self.sun_light(point, material);
                radiance += response.radiance;
                irradiance += response.irradiance;
            }
            if self.config.enable_area_light {
                let response = self.area_light(point, material);
                radiance += response.radiance;
                irradiance += response.irradiance;
            }
        }

        if self.config.enable_indirect_lighting || self.config.view_indirect_specular {
            let indirect = self.indirect_light(point, material, lightmap_uv);
            if self.config.enable_indirect_lighting {
                if self.config.enable_indirect_diffuse {
                    radiance += lambert::radiance_from_irradiance(
                        material.diffuse_albedo,
                        indirect.irradiance,
                    );
                }
                if self.config.enable_indirect_specular {
                    radiance += indirect.specular;
                }
                irradiance += indirect.irradiance;
            }
            // debug view, replaces everything else
            if self.config.view_indirect_specular {
                radiance = indirect.specular;
            }
        }

        ShadingOutput {
            radiance: radiance.clamp(RgbD::ZERO, RgbD::splat(FP16_MAX)),
            luminance: irradiance.luminance(),
            motion: Vec2d::ZERO,
        }
    }

    /// Shades many points, in parallel if the `parallel` feature is enabled
    #[must_use]
    pub fn shade_all(&self, inputs: &[SurfaceInput]) -> Vec<ShadingOutput> {
        trace!("Shading {} surface points", inputs.len());
        #[cfg(feature = "parallel")]
        let outputs = inputs.par_iter().map(|input| self.shade(input)).collect();
        #[cfg(not(feature = "parallel"))]
        let outputs = inputs.iter().map(|input| self.shade(input)).collect();
        outputs
    }

    fn sun_light(
        &self,
        point: &ShadingPoint,
        material: &MaterialSample,
    ) -> brdf::DirectLightResponse {
        let sun = &self.scene.sun;
        let direction = if self.config.sun_area_light_approximation {
            brdf::sun_disk_direction(sun.direction, sun.angular_radius, point.normal, point.view)
        } else {
            sun.direction
        };
        let shadow = SunShadow::new(
            self.resources.sun_shadow_map,
            &self.scene.shadow,
            self.config.visualize_cascades,
        );
        let visibility = shadow.visibility(point);
        brdf::direct_light(
            point.normal,
            direction,
            sun.illuminance * visibility,
            material,
            point.view,
        )
    }

    fn area_light(
        &self,
        point: &ShadingPoint,
        material: &MaterialSample,
    ) -> brdf::DirectLightResponse {
        let light = &self.scene.area_light;
        let offset = light.position - point.position;
        let distance = offset.length();
        let Some(direction) = offset.try_normalize() else {
            return brdf::DirectLightResponse {
                radiance: RgbD::ZERO,
                irradiance: RgbD::ZERO,
            };
        };

        let lobe =
            SphericalGaussian::from_sphere_light(direction, light.size, light.radiance, distance);
        let irradiance = lobe.irradiance(point.normal, self.config.sg_irradiance_mode);
        let specular = sg::specular(
            &lobe,
            point.normal,
            material.roughness(),
            point.view,
            material.specular_albedo,
            self.config.sg_specular_mode,
        );

        let visibility = if self.config.enable_area_light_shadows {
            AreaLightShadow {
                map: self.resources.area_light_shadow_map,
                light_position: light.position,
                near: light.size,
                bias: light.shadow_bias,
            }
            .visibility(point.position)
        } else {
            1.0
        };

        brdf::DirectLightResponse {
            radiance: (lambert::radiance_from_irradiance(material.diffuse_albedo, irradiance)
                + specular)
                * visibility,
            irradiance: irradiance * visibility,
        }
    }

    fn indirect_light(
        &self,
        point: &ShadingPoint,
        material: &MaterialSample,
        lightmap_uv: Vec2d,
    ) -> crate::lightmap::IndirectLighting {
        let lighting = BakedLighting::fetch(
            self.config.bake_mode,
            self.resources.lightmap,
            lightmap_uv,
            self.resources.sg_basis,
        );
        let ctx = ReconstructionContext {
            specular_lut: self.resources.specular_lut,
            sg_irradiance_mode: self.config.sg_irradiance_mode,
            sg_specular_mode: self.config.sg_specular_mode,
        };
        lighting.reconstruct(point.normal_ts, point.view_ts, material, &ctx)
    }
}
