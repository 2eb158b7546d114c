//! Reconstruction of baked indirect lighting.
//!
//! A lightmap stores one texture layer per coefficient of the encoding selected by [`BakeMode`].
//! [`BakedLighting::fetch`] reads exactly the layers of the active mode, and
//! [`BakedLighting::reconstruct`] turns them into irradiance and, for the encodings that can
//! represent it, specular radiance. Everything happens in tangent space.

use std::{f64::consts, fmt};

use crate::{
    hbasis::{H4, H6},
    sg::{self, SgIrradianceMode, SgSpecularMode, SphericalGaussian},
    sh::{Sh4, Sh9},
    texture::{Texture2dArray, Texture3d},
    utils::{self, FloatExt, SafeCast},
    MaterialSample, RgbD, Vec2d, Vec3d,
};

/// The encoding of the baked lighting. Set once per frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum BakeMode {
    /// A single, pre-integrated irradiance value
    Irradiance,
    /// Irradiance along the three directions of the Half-Life 2 basis
    Hl2,
    Sh4,
    #[default]
    Sh9,
    H4,
    H6,
    Sg5,
    Sg6,
    Sg9,
    Sg12,
}

impl BakeMode {
    pub const ALL: [Self; 10] = [
        Self::Irradiance,
        Self::Hl2,
        Self::Sh4,
        Self::Sh9,
        Self::H4,
        Self::H6,
        Self::Sg5,
        Self::Sg6,
        Self::Sg9,
        Self::Sg12,
    ];

    /// Number of lightmap layers the encoding occupies
    #[must_use]
    pub const fn slice_count(self) -> usize {
        match self {
            Self::Irradiance => 1,
            Self::Hl2 => 3,
            Self::Sh4 | Self::H4 => 4,
            Self::Sh9 | Self::Sg9 => 9,
            Self::H6 | Self::Sg6 => 6,
            Self::Sg5 => 5,
            Self::Sg12 => 12,
        }
    }

    /// Number of lobes of the spherical Gaussian encodings
    #[must_use]
    pub const fn sg_count(self) -> Option<usize> {
        match self {
            Self::Sg5 | Self::Sg6 | Self::Sg9 | Self::Sg12 => Some(self.slice_count()),
            _ => None,
        }
    }

    /// Whether indirect specular needs the [`SpecularLut`]
    #[must_use]
    pub const fn uses_specular_lut(self) -> bool {
        matches!(self, Self::Sh4 | Self::Sh9)
    }
}

impl fmt::Display for BakeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Irradiance => "irradiance",
            Self::Hl2 => "HL2",
            Self::Sh4 => "SH4",
            Self::Sh9 => "SH9",
            Self::H4 => "H4",
            Self::H6 => "H6",
            Self::Sg5 => "SG5",
            Self::Sg6 => "SG6",
            Self::Sg9 => "SG9",
            Self::Sg12 => "SG12",
        };
        f.write_str(name)
    }
}

/// Lobe directions and sharpness of the spherical Gaussian encodings. Has to match the baker.
#[derive(Clone, Debug, PartialEq)]
pub struct SgBasis {
    /// Tangent space lobe axes, one per lightmap layer
    pub directions: Vec<Vec3d>,
    pub sharpness: f64,
}

impl SgBasis {
    /// Lobes spread evenly over the upper hemisphere along a spherical Fibonacci spiral.
    /// The sharpness lets neighbouring lobes overlap at 65% of their peak.
    #[must_use]
    pub fn hemisphere(count: usize) -> Self {
        let golden_angle = consts::PI * (3.0 - 5.0_f64.sqrt());
        let directions: Vec<Vec3d> = (0..count)
            .map(|i| {
                let z = 1.0 - (i as f64 + 0.5) / count as f64;
                let r = (1.0 - z * z).max(0.0).sqrt();
                let (sin_phi, cos_phi) = (golden_angle * i as f64).sin_cos();
                Vec3d::new(r * cos_phi, r * sin_phi, z)
            })
            .collect();

        let nearest: Vec<f64> = directions
            .iter()
            .enumerate()
            .map(|(i, a)| {
                directions
                    .iter()
                    .enumerate()
                    .filter(|(j, _)| *j != i)
                    .map(|(_, b)| a.dot(*b))
                    .fold(-1.0, f64::max)
            })
            .collect();
        let mean_cos = if nearest.is_empty() {
            0.0
        } else {
            nearest.iter().sum::<f64>() / nearest.len() as f64
        };
        let sharpness = if mean_cos < 1.0 {
            0.65_f64.ln() / (mean_cos - 1.0)
        } else {
            sg::MIN_SHARPNESS
        };

        Self {
            directions,
            sharpness,
        }
    }
}

/// Precomputed SH projections of the GGX specular BRDF in a canonical frame where the normal
/// is `+z` and the view direction lies in the xz plane. Only the coefficients that are
/// non-zero for such a BRDF are stored.
///
/// Both textures are indexed by `(n.v, sqrt_roughness, specular albedo)`.
#[derive(Clone, Copy)]
pub struct SpecularLut<'a> {
    /// SH coefficients 0, 2, 3 and 6
    pub coefficients_a: &'a dyn Texture3d,
    /// SH coefficients 7 and 8 in the first two channels
    pub coefficients_b: &'a dyn Texture3d,
}

impl SpecularLut<'_> {
    /// The BRDF projected onto SH9 in the canonical frame. Each color channel is looked up
    /// with the specular albedo of that channel.
    #[must_use]
    pub fn brdf(&self, n_dot_v: f64, sqrt_roughness: f64, specular_albedo: RgbD) -> Sh9 {
        let mut coefficients = [RgbD::ZERO; 9];
        for channel in 0..3 {
            let uvw = Vec3d::new(n_dot_v.saturate(), sqrt_roughness, specular_albedo[channel]);
            let a: glam::DVec4 = self.coefficients_a.sample(uvw).safe_cast();
            let b: glam::DVec4 = self.coefficients_b.sample(uvw).safe_cast();
            for (index, value) in [(0, a.x), (2, a.y), (3, a.z), (6, a.w), (7, b.x), (8, b.y)] {
                coefficients[index][channel] = value;
            }
        }
        Sh9::new(coefficients)
    }
}

/// Settings and resources that the reconstruction needs besides the lightmap itself
#[derive(Clone, Copy)]
pub struct ReconstructionContext<'a> {
    /// Required by [`BakeMode::Sh4`] and [`BakeMode::Sh9`] for specular
    pub specular_lut: Option<SpecularLut<'a>>,
    pub sg_irradiance_mode: SgIrradianceMode,
    pub sg_specular_mode: SgSpecularMode,
}

/// Indirect lighting at a surface point
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct IndirectLighting {
    pub irradiance: RgbD,

    /// Outgoing specular radiance towards the viewer, zero for encodings without directional
    /// information
    pub specular: RgbD,
}

/// The coefficients of one lightmap texel, tagged with their encoding
#[derive(Clone, Debug, PartialEq)]
pub enum BakedLighting {
    Irradiance(RgbD),
    Hl2([RgbD; 3]),
    Sh4(Sh4),
    Sh9(Sh9),
    H4(H4),
    H6(H6),
    Sg5([SphericalGaussian; 5]),
    Sg6([SphericalGaussian; 6]),
    Sg9([SphericalGaussian; 9]),
    Sg12([SphericalGaussian; 12]),
}

fn fetch_slices<const N: usize>(lightmap: &dyn Texture2dArray, uv: Vec2d) -> [RgbD; N] {
    std::array::from_fn(|layer| lightmap.sample(uv, layer).safe_cast())
}

fn fetch_lobes<const N: usize>(
    lightmap: &dyn Texture2dArray,
    uv: Vec2d,
    basis: &SgBasis,
) -> [SphericalGaussian; N] {
    let amplitudes = fetch_slices::<N>(lightmap, uv);
    std::array::from_fn(|i| {
        SphericalGaussian::new(basis.directions[i], basis.sharpness, amplitudes[i])
    })
}

/// Directions of the Half-Life 2 basis in tangent space
const HL2_BASIS: [Vec3d; 3] = [
    Vec3d::new(-0.408_248_290_463_863, -0.707_106_781_186_547_5, 0.577_350_269_189_625_8),
    Vec3d::new(-0.408_248_290_463_863, 0.707_106_781_186_547_5, 0.577_350_269_189_625_8),
    Vec3d::new(0.816_496_580_927_726, 0.0, 0.577_350_269_189_625_8),
];

fn hl2_irradiance(slices: &[RgbD; 3], normal: Vec3d) -> RgbD {
    let weights = HL2_BASIS.map(|b| b.dot(normal).saturate());
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return RgbD::ZERO;
    }
    slices
        .iter()
        .zip(weights)
        .fold(RgbD::ZERO, |sum, (s, w)| sum + *s * w)
        / total
}

impl BakedLighting {
    /// Reads the layers of `mode` from the lightmap. Exactly [`BakeMode::slice_count`] layers
    /// are sampled, starting at layer 0.
    ///
    /// # Arguments
    /// * `sg_basis` - lobe directions, needs at least as many entries as the SG modes have
    ///     lobes. Only read for the SG modes.
    #[must_use]
    pub fn fetch(
        mode: BakeMode,
        lightmap: &dyn Texture2dArray,
        uv: Vec2d,
        sg_basis: &SgBasis,
    ) -> Self {
        match mode {
            BakeMode::Irradiance => {
                let [irradiance] = fetch_slices::<1>(lightmap, uv);
                Self::Irradiance(irradiance)
            }
            BakeMode::Hl2 => Self::Hl2(fetch_slices(lightmap, uv)),
            BakeMode::Sh4 => Self::Sh4(Sh4::new(fetch_slices(lightmap, uv))),
            BakeMode::Sh9 => Self::Sh9(Sh9::new(fetch_slices(lightmap, uv))),
            BakeMode::H4 => Self::H4(H4::new(fetch_slices(lightmap, uv))),
            BakeMode::H6 => Self::H6(H6::new(fetch_slices(lightmap, uv))),
            BakeMode::Sg5 => Self::Sg5(fetch_lobes(lightmap, uv, sg_basis)),
            BakeMode::Sg6 => Self::Sg6(fetch_lobes(lightmap, uv, sg_basis)),
            BakeMode::Sg9 => Self::Sg9(fetch_lobes(lightmap, uv, sg_basis)),
            BakeMode::Sg12 => Self::Sg12(fetch_lobes(lightmap, uv, sg_basis)),
        }
    }

    #[must_use]
    pub const fn mode(&self) -> BakeMode {
        match self {
            Self::Irradiance(_) => BakeMode::Irradiance,
            Self::Hl2(_) => BakeMode::Hl2,
            Self::Sh4(_) => BakeMode::Sh4,
            Self::Sh9(_) => BakeMode::Sh9,
            Self::H4(_) => BakeMode::H4,
            Self::H6(_) => BakeMode::H6,
            Self::Sg5(_) => BakeMode::Sg5,
            Self::Sg6(_) => BakeMode::Sg6,
            Self::Sg9(_) => BakeMode::Sg9,
            Self::Sg12(_) => BakeMode::Sg12,
        }
    }

    /// Indirect irradiance and specular radiance for a tangent space normal and view
    /// direction
    #[must_use]
    pub fn reconstruct(
        &self,
        normal_ts: Vec3d,
        view_ts: Vec3d,
        material: &MaterialSample,
        ctx: &ReconstructionContext<'_>,
    ) -> IndirectLighting {
        match self {
            Self::Irradiance(irradiance) => IndirectLighting {
                irradiance: *irradiance,
                specular: RgbD::ZERO,
            },
            Self::Hl2(slices) => IndirectLighting {
                irradiance: hl2_irradiance(slices, normal_ts),
                specular: RgbD::ZERO,
            },
            Self::Sh4(sh) => IndirectLighting {
                irradiance: sh.irradiance(normal_ts),
                specular: ctx.specular_lut.map_or(RgbD::ZERO, |lut| {
                    let brdf = rotated_brdf(&lut, normal_ts, view_ts, material);
                    brdf.truncate().dot(sh)
                }),
            },
            Self::Sh9(sh) => IndirectLighting {
                irradiance: sh.irradiance(normal_ts),
                specular: ctx.specular_lut.map_or(RgbD::ZERO, |lut| {
                    rotated_brdf(&lut, normal_ts, view_ts, material).dot(sh)
                }),
            },
            Self::H4(h) => IndirectLighting {
                irradiance: h.evaluate(normal_ts),
                specular: RgbD::ZERO,
            },
            Self::H6(h) => IndirectLighting {
                irradiance: h.evaluate(normal_ts),
                specular: RgbD::ZERO,
            },
            Self::Sg5(lobes) => sg_lighting(lobes, normal_ts, view_ts, material, ctx),
            Self::Sg6(lobes) => sg_lighting(lobes, normal_ts, view_ts, material, ctx),
            Self::Sg9(lobes) => sg_lighting(lobes, normal_ts, view_ts, material, ctx),
            Self::Sg12(lobes) => sg_lighting(lobes, normal_ts, view_ts, material, ctx),
        }
    }
}

/// The specular BRDF as SH9, rotated from its canonical frame into tangent space
fn rotated_brdf(
    lut: &SpecularLut<'_>,
    normal: Vec3d,
    view: Vec3d,
    material: &MaterialSample,
) -> Sh9 {
    let frame = utils::frame_towards(normal, view);
    lut.brdf(
        normal.dot(view),
        material.sqrt_roughness,
        material.specular_albedo,
    )
    .rotate(frame)
}

fn sg_lighting(
    lobes: &[SphericalGaussian],
    normal: Vec3d,
    view: Vec3d,
    material: &MaterialSample,
    ctx: &ReconstructionContext<'_>,
) -> IndirectLighting {
    lobes
        .iter()
        .fold(IndirectLighting::default(), |sum, lobe| IndirectLighting {
            irradiance: sum.irradiance + lobe.irradiance(normal, ctx.sg_irradiance_mode),
            specular: sum.specular
                + sg::specular(
                    lobe,
                    normal,
                    material.roughness(),
                    view,
                    material.specular_albedo,
                    ctx.sg_specular_mode,
                ),
        })
}
