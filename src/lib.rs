#![warn(clippy::pedantic)]
#![warn(clippy::perf)]
#![warn(clippy::nursery)]
#![warn(clippy::suboptimal_flops)]
#![deny(clippy::return_self_not_must_use)]
#![allow(clippy::similar_names)]
#![deny(clippy::semicolon_if_nothing_returned)]
#![deny(clippy::must_use_candidate)]
#![deny(clippy::double_must_use)]
#![deny(clippy::use_self)]
#![deny(clippy::unreadable_literal)]
#![deny(clippy::explicit_iter_loop)]
// these are lints to enable later
#![allow(clippy::cast_lossless)]
#![allow(clippy::cast_possible_truncation)]

//! This crate shades surface points of a real-time renderer that relies on baked global
//! illumination. Direct light comes from a sun with cascaded EVSM shadows and from a spherical
//! area light with a shadow cube map. Indirect light is reconstructed from lightmaps that store
//! one of several directional bases.
//!
//! # Design Decisions
//! Lighting calculations are done exclusively in [f64]s, texels are stored as [f32]s. The GPU
//! pipeline this mirrors stores its render targets as half floats, therefore the output radiance
//! is clamped to [`FP16_MAX`].
//!
//! Textures are abstracted behind the traits in [`texture`]. The renderer only borrows them, the
//! caller owns all resources. Everything a frame needs is bundled in
//! [`shading::Resources`] and validated once when the [`shading::Renderer`] is created.
//!
//! Lightmaps are baked in tangent space: the z-axis is the vertex normal. Normal maps and the
//! view vector are therefore evaluated in tangent space as well, see [`ShadingPoint`].
//!
//! Supported lightmap bases ([`lightmap::BakeMode`]):
//! * plain irradiance
//! * the Half-Life 2 basis
//! * [`sh::Sh4`] and [`sh::Sh9`] spherical harmonics
//! * the hemispherical [`hbasis::H4`] and [`hbasis::H6`] bases
//! * 5, 6, 9 or 12 [`sg::SphericalGaussian`] lobes
//!
//! This crate is built on [glam] for a simple but fast vector math library at the core.
//!
//! # References
//! * Brian Karis. Real shading in Unreal Engine 4. *SIGGRAPH Course, Physically based shading in
//!     theory and practice,* 2013.
//! * Peter-Pike Sloan. Stupid spherical harmonics (SH) tricks. *GDC,* 2008.
//! * Ravi Ramamoorthi and Pat Hanrahan. An efficient representation for irradiance environment
//!     maps. In *Proceedings of SIGGRAPH,* 2001.
//! * Ping Tan, Stephen Lin, Long Quan, Baining Guo and Heung-Yeung Shum. Multiresolution
//!     reflectance field rendering. *Eurographics Symposium on Rendering,* 2005.
//! * Jiaping Wang, Peiran Ren, Minmin Gong, John Snyder and Baining Guo. All-frequency rendering
//!     of dynamic, spatially-varying reflectance. *ACM SIGGRAPH Asia,* 2009.
//! * Kun Xu, Wei-Lun Sun, Zhao Dong, Dan-Yong Zhao, Run-Dong Wu and Shi-Min Hu. Anisotropic
//!     spherical Gaussians. *ACM SIGGRAPH Asia,* 2013.
//! * Matt Pettineo. SG series: <https://therealmjp.github.io/posts/sg-series-part-1-a-brief-and-incomplete-history-of-baked-lighting-representations/>
//! * Andrew Lauritzen and Michael McCool. Layered variance shadow maps. *Graphics Interface,* 2008.
//! * Eric Heitz. Understanding the masking-shadowing function in microfacet-based brdfs.
//!     *Journal of Computer Graphics Techniques, 3(2):32–91,* 2014.

mod core;

pub use core::{
    MaterialSample, RgbD, RgbF, ShadingOutput, ShadingPoint, Texel, Vec2d, Vec3d, FP16_MAX,
};

#[cfg(test)]
pub(crate) mod test_utils;
pub(crate) mod utils;

pub mod brdf;
pub mod config;
pub mod ggx;
pub mod hbasis;
pub mod lambert;
pub mod lightmap;
pub mod sg;
pub mod sh;
pub mod shading;
pub mod shadow;
pub mod texture;
