//! Shadowing of the two analytic lights.
//!
//! The sun uses cascaded exponential variance shadow maps (EVSM): every cascade stores the first
//! two moments of the exponentially warped occluder depth, and visibility is the Chebyshev upper
//! bound of the receiver depth. The spherical area light uses a depth cube map with reversed,
//! infinite projection and hardware style depth comparison.

use glam::{DMat4, DVec4};

use crate::{
    texture::{DepthCubemap, Texture2dArray},
    utils::{FloatExt, SafeCast},
    RgbD, ShadingPoint, Texel, Vec2d, Vec3d,
};

/// Number of shadow cascades of the sun
pub const CASCADE_COUNT: usize = 4;

/// Largest EVSM exponent, `exp(2 * 42)` still fits into a 32 bit float
pub const MAX_EVSM_EXPONENT: f64 = 42.0;

/// Tint of each cascade when cascades are visualized
const CASCADE_COLORS: [RgbD; CASCADE_COUNT] = [
    RgbD::new(1.0, 0.0, 0.0),
    RgbD::new(0.0, 1.0, 0.0),
    RgbD::new(0.0, 0.0, 1.0),
    RgbD::new(1.0, 1.0, 0.0),
];

/// Maps the shadow space into the texture space of a single cascade
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cascade {
    pub offset: Vec3d,
    pub scale: Vec3d,

    /// Far end of the cascade, as view space depth
    pub split: f64,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CascadeSet {
    pub cascades: [Cascade; CASCADE_COUNT],
}

impl CascadeSet {
    /// Index of the cascade that covers the given view space depth: the first cascade whose
    /// split lies beyond `depth_vs`, the last one if none does.
    #[must_use]
    pub fn select(&self, depth_vs: f64) -> usize {
        self.cascades[..CASCADE_COUNT - 1]
            .iter()
            .position(|c| c.split > depth_vs)
            .unwrap_or(CASCADE_COUNT - 1)
    }

    /// Whether the splits are strictly increasing
    #[must_use]
    pub fn is_increasing(&self) -> bool {
        self.cascades
            .windows(2)
            .all(|pair| pair[0].split < pair[1].split)
    }

    #[must_use]
    pub fn splits(&self) -> [f64; CASCADE_COUNT] {
        self.cascades.map(|c| c.split)
    }
}

impl Default for CascadeSet {
    fn default() -> Self {
        let cascade = |split| Cascade {
            offset: Vec3d::ZERO,
            scale: Vec3d::ONE,
            split,
        };
        Self {
            cascades: [cascade(5.0), cascade(15.0), cascade(40.0), cascade(100.0)],
        }
    }
}

/// Everything needed to look up the sun shadow
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShadowSettings {
    /// Transforms world space positions into the shared shadow space of all cascades
    pub shadow_matrix: DMat4,
    pub cascades: CascadeSet,
    pub positive_exponent: f64,
    pub negative_exponent: f64,

    /// Fraction of the Chebyshev bound that is cut off to hide light bleeding. In \[0,1).
    pub light_bleeding_reduction: f64,
}

impl Default for ShadowSettings {
    fn default() -> Self {
        Self {
            shadow_matrix: DMat4::IDENTITY,
            cascades: CascadeSet::default(),
            positive_exponent: 40.0,
            negative_exponent: 5.0,
            light_bleeding_reduction: 0.25,
        }
    }
}

/// EVSM exponents of a cascade. Cascades with a larger depth scale get larger exponents so
/// that the warp is consistent in world units.
#[must_use]
pub fn evsm_exponents(positive: f64, negative: f64, cascade_scale: Vec3d) -> Vec2d {
    (Vec2d::new(positive, negative) * cascade_scale.z).min(Vec2d::splat(MAX_EVSM_EXPONENT))
}

/// Warps a depth in \[0,1\] into its positive and negative exponential
#[must_use]
pub fn warp_depth(depth: f64, exponents: Vec2d) -> Vec2d {
    let depth = depth.mul_add(2.0, -1.0);
    let pos = (exponents.x * depth).exp();
    let neg = -(-exponents.y * depth).exp();
    Vec2d::new(pos, neg)
}

fn chebyshev_upper_bound(
    moments: Vec2d,
    mean: f64,
    min_variance: f64,
    light_bleeding_reduction: f64,
) -> f64 {
    if mean <= moments.x {
        return 1.0;
    }
    let variance = (moments.y - moments.x.sq()).max(min_variance);
    let d = mean - moments.x;
    let p_max = variance / (variance + d * d);
    p_max.linstep(light_bleeding_reduction, 1.0)
}

/// Texels of shadow maps, consistent with the lookups in this module
pub struct ShadowMoments;

impl ShadowMoments {
    /// The EVSM texel of an occluder at `depth`: `(E[pos], E[neg], E[pos^2], E[neg^2])`
    #[must_use]
    pub fn from_depth(depth: f64, exponents: Vec2d) -> Texel {
        let warped = warp_depth(depth.saturate(), exponents);
        Texel::new(
            warped.x as f32,
            warped.y as f32,
            (warped.x * warped.x) as f32,
            (warped.y * warped.y) as f32,
        )
    }
}

/// The value stored in an area light cube map for an occluder at `offset` from the light.
/// `near` is the near plane distance, i.e. the size of the light.
#[must_use]
pub fn cube_depth(offset: Vec3d, near: f64) -> f32 {
    let projected = offset.abs().max_element();
    (near / projected.max(near)) as f32
}

/// Cascaded EVSM lookup of the sun
#[derive(Clone, Copy)]
pub struct SunShadow<'a> {
    pub map: &'a dyn Texture2dArray,
    pub settings: &'a ShadowSettings,

    /// tints the result with the color of the selected cascade
    pub visualize_cascades: bool,
}

impl<'a> SunShadow<'a> {
    #[must_use]
    pub fn new(
        map: &'a dyn Texture2dArray,
        settings: &'a ShadowSettings,
        visualize_cascades: bool,
    ) -> Self {
        Self {
            map,
            settings,
            visualize_cascades,
        }
    }

    /// Visibility of the sun at the point, looked up in the given cascade
    #[must_use]
    pub fn cascade_visibility(&self, point: &ShadingPoint, cascade_index: usize) -> RgbD {
        let cascade = &self.settings.cascades.cascades[cascade_index];
        let shadow_pos = self
            .settings
            .shadow_matrix
            .transform_point3(point.position);
        let shadow_pos = (shadow_pos + cascade.offset) * cascade.scale;
        let shadow_pos_dx = point.shadow_pos_dx * cascade.scale;
        let shadow_pos_dy = point.shadow_pos_dy * cascade.scale;

        let exponents = evsm_exponents(
            self.settings.positive_exponent,
            self.settings.negative_exponent,
            cascade.scale,
        );
        let warped = warp_depth(shadow_pos.z.saturate(), exponents);

        let moments: DVec4 = self
            .map
            .sample_grad(
                shadow_pos.truncate(),
                cascade_index,
                shadow_pos_dx.truncate(),
                shadow_pos_dy.truncate(),
            )
            .safe_cast();

        let min_variance = (1e-4 * exponents * warped).powf(2.0);
        let reduction = self.settings.light_bleeding_reduction;
        let pos = chebyshev_upper_bound(
            Vec2d::new(moments.x, moments.z),
            warped.x,
            min_variance.x,
            reduction,
        );
        let neg = chebyshev_upper_bound(
            Vec2d::new(moments.y, moments.w),
            warped.y,
            min_variance.y,
            reduction,
        );
        let visibility = RgbD::splat(pos.min(neg));

        if self.visualize_cascades {
            visibility * CASCADE_COLORS[cascade_index]
        } else {
            visibility
        }
    }

    /// Visibility of the sun at the point
    #[must_use]
    pub fn visibility(&self, point: &ShadingPoint) -> RgbD {
        let cascade_index = self.settings.cascades.select(point.depth_vs);
        self.cascade_visibility(point, cascade_index)
    }
}

/// Depth cube map lookup of the spherical area light
#[derive(Clone, Copy)]
pub struct AreaLightShadow<'a> {
    pub map: &'a dyn DepthCubemap,
    pub light_position: Vec3d,

    /// near plane distance of the cube map projection, the size of the light
    pub near: f64,

    /// added to the receiver depth before comparing
    pub bias: f64,
}

impl AreaLightShadow<'_> {
    /// Fraction of the filtered cube map texels that see the receiver
    #[must_use]
    pub fn visibility(&self, position: Vec3d) -> f64 {
        let offset = position - self.light_position;
        let depth = cube_depth(offset, self.near) as f64;
        self.map.sample_compare(offset, depth + self.bias)
    }
}

#[cfg(test)]
mod tests {
    use glam::DMat4;

    use super::{
        cube_depth, evsm_exponents, warp_depth, AreaLightShadow, Cascade, CascadeSet,
        ShadowMoments, ShadowSettings, SunShadow, MAX_EVSM_EXPONENT,
    };
    use crate::{
        test_utils::assert_eq_approx_abs,
        texture::{ConstantTexture, CubeDepthMap, Image, ImageArray},
        RgbD, ShadingPoint, Texel, Vec2d, Vec3d,
    };

    fn point(position: Vec3d, depth_vs: f64) -> ShadingPoint {
        ShadingPoint {
            position,
            normal: Vec3d::Z,
            normal_ts: Vec3d::Z,
            view: Vec3d::Z,
            view_ts: Vec3d::Z,
            depth_vs,
            shadow_pos_dx: Vec3d::ZERO,
            shadow_pos_dy: Vec3d::ZERO,
        }
    }

    /// A shadow map whose occluders all lie at `depth`
    fn uniform_map(settings: &ShadowSettings, depth: f64) -> ImageArray {
        let layers = settings
            .cascades
            .cascades
            .iter()
            .map(|c| {
                let exponents =
                    evsm_exponents(settings.positive_exponent, settings.negative_exponent, c.scale);
                let texel = ShadowMoments::from_depth(depth, exponents);
                Image::new(2, 2, vec![texel; 4]).unwrap()
            })
            .collect();
        ImageArray::new(layers).unwrap()
    }

    #[test]
    fn cascade_selection() {
        let cascades = CascadeSet::default();
        assert_eq!(cascades.select(0.0), 0);
        assert_eq!(cascades.select(4.99), 0);
        assert_eq!(cascades.select(5.0), 1);
        assert_eq!(cascades.select(20.0), 2);
        assert_eq!(cascades.select(40.0), 3);
        assert_eq!(cascades.select(1e6), 3);

        let mut previous = 0;
        for i in 0..2000 {
            let index = cascades.select(i as f64 * 0.1);
            assert!(index >= previous);
            previous = index;
        }
    }

    #[test]
    fn split_order() {
        assert!(CascadeSet::default().is_increasing());
        let mut cascades = CascadeSet::default();
        cascades.cascades[2] = Cascade {
            split: 15.0,
            ..cascades.cascades[2]
        };
        assert!(!cascades.is_increasing());
    }

    #[test]
    fn exponents_are_clamped() {
        let exponents = evsm_exponents(40.0, 5.0, Vec3d::new(1.0, 1.0, 2.0));
        assert_eq!(exponents, Vec2d::new(MAX_EVSM_EXPONENT, 10.0));
    }

    #[test]
    fn warp_is_monotonic() {
        let exponents = Vec2d::new(40.0, 5.0);
        let mut previous = warp_depth(0.0, exponents);
        for i in 1..=100 {
            let warped = warp_depth(i as f64 / 100.0, exponents);
            assert!(warped.x > previous.x);
            assert!(warped.y > previous.y);
            previous = warped;
        }
    }

    #[test]
    fn receiver_at_occluder_depth_is_lit() {
        let settings = ShadowSettings::default();
        for depth in [0.1, 0.5, 0.9] {
            let map = uniform_map(&settings, depth);
            let shadow = SunShadow::new(&map, &settings, false);
            let p = point(Vec3d::new(0.5, 0.5, depth), 1.0);
            assert_eq_approx_abs!(shadow.visibility(&p), RgbD::ONE, RgbD::splat(1e-6));
        }
    }

    #[test]
    fn fully_lit_map() {
        let settings = ShadowSettings::default();
        let map = uniform_map(&settings, 1.0);
        let shadow = SunShadow::new(&map, &settings, false);
        let mut rd = fastrand::Rng::with_seed(40);
        for _ in 0..100 {
            let p = point(
                Vec3d::new(rd.f64(), rd.f64(), rd.f64()),
                rd.f64() * 200.0,
            );
            assert_eq!(shadow.visibility(&p), RgbD::ONE);
        }
    }

    #[test]
    fn occluded_receiver() {
        let settings = ShadowSettings::default();
        let map = uniform_map(&settings, 0.2);
        let shadow = SunShadow::new(&map, &settings, false);
        let behind = shadow.visibility(&point(Vec3d::new(0.5, 0.5, 0.8), 1.0));
        assert_eq_approx_abs!(behind, RgbD::ZERO, RgbD::splat(1e-6));
        let in_front = shadow.visibility(&point(Vec3d::new(0.5, 0.5, 0.1), 1.0));
        assert_eq!(in_front, RgbD::ONE);
    }

    #[test]
    fn shadow_matrix_and_cascade_transform() {
        // shift the world by one unit along z, and scale it down by half in the last cascade
        let mut settings = ShadowSettings {
            shadow_matrix: DMat4::from_translation(Vec3d::new(0.0, 0.0, 1.0)),
            ..ShadowSettings::default()
        };
        settings.cascades.cascades[3].offset = Vec3d::new(0.0, 0.0, -1.0);
        settings.cascades.cascades[3].scale = Vec3d::new(1.0, 1.0, 0.5);
        let map = uniform_map(&settings, 0.3);
        let shadow = SunShadow::new(&map, &settings, false);
        // depth 0.4 - 1 + 1 = 0.4 behind 0.3 in cascade 0, 0.2 in front of it in cascade 3
        let p = point(Vec3d::new(0.5, 0.5, 0.4 - 1.0), 1.0);
        assert!(shadow.cascade_visibility(&p, 0).x < 0.5);
        let p = point(Vec3d::new(0.5, 0.5, 0.4), 1000.0);
        assert_eq!(shadow.visibility(&p), RgbD::ONE);
    }

    #[test]
    fn cascade_visualization() {
        let settings = ShadowSettings::default();
        let map = uniform_map(&settings, 1.0);
        let shadow = SunShadow::new(&map, &settings, true);
        let p = point(Vec3d::splat(0.5), 20.0);
        assert_eq!(shadow.visibility(&p), RgbD::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn area_light_shadow() {
        let light_position = Vec3d::new(0.0, 0.0, 5.0);
        let near = 0.5;
        // an occluder 2 units below the light, covering the -z face
        let map = CubeDepthMap::from_fn(16, |d| {
            if d.z < -0.9 {
                cube_depth(d * 2.0 / d.z.abs(), near)
            } else {
                0.0
            }
        })
        .unwrap();
        let shadow = AreaLightShadow {
            map: &map,
            light_position,
            near,
            bias: 1e-5,
        };
        // below the occluder
        assert_eq!(shadow.visibility(Vec3d::ZERO), 0.0);
        // between the light and the occluder
        assert_eq!(shadow.visibility(Vec3d::new(0.0, 0.0, 4.0)), 1.0);
        // to the side, nothing in the way
        assert_eq!(shadow.visibility(Vec3d::new(3.0, 0.0, 5.0)), 1.0);
    }

    #[test]
    fn area_light_without_occluders() {
        let map = ConstantTexture::new(Texel::ZERO);
        let shadow = AreaLightShadow {
            map: &map,
            light_position: Vec3d::ZERO,
            near: 0.1,
            bias: 0.0,
        };
        assert_eq!(shadow.visibility(Vec3d::new(1.0, 2.0, 3.0)), 1.0);
        assert_eq!(shadow.visibility(Vec3d::ZERO), 1.0);
    }
}
