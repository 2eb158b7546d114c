//! Texture sampling. The shading code only talks to the traits in this module, which makes it
//! independent of where the texel data lives. The in-memory implementations filter the same
//! way a GPU sampler set to clamp-to-edge and linear filtering would.

use thiserror::Error;

use crate::{utils::FloatExt, Texel, Vec2d, Vec3d};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TextureError {
    #[error("texture dimensions must be non-zero, got {width}x{height}x{depth}")]
    EmptyDimensions {
        width: usize,
        height: usize,
        depth: usize,
    },

    #[error("expected {expected} texels, found {found}")]
    DataSize { expected: usize, found: usize },

    #[error("all layers of an array must share the same size")]
    LayerSize,
}

/// A filtered 2D texture
pub trait Texture2d: Sync {
    /// Bilinear sample of the most detailed mip level. `uv` outside of \[0,1\] is clamped.
    fn sample(&self, uv: Vec2d) -> Texel;
}

/// A stack of equally sized 2D textures
pub trait Texture2dArray: Sync {
    fn layer_count(&self) -> usize;

    /// Bilinear sample of the most detailed mip level
    fn sample(&self, uv: Vec2d, layer: usize) -> Texel;

    /// Trilinear sample. The mip level is selected from the screen space derivatives of `uv`.
    /// Without mip levels this falls back to [`Texture2dArray::sample`].
    fn sample_grad(&self, uv: Vec2d, layer: usize, _duv_dx: Vec2d, _duv_dy: Vec2d) -> Texel {
        self.sample(uv, layer)
    }
}

/// A filtered volume texture
pub trait Texture3d: Sync {
    /// Trilinear sample, `uvw` outside of \[0,1\] is clamped.
    fn sample(&self, uvw: Vec3d) -> Texel;
}

/// A cube map of depths with hardware style depth comparison
pub trait DepthCubemap: Sync {
    /// Percentage closer filtering. Returns the bilinearly weighted fraction of the texels
    /// around `direction` for which `reference >= stored`. The filter footprint continues on
    /// the adjacent face near face edges.
    fn sample_compare(&self, direction: Vec3d, reference: f64) -> f64;
}

/// A single mip level
#[derive(Clone, Debug, PartialEq)]
pub struct Image {
    width: usize,
    height: usize,
    texels: Vec<Texel>,
}

impl Image {
    /// # Errors
    /// [`TextureError`] if a dimension is zero or `texels` has the wrong length
    pub fn new(width: usize, height: usize, texels: Vec<Texel>) -> Result<Self, TextureError> {
        if width == 0 || height == 0 {
            return Err(TextureError::EmptyDimensions {
                width,
                height,
                depth: 1,
            });
        }
        if texels.len() != width * height {
            return Err(TextureError::DataSize {
                expected: width * height,
                found: texels.len(),
            });
        }
        Ok(Self {
            width,
            height,
            texels,
        })
    }

    /// Evaluates `f` at the uv coordinate of every texel center
    ///
    /// # Errors
    /// [`TextureError::EmptyDimensions`] if a dimension is zero
    pub fn from_fn<F: Fn(Vec2d) -> Texel>(
        width: usize,
        height: usize,
        f: F,
    ) -> Result<Self, TextureError> {
        let texels = (0..height)
            .flat_map(|y| (0..width).map(move |x| (x, y)))
            .map(|(x, y)| {
                f(Vec2d::new(
                    (x as f64 + 0.5) / width as f64,
                    (y as f64 + 0.5) / height as f64,
                ))
            })
            .collect();
        Self::new(width, height, texels)
    }

    #[must_use]
    pub const fn width(&self) -> usize {
        self.width
    }

    #[must_use]
    pub const fn height(&self) -> usize {
        self.height
    }

    fn texel(&self, x: usize, y: usize) -> Texel {
        self.texels[y * self.width + x]
    }

    fn bilinear(&self, uv: Vec2d) -> Texel {
        let (x0, x1, tx) = filter_taps(uv.x, self.width);
        let (y0, y1, ty) = filter_taps(uv.y, self.height);
        let top = self.texel(x0, y0).lerp(self.texel(x1, y0), tx);
        let bottom = self.texel(x0, y1).lerp(self.texel(x1, y1), tx);
        top.lerp(bottom, ty)
    }

    /// Box filtered half resolution copy
    fn downsample(&self) -> Self {
        let width = (self.width / 2).max(1);
        let height = (self.height / 2).max(1);
        let mut texels = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let x0 = (2 * x).min(self.width - 1);
                let x1 = (2 * x + 1).min(self.width - 1);
                let y0 = (2 * y).min(self.height - 1);
                let y1 = (2 * y + 1).min(self.height - 1);
                let sum = self.texel(x0, y0)
                    + self.texel(x1, y0)
                    + self.texel(x0, y1)
                    + self.texel(x1, y1);
                texels.push(sum * 0.25);
            }
        }
        Self {
            width,
            height,
            texels,
        }
    }

    /// The full mip chain, starting with this image and ending with a single texel
    fn mip_chain(self) -> Vec<Self> {
        let mut chain = vec![self];
        while let Some(last) = chain.last() {
            if last.width == 1 && last.height == 1 {
                break;
            }
            let next = last.downsample();
            chain.push(next);
        }
        chain
    }
}

/// Texel indices and interpolation weight of a linear filter with clamp-to-edge addressing
fn filter_taps(coordinate: f64, size: usize) -> (usize, usize, f32) {
    let max = (size - 1) as f64;
    let position = coordinate.mul_add(size as f64, -0.5).clamp(0.0, max);
    let lower = position.floor();
    let i0 = lower as usize;
    let i1 = (i0 + 1).min(size - 1);
    (i0, i1, (position - lower) as f32)
}

/// A 2D texture without mips
#[derive(Clone, Debug, PartialEq)]
pub struct ImageTexture {
    image: Image,
}

impl ImageTexture {
    #[must_use]
    pub const fn new(image: Image) -> Self {
        Self { image }
    }
}

impl Texture2d for ImageTexture {
    fn sample(&self, uv: Vec2d) -> Texel {
        self.image.bilinear(uv)
    }
}

/// A texture array with a full mip chain per layer
#[derive(Clone, Debug, PartialEq)]
pub struct ImageArray {
    layers: Vec<Vec<Image>>,
}

impl ImageArray {
    /// Builds the mip chains of all layers
    ///
    /// # Errors
    /// [`TextureError::LayerSize`] if the layers differ in size
    pub fn new(layers: Vec<Image>) -> Result<Self, TextureError> {
        if let Some(first) = layers.first() {
            if layers
                .iter()
                .any(|l| l.width != first.width || l.height != first.height)
            {
                return Err(TextureError::LayerSize);
            }
        }
        Ok(Self {
            layers: layers.into_iter().map(Image::mip_chain).collect(),
        })
    }

    #[must_use]
    pub fn mip_count(&self) -> usize {
        self.layers.first().map_or(0, Vec::len)
    }
}

impl Texture2dArray for ImageArray {
    fn layer_count(&self) -> usize {
        self.layers.len()
    }

    fn sample(&self, uv: Vec2d, layer: usize) -> Texel {
        self.layers[layer][0].bilinear(uv)
    }

    fn sample_grad(&self, uv: Vec2d, layer: usize, duv_dx: Vec2d, duv_dy: Vec2d) -> Texel {
        let mips = &self.layers[layer];
        let size = Vec2d::new(mips[0].width as f64, mips[0].height as f64);
        let footprint = (duv_dx * size).length().max((duv_dy * size).length());
        let max_lod = (mips.len() - 1) as f64;
        let lod = if footprint > 1.0 {
            footprint.log2().min(max_lod)
        } else {
            0.0
        };
        let lower = lod.floor();
        let fine = mips[lower as usize].bilinear(uv);
        if lod > lower {
            let coarse = mips[lower as usize + 1].bilinear(uv);
            fine.lerp(coarse, (lod - lower) as f32)
        } else {
            fine
        }
    }
}

/// A volume texture
#[derive(Clone, Debug, PartialEq)]
pub struct VolumeTexture {
    size: [usize; 3],
    texels: Vec<Texel>,
}

impl VolumeTexture {
    /// Evaluates `f` at the uvw coordinate of every texel center
    ///
    /// # Errors
    /// [`TextureError::EmptyDimensions`] if a dimension is zero
    pub fn from_fn<F: Fn(Vec3d) -> Texel>(size: [usize; 3], f: F) -> Result<Self, TextureError> {
        let [width, height, depth] = size;
        if width == 0 || height == 0 || depth == 0 {
            return Err(TextureError::EmptyDimensions {
                width,
                height,
                depth,
            });
        }
        let mut texels = Vec::with_capacity(width * height * depth);
        for z in 0..depth {
            for y in 0..height {
                for x in 0..width {
                    texels.push(f(Vec3d::new(
                        (x as f64 + 0.5) / width as f64,
                        (y as f64 + 0.5) / height as f64,
                        (z as f64 + 0.5) / depth as f64,
                    )));
                }
            }
        }
        Ok(Self { size, texels })
    }

    fn texel(&self, x: usize, y: usize, z: usize) -> Texel {
        let [width, height, _] = self.size;
        self.texels[(z * height + y) * width + x]
    }
}

impl Texture3d for VolumeTexture {
    fn sample(&self, uvw: Vec3d) -> Texel {
        let (x0, x1, tx) = filter_taps(uvw.x, self.size[0]);
        let (y0, y1, ty) = filter_taps(uvw.y, self.size[1]);
        let (z0, z1, tz) = filter_taps(uvw.z, self.size[2]);
        let slice = |z| {
            let top = self.texel(x0, y0, z).lerp(self.texel(x1, y0, z), tx);
            let bottom = self.texel(x0, y1, z).lerp(self.texel(x1, y1, z), tx);
            top.lerp(bottom, ty)
        };
        slice(z0).lerp(slice(z1), tz)
    }
}

/// Cube face and face uv of a direction, using the D3D face layout
/// (`+x, -x, +y, -y, +z, -z`)
fn cube_face_uv(d: Vec3d) -> (usize, Vec2d) {
    let a = d.abs();
    let (face, sc, tc, major) = if a.x >= a.y && a.x >= a.z {
        if d.x > 0.0 {
            (0, -d.z, -d.y, a.x)
        } else {
            (1, d.z, -d.y, a.x)
        }
    } else if a.y >= a.z {
        if d.y > 0.0 {
            (2, d.x, d.z, a.y)
        } else {
            (3, d.x, -d.z, a.y)
        }
    } else if d.z > 0.0 {
        (4, d.x, -d.y, a.z)
    } else {
        (5, -d.x, -d.y, a.z)
    };
    let major = major.max(f64::MIN_POSITIVE);
    (
        face,
        Vec2d::new(0.5 * (sc / major + 1.0), 0.5 * (tc / major + 1.0)),
    )
}

/// Inverse of [`cube_face_uv`], the result is not normalized
fn cube_face_direction(face: usize, uv: Vec2d) -> Vec3d {
    let sc = uv.x.mul_add(2.0, -1.0);
    let tc = uv.y.mul_add(2.0, -1.0);
    match face {
        0 => Vec3d::new(1.0, -tc, -sc),
        1 => Vec3d::new(-1.0, -tc, sc),
        2 => Vec3d::new(sc, 1.0, tc),
        3 => Vec3d::new(sc, -1.0, -tc),
        4 => Vec3d::new(sc, -tc, 1.0),
        _ => Vec3d::new(-sc, -tc, -1.0),
    }
}

/// A cube map of depths, six square faces with a single channel
#[derive(Clone, Debug, PartialEq)]
pub struct CubeDepthMap {
    size: usize,
    faces: [Vec<f32>; 6],
}

impl CubeDepthMap {
    /// Renders the cube map by evaluating `f` for the (normalized) direction of every texel
    /// center
    ///
    /// # Errors
    /// [`TextureError::EmptyDimensions`] if `size` is zero
    pub fn from_fn<F: Fn(Vec3d) -> f32>(size: usize, f: F) -> Result<Self, TextureError> {
        if size == 0 {
            return Err(TextureError::EmptyDimensions {
                width: 0,
                height: 0,
                depth: 6,
            });
        }
        let faces = std::array::from_fn(|face| {
            (0..size * size)
                .map(|i| {
                    let uv = Vec2d::new(
                        ((i % size) as f64 + 0.5) / size as f64,
                        ((i / size) as f64 + 0.5) / size as f64,
                    );
                    f(cube_face_direction(face, uv).normalize())
                })
                .collect()
        });
        Ok(Self { size, faces })
    }
}

impl CubeDepthMap {
    /// Stored depth of texel `(x, y)` of `face`. Texels one step outside of the face are read
    /// from the adjacent face.
    fn texel(&self, face: usize, x: isize, y: isize) -> f32 {
        let n = self.size as isize;
        if (0..n).contains(&x) && (0..n).contains(&y) {
            return self.faces[face][y as usize * self.size + x as usize];
        }
        let size = self.size as f64;
        let center = Vec2d::new((x as f64 + 0.5) / size, (y as f64 + 0.5) / size);
        let (face, uv) = cube_face_uv(cube_face_direction(face, center));
        let index = |c: f64| ((c * size) as usize).min(self.size - 1);
        self.faces[face][index(uv.y) * self.size + index(uv.x)]
    }
}

impl DepthCubemap for CubeDepthMap {
    /// The 2x2 footprint wraps across face edges, so lookups next to an edge blend in the
    /// texels of the adjacent face.
    fn sample_compare(&self, direction: Vec3d, reference: f64) -> f64 {
        let (face, uv) = cube_face_uv(direction);
        let position = uv * self.size as f64 - Vec2d::splat(0.5);
        let lower = position.floor();
        let t = position - lower;
        let (x0, y0) = (lower.x as isize, lower.y as isize);
        let lit = |x: isize, y: isize| -> f64 {
            if reference >= self.texel(face, x, y) as f64 {
                1.0
            } else {
                0.0
            }
        };
        let top = lit(x0, y0).lerp(lit(x0 + 1, y0), t.x);
        let bottom = lit(x0, y0 + 1).lerp(lit(x0 + 1, y0 + 1), t.x);
        top.lerp(bottom, t.y)
    }
}

/// The same texel everywhere. Useful for disabled inputs and tests.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConstantTexture {
    pub value: Texel,
    pub layers: usize,
}

impl ConstantTexture {
    #[must_use]
    pub const fn new(value: Texel) -> Self {
        Self { value, layers: 1 }
    }

    #[must_use]
    pub const fn with_layers(value: Texel, layers: usize) -> Self {
        Self { value, layers }
    }
}

impl Texture2d for ConstantTexture {
    fn sample(&self, _uv: Vec2d) -> Texel {
        self.value
    }
}

impl Texture2dArray for ConstantTexture {
    fn layer_count(&self) -> usize {
        self.layers
    }

    fn sample(&self, _uv: Vec2d, layer: usize) -> Texel {
        debug_assert!(layer < self.layers);
        self.value
    }
}

impl Texture3d for ConstantTexture {
    fn sample(&self, _uvw: Vec3d) -> Texel {
        self.value
    }
}

impl DepthCubemap for ConstantTexture {
    fn sample_compare(&self, _direction: Vec3d, reference: f64) -> f64 {
        if reference >= self.value.x as f64 {
            1.0
        } else {
            0.0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{
        cube_face_direction, cube_face_uv, ConstantTexture, CubeDepthMap, DepthCubemap, Image,
        ImageArray, ImageTexture, Texture2d, Texture2dArray, Texture3d, TextureError,
        VolumeTexture,
    };
    use crate::{
        test_utils::{self, assert_eq_approx_abs},
        Texel, Vec2d, Vec3d,
    };

    fn gradient(width: usize, height: usize) -> Image {
        Image::from_fn(width, height, |uv| {
            Texel::new(uv.x as f32, uv.y as f32, 1.0, 0.0)
        })
        .unwrap()
    }

    #[test]
    fn image_size_is_checked() {
        assert_eq!(
            Image::new(2, 2, vec![Texel::ZERO; 3]),
            Err(TextureError::DataSize {
                expected: 4,
                found: 3
            })
        );
        assert!(matches!(
            Image::new(0, 2, vec![]),
            Err(TextureError::EmptyDimensions { .. })
        ));
        assert_eq!(
            ImageArray::new(vec![gradient(2, 2), gradient(4, 4)]),
            Err(TextureError::LayerSize)
        );
    }

    #[test]
    fn bilinear_reproduces_linear_functions() {
        let texture = ImageTexture::new(gradient(16, 8));
        let mut rd = fastrand::Rng::with_seed(30);
        for _ in 0..100 {
            // stay half a texel away from the border, clamping takes over there
            let uv = Vec2d::new(
                rd.f64().mul_add(14.0 / 16.0, 1.0 / 16.0),
                rd.f64().mul_add(6.0 / 8.0, 1.0 / 8.0),
            );
            let texel = texture.sample(uv);
            assert_eq_approx_abs!(texel.x as f64, uv.x, 1e-6);
            assert_eq_approx_abs!(texel.y as f64, uv.y, 1e-6);
        }
    }

    #[test]
    fn addressing_clamps_to_edge() {
        let texture = ImageTexture::new(gradient(4, 4));
        assert_eq!(
            texture.sample(Vec2d::new(-3.0, 0.0)),
            texture.sample(Vec2d::new(0.0, 0.0))
        );
        assert_eq!(
            texture.sample(Vec2d::new(7.0, 1.0)),
            texture.sample(Vec2d::new(1.0, 1.0))
        );
        assert_eq_approx_abs!(texture.sample(Vec2d::ONE).x as f64, 0.875, 1e-6);
    }

    #[test]
    fn mip_chain_preserves_the_mean() {
        let array = ImageArray::new(vec![gradient(8, 4)]).unwrap();
        assert_eq!(array.mip_count(), 4);
        let coarsest = array.sample_grad(
            Vec2d::splat(0.3),
            0,
            Vec2d::new(100.0, 0.0),
            Vec2d::ZERO,
        );
        assert_eq_approx_abs!(coarsest.x as f64, 0.5, 1e-6);
        assert_eq_approx_abs!(coarsest.y as f64, 0.5, 1e-6);
        // a footprint below one texel samples the full resolution level
        let fine = array.sample_grad(Vec2d::splat(0.3), 0, Vec2d::new(1e-3, 0.0), Vec2d::ZERO);
        assert_eq!(fine, Texture2dArray::sample(&array, Vec2d::splat(0.3), 0));
    }

    #[test]
    fn volume_is_trilinear() {
        let volume = VolumeTexture::from_fn([4, 4, 4], |uvw| {
            Texel::new(uvw.x as f32, uvw.y as f32, uvw.z as f32, 1.0)
        })
        .unwrap();
        let texel = volume.sample(Vec3d::new(0.3, 0.5, 0.7));
        assert_eq_approx_abs!(texel.x as f64, 0.3, 1e-6);
        assert_eq_approx_abs!(texel.y as f64, 0.5, 1e-6);
        assert_eq_approx_abs!(texel.z as f64, 0.7, 1e-6);
    }

    #[test]
    fn cube_face_mapping_round_trips() {
        let mut rd = fastrand::Rng::with_seed(31);
        for _ in 0..1000 {
            let d = test_utils::spherical_sample(&mut rd);
            let (face, uv) = cube_face_uv(d);
            assert_eq_approx_abs!(
                cube_face_direction(face, uv).normalize(),
                d,
                Vec3d::splat(1e-9)
            );
        }
    }

    #[test]
    fn depth_comparison() {
        // everything closer than 0.5 towards +z, nothing else
        let cube = CubeDepthMap::from_fn(8, |d| if d.z > 0.7 { 0.5 } else { 0.0 }).unwrap();
        assert_eq!(cube.sample_compare(Vec3d::Z, 0.4), 0.0);
        assert_eq!(cube.sample_compare(Vec3d::Z, 0.6), 1.0);
        assert_eq!(cube.sample_compare(-Vec3d::Z, 0.0), 1.0);
        assert_eq!(ConstantTexture::new(Texel::splat(0.5)).sample_compare(Vec3d::X, 0.5), 1.0);
    }

    #[test]
    fn depth_comparison_across_face_edges() {
        // occluders only on the +x face
        let cube = CubeDepthMap::from_fn(8, |d| {
            if d.x >= d.y.abs() && d.x >= d.z.abs() {
                0.5
            } else {
                0.0
            }
        })
        .unwrap();
        // a quarter texel inside the +z face, next to the edge it shares with +x
        let direction = Vec3d::new(1.0 - 0.5 / 8.0, 0.0, 1.0);
        assert_eq_approx_abs!(cube.sample_compare(direction, 0.4), 0.75, 1e-9);
        // the mirrored point on the +x face
        let direction = Vec3d::new(1.0, 0.0, 1.0 - 0.5 / 8.0);
        assert_eq_approx_abs!(cube.sample_compare(direction, 0.4), 0.25, 1e-9);
        // the corner of three faces is still a valid fraction
        for d in [Vec3d::ONE, Vec3d::new(1.0, -1.0, 1.0), -Vec3d::ONE] {
            let lit = cube.sample_compare(d, 0.4);
            assert!((0.0..=1.0).contains(&lit), "{d:?}: {lit}");
        }
    }

    #[test]
    fn constant_texture_layers() {
        let texture = ConstantTexture::with_layers(Texel::ONE, 3);
        assert_eq!(texture.layer_count(), 3);
        assert_eq!(Texture2dArray::sample(&texture, Vec2d::ZERO, 2), Texel::ONE);
        // no mips, the derivatives are ignored
        assert_eq!(texture.sample_grad(Vec2d::ZERO, 1, Vec2d::ONE, Vec2d::ONE), Texel::ONE);
    }
}
