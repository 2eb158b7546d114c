// Renders a top down view of a ground plane with a sphere hovering above it. The plane has a
// baked SH9 lightmap from a sky dome, the sphere casts a sun shadow and occludes a small area
// light. Only the plane is shaded, the sphere itself is not drawn.
use bakeshade::{
    config::{AreaLight, Scene, ShadingConfig, SunLight},
    lightmap::{BakeMode, SgBasis},
    sh::Sh9,
    shading::{MaterialMaps, Renderer, Resources, SurfaceInput},
    shadow::{cube_depth, evsm_exponents, ShadowMoments, ShadowSettings, CASCADE_COUNT},
    texture::{ConstantTexture, CubeDepthMap, Image, ImageArray, ImageTexture, TextureError},
    RgbD, Texel, Vec2d, Vec3d,
};
use glam::{DMat4, DVec4};

const EXTENT: f64 = 5.0;
const SPHERE_CENTER: Vec3d = Vec3d::new(0.0, 0.0, 1.5);
const SPHERE_RADIUS: f64 = 1.0;

fn hit_sphere(origin: Vec3d, direction: Vec3d) -> Option<f64> {
    let oc = origin - SPHERE_CENTER;
    let half_b = oc.dot(direction);
    let c = oc.length_squared() - SPHERE_RADIUS * SPHERE_RADIUS;
    let discriminant = half_b * half_b - c;
    if discriminant < 0.0 {
        return None;
    }
    let t = -half_b - discriminant.sqrt();
    (t > 0.0).then_some(t)
}

fn sky(direction: Vec3d) -> RgbD {
    let a = direction.z.max(0.0);
    RgbD::new(0.6, 0.7, 0.9) * (1.0 - a) + RgbD::new(0.2, 0.35, 0.8) * a
}

fn world_from_uv(uv: Vec2d) -> Vec3d {
    Vec3d::new((uv.x * 2.0 - 1.0) * EXTENT, (1.0 - uv.y * 2.0) * EXTENT, 0.0)
}

// the plane normal is +z, therefore tangent space equals world space
fn bake_lightmap(size: usize, samples: usize) -> Result<ImageArray, TextureError> {
    let mut rd = fastrand::Rng::with_seed(7);
    let directions: Vec<Vec3d> = (0..samples)
        .map(|_| {
            let z = rd.f64();
            let phi = rd.f64() * std::f64::consts::TAU;
            let r = (1.0 - z * z).sqrt();
            Vec3d::new(r * phi.cos(), r * phi.sin(), z)
        })
        .collect();
    // uniform hemisphere pdf
    let weight = std::f64::consts::TAU / samples as f64;

    let mut texels = vec![Vec::with_capacity(size * size); 9];
    for y in 0..size {
        for x in 0..size {
            let uv = Vec2d::new((x as f64 + 0.5) / size as f64, (y as f64 + 0.5) / size as f64);
            let position = world_from_uv(uv);
            let mut sh = Sh9::ZERO;
            for &direction in &directions {
                if hit_sphere(position, direction).is_none() {
                    sh += Sh9::project_radiance(direction, sky(direction)) * weight;
                }
            }
            for (layer, coefficient) in texels.iter_mut().zip(sh.coefficients) {
                layer.push(coefficient.as_vec3().extend(1.0));
            }
        }
    }
    let layers = texels
        .into_iter()
        .map(|layer| Image::new(size, size, layer))
        .collect::<Result<_, _>>()?;
    ImageArray::new(layers)
}

fn shadow_settings() -> ShadowSettings {
    // sun straight from above, depth grows downwards
    ShadowSettings {
        shadow_matrix: DMat4::from_translation(Vec3d::splat(0.5))
            * DMat4::from_scale(Vec3d::new(0.5 / EXTENT, -0.5 / EXTENT, -0.5 / EXTENT)),
        ..ShadowSettings::default()
    }
}

fn render_sun_shadow(settings: &ShadowSettings, size: usize) -> Result<ImageArray, TextureError> {
    let layers = (0..CASCADE_COUNT)
        .map(|i| {
            let cascade = settings.cascades.cascades[i];
            let exponents = evsm_exponents(
                settings.positive_exponent,
                settings.negative_exponent,
                cascade.scale,
            );
            Image::from_fn(size, size, |uv| {
                let mut position = world_from_uv(uv);
                position.z = EXTENT;
                let height = hit_sphere(position, -Vec3d::Z).map_or(0.0, |t| EXTENT - t);
                let depth = settings
                    .shadow_matrix
                    .transform_point3(Vec3d::new(0.0, 0.0, height))
                    .z;
                ShadowMoments::from_depth(depth, exponents)
            })
        })
        .collect::<Result<_, _>>()?;
    ImageArray::new(layers)
}

fn render_area_shadow(light: &AreaLight) -> Result<CubeDepthMap, TextureError> {
    CubeDepthMap::from_fn(128, |direction| {
        hit_sphere(light.position, direction).map_or(0.0, |t| cube_depth(direction * t, light.size))
    })
}

fn save_image(
    path: &std::path::Path,
    buffer: &[u8],
    width: u32,
    height: u32,
) -> Result<(), Box<dyn std::error::Error>> {
    let file = std::fs::File::create(path)?;
    let mut writer = std::io::BufWriter::new(file);

    let mut encoder = png::Encoder::new(&mut writer, width, height);
    encoder.set_color(png::ColorType::Rgb);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_source_gamma(png::ScaledFloat::new(1.0 / 2.2));

    let mut writer = encoder.write_header()?;
    writer.write_image_data(buffer)?;
    Ok(())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let image_size = (512, 512);

    let mut scene = Scene {
        sun: SunLight {
            direction: Vec3d::Z,
            ..SunLight::default()
        },
        area_light: AreaLight {
            position: Vec3d::new(2.0, -1.0, 2.0),
            radiance: RgbD::new(40.0, 25.0, 10.0),
            size: 0.3,
            ..AreaLight::default()
        },
        shadow: shadow_settings(),
        ..Scene::default()
    };
    scene.camera.position = Vec3d::new(0.0, 0.0, 20.0);
    scene.camera.render_target_size = Vec2d::new(image_size.0 as f64, image_size.1 as f64);

    let config = ShadingConfig {
        bake_mode: BakeMode::Sh9,
        enable_area_light: true,
        enable_indirect_specular: false,
        ..ShadingConfig::default()
    };

    let albedo = ImageTexture::new(Image::from_fn(64, 64, |uv| {
        let checker = ((uv.x * 8.0).floor() + (uv.y * 8.0).floor()) as i64 % 2 == 0;
        if checker {
            Texel::new(0.8, 0.8, 0.8, 1.0)
        } else {
            Texel::new(0.4, 0.35, 0.3, 1.0)
        }
    })?);
    let flat_normal = ConstantTexture::new(Texel::new(0.5, 0.5, 1.0, 0.0));
    let roughness = ConstantTexture::new(Texel::splat(0.6));
    let metallic = ConstantTexture::new(Texel::ZERO);

    println!("Baking lightmap");
    let lightmap = bake_lightmap(64, 512)?;
    let sun_shadow = render_sun_shadow(&scene.shadow, 256)?;
    let area_shadow = render_area_shadow(&scene.area_light)?;
    let sg_basis = SgBasis::hemisphere(9);

    let resources = Resources {
        material: MaterialMaps {
            albedo: &albedo,
            normal: &flat_normal,
            roughness: &roughness,
            metallic: &metallic,
        },
        sun_shadow_map: &sun_shadow,
        area_light_shadow_map: &area_shadow,
        lightmap: &lightmap,
        specular_lut: None,
        sg_basis: &sg_basis,
    };
    let renderer = Renderer::new(config, scene, resources)?;

    let inputs: Vec<SurfaceInput> = (0..image_size.1)
        .flat_map(|y| (0..image_size.0).map(move |x| (x, y)))
        .map(|(x, y)| {
            let uv = Vec2d::new(
                (x as f64 + 0.5) / image_size.0 as f64,
                (y as f64 + 0.5) / image_size.1 as f64,
            );
            let position = world_from_uv(uv);
            let clip = DVec4::new(position.x / EXTENT, position.y / EXTENT, 0.5, 1.0);
            SurfaceInput {
                position,
                normal: Vec3d::Z,
                tangent: Vec3d::X,
                bitangent: Vec3d::Y,
                uv,
                lightmap_uv: uv,
                depth_vs: scene.camera.position.z - position.z,
                shadow_pos_dx: Vec3d::new(1.0 / image_size.0 as f64, 0.0, 0.0),
                shadow_pos_dy: Vec3d::new(0.0, 1.0 / image_size.1 as f64, 0.0),
                clip_position: clip,
                prev_clip_position: clip,
            }
        })
        .collect();

    println!("Shading {} pixels", inputs.len());
    let outputs = renderer.shade_all(&inputs);

    let image: Vec<u8> = outputs
        .iter()
        .flat_map(|output| {
            // reinhard
            let color = output.radiance / (RgbD::ONE + output.radiance);
            color
                .to_array()
                .map(|c| (c.powf(1.0 / 2.2) * 255.0).clamp(0.0, 255.0).floor() as u8)
        })
        .collect();

    save_image(
        std::path::Path::new("lightmap_preview.png"),
        &image,
        image_size.0 as u32,
        image_size.1 as u32,
    )
}
