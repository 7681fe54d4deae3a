//! Procedural floor maps and fallback textures.

pub const ROUGHNESS_SIZE: u32 = 128;

fn hash(x: u32, y: u32, seed: u32) -> f32 {
    let mut h = x.wrapping_mul(0x8da6_b343) ^ y.wrapping_mul(0xd816_3841) ^ seed.wrapping_mul(0xcb1a_b31f);
    h ^= h >> 13;
    h = h.wrapping_mul(0x5bd1_e995);
    h ^= h >> 15;
    (h & 0xffff) as f32 / 65535.0
}

/// Tileable value noise in [0, 1]. `cells` lattice cells span the texture.
fn value_noise(x: u32, y: u32, size: u32, cells: u32, seed: u32) -> f32 {
    let fx = x as f32 / size as f32 * cells as f32;
    let fy = y as f32 / size as f32 * cells as f32;
    let (x0, y0) = (fx.floor() as u32, fy.floor() as u32);
    let (tx, ty) = (fx.fract(), fy.fract());
    let (sx, sy) = (tx * tx * (3.0 - 2.0 * tx), ty * ty * (3.0 - 2.0 * ty));

    let at = |i: u32, j: u32| hash(i % cells, j % cells, seed);
    let top = at(x0, y0) + (at(x0 + 1, y0) - at(x0, y0)) * sx;
    let bottom = at(x0, y0 + 1) + (at(x0 + 1, y0 + 1) - at(x0, y0 + 1)) * sx;
    top + (bottom - top) * sy
}

/// RGBA8 roughness map. R drives reflection attenuation, G scales the
/// material roughness.
pub fn roughness_pixels(size: u32) -> Vec<u8> {
    let mut pixels = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let coarse = value_noise(x, y, size, 4, 1);
            let fine = value_noise(x, y, size, 16, 2);
            let r = 0.15 + 0.45 * (0.7 * coarse + 0.3 * fine);
            let g = 0.6 + 0.4 * fine;
            pixels.extend([(r * 255.0) as u8, (g * 255.0) as u8, 0, 255]);
        }
    }
    pixels
}

fn upload_rgba(
    device: &wgpu::Device,
    queue: &wgpu::Queue,
    label: &str,
    size: u32,
    format: wgpu::TextureFormat,
    pixels: &[u8],
) -> wgpu::TextureView {
    let extent = wgpu::Extent3d {
        width: size,
        height: size,
        depth_or_array_layers: 1,
    };
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some(label),
        size: extent,
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });
    queue.write_texture(
        texture.as_image_copy(),
        pixels,
        wgpu::TexelCopyBufferLayout {
            offset: 0,
            bytes_per_row: Some(4 * size),
            rows_per_image: Some(size),
        },
        extent,
    );
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

pub fn create_roughness_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    let pixels = roughness_pixels(ROUGHNESS_SIZE);
    upload_rgba(
        device,
        queue,
        "roughness_map",
        ROUGHNESS_SIZE,
        wgpu::TextureFormat::Rgba8Unorm,
        &pixels,
    )
}

/// 1x1 black texture bound as `t_diffuse` until the first reflection is saved.
pub fn create_placeholder_texture(device: &wgpu::Device, queue: &wgpu::Queue) -> wgpu::TextureView {
    upload_rgba(
        device,
        queue,
        "reflection_placeholder",
        1,
        wgpu::TextureFormat::Rgba8Unorm,
        &[0, 0, 0, 255],
    )
}

/// Repeating linear sampler for the tiled floor maps.
pub fn create_repeat_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("material_sampler"),
        address_mode_u: wgpu::AddressMode::Repeat,
        address_mode_v: wgpu::AddressMode::Repeat,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

/// Clamped linear sampler for render targets.
pub fn create_clamp_sampler(device: &wgpu::Device) -> wgpu::Sampler {
    device.create_sampler(&wgpu::SamplerDescriptor {
        label: Some("target_sampler"),
        address_mode_u: wgpu::AddressMode::ClampToEdge,
        address_mode_v: wgpu::AddressMode::ClampToEdge,
        mag_filter: wgpu::FilterMode::Linear,
        min_filter: wgpu::FilterMode::Linear,
        ..Default::default()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roughness_map_size_and_range() {
        let pixels = roughness_pixels(32);
        assert_eq!(pixels.len(), 32 * 32 * 4);
        for px in pixels.chunks(4) {
            assert!((38..=153).contains(&px[0]), "r = {}", px[0]);
            assert!(px[1] >= 152);
            assert_eq!(px[3], 255);
        }
    }

    #[test]
    fn noise_tiles_seamlessly() {
        let size = 64;
        for y in [0, 17, 40] {
            let first = value_noise(0, y, size, 4, 1);
            let wrapped = value_noise(size, y, size, 4, 1);
            assert!((first - wrapped).abs() < 1e-6);
        }
    }

    #[test]
    fn noise_is_deterministic() {
        assert_eq!(roughness_pixels(16), roughness_pixels(16));
    }
}
