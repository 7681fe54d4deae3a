use mirrorfloor_material::CAMERA_WGSL;

/// Instanced pillars and orbs. Lit like the floor material, without maps.
const SCENE_WGSL: &str = r#"
const LIGHT_POSITION: vec3<f32> = vec3<f32>(20.0, 20.0, 10.0);
const LIGHT_INTENSITY: f32 = 4.0;
const AMBIENT: f32 = 0.3;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
    @location(7) color: vec4<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) color: vec4<f32>,
};

@vertex
fn vs_main(vertex: VertexInput, instance: InstanceInput) -> VertexOutput {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    let world_pos = model * vec4<f32>(vertex.position, 1.0);

    var out: VertexOutput;
    out.clip_position = camera.view_proj * world_pos;
    out.world_position = world_pos.xyz;
    out.world_normal = normalize((model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.color = instance.color;
    return out;
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    let n = normalize(in.world_normal);
    let l = normalize(LIGHT_POSITION - in.world_position);
    let diffuse = max(dot(n, l), 0.0) * LIGHT_INTENSITY / 3.14159265;
    var color = in.color.rgb * (AMBIENT + diffuse);

    let view_distance = length(camera.position.xyz - in.world_position);
    let fog = smoothstep(camera.fog_range.x, camera.fog_range.y, view_distance);
    color = mix(color, camera.fog_color.rgb, fog);
    return vec4<f32>(color, in.color.a);
}
"#;

/// Depth-only variant of the scene shader for the mirror depth target.
const DEPTH_WGSL: &str = r#"
struct InstanceInput {
    @location(3) model_0: vec4<f32>,
    @location(4) model_1: vec4<f32>,
    @location(5) model_2: vec4<f32>,
    @location(6) model_3: vec4<f32>,
};

@vertex
fn vs_depth(@location(0) position: vec3<f32>, instance: InstanceInput) -> @builtin(position) vec4<f32> {
    let model = mat4x4<f32>(
        instance.model_0,
        instance.model_1,
        instance.model_2,
        instance.model_3,
    );
    return camera.view_proj * model * vec4<f32>(position, 1.0);
}
"#;

/// Separable 9-tap gaussian over a fullscreen triangle.
pub const BLUR_WGSL: &str = r#"
struct BlurParams {
    // xy = direction in texels, z = radius
    direction: vec4<f32>,
};

@group(0) @binding(0)
var source: texture_2d<f32>;
@group(0) @binding(1)
var source_sampler: sampler;
@group(0) @binding(2)
var<uniform> params: BlurParams;

struct FullscreenOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) uv: vec2<f32>,
};

@vertex
fn vs_fullscreen(@builtin(vertex_index) index: u32) -> FullscreenOutput {
    let x = f32((index << 1u) & 2u);
    let y = f32(index & 2u);
    var out: FullscreenOutput;
    out.clip_position = vec4<f32>(x * 2.0 - 1.0, 1.0 - y * 2.0, 0.0, 1.0);
    out.uv = vec2<f32>(x, y);
    return out;
}

@fragment
fn fs_blur(in: FullscreenOutput) -> @location(0) vec4<f32> {
    var weights = array<f32, 5>(0.2270270, 0.1945946, 0.1216216, 0.0540541, 0.0162162);
    let texel = 1.0 / vec2<f32>(textureDimensions(source));
    let stride = params.direction.xy * texel * params.direction.z;

    var color = textureSample(source, source_sampler, in.uv) * weights[0];
    for (var i = 1; i < 5; i = i + 1) {
        let offset = stride * f32(i);
        color += textureSample(source, source_sampler, in.uv + offset) * weights[i];
        color += textureSample(source, source_sampler, in.uv - offset) * weights[i];
    }
    return color;
}
"#;

pub fn scene_shader() -> String {
    format!("{CAMERA_WGSL}{SCENE_WGSL}")
}

pub fn depth_shader() -> String {
    format!("{CAMERA_WGSL}{DEPTH_WGSL}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shaders_share_camera_block() {
        for source in [scene_shader(), depth_shader()] {
            assert!(source.contains("var<uniform> camera: Camera;"));
        }
        assert!(scene_shader().contains("fn vs_main"));
        assert!(depth_shader().contains("fn vs_depth"));
        assert!(!depth_shader().contains("@fragment"));
    }

    #[test]
    fn blur_kernel_weights_sum_to_one() {
        let weights = [0.2270270_f32, 0.1945946, 0.1216216, 0.0540541, 0.0162162];
        let sum = weights[0] + 2.0 * weights[1..].iter().sum::<f32>();
        assert!((sum - 1.0).abs() < 1e-4);
        assert!(BLUR_WGSL.contains("0.2270270, 0.1945946, 0.1216216, 0.0540541, 0.0162162"));
    }
}
