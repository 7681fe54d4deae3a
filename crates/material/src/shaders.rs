/// Camera block shared by every scene shader (bind group 0).
pub const CAMERA_WGSL: &str = r#"
struct Camera {
    view_proj: mat4x4<f32>,
    position: vec4<f32>,
    fog_color: vec4<f32>,
    // x = fog near, y = fog far
    fog_range: vec4<f32>,
};

@group(0) @binding(0)
var<uniform> camera: Camera;
"#;

/// Physically based material with patch hooks.
///
/// Hooks are line comments of the form `// #include <name>`; patches insert
/// code directly after them.
pub const PHYSICAL_WGSL: &str = r#"
const PI: f32 = 3.14159265;
const LIGHT_POSITION: vec3<f32> = vec3<f32>(20.0, 20.0, 10.0);
const LIGHT_INTENSITY: f32 = 4.0;
const AMBIENT: f32 = 0.3;

struct Physical {
    model: mat4x4<f32>,
    base_color: vec4<f32>,
    // x = metalness, y = roughness, z = uv repeat
    params: vec4<f32>,
};

@group(1) @binding(0)
var<uniform> material: Physical;
@group(1) @binding(1)
var roughness_map: texture_2d<f32>;
@group(1) @binding(2)
var material_sampler: sampler;

struct VertexInput {
    @location(0) position: vec3<f32>,
    @location(1) normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
};

struct VertexOutput {
    @builtin(position) clip_position: vec4<f32>,
    @location(0) world_position: vec3<f32>,
    @location(1) world_normal: vec3<f32>,
    @location(2) uv: vec2<f32>,
    // #include <varyings>
};

@vertex
fn vs_main(vertex: VertexInput) -> VertexOutput {
    let world_pos = material.model * vec4<f32>(vertex.position, 1.0);
    var out: VertexOutput;
    out.clip_position = camera.view_proj * world_pos;
    out.world_position = world_pos.xyz;
    out.world_normal = normalize((material.model * vec4<f32>(vertex.normal, 0.0)).xyz);
    out.uv = vertex.uv * material.params.z;
    // #include <project_vertex>
    return out;
}

fn distribution_ggx(n_dot_h: f32, roughness: f32) -> f32 {
    let a = roughness * roughness;
    let a2 = a * a;
    let d = n_dot_h * n_dot_h * (a2 - 1.0) + 1.0;
    return a2 / (PI * d * d);
}

@fragment
fn fs_main(in: VertexOutput) -> @location(0) vec4<f32> {
    var diffuse_color = material.base_color;
    // #include <map_fragment>
    let texel_roughness = textureSample(roughness_map, material_sampler, in.uv);
    let metalness = material.params.x;
    let roughness = clamp(material.params.y * texel_roughness.g, 0.04, 1.0);

    let n = normalize(in.world_normal);
    let v = normalize(camera.position.xyz - in.world_position);
    let l = normalize(LIGHT_POSITION - in.world_position);
    let h = normalize(v + l);
    let n_dot_l = max(dot(n, l), 0.0);
    let n_dot_h = max(dot(n, h), 0.0);
    let v_dot_h = max(dot(v, h), 0.0);

    let f0 = mix(vec3<f32>(0.04), diffuse_color.rgb, metalness);
    let fresnel = f0 + (vec3<f32>(1.0) - f0) * pow(1.0 - v_dot_h, 5.0);
    let specular = fresnel * distribution_ggx(n_dot_h, roughness) * 0.25;
    let diffuse = diffuse_color.rgb * (1.0 - metalness) / PI;
    var color = diffuse_color.rgb * AMBIENT + (diffuse + specular) * n_dot_l * LIGHT_INTENSITY;

    let view_distance = length(camera.position.xyz - in.world_position);
    let fog = smoothstep(camera.fog_range.x, camera.fog_range.y, view_distance);
    color = mix(color, camera.fog_color.rgb, fog);
    return vec4<f32>(color, diffuse_color.a);
}
"#;

pub const HOOK_VARYINGS: &str = "// #include <varyings>";
pub const HOOK_PROJECT_VERTEX: &str = "// #include <project_vertex>";
pub const HOOK_MAP_FRAGMENT: &str = "// #include <map_fragment>";

/// Marker written at the top of a patched source.
pub(crate) const REFLECTOR_MARKER: &str = "// reflector patch";

/// Reflector bindings; `{group}` is substituted by the patch.
pub(crate) const REFLECTOR_DECLARATIONS: &str = r#"
struct ReflectorUniforms {
    texture_matrix: mat4x4<f32>,
    // rgb = tint, a = intensity
    color: vec4<f32>,
};

@group({group}) @binding(0)
var<uniform> reflector: ReflectorUniforms;
@group({group}) @binding(1)
var t_diffuse: texture_2d<f32>;
@group({group}) @binding(2)
var t_diffuse_sampler: sampler;
"#;

pub(crate) const REFLECTOR_VARYING: &str = "    @location({location}) reflect_uv: vec4<f32>,";

pub(crate) const REFLECTOR_PROJECT_VERTEX: &str =
    "    out.reflect_uv = reflector.texture_matrix * world_pos;";

pub(crate) const REFLECTOR_MAP_FRAGMENT: &str = r#"    let reflection = textureSample(t_diffuse, t_diffuse_sampler, in.reflect_uv.xy / in.reflect_uv.w);
    let reflect_roughness = textureSample(roughness_map, material_sampler, in.uv).r;
    let reflect_weight = (1.0 - reflect_roughness) * reflector.color.a;
    diffuse_color = vec4<f32>(
        diffuse_color.rgb + reflection.rgb * reflector.color.rgb * reflect_weight,
        diffuse_color.a,
    );"#;
