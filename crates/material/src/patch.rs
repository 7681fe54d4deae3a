use crate::shaders::{
    CAMERA_WGSL, HOOK_MAP_FRAGMENT, HOOK_PROJECT_VERTEX, HOOK_VARYINGS, PHYSICAL_WGSL,
    REFLECTOR_DECLARATIONS, REFLECTOR_MAP_FRAGMENT, REFLECTOR_MARKER, REFLECTOR_PROJECT_VERTEX,
    REFLECTOR_VARYING,
};

/// Errors from patching a material shader.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ShaderPatchError {
    #[error("hook `{hook}` not found in shader `{label}`")]
    MissingHook { hook: &'static str, label: String },
    #[error("shader `{label}` does not declare `{symbol}`")]
    MissingSymbol { symbol: &'static str, label: String },
    #[error("shader `{0}` is already patched")]
    AlreadyPatched(String),
    #[error("bind group {group} is already used by shader `{label}`")]
    GroupInUse { group: u32, label: String },
}

/// A material's WGSL source plus the layout facts a patch needs.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDescriptor {
    pub label: String,
    pub source: String,
    /// Bind groups used by the shader, numbered from 0.
    pub bind_group_count: u32,
    /// First vertex-output location the shader leaves free.
    pub next_location: u32,
    /// Uniforms added by patches, in the order they were injected.
    pub uniforms: Vec<&'static str>,
}

impl MaterialDescriptor {
    /// The unpatched physically based material.
    pub fn physical() -> Self {
        Self {
            label: "physical".into(),
            source: format!("{CAMERA_WGSL}{PHYSICAL_WGSL}"),
            bind_group_count: 2,
            next_location: 3,
            uniforms: Vec::new(),
        }
    }
}

/// Where the reflector's uniforms are bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReflectorBindings {
    pub group: u32,
}

impl ReflectorBindings {
    /// The first bind group `base` leaves free.
    pub fn after(base: &MaterialDescriptor) -> Self {
        Self {
            group: base.bind_group_count,
        }
    }
}

const REQUIRED_SYMBOLS: [&str; 5] = [
    "world_pos",
    "diffuse_color",
    "roughness_map",
    "material_sampler",
    "uv",
];

/// Inject planar-reflection sampling into `base`.
///
/// Adds `texture_matrix` and `t_diffuse` on `bindings.group`, a projective
/// varying at `base.next_location`, and blends the sampled reflection into
/// the diffuse color scaled by `1 - roughness`. The rest of the lighting is
/// left as is. Applied once, when the material is created.
pub fn patch_shader(
    base: &MaterialDescriptor,
    bindings: &ReflectorBindings,
) -> Result<MaterialDescriptor, ShaderPatchError> {
    if base.source.contains(REFLECTOR_MARKER) {
        return Err(ShaderPatchError::AlreadyPatched(base.label.clone()));
    }
    if bindings.group < base.bind_group_count {
        return Err(ShaderPatchError::GroupInUse {
            group: bindings.group,
            label: base.label.clone(),
        });
    }
    for symbol in REQUIRED_SYMBOLS {
        if !base.source.contains(symbol) {
            return Err(ShaderPatchError::MissingSymbol {
                symbol,
                label: base.label.clone(),
            });
        }
    }

    let location = base.next_location;
    let varying = REFLECTOR_VARYING.replace("{location}", &location.to_string());
    let declarations = REFLECTOR_DECLARATIONS.replace("{group}", &bindings.group.to_string());

    let source = inject_after(&base.source, HOOK_VARYINGS, &varying, &base.label)?;
    let source = inject_after(&source, HOOK_PROJECT_VERTEX, REFLECTOR_PROJECT_VERTEX, &base.label)?;
    let source = inject_after(&source, HOOK_MAP_FRAGMENT, REFLECTOR_MAP_FRAGMENT, &base.label)?;

    let mut uniforms = base.uniforms.clone();
    uniforms.extend(["t_diffuse", "texture_matrix"]);

    tracing::debug!(
        "patched shader `{}`: reflector on group {}, varying at location {}",
        base.label,
        bindings.group,
        location
    );

    Ok(MaterialDescriptor {
        label: format!("{}+reflector", base.label),
        source: format!("{REFLECTOR_MARKER}\n{declarations}{source}"),
        bind_group_count: bindings.group + 1,
        next_location: location + 1,
        uniforms,
    })
}

fn inject_after(
    source: &str,
    hook: &'static str,
    code: &str,
    label: &str,
) -> Result<String, ShaderPatchError> {
    if !source.contains(hook) {
        return Err(ShaderPatchError::MissingHook {
            hook,
            label: label.to_string(),
        });
    }
    Ok(source.replacen(hook, &format!("{hook}\n{code}"), 1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patched() -> MaterialDescriptor {
        let base = MaterialDescriptor::physical();
        patch_shader(&base, &ReflectorBindings::after(&base)).unwrap()
    }

    #[test]
    fn patch_adds_uniforms_and_group() {
        let out = patched();
        assert_eq!(out.uniforms, vec!["t_diffuse", "texture_matrix"]);
        assert_eq!(out.bind_group_count, 3);
        assert_eq!(out.next_location, 4);
        assert_eq!(out.label, "physical+reflector");
        assert!(out.source.contains("@group(2) @binding(0)"));
        assert!(out.source.contains("var t_diffuse: texture_2d<f32>;"));
        assert!(out.source.contains("@location(3) reflect_uv: vec4<f32>,"));
    }

    #[test]
    fn injected_code_follows_hooks() {
        let out = patched();
        let src = &out.source;
        let hook = src.find(HOOK_PROJECT_VERTEX).unwrap();
        let code = src.find("out.reflect_uv = reflector.texture_matrix").unwrap();
        let ret = src[hook..].find("return out;").unwrap() + hook;
        assert!(hook < code && code < ret);

        let map = src.find(HOOK_MAP_FRAGMENT).unwrap();
        let blend = src.find("reflection.rgb * reflector.color.rgb * reflect_weight").unwrap();
        let lighting = src.find("let texel_roughness").unwrap();
        assert!(map < blend && blend < lighting);
    }

    #[test]
    fn blend_is_attenuated_by_roughness() {
        let out = patched();
        assert!(out.source.contains("(1.0 - reflect_roughness)"));
    }

    #[test]
    fn base_lighting_is_untouched() {
        let base = MaterialDescriptor::physical();
        let out = patched();
        for line in base.source.lines() {
            assert!(out.source.contains(line), "lost line: {line}");
        }
    }

    #[test]
    fn double_patch_rejected() {
        let once = patched();
        let err = patch_shader(&once, &ReflectorBindings::after(&once)).unwrap_err();
        assert!(matches!(err, ShaderPatchError::AlreadyPatched(_)));
    }

    #[test]
    fn missing_hook_rejected() {
        let mut base = MaterialDescriptor::physical();
        base.source = base.source.replace(HOOK_MAP_FRAGMENT, "");
        let err = patch_shader(&base, &ReflectorBindings::after(&base)).unwrap_err();
        assert_eq!(
            err,
            ShaderPatchError::MissingHook {
                hook: HOOK_MAP_FRAGMENT,
                label: "physical".into(),
            }
        );
    }

    #[test]
    fn occupied_group_rejected() {
        let base = MaterialDescriptor::physical();
        let err = patch_shader(&base, &ReflectorBindings { group: 1 }).unwrap_err();
        assert!(matches!(err, ShaderPatchError::GroupInUse { group: 1, .. }));
    }

    #[test]
    fn base_without_roughness_map_rejected() {
        let mut base = MaterialDescriptor::physical();
        base.source = base.source.replace("roughness_map", "gloss_map");
        let err = patch_shader(&base, &ReflectorBindings::after(&base)).unwrap_err();
        assert!(matches!(
            err,
            ShaderPatchError::MissingSymbol {
                symbol: "roughness_map",
                ..
            }
        ));
    }

    #[test]
    fn patch_is_pure() {
        let base = MaterialDescriptor::physical();
        let copy = base.clone();
        let a = patch_shader(&base, &ReflectorBindings::after(&base)).unwrap();
        let b = patch_shader(&base, &ReflectorBindings::after(&base)).unwrap();
        assert_eq!(a, b);
        assert_eq!(base, copy);
    }
}
