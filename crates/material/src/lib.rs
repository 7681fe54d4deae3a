//! Floor material: a physically based WGSL shader and the patch that makes it reflective.
//!
//! The patch is a pure function applied once when the material is created.
//! Per frame only [`ReflectorUniforms`] change.

mod patch;
mod shaders;
mod uniforms;

pub use patch::{patch_shader, MaterialDescriptor, ReflectorBindings, ShaderPatchError};
pub use shaders::{
    CAMERA_WGSL, HOOK_MAP_FRAGMENT, HOOK_PROJECT_VERTEX, HOOK_VARYINGS, PHYSICAL_WGSL,
};
pub use uniforms::{ReflectorGpuUniforms, ReflectorUniforms, TargetId};
