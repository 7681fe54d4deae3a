use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};
use mirrorfloor_reflect::TextureMatrix;

/// Reference to the render target the floor samples its reflection from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TargetId(pub u64);

/// Per-frame values of the reflector material.
///
/// Written only after a frame's save pass completes; read by the main pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectorUniforms {
    pub t_diffuse: Option<TargetId>,
    pub texture_matrix: TextureMatrix,
    pub color: Vec3,
    pub intensity: f32,
}

impl Default for ReflectorUniforms {
    fn default() -> Self {
        Self {
            t_diffuse: None,
            texture_matrix: TextureMatrix::default(),
            color: Vec3::ONE,
            intensity: 0.1,
        }
    }
}

impl ReflectorUniforms {
    pub fn new(color: Vec3, intensity: f32) -> Self {
        Self {
            color,
            intensity,
            ..Self::default()
        }
    }

    /// Reflection added to the diffuse color at a texel with the given roughness.
    pub fn contribution(&self, reflection: Vec3, roughness: f32) -> Vec3 {
        reflection * self.color * (1.0 - roughness) * self.intensity
    }

    /// CPU mirror of the patched fragment's blend.
    pub fn blend(&self, diffuse: Vec4, reflection: Vec3, roughness: f32) -> Vec4 {
        (diffuse.truncate() + self.contribution(reflection, roughness)).extend(diffuse.w)
    }

    pub fn to_gpu(&self) -> ReflectorGpuUniforms {
        ReflectorGpuUniforms {
            texture_matrix: self.texture_matrix.to_cols_array_2d(),
            color: self.color.extend(self.intensity).to_array(),
        }
    }
}

/// GPU layout of the reflector uniform block (`ReflectorUniforms` in WGSL).
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct ReflectorGpuUniforms {
    pub texture_matrix: [[f32; 4]; 4],
    pub color: [f32; 4],
}
