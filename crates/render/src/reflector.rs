use crate::pass::{BlurSettings, Pass};
use crate::pipeline::{PassPipeline, PipelineError};
use mirrorfloor_common::{ReflectorConfig, Transform};
use mirrorfloor_material::ReflectorUniforms;
use mirrorfloor_reflect::{PlaneError, ReflectionState, ReflectivePlane};

/// A reflective surface: plane, material uniforms and pass settings.
#[derive(Debug, Clone)]
pub struct Reflector {
    plane: ReflectivePlane,
    clip_bias: f32,
    uniforms: ReflectorUniforms,
    blur: BlurSettings,
    depth_pass: bool,
}

impl Reflector {
    pub fn new(config: &ReflectorConfig, plane: ReflectivePlane) -> Self {
        Self {
            plane,
            clip_bias: config.clip_bias,
            uniforms: ReflectorUniforms::new(config.color_rgb(), config.intensity),
            blur: config.blur.into(),
            depth_pass: config.depth_pass,
        }
    }

    /// Plane through `transform`, facing its local +Z, with render targets
    /// sized from `config`.
    pub fn from_transform(config: &ReflectorConfig, transform: &Transform) -> Result<Self, PlaneError> {
        let plane = ReflectivePlane::from_transform(transform, config.texture_width, config.texture_height)?;
        Ok(Self::new(config, plane))
    }

    pub fn plane(&self) -> &ReflectivePlane {
        &self.plane
    }

    pub fn uniforms(&self) -> &ReflectorUniforms {
        &self.uniforms
    }

    /// Break the reflector into its passes, wrapping the caller's hooks.
    pub fn split<S>(
        self,
        before: impl FnMut(&mut S) + 'static,
        after: impl FnMut(&mut S) + 'static,
    ) -> ReflectorParts<S> {
        ReflectorParts {
            plane: self.plane,
            clip_bias: self.clip_bias,
            uniforms: self.uniforms,
            before: Pass::before(before),
            render: Pass::Reflection,
            depth: self.depth_pass.then_some(Pass::Depth),
            blur: Pass::Blur(self.blur),
            save: Pass::Save,
            after: Pass::after(after),
        }
    }
}

/// Pieces of a [`Reflector`]. The caller owns `uniforms` and feeds it to the
/// floor material; the passes go into a [`PassPipeline`].
#[derive(Debug)]
pub struct ReflectorParts<S> {
    pub plane: ReflectivePlane,
    pub clip_bias: f32,
    pub uniforms: ReflectorUniforms,
    pub before: Pass<S>,
    pub render: Pass<S>,
    pub depth: Option<Pass<S>>,
    pub blur: Pass<S>,
    pub save: Pass<S>,
    pub after: Pass<S>,
}

impl<S> ReflectorParts<S> {
    pub fn into_pipeline(self) -> Result<(PassPipeline<S>, ReflectorUniforms), PipelineError> {
        let mut passes = vec![self.before, self.render];
        passes.extend(self.depth);
        passes.extend([self.blur, self.save, self.after]);
        let pipeline = PassPipeline::new(passes, ReflectionState::new(self.plane, self.clip_bias))?;
        tracing::info!(passes = ?pipeline.kinds(), "reflection pipeline assembled");
        Ok((pipeline, self.uniforms))
    }
}
