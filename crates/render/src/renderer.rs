use crate::pass::{BlurSettings, PassKind};
use crate::scene::Scene;
use mirrorfloor_material::TargetId;
use mirrorfloor_reflect::MirrorCamera;

/// Backend that records the GPU passes of a reflection frame.
///
/// The dispatcher calls these in pipeline order. An error aborts the rest of
/// the frame's GPU passes; the hooks still run.
pub trait PassExecutor<S> {
    type Error: std::error::Error;

    /// Render `scene` from the mirror camera into the reflection color target.
    fn reflection(&mut self, scene: &S, mirror: &MirrorCamera) -> Result<(), Self::Error>;

    /// Render mirror-view depth into the depth target.
    fn depth(&mut self, scene: &S, mirror: &MirrorCamera) -> Result<(), Self::Error>;

    /// Soften the reflection color target.
    fn blur(&mut self, settings: &BlurSettings) -> Result<(), Self::Error>;

    /// Copy the finished reflection into the target the floor samples.
    fn save(&mut self) -> Result<TargetId, Self::Error>;
}

/// Errors produced by [`DebugExecutor`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DebugError {
    #[error("injected failure in {0} pass")]
    Injected(PassKind),
}

/// Text executor: records what each pass would draw.
///
/// Useful for CLI output, logging, and exercising the pipeline without a GPU.
#[derive(Debug, Default)]
pub struct DebugExecutor {
    trace: Vec<String>,
    fail_on: Option<PassKind>,
    saves: u64,
}

impl DebugExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every call of `kind` fail, as a missing render target would.
    pub fn fail_on(&mut self, kind: Option<PassKind>) {
        self.fail_on = kind;
    }

    pub fn trace(&self) -> &[String] {
        &self.trace
    }

    pub fn take_trace(&mut self) -> Vec<String> {
        std::mem::take(&mut self.trace)
    }

    fn check(&self, kind: PassKind) -> Result<(), DebugError> {
        if self.fail_on == Some(kind) {
            return Err(DebugError::Injected(kind));
        }
        Ok(())
    }
}

impl PassExecutor<Scene> for DebugExecutor {
    type Error = DebugError;

    fn reflection(&mut self, scene: &Scene, mirror: &MirrorCamera) -> Result<(), DebugError> {
        self.check(PassKind::Reflection)?;
        let p = mirror.position;
        self.trace.push(format!(
            "reflection: {} drawables from ({:.2}, {:.2}, {:.2})",
            scene.visible().count(),
            p.x,
            p.y,
            p.z
        ));
        Ok(())
    }

    fn depth(&mut self, scene: &Scene, _mirror: &MirrorCamera) -> Result<(), DebugError> {
        self.check(PassKind::Depth)?;
        self.trace
            .push(format!("depth: {} drawables", scene.visible().count()));
        Ok(())
    }

    fn blur(&mut self, settings: &BlurSettings) -> Result<(), DebugError> {
        self.check(PassKind::Blur)?;
        if settings.is_noop() {
            self.trace.push("blur: skipped".into());
        } else {
            self.trace.push(format!(
                "blur: radius={:.1} iterations={}",
                settings.radius, settings.iterations
            ));
        }
        Ok(())
    }

    fn save(&mut self) -> Result<TargetId, DebugError> {
        self.check(PassKind::Save)?;
        self.saves += 1;
        self.trace.push(format!("save: #{}", self.saves));
        Ok(TargetId(0))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::DemoScene;
    use glam::{Mat4, Vec3};

    fn mirror() -> MirrorCamera {
        MirrorCamera {
            position: Vec3::new(0.0, -3.0, 5.0),
            view: Mat4::IDENTITY,
            projection: Mat4::IDENTITY,
        }
    }

    #[test]
    fn debug_executor_records_passes() {
        let demo = DemoScene::new();
        let mut exec = DebugExecutor::new();
        exec.reflection(&demo.scene, &mirror()).unwrap();
        exec.blur(&BlurSettings::default()).unwrap();
        assert_eq!(exec.save().unwrap(), TargetId(0));

        let trace = exec.trace();
        assert_eq!(trace.len(), 3);
        assert!(trace[0].contains("7 drawables"));
        assert!(trace[0].contains("(0.00, -3.00, 5.00)"));
        assert!(trace[2].contains("#1"));
    }

    #[test]
    fn injected_failure() {
        let demo = DemoScene::new();
        let mut exec = DebugExecutor::new();
        exec.fail_on(Some(PassKind::Depth));
        let err = exec.depth(&demo.scene, &mirror()).unwrap_err();
        assert_eq!(err, DebugError::Injected(PassKind::Depth));
        assert!(exec.trace().is_empty());
    }
}
