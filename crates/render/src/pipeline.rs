use crate::pass::{BlurSettings, Pass, PassKind};
use crate::renderer::PassExecutor;
use mirrorfloor_material::ReflectorUniforms;
use mirrorfloor_reflect::{CameraState, ReflectionState, SkipReason};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PipelineError {
    #[error("{pass} pass cannot follow {after} pass")]
    OutOfOrder { pass: PassKind, after: PassKind },
    #[error("{0} pass appears more than once")]
    Duplicate(PassKind),
    #[error("pipeline has no {0} pass")]
    Missing(PassKind),
}

/// How a frame ended.
#[derive(Debug, Clone, PartialEq)]
pub enum FrameOutcome {
    /// All GPU passes ran and the uniforms were updated.
    Rendered,
    /// No usable mirror camera this frame; GPU passes did not run.
    Skipped(SkipReason),
    /// A GPU pass failed; later GPU passes were dropped and the uniforms kept.
    Degraded { pass: PassKind, error: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct FrameReport {
    pub frame: u64,
    pub outcome: FrameOutcome,
    /// Passes that ran to completion, in order.
    pub executed: Vec<PassKind>,
}

/// Ordered reflection passes plus the state carried between frames.
pub struct PassPipeline<S> {
    passes: Vec<Pass<S>>,
    state: ReflectionState,
    frame: u64,
}

impl<S> PassPipeline<S> {
    /// Validate `passes` against the fixed execution order.
    ///
    /// Hooks, depth and blur are optional; reflection and save are not.
    pub fn new(passes: Vec<Pass<S>>, state: ReflectionState) -> Result<Self, PipelineError> {
        let mut prev: Option<PassKind> = None;
        for pass in &passes {
            let kind = pass.kind();
            if let Some(after) = prev {
                if kind == after {
                    return Err(PipelineError::Duplicate(kind));
                }
                if kind < after {
                    return Err(PipelineError::OutOfOrder { pass: kind, after });
                }
            }
            prev = Some(kind);
        }
        for required in [PassKind::Reflection, PassKind::Save] {
            if !passes.iter().any(|p| p.kind() == required) {
                return Err(PipelineError::Missing(required));
            }
        }
        Ok(Self {
            passes,
            state,
            frame: 0,
        })
    }

    pub fn kinds(&self) -> Vec<PassKind> {
        self.passes.iter().map(Pass::kind).collect()
    }

    pub fn state(&self) -> &ReflectionState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ReflectionState {
        &mut self.state
    }

    pub fn blur_settings_mut(&mut self) -> Option<&mut BlurSettings> {
        self.passes.iter_mut().find_map(|p| match p {
            Pass::Blur(settings) => Some(settings),
            _ => None,
        })
    }

    /// Frames run so far.
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run every pass once for `camera`.
    ///
    /// Hooks always run. `uniforms` is written only when the save pass
    /// succeeds, so it never pairs a new matrix with an old texture.
    pub fn run_frame<E: PassExecutor<S>>(
        &mut self,
        camera: &CameraState,
        scene: &mut S,
        executor: &mut E,
        uniforms: &mut ReflectorUniforms,
    ) -> FrameReport {
        self.frame += 1;
        let frame = self.frame;
        let _span = tracing::debug_span!("reflection_frame", frame).entered();

        let update = self.state.advance(camera);
        let mut executed = Vec::with_capacity(self.passes.len());
        let mut failure: Option<(PassKind, String)> = None;

        for pass in &mut self.passes {
            let kind = pass.kind();
            let result = match (pass, &update) {
                (Pass::BeforeHook(hook) | Pass::AfterHook(hook), _) => {
                    hook(&mut *scene);
                    executed.push(kind);
                    continue;
                }
                (_, Err(_)) => continue,
                _ if failure.is_some() => continue,
                (Pass::Reflection, Ok(up)) => executor.reflection(scene, &up.mirror).map(|()| None),
                (Pass::Depth, Ok(up)) => executor.depth(scene, &up.mirror).map(|()| None),
                (Pass::Blur(settings), Ok(_)) => executor.blur(settings).map(|()| None),
                (Pass::Save, Ok(_)) => executor.save().map(Some),
            };
            match result {
                Ok(saved) => {
                    if let (Some(target), Ok(up)) = (saved, &update) {
                        uniforms.texture_matrix = up.texture_matrix;
                        uniforms.t_diffuse = Some(target);
                    }
                    executed.push(kind);
                }
                Err(err) => {
                    tracing::warn!(frame, pass = %kind, "reflection pass failed: {err}");
                    failure = Some((kind, err.to_string()));
                }
            }
        }

        let outcome = match (update, failure) {
            (Err(reason), _) => FrameOutcome::Skipped(reason),
            (Ok(_), Some((pass, error))) => FrameOutcome::Degraded { pass, error },
            (Ok(_), None) => FrameOutcome::Rendered,
        };
        tracing::debug!(frame, ?outcome, passes = executed.len(), "reflection frame done");
        FrameReport {
            frame,
            outcome,
            executed,
        }
    }
}

impl<S> std::fmt::Debug for PassPipeline<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PassPipeline")
            .field("passes", &self.passes)
            .field("frame", &self.frame)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::{DebugError, DebugExecutor};
    use crate::scene::{DemoScene, Scene};
    use glam::{Mat4, Vec3};
    use mirrorfloor_material::TargetId;
    use mirrorfloor_reflect::{MirrorCamera, ReflectivePlane, TextureMatrix};

    fn state() -> ReflectionState {
        let plane = ReflectivePlane::new(Vec3::new(0.0, -1.5, -5.0), Vec3::Y, 512, 512).unwrap();
        ReflectionState::new(plane, 0.0)
    }

    fn camera(eye: Vec3) -> CameraState {
        let proj = Mat4::perspective_rh(75.0_f32.to_radians(), 16.0 / 9.0, 0.1, 100.0);
        CameraState::look_at(eye, Vec3::ZERO, proj)
    }

    fn full_pipeline(demo: &DemoScene) -> PassPipeline<Scene> {
        let floor = demo.floor;
        PassPipeline::new(
            vec![
                Pass::before(move |s: &mut Scene| {
                    s.set_visible(floor, false);
                }),
                Pass::Reflection,
                Pass::Depth,
                Pass::Blur(BlurSettings::default()),
                Pass::Save,
                Pass::after(move |s: &mut Scene| {
                    s.set_visible(floor, true);
                }),
            ],
            state(),
        )
        .unwrap()
    }

    #[test]
    fn rejects_out_of_order() {
        let err = PassPipeline::<()>::new(
            vec![Pass::Reflection, Pass::Save, Pass::Blur(BlurSettings::default())],
            state(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            PipelineError::OutOfOrder {
                pass: PassKind::Blur,
                after: PassKind::Save
            }
        );
    }

    #[test]
    fn rejects_duplicates_and_missing() {
        let dup = PassPipeline::<()>::new(vec![Pass::Reflection, Pass::Reflection, Pass::Save], state());
        assert_eq!(dup.unwrap_err(), PipelineError::Duplicate(PassKind::Reflection));

        let missing = PassPipeline::<()>::new(vec![Pass::Reflection, Pass::Depth], state());
        assert_eq!(missing.unwrap_err(), PipelineError::Missing(PassKind::Save));

        let minimal = PassPipeline::<()>::new(vec![Pass::Reflection, Pass::Save], state()).unwrap();
        assert_eq!(minimal.kinds(), vec![PassKind::Reflection, PassKind::Save]);
    }

    #[test]
    fn rendered_frame_commits_uniforms_after_save() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        let mut uniforms = ReflectorUniforms::default();

        let report = pipeline.run_frame(&camera(Vec3::new(0.0, 0.0, 5.0)), &mut demo.scene, &mut exec, &mut uniforms);
        assert_eq!(report.outcome, FrameOutcome::Rendered);
        assert_eq!(report.executed, PassKind::ORDER);
        assert_eq!(uniforms.t_diffuse, Some(TargetId(0)));
        assert_eq!(
            Some(&uniforms.texture_matrix),
            pipeline.state().last().map(|u| &u.texture_matrix)
        );
        let trace = exec.trace();
        assert!(trace[0].starts_with("reflection: 6 drawables"));
        assert!(trace[3].starts_with("save"));
    }

    #[test]
    fn hooks_restore_visibility_on_degraded_frame() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        exec.fail_on(Some(PassKind::Blur));
        let mut uniforms = ReflectorUniforms::default();

        let report = pipeline.run_frame(&camera(Vec3::new(0.0, 0.0, 5.0)), &mut demo.scene, &mut exec, &mut uniforms);
        assert_eq!(
            report.outcome,
            FrameOutcome::Degraded {
                pass: PassKind::Blur,
                error: DebugError::Injected(PassKind::Blur).to_string(),
            }
        );
        assert_eq!(
            report.executed,
            vec![
                PassKind::BeforeHook,
                PassKind::Reflection,
                PassKind::Depth,
                PassKind::AfterHook
            ]
        );
        assert!(demo.scene.is_visible(demo.floor));
    }

    #[test]
    fn degraded_frame_keeps_stale_uniforms() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        let mut uniforms = ReflectorUniforms::default();

        pipeline.run_frame(&camera(Vec3::new(0.0, 0.0, 5.0)), &mut demo.scene, &mut exec, &mut uniforms);
        let committed = uniforms;

        exec.fail_on(Some(PassKind::Save));
        let report = pipeline.run_frame(&camera(Vec3::new(3.0, 1.0, 5.0)), &mut demo.scene, &mut exec, &mut uniforms);
        assert!(matches!(report.outcome, FrameOutcome::Degraded { pass: PassKind::Save, .. }));
        assert_eq!(uniforms, committed);
        assert_ne!(
            Some(&uniforms.texture_matrix),
            pipeline.state().last().map(|u| &u.texture_matrix)
        );
    }

    #[test]
    fn skipped_frame_runs_hooks_only() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        let mut uniforms = ReflectorUniforms::default();

        let below = camera(Vec3::new(0.0, -4.0, 5.0));
        let report = pipeline.run_frame(&below, &mut demo.scene, &mut exec, &mut uniforms);
        assert_eq!(report.outcome, FrameOutcome::Skipped(SkipReason::FacingAway));
        assert_eq!(report.executed, vec![PassKind::BeforeHook, PassKind::AfterHook]);
        assert!(exec.trace().is_empty());
        assert_eq!(uniforms.t_diffuse, None);
        assert_eq!(uniforms.texture_matrix, TextureMatrix::default());
        assert!(demo.scene.is_visible(demo.floor));
    }

    #[test]
    fn non_finite_camera_keeps_committed_uniforms() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        let mut uniforms = ReflectorUniforms::default();

        pipeline.run_frame(&camera(Vec3::new(0.0, 2.0, 5.0)), &mut demo.scene, &mut exec, &mut uniforms);
        let committed = uniforms;
        exec.take_trace();

        let mut broken = camera(Vec3::new(1.0, 2.0, 5.0));
        broken.projection.x_axis.x = f32::NAN;
        let report = pipeline.run_frame(&broken, &mut demo.scene, &mut exec, &mut uniforms);
        assert_eq!(report.outcome, FrameOutcome::Skipped(SkipReason::NonFinite));
        assert!(exec.trace().is_empty());
        assert_eq!(uniforms, committed);
        assert!(uniforms.texture_matrix.0.is_finite());
    }

    #[test]
    fn top_down_camera_renders() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        let mut uniforms = ReflectorUniforms::default();

        let report = pipeline.run_frame(&camera(Vec3::new(0.0, 5.0, 0.0)), &mut demo.scene, &mut exec, &mut uniforms);
        assert_eq!(report.outcome, FrameOutcome::Rendered);
        assert!(uniforms.texture_matrix.0.is_finite());
    }

    #[test]
    fn identical_frames_are_idempotent() {
        let mut demo = DemoScene::new();
        let mut pipeline = full_pipeline(&demo);
        let mut exec = DebugExecutor::new();
        let mut uniforms = ReflectorUniforms::default();
        let cam = camera(Vec3::new(1.0, 2.0, 6.0));

        let first = pipeline.run_frame(&cam, &mut demo.scene, &mut exec, &mut uniforms);
        let after_first = uniforms;
        let trace_first = exec.take_trace();
        let second = pipeline.run_frame(&cam, &mut demo.scene, &mut exec, &mut uniforms);

        assert_eq!(first.outcome, second.outcome);
        assert_eq!(first.executed, second.executed);
        assert_eq!(second.frame, 2);
        assert_eq!(uniforms, after_first);
        assert_eq!(trace_first.len(), exec.trace().len());
        assert_eq!(trace_first[0], exec.trace()[0]);
    }

    struct CountingExecutor {
        blurs: Vec<BlurSettings>,
    }

    #[derive(Debug, thiserror::Error)]
    #[error("never")]
    struct Never;

    impl PassExecutor<()> for CountingExecutor {
        type Error = Never;

        fn reflection(&mut self, _: &(), _: &MirrorCamera) -> Result<(), Never> {
            Ok(())
        }

        fn depth(&mut self, _: &(), _: &MirrorCamera) -> Result<(), Never> {
            Ok(())
        }

        fn blur(&mut self, settings: &BlurSettings) -> Result<(), Never> {
            self.blurs.push(*settings);
            Ok(())
        }

        fn save(&mut self) -> Result<TargetId, Never> {
            Ok(TargetId(7))
        }
    }

    #[test]
    fn blur_settings_are_adjustable_between_frames() {
        let mut pipeline = PassPipeline::<()>::new(
            vec![Pass::Reflection, Pass::Blur(BlurSettings::default()), Pass::Save],
            state(),
        )
        .unwrap();
        let mut exec = CountingExecutor { blurs: Vec::new() };
        let mut uniforms = ReflectorUniforms::default();
        let cam = camera(Vec3::new(0.0, 0.0, 5.0));

        pipeline.run_frame(&cam, &mut (), &mut exec, &mut uniforms);
        if let Some(blur) = pipeline.blur_settings_mut() {
            blur.radius = 3.0;
        }
        pipeline.run_frame(&cam, &mut (), &mut exec, &mut uniforms);

        assert_eq!(exec.blurs.len(), 2);
        assert_eq!(exec.blurs[1].radius, 3.0);
        assert_eq!(uniforms.t_diffuse, Some(TargetId(7)));
    }
}
