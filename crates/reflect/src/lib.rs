//! Planar reflection math.
//!
//! Each frame the main camera is mirrored across a [`ReflectivePlane`]; the
//! mirrored camera renders the reflection, and the [`TextureMatrix`] maps
//! world positions on the floor to where they land in that render.
//!
//! # Invariants
//! - Everything here is a pure function of the frame inputs.
//! - A degenerate frame (camera on the plane or behind it) never replaces
//!   the last good [`ReflectionUpdate`].

mod mirror;
mod plane;
mod texture_matrix;

pub use mirror::{oblique_projection, CameraState, MirrorCamera, DEGENERATE_DISTANCE};
pub use plane::{PlaneError, ReflectivePlane};
pub use texture_matrix::{TextureMatrix, TEXTURE_BIAS};

/// Inputs to one reflection update.
#[derive(Debug, Clone, Copy)]
pub struct FrameContext {
    pub camera: CameraState,
    pub plane: ReflectivePlane,
    pub clip_bias: f32,
}

/// Per-frame output: the mirror camera and the matrix the floor samples with.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectionUpdate {
    pub mirror: MirrorCamera,
    pub texture_matrix: TextureMatrix,
}

/// Why a frame produced no reflection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SkipReason {
    #[error("camera lies on the reflective plane")]
    OnPlane,
    #[error("camera is behind the reflective plane")]
    FacingAway,
    #[error("camera or mirror matrices are not finite")]
    NonFinite,
}

/// Compute the mirror camera and texture matrix for one frame.
pub fn update(ctx: &FrameContext) -> Result<ReflectionUpdate, SkipReason> {
    if !ctx.camera.is_finite() {
        return Err(SkipReason::NonFinite);
    }
    let distance = ctx.plane.signed_distance(ctx.camera.position());
    if distance.abs() < DEGENERATE_DISTANCE {
        return Err(SkipReason::OnPlane);
    }
    if distance < 0.0 {
        return Err(SkipReason::FacingAway);
    }
    let mirror = MirrorCamera::from_camera(&ctx.camera, &ctx.plane, ctx.clip_bias)
        .ok_or(SkipReason::OnPlane)?;
    let texture_matrix = TextureMatrix::from_mirror(&mirror);
    if !mirror.position.is_finite() || !texture_matrix.0.is_finite() {
        return Err(SkipReason::NonFinite);
    }
    Ok(ReflectionUpdate {
        texture_matrix,
        mirror,
    })
}

/// Holds the plane and the last successful update across frames.
#[derive(Debug, Clone)]
pub struct ReflectionState {
    plane: ReflectivePlane,
    clip_bias: f32,
    last: Option<ReflectionUpdate>,
}

impl ReflectionState {
    pub fn new(plane: ReflectivePlane, clip_bias: f32) -> Self {
        Self {
            plane,
            clip_bias,
            last: None,
        }
    }

    pub fn plane(&self) -> &ReflectivePlane {
        &self.plane
    }

    pub fn set_plane(&mut self, plane: ReflectivePlane) {
        self.plane = plane;
    }

    pub fn clip_bias(&self) -> f32 {
        self.clip_bias
    }

    /// Last update that was computed successfully.
    pub fn last(&self) -> Option<&ReflectionUpdate> {
        self.last.as_ref()
    }

    /// Recompute for `camera`. On a skip the previous update is kept.
    pub fn advance(&mut self, camera: &CameraState) -> Result<ReflectionUpdate, SkipReason> {
        let ctx = FrameContext {
            camera: *camera,
            plane: self.plane,
            clip_bias: self.clip_bias,
        };
        match update(&ctx) {
            Ok(next) => {
                self.last = Some(next);
                Ok(next)
            }
            Err(reason) => {
                tracing::debug!("reflection update skipped: {reason}");
                Err(reason)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::{Mat4, Vec3};

    fn projection() -> Mat4 {
        Mat4::perspective_rh(75.0_f32.to_radians(), 1.0, 0.1, 100.0)
    }

    fn floor() -> ReflectivePlane {
        ReflectivePlane::new(Vec3::new(0.0, -1.5, 0.0), Vec3::Y, 512, 512).unwrap()
    }

    #[test]
    fn update_is_deterministic() {
        let ctx = FrameContext {
            camera: CameraState::look_at(Vec3::new(1.0, 2.0, 5.0), Vec3::ZERO, projection()),
            plane: floor(),
            clip_bias: 0.0,
        };
        assert_eq!(update(&ctx).unwrap(), update(&ctx).unwrap());
    }

    #[test]
    fn camera_below_floor_is_skipped() {
        let ctx = FrameContext {
            camera: CameraState::look_at(Vec3::new(0.0, -4.0, 5.0), Vec3::ZERO, projection()),
            plane: floor(),
            clip_bias: 0.0,
        };
        assert_eq!(update(&ctx).unwrap_err(), SkipReason::FacingAway);
    }

    #[test]
    fn top_down_camera_reflects_straight_up() {
        let ctx = FrameContext {
            camera: CameraState::look_at(Vec3::new(0.0, 5.0, 0.0), Vec3::ZERO, projection()),
            plane: floor(),
            clip_bias: 0.0,
        };
        assert!(ctx.camera.is_finite());
        let next = update(&ctx).unwrap();
        assert!(next.mirror.position.abs_diff_eq(Vec3::new(0.0, -8.0, 0.0), 1e-4));
        assert!(next.texture_matrix.0.is_finite());
    }

    #[test]
    fn non_finite_camera_is_skipped() {
        let mut camera = CameraState::look_at(Vec3::new(0.0, 2.0, 5.0), Vec3::ZERO, projection());
        camera.world.x_axis.x = f32::NAN;
        let ctx = FrameContext {
            camera,
            plane: floor(),
            clip_bias: 0.0,
        };
        assert_eq!(update(&ctx).unwrap_err(), SkipReason::NonFinite);

        // eye == target has no view direction
        let ctx = FrameContext {
            camera: CameraState::look_at(Vec3::ONE, Vec3::ONE, projection()),
            ..ctx
        };
        assert_eq!(update(&ctx).unwrap_err(), SkipReason::NonFinite);
    }

    #[test]
    fn degenerate_frame_retains_previous_matrix() {
        let mut state = ReflectionState::new(floor(), 0.0);
        assert!(state.last().is_none());

        let good = CameraState::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, projection());
        let first = state.advance(&good).unwrap();

        let on_plane = CameraState::look_at(
            Vec3::new(0.0, -1.5, 5.0),
            Vec3::new(0.0, -1.5, 0.0),
            projection(),
        );
        assert_eq!(state.advance(&on_plane).unwrap_err(), SkipReason::OnPlane);
        assert_eq!(state.last(), Some(&first));
    }
}
