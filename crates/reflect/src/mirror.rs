use crate::plane::ReflectivePlane;
use glam::{Mat4, Vec3, Vec4};

/// Below this distance from the plane the mirror transform is treated as degenerate.
pub const DEGENERATE_DISTANCE: f32 = 1e-5;

/// World transform and projection of the camera the scene is viewed from.
///
/// Projections are right-handed with a [0, 1] depth range (`Mat4::perspective_rh`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraState {
    pub world: Mat4,
    pub projection: Mat4,
}

impl CameraState {
    /// Camera at `eye` looking at `target`. World +Y is up unless the view
    /// runs along it, in which case -Z is.
    pub fn look_at(eye: Vec3, target: Vec3, projection: Mat4) -> Self {
        let dir = (target - eye).normalize_or_zero();
        let up = if dir.dot(Vec3::Y).abs() > 0.999 {
            Vec3::NEG_Z
        } else {
            Vec3::Y
        };
        Self {
            world: Mat4::look_at_rh(eye, target, up).inverse(),
            projection,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.world.is_finite() && self.projection.is_finite()
    }

    pub fn position(&self) -> Vec3 {
        self.world.w_axis.truncate()
    }

    pub fn forward(&self) -> Vec3 {
        self.world.transform_vector3(Vec3::NEG_Z).normalize()
    }

    pub fn up(&self) -> Vec3 {
        self.world.transform_vector3(Vec3::Y).normalize()
    }

    pub fn view(&self) -> Mat4 {
        self.world.inverse()
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view()
    }
}

/// The main camera mirrored across a [`ReflectivePlane`].
///
/// Recomputed every frame; the projection's near plane lies on the mirror so
/// geometry behind it never reaches the reflection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MirrorCamera {
    pub position: Vec3,
    pub view: Mat4,
    pub projection: Mat4,
}

impl MirrorCamera {
    /// Mirror `camera` across `plane`. Returns `None` when the camera sits on the plane.
    pub fn from_camera(camera: &CameraState, plane: &ReflectivePlane, clip_bias: f32) -> Option<Self> {
        let eye = camera.position();
        if plane.signed_distance(eye).abs() < DEGENERATE_DISTANCE {
            return None;
        }

        let reflect = plane.reflection_matrix();
        let position = reflect.transform_point3(eye);
        let target = reflect.transform_point3(eye + camera.forward());
        let up = plane.reflect_direction(camera.up());

        let view = Mat4::look_at_rh(position, target, up);
        let projection = oblique_projection(camera.projection, view, plane, clip_bias);

        Some(Self {
            position,
            view,
            projection,
        })
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection * self.view
    }
}

/// Replace the near plane of `projection` with `plane` seen through `view`.
///
/// Only the z row changes, so x, y and w (and with them every projected UV)
/// are identical to the input projection. The far plane is tilted to pass
/// through the frustum corner opposite the clip plane.
pub fn oblique_projection(
    projection: Mat4,
    view: Mat4,
    plane: &ReflectivePlane,
    clip_bias: f32,
) -> Mat4 {
    let normal = view.transform_vector3(plane.normal()).normalize();
    let point = view.transform_point3(plane.position());
    let clip_plane = normal.extend(-normal.dot(point));

    let corner =
        projection.inverse() * Vec4::new(clip_plane.x.signum(), clip_plane.y.signum(), 1.0, 1.0);
    let denom = clip_plane.dot(corner);
    if denom.abs() < f32::EPSILON {
        return projection;
    }

    let scale = projection.row(3).dot(corner) / denom;
    let mut rows = projection.transpose();
    rows.z_axis = clip_plane * scale - Vec4::new(0.0, 0.0, clip_bias, 0.0);
    rows.transpose()
}
