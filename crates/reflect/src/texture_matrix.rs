use crate::mirror::MirrorCamera;
use glam::{Mat4, Vec2, Vec3, Vec4};

/// Maps clip-space x, y in [-1, 1] to texture u, v in [0, 1].
///
/// v is flipped because texture rows start at the top. z and w pass through.
pub const TEXTURE_BIAS: Mat4 = Mat4::from_cols(
    Vec4::new(0.5, 0.0, 0.0, 0.0),
    Vec4::new(0.0, -0.5, 0.0, 0.0),
    Vec4::new(0.0, 0.0, 1.0, 0.0),
    Vec4::new(0.5, 0.5, 0.0, 1.0),
);

/// World position → homogeneous reflection-texture coordinate.
///
/// Sample with `xy / w` (projective lookup).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextureMatrix(pub Mat4);

impl Default for TextureMatrix {
    fn default() -> Self {
        Self(Mat4::IDENTITY)
    }
}

impl TextureMatrix {
    pub fn from_mirror(mirror: &MirrorCamera) -> Self {
        Self(TEXTURE_BIAS * mirror.projection * mirror.view)
    }

    pub fn project(&self, world: Vec3) -> Vec4 {
        self.0 * world.extend(1.0)
    }

    /// Texture coordinate of `world`, or `None` if it is behind the mirror camera.
    pub fn uv(&self, world: Vec3) -> Option<Vec2> {
        let p = self.project(world);
        (p.w > f32::EPSILON).then(|| Vec2::new(p.x, p.y) / p.w)
    }

    pub fn to_cols_array_2d(&self) -> [[f32; 4]; 4] {
        self.0.to_cols_array_2d()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mirror::CameraState;
    use crate::plane::ReflectivePlane;

    fn setup() -> (CameraState, ReflectivePlane, MirrorCamera) {
        let projection = Mat4::perspective_rh(75.0_f32.to_radians(), 1.0, 0.1, 100.0);
        let camera = CameraState::look_at(Vec3::new(0.0, 0.0, 5.0), Vec3::ZERO, projection);
        let plane = ReflectivePlane::new(Vec3::new(0.0, -1.5, 0.0), Vec3::Y, 512, 512).unwrap();
        let mirror = MirrorCamera::from_camera(&camera, &plane, 0.0).unwrap();
        (camera, plane, mirror)
    }

    fn in_unit_square(uv: Vec2) -> bool {
        (0.0..=1.0).contains(&uv.x) && (0.0..=1.0).contains(&uv.y)
    }

    #[test]
    fn plane_points_in_frustum_map_into_unit_square() {
        let (_, _, mirror) = setup();
        let tm = TextureMatrix::from_mirror(&mirror);
        let vp = mirror.view_projection();

        for x in [-3.0_f32, -1.0, 0.0, 1.0, 3.0] {
            for z in [-6.0_f32, -2.0, 0.0, 1.0] {
                let p = Vec3::new(x, -1.5, z);
                let clip = vp * p.extend(1.0);
                let inside = clip.w > 0.0
                    && clip.x.abs() <= clip.w
                    && clip.y.abs() <= clip.w;
                if inside {
                    let uv = tm.uv(p).unwrap();
                    assert!(in_unit_square(uv), "{p} -> {uv}");
                }
            }
        }
    }

    #[test]
    fn view_centre_maps_to_texture_centre() {
        let (_, plane, mirror) = setup();
        let tm = TextureMatrix::from_mirror(&mirror);
        let world = mirror.view.inverse();
        let ahead = mirror.position + world.transform_vector3(Vec3::NEG_Z) * 4.0;
        assert!(plane.signed_distance(ahead) < 0.0);
        let uv = tm.uv(ahead).unwrap();
        assert!(uv.abs_diff_eq(Vec2::splat(0.5), 1e-5));
    }

    #[test]
    fn floor_point_samples_the_object_it_reflects() {
        let (camera, plane, mirror) = setup();
        let tm = TextureMatrix::from_mirror(&mirror);

        // Main-camera ray through a floor point continues below the floor;
        // the mirror image of that continuation is what the floor shows.
        let eye = camera.position();
        let floor_point = Vec3::new(0.8, -1.5, -1.0);
        let beyond = eye + (floor_point - eye) * 1.7;
        let reflected_object = plane.reflect_point(beyond);
        assert!(plane.signed_distance(reflected_object) > 0.0);

        let uv_floor = tm.uv(floor_point).unwrap();
        let uv_object = tm.uv(reflected_object).unwrap();
        assert!(uv_floor.abs_diff_eq(uv_object, 1e-4));
    }

    #[test]
    fn point_behind_mirror_camera_has_no_uv() {
        let (_, _, mirror) = setup();
        let tm = TextureMatrix::from_mirror(&mirror);
        assert!(tm.uv(mirror.position + Vec3::new(0.0, 0.0, 10.0)).is_none());
    }

    #[test]
    fn default_is_identity() {
        assert_eq!(TextureMatrix::default().0, Mat4::IDENTITY);
    }
}
