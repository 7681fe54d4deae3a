use glam::{Mat4, Vec3, Vec4};
use mirrorfloor_common::Transform;

/// Errors from constructing a [`ReflectivePlane`].
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum PlaneError {
    #[error("plane normal has zero length")]
    ZeroNormal,
    #[error("plane resolution must be non-zero, got {width}x{height}")]
    ZeroSize { width: u32, height: u32 },
}

/// A mirror plane and the resolution its reflection is rendered at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReflectivePlane {
    position: Vec3,
    normal: Vec3,
    width: u32,
    height: u32,
}

impl ReflectivePlane {
    /// Build a plane through `position`. The normal is normalized here.
    pub fn new(position: Vec3, normal: Vec3, width: u32, height: u32) -> Result<Self, PlaneError> {
        let normal = normal.try_normalize().ok_or(PlaneError::ZeroNormal)?;
        if width == 0 || height == 0 {
            return Err(PlaneError::ZeroSize { width, height });
        }
        Ok(Self {
            position,
            normal,
            width,
            height,
        })
    }

    /// Plane of a flat mesh whose local +Z axis is its facing direction.
    pub fn from_transform(transform: &Transform, width: u32, height: u32) -> Result<Self, PlaneError> {
        Self::new(
            transform.position,
            transform.rotation * Vec3::Z,
            width,
            height,
        )
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn normal(&self) -> Vec3 {
        self.normal
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Plane equation `(n, d)` with `dot(n, p) + d = 0` for points on the plane.
    pub fn equation(&self) -> Vec4 {
        self.normal.extend(-self.normal.dot(self.position))
    }

    /// Positive on the side the normal points to.
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        (point - self.position).dot(self.normal)
    }

    pub fn reflect_point(&self, point: Vec3) -> Vec3 {
        point - 2.0 * self.signed_distance(point) * self.normal
    }

    pub fn reflect_direction(&self, dir: Vec3) -> Vec3 {
        dir - 2.0 * dir.dot(self.normal) * self.normal
    }

    /// Affine matrix mirroring points across the plane.
    pub fn reflection_matrix(&self) -> Mat4 {
        let n = self.normal;
        let d = 2.0 * n.dot(self.position);
        Mat4::from_cols(
            Vec4::new(1.0 - 2.0 * n.x * n.x, -2.0 * n.x * n.y, -2.0 * n.x * n.z, 0.0),
            Vec4::new(-2.0 * n.y * n.x, 1.0 - 2.0 * n.y * n.y, -2.0 * n.y * n.z, 0.0),
            Vec4::new(-2.0 * n.z * n.x, -2.0 * n.z * n.y, 1.0 - 2.0 * n.z * n.z, 0.0),
            Vec4::new(d * n.x, d * n.y, d * n.z, 1.0),
        )
    }
}
