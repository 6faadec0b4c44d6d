//! Camera intrinsics, look-at poses, and perspective projection.
//!
//! The camera follows the usual convention of looking down its local −Z axis
//! with +Y up. Projection lands in normalized image coordinates: `(0, 0)` at
//! the bottom-left corner, `(1, 1)` at the top-right, so framing checks are
//! independent of the output resolution.

use nalgebra::{Matrix3, Matrix4, Point3, Vector3};
use serde::{Deserialize, Serialize};

/// Fixed pinhole intrinsics in physical units.
///
/// Configured once per run and logged in the manifest; never sampled. The
/// sensor height follows from the width and the output aspect ratio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    /// Focal length in millimeters.
    pub focal_length_mm: f64,
    /// Sensor width in millimeters.
    pub sensor_width_mm: f64,
}

impl Default for CameraIntrinsics {
    fn default() -> Self {
        Self {
            focal_length_mm: 65.0,
            sensor_width_mm: 36.0,
        }
    }
}

impl CameraIntrinsics {
    /// Returns `true` when focal length and sensor width are finite and positive.
    pub fn is_valid(self) -> bool {
        self.focal_length_mm.is_finite()
            && self.sensor_width_mm.is_finite()
            && self.focal_length_mm > 0.0
            && self.sensor_width_mm > 0.0
    }

    /// Sensor height in millimeters for the given output aspect ratio.
    pub fn sensor_height_mm(self, image_width: u32, image_height: u32) -> f64 {
        self.sensor_width_mm * image_height as f64 / image_width as f64
    }
}

/// A world-space camera pose: position plus look-at orientation.
///
/// Immutable once accepted by the sampling loop. `rotation` maps camera-local
/// coordinates into world coordinates; its columns are the camera's right,
/// up, and backward (+Z) axes.
#[derive(Debug, Clone, PartialEq)]
pub struct CameraPose {
    /// Camera position in world space.
    pub position: Point3<f64>,
    /// Camera-to-world rotation.
    pub rotation: Matrix3<f64>,
    /// The point the camera is aimed at.
    pub look_at: Point3<f64>,
}

impl CameraPose {
    /// Build a pose looking from `position` toward `target`, up locked to
    /// world +Z (no roll).
    ///
    /// Returns `None` when the view direction is degenerate: zero length or
    /// parallel to the world up axis.
    pub fn look_at(position: Point3<f64>, target: Point3<f64>) -> Option<Self> {
        let forward = target - position;
        if forward.norm() < 1e-12 {
            return None;
        }
        let forward = forward.normalize();

        let world_up = Vector3::z();
        let right = forward.cross(&world_up);
        if right.norm() < 1e-9 {
            // Looking straight up or down; roll would be unconstrained.
            return None;
        }
        let right = right.normalize();
        let up = right.cross(&forward);

        Some(Self {
            position,
            rotation: Matrix3::from_columns(&[right, up, -forward]),
            look_at: target,
        })
    }

    /// The 4×4 camera-to-world transform.
    pub fn to_matrix_world(&self) -> Matrix4<f64> {
        let mut m = Matrix4::identity();
        m.fixed_view_mut::<3, 3>(0, 0).copy_from(&self.rotation);
        m.fixed_view_mut::<3, 1>(0, 3)
            .copy_from(&self.position.coords);
        m
    }

    /// Project a world point to normalized image coordinates.
    ///
    /// Returns `None` when the point is behind the camera (non-positive
    /// depth), the intrinsics are degenerate, or the projection is not
    /// finite.
    pub fn project_normalized(
        &self,
        intrinsics: CameraIntrinsics,
        image_width: u32,
        image_height: u32,
        world: &Point3<f64>,
    ) -> Option<[f64; 2]> {
        if !intrinsics.is_valid() || image_width == 0 || image_height == 0 {
            return None;
        }

        let cam = self.rotation.transpose() * (world - self.position);
        let depth = -cam.z;
        if !(depth > 0.0) {
            return None;
        }

        let sensor_h = intrinsics.sensor_height_mm(image_width, image_height);
        let u = 0.5 + intrinsics.focal_length_mm * cam.x / (depth * intrinsics.sensor_width_mm);
        let v = 0.5 + intrinsics.focal_length_mm * cam.y / (depth * sensor_h);
        if u.is_finite() && v.is_finite() {
            Some([u, v])
        } else {
            None
        }
    }
}
