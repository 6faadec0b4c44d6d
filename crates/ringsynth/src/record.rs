//! Per-sample output records.
//!
//! A [`SampleRecord`] is created once per accepted sample and never mutated
//! afterwards; it carries everything the dataset writer persists, so every
//! sample is self-contained and reproducible from its seed alone.

use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::sample::{GeometryParams, SampledCamera};
use crate::validate::ValidationResult;

/// Serializable camera extrinsics of an accepted pose.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraExtrinsics {
    /// Camera-to-world transform, row-major.
    pub matrix_world: [[f64; 4]; 4],
    /// Camera position in world space.
    pub position: [f64; 3],
    /// Look-at point in world space.
    pub look_at: [f64; 3],
}

impl From<&CameraPose> for CameraExtrinsics {
    fn from(pose: &CameraPose) -> Self {
        let m = pose.to_matrix_world();
        let mut matrix_world = [[0.0; 4]; 4];
        for (r, row) in matrix_world.iter_mut().enumerate() {
            for (c, cell) in row.iter_mut().enumerate() {
                *cell = m[(r, c)];
            }
        }
        Self {
            matrix_world,
            position: pose.position.coords.into(),
            look_at: pose.look_at.coords.into(),
        }
    }
}

/// One accepted sample: parameters, pose, metrics, and (after rendering)
/// the measured label.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// The per-sample seed everything was drawn from.
    pub seed: u64,
    /// Number of pose attempts consumed, including the accepted one.
    pub attempts: u32,
    /// Ring geometry, drawn once for this sample.
    pub geometry: GeometryParams,
    /// Accepted spherical camera parameters (post-correction, if any).
    pub camera: SampledCamera,
    /// Resolved camera distance in world units.
    pub distance: f64,
    /// Accepted camera extrinsics.
    pub extrinsics: CameraExtrinsics,
    /// The passing validation result with its framing metrics.
    pub visibility: ValidationResult,
    /// Measured inner-hole diameter in pixels; `None` in validate-only runs.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub inner_diameter_px: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::Point3;

    #[test]
    fn extrinsics_mirror_the_pose() {
        let pose = CameraPose::look_at(Point3::new(5.0, -3.0, 4.0), Point3::new(0.0, 0.0, 0.5))
            .expect("valid look-at");
        let ext = CameraExtrinsics::from(&pose);
        assert_eq!(ext.position, [5.0, -3.0, 4.0]);
        assert_eq!(ext.look_at, [0.0, 0.0, 0.5]);
        let m = pose.to_matrix_world();
        for r in 0..4 {
            for c in 0..4 {
                assert_relative_eq!(ext.matrix_world[r][c], m[(r, c)], epsilon = 1e-15);
            }
        }
    }
}
