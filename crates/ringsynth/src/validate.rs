//! Visibility and framing validation of candidate camera poses.
//!
//! A candidate passes when the object's whole bounding box projects inside
//! the image with margin, at an acceptable size, from a camera above the
//! table plane. Checks run in a fixed priority order and the result carries
//! only the first violated constraint — the ordering decides which rejection
//! reason gets logged when several constraints fail at once, so it is part
//! of the crate's contract:
//!
//! 1. `clipped`          — projected corner margin below `edge_margin`
//! 2. `too_small_in_frame` / `too_large_in_frame` — projected extent outside
//!    the configured size window
//! 3. `below_table_plane` — camera below the surface the object rests on
//! 4. `invalid_projection` — a corner behind the camera or degenerate
//!    intrinsics (margin and size are not computable in this case, so the
//!    first two checks are skipped)

use serde::{Deserialize, Serialize};

use crate::camera::{CameraIntrinsics, CameraPose};
use crate::config::{ImageConfig, VisibilityConfig};
use crate::scene::BoundingInfo;

/// Why a candidate pose (or its rendered measurement) was rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionReason {
    /// Bounding box clipped by the image edge (margin violated).
    Clipped,
    /// Projected extent below the minimum size fraction.
    TooSmallInFrame,
    /// Projected extent above the maximum size fraction.
    TooLargeInFrame,
    /// Camera position below the table plane.
    BelowTablePlane,
    /// A corner projected behind the camera, or degenerate intrinsics.
    InvalidProjection,
    /// The rendered inner-hole silhouette could not be measured.
    InvalidInnerDiameterMeasurement,
}

impl RejectionReason {
    /// All reasons, in validation priority order.
    pub const ALL: [RejectionReason; 6] = [
        Self::Clipped,
        Self::TooSmallInFrame,
        Self::TooLargeInFrame,
        Self::BelowTablePlane,
        Self::InvalidProjection,
        Self::InvalidInnerDiameterMeasurement,
    ];

    /// Stable snake_case name, matching the serialized form.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Clipped => "clipped",
            Self::TooSmallInFrame => "too_small_in_frame",
            Self::TooLargeInFrame => "too_large_in_frame",
            Self::BelowTablePlane => "below_table_plane",
            Self::InvalidProjection => "invalid_projection",
            Self::InvalidInnerDiameterMeasurement => "invalid_inner_diameter_measurement",
        }
    }
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of one visibility check.
///
/// At most one reason is recorded per check; `margin` and `size_fraction`
/// are present whenever the projection allowed computing them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValidationResult {
    /// Whether the pose satisfies all constraints.
    pub pass: bool,
    /// Minimum signed distance from any projected corner to the nearest
    /// image edge, as a fraction of the image dimension.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub margin: Option<f64>,
    /// Projected bounding-box extent: max of width and height fraction.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_fraction: Option<f64>,
    /// Projected bounding box `[min_x, min_y, max_x, max_y]` in normalized
    /// image coordinates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub projected_bbox: Option<[f64; 4]>,
    /// First violated constraint, `None` on pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<RejectionReason>,
}

impl ValidationResult {
    fn rejected(reason: RejectionReason) -> Self {
        Self {
            pass: false,
            margin: None,
            size_fraction: None,
            projected_bbox: None,
            reason: Some(reason),
        }
    }
}

/// Check a candidate pose against the visibility and framing constraints.
pub fn validate(
    pose: &CameraPose,
    bounding: &BoundingInfo,
    intrinsics: CameraIntrinsics,
    image: ImageConfig,
    config: &VisibilityConfig,
) -> ValidationResult {
    let mut projected = [[0.0f64; 2]; 8];
    let mut all_projected = true;
    for (slot, corner) in projected.iter_mut().zip(bounding.corners().iter()) {
        match pose.project_normalized(intrinsics, image.width, image.height, corner) {
            Some(uv) => *slot = uv,
            None => {
                all_projected = false;
                break;
            }
        }
    }

    if !all_projected {
        // Margin and size are not computable; fall through to the camera
        // height check, then report the projection failure.
        if pose.position.z < bounding.table_plane_z() {
            return ValidationResult::rejected(RejectionReason::BelowTablePlane);
        }
        return ValidationResult::rejected(RejectionReason::InvalidProjection);
    }

    let mut min_x = f64::INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for [x, y] in projected {
        min_x = min_x.min(x);
        min_y = min_y.min(y);
        max_x = max_x.max(x);
        max_y = max_y.max(y);
    }

    let margin = min_x.min(min_y).min(1.0 - max_x).min(1.0 - max_y);
    let size_fraction = (max_x - min_x).max(max_y - min_y);
    let metrics = ValidationResult {
        pass: false,
        margin: Some(margin),
        size_fraction: Some(size_fraction),
        projected_bbox: Some([min_x, min_y, max_x, max_y]),
        reason: None,
    };

    if margin < config.edge_margin {
        return ValidationResult {
            reason: Some(RejectionReason::Clipped),
            ..metrics
        };
    }
    if size_fraction < config.min_projected_size {
        return ValidationResult {
            reason: Some(RejectionReason::TooSmallInFrame),
            ..metrics
        };
    }
    if size_fraction > config.max_projected_size {
        return ValidationResult {
            reason: Some(RejectionReason::TooLargeInFrame),
            ..metrics
        };
    }
    if pose.position.z < bounding.table_plane_z() {
        return ValidationResult {
            reason: Some(RejectionReason::BelowTablePlane),
            ..metrics
        };
    }

    ValidationResult {
        pass: true,
        ..metrics
    }
}
