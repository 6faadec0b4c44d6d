//! Deterministic auto-correction of failing camera candidates.
//!
//! One nudge per invocation, keyed on the rejection reason; the sampling
//! loop re-validates afterwards and gives up on the attempt if the corrected
//! pose still fails. Corrections never touch yaw or the look-at jitter, so a
//! corrected pose stays on the same azimuth as the original draw.

use crate::config::CameraConfig;
use crate::sample::SampledCamera;
use crate::validate::{RejectionReason, ValidationResult};

/// Relative distance step applied per correction.
pub const DISTANCE_STEP: f64 = 1.1;

/// Pitch step in degrees, toward the configured range midpoint.
pub const PITCH_STEP_DEG: f64 = 5.0;

/// Apply one deterministic nudge to a failing candidate.
///
/// - `clipped` / `too_large_in_frame`: back off — distance multiplier × 1.1,
///   clamped to the configured maximum; when already clamped, move pitch one
///   step toward the range midpoint instead.
/// - `too_small_in_frame`: the symmetric move — distance multiplier ÷ 1.1,
///   clamped to the minimum, same pitch fallback at the clamp.
/// - everything else (below table, invalid projection, failed measurement):
///   move pitch one step toward the midpoint.
pub fn correct(
    camera: &SampledCamera,
    result: &ValidationResult,
    config: &CameraConfig,
) -> SampledCamera {
    let mut corrected = *camera;
    match result.reason {
        Some(RejectionReason::Clipped) | Some(RejectionReason::TooLargeInFrame) => {
            let stepped = config
                .distance_multiplier
                .clamp(camera.distance_multiplier * DISTANCE_STEP);
            if stepped > camera.distance_multiplier {
                corrected.distance_multiplier = stepped;
            } else {
                corrected.pitch_deg = pitch_toward_midpoint(camera.pitch_deg, config);
            }
        }
        Some(RejectionReason::TooSmallInFrame) => {
            let stepped = config
                .distance_multiplier
                .clamp(camera.distance_multiplier / DISTANCE_STEP);
            if stepped < camera.distance_multiplier {
                corrected.distance_multiplier = stepped;
            } else {
                corrected.pitch_deg = pitch_toward_midpoint(camera.pitch_deg, config);
            }
        }
        _ => {
            corrected.pitch_deg = pitch_toward_midpoint(camera.pitch_deg, config);
        }
    }
    corrected
}

fn pitch_toward_midpoint(pitch_deg: f64, config: &CameraConfig) -> f64 {
    let mid = config.pitch_deg.midpoint();
    let delta = mid - pitch_deg;
    if delta.abs() <= PITCH_STEP_DEG {
        mid
    } else {
        pitch_deg + PITCH_STEP_DEG * delta.signum()
    }
}
