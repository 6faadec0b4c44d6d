//! Ground-truth extraction from rendered silhouettes.
//!
//! The label of a sample is the inner-hole diameter in pixels, measured from
//! the rendered evidence rather than derived from projection math: the hole
//! silhouette's boundary is extracted at half-pixel precision and an ellipse
//! is fitted to it; the major axis is the label.

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};

use crate::ellipse::{fit_ellipse_direct, Ellipse};

/// Mask intensities at or above this value count as foreground.
const FOREGROUND_THRESHOLD: u8 = 128;

/// Minor semi-axis below this is considered a degenerate fit.
const MIN_SEMI_AXIS_PX: f64 = 0.5;

/// Why a silhouette could not be measured.
///
/// Treated by the sampling loop as a per-attempt rejection
/// (`invalid_inner_diameter_measurement`), never as a crash of the run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MeasurementError {
    /// The mask contains no foreground region.
    EmptyMask,
    /// The mask contains more than one disjoint foreground region.
    MultipleRegions {
        /// Number of disjoint regions found.
        count: usize,
    },
    /// The boundary was too sparse or the fitted ellipse had a near-zero axis.
    DegenerateFit,
}

impl std::fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyMask => write!(f, "mask contains no foreground region"),
            Self::MultipleRegions { count } => {
                write!(f, "mask contains {} disjoint foreground regions", count)
            }
            Self::DegenerateFit => write!(f, "fitted ellipse is degenerate"),
        }
    }
}

impl std::error::Error for MeasurementError {}

/// Fit an ellipse to the single foreground region of a binary silhouette.
///
/// The mask must isolate exactly one 4-connected region. Boundary points are
/// taken at the midpoints between foreground pixels and their background
/// (or out-of-image) 4-neighbors, which keeps the fitted axes accurate to a
/// fraction of a pixel on clean masks.
pub fn measure_inner_ellipse(mask: &GrayImage) -> Result<Ellipse, MeasurementError> {
    let (w, h) = mask.dimensions();
    let mut binary = GrayImage::new(w, h);
    for (dst, src) in binary.pixels_mut().zip(mask.pixels()) {
        dst[0] = if src[0] >= FOREGROUND_THRESHOLD { 255 } else { 0 };
    }

    let labels = connected_components(&binary, Connectivity::Four, Luma([0u8]));
    let mut distinct = std::collections::HashSet::new();
    for p in labels.pixels() {
        if p[0] != 0 {
            distinct.insert(p[0]);
        }
    }
    match distinct.len() {
        0 => return Err(MeasurementError::EmptyMask),
        1 => {}
        count => return Err(MeasurementError::MultipleRegions { count }),
    }

    let points = boundary_midpoints(&binary);
    if points.len() < 6 {
        return Err(MeasurementError::DegenerateFit);
    }

    let ellipse = fit_ellipse_direct(&points).ok_or(MeasurementError::DegenerateFit)?;
    if ellipse.b < MIN_SEMI_AXIS_PX {
        return Err(MeasurementError::DegenerateFit);
    }
    Ok(ellipse)
}

/// Measure the inner-hole diameter in pixels: the major axis of the ellipse
/// fitted to the hole silhouette.
pub fn measure_inner_diameter_px(mask: &GrayImage) -> Result<f64, MeasurementError> {
    measure_inner_ellipse(mask).map(|e| e.major_axis())
}

/// Midpoints between each foreground pixel and its background 4-neighbors.
fn boundary_midpoints(binary: &GrayImage) -> Vec<[f64; 2]> {
    let (w, h) = binary.dimensions();
    let fg = |x: i64, y: i64| -> bool {
        if x < 0 || y < 0 || x >= w as i64 || y >= h as i64 {
            return false;
        }
        binary.get_pixel(x as u32, y as u32)[0] != 0
    };

    let mut points = Vec::new();
    for y in 0..h as i64 {
        for x in 0..w as i64 {
            if !fg(x, y) {
                continue;
            }
            for (dx, dy) in [(-1i64, 0i64), (1, 0), (0, -1), (0, 1)] {
                if !fg(x + dx, y + dy) {
                    points.push([x as f64 + 0.5 * dx as f64, y as f64 + 0.5 * dy as f64]);
                }
            }
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_ellipse_mask;

    #[test]
    fn known_ellipse_measures_within_a_pixel() {
        let e = Ellipse {
            cx: 110.0,
            cy: 100.0,
            a: 50.0,
            b: 30.0,
            angle: 0.4,
        };
        let mask = draw_ellipse_mask(220, 200, &e);
        let measured = measure_inner_diameter_px(&mask).expect("measurable");
        assert!(
            (measured - 100.0).abs() <= 1.0,
            "expected 100 ± 1 px, got {}",
            measured
        );
    }

    #[test]
    fn circle_measures_its_diameter() {
        let e = Ellipse {
            cx: 64.0,
            cy: 64.0,
            a: 25.0,
            b: 25.0,
            angle: 0.0,
        };
        let mask = draw_ellipse_mask(128, 128, &e);
        let measured = measure_inner_diameter_px(&mask).expect("measurable");
        assert!((measured - 50.0).abs() <= 1.0, "got {}", measured);
    }

    #[test]
    fn empty_mask_is_rejected() {
        let mask = GrayImage::new(64, 64);
        assert_eq!(
            measure_inner_diameter_px(&mask),
            Err(MeasurementError::EmptyMask)
        );
    }

    #[test]
    fn disjoint_regions_are_rejected() {
        let left = Ellipse {
            cx: 30.0,
            cy: 50.0,
            a: 10.0,
            b: 8.0,
            angle: 0.0,
        };
        let right = Ellipse {
            cx: 90.0,
            cy: 50.0,
            a: 10.0,
            b: 8.0,
            angle: 0.0,
        };
        let mut mask = draw_ellipse_mask(128, 100, &left);
        let second = draw_ellipse_mask(128, 100, &right);
        for (dst, src) in mask.pixels_mut().zip(second.pixels()) {
            dst[0] = dst[0].max(src[0]);
        }
        assert_eq!(
            measure_inner_diameter_px(&mask),
            Err(MeasurementError::MultipleRegions { count: 2 })
        );
    }

    #[test]
    fn single_pixel_region_is_degenerate() {
        let mut mask = GrayImage::new(32, 32);
        mask.put_pixel(16, 16, Luma([255]));
        assert_eq!(
            measure_inner_diameter_px(&mask),
            Err(MeasurementError::DegenerateFit)
        );
    }

    #[test]
    fn soft_antialiased_values_below_threshold_are_background() {
        let e = Ellipse {
            cx: 40.0,
            cy: 40.0,
            a: 15.0,
            b: 15.0,
            angle: 0.0,
        };
        let mut mask = draw_ellipse_mask(80, 80, &e);
        // Dim speckle away from the region must not create a second region.
        mask.put_pixel(5, 5, Luma([60]));
        let measured = measure_inner_diameter_px(&mask).expect("measurable");
        assert!((measured - 30.0).abs() <= 1.0);
    }
}
