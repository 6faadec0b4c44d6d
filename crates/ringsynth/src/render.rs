//! Renderer collaborator interface and the built-in silhouette backend.
//!
//! The real 3D renderer lives outside this crate; the sampling loop only
//! depends on the [`RenderBackend`] trait. Applying the sampled geometry to
//! the renderable object is part of a backend's `render` contract and must
//! be idempotent — the backend touches geometry only, never materials or
//! shading. [`SilhouetteRenderer`] is a deterministic mask-only backend used
//! by tests and the CLI's synthetic mode.

use image::{GrayImage, Luma, RgbImage};
use nalgebra::Point3;

use crate::camera::{CameraIntrinsics, CameraPose};
use crate::config::ImageConfig;
use crate::sample::GeometryParams;
use crate::scene::BoundingInfo;

/// Unrecoverable renderer failure. Aborts the run, unlike per-attempt
/// rejections.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderError {
    /// Backend-specific failure description.
    Backend(String),
}

impl std::fmt::Display for RenderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Backend(msg) => write!(f, "render backend failed: {}", msg),
        }
    }
}

impl std::error::Error for RenderError {}

/// Output of one render call: the two silhouette masks, plus RGB when the
/// backend produces it.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSample {
    /// Shaded image, when the backend renders one.
    pub rgb: Option<RgbImage>,
    /// Binary silhouette of the whole ring body.
    pub ring_mask: GrayImage,
    /// Binary silhouette of the inner hole.
    pub inner_mask: GrayImage,
}

/// Renders an accepted pose with the current sample's geometry applied.
pub trait RenderBackend {
    /// Render one sample. Geometry application is part of the call and must
    /// be overwrite-safe: rendering the same inputs twice yields the same
    /// output.
    fn render(
        &mut self,
        pose: &CameraPose,
        geometry: &GeometryParams,
    ) -> Result<RenderedSample, RenderError>;
}

/// Deterministic mask-only backend.
///
/// Models the ring as a flat annulus centered in the object's bounding box
/// with its face at the top of the box, projects the inner and outer circles
/// through the accepted pose, and rasterizes the resulting convex polygons.
/// World units are millimeters, matching [`GeometryParams`].
#[derive(Debug, Clone)]
pub struct SilhouetteRenderer {
    intrinsics: CameraIntrinsics,
    image: ImageConfig,
    bounding: BoundingInfo,
}

/// Boundary samples per projected circle. Chord error is far below the
/// half-pixel precision of the measurement stage.
const CIRCLE_SAMPLES: usize = 256;

impl SilhouetteRenderer {
    /// Build a backend for the given intrinsics, output size, and object
    /// bounding geometry.
    pub fn new(intrinsics: CameraIntrinsics, image: ImageConfig, bounding: BoundingInfo) -> Self {
        Self {
            intrinsics,
            image,
            bounding,
        }
    }

    /// Project a horizontal circle of `radius` at height `z` into pixel
    /// coordinates.
    fn project_circle(
        &self,
        pose: &CameraPose,
        radius: f64,
        z: f64,
    ) -> Result<Vec<[f64; 2]>, RenderError> {
        let center = self.bounding.center();
        let mut polygon = Vec::with_capacity(CIRCLE_SAMPLES);
        for i in 0..CIRCLE_SAMPLES {
            let t = 2.0 * std::f64::consts::PI * (i as f64) / (CIRCLE_SAMPLES as f64);
            let world = Point3::new(
                center.x + radius * t.cos(),
                center.y + radius * t.sin(),
                z,
            );
            let uv = pose
                .project_normalized(self.intrinsics, self.image.width, self.image.height, &world)
                .ok_or_else(|| {
                    RenderError::Backend("ring boundary projects behind the camera".to_string())
                })?;
            polygon.push([
                uv[0] * self.image.width as f64,
                (1.0 - uv[1]) * self.image.height as f64,
            ]);
        }
        Ok(polygon)
    }
}

impl RenderBackend for SilhouetteRenderer {
    fn render(
        &mut self,
        pose: &CameraPose,
        geometry: &GeometryParams,
    ) -> Result<RenderedSample, RenderError> {
        let face_z = self.bounding.max.z;
        let inner = self.project_circle(pose, 0.5 * geometry.inner_diameter_mm, face_z)?;
        let outer = self.project_circle(pose, 0.5 * geometry.outer_diameter_mm(), face_z)?;

        let (w, h) = (self.image.width, self.image.height);
        let mut inner_mask = GrayImage::new(w, h);
        let mut ring_mask = GrayImage::new(w, h);
        fill_polygon(&mut inner_mask, &inner);
        fill_polygon(&mut ring_mask, &outer);
        for (ring, hole) in ring_mask.pixels_mut().zip(inner_mask.pixels()) {
            if hole[0] != 0 {
                ring[0] = 0;
            }
        }

        Ok(RenderedSample {
            rgb: None,
            ring_mask,
            inner_mask,
        })
    }
}

/// Set every pixel whose center falls inside the polygon to 255.
fn fill_polygon(mask: &mut GrayImage, polygon: &[[f64; 2]]) {
    let (w, h) = mask.dimensions();
    let (mut min_x, mut min_y) = (f64::INFINITY, f64::INFINITY);
    let (mut max_x, mut max_y) = (f64::NEG_INFINITY, f64::NEG_INFINITY);
    for [x, y] in polygon {
        min_x = min_x.min(*x);
        min_y = min_y.min(*y);
        max_x = max_x.max(*x);
        max_y = max_y.max(*y);
    }

    let x0 = min_x.floor().max(0.0) as u32;
    let y0 = min_y.floor().max(0.0) as u32;
    let x1 = (max_x.ceil().max(0.0) as u32).min(w.saturating_sub(1));
    let y1 = (max_y.ceil().max(0.0) as u32).min(h.saturating_sub(1));

    for y in y0..=y1 {
        for x in x0..=x1 {
            if point_in_polygon(polygon, x as f64, y as f64) {
                mask.put_pixel(x, y, Luma([255]));
            }
        }
    }
}

/// Even-odd ray crossing test.
fn point_in_polygon(polygon: &[[f64; 2]], x: f64, y: f64) -> bool {
    let mut inside = false;
    let mut j = polygon.len() - 1;
    for i in 0..polygon.len() {
        let [xi, yi] = polygon[i];
        let [xj, yj] = polygon[j];
        if (yi > y) != (yj > y) && x < (xj - xi) * (y - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }
    inside
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryConfig;
    use crate::measure::measure_inner_diameter_px;
    use crate::sample::{build_pose, SampledCamera};
    use crate::scene::{SceneSource, StaticScene};

    fn ring_setup() -> (BoundingInfo, GeometryParams, CameraPose) {
        let scene = StaticScene::with_ring("ring", &GeometryConfig::default());
        let bounding = scene.bounding_info("ring").expect("ring present");
        let geometry = GeometryParams {
            inner_diameter_mm: 20.0,
            band_width_mm: 5.0,
            thickness_mm: 2.5,
        };
        let camera = SampledCamera {
            yaw_deg: 30.0,
            pitch_deg: 55.0,
            distance_multiplier: 11.0,
            look_at_jitter: [0.0; 3],
        };
        let pose = build_pose(&camera, &bounding).expect("valid pose");
        (bounding, geometry, pose)
    }

    #[test]
    fn masks_are_disjoint_and_nonempty() {
        let (bounding, geometry, pose) = ring_setup();
        let mut backend =
            SilhouetteRenderer::new(CameraIntrinsics::default(), ImageConfig::default(), bounding);
        let out = backend.render(&pose, &geometry).expect("renders");

        let inner_px = out.inner_mask.pixels().filter(|p| p[0] != 0).count();
        let ring_px = out.ring_mask.pixels().filter(|p| p[0] != 0).count();
        assert!(inner_px > 0, "inner mask empty");
        assert!(ring_px > 0, "ring mask empty");
        for (ring, hole) in out.ring_mask.pixels().zip(out.inner_mask.pixels()) {
            assert!(
                !(ring[0] != 0 && hole[0] != 0),
                "ring and hole masks overlap"
            );
        }
    }

    #[test]
    fn rendering_is_deterministic() {
        let (bounding, geometry, pose) = ring_setup();
        let mut backend = SilhouetteRenderer::new(
            CameraIntrinsics::default(),
            ImageConfig::default(),
            bounding,
        );
        let a = backend.render(&pose, &geometry).expect("renders");
        let b = backend.render(&pose, &geometry).expect("renders");
        assert_eq!(a, b);
    }

    #[test]
    fn inner_mask_is_measurable_and_scales_with_geometry() {
        let (bounding, mut geometry, pose) = ring_setup();
        let mut backend = SilhouetteRenderer::new(
            CameraIntrinsics::default(),
            ImageConfig::default(),
            bounding,
        );

        let out = backend.render(&pose, &geometry).expect("renders");
        let d20 = measure_inner_diameter_px(&out.inner_mask).expect("measurable");
        assert!(d20 > 0.0);

        geometry.inner_diameter_mm = 10.0;
        let out = backend.render(&pose, &geometry).expect("renders");
        let d10 = measure_inner_diameter_px(&out.inner_mask).expect("measurable");
        // Projection is linear in the hole radius at fixed pose.
        assert!(
            (d20 / d10 - 2.0).abs() < 0.05,
            "expected ~2x ratio, got {}",
            d20 / d10
        );
    }

    #[test]
    fn pose_looking_away_fails_loudly() {
        let (bounding, geometry, _) = ring_setup();
        let away = CameraPose::look_at(
            Point3::new(300.0, 0.0, 50.0),
            Point3::new(600.0, 0.0, 50.0),
        )
        .expect("valid look-at");
        let mut backend = SilhouetteRenderer::new(
            CameraIntrinsics::default(),
            ImageConfig::default(),
            bounding,
        );
        assert!(matches!(
            backend.render(&away, &geometry),
            Err(RenderError::Backend(_))
        ));
    }
}
