//! Seeded parameter sampling for ring geometry and camera poses.
//!
//! Draw order is a documented contract, not an accident of call sequencing:
//! a sample's RNG is seeded exactly once, geometry fields are drawn first
//! (inner diameter, band width, thickness), and each camera attempt then
//! draws yaw, pitch, distance multiplier, and jitter x/y/z — in that order.
//! Re-running with the same seed reproduces the identical stream.

use nalgebra::Vector3;
use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::config::{CameraConfig, ConfigError, GeometryConfig};
use crate::scene::BoundingInfo;

/// Ring geometry for one sample, in millimeters.
///
/// Drawn once per sample index and held fixed while camera poses are
/// resampled; consumed by the external deformation collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeometryParams {
    /// Inner-hole diameter.
    pub inner_diameter_mm: f64,
    /// Band width (radial wall of the annulus).
    pub band_width_mm: f64,
    /// Thickness (height above the table).
    pub thickness_mm: f64,
}

impl GeometryParams {
    /// Outer diameter of the annulus.
    pub fn outer_diameter_mm(&self) -> f64 {
        self.inner_diameter_mm + 2.0 * self.band_width_mm
    }
}

/// Sampled spherical camera parameters for one attempt.
///
/// The pose itself derives from these through [`build_pose`]; keeping the
/// spherical form around lets the auto-corrector nudge distance and pitch
/// deterministically without re-deriving them from a matrix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SampledCamera {
    /// Azimuth in degrees, [0, 360).
    pub yaw_deg: f64,
    /// Elevation above horizontal in degrees, inside (0, 90).
    pub pitch_deg: f64,
    /// Camera distance as a multiple of the bounding-sphere radius.
    pub distance_multiplier: f64,
    /// Look-at offset from the object center, world units (≤ 10% of radius
    /// per component).
    pub look_at_jitter: [f64; 3],
}

impl SampledCamera {
    /// Absolute camera distance for the given bounding radius.
    pub fn distance(&self, radius: f64) -> f64 {
        self.distance_multiplier * radius
    }
}

/// Draw ring geometry from the configured ranges.
///
/// Field order: inner diameter, band width, thickness. Fails with a
/// [`ConfigError`] when a range is inverted or admits non-positive geometry.
pub fn sample_geometry(
    rng: &mut impl rand::Rng,
    config: &GeometryConfig,
) -> Result<GeometryParams, ConfigError> {
    config.validate()?;
    Ok(GeometryParams {
        inner_diameter_mm: config.inner_diameter_mm.sample(rng),
        band_width_mm: config.band_width_mm.sample(rng),
        thickness_mm: config.thickness_mm.sample(rng),
    })
}

/// Draw one camera candidate from the hemisphere above the table.
///
/// Field order: yaw, pitch, distance multiplier, jitter x/y/z. The distance
/// multiplier is resolved against `bounding.radius` only when the pose is
/// built, keeping camera ranges independent of scene scale.
pub fn sample_camera(
    rng: &mut impl rand::Rng,
    bounding: &BoundingInfo,
    config: &CameraConfig,
) -> SampledCamera {
    let yaw_deg = config.yaw_deg.sample(rng);
    let pitch_deg = config.pitch_deg.sample(rng);
    let distance_multiplier = config.distance_multiplier.sample(rng);

    let max_jitter = config.look_at_jitter_fraction * bounding.radius;
    let jitter_range = crate::config::ValueRange::new(-max_jitter, max_jitter);
    let look_at_jitter = [
        jitter_range.sample(rng),
        jitter_range.sample(rng),
        jitter_range.sample(rng),
    ];

    SampledCamera {
        yaw_deg,
        pitch_deg,
        distance_multiplier,
        look_at_jitter,
    }
}

/// Convert spherical camera parameters into a world-space look-at pose.
///
/// The camera sits on the hemisphere around the object center at
/// `distance_multiplier × radius` and aims at the jittered center, up locked
/// to world +Z. Returns `None` for a degenerate view direction, which the
/// caller treats as an invalid projection.
pub fn build_pose(camera: &SampledCamera, bounding: &BoundingInfo) -> Option<CameraPose> {
    let center = bounding.center();
    let distance = camera.distance(bounding.radius);

    let yaw = camera.yaw_deg.to_radians();
    let pitch = camera.pitch_deg.to_radians();
    let offset = Vector3::new(
        distance * pitch.cos() * yaw.cos(),
        distance * pitch.cos() * yaw.sin(),
        distance * pitch.sin(),
    );

    let jitter = Vector3::from(camera.look_at_jitter);
    CameraPose::look_at(center + offset, center + jitter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::unit_box;
    use approx::assert_relative_eq;
    use nalgebra::Point3;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn geometry_respects_ranges_and_order_is_stable() {
        let cfg = GeometryConfig::default();
        let mut rng = StdRng::seed_from_u64(99);
        let g = sample_geometry(&mut rng, &cfg).expect("valid config");
        assert!(cfg.inner_diameter_mm.contains(g.inner_diameter_mm));
        assert!(cfg.band_width_mm.contains(g.band_width_mm));
        assert!(cfg.thickness_mm.contains(g.thickness_mm));

        let mut rng2 = StdRng::seed_from_u64(99);
        let g2 = sample_geometry(&mut rng2, &cfg).expect("valid config");
        assert_eq!(g, g2);
    }

    #[test]
    fn geometry_rejects_inverted_range() {
        let mut cfg = GeometryConfig::default();
        cfg.thickness_mm = crate::config::ValueRange::new(4.0, 1.0);
        let mut rng = StdRng::seed_from_u64(1);
        assert!(matches!(
            sample_geometry(&mut rng, &cfg),
            Err(ConfigError::InvertedRange { .. })
        ));
    }

    #[test]
    fn camera_stream_is_reproducible_after_geometry() {
        // The per-sample contract: geometry first, then any number of camera
        // draws continuing the same stream.
        let bounding = unit_box();
        let gcfg = GeometryConfig::default();
        let ccfg = CameraConfig::default();

        let draw = |seed: u64| {
            let mut rng = StdRng::seed_from_u64(seed);
            let g = sample_geometry(&mut rng, &gcfg).expect("valid");
            let c1 = sample_camera(&mut rng, &bounding, &ccfg);
            let c2 = sample_camera(&mut rng, &bounding, &ccfg);
            (g, c1, c2)
        };

        assert_eq!(draw(7), draw(7));
        assert_ne!(draw(7).1, draw(8).1);
    }

    #[test]
    fn camera_fields_respect_ranges() {
        let bounding = unit_box();
        let cfg = CameraConfig::default();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            let c = sample_camera(&mut rng, &bounding, &cfg);
            assert!((0.0..360.0).contains(&c.yaw_deg));
            assert!(cfg.pitch_deg.contains(c.pitch_deg));
            assert!(cfg.distance_multiplier.contains(c.distance_multiplier));
            let max_jitter = cfg.look_at_jitter_fraction * bounding.radius;
            for j in c.look_at_jitter {
                assert!(j.abs() <= max_jitter);
            }
        }
    }

    #[test]
    fn pose_sits_on_hemisphere_at_resolved_distance() {
        let bounding = unit_box();
        let camera = SampledCamera {
            yaw_deg: 0.0,
            pitch_deg: 45.0,
            distance_multiplier: 10.0,
            look_at_jitter: [0.0; 3],
        };
        let pose = build_pose(&camera, &bounding).expect("valid pose");
        let d = camera.distance(bounding.radius);
        assert_relative_eq!(pose.position.x, d * 45f64.to_radians().cos(), epsilon = 1e-12);
        assert_relative_eq!(pose.position.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pose.position.z, d * 45f64.to_radians().sin(), epsilon = 1e-12);
        assert_relative_eq!(pose.look_at, Point3::origin(), epsilon = 1e-12);
        assert!(pose.position.z > bounding.table_plane_z());
    }

    #[test]
    fn jitter_shifts_the_look_at_point() {
        let bounding = unit_box();
        let camera = SampledCamera {
            yaw_deg: 120.0,
            pitch_deg: 50.0,
            distance_multiplier: 12.0,
            look_at_jitter: [0.02, -0.03, 0.01],
        };
        let pose = build_pose(&camera, &bounding).expect("valid pose");
        assert_relative_eq!(
            pose.look_at,
            Point3::new(0.02, -0.03, 0.01),
            epsilon = 1e-12
        );
    }
}
