//! Scene introspection: world-space bounding geometry of the target object.
//!
//! The scene itself (meshes, materials, the actual deformation of the ring)
//! lives outside this crate. The sampling core only needs the object's
//! axis-aligned bounding box and bounding-sphere radius, supplied through the
//! [`SceneSource`] trait by whatever hosts the 3D scene.

use nalgebra::Point3;

use crate::config::{ConfigError, GeometryConfig};

/// World-space bounding geometry of the target object. Read-only input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingInfo {
    /// Minimum corner of the axis-aligned bounding box.
    pub min: Point3<f64>,
    /// Maximum corner of the axis-aligned bounding box.
    pub max: Point3<f64>,
    /// Bounding-sphere radius, centered on the box center.
    pub radius: f64,
}

impl BoundingInfo {
    /// Build from AABB corners; the bounding-sphere radius is the half
    /// diagonal of the box.
    pub fn from_aabb(min: Point3<f64>, max: Point3<f64>) -> Self {
        let radius = 0.5 * (max - min).norm();
        Self { min, max, radius }
    }

    /// Center of the bounding box.
    pub fn center(&self) -> Point3<f64> {
        Point3::from((self.min.coords + self.max.coords) * 0.5)
    }

    /// Height of the surface the object rests on: the box's minimum z.
    pub fn table_plane_z(&self) -> f64 {
        self.min.z
    }

    /// All 8 corners of the bounding box.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let (lo, hi) = (self.min, self.max);
        [
            Point3::new(lo.x, lo.y, lo.z),
            Point3::new(hi.x, lo.y, lo.z),
            Point3::new(lo.x, hi.y, lo.z),
            Point3::new(hi.x, hi.y, lo.z),
            Point3::new(lo.x, lo.y, hi.z),
            Point3::new(hi.x, lo.y, hi.z),
            Point3::new(lo.x, hi.y, hi.z),
            Point3::new(hi.x, hi.y, hi.z),
        ]
    }
}

/// One introspectable object of a scene.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SceneObject {
    /// World-space bounding geometry.
    pub bounding: BoundingInfo,
    /// Whether the object exposes a parametric inner-diameter control that
    /// the deformation collaborator can drive.
    pub has_inner_diameter_control: bool,
}

/// Supplier of bounding geometry for named scene objects.
///
/// Implementations must fail loudly — a missing object or one without a
/// recognized inner-diameter control is a configuration error that aborts
/// the run before any sampling starts.
pub trait SceneSource {
    /// Bounding geometry for `object_name`.
    fn bounding_info(&self, object_name: &str) -> Result<BoundingInfo, ConfigError>;
}

/// In-memory scene used by tests and the synthetic CLI mode.
#[derive(Debug, Clone, Default)]
pub struct StaticScene {
    objects: Vec<(String, SceneObject)>,
}

impl StaticScene {
    /// Empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an object.
    pub fn insert(&mut self, name: impl Into<String>, object: SceneObject) {
        let name = name.into();
        self.objects.retain(|(n, _)| *n != name);
        self.objects.push((name, object));
    }

    /// Scene holding a single ring whose bounding box is derived from the
    /// nominal (midpoint) geometry ranges, resting on the z = 0 plane.
    ///
    /// World units are millimeters, matching the geometry configuration.
    pub fn with_ring(name: impl Into<String>, geometry: &GeometryConfig) -> Self {
        let outer_radius =
            0.5 * geometry.inner_diameter_mm.midpoint() + geometry.band_width_mm.midpoint();
        let thickness = geometry.thickness_mm.midpoint();
        let bounding = BoundingInfo::from_aabb(
            Point3::new(-outer_radius, -outer_radius, 0.0),
            Point3::new(outer_radius, outer_radius, thickness),
        );
        let mut scene = Self::new();
        scene.insert(
            name,
            SceneObject {
                bounding,
                has_inner_diameter_control: true,
            },
        );
        scene
    }
}

impl SceneSource for StaticScene {
    fn bounding_info(&self, object_name: &str) -> Result<BoundingInfo, ConfigError> {
        let object = self
            .objects
            .iter()
            .find(|(n, _)| n == object_name)
            .map(|(_, o)| o)
            .ok_or_else(|| ConfigError::MissingObject {
                name: object_name.to_string(),
            })?;
        if !object.has_inner_diameter_control {
            return Err(ConfigError::MissingDiameterControl {
                name: object_name.to_string(),
            });
        }
        Ok(object.bounding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn radius_is_half_diagonal() {
        let b = BoundingInfo::from_aabb(Point3::new(-0.5, -0.5, -0.5), Point3::new(0.5, 0.5, 0.5));
        assert_relative_eq!(b.radius, 3.0f64.sqrt() / 2.0, epsilon = 1e-12);
        assert_relative_eq!(b.center(), Point3::origin(), epsilon = 1e-12);
        assert_relative_eq!(b.table_plane_z(), -0.5, epsilon = 1e-12);
    }

    #[test]
    fn corners_cover_all_sign_combinations() {
        let b = BoundingInfo::from_aabb(Point3::new(0.0, 1.0, 2.0), Point3::new(3.0, 4.0, 5.0));
        let corners = b.corners();
        assert_eq!(corners.len(), 8);
        for c in &corners {
            assert!(c.x == 0.0 || c.x == 3.0);
            assert!(c.y == 1.0 || c.y == 4.0);
            assert!(c.z == 2.0 || c.z == 5.0);
        }
        let unique: std::collections::HashSet<_> = corners
            .iter()
            .map(|c| (c.x.to_bits(), c.y.to_bits(), c.z.to_bits()))
            .collect();
        assert_eq!(unique.len(), 8);
    }

    #[test]
    fn missing_object_fails_loudly() {
        let scene = StaticScene::new();
        assert!(matches!(
            scene.bounding_info("ring"),
            Err(ConfigError::MissingObject { .. })
        ));
    }

    #[test]
    fn object_without_diameter_control_is_rejected() {
        let mut scene = StaticScene::new();
        scene.insert(
            "prop",
            SceneObject {
                bounding: BoundingInfo::from_aabb(Point3::origin(), Point3::new(1.0, 1.0, 1.0)),
                has_inner_diameter_control: false,
            },
        );
        assert!(matches!(
            scene.bounding_info("prop"),
            Err(ConfigError::MissingDiameterControl { .. })
        ));
    }

    #[test]
    fn ring_scene_rests_on_table_plane() {
        let scene = StaticScene::with_ring("ring", &GeometryConfig::default());
        let b = scene.bounding_info("ring").expect("ring present");
        assert_relative_eq!(b.table_plane_z(), 0.0, epsilon = 1e-12);
        // Nominal outer radius: 20/2 + 5 = 15 mm.
        assert_relative_eq!(b.max.x, 15.0, epsilon = 1e-12);
        assert!(b.radius > 15.0);
    }
}
