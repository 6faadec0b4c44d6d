//! Run configuration: sampling ranges, framing constraints, validation.
//!
//! All knobs are plain serde-serializable data so the effective configuration
//! can be written verbatim into the run manifest. `DatasetConfig::validate`
//! is called once, before any sampling starts; everything downstream may
//! assume a validated config.

use serde::{Deserialize, Serialize};

// ── Error type ─────────────────────────────────────────────────────────────

/// Fatal configuration errors.
///
/// Any of these aborts the whole run before the first sample is drawn.
/// Recoverable per-attempt conditions are [`crate::validate::RejectionReason`]
/// values, never errors.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    /// A `[min, max]` range with `min > max` or a non-finite bound.
    InvertedRange {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },
    /// A geometry range that can produce a non-positive dimension.
    NonPositiveGeometry {
        /// Dotted path of the offending field.
        field: &'static str,
        /// Configured minimum.
        min: f64,
    },
    /// Pitch range leaving the open interval (0°, 90°).
    PitchOutOfBounds {
        /// Configured minimum pitch in degrees.
        min: f64,
        /// Configured maximum pitch in degrees.
        max: f64,
    },
    /// Look-at jitter fraction outside [0, 0.1].
    JitterOutOfBounds {
        /// Configured jitter fraction of the bounding radius.
        fraction: f64,
    },
    /// Non-positive focal length or sensor width.
    DegenerateIntrinsics {
        /// Focal length in millimeters.
        focal_length_mm: f64,
        /// Sensor width in millimeters.
        sensor_width_mm: f64,
    },
    /// Zero-sized output image.
    BadImageSize {
        /// Image width in pixels.
        width: u32,
        /// Image height in pixels.
        height: u32,
    },
    /// `max_attempts` of zero would make every sample exhaust immediately.
    ZeroAttempts,
    /// The named object is absent from the scene.
    MissingObject {
        /// Requested object name.
        name: String,
    },
    /// The object exists but has no recognized parametric inner-diameter control.
    MissingDiameterControl {
        /// Requested object name.
        name: String,
    },
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvertedRange { field, min, max } => {
                write!(f, "inverted range for {}: min {} > max {}", field, min, max)
            }
            Self::NonPositiveGeometry { field, min } => {
                write!(f, "{} must stay positive, configured min is {}", field, min)
            }
            Self::PitchOutOfBounds { min, max } => {
                write!(f, "pitch range [{}, {}] must lie inside (0, 90) degrees", min, max)
            }
            Self::JitterOutOfBounds { fraction } => {
                write!(f, "look-at jitter fraction {} outside [0, 0.1]", fraction)
            }
            Self::DegenerateIntrinsics {
                focal_length_mm,
                sensor_width_mm,
            } => write!(
                f,
                "degenerate intrinsics: focal {} mm, sensor width {} mm",
                focal_length_mm, sensor_width_mm
            ),
            Self::BadImageSize { width, height } => {
                write!(f, "image size {}x{} must be non-zero", width, height)
            }
            Self::ZeroAttempts => write!(f, "max_attempts must be at least 1"),
            Self::MissingObject { name } => write!(f, "object '{}' not found in scene", name),
            Self::MissingDiameterControl { name } => write!(
                f,
                "object '{}' has no recognized inner-diameter control",
                name
            ),
        }
    }
}

impl std::error::Error for ConfigError {}

// ── Ranges ─────────────────────────────────────────────────────────────────

/// Closed `[min, max]` interval for a sampled scalar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ValueRange {
    /// Lower bound (inclusive).
    pub min: f64,
    /// Upper bound. Sampling is half-open except for degenerate ranges.
    pub max: f64,
}

impl ValueRange {
    /// Construct a range.
    pub fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    /// Reject inverted or non-finite ranges.
    pub fn validate(&self, field: &'static str) -> Result<(), ConfigError> {
        if !self.min.is_finite() || !self.max.is_finite() || self.min > self.max {
            return Err(ConfigError::InvertedRange {
                field,
                min: self.min,
                max: self.max,
            });
        }
        Ok(())
    }

    /// Midpoint of the range.
    pub fn midpoint(&self) -> f64 {
        0.5 * (self.min + self.max)
    }

    /// Clamp `v` into the range.
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    /// Whether `v` lies inside the range (inclusive).
    pub fn contains(&self, v: f64) -> bool {
        v >= self.min && v <= self.max
    }

    /// Draw uniformly from `[min, max)`; a degenerate range returns `min`.
    pub(crate) fn sample(&self, rng: &mut impl rand::Rng) -> f64 {
        if self.max <= self.min {
            self.min
        } else {
            rng.gen_range(self.min..self.max)
        }
    }
}

// ── Section configs ────────────────────────────────────────────────────────

/// Ring geometry sampling ranges, in millimeters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeometryConfig {
    /// Inner-hole diameter range.
    pub inner_diameter_mm: ValueRange,
    /// Band width range (radial wall of the annulus).
    pub band_width_mm: ValueRange,
    /// Thickness range (height above the table).
    pub thickness_mm: ValueRange,
}

impl Default for GeometryConfig {
    fn default() -> Self {
        Self {
            inner_diameter_mm: ValueRange::new(10.0, 30.0),
            band_width_mm: ValueRange::new(2.0, 8.0),
            thickness_mm: ValueRange::new(1.0, 4.0),
        }
    }
}

impl GeometryConfig {
    /// Reject inverted ranges and ranges that allow non-positive geometry.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let fields: [(&'static str, &ValueRange); 3] = [
            ("geometry.inner_diameter_mm", &self.inner_diameter_mm),
            ("geometry.band_width_mm", &self.band_width_mm),
            ("geometry.thickness_mm", &self.thickness_mm),
        ];
        for (name, range) in fields {
            range.validate(name)?;
            if range.min <= 0.0 {
                return Err(ConfigError::NonPositiveGeometry {
                    field: name,
                    min: range.min,
                });
            }
        }
        Ok(())
    }
}

/// Camera pose sampling ranges.
///
/// Distances are relative to the object's bounding-sphere radius so the
/// camera ranges stay independent of absolute scene scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    /// Yaw (azimuth) range in degrees; sampled half-open.
    pub yaw_deg: ValueRange,
    /// Pitch (elevation above horizontal) range in degrees, inside (0, 90).
    pub pitch_deg: ValueRange,
    /// Camera distance as a multiple of the bounding-sphere radius.
    pub distance_multiplier: ValueRange,
    /// Maximum look-at jitter as a fraction of the bounding radius (≤ 0.1).
    pub look_at_jitter_fraction: f64,
    /// Camera roll. Kept at zero; the flag exists for config compatibility.
    pub allow_roll: bool,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            yaw_deg: ValueRange::new(0.0, 360.0),
            pitch_deg: ValueRange::new(25.0, 75.0),
            distance_multiplier: ValueRange::new(10.0, 35.0),
            look_at_jitter_fraction: 0.1,
            allow_roll: false,
        }
    }
}

impl CameraConfig {
    /// Validate all camera ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.yaw_deg.validate("camera.yaw_deg")?;
        self.pitch_deg.validate("camera.pitch_deg")?;
        self.distance_multiplier
            .validate("camera.distance_multiplier")?;
        if self.pitch_deg.min <= 0.0 || self.pitch_deg.max >= 90.0 {
            return Err(ConfigError::PitchOutOfBounds {
                min: self.pitch_deg.min,
                max: self.pitch_deg.max,
            });
        }
        if self.distance_multiplier.min <= 0.0 {
            return Err(ConfigError::InvertedRange {
                field: "camera.distance_multiplier",
                min: self.distance_multiplier.min,
                max: self.distance_multiplier.max,
            });
        }
        if !(0.0..=0.1).contains(&self.look_at_jitter_fraction) {
            return Err(ConfigError::JitterOutOfBounds {
                fraction: self.look_at_jitter_fraction,
            });
        }
        Ok(())
    }
}

/// Visibility and framing constraints, in fractions of the image dimensions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct VisibilityConfig {
    /// Required margin between every projected corner and the nearest edge.
    pub edge_margin: f64,
    /// Minimum projected bounding-box extent, max of width/height fraction.
    pub min_projected_size: f64,
    /// Maximum projected bounding-box extent.
    pub max_projected_size: f64,
}

impl Default for VisibilityConfig {
    fn default() -> Self {
        Self {
            edge_margin: 0.07,
            min_projected_size: 0.20,
            max_projected_size: 0.35,
        }
    }
}

impl VisibilityConfig {
    /// Validate margin and size fractions.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..0.5).contains(&self.edge_margin) {
            return Err(ConfigError::InvertedRange {
                field: "visibility.edge_margin",
                min: self.edge_margin,
                max: 0.5,
            });
        }
        if self.min_projected_size > self.max_projected_size
            || self.min_projected_size <= 0.0
            || !self.min_projected_size.is_finite()
            || !self.max_projected_size.is_finite()
        {
            return Err(ConfigError::InvertedRange {
                field: "visibility.projected_size",
                min: self.min_projected_size,
                max: self.max_projected_size,
            });
        }
        Ok(())
    }
}

/// Rejection-sampling budget.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Maximum pose attempts per sample before the sample is exhausted.
    pub max_attempts: u32,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self { max_attempts: 50 }
    }
}

impl SamplingConfig {
    /// Reject a zero attempt budget.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_attempts == 0 {
            return Err(ConfigError::ZeroAttempts);
        }
        Ok(())
    }
}

/// Output image dimensions in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ImageConfig {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for ImageConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
        }
    }
}

impl ImageConfig {
    /// Reject zero-sized images.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.width == 0 || self.height == 0 {
            return Err(ConfigError::BadImageSize {
                width: self.width,
                height: self.height,
            });
        }
        Ok(())
    }
}

// ── Top-level config ───────────────────────────────────────────────────────

/// Complete configuration for one dataset-generation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// Name of the ring object supplied by the scene source.
    pub object_name: String,
    /// Base seed; per-sample seeds derive from this, the split, and the index.
    pub base_seed: u64,
    /// Number of sample indices to process.
    pub num_samples: usize,
    /// Ring geometry sampling ranges.
    pub geometry: GeometryConfig,
    /// Camera pose sampling ranges.
    pub camera: CameraConfig,
    /// Visibility and framing constraints.
    pub visibility: VisibilityConfig,
    /// Rejection-sampling budget.
    pub sampling: SamplingConfig,
    /// Output image dimensions.
    pub image: ImageConfig,
    /// Fixed camera intrinsics; configured once, logged, never sampled.
    pub intrinsics: crate::camera::CameraIntrinsics,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            object_name: "ring".to_string(),
            base_seed: 42,
            num_samples: 100,
            geometry: GeometryConfig::default(),
            camera: CameraConfig::default(),
            visibility: VisibilityConfig::default(),
            sampling: SamplingConfig::default(),
            image: ImageConfig::default(),
            intrinsics: crate::camera::CameraIntrinsics::default(),
        }
    }
}

impl DatasetConfig {
    /// Validate every section. Called once before sampling starts.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.geometry.validate()?;
        self.camera.validate()?;
        self.visibility.validate()?;
        self.sampling.validate()?;
        self.image.validate()?;
        if !self.intrinsics.is_valid() {
            return Err(ConfigError::DegenerateIntrinsics {
                focal_length_mm: self.intrinsics.focal_length_mm,
                sensor_width_mm: self.intrinsics.sensor_width_mm,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn default_config_validates() {
        DatasetConfig::default().validate().expect("defaults valid");
    }

    #[test]
    fn inverted_range_is_rejected() {
        let mut cfg = DatasetConfig::default();
        cfg.camera.pitch_deg = ValueRange::new(70.0, 25.0);
        match cfg.validate() {
            Err(ConfigError::InvertedRange { field, .. }) => {
                assert_eq!(field, "camera.pitch_deg")
            }
            other => panic!("expected InvertedRange, got {:?}", other),
        }
    }

    #[test]
    fn non_positive_geometry_is_rejected() {
        let mut cfg = DatasetConfig::default();
        cfg.geometry.band_width_mm = ValueRange::new(0.0, 5.0);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::NonPositiveGeometry { .. })
        ));
    }

    #[test]
    fn pitch_must_stay_inside_open_interval() {
        let mut cfg = DatasetConfig::default();
        cfg.camera.pitch_deg = ValueRange::new(25.0, 90.0);
        assert!(matches!(
            cfg.validate(),
            Err(ConfigError::PitchOutOfBounds { .. })
        ));
    }

    #[test]
    fn equal_size_bounds_are_allowed() {
        // Degenerate (unreachable) size windows are a legitimate stress
        // configuration; they must validate and lead to exhaustion, not error.
        let mut cfg = DatasetConfig::default();
        cfg.visibility.min_projected_size = 0.9;
        cfg.visibility.max_projected_size = 0.9;
        cfg.validate().expect("degenerate size window is valid");
    }

    #[test]
    fn degenerate_range_samples_its_minimum() {
        let mut rng = StdRng::seed_from_u64(7);
        let r = ValueRange::new(3.5, 3.5);
        assert_eq!(r.sample(&mut rng), 3.5);
    }

    #[test]
    fn config_roundtrips_through_json() {
        let cfg = DatasetConfig::default();
        let json = serde_json::to_string(&cfg).expect("serialize");
        let back: DatasetConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(cfg, back);
    }

    #[test]
    fn partial_json_fills_defaults() {
        let cfg: DatasetConfig =
            serde_json::from_str(r#"{"base_seed": 7, "num_samples": 3}"#).expect("parse");
        assert_eq!(cfg.base_seed, 7);
        assert_eq!(cfg.num_samples, 3);
        assert_eq!(cfg.camera, CameraConfig::default());
    }
}
