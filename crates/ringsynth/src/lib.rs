//! ringsynth — constrained stochastic sampling & measurement engine for
//! labeled ring image datasets.
//!
//! The crate produces, for every sample index, a valid, diverse, and
//! reproducible combination of ring geometry and camera pose, then extracts
//! the ground-truth label (inner-hole diameter in pixels) from rendered
//! evidence. The stages are:
//!
//! 1. **Seed** – stable per-sample seeds from (base seed, split, index).
//! 2. **Sample** – seeded geometry and hemisphere camera draws with a fixed,
//!    documented draw order.
//! 3. **Validate** – projected bounding-box margin/size/height checks with a
//!    fixed rejection-reason priority.
//! 4. **Correct** – one deterministic distance/pitch nudge per attempt.
//! 5. **Controller** – bounded state-machine rejection loop; one outcome per
//!    index, never an unbounded wait.
//! 6. **Measure** – silhouette boundary extraction and direct ellipse
//!    fitting; the major axis is the label.
//!
//! # Public API
//! [`plan_split`]/[`generate_split`] run whole splits; [`produce_sample`]
//! handles one index. The renderer and scene collaborators plug in through
//! [`RenderBackend`] and [`SceneSource`].

mod camera;
mod config;
mod controller;
mod correct;
mod ellipse;
mod measure;
mod record;
mod render;
mod run;
mod sample;
mod scene;
mod seed;
mod validate;

#[cfg(test)]
pub(crate) mod test_utils;

pub use camera::{CameraIntrinsics, CameraPose};
pub use config::{
    CameraConfig, ConfigError, DatasetConfig, GeometryConfig, ImageConfig, SamplingConfig,
    ValueRange, VisibilityConfig,
};
pub use controller::{
    produce_sample, produce_sample_rendered, ExhaustedSample, RejectionLog, SampleOutcome,
};
pub use correct::{correct, DISTANCE_STEP, PITCH_STEP_DEG};
pub use ellipse::{conic_to_ellipse, ellipse_to_conic, fit_ellipse_direct, ConicCoeffs, Ellipse};
pub use measure::{measure_inner_diameter_px, measure_inner_ellipse, MeasurementError};
pub use record::{CameraExtrinsics, SampleRecord};
pub use render::{RenderBackend, RenderError, RenderedSample, SilhouetteRenderer};
pub use run::{generate_split, plan_split, RunError, RunManifest, SplitOutput};
pub use sample::{build_pose, sample_camera, sample_geometry, GeometryParams, SampledCamera};
pub use scene::{BoundingInfo, SceneObject, SceneSource, StaticScene};
pub use seed::derive_sample_seed;
pub use validate::{validate, RejectionReason, ValidationResult};
