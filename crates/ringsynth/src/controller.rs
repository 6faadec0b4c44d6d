//! Bounded rejection-sampling loop: one outcome per sample index.
//!
//! The loop is an explicit state machine with a single transition function,
//! so each transition is unit-testable in isolation. Per sample: geometry is
//! drawn once, then camera candidates are drawn from the same seeded stream
//! until one passes validation (possibly after a single correction nudge),
//! gets rendered and measured, or the attempt budget runs out. The central
//! invariant: attempts are strictly bounded and counted — no sample blocks
//! indefinitely.

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::camera::CameraPose;
use crate::config::DatasetConfig;
use crate::correct::correct;
use crate::measure::measure_inner_diameter_px;
use crate::record::{CameraExtrinsics, SampleRecord};
use crate::render::RenderBackend;
use crate::run::RunError;
use crate::sample::{build_pose, sample_camera, sample_geometry, GeometryParams, SampledCamera};
use crate::scene::BoundingInfo;
use crate::validate::{validate, RejectionReason, ValidationResult};

/// Per-reason rejection counters for one run (or one sample).
///
/// An explicit aggregator, returned alongside each outcome and merged across
/// parallel workers — never a hidden global. Diagnostics only: dataset
/// correctness never depends on these counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectionLog {
    /// Attempts rejected as `clipped`.
    pub clipped: u64,
    /// Attempts rejected as `too_small_in_frame`.
    pub too_small_in_frame: u64,
    /// Attempts rejected as `too_large_in_frame`.
    pub too_large_in_frame: u64,
    /// Attempts rejected as `below_table_plane`.
    pub below_table_plane: u64,
    /// Attempts rejected as `invalid_projection`.
    pub invalid_projection: u64,
    /// Attempts rejected because the rendered silhouette was unmeasurable.
    pub invalid_inner_diameter_measurement: u64,
}

impl RejectionLog {
    /// Count one rejection.
    pub fn record(&mut self, reason: RejectionReason) {
        *self.slot(reason) += 1;
    }

    /// Count for one reason.
    pub fn count(&self, reason: RejectionReason) -> u64 {
        match reason {
            RejectionReason::Clipped => self.clipped,
            RejectionReason::TooSmallInFrame => self.too_small_in_frame,
            RejectionReason::TooLargeInFrame => self.too_large_in_frame,
            RejectionReason::BelowTablePlane => self.below_table_plane,
            RejectionReason::InvalidProjection => self.invalid_projection,
            RejectionReason::InvalidInnerDiameterMeasurement => {
                self.invalid_inner_diameter_measurement
            }
        }
    }

    /// Total rejections across all reasons.
    pub fn total(&self) -> u64 {
        RejectionReason::ALL.iter().map(|&r| self.count(r)).sum()
    }

    /// Fold another log into this one.
    pub fn merge(&mut self, other: &RejectionLog) {
        for reason in RejectionReason::ALL {
            *self.slot(reason) += other.count(reason);
        }
    }

    fn slot(&mut self, reason: RejectionReason) -> &mut u64 {
        match reason {
            RejectionReason::Clipped => &mut self.clipped,
            RejectionReason::TooSmallInFrame => &mut self.too_small_in_frame,
            RejectionReason::TooLargeInFrame => &mut self.too_large_in_frame,
            RejectionReason::BelowTablePlane => &mut self.below_table_plane,
            RejectionReason::InvalidProjection => &mut self.invalid_projection,
            RejectionReason::InvalidInnerDiameterMeasurement => {
                &mut self.invalid_inner_diameter_measurement
            }
        }
    }
}

/// Terminal outcome of a sample that ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExhaustedSample {
    /// The per-sample seed.
    pub seed: u64,
    /// Attempts consumed (equals the configured maximum).
    pub attempts: u32,
    /// Reason of the final rejected attempt.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_reason: Option<RejectionReason>,
}

/// Exactly one of these is emitted per requested sample index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SampleOutcome {
    /// The sample was accepted within the attempt budget.
    Accepted(SampleRecord),
    /// The attempt budget ran out; recorded, never silently dropped.
    Exhausted(ExhaustedSample),
}

impl SampleOutcome {
    /// Whether this outcome carries an accepted record.
    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted(_))
    }

    /// The accepted record, if any.
    pub fn record(&self) -> Option<&SampleRecord> {
        match self {
            Self::Accepted(record) => Some(record),
            Self::Exhausted(_) => None,
        }
    }
}

// ── State machine ──────────────────────────────────────────────────────────

/// Loop states. `Validate.corrected` distinguishes the first validation of a
/// draw from the re-validation after the single correction nudge, which is
/// what bounds correction work by the outer attempt budget.
#[derive(Debug)]
enum LoopState {
    Draw,
    Validate {
        camera: SampledCamera,
        pose: CameraPose,
        corrected: bool,
    },
    Correct {
        camera: SampledCamera,
        result: ValidationResult,
    },
    Measure {
        camera: SampledCamera,
        pose: CameraPose,
        result: ValidationResult,
    },
    Finished(SampleOutcome),
}

struct SampleLoop<'a> {
    seed: u64,
    config: &'a DatasetConfig,
    bounding: &'a BoundingInfo,
    renderer: Option<&'a mut dyn RenderBackend>,
    rng: StdRng,
    geometry: GeometryParams,
    attempts: u32,
    log: RejectionLog,
    last_reason: Option<RejectionReason>,
}

impl<'a> SampleLoop<'a> {
    fn new(
        seed: u64,
        bounding: &'a BoundingInfo,
        config: &'a DatasetConfig,
        renderer: Option<&'a mut dyn RenderBackend>,
    ) -> Result<Self, RunError> {
        let mut rng = StdRng::seed_from_u64(seed);
        // Geometry is drawn exactly once per sample and held fixed while
        // camera candidates are resampled.
        let geometry = sample_geometry(&mut rng, &config.geometry)?;
        Ok(Self {
            seed,
            config,
            bounding,
            renderer,
            rng,
            geometry,
            attempts: 0,
            log: RejectionLog::default(),
            last_reason: None,
        })
    }

    /// The single authoritative transition function.
    fn step(&mut self, state: LoopState) -> Result<LoopState, RunError> {
        Ok(match state {
            LoopState::Draw => {
                if self.attempts >= self.config.sampling.max_attempts {
                    tracing::warn!(
                        seed = self.seed,
                        attempts = self.attempts,
                        last_reason = self.last_reason.map(|r| r.as_str()),
                        "sample exhausted its attempt budget"
                    );
                    LoopState::Finished(SampleOutcome::Exhausted(ExhaustedSample {
                        seed: self.seed,
                        attempts: self.attempts,
                        last_reason: self.last_reason,
                    }))
                } else {
                    self.attempts += 1;
                    let camera = sample_camera(&mut self.rng, self.bounding, &self.config.camera);
                    match build_pose(&camera, self.bounding) {
                        Some(pose) => LoopState::Validate {
                            camera,
                            pose,
                            corrected: false,
                        },
                        None => self.reject(RejectionReason::InvalidProjection),
                    }
                }
            }
            LoopState::Validate {
                camera,
                pose,
                corrected,
            } => {
                let result = validate(
                    &pose,
                    self.bounding,
                    self.config.intrinsics,
                    self.config.image,
                    &self.config.visibility,
                );
                if result.pass {
                    if self.renderer.is_some() {
                        LoopState::Measure {
                            camera,
                            pose,
                            result,
                        }
                    } else {
                        self.accept(camera, &pose, result, None)
                    }
                } else if corrected {
                    // One correction per attempt; a second failure spends
                    // the attempt.
                    self.reject(result.reason.unwrap_or(RejectionReason::InvalidProjection))
                } else {
                    LoopState::Correct { camera, result }
                }
            }
            LoopState::Correct { camera, result } => {
                let nudged = correct(&camera, &result, &self.config.camera);
                match build_pose(&nudged, self.bounding) {
                    Some(pose) => LoopState::Validate {
                        camera: nudged,
                        pose,
                        corrected: true,
                    },
                    None => self.reject(RejectionReason::InvalidProjection),
                }
            }
            LoopState::Measure {
                camera,
                pose,
                result,
            } => {
                let rendered = match self.renderer.as_deref_mut() {
                    Some(backend) => backend.render(&pose, &self.geometry)?,
                    None => return Ok(self.accept(camera, &pose, result, None)),
                };
                match measure_inner_diameter_px(&rendered.inner_mask) {
                    Ok(px) => self.accept(camera, &pose, result, Some(px)),
                    Err(err) => {
                        tracing::debug!(seed = self.seed, error = %err, "measurement rejected");
                        self.reject(RejectionReason::InvalidInnerDiameterMeasurement)
                    }
                }
            }
            LoopState::Finished(outcome) => LoopState::Finished(outcome),
        })
    }

    fn reject(&mut self, reason: RejectionReason) -> LoopState {
        self.log.record(reason);
        self.last_reason = Some(reason);
        LoopState::Draw
    }

    fn accept(
        &mut self,
        camera: SampledCamera,
        pose: &CameraPose,
        result: ValidationResult,
        inner_diameter_px: Option<f64>,
    ) -> LoopState {
        tracing::debug!(
            seed = self.seed,
            attempts = self.attempts,
            "sample accepted"
        );
        LoopState::Finished(SampleOutcome::Accepted(SampleRecord {
            seed: self.seed,
            attempts: self.attempts,
            geometry: self.geometry,
            camera,
            distance: camera.distance(self.bounding.radius),
            extrinsics: CameraExtrinsics::from(pose),
            visibility: result,
            inner_diameter_px,
        }))
    }

    fn run(mut self) -> Result<(SampleOutcome, RejectionLog), RunError> {
        let mut state = LoopState::Draw;
        loop {
            match self.step(state)? {
                LoopState::Finished(outcome) => return Ok((outcome, self.log)),
                next => state = next,
            }
        }
    }
}

// ── Entry points ───────────────────────────────────────────────────────────

/// Produce one sample outcome without rendering (validation-only mode).
///
/// `inner_diameter_px` stays unset on accepted records.
pub fn produce_sample(
    seed: u64,
    bounding: &BoundingInfo,
    config: &DatasetConfig,
) -> Result<(SampleOutcome, RejectionLog), RunError> {
    SampleLoop::new(seed, bounding, config, None)?.run()
}

/// Produce one sample outcome with rendering and measurement.
///
/// A failed measurement counts as a rejection and resamples the camera; a
/// renderer failure is unrecoverable and propagates.
pub fn produce_sample_rendered(
    seed: u64,
    bounding: &BoundingInfo,
    config: &DatasetConfig,
    renderer: &mut dyn RenderBackend,
) -> Result<(SampleOutcome, RejectionLog), RunError> {
    SampleLoop::new(seed, bounding, config, Some(renderer))?.run()
}
