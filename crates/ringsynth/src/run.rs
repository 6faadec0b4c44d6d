//! Run-level orchestration: a whole split of sample indices.
//!
//! Samples are embarrassingly parallel — each one depends only on
//! `(base_seed, split, index)` — so indices fan out across a rayon pool with
//! no shared mutable state. Per-sample rejection logs are merged after the
//! fact; outcome order follows index order, exactly one outcome per index.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::config::{ConfigError, DatasetConfig};
use crate::controller::{produce_sample, produce_sample_rendered, RejectionLog, SampleOutcome};
use crate::render::{RenderBackend, RenderError};
use crate::scene::SceneSource;
use crate::seed::derive_sample_seed;

/// Fatal run errors: bad configuration or an unrecoverable collaborator
/// failure. Per-attempt rejections and exhausted samples are outcomes, not
/// errors.
#[derive(Debug, Clone, PartialEq)]
pub enum RunError {
    /// Invalid configuration, missing scene object, or missing control.
    Config(ConfigError),
    /// The renderer collaborator failed.
    Render(RenderError),
}

impl std::fmt::Display for RunError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "configuration error: {}", e),
            Self::Render(e) => write!(f, "renderer error: {}", e),
        }
    }
}

impl std::error::Error for RunError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Config(e) => Some(e),
            Self::Render(e) => Some(e),
        }
    }
}

impl From<ConfigError> for RunError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

impl From<RenderError> for RunError {
    fn from(e: RenderError) -> Self {
        Self::Render(e)
    }
}

/// All outcomes of one split, in index order, plus the merged rejection log.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitOutput {
    /// One outcome per requested index.
    pub outcomes: Vec<SampleOutcome>,
    /// Rejection counts merged across all samples.
    pub rejections: RejectionLog,
}

impl SplitOutput {
    /// Number of accepted samples.
    pub fn accepted(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_accepted()).count()
    }

    /// Number of exhausted samples.
    pub fn exhausted(&self) -> usize {
        self.outcomes.len() - self.accepted()
    }
}

/// Run-level reproducibility manifest, written alongside the annotations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    /// Crate version that produced the run.
    pub version: String,
    /// Split name.
    pub split: String,
    /// Base seed.
    pub base_seed: u64,
    /// Requested sample count.
    pub num_samples: usize,
    /// Accepted sample count.
    pub accepted: usize,
    /// Exhausted sample count.
    pub exhausted: usize,
    /// Per-reason rejection counts across the whole run.
    pub rejections: RejectionLog,
    /// The complete effective configuration.
    pub config: DatasetConfig,
}

impl RunManifest {
    /// Summarize a finished split.
    pub fn new(config: &DatasetConfig, split: &str, output: &SplitOutput) -> Self {
        Self {
            version: env!("CARGO_PKG_VERSION").to_string(),
            split: split.to_string(),
            base_seed: config.base_seed,
            num_samples: config.num_samples,
            accepted: output.accepted(),
            exhausted: output.exhausted(),
            rejections: output.rejections,
            config: config.clone(),
        }
    }
}

/// Sampling + validation for every index of a split, without rendering.
///
/// Accepted records have no `inner_diameter_px`; use this to vet a
/// configuration before paying for renders.
pub fn plan_split(
    config: &DatasetConfig,
    split: &str,
    scene: &dyn SceneSource,
) -> Result<SplitOutput, RunError> {
    config.validate()?;
    let bounding = scene.bounding_info(&config.object_name)?;

    let results: Vec<(SampleOutcome, RejectionLog)> = (0..config.num_samples)
        .into_par_iter()
        .map(|index| {
            let seed = derive_sample_seed(config.base_seed, split, index as u64);
            produce_sample(seed, &bounding, config)
        })
        .collect::<Result<_, _>>()?;

    Ok(merge(split, results))
}

/// Full pipeline for every index of a split: sample, validate, render,
/// measure.
///
/// `make_renderer` is invoked per sample so workers never share a backend;
/// backends for the same configuration must render identically for the run
/// to be reproducible.
pub fn generate_split<R, F>(
    config: &DatasetConfig,
    split: &str,
    scene: &dyn SceneSource,
    make_renderer: F,
) -> Result<SplitOutput, RunError>
where
    R: RenderBackend,
    F: Fn() -> R + Sync,
{
    config.validate()?;
    let bounding = scene.bounding_info(&config.object_name)?;

    let results: Vec<(SampleOutcome, RejectionLog)> = (0..config.num_samples)
        .into_par_iter()
        .map(|index| {
            let seed = derive_sample_seed(config.base_seed, split, index as u64);
            let mut renderer = make_renderer();
            produce_sample_rendered(seed, &bounding, config, &mut renderer)
        })
        .collect::<Result<_, _>>()?;

    Ok(merge(split, results))
}

fn merge(split: &str, results: Vec<(SampleOutcome, RejectionLog)>) -> SplitOutput {
    let mut rejections = RejectionLog::default();
    let mut outcomes = Vec::with_capacity(results.len());
    for (outcome, log) in results {
        rejections.merge(&log);
        outcomes.push(outcome);
    }
    let output = SplitOutput {
        outcomes,
        rejections,
    };
    tracing::info!(
        split,
        accepted = output.accepted(),
        exhausted = output.exhausted(),
        rejections = output.rejections.total(),
        "split finished"
    );
    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GeometryConfig;
    use crate::render::SilhouetteRenderer;
    use crate::scene::{SceneSource as _, StaticScene};

    fn small_config() -> DatasetConfig {
        DatasetConfig {
            num_samples: 8,
            ..DatasetConfig::default()
        }
    }

    #[test]
    fn one_outcome_per_requested_index() {
        let config = small_config();
        let scene = StaticScene::with_ring("ring", &config.geometry);
        let output = plan_split(&config, "train", &scene).expect("run succeeds");
        assert_eq!(output.outcomes.len(), config.num_samples);
        assert_eq!(output.accepted() + output.exhausted(), config.num_samples);
    }

    #[test]
    fn parallel_runs_are_reproducible() {
        let config = small_config();
        let scene = StaticScene::with_ring("ring", &config.geometry);
        let a = plan_split(&config, "train", &scene).expect("run succeeds");
        let b = plan_split(&config, "train", &scene).expect("run succeeds");
        assert_eq!(a, b);
    }

    #[test]
    fn splits_draw_different_samples() {
        let config = small_config();
        let scene = StaticScene::with_ring("ring", &config.geometry);
        let train = plan_split(&config, "train", &scene).expect("run succeeds");
        let val = plan_split(&config, "val", &scene).expect("run succeeds");
        assert_ne!(train.outcomes, val.outcomes);
    }

    #[test]
    fn missing_object_aborts_before_sampling() {
        let config = small_config();
        let scene = StaticScene::new();
        match plan_split(&config, "train", &scene) {
            Err(RunError::Config(ConfigError::MissingObject { name })) => {
                assert_eq!(name, "ring")
            }
            other => panic!("expected missing-object error, got {:?}", other),
        }
    }

    #[test]
    fn invalid_config_aborts_before_sampling() {
        let mut config = small_config();
        config.sampling.max_attempts = 0;
        let scene = StaticScene::with_ring("ring", &config.geometry);
        assert!(matches!(
            plan_split(&config, "train", &scene),
            Err(RunError::Config(ConfigError::ZeroAttempts))
        ));
    }

    #[test]
    fn exhausted_run_accounts_every_attempt() {
        let mut config = small_config();
        config.num_samples = 3;
        config.visibility.min_projected_size = 0.9;
        config.visibility.max_projected_size = 0.9;
        let scene = StaticScene::with_ring("ring", &config.geometry);

        let output = plan_split(&config, "train", &scene).expect("run succeeds");
        assert_eq!(output.accepted(), 0);
        assert_eq!(output.exhausted(), 3);
        assert_eq!(
            output.rejections.total(),
            3 * u64::from(config.sampling.max_attempts)
        );
    }

    #[test]
    fn generated_split_measures_every_accepted_sample() {
        let mut config = small_config();
        config.num_samples = 4;
        config.geometry = GeometryConfig::default();
        let scene = StaticScene::with_ring("ring", &config.geometry);
        let bounding = scene.bounding_info("ring").expect("ring present");

        let output = generate_split(&config, "train", &scene, || {
            SilhouetteRenderer::new(config.intrinsics, config.image, bounding)
        })
        .expect("run succeeds");

        assert!(output.accepted() > 0, "expected accepted samples");
        for outcome in &output.outcomes {
            if let Some(record) = outcome.record() {
                assert!(record.inner_diameter_px.expect("measured") > 0.0);
            }
        }
    }

    #[test]
    fn manifest_summarizes_the_run() {
        let config = small_config();
        let scene = StaticScene::with_ring("ring", &config.geometry);
        let output = plan_split(&config, "train", &scene).expect("run succeeds");
        let manifest = RunManifest::new(&config, "train", &output);
        assert_eq!(manifest.split, "train");
        assert_eq!(manifest.num_samples, config.num_samples);
        assert_eq!(manifest.accepted + manifest.exhausted, config.num_samples);
        assert_eq!(manifest.version, env!("CARGO_PKG_VERSION"));

        let json = serde_json::to_string(&manifest).expect("serialize");
        let back: RunManifest = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(manifest, back);
    }
}
