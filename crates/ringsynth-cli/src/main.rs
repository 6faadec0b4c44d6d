//! ringsynth CLI — dataset generation and silhouette measurement.

use clap::{Args, Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use ringsynth::{
    build_pose, measure_inner_diameter_px, DatasetConfig, RenderBackend, RunManifest,
    SampleOutcome, SceneSource, SilhouetteRenderer, SplitOutput, StaticScene,
};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ringsynth")]
#[command(about = "Generate labeled ring image datasets with constrained camera sampling")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full synthetic pipeline: sample, validate, render masks, measure.
    Generate(GenerateArgs),

    /// Sampling and validation only — vet a configuration without rendering.
    Validate(RunArgs),

    /// Measure the inner-hole diameter of a single silhouette mask.
    Measure {
        /// Path to a single-channel binary mask image.
        #[arg(long)]
        mask: PathBuf,
    },
}

#[derive(Debug, Clone, Args)]
struct RunArgs {
    /// Path to a JSON configuration file. CLI flags override file values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Output directory for annotations.jsonl and manifest.json.
    #[arg(long)]
    out: PathBuf,

    /// Split name used for seed derivation (train/val/test).
    #[arg(long, default_value = "train")]
    split: String,

    /// Number of sample indices to process.
    #[arg(long)]
    num_samples: Option<usize>,

    /// Base seed for the whole run.
    #[arg(long)]
    base_seed: Option<u64>,

    /// Name of the ring object in the scene.
    #[arg(long)]
    object: Option<String>,

    /// Maximum pose attempts per sample.
    #[arg(long)]
    max_attempts: Option<u32>,

    /// Output image width in pixels.
    #[arg(long)]
    image_width: Option<u32>,

    /// Output image height in pixels.
    #[arg(long)]
    image_height: Option<u32>,

    /// Required margin to the image edge, fraction of the image dimension.
    #[arg(long)]
    edge_margin: Option<f64>,

    /// Minimum projected bounding-box size fraction.
    #[arg(long)]
    min_projected_size: Option<f64>,

    /// Maximum projected bounding-box size fraction.
    #[arg(long)]
    max_projected_size: Option<f64>,

    /// Minimum camera pitch in degrees.
    #[arg(long)]
    pitch_min: Option<f64>,

    /// Maximum camera pitch in degrees.
    #[arg(long)]
    pitch_max: Option<f64>,

    /// Minimum camera distance multiplier (× bounding radius).
    #[arg(long)]
    distance_min: Option<f64>,

    /// Maximum camera distance multiplier (× bounding radius).
    #[arg(long)]
    distance_max: Option<f64>,
}

#[derive(Debug, Clone, Args)]
struct GenerateArgs {
    #[command(flatten)]
    run: RunArgs,

    /// Also write the ring and inner-hole mask PNGs per accepted sample.
    #[arg(long)]
    write_masks: bool,
}

impl RunArgs {
    /// Load the config file (or defaults) and apply CLI overrides on top.
    fn to_config(&self) -> CliResult<DatasetConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = std::fs::read_to_string(path).map_err(|e| -> CliError {
                    format!("failed to read config {}: {}", path.display(), e).into()
                })?;
                serde_json::from_str(&text).map_err(|e| -> CliError {
                    format!("invalid config {}: {}", path.display(), e).into()
                })?
            }
            None => DatasetConfig::default(),
        };

        if let Some(n) = self.num_samples {
            config.num_samples = n;
        }
        if let Some(seed) = self.base_seed {
            config.base_seed = seed;
        }
        if let Some(name) = &self.object {
            config.object_name = name.clone();
        }
        if let Some(attempts) = self.max_attempts {
            config.sampling.max_attempts = attempts;
        }
        if let Some(w) = self.image_width {
            config.image.width = w;
        }
        if let Some(h) = self.image_height {
            config.image.height = h;
        }
        if let Some(m) = self.edge_margin {
            config.visibility.edge_margin = m;
        }
        if let Some(s) = self.min_projected_size {
            config.visibility.min_projected_size = s;
        }
        if let Some(s) = self.max_projected_size {
            config.visibility.max_projected_size = s;
        }
        if let Some(p) = self.pitch_min {
            config.camera.pitch_deg.min = p;
        }
        if let Some(p) = self.pitch_max {
            config.camera.pitch_deg.max = p;
        }
        if let Some(d) = self.distance_min {
            config.camera.distance_multiplier.min = d;
        }
        if let Some(d) = self.distance_max {
            config.camera.distance_multiplier.max = d;
        }

        Ok(config)
    }
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Generate(args) => run_generate(&args),
        Commands::Validate(args) => run_validate(&args),
        Commands::Measure { mask } => run_measure(&mask),
    }
}

// ── validate ───────────────────────────────────────────────────────────────

fn run_validate(args: &RunArgs) -> CliResult<()> {
    let config = args.to_config()?;
    let scene = StaticScene::with_ring(&config.object_name, &config.geometry);

    tracing::info!(
        split = args.split,
        num_samples = config.num_samples,
        "validation-only run"
    );
    let output = ringsynth::plan_split(&config, &args.split, &scene)?;

    write_outputs(&args.out, &args.split, &config, &output, &[])?;
    report(&output);
    Ok(())
}

// ── generate ───────────────────────────────────────────────────────────────

fn run_generate(args: &GenerateArgs) -> CliResult<()> {
    let config = args.run.to_config()?;
    let scene = StaticScene::with_ring(&config.object_name, &config.geometry);
    let bounding = scene.bounding_info(&config.object_name)?;

    tracing::info!(
        split = args.run.split,
        num_samples = config.num_samples,
        "synthetic generation run"
    );
    let output = ringsynth::generate_split(&config, &args.run.split, &scene, || {
        SilhouetteRenderer::new(config.intrinsics, config.image, bounding)
    })?;

    let mask_paths = if args.write_masks {
        write_masks(&args.run.out, &args.run.split, &config, &output, bounding)?
    } else {
        Vec::new()
    };

    write_outputs(&args.run.out, &args.run.split, &config, &output, &mask_paths)?;
    report(&output);
    Ok(())
}

/// Re-render accepted samples and save their mask PNGs.
///
/// Rendering is deterministic, so reproducing the masks from the accepted
/// parameters keeps file I/O out of the parallel sampling loop.
fn write_masks(
    out_dir: &Path,
    split: &str,
    config: &DatasetConfig,
    output: &SplitOutput,
    bounding: ringsynth::BoundingInfo,
) -> CliResult<Vec<(usize, MaskPaths)>> {
    let masks_dir = out_dir.join("masks");
    std::fs::create_dir_all(&masks_dir)?;

    let mut renderer = SilhouetteRenderer::new(config.intrinsics, config.image, bounding);
    let mut paths = Vec::new();
    for (index, outcome) in output.outcomes.iter().enumerate() {
        let Some(record) = outcome.record() else {
            continue;
        };
        let pose = build_pose(&record.camera, &bounding).ok_or_else(|| -> CliError {
            format!("accepted camera for sample {} no longer builds a pose", index).into()
        })?;
        let rendered = renderer.render(&pose, &record.geometry)?;

        let inner = masks_dir.join(format!("{}_{:06}_inner.png", split, index));
        let ring = masks_dir.join(format!("{}_{:06}_ring.png", split, index));
        rendered.inner_mask.save(&inner)?;
        rendered.ring_mask.save(&ring)?;
        paths.push((
            index,
            MaskPaths {
                inner_mask_path: relative_display(&inner, out_dir),
                ring_mask_path: relative_display(&ring, out_dir),
            },
        ));
    }
    Ok(paths)
}

fn relative_display(path: &Path, base: &Path) -> String {
    path.strip_prefix(base).unwrap_or(path).display().to_string()
}

// ── measure ────────────────────────────────────────────────────────────────

fn run_measure(mask_path: &Path) -> CliResult<()> {
    let mask = image::open(mask_path)
        .map_err(|e| -> CliError {
            format!("failed to open mask {}: {}", mask_path.display(), e).into()
        })?
        .to_luma8();

    let diameter = measure_inner_diameter_px(&mask)?;
    println!("inner_diameter_px: {:.3}", diameter);
    Ok(())
}

// ── output writing ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, serde::Serialize)]
struct MaskPaths {
    inner_mask_path: String,
    ring_mask_path: String,
}

#[derive(serde::Serialize)]
struct AnnotationRecord<'a> {
    sample_index: usize,
    #[serde(flatten)]
    outcome: &'a SampleOutcome,
    #[serde(flatten)]
    masks: Option<&'a MaskPaths>,
}

/// Write `annotations.jsonl` (one record per requested index, exhausted
/// included) and `manifest.json`.
fn write_outputs(
    out_dir: &Path,
    split: &str,
    config: &DatasetConfig,
    output: &SplitOutput,
    mask_paths: &[(usize, MaskPaths)],
) -> CliResult<()> {
    std::fs::create_dir_all(out_dir)?;

    let annotations_path = out_dir.join("annotations.jsonl");
    let mut file = std::io::BufWriter::new(std::fs::File::create(&annotations_path)?);
    for (sample_index, outcome) in output.outcomes.iter().enumerate() {
        let masks = mask_paths
            .iter()
            .find(|(i, _)| *i == sample_index)
            .map(|(_, p)| p);
        let record = AnnotationRecord {
            sample_index,
            outcome,
            masks,
        };
        serde_json::to_writer(&mut file, &record)?;
        file.write_all(b"\n")?;
    }
    file.flush()?;
    tracing::info!("annotations written to {}", annotations_path.display());

    let manifest = RunManifest::new(config, split, output);
    let manifest_path = out_dir.join("manifest.json");
    std::fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;
    tracing::info!("manifest written to {}", manifest_path.display());

    Ok(())
}

fn report(output: &SplitOutput) {
    tracing::info!(
        accepted = output.accepted(),
        exhausted = output.exhausted(),
        rejections = output.rejections.total(),
        "run complete"
    );
    for reason in ringsynth::RejectionReason::ALL {
        let count = output.rejections.count(reason);
        if count > 0 {
            tracing::info!("  {}: {}", reason, count);
        }
    }
}
