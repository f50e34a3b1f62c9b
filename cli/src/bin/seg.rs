use clap::{Parser, Subcommand};
use cli::{evaluate_predictions, ClassifierKind, RunConfig};
use color_eyre::eyre::{eyre, Result};
use segmentation::{
    io::FileSink, ArtifactKind, ArtifactSink, BatchItem, BatchReport, BatchRunner, Classifier,
    InferenceEngine, Metric, NullSink, TilingConfig,
};
use std::path::{Path, PathBuf};
use strum::IntoEnumIterator;
use tracing::{debug, info, warn};
use tracing_subscriber::{self, EnvFilter};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the tile boxes covering an image of the given size
    Tiles {
        #[arg(long)]
        width: u32,
        #[arg(long)]
        height: u32,
        #[arg(long, default_value_t = segmentation::DEFAULT_CROP_SIZE)]
        crop_size: u32,
        #[arg(long, default_value_t = segmentation::DEFAULT_OVERLAP)]
        overlap: u32,
    },
    /// Run tiled inference on an image or a directory of images
    Infer {
        /// Path to a TOML or JSON run configuration
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Image file or directory (overrides the configuration)
        #[arg(short, long)]
        input: Option<PathBuf>,
        /// Output directory for artifacts
        #[arg(short, long)]
        output_dir: Option<PathBuf>,
        /// Ground truth mask file or directory
        #[arg(short, long)]
        ground_truth: Option<PathBuf>,
        /// Artifacts to write, e.g. `--artifact probability --artifact difference`
        #[arg(long = "artifact")]
        artifacts: Vec<ArtifactKind>,
        #[arg(long, value_enum)]
        classifier: Option<ClassifierKind>,
        /// Probability of the constant classifier
        #[arg(long)]
        probability: Option<f32>,
        #[arg(long)]
        threshold: Option<f32>,
        #[arg(long)]
        crop_size: Option<u32>,
        #[arg(long)]
        overlap: Option<u32>,
        /// Replace existing output files
        #[arg(long)]
        overwrite: bool,
        /// Classify the tiles of each image one after another
        #[arg(long)]
        sequential_tiles: bool,
        /// Process several images at once
        #[arg(long)]
        concurrent_images: bool,
        /// Write the batch report as JSON
        #[arg(long)]
        report: Option<PathBuf>,
    },
    /// Evaluate existing segmentation masks against ground truth
    Evaluate {
        /// Segmentation mask file or directory
        #[arg(short, long)]
        prediction: PathBuf,
        /// Ground truth mask file or directory
        #[arg(short, long)]
        ground_truth: PathBuf,
    },
    /// Print the JSON schema of the run configuration
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info"))
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Tiles {
            width,
            height,
            crop_size,
            overlap,
        } => {
            print_tiles(width, height, crop_size, overlap)?;
        }
        Commands::Infer {
            config,
            input,
            output_dir,
            ground_truth,
            artifacts,
            classifier,
            probability,
            threshold,
            crop_size,
            overlap,
            overwrite,
            sequential_tiles,
            concurrent_images,
            report,
        } => {
            let mut run = match (config, input) {
                (Some(path), input) => {
                    let mut run = RunConfig::from_file(&path)?;
                    if let Some(input) = input {
                        run.input = input;
                    }
                    run
                }
                (None, Some(input)) => RunConfig::new(input),
                (None, None) => return Err(eyre!("Either --config or --input is required")),
            };

            if output_dir.is_some() {
                run.output_dir = output_dir;
            }
            if ground_truth.is_some() {
                run.ground_truth = ground_truth;
            }
            if !artifacts.is_empty() {
                run.artifacts = artifacts;
            }
            if let Some(kind) = classifier {
                run.classifier.kind = kind;
            }
            if let Some(probability) = probability {
                run.classifier.probability = probability;
            }
            if let Some(threshold) = threshold {
                run.engine.threshold = threshold;
            }
            if let Some(crop_size) = crop_size {
                run.engine.tiling.crop_size = crop_size;
            }
            if let Some(overlap) = overlap {
                run.engine.tiling.overlap = overlap;
            }
            run.overwrite |= overwrite;
            run.concurrent_images |= concurrent_images;
            if sequential_tiles {
                run.engine.parallel_tiles = false;
            }

            let batch = tokio::task::spawn_blocking(move || infer(&run)).await??;
            log_report(&batch);

            if let Some(path) = report {
                std::fs::write(&path, batch.to_json()?)?;
                info!("Report written to {:?}", path);
            }
        }
        Commands::Evaluate {
            prediction,
            ground_truth,
        } => {
            evaluate(&prediction, &ground_truth)?;
        }
        Commands::Schema => {
            println!("{}", serde_json::to_string_pretty(&RunConfig::schema())?);
        }
    }

    Ok(())
}

fn print_tiles(width: u32, height: u32, crop_size: u32, overlap: u32) -> Result<()> {
    let tiling = TilingConfig::new(crop_size, overlap)?;
    let tiles = tiling.tiles(width, height)?;
    info!(
        "{} tiles of {}x{} (stride {}) for a {}x{} image",
        tiles.len(),
        crop_size,
        crop_size,
        tiling.stride(),
        width,
        height
    );
    for bbox in tiles {
        println!("{bbox}");
    }
    Ok(())
}

fn infer(run: &RunConfig) -> Result<BatchReport> {
    let items = run.batch_items()?;
    if items.is_empty() {
        warn!("No images found in {:?}", run.input);
    }

    let engine = InferenceEngine::builder(run.classifier.build()?)
        .config(run.engine)
        .on_progress(|done, total| debug!("Merged tile {}/{}", done, total))
        .build()?;
    info!(
        "Tiling with crop size {} and overlap {}, threshold {}",
        run.engine.tiling.crop_size, run.engine.tiling.overlap, run.engine.threshold
    );

    match &run.output_dir {
        Some(dir) => {
            let sink = FileSink::new(dir)?.with_overwrite(run.overwrite);
            run_batch(engine, sink, run, &items)
        }
        None => run_batch(engine, NullSink, run, &items),
    }
}

fn run_batch<C: Classifier, S: ArtifactSink>(
    engine: InferenceEngine<C>,
    sink: S,
    run: &RunConfig,
    items: &[BatchItem],
) -> Result<BatchReport> {
    let runner = BatchRunner::new(engine, sink)
        .with_artifacts(run.artifacts.iter().copied())
        .with_concurrent_images(run.concurrent_images);
    Ok(runner.run(items)?)
}

fn log_report(report: &BatchReport) {
    for outcome in &report.processed {
        info!("{}: {}x{}", outcome.id, outcome.width, outcome.height);
    }
    for failure in &report.failed {
        warn!("{} failed: {}", failure.id, failure.reason);
    }
    match &report.summary {
        Some(summary) => {
            info!(
                "Weighted over {} images ({} pixels):",
                summary.images, summary.total_pixels
            );
            for (metric, value) in &summary.means {
                info!("  {}: {:.4}", metric.label(), value);
            }
        }
        None => info!("No ground truth evaluated"),
    }
}

fn evaluate(prediction: &Path, ground_truth: &Path) -> Result<()> {
    let aggregator = evaluate_predictions(prediction, ground_truth)?;
    if aggregator.is_empty() {
        return Err(eyre!("No prediction could be paired with its ground truth"));
    }

    for (id, evaluation) in aggregator.evaluations() {
        let values: Vec<String> = evaluation.values.iter().map(ToString::to_string).collect();
        println!("{id}: {}", values.join(", "));
    }

    let summary = aggregator.summary()?;
    println!(
        "Weighted over {} images ({} pixels):",
        summary.images, summary.total_pixels
    );
    for metric in Metric::iter() {
        if let Some(value) = summary.get(metric) {
            println!("  {}: {:.4}", metric.label(), value);
        }
    }
    Ok(())
}
