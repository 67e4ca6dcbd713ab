use std::path::PathBuf;

use clap::{Parser, Subcommand};
use handsign::dataset::{self, codec, DatasetBuilder};
use handsign::hand::detection::LandmarkDetector;

/// Converts folders of labeled hand sign photographs into a landmark dataset.
#[derive(Parser, Debug)]
#[command(version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Scans a label-organized image tree and writes the normalized landmark dataset.
    Convert(ConvertArgs),
    /// Prints the per-label sample counts of a dataset file.
    Summary {
        /// The dataset file to inspect.
        #[arg(env = "HANDSIGN_OUTPUT_FILE", default_value = "final_dataset.json")]
        dataset: PathBuf,
    },
}

#[derive(clap::Args, Debug)]
struct ConvertArgs {
    /// Directory containing one subdirectory of images per sign.
    #[arg(long, env = "HANDSIGN_INPUT_DIR", default_value = "dataset_photos")]
    input_dir: PathBuf,

    /// Path the JSON dataset is written to.
    #[arg(long, env = "HANDSIGN_OUTPUT_FILE", default_value = "final_dataset.json")]
    output_file: PathBuf,

    /// Hand landmark network (ONNX) used to detect hands.
    #[arg(long, env = "HANDSIGN_MODEL")]
    model: PathBuf,

    /// Minimum hand presence score for a detection to count.
    #[arg(long, default_value_t = LandmarkDetector::DEFAULT_MIN_PRESENCE)]
    min_presence: f32,
}

fn main() -> anyhow::Result<()> {
    handsign::init_logger!();

    match Cli::parse().command {
        Command::Convert(args) => convert(args),
        Command::Summary { dataset } => summary(dataset),
    }
}

fn convert(args: ConvertArgs) -> anyhow::Result<()> {
    dataset::check_input_root(&args.input_dir)?;

    let mut detector = LandmarkDetector::load(&args.model)?;
    detector.set_min_presence(args.min_presence);

    let mut builder = DatasetBuilder::new(detector);
    let (dataset, stats) = builder.build(&args.input_dir)?;

    codec::write(&dataset, &args.output_file)?;
    log::info!(
        "saved {} samples across {} labels to {}",
        dataset.len(),
        stats.labels().count(),
        args.output_file.display(),
    );
    Ok(())
}

fn summary(path: PathBuf) -> anyhow::Result<()> {
    let dataset = codec::read(&path)?;
    let counts = dataset.label_counts();
    println!(
        "{}: {} samples, {} classes",
        path.display(),
        dataset.len(),
        counts.len()
    );

    for (label, count) in counts {
        println!("  {label}: {count}");
    }
    Ok(())
}
