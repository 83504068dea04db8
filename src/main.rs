use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;

use diagfuse::core::page_classifier::{classify_scores, score_text};
use diagfuse::pipeline::{build_document, export_document, PipelineConfig};
use diagfuse::FusionConfig;

#[derive(Parser, Debug)]
#[command(name = "diagfuse")]
#[command(version, about = "Fuse tiled recognition results of engineering diagrams into one model per page", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Fuse a JSON document of per-tile recognition results
    Fuse {
        /// Recognition results (JSON)
        input: PathBuf,

        /// Output file (default: ./<input_name>_fused.json)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Fusion thresholds (JSON); missing keys use defaults
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Threshold preset used when no config file is given
        #[arg(long, value_enum, default_value_t = Preset::Default)]
        preset: Preset,

        /// Pages fused in parallel (0 = one per core)
        #[arg(short, long, default_value_t = 0)]
        jobs: usize,
    },

    /// Guess the diagram kind of a page from its extracted text
    Classify {
        /// Text file
        input: PathBuf,
    },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq)]
enum Preset {
    Default,
    Strict,
    Lenient,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fuse {
            input,
            output,
            config,
            preset,
            jobs,
        } => fuse(input, output, config, preset, jobs),
        Commands::Classify { input } => classify(input),
    }
}

fn fuse(
    input: PathBuf,
    output: Option<PathBuf>,
    config: Option<PathBuf>,
    preset: Preset,
    jobs: usize,
) -> Result<()> {
    if !input.is_file() {
        anyhow::bail!("Input is not a file: {}", input.display());
    }

    let output = output.unwrap_or_else(|| {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "document".to_string());
        PathBuf::from(format!("{stem}_fused.json"))
    });

    let fusion = match config {
        Some(path) => FusionConfig::from_json_file(&path)?,
        None => match preset {
            Preset::Default => FusionConfig::default(),
            Preset::Strict => FusionConfig::strict(),
            Preset::Lenient => FusionConfig::lenient(),
        },
    };

    let pipeline = PipelineConfig::new(input.clone(), output.clone(), fusion).with_jobs(jobs);
    let report = build_document(&pipeline)
        .with_context(|| format!("Failed to fuse: {}", input.display()))?;
    export_document(&report, &pipeline.output)
        .with_context(|| format!("Failed to export to: {}", output.display()))?;

    info!(
        "wrote {} page(s), {} failed, to {}",
        report.document.pages.len(),
        report.failures.len(),
        output.display()
    );

    if !report.failures.is_empty() && report.document.pages.is_empty() {
        anyhow::bail!("no page could be fused");
    }
    Ok(())
}

fn classify(input: PathBuf) -> Result<()> {
    let text = fs::read_to_string(&input)
        .with_context(|| format!("Failed to read: {}", input.display()))?;
    let scores = score_text(&text);
    let kind = classify_scores(scores);
    println!(
        "{} (process: {}, electrical: {})",
        serde_json::to_string(&kind)?.trim_matches('"'),
        scores.process,
        scores.electrical
    );
    Ok(())
}
