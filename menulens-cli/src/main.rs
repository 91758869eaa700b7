//! menulens — plot a query embedding among menu-item embeddings
//!
//! # Subcommands
//! - `plot <dataset.json> [-o FILE] [--format html|json] [--score] [--open]`
//! - `table <dataset.json> [--score]` — print the projected table as JSON

mod dataset;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use menulens_core::render::{build_figure, open_in_browser, write_html};
use menulens_core::{cosine_scores, EmbeddingPlot, MenuItem, ProjectionTable, VizConfig};
use tracing_subscriber::{fmt, EnvFilter};

use crate::dataset::Dataset;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "menulens",
    version,
    about = "Project a query and menu embeddings to 2D with UMAP and plot them"
)]
struct Cli {
    /// TOML config file (defaults apply when omitted)
    #[arg(short, long, env = "MENULENS_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Standalone interactive HTML page
    Html,
    /// Plotly figure JSON
    Json,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Render the projection chart
    Plot {
        /// Dataset JSON with `query`, `items[].embedding` and optional `similarity`
        dataset: PathBuf,

        /// Output file (default: menulens-<timestamp>.<ext> in the working directory)
        #[arg(short, long)]
        output: Option<PathBuf>,

        #[arg(long, value_enum, default_value_t = OutputFormat::Html)]
        format: OutputFormat,

        /// Compute cosine similarity when the dataset carries no scores
        #[arg(long)]
        score: bool,

        /// Open the chart after writing it
        #[arg(long)]
        open: bool,
    },

    /// Print the projected table as JSON
    Table {
        dataset: PathBuf,

        /// Compute cosine similarity when the dataset carries no scores
        #[arg(long)]
        score: bool,
    },
}

// ============================================================================
// Commands
// ============================================================================

fn default_output(format: OutputFormat) -> PathBuf {
    let ext = match format {
        OutputFormat::Html => "html",
        OutputFormat::Json => "json",
    };
    PathBuf::from(format!(
        "menulens-{}.{}",
        chrono::Local::now().format("%Y%m%d-%H%M%S"),
        ext
    ))
}

fn project(dataset_path: &Path, config: &VizConfig, score: bool) -> Result<ProjectionTable> {
    let (query, embeddings, items, similarity) = Dataset::load(dataset_path)?.into_parts();
    tracing::info!(
        items = items.len(),
        dims = query.len(),
        dataset = %dataset_path.display(),
        "Loaded dataset"
    );

    let mut plot = EmbeddingPlot::<MenuItem>::new(&query, &embeddings, &items)?;
    plot = match similarity {
        Some(scores) => plot.with_scores(&scores)?,
        None if score => {
            let scores = cosine_scores(plot.query(), plot.candidates())?;
            plot.with_scores(&scores)?
        }
        None => plot,
    };

    Ok(plot.table(config)?)
}

fn do_plot(
    dataset: &Path,
    config: &VizConfig,
    output: Option<PathBuf>,
    format: OutputFormat,
    score: bool,
    open: bool,
) -> Result<()> {
    let table = project(dataset, config, score)?;
    let figure = build_figure(&table, &config.render);
    let output = output.unwrap_or_else(|| default_output(format));

    match format {
        OutputFormat::Html => write_html(&figure, &output)?,
        OutputFormat::Json => std::fs::write(&output, figure.to_json()?)
            .with_context(|| format!("failed to write {}", output.display()))?,
    }
    println!("{}", output.display());

    if open {
        if format == OutputFormat::Html {
            open_in_browser(&output)?;
        } else {
            tracing::warn!("--open only applies to HTML output");
        }
    }
    Ok(())
}

fn do_table(dataset: &Path, config: &VizConfig, score: bool) -> Result<()> {
    let table = project(dataset, config, score)?;
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}

fn run(cli: Cli) -> Result<()> {
    let config = VizConfig::load(cli.config.as_deref()).with_context(|| match &cli.config {
        Some(path) => format!("failed to load config from {}", path),
        None => "failed to load config from environment".to_string(),
    })?;
    config.validate()?;

    match cli.command {
        Commands::Plot {
            dataset,
            output,
            format,
            score,
            open,
        } => do_plot(&dataset, &config, output, format, score, open),
        Commands::Table { dataset, score } => do_table(&dataset, &config, score),
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();

    // Logs go to stderr; stdout carries the command output
    fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(tracing::Level::INFO.into()))
        .with_writer(std::io::stderr)
        .init();

    if let Err(e) = run(cli) {
        eprintln!("menulens: {:#}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
