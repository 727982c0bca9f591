//! Look a word up in Word Lapse from the command line.
//!
//! Usage:
//!     cargo run --bin lapse -- <word> [--corpus C] [--api URL] [--json] [--top N]
//!
//! Exits non-zero when the query fails.

use anyhow::{bail, Context, Result};
use clap::Parser;
use lapse::color::year_color;
use lapse::force::{label_nodes, ForceParams, ForceSimulation};
use lapse::layout::{
    snake_layout, snake_segments, year_nodes, ProjectionLayout, PROJECTION_HEIGHT,
    PROJECTION_WIDTH, SNAKE_COLUMNS, SNAKE_SPACING_X, SNAKE_SPACING_Y, SNAKE_TOP_NEIGHBORS,
};
use lapse::text::{compact_number, to_human_case, truncate_label, wrap_by_width, FixedWidthMeasure, GlyphTableMeasure};
use lapse::{LapseConfig, LapseStore, NormalizedResult, Status};
use tracing_subscriber::EnvFilter;

/// Terminal columns used for the neighbour cloud
const CLOUD_WIDTH: f64 = 72.0;
/// Font size the projection labels are measured at
const LABEL_FONT_SIZE: f64 = 8.0;
const MAX_FORCE_TICKS: u32 = 500;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Word to look up
    word: String,

    /// Corpus to search (server default when omitted)
    #[arg(short, long)]
    corpus: Option<String>,

    /// API base URL (defaults to WORD_LAPSE_API, then the public API)
    #[arg(long)]
    api: Option<String>,

    /// Print the normalized view-model as JSON
    #[arg(long)]
    json: bool,

    /// Number of neighbours to list
    #[arg(short, long, default_value_t = 10)]
    top: usize,
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
}

fn print_summary(result: &NormalizedResult, top: usize) {
    let years = result.years();
    println!("\"{}\" across {} years", result.query, years.len());

    // ─── Neighbours ───────────────────────────────────────────────────────────
    println!("\nTop neighbours:");
    for neighbor in result.unique_neighbors.iter().take(top) {
        let marker = if neighbor.tagged { " [tag]" } else { "" };
        println!(
            "  {:<24} {:>2} year(s){}",
            truncate_label(&to_human_case(&neighbor.word), 24),
            neighbor.year_count,
            marker
        );
    }

    let words: Vec<&str> = result.unique_neighbors.iter().map(|n| n.word.as_str()).collect();
    let cloud = wrap_by_width(&words, |w| *w, CLOUD_WIDTH, 1.0, &FixedWidthMeasure { em: 1.0 });
    if !cloud.is_empty() {
        println!("\nAll neighbours:");
        for line in cloud {
            let line: Vec<&str> = line.into_iter().copied().collect();
            println!("  {}", line.join(" "));
        }
    }

    // ─── Frequency and changepoints ───────────────────────────────────────────
    if !result.frequency_series.is_empty() {
        println!("\nFrequency:");
        for point in &result.frequency_series {
            println!("  {}  {:>8}", point.year, compact_number(point.frequency));
        }
    }
    if !result.changepoints.is_empty() {
        println!("\nChangepoints:");
        for (from, to) in &result.changepoints {
            println!("  {} -> {}", from, to);
        }
    }

    // ─── Layout ───────────────────────────────────────────────────────────────
    let nodes = year_nodes(result, SNAKE_TOP_NEIGHBORS);
    let snake = snake_layout(&nodes, SNAKE_COLUMNS, SNAKE_SPACING_X, SNAKE_SPACING_Y);
    if !snake.is_empty() {
        println!("\nTimeline layout:");
        for (index, point) in snake.iter().enumerate() {
            let first = point
                .item
                .neighbors
                .first()
                .map(|w| truncate_label(w, point.label_limit(0)))
                .unwrap_or_default();
            println!(
                "  {} at ({:>6.1}, {:>6.1}) {} {}",
                point.item.year,
                point.x,
                point.y,
                year_color(index, snake.len()),
                first
            );
        }
        let turns = snake_segments(&snake).iter().filter(|s| s.curved).count();
        println!("  {} segment(s), {} row turn(s)", snake.len().saturating_sub(1), turns);
    }

    let projection = ProjectionLayout::build(result, PROJECTION_WIDTH, PROJECTION_HEIGHT);
    if !projection.neighbors.is_empty() {
        let labels = label_nodes(&projection.neighbors, LABEL_FONT_SIZE, &GlyphTableMeasure);
        let mut simulation = ForceSimulation::new(labels, ForceParams::default());
        let ticks = simulation.run(MAX_FORCE_TICKS);
        println!(
            "\nProjection: {} trajectory point(s), {} label(s) settled in {} tick(s)",
            projection.trajectory.len(),
            projection.neighbors.len(),
            ticks
        );
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let args = Args::parse();

    let mut config = LapseConfig::from_env().context("Invalid WORD_LAPSE_* environment")?;
    if let Some(api) = &args.api {
        config = config.with_api_url(api).context("Invalid --api URL")?;
    }
    let store = LapseStore::connect(config).context("Failed to build HTTP client")?;

    let status = store
        .submit(&args.word, args.corpus.as_deref())
        .await
        .context("Query was superseded")?;

    match status {
        Status::Success { result } => {
            if args.json {
                println!("{}", serde_json::to_string_pretty(&*result)?);
            } else {
                print_summary(&result, args.top);
            }
            Ok(())
        }
        Status::Error { message } => bail!(message),
        other => bail!(other.describe()),
    }
}
