//! Fill the Word Lapse server's result cache from a word list
//!
//! Requests `/neighbors` for every word, a few at a time, so the first real
//! visitor for a common word gets a cached answer.
//!
//! Run with: cargo run -p cache-warmer -- --word-list words.txt

use anyhow::{Context, Result};
use clap::Parser;
use futures::StreamExt;
use indicatif::{ProgressBar, ProgressStyle};
use lapse::api::{endpoint_url, parse_metadata};
use std::collections::BTreeMap;
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Newline separated words to request
    #[arg(short, long, env = "WORD_LIST", default_value = "./google-10000-english-usa.txt")]
    word_list: PathBuf,

    /// API root, trailing slash optional
    #[arg(short, long, env = "SERVER_URL", default_value = "https://api-wl.greenelab.com")]
    server_url: String,

    /// Requests in flight at once. Keep it at or below the server's worker
    /// count so real users still get served.
    #[arg(short = 'C', long, env = "RQ_CONCURRENCY", default_value_t = 1)]
    concurrency: usize,

    /// Read the concurrency from the server's metadata instead
    #[arg(long)]
    use_server_concurrency: bool,

    /// Corpus to warm (server default when omitted)
    #[arg(long)]
    corpus: Option<String>,

    /// Where non-200 responses are appended
    #[arg(long, default_value = "non_200s.log")]
    failures_log: PathBuf,
}

/// Outcome of one request: an HTTP status, or no response at all
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum Outcome {
    Status(u16),
    Unreachable,
}

impl Outcome {
    fn is_ok(self) -> bool {
        self == Outcome::Status(200)
    }

    fn label(self) -> String {
        match self {
            Outcome::Status(code) => code.to_string(),
            Outcome::Unreachable => "err".to_string(),
        }
    }
}

/// Running count of outcomes, rendered as `200:10, 500:1`
#[derive(Debug, Default)]
struct Tally {
    counts: BTreeMap<Outcome, usize>,
}

impl Tally {
    fn record(&mut self, outcome: Outcome) {
        *self.counts.entry(outcome).or_insert(0) += 1;
    }

    fn summary(&self) -> String {
        self.counts
            .iter()
            .map(|(outcome, count)| format!("{}:{}", outcome.label(), count))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

fn read_word_list(path: &Path) -> Result<Vec<String>> {
    let text = fs::read_to_string(path)
        .with_context(|| format!("Failed to read word list {}", path.display()))?;
    Ok(parse_word_list(&text))
}

fn parse_word_list(text: &str) -> Vec<String> {
    text.lines()
        .map(str::trim)
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

fn server_root(server_url: &str) -> Result<Url> {
    let trimmed = server_url.trim().trim_end_matches('/');
    Url::parse(&format!("{}/", trimmed)).with_context(|| format!("Invalid server URL {}", server_url))
}

fn neighbors_url(root: &Url, word: &str, corpus: Option<&str>) -> Url {
    let mut params = vec![("tok", word)];
    if let Some(corpus) = corpus {
        params.push(("corpus", corpus));
    }
    endpoint_url(root, &["neighbors"], &params)
}

fn log_failure(path: &Path, outcome: Outcome, url: &Url) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    writeln!(file, "{} : {}", outcome.label(), url)?;
    Ok(())
}

async fn server_concurrency(client: &reqwest::Client, root: &Url) -> Result<usize> {
    let body: serde_json::Value = client
        .get(root.clone())
        .send()
        .await
        .context("Metadata request failed")?
        .json()
        .await
        .context("Metadata was not JSON")?;
    let workers = parse_metadata(&body).worker_concurrency.unwrap_or(1);
    Ok(workers as usize)
}

async fn fetch(client: &reqwest::Client, url: Url) -> (Outcome, Url) {
    match client.get(url.clone()).send().await {
        Ok(response) => {
            let outcome = Outcome::Status(response.status().as_u16());
            // drain so the connection can be reused
            let _ = response.bytes().await;
            (outcome, url)
        }
        Err(e) => {
            warn!("{}: {}", url, e);
            (Outcome::Unreachable, url)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();
    let args = Args::parse();

    let root = server_root(&args.server_url)?;
    let client = reqwest::Client::builder()
        .build()
        .context("Failed to build HTTP client")?;

    let concurrency = if args.use_server_concurrency {
        let workers = server_concurrency(&client, &root).await?;
        info!("Server workers: {}", workers);
        workers
    } else {
        args.concurrency
    }
    .max(1);

    info!("Server URL: {}", root);
    info!("Parallel requests: {}", concurrency);

    let words = read_word_list(&args.word_list)?;
    let urls: Vec<Url> = words
        .iter()
        .map(|word| neighbors_url(&root, word, args.corpus.as_deref()))
        .collect();

    let pb = ProgressBar::new(urls.len() as u64);
    pb.set_style(ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta}) {msg}")?
        .progress_chars("#>-"));

    let mut tally = Tally::default();
    let mut responses = futures::stream::iter(urls)
        .map(|url| fetch(&client, url))
        .buffer_unordered(concurrency);

    while let Some((outcome, url)) = responses.next().await {
        tally.record(outcome);
        if !outcome.is_ok() {
            if let Err(e) = log_failure(&args.failures_log, outcome, &url) {
                pb.println(format!("{:#}", e));
            }
        }
        pb.inc(1);
        pb.set_message(tally.summary());
    }

    pb.finish_with_message(tally.summary());
    Ok(())
}
