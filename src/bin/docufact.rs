//! CLI binary for docufact.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `AnalysisConfig` and prints results as JSON.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use docufact::{
    analyze_document, extract_identity, extract_vehicle, recommend_for_identity,
    recommend_insurance, AnalysisConfig, AnalysisProgressCallback, IdentityRecord,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}
fn cyan(s: &str) -> String {
    format!("\x1b[36m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

#[derive(Parser)]
#[command(
    name = "docufact",
    version,
    about = "Extract structured facts from scanned documents using Vision Language Models",
    propagate_version = true
)]
struct Cli {
    /// Oracle provider name (gemini, openai, anthropic, ...).
    #[arg(long, global = true, env = "DOCUFACT_LLM_PROVIDER")]
    provider: Option<String>,

    /// Oracle model identifier, e.g. gemini-2.0-flash.
    #[arg(long, global = true, env = "DOCUFACT_MODEL")]
    model: Option<String>,

    /// Maximum oracle attempts when quota exhaustion is reported.
    #[arg(long, global = true, default_value_t = 3)]
    max_attempts: u32,

    /// Base delay of the linear retry schedule, in milliseconds.
    #[arg(long, global = true, default_value_t = 2000)]
    retry_delay_ms: u64,

    /// Suppress the progress bar and per-page log lines.
    #[arg(long, short, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Analyze a multi-page document: structured record plus Markdown.
    Analyze {
        /// Page images in order (local paths or URLs).
        #[arg(required = true)]
        images: Vec<String>,

        /// Display name for the document (defaults to the first file name).
        #[arg(long)]
        name: Option<String>,

        /// Write the merged JSON record here instead of stdout.
        #[arg(long, short)]
        output: Option<PathBuf>,

        /// Also write the assembled Markdown rendition here.
        #[arg(long)]
        markdown_output: Option<PathBuf>,
    },

    /// Extract identity-card fields from one image.
    Identity {
        image: String,
    },

    /// Extract vehicle-registration fields from one image.
    Vehicle {
        image: String,
    },

    /// Recommend insurance packages by macro-region.
    Recommend {
        /// Document image to analyse (omit when using --identity-json).
        image: Option<String>,

        /// Derive the recommendation from an already-extracted identity
        /// record (JSON file) instead of calling the oracle.
        #[arg(long, conflicts_with = "image")]
        identity_json: Option<PathBuf>,
    },
}

// ── Progress bar callback ────────────────────────────────────────────────────

/// Terminal progress callback: a single bar plus one log line per page.
struct CliProgress {
    bar: ProgressBar,
    errors: AtomicUsize,
}

impl CliProgress {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        bar.set_style(
            ProgressStyle::with_template(
                "{spinner:.cyan} {prefix:.bold}  [{bar:40.green/238}] {pos}/{len} pages  ⏱ {elapsed_precise}",
            )
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        bar.set_prefix("Analyzing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            errors: AtomicUsize::new(0),
        })
    }
}

impl AnalysisProgressCallback for CliProgress {
    fn on_analysis_start(&self, total_pages: usize) {
        self.bar.set_length(total_pages as u64);
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize) {
        self.bar
            .println(format!("  {} Page {page_num}/{total}", green("✓")));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        let msg = if error.chars().count() > 80 {
            format!("{}…", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar
            .println(format!("  {} Page {page_num}/{total}  {}", red("✗"), red(&msg)));
        self.bar.inc(1);
    }

    fn on_analysis_complete(&self, total_pages: usize, success_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_pages.saturating_sub(success_count);
        if failed == 0 {
            eprintln!(
                "{} {} pages analyzed successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {success_count}/{total_pages} pages analyzed  ({failed} failed)",
                cyan("⚠")
            );
        }
    }
}

// ── Entry point ──────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(if cli.quiet { "error" } else { "warn" })),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = build_config(&cli)?;

    match &cli.command {
        Command::Analyze {
            images,
            name,
            output,
            markdown_output,
        } => {
            let doc_name = name.clone().unwrap_or_else(|| {
                Path::new(&images[0])
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| "document".to_string())
            });

            let config = if cli.quiet {
                config
            } else {
                let mut c = config;
                let cb: docufact::ProgressCallback = CliProgress::new();
                c.progress_callback = Some(cb);
                c
            };

            let result = analyze_document(&doc_name, images, &config)
                .await
                .context("document analysis failed")?;

            eprintln!(
                "{}",
                dim(&format!(
                    "document type: {}  confidence: {}  oracle time: {}ms",
                    result.record.document_type,
                    result.record.confidence,
                    result.stats.oracle_duration_ms
                ))
            );

            let json = serde_json::to_string_pretty(&result.record)?;
            match output {
                Some(path) => write_atomic(path, &json)?,
                None => println!("{json}"),
            }
            if let Some(path) = markdown_output {
                write_atomic(path, &result.markdown)?;
            }
        }

        Command::Identity { image } => {
            let record = extract_identity(image, &config)
                .await
                .context("identity extraction failed")?;
            warn_if_degraded(record.extraction_status.as_deref(), record.message.as_deref());
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::Vehicle { image } => {
            let record = extract_vehicle(image, &config)
                .await
                .context("vehicle extraction failed")?;
            warn_if_degraded(record.extraction_status.as_deref(), record.message.as_deref());
            println!("{}", serde_json::to_string_pretty(&record)?);
        }

        Command::Recommend {
            image,
            identity_json,
        } => {
            let result = match (image, identity_json) {
                (_, Some(path)) => {
                    let json = std::fs::read_to_string(path)
                        .with_context(|| format!("reading {}", path.display()))?;
                    let identity: IdentityRecord = serde_json::from_str(&json)
                        .with_context(|| format!("parsing identity record {}", path.display()))?;
                    recommend_for_identity(&identity)
                }
                (Some(image), None) => recommend_insurance(image, &config)
                    .await
                    .context("recommendation failed")?,
                (None, None) => {
                    anyhow::bail!("provide an IMAGE or --identity-json <FILE>");
                }
            };

            if result.recommended_packages.is_empty() {
                eprintln!("{}", dim("no packages recommended for this region pair"));
            }
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
    }

    Ok(())
}

fn build_config(cli: &Cli) -> Result<AnalysisConfig> {
    let mut builder = AnalysisConfig::builder()
        .max_attempts(cli.max_attempts)
        .retry_base_delay_ms(cli.retry_delay_ms);
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.clone());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.clone());
    }
    builder.build().map_err(Into::into)
}

fn warn_if_degraded(status: Option<&str>, message: Option<&str>) {
    if let Some(status) = status {
        eprintln!(
            "{} extraction degraded ({status}): {}",
            cyan("⚠"),
            message.unwrap_or("no detail")
        );
    }
}

/// Atomic write (temp file + rename) to prevent partial files.
fn write_atomic(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, content).with_context(|| format!("writing {}", tmp.display()))?;
    std::fs::rename(&tmp, path).with_context(|| format!("renaming to {}", path.display()))?;
    eprintln!("{} wrote {}", green("✔"), path.display());
    Ok(())
}
