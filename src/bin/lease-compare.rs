//! CLI binary for lease-compare.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ProcessorConfig`, runs extraction or comparison, and prints the records
//! as tables or JSON. An empty result prints a notice and exits non-zero.

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use lease_compare::{
    AgreementField, ComparisonRecord, Document, DocumentProcessor, ExtractionRecord, Outcome,
    PipelineObserver, ProcessorConfig, SamplingParams, Stage,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn red(s: &str) -> String {
    format!("\x1b[31m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
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

// ── CLI progress observer using indicatif ────────────────────────────────────

/// Spinner that follows each document through its stages. Two extractions
/// may report concurrently; each gets its own log line on completion.
struct CliObserver {
    bar: ProgressBar,
    started: Mutex<HashMap<String, Instant>>,
}

impl CliObserver {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Preparing");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self {
            bar,
            started: Mutex::new(HashMap::new()),
        })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl PipelineObserver for CliObserver {
    fn on_stage(&self, document: &str, stage: Stage) {
        if let Ok(mut started) = self.started.lock() {
            started.entry(document.to_string()).or_insert_with(Instant::now);
        }
        let prefix = match stage {
            Stage::Normalizing => "Reading",
            Stage::Assembling => "Preparing",
            Stage::Invoking => "Asking model",
            Stage::Cleanup => "Cleaning up",
            Stage::Done => "Done",
        };
        self.bar.set_prefix(prefix);
        self.bar.set_message(document.to_string());
    }

    fn on_pages(&self, document: &str, page_count: usize) {
        self.bar.println(format!(
            "  {} {}  {}",
            cyan("◆"),
            document,
            dim(&format!("{page_count} pages"))
        ));
    }

    fn on_complete(&self, document: &str, success: bool) {
        let elapsed = self
            .started
            .lock()
            .ok()
            .and_then(|mut s| s.remove(document))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0);
        let mark = if success { green("✓") } else { red("✗") };
        self.bar.println(format!(
            "  {} {}  {}",
            mark,
            document,
            dim(&format!("{elapsed:.1}s"))
        ));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract the key terms of one agreement
  lease-compare extract lease.pdf

  # Word documents are converted with LibreOffice first
  lease-compare extract lease.docx --json > lease.json

  # Extract two agreements concurrently and compare them
  lease-compare compare lease-2023.pdf lease-2024.docx

ENVIRONMENT VARIABLES:
  OPEN_AI_API_KEY         API key (OPENAI_API_KEY is accepted too)
  OPENAI_BASE_URL         OpenAI-compatible endpoint
  LEASE_COMPARE_MODEL     Model ID (default gpt-4o-mini)
  LEASE_COMPARE_WORKDIR   Parent directory for temporary workspaces
  LEASE_COMPARE_SOFFICE   LibreOffice executable (default soffice)
  PDFIUM_LIB_PATH         Directory containing libpdfium
  RUST_LOG                Log filter, e.g. lease_compare=debug

A .env file in the working directory is loaded automatically.
"#;

/// Extract and compare rental agreements using a vision LLM.
#[derive(Parser, Debug)]
#[command(
    name = "lease-compare",
    version,
    about = "Extract and compare rental agreements using a vision LLM",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    opts: GlobalOpts,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Extract the key terms of one agreement.
    Extract {
        /// PDF, DOCX, DOC, ODT or RTF file.
        file: PathBuf,
    },
    /// Extract two agreements and compare them field by field.
    Compare {
        /// First agreement (Document-1).
        first: PathBuf,
        /// Second agreement (Document-2).
        second: PathBuf,
    },
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// Model ID (default gpt-4o-mini).
    #[arg(long, global = true)]
    model: Option<String>,

    /// OpenAI-compatible base URL.
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// API key; overrides OPEN_AI_API_KEY / OPENAI_API_KEY.
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Rendering DPI (72–400).
    #[arg(long, global = true, env = "LEASE_COMPARE_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Max output tokens per model call.
    #[arg(long, global = true, default_value_t = 2000)]
    max_tokens: usize,

    /// Retries on transient API failures (0–10).
    #[arg(long, global = true, default_value_t = 2,
          value_parser = clap::value_parser!(u32).range(0..=10))]
    max_retries: u32,

    /// Model call timeout in seconds.
    #[arg(long, global = true, default_value_t = 120)]
    api_timeout: u64,

    /// Parent directory for temporary workspaces.
    #[arg(long, global = true)]
    workdir: Option<PathBuf>,

    /// LibreOffice executable used for Word documents.
    #[arg(long, global = true)]
    soffice: Option<String>,

    /// Directory containing the pdfium shared library.
    #[arg(long, global = true)]
    pdfium_dir: Option<PathBuf>,

    /// Print JSON instead of tables. Empty results print `{}`.
    #[arg(long, global = true)]
    json: bool,

    /// Disable the progress spinner.
    #[arg(long, global = true)]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();
    let opts = &cli.opts;

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the spinner is active;
    // the spinner lines carry the same information.
    let show_progress = !opts.quiet && !opts.no_progress && !opts.json;
    let filter = if opts.verbose {
        "debug"
    } else if opts.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let observer = show_progress.then(CliObserver::new);
    let config = build_config(opts, observer.clone())?;
    let processor = DocumentProcessor::new(config).context("Cannot start")?;

    let ok = match &cli.command {
        Command::Extract { file } => {
            let outcome = processor.extract(&Document::from_path(file)).await;
            if let Some(o) = &observer {
                o.finish();
            }
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&outcome)?);
            } else {
                print_extraction(&file.display().to_string(), &outcome);
            }
            report_failure("Extraction", &outcome);
            !outcome.is_empty()
        }
        Command::Compare { first, second } => {
            let report = processor
                .extract_pair(&Document::from_path(first), &Document::from_path(second))
                .await;
            if let Some(o) = &observer {
                o.finish();
            }
            if opts.json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print_extraction("Document-1", &report.first);
                print_extraction("Document-2", &report.second);
                if let Some(c) = report.comparison.record() {
                    let local = match (report.first.record(), report.second.record()) {
                        (Some(a), Some(b)) => a.differing_fields(b),
                        _ => Vec::new(),
                    };
                    print_comparison(c, &local);
                }
            }
            report_failure("Extraction of Document-1", &report.first);
            report_failure("Extraction of Document-2", &report.second);
            report_failure("Comparison", &report.comparison);
            !report.comparison.is_empty()
        }
    };

    Ok(if ok {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

/// Map CLI args onto the environment-derived builder.
fn build_config(opts: &GlobalOpts, observer: Option<Arc<CliObserver>>) -> Result<ProcessorConfig> {
    let mut builder = ProcessorConfig::builder()
        .from_env()
        .dpi(opts.dpi)
        .sampling(SamplingParams {
            max_tokens: opts.max_tokens,
            ..SamplingParams::default()
        })
        .max_retries(opts.max_retries)
        .api_timeout_secs(opts.api_timeout);

    if let Some(ref m) = opts.model {
        builder = builder.model(m);
    }
    if let Some(ref u) = opts.base_url {
        builder = builder.base_url(u);
    }
    if let Some(ref k) = opts.api_key {
        builder = builder.api_key(k);
    }
    if let Some(ref w) = opts.workdir {
        builder = builder.workspace_root(w);
    }
    if let Some(ref s) = opts.soffice {
        builder = builder.converter_program(s);
    }
    if let Some(ref d) = opts.pdfium_dir {
        builder = builder.pdfium_lib_dir(d);
    }
    if let Some(o) = observer {
        builder = builder.observer(o);
    }

    builder.build().context("Invalid configuration")
}

fn report_failure<T>(what: &str, outcome: &Outcome<T>) {
    if let Some(e) = outcome.failure() {
        eprintln!("{} {} failed: {}", red("✘"), what, e);
    }
}

// ── Rendering ────────────────────────────────────────────────────────────────

const LABEL_WIDTH: usize = 26;

fn print_extraction(title: &str, outcome: &Outcome<ExtractionRecord>) {
    let Some(record) = outcome.record() else {
        return;
    };
    println!("\n{}", bold(title));
    println!("{}", dim(&"─".repeat(72)));
    for field in AgreementField::ALL {
        print_row(field.label(), record.value(field));
    }

    if record.critical_terms.is_empty() {
        println!("{:<LABEL_WIDTH$}{}", "Critical Terms", dim("none flagged"));
        return;
    }
    println!("\n{}", bold("Critical Terms"));
    for term in &record.critical_terms {
        println!("  {} {}", yellow("▲"), bold(&term.flagged_term));
        print_row("    Details", &term.details);
        print_row("    Inference", &term.inference);
    }
}

fn print_comparison(record: &ComparisonRecord, local_diffs: &[AgreementField]) {
    println!("\n{}", bold("Comparison"));
    println!("{}", dim(&"─".repeat(72)));
    for entry in &record.entries {
        let differs = entry.field().is_some_and(|f| local_diffs.contains(&f));
        let mark = if differs { red("≠") } else { green("=") };
        println!("{} {}", mark, bold(&entry.key_term));
        print_row("    Document-1", &entry.document_1);
        print_row("    Document-2", &entry.document_2);
        print_row("    Mismatch/Comment", &entry.mismatch_comment);
        print_row("    Inference", &entry.inference);
    }
}

fn print_row(label: &str, value: &str) {
    let mut lines = value.lines();
    println!("{:<LABEL_WIDTH$}{}", label, lines.next().unwrap_or(""));
    for line in lines {
        println!("{:<LABEL_WIDTH$}{}", "", line);
    }
}
