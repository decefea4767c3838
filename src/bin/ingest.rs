//! CLI binary for edgequake-ingest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, runs the pipeline and prints the extracted text.

use anyhow::{Context, Result};
use clap::Parser;
use edgequake_ingest::{
    resolve_document, AgentReport, DocumentAgent, DocumentKind, EngineBackend, IngestConfig,
    IngestProgressCallback, IngestStage, Pipeline, PipelineResult, ProgressCallback,
    ProviderChat,
};
use indicatif::{ProgressBar, ProgressStyle};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers ──────────────────────────────────────────────────────

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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Spinner while rasterising and detecting, then a page bar during
/// extraction.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<usize, Instant>>,
    errors: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let spinner_style = ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(TICKS);

        bar.set_style(spinner_style);
        bar.set_prefix("Preparing");
        bar.set_message("Reading document…");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            errors: AtomicUsize::new(0),
        })
    }

    /// Clear the bar of a document that failed before extraction finished.
    fn abandon(&self) {
        self.bar.finish_and_clear();
    }

    fn elapsed_secs(&self, page_num: usize) -> f64 {
        self.start_times
            .lock()
            .remove(&page_num)
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_stage(&self, stage: IngestStage) {
        match stage {
            IngestStage::Created => self.bar.set_message("Rasterising pages…"),
            IngestStage::Rasterized => self.bar.set_message("Detecting language…"),
            _ => {}
        }
    }

    fn on_extraction_start(&self, total_pages: usize) {
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  \
             [{bar:42.green/238}] {pos:>3}/{len} pages  \
             ⏱ {elapsed_precise}  ETA {eta_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);

        self.bar.set_length(total_pages as u64);
        self.bar.set_style(style);
        self.bar.set_prefix("Extracting");
        self.bar.reset_eta();
    }

    fn on_page_start(&self, page_num: usize, _total: usize) {
        self.start_times.lock().insert(page_num, Instant::now());
        self.bar.set_message(format!("page {page_num}"));
    }

    fn on_page_complete(&self, page_num: usize, total: usize, text_len: usize) {
        let secs = self.elapsed_secs(page_num);
        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {:<8}  {}",
            green("✓"),
            page_num,
            total,
            dim(&format!("{text_len:>5} chars")),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_page_error(&self, page_num: usize, total: usize, error: &str) {
        let secs = self.elapsed_secs(page_num);
        self.errors.fetch_add(1, Ordering::SeqCst);

        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };

        self.bar.println(format!(
            "  {} Page {:>3}/{:<3}  {}  {}",
            red("✗"),
            page_num,
            total,
            red(&msg),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_extraction_complete(&self, total_pages: usize, success_count: usize) {
        let failed = total_pages.saturating_sub(success_count);
        self.bar.finish_and_clear();

        if failed == 0 {
            eprintln!(
                "{} {} pages extracted successfully",
                green("✔"),
                bold(&success_count.to_string())
            );
        } else {
            eprintln!(
                "{} {}/{} pages extracted  ({} failed)",
                if failed == total_pages { red("✘") } else { cyan("⚠") },
                bold(&success_count.to_string()),
                total_pages,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Extract text from a scanned PDF (stdout)
  ingest scan.pdf

  # Photo of a letter, French or German only, write to file
  ingest --languages fr,de --default-language fr letter.jpg -o letter.txt

  # First three pages only, then classify and analyse the document
  ingest --max-pages 3 --analyze contract.pdf

  # Ask a question about the document
  ingest invoice.png --ask "What is the total amount due?"

  # Local OCR instead of a vision model (build with --features tesseract)
  ingest --engine tesseract --tessdata /usr/share/tessdata scan.pdf

  # Extensionless download: force the kind
  ingest --kind pdf https://example.com/download?id=42

  # JSON output with per-page details
  ingest --json scan.pdf > result.json

  # Several documents in one run; texts land in out/<name>.txt
  ingest --analyze -o out/ invoice.pdf contract.pdf photo.jpg

ENVIRONMENT VARIABLES:
  OPENAI_API_KEY          OpenAI API key
  ANTHROPIC_API_KEY       Anthropic API key
  GEMINI_API_KEY          Google Gemini API key
  EDGEQUAKE_LLM_PROVIDER  Override provider (openai, anthropic, gemini, ollama)
  EDGEQUAKE_MODEL         Override model ID
  PDFIUM_LIB_PATH         Directory containing libpdfium (or the library itself)
  RUST_LOG                Tracing filter, e.g. edgequake_ingest=debug
"#;

/// Extract text and language from scanned images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "ingest",
    version,
    about = "Extract text and language from scanned images and PDFs",
    long_about = "Rasterise an image or PDF (local file or URL), detect its dominant language \
from the first page, then OCR every page with an engine for that language. Optionally classify \
and analyse the result, or answer a question about it, with a language model. Several inputs \
are processed one after another; a failing document is reported and skipped.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Local image/PDF paths or HTTP/HTTPS URLs, processed one after another.
    #[arg(required = true, num_args = 1..)]
    inputs: Vec<String>,

    /// Document kind; inferred from extension, Content-Type or magic bytes if omitted.
    #[arg(long, value_enum)]
    kind: Option<KindArg>,

    /// Write the extracted text to this file instead of stdout (a directory
    /// when several inputs are given).
    #[arg(short, long, env = "INGEST_OUTPUT")]
    output: Option<PathBuf>,

    /// Rendering DPI for PDF pages (72–600).
    #[arg(long, env = "INGEST_DPI", default_value_t = 300,
          value_parser = clap::value_parser!(u32).range(72..=600))]
    dpi: u32,

    /// Recognise at most this many pages (all pages are still rasterised).
    #[arg(long, env = "INGEST_MAX_PAGES",
          value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..))]
    max_pages: Option<usize>,

    /// Comma-separated ISO 639-1 codes the detector may choose from.
    #[arg(long, env = "INGEST_LANGUAGES", value_delimiter = ',',
          default_value = "en,fr,de,es,it")]
    languages: Vec<String>,

    /// Language used when detection fails or the sample page is blank.
    #[arg(long, env = "INGEST_DEFAULT_LANGUAGE", default_value = "en")]
    default_language: String,

    /// Pages recognised per batch.
    #[arg(long, env = "INGEST_BATCH_SIZE", default_value_t = 4)]
    batch_size: usize,

    /// Concurrent recognition calls within a batch.
    #[arg(short, long, env = "INGEST_CONCURRENCY", default_value_t = 2)]
    concurrency: usize,

    /// Recognition engine.
    #[arg(long, env = "INGEST_ENGINE", value_enum, default_value = "vision")]
    engine: EngineArg,

    /// tessdata directory for the tesseract engine.
    #[arg(long, env = "TESSDATA_PREFIX")]
    tessdata: Option<PathBuf>,

    /// LLM provider: openai, anthropic, gemini, ollama, azure.
    #[arg(long, env = "EDGEQUAKE_PROVIDER")]
    provider: Option<String>,

    /// LLM model ID (e.g. gpt-4.1-nano, gpt-4.1, claude-sonnet-4-20250514).
    #[arg(long, env = "EDGEQUAKE_MODEL")]
    model: Option<String>,

    /// PDF user password for encrypted documents.
    #[arg(long, env = "INGEST_PASSWORD")]
    password: Option<String>,

    /// Output structured JSON (PipelineResult) instead of plain text.
    #[arg(long, env = "INGEST_JSON")]
    json: bool,

    /// Classify the document and run the matching analysis mission.
    #[arg(long)]
    analyze: bool,

    /// Ask a question about the extracted text.
    #[arg(long, value_name = "QUESTION")]
    ask: Option<String>,

    /// Disable progress bar.
    #[arg(long, env = "INGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "INGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "INGEST_QUIET")]
    quiet: bool,

    /// HTTP download timeout in seconds.
    #[arg(long, env = "INGEST_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Per-call LLM timeout in seconds.
    #[arg(long, env = "INGEST_API_TIMEOUT", default_value_t = 60)]
    api_timeout: u64,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum KindArg {
    Image,
    Pdf,
}

impl From<KindArg> for DocumentKind {
    fn from(v: KindArg) -> Self {
        match v {
            KindArg::Image => DocumentKind::Image,
            KindArg::Pdf => DocumentKind::MultiPageDocument,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum EngineArg {
    Vision,
    Tesseract,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The progress bar replaces INFO logs unless -v is given.
    let show_progress = !cli.quiet && !cli.no_progress && !cli.json;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
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

    // One pipeline (and so one engine cache) and one chat client for every
    // document of the batch.
    let base_config = build_config(&cli, None)?;
    let pipeline = Pipeline::from_config(&base_config).context("Failed to set up the pipeline")?;

    let agent = if cli.analyze || cli.ask.is_some() {
        let chat =
            ProviderChat::from_config(&base_config).context("Analysis needs an LLM provider")?;
        Some(DocumentAgent::new(Arc::new(chat)))
    } else {
        None
    };

    let total = cli.inputs.len();
    let batch = total > 1;
    let mut json_items = Vec::with_capacity(total);
    let mut failed = 0usize;

    for (idx, input) in cli.inputs.iter().enumerate() {
        if batch && !cli.quiet {
            eprintln!("{} {}", bold(&format!("[{}/{}]", idx + 1, total)), cyan(input));
        }

        let progress = if show_progress {
            Some(CliProgressCallback::new())
        } else {
            None
        };
        let config = build_config(
            &cli,
            progress
                .clone()
                .map(|p| p as Arc<dyn IngestProgressCallback>),
        )?;
        let output = output_path(cli.output.as_deref(), input, batch);

        match process_document(&cli, input, output.as_deref(), &pipeline, agent.as_ref(), &config)
            .await
        {
            Ok(outcome) => {
                if cli.json {
                    json_items.push(outcome.to_json(input)?);
                } else {
                    print_outcome(&cli, input, output.as_deref(), &outcome, batch)?;
                }
            }
            Err(e) => {
                failed += 1;
                if let Some(ref p) = progress {
                    p.abandon();
                }
                eprintln!("{} {}: {:#}", red("✘"), input, e);
                if cli.json {
                    json_items.push(serde_json::json!({
                        "input": input,
                        "error": format!("{e:#}"),
                    }));
                }
            }
        }
    }

    // ── JSON output ──────────────────────────────────────────────────────
    if cli.json {
        let value = if batch {
            serde_json::Value::Array(json_items)
        } else {
            json_items.pop().unwrap_or(serde_json::Value::Null)
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&value).context("Failed to serialise output")?
        );
    }

    if failed > 0 {
        if batch {
            anyhow::bail!("{failed} of {total} documents failed");
        }
        std::process::exit(1);
    }
    Ok(())
}

/// Everything produced for one input.
struct Outcome {
    result: PipelineResult,
    report: Option<AgentReport>,
    answer: Option<String>,
}

impl Outcome {
    fn to_json(&self, input: &str) -> Result<serde_json::Value> {
        let mut value =
            serde_json::to_value(&self.result).context("Failed to serialise output")?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("input".into(), serde_json::Value::String(input.to_string()));
            if let Some(ref report) = self.report {
                obj.insert("analysis".into(), serde_json::to_value(report)?);
            }
            if let Some(ref answer) = self.answer {
                obj.insert("answer".into(), serde_json::Value::String(answer.clone()));
            }
        }
        Ok(value)
    }
}

/// Resolve, ingest and optionally analyse one input.
async fn process_document(
    cli: &Cli,
    input: &str,
    output: Option<&Path>,
    pipeline: &Pipeline,
    agent: Option<&DocumentAgent>,
    config: &IngestConfig,
) -> Result<Outcome> {
    let document = resolve_document(input, cli.kind.map(Into::into), config.download_timeout_secs)
        .await
        .context("Failed to read input")?;

    let result = match output {
        Some(path) => pipeline.ingest_to_file(document, path, config).await,
        None => pipeline.ingest(document, config).await,
    }
    .context("Ingestion failed")?;

    let report = match (agent, cli.analyze) {
        (Some(agent), true) => Some(
            agent
                .run(&result.extracted_text)
                .await
                .context("Document analysis failed")?,
        ),
        _ => None,
    };

    let answer = match (agent, cli.ask.as_deref()) {
        (Some(agent), Some(question)) => Some(
            agent
                .answer(&result.extracted_text, Some(question))
                .await
                .context("Question answering failed")?,
        ),
        _ => None,
    };

    Ok(Outcome {
        result,
        report,
        answer,
    })
}

/// Where the text of `input` goes: `--output` itself for a single input,
/// `<dir>/<stem>.txt` inside `--output` for a batch.
fn output_path(output: Option<&Path>, input: &str, batch: bool) -> Option<PathBuf> {
    let output = output?;
    if !batch {
        return Some(output.to_path_buf());
    }
    let name = input
        .split(['?', '#'])
        .next()
        .unwrap_or(input)
        .trim_end_matches('/')
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(input);
    let stem = Path::new(name)
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("document");
    Some(output.join(format!("{stem}.txt")))
}

fn print_outcome(
    cli: &Cli,
    input: &str,
    output: Option<&Path>,
    outcome: &Outcome,
    batch: bool,
) -> Result<()> {
    let result = &outcome.result;

    if output.is_none() {
        let stdout = io::stdout();
        let mut handle = stdout.lock();
        if batch {
            writeln!(handle, "{}", bold(&format!("==> {input} <=="))).ok();
        }
        handle
            .write_all(result.extracted_text.as_bytes())
            .context("Failed to write to stdout")?;
        if !result.extracted_text.ends_with('\n') {
            handle.write_all(b"\n").ok();
        }
    }

    if let Some(ref report) = outcome.report {
        println!();
        println!("{} {}", bold("Document type:"), report.document_type);
        println!("{} {}", bold("Mission:"), report.mission);
        println!("{}", report.analysis);
    }
    if let Some(ref answer) = outcome.answer {
        println!();
        println!("{}", answer);
    }
    if batch && output.is_none() {
        println!();
    }

    if !cli.quiet {
        let stats = &result.stats;
        eprintln!(
            "{}  {}/{} pages  language {}{}  {}ms{}",
            if stats.failed_pages == 0 { green("✔") } else { cyan("⚠") },
            stats.processed_pages,
            stats.total_pages,
            bold(&result.detected_language),
            result
                .language_confidence
                .map(|c| dim(&format!(" ({:.0}%)", c * 100.0)))
                .unwrap_or_else(|| dim(" (default)")),
            stats.total_duration_ms,
            output
                .map(|p| format!("  →  {}", bold(&p.display().to_string())))
                .unwrap_or_default(),
        );
        if stats.skipped_pages > 0 {
            eprintln!("   {}", dim(&format!("{} pages beyond --max-pages", stats.skipped_pages)));
        }
    }
    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let engine = match cli.engine {
        EngineArg::Vision => EngineBackend::Vision,
        EngineArg::Tesseract => EngineBackend::Tesseract {
            datapath: cli.tessdata.clone(),
        },
    };

    let mut builder = IngestConfig::builder()
        .dpi(cli.dpi)
        .supported_languages(cli.languages.iter().map(String::as_str))
        .default_language(cli.default_language.as_str())
        .batch_size(cli.batch_size)
        .concurrency(cli.concurrency)
        .engine(engine)
        .download_timeout_secs(cli.download_timeout)
        .api_timeout_secs(cli.api_timeout);

    if let Some(cap) = cli.max_pages {
        builder = builder.page_cap(cap);
    }
    if let Some(ref password) = cli.password {
        builder = builder.password(password.as_str());
    }
    if let Some(ref model) = cli.model {
        builder = builder.model(model.as_str());
    }
    if let Some(ref provider) = cli.provider {
        builder = builder.provider_name(provider.as_str());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}
