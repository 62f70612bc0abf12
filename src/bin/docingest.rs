//! CLI binary for docingest.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `IngestConfig`, wires up the pdfium/tesseract/word-list backends and
//! prints the corrected text (or the JSON response).

use anyhow::{Context, Result};
use clap::Parser;
use docingest::backend::dictionary::WordListDictionary;
use docingest::backend::pdfium::{locate_pdfium, pdfium_backends};
use docingest::backend::tesseract::TesseractRecognizer;
use docingest::{
    Engines, IngestConfig, IngestProgressCallback, Ingestor, Language, LanguageCodes,
    PageFailurePolicy, ProgressCallback, ReplacementMode, SpellEngine,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;
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

// ── CLI progress callback using indicatif ────────────────────────────────────

/// One bar for all pages of all documents. Documents render concurrently,
/// so the bar grows as each one is split.
struct CliProgressCallback {
    bar: ProgressBar,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} pages  ⏱ {elapsed_precise}  {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]);
        bar.set_style(style);
        bar.set_prefix("Rendering");
        bar.enable_steady_tick(Duration::from_millis(80));
        Arc::new(Self { bar })
    }

    fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl IngestProgressCallback for CliProgressCallback {
    fn on_document_start(&self, document: &str, total_pages: usize) {
        self.bar.inc_length(total_pages as u64);
        self.bar
            .println(format!("  {} {}  {}", bold("◆"), document, dim(&format!("{total_pages} pages"))));
    }

    fn on_page_rendered(&self, document: &str, page: usize, total_pages: usize) {
        self.bar.println(format!(
            "  {} {} page {:>3}/{:<3}",
            green("✓"),
            dim(document),
            page,
            total_pages
        ));
        self.bar.inc(1);
    }

    fn on_page_failed(&self, document: &str, page: usize, total_pages: usize, error: &str) {
        let msg: String = if error.chars().count() > 80 {
            format!("{}\u{2026}", error.chars().take(79).collect::<String>())
        } else {
            error.to_string()
        };
        self.bar.println(format!(
            "  {} {} page {:>3}/{:<3}  {}",
            red("✗"),
            dim(document),
            page,
            total_pages,
            red(&msg)
        ));
        self.bar.inc(1);
    }

    fn on_text_extracted(&self, image: &str, chars: usize) {
        self.bar.set_prefix("Recognising");
        self.bar.set_message(format!("{image} ({chars} chars)"));
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Recognise a scanned PDF in the primary language
  docingest scan.pdf --primary-dict dict/en_US.dic

  # Two files, the second one German
  docingest report.pdf brief.png --lang eng --lang deu \
      --primary-dict dict/en_US.dic --secondary-dict dict/de_DE.dic

  # Render each page three times and keep the most complete capture
  docingest --samples 3 --concurrency 4 scan.pdf

  # Print the JSON response instead of the text
  docingest --json scan.pdf

ENVIRONMENT VARIABLES:
  PDFIUM_LIB_PATH         Path to libpdfium (file or directory)
  DOCINGEST_TESSERACT     tesseract executable
  DOCINGEST_PRIMARY_DICT  Word list / .dic for the primary language
  DOCINGEST_SECONDARY_DICT  Word list / .dic for the secondary language
  RUST_LOG                Overrides the log filter
"#;

/// Rasterise, recognise and spell-correct documents.
#[derive(Parser, Debug)]
#[command(
    name = "docingest",
    version,
    about = "Rasterise, recognise and spell-correct documents",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// PDF, image or docx files.
    #[arg(required = true)]
    files: Vec<PathBuf>,

    /// Language tag per file, in file order (repeatable).
    #[arg(short, long = "lang", value_name = "CODE")]
    langs: Vec<String>,

    /// Language for files without a tag.
    #[arg(long, env = "DOCINGEST_DEFAULT_LANGUAGE", value_enum, default_value = "primary")]
    default_language: LanguageArg,

    /// Locale code of the primary language.
    #[arg(long, env = "DOCINGEST_PRIMARY_CODE", default_value = "eng")]
    primary_code: String,

    /// Locale code of the secondary language.
    #[arg(long, env = "DOCINGEST_SECONDARY_CODE", default_value = "deu")]
    secondary_code: String,

    /// Word list or hunspell .dic for the primary language.
    #[arg(long, env = "DOCINGEST_PRIMARY_DICT")]
    primary_dict: Option<PathBuf>,

    /// Word list or hunspell .dic for the secondary language.
    #[arg(long, env = "DOCINGEST_SECONDARY_DICT")]
    secondary_dict: Option<PathBuf>,

    /// tesseract executable.
    #[arg(long, env = "DOCINGEST_TESSERACT", default_value = "tesseract")]
    tesseract: PathBuf,

    /// Pages rendered concurrently per document.
    #[arg(short, long, env = "DOCINGEST_CONCURRENCY", default_value_t = 7)]
    concurrency: usize,

    /// Render rounds per page; the largest capture wins.
    #[arg(long, env = "DOCINGEST_SAMPLES", default_value_t = 1)]
    samples: usize,

    /// Pause after the surface is idle, in milliseconds.
    #[arg(long, env = "DOCINGEST_SETTLE_MS", default_value_t = 300)]
    settle_ms: u64,

    /// Device scale factor (1–7).
    #[arg(long, env = "DOCINGEST_SCALE", default_value_t = 2.0)]
    scale: f32,

    /// Points subtracted from each page's width and height.
    #[arg(long, env = "DOCINGEST_MARGIN", default_value_t = 0.0)]
    margin: f32,

    /// Per-step render timeout in seconds.
    #[arg(long, env = "DOCINGEST_RENDER_TIMEOUT", default_value_t = 30)]
    render_timeout: u64,

    /// Fail a document when any of its pages cannot be rendered.
    #[arg(long, env = "DOCINGEST_ABORT_ON_PAGE_FAILURE")]
    abort_on_page_failure: bool,

    /// Replace the flagged token itself rather than its first occurrence.
    #[arg(long, env = "DOCINGEST_REPLACE_AT_POSITION")]
    replace_at_position: bool,

    /// Images recognised concurrently.
    #[arg(long, env = "DOCINGEST_RECOGNITION_CONCURRENCY", default_value_t = 1)]
    recognition_concurrency: usize,

    /// Largest accepted file, in MiB.
    #[arg(long, env = "DOCINGEST_MAX_UPLOAD_MB", default_value_t = 10)]
    max_upload_mb: u64,

    /// Most files per request.
    #[arg(long, env = "DOCINGEST_MAX_FILES", default_value_t = 10)]
    max_files: usize,

    /// Print the JSON response instead of the corrected text.
    #[arg(long, env = "DOCINGEST_JSON")]
    json: bool,

    /// Disable progress bar.
    #[arg(long, env = "DOCINGEST_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "DOCINGEST_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "DOCINGEST_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LanguageArg {
    Primary,
    Secondary,
}

impl From<LanguageArg> for Language {
    fn from(v: LanguageArg) -> Self {
        match v {
            LanguageArg::Primary => Language::Primary,
            LanguageArg::Secondary => Language::Secondary,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
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

    let progress = show_progress.then(CliProgressCallback::new);
    let config = build_config(&cli, progress.clone().map(|p| p as ProgressCallback))?;

    // ── Engines ──────────────────────────────────────────────────────────
    let binding = locate_pdfium().context("PDF engine unavailable")?;
    let (pdf, surface) = pdfium_backends(binding);
    let engines = Engines {
        pdf,
        surface,
        recognizer: Arc::new(TesseractRecognizer::new(&cli.tesseract, config.languages.clone())),
        primary_dictionary: load_dictionary(cli.primary_dict.as_deref(), "primary")?,
        secondary_dictionary: load_dictionary(cli.secondary_dict.as_deref(), "secondary")?,
    };
    let ingestor = Ingestor::new(config, engines);

    // ── Run ──────────────────────────────────────────────────────────────
    let files: Vec<(PathBuf, Option<String>)> = cli
        .files
        .iter()
        .enumerate()
        .map(|(i, path)| (path.clone(), cli.langs.get(i).cloned()))
        .collect();
    let result = ingestor.ingest_paths(&files).await;
    if let Some(p) = &progress {
        p.finish();
    }

    let response = ingestor.respond(&result);
    if cli.json {
        println!(
            "{}",
            serde_json::to_string_pretty(&response).context("Failed to serialise response")?
        );
    }
    let report = result.context("Ingestion failed")?;

    if !cli.json {
        for text in &report.texts {
            if !cli.quiet {
                eprintln!("{}", bold(&format!("── {} ──", text.source_path.display())));
            }
            println!("{}", text.corrected_text.trim_end());
        }
    }
    if !cli.quiet {
        let failed: usize = report.files.iter().map(|f| f.unresolved_pages.len()).sum();
        let mark = if failed == 0 { green("✔") } else { red("⚠") };
        eprintln!(
            "{} {}  {}",
            mark,
            response.message,
            dim(&format!("{} text(s), {} page(s) unresolved", report.texts.len(), failed))
        );
    }
    Ok(())
}

/// Map CLI args to `IngestConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<IngestConfig> {
    let mut builder = IngestConfig::builder()
        .concurrency(cli.concurrency)
        .sample_count(cli.samples)
        .settle_delay_ms(cli.settle_ms)
        .scale_factor(cli.scale)
        .page_margin(cli.margin)
        .render_timeout_secs(cli.render_timeout)
        .page_failure_policy(if cli.abort_on_page_failure {
            PageFailurePolicy::Abort
        } else {
            PageFailurePolicy::Continue
        })
        .replacement_mode(if cli.replace_at_position {
            ReplacementMode::TokenPosition
        } else {
            ReplacementMode::FirstOccurrence
        })
        .default_language(cli.default_language.into())
        .languages(LanguageCodes {
            primary: cli.primary_code.clone(),
            secondary: cli.secondary_code.clone(),
        })
        .recognition_concurrency(cli.recognition_concurrency)
        .max_upload_bytes(cli.max_upload_mb.saturating_mul(1024 * 1024))
        .max_files(cli.max_files);
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }
    builder.build().context("Invalid configuration")
}

fn load_dictionary(path: Option<&Path>, which: &str) -> Result<Arc<dyn SpellEngine>> {
    match path {
        Some(path) => {
            let dictionary = WordListDictionary::from_path(path)
                .with_context(|| format!("Failed to load {which} dictionary from {:?}", path))?;
            Ok(Arc::new(dictionary))
        }
        None => {
            warn!("No {} dictionary given; its text will not be corrected", which);
            Ok(Arc::new(WordListDictionary::from_words(Vec::<String>::new())))
        }
    }
}
