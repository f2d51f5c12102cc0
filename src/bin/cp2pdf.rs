//! CLI binary for cp2pdf.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConversionConfig` and reports per-URL results.

use anyhow::{Context, Result};
use clap::Parser;
use cp2pdf::{
    convert_many, ConversionConfig, ConversionOutput, ConversionProgressCallback, GenerationPreference,
    PageSize, ProgressCallback, SampleLayout,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::collections::HashMap;
use std::io::{self, Write};
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
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

const TICKS: &[&str] = &["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"];

// ── CLI progress callback using indicatif ────────────────────────────────────

/// Terminal progress: one bar over the batch plus a log line per URL and
/// per fallback transition. URLs may finish out of order.
struct CliProgressCallback {
    bar: ProgressBar,
    start_times: Mutex<HashMap<String, Instant>>,
    error_documents: AtomicUsize,
}

impl CliProgressCallback {
    fn new() -> Arc<Self> {
        let bar = ProgressBar::new(0);
        let style = ProgressStyle::with_template(
            "{spinner:.cyan} {prefix:.bold}  [{bar:42.green/238}] {pos:>3}/{len} URLs  ⏱ {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█▉▊▋▌▍▎▏  ")
        .tick_strings(TICKS);
        bar.set_style(style);
        bar.set_prefix("Converting");
        bar.enable_steady_tick(Duration::from_millis(80));

        Arc::new(Self {
            bar,
            start_times: Mutex::new(HashMap::new()),
            error_documents: AtomicUsize::new(0),
        })
    }

    fn elapsed(&self, url: &str) -> f64 {
        self.start_times
            .lock()
            .ok()
            .and_then(|mut m| m.remove(url))
            .map(|t| t.elapsed().as_secs_f64())
            .unwrap_or(0.0)
    }
}

impl ConversionProgressCallback for CliProgressCallback {
    fn on_batch_start(&self, total_urls: usize) {
        self.bar.set_length(total_urls as u64);
        self.bar.println(format!(
            "{} {}",
            cyan("◆"),
            bold(&format!("Converting {total_urls} URL(s)…"))
        ));
    }

    fn on_document_start(&self, url: &str) {
        if let Ok(mut m) = self.start_times.lock() {
            m.insert(url.to_string(), Instant::now());
        }
        self.bar.set_message(url.to_string());
    }

    fn on_transition(&self, url: &str, from: &str, to: &str, reason: &str) {
        let reason = if reason.chars().count() > 80 {
            format!("{}\u{2026}", reason.chars().take(79).collect::<String>())
        } else {
            reason.to_string()
        };
        self.bar.println(format!(
            "  {} {}  {} → {}  {}",
            yellow("↳"),
            dim(url),
            from,
            to,
            dim(&reason)
        ));
    }

    fn on_document_complete(&self, url: &str, status: &str, pdf_len: usize) {
        let secs = self.elapsed(url);
        let mark = if status == "done" {
            green("✓")
        } else {
            self.error_documents.fetch_add(1, Ordering::SeqCst);
            red("✗")
        };
        self.bar.println(format!(
            "  {mark} {url}  {}  {}",
            dim(&format!("{:>7} bytes", pdf_len)),
            dim(&format!("{secs:.1}s")),
        ));
        self.bar.inc(1);
    }

    fn on_batch_complete(&self, total_urls: usize, done_count: usize) {
        self.bar.finish_and_clear();
        let failed = total_urls.saturating_sub(done_count);
        if failed == 0 {
            eprintln!("{} {} URL(s) converted", green("✔"), bold(&done_count.to_string()));
        } else {
            eprintln!(
                "{} {}/{} URL(s) converted  ({} error document(s))",
                if done_count == 0 { red("✘") } else { cyan("⚠") },
                bold(&done_count.to_string()),
                total_urls,
                red(&failed.to_string()),
            );
        }
    }
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Exact capture, falling back to the re-flowed document
  cp2pdf https://atcoder.jp/contests/abc300/tasks/abc300_a

  # Re-flowed, machine-readable document with section markers
  cp2pdf --mode assembled --markers https://codeforces.com/problemset/problem/4/A

  # A batch from a file (one URL per line, '#' comments allowed)
  cp2pdf --input-file urls.txt -o pdfs -c 8

  # Print the assembled document as text instead of opening the PDF
  cp2pdf --mode assembled --text https://www.spoj.com/problems/TEST/

GENERATION MODES:
  exact        headless-browser capture of the live page (needs Chrome/Chromium)
  structured   scraped statement rendered as HTML by the browser
  assembled    scraped statement laid out by the built-in PDF writer

  Each mode falls back to the next one; when all fail, an error PDF naming
  the URL and the failure is written instead.

ENVIRONMENT VARIABLES:
  CP2PDF_RENDER_DISABLE   Set to 1 to skip the headless browser entirely
  RUST_LOG                Override the log filter (e.g. cp2pdf=debug)
"#;

/// Convert competitive-programming problem pages to PDF.
#[derive(Parser, Debug)]
#[command(
    name = "cp2pdf",
    version,
    about = "Convert competitive-programming problem pages to PDF",
    long_about = "Convert AtCoder, Codeforces, SPOJ and CodeChef problem pages (and their \
editorials) to PDF, either as an exact capture of the page or as a re-flowed document with \
math converted to Unicode and labeled sections.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Problem or editorial URLs.
    urls: Vec<String>,

    /// Read additional URLs from this file, one per line.
    #[arg(short = 'i', long, env = "CP2PDF_INPUT_FILE")]
    input_file: Option<PathBuf>,

    /// Directory receiving the PDFs (cached images go to `images/` below it).
    #[arg(short, long = "output-dir", env = "CP2PDF_OUTPUT_DIR", default_value = "output")]
    output: PathBuf,

    /// Generation mode to start from.
    #[arg(long, env = "CP2PDF_MODE", value_enum, default_value = "exact")]
    mode: ModeArg,

    /// Go straight to the error document when exact capture fails.
    #[arg(long, env = "CP2PDF_EXACT_MANDATORY")]
    exact_mandatory: bool,

    /// Wrap each section in [LABEL] ... [/LABEL] markers.
    #[arg(long, env = "CP2PDF_MARKERS")]
    markers: bool,

    /// Sample I/O layout (default depends on the platform).
    #[arg(long, env = "CP2PDF_LAYOUT", value_enum)]
    layout: Option<LayoutArg>,

    /// Paper size.
    #[arg(long, env = "CP2PDF_PAGE_SIZE", value_enum, default_value = "a4")]
    page_size: PageSizeArg,

    /// Capture the page as-is, without hiding navigation and ads.
    #[arg(long, env = "CP2PDF_KEEP_PAGE_CHROME")]
    keep_page_chrome: bool,

    /// Skip statement images.
    #[arg(long, env = "CP2PDF_NO_IMAGES")]
    no_images: bool,

    /// Images at or below this size (px) are treated as icons (1–256).
    #[arg(long, env = "CP2PDF_MIN_IMAGE_SIZE", default_value_t = 32,
          value_parser = clap::value_parser!(u32).range(1..=256))]
    min_image_size: u32,

    /// Page and image fetch timeout in seconds.
    #[arg(long, env = "CP2PDF_FETCH_TIMEOUT", default_value_t = 30)]
    fetch_timeout: u64,

    /// Page capture / HTML render timeout in seconds.
    #[arg(long, env = "CP2PDF_RENDER_TIMEOUT", default_value_t = 60)]
    render_timeout: u64,

    /// Number of URLs converted concurrently.
    #[arg(short, long, env = "CP2PDF_CONCURRENCY", default_value_t = 4)]
    concurrency: usize,

    /// Chrome/Chromium binary (default: searched on PATH).
    #[arg(long, env = "CP2PDF_CHROME")]
    chrome: Option<PathBuf>,

    /// User-Agent header for page and image fetches.
    #[arg(long, env = "CP2PDF_USER_AGENT")]
    user_agent: Option<String>,

    /// Also write <name>.json next to each PDF.
    #[arg(long, env = "CP2PDF_WRITE_JSON")]
    write_json: bool,

    /// Print each ConversionOutput as JSON on stdout.
    #[arg(long, env = "CP2PDF_JSON", conflicts_with = "text")]
    json: bool,

    /// Print each assembled document as plain text on stdout.
    #[arg(long, env = "CP2PDF_TEXT")]
    text: bool,

    /// Disable progress bar.
    #[arg(long, env = "CP2PDF_NO_PROGRESS")]
    no_progress: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CP2PDF_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CP2PDF_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum ModeArg {
    Exact,
    Structured,
    Assembled,
}

impl From<ModeArg> for GenerationPreference {
    fn from(v: ModeArg) -> Self {
        match v {
            ModeArg::Exact => GenerationPreference::Exact,
            ModeArg::Structured => GenerationPreference::Structured,
            ModeArg::Assembled => GenerationPreference::Assembled,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum LayoutArg {
    TwoColumn,
    Stacked,
}

impl From<LayoutArg> for SampleLayout {
    fn from(v: LayoutArg) -> Self {
        match v {
            LayoutArg::TwoColumn => SampleLayout::TwoColumn,
            LayoutArg::Stacked => SampleLayout::Stacked,
        }
    }
}

#[derive(clap::ValueEnum, Clone, Copy, Debug)]
enum PageSizeArg {
    A4,
    Letter,
}

impl From<PageSizeArg> for PageSize {
    fn from(v: PageSizeArg) -> Self {
        match v {
            PageSizeArg::A4 => PageSize::A4,
            PageSizeArg::Letter => PageSize::Letter,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // INFO-level library logs are suppressed while the progress bar is up.
    let stdout_reserved = cli.json || cli.text;
    let show_progress = !cli.quiet && !cli.no_progress && !stdout_reserved;
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .with_writer(io::stderr)
        .init();

    // ── Collect URLs ─────────────────────────────────────────────────────
    let mut urls = cli.urls.clone();
    if let Some(ref path) = cli.input_file {
        let listing = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("Failed to read URL list from {}", path.display()))?;
        urls.extend(parse_url_list(&listing));
    }
    if urls.is_empty() {
        anyhow::bail!("No URLs given");
    }

    // ── Build config ─────────────────────────────────────────────────────
    let progress_cb: Option<ProgressCallback> = if show_progress {
        Some(CliProgressCallback::new() as Arc<dyn ConversionProgressCallback>)
    } else {
        None
    };
    let config = build_config(&cli, progress_cb)?;

    // ── Run conversion ───────────────────────────────────────────────────
    let results = convert_many(&urls, &config).await.context("Conversion failed")?;

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut fatal = 0usize;
    for (url, result) in urls.iter().zip(results) {
        match result {
            Ok(output) => {
                if cli.json {
                    let json = serde_json::to_string_pretty(&output).context("Failed to serialise output")?;
                    writeln!(out, "{json}").context("Failed to write to stdout")?;
                } else if cli.text {
                    write_text(&mut out, &output)?;
                }
                if !cli.quiet && !show_progress {
                    report(&output);
                }
            }
            Err(e) => {
                fatal += 1;
                eprintln!("{} {url}: {e}", red("✘"));
            }
        }
    }

    if fatal > 0 {
        anyhow::bail!("{fatal} of {} URL(s) could not be converted", urls.len());
    }
    Ok(())
}

/// Map CLI args to `ConversionConfig`.
fn build_config(cli: &Cli, progress: Option<ProgressCallback>) -> Result<ConversionConfig> {
    let mut builder = ConversionConfig::builder()
        .mode(cli.mode.into())
        .exact_mandatory(cli.exact_mandatory)
        .semantic_markers(cli.markers)
        .page_size(cli.page_size.into())
        .suppress_page_chrome(!cli.keep_page_chrome)
        .include_images(!cli.no_images)
        .image_min_dimension(cli.min_image_size)
        .fetch_timeout_secs(cli.fetch_timeout)
        .render_timeout_secs(cli.render_timeout)
        .concurrency(cli.concurrency)
        .output_dir(cli.output.clone())
        .write_json(cli.write_json);

    if let Some(layout) = cli.layout {
        builder = builder.sample_layout(layout.into());
    }
    if let Some(ref chrome) = cli.chrome {
        builder = builder.chrome_path(chrome.clone());
    }
    if let Some(ref ua) = cli.user_agent {
        builder = builder.user_agent(ua.clone());
    }
    if let Some(cb) = progress {
        builder = builder.progress_callback(cb);
    }

    builder.build().context("Invalid configuration")
}

/// URLs from a list file: one per line, blank lines and `#` comments skipped.
fn parse_url_list(listing: &str) -> Vec<String> {
    listing
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .map(str::to_string)
        .collect()
}

fn write_text(out: &mut impl Write, output: &ConversionOutput) -> Result<()> {
    match &output.document {
        Some(doc) => {
            let text = doc.to_plain_text();
            out.write_all(text.as_bytes()).context("Failed to write to stdout")?;
            if !text.ends_with('\n') {
                out.write_all(b"\n").ok();
            }
        }
        None => {
            writeln!(out, "{}: exact capture, no text view", output.url).context("Failed to write to stdout")?;
        }
    }
    Ok(())
}

/// One summary line per URL when the progress bar is off.
fn report(output: &ConversionOutput) {
    let mark = if output.is_done() { green("✔") } else { red("✗") };
    let mode = output
        .mode
        .map(|m| m.to_string())
        .unwrap_or_else(|| "error document".to_string());
    let path = output
        .output_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_default();
    eprintln!(
        "{mark}  {}  {}  {}ms  →  {}",
        output.url,
        dim(&mode),
        output.stats.duration_ms,
        bold(&path)
    );
    if let Some(reason) = output.last_reason() {
        eprintln!("   {} {}", dim("last fallback:"), dim(reason));
    }
}
