//! # cp2pdf
//!
//! Convert competitive-programming problem pages (AtCoder, Codeforces, SPOJ,
//! CodeChef and editorials) into PDF documents.
//!
//! Two fidelity modes are offered: an exact visual capture of the live page
//! through a headless browser, or a re-flowed document assembled from the
//! scraped statement, with math converted to Unicode and every section
//! labeled. A layered fallback guarantees that every URL yields a PDF, even
//! if it is only an error page saying what went wrong.
//!
//! ## Pipeline Overview
//!
//! ```text
//! URL
//!  │
//!  ├─ TryExact           headless browser capture of the live page
//!  │
//!  ├─ TryStructuredHTML  scrape ─┐
//!  ├─ TryAssembled       ────────┤
//!  │                             ├─ 1. Sanitize   repair broken HTML, protect math spans
//!  │                             ├─ 2. Symbols    LaTeX tokens → Unicode
//!  │                             ├─ 3. Format     paragraphs, sub/superscripts, format blocks
//!  │                             ├─ 4. Classify   labeled sections (+ semantic markers)
//!  │                             ├─ 5. Images     drop icons, flags, tracking pixels
//!  │                             └─ 6. Assemble   paginated blocks → HTML or lopdf
//!  │
//!  └─ ErrorDocument      minimal PDF naming the URL and the last failure
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use cp2pdf::{convert_to_file, ConversionConfig, GenerationPreference};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConversionConfig::builder()
//!         .mode(GenerationPreference::Assembled)
//!         .semantic_markers(true)
//!         .output_dir("pdfs")
//!         .build()?;
//!     let output = convert_to_file("https://codeforces.com/problemset/problem/4/A", &config).await?;
//!     eprintln!("{} via {:?} → {:?}", output.status, output.mode, output.output_path);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `cp2pdf` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! cp2pdf = { version = "0.1", default-features = false }
//! ```
//!
//! ## External tools
//!
//! Exact capture and structured HTML rendering need Chrome or Chromium on
//! `PATH` (or [`ConversionConfig::chrome_path`]). Without one, conversions
//! fall through to the built-in assembled writer, which needs nothing.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cache;
pub mod config;
pub mod convert;
pub mod error;
pub mod fallback;
pub mod fetch;
pub mod model;
pub mod output;
pub mod pipeline;
pub mod progress;
pub mod render;
pub mod sources;
pub mod stream;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, GenerationPreference, PageSize, SampleLayout};
pub use convert::{
    convert, convert_many, convert_many_with, convert_sync, convert_to_file, convert_to_file_with,
    convert_with, output_filename, validate_url,
};
pub use error::{Cp2PdfError, PipelineError};
pub use fallback::{
    CaptureOptions, Collaborators, ControllerState, ExtractionProvider, FallbackController, HtmlRenderer,
    PageCapture, PdfWriter,
};
pub use model::{Document, GenerationMode, ImageRef, Platform, RawExtraction, Sample, Section, SectionKind};
pub use output::{ConversionOutput, ConversionStats, FinalStatus, Transition};
pub use progress::{ConversionProgressCallback, NoopProgressCallback, ProgressCallback};
pub use stream::{convert_stream, convert_stream_with, OutputStream};
