//! Configuration types for problem-page conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. One struct holds every knob so a
//! config can be cloned into concurrent pipelines, serialised for logging,
//! and diffed between runs.

use crate::error::Cp2PdfError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Browser-like user agent; several judges reject the default reqwest one.
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 \
(KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Configuration for converting problem pages to PDF.
///
/// Built via [`ConversionConfig::builder()`] or using
/// [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use cp2pdf::{ConversionConfig, GenerationPreference};
///
/// let config = ConversionConfig::builder()
///     .mode(GenerationPreference::Assembled)
///     .semantic_markers(true)
///     .concurrency(2)
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct ConversionConfig {
    /// Which fallback state the controller starts in. Default: Exact.
    pub mode: GenerationPreference,

    /// Fail straight to the error document when exact capture fails. Default: false.
    ///
    /// Only meaningful with [`GenerationPreference::Exact`].
    pub exact_mandatory: bool,

    /// Machine-readable mode: wrap each section in `[LABEL]` / `[/LABEL]`. Default: false.
    pub semantic_markers: bool,

    /// Sample I/O layout. `None` uses the platform default
    /// (see [`crate::model::Platform::default_sample_layout`]).
    pub sample_layout: Option<SampleLayout>,

    /// Paper size for every generated PDF. Default: A4.
    pub page_size: PageSize,

    /// Inject style rules hiding navigation, ads and footers before exact
    /// capture. Default: true.
    pub suppress_page_chrome: bool,

    /// Images whose known dimensions are all at or below this size (px) are
    /// treated as decorative icons. Range: 1–256. Default: 32.
    pub image_min_dimension: u32,

    /// Fetch, filter and embed statement images. Default: true.
    pub include_images: bool,

    /// Timeout for page and image fetches, in seconds. Default: 30.
    pub fetch_timeout_secs: u64,

    /// Timeout for one page capture or HTML render, in seconds. Default: 60.
    pub render_timeout_secs: u64,

    /// Documents converted concurrently by the batch entry points. Default: 4.
    pub concurrency: usize,

    /// Directory receiving PDFs; cached images go to `images/` below it.
    /// Default: `output`.
    pub output_dir: PathBuf,

    /// Explicit headless-browser binary. If None, PATH is searched.
    pub chrome_path: Option<PathBuf>,

    /// User-Agent header sent on every fetch.
    pub user_agent: String,

    /// Also write the `Document` as `<name>.json` next to the PDF. Default: false.
    pub write_json: bool,

    /// Optional per-document progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            mode: GenerationPreference::default(),
            exact_mandatory: false,
            semantic_markers: false,
            sample_layout: None,
            page_size: PageSize::default(),
            suppress_page_chrome: true,
            image_min_dimension: 32,
            include_images: true,
            fetch_timeout_secs: 30,
            render_timeout_secs: 60,
            concurrency: 4,
            output_dir: PathBuf::from("output"),
            chrome_path: None,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            write_json: false,
            progress_callback: None,
        }
    }
}

impl fmt::Debug for ConversionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConversionConfig")
            .field("mode", &self.mode)
            .field("exact_mandatory", &self.exact_mandatory)
            .field("semantic_markers", &self.semantic_markers)
            .field("sample_layout", &self.sample_layout)
            .field("page_size", &self.page_size)
            .field("suppress_page_chrome", &self.suppress_page_chrome)
            .field("image_min_dimension", &self.image_min_dimension)
            .field("include_images", &self.include_images)
            .field("fetch_timeout_secs", &self.fetch_timeout_secs)
            .field("render_timeout_secs", &self.render_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("output_dir", &self.output_dir)
            .field("chrome_path", &self.chrome_path)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<dyn ConversionProgressCallback>"),
            )
            .finish()
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Directory holding cached images.
    pub fn image_dir(&self) -> PathBuf {
        self.output_dir.join("images")
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn mode(mut self, mode: GenerationPreference) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn exact_mandatory(mut self, v: bool) -> Self {
        self.config.exact_mandatory = v;
        self
    }

    pub fn semantic_markers(mut self, v: bool) -> Self {
        self.config.semantic_markers = v;
        self
    }

    pub fn sample_layout(mut self, layout: SampleLayout) -> Self {
        self.config.sample_layout = Some(layout);
        self
    }

    pub fn page_size(mut self, size: PageSize) -> Self {
        self.config.page_size = size;
        self
    }

    pub fn suppress_page_chrome(mut self, v: bool) -> Self {
        self.config.suppress_page_chrome = v;
        self
    }

    pub fn image_min_dimension(mut self, px: u32) -> Self {
        self.config.image_min_dimension = px.clamp(1, 256);
        self
    }

    pub fn include_images(mut self, v: bool) -> Self {
        self.config.include_images = v;
        self
    }

    pub fn fetch_timeout_secs(mut self, secs: u64) -> Self {
        self.config.fetch_timeout_secs = secs;
        self
    }

    pub fn render_timeout_secs(mut self, secs: u64) -> Self {
        self.config.render_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn chrome_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.chrome_path = Some(path.into());
        self
    }

    pub fn user_agent(mut self, ua: impl Into<String>) -> Self {
        self.config.user_agent = ua.into();
        self
    }

    pub fn write_json(mut self, v: bool) -> Self {
        self.config.write_json = v;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, Cp2PdfError> {
        let c = &self.config;
        if c.fetch_timeout_secs == 0 || c.render_timeout_secs == 0 {
            return Err(Cp2PdfError::InvalidConfig(
                "Timeouts must be at least 1 second".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(Cp2PdfError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if c.exact_mandatory && c.mode != GenerationPreference::Exact {
            return Err(Cp2PdfError::InvalidConfig(format!(
                "exact_mandatory requires mode Exact, got {:?}",
                c.mode
            )));
        }
        if c.output_dir.as_os_str().is_empty() {
            return Err(Cp2PdfError::InvalidConfig(
                "Output directory must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Where the fallback chain starts.
///
/// | Preference | First state |
/// |------------|-------------|
/// | Exact      | browser capture of the live page |
/// | Structured | sanitized HTML through the HTML-to-PDF renderer |
/// | Assembled  | the built-in PDF writer, no browser needed |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GenerationPreference {
    /// Visual clone of the page (default).
    #[default]
    Exact,
    /// Re-flowed HTML rendered by the browser.
    Structured,
    /// Re-flowed document written directly.
    Assembled,
}

/// How a sample input/output pair is placed on the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SampleLayout {
    /// Input and output side by side.
    TwoColumn,
    /// Input above output (default).
    #[default]
    Stacked,
}

/// Paper size of generated documents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageSize {
    #[default]
    A4,
    Letter,
}

impl PageSize {
    /// Width and height in PDF points.
    pub fn dimensions_pt(&self) -> (f32, f32) {
        match self {
            PageSize::A4 => (595.0, 842.0),
            PageSize::Letter => (612.0, 792.0),
        }
    }

    /// Name understood by CSS `@page { size: … }`.
    pub fn css_name(&self) -> &'static str {
        match self {
            PageSize::A4 => "A4",
            PageSize::Letter => "letter",
        }
    }
}
