//! The document model shared by every pipeline stage.
//!
//! ```text
//! RawExtraction ──▶ Section* ──▶ Document { metadata, sections, blocks }
//!  (per URL)        (labeled)     (terminal artifact, handed to a PdfWriter)
//! ```
//!
//! All types are plain data: created once by the stage that owns them and
//! only read afterwards. Everything serialises with serde so the `Document`
//! can be written next to the PDF for automated consumers.

use crate::config::SampleLayout;
use crate::error::PipelineError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

// ── Platform ─────────────────────────────────────────────────────────────

/// The judge a problem page comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Platform {
    AtCoder,
    Codeforces,
    #[serde(rename = "SPOJ")]
    Spoj,
    CodeChef,
    #[default]
    Unknown,
}

impl Platform {
    /// Guess the platform from a URL's host.
    pub fn detect(url: &str) -> Self {
        let host = url::Url::parse(url)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_ascii_lowercase()))
            .unwrap_or_default();
        let host = host.trim_start_matches("www.");
        if host == "atcoder.jp" || host.ends_with(".atcoder.jp") {
            Platform::AtCoder
        } else if host == "codeforces.com" || host.ends_with(".codeforces.com") {
            Platform::Codeforces
        } else if host == "spoj.com" || host.ends_with(".spoj.com") {
            Platform::Spoj
        } else if host == "codechef.com" || host.ends_with(".codechef.com") {
            Platform::CodeChef
        } else {
            Platform::Unknown
        }
    }

    /// Human-readable name used in the document header.
    pub fn display_name(&self) -> &'static str {
        match self {
            Platform::AtCoder => "AtCoder",
            Platform::Codeforces => "Codeforces",
            Platform::Spoj => "SPOJ",
            Platform::CodeChef => "CodeChef",
            Platform::Unknown => "Unknown",
        }
    }

    /// How samples are laid out when the caller does not choose.
    pub fn default_sample_layout(&self) -> SampleLayout {
        match self {
            Platform::AtCoder | Platform::Codeforces => SampleLayout::TwoColumn,
            _ => SampleLayout::Stacked,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

// ── Raw extraction ───────────────────────────────────────────────────────

/// An image found on the page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ImageRef {
    /// Absolute source URL (or a `data:` URI).
    pub url: String,
    /// Path inside the image cache once fetched.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub local_path: Option<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default)]
    pub alt: String,
    /// Field the image was found in, used to place it next to that section.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<SectionKind>,
}

impl ImageRef {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Self::default()
        }
    }

    pub fn with_dimensions(mut self, width: u32, height: u32) -> Self {
        self.width = Some(width);
        self.height = Some(height);
        self
    }

    pub fn with_origin(mut self, origin: SectionKind) -> Self {
        self.origin = Some(origin);
        self
    }
}

/// One sample test: input text and its expected output, verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Sample {
    pub input: String,
    pub output: String,
}

impl Sample {
    pub fn new(input: impl Into<String>, output: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.input.trim().is_empty() && self.output.trim().is_empty()
    }
}

/// The per-page bag of fields a platform source harvested.
///
/// Any field may be empty: a source records why in `failures` instead of
/// aborting, so a partial page is still representable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawExtraction {
    pub url: String,
    pub platform: Platform,
    pub title: String,
    pub statement_html: String,
    pub constraints_html: String,
    pub input_format_html: String,
    pub output_format_html: String,
    #[serde(default)]
    pub notes_html: String,
    pub samples: Vec<Sample>,
    pub images: Vec<ImageRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub is_editorial: bool,
    /// Per-field extraction failures.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failures: Vec<PipelineError>,
}

impl RawExtraction {
    pub fn new(url: impl Into<String>, platform: Platform) -> Self {
        Self {
            url: url.into(),
            platform,
            ..Self::default()
        }
    }

    /// True when at least one content field carries something.
    pub fn has_content(&self) -> bool {
        [
            &self.statement_html,
            &self.constraints_html,
            &self.input_format_html,
            &self.output_format_html,
            &self.notes_html,
        ]
        .iter()
        .any(|f| !f.trim().is_empty())
            || self.samples.iter().any(|s| !s.is_empty())
    }

    /// Record that `field` could not be extracted.
    pub fn record_failure(&mut self, field: &str, reason: impl Into<String>) {
        self.failures.push(PipelineError::Extraction {
            field: field.to_string(),
            reason: reason.into(),
        });
    }
}

// ── Sections ─────────────────────────────────────────────────────────────

/// Semantic label of a section.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionKind {
    Title,
    Statement,
    Constraints,
    InputFormat,
    OutputFormat,
    SampleInput,
    SampleOutput,
    CodeBlock,
    FormatBlock,
    Table,
    Image,
    Notes,
}

impl SectionKind {
    /// Stable ASCII label used for machine-readable markers.
    ///
    /// The vocabulary is the same for every platform.
    pub fn label(&self) -> &'static str {
        match self {
            SectionKind::Title => "PROBLEM_TITLE",
            SectionKind::Statement => "PROBLEM_STATEMENT",
            SectionKind::Constraints => "CONSTRAINTS",
            SectionKind::InputFormat => "INPUT_FORMAT",
            SectionKind::OutputFormat => "OUTPUT_FORMAT",
            SectionKind::SampleInput => "SAMPLE_INPUT",
            SectionKind::SampleOutput => "SAMPLE_OUTPUT",
            SectionKind::CodeBlock => "CODE_BLOCK",
            SectionKind::FormatBlock => "FORMAT_BLOCK",
            SectionKind::Table => "TABLE",
            SectionKind::Image => "IMAGE",
            SectionKind::Notes => "NOTE",
        }
    }

    /// Heading printed above a field's group of blocks, if any.
    pub fn heading(&self) -> Option<&'static str> {
        match self {
            SectionKind::Statement => Some("Problem Statement"),
            SectionKind::Constraints => Some("Constraints"),
            SectionKind::InputFormat => Some("Input"),
            SectionKind::OutputFormat => Some("Output"),
            SectionKind::Notes => Some("Notes"),
            _ => None,
        }
    }

    /// Kinds rendered in a fixed-width container.
    pub fn is_monospace(&self) -> bool {
        matches!(
            self,
            SectionKind::CodeBlock
                | SectionKind::FormatBlock
                | SectionKind::SampleInput
                | SectionKind::SampleOutput
        )
    }
}

/// A labeled, ordered block of content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub content: String,
    /// Source field this block was produced from. Equals `kind` for prose;
    /// differs for code, format, table and image blocks found inside a field.
    pub field: SectionKind,
    /// Content came from preformatted (monospace) markup.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub monospace: bool,
    /// Guessed language of a `CodeBlock`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    /// The image an `Image` section shows.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<ImageRef>,
}

impl Section {
    pub fn new(kind: SectionKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            field: kind,
            monospace: kind.is_monospace(),
            language: None,
            image: None,
        }
    }

    pub fn in_field(mut self, field: SectionKind) -> Self {
        self.field = field;
        self
    }

    pub fn monospace(mut self) -> Self {
        self.monospace = true;
        self
    }

    pub fn image(image: ImageRef, field: SectionKind) -> Self {
        Self {
            kind: SectionKind::Image,
            content: image.alt.clone(),
            field,
            monospace: false,
            language: None,
            image: Some(image),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kind != SectionKind::Image && self.content.trim().is_empty()
    }
}

// ── Document ─────────────────────────────────────────────────────────────

/// How the final PDF was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum GenerationMode {
    Exact,
    #[serde(rename = "StructuredHTML")]
    StructuredHtml,
    Assembled,
}

impl fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            GenerationMode::Exact => "exact",
            GenerationMode::StructuredHtml => "structured-html",
            GenerationMode::Assembled => "assembled",
        })
    }
}

/// Metadata stamped on every document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub source_url: String,
    pub platform: Platform,
    pub generation_mode: GenerationMode,
    pub generated_at: DateTime<Utc>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub memory_limit: Option<String>,
    #[serde(default)]
    pub is_editorial: bool,
    /// Set only on error documents: why full content could not be produced.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl DocumentMetadata {
    /// Metadata for a document built from `raw`.
    pub fn from_raw(raw: &RawExtraction, mode: GenerationMode, at: DateTime<Utc>) -> Self {
        Self {
            source_url: raw.url.clone(),
            platform: raw.platform,
            generation_mode: mode,
            generated_at: at,
            title: raw.title.trim().to_string(),
            time_limit: raw.time_limit.clone(),
            memory_limit: raw.memory_limit.clone(),
            is_editorial: raw.is_editorial,
            failure_reason: None,
        }
    }
}

/// One layout unit handed to the PDF writer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub kind: BlockKind,
    /// Do not tear this block across a page boundary.
    #[serde(default)]
    pub keep_together: bool,
    /// Do not leave this block alone at the bottom of a page.
    #[serde(default)]
    pub keep_with_next: bool,
}

impl Block {
    pub fn flowing(kind: BlockKind) -> Self {
        Self {
            kind,
            keep_together: false,
            keep_with_next: false,
        }
    }

    pub fn unsplittable(kind: BlockKind) -> Self {
        Self {
            kind,
            keep_together: true,
            keep_with_next: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum BlockKind {
    Heading {
        level: u8,
        text: String,
    },
    Paragraph {
        text: String,
    },
    /// Small secondary line (platform, URL, limits, footer).
    Meta {
        text: String,
    },
    /// Fixed-width, visually offset container.
    Monospace {
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        label: Option<String>,
    },
    SamplePair {
        index: usize,
        input: String,
        output: String,
        layout: SampleLayout,
    },
    Table {
        rows: Vec<Vec<String>>,
        /// Column widths in characters, derived from the widest cell.
        column_widths: Vec<usize>,
    },
    Image {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<PathBuf>,
        url: String,
        width: u32,
        height: u32,
        caption: String,
    },
    /// Machine-readable section marker such as `[CONSTRAINTS]`.
    Marker {
        text: String,
    },
    Rule,
}

/// The terminal artifact of one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub metadata: DocumentMetadata,
    pub sections: Vec<Section>,
    pub blocks: Vec<Block>,
}

impl Document {
    /// Sections that carry visible content (titles excluded).
    pub fn content_sections(&self) -> impl Iterator<Item = &Section> {
        self.sections
            .iter()
            .filter(|s| s.kind != SectionKind::Title && !s.is_empty())
    }

    pub fn is_error_document(&self) -> bool {
        self.metadata.failure_reason.is_some()
    }

    /// Render the laid-out blocks as plain text, one block per paragraph.
    pub fn to_plain_text(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            let piece = match &block.kind {
                BlockKind::Heading { level, text } => {
                    format!("{} {}", "#".repeat(*level as usize), text)
                }
                BlockKind::Paragraph { text }
                | BlockKind::Meta { text }
                | BlockKind::Marker { text } => text.clone(),
                BlockKind::Monospace { text, label } => match label {
                    Some(l) => format!("{l}:\n{text}"),
                    None => text.clone(),
                },
                BlockKind::SamplePair {
                    index,
                    input,
                    output,
                    ..
                } => format!("Sample Input {index}:\n{input}\n\nSample Output {index}:\n{output}"),
                BlockKind::Table { rows, .. } => rows
                    .iter()
                    .map(|r| r.join(" | "))
                    .collect::<Vec<_>>()
                    .join("\n"),
                BlockKind::Image { caption, url, .. } => {
                    if caption.is_empty() {
                        format!("[image: {url}]")
                    } else {
                        format!("[image: {caption}]")
                    }
                }
                BlockKind::Rule => "----".to_string(),
            };
            if !out.is_empty() {
                out.push_str("\n\n");
            }
            out.push_str(&piece);
        }
        out.push('\n');
        out
    }
}
