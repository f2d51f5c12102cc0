//! Document assembly: sections + retained images → laid-out blocks.
//!
//! Layout, top to bottom:
//!
//! ```text
//! Title
//! Platform / URL / limits            (meta lines)
//! ## Problem Statement ... ## Notes  (one heading per field group)
//!    paragraphs, code / format blocks, tables, images of that field
//! Sample Input N | Sample Output N   (one unsplittable pair block)
//! ─────
//! Generated on: …
//! ```
//!
//! Monospace, table, image and sample blocks carry `keep_together`;
//! headings carry `keep_with_next`. Page breaking itself belongs to the
//! PDF writer. Semantic markers are an option of this one layout path.

use crate::config::SampleLayout;
use crate::model::{
    Block, BlockKind, Document, DocumentMetadata, GenerationMode, ImageRef, Platform, Section,
    SectionKind,
};
use crate::pipeline::classify::{end_marker, start_marker};
use chrono::{DateTime, Utc};

/// Narrowest and widest table column, in characters.
const MIN_COLUMN_WIDTH: usize = 3;
const MAX_COLUMN_WIDTH: usize = 40;

/// Rendering options threaded through assembly.
#[derive(Debug, Clone, Copy)]
pub struct AssembleOptions {
    /// Wrap sections in `[LABEL]` / `[/LABEL]` markers.
    pub semantic_markers: bool,
    pub sample_layout: SampleLayout,
}

/// Lay out `sections` in order, placing each retained image after the
/// last block of the field it came from.
pub fn assemble(
    sections: Vec<Section>,
    images: Vec<ImageRef>,
    mode: GenerationMode,
    mut metadata: DocumentMetadata,
    opts: &AssembleOptions,
) -> Document {
    metadata.generation_mode = mode;
    let sections = interleave_images(sections, images);
    let mut layout = Layout::new(opts);

    // ── Header ───────────────────────────────────────────────────────────
    let title = sections
        .iter()
        .find(|s| s.kind == SectionKind::Title)
        .map(|s| s.content.clone())
        .filter(|t| !t.is_empty())
        .unwrap_or_else(|| metadata.title.clone());
    let title = if title.is_empty() { "Untitled problem".to_string() } else { title };
    if metadata.title.is_empty() {
        metadata.title = title.clone();
    }
    layout.open(SectionKind::Title);
    layout.heading(1, &title);
    layout.close(SectionKind::Title);
    for line in header_lines(&metadata) {
        layout.push(Block::flowing(BlockKind::Meta { text: line }));
    }

    // ── Body ─────────────────────────────────────────────────────────────
    let mut group: Option<SectionKind> = None;
    let mut sample_index = 0;
    let mut iter = sections.iter().filter(|s| s.kind != SectionKind::Title).peekable();
    while let Some(section) = iter.next() {
        let field = match section.kind {
            SectionKind::SampleInput | SectionKind::SampleOutput => None,
            _ => Some(section.field),
        };
        if field != group {
            if let Some(open) = group {
                layout.close(open);
            }
            if let Some(f) = field {
                layout.open(f);
                if let Some(h) = f.heading() {
                    layout.heading(2, h);
                }
            }
            group = field;
        }

        match section.kind {
            SectionKind::SampleInput => {
                sample_index += 1;
                let output = match iter.peek() {
                    Some(next) if next.kind == SectionKind::SampleOutput => {
                        iter.next().map(|s| s.content.clone()).unwrap_or_default()
                    }
                    _ => String::new(),
                };
                layout.sample(sample_index, &section.content, &output);
            }
            SectionKind::SampleOutput => {
                sample_index += 1;
                layout.sample(sample_index, "", &section.content);
            }
            _ => layout.section(section),
        }
    }
    if let Some(open) = group {
        layout.close(open);
    }

    // ── Footer ───────────────────────────────────────────────────────────
    layout.push(Block::flowing(BlockKind::Rule));
    layout.push(Block::flowing(BlockKind::Meta {
        text: format!("Generated on: {}", format_timestamp(&metadata.generated_at)),
    }));

    Document {
        metadata,
        sections,
        blocks: layout.blocks,
    }
}

/// The minimal document produced when nothing better is possible.
pub fn error_document(
    url: &str,
    platform: Platform,
    reason: &str,
    at: DateTime<Utc>,
) -> Document {
    let metadata = DocumentMetadata {
        source_url: url.to_string(),
        platform,
        generation_mode: GenerationMode::Assembled,
        generated_at: at,
        title: "Could not generate full content".to_string(),
        time_limit: None,
        memory_limit: None,
        is_editorial: false,
        failure_reason: Some(reason.to_string()),
    };
    let blocks = vec![
        Block {
            kind: BlockKind::Heading {
                level: 1,
                text: metadata.title.clone(),
            },
            keep_together: true,
            keep_with_next: true,
        },
        Block::flowing(BlockKind::Meta {
            text: format!("URL: {url}"),
        }),
        Block::flowing(BlockKind::Meta {
            text: format!("Time: {}", format_timestamp(&at)),
        }),
        Block::flowing(BlockKind::Paragraph {
            text: format!("Reason: {reason}"),
        }),
    ];
    Document {
        metadata,
        sections: Vec::new(),
        blocks,
    }
}

pub fn format_timestamp(at: &DateTime<Utc>) -> String {
    at.format("%Y-%m-%d %H:%M:%S UTC").to_string()
}

fn header_lines(meta: &DocumentMetadata) -> Vec<String> {
    let mut lines = vec![
        format!("Platform: {}", meta.platform),
        format!("URL: {}", meta.source_url),
    ];
    let limits: Vec<String> = [
        meta.time_limit.as_ref().map(|t| format!("Time limit: {t}")),
        meta.memory_limit.as_ref().map(|m| format!("Memory limit: {m}")),
    ]
    .into_iter()
    .flatten()
    .collect();
    if !limits.is_empty() {
        lines.push(limits.join("   "));
    }
    if meta.is_editorial {
        lines.push("Editorial".to_string());
    }
    lines
}

/// Insert an `Image` section for every image after the last section of its
/// origin field. Images with no known origin follow the statement; if the
/// field is absent they go before the samples.
fn interleave_images(sections: Vec<Section>, images: Vec<ImageRef>) -> Vec<Section> {
    if images.is_empty() {
        return sections;
    }
    let mut out = sections;
    for image in images {
        let field = image.origin.unwrap_or(SectionKind::Statement);
        let anchor = out
            .iter()
            .rposition(|s| s.field == field && s.kind != SectionKind::Title)
            .map(|i| i + 1)
            .or_else(|| {
                out.iter()
                    .position(|s| matches!(s.kind, SectionKind::SampleInput | SectionKind::SampleOutput))
            })
            .unwrap_or(out.len());
        out.insert(anchor, Section::image(image, field));
    }
    out
}

/// Column widths from the widest cell, clamped.
pub fn column_widths(rows: &[Vec<String>]) -> Vec<usize> {
    let columns = rows.iter().map(Vec::len).max().unwrap_or(0);
    (0..columns)
        .map(|c| {
            rows.iter()
                .filter_map(|r| r.get(c))
                .map(|cell| cell.chars().count())
                .max()
                .unwrap_or(0)
                .clamp(MIN_COLUMN_WIDTH, MAX_COLUMN_WIDTH)
        })
        .collect()
}

// ── Layout builder ───────────────────────────────────────────────────────

struct Layout<'a> {
    opts: &'a AssembleOptions,
    blocks: Vec<Block>,
}

impl<'a> Layout<'a> {
    fn new(opts: &'a AssembleOptions) -> Self {
        Self {
            opts,
            blocks: Vec::new(),
        }
    }

    fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    fn open(&mut self, kind: SectionKind) {
        if self.opts.semantic_markers {
            self.push(Block {
                kind: BlockKind::Marker {
                    text: start_marker(kind),
                },
                keep_together: false,
                keep_with_next: true,
            });
        }
    }

    fn close(&mut self, kind: SectionKind) {
        if self.opts.semantic_markers {
            self.push(Block::flowing(BlockKind::Marker {
                text: end_marker(kind),
            }));
        }
    }

    fn heading(&mut self, level: u8, text: &str) {
        self.push(Block {
            kind: BlockKind::Heading {
                level,
                text: text.to_string(),
            },
            keep_together: true,
            keep_with_next: true,
        });
    }

    fn section(&mut self, section: &Section) {
        let nested = section.kind != section.field;
        if nested {
            self.open(section.kind);
        }
        match section.kind {
            SectionKind::CodeBlock | SectionKind::FormatBlock => {
                self.push(Block::unsplittable(BlockKind::Monospace {
                    text: section.content.clone(),
                    label: section.language.clone(),
                }));
            }
            SectionKind::Table => {
                let rows: Vec<Vec<String>> = section
                    .content
                    .lines()
                    .map(|l| l.split('\t').map(str::to_string).collect())
                    .collect();
                let column_widths = column_widths(&rows);
                self.push(Block::unsplittable(BlockKind::Table {
                    rows,
                    column_widths,
                }));
            }
            SectionKind::Image => {
                if let Some(image) = &section.image {
                    self.push(Block::unsplittable(BlockKind::Image {
                        path: image.local_path.clone(),
                        url: image.url.clone(),
                        width: image.width.unwrap_or(0),
                        height: image.height.unwrap_or(0),
                        caption: image.alt.clone(),
                    }));
                }
            }
            _ if section.monospace => {
                self.push(Block::unsplittable(BlockKind::Monospace {
                    text: section.content.clone(),
                    label: None,
                }));
            }
            _ => {
                self.push(Block::flowing(BlockKind::Paragraph {
                    text: section.content.clone(),
                }));
            }
        }
        if nested {
            self.close(section.kind);
        }
    }

    /// One sample pair. With markers each side is its own labeled block.
    fn sample(&mut self, index: usize, input: &str, output: &str) {
        if self.opts.semantic_markers {
            for (kind, text, label) in [
                (SectionKind::SampleInput, input, format!("Sample Input {index}")),
                (SectionKind::SampleOutput, output, format!("Sample Output {index}")),
            ] {
                self.open(kind);
                self.push(Block::unsplittable(BlockKind::Monospace {
                    text: text.to_string(),
                    label: Some(label),
                }));
                self.close(kind);
            }
        } else {
            self.push(Block::unsplittable(BlockKind::SamplePair {
                index,
                input: input.to_string(),
                output: output.to_string(),
                layout: self.opts.sample_layout,
            }));
        }
    }
}
