//! PDF writer for assembled documents.
//!
//! Blocks are laid out on a fixed grid: Helvetica for prose, Courier for
//! monospace containers, 72 pt margins. Each block becomes a list of rows;
//! pagination moves whole rows, and moves a whole block when it asked to be
//! kept together and fits on a fresh page.
//!
//! Text uses the base-14 fonts with `WinAnsiEncoding`, so characters
//! outside Windows-1252 are transliterated (`≤` → `<=`, `α` → `alpha`).
//! The JSON sidecar keeps the original Unicode.
//!
//! [`emergency_pdf`] is a minimal one-page writer with no failure path,
//! used when even the error document cannot be written normally.

use crate::config::{PageSize, SampleLayout};
use crate::error::PipelineError;
use crate::fallback::PdfWriter;
use crate::model::{Block, BlockKind, Document};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document as PdfDocument, Object, Stream};
use std::path::Path;
use tracing::{debug, warn};

const RENDERER: &str = "lopdf";
const MARGIN: f32 = 72.0;

const BODY_SIZE: f32 = 11.0;
const BODY_LEADING: f32 = 14.5;
const META_SIZE: f32 = 9.0;
const META_LEADING: f32 = 11.5;
const MONO_SIZE: f32 = 9.5;
const MONO_LEADING: f32 = 12.0;
const LABEL_SIZE: f32 = 9.0;
const LABEL_LEADING: f32 = 13.0;
const TABLE_SIZE: f32 = 9.0;
const TABLE_LEADING: f32 = 12.0;
const BOX_PAD: f32 = 5.0;
const BOX_GRAY: f32 = 0.94;
const COLUMN_GAP: f32 = 12.0;
/// Screen pixels to points.
const PX_TO_PT: f32 = 0.75;

// ── Writer ───────────────────────────────────────────────────────────────

/// The default [`PdfWriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LopdfWriter {
    page_size: PageSize,
}

impl LopdfWriter {
    pub fn new(page_size: PageSize) -> Self {
        Self { page_size }
    }
}

impl PdfWriter for LopdfWriter {
    fn write(&self, doc: &Document) -> Result<Vec<u8>, PipelineError> {
        let (width, height) = self.page_size.dimensions_pt();
        let mut layout = Layout::new(width - 2.0 * MARGIN, height - 2.0 * MARGIN);
        let laid: Vec<Laid> = doc.blocks.iter().map(|b| layout.block(b)).collect();
        let pages = paginate(&laid, height - 2.0 * MARGIN);
        debug!(
            blocks = doc.blocks.len(),
            pages = pages.len(),
            images = layout.images.len(),
            "PDF laid out"
        );
        build_pdf(doc, &pages, &layout.images, width, height)
    }
}

// ── Fonts & text ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Font {
    Regular,
    Bold,
    Mono,
}

impl Font {
    fn resource(&self) -> &'static str {
        match self {
            Font::Regular => "F1",
            Font::Bold => "F2",
            Font::Mono => "F3",
        }
    }

    fn base_font(&self) -> &'static str {
        match self {
            Font::Regular => "Helvetica",
            Font::Bold => "Helvetica-Bold",
            Font::Mono => "Courier",
        }
    }
}

/// Helvetica advance widths (1/1000 em) for ASCII 32..=126.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '../
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, // 0-9
    278, 278, 584, 584, 584, 556, 1015, // :..@
    667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, // A-M
    722, 778, 667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, // N-Z
    278, 278, 278, 469, 556, 333, // [..`
    556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, // a-m
    556, 556, 556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, // n-z
    334, 260, 334, 584, // {..~
];

fn char_width(c: char, font: Font, size: f32) -> f32 {
    let em = match font {
        Font::Mono => 600.0,
        Font::Regular | Font::Bold => {
            let w = match c as u32 {
                32..=126 => HELVETICA_WIDTHS[(c as u32 - 32) as usize] as f32,
                _ => 556.0,
            };
            if font == Font::Bold {
                w * 1.08
            } else {
                w
            }
        }
    };
    em * size / 1000.0
}

fn text_width(s: &str, font: Font, size: f32) -> f32 {
    s.chars().map(|c| char_width(c, font, size)).sum()
}

/// Windows-1252 byte for the characters it has beyond Latin-1's range.
fn cp1252_special(c: char) -> Option<u8> {
    Some(match c {
        '€' => 0x80,
        '‚' => 0x82,
        'ƒ' => 0x83,
        '„' => 0x84,
        '…' => 0x85,
        '†' => 0x86,
        '‡' => 0x87,
        'ˆ' => 0x88,
        '‰' => 0x89,
        'Š' => 0x8A,
        '‹' => 0x8B,
        'Œ' => 0x8C,
        'Ž' => 0x8E,
        '\u{2018}' => 0x91,
        '\u{2019}' => 0x92,
        '\u{201C}' => 0x93,
        '\u{201D}' => 0x94,
        '•' => 0x95,
        '–' => 0x96,
        '—' => 0x97,
        '˜' => 0x98,
        '™' => 0x99,
        'š' => 0x9A,
        '›' => 0x9B,
        'œ' => 0x9C,
        'ž' => 0x9E,
        'Ÿ' => 0x9F,
        _ => return None,
    })
}

fn encodable(c: char) -> bool {
    matches!(c as u32, 0x20..=0x7E | 0xA0..=0xFF) || cp1252_special(c).is_some()
}

/// ASCII spelling for characters the base-14 fonts cannot show.
fn spell(c: char) -> Option<&'static str> {
    Some(match c {
        '≤' | '≦' | '⩽' | '⪯' => "<=",
        '≥' | '≧' | '⩾' | '⪰' => ">=",
        '≠' => "!=",
        '≈' | '≃' | '≅' | '∼' => "~",
        '≡' => "==",
        '≪' => "<<",
        '≫' => ">>",
        '≺' => "<",
        '≻' => ">",
        '∓' => "-+",
        '⋅' | '∙' => "·",
        '∗' | '⋆' => "*",
        '∘' => "o",
        '−' => "-",
        '⊕' => "xor",
        '⊖' => "(-)",
        '⊗' => "(x)",
        '⊙' => "(.)",
        '∑' => "Sum",
        '∏' => "Prod",
        '∐' => "Coprod",
        '∫' | '∬' | '∮' => "Integral",
        '∞' => "inf",
        '∂' => "d",
        '∇' => "nabla",
        '∣' => "|",
        '∤' => "!|",
        '∥' | '‖' => "||",
        '⊥' => "_|_",
        '⊤' => "T",
        '∝' => "prop",
        '′' => "'",
        '″' => "''",
        '∈' => "in",
        '∉' => "not in",
        '∋' => "ni",
        '⊂' => "subset",
        '⊃' => "supset",
        '⊆' => "subseteq",
        '⊇' => "supseteq",
        '⊊' => "subsetneq",
        '⊋' => "supsetneq",
        '∩' | '⋂' => "cap",
        '∪' | '⋃' => "cup",
        '∖' => "\\",
        '∅' => "{}",
        '∧' => "and",
        '∨' => "or",
        '∀' => "for all",
        '∃' => "exists",
        '∄' => "not exists",
        '∴' => "therefore",
        '∵' => "because",
        '→' | '⟶' => "->",
        '←' | '⟵' => "<-",
        '↔' => "<->",
        '⇒' | '⟹' => "=>",
        '⇐' | '⟸' => "<=",
        '⇔' | '⟺' => "<=>",
        '↦' => "|->",
        '↑' => "^",
        '↓' => "v",
        '↕' => "^v",
        '↗' => "/",
        '↘' => "\\",
        '⟨' => "<",
        '⟩' => ">",
        '⌊' => "floor(",
        '⌋' => ")",
        '⌈' => "ceil(",
        '⌉' => ")",
        '√' => "sqrt",
        '⋯' => "...",
        '⋮' => ":",
        '⋱' => "...",
        '∠' => "angle",
        '△' => "triangle",
        '□' => "[]",
        '■' => "#",
        'ℓ' => "l",
        'ℏ' => "h",
        'ℵ' => "aleph",
        '✓' => "v",
        'ℝ' => "R",
        'ℕ' => "N",
        'ℤ' => "Z",
        'ℚ' => "Q",
        'ℂ' => "C",
        'ℙ' => "P",
        '⁰' => "^0",
        '⁴' => "^4",
        '⁵' => "^5",
        '⁶' => "^6",
        '⁷' => "^7",
        '⁸' => "^8",
        '⁹' => "^9",
        'ⁿ' => "^n",
        'ⁱ' => "^i",
        '⁺' => "^+",
        '⁻' => "^-",
        'α' => "alpha",
        'β' => "beta",
        'γ' => "gamma",
        'δ' => "delta",
        'ϵ' | 'ε' => "epsilon",
        'ζ' => "zeta",
        'η' => "eta",
        'θ' | 'ϑ' => "theta",
        'ι' => "iota",
        'κ' => "kappa",
        'λ' => "lambda",
        'μ' => "mu",
        'ν' => "nu",
        'ξ' => "xi",
        'ο' => "o",
        'π' | 'ϖ' => "pi",
        'ρ' | 'ϱ' => "rho",
        'σ' | 'ς' => "sigma",
        'τ' => "tau",
        'υ' => "upsilon",
        'ϕ' | 'φ' => "phi",
        'χ' => "chi",
        'ψ' => "psi",
        'ω' => "omega",
        'Γ' => "Gamma",
        'Δ' => "Delta",
        'Θ' => "Theta",
        'Λ' => "Lambda",
        'Ξ' => "Xi",
        'Π' => "Pi",
        'Σ' => "Sigma",
        'Υ' => "Upsilon",
        'Φ' => "Phi",
        'Ψ' => "Psi",
        'Ω' => "Omega",
        '\u{200B}' | '\u{200C}' | '\u{200D}' | '\u{FEFF}' => "",
        _ => return None,
    })
}

/// Rewrite `s` so every character is in Windows-1252.
pub fn transliterate(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if c == '\t' {
            out.push_str("    ");
        } else if encodable(c) {
            out.push(c);
        } else if let Some(spelled) = spell(c) {
            out.push_str(spelled);
        } else if c.is_whitespace() {
            out.push(' ');
        } else if !c.is_control() {
            out.push('?');
        }
    }
    out
}

/// Windows-1252 bytes of already transliterated text.
fn encode_win_ansi(s: &str) -> Vec<u8> {
    s.chars()
        .map(|c| match c as u32 {
            0x20..=0x7E | 0xA0..=0xFF => c as u32 as u8,
            _ => cp1252_special(c).unwrap_or(b'?'),
        })
        .collect()
}

// ── Wrapping ─────────────────────────────────────────────────────────────

/// Greedy word wrap; explicit newlines are kept, overlong words broken.
fn wrap_prose(text: &str, font: Font, size: f32, width: f32) -> Vec<String> {
    let space = char_width(' ', font, size);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let mut line = String::new();
        let mut line_w = 0.0;
        for word in raw.split(' ').filter(|w| !w.is_empty()) {
            let word_w = text_width(word, font, size);
            if line.is_empty() && word_w <= width {
                line.push_str(word);
                line_w = word_w;
                continue;
            }
            if !line.is_empty() && line_w + space + word_w <= width {
                line.push(' ');
                line.push_str(word);
                line_w += space + word_w;
                continue;
            }
            if !line.is_empty() {
                lines.push(std::mem::take(&mut line));
                line_w = 0.0;
            }
            if word_w <= width {
                line.push_str(word);
                line_w = word_w;
                continue;
            }
            for c in word.chars() {
                let w = char_width(c, font, size);
                if !line.is_empty() && line_w + w > width {
                    lines.push(std::mem::take(&mut line));
                    line_w = 0.0;
                }
                line.push(c);
                line_w += w;
            }
        }
        lines.push(line);
    }
    lines
}

/// Hard wrap at a fixed character count; whitespace is preserved.
fn wrap_mono(text: &str, size: f32, width: f32) -> Vec<String> {
    let per_line = ((width / char_width(' ', Font::Mono, size)).floor() as usize).max(1);
    let mut lines = Vec::new();
    for raw in text.split('\n') {
        let chars: Vec<char> = raw.trim_end().chars().collect();
        if chars.is_empty() {
            lines.push(String::new());
            continue;
        }
        for chunk in chars.chunks(per_line) {
            lines.push(chunk.iter().collect());
        }
    }
    lines
}

// ── Layout ───────────────────────────────────────────────────────────────

/// One drawing operation, positioned relative to the content area's
/// top-left corner (y grows downward).
#[derive(Debug, Clone)]
enum Draw {
    Text {
        x: f32,
        baseline: f32,
        font: Font,
        size: f32,
        gray: f32,
        text: String,
    },
    Fill {
        x: f32,
        y: f32,
        w: f32,
        h: f32,
        gray: f32,
    },
    Line {
        x1: f32,
        y1: f32,
        x2: f32,
        y2: f32,
    },
    Image {
        index: usize,
        x: f32,
        y: f32,
        w: f32,
        h: f32,
    },
}

impl Draw {
    fn shifted(&self, dy: f32) -> Draw {
        let mut d = self.clone();
        match &mut d {
            Draw::Text { baseline, .. } => *baseline += dy,
            Draw::Fill { y, .. } | Draw::Image { y, .. } => *y += dy,
            Draw::Line { y1, y2, .. } => {
                *y1 += dy;
                *y2 += dy;
            }
        }
        d
    }
}

/// A horizontal strip that is never split across pages.
#[derive(Debug, Default)]
struct Row {
    height: f32,
    draws: Vec<Draw>,
}

/// A block broken into rows, with its pagination hints.
#[derive(Debug)]
struct Laid {
    rows: Vec<Row>,
    space_before: f32,
    keep_together: bool,
    keep_with_next: bool,
}

impl Laid {
    fn height(&self) -> f32 {
        self.rows.iter().map(|r| r.height).sum()
    }

    /// Height that must follow a keep-with-next predecessor on its page.
    fn lead_height(&self) -> f32 {
        if self.keep_together {
            self.height()
        } else {
            self.rows.first().map_or(0.0, |r| r.height)
        }
    }
}

/// A decoded raster image ready to embed.
struct Raster {
    width: u32,
    height: u32,
    rgb: Vec<u8>,
}

struct Layout {
    width: f32,
    avail_height: f32,
    images: Vec<Raster>,
}

fn baseline(size: f32, leading: f32) -> f32 {
    (leading + size) / 2.0 - size * 0.15
}

impl Layout {
    fn new(width: f32, avail_height: f32) -> Self {
        Self {
            width,
            avail_height,
            images: Vec::new(),
        }
    }

    fn block(&mut self, block: &Block) -> Laid {
        let (rows, space_before) = match &block.kind {
            BlockKind::Heading { level, text } => {
                let (size, leading, before) = match level {
                    1 => (18.0, 22.0, 0.0),
                    2 => (14.0, 18.0, 12.0),
                    _ => (12.0, 15.0, 8.0),
                };
                (self.text_rows(text, Font::Bold, size, leading, 0.0), before)
            }
            BlockKind::Paragraph { text } => {
                (self.text_rows(text, Font::Regular, BODY_SIZE, BODY_LEADING, 0.0), 6.0)
            }
            BlockKind::Meta { text } => {
                (self.text_rows(text, Font::Regular, META_SIZE, META_LEADING, 0.35), 1.0)
            }
            BlockKind::Marker { text } => {
                (self.text_rows(text, Font::Mono, META_SIZE, META_LEADING, 0.2), 4.0)
            }
            BlockKind::Monospace { text, label } => {
                let mut rows = Vec::new();
                if let Some(label) = label {
                    rows.push(label_row(&[(0.0, label.as_str())]));
                }
                rows.extend(mono_box(&[(0.0, self.width, text.as_str())]));
                (rows, 6.0)
            }
            BlockKind::SamplePair {
                index,
                input,
                output,
                layout,
            } => (self.sample_rows(*index, input, output, *layout), 8.0),
            BlockKind::Table {
                rows,
                column_widths,
            } => (self.table_rows(rows, column_widths), 6.0),
            BlockKind::Image {
                path,
                url,
                width,
                height,
                caption,
            } => (self.image_rows(path.as_deref(), url, *width, *height, caption), 8.0),
            BlockKind::Rule => (
                vec![Row {
                    height: 10.0,
                    draws: vec![Draw::Line {
                        x1: 0.0,
                        y1: 5.0,
                        x2: self.width,
                        y2: 5.0,
                    }],
                }],
                10.0,
            ),
        };
        Laid {
            rows,
            space_before,
            keep_together: block.keep_together,
            keep_with_next: block.keep_with_next,
        }
    }

    fn text_rows(&self, text: &str, font: Font, size: f32, leading: f32, gray: f32) -> Vec<Row> {
        let text = transliterate(text);
        wrap_prose(&text, font, size, self.width)
            .into_iter()
            .map(|line| Row {
                height: leading,
                draws: if line.is_empty() {
                    Vec::new()
                } else {
                    vec![Draw::Text {
                        x: 0.0,
                        baseline: baseline(size, leading),
                        font,
                        size,
                        gray,
                        text: line,
                    }]
                },
            })
            .collect()
    }

    fn sample_rows(&self, index: usize, input: &str, output: &str, layout: SampleLayout) -> Vec<Row> {
        let in_label = format!("Sample Input {index}");
        let out_label = format!("Sample Output {index}");
        match layout {
            SampleLayout::TwoColumn => {
                let col = (self.width - COLUMN_GAP) / 2.0;
                let right = col + COLUMN_GAP;
                let mut rows = vec![label_row(&[(0.0, in_label.as_str()), (right, out_label.as_str())])];
                rows.extend(mono_box(&[(0.0, col, input), (right, col, output)]));
                rows
            }
            SampleLayout::Stacked => {
                let mut rows = vec![label_row(&[(0.0, in_label.as_str())])];
                rows.extend(mono_box(&[(0.0, self.width, input)]));
                rows.push(Row {
                    height: 4.0,
                    draws: Vec::new(),
                });
                rows.push(label_row(&[(0.0, out_label.as_str())]));
                rows.extend(mono_box(&[(0.0, self.width, output)]));
                rows
            }
        }
    }

    fn table_rows(&self, rows: &[Vec<String>], column_widths: &[usize]) -> Vec<Row> {
        let cell_pad = 3.0;
        let char_w = char_width(' ', Font::Mono, TABLE_SIZE);
        let natural: Vec<f32> = column_widths
            .iter()
            .map(|&c| c.max(1) as f32 * char_w + 2.0 * cell_pad)
            .collect();
        let total: f32 = natural.iter().sum();
        let scale = if total > self.width { self.width / total } else { 1.0 };
        let widths: Vec<f32> = natural.iter().map(|w| w * scale).collect();

        let mut out = Vec::with_capacity(rows.len());
        for (r, row) in rows.iter().enumerate() {
            let cells: Vec<Vec<String>> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let text = transliterate(row.get(i).map(String::as_str).unwrap_or(""));
                    wrap_mono(&text, TABLE_SIZE, (w - 2.0 * cell_pad).max(char_w))
                })
                .collect();
            let lines = cells.iter().map(Vec::len).max().unwrap_or(1).max(1);
            let height = lines as f32 * TABLE_LEADING + 2.0 * cell_pad;

            let mut draws = Vec::new();
            let mut x = 0.0;
            for (cell, w) in cells.iter().zip(&widths) {
                for (i, line) in cell.iter().enumerate().filter(|(_, l)| !l.is_empty()) {
                    draws.push(Draw::Text {
                        x: x + cell_pad,
                        baseline: cell_pad
                            + i as f32 * TABLE_LEADING
                            + baseline(TABLE_SIZE, TABLE_LEADING),
                        font: Font::Mono,
                        size: TABLE_SIZE,
                        gray: 0.0,
                        text: line.clone(),
                    });
                }
                draws.push(Draw::Line {
                    x1: x,
                    y1: 0.0,
                    x2: x,
                    y2: height,
                });
                x += w;
            }
            draws.push(Draw::Line {
                x1: x,
                y1: 0.0,
                x2: x,
                y2: height,
            });
            draws.push(Draw::Line {
                x1: 0.0,
                y1: 0.0,
                x2: x,
                y2: 0.0,
            });
            if r + 1 == rows.len() {
                draws.push(Draw::Line {
                    x1: 0.0,
                    y1: height,
                    x2: x,
                    y2: height,
                });
            }
            out.push(Row { height, draws });
        }
        out
    }

    fn image_rows(&mut self, path: Option<&Path>, url: &str, width: u32, height: u32, caption: &str) -> Vec<Row> {
        let mut rows = Vec::new();
        let raster = path.and_then(|p| match load_raster(p) {
            Ok(r) => Some(r),
            Err(e) => {
                warn!(path = %p.display(), error = %e, "image could not be embedded");
                None
            }
        });

        match raster {
            Some(raster) => {
                let px_w = (if width > 0 { width } else { raster.width }) as f32;
                let px_h = (if height > 0 { height } else { raster.height }) as f32;
                let mut w = px_w * PX_TO_PT;
                let mut h = px_h * PX_TO_PT;
                let max_h = self.avail_height * 0.5;
                let scale = (self.width / w).min(max_h / h).min(1.0);
                w *= scale;
                h *= scale;
                let index = self.images.len();
                self.images.push(raster);
                rows.push(Row {
                    height: h + 4.0,
                    draws: vec![Draw::Image {
                        index,
                        x: (self.width - w) / 2.0,
                        y: 2.0,
                        w,
                        h,
                    }],
                });
                if !caption.is_empty() {
                    rows.extend(self.text_rows(caption, Font::Regular, META_SIZE, META_LEADING, 0.35));
                }
            }
            None => {
                let text = if caption.is_empty() {
                    format!("[image: {url}]")
                } else {
                    format!("[image: {caption}]")
                };
                rows.extend(self.text_rows(&text, Font::Regular, META_SIZE, META_LEADING, 0.35));
            }
        }
        rows
    }
}

fn label_row(labels: &[(f32, &str)]) -> Row {
    Row {
        height: LABEL_LEADING,
        draws: labels
            .iter()
            .map(|(x, text)| Draw::Text {
                x: *x,
                baseline: baseline(LABEL_SIZE, LABEL_LEADING),
                font: Font::Bold,
                size: LABEL_SIZE,
                gray: 0.0,
                text: transliterate(text),
            })
            .collect(),
    }
}

/// Shaded monospace containers placed side by side; `(x, width, text)`
/// per column. Columns share row heights so they end level.
fn mono_box(columns: &[(f32, f32, &str)]) -> Vec<Row> {
    let wrapped: Vec<Vec<String>> = columns
        .iter()
        .map(|(_, w, text)| {
            let text = transliterate(text.trim_end_matches('\n'));
            wrap_mono(&text, MONO_SIZE, w - 2.0 * BOX_PAD)
        })
        .collect();
    let lines = wrapped.iter().map(Vec::len).max().unwrap_or(1).max(1);

    let strip = |height: f32| Row {
        height,
        draws: columns
            .iter()
            .map(|(x, w, _)| Draw::Fill {
                x: *x,
                y: 0.0,
                w: *w,
                h: height,
                gray: BOX_GRAY,
            })
            .collect(),
    };

    let mut rows = vec![strip(BOX_PAD)];
    for i in 0..lines {
        let mut row = strip(MONO_LEADING);
        for ((x, _, _), col) in columns.iter().zip(&wrapped) {
            if let Some(line) = col.get(i).filter(|l| !l.is_empty()) {
                row.draws.push(Draw::Text {
                    x: x + BOX_PAD,
                    baseline: baseline(MONO_SIZE, MONO_LEADING),
                    font: Font::Mono,
                    size: MONO_SIZE,
                    gray: 0.0,
                    text: line.clone(),
                });
            }
        }
        rows.push(row);
    }
    rows.push(strip(BOX_PAD));
    rows
}

fn load_raster(path: &Path) -> Result<Raster, image::ImageError> {
    let img = image::open(path)?.to_rgb8();
    Ok(Raster {
        width: img.width(),
        height: img.height(),
        rgb: img.into_raw(),
    })
}

// ── Pagination ───────────────────────────────────────────────────────────

fn paginate(blocks: &[Laid], avail: f32) -> Vec<Vec<Draw>> {
    let mut pages: Vec<Vec<Draw>> = vec![Vec::new()];
    let mut cursor = 0.0f32;

    for (i, laid) in blocks.iter().enumerate() {
        if laid.rows.is_empty() {
            continue;
        }
        let before = if cursor > 0.0 { laid.space_before } else { 0.0 };
        let mut needed = if laid.keep_together {
            laid.height()
        } else {
            laid.rows[0].height
        };
        if laid.keep_with_next {
            if let Some(next) = blocks.get(i + 1) {
                needed = laid.height() + next.space_before + next.lead_height();
            }
        }

        if cursor > 0.0 && cursor + before + needed > avail && needed <= avail {
            pages.push(Vec::new());
            cursor = 0.0;
        } else {
            cursor += before;
        }

        for row in &laid.rows {
            if cursor > 0.0 && cursor + row.height > avail {
                pages.push(Vec::new());
                cursor = 0.0;
            }
            if let Some(page) = pages.last_mut() {
                page.extend(row.draws.iter().map(|d| d.shifted(cursor)));
            }
            cursor += row.height;
        }
    }
    pages
}

// ── PDF objects ──────────────────────────────────────────────────────────

fn render_err(e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Render {
        renderer: RENDERER.to_string(),
        reason: e.to_string(),
    }
}

fn page_operations(draws: &[Draw], page_height: f32) -> Vec<Operation> {
    // Content-area coordinates to PDF user space.
    let ty = |y: f32| page_height - MARGIN - y;
    let tx = |x: f32| MARGIN + x;

    let mut ops = Vec::with_capacity(draws.len() * 5);
    for draw in draws {
        match draw {
            Draw::Fill { x, y, w, h, gray } => {
                ops.push(Operation::new("g", vec![(*gray).into()]));
                ops.push(Operation::new(
                    "re",
                    vec![tx(*x).into(), ty(y + h).into(), (*w).into(), (*h).into()],
                ));
                ops.push(Operation::new("f", vec![]));
            }
            Draw::Line { x1, y1, x2, y2 } => {
                ops.push(Operation::new("w", vec![0.5f32.into()]));
                ops.push(Operation::new("G", vec![0.6f32.into()]));
                ops.push(Operation::new("m", vec![tx(*x1).into(), ty(*y1).into()]));
                ops.push(Operation::new("l", vec![tx(*x2).into(), ty(*y2).into()]));
                ops.push(Operation::new("S", vec![]));
            }
            Draw::Text {
                x,
                baseline,
                font,
                size,
                gray,
                text,
            } => {
                ops.push(Operation::new("BT", vec![]));
                ops.push(Operation::new("Tf", vec![font.resource().into(), (*size).into()]));
                ops.push(Operation::new("g", vec![(*gray).into()]));
                ops.push(Operation::new("Td", vec![tx(*x).into(), ty(*baseline).into()]));
                ops.push(Operation::new(
                    "Tj",
                    vec![Object::string_literal(encode_win_ansi(text))],
                ));
                ops.push(Operation::new("ET", vec![]));
            }
            Draw::Image { index, x, y, w, h } => {
                ops.push(Operation::new("q", vec![]));
                ops.push(Operation::new(
                    "cm",
                    vec![
                        (*w).into(),
                        0.into(),
                        0.into(),
                        (*h).into(),
                        tx(*x).into(),
                        ty(y + h).into(),
                    ],
                ));
                ops.push(Operation::new("Do", vec![format!("Im{index}").as_str().into()]));
                ops.push(Operation::new("Q", vec![]));
            }
        }
    }
    ops
}

fn build_pdf(
    doc: &Document,
    pages: &[Vec<Draw>],
    images: &[Raster],
    width: f32,
    height: f32,
) -> Result<Vec<u8>, PipelineError> {
    let mut pdf = PdfDocument::with_version("1.5");
    let pages_id = pdf.new_object_id();

    let mut fonts = Dictionary::new();
    for font in [Font::Regular, Font::Bold, Font::Mono] {
        let id = pdf.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => font.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(font.resource(), id);
    }

    let mut xobjects = Dictionary::new();
    for (i, raster) in images.iter().enumerate() {
        let stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => raster.width as i64,
                "Height" => raster.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            raster.rgb.clone(),
        );
        let id = pdf.add_object(stream);
        xobjects.set(format!("Im{i}"), id);
    }

    let resources_id = pdf.add_object(dictionary! {
        "Font" => fonts,
        "XObject" => xobjects,
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for draws in pages {
        let content = Content {
            operations: page_operations(draws, height),
        };
        let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode().map_err(render_err)?));
        let page_id = pdf.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "Contents" => content_id,
            "Resources" => resources_id,
            "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = pdf.add_object(dictionary! {
        "Title" => Object::string_literal(encode_win_ansi(&transliterate(&doc.metadata.title))),
        "Subject" => Object::string_literal(encode_win_ansi(&transliterate(&doc.metadata.source_url))),
        "Creator" => Object::string_literal(concat!("cp2pdf ", env!("CARGO_PKG_VERSION"))),
    });
    pdf.trailer.set("Root", catalog_id);
    pdf.trailer.set("Info", info_id);
    pdf.compress();

    let mut buf = Vec::new();
    pdf.save_to(&mut buf).map_err(render_err)?;
    Ok(buf)
}

// ── Emergency writer ─────────────────────────────────────────────────────

/// Single-page PDF of the document's plain text.
///
/// Used only for error documents when the normal writer failed; it cannot
/// fail itself. The page is built with lopdf, and if even that fails the
/// bytes are written by hand. Text beyond one page is dropped.
pub fn emergency_pdf(doc: &Document) -> Vec<u8> {
    let (width, height) = PageSize::A4.dimensions_pt();
    let max_lines = ((height - 2.0 * MARGIN) / BODY_LEADING) as usize;
    let lines: Vec<String> = doc
        .to_plain_text()
        .lines()
        .flat_map(|l| wrap_mono(&transliterate(l), 10.0, width - 2.0 * MARGIN))
        .take(max_lines)
        .collect();

    match text_page(&lines, width, height) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(error = %e, "lopdf failed on the emergency page, writing raw bytes");
            raw_text_page(&lines, width, height)
        }
    }
}

/// One page of Helvetica lines, through lopdf.
fn text_page(lines: &[String], width: f32, height: f32) -> Result<Vec<u8>, PipelineError> {
    let mut pdf = PdfDocument::with_version("1.4");
    let pages_id = pdf.new_object_id();
    let font_id = pdf.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
        "Encoding" => "WinAnsiEncoding",
    });

    let mut operations = vec![
        Operation::new("BT", vec![]),
        Operation::new("Tf", vec!["F1".into(), BODY_SIZE.into()]),
        Operation::new("TL", vec![BODY_LEADING.into()]),
        Operation::new("Td", vec![MARGIN.into(), (height - MARGIN - BODY_SIZE).into()]),
    ];
    for line in lines {
        operations.push(Operation::new("Tj", vec![Object::string_literal(encode_win_ansi(line))]));
        operations.push(Operation::new("T*", vec![]));
    }
    operations.push(Operation::new("ET", vec![]));
    let content = Content { operations };
    let content_id = pdf.add_object(Stream::new(dictionary! {}, content.encode().map_err(render_err)?));

    let page_id = pdf.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! { "Font" => dictionary! { "F1" => font_id } },
        "MediaBox" => vec![0.into(), 0.into(), width.into(), height.into()],
    });
    pdf.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![Object::from(page_id)],
            "Count" => 1,
        }),
    );
    let catalog_id = pdf.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    pdf.trailer.set("Root", catalog_id);

    let mut buf = Vec::new();
    pdf.save_to(&mut buf).map_err(render_err)?;
    Ok(buf)
}

/// [`text_page`] assembled byte by byte; no failure path.
fn raw_text_page(lines: &[String], width: f32, height: f32) -> Vec<u8> {
    let mut content = Vec::new();
    content.extend_from_slice(
        format!(
            "BT\n/F1 {BODY_SIZE} Tf\n{BODY_LEADING} TL\n{MARGIN} {} Td\n",
            height - MARGIN - BODY_SIZE
        )
        .as_bytes(),
    );
    for line in lines {
        content.push(b'(');
        for b in encode_win_ansi(line) {
            if matches!(b, b'(' | b')' | b'\\') {
                content.push(b'\\');
            }
            content.push(b);
        }
        content.extend_from_slice(b") Tj T*\n");
    }
    content.extend_from_slice(b"ET\n");

    let objects: [Vec<u8>; 5] = [
        b"<< /Type /Catalog /Pages 2 0 R >>".to_vec(),
        b"<< /Type /Pages /Kids [3 0 R] /Count 1 >>".to_vec(),
        format!(
            "<< /Type /Page /Parent 2 0 R /MediaBox [0 0 {width} {height}] \
             /Resources << /Font << /F1 4 0 R >> >> /Contents 5 0 R >>"
        )
        .into_bytes(),
        b"<< /Type /Font /Subtype /Type1 /BaseFont /Helvetica /Encoding /WinAnsiEncoding >>".to_vec(),
        {
            let mut s = format!("<< /Length {} >>\nstream\n", content.len()).into_bytes();
            s.extend_from_slice(&content);
            s.extend_from_slice(b"\nendstream");
            s
        },
    ];

    let mut out = b"%PDF-1.4\n%\xE2\xE3\xCF\xD3\n".to_vec();
    let mut offsets = Vec::with_capacity(objects.len());
    for (i, body) in objects.iter().enumerate() {
        offsets.push(out.len());
        out.extend_from_slice(format!("{} 0 obj\n", i + 1).as_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(b"\nendobj\n");
    }
    let xref = out.len();
    out.extend_from_slice(format!("xref\n0 {}\n0000000000 65535 f \n", objects.len() + 1).as_bytes());
    for offset in offsets {
        out.extend_from_slice(format!("{offset:010} 00000 n \n").as_bytes());
    }
    out.extend_from_slice(
        format!(
            "trailer\n<< /Size {} /Root 1 0 R >>\nstartxref\n{xref}\n%%EOF\n",
            objects.len() + 1
        )
        .as_bytes(),
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{DocumentMetadata, GenerationMode, Platform};
    use crate::pipeline::assemble::error_document;
    use chrono::Utc;

    fn doc(blocks: Vec<Block>) -> Document {
        Document {
            metadata: DocumentMetadata {
                source_url: "https://codeforces.com/problemset/problem/4/A".into(),
                platform: Platform::Codeforces,
                generation_mode: GenerationMode::Assembled,
                generated_at: Utc::now(),
                title: "A. Watermelon".into(),
                time_limit: None,
                memory_limit: None,
                is_editorial: false,
                failure_reason: None,
            },
            sections: Vec::new(),
            blocks,
        }
    }

    fn page_count(bytes: &[u8]) -> usize {
        PdfDocument::load_mem(bytes).unwrap().get_pages().len()
    }

    #[test]
    fn transliterates_math() {
        assert_eq!(transliterate("1 ≤ N ≤ 10⁵"), "1 <= N <= 10^5");
        assert_eq!(transliterate("a × b ± c"), "a × b ± c");
        assert_eq!(transliterate("α → β"), "alpha -> beta");
        assert_eq!(transliterate("x\ty"), "x    y");
    }

    #[test]
    fn encoding_uses_cp1252_specials() {
        assert_eq!(encode_win_ansi("…"), vec![0x85]);
        assert_eq!(encode_win_ansi("×"), vec![0xD7]);
    }

    #[test]
    fn prose_wraps_within_width() {
        let text = "word ".repeat(60);
        let lines = wrap_prose(text.trim(), Font::Regular, BODY_SIZE, 200.0);
        assert!(lines.len() > 1);
        for line in &lines {
            assert!(text_width(line, Font::Regular, BODY_SIZE) <= 200.0);
        }
    }

    #[test]
    fn overlong_word_is_broken() {
        let lines = wrap_prose(&"x".repeat(200), Font::Regular, BODY_SIZE, 100.0);
        assert!(lines.len() > 1);
        assert_eq!(lines.concat(), "x".repeat(200));
    }

    #[test]
    fn mono_wrap_preserves_leading_spaces() {
        let lines = wrap_mono("  indented\n\nnext", MONO_SIZE, 400.0);
        assert_eq!(lines, vec!["  indented", "", "next"]);
    }

    #[test]
    fn writes_loadable_pdf() {
        let bytes = LopdfWriter::default()
            .write(&doc(vec![
                Block::flowing(BlockKind::Heading {
                    level: 1,
                    text: "A. Watermelon".into(),
                }),
                Block::flowing(BlockKind::Paragraph {
                    text: "1 ≤ w ≤ 100".into(),
                }),
                Block::unsplittable(BlockKind::SamplePair {
                    index: 1,
                    input: "8".into(),
                    output: "YES".into(),
                    layout: SampleLayout::TwoColumn,
                }),
                Block::flowing(BlockKind::Table {
                    rows: vec![vec!["n".into(), "answer".into()], vec!["8".into(), "YES".into()]],
                    column_widths: vec![3, 6],
                }),
                Block::flowing(BlockKind::Rule),
            ]))
            .unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn long_documents_paginate() {
        let blocks = (0..200)
            .map(|i| {
                Block::flowing(BlockKind::Paragraph {
                    text: format!("Paragraph {i} with enough words to occupy a line of its own."),
                })
            })
            .collect();
        let bytes = LopdfWriter::new(PageSize::Letter).write(&doc(blocks)).unwrap();
        assert!(page_count(&bytes) > 3);
    }

    #[test]
    fn keep_together_moves_block_to_next_page() {
        let para = |n: usize| Laid {
            rows: (0..n)
                .map(|_| Row {
                    height: 10.0,
                    draws: vec![Draw::Fill {
                        x: 0.0,
                        y: 0.0,
                        w: 1.0,
                        h: 1.0,
                        gray: 0.0,
                    }],
                })
                .collect(),
            space_before: 0.0,
            keep_together: false,
            keep_with_next: false,
        };
        let mut sample = para(5);
        sample.keep_together = true;
        let pages = paginate(&[para(8), sample], 100.0);
        assert_eq!(pages.len(), 2);
        assert_eq!(pages[0].len(), 8);
        assert_eq!(pages[1].len(), 5);
    }

    #[test]
    fn missing_image_file_falls_back_to_caption() {
        let bytes = LopdfWriter::default()
            .write(&doc(vec![Block::unsplittable(BlockKind::Image {
                path: Some("/nonexistent/cp2pdf/fig.png".into()),
                url: "https://codeforces.com/fig.png".into(),
                width: 100,
                height: 100,
                caption: "Figure 1".into(),
            })]))
            .unwrap();
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn emergency_pdf_is_well_formed() {
        let doc = error_document(
            "https://www.spoj.com/problems/TEST/",
            Platform::Spoj,
            "page capture timed out after 60s (a \\ b)",
            Utc::now(),
        );
        let bytes = emergency_pdf(&doc);
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.trim_ascii_end().ends_with(b"%%EOF"));
        assert_eq!(page_count(&bytes), 1);
    }

    #[test]
    fn raw_emergency_page_is_well_formed() {
        let (width, height) = PageSize::A4.dimensions_pt();
        let lines = vec!["Could not generate full content".to_string(), "f(a) \\ (b)".to_string()];
        let bytes = raw_text_page(&lines, width, height);
        assert!(bytes.starts_with(b"%PDF-1.4"));
        assert!(bytes.ends_with(b"%%EOF\n"));
        assert_eq!(page_count(&bytes), 1);
    }
}
