//! Content classification: platform extraction → labeled sections.
//!
//! Section kinds come from the source field, never from guessing at the
//! text. The only content-driven decisions are format blocks (made by
//! [`super::format`]) and code blocks (made here).

use crate::model::{RawExtraction, Section, SectionKind};
use crate::pipeline::format::{format, format_sample, normalize_text, resolve_math};
use crate::pipeline::sanitize::Sanitizer;
use tracing::debug;

/// Classify every non-empty field of `raw`, in reading order:
/// title, statement, constraints, input, output, sample pairs, notes.
///
/// One [`Sanitizer`] is shared by all fields so math placeholders are
/// unique across the whole document.
pub fn classify(raw: &RawExtraction) -> Vec<Section> {
    let mut sanitizer = Sanitizer::new();
    let mut sections = Vec::new();

    let title = sanitizer.sanitize(&raw.title);
    let title = normalize_text(&resolve_math(&title.text, &title.math)).replace('\n', " ");
    if !title.trim().is_empty() {
        sections.push(Section::new(SectionKind::Title, title.trim()));
    }

    let fields = [
        (SectionKind::Statement, &raw.statement_html),
        (SectionKind::Constraints, &raw.constraints_html),
        (SectionKind::InputFormat, &raw.input_format_html),
        (SectionKind::OutputFormat, &raw.output_format_html),
    ];
    for (kind, html) in fields {
        classify_field(&mut sanitizer, kind, html, &mut sections);
    }

    for (i, sample) in raw.samples.iter().enumerate() {
        if sample.is_empty() {
            debug!(index = i + 1, "empty sample pair skipped");
            continue;
        }
        let input = format_sample(&sanitizer.sanitize_preformatted(&sample.input));
        let output = format_sample(&sanitizer.sanitize_preformatted(&sample.output));
        sections.push(Section::new(SectionKind::SampleInput, input));
        sections.push(Section::new(SectionKind::SampleOutput, output));
    }

    classify_field(&mut sanitizer, SectionKind::Notes, &raw.notes_html, &mut sections);
    sections
}

fn classify_field(
    sanitizer: &mut Sanitizer,
    kind: SectionKind,
    html: &str,
    out: &mut Vec<Section>,
) {
    if html.trim().is_empty() {
        debug!(field = kind.label(), "field empty, skipped");
        return;
    }
    let fragment = sanitizer.sanitize(html);
    if !fragment.defects.is_empty() {
        debug!(field = kind.label(), defects = ?fragment.defects, "field sanitized");
    }
    for mut section in format(&fragment, kind) {
        if section.is_empty() {
            continue;
        }
        if section.kind == kind && (section.monospace || has_common_indent(&section.content)) {
            section.language = guess_language(&section.content).map(str::to_string);
            section.kind = SectionKind::CodeBlock;
            section.field = kind;
            section.monospace = true;
        }
        out.push(section);
    }
}

/// At least two non-blank lines sharing two or more leading spaces.
fn has_common_indent(text: &str) -> bool {
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.len() < 2 {
        return false;
    }
    let indent = lines
        .iter()
        .map(|l| l.len() - l.trim_start_matches([' ', '\t']).len())
        .min()
        .unwrap_or(0);
    indent >= 2
}

// ── Language guess ───────────────────────────────────────────────────────

/// Keyword / operator signals per language. Each hit scores one point.
const LANGUAGE_SIGNALS: &[(&str, &[&str])] = &[
    (
        "cpp",
        &["#include", "std::", "cin", "cout", "using namespace", "vector<", "long long", "::"],
    ),
    ("c", &["#include", "printf(", "scanf(", "int main(", "malloc(", "->"]),
    (
        "python",
        &["def ", "import ", "print(", "elif ", "self.", "range(", "input()", "):\n", "lambda "],
    ),
    (
        "java",
        &["public class", "public static void", "System.out", "Scanner(", "import java", "new "],
    ),
    ("rust", &["fn ", "let mut", "println!", "impl ", "-> ", "::", "&mut", "Vec<"]),
    ("javascript", &["function ", "const ", "console.log", "=>", "let ", "require("]),
    ("go", &["func ", "package ", "fmt.", ":=", "import ("]),
];

/// Best-effort language of a code block; `None` when no signal is found.
///
/// Ties resolve to the language listed first.
pub fn guess_language(code: &str) -> Option<&'static str> {
    let mut best: Option<(&'static str, usize)> = None;
    for (lang, signals) in LANGUAGE_SIGNALS {
        let score = signals.iter().filter(|s| code.contains(*s)).count();
        if score > 0 && best.is_none_or(|(_, b)| score > b) {
            best = Some((lang, score));
        }
    }
    best.map(|(lang, _)| lang)
}

// ── Markers ──────────────────────────────────────────────────────────────

/// Opening machine-readable marker, e.g. `[CONSTRAINTS]`.
pub fn start_marker(kind: SectionKind) -> String {
    format!("[{}]", kind.label())
}

/// Closing machine-readable marker, e.g. `[/CONSTRAINTS]`.
pub fn end_marker(kind: SectionKind) -> String {
    format!("[/{}]", kind.label())
}
