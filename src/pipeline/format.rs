//! Structural text formatting: sanitized text → ordered sections.
//!
//! Runs after [`super::sanitize`]. Responsibilities, in order:
//!
//! 1. Resolve every math placeholder to its translated form. A placeholder
//!    without a matching span is logged and dropped; reserved characters
//!    never reach a section.
//! 2. Split verbatim (`<pre>`), table and prose regions.
//! 3. Segment prose into paragraphs and cut out format blocks (I/O
//!    templates such as `N` / `A[1] A[2] … A[N]`).
//! 4. Normalize subscripts and operator spacing (see [`normalize_text`]).
//!
//! [`normalize_text`] is a fixed point: applying it to its own output
//! changes nothing.

use crate::model::{Section, SectionKind};
use crate::pipeline::sanitize::{
    MathSpan, SanitizedFragment, CELL_SEP, PRE_END, PRE_START, RE_PLACEHOLDER, TABLE_END,
    TABLE_START,
};
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use tracing::warn;

// ── Math resolution ──────────────────────────────────────────────────────

/// Replace every placeholder in `text` by its span's Unicode form.
///
/// An empty translation falls back to the original markup. Unknown
/// placeholders are logged and removed, and any leftover reserved
/// character is stripped.
pub fn resolve_math(text: &str, spans: &[MathSpan]) -> String {
    let resolved = RE_PLACEHOLDER.replace_all(text, |c: &Captures| {
        match spans.iter().find(|m| m.placeholder == c[0]) {
            Some(span) if !span.unicode.is_empty() => span.unicode.clone(),
            Some(span) => span.original.trim().to_string(),
            None => {
                warn!(id = &c[1], "unresolved math placeholder dropped");
                String::new()
            }
        }
    });
    strip_reserved(&resolved, true)
}

/// Remove private-use characters the pipeline reserves. With `keep_regions`
/// the pre/table sentinels survive.
fn strip_reserved(text: &str, keep_regions: bool) -> String {
    text.chars()
        .filter(|c| {
            let reserved = ('\u{E000}'..='\u{E0FF}').contains(c);
            let region = matches!(*c, PRE_START | PRE_END | TABLE_START | TABLE_END);
            !reserved || (keep_regions && region)
        })
        .collect()
}

// ── Normalization rules ──────────────────────────────────────────────────
//
// The corruption table lists the only damaged forms that are repaired:
//
// | damaged         | canonical |
// |-----------------|-----------|
// | `case■1■`       | `case[1]` |
// | `X\u{FFFD}i\u{FFFD}` | `X[i]` |
// | `casenTn`       | `case[T]` |

/// Rule 1: glyph-separated subscripts (`case■1■`, replacement character).
static RE_GLYPH_SUBSCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z]+)[■\x{FFFD}]([A-Za-z0-9]+)[■\x{FFFD}]").unwrap()
});

/// Rule 2: letter-digit-letter artifact (`casenTn`, `testn1n`).
static RE_N_WRAPPED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(case|test|query|output|input|answer)n([A-Z0-9]+)n\b").unwrap()
});

/// Rule 3: indexed words (`case1`, `caseT`, `output2`).
static RE_INDEXED_WORD: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(case|test|query|output|input|answer)([0-9]+|[A-Z])\b").unwrap()
});

/// Rule 4: underscore subscripts (`A_1`, `x_{i+1}`, `output_i`).
static RE_UNDERSCORE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"([A-Za-z0-9])_(?:\{([^{}]+)\}|([0-9]+)\b|([A-Za-z])\b)").unwrap()
});

/// Rule 5: single capital plus digits (`A1` → `A[1]`).
static RE_CAPITAL_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([A-Z])([0-9]+)\b").unwrap());

/// Rule 6: single spaces around comparison and arithmetic operators.
static RE_OPERATOR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[ \t]*(<=|>=|!=|[≤≥≠≈≡∈∉⊆⊇⊂⊃×÷±→⇒⇔←↔≪≫⋅])[ \t]*").unwrap()
});

/// Rule 7: no space before closing punctuation. The match runs to the end
/// of the token so standalone pattern markers (`...`, `:`) can be kept.
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]+([,.;:?)\]]\S*)").unwrap());

/// Rule 8: no space after opening brackets.
static RE_SPACE_AFTER_OPEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"([(\[])[ \t]+").unwrap());

/// Rule 9: collapse runs of blanks.
static RE_MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t]{2,}").unwrap());

/// Apply subscript and spacing normalization to prose.
///
/// Line structure is preserved; each line is trimmed.
pub fn normalize_text(text: &str) -> String {
    let s = normalize_subscripts(text);
    let s = RE_OPERATOR.replace_all(&s, " $1 ");
    // `a ... .` glues into `a ....`, which is no longer a marker.
    let mut s = s.into_owned();
    loop {
        let next = RE_SPACE_BEFORE_PUNCT
            .replace_all(&s, |c: &Captures| {
                if PATTERN_MARKERS.contains(&&c[1]) {
                    format!(" {}", &c[1])
                } else {
                    c[1].to_string()
                }
            })
            .into_owned();
        if next == s {
            break;
        }
        s = next;
    }
    let s = RE_SPACE_AFTER_OPEN.replace_all(&s, "$1");
    let s = RE_MULTI_SPACE.replace_all(&s, " ");

    // Blank runs collapse to one empty line; none at either end.
    let mut lines: Vec<&str> = Vec::new();
    for line in s.lines().map(str::trim) {
        if line.is_empty() && lines.last().is_none_or(|l| l.is_empty()) {
            continue;
        }
        lines.push(line);
    }
    if lines.last() == Some(&"") {
        lines.pop();
    }
    lines.join("\n")
}

/// Rules 1–5 only: canonical bracket subscripts, spacing untouched.
pub fn normalize_subscripts(text: &str) -> String {
    let s = RE_GLYPH_SUBSCRIPT.replace_all(text, "$1[$2]");
    let s = RE_N_WRAPPED.replace_all(&s, "$1[$2]");
    let s = RE_INDEXED_WORD.replace_all(&s, "$1[$2]");

    // `a_i_j` needs one pass per level.
    let mut s = s.into_owned();
    for _ in 0..8 {
        let next = RE_UNDERSCORE
            .replace_all(&s, |c: &Captures| {
                let index = c
                    .get(2)
                    .or_else(|| c.get(3))
                    .or_else(|| c.get(4))
                    .map_or("", |m| m.as_str());
                format!("{}[{}]", &c[1], index.trim())
            })
            .into_owned();
        if next == s {
            break;
        }
        s = next;
    }

    RE_CAPITAL_DIGITS.replace_all(&s, "$1[$2]").into_owned()
}

// ── Format blocks ────────────────────────────────────────────────────────

static RE_PLAIN_VARIABLE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][0-9]*$").unwrap());
static RE_INDEXED_TOKEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^(?:[A-Za-z]+(?:\[[^\]\s]+\])+|(?:case|test|query|output|input|answer)[0-9A-Z]+|[A-Za-z]+_[A-Za-z0-9]+)$",
    )
    .unwrap()
});
const PATTERN_MARKERS: &[&str] = &[":", "…", "...", "⋮", "⋯", "\\vdots", "\\ldots", "\\cdots"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TokenShape {
    Variable,
    Indexed,
    Marker,
}

fn token_shape(token: &str) -> Option<TokenShape> {
    if PATTERN_MARKERS.contains(&token) {
        Some(TokenShape::Marker)
    } else if RE_PLAIN_VARIABLE.is_match(token) {
        Some(TokenShape::Variable)
    } else if RE_INDEXED_TOKEN.is_match(token) {
        Some(TokenShape::Indexed)
    } else {
        None
    }
}

/// True when every token of `line` is a variable, an indexed identifier,
/// or a pattern marker.
pub fn is_format_line(line: &str) -> bool {
    let mut tokens = line.split_whitespace().peekable();
    tokens.peek().is_some() && tokens.all(|t| token_shape(t).is_some())
}

/// A run of format lines is a block when it has two or more tokens in
/// total or any indexed / marker token. A lone `N` stays prose.
fn is_format_run(lines: &[&str]) -> bool {
    let mut total = 0;
    for line in lines {
        for token in line.split_whitespace() {
            total += 1;
            if token_shape(token) != Some(TokenShape::Variable) {
                return true;
            }
        }
    }
    total >= 2
}

// ── Regions ──────────────────────────────────────────────────────────────

static RE_REGION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)\x{E010}(.*?)\x{E011}|\x{E012}(.*?)\x{E013}").unwrap()
});

enum Region<'a> {
    Prose(&'a str),
    Pre(&'a str),
    Table(&'a str),
}

fn regions(text: &str) -> Vec<Region<'_>> {
    let mut out = Vec::new();
    let mut last = 0;
    for c in RE_REGION.captures_iter(text) {
        let Some(whole) = c.get(0) else { continue };
        out.push(Region::Prose(&text[last..whole.start()]));
        if let Some(pre) = c.get(1) {
            out.push(Region::Pre(pre.as_str()));
        } else if let Some(table) = c.get(2) {
            out.push(Region::Table(table.as_str()));
        }
        last = whole.end();
    }
    out.push(Region::Prose(&text[last..]));
    out
}

// ── Formatter ────────────────────────────────────────────────────────────

/// Turn one sanitized field into sections, in source order.
///
/// Prose sections carry `field` as their kind; format blocks, tables and
/// preformatted text are separate sections whose `field` is `field`.
/// Preformatted text that is not a format block is flagged monospace for
/// the classifier's code detection.
pub fn format(fragment: &SanitizedFragment, field: SectionKind) -> Vec<Section> {
    let text = resolve_math(&fragment.text, &fragment.math);
    let mut sections = Vec::new();

    for region in regions(&text) {
        match region {
            Region::Prose(prose) => format_prose(&strip_reserved(prose, false), field, &mut sections),
            Region::Pre(pre) => {
                let pre = strip_reserved(pre, false);
                let lines: Vec<&str> = pre.lines().filter(|l| !l.trim().is_empty()).collect();
                if lines.is_empty() {
                    continue;
                }
                if lines.iter().all(|l| is_format_line(l)) && is_format_run(&lines) {
                    let block = lines.iter().map(|l| l.trim_end()).collect::<Vec<_>>().join("\n");
                    sections.push(Section::new(SectionKind::FormatBlock, block).in_field(field));
                } else {
                    sections.push(Section::new(field, pre).monospace());
                }
            }
            Region::Table(table) => {
                let rows = strip_reserved(table, false)
                    .lines()
                    .map(|row| {
                        row.split(CELL_SEP)
                            .map(normalize_text)
                            .collect::<Vec<_>>()
                            .join(&CELL_SEP.to_string())
                    })
                    .collect::<Vec<_>>()
                    .join("\n");
                if !rows.trim().is_empty() {
                    sections.push(Section::new(SectionKind::Table, rows).in_field(field));
                }
            }
        }
    }
    sections
}

fn format_prose(text: &str, field: SectionKind, out: &mut Vec<Section>) {
    for paragraph in text.split("\n\n") {
        let normalized = normalize_text(paragraph);
        let lines: Vec<&str> = normalized.lines().filter(|l| !l.is_empty()).collect();

        let mut prose: Vec<&str> = Vec::new();
        let mut i = 0;
        while i < lines.len() {
            if !is_format_line(lines[i]) {
                prose.push(lines[i]);
                i += 1;
                continue;
            }
            let start = i;
            while i < lines.len() && is_format_line(lines[i]) {
                i += 1;
            }
            let run = &lines[start..i];
            if is_format_run(run) {
                flush_prose(&mut prose, field, out);
                out.push(Section::new(SectionKind::FormatBlock, run.join("\n")).in_field(field));
            } else {
                prose.extend_from_slice(run);
            }
        }
        flush_prose(&mut prose, field, out);
    }
}

fn flush_prose(lines: &mut Vec<&str>, field: SectionKind, out: &mut Vec<Section>) {
    if !lines.is_empty() {
        out.push(Section::new(field, lines.join("\n")));
        lines.clear();
    }
}

/// Resolve math in verbatim sample text; lines and indentation are kept.
pub fn format_sample(fragment: &SanitizedFragment) -> String {
    strip_reserved(&resolve_math(&fragment.text, &fragment.math), false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::sanitize::{sanitize, Sanitizer};
    use proptest::prelude::*;

    fn contents(sections: &[Section]) -> Vec<(SectionKind, String)> {
        sections.iter().map(|s| (s.kind, s.content.clone())).collect()
    }

    // ── Math resolution ──────────────────────────────────────────────────

    #[test]
    fn scenario_leq_chain() {
        let sections = format(&sanitize(r"1 \leq T \leq 5"), SectionKind::Constraints);
        assert_eq!(contents(&sections), vec![(SectionKind::Constraints, "1 ≤ T ≤ 5".into())]);
    }

    #[test]
    fn unknown_placeholder_never_leaks() {
        let frag = SanitizedFragment::plain("x \u{E000}M42\u{E001} y");
        let out = resolve_math(&frag.text, &frag.math);
        assert_eq!(out, "x  y");
    }

    #[test]
    fn empty_translation_uses_original() {
        let span = MathSpan {
            placeholder: "\u{E000}M0\u{E001}".into(),
            original: "\\displaystyle".into(),
            unicode: String::new(),
            display: false,
        };
        assert_eq!(resolve_math("a \u{E000}M0\u{E001}", &[span]), "a \\displaystyle");
    }

    // ── Subscripts ───────────────────────────────────────────────────────

    #[test]
    fn bare_concatenations() {
        assert_eq!(normalize_subscripts("case1 and A1"), "case[1] and A[1]");
        assert_eq!(normalize_subscripts("caseT"), "case[T]");
    }

    #[test]
    fn corruption_table() {
        assert_eq!(normalize_subscripts("case■1■"), "case[1]");
        assert_eq!(normalize_subscripts("X\u{FFFD}i\u{FFFD}"), "X[i]");
        assert_eq!(normalize_subscripts("casenTn"), "case[T]");
    }

    #[test]
    fn underscore_forms() {
        assert_eq!(normalize_subscripts("output_i"), "output[i]");
        assert_eq!(normalize_subscripts("x_{i+1}"), "x[i+1]");
        assert_eq!(normalize_subscripts("a_i_j"), "a[i][j]");
        assert_eq!(normalize_subscripts("max_value"), "max_value");
    }

    #[test]
    fn ordinary_words_untouched() {
        assert_eq!(normalize_subscripts("H2O showcase1 ABC123"), "H2O showcase1 ABC123");
    }

    // ── Spacing ──────────────────────────────────────────────────────────

    #[test]
    fn operator_spacing() {
        assert_eq!(normalize_text("1≤T≤100"), "1 ≤ T ≤ 100");
        assert_eq!(normalize_text("a<=b and c!=d"), "a <= b and c != d");
        assert_eq!(normalize_text("2×10^5"), "2 × 10^5");
    }

    #[test]
    fn punctuation_spacing() {
        assert_eq!(normalize_text("( a , b ) ."), "(a, b).");
        assert_eq!(normalize_text("  x   y  "), "x y");
    }

    #[test]
    fn standalone_markers_keep_their_space() {
        assert_eq!(normalize_text("A_1 ... A_N"), "A[1] ... A[N]");
        assert_eq!(normalize_text("A_1 A_2 :"), "A[1] A[2] :");
        assert_eq!(normalize_text("ends here ..."), "ends here ...");
        assert_eq!(normalize_text("so on ...."), "so on....");
        assert_eq!(normalize_text("a ... ."), "a....");
    }

    #[test]
    fn blank_lines_collapse() {
        assert_eq!(normalize_text("\n "), "");
        assert_eq!(normalize_text("a\n \n"), "a");
        assert_eq!(normalize_text("\n\na\n\n \n\nb\n"), "a\n\nb");
        for s in ["\n ", "a\n \n", " \n\t\nx\n\n"] {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "input {s:?}");
        }
    }

    #[test]
    fn normalize_is_idempotent_on_samples() {
        for s in ["(≤x)", "a )_1", "x≤)", "1≤≥2", "case1≤A1", "a_i_j_k", "[ ≤ ]"] {
            let once = normalize_text(s);
            assert_eq!(normalize_text(&once), once, "input {s:?}");
        }
    }

    // ── Format blocks ────────────────────────────────────────────────────

    #[test]
    fn format_line_shapes() {
        assert!(is_format_line("N M"));
        assert!(is_format_line("A[1] A[2] … A[N]"));
        assert!(is_format_line("case[1]"));
        assert!(is_format_line("⋮"));
        assert!(!is_format_line("Print the answer."));
        assert!(!is_format_line(""));
    }

    #[test]
    fn format_block_is_cut_out_of_prose() {
        let frag = sanitize("Input is given as:<br>N<br>A_1 A_2 \\ldots A_N<br>Read it.");
        let sections = format(&frag, SectionKind::InputFormat);
        assert_eq!(
            contents(&sections),
            vec![
                (SectionKind::InputFormat, "Input is given as:".into()),
                (SectionKind::FormatBlock, "N\nA[1] A[2] … A[N]".into()),
                (SectionKind::InputFormat, "Read it.".into()),
            ]
        );
        assert_eq!(sections[1].field, SectionKind::InputFormat);
    }

    #[test]
    fn ascii_markers_form_format_blocks() {
        let sections = format(&sanitize("Input:<br>N<br>A_1 ... A_N"), SectionKind::InputFormat);
        assert_eq!(
            contents(&sections),
            vec![
                (SectionKind::InputFormat, "Input:".into()),
                (SectionKind::FormatBlock, "N\nA[1] ... A[N]".into()),
            ]
        );

        let sections = format(&sanitize("N<br>A_1 A_2<br>:<br>A_N"), SectionKind::InputFormat);
        assert_eq!(
            contents(&sections),
            vec![(SectionKind::FormatBlock, "N\nA[1] A[2]\n:\nA[N]".into())]
        );
        assert!(is_format_line("A[1] A[2] :"));
    }

    #[test]
    fn lone_variable_stays_prose() {
        let sections = format(&sanitize("<p>N</p>"), SectionKind::Statement);
        assert_eq!(sections[0].kind, SectionKind::Statement);
    }

    #[test]
    fn atcoder_style_pre_is_format_block() {
        let frag = sanitize("<pre><var>N</var>\n<var>A_1</var> <var>A_2</var> <var>\\ldots</var> <var>A_N</var>\n</pre>");
        let sections = format(&frag, SectionKind::InputFormat);
        assert_eq!(
            contents(&sections),
            vec![(SectionKind::FormatBlock, "N\nA[1] A[2] … A[N]".into())]
        );
    }

    #[test]
    fn code_pre_is_monospace_field_section() {
        let frag = sanitize("<pre>int main() {\n    return 0;\n}</pre>");
        let sections = format(&frag, SectionKind::Notes);
        assert_eq!(sections.len(), 1);
        assert!(sections[0].monospace);
        assert_eq!(sections[0].kind, SectionKind::Notes);
        assert!(sections[0].content.contains("    return 0;"));
    }

    #[test]
    fn paragraphs_keep_order() {
        let sections = format(&sanitize("<p>first</p><p>second</p>"), SectionKind::Statement);
        assert_eq!(
            contents(&sections),
            vec![
                (SectionKind::Statement, "first".into()),
                (SectionKind::Statement, "second".into()),
            ]
        );
    }

    #[test]
    fn tables_become_table_sections() {
        let frag = sanitize("<table><tr><td>A1</td><td>1≤x</td></tr></table>");
        let sections = format(&frag, SectionKind::Statement);
        assert_eq!(
            contents(&sections),
            vec![(SectionKind::Table, "A[1]\t1 ≤ x".into())]
        );
    }

    #[test]
    fn formatting_own_output_is_stable() {
        let frag = sanitize(r"<p>Given $1 \le N \le 10^5$ and case1 ,case2 .</p><p>N M</p>");
        let first = format(&frag, SectionKind::Statement);
        for section in &first {
            let again = format(&SanitizedFragment::plain(section.content.clone()), SectionKind::Statement);
            assert_eq!(again.len(), 1);
            assert_eq!(again[0].content, section.content);
        }
    }

    #[test]
    fn sample_vdots_resolved() {
        let frag = Sanitizer::new().sanitize_preformatted("1\n\\vdots\n5");
        assert_eq!(format_sample(&frag), "1\n⋮\n5");
    }

    // ── Properties ───────────────────────────────────────────────────────

    fn statement_piece() -> impl Strategy<Value = &'static str> {
        prop::sample::select(vec![
            "N", "M", "A1", "case1", "casenTn", "x_i", "a_{i+1}", "1≤T≤100", r"$1 \leq N$",
            r"\leq", r"$$$a_i$$$", r"\vdots", "…", "(", ")", ",", ".", "<br>", "<p>", "</p>",
            " ", "  ", "\n", "word", "<var>K</var>", "&lt;", "<b>bold</b>", "≠", "<=",
        ])
    }

    proptest! {
        #[test]
        fn normalize_text_is_a_fixed_point(pieces in prop::collection::vec(statement_piece(), 0..24)) {
            let input: String = pieces.concat();
            let once = normalize_text(&input);
            prop_assert_eq!(normalize_text(&once), once);
        }

        #[test]
        fn formatted_sections_never_contain_placeholders(pieces in prop::collection::vec(statement_piece(), 0..24)) {
            let input: String = pieces.concat();
            for section in format(&sanitize(&input), SectionKind::Statement) {
                let leaked = section.content.chars().any(|c| ('\u{E000}'..='\u{E0FF}').contains(&c));
            prop_assert!(!leaked, "placeholder leaked into {:?}", section.content);
            }
        }
    }
}
