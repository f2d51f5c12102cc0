//! Markup sanitization: broken HTML fragments → clean marked-up text.
//!
//! Judges serve markup that is frequently malformed (`<span class = "x">`,
//! `< / var>`, `<h[3]>`, stray control bytes). [`Sanitizer::sanitize`] turns
//! such a fragment into plain text with explicit structure markers, never
//! failing:
//!
//! 1. Protect math: every math region (`$…$`, `$$…$$`, `$$$…$$$`, `\(…\)`,
//!    `\[…\]`, `<var>`, `<script type="math/tex">`, bare `\command`s) is
//!    translated once and replaced by a unique placeholder so later edits
//!    cannot corrupt it.
//! 2. Repair known defect classes (spaced `=` in attributes, spaced closing
//!    tags, bracketed heading numerals, control characters).
//! 3. Strip any tag that still does not parse, keeping its text.
//! 4. Decode HTML entities.
//! 5. Collapse whitespace; paragraphs become `"\n\n"`, line breaks `"\n"`.
//!
//! Preformatted regions survive verbatim between [`PRE_START`] / [`PRE_END`];
//! tables become tab-separated rows between [`TABLE_START`] / [`TABLE_END`].
//! If a fragment contains a tag that can never close, the sanitizer falls
//! back to plain-text extraction through the `scraper` HTML parser.
//!
//! Defects are recorded as [`Defect`] flags on the returned fragment; they
//! are informational only and never propagate as errors.

use crate::pipeline::symbols;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::debug;

/// Opens a math placeholder (`\u{E000}M<id>\u{E001}`).
pub const PLACEHOLDER_OPEN: char = '\u{E000}';
/// Closes a math placeholder.
pub const PLACEHOLDER_CLOSE: char = '\u{E001}';
/// Start of a verbatim preformatted region.
pub const PRE_START: char = '\u{E010}';
/// End of a verbatim preformatted region.
pub const PRE_END: char = '\u{E011}';
/// Start of a table region (rows separated by `\n`, cells by [`CELL_SEP`]).
pub const TABLE_START: char = '\u{E012}';
/// End of a table region.
pub const TABLE_END: char = '\u{E013}';
/// Cell separator inside a table region.
pub const CELL_SEP: char = '\t';

const SLOT_OPEN: char = '\u{E002}';
const SLOT_CLOSE: char = '\u{E003}';
const PARA: char = '\u{E020}';
const LINE: char = '\u{E021}';

/// Matches any math placeholder; group 1 is the span id.
pub static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\x{E000}M(\d+)\x{E001}").unwrap());

// ── Types ────────────────────────────────────────────────────────────────

/// A defect found and fixed while sanitizing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Defect {
    /// C0 control characters other than tab / newline.
    ControlCharacter,
    /// Input already contained characters from the placeholder range.
    PlaceholderCollision,
    /// `< / tag>` style closing tag.
    SpacedClosingTag,
    /// Whitespace around `=` inside a tag.
    MalformedAttribute,
    /// `<h[3]>` / `<h 3>` style heading tag.
    MalformedHeading,
    /// A tag that still did not parse after repair; stripped.
    UnparseableTag,
    /// Fragment could not be repaired; reduced to its text.
    DegradedToPlainText,
}

/// One protected math region.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MathSpan {
    pub placeholder: String,
    /// Markup as it appeared in the source.
    pub original: String,
    /// Symbol-translated form.
    pub unicode: String,
    /// Display (block) math rather than inline.
    pub display: bool,
}

/// Sanitizer output for one field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SanitizedFragment {
    pub text: String,
    pub defects: BTreeSet<Defect>,
    pub math: Vec<MathSpan>,
}

impl SanitizedFragment {
    /// Wrap text that is already clean (no markup, no placeholders).
    pub fn plain(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }

    pub fn span(&self, placeholder: &str) -> Option<&MathSpan> {
        self.math.iter().find(|m| m.placeholder == placeholder)
    }
}

/// Stateful sanitizer: one per document so placeholder ids never repeat.
#[derive(Debug, Default)]
pub struct Sanitizer {
    next_id: usize,
}

/// Sanitize a single fragment with a fresh [`Sanitizer`].
pub fn sanitize(html: &str) -> SanitizedFragment {
    Sanitizer::new().sanitize(html)
}

// ── Regexes ──────────────────────────────────────────────────────────────

static RE_COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)<!--.*?-->").unwrap());
static RE_STYLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<style\b[^>]*>.*?</style\s*>").unwrap());
static RE_SCRIPT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<script\b([^>]*)>.*?</script\s*>").unwrap());

static RE_MATH_SCRIPT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)<script\b[^>]*math/tex(;\s*mode\s*=\s*display)?[^>]*>(.*?)</script\s*>")
        .unwrap()
});
static RE_TRIPLE_DOLLAR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\$\$\$(.+?)\$\$\$").unwrap());
static RE_DOUBLE_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\$\$(.+?)\$\$").unwrap());
static RE_BRACKET_DISPLAY: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\[(.+?)\\\]").unwrap());
static RE_PAREN_INLINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\\\((.+?)\\\)").unwrap());
static RE_SINGLE_DOLLAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$([^$\n]+?)\$").unwrap());
static RE_VAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<var\b[^>]*>(.*?)</var>").unwrap());
static RE_BARE_COMMAND: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\\(?:[A-Za-z]+|[{}|,;:!%&#_])(?:\[[^\]\n]*\])?(?:\s*\{[^{}]*\})*").unwrap()
});
static RE_PRE_BLOCK: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre\b[^>]*>.*?</pre\s*>").unwrap());

static RE_CONTROL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F\x7F]").unwrap());
static RE_SPACED_CLOSE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<\s*/\s*([A-Za-z][A-Za-z0-9]*)\s*>").unwrap());
static RE_BAD_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"<(/?)\s*[hH](?:\s*[\[(]\s*([1-6])\s*[\])]|\s+([1-6]))(\s[^<>]*)?>").unwrap()
});
static RE_OPEN_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[A-Za-z][^<>]*>").unwrap());
static RE_SPACED_EQ: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s*=\s*").unwrap());

static RE_PRE_CAPTURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<pre\b[^>]*>(.*?)</pre\s*>").unwrap());
static RE_TABLE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<table\b[^>]*>(.*?)</table\s*>").unwrap());
static RE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr\s*>").unwrap());
static RE_CELL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?is)<t[dh]\b[^>]*>(.*?)</t[dh]\s*>").unwrap());
static RE_BR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?i)<br\s*/?>").unwrap());

static RE_ANY_TAG: Lazy<Regex> = Lazy::new(|| Regex::new(r"<[^<>]*>").unwrap());
static RE_STRICT_TAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r#"^<(/?)([A-Za-z][A-Za-z0-9-]*)((?:\s+[^\s"'<>/=]+(?:\s*=\s*(?:"[^"]*"|'[^']*'|[^\s"'=<>`]+))?)*)\s*/?>$"#,
    )
    .unwrap()
});
static RE_SLOT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x{E002}([PT])(\d+)\x{E003}").unwrap());
static RE_BLANKS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\r\n\x0C]+").unwrap());

/// Elements that start a new paragraph.
const BLOCK_TAGS: &[&str] = &[
    "p", "div", "section", "article", "header", "footer", "h1", "h2", "h3", "h4", "h5", "h6",
    "ul", "ol", "blockquote", "center", "hr", "dl", "dt", "dd", "figure", "figcaption", "main",
    "aside", "nav", "details", "summary",
];

// ── Sanitizer ────────────────────────────────────────────────────────────

impl Sanitizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sanitize one HTML fragment. Never fails.
    pub fn sanitize(&mut self, html: &str) -> SanitizedFragment {
        let mut defects = BTreeSet::new();
        let mut math = Vec::new();

        let s = normalise_line_endings(html);
        let s = strip_reserved_chars(&s, &mut defects);
        let s = remove_non_content(&s);

        // ── Step 1: Protect math ─────────────────────────────────────────
        let s = self.protect_math(&s, &mut math);

        // ── Step 2: Repair known defects ─────────────────────────────────
        let s = repair(&s, &mut defects);

        if has_dangling_tag(&s) {
            defects.insert(Defect::DegradedToPlainText);
            debug!("fragment has an unterminated tag, falling back to plain text");
            let text = finish(&plain_text_fallback(&escape_stray_lt(&s)), &[], &[]);
            return SanitizedFragment {
                text,
                defects,
                math,
            };
        }

        // ── Step 3: Strip unparseable tags, mark structure ───────────────
        let mut pre_blocks = Vec::new();
        let mut tables = Vec::new();
        let s = extract_pre_blocks(&s, &mut pre_blocks);
        let s = extract_tables(&s, &mut tables);
        let s = replace_tags(&s, &mut defects);

        // ── Step 4: Decode entities ──────────────────────────────────────
        let s = decode_entities(&s);

        // ── Step 5: Normalise whitespace ─────────────────────────────────
        let text = finish(&s, &pre_blocks, &tables);

        if !defects.is_empty() {
            debug!(?defects, "repaired markup defects");
        }
        SanitizedFragment {
            text,
            defects,
            math,
        }
    }

    /// Sanitize verbatim text (sample I/O): keeps lines and indentation,
    /// protects bare math commands, never interprets markup.
    pub fn sanitize_preformatted(&mut self, text: &str) -> SanitizedFragment {
        let mut defects = BTreeSet::new();
        let mut math = Vec::new();
        let s = normalise_line_endings(text);
        let s = strip_reserved_chars(&s, &mut defects);
        let s = strip_control(&s, &mut defects);
        let s = self.protect_bare_commands(&s, &mut math);
        SanitizedFragment {
            text: trim_verbatim(&s),
            defects,
            math,
        }
    }

    /// Protect math everywhere; bare commands only outside `<pre>` so code
    /// escapes such as `"\\n"` stay intact.
    fn protect_math(&mut self, input: &str, math: &mut Vec<MathSpan>) -> String {
        let mut out = String::with_capacity(input.len());
        let mut last = 0;
        for m in RE_PRE_BLOCK.find_iter(input) {
            out.push_str(&self.protect(&input[last..m.start()], true, math));
            out.push_str(&self.protect(m.as_str(), false, math));
            last = m.end();
        }
        out.push_str(&self.protect(&input[last..], true, math));
        out
    }

    fn protect(&mut self, input: &str, bare: bool, math: &mut Vec<MathSpan>) -> String {
        let s = RE_MATH_SCRIPT
            .replace_all(input, |c: &Captures| {
                self.register(&c[2], c.get(1).is_some(), math)
            })
            .into_owned();
        let s = RE_TRIPLE_DOLLAR
            .replace_all(&s, |c: &Captures| self.register(&c[1], false, math))
            .into_owned();
        let s = RE_DOUBLE_DOLLAR
            .replace_all(&s, |c: &Captures| self.register(&c[1], true, math))
            .into_owned();
        let s = RE_BRACKET_DISPLAY
            .replace_all(&s, |c: &Captures| self.register(&c[1], true, math))
            .into_owned();
        let s = RE_PAREN_INLINE
            .replace_all(&s, |c: &Captures| self.register(&c[1], false, math))
            .into_owned();
        let s = RE_SINGLE_DOLLAR
            .replace_all(&s, |c: &Captures| self.register(&c[1], false, math))
            .into_owned();
        let s = RE_VAR
            .replace_all(&s, |c: &Captures| self.register(&c[1], false, math))
            .into_owned();
        if bare {
            self.protect_bare_commands(&s, math)
        } else {
            s
        }
    }

    fn protect_bare_commands(&mut self, input: &str, math: &mut Vec<MathSpan>) -> String {
        RE_BARE_COMMAND
            .replace_all(input, |c: &Captures| self.register(&c[0], false, math))
            .into_owned()
    }

    /// Translate `raw` and hand out the next placeholder for it.
    fn register(&mut self, raw: &str, display: bool, math: &mut Vec<MathSpan>) -> String {
        let stripped = RE_ANY_TAG.replace_all(raw, "");
        let decoded = html_escape::decode_html_entities(&stripped);
        let unicode = symbols::translate(decoded.trim());
        let unicode = RE_BLANKS.replace_all(unicode.trim(), " ").into_owned();

        let placeholder = format!("{PLACEHOLDER_OPEN}M{}{PLACEHOLDER_CLOSE}", self.next_id);
        self.next_id += 1;
        math.push(MathSpan {
            placeholder: placeholder.clone(),
            original: raw.to_string(),
            unicode,
            display,
        });
        placeholder
    }
}

// ── Pre-processing ───────────────────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

/// Drop characters from the private-use block the sanitizer reserves.
fn strip_reserved_chars(input: &str, defects: &mut BTreeSet<Defect>) -> String {
    let reserved = |c: char| ('\u{E000}'..='\u{E0FF}').contains(&c);
    if input.chars().any(reserved) {
        defects.insert(Defect::PlaceholderCollision);
        input.chars().filter(|c| !reserved(*c)).collect()
    } else {
        input.to_string()
    }
}

/// Comments, stylesheets and scripts other than `math/tex` carry no content.
fn remove_non_content(input: &str) -> String {
    let s = RE_COMMENT.replace_all(input, "");
    let s = RE_STYLE.replace_all(&s, "");
    RE_SCRIPT
        .replace_all(&s, |c: &Captures| {
            if c[1].to_ascii_lowercase().contains("math/tex") {
                c[0].to_string()
            } else {
                String::new()
            }
        })
        .into_owned()
}

// ── Repair ───────────────────────────────────────────────────────────────

fn repair(input: &str, defects: &mut BTreeSet<Defect>) -> String {
    let s = strip_control(input, defects);

    let s = RE_SPACED_CLOSE
        .replace_all(&s, |c: &Captures| {
            let canonical = format!("</{}>", &c[1]);
            if c[0] != canonical {
                defects.insert(Defect::SpacedClosingTag);
            }
            canonical
        })
        .into_owned();

    let s = RE_BAD_HEADING
        .replace_all(&s, |c: &Captures| {
            defects.insert(Defect::MalformedHeading);
            let level = c.get(2).or_else(|| c.get(3)).map_or("", |m| m.as_str());
            let rest = c.get(4).map_or("", |m| m.as_str());
            format!("<{}h{}{}>", &c[1], level, rest)
        })
        .into_owned();

    RE_OPEN_TAG
        .replace_all(&s, |c: &Captures| {
            let fixed = RE_SPACED_EQ.replace_all(&c[0], "=");
            if fixed != c[0] {
                defects.insert(Defect::MalformedAttribute);
            }
            fixed.into_owned()
        })
        .into_owned()
}

fn strip_control(input: &str, defects: &mut BTreeSet<Defect>) -> String {
    if RE_CONTROL.is_match(input) {
        defects.insert(Defect::ControlCharacter);
        RE_CONTROL.replace_all(input, "").into_owned()
    } else {
        input.to_string()
    }
}

/// A `<name` or `</name` whose `>` never arrives before the next `<`.
fn has_dangling_tag(input: &str) -> bool {
    input.match_indices('<').any(|(i, _)| is_stray_lt(&input[i + 1..]))
}

/// A `<` that looks like a tag opener but is never closed before the next
/// `<` or the end of input. `rest` is the text after the `<`.
fn is_stray_lt(rest: &str) -> bool {
    let starts_tag = rest
        .chars()
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '/');
    if !starts_tag {
        return false;
    }
    match (rest.find('>'), rest.find('<')) {
        (None, _) => true,
        (Some(gt), Some(lt)) => lt < gt,
        _ => false,
    }
}

/// Escape every stray `<` (`a<b`, `1<N<10`) so the HTML parser keeps the
/// text after it instead of reading an unfinished tag.
fn escape_stray_lt(input: &str) -> String {
    let mut out = String::with_capacity(input.len() + 8);
    let mut last = 0;
    for (i, _) in input.match_indices('<') {
        if is_stray_lt(&input[i + 1..]) {
            out.push_str(&input[last..i]);
            out.push_str("&lt;");
            last = i + 1;
        }
    }
    out.push_str(&input[last..]);
    out
}

/// Text content via a forgiving HTML5 parser; block elements still start
/// a new paragraph.
fn plain_text_fallback(input: &str) -> String {
    let doc = scraper::Html::parse_fragment(input);
    let mut out = String::with_capacity(input.len());
    for node in doc.root_element().descendants() {
        match node.value() {
            scraper::Node::Text(t) => out.push_str(t),
            scraper::Node::Element(e) if e.name() == "br" => out.push(LINE),
            scraper::Node::Element(e) if BLOCK_TAGS.contains(&e.name()) => out.push(PARA),
            _ => {}
        }
    }
    out
}

// ── Structure ────────────────────────────────────────────────────────────

fn extract_pre_blocks(input: &str, blocks: &mut Vec<String>) -> String {
    RE_PRE_CAPTURE
        .replace_all(input, |c: &Captures| {
            let inner = RE_BR.replace_all(&c[1], "\n");
            let inner = RE_ANY_TAG.replace_all(&inner, "");
            let inner = trim_verbatim(&decode_entities(&inner));
            if inner.is_empty() {
                return PARA.to_string();
            }
            blocks.push(inner);
            format!("{PARA}{SLOT_OPEN}P{}{SLOT_CLOSE}{PARA}", blocks.len() - 1)
        })
        .into_owned()
}

fn extract_tables(input: &str, tables: &mut Vec<Vec<Vec<String>>>) -> String {
    RE_TABLE
        .replace_all(input, |c: &Captures| {
            let rows: Vec<Vec<String>> = RE_ROW
                .captures_iter(&c[1])
                .map(|row| {
                    RE_CELL
                        .captures_iter(&row[1])
                        .map(|cell| inline_text(&cell[1]))
                        .collect::<Vec<_>>()
                })
                .filter(|row| !row.is_empty())
                .collect();
            if rows.is_empty() {
                return format!("{PARA}{}{PARA}", &c[1]);
            }
            tables.push(rows);
            format!("{PARA}{SLOT_OPEN}T{}{SLOT_CLOSE}{PARA}", tables.len() - 1)
        })
        .into_owned()
}

/// Collapse a small markup snippet (table cell) to one line of text.
fn inline_text(html: &str) -> String {
    let s = RE_ANY_TAG.replace_all(html, " ");
    let s = decode_entities(&s);
    RE_BLANKS.replace_all(s.trim(), " ").into_owned()
}

/// Replace every remaining tag with its structural marker (or nothing).
fn replace_tags(input: &str, defects: &mut BTreeSet<Defect>) -> String {
    RE_ANY_TAG
        .replace_all(input, |c: &Captures| {
            let tag = &c[0];
            if tag.starts_with("<!") || tag.starts_with("<?") {
                return String::new();
            }
            let Some(parts) = RE_STRICT_TAG.captures(tag) else {
                defects.insert(Defect::UnparseableTag);
                return String::new();
            };
            let closing = !parts[1].is_empty();
            let name = parts[2].to_ascii_lowercase();
            match name.as_str() {
                "br" => LINE.to_string(),
                "li" if !closing => format!("{LINE}• "),
                "tr" => LINE.to_string(),
                "td" | "th" if closing => " ".to_string(),
                n if BLOCK_TAGS.contains(&n) => PARA.to_string(),
                _ => String::new(),
            }
        })
        .into_owned()
}

fn decode_entities(input: &str) -> String {
    let decoded = html_escape::decode_html_entities(input);
    decoded
        .replace('\u{A0}', " ")
        .replace(['\u{200B}', '\u{FEFF}', '\u{00AD}', '\u{200C}', '\u{200D}', '\u{2060}'], "")
}

// ── Whitespace ───────────────────────────────────────────────────────────

/// Collapse blanks, turn markers into `\n\n` / `\n`, restore slots.
fn finish(input: &str, pre_blocks: &[String], tables: &[Vec<Vec<String>>]) -> String {
    let collapsed = RE_BLANKS.replace_all(input, " ");
    let paragraphs: Vec<String> = collapsed
        .split(PARA)
        .map(|para| {
            para.split(LINE)
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .collect::<Vec<_>>()
                .join("\n")
        })
        .filter(|p| !p.is_empty())
        .collect();
    let joined = paragraphs.join("\n\n");

    RE_SLOT
        .replace_all(&joined, |c: &Captures| {
            let idx: usize = c[2].parse().unwrap_or(usize::MAX);
            match &c[1] {
                "P" => pre_blocks
                    .get(idx)
                    .map(|b| format!("{PRE_START}{b}{PRE_END}"))
                    .unwrap_or_default(),
                _ => tables
                    .get(idx)
                    .map(|rows| {
                        let body = rows
                            .iter()
                            .map(|r| r.join(&CELL_SEP.to_string()))
                            .collect::<Vec<_>>()
                            .join("\n");
                        format!("{TABLE_START}{body}{TABLE_END}")
                    })
                    .unwrap_or_default(),
            }
        })
        .into_owned()
}

/// Trim trailing whitespace per line and blank lines at both ends.
fn trim_verbatim(input: &str) -> String {
    let lines: Vec<&str> = input.lines().map(str::trim_end).collect();
    let start = lines.iter().position(|l| !l.is_empty());
    let end = lines.iter().rposition(|l| !l.is_empty());
    match (start, end) {
        (Some(s), Some(e)) => lines[s..=e].join("\n"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(f: &SanitizedFragment) -> String {
        RE_PLACEHOLDER
            .replace_all(&f.text, |c: &Captures| {
                f.span(&c[0]).map(|m| m.unicode.clone()).unwrap_or_default()
            })
            .into_owned()
    }

    #[test]
    fn spaced_attribute_and_closing_tag() {
        let f = sanitize(r#"<span class = "lang - en"> <var>800< / var> points"#);
        assert_eq!(f.text, "800 points");
        assert!(f.defects.contains(&Defect::MalformedAttribute));
        assert!(f.defects.contains(&Defect::SpacedClosingTag));
        assert!(!f.text.contains('<'));
    }

    #[test]
    fn bracketed_heading_is_repaired() {
        let f = sanitize("<h[3]>Problem</h[3]><p>Body</p>");
        assert_eq!(f.text, "Problem\n\nBody");
        assert!(f.defects.contains(&Defect::MalformedHeading));
    }

    #[test]
    fn control_characters_removed() {
        let f = sanitize("a\u{0007}b\u{0000}c");
        assert_eq!(f.text, "abc");
        assert!(f.defects.contains(&Defect::ControlCharacter));
    }

    #[test]
    fn unparseable_tag_keeps_text() {
        let f = sanitize(r#"<div class="a"b>kept text</div>"#);
        assert_eq!(f.text, "kept text");
        assert!(f.defects.contains(&Defect::UnparseableTag));
    }

    #[test]
    fn dangling_tag_degrades_to_plain_text() {
        let f = sanitize(r#"<p>hello <b>world</b></p> <span class="x"#);
        assert!(f.defects.contains(&Defect::DegradedToPlainText));
        assert!(f.text.starts_with("hello world"));
        assert!(f.text.ends_with(r#"span class="x"#));
    }

    #[test]
    fn stray_less_than_keeps_following_text() {
        let f = sanitize("<p>Print x if a<b holds.</p>");
        assert!(f.defects.contains(&Defect::DegradedToPlainText));
        assert_eq!(f.text, "Print x if a<b holds.");

        let f = sanitize("1<N<10");
        assert_eq!(f.text, "1<N<10");
    }

    #[test]
    fn only_unclosed_openers_are_escaped() {
        assert_eq!(escape_stray_lt("<i>a</i> a<b"), "<i>a</i> a&lt;b");
        assert_eq!(escape_stray_lt("1<N<10"), "1&lt;N&lt;10");
        assert_eq!(escape_stray_lt("x < y <b>z</b>"), "x < y <b>z</b>");
    }

    #[test]
    fn entities_decoded_after_tags() {
        let f = sanitize("<p>a &lt;b&gt; &amp; c&nbsp;d</p>");
        assert_eq!(f.text, "a <b> & c d");
        assert!(f.defects.is_empty());
    }

    #[test]
    fn paragraphs_and_line_breaks() {
        let f = sanitize("<p>one\n  two</p><p>three<br>four</p>");
        assert_eq!(f.text, "one two\n\nthree\nfour");
    }

    #[test]
    fn list_items_are_bulleted_lines() {
        let f = sanitize("<ul><li>a</li><li>b</li></ul>");
        assert_eq!(f.text, "• a\n• b");
    }

    #[test]
    fn math_is_protected_and_translated() {
        let f = sanitize(r"<p>Given $1 \leq N \leq 10^5$.</p>");
        assert_eq!(f.math.len(), 1);
        assert_eq!(f.math[0].unicode, "1 ≤ N ≤ 10^5");
        assert!(RE_PLACEHOLDER.is_match(&f.text));
        assert_eq!(resolved(&f), "Given 1 ≤ N ≤ 10^5.");
    }

    #[test]
    fn codeforces_triple_dollar() {
        let f = sanitize(r"$$$a_i \ne a_j$$$");
        assert_eq!(resolved(&f), "a[i] ≠ a[j]");
    }

    #[test]
    fn bare_commands_are_protected() {
        let f = sanitize(r"1 \leq T \leq 5");
        assert_eq!(f.math.len(), 2);
        assert_eq!(resolved(&f), "1 ≤ T ≤ 5");
    }

    #[test]
    fn math_script_tags() {
        let f = sanitize(r#"x <script type="math/tex">\alpha</script> <script>var a = 1;</script>"#);
        assert_eq!(resolved(&f), "x α");
    }

    #[test]
    fn placeholders_unique_across_fragments() {
        let mut s = Sanitizer::new();
        let a = s.sanitize("$x$");
        let b = s.sanitize("$y$");
        assert_ne!(a.math[0].placeholder, b.math[0].placeholder);
    }

    #[test]
    fn reserved_characters_in_input_are_dropped() {
        let f = sanitize("a\u{E000}M0\u{E001}b");
        assert_eq!(f.text, "aM0b");
        assert!(f.defects.contains(&Defect::PlaceholderCollision));
        assert!(f.math.is_empty());
    }

    #[test]
    fn pre_block_is_verbatim() {
        let f = sanitize("<p>Input</p><pre>N\n  A B\n</pre>");
        assert_eq!(f.text, format!("Input\n\n{PRE_START}N\n  A B{PRE_END}"));
    }

    #[test]
    fn pre_block_keeps_code_escapes() {
        let f = sanitize(r#"<pre>printf("%d\n", x);</pre>"#);
        assert!(f.math.is_empty());
        assert!(f.text.contains(r"\n"));
    }

    #[test]
    fn table_becomes_rows() {
        let f = sanitize("<table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td><b>2</b></td></tr></table>");
        assert_eq!(f.text, format!("{TABLE_START}a\tb\n1\t2{TABLE_END}"));
    }

    #[test]
    fn preformatted_sample_translates_vdots() {
        let mut s = Sanitizer::new();
        let f = s.sanitize_preformatted("1\n2\n\\vdots\n9\n\n");
        assert_eq!(resolved(&f), "1\n2\n⋮\n9");
    }

    #[test]
    fn comments_and_styles_dropped() {
        let f = sanitize("<!-- hidden --><style>p{}</style><p>shown</p>");
        assert_eq!(f.text, "shown");
    }
}
