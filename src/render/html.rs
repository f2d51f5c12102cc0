//! Standalone HTML for the `TryStructuredHTML` state, plus the style rules
//! injected into live pages before exact capture.

use crate::config::{PageSize, SampleLayout};
use crate::model::{BlockKind, Document};
use html_escape::{encode_double_quoted_attribute, encode_text};
use std::fmt::Write as _;
use std::path::Path;

/// Hides site navigation, ads and footers; keeps samples and code whole.
pub const CHROME_SUPPRESSION_CSS: &str = r#"
nav, header, footer, aside,
.navbar, .header, .footer, .sidebar, #sidebar, .menu, .breadcrumb,
.advertisement, .ads, .ad, [id^="google_ads"], .social, .share, .social-share,
.cookie-notice, .cookie-banner, #cookie-consent, .banner, .announcement,
.comments, #comments, .second-level-menu, .roundbox.sidebox, #pageFooter,
.lang-ja, .btn-copy, .div-btn-copy, .insert-participant-box {
  display: none !important;
}
pre, .sample-test, .sample-tests, .io-sample, .part {
  page-break-inside: avoid;
  break-inside: avoid;
}
body { background: #fff !important; }
"#;

/// Print stylesheet for an assembled document.
pub fn stylesheet(page: PageSize) -> String {
    format!(
        r#"@page {{ size: {size}; margin: 72pt; }}
body {{ font-family: Helvetica, Arial, sans-serif; font-size: 11pt; line-height: 1.35; color: #000; }}
h1 {{ font-size: 18pt; margin: 0 0 6pt 0; }}
h2 {{ font-size: 14pt; margin: 14pt 0 6pt 0; page-break-after: avoid; break-after: avoid; }}
h3 {{ font-size: 12pt; margin: 10pt 0 4pt 0; page-break-after: avoid; break-after: avoid; }}
p {{ margin: 0 0 8pt 0; white-space: pre-wrap; }}
.meta {{ font-size: 9pt; color: #555; margin: 0 0 2pt 0; }}
.marker {{ font-family: Courier, monospace; font-size: 9pt; color: #333; margin: 4pt 0; }}
pre {{ font-family: Courier, "Courier New", monospace; font-size: 9.5pt; background: #f2f2f2;
      border: 1px solid #ccc; padding: 6pt; white-space: pre-wrap; word-break: break-all;
      page-break-inside: avoid; break-inside: avoid; }}
.label {{ font-weight: bold; font-size: 9pt; margin: 6pt 0 2pt 0; }}
.sample {{ page-break-inside: avoid; break-inside: avoid; margin: 8pt 0; }}
.sample.two-column {{ display: flex; gap: 12pt; }}
.sample.two-column > div {{ flex: 1 1 0; min-width: 0; }}
table {{ border-collapse: collapse; margin: 6pt 0 10pt 0; font-size: 10pt; }}
td {{ border: 1px solid #999; padding: 2pt 6pt; vertical-align: top; }}
figure {{ margin: 8pt 0; text-align: center; page-break-inside: avoid; break-inside: avoid; }}
figure img {{ max-width: 100%; max-height: 60vh; }}
figcaption {{ font-size: 9pt; color: #555; }}
hr {{ border: none; border-top: 1px solid #999; margin: 16pt 0 4pt 0; }}
"#,
        size = page.css_name()
    )
}

/// Serialise the document's blocks as a standalone HTML page.
pub fn document_to_html(doc: &Document) -> String {
    let mut out = String::with_capacity(4096);
    out.push_str("<!DOCTYPE html>\n<html lang=\"en\">\n<head>\n<meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "<title>{}</title>", encode_text(&doc.metadata.title));
    out.push_str("</head>\n<body>\n");

    for block in &doc.blocks {
        match &block.kind {
            BlockKind::Heading { level, text } => {
                let level = (*level).clamp(1, 6);
                let _ = writeln!(out, "<h{level}>{}</h{level}>", encode_text(text));
            }
            BlockKind::Paragraph { text } => {
                let _ = writeln!(out, "<p>{}</p>", encode_text(text));
            }
            BlockKind::Meta { text } => {
                let _ = writeln!(out, "<p class=\"meta\">{}</p>", encode_text(text));
            }
            BlockKind::Marker { text } => {
                let _ = writeln!(out, "<p class=\"marker\">{}</p>", encode_text(text));
            }
            BlockKind::Monospace { text, label } => {
                if let Some(label) = label {
                    let _ = writeln!(out, "<p class=\"label\">{}</p>", encode_text(label));
                }
                let _ = writeln!(out, "<pre>{}</pre>", encode_text(text));
            }
            BlockKind::SamplePair {
                index,
                input,
                output,
                layout,
            } => {
                let class = match layout {
                    SampleLayout::TwoColumn => "sample two-column",
                    SampleLayout::Stacked => "sample",
                };
                let _ = writeln!(
                    out,
                    "<div class=\"{class}\">\n<div><p class=\"label\">Sample Input {index}</p><pre>{}</pre></div>\n\
                     <div><p class=\"label\">Sample Output {index}</p><pre>{}</pre></div>\n</div>",
                    encode_text(input),
                    encode_text(output)
                );
            }
            BlockKind::Table { rows, .. } => {
                out.push_str("<table>\n");
                for row in rows {
                    out.push_str("<tr>");
                    for cell in row {
                        let _ = write!(out, "<td>{}</td>", encode_text(cell));
                    }
                    out.push_str("</tr>\n");
                }
                out.push_str("</table>\n");
            }
            BlockKind::Image {
                path, url, caption, ..
            } => {
                let src = image_src(path.as_deref(), url);
                let _ = write!(
                    out,
                    "<figure><img src=\"{}\" alt=\"{}\">",
                    encode_double_quoted_attribute(&src),
                    encode_double_quoted_attribute(caption)
                );
                if !caption.is_empty() {
                    let _ = write!(out, "<figcaption>{}</figcaption>", encode_text(caption));
                }
                out.push_str("</figure>\n");
            }
            BlockKind::Rule => out.push_str("<hr>\n"),
        }
    }

    out.push_str("</body>\n</html>\n");
    out
}

/// Prepare a fetched live page for capture: resolve relative links against
/// the page URL and append the page-size and chrome-suppression rules.
pub fn inject_capture_styles(page_html: &str, base_url: &str, page: PageSize) -> String {
    let head = format!(
        "<base href=\"{}\"><style>@page {{ size: {}; margin: 36pt; }}{}</style>",
        encode_double_quoted_attribute(base_url),
        page.css_name(),
        CHROME_SUPPRESSION_CSS
    );
    match find_ascii_ci(page_html, "<head") {
        Some(start) => match page_html[start..].find('>') {
            Some(rel) => {
                let at = start + rel + 1;
                format!("{}{}{}", &page_html[..at], head, &page_html[at..])
            }
            None => format!("{head}{page_html}"),
        },
        None => format!("<head>{head}</head>{page_html}"),
    }
}

/// Embed a single stylesheet into a standalone page.
pub fn with_stylesheet(html: &str, css: &str) -> String {
    let style = format!("<style>\n{css}</style>\n");
    match find_ascii_ci(html, "</head>") {
        Some(at) => format!("{}{}{}", &html[..at], style, &html[at..]),
        None => format!("{style}{html}"),
    }
}

fn image_src(path: Option<&Path>, url: &str) -> String {
    match path {
        Some(p) if p.is_absolute() => format!("file://{}", p.display()),
        Some(p) => match std::env::current_dir() {
            Ok(cwd) => format!("file://{}", cwd.join(p).display()),
            Err(_) => url.to_string(),
        },
        None => url.to_string(),
    }
}

fn find_ascii_ci(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}
