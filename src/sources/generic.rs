//! Best-effort source for pages no platform source claims.

use super::{assign_parts, find_limits, first, split_by_headings, text_of, ProblemSource};
use crate::model::{Platform, RawExtraction};
use scraper::Html;
use url::Url;

const CONTAINERS: &[&str] = &[
    ".problem-statement",
    "#problem-statement",
    "article",
    "main",
    "#content",
    ".content",
    "body",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct GenericSource;

impl ProblemSource for GenericSource {
    fn platform(&self) -> Platform {
        Platform::Unknown
    }

    fn matches(&self, _url: &Url) -> bool {
        true
    }

    fn extract(&self, page: &Html, url: &Url) -> RawExtraction {
        let root = page.root_element();
        let mut raw = RawExtraction::new(url.as_str(), Platform::Unknown);
        raw.title = first(root, &["h1", "title"]).map(text_of).unwrap_or_default();

        let Some(container) = first(root, CONTAINERS) else {
            raw.record_failure("statement", "page has no body");
            return raw;
        };
        (raw.time_limit, raw.memory_limit) = find_limits(&text_of(container));

        let mut parts = split_by_headings(container);
        for part in &mut parts {
            // The page title usually repeats as the first heading.
            if part.heading == raw.title {
                part.heading.clear();
            }
            for tag in ["script", "style", "nav", "header", "footer"] {
                part.html = strip_element(&part.html, tag);
            }
        }
        assign_parts(&parts, url, &mut raw);

        if raw.title.is_empty() {
            raw.record_failure("title", "no <h1> or <title>");
        }
        raw
    }
}

/// Remove every `<tag>...</tag>` from serialized HTML.
fn strip_element(html: &str, tag: &str) -> String {
    let open = format!("<{tag}");
    let close = format!("</{tag}>");
    let mut out = String::with_capacity(html.len());
    let mut rest = html;
    while let Some(start) = rest.find(&open) {
        out.push_str(&rest[..start]);
        match rest[start..].find(&close) {
            Some(end) => rest = &rest[start + end + close.len()..],
            None => {
                rest = "";
            }
        }
    }
    out.push_str(rest);
    out
}
