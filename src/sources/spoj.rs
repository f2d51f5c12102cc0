//! SPOJ problem pages.
//!
//! `#problem-body` is a flat run of `<h3>` headings and paragraphs; the
//! example is usually one `<pre>` holding both `Input:` and `Output:`.

use super::{assign_parts, find_limits, first, record_missing, split_by_headings, text_of, ProblemSource};
use crate::model::{Platform, RawExtraction};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::Html;
use url::Url;

static RE_PROBLEM_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/problems/[A-Za-z0-9_]+/?$").unwrap());

/// `CODE - Title` heading prefix.
static RE_CODE_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9_]+\s+-\s+").unwrap());

#[derive(Debug, Clone, Copy, Default)]
pub struct SpojSource;

impl ProblemSource for SpojSource {
    fn platform(&self) -> Platform {
        Platform::Spoj
    }

    fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        matches!(host, "spoj.com" | "www.spoj.com") && RE_PROBLEM_PATH.is_match(url.path())
    }

    fn extract(&self, page: &Html, url: &Url) -> RawExtraction {
        let root = page.root_element();
        let mut raw = RawExtraction::new(url.as_str(), Platform::Spoj);

        raw.title = first(root, &["#problem-name", "h2#problem-name", "h1"])
            .map(text_of)
            .map(|t| RE_CODE_PREFIX.replace(&t, "").into_owned())
            .unwrap_or_default();

        let meta = first(root, &["#problem-meta", "body"]).map(text_of).unwrap_or_default();
        (raw.time_limit, raw.memory_limit) = find_limits(&meta);

        match first(root, &["#problem-body", ".prob-content", ".prob"]) {
            Some(body) => assign_parts(&split_by_headings(body), url, &mut raw),
            None => raw.record_failure("statement", "#problem-body not found"),
        }

        record_missing(&mut raw, &["title", "statement", "samples"]);
        raw
    }
}
