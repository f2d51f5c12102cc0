//! CodeChef practice/contest problems and discuss-forum editorials.
//!
//! CodeChef has reshuffled its markup several times, so the statement
//! container is found through a list of known selectors and then split
//! at its headings.

use super::{
    assign_parts, editorial, find_limits, first, record_missing, split_by_headings, text_of,
    ProblemSource,
};
use crate::model::{Platform, RawExtraction};
use scraper::Html;
use url::Url;

const STATEMENT_SELECTORS: &[&str] = &[
    "#problem-statement",
    ".problem-statement",
    "[class*='problemStatement']",
    ".problem-statement-string",
    ".problem-description",
    ".prob",
    ".content .prose",
    ".problem-content",
];

const TITLE_SELECTORS: &[&str] = &["h1.problem-title", "[class*='problemTitle']", "#problem-code", "h1"];

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeChefSource;

impl CodeChefSource {
    fn problem_code(url: &Url) -> Option<String> {
        let segments: Vec<&str> = url.path_segments()?.filter(|s| !s.is_empty()).collect();
        match segments.as_slice() {
            ["problems", code] | [_, "problems", code] => Some(code.to_string()),
            _ => None,
        }
    }
}

impl ProblemSource for CodeChefSource {
    fn platform(&self) -> Platform {
        Platform::CodeChef
    }

    fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        if host == "discuss.codechef.com" {
            return true;
        }
        matches!(host, "codechef.com" | "www.codechef.com")
            && (Self::problem_code(url).is_some() || self.is_editorial(url))
    }

    fn is_editorial(&self, url: &Url) -> bool {
        url.host_str() == Some("discuss.codechef.com") || url.path().starts_with("/discuss/")
    }

    fn extract(&self, page: &Html, url: &Url) -> RawExtraction {
        let root = page.root_element();
        let mut raw = RawExtraction::new(url.as_str(), Platform::CodeChef);

        raw.title = TITLE_SELECTORS
            .iter()
            .filter_map(|css| first(root, &[*css]))
            .map(text_of)
            .find(|t| !t.is_empty() && t != "CodeChef")
            .or_else(|| Self::problem_code(url).map(|code| format!("Problem {code}")))
            .unwrap_or_default();

        let text = first(root, &["body"]).map(text_of).unwrap_or_default();
        (raw.time_limit, raw.memory_limit) = find_limits(&text);

        match first(root, STATEMENT_SELECTORS) {
            Some(statement) => assign_parts(&split_by_headings(statement), url, &mut raw),
            None => raw.record_failure("statement", "no known statement container"),
        }

        record_missing(&mut raw, &["title", "statement", "input_format", "output_format", "samples"]);
        raw
    }

    fn extract_editorial(&self, page: &Html, url: &Url) -> RawExtraction {
        editorial(
            Platform::CodeChef,
            page,
            url,
            &[".discussion-content", ".post-content", ".editorial-content", ".cooked", "article"],
        )
    }
}
