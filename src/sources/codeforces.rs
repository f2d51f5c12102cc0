//! Codeforces problem pages (contest, problemset and gym) and blog
//! editorials.
//!
//! The statement lives in `div.problem-statement` with one child per part;
//! the first child is the header with the title and limits.

use super::{
    all, collect_images, editorial, first, html_excluding, pre_text, record_missing, text_of,
    ProblemSource,
};
use crate::error::PipelineError;
use crate::model::{Platform, RawExtraction, Sample, SectionKind};
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html};
use url::Url;

static RE_PROBLEM_PATH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^/(?:contest/\d+/problem/[A-Za-z0-9]+|problemset/problem/\d+/[A-Za-z0-9]+|gym/\d+/problem/[A-Za-z0-9]+)/?$")
        .unwrap()
});

static RE_BLOG_PATH: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/blog/entry/\d+/?$").unwrap());

/// Problem index prefix of the title ("A. ", "B1. ").
static RE_INDEX_PREFIX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z0-9]+\.\s*").unwrap());

const PART_CLASSES: &[&str] = &[
    ".header",
    ".input-specification",
    ".output-specification",
    ".sample-tests",
    ".note",
];

#[derive(Debug, Clone, Copy, Default)]
pub struct CodeforcesSource;

impl ProblemSource for CodeforcesSource {
    fn platform(&self) -> Platform {
        Platform::Codeforces
    }

    fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        let known = matches!(host, "codeforces.com" | "www.codeforces.com" | "m1.codeforces.com" | "m2.codeforces.com" | "m3.codeforces.com")
            || host == "codeforces.ml";
        known && (RE_PROBLEM_PATH.is_match(url.path()) || RE_BLOG_PATH.is_match(url.path()))
    }

    fn is_editorial(&self, url: &Url) -> bool {
        RE_BLOG_PATH.is_match(url.path())
    }

    fn extract(&self, page: &Html, url: &Url) -> RawExtraction {
        let mut raw = RawExtraction::new(url.as_str(), Platform::Codeforces);
        let Some(statement) = first(page.root_element(), &["div.problem-statement"]) else {
            raw.record_failure("statement", "div.problem-statement not found");
            raw.title = first(page.root_element(), &["title"]).map(text_of).unwrap_or_default();
            record_missing(&mut raw, &["title"]);
            return raw;
        };

        if let Some(title) = first(statement, &[".header .title"]) {
            raw.title = RE_INDEX_PREFIX.replace(&text_of(title), "").into_owned();
        }
        raw.time_limit = property(statement, ".header .time-limit");
        raw.memory_limit = property(statement, ".header .memory-limit");

        raw.statement_html = html_excluding(statement, PART_CLASSES);
        let body = Html::parse_fragment(&raw.statement_html);
        collect_images(body.root_element(), url, SectionKind::Statement, &mut raw.images);
        for (css, field, kind) in [
            (".input-specification", &mut raw.input_format_html, SectionKind::InputFormat),
            (".output-specification", &mut raw.output_format_html, SectionKind::OutputFormat),
            (".note", &mut raw.notes_html, SectionKind::Notes),
        ] {
            if let Some(part) = first(statement, &[css]) {
                *field = html_excluding(part, &[".section-title"]);
                collect_images(part, url, kind, &mut raw.images);
            }
        }

        raw.samples = samples(statement);
        record_missing(&mut raw, &["title", "statement", "input_format", "output_format", "samples"]);
        raw
    }

    fn extract_editorial(&self, page: &Html, url: &Url) -> RawExtraction {
        let mut raw = editorial(Platform::Codeforces, page, url, &[".ttypography", ".content"]);
        if let Some(title) = first(page.root_element(), &[".title a", ".title"]).map(text_of) {
            raw.title = title;
            raw.failures
                .retain(|f| !matches!(f, PipelineError::Extraction { field, .. } if field == "title"));
        }
        raw
    }
}

/// Limit text without its "time limit per test" label.
fn property(root: ElementRef<'_>, css: &str) -> Option<String> {
    let el = first(root, &[css])?;
    let label = first(el, &[".property-title"]).map(text_of).unwrap_or_default();
    let full = text_of(el);
    let value = full.strip_prefix(&label).unwrap_or(&full).trim();
    (!value.is_empty()).then(|| value.to_string())
}

fn samples(statement: ElementRef<'_>) -> Vec<Sample> {
    let Some(tests) = first(statement, &[".sample-tests", ".sample-test"]) else {
        return Vec::new();
    };
    let inputs: Vec<String> = all(tests, "div.input pre").into_iter().map(pre_text).collect();
    let outputs: Vec<String> = all(tests, "div.output pre").into_iter().map(pre_text).collect();
    (0..inputs.len().max(outputs.len()))
        .map(|i| {
            Sample::new(
                inputs.get(i).cloned().unwrap_or_default(),
                outputs.get(i).cloned().unwrap_or_default(),
            )
        })
        .filter(|s| !s.is_empty())
        .collect()
}
