//! Platform sources: turn a fetched problem page into a [`RawExtraction`].
//!
//! Each judge gets one [`ProblemSource`]; the [`SourceRegistry`] picks the
//! first whose URL patterns match and falls back to [`GenericSource`].
//! Sources never fail as a whole: a missing field is recorded in
//! [`RawExtraction::failures`] and the remaining fields are still returned.
//!
//! [`ScrapingProvider`] is the default [`ExtractionProvider`]: fetch, pick a
//! source, extract, then pre-filter and cache the statement images.

pub mod atcoder;
pub mod codechef;
pub mod codeforces;
pub mod generic;
pub mod spoj;

pub use atcoder::AtCoderSource;
pub use codechef::CodeChefSource;
pub use codeforces::CodeforcesSource;
pub use generic::GenericSource;
pub use spoj::SpojSource;

use crate::cache::ImageCache;
use crate::config::ConversionConfig;
use crate::error::PipelineError;
use crate::fallback::ExtractionProvider;
use crate::fetch::PageFetcher;
use crate::model::{ImageRef, Platform, RawExtraction, Sample, SectionKind};
use crate::pipeline::images::{self, ImageContext};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

// ── Source interface ─────────────────────────────────────────────────────

/// One judge's page layout.
pub trait ProblemSource: Send + Sync {
    fn platform(&self) -> Platform;

    /// True if this source understands `url`.
    fn matches(&self, url: &Url) -> bool;

    /// True if `url` points at an editorial rather than a problem.
    fn is_editorial(&self, url: &Url) -> bool {
        let _ = url;
        false
    }

    fn extract(&self, page: &Html, url: &Url) -> RawExtraction;

    /// Editorials are prose pages: title plus one body.
    fn extract_editorial(&self, page: &Html, url: &Url) -> RawExtraction {
        editorial(self.platform(), page, url, &[".editorial", "article", "main", "body"])
    }
}

// ── Registry ─────────────────────────────────────────────────────────────

/// URL-pattern keyed set of sources.
pub struct SourceRegistry {
    sources: Vec<Box<dyn ProblemSource>>,
    fallback: GenericSource,
}

impl Default for SourceRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl std::fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let platforms: Vec<_> = self.sources.iter().map(|s| s.platform()).collect();
        f.debug_struct("SourceRegistry")
            .field("sources", &platforms)
            .finish()
    }
}

impl SourceRegistry {
    /// Registry with only the generic fallback.
    pub fn empty() -> Self {
        Self {
            sources: Vec::new(),
            fallback: GenericSource,
        }
    }

    /// AtCoder, Codeforces, SPOJ and CodeChef.
    pub fn with_defaults() -> Self {
        let mut registry = Self::empty();
        registry.register(Box::new(AtCoderSource));
        registry.register(Box::new(CodeforcesSource));
        registry.register(Box::new(SpojSource));
        registry.register(Box::new(CodeChefSource));
        registry
    }

    pub fn register(&mut self, source: Box<dyn ProblemSource>) {
        self.sources.push(source);
    }

    /// Source for `url`; the generic one when nothing matches.
    pub fn resolve(&self, url: &Url) -> &dyn ProblemSource {
        self.sources
            .iter()
            .find(|s| s.matches(url))
            .map(|s| s.as_ref())
            .unwrap_or(&self.fallback)
    }

    /// True if a platform-specific source claims `url`.
    pub fn is_supported(&self, url: &Url) -> bool {
        self.sources.iter().any(|s| s.matches(url))
    }

    /// Parse `html` and run the matching source.
    pub fn extract_page(&self, html: &str, url: &Url) -> RawExtraction {
        let page = Html::parse_document(html);
        let source = self.resolve(url);
        let mut raw = if source.is_editorial(url) {
            source.extract_editorial(&page, url)
        } else {
            source.extract(&page, url)
        };
        raw.url = url.to_string();
        debug!(
            url = %url,
            platform = %raw.platform,
            samples = raw.samples.len(),
            images = raw.images.len(),
            failures = raw.failures.len(),
            "page extracted"
        );
        raw
    }
}

// ── Provider ─────────────────────────────────────────────────────────────

/// Fetch + scrape + image caching.
pub struct ScrapingProvider {
    fetcher: Arc<dyn PageFetcher>,
    registry: Arc<SourceRegistry>,
    cache: Option<Arc<ImageCache>>,
    include_images: bool,
    image_threshold: u32,
}

impl ScrapingProvider {
    pub fn new(fetcher: Arc<dyn PageFetcher>, registry: Arc<SourceRegistry>) -> Self {
        Self {
            fetcher,
            registry,
            cache: None,
            include_images: true,
            image_threshold: ConversionConfig::default().image_min_dimension,
        }
    }

    pub fn from_config(
        config: &ConversionConfig,
        fetcher: Arc<dyn PageFetcher>,
        registry: Arc<SourceRegistry>,
        cache: Arc<ImageCache>,
    ) -> Self {
        let mut provider = Self::new(fetcher, registry).with_image_cache(cache);
        provider.include_images = config.include_images;
        provider.image_threshold = config.image_min_dimension;
        provider
    }

    pub fn with_image_cache(mut self, cache: Arc<ImageCache>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn include_images(mut self, v: bool) -> Self {
        self.include_images = v;
        self
    }

    /// Drop decorative images, then download the rest into the cache.
    async fn attach_images(&self, raw: &mut RawExtraction) {
        let candidates = std::mem::take(&mut raw.images);
        if !self.include_images {
            return;
        }
        let ctx = ImageContext::new(raw.platform, self.image_threshold);
        let kept: Vec<ImageRef> = candidates
            .into_iter()
            .filter(|img| {
                images::is_relevant(
                    img,
                    &ImageContext {
                        section: img.origin,
                        ..ctx
                    },
                )
            })
            .collect();

        let Some(cache) = &self.cache else {
            raw.images = kept;
            return;
        };

        let fetched = futures::future::join_all(kept.iter().map(|img| cache.get(&img.url))).await;
        for (mut img, result) in kept.into_iter().zip(fetched) {
            match result {
                Ok(cached) => {
                    if let (None, Some((w, h))) = (img.width, cached.dimensions) {
                        img.width = Some(w);
                        img.height = Some(h);
                    }
                    img.local_path = Some(cached.path);
                    raw.images.push(img);
                }
                Err(e) => {
                    warn!(url = %img.url, error = %e, "image dropped");
                    raw.record_failure("image", e.to_string());
                }
            }
        }
    }
}

#[async_trait]
impl ExtractionProvider for ScrapingProvider {
    async fn extract(&self, url: &str) -> Result<RawExtraction, PipelineError> {
        let parsed = Url::parse(url).map_err(|e| PipelineError::Fetch {
            url: url.to_string(),
            reason: e.to_string(),
            status: None,
        })?;
        let html = self.fetcher.fetch_text(url).await?;
        let mut raw = self.registry.extract_page(&html, &parsed);
        self.attach_images(&mut raw).await;
        info!(
            url,
            platform = %raw.platform,
            images = raw.images.len(),
            partial = !raw.failures.is_empty(),
            "extraction finished"
        );
        Ok(raw)
    }
}

// ── DOM helpers ──────────────────────────────────────────────────────────

static RE_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").unwrap());

static RE_TIME_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)time\s*limit(?:\s*per\s*test)?\s*[:：]?\s*([0-9]+(?:\.[0-9]+)?)\s*(milliseconds?|ms|seconds?|secs?|s)",
    )
    .unwrap()
});

static RE_MEMORY_LIMIT: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)memory\s*limit(?:\s*per\s*test)?\s*[:：]?\s*([0-9]+(?:\.[0-9]+)?)\s*(megabytes|kilobytes|gigabytes|MiB|MB|KiB|KB|GiB|GB)",
    )
    .unwrap()
});

/// Parse a CSS selector; `None` for an invalid one.
pub(crate) fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

/// First element matching any of `selectors`, tried in order.
pub(crate) fn first<'a>(root: ElementRef<'a>, selectors: &[&str]) -> Option<ElementRef<'a>> {
    selectors
        .iter()
        .filter_map(|css| selector(css))
        .find_map(|sel| root.select(&sel).next())
}

pub(crate) fn all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => root.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// Whitespace-collapsed text of an element.
pub(crate) fn text_of(el: ElementRef<'_>) -> String {
    RE_WS
        .replace_all(&el.text().collect::<String>(), " ")
        .trim()
        .to_string()
}

/// Text of the element's own text children, ignoring nested elements.
pub(crate) fn own_text(el: ElementRef<'_>) -> String {
    let own: String = el
        .children()
        .filter_map(|n| n.value().as_text().map(|t| t.to_string()))
        .collect();
    RE_WS.replace_all(&own, " ").trim().to_string()
}

/// Verbatim text of a `<pre>`, with `<br>` and per-line `<div>`s as newlines.
pub(crate) fn pre_text(el: ElementRef<'_>) -> String {
    let mut out = String::new();
    for node in el.descendants() {
        if let Some(text) = node.value().as_text() {
            out.push_str(text);
        } else if let Some(child) = ElementRef::wrap(node) {
            match child.value().name() {
                "br" => out.push('\n'),
                "div" if !out.is_empty() && !out.ends_with('\n') => out.push('\n'),
                _ => {}
            }
        }
    }
    out.trim_matches('\n').to_string()
}

/// Inner HTML of `el` without the direct children matching `exclude`.
pub(crate) fn html_excluding(el: ElementRef<'_>, exclude: &[&str]) -> String {
    let selectors: Vec<Selector> = exclude.iter().filter_map(|css| selector(css)).collect();
    let mut out = String::new();
    for node in el.children() {
        if let Some(child) = ElementRef::wrap(node) {
            if selectors.iter().any(|s| s.matches(&child)) {
                continue;
            }
            out.push_str(&child.html());
        } else if let Some(text) = node.value().as_text() {
            out.push_str(&html_escape::encode_text(&text.to_string()));
        }
    }
    out
}

/// `(time_limit, memory_limit)` found anywhere in `text`.
pub(crate) fn find_limits(text: &str) -> (Option<String>, Option<String>) {
    let time = RE_TIME_LIMIT.captures(text).map(|c| {
        let n = &c[1];
        let unit = c[2].to_ascii_lowercase();
        if unit.starts_with("ms") || unit.starts_with("milli") {
            format!("{n} ms")
        } else if n == "1" {
            format!("{n} second")
        } else {
            format!("{n} seconds")
        }
    });
    let memory = RE_MEMORY_LIMIT.captures(text).map(|c| {
        let unit = match c[2].to_ascii_lowercase().as_str() {
            "megabytes" | "mb" => "MB",
            "mib" => "MiB",
            "kilobytes" | "kb" => "KB",
            "kib" => "KiB",
            "gigabytes" | "gb" => "GB",
            _ => "GiB",
        };
        format!("{} {unit}", &c[1])
    });
    (time, memory)
}

/// Absolute URL for an image reference found on `base`.
pub(crate) fn resolve_url(base: &Url, src: &str) -> Option<String> {
    let src = src.trim();
    if src.is_empty() {
        return None;
    }
    if src.starts_with("data:") {
        return Some(src.to_string());
    }
    let absolute = if let Some(rest) = src.strip_prefix("//") {
        Url::parse(&format!("https://{rest}")).ok()?
    } else {
        base.join(src).ok()?
    };
    matches!(absolute.scheme(), "http" | "https").then(|| absolute.to_string())
}

/// Source of an `<img>`: `src`, `data-src`, `data-original`, then the
/// first `srcset` candidate.
pub(crate) fn image_source(img: ElementRef<'_>) -> Option<&str> {
    let el = img.value();
    ["src", "data-src", "data-original"]
        .iter()
        .filter_map(|a| el.attr(a))
        .map(str::trim)
        .find(|s| !s.is_empty() && !s.starts_with("data:image/gif;base64,R0lGOD"))
        .or_else(|| {
            el.attr("srcset")
                .and_then(|s| s.split(',').next())
                .and_then(|s| s.split_whitespace().next())
        })
}

fn dimension_attr(img: ElementRef<'_>, name: &str) -> Option<u32> {
    img.value()
        .attr(name)
        .map(|v| v.trim().trim_end_matches("px"))
        .and_then(|v| v.parse().ok())
}

/// Every image under `root`, tagged with the field it was found in.
pub(crate) fn collect_images(root: ElementRef<'_>, base: &Url, origin: SectionKind, out: &mut Vec<ImageRef>) {
    for img in all(root, "img") {
        let Some(url) = image_source(img).and_then(|src| resolve_url(base, src)) else {
            continue;
        };
        if out.iter().any(|existing| existing.url == url) {
            continue;
        }
        let mut image = ImageRef::new(url).with_origin(origin);
        image.alt = img.value().attr("alt").unwrap_or_default().trim().to_string();
        if let (Some(w), Some(h)) = (dimension_attr(img, "width"), dimension_attr(img, "height")) {
            image = image.with_dimensions(w, h);
        }
        out.push(image);
    }
}

// ── Heading-delimited pages ──────────────────────────────────────────────

/// A run of content under one heading.
#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct Part {
    pub heading: String,
    pub html: String,
}

fn is_heading(name: &str) -> bool {
    matches!(name, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Split `root` into parts at every heading, descending into wrapper
/// elements that themselves contain headings.
pub(crate) fn split_by_headings(root: ElementRef<'_>) -> Vec<Part> {
    let mut parts = Vec::new();
    split_into(root, &mut parts);
    parts.retain(|p| !p.heading.is_empty() || !p.html.trim().is_empty());
    parts
}

fn split_into(el: ElementRef<'_>, parts: &mut Vec<Part>) {
    let headings = selector("h1, h2, h3, h4, h5, h6");
    for node in el.children() {
        if let Some(child) = ElementRef::wrap(node) {
            let name = child.value().name();
            if is_heading(name) {
                parts.push(Part {
                    heading: text_of(child),
                    html: String::new(),
                });
                continue;
            }
            let wraps_headings = matches!(name, "div" | "section" | "article" | "span")
                && headings
                    .as_ref()
                    .is_some_and(|sel| child.select(sel).next().is_some());
            if wraps_headings {
                split_into(child, parts);
                continue;
            }
            current(parts).html.push_str(&child.html());
        } else if let Some(text) = node.value().as_text() {
            if !text.trim().is_empty() {
                current(parts)
                    .html
                    .push_str(&html_escape::encode_text(&text.to_string()));
            }
        }
    }
}

fn current(parts: &mut Vec<Part>) -> &mut Part {
    if parts.is_empty() {
        parts.push(Part::default());
    }
    let last = parts.len() - 1;
    &mut parts[last]
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartKind {
    Statement,
    Constraints,
    Input,
    Output,
    Samples { input: bool, output: bool },
    Notes,
}

fn part_kind(heading: &str) -> PartKind {
    let h = heading.to_lowercase();
    let says_input = h.contains("input") || h.contains("入力");
    let says_output = h.contains("output") || h.contains("出力");
    if h.contains("sample") || h.contains("example") || h.contains("例") {
        PartKind::Samples {
            input: says_input,
            output: says_output,
        }
    } else if h.contains("constraint") || h.contains("subtask") || h.contains("制約") {
        PartKind::Constraints
    } else if says_input {
        PartKind::Input
    } else if says_output {
        PartKind::Output
    } else if h.contains("note") || h.contains("explanation") || h.contains("hint") || h.contains("注意") {
        PartKind::Notes
    } else {
        PartKind::Statement
    }
}

/// Headings that only restate "this is the statement".
fn is_statement_heading(heading: &str) -> bool {
    let h = heading.trim().to_lowercase();
    h.is_empty() || matches!(h.as_str(), "problem statement" | "statement" | "problem" | "task" | "問題文")
}

/// Split a combined SPOJ-style block (`Input:` ... `Output:` ...).
pub(crate) fn split_io_block(text: &str) -> Option<(String, String)> {
    let lower = text.to_lowercase();
    let i = lower.find("input:")?;
    let o = lower.find("output:")?;
    if o < i {
        return None;
    }
    let input = text[i + "input:".len()..o].trim_matches(['\n', ' ']).to_string();
    let output = text[o + "output:".len()..].trim_matches(['\n', ' ']).to_string();
    Some((input, output))
}

/// Distribute heading-delimited parts over the extraction fields.
pub(crate) fn assign_parts(parts: &[Part], base: &Url, raw: &mut RawExtraction) {
    let mut inputs: Vec<String> = Vec::new();
    let mut outputs: Vec<String> = Vec::new();

    for part in parts {
        let fragment = Html::parse_fragment(&part.html);
        let root = fragment.root_element();
        match part_kind(&part.heading) {
            PartKind::Samples { input, output } => {
                let pres: Vec<String> = all(root, "pre").into_iter().map(pre_text).collect();
                match (input, output, pres.as_slice()) {
                    (true, false, [first, ..]) => inputs.push(first.clone()),
                    (false, true, [first, ..]) => outputs.push(first.clone()),
                    (_, _, [single]) => match split_io_block(single) {
                        Some((i, o)) => raw.samples.push(Sample::new(i, o)),
                        None => inputs.push(single.clone()),
                    },
                    (_, _, [i, o, ..]) => raw.samples.push(Sample::new(i.clone(), o.clone())),
                    _ => {}
                }
                let explanation = html_excluding(root, &["pre", "h1", "h2", "h3", "h4", "h5", "h6"]);
                if !Html::parse_fragment(&explanation)
                    .root_element()
                    .text()
                    .all(|t| t.trim().is_empty())
                {
                    raw.notes_html.push_str(&explanation);
                }
                collect_images(root, base, SectionKind::Notes, &mut raw.images);
            }
            kind => {
                let (field, origin) = match kind {
                    PartKind::Constraints => (&mut raw.constraints_html, SectionKind::Constraints),
                    PartKind::Input => (&mut raw.input_format_html, SectionKind::InputFormat),
                    PartKind::Output => (&mut raw.output_format_html, SectionKind::OutputFormat),
                    PartKind::Notes => (&mut raw.notes_html, SectionKind::Notes),
                    _ => (&mut raw.statement_html, SectionKind::Statement),
                };
                if origin == SectionKind::Statement && !is_statement_heading(&part.heading) {
                    field.push_str(&format!("<p>{}</p>", html_escape::encode_text(&part.heading)));
                }
                field.push_str(&part.html);
                collect_images(root, base, origin, &mut raw.images);
            }
        }
    }

    let pending = inputs.len().max(outputs.len());
    for i in 0..pending {
        raw.samples.push(Sample::new(
            inputs.get(i).cloned().unwrap_or_default(),
            outputs.get(i).cloned().unwrap_or_default(),
        ));
    }
}

/// Record a failure for every core field a source left empty.
pub(crate) fn record_missing(raw: &mut RawExtraction, fields: &[&str]) {
    for field in fields {
        let empty = match *field {
            "title" => raw.title.trim().is_empty(),
            "statement" => raw.statement_html.trim().is_empty(),
            "constraints" => raw.constraints_html.trim().is_empty(),
            "input_format" => raw.input_format_html.trim().is_empty(),
            "output_format" => raw.output_format_html.trim().is_empty(),
            "samples" => raw.samples.is_empty(),
            _ => false,
        };
        if empty {
            raw.record_failure(field, "not found on page");
        }
    }
}

/// Editorial pages: title plus the first matching body container.
pub(crate) fn editorial(platform: Platform, page: &Html, url: &Url, bodies: &[&str]) -> RawExtraction {
    let root = page.root_element();
    let mut raw = RawExtraction::new(url.as_str(), platform);
    raw.is_editorial = true;
    raw.title = first(root, &["h1", ".title", "title"])
        .map(text_of)
        .unwrap_or_default();
    match first(root, bodies) {
        Some(body) => {
            raw.statement_html = html_excluding(body, &["script", "style", "nav", "header", "footer"]);
            collect_images(body, url, SectionKind::Statement, &mut raw.images);
        }
        None => raw.record_failure("statement", "editorial body not found"),
    }
    record_missing(&mut raw, &["title"]);
    raw
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> Url {
        Url::parse("https://atcoder.jp/contests/abc300/tasks/abc300_a").unwrap()
    }

    #[test]
    fn resolves_protocol_relative_and_relative_urls() {
        assert_eq!(
            resolve_url(&base(), "//img.atcoder.jp/abc300/a.png").as_deref(),
            Some("https://img.atcoder.jp/abc300/a.png")
        );
        assert_eq!(
            resolve_url(&base(), "/img/x.png").as_deref(),
            Some("https://atcoder.jp/img/x.png")
        );
        assert_eq!(
            resolve_url(&base(), "fig.png").as_deref(),
            Some("https://atcoder.jp/contests/abc300/tasks/fig.png")
        );
        assert_eq!(resolve_url(&base(), "javascript:void(0)"), None);
        assert_eq!(resolve_url(&base(), "  "), None);
    }

    #[test]
    fn image_source_fallback_chain() {
        let page = Html::parse_fragment(
            r#"<img data-src="/lazy.png"><img srcset="/a-1x.png 1x, /a-2x.png 2x"><img src="/direct.png" data-src="/other.png">"#,
        );
        let mut out = Vec::new();
        collect_images(page.root_element(), &base(), SectionKind::Statement, &mut out);
        let urls: Vec<_> = out.iter().map(|i| i.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://atcoder.jp/lazy.png",
                "https://atcoder.jp/a-1x.png",
                "https://atcoder.jp/direct.png"
            ]
        );
        assert!(out.iter().all(|i| i.origin == Some(SectionKind::Statement)));
    }

    #[test]
    fn dimension_attributes_parsed() {
        let page = Html::parse_fragment(r#"<img src="/f.png" width="320px" height="200" alt=" graph ">"#);
        let mut out = Vec::new();
        collect_images(page.root_element(), &base(), SectionKind::Notes, &mut out);
        assert_eq!(out[0].width, Some(320));
        assert_eq!(out[0].height, Some(200));
        assert_eq!(out[0].alt, "graph");
    }

    #[test]
    fn pre_text_keeps_line_divs() {
        let page = Html::parse_fragment(
            r#"<pre><div class="test-example-line">3</div><div class="test-example-line">1 2 3</div></pre>"#,
        );
        let pre = all(page.root_element(), "pre")[0];
        assert_eq!(pre_text(pre), "3\n1 2 3");
    }

    #[test]
    fn limits_from_text() {
        assert_eq!(
            find_limits("Time Limit: 2 sec / Memory Limit: 1024 MiB"),
            (Some("2 seconds".into()), Some("1024 MiB".into()))
        );
        assert_eq!(
            find_limits("time limit per test1 second memory limit per test256 megabytes"),
            (Some("1 second".into()), Some("256 MB".into()))
        );
        assert_eq!(find_limits("Time limit:1.5s Memory limit:1536MB").0, Some("1.5 seconds".into()));
        assert_eq!(find_limits("nothing here"), (None, None));
    }

    #[test]
    fn heading_split_assigns_fields_and_samples() {
        let page = Html::parse_fragment(
            r#"<div>
                <p>Score: 100 points</p>
                <div class="part"><section><h3>Problem Statement</h3><p>Print <var>A+B</var>.</p></section></div>
                <div class="part"><section><h3>Constraints</h3><ul><li><var>1 \leq A \leq 5</var></li></ul></section></div>
                <div class="part"><section><h3>Input</h3><pre><var>A</var> <var>B</var></pre></section></div>
                <div class="part"><section><h3>Output</h3><p>Print the sum.</p></section></div>
                <div class="part"><section><h3>Sample Input 1</h3><pre>1 2
</pre></section></div>
                <div class="part"><section><h3>Sample Output 1</h3><pre>3
</pre><p>1+2=3.</p></section></div>
            </div>"#,
        );
        let parts = split_by_headings(page.root_element());
        let mut raw = RawExtraction::new(base().as_str(), Platform::AtCoder);
        assign_parts(&parts, &base(), &mut raw);

        assert!(raw.statement_html.contains("Score: 100 points"));
        assert!(raw.statement_html.contains("Print <var>A+B</var>."));
        assert!(!raw.statement_html.contains("Problem Statement"));
        assert!(raw.constraints_html.contains("1 \\leq A \\leq 5"));
        assert!(raw.input_format_html.contains("<pre>"));
        assert!(raw.output_format_html.contains("Print the sum."));
        assert_eq!(raw.samples, vec![Sample::new("1 2", "3")]);
        assert!(raw.notes_html.contains("1+2=3."));
    }

    #[test]
    fn combined_io_block_split() {
        assert_eq!(
            split_io_block("Input:\n1\n2\n42\n\nOutput:\n1\n2"),
            Some(("1\n2\n42".into(), "1\n2".into()))
        );
        assert_eq!(split_io_block("just text"), None);
    }

    #[test]
    fn registry_falls_back_to_generic() {
        let registry = SourceRegistry::with_defaults();
        let cf = Url::parse("https://codeforces.com/problemset/problem/4/A").unwrap();
        let other = Url::parse("https://judge.example.org/p/1").unwrap();
        assert_eq!(registry.resolve(&cf).platform(), Platform::Codeforces);
        assert!(registry.is_supported(&cf));
        assert_eq!(registry.resolve(&other).platform(), Platform::Unknown);
        assert!(!registry.is_supported(&other));
    }
}
