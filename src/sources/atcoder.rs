//! AtCoder task and editorial pages.
//!
//! Task pages carry both languages inside `#task-statement`; the English
//! block is preferred and the Japanese one used when it is missing.

use super::{
    assign_parts, editorial, find_limits, first, own_text, record_missing, split_by_headings,
    text_of, ProblemSource,
};
use crate::error::PipelineError;
use crate::model::{Platform, RawExtraction};
use scraper::Html;
use url::Url;

#[derive(Debug, Clone, Copy, Default)]
pub struct AtCoderSource;

impl ProblemSource for AtCoderSource {
    fn platform(&self) -> Platform {
        Platform::AtCoder
    }

    fn matches(&self, url: &Url) -> bool {
        let host = url.host_str().unwrap_or_default();
        if host != "atcoder.jp" && !host.ends_with(".atcoder.jp") {
            return false;
        }
        let segments: Vec<&str> = url.path_segments().map(|s| s.collect()).unwrap_or_default();
        matches!(segments.as_slice(), ["contests", _, "tasks", task, ..] if !task.is_empty())
            || matches!(segments.as_slice(), ["contests", _, "editorial", ..])
    }

    fn is_editorial(&self, url: &Url) -> bool {
        url.path().contains("/editorial")
    }

    fn extract(&self, page: &Html, url: &Url) -> RawExtraction {
        let root = page.root_element();
        let mut raw = RawExtraction::new(url.as_str(), Platform::AtCoder);

        // The title span also holds an "Editorial" button.
        raw.title = first(root, &["span.h2"])
            .map(own_text)
            .filter(|t| !t.is_empty())
            .or_else(|| first(root, &["#main-container h2", "h1"]).map(text_of))
            .unwrap_or_default();

        let limits_text = first(root, &["#main-container", "body"])
            .map(text_of)
            .unwrap_or_default();
        (raw.time_limit, raw.memory_limit) = find_limits(&limits_text);

        match first(root, &["#task-statement"]) {
            Some(statement) => {
                let body = first(statement, &[".lang-en", "span.lang-en", ".lang-ja"]).unwrap_or(statement);
                assign_parts(&split_by_headings(body), url, &mut raw);
            }
            None => raw.record_failure("statement", "#task-statement not found"),
        }

        record_missing(
            &mut raw,
            &["title", "statement", "constraints", "input_format", "output_format", "samples"],
        );
        raw
    }

    fn extract_editorial(&self, page: &Html, url: &Url) -> RawExtraction {
        let mut raw = editorial(
            Platform::AtCoder,
            page,
            url,
            &["#editorial .lang-en", "#main-container .lang-en", "#editorial", "#main-container"],
        );
        if let Some(title) = first(page.root_element(), &["span.h2", "#main-container h2"]).map(own_text) {
            if !title.is_empty() {
                raw.title = title;
                raw.failures
                    .retain(|f| !matches!(f, PipelineError::Extraction { field, .. } if field == "title"));
            }
        }
        raw
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Sample, SectionKind};

    const TASK: &str = r#"<!DOCTYPE html>
<html><head><title>A - Echo</title></head><body>
<div id="main-container">
  <span class="h2">A - Echo <a class="btn btn-default btn-sm" href="/contests/abc300/tasks/abc300_a/editorial">Editorial</a></span>
  <p>Time Limit: 2 sec / Memory Limit: 1024 MB</p>
  <div id="task-statement">
    <span class="lang">
      <span class="lang-ja"><p>配点 : 100 点</p><div class="part"><section><h3>問題文</h3><p>日本語</p></section></div></span>
      <span class="lang-en">
        <p>Score : <var>100</var> points</p>
        <div class="part"><section><h3>Problem Statement</h3>
          <p>You are given <var>N</var>. Print it twice.</p>
          <img src="//img.atcoder.jp/abc300/figure1.png" width="400" height="300">
        </section></div>
        <div class="part"><section><h3>Constraints</h3><ul><li><var>1 \leq N \leq 10^9</var></li></ul></section></div>
        <hr>
        <div class="io-style">
          <div class="part"><section><h3>Input</h3><p>Input is given in the following format:</p><pre><var>N</var></pre></section></div>
          <div class="part"><section><h3>Output</h3><p>Print the answer.</p></section></div>
        </div>
        <div class="part"><section><h3>Sample Input 1</h3><pre>5
</pre></section></div>
        <div class="part"><section><h3>Sample Output 1</h3><pre>55
</pre></section></div>
        <div class="part"><section><h3>Sample Input 2</h3><pre>12
</pre></section></div>
        <div class="part"><section><h3>Sample Output 2</h3><pre>1212
</pre></section></div>
      </span>
    </span>
  </div>
</div>
</body></html>"#;

    fn url(path: &str) -> Url {
        Url::parse(&format!("https://atcoder.jp{path}")).unwrap()
    }

    #[test]
    fn matches_task_and_editorial_urls() {
        let s = AtCoderSource;
        assert!(s.matches(&url("/contests/abc300/tasks/abc300_a")));
        assert!(s.matches(&url("/contests/abc300/editorial/6000")));
        assert!(s.is_editorial(&url("/contests/abc300/editorial/6000")));
        assert!(!s.matches(&url("/contests/abc300")));
        assert!(!s.matches(&Url::parse("https://codeforces.com/contests/1/tasks/a").unwrap()));
    }

    #[test]
    fn extracts_english_task() {
        let page = Html::parse_document(TASK);
        let raw = AtCoderSource.extract(&page, &url("/contests/abc300/tasks/abc300_a"));

        assert_eq!(raw.title, "A - Echo");
        assert_eq!(raw.time_limit.as_deref(), Some("2 seconds"));
        assert_eq!(raw.memory_limit.as_deref(), Some("1024 MB"));
        assert!(raw.statement_html.contains("Print it twice."));
        assert!(!raw.statement_html.contains("日本語"));
        assert!(raw.constraints_html.contains("10^9"));
        assert!(raw.input_format_html.contains("<pre>"));
        assert!(raw.output_format_html.contains("Print the answer."));
        assert_eq!(
            raw.samples,
            vec![Sample::new("5", "55"), Sample::new("12", "1212")]
        );
        assert_eq!(raw.images.len(), 1);
        assert_eq!(raw.images[0].url, "https://img.atcoder.jp/abc300/figure1.png");
        assert_eq!(raw.images[0].origin, Some(SectionKind::Statement));
        assert!(raw.failures.is_empty(), "{:?}", raw.failures);
    }

    #[test]
    fn japanese_only_page_still_extracts() {
        let html = r#"<html><body><span class="h2">B - 足し算</span>
            <div id="task-statement"><span class="lang-ja">
              <div class="part"><section><h3>問題文</h3><p>A+B を出力せよ。</p></section></div>
              <div class="part"><section><h3>制約</h3><ul><li>1 ≤ A</li></ul></section></div>
              <div class="part"><section><h3>入力例 1</h3><pre>1 2</pre></section></div>
              <div class="part"><section><h3>出力例 1</h3><pre>3</pre></section></div>
            </span></div></body></html>"#;
        let raw = AtCoderSource.extract(&Html::parse_document(html), &url("/contests/abc1/tasks/abc1_b"));
        assert_eq!(raw.title, "B - 足し算");
        assert!(raw.statement_html.contains("A+B"));
        assert!(raw.constraints_html.contains("1 ≤ A"));
        assert_eq!(raw.samples, vec![Sample::new("1 2", "3")]);
    }

    #[test]
    fn missing_statement_recorded_not_fatal() {
        let html = r#"<html><body><span class="h2">C - Gone</span></body></html>"#;
        let raw = AtCoderSource.extract(&Html::parse_document(html), &url("/contests/abc1/tasks/abc1_c"));
        assert_eq!(raw.title, "C - Gone");
        assert!(!raw.failures.is_empty());
        assert!(raw.samples.is_empty());
    }
}
