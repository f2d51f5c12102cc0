//! Integration tests for the fallback controller and the normalization
//! pipeline.
//!
//! Every collaborator is replaced by an in-process fake, so these tests need
//! neither network access nor a browser and always run.
//!
//! Run with:
//!   cargo test --test pipeline -- --nocapture

use async_trait::async_trait;
use cp2pdf::render::LopdfWriter;
use cp2pdf::{
    convert_many_with, convert_stream_with, convert_to_file_with, convert_with, CaptureOptions, Collaborators,
    ControllerState, ConversionConfig, ConversionProgressCallback, Cp2PdfError, Document, ExtractionProvider,
    FinalStatus, GenerationMode, GenerationPreference, HtmlRenderer, PageCapture, PageSize, PdfWriter,
    PipelineError, Platform, RawExtraction, Sample, SectionKind,
};
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

// ── Fakes ────────────────────────────────────────────────────────────────────

/// Returns a fixed extraction, with `url` filled in, and counts calls.
struct FixedExtractor {
    raw: Result<RawExtraction, PipelineError>,
    calls: AtomicUsize,
}

impl FixedExtractor {
    fn ok(raw: RawExtraction) -> Arc<Self> {
        Arc::new(Self {
            raw: Ok(raw),
            calls: AtomicUsize::new(0),
        })
    }

    fn err(e: PipelineError) -> Arc<Self> {
        Arc::new(Self {
            raw: Err(e),
            calls: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl ExtractionProvider for FixedExtractor {
    async fn extract(&self, url: &str) -> Result<RawExtraction, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut raw = self.raw.clone()?;
        raw.url = url.to_string();
        Ok(raw)
    }
}

/// A browser capture that either crashes or is not installed.
struct FakeCapture {
    installed: bool,
    calls: AtomicUsize,
    suppress_flags: Mutex<Vec<bool>>,
}

impl FakeCapture {
    fn crashing() -> Arc<Self> {
        Arc::new(Self {
            installed: true,
            calls: AtomicUsize::new(0),
            suppress_flags: Mutex::new(Vec::new()),
        })
    }

    fn missing() -> Arc<Self> {
        Arc::new(Self {
            installed: false,
            calls: AtomicUsize::new(0),
            suppress_flags: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl PageCapture for FakeCapture {
    async fn capture(&self, _url: &str, opts: &CaptureOptions) -> Result<Vec<u8>, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.suppress_flags.lock().unwrap().push(opts.suppress_chrome);
        if !self.installed {
            return Err(PipelineError::unavailable("chrome"));
        }
        Err(PipelineError::Render {
            renderer: "chrome".to_string(),
            reason: "target crashed".to_string(),
        })
    }
}

/// Captures and HTML renders that always succeed with a stub PDF.
struct WorkingBrowser;

#[async_trait]
impl PageCapture for WorkingBrowser {
    async fn capture(&self, _url: &str, _opts: &CaptureOptions) -> Result<Vec<u8>, PipelineError> {
        Ok(b"%PDF-1.7 exact".to_vec())
    }
}

#[async_trait]
impl HtmlRenderer for WorkingBrowser {
    async fn render(&self, html: &str, _css: &str) -> Result<Vec<u8>, PipelineError> {
        assert!(html.contains("<html"), "renderer received a full page");
        Ok(b"%PDF-1.7 structured".to_vec())
    }
}

struct MissingHtmlRenderer;

#[async_trait]
impl HtmlRenderer for MissingHtmlRenderer {
    async fn render(&self, _html: &str, _css: &str) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::unavailable("chrome"))
    }
}

/// A writer that fails on everything, to exercise the emergency path.
struct BrokenWriter;

impl PdfWriter for BrokenWriter {
    fn write(&self, _doc: &Document) -> Result<Vec<u8>, PipelineError> {
        Err(PipelineError::Render {
            renderer: "lopdf".to_string(),
            reason: "disk full".to_string(),
        })
    }
}

#[derive(Default)]
struct CountingCallback {
    started: AtomicUsize,
    completed: AtomicUsize,
    transitions: AtomicUsize,
    batch_done: AtomicUsize,
}

impl ConversionProgressCallback for CountingCallback {
    fn on_document_start(&self, _url: &str) {
        self.started.fetch_add(1, Ordering::SeqCst);
    }

    fn on_transition(&self, _url: &str, _from: &str, _to: &str, _reason: &str) {
        self.transitions.fetch_add(1, Ordering::SeqCst);
    }

    fn on_document_complete(&self, _url: &str, _status: &str, _pdf_len: usize) {
        self.completed.fetch_add(1, Ordering::SeqCst);
    }

    fn on_batch_complete(&self, _total: usize, done_count: usize) {
        self.batch_done.store(done_count, Ordering::SeqCst);
    }
}

// ── Helpers ──────────────────────────────────────────────────────────────────

const URL: &str = "https://atcoder.jp/contests/abc300/tasks/abc300_a";

fn problem() -> RawExtraction {
    let mut raw = RawExtraction::new(URL, Platform::AtCoder);
    raw.title = "A - N-choice question".to_string();
    raw.statement_html = "<p>Given integers <var>A</var> and <var>B</var>, print their sum.</p>".to_string();
    raw.constraints_html = r"<ul><li>$1 \leq A, B \leq 100$</li></ul>".to_string();
    raw.input_format_html = "<pre><var>A</var> <var>B</var></pre>".to_string();
    raw.output_format_html = "<p>Print the answer.</p>".to_string();
    raw.samples.push(Sample::new("1 2", "3"));
    raw.time_limit = Some("2 seconds".to_string());
    raw.memory_limit = Some("1024 MiB".to_string());
    raw
}

/// Browser-less collaborators: only the built-in writer works.
fn offline(extractor: Arc<FixedExtractor>) -> Collaborators {
    Collaborators {
        extractor,
        capture: FakeCapture::missing(),
        html: Arc::new(MissingHtmlRenderer),
        writer: Arc::new(LopdfWriter::new(PageSize::A4)),
    }
}

fn config(mode: GenerationPreference) -> ConversionConfig {
    ConversionConfig::builder()
        .mode(mode)
        .fetch_timeout_secs(5)
        .render_timeout_secs(5)
        .build()
        .unwrap()
}

fn is_pdf(bytes: &[u8]) -> bool {
    bytes.starts_with(b"%PDF")
}

// ── Normalization scenarios ──────────────────────────────────────────────────

#[tokio::test]
async fn leq_chain_in_constraints_becomes_unicode() {
    let mut raw = RawExtraction::new(URL, Platform::AtCoder);
    raw.title = "A".to_string();
    raw.constraints_html = r"1 \leq T \leq 5".to_string();
    let collab = offline(FixedExtractor::ok(raw));

    let out = convert_with(URL, &config(GenerationPreference::Assembled), &collab).await.unwrap();

    let doc = out.document.expect("assembled document");
    let constraints: Vec<_> = doc.sections.iter().filter(|s| s.kind == SectionKind::Constraints).collect();
    assert_eq!(constraints.len(), 1);
    assert_eq!(constraints[0].content, "1 ≤ T ≤ 5");
    assert!(!doc.to_plain_text().contains("\\leq"));
}

#[tokio::test]
async fn vdots_in_sample_output_becomes_vertical_ellipsis() {
    let mut raw = problem();
    raw.samples = vec![Sample::new("5", "1\n2\n\\vdots\n5")];
    let collab = offline(FixedExtractor::ok(raw));

    let out = convert_with(URL, &config(GenerationPreference::Assembled), &collab).await.unwrap();

    let doc = out.document.unwrap();
    let output = doc
        .sections
        .iter()
        .find(|s| s.kind == SectionKind::SampleOutput)
        .expect("sample output section");
    assert!(output.content.contains('⋮'), "got {:?}", output.content);
    assert!(!output.content.contains("vdots"));
}

#[tokio::test]
async fn broken_markup_is_repaired_before_layout() {
    let mut raw = RawExtraction::new(URL, Platform::AtCoder);
    raw.title = "Score".to_string();
    raw.statement_html = r#"<span class = "lang - en"> <var>800< / var> points"#.to_string();
    let collab = offline(FixedExtractor::ok(raw));

    let out = convert_with(URL, &config(GenerationPreference::Assembled), &collab).await.unwrap();

    let text = out.document.unwrap().to_plain_text();
    assert!(text.contains("800 points"), "got {text:?}");
    assert!(!text.contains("< /"));
    assert!(!text.contains("lang - en"));
}

#[tokio::test]
async fn empty_statement_still_yields_constraints_and_samples() {
    let mut raw = RawExtraction::new(URL, Platform::AtCoder);
    raw.title = "B".to_string();
    raw.constraints_html = r"1 \leq T \leq 5".to_string();
    raw.samples.push(Sample::new("5", "120"));
    let collab = offline(FixedExtractor::ok(raw));

    let out = convert_with(URL, &config(GenerationPreference::Assembled), &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::Done);
    assert_eq!(out.mode, Some(GenerationMode::Assembled));
    let doc = out.document.unwrap();
    let kinds: Vec<_> = doc.content_sections().map(|s| s.kind).collect();
    assert!(!kinds.contains(&SectionKind::Statement));
    assert!(kinds.contains(&SectionKind::Constraints));
    assert!(kinds.contains(&SectionKind::SampleInput));
    assert!(kinds.contains(&SectionKind::SampleOutput));
    assert!(is_pdf(&out.pdf));
}

#[tokio::test]
async fn semantic_markers_wrap_sections() {
    let collab = offline(FixedExtractor::ok(problem()));
    let config = ConversionConfig::builder()
        .mode(GenerationPreference::Assembled)
        .semantic_markers(true)
        .build()
        .unwrap();

    let out = convert_with(URL, &config, &collab).await.unwrap();

    let text = out.document.unwrap().to_plain_text();
    for marker in ["[CONSTRAINTS]", "[/CONSTRAINTS]", "[PROBLEM_STATEMENT]", "[/PROBLEM_STATEMENT]"] {
        assert!(text.contains(marker), "missing {marker} in {text}");
    }
    let open = text.find("[CONSTRAINTS]").unwrap();
    let close = text.find("[/CONSTRAINTS]").unwrap();
    assert!(open < close);
}

#[tokio::test]
async fn markers_absent_by_default() {
    let collab = offline(FixedExtractor::ok(problem()));
    let out = convert_with(URL, &config(GenerationPreference::Assembled), &collab).await.unwrap();
    assert!(!out.document.unwrap().to_plain_text().contains("[CONSTRAINTS]"));
}

// ── Fallback controller ──────────────────────────────────────────────────────

#[tokio::test]
async fn exact_capture_wins_when_browser_works() {
    let extractor = FixedExtractor::ok(problem());
    let collab = Collaborators {
        extractor: extractor.clone(),
        capture: Arc::new(WorkingBrowser),
        html: Arc::new(WorkingBrowser),
        writer: Arc::new(LopdfWriter::new(PageSize::A4)),
    };

    let out = convert_with(URL, &config(GenerationPreference::Exact), &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::Done);
    assert_eq!(out.mode, Some(GenerationMode::Exact));
    assert!(out.transitions.is_empty());
    assert!(out.document.is_none());
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0, "exact capture needs no scraping");
}

#[tokio::test]
async fn structured_html_used_when_capture_missing() {
    let collab = Collaborators {
        extractor: FixedExtractor::ok(problem()),
        capture: FakeCapture::missing(),
        html: Arc::new(WorkingBrowser),
        writer: Arc::new(LopdfWriter::new(PageSize::A4)),
    };

    let out = convert_with(URL, &config(GenerationPreference::Exact), &collab).await.unwrap();

    assert_eq!(out.mode, Some(GenerationMode::StructuredHtml));
    assert_eq!(out.transitions.len(), 1);
    assert_eq!(out.transitions[0].from, ControllerState::TryExact);
    assert_eq!(out.transitions[0].to, ControllerState::TryStructuredHtml);
}

#[tokio::test]
async fn falls_through_to_assembled_and_records_transitions() {
    let extractor = FixedExtractor::ok(problem());
    let capture = FakeCapture::missing();
    let collab = Collaborators {
        extractor: extractor.clone(),
        capture: capture.clone(),
        html: Arc::new(MissingHtmlRenderer),
        writer: Arc::new(LopdfWriter::new(PageSize::A4)),
    };

    let out = convert_with(URL, &config(GenerationPreference::Exact), &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::Done);
    assert_eq!(out.mode, Some(GenerationMode::Assembled));
    let path: Vec<_> = out.transitions.iter().map(|t| (t.from, t.to)).collect();
    assert_eq!(
        path,
        vec![
            (ControllerState::TryExact, ControllerState::TryStructuredHtml),
            (ControllerState::TryStructuredHtml, ControllerState::TryAssembled),
        ]
    );
    assert!(out.fell_back());
    assert!(is_pdf(&out.pdf));
    // A missing browser is not retried, and the page is scraped once.
    assert_eq!(capture.calls.load(Ordering::SeqCst), 1);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn crashed_capture_is_retried_once_without_chrome_suppression() {
    let capture = FakeCapture::crashing();
    let collab = Collaborators {
        extractor: FixedExtractor::ok(problem()),
        capture: capture.clone(),
        html: Arc::new(MissingHtmlRenderer),
        writer: Arc::new(LopdfWriter::new(PageSize::A4)),
    };

    let out = convert_with(URL, &config(GenerationPreference::Exact), &collab).await.unwrap();

    assert_eq!(capture.calls.load(Ordering::SeqCst), 2);
    assert_eq!(*capture.suppress_flags.lock().unwrap(), vec![true, false]);
    assert_eq!(out.transitions[0].from, ControllerState::TryExact);
    assert_eq!(out.transitions[0].to, ControllerState::TryExact);
    assert_eq!(out.transitions[1].to, ControllerState::TryStructuredHtml);
    assert_eq!(out.mode, Some(GenerationMode::Assembled));
}

#[tokio::test]
async fn mandatory_exact_goes_straight_to_error_document() {
    let extractor = FixedExtractor::ok(problem());
    let collab = Collaborators {
        extractor: extractor.clone(),
        capture: FakeCapture::missing(),
        html: Arc::new(WorkingBrowser),
        writer: Arc::new(LopdfWriter::new(PageSize::A4)),
    };
    let config = ConversionConfig::builder()
        .mode(GenerationPreference::Exact)
        .exact_mandatory(true)
        .build()
        .unwrap();

    let out = convert_with(URL, &config, &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::ErrorDocument);
    assert_eq!(out.mode, None);
    assert_eq!(out.transitions.len(), 1);
    assert_eq!(out.transitions[0].to, ControllerState::ErrorDocument);
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 0);
    assert!(is_pdf(&out.pdf));
}

#[tokio::test]
async fn empty_extraction_produces_error_document() {
    let collab = offline(FixedExtractor::ok(RawExtraction::new(URL, Platform::AtCoder)));

    let out = convert_with(URL, &config(GenerationPreference::Structured), &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::ErrorDocument);
    assert!(is_pdf(&out.pdf));
    let doc = out.document.as_ref().unwrap();
    assert!(doc.is_error_document());
    let text = doc.to_plain_text();
    assert!(text.contains(URL));
    assert!(out.last_reason().is_some_and(|r| r.contains("no extractable content")));
}

#[tokio::test]
async fn fetch_failure_is_named_in_error_document() {
    let extractor = FixedExtractor::err(PipelineError::Fetch {
        url: URL.to_string(),
        reason: "HTTP 404".to_string(),
        status: Some(404),
    });
    let collab = offline(extractor.clone());

    let out = convert_with(URL, &config(GenerationPreference::Structured), &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::ErrorDocument);
    assert!(out.document.unwrap().metadata.failure_reason.unwrap().contains("404"));
    // The failed extraction is shared, not repeated, by TryAssembled.
    assert_eq!(extractor.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn error_document_survives_broken_writer() {
    let collab = Collaborators {
        extractor: FixedExtractor::ok(RawExtraction::new(URL, Platform::Codeforces)),
        capture: FakeCapture::missing(),
        html: Arc::new(MissingHtmlRenderer),
        writer: Arc::new(BrokenWriter),
    };

    let out = convert_with(URL, &config(GenerationPreference::Assembled), &collab).await.unwrap();

    assert_eq!(out.status, FinalStatus::ErrorDocument);
    assert!(is_pdf(&out.pdf), "emergency writer must still emit a PDF");
}

#[tokio::test]
async fn invalid_url_is_fatal() {
    let collab = offline(FixedExtractor::ok(problem()));
    let err = convert_with("not a url", &ConversionConfig::default(), &collab)
        .await
        .unwrap_err();
    assert!(matches!(err, Cp2PdfError::InvalidUrl { .. }));
}

#[tokio::test]
async fn progress_callback_sees_every_event() {
    let cb = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .mode(GenerationPreference::Exact)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let collab = offline(FixedExtractor::ok(problem()));

    convert_with(URL, &config, &collab).await.unwrap();

    assert_eq!(cb.started.load(Ordering::SeqCst), 1);
    assert_eq!(cb.completed.load(Ordering::SeqCst), 1);
    assert_eq!(cb.transitions.load(Ordering::SeqCst), 2);
}

// ── Files and batches ────────────────────────────────────────────────────────

#[tokio::test]
async fn file_output_uses_url_derived_name_and_sidecar() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .mode(GenerationPreference::Assembled)
        .output_dir(dir.path())
        .write_json(true)
        .build()
        .unwrap();
    let collab = offline(FixedExtractor::ok(problem()));

    let out = convert_to_file_with(URL, &config, &collab).await.unwrap();

    let pdf_path = dir.path().join("atcoder_jp_contests_abc300_tasks_abc300_a.pdf");
    assert_eq!(out.output_path.as_deref(), Some(pdf_path.as_path()));
    assert!(is_pdf(&std::fs::read(&pdf_path).unwrap()));

    let json = std::fs::read_to_string(pdf_path.with_extension("json")).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["url"], URL);
    assert_eq!(value["status"], "done");
}

#[tokio::test]
async fn batch_keeps_input_order_and_isolates_bad_urls() {
    let dir = tempfile::tempdir().unwrap();
    let cb = Arc::new(CountingCallback::default());
    let config = ConversionConfig::builder()
        .mode(GenerationPreference::Assembled)
        .output_dir(dir.path())
        .concurrency(3)
        .progress_callback(cb.clone())
        .build()
        .unwrap();
    let collab = offline(FixedExtractor::ok(problem()));
    let urls = [
        "https://codeforces.com/problemset/problem/4/A",
        "ftp://example.com/x",
        "https://www.spoj.com/problems/TEST/",
        URL,
    ];

    let results = convert_many_with(urls, &config, &collab).await;

    assert_eq!(results.len(), 4);
    assert!(matches!(results[1], Err(Cp2PdfError::InvalidUrl { .. })));
    for (i, url) in urls.iter().enumerate().filter(|(i, _)| *i != 1) {
        let out = results[i].as_ref().unwrap();
        assert_eq!(out.url, *url);
        assert!(out.output_path.as_ref().unwrap().exists());
    }
    assert_eq!(cb.batch_done.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn stream_yields_every_url_without_writing() {
    let dir = tempfile::tempdir().unwrap();
    let config = ConversionConfig::builder()
        .mode(GenerationPreference::Assembled)
        .output_dir(dir.path().join("unused"))
        .build()
        .unwrap();
    let collab = offline(FixedExtractor::ok(problem()));
    let urls = vec![
        URL.to_string(),
        "https://codeforces.com/contest/1/problem/A".to_string(),
    ];

    let mut seen: Vec<String> = convert_stream_with(urls.clone(), &config, collab)
        .map(|r| r.unwrap().url)
        .collect()
        .await;
    seen.sort();
    let mut expected = urls;
    expected.sort();

    assert_eq!(seen, expected);
    assert!(!dir.path().join("unused").exists());
}
