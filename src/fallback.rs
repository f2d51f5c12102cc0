//! Rendering fallback controller.
//!
//! ```text
//!            ┌──────────┐ fail  ┌───────────────────┐ fail  ┌──────────────┐ fail  ┌───────────────┐
//! start ───▶ │ TryExact │ ────▶ │ TryStructuredHTML │ ────▶ │ TryAssembled │ ────▶ │ ErrorDocument │
//!            └──────────┘       └───────────────────┘       └──────────────┘       └───────────────┘
//!                 │ ok                   │ ok                      │ ok
//!                 └──────────────────────┴─────────────────────────┴──────▶ Done
//! ```
//!
//! * `TryExact` failing goes straight to `ErrorDocument` when exact capture
//!   is mandatory. A capture that failed for a reason other than a timeout
//!   or a missing browser is retried once with page-chrome suppression
//!   turned off; no state is ever retried with the same inputs.
//! * The page extraction is done at most once per conversion and shared by
//!   `TryStructuredHTML` and `TryAssembled`.
//! * Every collaborator call is bounded by a timeout; a timeout is just
//!   another transition trigger.
//! * `ErrorDocument` always yields a PDF. If the configured writer fails
//!   even there, the built-in emergency writer is used.

use crate::config::{ConversionConfig, GenerationPreference, PageSize};
use crate::error::PipelineError;
use crate::model::{Document, GenerationMode, Platform, RawExtraction, SectionKind};
use crate::output::{ConversionOutput, ConversionStats, FinalStatus, Transition};
use crate::pipeline::assemble::{error_document, AssembleOptions};
use crate::pipeline::build_document;
use crate::render::{html, pdf};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Extraction gets this many fetch timeouts: one page plus its images.
const EXTRACTION_TIMEOUT_FACTOR: u64 = 3;

// ── Collaborator interfaces ──────────────────────────────────────────────

/// Produces the platform extraction for a URL. Per-field failures are
/// reported in [`RawExtraction::failures`]; `Err` means nothing usable.
#[async_trait]
pub trait ExtractionProvider: Send + Sync {
    async fn extract(&self, url: &str) -> Result<RawExtraction, PipelineError>;
}

/// Options for a full-fidelity page capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureOptions {
    pub page_size: PageSize,
    /// Inject style rules hiding navigation, ads and footers.
    pub suppress_chrome: bool,
}

/// Captures the live page as a PDF (browser automation).
#[async_trait]
pub trait PageCapture: Send + Sync {
    async fn capture(&self, url: &str, opts: &CaptureOptions) -> Result<Vec<u8>, PipelineError>;
}

/// Renders standalone HTML plus a stylesheet to PDF.
#[async_trait]
pub trait HtmlRenderer: Send + Sync {
    async fn render(&self, html: &str, css: &str) -> Result<Vec<u8>, PipelineError>;
}

/// Writes an assembled [`Document`] as PDF.
pub trait PdfWriter: Send + Sync {
    fn write(&self, doc: &Document) -> Result<Vec<u8>, PipelineError>;
}

/// The set of collaborators one conversion runs against.
#[derive(Clone)]
pub struct Collaborators {
    pub extractor: Arc<dyn ExtractionProvider>,
    pub capture: Arc<dyn PageCapture>,
    pub html: Arc<dyn HtmlRenderer>,
    pub writer: Arc<dyn PdfWriter>,
}

impl fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collaborators").finish_non_exhaustive()
    }
}

// ── States ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControllerState {
    TryExact,
    #[serde(rename = "TryStructuredHTML")]
    TryStructuredHtml,
    TryAssembled,
    ErrorDocument,
    Done,
}

impl ControllerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ControllerState::TryExact => "TryExact",
            ControllerState::TryStructuredHtml => "TryStructuredHTML",
            ControllerState::TryAssembled => "TryAssembled",
            ControllerState::ErrorDocument => "ErrorDocument",
            ControllerState::Done => "Done",
        }
    }

    /// First state for a configured preference.
    pub fn initial(pref: GenerationPreference) -> Self {
        match pref {
            GenerationPreference::Exact => ControllerState::TryExact,
            GenerationPreference::Structured => ControllerState::TryStructuredHtml,
            GenerationPreference::Assembled => ControllerState::TryAssembled,
        }
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ── Controller ───────────────────────────────────────────────────────────

/// Drives one URL through the fallback chain.
pub struct FallbackController<'a> {
    collab: &'a Collaborators,
    config: &'a ConversionConfig,
}

/// Per-conversion mutable state.
struct Run<'u> {
    url: &'u str,
    transitions: Vec<Transition>,
    stats: ConversionStats,
    extraction: Option<Result<RawExtraction, PipelineError>>,
    last_reason: String,
}

/// A finished state: the PDF and, when one was built, its document.
struct Produced {
    mode: GenerationMode,
    pdf: Vec<u8>,
    document: Option<Document>,
}

impl<'a> FallbackController<'a> {
    pub fn new(collab: &'a Collaborators, config: &'a ConversionConfig) -> Self {
        Self { collab, config }
    }

    /// Run the state machine to a terminal state. Never fails.
    pub async fn run(&self, url: &str) -> ConversionOutput {
        let started = Instant::now();
        info!(url, mode = ?self.config.mode, "conversion started");
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_document_start(url);
        }

        let mut run = Run {
            url,
            transitions: Vec::new(),
            stats: ConversionStats::default(),
            extraction: None,
            last_reason: String::new(),
        };
        let mut state = ControllerState::initial(self.config.mode);
        let mut chrome_retry_used = false;

        let (status, produced) = loop {
            let result = match state {
                ControllerState::TryExact => {
                    let opts = CaptureOptions {
                        page_size: self.config.page_size,
                        suppress_chrome: self.config.suppress_page_chrome && !chrome_retry_used,
                    };
                    match self.try_exact(&mut run, &opts).await {
                        Err(e) if opts.suppress_chrome && is_retryable_capture(&e) => {
                            chrome_retry_used = true;
                            self.transition(
                                &mut run,
                                state,
                                state,
                                &format!("{e}; retrying without page chrome suppression"),
                            );
                            continue;
                        }
                        other => other,
                    }
                }
                ControllerState::TryStructuredHtml => self.try_structured(&mut run).await,
                ControllerState::TryAssembled => self.try_assembled(&mut run).await,
                ControllerState::ErrorDocument | ControllerState::Done => {
                    break (FinalStatus::ErrorDocument, self.error_document(&mut run));
                }
            };

            match result {
                Ok(produced) => break (FinalStatus::Done, produced),
                Err(e) => {
                    let next = self.next_state(state);
                    self.transition(&mut run, state, next, &e.to_string());
                    state = next;
                }
            }
        };

        let mut stats = run.stats;
        stats.pdf_bytes = produced.pdf.len();
        stats.duration_ms = started.elapsed().as_millis() as u64;
        if let Some(doc) = &produced.document {
            stats.sections = doc.content_sections().count();
            stats.images_retained = doc
                .sections
                .iter()
                .filter(|s| s.kind == SectionKind::Image)
                .count();
        }

        info!(
            url,
            status = %status,
            mode = %produced.mode,
            fallbacks = run.transitions.len(),
            "conversion finished in {}ms",
            stats.duration_ms
        );
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_document_complete(url, status.as_str(), produced.pdf.len());
        }

        ConversionOutput {
            url: url.to_string(),
            status,
            mode: (status == FinalStatus::Done).then_some(produced.mode),
            transitions: run.transitions,
            document: produced.document,
            pdf: produced.pdf,
            output_path: None,
            stats,
        }
    }

    fn next_state(&self, state: ControllerState) -> ControllerState {
        match state {
            ControllerState::TryExact if self.config.exact_mandatory => ControllerState::ErrorDocument,
            ControllerState::TryExact => ControllerState::TryStructuredHtml,
            ControllerState::TryStructuredHtml => ControllerState::TryAssembled,
            _ => ControllerState::ErrorDocument,
        }
    }

    fn transition(&self, run: &mut Run<'_>, from: ControllerState, to: ControllerState, reason: &str) {
        warn!(url = run.url, from = %from, to = %to, reason, "fallback transition");
        if let Some(ref cb) = self.config.progress_callback {
            cb.on_transition(run.url, from.as_str(), to.as_str(), reason);
        }
        run.last_reason = reason.to_string();
        run.transitions.push(Transition {
            from,
            to,
            reason: reason.to_string(),
        });
    }

    // ── States ───────────────────────────────────────────────────────────

    async fn try_exact(&self, run: &mut Run<'_>, opts: &CaptureOptions) -> Result<Produced, PipelineError> {
        run.stats.attempts += 1;
        debug!(url = run.url, suppress_chrome = opts.suppress_chrome, "page capture");
        let pdf = bounded(
            "page capture",
            self.config.render_timeout_secs,
            self.collab.capture.capture(run.url, opts),
        )
        .await?;
        Ok(Produced {
            mode: GenerationMode::Exact,
            pdf,
            document: None,
        })
    }

    async fn try_structured(&self, run: &mut Run<'_>) -> Result<Produced, PipelineError> {
        let doc = self.build(run, GenerationMode::StructuredHtml).await?;
        run.stats.attempts += 1;
        let markup = html::document_to_html(&doc);
        let css = html::stylesheet(self.config.page_size);
        let pdf = bounded(
            "HTML render",
            self.config.render_timeout_secs,
            self.collab.html.render(&markup, &css),
        )
        .await?;
        Ok(Produced {
            mode: GenerationMode::StructuredHtml,
            pdf,
            document: Some(doc),
        })
    }

    async fn try_assembled(&self, run: &mut Run<'_>) -> Result<Produced, PipelineError> {
        let doc = self.build(run, GenerationMode::Assembled).await?;
        run.stats.attempts += 1;
        let pdf = self.collab.writer.write(&doc)?;
        Ok(Produced {
            mode: GenerationMode::Assembled,
            pdf,
            document: Some(doc),
        })
    }

    fn error_document(&self, run: &mut Run<'_>) -> Produced {
        let platform = match &run.extraction {
            Some(Ok(raw)) => raw.platform,
            _ => Platform::detect(run.url),
        };
        let reason = if run.last_reason.is_empty() {
            "no generation state succeeded"
        } else {
            run.last_reason.as_str()
        };
        let doc = error_document(run.url, platform, reason, Utc::now());
        let pdf = self.collab.writer.write(&doc).unwrap_or_else(|e| {
            warn!(url = run.url, error = %e, "PDF writer failed on error document, using emergency writer");
            pdf::emergency_pdf(&doc)
        });
        Produced {
            mode: GenerationMode::Assembled,
            pdf,
            document: Some(doc),
        }
    }

    // ── Shared steps ─────────────────────────────────────────────────────

    /// Extract once, then run the normalization pipeline.
    async fn build(&self, run: &mut Run<'_>, mode: GenerationMode) -> Result<Document, PipelineError> {
        if run.extraction.is_none() {
            run.stats.attempts += 1;
            let secs = self.config.fetch_timeout_secs * EXTRACTION_TIMEOUT_FACTOR;
            let extracted = bounded("extraction", secs, self.collab.extractor.extract(run.url)).await;
            if let Ok(raw) = &extracted {
                run.stats.extraction_failures = raw.failures.len();
                for failure in &raw.failures {
                    debug!(url = run.url, %failure, "partial extraction");
                }
            }
            run.extraction = Some(extracted);
        }
        let raw = match &run.extraction {
            Some(Ok(raw)) => raw,
            Some(Err(e)) => return Err(e.clone()),
            None => {
                return Err(PipelineError::Extraction {
                    field: "page".to_string(),
                    reason: "extraction did not run".to_string(),
                })
            }
        };

        let opts = AssembleOptions {
            semantic_markers: self.config.semantic_markers,
            sample_layout: self
                .config
                .sample_layout
                .unwrap_or_else(|| raw.platform.default_sample_layout()),
        };
        build_document(raw, mode, &opts, self.config.image_min_dimension, Utc::now())
    }
}

/// A capture failure worth one retry without chrome suppression.
fn is_retryable_capture(e: &PipelineError) -> bool {
    matches!(e, PipelineError::Render { .. }) && !e.is_unavailable()
}

/// Bound a collaborator call by `secs`.
pub async fn bounded<T>(
    stage: &str,
    secs: u64,
    fut: impl Future<Output = Result<T, PipelineError>>,
) -> Result<T, PipelineError> {
    match tokio::time::timeout(Duration::from_secs(secs), fut).await {
        Ok(result) => result,
        Err(_) => Err(PipelineError::Timeout {
            stage: stage.to_string(),
            secs,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_names() {
        assert_eq!(ControllerState::TryStructuredHtml.to_string(), "TryStructuredHTML");
        assert_eq!(
            serde_json::to_string(&ControllerState::TryStructuredHtml).unwrap(),
            "\"TryStructuredHTML\""
        );
    }

    #[test]
    fn initial_state_follows_preference() {
        assert_eq!(ControllerState::initial(GenerationPreference::Exact), ControllerState::TryExact);
        assert_eq!(
            ControllerState::initial(GenerationPreference::Assembled),
            ControllerState::TryAssembled
        );
    }

    #[test]
    fn only_real_render_failures_are_retried() {
        assert!(is_retryable_capture(&PipelineError::Render {
            renderer: "chrome".into(),
            reason: "navigation failed".into(),
        }));
        assert!(!is_retryable_capture(&PipelineError::unavailable("chrome")));
        assert!(!is_retryable_capture(&PipelineError::Timeout {
            stage: "page capture".into(),
            secs: 1,
        }));
    }

    #[tokio::test]
    async fn bounded_turns_slowness_into_timeout() {
        let slow = async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok::<_, PipelineError>(())
        };
        let err = bounded("page capture", 1, slow).await.unwrap_err();
        assert_eq!(
            err,
            PipelineError::Timeout {
                stage: "page capture".into(),
                secs: 1
            }
        );
    }
}
