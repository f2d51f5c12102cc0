//! Error types for the cp2pdf library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`Cp2PdfError`] — **Fatal**: the conversion cannot even start or its
//!   result cannot be persisted (bad URL, invalid configuration, unwritable
//!   output directory). Returned as `Err(Cp2PdfError)` from the top-level
//!   `convert*` functions.
//!
//! * [`PipelineError`] — **Non-fatal**: one stage or collaborator failed
//!   (fetch timed out, renderer missing, field absent on the page). These
//!   never surface as `Err` to the caller. The fallback controller consumes
//!   them as state-transition triggers and records them in
//!   [`crate::output::Transition`]; when every state is exhausted the caller
//!   still receives an error document, not an error value.
//!
//! Markup defects found by the sanitizer are a third, purely informational
//! category: see [`crate::pipeline::sanitize::Defect`]. They are repaired in
//! place and never leave that module.

use std::path::PathBuf;
use thiserror::Error;

const UNAVAILABLE: &str = "collaborator not available";

/// All fatal errors returned by the cp2pdf library.
///
/// Stage-level failures use [`PipelineError`] and are recorded in
/// [`crate::output::ConversionOutput::transitions`] rather than propagated here.
#[derive(Debug, Error)]
pub enum Cp2PdfError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The input string is not an absolute HTTP/HTTPS URL.
    #[error("Invalid URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write an output file (PDF, JSON sidecar, cache).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A non-fatal failure of one pipeline stage or external collaborator.
///
/// Variants follow the fetch → extract → render → assemble flow. The
/// controller turns each one into a logged transition to the next state.
#[derive(Debug, Clone, PartialEq, Eq, Error, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PipelineError {
    /// Network failure or non-success HTTP status while fetching a page or image.
    #[error("fetch of '{url}' failed: {reason}")]
    Fetch {
        url: String,
        reason: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
    },

    /// A bounded network or browser operation exceeded its timeout.
    #[error("{stage} timed out after {secs}s")]
    Timeout { stage: String, secs: u64 },

    /// An expected field was absent or unparseable for the platform.
    #[error("extraction of '{field}' failed: {reason}")]
    Extraction { field: String, reason: String },

    /// A rendering collaborator failed or is not available.
    #[error("{renderer} renderer failed: {reason}")]
    Render { renderer: String, reason: String },

    /// Nothing usable was left after all sections were classified.
    #[error("assembly failed: {reason}")]
    Assembly { reason: String },
}

impl PipelineError {
    /// Shorthand for a renderer that is not installed or was disabled.
    pub fn unavailable(renderer: impl Into<String>) -> Self {
        PipelineError::Render {
            renderer: renderer.into(),
            reason: UNAVAILABLE.to_string(),
        }
    }

    /// True when a collaborator was missing rather than failing.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PipelineError::Render { reason, .. } if reason == UNAVAILABLE)
    }

    /// True for the timeout case of a fetch or render.
    pub fn is_timeout(&self) -> bool {
        matches!(self, PipelineError::Timeout { .. })
    }
}
