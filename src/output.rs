//! Result types returned by the conversion entry points.
//!
//! Every conversion yields a [`ConversionOutput`], including conversions
//! that ended in an error document: a failed fetch or render is a recorded
//! [`Transition`], not an `Err`.

use crate::fallback::ControllerState;
use crate::model::{Document, GenerationMode};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Terminal state of one conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinalStatus {
    /// A real document was produced (exact, structured or assembled).
    Done,
    /// Only the minimal "could not generate full content" document.
    ErrorDocument,
}

impl FinalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            FinalStatus::Done => "done",
            FinalStatus::ErrorDocument => "error_document",
        }
    }
}

impl fmt::Display for FinalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One edge taken through the fallback state machine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ControllerState,
    pub to: ControllerState,
    /// The triggering condition, e.g. `"page capture timed out after 60s"`.
    pub reason: String,
}

/// Counters for one conversion.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Collaborator calls made (captures, renders, extractions).
    pub attempts: usize,
    /// Sections in the assembled document, when one was built.
    pub sections: usize,
    /// Images kept by the relevance filter.
    pub images_retained: usize,
    /// Per-field extraction failures reported by the scraper.
    pub extraction_failures: usize,
    pub pdf_bytes: usize,
    pub duration_ms: u64,
}

/// Everything one conversion produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    pub url: String,
    pub status: FinalStatus,
    /// How the PDF was produced; `None` for error documents.
    pub mode: Option<GenerationMode>,
    /// Fallback edges in the order they were taken.
    pub transitions: Vec<Transition>,
    /// The structured document, when the pipeline built one (structured
    /// HTML, assembled or error document). `None` for exact captures.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document: Option<Document>,
    /// The PDF bytes.
    #[serde(skip)]
    pub pdf: Vec<u8>,
    /// Where the PDF was written, for file-producing entry points.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output_path: Option<PathBuf>,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    pub fn is_done(&self) -> bool {
        self.status == FinalStatus::Done
    }

    /// True if the first state attempted was not the one that finished.
    pub fn fell_back(&self) -> bool {
        !self.transitions.is_empty()
    }

    /// The last failure reason recorded, if any.
    pub fn last_reason(&self) -> Option<&str> {
        self.transitions.last().map(|t| t.reason.as_str())
    }
}
