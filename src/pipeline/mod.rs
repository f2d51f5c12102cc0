//! Normalization stages turning one platform extraction into a `Document`.
//!
//! Each submodule implements exactly one transformation step; they run
//! strictly in order, synchronously, for a single document.
//!
//! ## Data Flow
//!
//! ```text
//! RawExtraction ──▶ sanitize ──▶ format ──▶ classify ──▶ images ──▶ assemble
//!  (fields)         (repair)     (layout)   (labels)     (filter)   (blocks)
//!                       ▲
//!                    symbols (math → Unicode)
//! ```
//!
//! 1. [`symbols`]  — LaTeX-like math tokens to Unicode / linear text
//! 2. [`sanitize`] — repair or strip broken markup, protect math
//! 3. [`format`]   — paragraphs, format blocks, subscripts, spacing
//! 4. [`classify`] — section kinds by source field, code blocks, markers
//! 5. [`images`]   — drop decorative images
//! 6. [`assemble`] — ordered, paginatable blocks
//!
//! [`build_document`] runs 2–6 and is the `TryAssembled` state of the
//! fallback controller.

pub mod assemble;
pub mod classify;
pub mod format;
pub mod images;
pub mod sanitize;
pub mod symbols;

use crate::error::PipelineError;
use crate::model::{Document, DocumentMetadata, GenerationMode, RawExtraction, SectionKind};
use assemble::AssembleOptions;
use chrono::{DateTime, Utc};
use images::ImageContext;
use tracing::debug;

/// Build an assembled document from whatever fields `raw` carries.
///
/// Fails with [`PipelineError::Assembly`] only when no content section
/// survives classification.
pub fn build_document(
    raw: &RawExtraction,
    mode: GenerationMode,
    opts: &AssembleOptions,
    image_threshold: u32,
    at: DateTime<Utc>,
) -> Result<Document, PipelineError> {
    let sections = classify::classify(raw);
    let content = sections
        .iter()
        .filter(|s| s.kind != SectionKind::Title && !s.is_empty())
        .count();
    debug!(url = %raw.url, sections = sections.len(), content, "classified");
    if content == 0 {
        return Err(PipelineError::Assembly {
            reason: "no extractable content".to_string(),
        });
    }

    let ctx = ImageContext::new(raw.platform, image_threshold);
    let retained: Vec<_> = raw
        .images
        .iter()
        .filter(|img| {
            let ctx = ImageContext {
                section: img.origin,
                ..ctx
            };
            images::is_relevant(img, &ctx)
        })
        .cloned()
        .collect();
    debug!(
        total = raw.images.len(),
        retained = retained.len(),
        "images filtered"
    );

    let metadata = DocumentMetadata::from_raw(raw, mode, at);
    Ok(assemble::assemble(sections, retained, mode, metadata, opts))
}
