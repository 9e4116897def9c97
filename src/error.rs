//! Error types for the ocr2md library.
//!
//! Two distinct types reflect two distinct failure modes:
//!
//! * [`ConvertError`] — **Fatal**: the conversion cannot proceed at all
//!   (malformed page range, an observation violating the element invariants,
//!   a structural violation inside the pipeline). Returned as
//!   `Err(ConvertError)` from the top-level entry points.
//!
//! * [`Warning`] — **Non-fatal**: something degraded but the conversion
//!   completed (language detection fell back to English, the LLM endpoint
//!   was unreachable). Collected in
//!   [`crate::output::ConversionOutcome::warnings`] so callers can inspect a
//!   degraded run rather than losing the document to a cosmetic failure.
//!
//! The separation lets callers decide their own tolerance: treat every
//! warning as an error, log and continue, or ignore refinement problems
//! entirely.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the ocr2md library.
///
/// Degraded-but-successful outcomes use [`Warning`] and are stored in
/// [`crate::output::ConversionOutcome`] rather than propagated here.
#[derive(Debug, Error)]
pub enum ConvertError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// An OCR observation violated the element invariants (§ element model).
    #[error("Invalid OCR observation on page {page}: {detail}")]
    InvalidInput { page: u32, detail: String },

    /// The page selector string could not be parsed or referenced a page
    /// outside the document.
    #[error("Invalid page range '{input}': {detail}")]
    InvalidPageRange { input: String, detail: String },

    /// The document loader failed to deliver observations.
    #[error("Failed to load document '{path}': {detail}")]
    DocumentLoadFailed { path: PathBuf, detail: String },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// The element merger produced a structurally invalid element.
    #[error("Element merge failed: {0}")]
    MergeFailed(String),

    /// The deduplicator removed elements it must never remove.
    #[error("Deduplication failed: {0}")]
    DeduplicationFailed(String),

    /// Markdown emission produced no output for a non-empty element stream.
    #[error("Markdown generation failed: {0}")]
    MarkdownGenerationFailed(String),

    /// The cancellation token tripped between stages.
    #[error("Conversion cancelled")]
    Cancelled,

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output Markdown file.
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

/// A non-fatal outcome collected during conversion.
///
/// Stored in [`crate::output::ConversionOutcome::warnings`]. The pre-LLM
/// Markdown is always produced; warnings describe the parts of the run that
/// degraded on the way there.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum Warning {
    /// The statistical identifier produced nothing usable; the pipeline fell
    /// back to English.
    #[error("Language detection failed ({detail}); falling back to 'en'")]
    LanguageDetectionFailed { detail: String },

    /// The LLM client errored or timed out; refinement was skipped.
    #[error("LLM unavailable, refinement skipped: {detail}")]
    LlmUnavailable { detail: String },

    /// The LLM returned output that failed the sanity check; the pre-LLM
    /// Markdown was kept.
    #[error("LLM output rejected ({detail}); keeping unrefined Markdown")]
    RefinementRejected { detail: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display_carries_context() {
        let err = ConvertError::InvalidPageRange {
            input: "7-3".to_string(),
            detail: "start 7 is after end 3".to_string(),
        };
        let msg = format!("{err}");
        assert!(msg.contains("7-3"));
        assert!(msg.contains("after end"));
    }

    #[test]
    fn test_warning_is_serialisable() {
        let w = Warning::LlmUnavailable {
            detail: "connection refused".to_string(),
        };
        let json = serde_json::to_string(&w).unwrap();
        assert!(json.contains("connection refused"));
    }
}
