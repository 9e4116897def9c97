//! Result types returned by the conversion entry points.

use crate::element::DocumentElement;
use crate::error::Warning;
use crate::language::Detection;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Everything a conversion run produced.
///
/// `markdown` is always the pipeline's own emission; when LLM refinement ran
/// and passed the sanity check, `refined_markdown` carries the replacement
/// and `markdown` still holds the ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutcome {
    /// The pipeline-emitted Markdown (ground truth).
    pub markdown: String,
    /// LLM-refined Markdown, present only when refinement ran and passed the
    /// sanity check.
    pub refined_markdown: Option<String>,
    /// The final ordered element sequence behind the Markdown.
    pub elements: Vec<DocumentElement>,
    /// Dominant document language as detected from the element corpus.
    pub language: Detection,
    /// Non-fatal degradations collected along the way.
    pub warnings: Vec<Warning>,
    pub stats: ConversionStats,
}

impl ConversionOutcome {
    /// The Markdown a caller should present: refined when available,
    /// otherwise the pipeline's own emission.
    pub fn best_markdown(&self) -> &str {
        self.refined_markdown.as_deref().unwrap_or(&self.markdown)
    }
}

/// Counters for a conversion run, serialisable for logging and diffing.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Observations delivered by the OCR adapter.
    pub input_observations: usize,
    /// Elements entering the document-wide stages after the per-page join.
    pub input_elements: usize,
    /// Elements surviving dedup + merge + structure detection.
    pub output_elements: usize,
    /// Running headers/footers removed by the deduplicator.
    pub duplicates_removed: usize,
    /// Fragment folds performed by the merger.
    pub merges_performed: usize,
    pub pages_processed: usize,
    pub total_duration_ms: u64,
    /// Time spent in the LLM refinement call, zero when disabled.
    pub llm_duration_ms: u64,
}

/// Document-level facts produced once per document by the loader.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub page_count: u32,
    /// Source format, e.g. "pdf".
    #[serde(default)]
    pub format: String,
    #[serde(default)]
    pub file_size: u64,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default)]
    pub modified: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}
