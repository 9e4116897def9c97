//! # ocr2md
//!
//! Reconstruct structured Markdown from positioned OCR output.
//!
//! ## Why this crate?
//!
//! OCR engines are good at reading glyphs and bad at documents: their output
//! is a flat stream of positioned text boxes with no notion of paragraphs,
//! headings, lists, columns, or the running header repeated on every page.
//! This crate turns that stream into clean Markdown by reconstructing the
//! logical document structure from geometry alone — then, optionally, lets a
//! local language model polish the result.
//!
//! ## Pipeline Overview
//!
//! ```text
//! OCR observations
//!  │
//!  ├─ 1. Elements   validate boxes, type from the engine's hint
//!  ├─ 2. Regions    tag header/footer candidates by page geometry
//!  ├─ 3. Order      columns → row bands → x (per page)
//!  ├─ 4. Dedup      drop page-repeated headers, footers, page numbers
//!  ├─ 5. Merge      stitch wrapped lines, soft hyphens, split list items
//!  ├─ 6. Structure  header levels from height ranks and numbering; lists
//!  ├─ 7. Emit       Markdown with GFM tables, footnotes, escaping
//!  └─ 8. Refine     optional LLM pass — best-effort, never fatal
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use ocr2md::{CancelToken, ConversionConfig, PageRange, Pipeline};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let pipeline = Pipeline::new(ConversionConfig::default());
//!     let outcome = pipeline
//!         .process_document("document.json", &PageRange::All, &CancelToken::new())
//!         .await?;
//!     println!("{}", outcome.best_markdown());
//!     eprintln!(
//!         "{} elements, {} duplicates removed",
//!         outcome.stats.output_elements, outcome.stats.duplicates_removed
//!     );
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `ocr2md` binary (clap + anyhow + tracing-subscriber) |
//!
//! Disable `cli` when using only the library:
//! ```toml
//! ocr2md = { version = "0.3", default-features = false }
//! ```
//!
//! ## Determinism
//!
//! For a given input and configuration the output Markdown is byte-identical
//! across runs. Pages fan out through the per-page stages concurrently, but
//! results join in page order before any document-wide stage, so concurrency
//! never shows up in the bytes.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod element;
pub mod error;
pub mod language;
pub mod llm;
pub mod ocr;
pub mod output;
pub mod pages;
pub mod pipeline;
pub mod prompts;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConversionConfig, ConversionConfigBuilder, LanguageDetectionConfig, LlmConfig, ProcessingConfig};
pub use convert::{
    write_markdown_to_file, CancelToken, DocumentLoader, JsonDocumentLoader, LoadedDocument,
    Pipeline,
};
pub use element::{BoundingBox, DocumentElement, ElementType};
pub use error::{ConvertError, Warning};
pub use language::{Detection, Language};
pub use llm::{HttpTextGenerator, LlmError, MockTextGenerator, TextGenerator};
pub use ocr::{ObservationKind, OcrObservation};
pub use output::{ConversionOutcome, ConversionStats, DocumentInfo};
pub use pages::PageRange;
pub use prompts::{PromptCatalog, PromptTemplateSet};
