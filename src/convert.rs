//! Top-level conversion entry points.
//!
//! [`Pipeline`] is a plain value: configuration plus collaborator handles
//! (document loader, optional LLM client). No process-wide state — two
//! pipelines with different configs can run side by side, and tests inject
//! mocks for every collaborator.
//!
//! ## Stage schedule
//!
//! Element construction, per-page language tagging and region classification
//! are data-parallel per page and run through `buffer_unordered`; their
//! results are joined in page-number order before the document-wide stages,
//! so the output is byte-identical no matter how the pages interleave.
//! Dedup, merge, structure detection, final ordering and emission run
//! serially. The only suspension points are the document load and the LLM
//! call; neither holds any lock.
//!
//! Cancellation is cooperative: the token is checked between stages and
//! between pages inside the parallel stage.

use crate::config::ConversionConfig;
use crate::element::{DocumentElement, META_LANGUAGE};
use crate::error::{ConvertError, Warning};
use crate::language;
use crate::llm::TextGenerator;
use crate::ocr::{elements_from_observations, OcrObservation};
use crate::output::{ConversionOutcome, ConversionStats, DocumentInfo};
use crate::pages::PageRange;
use crate::pipeline::{dedup, emit, merge, refine, regions, sort, structure};
use crate::prompts::PromptCatalog;
use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info};

// ── Cancellation ─────────────────────────────────────────────────────────

/// Cheap cloneable cancellation token, checked between stages and pages.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    cancelled: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Relaxed)
    }

    fn check(&self) -> Result<(), ConvertError> {
        if self.is_cancelled() {
            Err(ConvertError::Cancelled)
        } else {
            Ok(())
        }
    }
}

// ── Document loading ─────────────────────────────────────────────────────

/// A document delivered by the loader: facts plus positioned observations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadedDocument {
    pub info: DocumentInfo,
    pub observations: Vec<OcrObservation>,
}

/// The inbound collaborator that produces OCR observations for a document.
///
/// Real implementations wrap an OCR engine; [`JsonDocumentLoader`] reads a
/// pre-extracted document description, and tests construct
/// [`LoadedDocument`] values directly.
#[async_trait]
pub trait DocumentLoader: Send + Sync {
    async fn load(&self, path: &Path) -> Result<LoadedDocument, ConvertError>;
}

/// Loads a JSON document description (`{ info, observations }`) from disk.
#[derive(Debug, Clone, Default)]
pub struct JsonDocumentLoader;

#[async_trait]
impl DocumentLoader for JsonDocumentLoader {
    async fn load(&self, path: &Path) -> Result<LoadedDocument, ConvertError> {
        let bytes =
            tokio::fs::read(path)
                .await
                .map_err(|e| ConvertError::DocumentLoadFailed {
                    path: path.to_path_buf(),
                    detail: e.to_string(),
                })?;
        serde_json::from_slice(&bytes).map_err(|e| ConvertError::DocumentLoadFailed {
            path: path.to_path_buf(),
            detail: format!("not a valid document description: {e}"),
        })
    }
}

// ── Pipeline ─────────────────────────────────────────────────────────────

/// The conversion pipeline: config + collaborators, immutable once built.
pub struct Pipeline {
    config: ConversionConfig,
    catalog: PromptCatalog,
    loader: Arc<dyn DocumentLoader>,
    generator: Option<Arc<dyn TextGenerator>>,
}

impl Pipeline {
    /// A pipeline with the JSON document loader and no LLM client.
    pub fn new(config: ConversionConfig) -> Self {
        let catalog = PromptCatalog::new(config.llm.prompt_templates.clone());
        Self {
            config,
            catalog,
            loader: Arc::new(JsonDocumentLoader),
            generator: None,
        }
    }

    pub fn with_loader(mut self, loader: Arc<dyn DocumentLoader>) -> Self {
        self.loader = loader;
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn config(&self) -> &ConversionConfig {
        &self.config
    }

    /// Convert a document file: load, select pages, run the element
    /// pipeline, emit Markdown, optionally refine.
    pub async fn process_document(
        &self,
        path: impl AsRef<Path>,
        page_range: &PageRange,
        cancel: &CancelToken,
    ) -> Result<ConversionOutcome, ConvertError> {
        let path = path.as_ref();
        info!("Starting conversion: {}", path.display());

        // ── Step 1: Load the document ────────────────────────────────────
        let document = self.loader.load(path).await?;
        cancel.check()?;

        // ── Step 2: Resolve the page selection ───────────────────────────
        let pages = page_range.resolve(document.info.page_count)?;
        debug!("Selected {} pages for conversion", pages.len());

        // ── Step 3: Filter observations to the selected pages ────────────
        let selected: Vec<OcrObservation> = document
            .observations
            .into_iter()
            .filter(|obs| pages.binary_search(&obs.page_number).is_ok())
            .collect();

        self.process_observations(selected, &document.info, cancel)
            .await
    }

    /// Run the element pipeline over pre-extracted observations.
    pub async fn process_observations(
        &self,
        observations: Vec<OcrObservation>,
        info: &DocumentInfo,
        cancel: &CancelToken,
    ) -> Result<ConversionOutcome, ConvertError> {
        let start = Instant::now();
        let mut warnings = Vec::new();
        let input_observations = observations.len();

        // ── Step 1: Per-page parallel stages (elements, language, regions)
        let joined = self.run_page_stages(observations, cancel).await?;
        cancel.check()?;
        let input_elements = joined.len();
        let pages_processed = {
            let mut pages: Vec<u32> = joined.iter().map(|e| e.page_number).collect();
            pages.dedup();
            pages.len()
        };

        // ── Step 2: Document language ────────────────────────────────────
        let detection = language::detect_from_elements(&joined, &self.config.language_detection);
        let corpus_len: usize = joined.iter().map(|e| e.content.chars().count()).sum();
        if detection.confidence == 0.0
            && corpus_len >= self.config.language_detection.minimum_text_length
        {
            warnings.push(Warning::LanguageDetectionFailed {
                detail: "identifier produced no usable result".to_string(),
            });
        }
        debug!(
            language = detection.language.code(),
            confidence = detection.confidence,
            "document language"
        );

        // ── Step 3: Reading order within pages ───────────────────────────
        let ordered = sort::sort_elements(joined, &self.config.processing);
        cancel.check()?;

        // ── Step 4: Cross-page duplicate removal ─────────────────────────
        let page_count = info.page_count.max(1);
        let (deduped, duplicates_removed) =
            dedup::dedup_elements(ordered, page_count, &self.config.processing);
        debug!(duplicates_removed, "dedup complete");
        cancel.check()?;

        // ── Step 5: Merge split fragments ────────────────────────────────
        let (merged, merges_performed) =
            merge::merge_elements(deduped, detection.language, &self.config.processing);
        debug!(merges_performed, "merge complete");
        cancel.check()?;

        // ── Step 6: Structure detection ──────────────────────────────────
        let structured = structure::detect_structure(merged, &self.config.processing);
        cancel.check()?;

        // ── Step 7: Final reading order ──────────────────────────────────
        let elements = sort::sort_elements(structured, &self.config.processing);
        cancel.check()?;

        // ── Step 8: Emit Markdown ────────────────────────────────────────
        let markdown = emit::emit_markdown(&elements)?;

        // ── Step 9: Optional LLM refinement ──────────────────────────────
        let llm_start = Instant::now();
        let refined_markdown = match (&self.generator, self.config.llm.enabled) {
            (Some(generator), true) => {
                cancel.check()?;
                refine::refine_markdown(
                    &markdown,
                    &elements,
                    info,
                    generator,
                    &self.catalog,
                    &self.config,
                    &mut warnings,
                )
                .await
            }
            _ => None,
        };
        let llm_duration_ms = if self.config.llm.enabled {
            llm_start.elapsed().as_millis() as u64
        } else {
            0
        };

        let stats = ConversionStats {
            input_observations,
            input_elements,
            output_elements: elements.len(),
            duplicates_removed,
            merges_performed,
            pages_processed,
            total_duration_ms: start.elapsed().as_millis() as u64,
            llm_duration_ms,
        };

        info!(
            "Conversion complete: {} elements → {} bytes of Markdown in {}ms",
            stats.output_elements,
            markdown.len(),
            stats.total_duration_ms
        );

        Ok(ConversionOutcome {
            markdown,
            refined_markdown,
            elements,
            language: detection,
            warnings,
            stats,
        })
    }

    /// Refine existing Markdown through the LLM client, if configured.
    ///
    /// Returns the best available Markdown (refined or original) plus any
    /// warnings; never fails.
    pub async fn refine(&self, markdown: &str) -> (String, Vec<Warning>) {
        let mut warnings = Vec::new();
        let Some(generator) = &self.generator else {
            warnings.push(Warning::LlmUnavailable {
                detail: "no LLM client configured".to_string(),
            });
            return (markdown.to_string(), warnings);
        };
        let refined = refine::refine_markdown(
            markdown,
            &[],
            &DocumentInfo::default(),
            generator,
            &self.catalog,
            &self.config,
            &mut warnings,
        )
        .await;
        (refined.unwrap_or_else(|| markdown.to_string()), warnings)
    }

    /// Fan pages out through the per-page stages, then join deterministically
    /// in page order.
    async fn run_page_stages(
        &self,
        observations: Vec<OcrObservation>,
        cancel: &CancelToken,
    ) -> Result<Vec<DocumentElement>, ConvertError> {
        let mut by_page: BTreeMap<u32, Vec<OcrObservation>> = BTreeMap::new();
        for obs in observations {
            by_page.entry(obs.page_number).or_default().push(obs);
        }

        let processing = self.config.processing.clone();
        let detection_config = self.config.language_detection.clone();

        let results: Vec<Result<(u32, Vec<DocumentElement>), ConvertError>> =
            futures::stream::iter(by_page.into_iter().map(|(page, page_observations)| {
                let processing = processing.clone();
                let detection_config = detection_config.clone();
                let cancel = cancel.clone();
                async move {
                    cancel.check()?;
                    let elements = elements_from_observations(&page_observations)?;
                    let mut elements = regions::classify_regions(elements, &processing);
                    let page_language =
                        language::detect_from_elements(&elements, &detection_config);
                    for element in &mut elements {
                        element.set_meta(META_LANGUAGE, page_language.language.code());
                    }
                    let elements = sort::sort_elements(elements, &processing);
                    Ok((page, elements))
                }
            }))
            .buffer_unordered(self.config.concurrency)
            .collect()
            .await;

        // Deterministic join: page order, regardless of completion order.
        let mut pages: Vec<(u32, Vec<DocumentElement>)> = Vec::with_capacity(results.len());
        for result in results {
            pages.push(result?);
        }
        pages.sort_by_key(|(page, _)| *page);
        Ok(pages.into_iter().flat_map(|(_, elements)| elements).collect())
    }
}

// ── File output ──────────────────────────────────────────────────────────

/// Write Markdown to a file atomically (temp file + rename) so readers never
/// observe a partial document.
pub async fn write_markdown_to_file(
    markdown: &str,
    output_path: impl AsRef<Path>,
) -> Result<(), ConvertError> {
    let path: PathBuf = output_path.as_ref().to_path_buf();
    let map_err = |source: std::io::Error| ConvertError::OutputWriteFailed {
        path: path.clone(),
        source,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(map_err)?;
        }
    }

    let tmp_path = path.with_extension("md.tmp");
    tokio::fs::write(&tmp_path, markdown).await.map_err(map_err)?;
    tokio::fs::rename(&tmp_path, &path).await.map_err(map_err)?;
    Ok(())
}
