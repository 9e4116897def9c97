//! Optional LLM refinement of the emitted Markdown.
//!
//! Strictly best-effort: the pipeline's own Markdown is the ground truth and
//! is always returned; the LLM output replaces it only when the call
//! succeeds within its timeout AND the result passes a sanity check (at
//! least one of the original headers survives verbatim — a model that
//! rewrote every heading rewrote the document). Every failure mode degrades
//! to a [`Warning`], never to an error.
//!
//! ## Per-element refinement
//!
//! When enabled, tables, list runs and headers additionally go through their
//! specialised sub-prompts; each answer is spliced back by replacing the
//! exact emitted block. A sub-call that fails or whose block is no longer
//! present (because the whole-document pass already reshaped it) is skipped.

use crate::config::ConversionConfig;
use crate::element::{DocumentElement, ElementType};
use crate::error::Warning;
use crate::language;
use crate::llm::TextGenerator;
use crate::output::DocumentInfo;
use crate::pipeline::emit::{render_heading, render_list_item, render_table};
use crate::prompts::{MarkdownOptimizationArgs, PromptCatalog};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

/// Run the refinement pass. Returns the refined Markdown when it passed the
/// sanity check; `None` (plus warnings) otherwise.
pub async fn refine_markdown(
    markdown: &str,
    elements: &[DocumentElement],
    info: &DocumentInfo,
    generator: &Arc<dyn TextGenerator>,
    catalog: &PromptCatalog,
    config: &ConversionConfig,
    warnings: &mut Vec<Warning>,
) -> Option<String> {
    let detection = language::detect(markdown, &config.language_detection);
    let lang = detection.language.code();
    let request_timeout = Duration::from_secs(config.llm.request_timeout_secs);

    let title = info.metadata.get("title").cloned().unwrap_or_default();
    let prompt = catalog.markdown_optimization_prompt(
        lang,
        &MarkdownOptimizationArgs {
            document_title: &title,
            page_count: info.page_count,
            element_count: elements.len(),
            document_context: &info.format,
            detected_language: lang,
            language_confidence: detection.confidence,
            markdown,
        },
    );

    let refined = match call(generator, &prompt, request_timeout).await {
        Ok(text) => text,
        Err(detail) => {
            tracing::warn!(detail = %detail, "LLM refinement unavailable");
            warnings.push(Warning::LlmUnavailable { detail });
            return None;
        }
    };

    if !passes_sanity_check(markdown, &refined) {
        let detail = if refined.trim().is_empty() {
            "empty response".to_string()
        } else {
            "no original header survived".to_string()
        };
        tracing::warn!(detail = %detail, "LLM refinement rejected");
        warnings.push(Warning::RefinementRejected { detail });
        return None;
    }

    let mut refined = refined;
    if config.llm.per_element_refinement {
        refined = refine_per_element(
            refined,
            elements,
            lang,
            generator,
            catalog,
            request_timeout,
            warnings,
        )
        .await;
    }

    Some(refined)
}

async fn call(
    generator: &Arc<dyn TextGenerator>,
    prompt: &str,
    request_timeout: Duration,
) -> Result<String, String> {
    match timeout(request_timeout, generator.generate_text(prompt)).await {
        Ok(Ok(text)) => Ok(text),
        Ok(Err(e)) => Err(e.to_string()),
        Err(_) => Err(format!(
            "timed out after {}s",
            request_timeout.as_secs()
        )),
    }
}

/// The refined text must be non-empty and, when the original had headers,
/// keep at least one of them verbatim.
fn passes_sanity_check(original: &str, refined: &str) -> bool {
    if refined.trim().is_empty() {
        return false;
    }
    let mut original_headers = original
        .lines()
        .filter(|line| line.starts_with('#'))
        .peekable();
    if original_headers.peek().is_none() {
        return true;
    }
    let refined_lines: std::collections::HashSet<&str> =
        refined.lines().map(str::trim_end).collect();
    original_headers.any(|header| refined_lines.contains(header.trim_end()))
}

/// Re-render the exact emitted block for each table, list run and header,
/// ask the specialised prompt, and splice the answer back by substring
/// replacement.
async fn refine_per_element(
    mut markdown: String,
    elements: &[DocumentElement],
    lang: &str,
    generator: &Arc<dyn TextGenerator>,
    catalog: &PromptCatalog,
    request_timeout: Duration,
    warnings: &mut Vec<Warning>,
) -> String {
    for block in emitted_blocks(elements) {
        if !markdown.contains(&block.rendered) {
            continue;
        }
        let prompt = match block.kind {
            BlockKind::Table => catalog.table_optimization_prompt(lang, &block.rendered),
            BlockKind::List => catalog.list_optimization_prompt(lang, &block.rendered),
            BlockKind::Header => catalog.header_optimization_prompt(lang, &block.rendered),
        };
        match call(generator, &prompt, request_timeout).await {
            Ok(replacement) if !replacement.trim().is_empty() => {
                markdown = markdown.replacen(&block.rendered, replacement.trim_end(), 1);
            }
            Ok(_) => {}
            Err(detail) => {
                warnings.push(Warning::LlmUnavailable { detail });
                // One transport failure means the rest will fail too.
                break;
            }
        }
    }
    markdown
}

enum BlockKind {
    Table,
    List,
    Header,
}

struct EmittedBlock {
    kind: BlockKind,
    rendered: String,
}

fn emitted_blocks(elements: &[DocumentElement]) -> Vec<EmittedBlock> {
    let mut blocks = Vec::new();
    let mut list_run: Vec<String> = Vec::new();

    for element in elements {
        if element.element_type != ElementType::ListItem && !list_run.is_empty() {
            blocks.push(EmittedBlock {
                kind: BlockKind::List,
                rendered: list_run.join("\n"),
            });
            list_run.clear();
        }
        match element.element_type {
            ElementType::Table => blocks.push(EmittedBlock {
                kind: BlockKind::Table,
                rendered: render_table(element),
            }),
            ElementType::ListItem => list_run.push(render_list_item(element)),
            ElementType::Header(level) => blocks.push(EmittedBlock {
                kind: BlockKind::Header,
                rendered: render_heading(level, &element.content),
            }),
            _ => {}
        }
    }
    if !list_run.is_empty() {
        blocks.push(EmittedBlock {
            kind: BlockKind::List,
            rendered: list_run.join("\n"),
        });
    }
    blocks
}
