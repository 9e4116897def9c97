//! CLI binary for ocr2md.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `ConversionConfig`, runs the pipeline, and writes results.

use anyhow::{Context, Result};
use clap::Parser;
use ocr2md::prompts::MarkdownOptimizationArgs;
use ocr2md::{
    write_markdown_to_file, CancelToken, ConversionConfig, HttpTextGenerator, PageRange, Pipeline,
    PromptCatalog,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

// ── CLI definition ───────────────────────────────────────────────────────────

/// Reconstruct structured Markdown from positioned OCR output.
///
/// INPUT is a JSON document description: `{ "info": {...}, "observations":
/// [...] }` with normalized bounding boxes as produced by an OCR adapter.
#[derive(Parser, Debug)]
#[command(name = "ocr2md", version, about)]
struct Cli {
    /// Path to the JSON document description.
    input: PathBuf,

    /// Output Markdown file. Defaults to the input path with a .md extension.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Page selector: "all", "3", "1,3,5", "2-5", "3+", or "-4".
    #[arg(short, long, default_value = "all")]
    pages: String,

    /// Enable LLM refinement via a local inference server.
    #[arg(long)]
    llm: bool,

    /// Base URL of the inference server.
    #[arg(long, env = "OCR2MD_LLM_URL", default_value = HttpTextGenerator::DEFAULT_BASE_URL)]
    llm_url: String,

    /// Model name passed to the inference server.
    #[arg(long, env = "OCR2MD_LLM_MODEL", default_value = "llama3")]
    llm_model: String,

    /// Per-request LLM timeout in seconds.
    #[arg(long, default_value_t = 60)]
    llm_timeout: u64,

    /// Also refine tables, lists and headers through specialised prompts.
    #[arg(long)]
    per_element: bool,

    /// Write the raw element text (pre-Markdown) next to the output.
    #[arg(long)]
    emit_raw_text: bool,

    /// Write the LLM optimization prompt next to the output, without calling
    /// the model.
    #[arg(long)]
    emit_prompts: bool,

    /// Print the run statistics as JSON to stderr.
    #[arg(long)]
    stats: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let config = ConversionConfig::builder()
        .llm_enabled(cli.llm)
        .llm_request_timeout_secs(cli.llm_timeout)
        .per_element_refinement(cli.per_element)
        .build()?;

    let page_range = PageRange::parse(&cli.pages)?;

    let mut pipeline = Pipeline::new(config.clone());
    if cli.llm {
        let generator = HttpTextGenerator::new(
            &cli.llm_url,
            &cli.llm_model,
            Duration::from_secs(cli.llm_timeout),
        )?;
        pipeline = pipeline.with_generator(Arc::new(generator));
    }

    let outcome = pipeline
        .process_document(&cli.input, &page_range, &CancelToken::new())
        .await?;

    let output_path = cli
        .output
        .clone()
        .unwrap_or_else(|| cli.input.with_extension("md"));
    write_markdown_to_file(outcome.best_markdown(), &output_path).await?;
    println!(
        "{} {}",
        green("✓"),
        bold(&format!("Markdown written to {}", output_path.display()))
    );

    // ── Auxiliary artifacts ──────────────────────────────────────────────
    if cli.emit_raw_text {
        let raw_path = output_path.with_extension("txt");
        let raw: Vec<&str> = outcome
            .elements
            .iter()
            .map(|e| e.content.as_str())
            .filter(|c| !c.is_empty())
            .collect();
        tokio::fs::write(&raw_path, raw.join("\n"))
            .await
            .with_context(|| format!("writing raw text to {}", raw_path.display()))?;
        println!("{} raw text: {}", dim("·"), raw_path.display());
    }

    if cli.emit_prompts {
        let prompt_path = output_path.with_extension("prompt.txt");
        let catalog = PromptCatalog::new(config.llm.prompt_templates.clone());
        let prompt = catalog.markdown_optimization_prompt(
            outcome.language.language.code(),
            &MarkdownOptimizationArgs {
                document_title: "",
                page_count: outcome.stats.pages_processed as u32,
                element_count: outcome.elements.len(),
                document_context: "",
                detected_language: outcome.language.language.code(),
                language_confidence: outcome.language.confidence,
                markdown: &outcome.markdown,
            },
        );
        tokio::fs::write(&prompt_path, prompt)
            .await
            .with_context(|| format!("writing prompt to {}", prompt_path.display()))?;
        println!("{} prompt: {}", dim("·"), prompt_path.display());
    }

    for warning in &outcome.warnings {
        eprintln!("{} {warning}", yellow("warning:"));
    }

    if cli.stats {
        eprintln!("{}", serde_json::to_string_pretty(&outcome.stats)?);
    } else {
        println!(
            "{}",
            dim(&format!(
                "{} pages · {} elements · {} duplicates removed · {} merges · {}ms",
                outcome.stats.pages_processed,
                outcome.stats.output_elements,
                outcome.stats.duplicates_removed,
                outcome.stats.merges_performed,
                outcome.stats.total_duration_ms
            ))
        );
    }

    Ok(())
}
