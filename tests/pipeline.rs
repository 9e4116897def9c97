//! End-to-end pipeline tests: observations in, Markdown out.
//!
//! Every test drives the public [`Pipeline`] API with hand-built OCR
//! observations and a mock LLM client — no files, no network, no real OCR
//! engine.

use ocr2md::{
    CancelToken, ConversionConfig, ConversionOutcome, DocumentInfo, MockTextGenerator,
    ObservationKind, OcrObservation, Pipeline, TextGenerator, Warning,
};
use std::sync::Arc;

// ── Test helpers ─────────────────────────────────────────────────────────────

fn obs(x: f64, y: f64, w: f64, h: f64, text: &str, page: u32) -> OcrObservation {
    OcrObservation {
        x,
        y,
        width: w,
        height: h,
        text: text.to_string(),
        confidence: 0.9,
        kind: ObservationKind::Text,
        page_number: page,
    }
}

fn doc_info(pages: u32) -> DocumentInfo {
    DocumentInfo {
        page_count: pages,
        format: "pdf".to_string(),
        ..DocumentInfo::default()
    }
}

async fn run(observations: Vec<OcrObservation>, pages: u32) -> ConversionOutcome {
    Pipeline::new(ConversionConfig::default())
        .process_observations(observations, &doc_info(pages), &CancelToken::new())
        .await
        .expect("pipeline run failed")
}

// ── Scenario: simple single-page paragraph ───────────────────────────────────

#[tokio::test]
async fn simple_single_page_paragraph() {
    let outcome = run(vec![obs(0.1, 0.3, 0.3, 0.03, "Hello world", 1)], 1).await;
    assert_eq!(outcome.markdown, "Hello world\n");
}

// ── Scenario: page-number footers deduplicated ───────────────────────────────

#[tokio::test]
async fn page_number_footers_deduplicated() {
    let outcome = run(
        vec![
            obs(0.1, 0.30, 0.5, 0.03, "Body of the first page here", 1),
            obs(0.45, 0.95, 0.1, 0.03, "Page 1", 1),
            obs(0.1, 0.30, 0.5, 0.03, "Body of the second page here", 2),
            obs(0.45, 0.95, 0.1, 0.03, "Page 2", 2),
        ],
        2,
    )
    .await;

    assert!(!outcome.markdown.contains("Page 1"));
    assert!(!outcome.markdown.contains("Page 2"));
    assert_eq!(outcome.stats.duplicates_removed, 2);

    let first = outcome.markdown.find("first page").unwrap();
    let second = outcome.markdown.find("second page").unwrap();
    assert!(first < second, "body text must keep page order");
}

// ── Scenario: hyphenated line-wrap merged ────────────────────────────────────

#[tokio::test]
async fn hyphenated_line_wrap_merged() {
    let outcome = run(
        vec![
            obs(0.1, 0.40, 0.2, 0.03, "inter-", 1),
            obs(0.1, 0.44, 0.2, 0.03, "national", 1),
        ],
        1,
    )
    .await;
    assert_eq!(outcome.markdown, "international\n");
    assert_eq!(outcome.stats.merges_performed, 1);
}

// ── Scenario: numbered header hierarchy ──────────────────────────────────────

#[tokio::test]
async fn numbered_header_hierarchy() {
    let outcome = run(
        vec![
            obs(0.1, 0.10, 0.4, 0.03, "1 Introduction", 1),
            obs(0.1, 0.25, 0.4, 0.03, "1.1 Motivation", 1),
            obs(0.1, 0.40, 0.4, 0.03, "1.1.1 Example", 1),
        ],
        1,
    )
    .await;

    let lines: Vec<&str> = outcome.markdown.lines().filter(|l| !l.is_empty()).collect();
    assert_eq!(
        lines,
        vec!["# 1 Introduction", "## 1.1 Motivation", "### 1.1.1 Example"]
    );
}

// ── Scenario: CJK paragraph merges without spaces ────────────────────────────

#[tokio::test]
async fn cjk_fragments_merge_without_space() {
    let outcome = run(
        vec![
            obs(0.1, 0.20, 0.2, 0.03, "你好", 1),
            obs(0.1, 0.24, 0.2, 0.03, "世界", 1),
            // Enough Chinese prose for the detector to commit to zh.
            obs(0.1, 0.70, 0.6, 0.03, "这是一个用于测试的中文段落，包含足够多的文字供语言识别使用。", 1),
        ],
        1,
    )
    .await;

    assert_eq!(outcome.language.language.code(), "zh");
    assert!(outcome.markdown.contains("你好世界"));
}

// ── Scenario: multi-column reading order ─────────────────────────────────────

#[tokio::test]
async fn two_column_page_reads_left_column_first() {
    let outcome = run(
        vec![
            obs(0.55, 0.20, 0.3, 0.03, "Right column top paragraph", 1),
            obs(0.10, 0.50, 0.3, 0.03, "Left column bottom paragraph", 1),
            obs(0.10, 0.20, 0.3, 0.03, "Left column top paragraph", 1),
            obs(0.55, 0.50, 0.3, 0.03, "Right column bottom paragraph", 1),
        ],
        1,
    )
    .await;

    let positions: Vec<usize> = [
        "Left column top",
        "Left column bottom",
        "Right column top",
        "Right column bottom",
    ]
    .iter()
    .map(|needle| outcome.markdown.find(needle).expect("missing paragraph"))
    .collect();
    let mut sorted = positions.clone();
    sorted.sort_unstable();
    assert_eq!(positions, sorted, "expected column-major reading order");
}

// ── Lists ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn bullet_list_collapses_into_one_block() {
    let outcome = run(
        vec![
            obs(0.1, 0.20, 0.4, 0.03, "Shopping list overview paragraph", 1),
            obs(0.1, 0.30, 0.4, 0.03, "• apples from the market", 1),
            obs(0.1, 0.35, 0.4, 0.03, "• pears when in season", 1),
            obs(0.1, 0.40, 0.4, 0.03, "• plums for the cake", 1),
        ],
        1,
    )
    .await;

    assert!(outcome
        .markdown
        .contains("- apples from the market\n- pears when in season\n- plums for the cake"));
}

// ── Dedup monotonicity ───────────────────────────────────────────────────────

#[tokio::test]
async fn dedup_never_removes_body_text() {
    let body_pages: Vec<OcrObservation> = (1..=4)
        .flat_map(|page| {
            vec![
                obs(0.1, 0.3, 0.5, 0.03, "Identical body paragraph on every page", page),
                obs(0.4, 0.96, 0.2, 0.02, "Company Confidential", page),
            ]
        })
        .collect();
    let outcome = run(body_pages, 4).await;

    assert!(!outcome.markdown.contains("Company Confidential"));
    assert!(outcome.markdown.contains("Identical body paragraph"));
    assert_eq!(outcome.stats.duplicates_removed, 4);
}

// ── Tables and images pass through untouched ─────────────────────────────────

#[tokio::test]
async fn table_and_image_observations_survive() {
    let mut table = obs(0.1, 0.3, 0.6, 0.2, "alpha  beta\n1  2", 1);
    table.kind = ObservationKind::Table;
    let mut image = obs(0.1, 0.6, 0.4, 0.2, "", 1);
    image.kind = ObservationKind::Image;

    let outcome = run(vec![table, image], 1).await;
    assert!(outcome.markdown.contains("```\nalpha  beta\n1  2\n```"));
    assert!(outcome.markdown.contains("![](placeholder)"));
}

// ── LLM refinement ───────────────────────────────────────────────────────────

#[tokio::test]
async fn refinement_replaces_markdown_when_sane() {
    let mock = Arc::new(MockTextGenerator::replying(
        "# 1 Introduction\n\nPolished by the model.\n",
    ));
    let generator: Arc<dyn TextGenerator> = mock.clone();

    let config = ConversionConfig::builder().llm_enabled(true).build().unwrap();
    let outcome = Pipeline::new(config)
        .with_generator(generator)
        .process_observations(
            vec![
                obs(0.1, 0.10, 0.4, 0.03, "1 Introduction", 1),
                obs(0.1, 0.30, 0.4, 0.03, "Raw body paragraph text", 1),
            ],
            &doc_info(1),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert!(outcome.markdown.contains("Raw body paragraph text"));
    assert_eq!(
        outcome.refined_markdown.as_deref(),
        Some("# 1 Introduction\n\nPolished by the model.\n")
    );
    assert_eq!(outcome.best_markdown(), outcome.refined_markdown.as_deref().unwrap());

    let prompts = mock.recorded_prompts();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("# 1 Introduction"));
}

#[tokio::test]
async fn refinement_failure_keeps_ground_truth() {
    let generator: Arc<dyn TextGenerator> = Arc::new(MockTextGenerator::failing());
    let config = ConversionConfig::builder().llm_enabled(true).build().unwrap();

    let outcome = Pipeline::new(config)
        .with_generator(generator)
        .process_observations(
            vec![obs(0.1, 0.3, 0.4, 0.03, "Body text stays put", 1)],
            &doc_info(1),
            &CancelToken::new(),
        )
        .await
        .unwrap();

    assert_eq!(outcome.markdown, "Body text stays put\n");
    assert!(outcome.refined_markdown.is_none());
    assert!(matches!(
        outcome.warnings.as_slice(),
        [Warning::LlmUnavailable { .. }]
    ));
}

// ── Cancellation ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn cancellation_is_fatal_but_clean() {
    let cancel = CancelToken::new();
    cancel.cancel();
    let err = Pipeline::new(ConversionConfig::default())
        .process_observations(
            vec![obs(0.1, 0.3, 0.4, 0.03, "never processed", 1)],
            &doc_info(1),
            &cancel,
        )
        .await
        .unwrap_err();
    assert!(matches!(err, ocr2md::ConvertError::Cancelled));
}

// ── Invalid input surfaces at the boundary ───────────────────────────────────

#[tokio::test]
async fn out_of_bounds_observation_is_invalid_input() {
    let mut bad = obs(0.9, 0.3, 0.4, 0.03, "overflows the page", 1);
    bad.width = 0.5;
    let err = Pipeline::new(ConversionConfig::default())
        .process_observations(vec![bad], &doc_info(1), &CancelToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, ocr2md::ConvertError::InvalidInput { .. }));
}
