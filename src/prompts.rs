//! Language-keyed prompt templates for LLM refinement.
//!
//! Centralising every prompt here serves two purposes:
//!
//! 1. **Single source of truth** — changing the refinement behaviour (e.g.
//!    tightening the table rules) requires editing exactly one place.
//!
//! 2. **Testability** — unit tests can inspect rendered prompts directly
//!    without a live model, making prompt regressions easy to catch.
//!
//! Templates contain `{name}` placeholders. Substitution replaces the known
//! names and leaves unknown placeholders literally, so a template author can
//! write `{braces}` without fighting the renderer. Lookup resolves requested
//! language → configured default → configured fallback → built-in English.

use crate::config::PromptTemplatesConfig;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// The prompts the refinement orchestrator can ask for, in one language.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplateSet {
    pub system: String,
    pub markdown_optimization: String,
    pub structure_analysis: String,
    pub table_optimization: String,
    pub list_optimization: String,
    pub header_optimization: String,
    pub technical_standard: String,
}

impl Default for PromptTemplateSet {
    fn default() -> Self {
        builtin_english()
    }
}

/// Inputs for the whole-document optimization prompt.
#[derive(Debug, Clone)]
pub struct MarkdownOptimizationArgs<'a> {
    pub document_title: &'a str,
    pub page_count: u32,
    pub element_count: usize,
    pub document_context: &'a str,
    pub detected_language: &'a str,
    pub language_confidence: f64,
    pub markdown: &'a str,
}

/// Inputs for the structure-analysis prompt.
#[derive(Debug, Clone)]
pub struct StructureAnalysisArgs<'a> {
    pub document_type: &'a str,
    pub element_count: usize,
    pub detected_language: &'a str,
    pub element_descriptions: &'a str,
}

/// The language-keyed catalogue: user overrides layered over the built-ins.
#[derive(Debug, Clone)]
pub struct PromptCatalog {
    config: PromptTemplatesConfig,
}

impl PromptCatalog {
    pub fn new(config: PromptTemplatesConfig) -> Self {
        Self { config }
    }

    pub fn system_prompt(&self, lang: &str) -> String {
        self.resolve(lang).system.clone()
    }

    pub fn markdown_optimization_prompt(
        &self,
        lang: &str,
        args: &MarkdownOptimizationArgs<'_>,
    ) -> String {
        render(
            &self.resolve(lang).markdown_optimization,
            &[
                ("documentTitle", args.document_title.to_string()),
                ("pageCount", args.page_count.to_string()),
                ("elementCount", args.element_count.to_string()),
                ("documentContext", args.document_context.to_string()),
                ("detectedLanguage", args.detected_language.to_string()),
                (
                    "languageConfidence",
                    format!("{:.2}", args.language_confidence),
                ),
                ("markdown", args.markdown.to_string()),
            ],
        )
    }

    pub fn structure_analysis_prompt(&self, lang: &str, args: &StructureAnalysisArgs<'_>) -> String {
        render(
            &self.resolve(lang).structure_analysis,
            &[
                ("documentType", args.document_type.to_string()),
                ("elementCount", args.element_count.to_string()),
                ("detectedLanguage", args.detected_language.to_string()),
                (
                    "elementDescriptions",
                    args.element_descriptions.to_string(),
                ),
            ],
        )
    }

    pub fn table_optimization_prompt(&self, lang: &str, table_content: &str) -> String {
        render(
            &self.resolve(lang).table_optimization,
            &[("tableContent", table_content.to_string())],
        )
    }

    pub fn list_optimization_prompt(&self, lang: &str, list_content: &str) -> String {
        render(
            &self.resolve(lang).list_optimization,
            &[("listContent", list_content.to_string())],
        )
    }

    pub fn header_optimization_prompt(&self, lang: &str, header_content: &str) -> String {
        render(
            &self.resolve(lang).header_optimization,
            &[("headerContent", header_content.to_string())],
        )
    }

    pub fn technical_standard_prompt(&self, lang: &str) -> String {
        self.resolve(lang).technical_standard.clone()
    }

    /// Resolution chain: requested → configured default → configured
    /// fallback → built-in English. Each step checks user overrides before
    /// the built-in catalogue.
    fn resolve(&self, lang: &str) -> PromptTemplateSet {
        let chain = [
            lang,
            self.config.default_language.as_str(),
            self.config.fallback_language.as_str(),
        ];
        for code in chain {
            if let Some(set) = self.config.languages.get(code) {
                return set.clone();
            }
            if let Some(set) = builtin(code) {
                return set;
            }
        }
        builtin_english()
    }
}

static RE_PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\{([A-Za-z][A-Za-z0-9]*)\}").unwrap());

/// Substitute known `{name}` placeholders; unknown names stay literal.
fn render(template: &str, values: &[(&str, String)]) -> String {
    RE_PLACEHOLDER
        .replace_all(template, |caps: &regex::Captures<'_>| {
            let name = &caps[1];
            values
                .iter()
                .find(|(key, _)| *key == name)
                .map(|(_, value)| value.clone())
                .unwrap_or_else(|| caps[0].to_string())
        })
        .to_string()
}

// ── Built-in catalogue ───────────────────────────────────────────────────

fn builtin(lang: &str) -> Option<PromptTemplateSet> {
    match lang {
        "en" => Some(builtin_english()),
        "zh" => Some(builtin_chinese()),
        _ => None,
    }
}

fn builtin_english() -> PromptTemplateSet {
    PromptTemplateSet {
        system: SYSTEM_EN.to_string(),
        markdown_optimization: MARKDOWN_OPTIMIZATION_EN.to_string(),
        structure_analysis: STRUCTURE_ANALYSIS_EN.to_string(),
        table_optimization: TABLE_OPTIMIZATION_EN.to_string(),
        list_optimization: LIST_OPTIMIZATION_EN.to_string(),
        header_optimization: HEADER_OPTIMIZATION_EN.to_string(),
        technical_standard: TECHNICAL_STANDARD_EN.to_string(),
    }
}

fn builtin_chinese() -> PromptTemplateSet {
    PromptTemplateSet {
        system: SYSTEM_ZH.to_string(),
        markdown_optimization: MARKDOWN_OPTIMIZATION_ZH.to_string(),
        structure_analysis: STRUCTURE_ANALYSIS_ZH.to_string(),
        table_optimization: TABLE_OPTIMIZATION_ZH.to_string(),
        list_optimization: LIST_OPTIMIZATION_ZH.to_string(),
        header_optimization: HEADER_OPTIMIZATION_ZH.to_string(),
        technical_standard: TECHNICAL_STANDARD_ZH.to_string(),
    }
}

const SYSTEM_EN: &str = r#"You are an expert technical editor. You receive Markdown that was reconstructed from OCR output and improve its structure and formatting.

Follow these rules precisely:

1. PRESERVE CONTENT
   - Never add, remove, or reword document content
   - Fix only structure, formatting, and obvious OCR artefacts

2. STRUCTURE
   - Keep the existing heading hierarchy; never renumber sections
   - Keep list nesting and markers consistent

3. OUTPUT FORMAT
   - Output ONLY the Markdown content
   - Do NOT wrap the output in ```markdown fences
   - Do NOT add commentary or explanations"#;

const MARKDOWN_OPTIMIZATION_EN: &str = r#"The following Markdown was reconstructed from OCR output of "{documentTitle}" ({pageCount} pages, {elementCount} elements). Detected language: {detectedLanguage} (confidence {languageConfidence}).

Context: {documentContext}

Improve the formatting without changing any content. Fix broken line wraps, inconsistent list markers, and malformed tables. Keep every heading exactly as written.

{markdown}"#;

const STRUCTURE_ANALYSIS_EN: &str = r#"Analyse the structure of a {documentType} document with {elementCount} elements (language: {detectedLanguage}).

Elements:
{elementDescriptions}

Describe the logical hierarchy: which elements are section headings, which group into lists, and where tables begin and end."#;

const TABLE_OPTIMIZATION_EN: &str = r#"Reformat the following table as a well-formed GitHub-flavoured pipe table. Keep every cell value unchanged.

{tableContent}"#;

const LIST_OPTIMIZATION_EN: &str = r#"Reformat the following list with consistent markers and indentation. Keep every item's text unchanged.

{listContent}"#;

const HEADER_OPTIMIZATION_EN: &str = r#"Normalise the following heading: remove stray OCR artefacts, keep the numbering and the text unchanged.

{headerContent}"#;

const TECHNICAL_STANDARD_EN: &str = r#"This document is a technical standard. Preserve clause numbering exactly, keep normative keywords (shall, should, may) unchanged, and retain all cross-references in their original form."#;

const SYSTEM_ZH: &str = r#"你是一名专业的技术编辑。你会收到由 OCR 输出重建的 Markdown 文本，请改进其结构和格式。

请严格遵循以下规则：

1. 保留内容
   - 不得增加、删除或改写文档内容
   - 只修正结构、格式和明显的 OCR 错误

2. 结构
   - 保持现有标题层级，不要重新编号
   - 保持列表的嵌套和标记一致

3. 输出格式
   - 只输出 Markdown 内容
   - 不要用 ```markdown 代码块包裹输出
   - 不要添加任何评论或解释"#;

const MARKDOWN_OPTIMIZATION_ZH: &str = r#"以下 Markdown 由《{documentTitle}》（共 {pageCount} 页，{elementCount} 个元素）的 OCR 输出重建而成。检测语言：{detectedLanguage}（置信度 {languageConfidence}）。

背景：{documentContext}

请在不改变任何内容的前提下改进格式：修复断行、统一列表标记、修正表格。所有标题保持原样。

{markdown}"#;

const STRUCTURE_ANALYSIS_ZH: &str = r#"请分析一份 {documentType} 文档的结构，共 {elementCount} 个元素（语言：{detectedLanguage}）。

元素：
{elementDescriptions}

请描述其逻辑层级：哪些元素是章节标题，哪些构成列表，表格的起止位置。"#;

const TABLE_OPTIMIZATION_ZH: &str = r#"请将下表重排为规范的 GitHub 管道表格，单元格内容保持不变。

{tableContent}"#;

const LIST_OPTIMIZATION_ZH: &str = r#"请统一以下列表的标记和缩进，每项文字保持不变。

{listContent}"#;

const HEADER_OPTIMIZATION_ZH: &str = r#"请规范以下标题：去除 OCR 杂质，编号和文字保持不变。

{headerContent}"#;

const TECHNICAL_STANDARD_ZH: &str = r#"本文档为技术标准。请严格保留条款编号，保持规范性用语（应、宜、可）不变，并保留所有交叉引用的原始形式。"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PromptTemplatesConfig;

    fn catalog() -> PromptCatalog {
        PromptCatalog::new(PromptTemplatesConfig::default())
    }

    #[test]
    fn test_substitution_fills_known_placeholders() {
        let prompt = catalog().markdown_optimization_prompt(
            "en",
            &MarkdownOptimizationArgs {
                document_title: "Quarterly Report",
                page_count: 12,
                element_count: 345,
                document_context: "financial report",
                detected_language: "en",
                language_confidence: 0.8731,
                markdown: "# Heading\n\nBody.",
            },
        );
        assert!(prompt.contains("Quarterly Report"));
        assert!(prompt.contains("12 pages"));
        assert!(prompt.contains("345 elements"));
        assert!(prompt.contains("confidence 0.87"));
        assert!(prompt.contains("# Heading"));
        assert!(!prompt.contains("{markdown}"));
    }

    #[test]
    fn test_unknown_placeholder_left_literal() {
        let mut config = PromptTemplatesConfig::default();
        let mut set = PromptTemplateSet::default();
        set.table_optimization = "Fix {tableContent} but keep {mystery}".to_string();
        config.languages.insert("en".to_string(), set);
        let prompt = PromptCatalog::new(config).table_optimization_prompt("en", "| a |");
        assert!(prompt.contains("| a |"));
        assert!(prompt.contains("{mystery}"));
    }

    #[test]
    fn test_unknown_language_falls_back_to_english() {
        let prompt = catalog().system_prompt("fr");
        assert!(prompt.contains("expert technical editor"));
    }

    #[test]
    fn test_chinese_builtin_resolves() {
        let prompt = catalog().system_prompt("zh");
        assert!(prompt.contains("技术编辑"));
    }

    #[test]
    fn test_configured_default_language_wins_over_builtin_english() {
        let mut config = PromptTemplatesConfig::default();
        config.default_language = "zh".to_string();
        let prompt = PromptCatalog::new(config).system_prompt("fr");
        assert!(prompt.contains("技术编辑"));
    }

    #[test]
    fn test_user_override_beats_builtin() {
        let mut config = PromptTemplatesConfig::default();
        let mut set = PromptTemplateSet::default();
        set.system = "custom system prompt".to_string();
        config.languages.insert("en".to_string(), set);
        let prompt = PromptCatalog::new(config).system_prompt("en");
        assert_eq!(prompt, "custom system prompt");
    }

    #[test]
    fn test_confidence_renders_two_decimals() {
        let prompt = catalog().markdown_optimization_prompt(
            "en",
            &MarkdownOptimizationArgs {
                document_title: "t",
                page_count: 1,
                element_count: 1,
                document_context: "",
                detected_language: "en",
                language_confidence: 1.0,
                markdown: "",
            },
        );
        assert!(prompt.contains("1.00"));
    }
}
