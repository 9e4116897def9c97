//! Markdown emission: ordered elements → UTF-8 Markdown text.
//!
//! One block per element in reading order, with three wrinkles:
//!
//! * consecutive list items collapse into a single list block, indented two
//!   spaces per nesting level;
//! * footnotes are collected and emitted together at the document end;
//! * tables emit as GFM pipe tables when row/column metadata is present and
//!   as a fenced verbatim block when it is not.
//!
//! The assembled text then runs through a small set of deterministic cleanup
//! rules (line endings, trailing whitespace, blank-line collapse, single
//! final newline) so the output is byte-stable regardless of how the blocks
//! were produced.

use crate::element::{
    DocumentElement, ElementType, META_CAPTION, META_FOOTNOTE_NUMBER, META_INDENT_LEVEL,
    META_LIST_MARKER, META_TABLE_COLS, META_TABLE_ROWS,
};
use crate::error::ConvertError;
use once_cell::sync::Lazy;
use regex::Regex;

/// Serialise ordered elements to Markdown.
///
/// The output uses LF line endings and ends with exactly one trailing
/// newline. Fails with [`ConvertError::MarkdownGenerationFailed`] when a
/// header level is out of range — the structure detector must never let
/// that happen.
pub fn emit_markdown(elements: &[DocumentElement]) -> Result<String, ConvertError> {
    let mut blocks: Vec<String> = Vec::new();
    let mut footnotes: Vec<String> = Vec::new();
    let mut list_run: Vec<String> = Vec::new();

    for element in elements {
        if element.element_type != ElementType::ListItem && !list_run.is_empty() {
            blocks.push(list_run.join("\n"));
            list_run.clear();
        }

        match element.element_type {
            ElementType::Title => {
                blocks.push(render_heading(1, &element.content));
            }
            ElementType::Header(level) => {
                if !(1..=6).contains(&level) {
                    return Err(ConvertError::MarkdownGenerationFailed(format!(
                        "header level {level} out of range 1..6"
                    )));
                }
                blocks.push(render_heading(level, &element.content));
            }
            ElementType::Paragraph | ElementType::TextBlock | ElementType::List => {
                if !element.content.is_empty() {
                    blocks.push(escape_markdown(&element.content));
                }
            }
            ElementType::ListItem => {
                list_run.push(render_list_item(element));
            }
            ElementType::Table => {
                blocks.push(render_table(element));
            }
            ElementType::Image => {
                let alt = element.meta(META_CAPTION).unwrap_or_default();
                blocks.push(format!("![{}](placeholder)", escape_markdown(alt)));
            }
            ElementType::Barcode => {
                if !element.content.is_empty() {
                    blocks.push(format!("`{}`", element.content));
                }
            }
            ElementType::Footnote => {
                let number = element
                    .meta(META_FOOTNOTE_NUMBER)
                    .map(str::to_string)
                    .unwrap_or_else(|| (footnotes.len() + 1).to_string());
                footnotes.push(format!(
                    "[^{number}]: {}",
                    escape_markdown(&element.content)
                ));
            }
            ElementType::Caption => {
                blocks.push(format!("*{}*", escape_markdown(&element.content)));
            }
        }
    }

    if !list_run.is_empty() {
        blocks.push(list_run.join("\n"));
    }
    if !footnotes.is_empty() {
        blocks.push(footnotes.join("\n"));
    }

    Ok(clean_markdown(&blocks.join("\n\n")))
}

pub(crate) fn render_heading(level: u8, content: &str) -> String {
    format!("{} {}", "#".repeat(level as usize), escape_markdown(content))
}

pub(crate) fn render_list_item(element: &DocumentElement) -> String {
    let depth: usize = element
        .meta(META_INDENT_LEVEL)
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    let marker = normalise_marker(element.meta(META_LIST_MARKER).unwrap_or("-"));
    format!(
        "{}{} {}",
        "  ".repeat(depth),
        marker,
        escape_markdown(&element.content)
    )
}

/// Bullet glyphs that are not Markdown list markers render as `-`;
/// everything else (numeric, alphabetic, roman, CJK) keeps its literal form.
fn normalise_marker(marker: &str) -> String {
    match marker {
        "•" | "·" | "▪" | "◦" | "–" | "—" | "-" | "*" => "-".to_string(),
        other => other.to_string(),
    }
}

/// Emit a GFM pipe table when structural metadata is present; otherwise the
/// content goes verbatim into a fenced block.
pub(crate) fn render_table(element: &DocumentElement) -> String {
    let has_shape =
        element.meta(META_TABLE_ROWS).is_some() && element.meta(META_TABLE_COLS).is_some();
    if !has_shape {
        return format!("```\n{}\n```", element.content);
    }

    let cols: usize = element
        .meta(META_TABLE_COLS)
        .and_then(|v| v.parse().ok())
        .unwrap_or(1)
        .max(1);

    let mut lines: Vec<String> = Vec::new();
    for (row_index, row) in element.content.lines().enumerate() {
        let mut cells: Vec<String> = row
            .split('\t')
            .map(|cell| escape_markdown(cell.trim()).replace('|', "\\|"))
            .collect();
        cells.resize(cols, String::new());
        lines.push(format!("| {} |", cells.join(" | ")));
        if row_index == 0 {
            lines.push(format!("|{}", " --- |".repeat(cols)));
        }
    }
    lines.join("\n")
}

static RE_MARKDOWN_SPECIAL: Lazy<Regex> = Lazy::new(|| Regex::new(r"([*_`\[\]])").unwrap());

fn escape_markdown(text: &str) -> String {
    RE_MARKDOWN_SPECIAL.replace_all(text, r"\$1").to_string()
}

// ── Cleanup rules ────────────────────────────────────────────────────────
//
// Applied in order: normalise line endings before trimming, collapse blank
// runs before the final-newline pass.

fn clean_markdown(input: &str) -> String {
    let s = normalise_line_endings(input);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    ensure_final_newline(&s)
}

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

fn ensure_final_newline(input: &str) -> String {
    let trimmed = input.trim_end();
    if trimmed.is_empty() {
        String::from("\n")
    } else {
        format!("{}\n", trimmed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::BoundingBox;

    fn element(element_type: ElementType, content: &str, index: u64) -> DocumentElement {
        DocumentElement::new(
            element_type,
            BoundingBox::new(0.1, 0.1 + index as f64 * 0.05, 0.4, 0.03).unwrap(),
            content,
            0.9,
            1,
            index,
        )
        .unwrap()
    }

    #[test]
    fn test_single_paragraph() {
        let md = emit_markdown(&[element(ElementType::Paragraph, "Hello world", 0)]).unwrap();
        assert_eq!(md, "Hello world\n");
    }

    #[test]
    fn test_empty_input_is_single_newline() {
        assert_eq!(emit_markdown(&[]).unwrap(), "\n");
    }

    #[test]
    fn test_title_and_headers() {
        let md = emit_markdown(&[
            element(ElementType::Title, "Report", 0),
            element(ElementType::Header(2), "Findings", 1),
            element(ElementType::Paragraph, "Body text.", 2),
        ])
        .unwrap();
        assert_eq!(md, "# Report\n\n## Findings\n\nBody text.\n");
    }

    #[test]
    fn test_header_level_out_of_range_is_fatal() {
        let err = emit_markdown(&[element(ElementType::Header(7), "Too deep", 0)]).unwrap_err();
        assert!(matches!(err, ConvertError::MarkdownGenerationFailed(_)));
    }

    #[test]
    fn test_consecutive_list_items_collapse() {
        let one = element(ElementType::ListItem, "first", 0).with_meta(META_LIST_MARKER, "-");
        let two = element(ElementType::ListItem, "second", 1).with_meta(META_LIST_MARKER, "-");
        let after = element(ElementType::Paragraph, "After the list.", 2);
        let md = emit_markdown(&[one, two, after]).unwrap();
        assert_eq!(md, "- first\n- second\n\nAfter the list.\n");
    }

    #[test]
    fn test_nested_list_indentation() {
        let outer = element(ElementType::ListItem, "outer", 0)
            .with_meta(META_LIST_MARKER, "•")
            .with_meta(META_INDENT_LEVEL, "0");
        let inner = element(ElementType::ListItem, "inner", 1)
            .with_meta(META_LIST_MARKER, "•")
            .with_meta(META_INDENT_LEVEL, "1");
        let md = emit_markdown(&[outer, inner]).unwrap();
        assert_eq!(md, "- outer\n  - inner\n");
    }

    #[test]
    fn test_numeric_marker_kept_literal() {
        let item = element(ElementType::ListItem, "step", 0).with_meta(META_LIST_MARKER, "3.");
        let md = emit_markdown(&[item]).unwrap();
        assert_eq!(md, "3. step\n");
    }

    #[test]
    fn test_table_with_shape_renders_gfm() {
        let table = element(ElementType::Table, "Name\tAge\nAda\t36", 0)
            .with_meta(META_TABLE_ROWS, "2")
            .with_meta(META_TABLE_COLS, "2");
        let md = emit_markdown(&[table]).unwrap();
        assert_eq!(md, "| Name | Age |\n| --- | --- |\n| Ada | 36 |\n");
    }

    #[test]
    fn test_table_without_shape_renders_fenced() {
        let table = element(ElementType::Table, "raw cell soup", 0);
        let md = emit_markdown(&[table]).unwrap();
        assert_eq!(md, "```\nraw cell soup\n```\n");
    }

    #[test]
    fn test_image_uses_caption_alt() {
        let image = element(ElementType::Image, "", 0).with_meta(META_CAPTION, "A chart");
        let md = emit_markdown(&[image]).unwrap();
        assert_eq!(md, "![A chart](placeholder)\n");
    }

    #[test]
    fn test_footnotes_collected_at_end() {
        let md = emit_markdown(&[
            element(ElementType::Footnote, "See appendix.", 0),
            element(ElementType::Paragraph, "Main text.", 1),
        ])
        .unwrap();
        assert_eq!(md, "Main text.\n\n[^1]: See appendix.\n");
    }

    #[test]
    fn test_caption_is_italic() {
        let md = emit_markdown(&[element(ElementType::Caption, "Figure 1: flow", 0)]).unwrap();
        assert_eq!(md, "*Figure 1: flow*\n");
    }

    #[test]
    fn test_special_characters_escaped() {
        let md = emit_markdown(&[element(
            ElementType::Paragraph,
            "use *stars* and [brackets]_now_",
            0,
        )])
        .unwrap();
        assert_eq!(md, "use \\*stars\\* and \\[brackets\\]\\_now\\_\n");
    }

    #[test]
    fn test_fenced_table_content_not_escaped() {
        let table = element(ElementType::Table, "a*b_c", 0);
        let md = emit_markdown(&[table]).unwrap();
        assert!(md.contains("a*b_c"));
    }

    #[test]
    fn test_cleanup_single_trailing_newline() {
        let md = emit_markdown(&[element(ElementType::Paragraph, "end", 0)]).unwrap();
        assert!(md.ends_with("end\n"));
        assert!(!md.ends_with("\n\n"));
    }
}
