//! Split-element merging.
//!
//! OCR engines report one observation per visual line, so logical elements
//! arrive fragmented: a paragraph becomes a stack of one-line TextBlocks, a
//! wrapped list item loses its continuation, a hyphenated word is cut in
//! half. This stage stitches fragments back together.
//!
//! Merging runs to a fixed point — each pass folds adjacent-in-reading-order
//! fragments and a second call over the output changes nothing — so the
//! stage is idempotent by construction.
//!
//! ## Join rules
//!
//! The separator between two joined fragments is `" "`, except:
//! * the left fragment ends in a letter-hyphen (a soft line-break hyphen):
//!   the hyphen is dropped and the join is empty, so `inter-` + `national`
//!   becomes `international`;
//! * the document language is CJK: the join is always empty.

use crate::config::ProcessingConfig;
use crate::element::{DocumentElement, ElementType};
use crate::language::Language;
use crate::pipeline::structure::leading_list_marker;

/// Title/Header absorption requires the two boxes to sit in the same
/// font-height band: heights within ±10% of the taller one.
const HEADER_HEIGHT_BAND: f64 = 0.10;

/// Merge split fragments. `elements` must already be in reading order.
/// Returns the merged sequence and the number of folds performed.
pub fn merge_elements(
    elements: Vec<DocumentElement>,
    language: Language,
    config: &ProcessingConfig,
) -> (Vec<DocumentElement>, usize) {
    let mut pages = split_by_page(elements);
    let mut total_merges = 0;

    // Fold to a fixed point: a fold can widen a box enough to enable the
    // next fold, so one pass is not always enough.
    loop {
        let mut changed = 0;

        for page in &mut pages {
            changed += fold_page(page, language, config);
        }
        changed += stitch_page_boundaries(&mut pages, language, config);

        total_merges += changed;
        if changed == 0 {
            break;
        }
    }

    (pages.into_iter().flatten().collect(), total_merges)
}

fn split_by_page(elements: Vec<DocumentElement>) -> Vec<Vec<DocumentElement>> {
    let mut pages: Vec<Vec<DocumentElement>> = Vec::new();
    for element in elements {
        match pages.last_mut() {
            Some(page) if page[0].page_number == element.page_number => page.push(element),
            _ => pages.push(vec![element]),
        }
    }
    pages
}

/// Fold adjacent fragments within one page. Returns the number of folds.
fn fold_page(page: &mut Vec<DocumentElement>, language: Language, config: &ProcessingConfig) -> usize {
    let mut merges = 0;
    let mut folded: Vec<DocumentElement> = Vec::with_capacity(page.len());

    for element in page.drain(..) {
        if let Some(current) = folded.last() {
            if let Some(merged) = try_merge(current, &element, language, false, config) {
                *folded.last_mut().unwrap() = merged;
                merges += 1;
                continue;
            }
        }
        folded.push(element);
    }

    *page = folded;
    merges
}

/// Merge the trailing fragment of each page with the leading fragment of the
/// next where the column criterion holds. Returns the number of folds.
fn stitch_page_boundaries(
    pages: &mut [Vec<DocumentElement>],
    language: Language,
    config: &ProcessingConfig,
) -> usize {
    let mut merges = 0;

    for boundary in 1..pages.len() {
        let (left_pages, right_pages) = pages.split_at_mut(boundary);
        let left = left_pages.last_mut().unwrap();
        let right = &mut right_pages[0];

        let (Some(last), Some(first)) = (left.last(), right.first()) else {
            continue;
        };
        if last.page_number + 1 != first.page_number {
            continue;
        }
        // Running headers/footers never continue body text.
        if last.is_header_footer_candidate() || first.is_header_footer_candidate() {
            continue;
        }
        if let Some(merged) = try_merge(last, first, language, true, config) {
            *left.last_mut().unwrap() = merged;
            right.remove(0);
            merges += 1;
        }
    }

    merges
}

/// Attempt to fold `b` into `a`. `ignore_gap` relaxes the vertical-gap check
/// for page boundaries, where the gap is an artifact of pagination.
fn try_merge(
    a: &DocumentElement,
    b: &DocumentElement,
    language: Language,
    ignore_gap: bool,
    config: &ProcessingConfig,
) -> Option<DocumentElement> {
    if !a.element_type.is_text_bearing() || !b.element_type.is_text_bearing() {
        return None;
    }

    let boxes = (&a.bounding_box, &b.bounding_box);
    if !ignore_gap && boxes.0.vertical_gap(boxes.1) > config.merge_distance_threshold {
        return None;
    }
    let column_aligned = boxes.0.horizontal_overlap_ratio(boxes.1) >= 0.5
        || (boxes.1.x - boxes.0.x).abs() <= config.indent_tolerance;
    if !column_aligned {
        return None;
    }

    match (a.element_type, b.element_type) {
        // Continuation line of a wrapped list item: no new marker, indented
        // at or past the item's own start.
        (ElementType::ListItem, ElementType::TextBlock) => {
            if leading_list_marker(&b.content).is_none() && boxes.1.x > boxes.0.x {
                Some(a.merged_with(b, join_content(&a.content, &b.content, language)))
            } else {
                None
            }
        }

        // A wrapped title/header absorbs a trailing fragment set in the same
        // font-height band.
        (ElementType::Title | ElementType::Header(_), ElementType::TextBlock) => {
            let tall = boxes.0.height.max(boxes.1.height);
            if (boxes.0.height - boxes.1.height).abs() <= HEADER_HEIGHT_BAND * tall {
                Some(a.merged_with(b, join_content(&a.content, &b.content, language)))
            } else {
                None
            }
        }

        (
            ElementType::TextBlock | ElementType::Paragraph,
            ElementType::TextBlock | ElementType::Paragraph,
        ) => Some(a.merged_with(b, join_content(&a.content, &b.content, language))),

        _ => None,
    }
}

/// Join two fragments, handling soft line-break hyphens and CJK spacing.
fn join_content(left: &str, right: &str, language: Language) -> String {
    if let Some(stem) = left.strip_suffix('-') {
        if stem.chars().last().is_some_and(char::is_alphabetic) {
            return format!("{stem}{right}");
        }
    }
    if language.is_cjk() {
        format!("{left}{right}")
    } else {
        format!("{left} {right}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::{BoundingBox, META_FRAGMENT_COUNT, META_REGION};

    fn text_block(content: &str, x: f64, y: f64, w: f64, h: f64, page: u32, index: u64) -> DocumentElement {
        DocumentElement::new(
            ElementType::TextBlock,
            BoundingBox::new(x, y, w, h).unwrap(),
            content,
            0.9,
            page,
            index,
        )
        .unwrap()
    }

    fn merge(elements: Vec<DocumentElement>) -> Vec<DocumentElement> {
        merge_elements(elements, Language::En, &ProcessingConfig::default()).0
    }

    #[test]
    fn test_adjacent_lines_merge_with_space() {
        let out = merge(vec![
            text_block("The quick brown", 0.1, 0.40, 0.3, 0.03, 1, 0),
            text_block("fox jumps over", 0.1, 0.44, 0.3, 0.03, 1, 1),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "The quick brown fox jumps over");
        assert_eq!(out[0].meta(META_FRAGMENT_COUNT), Some("2"));
    }

    #[test]
    fn test_hyphenated_wrap_merges_without_space() {
        let out = merge(vec![
            text_block("inter-", 0.1, 0.40, 0.2, 0.03, 1, 0),
            text_block("national", 0.1, 0.44, 0.2, 0.03, 1, 1),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "international");
    }

    #[test]
    fn test_numeric_hyphen_keeps_hyphen() {
        // "2023-" is a number range cut at the line break, not a soft hyphen.
        let out = merge(vec![
            text_block("2023-", 0.1, 0.40, 0.2, 0.03, 1, 0),
            text_block("2024 season", 0.1, 0.44, 0.2, 0.03, 1, 1),
        ]);
        assert_eq!(out[0].content, "2023- 2024 season");
    }

    #[test]
    fn test_cjk_merges_without_space() {
        let (out, _) = merge_elements(
            vec![
                text_block("你好", 0.1, 0.40, 0.2, 0.03, 1, 0),
                text_block("世界", 0.1, 0.44, 0.2, 0.03, 1, 1),
            ],
            Language::Zh,
            &ProcessingConfig::default(),
        );
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].content, "你好世界");
    }

    #[test]
    fn test_wide_gap_does_not_merge() {
        let out = merge(vec![
            text_block("First paragraph", 0.1, 0.20, 0.3, 0.03, 1, 0),
            text_block("Second paragraph", 0.1, 0.40, 0.3, 0.03, 1, 1),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_different_columns_do_not_merge() {
        let out = merge(vec![
            text_block("left column", 0.1, 0.40, 0.3, 0.03, 1, 0),
            text_block("right column", 0.55, 0.44, 0.3, 0.03, 1, 1),
        ]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_list_item_continuation_absorbed() {
        let mut item = text_block("first step of the recipe", 0.10, 0.40, 0.4, 0.03, 1, 0);
        item.element_type = ElementType::ListItem;
        let continuation = text_block("which continues here", 0.13, 0.44, 0.35, 0.03, 1, 1);
        let out = merge(vec![item, continuation]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].element_type, ElementType::ListItem);
        assert_eq!(out[0].content, "first step of the recipe which continues here");
    }

    #[test]
    fn test_new_marker_starts_new_item() {
        let mut item = text_block("first step", 0.10, 0.40, 0.4, 0.03, 1, 0);
        item.element_type = ElementType::ListItem;
        let next = text_block("- second step", 0.12, 0.44, 0.4, 0.03, 1, 1);
        let out = merge(vec![item, next]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_header_absorbs_same_band_fragment() {
        let mut header = text_block("Results and", 0.1, 0.10, 0.3, 0.04, 1, 0);
        header.element_type = ElementType::Header(2);
        let tail = text_block("Discussion", 0.1, 0.15, 0.25, 0.04, 1, 1);
        let out = merge(vec![header, tail]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].element_type, ElementType::Header(2));
        assert_eq!(out[0].content, "Results and Discussion");
    }

    #[test]
    fn test_header_rejects_body_sized_fragment() {
        let mut header = text_block("Results", 0.1, 0.10, 0.3, 0.05, 1, 0);
        header.element_type = ElementType::Header(2);
        let body = text_block("The measurements show", 0.1, 0.16, 0.3, 0.03, 1, 1);
        let out = merge(vec![header, body]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_cross_page_merge_keeps_first_page() {
        let out = merge(vec![
            text_block("carried over to the", 0.1, 0.90, 0.3, 0.03, 1, 0),
            text_block("next page smoothly", 0.1, 0.05, 0.3, 0.03, 2, 1),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].page_number, 1);
        assert_eq!(out[0].content, "carried over to the next page smoothly");
    }

    #[test]
    fn test_cross_page_skips_header_footer_candidates() {
        let trailing = text_block("body text at page end", 0.1, 0.85, 0.3, 0.03, 1, 0);
        let leading = text_block("Running header", 0.1, 0.02, 0.3, 0.03, 2, 1)
            .with_meta(META_REGION, "header");
        let out = merge(vec![trailing, leading]);
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_merge_is_idempotent() {
        let config = ProcessingConfig::default();
        let input = vec![
            text_block("A long paragraph that", 0.1, 0.40, 0.3, 0.03, 1, 0),
            text_block("wraps over three", 0.1, 0.44, 0.3, 0.03, 1, 1),
            text_block("separate lines", 0.1, 0.48, 0.3, 0.03, 1, 2),
            text_block("Unrelated far-away block", 0.1, 0.80, 0.3, 0.03, 1, 3),
        ];
        let (once, merges) = merge_elements(input, Language::En, &config);
        assert_eq!(merges, 2);
        let (twice, rerun_merges) = merge_elements(once.clone(), Language::En, &config);
        assert_eq!(rerun_merges, 0);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_images_never_merge() {
        let mut image = text_block("", 0.1, 0.40, 0.3, 0.03, 1, 0);
        image.element_type = ElementType::Image;
        let caption = text_block("Figure text", 0.1, 0.44, 0.3, 0.03, 1, 1);
        let out = merge(vec![image, caption]);
        assert_eq!(out.len(), 2);
    }
}
