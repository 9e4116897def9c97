//! Structure detection: header levels and list markers.
//!
//! Works on the merged element stream. Two passes:
//!
//! 1. **List detection** — an element whose content opens with a recognised
//!    marker token becomes a ListItem; the marker is stripped into
//!    `listMarker` metadata and the x-start buckets into `indentLevel`.
//! 2. **Header levelling** — header candidates (pre-typed headers, numbered
//!    section titles, conspicuously tall short lines) are ranked by
//!    font-height cluster; a hierarchical numbering pattern (`1.2.3`,
//!    `第一章`) overrides the height rank with its depth. Levels cap at 6.
//!
//! Remaining TextBlocks are promoted to Paragraph — after this stage the
//! stream carries final element types only.

use crate::config::ProcessingConfig;
use crate::element::{
    DocumentElement, ElementType, META_HEADER_LEVEL, META_INDENT_LEVEL, META_LIST_MARKER,
};
use once_cell::sync::Lazy;
use regex::Regex;

/// Heights within this relative tolerance fall into one cluster.
const HEIGHT_CLUSTER_TOLERANCE: f64 = 0.05;

/// A header candidate by height must be at least this much taller than the
/// document's median text height.
const HEADER_HEIGHT_FACTOR: f64 = 1.2;

/// Headers are short: more words than this and a line is body text no matter
/// how it is set.
const MAX_HEADER_WORDS: usize = 12;

// ── List markers ─────────────────────────────────────────────────────────

/// The family of a list item's leading token.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarkerClass {
    Bullet,
    Numeric,
    Alphabetic,
    Roman,
    Cjk,
}

/// A recognised leading list marker.
#[derive(Debug, Clone, PartialEq)]
pub struct ListMarker {
    pub class: MarkerClass,
    /// The literal marker token, e.g. `•`, `3.`, `（二）`.
    pub marker: String,
    /// Byte offset where the item content starts.
    pub content_start: usize,
}

static RE_BULLET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([•·*\-–—▪◦])\s+").unwrap());
static RE_NUMERIC: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+[.)])\s+").unwrap());
static RE_LETTERED: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([A-Za-z][.)])\s+").unwrap());
static RE_ROMAN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:[ivxlcdm]+|[IVXLCDM]+)[.)])\s+").unwrap());
static RE_CJK_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^([一二三四五六七八九十百]+[、.．]|（[一二三四五六七八九十]+）)\s*").unwrap());

/// Detect a leading list marker.
///
/// Classification order matters for single letters: a multi-letter roman
/// numeral (`ii.`, `IV)`) is always roman; a lone `i`/`v`/`x` is roman too
/// (`i. ii. iii.` sequences are how roman lists start), while any other
/// single letter is alphabetic.
pub fn leading_list_marker(text: &str) -> Option<ListMarker> {
    if let Some(caps) = RE_BULLET.captures(text) {
        return Some(marker_from(caps, MarkerClass::Bullet));
    }
    if let Some(caps) = RE_NUMERIC.captures(text) {
        return Some(marker_from(caps, MarkerClass::Numeric));
    }
    if let Some(caps) = RE_ROMAN.captures(text) {
        let token = caps.get(1).unwrap().as_str();
        let letters = &token[..token.len() - 1];
        let is_roman = letters.len() > 1 || matches!(letters, "i" | "I" | "v" | "V" | "x" | "X");
        if is_roman {
            return Some(marker_from(caps, MarkerClass::Roman));
        }
    }
    if let Some(caps) = RE_LETTERED.captures(text) {
        return Some(marker_from(caps, MarkerClass::Alphabetic));
    }
    if let Some(caps) = RE_CJK_MARKER.captures(text) {
        return Some(marker_from(caps, MarkerClass::Cjk));
    }
    None
}

fn marker_from(caps: regex::Captures<'_>, class: MarkerClass) -> ListMarker {
    let full = caps.get(0).unwrap();
    let token = caps.get(1).unwrap();
    ListMarker {
        class,
        marker: token.as_str().to_string(),
        content_start: full.end(),
    }
}

// ── Header numbering ─────────────────────────────────────────────────────

static RE_SECTION_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^(\d+(?:\.\d+)*)\s+\S").unwrap());
static RE_CJK_CHAPTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^第[一二三四五六七八九十百\d]+(章|节|節|条|條)").unwrap());

/// Depth of a hierarchical numbering prefix, if present.
///
/// `1 Introduction` → 1, `1.1 Motivation` → 2, `第一章` → 1, `第二节` → 2.
/// A plain numeric list marker (`1. Intro`) does not count — the dot there
/// belongs to the marker, not to a section path.
fn numbering_depth(text: &str) -> Option<u8> {
    if let Some(caps) = RE_SECTION_NUMBER.captures(text) {
        let depth = caps[1].split('.').count();
        return Some(depth.min(6) as u8);
    }
    if let Some(caps) = RE_CJK_CHAPTER.captures(text) {
        let depth = match &caps[1] {
            "章" => 1,
            "节" | "節" => 2,
            _ => 3,
        };
        return Some(depth);
    }
    None
}

// ── Stage entry ──────────────────────────────────────────────────────────

/// Assign list and header structure to a merged, ordered element stream.
pub fn detect_structure(
    elements: Vec<DocumentElement>,
    config: &ProcessingConfig,
) -> Vec<DocumentElement> {
    let mut elements = detect_lists(elements, config);
    assign_header_levels(&mut elements);

    // Everything still raw is body text.
    for element in &mut elements {
        if element.element_type == ElementType::TextBlock {
            element.element_type = ElementType::Paragraph;
        }
    }
    elements
}

fn detect_lists(mut elements: Vec<DocumentElement>, config: &ProcessingConfig) -> Vec<DocumentElement> {
    // The indent origin is the leftmost marker on the page set, so a list
    // that happens to live in the right column still starts at level 0.
    let mut base_x = f64::INFINITY;
    let mut marked: Vec<Option<ListMarker>> = Vec::with_capacity(elements.len());
    for element in &elements {
        let marker = match element.element_type {
            ElementType::TextBlock | ElementType::ListItem => {
                leading_list_marker(&element.content)
            }
            _ => None,
        };
        if marker.is_some() {
            base_x = base_x.min(element.bounding_box.x);
        }
        marked.push(marker);
    }

    for (element, marker) in elements.iter_mut().zip(marked) {
        let Some(marker) = marker else {
            continue;
        };
        let indent =
            ((element.bounding_box.x - base_x) / config.list_indent_step).round().max(0.0) as u32;
        element.content = element.content[marker.content_start..].trim_start().to_string();
        element.element_type = ElementType::ListItem;
        element.set_meta(META_LIST_MARKER, marker.marker);
        element.set_meta(META_INDENT_LEVEL, indent.to_string());
    }
    elements
}

fn assign_header_levels(elements: &mut [DocumentElement]) {
    let median_height = median_text_height(elements);

    // Collect candidate indices: pre-typed headers, numbered section titles,
    // and tall short lines.
    let mut candidates: Vec<usize> = Vec::new();
    for (index, element) in elements.iter().enumerate() {
        match element.element_type {
            ElementType::Header(_) | ElementType::Title => candidates.push(index),
            ElementType::TextBlock => {
                let words = element.content.split_whitespace().count();
                let short = words <= MAX_HEADER_WORDS;
                let numbered = numbering_depth(&element.content).is_some();
                let tall = median_height > 0.0
                    && element.bounding_box.height >= HEADER_HEIGHT_FACTOR * median_height;
                if short && (numbered || tall) {
                    candidates.push(index);
                }
            }
            _ => {}
        }
    }
    if candidates.is_empty() {
        return;
    }

    let clusters = height_clusters(elements, &candidates);

    for index in candidates {
        let element = &mut elements[index];
        if element.element_type == ElementType::Title {
            // Title keeps its identity; it emits like a level-1 header.
            element.set_meta(META_HEADER_LEVEL, "1");
            continue;
        }

        let level = match numbering_depth(&element.content) {
            Some(depth) => depth,
            None => height_level(element.bounding_box.height, &clusters),
        };
        element.element_type = ElementType::Header(level);
        element.set_meta(META_HEADER_LEVEL, level.to_string());
    }
}

fn median_text_height(elements: &[DocumentElement]) -> f64 {
    let mut heights: Vec<f64> = elements
        .iter()
        .filter(|e| e.element_type.is_text_bearing())
        .map(|e| e.bounding_box.height)
        .collect();
    if heights.is_empty() {
        return 0.0;
    }
    heights.sort_by(f64::total_cmp);
    heights[heights.len() / 2]
}

/// Distinct candidate heights, tallest first, merged within 5%.
/// The cluster index (plus one, capped at 6) is the font-based level.
fn height_clusters(elements: &[DocumentElement], candidates: &[usize]) -> Vec<f64> {
    let mut heights: Vec<f64> = candidates
        .iter()
        .map(|&i| elements[i].bounding_box.height)
        .collect();
    heights.sort_by(|a, b| b.total_cmp(a));
    heights.dedup_by(|a, b| (*a - *b).abs() <= HEIGHT_CLUSTER_TOLERANCE * b.max(*a));
    heights
}

fn height_level(height: f64, clusters: &[f64]) -> u8 {
    let rank = clusters
        .iter()
        .position(|&c| (height - c).abs() <= HEIGHT_CLUSTER_TOLERANCE * c.max(height))
        .unwrap_or(clusters.len().saturating_sub(1));
    ((rank + 1).min(6)) as u8
}
