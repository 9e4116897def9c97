//! The element data model: normalized geometry and typed document content.
//!
//! Every pipeline stage consumes and produces [`DocumentElement`] sequences.
//! Positions are normalized rectangles in `[0,1]²` with the origin at the
//! top-left, so no stage ever needs to know absolute page dimensions —
//! a predicate that holds for a US-Letter scan holds identically for A4.
//!
//! Elements are immutable once constructed; stages build new elements (with
//! [`DocumentElement::merged_with`] carrying provenance metadata) instead of
//! mutating in place.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ── Metadata keys ────────────────────────────────────────────────────────
//
// The metadata map is open-ended, but these keys are the ones the pipeline
// itself reads and writes.

/// Marker class of a list item: `bullet`, `numeric`, `alphabetic`, `roman`, `cjk`.
pub const META_LIST_MARKER: &str = "listMarker";
/// Zero-based indent depth of a list item.
pub const META_INDENT_LEVEL: &str = "indentLevel";
/// Header level 1..6.
pub const META_HEADER_LEVEL: &str = "headerLevel";
/// How many OCR fragments were folded into this element.
pub const META_FRAGMENT_COUNT: &str = "originalFragmentCount";
/// Detected language code of this element's content.
pub const META_LANGUAGE: &str = "language";
/// Page region this element was classified into: `header` or `footer`.
pub const META_REGION: &str = "region";
/// Alt text / caption for Image elements.
pub const META_CAPTION: &str = "caption";
/// Row count of a structurally-known table.
pub const META_TABLE_ROWS: &str = "tableRows";
/// Column count of a structurally-known table.
pub const META_TABLE_COLS: &str = "tableCols";
/// Footnote number for Footnote elements.
pub const META_FOOTNOTE_NUMBER: &str = "footnoteNumber";

// ── Geometry ─────────────────────────────────────────────────────────────

/// A normalized bounding rectangle in `[0,1]²`, origin top-left.
///
/// Invariants enforced at construction: `0 ≤ x ≤ x+width ≤ 1`,
/// `0 ≤ y ≤ y+height ≤ 1`, and both extents strictly positive.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl BoundingBox {
    /// Construct a validated box. Returns `None` when any invariant fails;
    /// callers at the adapter boundary map that to `InvalidInput`.
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Option<Self> {
        let finite = [x, y, width, height].iter().all(|v| v.is_finite());
        if !finite || width <= 0.0 || height <= 0.0 {
            return None;
        }
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return None;
        }
        if x + width > 1.0 + 1e-9 || y + height > 1.0 + 1e-9 {
            return None;
        }
        Some(Self { x, y, width, height })
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn center_x(&self) -> f64 {
        self.x + self.width / 2.0
    }

    pub fn center_y(&self) -> f64 {
        self.y + self.height / 2.0
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Smallest box containing both operands.
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        let x = self.x.min(other.x);
        let y = self.y.min(other.y);
        let right = self.right().max(other.right());
        let bottom = self.bottom().max(other.bottom());
        BoundingBox {
            x,
            y,
            width: right - x,
            height: bottom - y,
        }
    }

    /// Intersection-over-union in `[0,1]`. Zero when the boxes are disjoint.
    pub fn intersection_over_union(&self, other: &BoundingBox) -> f64 {
        let ix = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let iy = (self.bottom().min(other.bottom()) - self.y.max(other.y)).max(0.0);
        let inter = ix * iy;
        let union = self.area() + other.area() - inter;
        if union <= 0.0 {
            0.0
        } else {
            inter / union
        }
    }

    /// Signed distance between the nearest vertical edges of the two boxes.
    /// Negative when the boxes overlap vertically.
    pub fn vertical_gap(&self, other: &BoundingBox) -> f64 {
        if self.bottom() <= other.y {
            other.y - self.bottom()
        } else if other.bottom() <= self.y {
            self.y - other.bottom()
        } else {
            // Vertical overlap: return the (negative) overlap depth.
            -(self.bottom().min(other.bottom()) - self.y.max(other.y))
        }
    }

    /// Horizontal overlap divided by the narrower box's width.
    pub fn horizontal_overlap_ratio(&self, other: &BoundingBox) -> f64 {
        let overlap = (self.right().min(other.right()) - self.x.max(other.x)).max(0.0);
        let min_width = self.width.min(other.width);
        if min_width <= 0.0 {
            0.0
        } else {
            overlap / min_width
        }
    }

    /// True iff the box center-y lies inside the closed interval
    /// `[region_top, region_bottom]`.
    pub fn in_region(&self, region_top: f64, region_bottom: f64) -> bool {
        let cy = self.center_y();
        cy >= region_top && cy <= region_bottom
    }
}

// ── Element types ────────────────────────────────────────────────────────

/// The typed role of a document element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ElementType {
    /// Document-level title; at most one is expected, emitted like Header(1).
    Title,
    /// Raw positioned text before structure detection.
    TextBlock,
    /// Body text after merging.
    Paragraph,
    /// Section header with level 1..6.
    Header(u8),
    ListItem,
    List,
    Table,
    Image,
    Barcode,
    Footnote,
    Caption,
}

impl ElementType {
    /// Text-bearing elements participate in merging and language detection;
    /// Image, Barcode and Table never do.
    pub fn is_text_bearing(&self) -> bool {
        !matches!(
            self,
            ElementType::Image | ElementType::Barcode | ElementType::Table
        )
    }

    /// Title and Header elements carry heading semantics.
    pub fn is_heading(&self) -> bool {
        matches!(self, ElementType::Title | ElementType::Header(_))
    }
}

impl fmt::Display for ElementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ElementType::Title => write!(f, "title"),
            ElementType::TextBlock => write!(f, "text"),
            ElementType::Paragraph => write!(f, "paragraph"),
            ElementType::Header(level) => write!(f, "header{level}"),
            ElementType::ListItem => write!(f, "list-item"),
            ElementType::List => write!(f, "list"),
            ElementType::Table => write!(f, "table"),
            ElementType::Image => write!(f, "image"),
            ElementType::Barcode => write!(f, "barcode"),
            ElementType::Footnote => write!(f, "footnote"),
            ElementType::Caption => write!(f, "caption"),
        }
    }
}

// ── DocumentElement ──────────────────────────────────────────────────────

/// A typed, positioned unit of document content.
///
/// `source_index` is the monotonically increasing insertion index from the
/// OCR source; the position sorter uses it as the final tie-break so the
/// reading order is a strict total order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentElement {
    pub element_type: ElementType,
    pub bounding_box: BoundingBox,
    pub content: String,
    /// Combined OCR + classification confidence in `[0,1]`.
    pub confidence: f64,
    /// 1-based page number.
    pub page_number: u32,
    /// Open key→value map; deterministic iteration order by construction.
    pub metadata: BTreeMap<String, String>,
    pub source_index: u64,
}

impl DocumentElement {
    /// Construct a validated element. `None` when confidence is outside
    /// `[0,1]` or the page number is zero; box invariants are enforced by
    /// [`BoundingBox::new`] before this is reachable.
    pub fn new(
        element_type: ElementType,
        bounding_box: BoundingBox,
        content: impl Into<String>,
        confidence: f64,
        page_number: u32,
        source_index: u64,
    ) -> Option<Self> {
        if !(0.0..=1.0).contains(&confidence) || !confidence.is_finite() || page_number == 0 {
            return None;
        }
        Some(Self {
            element_type,
            bounding_box,
            content: content.into(),
            confidence,
            page_number,
            metadata: BTreeMap::new(),
            source_index,
        })
    }

    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    pub fn set_meta(&mut self, key: &str, value: impl Into<String>) {
        self.metadata.insert(key.to_string(), value.into());
    }

    pub fn with_meta(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set_meta(key, value);
        self
    }

    /// Header level from the type variant or `headerLevel` metadata.
    pub fn header_level(&self) -> Option<u8> {
        match self.element_type {
            ElementType::Header(level) => Some(level),
            _ => self
                .meta(META_HEADER_LEVEL)
                .and_then(|v| v.parse::<u8>().ok())
                .filter(|l| (1..=6).contains(l)),
        }
    }

    /// Number of OCR fragments folded into this element (1 when unmerged).
    pub fn fragment_count(&self) -> u32 {
        self.meta(META_FRAGMENT_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(1)
    }

    pub fn region(&self) -> Option<&str> {
        self.meta(META_REGION)
    }

    pub fn is_header_footer_candidate(&self) -> bool {
        self.region().is_some()
    }

    /// Build the element that results from folding `other` into `self`.
    ///
    /// Box is the union, confidence the minimum, page number the earlier of
    /// the two; the caller supplies the joined content. Fragment counts
    /// accumulate in `originalFragmentCount`.
    pub fn merged_with(&self, other: &DocumentElement, content: String) -> Self {
        let mut merged = self.clone();
        merged.bounding_box = self.bounding_box.union(&other.bounding_box);
        merged.confidence = self.confidence.min(other.confidence);
        merged.page_number = self.page_number.min(other.page_number);
        merged.content = content;
        let fragments = self.fragment_count() + other.fragment_count();
        merged.set_meta(META_FRAGMENT_COUNT, fragments.to_string());
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bbox(x: f64, y: f64, w: f64, h: f64) -> BoundingBox {
        BoundingBox::new(x, y, w, h).unwrap()
    }

    #[test]
    fn test_bounding_box_rejects_invalid() {
        assert!(BoundingBox::new(-0.1, 0.0, 0.5, 0.5).is_none());
        assert!(BoundingBox::new(0.0, 0.0, 0.0, 0.5).is_none());
        assert!(BoundingBox::new(0.8, 0.0, 0.5, 0.5).is_none(), "x+w > 1");
        assert!(BoundingBox::new(0.0, 0.0, f64::NAN, 0.5).is_none());
    }

    #[test]
    fn test_iou_identical_boxes() {
        let b = bbox(0.1, 0.1, 0.4, 0.2);
        assert!((b.intersection_over_union(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_iou_disjoint_boxes() {
        let a = bbox(0.0, 0.0, 0.2, 0.2);
        let b = bbox(0.5, 0.5, 0.2, 0.2);
        assert_eq!(a.intersection_over_union(&b), 0.0);
    }

    #[test]
    fn test_vertical_gap_stacked() {
        let a = bbox(0.1, 0.10, 0.3, 0.05);
        let b = bbox(0.1, 0.18, 0.3, 0.05);
        assert!((a.vertical_gap(&b) - 0.03).abs() < 1e-12);
        // Symmetric regardless of argument order.
        assert!((b.vertical_gap(&a) - 0.03).abs() < 1e-12);
    }

    #[test]
    fn test_vertical_gap_overlapping_is_negative() {
        let a = bbox(0.1, 0.10, 0.3, 0.10);
        let b = bbox(0.1, 0.15, 0.3, 0.10);
        assert!(a.vertical_gap(&b) < 0.0);
    }

    #[test]
    fn test_horizontal_overlap_ratio_full() {
        let a = bbox(0.1, 0.1, 0.4, 0.05);
        let b = bbox(0.1, 0.2, 0.2, 0.05);
        // b is fully inside a's x-extent; ratio normalised by min width.
        assert!((a.horizontal_overlap_ratio(&b) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_in_region_uses_center() {
        let footer = bbox(0.1, 0.93, 0.3, 0.04);
        assert!(footer.in_region(0.92, 1.0));
        assert!(!footer.in_region(0.0, 0.08));
    }

    #[test]
    fn test_union_covers_both() {
        let a = bbox(0.1, 0.1, 0.2, 0.1);
        let b = bbox(0.5, 0.3, 0.2, 0.1);
        let u = a.union(&b);
        assert_eq!(u.x, 0.1);
        assert_eq!(u.y, 0.1);
        assert!((u.right() - 0.7).abs() < 1e-12);
        assert!((u.bottom() - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_element_rejects_bad_confidence_and_page() {
        let b = bbox(0.1, 0.1, 0.2, 0.1);
        assert!(DocumentElement::new(ElementType::TextBlock, b, "x", 1.2, 1, 0).is_none());
        assert!(DocumentElement::new(ElementType::TextBlock, b, "x", 0.5, 0, 0).is_none());
    }

    #[test]
    fn test_header_level_from_variant_and_metadata() {
        let b = bbox(0.1, 0.1, 0.2, 0.05);
        let h = DocumentElement::new(ElementType::Header(2), b, "Intro", 0.9, 1, 0).unwrap();
        assert_eq!(h.header_level(), Some(2));

        let t = DocumentElement::new(ElementType::TextBlock, b, "Intro", 0.9, 1, 0)
            .unwrap()
            .with_meta(META_HEADER_LEVEL, "3");
        assert_eq!(t.header_level(), Some(3));

        let bad = DocumentElement::new(ElementType::TextBlock, b, "Intro", 0.9, 1, 0)
            .unwrap()
            .with_meta(META_HEADER_LEVEL, "9");
        assert_eq!(bad.header_level(), None);
    }

    #[test]
    fn test_merged_with_accumulates_fragments() {
        let a = DocumentElement::new(
            ElementType::TextBlock,
            bbox(0.1, 0.10, 0.2, 0.03),
            "inter",
            0.9,
            1,
            0,
        )
        .unwrap();
        let b = DocumentElement::new(
            ElementType::TextBlock,
            bbox(0.1, 0.14, 0.2, 0.03),
            "national",
            0.8,
            1,
            1,
        )
        .unwrap();
        let m = a.merged_with(&b, "international".to_string());
        assert_eq!(m.content, "international");
        assert_eq!(m.confidence, 0.8);
        assert_eq!(m.fragment_count(), 2);
        assert!((m.bounding_box.bottom() - 0.17).abs() < 1e-12);

        let c = DocumentElement::new(
            ElementType::TextBlock,
            bbox(0.1, 0.18, 0.2, 0.03),
            "ly",
            0.95,
            1,
            2,
        )
        .unwrap();
        let m2 = m.merged_with(&c, "internationally".to_string());
        assert_eq!(m2.fragment_count(), 3);
    }
}
