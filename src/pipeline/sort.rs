//! Reading-order sorting.
//!
//! Defines the strict total order used everywhere elements are walked:
//!
//! 1. Lower page number first.
//! 2. Within a page, a column partition is computed from the x-starts
//!    (largest-gap split, at most `max_columns`); columns read left to
//!    right, each column top to bottom — so a two-column page reads all of
//!    the left column before any of the right.
//! 3. Within a column, elements group into row bands by y-center
//!    (`row_band_tolerance`); bands order top to bottom, elements within a
//!    band by x-start.
//! 4. Final tie-break: the OCR source insertion index.
//!
//! The sort is stable and deterministic; sorting an already-sorted sequence
//! is a fixed point.

use crate::config::ProcessingConfig;
use crate::element::DocumentElement;
use std::collections::BTreeMap;

/// A column split is only accepted when the gap between the two x-start
/// clusters is at least this wide (normalized). Narrower gaps are indent
/// variation, not layout.
const MIN_COLUMN_GAP: f64 = 0.12;

/// Minimum physical gutter between the left side's right edge and the right
/// side's left edge.
const MIN_COLUMN_GUTTER: f64 = 0.02;

/// Minimum elements on each side of a candidate column split.
const MIN_ELEMENTS_PER_COLUMN: usize = 2;

/// Sort elements into reading order.
pub fn sort_elements(
    elements: Vec<DocumentElement>,
    config: &ProcessingConfig,
) -> Vec<DocumentElement> {
    // Partition by page, keeping arrival order inside each page.
    let mut pages: BTreeMap<u32, Vec<DocumentElement>> = BTreeMap::new();
    for element in elements {
        pages.entry(element.page_number).or_default().push(element);
    }

    let mut ordered = Vec::new();
    for (_, page_elements) in pages {
        ordered.extend(sort_page(page_elements, config));
    }
    ordered
}

fn sort_page(elements: Vec<DocumentElement>, config: &ProcessingConfig) -> Vec<DocumentElement> {
    if elements.len() <= 1 {
        return elements;
    }

    let columns = assign_columns(&elements, config.max_columns);

    // key: (column, band, x-start, source index)
    let mut keyed: Vec<(usize, DocumentElement)> = columns.into_iter().zip(elements).collect();
    keyed.sort_by(|(col_a, a), (col_b, b)| {
        col_a
            .cmp(col_b)
            .then(a.bounding_box.center_y().total_cmp(&b.bounding_box.center_y()))
            .then(a.bounding_box.x.total_cmp(&b.bounding_box.x))
            .then(a.source_index.cmp(&b.source_index))
    });

    // Re-walk each column and flatten y-centers into bands so that elements
    // on the same visual row order by x, not by sub-tolerance y jitter.
    let mut result: Vec<DocumentElement> = Vec::with_capacity(keyed.len());
    let mut start = 0;
    while start < keyed.len() {
        let column = keyed[start].0;
        let mut end = start;
        while end < keyed.len() && keyed[end].0 == column {
            end += 1;
        }
        let mut slice: Vec<DocumentElement> =
            keyed[start..end].iter().map(|(_, e)| e.clone()).collect();
        order_bands(&mut slice, config.row_band_tolerance);
        result.extend(slice);
        start = end;
    }
    result
}

/// Group a y-sorted column slice into row bands and order each band by
/// x-start, then source index.
fn order_bands(elements: &mut [DocumentElement], tolerance: f64) {
    let mut start = 0;
    while start < elements.len() {
        let band_anchor = elements[start].bounding_box.center_y();
        let mut end = start + 1;
        while end < elements.len()
            && (elements[end].bounding_box.center_y() - band_anchor).abs() < tolerance
        {
            end += 1;
        }
        elements[start..end].sort_by(|a, b| {
            a.bounding_box
                .x
                .total_cmp(&b.bounding_box.x)
                .then(a.source_index.cmp(&b.source_index))
        });
        start = end;
    }
}

/// Assign each element a column index via largest-gap splitting of x-starts,
/// repeated while a valid split exists and fewer than `max_columns` groups
/// have formed.
///
/// A split is rejected when the gap is narrow, either side is underpopulated,
/// no physical gutter separates the sides, or the two sides do not overlap
/// vertically (a title above an indented body is not two columns).
fn assign_columns(elements: &[DocumentElement], max_columns: usize) -> Vec<usize> {
    let mut columns = vec![0usize; elements.len()];
    if max_columns < 2 || elements.len() < 2 * MIN_ELEMENTS_PER_COLUMN {
        return columns;
    }

    let mut groups: Vec<Vec<usize>> = vec![(0..elements.len()).collect()];
    while groups.len() < max_columns {
        let Some((position, split_x)) = groups.iter().enumerate().find_map(|(position, group)| {
            if group.len() < 2 * MIN_ELEMENTS_PER_COLUMN {
                return None;
            }
            find_column_split(elements, group).map(|split_x| (position, split_x))
        }) else {
            break;
        };

        let group = groups.remove(position);
        let (left, right): (Vec<usize>, Vec<usize>) = group
            .into_iter()
            .partition(|&i| elements[i].bounding_box.x < split_x);
        groups.insert(position, right);
        groups.insert(position, left);
    }

    // Columns read left to right.
    groups.sort_by(|a, b| {
        let min_x = |group: &[usize]| {
            group
                .iter()
                .map(|&i| elements[i].bounding_box.x)
                .fold(f64::INFINITY, f64::min)
        };
        min_x(a).total_cmp(&min_x(b))
    });

    for (column, group) in groups.into_iter().enumerate() {
        for index in group {
            columns[index] = column;
        }
    }
    columns
}

/// Find the widest x-start gap that passes the column guards; returns the
/// split line at the gap midpoint.
fn find_column_split(elements: &[DocumentElement], indices: &[usize]) -> Option<f64> {
    let mut starts: Vec<f64> = indices.iter().map(|&i| elements[i].bounding_box.x).collect();
    starts.sort_by(f64::total_cmp);

    let mut best_gap = 0.0;
    let mut split_x = None;
    for pair in starts.windows(2) {
        let gap = pair[1] - pair[0];
        if gap > best_gap {
            best_gap = gap;
            split_x = Some(pair[0] + gap / 2.0);
        }
    }
    let split_x = split_x?;
    if best_gap < MIN_COLUMN_GAP {
        return None;
    }

    let left: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| elements[i].bounding_box.x < split_x)
        .collect();
    let right: Vec<usize> = indices
        .iter()
        .copied()
        .filter(|&i| elements[i].bounding_box.x >= split_x)
        .collect();
    if left.len() < MIN_ELEMENTS_PER_COLUMN || right.len() < MIN_ELEMENTS_PER_COLUMN {
        return None;
    }

    // A real column layout has a physical gutter: the left side's rightmost
    // edge must end before the right side begins. A spanning heading or wide
    // table crossing the line kills the split.
    let left_edge = left
        .iter()
        .map(|&i| elements[i].bounding_box.right())
        .fold(f64::NEG_INFINITY, f64::max);
    let right_edge = right
        .iter()
        .map(|&i| elements[i].bounding_box.x)
        .fold(f64::INFINITY, f64::min);
    if right_edge - left_edge < MIN_COLUMN_GUTTER {
        return None;
    }

    // Both sides must occupy overlapping vertical ranges.
    let y_range = |group: &[usize]| -> (f64, f64) {
        let top = group
            .iter()
            .map(|&i| elements[i].bounding_box.y)
            .fold(f64::INFINITY, f64::min);
        let bottom = group
            .iter()
            .map(|&i| elements[i].bounding_box.bottom())
            .fold(f64::NEG_INFINITY, f64::max);
        (top, bottom)
    };
    let (left_top, left_bottom) = y_range(&left);
    let (right_top, right_bottom) = y_range(&right);
    if left_bottom.min(right_bottom) <= left_top.max(right_top) {
        return None;
    }

    Some(split_x)
}
