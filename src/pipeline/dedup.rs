//! Cross-page duplicate removal.
//!
//! Running headers, footers and page numbers repeat on most pages of a
//! document. This stage groups header/footer candidates by a content
//! fingerprint and removes every member of a group that recurs on enough
//! distinct pages. Elements outside the header/footer regions are never
//! touched, so `|dedup(x)| ≤ |x|` and body content always survives.
//!
//! The fingerprint is tolerant by design: case and whitespace are
//! normalised, and each digit run collapses to `#` so "Page 1" and
//! "Page 12" land in the same class. The y-band (2 decimal places) keeps a
//! footer from aliasing with an unlucky header that shares its text.

use crate::config::ProcessingConfig;
use crate::element::DocumentElement;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeSet, HashMap};

static RE_DIGIT_RUN: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Remove repeated header/footer candidates. Returns the surviving elements
/// in their original order plus the number of removed duplicates.
pub fn dedup_elements(
    elements: Vec<DocumentElement>,
    page_count: u32,
    config: &ProcessingConfig,
) -> (Vec<DocumentElement>, usize) {
    if page_count < 2 {
        return (elements, 0);
    }

    let threshold = duplicate_threshold(page_count, config.duplicate_min_page_fraction);

    // region → fingerprint → (member indices, distinct pages)
    let mut groups: HashMap<(String, String), (Vec<usize>, BTreeSet<u32>)> = HashMap::new();
    for (index, element) in elements.iter().enumerate() {
        let Some(region) = element.region() else {
            continue;
        };
        let key = (region.to_string(), fingerprint(element));
        let entry = groups.entry(key).or_default();
        entry.0.push(index);
        entry.1.insert(element.page_number);
    }

    let mut removed: BTreeSet<usize> = BTreeSet::new();
    for ((region, print), (members, pages)) in &groups {
        if pages.len() >= threshold {
            tracing::debug!(
                region = %region,
                fingerprint = %print,
                pages = pages.len(),
                members = members.len(),
                "removing repeated running element"
            );
            removed.extend(members.iter().copied());
        }
    }

    let removed_count = removed.len();
    let survivors = elements
        .into_iter()
        .enumerate()
        .filter(|(index, _)| !removed.contains(index))
        .map(|(_, element)| element)
        .collect();
    (survivors, removed_count)
}

/// Pages a class must recur on before it counts as a running header/footer.
/// A solitary repeat (one page) is never a duplicate.
fn duplicate_threshold(page_count: u32, fraction: f64) -> usize {
    let by_fraction = (fraction * page_count as f64).ceil() as usize;
    by_fraction.max(2)
}

/// Content fingerprint + discretized y-band.
fn fingerprint(element: &DocumentElement) -> String {
    let lowered = element.content.to_lowercase();
    let collapsed = lowered.split_whitespace().collect::<Vec<_>>().join(" ");
    let digit_classed = RE_DIGIT_RUN.replace_all(&collapsed, "#");
    format!("{digit_classed}@{:.2}", element.bounding_box.y)
}
