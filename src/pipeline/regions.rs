//! Header/footer region classification.
//!
//! Purely geometric: an element whose bounding-box center-y falls inside the
//! configured header or footer band gets a `region` metadata tag. Nothing is
//! removed here — the deduplicator decides which candidates are actually
//! running headers/footers, so a lone chapter title that happens to start
//! high on the page survives.

use crate::config::ProcessingConfig;
use crate::element::{DocumentElement, META_REGION};

/// Tag header/footer candidates on a per-page element sequence.
pub fn classify_regions(
    mut elements: Vec<DocumentElement>,
    config: &ProcessingConfig,
) -> Vec<DocumentElement> {
    let [header_top, header_bottom] = config.header_region;
    let [footer_top, footer_bottom] = config.footer_region;

    for element in &mut elements {
        if element.bounding_box.in_region(header_top, header_bottom) {
            element.set_meta(META_REGION, "header");
        } else if element.bounding_box.in_region(footer_top, footer_bottom) {
            element.set_meta(META_REGION, "footer");
        }
    }

    elements
}
