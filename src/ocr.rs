//! Inbound OCR adapter boundary: positioned observations → typed elements.
//!
//! The OCR engine itself is an external collaborator. All the pipeline asks
//! of it is a per-page sequence of observations, each carrying a normalized
//! bounding box, raw text, a confidence and a coarse type hint. This module
//! validates those observations against the element invariants and turns
//! them into [`DocumentElement`]s; a violating observation surfaces as
//! [`ConvertError::InvalidInput`] rather than corrupting a later stage.

use crate::element::{BoundingBox, DocumentElement, ElementType};
use crate::error::ConvertError;
use serde::{Deserialize, Serialize};

/// Coarse type hint delivered by the OCR engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ObservationKind {
    #[default]
    Text,
    Image,
    Barcode,
    Table,
    /// Engines that cannot classify report Unknown; treated as text.
    Unknown,
}

impl ObservationKind {
    fn element_type(self) -> ElementType {
        match self {
            ObservationKind::Text | ObservationKind::Unknown => ElementType::TextBlock,
            ObservationKind::Image => ElementType::Image,
            ObservationKind::Barcode => ElementType::Barcode,
            ObservationKind::Table => ElementType::Table,
        }
    }
}

/// A single positioned observation from the OCR engine.
///
/// Coordinates are normalized to `[0,1]` with the origin at the page
/// top-left, matching the element model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OcrObservation {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub text: String,
    pub confidence: f64,
    #[serde(default)]
    pub kind: ObservationKind,
    /// 1-based page number.
    pub page_number: u32,
}

/// Convert observations into validated elements.
///
/// Insertion order is preserved in `source_index`, which the position sorter
/// later uses as its final tie-break. Observations with empty text are kept
/// only for non-text kinds (an Image carries no content by design).
pub fn elements_from_observations(
    observations: &[OcrObservation],
) -> Result<Vec<DocumentElement>, ConvertError> {
    let mut elements = Vec::with_capacity(observations.len());

    for (index, obs) in observations.iter().enumerate() {
        let bbox = BoundingBox::new(obs.x, obs.y, obs.width, obs.height).ok_or_else(|| {
            ConvertError::InvalidInput {
                page: obs.page_number,
                detail: format!(
                    "bounding box ({}, {}, {}, {}) is outside [0,1] or degenerate",
                    obs.x, obs.y, obs.width, obs.height
                ),
            }
        })?;

        let element_type = obs.kind.element_type();
        if obs.text.trim().is_empty() && element_type.is_text_bearing() {
            tracing::debug!(
                page = obs.page_number,
                index,
                "skipping empty text observation"
            );
            continue;
        }

        let element = DocumentElement::new(
            element_type,
            bbox,
            obs.text.trim(),
            obs.confidence,
            obs.page_number,
            index as u64,
        )
        .ok_or_else(|| ConvertError::InvalidInput {
            page: obs.page_number,
            detail: format!(
                "confidence {} outside [0,1] or page number 0",
                obs.confidence
            ),
        })?;

        elements.push(element);
    }

    Ok(elements)
}
