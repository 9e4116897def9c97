//! Configuration types for OCR-to-Markdown conversion.
//!
//! All conversion behaviour is controlled through [`ConversionConfig`], built
//! via its [`ConversionConfigBuilder`]. Keeping every knob in one struct
//! makes it trivial to share configs across tasks, serialise them for
//! logging, and diff two runs to understand why their outputs differ.
//! The config is immutable once the pipeline is constructed.
//!
//! # Design choice: builder over constructor
//! A twenty-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::ConvertError;
use crate::prompts::PromptTemplateSet;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Configuration for a conversion run.
///
/// Built via [`ConversionConfig::builder()`] or [`ConversionConfig::default()`].
///
/// # Example
/// ```rust
/// use ocr2md::ConversionConfig;
///
/// let config = ConversionConfig::builder()
///     .merge_distance_threshold(0.02)
///     .max_columns(3)
///     .llm_enabled(true)
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionConfig {
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub language_detection: LanguageDetectionConfig,
    #[serde(default)]
    pub llm: LlmConfig,

    /// Number of pages processed concurrently through the per-page stages
    /// (element construction, language tagging, region classification).
    /// Default: 8.
    ///
    /// These stages are CPU-bound and data-parallel; results are joined in
    /// page order before the document-wide stages, so concurrency never
    /// affects output bytes.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

impl Default for ConversionConfig {
    fn default() -> Self {
        Self {
            processing: ProcessingConfig::default(),
            language_detection: LanguageDetectionConfig::default(),
            llm: LlmConfig::default(),
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    8
}

/// Geometric thresholds for the element pipeline.
///
/// All distances are in normalized page coordinates (`[0,1]`), so the same
/// value works for any page size.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Minimum intersection-over-union for two boxes to count as overlapping
    /// in geometric predicates. Default: 0.1.
    pub overlap_threshold: f64,

    /// Maximum vertical gap between two fragments for the merger to stitch
    /// them. Default: 0.015 — roughly half a text line on a typical page.
    pub merge_distance_threshold: f64,

    /// Normalized-y interval in which running headers are expected.
    /// Default: `[0.0, 0.08]`.
    pub header_region: [f64; 2],

    /// Normalized-y interval in which running footers and page numbers are
    /// expected. Default: `[0.92, 1.0]`.
    pub footer_region: [f64; 2],

    /// Two elements whose y-centers differ by less than this share a row
    /// band for ordering. Default: 0.01.
    pub row_band_tolerance: f64,

    /// Indent bucket width for list nesting. Default: 0.03.
    pub list_indent_step: f64,

    /// A repeated header/footer class is removed once it appears on at least
    /// this fraction of pages (never fewer than 2). Default: 0.5.
    pub duplicate_min_page_fraction: f64,

    /// Two fragments whose x-starts differ by less than this are treated as
    /// sharing a column edge. Default: 0.02.
    pub indent_tolerance: f64,

    /// Upper bound on detected columns per page. Default: 2.
    pub max_columns: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            overlap_threshold: 0.1,
            merge_distance_threshold: 0.015,
            header_region: [0.0, 0.08],
            footer_region: [0.92, 1.0],
            row_band_tolerance: 0.01,
            list_indent_step: 0.03,
            duplicate_min_page_fraction: 0.5,
            indent_tolerance: 0.02,
            max_columns: 2,
        }
    }
}

/// Knobs for the statistical language identifier.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LanguageDetectionConfig {
    /// Texts shorter than this many codepoints skip detection and report
    /// `(en, 0.0)`. Default: 10.
    pub minimum_text_length: usize,

    /// Detections below this confidence fall back to English. Default: 0.6.
    pub confidence_threshold: f64,
}

impl Default for LanguageDetectionConfig {
    fn default() -> Self {
        Self {
            minimum_text_length: 10,
            confidence_threshold: 0.6,
        }
    }
}

/// LLM refinement settings. Disabled by default; the pipeline's own Markdown
/// is always the ground truth.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Run the optional LLM post-pass. Default: false.
    pub enabled: bool,

    /// Per-request timeout in seconds for the LLM call. Default: 60.
    pub request_timeout_secs: u64,

    /// Also run the specialised table/list/header sub-prompts and splice
    /// their outputs back into the Markdown. Default: false.
    pub per_element_refinement: bool,

    pub prompt_templates: PromptTemplatesConfig,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            request_timeout_secs: 60,
            per_element_refinement: false,
            prompt_templates: PromptTemplatesConfig::default(),
        }
    }
}

/// Template catalogue configuration: which language's prompts to prefer and
/// any user-supplied per-language overrides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PromptTemplatesConfig {
    /// Language whose templates are used when the requested one is missing.
    /// Default: "en".
    pub default_language: String,

    /// Second fallback before the built-in English templates. Default: "en".
    pub fallback_language: String,

    /// User-supplied template sets keyed by language code. Unlisted
    /// languages use the built-in catalogue.
    pub languages: BTreeMap<String, PromptTemplateSet>,
}

impl Default for PromptTemplatesConfig {
    fn default() -> Self {
        Self {
            default_language: "en".to_string(),
            fallback_language: "en".to_string(),
            languages: BTreeMap::new(),
        }
    }
}

impl ConversionConfig {
    /// Create a new builder for `ConversionConfig`.
    pub fn builder() -> ConversionConfigBuilder {
        ConversionConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`ConversionConfig`].
#[derive(Debug)]
pub struct ConversionConfigBuilder {
    config: ConversionConfig,
}

impl ConversionConfigBuilder {
    pub fn merge_distance_threshold(mut self, v: f64) -> Self {
        self.config.processing.merge_distance_threshold = v.max(0.0);
        self
    }

    pub fn header_region(mut self, top: f64, bottom: f64) -> Self {
        self.config.processing.header_region = [top, bottom];
        self
    }

    pub fn footer_region(mut self, top: f64, bottom: f64) -> Self {
        self.config.processing.footer_region = [top, bottom];
        self
    }

    pub fn row_band_tolerance(mut self, v: f64) -> Self {
        self.config.processing.row_band_tolerance = v.max(0.0);
        self
    }

    pub fn list_indent_step(mut self, v: f64) -> Self {
        self.config.processing.list_indent_step = v.max(1e-6);
        self
    }

    pub fn duplicate_min_page_fraction(mut self, v: f64) -> Self {
        self.config.processing.duplicate_min_page_fraction = v.clamp(0.0, 1.0);
        self
    }

    pub fn indent_tolerance(mut self, v: f64) -> Self {
        self.config.processing.indent_tolerance = v.max(0.0);
        self
    }

    pub fn max_columns(mut self, n: usize) -> Self {
        self.config.processing.max_columns = n.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn minimum_text_length(mut self, n: usize) -> Self {
        self.config.language_detection.minimum_text_length = n;
        self
    }

    pub fn language_confidence_threshold(mut self, v: f64) -> Self {
        self.config.language_detection.confidence_threshold = v.clamp(0.0, 1.0);
        self
    }

    pub fn llm_enabled(mut self, v: bool) -> Self {
        self.config.llm.enabled = v;
        self
    }

    pub fn llm_request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.llm.request_timeout_secs = secs.max(1);
        self
    }

    pub fn per_element_refinement(mut self, v: bool) -> Self {
        self.config.llm.per_element_refinement = v;
        self
    }

    pub fn prompt_default_language(mut self, code: impl Into<String>) -> Self {
        self.config.llm.prompt_templates.default_language = code.into();
        self
    }

    pub fn prompt_fallback_language(mut self, code: impl Into<String>) -> Self {
        self.config.llm.prompt_templates.fallback_language = code.into();
        self
    }

    pub fn prompt_templates_for(
        mut self,
        code: impl Into<String>,
        templates: PromptTemplateSet,
    ) -> Self {
        self.config
            .llm
            .prompt_templates
            .languages
            .insert(code.into(), templates);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<ConversionConfig, ConvertError> {
        let p = &self.config.processing;
        for (name, region) in [
            ("header_region", p.header_region),
            ("footer_region", p.footer_region),
        ] {
            let [top, bottom] = region;
            if !(0.0..=1.0).contains(&top) || !(0.0..=1.0).contains(&bottom) || top > bottom {
                return Err(ConvertError::InvalidConfig(format!(
                    "{name} must be an ordered interval inside [0,1], got [{top}, {bottom}]"
                )));
            }
        }
        if p.header_region[1] > p.footer_region[0] {
            return Err(ConvertError::InvalidConfig(
                "header_region must end before footer_region begins".into(),
            ));
        }
        if p.max_columns == 0 {
            return Err(ConvertError::InvalidConfig("max_columns must be ≥ 1".into()));
        }
        let ld = &self.config.language_detection;
        if !(0.0..=1.0).contains(&ld.confidence_threshold) {
            return Err(ConvertError::InvalidConfig(format!(
                "confidence_threshold must be in [0,1], got {}",
                ld.confidence_threshold
            )));
        }
        if self.config.concurrency == 0 {
            return Err(ConvertError::InvalidConfig("concurrency must be ≥ 1".into()));
        }
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let c = ConversionConfig::default();
        assert_eq!(c.processing.merge_distance_threshold, 0.015);
        assert_eq!(c.processing.header_region, [0.0, 0.08]);
        assert_eq!(c.processing.footer_region, [0.92, 1.0]);
        assert_eq!(c.processing.row_band_tolerance, 0.01);
        assert_eq!(c.processing.duplicate_min_page_fraction, 0.5);
        assert_eq!(c.processing.max_columns, 2);
        assert_eq!(c.language_detection.minimum_text_length, 10);
        assert_eq!(c.language_detection.confidence_threshold, 0.6);
        assert!(!c.llm.enabled);
        assert_eq!(c.llm.request_timeout_secs, 60);
        assert_eq!(c.llm.prompt_templates.default_language, "en");
    }

    #[test]
    fn test_builder_clamps_and_validates() {
        let c = ConversionConfig::builder()
            .max_columns(0)
            .duplicate_min_page_fraction(2.0)
            .build()
            .unwrap();
        assert_eq!(c.processing.max_columns, 1);
        assert_eq!(c.processing.duplicate_min_page_fraction, 1.0);
    }

    #[test]
    fn test_builder_rejects_inverted_region() {
        let err = ConversionConfig::builder()
            .header_region(0.5, 0.1)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn test_builder_rejects_overlapping_regions() {
        let err = ConversionConfig::builder()
            .header_region(0.0, 0.6)
            .footer_region(0.5, 1.0)
            .build()
            .unwrap_err();
        assert!(matches!(err, ConvertError::InvalidConfig(_)));
    }

    #[test]
    fn test_config_round_trips_through_json() {
        let c = ConversionConfig::builder()
            .llm_enabled(true)
            .build()
            .unwrap();
        let json = serde_json::to_string(&c).unwrap();
        let back: ConversionConfig = serde_json::from_str(&json).unwrap();
        assert!(back.llm.enabled);
        assert_eq!(back.processing.max_columns, 2);
    }
}
