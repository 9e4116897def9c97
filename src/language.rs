//! Language identification feeding the merge and emission heuristics.
//!
//! A thin contract over the statistical identifier (whatlang): given text,
//! return a language code from a closed ten-code set plus a confidence.
//! Everything the rest of the pipeline needs is "is this CJK?" (join
//! separator choice) and "which prompt catalogue entry?" — so unsupported
//! and unreliable detections deliberately collapse to English rather than
//! leaking engine-specific codes downstream.

use crate::config::LanguageDetectionConfig;
use crate::element::DocumentElement;
use serde::{Deserialize, Serialize};
use std::fmt;

/// The closed set of language codes the pipeline understands.
///
/// Any other detection result is treated as [`Language::En`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Es,
    Fr,
    De,
    It,
    Pt,
    Ru,
    Zh,
    Ja,
    Ko,
}

impl Language {
    /// ISO 639-1 code.
    pub fn code(&self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Es => "es",
            Language::Fr => "fr",
            Language::De => "de",
            Language::It => "it",
            Language::Pt => "pt",
            Language::Ru => "ru",
            Language::Zh => "zh",
            Language::Ja => "ja",
            Language::Ko => "ko",
        }
    }

    /// Parse a code; unknown codes collapse to English per the contract.
    pub fn from_code(code: &str) -> Language {
        match code.to_ascii_lowercase().as_str() {
            "es" => Language::Es,
            "fr" => Language::Fr,
            "de" => Language::De,
            "it" => Language::It,
            "pt" => Language::Pt,
            "ru" => Language::Ru,
            "zh" => Language::Zh,
            "ja" => Language::Ja,
            "ko" => Language::Ko,
            _ => Language::En,
        }
    }

    /// CJK languages join merged fragments without a space separator.
    pub fn is_cjk(&self) -> bool {
        matches!(self, Language::Zh | Language::Ja | Language::Ko)
    }

    fn from_whatlang(lang: whatlang::Lang) -> Option<Language> {
        use whatlang::Lang;
        match lang {
            Lang::Eng => Some(Language::En),
            Lang::Spa => Some(Language::Es),
            Lang::Fra => Some(Language::Fr),
            Lang::Deu => Some(Language::De),
            Lang::Ita => Some(Language::It),
            Lang::Por => Some(Language::Pt),
            Lang::Rus => Some(Language::Ru),
            Lang::Cmn => Some(Language::Zh),
            Lang::Jpn => Some(Language::Ja),
            Lang::Kor => Some(Language::Ko),
            _ => None,
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// A detection result: best language plus the identifier's confidence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub language: Language,
    pub confidence: f64,
}

impl Detection {
    fn english_fallback() -> Self {
        Self {
            language: Language::En,
            confidence: 0.0,
        }
    }
}

/// Detect the dominant language of `text`.
///
/// * Shorter than `minimum_text_length` codepoints → `(en, 0.0)`.
/// * Confidence below `confidence_threshold` → English, keeping the raw
///   sub-threshold confidence so callers can still see how weak the signal
///   was.
/// * Codes outside the supported set → English.
pub fn detect(text: &str, config: &LanguageDetectionConfig) -> Detection {
    if text.chars().count() < config.minimum_text_length {
        return Detection::english_fallback();
    }

    let Some(info) = whatlang::detect(text) else {
        return Detection::english_fallback();
    };

    let confidence = info.confidence();
    let language = Language::from_whatlang(info.lang());

    match language {
        Some(language) if confidence >= config.confidence_threshold => Detection {
            language,
            confidence,
        },
        _ => Detection {
            language: Language::En,
            confidence,
        },
    }
}

/// Detect over a joined corpus of element contents (single-space separated).
pub fn detect_from_elements(
    elements: &[DocumentElement],
    config: &LanguageDetectionConfig,
) -> Detection {
    let corpus: Vec<&str> = elements
        .iter()
        .filter(|e| e.element_type.is_text_bearing() && !e.content.is_empty())
        .map(|e| e.content.as_str())
        .collect();
    detect(&corpus.join(" "), config)
}

/// Detect with the most frequent language among `previous` as a prior.
///
/// The prior acts as confirmation: a detection that agrees with it and meets
/// the threshold is returned as-is. A disagreeing or sub-threshold detection
/// falls back to the plain [`detect`] contract, which is the same computation
/// with the standard English fallbacks applied.
pub fn detect_with_context(
    current: &str,
    previous: &[Language],
    config: &LanguageDetectionConfig,
) -> Detection {
    let detection = detect(current, config);
    match most_frequent(previous) {
        Some(prior)
            if detection.language == prior
                && detection.confidence >= config.confidence_threshold =>
        {
            detection
        }
        _ => detection,
    }
}

fn most_frequent(languages: &[Language]) -> Option<Language> {
    let mut counts: std::collections::BTreeMap<&'static str, (u32, Language)> =
        std::collections::BTreeMap::new();
    for &lang in languages {
        counts.entry(lang.code()).or_insert((0, lang)).0 += 1;
    }
    counts
        .into_values()
        .max_by_key(|&(count, _)| count)
        .map(|(_, lang)| lang)
}
