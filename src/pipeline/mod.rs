//! Pipeline stages for element-stream reconstruction.
//!
//! Each submodule implements exactly one transformation step.
//! Keeping stages separate makes each independently testable and lets us
//! swap implementations (e.g. a different column model) without touching
//! other stages.
//!
//! ## Data Flow
//!
//! ```text
//! observations ─▶ regions ─▶ sort ─▶ dedup ─▶ merge ─▶ structure ─▶ sort ─▶ emit ─▶ refine
//!  (per page)     (C4)       (C8)    (C5)     (C6)     (C7)         (C8)    (C9)    (C11)
//! ```
//!
//! 1. [`regions`]   — tag header/footer candidates by page geometry
//! 2. [`sort`]      — impose the reading order (run per page, and again
//!    document-wide after structure detection)
//! 3. [`dedup`]     — drop running headers/footers repeated across pages
//! 4. [`merge`]     — stitch fragments OCR split across lines and pages
//! 5. [`structure`] — assign header levels, detect list markers and nesting
//! 6. [`emit`]      — serialise the ordered elements to Markdown
//! 7. [`refine`]    — optional best-effort LLM post-pass; never fatal
//!
//! Stages 1–2 are per-page and data-parallel; 3–7 need the document-wide
//! view and run serially.

pub mod dedup;
pub mod emit;
pub mod merge;
pub mod refine;
pub mod regions;
pub mod sort;
pub mod structure;
