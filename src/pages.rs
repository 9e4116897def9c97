//! Page-range parsing: user selector strings → concrete page sets.
//!
//! Grammar (case-insensitive `all`, whitespace around tokens ignored):
//!
//! ```text
//! range    := "all" | from | to | explicit
//! from     := INT "+"          e.g. "3+"   → page 3 to the end
//! to       := "-" INT          e.g. "-4"   → pages 1..=4
//! explicit := INT | INT ("," INT)+ | INT "-" INT
//! ```
//!
//! Parsing is syntax-only; [`PageRange::resolve`] validates every referenced
//! page against the document's total and produces a sorted, de-duplicated
//! list of 1-based page numbers.

use crate::error::ConvertError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A parsed page selector, not yet validated against a page count.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PageRange {
    /// Every page (default).
    #[default]
    All,
    /// One page, 1-based.
    Single(u32),
    /// An explicit comma-separated set, 1-based.
    Multiple(Vec<u32>),
    /// Inclusive contiguous range `a-b` with `a ≤ b`.
    Range(u32, u32),
    /// `a+`: page `a` through the last page.
    From(u32),
    /// `-b`: page 1 through page `b`.
    To(u32),
}

impl PageRange {
    /// Parse a selector string. Syntax errors (and `a-b` with `a > b`)
    /// surface as [`ConvertError::InvalidPageRange`].
    pub fn parse(input: &str) -> Result<Self, ConvertError> {
        let trimmed = input.trim();
        let invalid = |detail: &str| ConvertError::InvalidPageRange {
            input: input.to_string(),
            detail: detail.to_string(),
        };

        if trimmed.is_empty() {
            return Err(invalid("empty selector"));
        }
        if trimmed.eq_ignore_ascii_case("all") {
            return Ok(PageRange::All);
        }

        // to := "-" INT
        if let Some(rest) = trimmed.strip_prefix('-') {
            let end = parse_page(rest).ok_or_else(|| invalid("expected a page number after '-'"))?;
            return Ok(PageRange::To(end));
        }

        // from := INT "+"
        if let Some(rest) = trimmed.strip_suffix('+') {
            let start =
                parse_page(rest).ok_or_else(|| invalid("expected a page number before '+'"))?;
            return Ok(PageRange::From(start));
        }

        // explicit := INT ("," INT)+
        if trimmed.contains(',') {
            let mut pages = Vec::new();
            for token in trimmed.split(',') {
                let page =
                    parse_page(token).ok_or_else(|| invalid("expected comma-separated page numbers"))?;
                pages.push(page);
            }
            return Ok(PageRange::Multiple(pages));
        }

        // explicit := INT "-" INT
        if let Some((left, right)) = trimmed.split_once('-') {
            let start = parse_page(left).ok_or_else(|| invalid("expected a range like '2-5'"))?;
            let end = parse_page(right).ok_or_else(|| invalid("expected a range like '2-5'"))?;
            if start > end {
                return Err(invalid(&format!("start {start} is after end {end}")));
            }
            return Ok(PageRange::Range(start, end));
        }

        // explicit := INT
        let page = parse_page(trimmed).ok_or_else(|| invalid("expected a page number"))?;
        Ok(PageRange::Single(page))
    }

    /// Expand into a sorted, de-duplicated list of 1-based page numbers,
    /// validating `1 ≤ n ≤ total_pages` for every referenced page.
    pub fn resolve(&self, total_pages: u32) -> Result<Vec<u32>, ConvertError> {
        let invalid = |detail: String| ConvertError::InvalidPageRange {
            input: self.to_string(),
            detail,
        };
        if total_pages == 0 {
            return Err(invalid("document has no pages".to_string()));
        }

        let check = |page: u32| -> Result<u32, ConvertError> {
            if page == 0 || page > total_pages {
                Err(invalid(format!(
                    "page {page} is out of range (document has {total_pages} pages)"
                )))
            } else {
                Ok(page)
            }
        };

        let mut pages: Vec<u32> = match self {
            PageRange::All => (1..=total_pages).collect(),
            PageRange::Single(page) => vec![check(*page)?],
            PageRange::Multiple(list) => list
                .iter()
                .map(|&p| check(p))
                .collect::<Result<Vec<_>, _>>()?,
            PageRange::Range(start, end) => {
                check(*start)?;
                check(*end)?;
                (*start..=*end).collect()
            }
            PageRange::From(start) => {
                check(*start)?;
                (*start..=total_pages).collect()
            }
            PageRange::To(end) => {
                check(*end)?;
                (1..=*end).collect()
            }
        };

        pages.sort_unstable();
        pages.dedup();
        Ok(pages)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PageRange::All => write!(f, "all"),
            PageRange::Single(page) => write!(f, "{page}"),
            PageRange::Multiple(pages) => {
                let joined: Vec<String> = pages.iter().map(u32::to_string).collect();
                write!(f, "{}", joined.join(","))
            }
            PageRange::Range(start, end) => write!(f, "{start}-{end}"),
            PageRange::From(start) => write!(f, "{start}+"),
            PageRange::To(end) => write!(f, "-{end}"),
        }
    }
}

fn parse_page(token: &str) -> Option<u32> {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return None;
    }
    trimmed.parse::<u32>().ok().filter(|&p| p > 0)
}
