//! Page-range table: which pages go into which Markdown file.
//!
//! A book is split into chapters by a fixed table of closed 1-based page
//! intervals, each mapped to one output file in the text folder. The table
//! is validated once at construction (no zero pages, `start <= end`,
//! disjoint intervals, relative file names) and kept sorted by `start`, so
//! [`RangeTable::resolve`] is a binary search.
//!
//! Gaps are allowed: pages outside every range are rendered but their text
//! is not written anywhere (covers, blank leaves, front matter handled by
//! hand).

use crate::error::BookscanError;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::path::{Component, Path};
use std::str::FromStr;

/// A closed interval `[start, end]` of 1-based page numbers and the output
/// document its text is appended to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRange {
    pub start: usize,
    pub end: usize,
    /// File name relative to the text folder, e.g. `"chapter_01.md"`.
    pub output: String,
}

impl PageRange {
    pub fn new(start: usize, end: usize, output: impl Into<String>) -> Self {
        Self {
            start,
            end,
            output: output.into(),
        }
    }

    /// A range whose output file follows the `range_<start>_<end>.md` naming.
    pub fn with_default_output(start: usize, end: usize) -> Self {
        Self::new(start, end, format!("range_{start}_{end}.md"))
    }

    pub fn contains(&self, page_num: usize) -> bool {
        self.start <= page_num && page_num <= self.end
    }

    fn validate(&self) -> Result<(), BookscanError> {
        let invalid = |reason: &str| BookscanError::InvalidRange {
            range: self.to_string(),
            reason: reason.to_string(),
        };
        if self.start == 0 {
            return Err(invalid("pages are 1-indexed, minimum is 1"));
        }
        if self.start > self.end {
            return Err(invalid("start must be <= end"));
        }
        if self.output.trim().is_empty() {
            return Err(invalid("output file name is empty"));
        }
        let escapes = Path::new(&self.output)
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
        if escapes {
            return Err(invalid(
                "output must be a relative path inside the text folder",
            ));
        }
        Ok(())
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{} → {}", self.start, self.end, self.output)
    }
}

/// Parses `START-END=FILE`, `PAGE=FILE`, `START-END` or `PAGE`.
///
/// Without `=FILE` the output defaults to `range_<start>_<end>.md`.
impl FromStr for PageRange {
    type Err = BookscanError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: String| BookscanError::InvalidRange {
            range: s.to_string(),
            reason,
        };

        let (span, output) = match s.split_once('=') {
            Some((span, file)) => (span.trim(), Some(file.trim())),
            None => (s.trim(), None),
        };

        let parse_page = |p: &str| {
            p.trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("'{}' is not a page number", p.trim())))
        };

        let (start, end) = match span.split_once('-') {
            Some((a, b)) => (parse_page(a)?, parse_page(b)?),
            None => {
                let p = parse_page(span)?;
                (p, p)
            }
        };

        let range = match output {
            Some(file) => PageRange::new(start, end, file),
            None => PageRange::with_default_output(start, end),
        };
        range.validate()?;
        Ok(range)
    }
}

/// Validated, sorted, disjoint set of [`PageRange`]s.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RangeTable {
    ranges: Vec<PageRange>,
}

impl RangeTable {
    /// Validate and sort `ranges`.
    ///
    /// # Errors
    /// [`BookscanError::InvalidRange`] for a malformed range and
    /// [`BookscanError::OverlappingRanges`] when two ranges share a page.
    pub fn new(mut ranges: Vec<PageRange>) -> Result<Self, BookscanError> {
        for r in &ranges {
            r.validate()?;
        }
        ranges.sort_by_key(|r| (r.start, r.end));

        for pair in ranges.windows(2) {
            if pair[1].start <= pair[0].end {
                return Err(BookscanError::OverlappingRanges {
                    first: pair[0].to_string(),
                    second: pair[1].to_string(),
                });
            }
        }

        Ok(Self { ranges })
    }

    /// Parse `ranges` from a JSON array of `{"start", "end", "output"}`
    /// objects.
    pub fn from_json(json: &str) -> Result<Self, BookscanError> {
        let ranges: Vec<PageRange> = serde_json::from_str(json).map_err(|e| {
            BookscanError::InvalidConfig(format!("range table is not valid JSON: {e}"))
        })?;
        Self::new(ranges)
    }

    /// One single-page range per page, each written to `page_<N>.txt`.
    pub fn per_page(pages: &[usize]) -> Result<Self, BookscanError> {
        Self::new(
            pages
                .iter()
                .map(|&p| PageRange::new(p, p, format!("page_{p}.txt")))
                .collect(),
        )
    }

    /// Find the range containing `page_num`.
    ///
    /// Ranges are sorted and disjoint, so the only candidate is the first
    /// range whose `end` is not below `page_num`.
    pub fn resolve(&self, page_num: usize) -> Option<&PageRange> {
        let idx = self.ranges.partition_point(|r| r.end < page_num);
        self.ranges.get(idx).filter(|r| r.contains(page_num))
    }

    /// Distinct output files in first-appearance (page) order.
    pub fn output_files(&self) -> Vec<&str> {
        let mut seen = HashSet::new();
        self.ranges
            .iter()
            .map(|r| r.output.as_str())
            .filter(|o| seen.insert(*o))
            .collect()
    }

    /// Pages in `1..=total_pages` that no range covers.
    pub fn uncovered(&self, total_pages: usize) -> Vec<usize> {
        (1..=total_pages)
            .filter(|&p| self.resolve(p).is_none())
            .collect()
    }

    pub fn ranges(&self) -> &[PageRange] {
        &self.ranges
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }
}

impl<'de> Deserialize<'de> for RangeTable {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let ranges = Vec::<PageRange>::deserialize(deserializer)?;
        RangeTable::new(ranges).map_err(serde::de::Error::custom)
    }
}

/// Free-function form of [`RangeTable::resolve`] returning the output file.
pub fn resolve_range(page_num: usize, ranges: &RangeTable) -> Option<&str> {
    ranges.resolve(page_num).map(|r| r.output.as_str())
}
