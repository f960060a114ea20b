//! Page range selection.
//!
//! A selection specification is a comma-separated list of zero-based page
//! indices (`3`) and inclusive ranges (`0-4`). The parsed [`PageSelection`]
//! acts as a pure inclusion predicate over page index: a page is included
//! if any range contains it. Absence of a specification selects every page.
//!
//! # Example
//!
//! ```
//! use folio_core::pages::PageSelection;
//!
//! let selection = PageSelection::parse("0,2-3").unwrap();
//! assert!(selection.includes(0));
//! assert!(!selection.includes(1));
//! assert!(selection.includes(3));
//! ```

mod error;

pub use error::RangeSpecError;

use std::fmt;
use std::str::FromStr;

use tracing::debug;

/// Inclusive interval of zero-based page indices with `start <= end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRange {
    start: usize,
    end: usize,
}

impl PageRange {
    /// Creates a range, rejecting `start > end`.
    ///
    /// # Errors
    ///
    /// Returns [`RangeSpecError::StartAfterEnd`] if `start > end`.
    pub fn new(start: usize, end: usize) -> Result<Self, RangeSpecError> {
        if start > end {
            return Err(RangeSpecError::start_after_end(&format!("{start}-{end}")));
        }
        Ok(Self { start, end })
    }

    /// Creates a range covering a single page.
    #[must_use]
    pub fn single(index: usize) -> Self {
        Self {
            start: index,
            end: index,
        }
    }

    /// First included index.
    #[must_use]
    pub fn start(&self) -> usize {
        self.start
    }

    /// Last included index.
    #[must_use]
    pub fn end(&self) -> usize {
        self.end
    }

    /// Returns true if `index` lies within the range.
    #[must_use]
    pub fn contains(&self, index: usize) -> bool {
        (self.start..=self.end).contains(&index)
    }
}

impl fmt::Display for PageRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{}-{}", self.start, self.end)
        }
    }
}

/// Compiled page selection.
///
/// `PageSelection::all()` (the default) includes every index; otherwise an
/// index is included iff at least one range contains it. Overlapping ranges
/// and ranges beyond the manifest's page count are accepted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageSelection {
    ranges: Option<Vec<PageRange>>,
}

impl PageSelection {
    /// Selection that includes every page.
    #[must_use]
    pub fn all() -> Self {
        Self { ranges: None }
    }

    /// Builds a selection from already validated ranges.
    #[must_use]
    pub fn from_ranges(ranges: Vec<PageRange>) -> Self {
        Self {
            ranges: Some(ranges),
        }
    }

    /// Parses a comma-separated specification such as `"0,2,5-9"`.
    ///
    /// An empty (or whitespace-only) specification selects every page.
    /// Whitespace around tokens and around the `-` separator is ignored.
    ///
    /// # Errors
    ///
    /// Returns [`RangeSpecError`] if a token is empty or not of the form
    /// `N`/`N-M`, a number fails to parse, or a range has `start > end`.
    pub fn parse(spec: &str) -> Result<Self, RangeSpecError> {
        if spec.trim().is_empty() {
            return Ok(Self::all());
        }

        let ranges = spec
            .split(',')
            .map(parse_token)
            .collect::<Result<Vec<_>, _>>()?;

        debug!(spec, ranges = ranges.len(), "parsed page selection");
        Ok(Self::from_ranges(ranges))
    }

    /// Parses an optional specification; `None` selects every page.
    ///
    /// # Errors
    ///
    /// Same as [`PageSelection::parse`].
    pub fn from_option(spec: Option<&str>) -> Result<Self, RangeSpecError> {
        spec.map_or_else(|| Ok(Self::all()), Self::parse)
    }

    /// Returns true if the zero-based page `index` is selected.
    #[must_use]
    pub fn includes(&self, index: usize) -> bool {
        match &self.ranges {
            None => true,
            Some(ranges) => ranges.iter().any(|range| range.contains(index)),
        }
    }

    /// Returns true if this selection includes every page.
    #[must_use]
    pub fn is_all(&self) -> bool {
        self.ranges.is_none()
    }

    /// Parsed ranges, or `None` when every page is selected.
    #[must_use]
    pub fn ranges(&self) -> Option<&[PageRange]> {
        self.ranges.as_deref()
    }
}

impl FromStr for PageSelection {
    type Err = RangeSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for PageSelection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Some(ranges) = &self.ranges else {
            return write!(f, "all");
        };
        for (i, range) in ranges.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{range}")?;
        }
        Ok(())
    }
}

fn parse_token(raw: &str) -> Result<PageRange, RangeSpecError> {
    let token = raw.trim();
    if token.is_empty() {
        return Err(RangeSpecError::invalid_token(raw));
    }

    if !token.contains('-') {
        return Ok(PageRange::single(parse_index(token, token)?));
    }

    let parts: Vec<&str> = token.split('-').collect();
    let [start, end] = parts.as_slice() else {
        return Err(RangeSpecError::invalid_token(token));
    };

    let start = parse_index(start.trim(), token)?;
    let end = parse_index(end.trim(), token)?;
    if start > end {
        return Err(RangeSpecError::start_after_end(token));
    }
    Ok(PageRange { start, end })
}

fn parse_index(value: &str, token: &str) -> Result<usize, RangeSpecError> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(RangeSpecError::invalid_number(value, token));
    }
    value
        .parse::<usize>()
        .map_err(|_| RangeSpecError::invalid_number(value, token))
}
