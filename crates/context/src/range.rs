//! Line ranges and the interval merge used by script excerpts.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RangeError {
    #[error("range end {end} is before start {start}")]
    Reversed { start: usize, end: usize },

    #[error("malformed range '{0}', expected 'start-end'")]
    Malformed(String),
}

/// An inclusive range of line numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LineRange {
    start: usize,
    end: usize,
}

impl LineRange {
    pub fn new(start: usize, end: usize) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::Reversed { start, end });
        }
        Ok(Self { start, end })
    }

    /// A single line.
    pub fn line(line: usize) -> Self {
        Self {
            start: line,
            end: line,
        }
    }

    pub fn start(&self) -> usize {
        self.start
    }

    pub fn end(&self) -> usize {
        self.end
    }

    pub fn contains(&self, line: usize) -> bool {
        (self.start..=self.end).contains(&line)
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.start, self.end)
    }
}

impl FromStr for LineRange {
    type Err = RangeError;

    /// Parses `"3-8"`, or `"7"` for a single line.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || RangeError::Malformed(s.to_string());
        let s = s.trim();
        match s.split_once('-') {
            Some((start, end)) => {
                let start = start.trim().parse().map_err(|_| malformed())?;
                let end = end.trim().parse().map_err(|_| malformed())?;
                Self::new(start, end)
            }
            None => s.parse().map(Self::line).map_err(|_| malformed()),
        }
    }
}

/// Merge ranges into a sorted list where no two ranges overlap or touch.
pub fn merge_ranges<I>(ranges: I) -> Vec<LineRange>
where
    I: IntoIterator<Item = LineRange>,
{
    let mut sorted: Vec<LineRange> = ranges.into_iter().collect();
    sorted.sort_unstable();

    let mut merged = Vec::with_capacity(sorted.len());
    let mut iter = sorted.into_iter();
    let Some(mut current) = iter.next() else {
        return merged;
    };
    for next in iter {
        if current.end >= next.start.saturating_sub(1) {
            current.end = current.end.max(next.end);
        } else {
            merged.push(current);
            current = next;
        }
    }
    merged.push(current);
    merged
}
