//! Breakpoint-description parsing.
//!
//! The caller reports every split alignment as `left|right;` where each
//! side is a region `chr:start-end(strand)`; numbers may carry thousands
//! separators, e.g. `1:58,460-58,557(+)|1:135,876-135,929(-);`.

use std::fmt;
use std::str::FromStr;

use crate::core::ReportError;

const EVENT_SEP: char = ';';
const PAIR_SEP: char = '|';

/// strands of the two ends of a split alignment, e.g. `+-`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Orientation(pub char, pub char);

impl fmt::Display for Orientation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.0, self.1)
    }
}

impl FromStr for Orientation {
    type Err = ReportError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next(), chars.next()) {
            (Some(l), Some(r), None) if is_strand(l) && is_strand(r) => Ok(Orientation(l, r)),
            _ => Err(ReportError::Parse {
                input: s.to_string(),
                reason: "orientation must be two strand symbols".to_string(),
            }),
        }
    }
}

/// midpoints of both ends of one split alignment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Interval {
    pub left: i64,
    pub right: i64,
    pub orientation: Orientation,
}

impl Interval {
    pub fn new(left: i64, right: i64, orientation: Orientation) -> Self {
        Self {
            left,
            right,
            orientation,
        }
    }
}

fn is_strand(c: char) -> bool {
    c == '+' || c == '-'
}

fn malformed(input: &str, reason: &str) -> ReportError {
    ReportError::Parse {
        input: input.to_string(),
        reason: reason.to_string(),
    }
}

/// parse `chr:start-end(strand)` into the floored midpoint and the strand
///
/// # Example
///
/// ```rust
/// use sh_report::core::parse::parse_midpoint;
///
/// assert_eq!(parse_midpoint("1:58,460-58,557(+)").unwrap(), (58508, '+'));
/// ```
pub fn parse_midpoint(region: &str) -> Result<(i64, char), ReportError> {
    let (_chrom, rest) = region
        .trim()
        .split_once(':')
        .ok_or_else(|| malformed(region, "missing ':' after the chromosome"))?;

    let (span, strand) = rest
        .split_once('(')
        .ok_or_else(|| malformed(region, "missing '(strand)'"))?;

    let strand = strand
        .strip_suffix(')')
        .ok_or_else(|| malformed(region, "unclosed '(strand)'"))?;

    let mut symbols = strand.chars();
    let strand = match (symbols.next(), symbols.next()) {
        (Some(c), None) if is_strand(c) => c,
        _ => return Err(malformed(region, "strand must be '+' or '-'")),
    };

    let span: String = span.chars().filter(|c| *c != ',').collect();
    let (start, end) = span
        .split_once('-')
        .ok_or_else(|| malformed(region, "missing '-' between start and end"))?;

    let start: i64 = start
        .trim()
        .parse()
        .map_err(|_| malformed(region, "start is not an integer"))?;
    let end: i64 = end
        .trim()
        .parse()
        .map_err(|_| malformed(region, "end is not an integer"))?;

    let sum = start
        .checked_add(end)
        .ok_or_else(|| malformed(region, "coordinates overflow"))?;

    Ok((sum.div_euclid(2), strand))
}

/// parse a `;`-separated list of `left|right` regions, skipping empty events
pub fn parse_alignment_pairs(detail: &str) -> Result<Vec<Interval>, ReportError> {
    detail
        .split(EVENT_SEP)
        .filter(|event| !event.trim().is_empty())
        .map(|event| -> Result<Interval, ReportError> {
            let (left, right) = event
                .split_once(PAIR_SEP)
                .ok_or_else(|| malformed(event, "expected `left|right`"))?;

            if right.contains(PAIR_SEP) {
                return Err(malformed(event, "more than two regions in one event"));
            }

            let (left_mid, left_strand) = parse_midpoint(left)?;
            let (right_mid, right_strand) = parse_midpoint(right)?;

            Ok(Interval::new(
                left_mid,
                right_mid,
                Orientation(left_strand, right_strand),
            ))
        })
        .collect()
}
