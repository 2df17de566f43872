//! Reduction of llvm-cov region segments to per-line hit counts.
//!
//! A segment marks a position where the active coverage region changes. The
//! sweep walks every line between the first and the last segment and decides
//! whether the line is instrumented and, if so, how many times it ran.

use serde::Deserialize;

/// One `[line, column, count, has_count, is_entry, is_gap]` entry of a file's `segments`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct Segment {
    pub line: u32,
    pub column: u32,
    pub count: u64,
    pub has_count: bool,
    pub is_entry: bool,
    pub is_gap: bool,
}

impl Segment {
    pub fn new(
        line: u32,
        column: u32,
        count: u64,
        has_count: bool,
        is_entry: bool,
        is_gap: bool,
    ) -> Self {
        Self {
            line,
            column,
            count,
            has_count,
            is_entry,
            is_gap,
        }
    }

    /// A counted, non-gap segment that opens a region
    pub fn is_start_of_region(&self) -> bool {
        !self.is_gap && self.has_count && self.is_entry
    }
}

/// Sweep result for a single line; `None` means the line is not instrumented
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineCoverage {
    pub line: u32,
    pub execution_count: Option<u64>,
}

fn line_coverage_stats(run: &[Segment], wrapped: Option<&Segment>, line: u32) -> LineCoverage {
    let mut min_region_count = 0;
    for segment in run {
        if min_region_count > 1 {
            break;
        }
        if segment.is_start_of_region() {
            min_region_count += 1;
        }
    }

    let start_of_skipped_region = run
        .first()
        .is_some_and(|first| first.has_count && first.is_entry);

    let mapped = !start_of_skipped_region
        && (wrapped.is_some_and(|segment| segment.has_count) || min_region_count > 0);

    if !mapped {
        return LineCoverage {
            line,
            execution_count: None,
        };
    }

    let initial = wrapped.map_or(0, |segment| segment.count);
    let execution_count = run
        .iter()
        .filter(|segment| segment.is_start_of_region())
        .map(|segment| segment.count)
        .fold(initial, u64::max);

    LineCoverage {
        line,
        execution_count: Some(execution_count),
    }
}

/// Visits every line from the first to the last segment, inclusive.
///
/// Segments are taken in line order (stable for equal lines). The last segment of the most recent
/// non-empty line is carried forward as the region wrapping into the next
/// line. A line without segments of its own is reported as unmapped.
pub fn line_coverage(segments: &[Segment]) -> Vec<LineCoverage> {
    let mut segments = segments.to_vec();
    segments.sort_by_key(|segment| segment.line);
    let Some(first) = segments.first() else {
        return Vec::new();
    };

    let mut result = Vec::new();
    let mut wrapped: Option<&Segment> = None;
    let mut line = first.line;
    let mut index = 0;

    while index < segments.len() {
        let start = index;
        while index < segments.len() && segments[index].line == line {
            index += 1;
        }
        let run = &segments[start..index];

        if run.is_empty() {
            result.push(LineCoverage {
                line,
                execution_count: None,
            });
        } else {
            result.push(line_coverage_stats(run, wrapped, line));
            wrapped = run.last();
        }
        let Some(next) = line.checked_add(1) else {
            break;
        };
        line = next;
    }

    result
}

/// A (line, column) position; ordering is lexicographic
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct TextPos {
    pub line: u32,
    pub column: u32,
}

/// Extent of a function in its main file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegionRef {
    pub start: TextPos,
    pub end: TextPos,
}

fn text_pos(line: u64, column: u64) -> Option<TextPos> {
    Some(TextPos {
        line: u32::try_from(line).ok()?,
        column: u32::try_from(column).ok()?,
    })
}

// [line_start, col_start, line_end, col_end, count, file_id, expanded_file_id, kind]
const FILE_ID: usize = 5;
const KIND: usize = 7;
const REGION_FIELDS: usize = 8;

/// Union of a function's ordinary code regions.
///
/// Only regions with all eight numeric fields, located in the function's own
/// file (file id 0) and of the plain code kind (kind 0) count; expansion and
/// skipped regions are ignored. `None` when no region qualifies.
pub fn function_encompassing_region(regions: &[Vec<serde_json::Value>]) -> Option<RegionRef> {
    let mut result: Option<RegionRef> = None;

    for region in regions {
        if region.len() < REGION_FIELDS {
            continue;
        }
        let Some(fields) = region
            .iter()
            .take(REGION_FIELDS)
            .map(serde_json::Value::as_u64)
            .collect::<Option<Vec<u64>>>()
        else {
            continue;
        };
        if fields[KIND] != 0 || fields[FILE_ID] != 0 {
            continue;
        }

        let (Some(start), Some(end)) = (
            text_pos(fields[0], fields[1]),
            text_pos(fields[2], fields[3]),
        ) else {
            continue;
        };

        result = Some(match result {
            None => RegionRef { start, end },
            Some(current) => RegionRef {
                start: current.start.min(start),
                end: current.end.max(end),
            },
        });
    }

    result
}
