//! Splitting the frame index space across workers.

use std::fmt::{Display, Formatter, Result as FmtResult};
use std::ops::Range;

/// Half-open interval `[start, end)` of frame indices owned by one worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkRange {
    /// First index in the range.
    pub start: u64,
    /// One past the last index.
    pub end: u64,
}

impl WorkRange {
    /// Create a range. `end` is clamped so the range is never inverted.
    pub fn new(start: u64, end: u64) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }

    /// Number of frames in the range.
    pub fn len(&self) -> u64 {
        self.end - self.start
    }

    /// `true` if the range holds no frames.
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Whether `index` falls inside the range.
    pub fn contains(&self, index: u64) -> bool {
        (self.start..self.end).contains(&index)
    }

    /// Iterate the indices in order.
    pub fn indices(&self) -> Range<u64> {
        self.start..self.end
    }
}

impl Display for WorkRange {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

/// Divide `[0, total_frames)` into at most `max_parallelism` contiguous ranges.
///
/// With `W = min(max_parallelism, total_frames)` the first `W - 1` ranges
/// hold `total_frames / W` frames each and the last range takes the
/// remainder. No ranges are produced for zero frames; a parallelism of zero
/// is treated as one.
///
/// # Example
///
/// ```
/// use posterize::{WorkRange, partition};
///
/// let ranges = partition(10, 3);
/// assert_eq!(ranges, vec![WorkRange::new(0, 3), WorkRange::new(3, 6), WorkRange::new(6, 10)]);
/// ```
pub fn partition(total_frames: u64, max_parallelism: usize) -> Vec<WorkRange> {
    if total_frames == 0 {
        return Vec::new();
    }

    let workers = (max_parallelism.max(1) as u64).min(total_frames);
    let base = total_frames / workers;

    (0..workers)
        .map(|worker| {
            let start = worker * base;
            let end = if worker == workers - 1 {
                total_frames
            } else {
                start + base
            };
            WorkRange::new(start, end)
        })
        .collect()
}
