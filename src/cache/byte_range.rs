//! Byte Ranges
//!
//! Half-open intervals used to describe which extents of a cached region
//! hold data.

use std::fmt;

/// Half-open byte interval `[start, end)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct ByteRange {
    start: u64,
    end: u64,
}

impl ByteRange {
    /// The empty range at offset zero
    pub const EMPTY: ByteRange = ByteRange { start: 0, end: 0 };

    /// Create the range `[start, end)`
    ///
    /// # Panics
    ///
    /// Panics if `end < start`.
    pub fn of(start: u64, end: u64) -> Self {
        assert!(
            end >= start,
            "range end [{}] must not be smaller than start [{}]",
            end,
            start
        );
        Self { start, end }
    }

    #[inline]
    pub fn start(&self) -> u64 {
        self.start
    }

    #[inline]
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of bytes covered
    #[inline]
    pub fn length(&self) -> u64 {
        self.end - self.start
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// Check whether `position` falls inside the range
    #[inline]
    pub fn contains(&self, position: u64) -> bool {
        position >= self.start && position < self.end
    }

    /// Smallest range containing both `self` and `other`
    ///
    /// Returns one of the inputs unchanged when it already contains the
    /// other, and `self` when `other` is `None`.
    pub fn min_envelope(self, other: impl Into<Option<ByteRange>>) -> ByteRange {
        let Some(other) = other.into() else {
            return self;
        };
        if other.is_sub_range_of(&self) {
            return self;
        }
        if self.is_sub_range_of(&other) {
            return other;
        }
        ByteRange::of(self.start.min(other.start), self.end.max(other.end))
    }

    /// Check whether `self` lies entirely within `range`
    #[inline]
    pub fn is_sub_range_of(&self, range: &ByteRange) -> bool {
        self.start >= range.start && self.end <= range.end
    }

    /// Check whether the two ranges share at least one byte
    #[inline]
    pub fn has_overlap(&self, other: &ByteRange) -> bool {
        self.start < other.end && self.end > other.start
    }

    /// Intersection of the two ranges
    ///
    /// Only meaningful when [`has_overlap`](Self::has_overlap) holds; disjoint
    /// ranges yield an empty range at the later start.
    pub fn overlap(&self, other: &ByteRange) -> ByteRange {
        let start = self.start.max(other.start);
        ByteRange {
            start,
            end: self.end.min(other.end).max(start),
        }
    }
}

impl fmt::Display for ByteRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}-{}]", self.start, self.end)
    }
}

impl From<std::ops::Range<u64>> for ByteRange {
    fn from(range: std::ops::Range<u64>) -> Self {
        ByteRange::of(range.start, range.end)
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_length() {
        assert_eq!(ByteRange::of(10, 25).length(), 15);
        assert_eq!(ByteRange::of(7, 7).length(), 0);
        assert!(ByteRange::EMPTY.is_empty());
    }

    #[test]
    #[should_panic(expected = "must not be smaller than start")]
    fn test_inverted_range_panics() {
        ByteRange::of(10, 5);
    }

    #[test]
    fn test_min_envelope_short_circuits() {
        let outer = ByteRange::of(0, 100);
        let inner = ByteRange::of(10, 20);

        assert_eq!(outer.min_envelope(inner), outer);
        assert_eq!(inner.min_envelope(outer), outer);
        assert_eq!(inner.min_envelope(None), inner);
    }

    #[test]
    fn test_min_envelope_disjoint() {
        let a = ByteRange::of(0, 10);
        let b = ByteRange::of(30, 40);

        assert_eq!(a.min_envelope(b), ByteRange::of(0, 40));
        assert_eq!(b.min_envelope(Some(a)), ByteRange::of(0, 40));
    }

    #[test]
    fn test_overlap_is_half_open() {
        let a = ByteRange::of(0, 10);
        let b = ByteRange::of(10, 20);
        let c = ByteRange::of(5, 15);

        assert!(!a.has_overlap(&b));
        assert!(!b.has_overlap(&a));
        assert!(a.has_overlap(&c));
        assert_eq!(a.overlap(&c), ByteRange::of(5, 10));
        assert_eq!(c.overlap(&b), ByteRange::of(10, 15));
    }

    #[test]
    fn test_overlap_of_disjoint_ranges_is_empty() {
        let a = ByteRange::of(0, 10);
        let b = ByteRange::of(30, 40);

        assert_eq!(a.overlap(&b), ByteRange::of(30, 30));
        assert_eq!(b.overlap(&a), ByteRange::of(30, 30));
        assert!(a.overlap(&b).is_empty());
        assert_eq!(ByteRange::of(0, 10).overlap(&ByteRange::of(10, 20)).length(), 0);
    }

    #[test]
    fn test_sub_range() {
        let a = ByteRange::of(0, 10);
        assert!(ByteRange::of(2, 10).is_sub_range_of(&a));
        assert!(a.is_sub_range_of(&a));
        assert!(!ByteRange::of(2, 11).is_sub_range_of(&a));
    }

    #[test]
    fn test_ordering_by_start() {
        let mut ranges = vec![
            ByteRange::of(20, 30),
            ByteRange::of(0, 50),
            ByteRange::of(5, 6),
        ];
        ranges.sort();
        let starts: Vec<u64> = ranges.iter().map(|r| r.start()).collect();
        assert_eq!(starts, vec![0, 5, 20]);
    }

    #[test]
    fn test_display() {
        assert_eq!(ByteRange::of(3, 9).to_string(), "[3-9]");
        assert_eq!(ByteRange::from(1..4), ByteRange::of(1, 4));
    }
}
