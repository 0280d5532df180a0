use std::{iter::StepBy, ops::RangeInclusive};

/// An iterator that yields _inclusive_ block ranges of a given step size.
#[derive(Debug)]
pub struct BlockRangeInclusiveIter {
    iter: StepBy<RangeInclusive<u64>>,
    step: u64,
    end: u64,
}

impl BlockRangeInclusiveIter {
    /// Split `range` into chunks of at most `step + 1` blocks.
    pub fn new(range: RangeInclusive<u64>, step: u64) -> Self {
        Self { end: *range.end(), iter: range.step_by(step as usize + 1), step }
    }
}

impl Iterator for BlockRangeInclusiveIter {
    type Item = (u64, u64);

    fn next(&mut self) -> Option<Self::Item> {
        let start = self.iter.next()?;
        let end = (start + self.step).min(self.end);
        if start > end {
            return None;
        }
        Some((start, end))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunks_cover_range_without_overlap() {
        let chunks: Vec<_> = BlockRangeInclusiveIter::new(0..=10, 3).collect();
        assert_eq!(chunks, vec![(0, 3), (4, 7), (8, 10)]);
    }

    #[test]
    fn single_block_range() {
        let chunks: Vec<_> = BlockRangeInclusiveIter::new(5..=5, 1000).collect();
        assert_eq!(chunks, vec![(5, 5)]);
    }
}
