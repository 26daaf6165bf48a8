//! Batch boundaries for the scoring phase.
//!
//! Scoring runs one batch at a time so cancellation and progress are observed between
//! batches; each batch is scored in parallel.

use std::ops::Range;

/// Split `0..total` into at most `count` contiguous, non-empty ranges whose sizes differ
/// by at most one.
///
/// # Example
/// ```
/// # use gaffer::parallel::batch_ranges;
/// assert_eq!(batch_ranges(10, 3), vec![0..3, 3..6, 6..10]);
/// ```
pub fn batch_ranges(total: usize, count: usize) -> Vec<Range<usize>> {
    let count = count.min(total);
    (0..count)
        .map(|i| (i * total / count)..((i + 1) * total / count))
        .collect()
}

/// `items` as consecutive sub-slices, one per [batch_ranges] entry.
pub fn batches<T>(items: &[T], count: usize) -> impl Iterator<Item = &[T]> + '_ {
    batch_ranges(items.len(), count)
        .into_iter()
        .map(move |range| &items[range])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ranges_cover_everything_once() {
        let ranges = batch_ranges(1_000, 40);
        assert_eq!(ranges.len(), 40);
        assert_eq!(ranges.first().map(|r| r.start), Some(0));
        assert_eq!(ranges.last().map(|r| r.end), Some(1_000));
        assert!(ranges.windows(2).all(|pair| pair[0].end == pair[1].start));
        assert!(ranges.iter().all(|r| r.len() == 25));
    }

    #[test]
    fn uneven_split_differs_by_at_most_one() {
        let sizes: Vec<usize> = batch_ranges(10, 4).iter().map(|r| r.len()).collect();
        assert_eq!(sizes.iter().sum::<usize>(), 10);
        assert!(sizes.iter().max().zip(sizes.iter().min()).map_or(false, |(max, min)| max - min <= 1));
    }

    #[test]
    fn fewer_items_than_batches() {
        assert_eq!(batch_ranges(3, 40), vec![0..1, 1..2, 2..3]);
        assert!(batch_ranges(0, 40).is_empty());
        assert!(batch_ranges(5, 0).is_empty());
    }

    #[test]
    fn slices_follow_ranges() {
        let squads: Vec<u32> = (0..7).collect();
        let sliced: Vec<&[u32]> = batches(&squads, 3).collect();
        assert_eq!(sliced, vec![&[0, 1][..], &[2, 3][..], &[4, 5, 6][..]]);
    }
}
