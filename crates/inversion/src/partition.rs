//! Static partitioning of the pixel task arena.

use std::ops::Range;

/// Split `total` flat task indices into `workers` contiguous ranges.
///
/// Every partition gets `total / workers` tasks and the first
/// `total % workers` partitions get one extra, so sizes differ by at most one
/// and every index lands in exactly one range. Partition `i` starts at
/// `i · base + min(i, remainder)`. Ranges are empty when `workers > total`.
///
/// `workers` must be at least 1.
pub fn partition(total: usize, workers: usize) -> Vec<Range<usize>> {
    assert!(workers > 0, "partition requires at least one worker");

    let base = total / workers;
    let remainder = total % workers;

    (0..workers)
        .map(|i| {
            let start = i * base + i.min(remainder);
            let len = base + usize::from(i < remainder);
            start..start + len
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_exact_cover(total: usize, workers: usize) {
        let parts = partition(total, workers);
        assert_eq!(parts.len(), workers);

        let mut seen = vec![0u32; total];
        for range in &parts {
            for i in range.clone() {
                seen[i] += 1;
            }
        }
        assert!(
            seen.iter().all(|&n| n == 1),
            "total {} workers {}: {:?}",
            total,
            workers,
            parts
        );

        // Contiguous and ordered.
        let mut next = 0;
        for range in &parts {
            assert_eq!(range.start, next);
            next = range.end;
        }
        assert_eq!(next, total);

        let sizes: Vec<usize> = parts.iter().map(|r| r.len()).collect();
        let max = *sizes.iter().max().unwrap();
        let min = *sizes.iter().min().unwrap();
        assert!(max - min <= 1);
    }

    #[test]
    fn test_even_split() {
        assert_eq!(partition(9, 3), vec![0..3, 3..6, 6..9]);
    }

    #[test]
    fn test_remainder_goes_to_first_partitions() {
        assert_eq!(partition(10, 4), vec![0..3, 3..6, 6..8, 8..10]);
    }

    #[test]
    fn test_more_workers_than_tasks() {
        let parts = partition(2, 5);
        assert_eq!(parts, vec![0..1, 1..2, 2..2, 2..2, 2..2]);
    }

    #[test]
    fn test_exact_cover_for_all_shapes() {
        for rows in 0..=7 {
            for cols in 0..=7 {
                for workers in 1..=12 {
                    assert_exact_cover(rows * cols, workers);
                }
            }
        }
        assert_exact_cover(1_000_003, 7);
        assert_exact_cover(513 * 511, 64);
    }

    #[test]
    #[should_panic(expected = "at least one worker")]
    fn test_zero_workers_panics() {
        partition(4, 0);
    }
}
