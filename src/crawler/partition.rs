//! Round-robin partitioning of crawl targets across workers

use std::num::NonZeroUsize;

/// Splits `items` into `k` disjoint ordered lists, item `i` going to list `i % k`
///
/// Deterministic for identical input. No attempt is made to balance by the
/// amount of work behind each item. When `k` exceeds the number of items the
/// trailing partitions are empty.
pub fn partition<T>(items: Vec<T>, k: NonZeroUsize) -> Vec<Vec<T>> {
    let k = k.get();
    let mut partitions: Vec<Vec<T>> = (0..k).map(|_| Vec::new()).collect();

    for (i, item) in items.into_iter().enumerate() {
        partitions[i % k].push(item);
    }

    partitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn k(n: usize) -> NonZeroUsize {
        NonZeroUsize::new(n).unwrap()
    }

    #[test]
    fn test_five_targets_two_workers() {
        let parts = partition(vec!["a", "b", "c", "d", "e"], k(2));
        assert_eq!(parts, vec![vec!["a", "c", "e"], vec!["b", "d"]]);
    }

    #[test]
    fn test_complete_and_disjoint() {
        for m in 0..30usize {
            for workers in 1..8usize {
                let parts = partition((0..m).collect(), k(workers));
                assert_eq!(parts.len(), workers);

                let mut seen: Vec<usize> = parts.iter().flatten().copied().collect();
                seen.sort_unstable();
                assert_eq!(seen, (0..m).collect::<Vec<_>>());

                for (p, part) in parts.iter().enumerate() {
                    assert!(part.iter().all(|i| i % workers == p));
                    assert!(part.windows(2).all(|w| w[0] < w[1]));
                }
            }
        }
    }

    #[test]
    fn test_more_workers_than_items() {
        let parts = partition(vec![1, 2], k(4));
        assert_eq!(parts, vec![vec![1], vec![2], vec![], vec![]]);
    }
}
