use rand::Rng;
use std::{
    collections::HashSet,
    hash::Hash,
};

/// `catalog` minus `used`, keeping catalog order and dropping repeated entries.
///
/// An empty result means everything has been used; callers must check for it.
pub fn eligible<T>(catalog: &[T], used: &[T]) -> Vec<T>
where
    T: Clone + Eq + Hash,
{
    let used: HashSet<&T> = used.iter().collect();
    let mut seen = HashSet::with_capacity(catalog.len());
    catalog
        .iter()
        .filter(|item| !used.contains(item) && seen.insert(*item))
        .cloned()
        .collect()
}

/// Draws up to `k` distinct elements from `pool`, uniformly, without touching `pool`.
///
/// Every step draws a uniform index over the elements still remaining. Asking for
/// more than the pool holds returns the whole pool in random order.
pub fn pick_without_replacement<T, R>(pool: &[T], k: usize, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    let mut remaining: Vec<&T> = pool.iter().collect();
    let mut picks = Vec::with_capacity(k.min(pool.len()));
    while picks.len() < k && !remaining.is_empty() {
        let index = rng.random_range(0..remaining.len());
        picks.push(remaining.swap_remove(index).clone());
    }
    picks
}

pub fn pick_one<T, R>(pool: &[T], rng: &mut R) -> Option<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    pick_without_replacement(pool, 1, rng).pop()
}

#[cfg(test)]
mod tests {
    #![allow(non_snake_case)]
    use super::*;
    use proptest::prelude::*;
    use rand::{
        SeedableRng,
        rngs::StdRng,
    };

    proptest! {
        #[test]
        fn eligible__excludes_used_and_keeps_every_other_entry_once(
            catalog in proptest::collection::vec(0u8..40, 0..60),
            used_mask in proptest::collection::vec(any::<bool>(), 60),
        ) {
            // given
            let used: Vec<u8> = catalog
                .iter()
                .zip(&used_mask)
                .filter(|(_, is_used)| **is_used)
                .map(|(item, _)| *item)
                .collect();

            // when
            let result = eligible(&catalog, &used);

            // then
            for item in &result {
                prop_assert!(!used.contains(item));
                prop_assert_eq!(result.iter().filter(|other| *other == item).count(), 1);
            }
            for item in catalog.iter().filter(|item| !used.contains(item)) {
                prop_assert!(result.contains(item));
            }
            let mut expected_order: Vec<u8> = Vec::new();
            for item in catalog.iter().filter(|item| !used.contains(item)) {
                if !expected_order.contains(item) {
                    expected_order.push(*item);
                }
            }
            prop_assert_eq!(result, expected_order);
        }

        #[test]
        fn pick_without_replacement__returns_distinct_members_of_the_pool(
            size in 0usize..30,
            k in 0usize..40,
            seed in any::<u64>(),
        ) {
            // given
            let pool: Vec<usize> = (0..size).collect();
            let mut rng = StdRng::seed_from_u64(seed);

            // when
            let picks = pick_without_replacement(&pool, k, &mut rng);

            // then
            prop_assert_eq!(picks.len(), k.min(size));
            let distinct: HashSet<&usize> = picks.iter().collect();
            prop_assert_eq!(distinct.len(), picks.len());
            prop_assert!(picks.iter().all(|pick| pool.contains(pick)));
            prop_assert_eq!(pool, (0..size).collect::<Vec<_>>());
        }
    }

    #[test]
    fn eligible__is_empty_when_everything_is_used() {
        let catalog = vec!["A", "B", "C"];

        let result = eligible(&catalog, &["C", "A", "B"]);

        assert!(result.is_empty());
    }

    #[test]
    fn pick_without_replacement__oversized_request_returns_whole_pool() {
        // given
        let pool = vec!["A", "B", "C"];
        let mut rng = StdRng::seed_from_u64(7);

        // when
        let mut picks = pick_without_replacement(&pool, 10, &mut rng);
        picks.sort();

        // then
        assert_eq!(picks, pool);
    }

    #[test]
    fn pick_one__empty_pool_yields_nothing() {
        let mut rng = StdRng::seed_from_u64(1);

        assert_eq!(pick_one::<u8, _>(&[], &mut rng), None);
    }

    #[test]
    fn pick_one__frequencies_are_uniform() {
        // given
        const N: usize = 8;
        const TRIALS: usize = 80_000;
        let pool: Vec<usize> = (0..N).collect();
        let mut rng = StdRng::seed_from_u64(0x5eed);
        let mut counts = [0usize; N];

        // when
        for _ in 0..TRIALS {
            let pick = pick_one(&pool, &mut rng).unwrap();
            counts[pick] += 1;
        }

        // then
        // expected 10_000 per bucket with a standard deviation near 94, so 5% is far outside noise
        let expected = TRIALS as f64 / N as f64;
        for count in counts {
            let deviation = (count as f64 - expected).abs() / expected;
            assert!(deviation < 0.05, "bucket count {count} deviates {deviation}");
        }
        // chi-square with 7 degrees of freedom; 24.3 is the 0.001 critical value
        let chi_square: f64 = counts
            .iter()
            .map(|count| (*count as f64 - expected).powi(2) / expected)
            .sum();
        assert!(chi_square < 24.3, "chi-square {chi_square}");
    }

    #[test]
    fn pick_without_replacement__second_draw_is_uniform_over_the_rest() {
        // given
        const TRIALS: usize = 40_000;
        let pool = [0usize, 1, 2, 3];
        let mut rng = StdRng::seed_from_u64(42);
        let mut second_counts = [0usize; 4];

        // when
        for _ in 0..TRIALS {
            let picks = pick_without_replacement(&pool, 2, &mut rng);
            second_counts[picks[1]] += 1;
        }

        // then
        let expected = TRIALS as f64 / 4.0;
        for count in second_counts {
            assert!((count as f64 - expected).abs() / expected < 0.05);
        }
    }
}
