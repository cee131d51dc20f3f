//! Partner selection for pair sampling.
//!
//! For a first record `i`, a candidate partner `j` is accepted when it is not
//! `i` itself and, whenever `j` is a multiple of 3, it shares `i`'s category.
//! Candidates that are not multiples of 3 are accepted regardless of
//! category, which biases the output towards matching pairs.
//!
//! [`SamplingStrategy::FixedFlag`] keeps the older rule instead: the
//! multiple-of-3 test is taken from the first draw only. A first draw that is
//! not a multiple of 3 then accepts any other record. A first draw that is a
//! multiple of 3 requires a same-category partner for every redraw.

use std::collections::HashMap;
use std::fmt;

use rand::Rng;

use crate::dataset::Dataset;
use crate::error::{PairError, Result};

pub const DEFAULT_MAX_REDRAWS: usize = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchLabel {
    Match,
    Mismatch,
}

impl MatchLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            MatchLabel::Match => "1",
            MatchLabel::Mismatch => "0",
        }
    }
}

impl fmt::Display for MatchLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pair {
    pub first_index: usize,
    pub second_index: usize,
    pub label: MatchLabel,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum SamplingStrategy {
    /// One draw, uniform over the accepted candidates.
    #[default]
    Exact,
    /// Draw over all indices and redraw until accepted, at most `max_redraws` times.
    Rejection { max_redraws: usize },
    /// Redraw loop whose flag comes from the first draw and is never recomputed.
    FixedFlag { max_redraws: usize },
}

/// Whether `j` is an acceptable partner for first record `i`.
pub fn accepts(dataset: &Dataset, i: usize, j: usize) -> bool {
    let flag = j % 3;
    j != i && !(flag == 0 && !dataset.same_category(i, j))
}

pub struct PairSampler<'a> {
    dataset: &'a Dataset,
    strategy: SamplingStrategy,
    // indices with j % 3 != 0, ascending
    open: Vec<usize>,
    // indices with j % 3 == 0, ascending, keyed by category
    pinned: HashMap<&'a str, Vec<usize>>,
    category_sizes: HashMap<&'a str, usize>,
}

impl<'a> PairSampler<'a> {
    /// Fails with `InsufficientData` for a single-record dataset, where no
    /// partner other than the record itself exists.
    pub fn new(dataset: &'a Dataset, strategy: SamplingStrategy) -> Result<Self> {
        if dataset.len() == 1 {
            return Err(PairError::insufficient_data(2, dataset.len()));
        }

        let mut open = Vec::new();
        let mut pinned: HashMap<&'a str, Vec<usize>> = HashMap::new();
        let mut category_sizes: HashMap<&'a str, usize> = HashMap::new();
        for (j, record) in dataset.records().iter().enumerate() {
            *category_sizes.entry(record.category.as_str()).or_insert(0) += 1;
            if j % 3 == 0 {
                pinned.entry(record.category.as_str()).or_default().push(j);
            } else {
                open.push(j);
            }
        }

        Ok(PairSampler {
            dataset,
            strategy,
            open,
            pinned,
            category_sizes,
        })
    }

    pub fn strategy(&self) -> SamplingStrategy {
        self.strategy
    }

    fn pinned_for(&self, i: usize) -> &[usize] {
        self.pinned
            .get(self.dataset.records()[i].category.as_str())
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Number of partners `accepts` allows for record `i`.
    pub fn acceptance_size(&self, i: usize) -> usize {
        let held_by_open = usize::from(i % 3 != 0);
        let held_by_pinned = usize::from(i % 3 == 0);
        (self.open.len() - held_by_open) + (self.pinned_for(i).len() - held_by_pinned)
    }

    pub fn sample_pair<R: Rng>(&self, i: usize, rng: &mut R) -> Result<Pair> {
        let second_index = self.sample_partner(i, rng)?;
        let label = if self.dataset.same_category(i, second_index) {
            MatchLabel::Match
        } else {
            MatchLabel::Mismatch
        };
        Ok(Pair {
            first_index: i,
            second_index,
            label,
        })
    }

    /// One pair per record, in record order.
    pub fn pairs<'s, R: Rng>(
        &'s self,
        rng: &'s mut R,
    ) -> impl Iterator<Item = Result<Pair>> + 's {
        (0..self.dataset.len()).map(move |i| self.sample_pair(i, &mut *rng))
    }

    pub fn sample_partner<R: Rng>(&self, i: usize, rng: &mut R) -> Result<usize> {
        match self.strategy {
            SamplingStrategy::FixedFlag { max_redraws } => self.fixed_flag(i, max_redraws, rng),
            _ if self.acceptance_size(i) == 0 => {
                // every other index is a multiple of 3 from another category
                log::debug!("Record {}: no biased candidate, drawing from all others", i);
                Ok(self.any_other(i, rng))
            }
            SamplingStrategy::Exact => Ok(self.exact(i, rng)),
            SamplingStrategy::Rejection { max_redraws } => self.rejection(i, max_redraws, rng),
        }
    }

    fn exact<R: Rng>(&self, i: usize, rng: &mut R) -> usize {
        let k = rng.gen_range(0..self.acceptance_size(i));
        let open_len = self.open.len() - usize::from(i % 3 != 0);
        if k < open_len {
            nth_skipping(&self.open, i, k)
        } else {
            nth_skipping(self.pinned_for(i), i, k - open_len)
        }
    }

    fn rejection<R: Rng>(&self, i: usize, max_redraws: usize, rng: &mut R) -> Result<usize> {
        let n = self.dataset.len();
        let mut j = rng.gen_range(0..=n - 1);
        let mut redraws = 0;
        while !accepts(self.dataset, i, j) {
            if redraws == max_redraws {
                return Err(PairError::SamplingExhausted {
                    first_index: i,
                    redraws,
                });
            }
            j = rng.gen_range(0..=n - 1);
            redraws += 1;
        }
        log::trace!("Record {}: accepted {} after {} redraws", i, j, redraws);
        Ok(j)
    }

    fn fixed_flag<R: Rng>(&self, i: usize, max_redraws: usize, rng: &mut R) -> Result<usize> {
        let n = self.dataset.len();
        let mut j = rng.gen_range(0..=n - 1);
        let flag = j % 3;
        if flag == 0 && self.same_category_others(i) == 0 {
            return Err(PairError::NoSameCategoryPartner { first_index: i });
        }

        let mut redraws = 0;
        while j == i || (flag == 0 && !self.dataset.same_category(i, j)) {
            if redraws == max_redraws {
                return Err(PairError::SamplingExhausted {
                    first_index: i,
                    redraws,
                });
            }
            j = rng.gen_range(0..=n - 1);
            redraws += 1;
        }
        log::trace!(
            "Record {}: accepted {} after {} redraws (flag {})",
            i,
            j,
            redraws,
            flag
        );
        Ok(j)
    }

    fn same_category_others(&self, i: usize) -> usize {
        let category = self.dataset.records()[i].category.as_str();
        self.category_sizes.get(category).copied().unwrap_or(0) - 1
    }

    fn any_other<R: Rng>(&self, i: usize, rng: &mut R) -> usize {
        let k = rng.gen_range(0..self.dataset.len() - 1);
        if k >= i {
            k + 1
        } else {
            k
        }
    }
}

/// The `k`-th element of an ascending `list` once `skip` is removed from it.
fn nth_skipping(list: &[usize], skip: usize, k: usize) -> usize {
    match list.binary_search(&skip) {
        Ok(p) if k >= p => list[k + 1],
        _ => list[k],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::Record;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashSet;

    fn dataset(categories: &[&str]) -> Dataset {
        Dataset::from_records(
            categories
                .iter()
                .enumerate()
                .map(|(i, c)| Record::new(*c, format!("text{i}")))
                .collect(),
        )
    }

    fn acceptance_set(ds: &Dataset, i: usize) -> HashSet<usize> {
        (0..ds.len()).filter(|&j| accepts(ds, i, j)).collect()
    }

    #[test]
    fn test_accepts_rule() {
        let ds = dataset(&["a", "b", "b", "b", "a"]);
        assert!(!accepts(&ds, 1, 1));
        // multiple of 3 with a different category
        assert!(!accepts(&ds, 1, 0));
        // multiple of 3 with the same category
        assert!(accepts(&ds, 1, 3));
        // not a multiple of 3, category ignored
        assert!(accepts(&ds, 0, 2));
        assert!(accepts(&ds, 0, 4));
    }

    #[test]
    fn test_acceptance_size_matches_rule() {
        let ds = dataset(&["a", "b", "a", "c", "a", "b", "b", "a", "c", "a"]);
        let sampler = PairSampler::new(&ds, SamplingStrategy::Exact).unwrap();
        for i in 0..ds.len() {
            assert_eq!(sampler.acceptance_size(i), acceptance_set(&ds, i).len(), "i={i}");
        }
    }

    #[test]
    fn test_single_record_is_insufficient() {
        let ds = dataset(&["a"]);
        let err = PairSampler::new(&ds, SamplingStrategy::Exact).err().unwrap();
        assert!(matches!(
            err,
            PairError::InsufficientData {
                required: 2,
                actual: 1
            }
        ));
    }

    #[test]
    fn test_empty_dataset_yields_no_pairs() {
        let ds = Dataset::default();
        let sampler = PairSampler::new(&ds, SamplingStrategy::Exact).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(sampler.pairs(&mut rng).count(), 0);
    }

    #[test]
    fn test_two_distinct_records_pair_with_each_other() {
        let ds = dataset(&["a", "b"]);
        for strategy in [
            SamplingStrategy::Exact,
            SamplingStrategy::Rejection { max_redraws: 1000 },
        ] {
            let sampler = PairSampler::new(&ds, strategy).unwrap();
            let mut rng = StdRng::seed_from_u64(7);
            let pairs: Vec<Pair> = sampler.pairs(&mut rng).collect::<Result<_>>().unwrap();
            assert_eq!(
                pairs,
                vec![
                    Pair {
                        first_index: 0,
                        second_index: 1,
                        label: MatchLabel::Mismatch
                    },
                    Pair {
                        first_index: 1,
                        second_index: 0,
                        label: MatchLabel::Mismatch
                    },
                ]
            );
        }
    }

    #[test]
    fn test_exact_stays_inside_acceptance_set() {
        let ds = dataset(&["a", "b", "a", "c", "a", "b", "b", "a", "c", "a"]);
        let sampler = PairSampler::new(&ds, SamplingStrategy::Exact).unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        for i in 0..ds.len() {
            let allowed = acceptance_set(&ds, i);
            let mut seen = HashSet::new();
            for _ in 0..2000 {
                let j = sampler.sample_partner(i, &mut rng).unwrap();
                assert!(allowed.contains(&j), "i={i} j={j}");
                seen.insert(j);
            }
            assert_eq!(seen, allowed, "i={i}");
        }
    }

    #[test]
    fn test_rejection_stays_inside_acceptance_set() {
        let ds = dataset(&["x", "y", "x", "y", "z", "x", "y"]);
        let sampler =
            PairSampler::new(&ds, SamplingStrategy::Rejection { max_redraws: 1000 }).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..200 {
            for pair in sampler.pairs(&mut rng) {
                let pair = pair.unwrap();
                assert!(accepts(&ds, pair.first_index, pair.second_index));
            }
        }
    }

    #[test]
    fn test_labels_follow_categories() {
        let ds = dataset(&["a", "a", "b", "a", "b", "b", "c", "a"]);
        let sampler = PairSampler::new(&ds, SamplingStrategy::Exact).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            for pair in sampler.pairs(&mut rng) {
                let pair = pair.unwrap();
                assert_ne!(pair.first_index, pair.second_index);
                let expected = ds.same_category(pair.first_index, pair.second_index);
                assert_eq!(pair.label == MatchLabel::Match, expected);
            }
        }
    }

    #[test]
    fn test_rejection_cap_is_reported() {
        let categories: Vec<String> = (0..300).map(|i| format!("c{i}")).collect();
        let refs: Vec<&str> = categories.iter().map(String::as_str).collect();
        let ds = dataset(&refs);
        let sampler =
            PairSampler::new(&ds, SamplingStrategy::Rejection { max_redraws: 0 }).unwrap();
        let mut rng = StdRng::seed_from_u64(5);
        let err = sampler
            .pairs(&mut rng)
            .find_map(|p| p.err())
            .expect("some first draw is rejected");
        assert!(matches!(err, PairError::SamplingExhausted { redraws: 0, .. }));
    }

    #[test]
    fn test_same_seed_same_pairs() {
        let ds = dataset(&["a", "b", "a", "c", "b", "a", "c", "c"]);
        for strategy in [
            SamplingStrategy::Exact,
            SamplingStrategy::Rejection {
                max_redraws: DEFAULT_MAX_REDRAWS,
            },
            SamplingStrategy::FixedFlag {
                max_redraws: DEFAULT_MAX_REDRAWS,
            },
        ] {
            let sampler = PairSampler::new(&ds, strategy).unwrap();
            assert_eq!(sampler.strategy(), strategy);
            let mut a = StdRng::seed_from_u64(99);
            let mut b = StdRng::seed_from_u64(99);
            let first: Vec<Pair> = sampler.pairs(&mut a).collect::<Result<_>>().unwrap();
            let second: Vec<Pair> = sampler.pairs(&mut b).collect::<Result<_>>().unwrap();
            assert_eq!(first, second);
        }
    }

    fn frequencies(
        sampler: &PairSampler,
        i: usize,
        n: usize,
        draws: usize,
        rng: &mut StdRng,
    ) -> Vec<f64> {
        let mut counts = vec![0usize; n];
        for _ in 0..draws {
            counts[sampler.sample_partner(i, rng).unwrap()] += 1;
        }
        counts.iter().map(|&c| c as f64 / draws as f64).collect()
    }

    // Probability of each partner under the first-draw flag rule.
    fn fixed_flag_probabilities(ds: &Dataset, i: usize) -> Vec<f64> {
        let n = ds.len();
        let nf = n as f64;
        let same: Vec<usize> = (0..n)
            .filter(|&j| j != i && ds.same_category(i, j))
            .collect();
        let mut p = vec![0.0; n];
        for j0 in 0..n {
            if j0 % 3 == 0 {
                for &j in &same {
                    p[j] += 1.0 / nf / same.len() as f64;
                }
            } else if j0 == i {
                for j in (0..n).filter(|&j| j != i) {
                    p[j] += 1.0 / nf / (nf - 1.0);
                }
            } else {
                p[j0] += 1.0 / nf;
            }
        }
        p
    }

    #[test]
    fn test_exact_and_rejection_are_uniform_over_acceptance_set() {
        let ds = dataset(&["a", "b", "a", "c", "a", "b", "b", "a", "c"]);
        let exact = PairSampler::new(&ds, SamplingStrategy::Exact).unwrap();
        let rejection = PairSampler::new(
            &ds,
            SamplingStrategy::Rejection {
                max_redraws: DEFAULT_MAX_REDRAWS,
            },
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(2718);
        let draws = 20_000;

        for i in 0..ds.len() {
            let allowed = acceptance_set(&ds, i);
            let expected = 1.0 / allowed.len() as f64;
            let from_exact = frequencies(&exact, i, ds.len(), draws, &mut rng);
            let from_rejection = frequencies(&rejection, i, ds.len(), draws, &mut rng);
            for j in 0..ds.len() {
                let want = if allowed.contains(&j) { expected } else { 0.0 };
                assert!((from_exact[j] - want).abs() < 0.02, "exact i={i} j={j}");
                assert!((from_rejection[j] - want).abs() < 0.02, "rejection i={i} j={j}");
                assert!((from_exact[j] - from_rejection[j]).abs() < 0.025, "i={i} j={j}");
            }
        }
    }

    #[test]
    fn test_fixed_flag_matches_first_draw_rule() {
        let ds = dataset(&["b", "a", "b", "a", "b", "b"]);
        let sampler = PairSampler::new(
            &ds,
            SamplingStrategy::FixedFlag {
                max_redraws: DEFAULT_MAX_REDRAWS,
            },
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(1618);

        for i in 0..ds.len() {
            let want = fixed_flag_probabilities(&ds, i);
            let got = frequencies(&sampler, i, ds.len(), 40_000, &mut rng);
            for j in 0..ds.len() {
                assert!((got[j] - want[j]).abs() < 0.015, "i={i} j={j}: {} vs {}", got[j], want[j]);
            }
        }

        // a multiple of 3 from another category is still reachable
        assert!(!accepts(&ds, 1, 0));
        let p = fixed_flag_probabilities(&ds, 1);
        assert!((p[0] - 1.0 / 30.0).abs() < 1e-9);
        assert!((p[3] - 11.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_fixed_flag_without_same_category_partner() {
        let ds = dataset(&["a", "b"]);
        let sampler = PairSampler::new(
            &ds,
            SamplingStrategy::FixedFlag {
                max_redraws: DEFAULT_MAX_REDRAWS,
            },
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(8);
        let mut partners = HashSet::new();
        let mut refusals = 0;
        for _ in 0..200 {
            match sampler.sample_partner(0, &mut rng) {
                Ok(j) => {
                    partners.insert(j);
                }
                Err(PairError::NoSameCategoryPartner { first_index: 0 }) => refusals += 1,
                Err(other) => panic!("unexpected error: {other:?}"),
            }
        }
        assert_eq!(partners, HashSet::from([1]));
        assert!(refusals > 0);
    }

    #[test]
    fn test_nth_skipping() {
        let list = [2, 5, 8, 11];
        assert_eq!(nth_skipping(&list, 8, 0), 2);
        assert_eq!(nth_skipping(&list, 8, 1), 5);
        assert_eq!(nth_skipping(&list, 8, 2), 11);
        assert_eq!(nth_skipping(&list, 3, 2), 8);
    }

    #[test]
    fn test_label_strings() {
        assert_eq!(MatchLabel::Match.to_string(), "1");
        assert_eq!(MatchLabel::Mismatch.as_str(), "0");
    }
}
