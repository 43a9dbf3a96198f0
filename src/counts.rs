use crate::bitset::BitSet;
use crate::hwe::HweTable;
use crate::matcher::{Concordance, Evidence, compare};
use crate::model::{Column, Site};
use crate::pairs::PairSet;

/// Per-pair discordance counters, indexed like the pairs of the [`PairSet`].
pub struct Counts {
    pairs: PairSet,
    hom_only: bool,
    tallies: Tallies,
    n_sites: u32,
}

struct Tallies {
    // Number of sites where the pair's genotypes differ
    ndiff: Vec<u32>,
    // Number of sites where both samples had usable data
    ncnt: Vec<u32>,
    // Sum of -log P(HWE) over matching sites
    hwe_prob: Option<Vec<f64>>,
}

impl Tallies {
    #[inline]
    fn record(
        &mut self,
        idx: usize,
        outcome: Concordance,
        hwe: Option<&HweTable>,
        diff: &mut Option<&mut BitSet>,
    ) -> bool {
        match outcome {
            Concordance::Indeterminate | Concordance::Excluded => return false,
            Concordance::Mismatch => {
                self.ndiff[idx] += 1;
                if let Some(bits) = diff.as_mut() {
                    bits.insert(idx);
                }
            }
            Concordance::Match { class } => {
                if let (Some(scores), Some(table)) = (self.hwe_prob.as_mut(), hwe) {
                    scores[idx] += table.weight(class);
                }
            }
        }
        self.ncnt[idx] += 1;
        matches!(outcome, Concordance::Mismatch)
    }
}

impl Counts {
    pub fn new(pairs: PairSet, hom_only: bool, calc_hwe: bool) -> Self {
        let n_pairs = pairs.len();
        Self {
            pairs,
            hom_only,
            tallies: Tallies {
                ndiff: vec![0; n_pairs],
                ncnt: vec![0; n_pairs],
                hwe_prob: calc_hwe.then(|| vec![0.0; n_pairs]),
            },
            n_sites: 0,
        }
    }

    pub fn pairs(&self) -> &PairSet {
        &self.pairs
    }

    pub fn n_pairs(&self) -> usize {
        self.tallies.ndiff.len()
    }

    /// Number of sites that carried usable diploid data on both sides.
    pub fn n_sites(&self) -> u32 {
        self.n_sites
    }

    pub fn ndiff(&self) -> &[u32] {
        &self.tallies.ndiff
    }

    pub fn ncnt(&self) -> &[u32] {
        &self.tallies.ncnt
    }

    pub fn hwe_prob(&self) -> Option<&[f64]> {
        self.tallies.hwe_prob.as_deref()
    }

    /// Compares every tracked pair at one site and returns how many pairs disagreed.
    ///
    /// Sites without usable data on either side leave all counters untouched.
    /// Disagreeing pairs are marked in `diff` when distinctive sites are tracked;
    /// the caller is expected to hand in a cleared set.
    pub fn add_site(
        &mut self,
        site: &Site,
        hwe: Option<&HweTable>,
        diff: Option<&mut BitSet>,
    ) -> u32 {
        let Some((query, reference)) = site.columns() else {
            return 0;
        };
        self.n_sites += 1;
        match (query, reference) {
            (Column::Called(q), Column::Called(r)) => self.accumulate(q, r, hwe, diff),
            (Column::Called(q), Column::Likelihood(r)) => self.accumulate(q, r, hwe, diff),
            (Column::Likelihood(q), Column::Called(r)) => self.accumulate(q, r, hwe, diff),
            (Column::Likelihood(q), Column::Likelihood(r)) => self.accumulate(q, r, hwe, diff),
        }
    }

    fn accumulate<Q: Evidence, R: Evidence>(
        &mut self,
        query: &[Option<Q>],
        reference: &[Option<R>],
        hwe: Option<&HweTable>,
        mut diff: Option<&mut BitSet>,
    ) -> u32 {
        let Self {
            pairs,
            hom_only,
            tallies,
            ..
        } = self;
        let hom_only = *hom_only;
        let mut n_diff = 0u32;

        match pairs {
            PairSet::Explicit(list) => {
                for (idx, &(iq, ir)) in list.iter().enumerate() {
                    let outcome = compare(query[iq].as_ref(), reference[ir].as_ref(), hom_only);
                    if tallies.record(idx, outcome, hwe, &mut diff) {
                        n_diff += 1;
                    }
                }
            }
            PairSet::Cross {
                query: rows,
                reference: cols,
            } => {
                let mut idx = 0;
                for &iq in rows.iter() {
                    let Some(q) = query[iq].as_ref() else {
                        // Whole row is indeterminate
                        idx += cols.len();
                        continue;
                    };
                    for &ir in cols.iter() {
                        let outcome = compare(Some(q), reference[ir].as_ref(), hom_only);
                        if tallies.record(idx, outcome, hwe, &mut diff) {
                            n_diff += 1;
                        }
                        idx += 1;
                    }
                }
            }
            PairSet::Triangular { samples } => {
                let mut idx = 0;
                for (i, &iq) in samples.iter().enumerate() {
                    let Some(q) = query[iq].as_ref() else {
                        idx += i;
                        continue;
                    };
                    for &ir in &samples[..i] {
                        let outcome = compare(Some(q), reference[ir].as_ref(), hom_only);
                        if tallies.record(idx, outcome, hwe, &mut diff) {
                            n_diff += 1;
                        }
                        idx += 1;
                    }
                }
            }
        }
        n_diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AlleleCounts, Dosage, Likelihoods};
    use crate::pairs::triangular_index;

    fn called_site(query: Vec<Option<Dosage>>, reference: Option<Vec<Option<Dosage>>>) -> Site {
        Site {
            contig: "1".to_string(),
            pos: 100,
            query: Some(Column::Called(query)),
            has_reference_file: reference.is_some(),
            reference: reference.map(Column::Called),
            allele_counts: Some(AlleleCounts { n_ref: 5, n_alt: 5 }),
        }
    }

    #[test]
    fn identical_samples_never_disagree() {
        let pairs = PairSet::Triangular {
            samples: vec![0, 1, 2, 3],
        };
        let mut counts = Counts::new(pairs, false, true);
        let genotypes = [Dosage::HomRef, Dosage::Het, Dosage::HomAlt, Dosage::Het];
        for &g in &genotypes {
            let site = called_site(vec![Some(g); 4], None);
            let table = HweTable::from_alt_frequency(0.3);
            assert_eq!(counts.add_site(&site, Some(&table), None), 0);
        }
        assert_eq!(counts.n_sites(), 4);
        assert!(counts.ndiff().iter().all(|&n| n == 0));
        assert!(counts.ncnt().iter().all(|&n| n == 4));
        assert!(counts.hwe_prob().unwrap().iter().all(|&s| s > 0.0));
    }

    #[test]
    fn cross_check_writes_packed_slots() {
        let pairs = PairSet::Triangular {
            samples: vec![0, 1, 2, 3],
        };
        let mut counts = Counts::new(pairs, false, false);
        // Only sample 2 differs from the rest
        let site = called_site(
            vec![
                Some(Dosage::HomRef),
                Some(Dosage::HomRef),
                Some(Dosage::HomAlt),
                Some(Dosage::HomRef),
            ],
            None,
        );
        let mut bits = BitSet::new(counts.n_pairs());
        let n_diff = counts.add_site(&site, None, Some(&mut bits));
        assert_eq!(n_diff, 3);
        let expected = [
            triangular_index(2, 0),
            triangular_index(2, 1),
            triangular_index(3, 2),
        ];
        assert_eq!(bits.iter_ones().collect::<Vec<_>>(), expected.to_vec());
        for idx in 0..counts.n_pairs() {
            let want = u32::from(expected.contains(&idx));
            assert_eq!(counts.ndiff()[idx], want, "slot {idx}");
            assert_eq!(counts.ncnt()[idx], 1);
        }
    }

    #[test]
    fn missing_data_is_skipped_per_pair() {
        let pairs = PairSet::Cross {
            query: vec![0, 1],
            reference: vec![0, 1],
        };
        let mut counts = Counts::new(pairs, false, false);
        let site = called_site(
            vec![None, Some(Dosage::Het)],
            Some(vec![Some(Dosage::Het), None]),
        );
        counts.add_site(&site, None, None);
        assert_eq!(counts.ncnt(), &[0, 0, 1, 0]);
        assert_eq!(counts.ndiff(), &[0, 0, 0, 0]);
    }

    #[test]
    fn unusable_site_is_not_counted() {
        let mut counts = Counts::new(PairSet::Explicit(vec![(0, 0)]), false, false);
        let mut site = called_site(vec![Some(Dosage::Het)], Some(vec![Some(Dosage::Het)]));
        site.reference = None;
        assert_eq!(counts.add_site(&site, None, None), 0);
        assert_eq!(counts.n_sites(), 0);
        assert_eq!(counts.ncnt(), &[0]);
    }

    #[test]
    fn hom_only_skips_heterozygous_reference() {
        let mut counts = Counts::new(PairSet::Explicit(vec![(0, 0), (0, 1)]), true, false);
        let site = called_site(
            vec![Some(Dosage::HomRef)],
            Some(vec![Some(Dosage::Het), Some(Dosage::HomAlt)]),
        );
        counts.add_site(&site, None, None);
        assert_eq!(counts.ncnt(), &[0, 1]);
        assert_eq!(counts.ndiff(), &[0, 1]);
    }

    #[test]
    fn mixed_representations_and_hwe_weights() {
        let mut counts = Counts::new(PairSet::Explicit(vec![(0, 0), (0, 1)]), false, true);
        let site = Site {
            contig: "1".to_string(),
            pos: 5,
            query: Some(Column::Likelihood(vec![Some(Likelihoods([40, 0, 30]))])),
            reference: Some(Column::Called(vec![Some(Dosage::Het), Some(Dosage::HomAlt)])),
            has_reference_file: true,
            allele_counts: None,
        };
        let table = HweTable::from_alt_frequency(0.2);
        let n_diff = counts.add_site(&site, Some(&table), None);
        assert_eq!(n_diff, 1);
        assert_eq!(counts.ndiff(), &[0, 1]);
        assert_eq!(counts.ncnt(), &[1, 1]);
        let scores = counts.hwe_prob().unwrap();
        assert!((scores[0] - table.weight(Dosage::Het)).abs() < 1e-12);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn counters_stay_within_bounds() {
        let mut counts = Counts::new(
            PairSet::Cross {
                query: vec![0, 1, 2],
                reference: vec![0, 1],
            },
            false,
            false,
        );
        let patterns = [
            (vec![Some(Dosage::HomRef), None, Some(Dosage::Het)], vec![Some(Dosage::Het), Some(Dosage::HomRef)]),
            (vec![Some(Dosage::HomAlt), Some(Dosage::HomAlt), None], vec![None, Some(Dosage::HomAlt)]),
            (vec![Some(Dosage::Het), Some(Dosage::HomRef), Some(Dosage::Het)], vec![Some(Dosage::Het), Some(Dosage::Het)]),
        ];
        for (q, r) in patterns {
            counts.add_site(&called_site(q, Some(r)), None, None);
        }
        for idx in 0..counts.n_pairs() {
            assert!(counts.ncnt()[idx] <= counts.n_sites());
            assert!(counts.ndiff()[idx] <= counts.ncnt()[idx]);
        }
    }
}
