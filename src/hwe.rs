use crate::model::{AlleleCounts, Dosage};

const MIN_AF: f64 = 1e-3;

/// Negative log genotype probabilities under Hardy-Weinberg equilibrium,
/// indexed by genotype class. Larger values mark rarer, more informative matches.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HweTable([f64; 3]);

impl HweTable {
    pub fn from_allele_counts(counts: AlleleCounts) -> Self {
        let total = counts.n_ref + counts.n_alt;
        if total == 0 {
            return Self::from_alt_frequency(f64::NAN);
        }
        Self::from_alt_frequency(counts.n_alt as f64 / total as f64)
    }

    /// An undefined frequency (NaN) falls through to the clamped values in all three classes.
    pub fn from_alt_frequency(af: f64) -> Self {
        let hom_a = if af > MIN_AF {
            -(af * af).ln()
        } else {
            -(MIN_AF * MIN_AF).ln()
        };
        let het = if af > MIN_AF && af < 1.0 - MIN_AF {
            -(2.0 * af * (1.0 - af)).ln()
        } else {
            -(2.0 * MIN_AF * (1.0 - MIN_AF)).ln()
        };
        let hom_b = if af < 1.0 - MIN_AF {
            -((1.0 - af) * (1.0 - af)).ln()
        } else {
            -(MIN_AF * MIN_AF).ln()
        };
        Self([hom_a, het, hom_b])
    }

    #[inline]
    pub fn weight(&self, class: Dosage) -> f64 {
        self.0[class.index()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn balanced_frequency() {
        let table = HweTable::from_allele_counts(AlleleCounts { n_ref: 50, n_alt: 50 });
        assert!(close(table.weight(Dosage::HomRef), -(0.25f64).ln()));
        assert!(close(table.weight(Dosage::Het), -(0.5f64).ln()));
        assert!(close(table.weight(Dosage::HomAlt), -(0.25f64).ln()));
    }

    #[test]
    fn clamps_monomorphic_sites() {
        let floor_hom = -(MIN_AF * MIN_AF).ln();
        let floor_het = -(2.0 * MIN_AF * (1.0 - MIN_AF)).ln();

        let all_ref = HweTable::from_allele_counts(AlleleCounts { n_ref: 20, n_alt: 0 });
        assert!(close(all_ref.weight(Dosage::HomRef), floor_hom));
        assert!(close(all_ref.weight(Dosage::Het), floor_het));
        assert!(close(all_ref.weight(Dosage::HomAlt), 0.0));

        let all_alt = HweTable::from_allele_counts(AlleleCounts { n_ref: 0, n_alt: 20 });
        assert!(close(all_alt.weight(Dosage::HomRef), 0.0));
        assert!(close(all_alt.weight(Dosage::Het), floor_het));
        assert!(close(all_alt.weight(Dosage::HomAlt), floor_hom));

        for class in Dosage::ALL {
            assert!(all_ref.weight(class).is_finite());
            assert!(all_alt.weight(class).is_finite());
        }
    }

    #[test]
    fn empty_site_uses_clamped_values() {
        let table = HweTable::from_allele_counts(AlleleCounts { n_ref: 0, n_alt: 0 });
        assert!(close(table.weight(Dosage::HomRef), -(MIN_AF * MIN_AF).ln()));
        assert!(close(
            table.weight(Dosage::Het),
            -(2.0 * MIN_AF * (1.0 - MIN_AF)).ln()
        ));
        assert!(close(table.weight(Dosage::HomAlt), -(MIN_AF * MIN_AF).ln()));
    }

    #[test]
    fn scores_shift_toward_rarer_homozygote() {
        let freqs = [0.5, 0.4, 0.3, 0.2, 0.1, 0.05, 0.01];
        for window in freqs.windows(2) {
            let near = HweTable::from_alt_frequency(window[0]);
            let far = HweTable::from_alt_frequency(window[1]);
            assert!(far.weight(Dosage::HomRef) > near.weight(Dosage::HomRef));
            assert!(far.weight(Dosage::HomAlt) < near.weight(Dosage::HomAlt));
            assert!(far.weight(Dosage::Het) > near.weight(Dosage::Het));

            let near_mirror = HweTable::from_alt_frequency(1.0 - window[0]);
            let far_mirror = HweTable::from_alt_frequency(1.0 - window[1]);
            assert!(far_mirror.weight(Dosage::HomAlt) > near_mirror.weight(Dosage::HomAlt));
            assert!(far_mirror.weight(Dosage::Het) > near_mirror.weight(Dosage::Het));
        }
    }
}
