use crate::model::{Dosage, Likelihoods};

/// Evidence for one sample at one site, in either representation.
///
/// A class is "best" for called data if it is the called dosage, and for
/// likelihoods if its cost equals the minimum cost. Two values agree iff they
/// share a best class, which covers called/called, called/likelihood and
/// likelihood/likelihood comparisons with one rule.
pub trait Evidence: Copy {
    fn is_best(&self, class: Dosage) -> bool;
}

impl Evidence for Dosage {
    #[inline]
    fn is_best(&self, class: Dosage) -> bool {
        *self == class
    }
}

impl Evidence for Likelihoods {
    #[inline]
    fn is_best(&self, class: Dosage) -> bool {
        self.cost(class) == self.min_cost()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Concordance {
    /// Both sides agree; `class` is the query's most likely class, used for HWE weighting.
    Match { class: Dosage },
    Mismatch,
    /// Either side is missing.
    Indeterminate,
    /// Reference side is heterozygous while comparing homozygous genotypes only.
    Excluded,
}

#[inline]
pub fn compare<Q: Evidence, R: Evidence>(
    query: Option<&Q>,
    reference: Option<&R>,
    hom_only: bool,
) -> Concordance {
    let (Some(query), Some(reference)) = (query, reference) else {
        return Concordance::Indeterminate;
    };
    if hom_only && reference.is_best(Dosage::Het) {
        return Concordance::Excluded;
    }
    let shared = Dosage::ALL
        .into_iter()
        .any(|class| query.is_best(class) && reference.is_best(class));
    // Ties on the query side resolve to the lowest class
    match Dosage::ALL.into_iter().find(|&class| query.is_best(class)) {
        Some(class) if shared => Concordance::Match { class },
        _ => Concordance::Mismatch,
    }
}
