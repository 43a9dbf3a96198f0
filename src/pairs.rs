/// Index of the unordered pair `{row, col}`, `col < row`, in the packed lower triangle.
///
/// Rows are enumerated in order, so the pairs of four samples land as
/// `(1,0) (2,0) (2,1) (3,0) (3,1) (3,2)` at `0..6`.
#[inline]
pub fn triangular_index(row: usize, col: usize) -> usize {
    debug_assert!(col < row);
    row * (row - 1) / 2 + col
}

/// The sample pairs tracked during a run; sample values are indices within their input file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairSet {
    /// User-supplied `(query, reference)` pairs, in report order. Duplicates are allowed.
    Explicit(Vec<(usize, usize)>),
    /// Every query sample against every reference sample, row-major.
    Cross {
        query: Vec<usize>,
        reference: Vec<usize>,
    },
    /// Every unordered pair of one sample set, packed by [`triangular_index`].
    Triangular { samples: Vec<usize> },
}

impl PairSet {
    pub fn len(&self) -> usize {
        match self {
            PairSet::Explicit(pairs) => pairs.len(),
            PairSet::Cross { query, reference } => query.len() * reference.len(),
            PairSet::Triangular { samples } => samples.len() * samples.len().saturating_sub(1) / 2,
        }
    }

    pub fn is_explicit(&self) -> bool {
        matches!(self, PairSet::Explicit(_))
    }

    /// All pairs as `(query, reference)` sample indices, in packed order.
    pub fn iter(&self) -> Box<dyn Iterator<Item = (usize, usize)> + '_> {
        match self {
            PairSet::Explicit(pairs) => Box::new(pairs.iter().copied()),
            PairSet::Cross { query, reference } => Box::new(
                query
                    .iter()
                    .flat_map(move |&q| reference.iter().map(move |&r| (q, r))),
            ),
            PairSet::Triangular { samples } => Box::new(
                samples
                    .iter()
                    .enumerate()
                    .flat_map(move |(i, &q)| samples[..i].iter().map(move |&r| (q, r))),
            ),
        }
    }

    /// Query samples that own a row of candidate partners (empty for explicit lists).
    pub fn row_samples(&self) -> &[usize] {
        match self {
            PairSet::Explicit(_) => &[],
            PairSet::Cross { query, .. } => query,
            PairSet::Triangular { samples } => samples,
        }
    }

    /// Partners of the `row`-th query sample as `(partner sample, pair index)`,
    /// in packed order. In cross-check mode this spans both sides of the diagonal.
    pub fn row_candidates(&self, row: usize) -> Vec<(usize, usize)> {
        match self {
            PairSet::Explicit(_) => Vec::new(),
            PairSet::Cross { reference, .. } => {
                let offset = row * reference.len();
                reference
                    .iter()
                    .enumerate()
                    .map(|(j, &r)| (r, offset + j))
                    .collect()
            }
            PairSet::Triangular { samples } => samples
                .iter()
                .enumerate()
                .filter(|&(j, _)| j != row)
                .map(|(j, &r)| {
                    let idx = if j < row {
                        triangular_index(row, j)
                    } else {
                        triangular_index(j, row)
                    };
                    (r, idx)
                })
                .collect(),
        }
    }
}
