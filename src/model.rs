/// Genotype class of a diploid biallelic call: the number of non-reference alleles.
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Dosage {
    HomRef = 0,
    Het = 1,
    HomAlt = 2,
}

impl Dosage {
    pub const ALL: [Dosage; 3] = [Dosage::HomRef, Dosage::Het, Dosage::HomAlt];

    pub fn from_alt_count(n_alt: u8) -> Option<Self> {
        match n_alt {
            0 => Some(Dosage::HomRef),
            1 => Some(Dosage::Het),
            2 => Some(Dosage::HomAlt),
            _ => None,
        }
    }

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Phred-scaled genotype likelihoods (PL), one cost per genotype class; lower is more likely.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Likelihoods(pub [i32; 3]);

impl Likelihoods {
    pub fn min_cost(&self) -> i32 {
        let [a, b, c] = self.0;
        a.min(b).min(c)
    }

    pub fn cost(&self, class: Dosage) -> i32 {
        self.0[class.index()]
    }
}

/// Which FORMAT field a file's evidence is read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvidenceKind {
    Called,
    Likelihood,
}

impl EvidenceKind {
    pub fn tag(self) -> &'static str {
        match self {
            EvidenceKind::Called => "GT",
            EvidenceKind::Likelihood => "PL",
        }
    }
}

/// Per-sample evidence of one input file at one site; `None` marks missing data.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Called(Vec<Option<Dosage>>),
    Likelihood(Vec<Option<Likelihoods>>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AlleleCounts {
    pub n_ref: u64,
    pub n_alt: u64,
}

/// One record of a single input file.
#[derive(Debug, Clone)]
pub struct Record {
    pub contig: String,
    pub pos: u64,
    pub ref_allele: String,
    pub alt_alleles: String,
    // None when the record is not usable diploid data
    pub column: Option<Column>,
    pub allele_counts: Option<AlleleCounts>,
}

/// A site as seen by the accumulator: query evidence plus optional separate reference evidence.
#[derive(Debug, Clone)]
pub struct Site {
    pub contig: String,
    pub pos: u64,
    pub query: Option<Column>,
    pub reference: Option<Column>,
    pub has_reference_file: bool,
    pub allele_counts: Option<AlleleCounts>,
}

impl Site {
    /// Query and reference columns, with the query column doubling as reference in single-file mode.
    pub fn columns(&self) -> Option<(&Column, &Column)> {
        let query = self.query.as_ref()?;
        if self.has_reference_file {
            Some((query, self.reference.as_ref()?))
        } else {
            Some((query, query))
        }
    }
}
