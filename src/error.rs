use thiserror::Error;

#[derive(Debug, Error)]
pub enum CustomError {
    #[error("could not read {path}")]
    ReadWithPath {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[error("could not write to {path}")]
    Write {
        #[source]
        source: std::io::Error,
        path: std::path::PathBuf,
    },

    #[error("could not create output directory")]
    OutputDir {
        #[source]
        source: std::io::Error,
    },

    #[error("could not read {path}")]
    CsvRead {
        #[source]
        source: csv::Error,
        path: std::path::PathBuf,
    },

    #[error("no #CHROM header line found in {path}")]
    VcfHeaderMissing { path: std::path::PathBuf },

    #[error("no samples in {path}")]
    VcfNoSamples { path: std::path::PathBuf },

    #[error("neither PL nor GT tag is present in the header of {path}")]
    VcfNoEvidenceTag { path: std::path::PathBuf },

    #[error("the {tag} tag is not present in the header of {path}")]
    VcfMissingTag {
        tag: String,
        path: std::path::PathBuf,
    },

    #[error("expected at least {expected} fields (got {n_fields}) in line {line_num} of {path}")]
    VcfRecordFields {
        path: std::path::PathBuf,
        line_num: usize,
        n_fields: usize,
        expected: usize,
    },

    #[error("could not parse POS \"{value}\" in line {line_num} of {path}")]
    VcfPosition {
        #[source]
        source: std::num::ParseIntError,
        path: std::path::PathBuf,
        line_num: usize,
        value: String,
    },

    #[error("no such sample in {path}: [{sample}]")]
    UnknownSample {
        sample: String,
        path: std::path::PathBuf,
    },

    #[error("failed to parse sample list {arg}")]
    SamplesEmpty { arg: String },

    #[error("which one? query samples (qry:{arg}) or genotype samples (gt:{arg})?")]
    SampleSelector { arg: String },

    #[error("expected an even number of comma-delimited samples with -p (got {n_samples})")]
    PairsOdd { n_samples: usize },

    #[error("could not parse line {line_num} of {path}: expected two sample names")]
    PairsFileLine {
        path: std::path::PathBuf,
        line_num: usize,
    },

    #[error("failed to parse the targets: {target}")]
    TargetsInvalid { target: String },

    #[error("could not parse line {line_num} of {path}: expected CHROM and POS, or CHROM, BEG and END")]
    TargetsFileLine {
        path: std::path::PathBuf,
        line_num: usize,
    },

    #[error("no sample pairs given")]
    PairsEmpty,

    #[error("failed to parse --use {arg}; only GT and PL are supported")]
    UseTag { arg: String },

    #[error("could not parse --max-mem {arg}")]
    MaxMem { arg: String },

    #[error("the option {first} cannot be combined with {second}")]
    ConflictingOptions {
        first: &'static str,
        second: &'static str,
    },

    #[error("the option --homs-only requires --genotypes")]
    HomsOnlyWithoutGenotypes,

    #[error("need at least 2 samples for a cross-check (got {n_samples})")]
    SampleCount { n_samples: usize },

    #[error("the value for --distinctive-sites was set too low: {value}")]
    DistinctiveSitesLow { value: f64 },

    #[error("could not determine allele counts at {contig}:{pos}")]
    AlleleCounts { contig: String, pos: u64 },

    #[error("corrupted distinctive-site record: {found} set bits vs {expected} recorded")]
    CorruptedDiffRecord { expected: u32, found: u32 },

    #[error("external sort error")]
    ExternalSort {
        #[source]
        source: std::io::Error,
    },

    #[error("external sorter used out of order: {operation} is not allowed at this point")]
    SorterPhase { operation: &'static str },
}

pub type Result<T> = std::result::Result<T, CustomError>;
