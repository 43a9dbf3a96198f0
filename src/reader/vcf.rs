use std::collections::HashSet;
use std::fs::File;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};

use flate2::read::MultiGzDecoder;
use tracing::warn;

use crate::error::{CustomError, Result};
use crate::model::{AlleleCounts, Column, Dosage, EvidenceKind, Likelihoods, Record};
use crate::reader::SiteReader;

const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];
// CHROM POS ID REF ALT QUAL FILTER INFO
const FIXED_FIELDS: usize = 8;
const FORMAT_FIELD: usize = 8;
const FIRST_SAMPLE_FIELD: usize = 9;

/// Streaming reader of VCF text, plain or gzip/BGZF compressed.
pub struct VcfReader {
    path: PathBuf,
    reader: Box<dyn BufRead>,
    samples: Vec<String>,
    contigs: Vec<String>,
    format_tags: HashSet<String>,
    kind: EvidenceKind,
    count_alleles: bool,
    line_num: usize,
    line: String,
}

impl VcfReader {
    pub fn open(path: &impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let reader = open_input(&path)?;
        Self::from_reader(path, reader)
    }

    pub fn from_reader(path: PathBuf, mut reader: Box<dyn BufRead>) -> Result<Self> {
        let mut contigs = Vec::new();
        let mut format_tags = HashSet::new();
        let mut line = String::new();
        let mut line_num = 0usize;

        let samples = loop {
            line.clear();
            let n = reader
                .read_line(&mut line)
                .map_err(|e| CustomError::ReadWithPath {
                    source: e,
                    path: path.clone(),
                })?;
            if n == 0 {
                return Err(CustomError::VcfHeaderMissing { path });
            }
            line_num += 1;
            let trimmed = line.trim_end_matches(['\n', '\r']);
            if let Some(rest) = trimmed.strip_prefix("##FORMAT=<") {
                if let Some(id) = header_id(rest) {
                    format_tags.insert(id.to_string());
                }
            } else if let Some(rest) = trimmed.strip_prefix("##contig=<") {
                if let Some(id) = header_id(rest) {
                    contigs.push(id.to_string());
                }
            } else if trimmed.starts_with("#CHROM") {
                break trimmed
                    .split('\t')
                    .skip(FIRST_SAMPLE_FIELD)
                    .map(str::to_string)
                    .collect::<Vec<_>>();
            }
        };
        if samples.is_empty() {
            return Err(CustomError::VcfNoSamples { path });
        }

        Ok(Self {
            path,
            reader,
            samples,
            contigs,
            format_tags,
            kind: EvidenceKind::Called,
            count_alleles: false,
            line_num,
            line,
        })
    }

    pub fn has_format_tag(&self, tag: &str) -> bool {
        self.format_tags.contains(tag)
    }

    /// Picks the FORMAT field evidence is read from: the requested one if
    /// given, otherwise the first of `preference` declared in the header.
    pub fn choose_evidence(
        &mut self,
        requested: Option<EvidenceKind>,
        preference: [EvidenceKind; 2],
    ) -> Result<EvidenceKind> {
        let kind = match requested {
            Some(kind) => {
                if !self.has_format_tag(kind.tag()) {
                    return Err(CustomError::VcfMissingTag {
                        tag: kind.tag().to_string(),
                        path: self.path.clone(),
                    });
                }
                kind
            }
            None => preference
                .into_iter()
                .find(|kind| self.has_format_tag(kind.tag()))
                .ok_or_else(|| CustomError::VcfNoEvidenceTag {
                    path: self.path.clone(),
                })?,
        };
        self.kind = kind;
        Ok(kind)
    }

    /// Also extract allele counts from INFO/AN,AC or FORMAT/GT for every record.
    pub fn set_count_alleles(&mut self, count_alleles: bool) {
        self.count_alleles = count_alleles;
    }

    fn parse_line(&self) -> Result<Record> {
        let line = self.line.trim_end_matches(['\n', '\r']);
        let fields: Vec<&str> = line.split('\t').collect();
        if fields.len() < FIXED_FIELDS {
            return Err(CustomError::VcfRecordFields {
                path: self.path.clone(),
                line_num: self.line_num,
                n_fields: fields.len(),
                expected: FIXED_FIELDS,
            });
        }
        let pos = fields[1]
            .parse::<u64>()
            .map_err(|e| CustomError::VcfPosition {
                source: e,
                path: self.path.clone(),
                line_num: self.line_num,
                value: fields[1].to_string(),
            })?;

        let mut record = Record {
            contig: fields[0].to_string(),
            pos,
            ref_allele: fields[3].to_string(),
            alt_alleles: fields[4].to_string(),
            column: None,
            allele_counts: None,
        };

        let expected = FIRST_SAMPLE_FIELD + self.samples.len();
        let sample_fields = if fields.len() == expected {
            &fields[FIRST_SAMPLE_FIELD..]
        } else {
            warn!(
                "{}:{} has {} sample columns, expected {}; skipping site",
                record.contig,
                record.pos,
                fields.len().saturating_sub(FIRST_SAMPLE_FIELD),
                self.samples.len()
            );
            &fields[..0]
        };
        let format: Vec<&str> = fields
            .get(FORMAT_FIELD)
            .map(|f| f.split(':').collect())
            .unwrap_or_default();
        let gt_idx = format.iter().position(|&key| key == "GT");

        if !sample_fields.is_empty() {
            record.column = match self.kind {
                EvidenceKind::Called => {
                    gt_idx.and_then(|idx| called_column(sample_fields, idx))
                }
                EvidenceKind::Likelihood => format
                    .iter()
                    .position(|&key| key == "PL")
                    .and_then(|idx| likelihood_column(sample_fields, idx)),
            };
        }

        if self.count_alleles {
            record.allele_counts = info_allele_counts(fields[7]).or_else(|| {
                gt_idx
                    .filter(|_| !sample_fields.is_empty())
                    .map(|idx| genotype_allele_counts(sample_fields, idx))
            });
        }
        Ok(record)
    }
}

impl SiteReader for VcfReader {
    fn path(&self) -> &Path {
        &self.path
    }

    fn samples(&self) -> &[String] {
        &self.samples
    }

    fn contigs(&self) -> &[String] {
        &self.contigs
    }
}

impl Iterator for VcfReader {
    type Item = Result<Record>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            self.line.clear();
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return None,
                Ok(_) => {}
                Err(e) => {
                    return Some(Err(CustomError::ReadWithPath {
                        source: e,
                        path: self.path.clone(),
                    }));
                }
            }
            self.line_num += 1;
            if self.line.trim().is_empty() || self.line.starts_with('#') {
                continue;
            }
            return Some(self.parse_line());
        }
    }
}

/// Opens a file (or standard input for `-`), transparently decompressing gzip/BGZF.
fn open_input(path: &Path) -> Result<Box<dyn BufRead>> {
    let inner: Box<dyn Read> = if path == Path::new("-") {
        Box::new(std::io::stdin())
    } else {
        let f = File::open(path).map_err(|e| CustomError::ReadWithPath {
            source: e,
            path: path.to_path_buf(),
        })?;
        Box::new(f)
    };
    let mut reader = BufReader::new(inner);
    let buffer = reader.fill_buf().map_err(|e| CustomError::ReadWithPath {
        source: e,
        path: path.to_path_buf(),
    })?;
    if buffer.starts_with(&GZIP_MAGIC) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(reader))))
    } else {
        Ok(Box::new(reader))
    }
}

// ID=value out of a structured header line body such as `ID=chr1,length=100>`
fn header_id(body: &str) -> Option<&str> {
    body.trim_end_matches('>')
        .split(',')
        .find_map(|kv| kv.strip_prefix("ID="))
}

fn sample_subfield(sample: &str, idx: usize) -> Option<&str> {
    sample.split(':').nth(idx)
}

/// Ploidy and dosage of a GT value; any missing allele makes the call missing.
fn parse_genotype(gt: &str) -> (usize, Option<Dosage>) {
    let mut ploidy = 0usize;
    let mut n_alt = 0u8;
    let mut missing = false;
    for allele in gt.split(['/', '|']) {
        ploidy += 1;
        match allele.parse::<u32>() {
            Ok(0) => {}
            Ok(_) => n_alt = n_alt.saturating_add(1),
            Err(_) => missing = true,
        }
    }
    if missing || ploidy != 2 {
        return (ploidy, None);
    }
    (ploidy, Dosage::from_alt_count(n_alt))
}

fn called_column(samples: &[&str], gt_idx: usize) -> Option<Column> {
    let mut max_ploidy = 0;
    let calls: Vec<Option<Dosage>> = samples
        .iter()
        .map(|sample| match sample_subfield(sample, gt_idx) {
            Some(gt) => {
                let (ploidy, dosage) = parse_genotype(gt);
                max_ploidy = max_ploidy.max(ploidy);
                dosage
            }
            None => None,
        })
        .collect();
    // Only diploid data is compared
    (max_ploidy == 2).then_some(Column::Called(calls))
}

fn parse_likelihoods(pl: &str) -> (usize, Option<Likelihoods>) {
    let values: Vec<&str> = pl.split(',').collect();
    if values.len() != 3 {
        return (values.len(), None);
    }
    let mut costs = [0i32; 3];
    for (cost, value) in costs.iter_mut().zip(&values) {
        match value.parse::<i32>() {
            Ok(v) => *cost = v,
            Err(_) => return (values.len(), None),
        }
    }
    (values.len(), Some(Likelihoods(costs)))
}

fn likelihood_column(samples: &[&str], pl_idx: usize) -> Option<Column> {
    let mut max_len = 0;
    let values: Vec<Option<Likelihoods>> = samples
        .iter()
        .map(|sample| match sample_subfield(sample, pl_idx) {
            Some(pl) => {
                let (n, lk) = parse_likelihoods(pl);
                max_len = max_len.max(n);
                lk
            }
            None => None,
        })
        .collect();
    // Three values per sample means diploid biallelic
    (max_len == 3).then_some(Column::Likelihood(values))
}

fn info_allele_counts(info: &str) -> Option<AlleleCounts> {
    let mut an: Option<u64> = None;
    let mut ac: Option<Vec<u64>> = None;
    for entry in info.split(';') {
        if let Some(value) = entry.strip_prefix("AN=") {
            an = value.parse().ok();
        } else if let Some(value) = entry.strip_prefix("AC=") {
            ac = value.split(',').map(|v| v.parse().ok()).collect();
        }
    }
    let (an, ac) = (an?, ac?);
    let n_alt = *ac.first()?;
    let total_alt: u64 = ac.iter().sum();
    Some(AlleleCounts {
        n_ref: an.saturating_sub(total_alt),
        n_alt,
    })
}

fn genotype_allele_counts(samples: &[&str], gt_idx: usize) -> AlleleCounts {
    let mut counts = AlleleCounts { n_ref: 0, n_alt: 0 };
    for gt in samples.iter().filter_map(|s| sample_subfield(s, gt_idx)) {
        for allele in gt.split(['/', '|']) {
            match allele.parse::<u32>() {
                Ok(0) => counts.n_ref += 1,
                Ok(1) => counts.n_alt += 1,
                _ => {}
            }
        }
    }
    counts
}
