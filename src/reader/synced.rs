use std::cmp::Ordering;
use std::collections::{HashMap, VecDeque};

use tracing::debug;

use crate::error::Result;
use crate::model::{Record, Site};
use crate::reader::SiteReader;
use crate::reader::targets::Targets;

/// Walks the query file and, if given, the reference file in lockstep,
/// yielding one [`Site`] per record present in both.
///
/// Both inputs must be sorted by contig and position. Contigs are ranked by the
/// query's header, then the reference's header, then order of first appearance.
/// Records sharing a position are paired by REF and ALT, so split
/// multi-allelic records find their partner whatever their order.
pub struct SyncedSites {
    query: Box<dyn SiteReader>,
    reference: Option<Box<dyn SiteReader>>,
    targets: Option<Targets>,
    contig_rank: HashMap<String, usize>,
    pending_query: Option<Record>,
    pending_reference: Option<Record>,
    ready: VecDeque<Site>,
    n_skipped: u64,
}

impl SyncedSites {
    pub fn new(query: Box<dyn SiteReader>, reference: Option<Box<dyn SiteReader>>) -> Self {
        let mut contig_rank = HashMap::new();
        let header_contigs = query
            .contigs()
            .iter()
            .chain(reference.iter().flat_map(|r| r.contigs().iter()));
        for contig in header_contigs {
            let next = contig_rank.len();
            contig_rank.entry(contig.clone()).or_insert(next);
        }
        Self {
            query,
            reference,
            targets: None,
            contig_rank,
            pending_query: None,
            pending_reference: None,
            ready: VecDeque::new(),
            n_skipped: 0,
        }
    }

    /// Drops records outside `targets` from both inputs before pairing.
    pub fn with_targets(mut self, targets: Option<Targets>) -> Self {
        self.targets = targets;
        self
    }

    /// Records dropped because they had no partner in the other file.
    pub fn n_skipped(&self) -> u64 {
        self.n_skipped
    }

    fn rank(&mut self, contig: &str) -> usize {
        let next = self.contig_rank.len();
        *self.contig_rank.entry(contig.to_string()).or_insert(next)
    }

    fn key_cmp(&mut self, a: &Record, b: &Record) -> Ordering {
        let (ra, rb) = (self.rank(&a.contig), self.rank(&b.contig));
        ra.cmp(&rb).then(a.pos.cmp(&b.pos))
    }

    /// Pairs records at one position by alleles, in query order.
    fn pair_by_alleles(&mut self, queries: Vec<Record>, references: Vec<Record>) {
        let mut references: Vec<Option<Record>> = references.into_iter().map(Some).collect();
        for query in queries {
            let partner = references
                .iter_mut()
                .find(|r| {
                    r.as_ref().is_some_and(|r| {
                        r.ref_allele == query.ref_allele && r.alt_alleles == query.alt_alleles
                    })
                })
                .and_then(Option::take);
            let Some(reference) = partner else {
                debug!(
                    "no record with alleles {}>{} at {}:{}, skipping",
                    query.ref_allele, query.alt_alleles, query.contig, query.pos
                );
                self.n_skipped += 1;
                continue;
            };
            self.ready.push_back(Site {
                allele_counts: reference.allele_counts.or(query.allele_counts),
                contig: query.contig,
                pos: query.pos,
                query: query.column,
                reference: reference.column,
                has_reference_file: true,
            });
        }
        self.n_skipped += references.iter().flatten().count() as u64;
    }

    fn next_paired(&mut self) -> Option<Result<Site>> {
        loop {
            if let Some(site) = self.ready.pop_front() {
                return Some(Ok(site));
            }
            let query = match self.pending_query.take() {
                Some(record) => record,
                None => match next_target(self.query.as_mut(), self.targets.as_ref())? {
                    Ok(record) => record,
                    Err(e) => return Some(Err(e)),
                },
            };
            let reference = match self.pending_reference.take() {
                Some(record) => record,
                None => {
                    let reader = self.reference.as_mut()?;
                    match next_target(reader.as_mut(), self.targets.as_ref()) {
                        Some(Ok(record)) => record,
                        Some(Err(e)) => return Some(Err(e)),
                        None => {
                            // Nothing left to pair with
                            return None;
                        }
                    }
                }
            };

            match self.key_cmp(&query, &reference) {
                Ordering::Less => {
                    self.n_skipped += 1;
                    self.pending_reference = Some(reference);
                }
                Ordering::Greater => {
                    self.n_skipped += 1;
                    self.pending_query = Some(query);
                }
                Ordering::Equal => {
                    let targets = self.targets.as_ref();
                    let queries =
                        match take_position(self.query.as_mut(), targets, &mut self.pending_query, query) {
                            Ok(group) => group,
                            Err(e) => return Some(Err(e)),
                        };
                    let reader = self.reference.as_mut()?;
                    let references =
                        match take_position(reader.as_mut(), targets, &mut self.pending_reference, reference) {
                            Ok(group) => group,
                            Err(e) => return Some(Err(e)),
                        };
                    self.pair_by_alleles(queries, references);
                }
            }
        }
    }
}

fn next_target(reader: &mut dyn SiteReader, targets: Option<&Targets>) -> Option<Result<Record>> {
    loop {
        let record = reader.next()?;
        match (&record, targets) {
            (Ok(r), Some(targets)) if !targets.contains(&r.contig, r.pos) => continue,
            _ => return Some(record),
        }
    }
}

/// `first` plus every following record at the same position. The first record
/// past it is left in `pending`.
fn take_position(
    reader: &mut dyn SiteReader,
    targets: Option<&Targets>,
    pending: &mut Option<Record>,
    first: Record,
) -> Result<Vec<Record>> {
    let mut group = vec![first];
    while let Some(record) = next_target(reader, targets).transpose()? {
        if record.contig == group[0].contig && record.pos == group[0].pos {
            group.push(record);
        } else {
            *pending = Some(record);
            break;
        }
    }
    Ok(group)
}

impl Iterator for SyncedSites {
    type Item = Result<Site>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.reference.is_some() {
            return self.next_paired();
        }
        let record = next_target(self.query.as_mut(), self.targets.as_ref())?;
        Some(record.map(|record| Site {
            contig: record.contig,
            pos: record.pos,
            query: record.column,
            reference: None,
            has_reference_file: false,
            allele_counts: record.allele_counts,
        }))
    }
}
