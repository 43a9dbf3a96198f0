use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::bitset::BitSet;
use crate::error::{CustomError, Result};
use crate::extsort::ExternalSorter;

// ndiff u32 | tie-break u32 | contig id u32 | position u64, then the bit-set words
const HEADER_BYTES: usize = 20;

type RecordCmp = fn(&[u8], &[u8]) -> Ordering;

#[inline]
fn read_u32(bytes: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        bytes[offset],
        bytes[offset + 1],
        bytes[offset + 2],
        bytes[offset + 3],
    ])
}

#[inline]
fn read_u64(bytes: &[u8], offset: usize) -> u64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    u64::from_le_bytes(buf)
}

/// Most distinguishing sites first; random keys shuffle sites with equal counts across contigs.
pub fn compare_records(a: &[u8], b: &[u8]) -> Ordering {
    read_u32(b, 0)
        .cmp(&read_u32(a, 0))
        .then_with(|| read_u32(a, 4).cmp(&read_u32(b, 4)))
}

/// Number of newly distinguished pairs a block needs before it is closed.
///
/// Values up to 1 are a fraction of all pairs, larger values an absolute count.
pub fn resolve_threshold(value: f64, n_pairs: usize) -> Result<usize> {
    if !value.is_finite() || value <= 0.0 {
        return Err(CustomError::DistinctiveSitesLow { value });
    }
    let n_sites = if value <= 1.0 {
        (n_pairs as f64 * value).round()
    } else {
        value.round()
    };
    if n_sites < 1.0 {
        return Err(CustomError::DistinctiveSitesLow { value: n_sites });
    }
    if n_sites > n_pairs as f64 {
        warn!(
            "The value for --distinctive-sites was set too high, setting to all pairs ({}) instead",
            n_pairs
        );
        return Ok(n_pairs);
    }
    Ok(n_sites as usize)
}

/// One drained site that distinguished at least one new pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistinctiveSite<'a> {
    pub contig: &'a str,
    pub pos: u64,
    pub cumulative: usize,
    pub block: usize,
}

/// Collects per-site disagreement sets during streaming and partitions the
/// ranked sites into blocks that each distinguish `threshold` pairs.
pub struct DistinctiveSites {
    n_pairs: usize,
    threshold: usize,
    sorter: ExternalSorter<RecordCmp>,
    rng: fastrand::Rng,
    contig_ids: HashMap<String, u32>,
    contigs: Vec<String>,
    site_bits: BitSet,
    record_buf: Vec<u8>,
    n_pushed: u64,
}

impl DistinctiveSites {
    pub fn new(
        n_pairs: usize,
        threshold: usize,
        temp_root: PathBuf,
        max_mem: usize,
        seed: u64,
    ) -> Self {
        let record_size = HEADER_BYTES + 8 * BitSet::n_words_for(n_pairs);
        Self {
            n_pairs,
            threshold,
            sorter: ExternalSorter::new(
                record_size,
                max_mem,
                temp_root,
                compare_records as RecordCmp,
            ),
            rng: fastrand::Rng::with_seed(seed),
            contig_ids: HashMap::new(),
            contigs: Vec::new(),
            site_bits: BitSet::new(n_pairs),
            record_buf: Vec::with_capacity(record_size),
            n_pushed: 0,
        }
    }

    pub fn threshold(&self) -> usize {
        self.threshold
    }

    /// Cleared bit-set for the pairs that disagree at the next site.
    pub fn begin_site(&mut self) -> &mut BitSet {
        self.site_bits.clear();
        &mut self.site_bits
    }

    /// Queues the current site's disagreement set; sites where no pair disagreed are dropped.
    pub fn push_site(&mut self, contig: &str, pos: u64, ndiff: u32) -> Result<()> {
        if ndiff == 0 {
            return Ok(());
        }
        let contig_id = match self.contig_ids.get(contig) {
            Some(&id) => id,
            None => {
                let id = self.contigs.len() as u32;
                self.contig_ids.insert(contig.to_string(), id);
                self.contigs.push(contig.to_string());
                id
            }
        };
        self.record_buf.clear();
        self.record_buf.extend_from_slice(&ndiff.to_le_bytes());
        self.record_buf
            .extend_from_slice(&self.rng.u32(..).to_le_bytes());
        self.record_buf.extend_from_slice(&contig_id.to_le_bytes());
        self.record_buf.extend_from_slice(&pos.to_le_bytes());
        self.site_bits.write_words(&mut self.record_buf);
        self.sorter.push(&self.record_buf)?;
        self.n_pushed += 1;
        Ok(())
    }

    /// Sorts the queued sites and hands every site that adds information to `emit`.
    pub fn drain<F>(mut self, mut emit: F) -> Result<()>
    where
        F: FnMut(&DistinctiveSite<'_>) -> Result<()>,
    {
        debug!(
            "sorting {} distinctive-site records ({} pairs, {} per block)",
            self.n_pushed, self.n_pairs, self.threshold
        );
        self.sorter.sort()?;
        debug!("merging {} sorted runs", self.sorter.n_runs());

        let mut block_bits = BitSet::new(self.n_pairs);
        let mut record_bits = BitSet::new(self.n_pairs);
        let mut cumulative = 0usize;
        let mut block = 0usize;

        while let Some(record) = self.sorter.shift()? {
            let ndiff = read_u32(&record, 0);
            let contig_id = read_u32(&record, 8) as usize;
            let pos = read_u64(&record, 12);
            record_bits.read_words(&record[HEADER_BYTES..]);

            let found = record_bits.count_ones();
            if found != ndiff {
                return Err(CustomError::CorruptedDiffRecord {
                    expected: ndiff,
                    found,
                });
            }

            let mut n_new = 0usize;
            for idx in record_bits.iter_ones() {
                if !block_bits.contains(idx) {
                    block_bits.insert(idx);
                    n_new += 1;
                }
            }
            if n_new == 0 {
                continue;
            }
            cumulative += n_new;
            emit(&DistinctiveSite {
                contig: &self.contigs[contig_id],
                pos,
                cumulative,
                block,
            })?;
            if cumulative >= self.threshold {
                block += 1;
                cumulative = 0;
                block_bits.clear();
            }
        }
        Ok(())
    }
}
