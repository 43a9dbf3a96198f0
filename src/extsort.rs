use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufReader, BufWriter, ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::PathBuf;

use tempfile::TempDir;
use tracing::debug;

use crate::error::{CustomError, Result};

/// Disk-backed stable sort of fixed-size byte records.
///
/// Records are buffered in memory up to a byte budget, then written out as
/// sorted runs into anonymous files inside a private temporary directory.
/// `shift` merges the runs. The directory and all runs are removed on drop.
pub struct ExternalSorter<C>
where
    C: Fn(&[u8], &[u8]) -> Ordering,
{
    record_size: usize,
    max_buffered: usize,
    cmp: C,
    temp_root: PathBuf,
    temp_dir: Option<TempDir>,
    buffer: Vec<Box<[u8]>>,
    runs: Vec<Run>,
    phase: Phase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Pushing,
    Draining,
}

struct Run {
    reader: BufReader<File>,
    head: Option<Box<[u8]>>,
}

impl Run {
    fn advance(&mut self, record_size: usize) -> Result<()> {
        let mut buf = vec![0u8; record_size].into_boxed_slice();
        self.head = match self.reader.read_exact(&mut buf) {
            Ok(()) => Some(buf),
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => None,
            Err(e) => return Err(CustomError::ExternalSort { source: e }),
        };
        Ok(())
    }
}

impl<C> ExternalSorter<C>
where
    C: Fn(&[u8], &[u8]) -> Ordering,
{
    pub fn new(record_size: usize, max_mem: usize, temp_root: PathBuf, cmp: C) -> Self {
        let record_size = record_size.max(1);
        Self {
            record_size,
            max_buffered: (max_mem / record_size).max(1),
            cmp,
            temp_root,
            temp_dir: None,
            buffer: Vec::new(),
            runs: Vec::new(),
            phase: Phase::Pushing,
        }
    }

    pub fn n_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn push(&mut self, record: &[u8]) -> Result<()> {
        if self.phase != Phase::Pushing {
            return Err(CustomError::SorterPhase { operation: "push" });
        }
        debug_assert_eq!(record.len(), self.record_size);
        self.buffer.push(record.into());
        if self.buffer.len() >= self.max_buffered {
            self.spill()?;
        }
        Ok(())
    }

    /// Ends the push phase. Must be called exactly once before `shift`.
    pub fn sort(&mut self) -> Result<()> {
        if self.phase != Phase::Pushing {
            return Err(CustomError::SorterPhase { operation: "sort" });
        }
        self.phase = Phase::Draining;
        if self.runs.is_empty() {
            // Everything fits in memory; drain from the back of a reversed buffer
            self.sort_buffer();
            self.buffer.reverse();
            return Ok(());
        }
        if !self.buffer.is_empty() {
            self.spill()?;
        }
        for run in &mut self.runs {
            run.advance(self.record_size)?;
        }
        Ok(())
    }

    /// Next record in sorted order, or `None` once all records were returned.
    pub fn shift(&mut self) -> Result<Option<Box<[u8]>>> {
        if self.phase != Phase::Draining {
            return Err(CustomError::SorterPhase { operation: "shift" });
        }
        if self.runs.is_empty() {
            return Ok(self.buffer.pop());
        }

        // Earliest run wins ties, which keeps the merge stable
        let mut best: Option<usize> = None;
        for (i, run) in self.runs.iter().enumerate() {
            let Some(head) = run.head.as_deref() else {
                continue;
            };
            best = match best {
                Some(b) => match self.runs[b].head.as_deref() {
                    Some(current) if (self.cmp)(head, current) == Ordering::Less => Some(i),
                    _ => Some(b),
                },
                None => Some(i),
            };
        }
        let Some(b) = best else {
            return Ok(None);
        };
        let record = self.runs[b].head.take();
        self.runs[b].advance(self.record_size)?;
        Ok(record)
    }

    fn sort_buffer(&mut self) {
        let cmp = &self.cmp;
        self.buffer.sort_by(|a, b| cmp(a, b));
    }

    fn spill(&mut self) -> Result<()> {
        self.sort_buffer();
        if self.temp_dir.is_none() {
            let dir = tempfile::Builder::new()
                .prefix("gtcheck.")
                .tempdir_in(&self.temp_root)
                .map_err(|e| CustomError::ExternalSort { source: e })?;
            debug!("spilling sorted runs to {}", dir.path().display());
            self.temp_dir = Some(dir);
        }
        let dir = self
            .temp_dir
            .as_ref()
            .map(|d| d.path().to_path_buf())
            .unwrap_or_else(|| self.temp_root.clone());

        let file = tempfile::tempfile_in(&dir).map_err(|e| CustomError::ExternalSort { source: e })?;
        let mut writer = BufWriter::new(file);
        for record in self.buffer.drain(..) {
            writer
                .write_all(&record)
                .map_err(|e| CustomError::ExternalSort { source: e })?;
        }
        let mut file = writer
            .into_inner()
            .map_err(|e| CustomError::ExternalSort {
                source: e.into_error(),
            })?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| CustomError::ExternalSort { source: e })?;
        self.runs.push(Run {
            reader: BufReader::new(file),
            head: None,
        });
        Ok(())
    }
}

/// Parses a memory size such as `500M`, `64k` or `2G` into bytes.
pub fn parse_mem(spec: &str) -> Option<usize> {
    let spec = spec.trim();
    let (digits, multiplier) = match spec.char_indices().last()? {
        (i, 'k' | 'K') => (&spec[..i], 1usize << 10),
        (i, 'm' | 'M') => (&spec[..i], 1usize << 20),
        (i, 'g' | 'G') => (&spec[..i], 1usize << 30),
        _ => (spec, 1),
    };
    let value: f64 = digits.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }
    Some((value * multiplier as f64) as usize)
}
