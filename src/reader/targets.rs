use std::collections::HashMap;
use std::path::Path;

use crate::error::{CustomError, Result};

/// Streaming site filter for `-t`/`-T`.
///
/// Holds 1-based inclusive intervals per contig, sorted and merged. A leading
/// `^` on the list or file name inverts the filter.
#[derive(Debug, Clone, Default)]
pub struct Targets {
    intervals: HashMap<String, Vec<(u64, u64)>>,
    exclude: bool,
}

impl Targets {
    /// Comma-separated `CHR[:BEG[-END]]` regions.
    pub fn parse_list(list: &str) -> Result<Self> {
        let (exclude, list) = strip_exclude(list);
        let mut targets = Self {
            exclude,
            ..Self::default()
        };
        for region in list.split(',').map(str::trim).filter(|r| !r.is_empty()) {
            let (contig, beg, end) = parse_region(region).ok_or_else(|| CustomError::TargetsInvalid {
                target: region.to_string(),
            })?;
            targets.insert(contig, beg, end);
        }
        targets.finish(list)
    }

    /// One target per line: `CHR POS`, `CHR BEG END` (tab-delimited) or a region string.
    pub fn from_file(arg: &str) -> Result<Self> {
        let (exclude, file) = strip_exclude(arg);
        let path = Path::new(file);
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .delimiter(b'\t')
            .flexible(true)
            .comment(Some(b'#'))
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(|source| CustomError::CsvRead {
                source,
                path: path.to_path_buf(),
            })?;

        let mut targets = Self {
            exclude,
            ..Self::default()
        };
        for result in reader.records() {
            let record = result.map_err(|source| CustomError::CsvRead {
                source,
                path: path.to_path_buf(),
            })?;
            let line_num = record.position().map_or(0, |p| p.line() as usize);
            let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
            let target = match fields.as_slice() {
                [] => continue,
                [region] => parse_region(region),
                [contig, pos] => pos.parse().ok().map(|pos| (contig.to_string(), pos, pos)),
                [contig, beg, end, ..] => match (beg.parse(), end.parse()) {
                    (Ok(beg), Ok(end)) if beg <= end => Some((contig.to_string(), beg, end)),
                    _ => None,
                },
            };
            let (contig, beg, end) = target.ok_or_else(|| CustomError::TargetsFileLine {
                path: path.to_path_buf(),
                line_num,
            })?;
            targets.insert(contig, beg, end);
        }
        targets.finish(file)
    }

    fn insert(&mut self, contig: String, beg: u64, end: u64) {
        self.intervals.entry(contig).or_default().push((beg, end));
    }

    fn finish(mut self, source: &str) -> Result<Self> {
        if self.intervals.is_empty() {
            return Err(CustomError::TargetsInvalid {
                target: source.to_string(),
            });
        }
        for intervals in self.intervals.values_mut() {
            intervals.sort_unstable();
            let mut merged: Vec<(u64, u64)> = Vec::with_capacity(intervals.len());
            for &(beg, end) in intervals.iter() {
                match merged.last_mut() {
                    Some(last) if beg <= last.1.saturating_add(1) => last.1 = last.1.max(end),
                    _ => merged.push((beg, end)),
                }
            }
            *intervals = merged;
        }
        Ok(self)
    }

    /// Whether a record at `contig:pos` passes the filter.
    pub fn contains(&self, contig: &str, pos: u64) -> bool {
        let inside = self.intervals.get(contig).is_some_and(|intervals| {
            let i = intervals.partition_point(|&(_, end)| end < pos);
            intervals.get(i).is_some_and(|&(beg, _)| beg <= pos)
        });
        inside != self.exclude
    }
}

fn strip_exclude(arg: &str) -> (bool, &str) {
    match arg.strip_prefix('^') {
        Some(rest) => (true, rest),
        None => (false, arg),
    }
}

/// `CHR`, `CHR:POS`, `CHR:BEG-END` or `CHR:BEG-` (to the end of the contig).
fn parse_region(region: &str) -> Option<(String, u64, u64)> {
    let Some((contig, range)) = region.rsplit_once(':') else {
        return Some((region.to_string(), 1, u64::MAX));
    };
    if contig.is_empty() {
        return None;
    }
    let number = |s: &str| s.replace(',', "").parse::<u64>().ok();
    let (beg, end) = match range.split_once('-') {
        Some((beg, "")) => (number(beg)?, u64::MAX),
        Some((beg, end)) => (number(beg)?, number(end)?),
        None => {
            let pos = number(range)?;
            (pos, pos)
        }
    };
    (beg <= end).then(|| (contig.to_string(), beg, end))
}
