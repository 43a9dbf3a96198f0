use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use itertools::Itertools;

use crate::counts::Counts;
use crate::distinctive::DistinctiveSite;
use crate::error::{CustomError, Result};
use crate::pairs::PairSet;

/// Formats a float like C's `%e`: six decimals and an at least two-digit exponent.
pub fn format_sci(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let formatted = format!("{value:.6e}");
    match formatted.split_once('e') {
        Some((mantissa, exp)) => {
            let exp: i32 = exp.parse().unwrap_or(0);
            let sign = if exp < 0 { '-' } else { '+' };
            format!("{mantissa}e{sign}{:02}", exp.abs())
        }
        None => formatted,
    }
}

/// Writes the tab-delimited `gtcheck.txt` report.
pub struct Reporter<W: Write> {
    out: W,
    path: PathBuf,
}

impl Reporter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::create(&path).map_err(|e| CustomError::Write {
            source: e,
            path: path.clone(),
        })?;
        Ok(Self::new(BufWriter::new(file), path))
    }
}

impl<W: Write> Reporter<W> {
    pub fn new(out: W, path: PathBuf) -> Self {
        Self { out, path }
    }

    fn line(&mut self, args: fmt::Arguments<'_>) -> Result<()> {
        writeln!(self.out, "{args}").map_err(|e| CustomError::Write {
            source: e,
            path: self.path.clone(),
        })
    }

    pub fn write_provenance(&mut self, command_line: &str, cwd: &Path) -> Result<()> {
        self.line(format_args!(
            "# This file was produced by gtcheck {}, the command line was:",
            env!("CARGO_PKG_VERSION")
        ))?;
        self.line(format_args!("# \t {command_line}"))?;
        self.line(format_args!("# and the working directory was:"))?;
        self.line(format_args!("# \t {}\n#", cwd.display()))
    }

    pub fn write_info(&mut self, seconds_per_record: f64) -> Result<()> {
        self.line(format_args!(
            "INFO\tTime required to process one record .. {seconds_per_record:.6} seconds"
        ))
    }

    fn write_dc_legend(&mut self) -> Result<()> {
        self.line(format_args!("# DC, discordance:"))?;
        self.line(format_args!("#     - query sample"))?;
        self.line(format_args!("#     - genotyped sample"))?;
        self.line(format_args!(
            "#     - discordance (number of mismatches; smaller is better)"
        ))?;
        self.line(format_args!(
            "#     - negative log of HWE probability at matching sites (bigger is better)"
        ))?;
        self.line(format_args!(
            "#     - number of sites compared (bigger is better)"
        ))?;
        self.line(format_args!(
            "#DC\t[2]Query Sample\t[3]Genotyped Sample\t[4]Discordance\t[5]-log P(HWE)\t[6]Number of sites compared"
        ))
    }

    fn write_dc_row(&mut self, counts: &Counts, idx: usize, query: &str, reference: &str) -> Result<()> {
        let hwe = counts.hwe_prob().map_or(0.0, |scores| scores[idx]);
        self.line(format_args!(
            "DC\t{query}\t{reference}\t{}\t{}\t{}",
            counts.ndiff()[idx],
            format_sci(hwe),
            counts.ncnt()[idx]
        ))
    }

    /// Per-pair discordance rows.
    ///
    /// With `n_matches != 0` only the best `|n_matches|` partners of each query
    /// sample are listed: by discordance rate, or by HWE score when negative.
    pub fn write_discordance(
        &mut self,
        counts: &Counts,
        query_names: &[String],
        reference_names: &[String],
        n_matches: i64,
    ) -> Result<()> {
        self.write_dc_legend()?;
        let pairs = counts.pairs();
        let n_top = n_matches.unsigned_abs() as usize;
        let candidates_per_row = match pairs {
            PairSet::Explicit(_) => 0,
            PairSet::Cross { reference, .. } => reference.len(),
            PairSet::Triangular { samples } => samples.len().saturating_sub(1),
        };

        if pairs.is_explicit() || n_top == 0 || n_top >= candidates_per_row {
            for (idx, (iq, ir)) in pairs.iter().enumerate() {
                self.write_dc_row(counts, idx, &query_names[iq], &reference_names[ir])?;
            }
            return Ok(());
        }

        let sort_by_hwe = n_matches < 0;
        let score = |idx: usize| -> f64 {
            if sort_by_hwe {
                -counts.hwe_prob().map_or(0.0, |scores| scores[idx])
            } else if counts.ncnt()[idx] == 0 {
                0.0
            } else {
                counts.ndiff()[idx] as f64 / counts.ncnt()[idx] as f64
            }
        };
        for (row, &iq) in pairs.row_samples().iter().enumerate() {
            let best = pairs
                .row_candidates(row)
                .into_iter()
                .sorted_by(|a, b| score(a.1).total_cmp(&score(b.1)))
                .take(n_top);
            for (ir, idx) in best {
                self.write_dc_row(counts, idx, &query_names[iq], &reference_names[ir])?;
            }
        }
        Ok(())
    }

    pub fn write_distinctive_header(&mut self) -> Result<()> {
        self.line(format_args!("# DS, distinctive sites:"))?;
        self.line(format_args!("#     - chromosome"))?;
        self.line(format_args!("#     - position"))?;
        self.line(format_args!(
            "#     - cumulative number of pairs distinguished by this block"
        ))?;
        self.line(format_args!("#     - block id"))?;
        self.line(format_args!(
            "#DS\t[2]Chromosome\t[3]Position\t[4]Cumulative number of distinct pairs\t[5]Block id"
        ))
    }

    pub fn write_distinctive_site(&mut self, site: &DistinctiveSite<'_>) -> Result<()> {
        self.line(format_args!(
            "DS\t{}\t{}\t{}\t{}",
            site.contig, site.pos, site.cumulative, site.block
        ))
    }

    pub fn finish(mut self) -> Result<W> {
        self.out.flush().map_err(|e| CustomError::Write {
            source: e,
            path: self.path.clone(),
        })?;
        Ok(self.out)
    }
}
