use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use flate2::Compression;
use flate2::write::GzEncoder;

static NEXT_ID: AtomicUsize = AtomicUsize::new(0);

pub struct Dataset {
    pub dir: PathBuf,
    pub output_dir: PathBuf,
}

impl Dataset {
    pub fn path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

pub fn create_dataset(label: &str) -> io::Result<Dataset> {
    let id = NEXT_ID.fetch_add(1, Ordering::Relaxed);
    let dir = std::env::temp_dir().join("gtcheck-tests").join(format!(
        "{}-{}-{}",
        std::process::id(),
        id,
        label
    ));
    if dir.exists() {
        fs::remove_dir_all(&dir)?;
    }
    fs::create_dir_all(&dir)?;
    let output_dir = dir.join("output");
    Ok(Dataset { dir, output_dir })
}

/// One VCF record: contig, position and one GT string per sample.
pub struct Site<'a> {
    pub contig: &'a str,
    pub pos: u64,
    pub genotypes: &'a [&'a str],
}

fn render_vcf(samples: &[&str], sites: &[Site<'_>]) -> String {
    let mut text = String::new();
    text.push_str("##fileformat=VCFv4.2\n");
    text.push_str("##contig=<ID=1,length=100000>\n");
    text.push_str("##contig=<ID=2,length=100000>\n");
    text.push_str("##FORMAT=<ID=GT,Number=1,Type=String,Description=\"Genotype\">\n");
    text.push_str("#CHROM\tPOS\tID\tREF\tALT\tQUAL\tFILTER\tINFO\tFORMAT");
    for sample in samples {
        text.push('\t');
        text.push_str(sample);
    }
    text.push('\n');
    for site in sites {
        text.push_str(&format!(
            "{}\t{}\t.\tA\tG\t.\tPASS\t.\tGT",
            site.contig, site.pos
        ));
        for gt in site.genotypes {
            text.push('\t');
            text.push_str(gt);
        }
        text.push('\n');
    }
    text
}

pub fn write_vcf(path: impl AsRef<Path>, samples: &[&str], sites: &[Site<'_>]) -> io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(render_vcf(samples, sites).as_bytes())
}

pub fn write_vcf_gz(path: impl AsRef<Path>, samples: &[&str], sites: &[Site<'_>]) -> io::Result<()> {
    let file = File::create(path)?;
    let mut encoder = GzEncoder::new(file, Compression::default());
    encoder.write_all(render_vcf(samples, sites).as_bytes())?;
    encoder.finish()?;
    Ok(())
}

/// Three samples: A and B identical, C differing from both at two of five sites.
pub fn trio_sites() -> Vec<Site<'static>> {
    vec![
        Site { contig: "1", pos: 100, genotypes: &["0/0", "0/0", "1/1"] },
        Site { contig: "1", pos: 200, genotypes: &["0/1", "0/1", "0/1"] },
        Site { contig: "1", pos: 300, genotypes: &["1/1", "1|1", "0/1"] },
        Site { contig: "2", pos: 50, genotypes: &["0/1", "1/0", "0/1"] },
        Site { contig: "2", pos: 80, genotypes: &["0/0", "0/0", "./."] },
    ]
}

/// `DC` rows of a report as (query, reference, discordance, hwe, compared).
pub fn dc_rows(report: &str) -> Vec<(String, String, u32, String, u32)> {
    report
        .lines()
        .filter(|l| l.starts_with("DC\t"))
        .map(|l| {
            let f: Vec<&str> = l.split('\t').collect();
            (
                f[1].to_string(),
                f[2].to_string(),
                f[3].parse().unwrap(),
                f[4].to_string(),
                f[5].parse().unwrap(),
            )
        })
        .collect()
}

/// `DS` rows of a report as (contig, position, cumulative, block).
pub fn ds_rows(report: &str) -> Vec<(String, u64, usize, usize)> {
    report
        .lines()
        .filter(|l| l.starts_with("DS\t"))
        .map(|l| {
            let f: Vec<&str> = l.split('\t').collect();
            (
                f[1].to_string(),
                f[2].parse().unwrap(),
                f[3].parse().unwrap(),
                f[4].parse().unwrap(),
            )
        })
        .collect()
}
