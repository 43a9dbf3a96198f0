use std::path::{Path, PathBuf};
use std::time::Instant;

use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use crate::Args;
use crate::counts::Counts;
use crate::distinctive::{DistinctiveSites, resolve_threshold};
use crate::error::{CustomError, Result};
use crate::extsort::parse_mem;
use crate::hwe::HweTable;
use crate::model::EvidenceKind;
use crate::output::Reporter;
use crate::pairs::PairSet;
use crate::reader::SiteReader;
use crate::reader::samples::{SampleIndex, Side, parse_selector, read_list};
use crate::reader::synced::SyncedSites;
use crate::reader::targets::Targets;
use crate::reader::vcf::VcfReader;

pub const REPORT_FILE: &str = "gtcheck.txt";

/// Validated run configuration.
#[derive(Debug, Clone)]
pub struct InputSpec {
    pub query: PathBuf,
    pub genotypes: Option<PathBuf>,
    pub output_dir: PathBuf,
    pub query_tag: Option<EvidenceKind>,
    pub genotypes_tag: Option<EvidenceKind>,
    pub query_samples: Option<Vec<String>>,
    pub genotype_samples: Option<Vec<String>>,
    pub pairs: Option<Vec<(String, String)>>,
    pub targets: Option<Targets>,
    pub homs_only: bool,
    pub n_matches: i64,
    pub calc_hwe: bool,
    pub distinctive_sites: Option<f64>,
    pub dry_run: bool,
    pub temp_dir: PathBuf,
    pub max_mem: usize,
    pub seed: u64,
}

impl InputSpec {
    pub fn print_paths(&self) {
        info!("query     : {}", self.query.display());
        if let Some(genotypes) = &self.genotypes {
            info!("genotypes : {}", genotypes.display());
        }
        info!("report    : {}", self.report_path().display());
    }

    pub fn report_path(&self) -> PathBuf {
        self.output_dir.join(REPORT_FILE)
    }
}

fn parse_tag(tag: &str, arg: &str) -> Result<EvidenceKind> {
    if tag.eq_ignore_ascii_case("GT") {
        Ok(EvidenceKind::Called)
    } else if tag.eq_ignore_ascii_case("PL") {
        Ok(EvidenceKind::Likelihood)
    } else {
        Err(CustomError::UseTag {
            arg: arg.to_string(),
        })
    }
}

/// `TAG1[,TAG2]`: the tag for the query file and, optionally, a different one for the genotypes file.
pub fn parse_use(arg: &str) -> Result<(EvidenceKind, Option<EvidenceKind>)> {
    let tags: Vec<&str> = arg.split(',').map(str::trim).collect();
    match tags.as_slice() {
        [query] => Ok((parse_tag(query, arg)?, None)),
        [query, genotypes] => Ok((parse_tag(query, arg)?, Some(parse_tag(genotypes, arg)?))),
        _ => Err(CustomError::UseTag {
            arg: arg.to_string(),
        }),
    }
}

/// Pairs from a `-p` list: `Q1,G1,Q2,G2,...`.
pub fn parse_pair_list(list: &str) -> Result<Vec<(String, String)>> {
    let names: Vec<&str> = list
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();
    if names.is_empty() {
        return Err(CustomError::PairsEmpty);
    }
    if names.len() % 2 != 0 {
        return Err(CustomError::PairsOdd {
            n_samples: names.len(),
        });
    }
    Ok(names
        .chunks_exact(2)
        .map(|pair| (pair[0].to_string(), pair[1].to_string()))
        .collect())
}

/// Pairs from a `-P` file, one tab-delimited pair per line.
fn load_pairs_file(path: &Path) -> Result<Vec<(String, String)>> {
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

    let mut pairs = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|source| CustomError::CsvRead {
            source,
            path: path.to_path_buf(),
        })?;
        let line_num = record.position().map_or(0, |p| p.line() as usize);
        let fields: Vec<&str> = record.iter().filter(|f| !f.is_empty()).collect();
        let pair: Vec<&str> = match fields.as_slice() {
            [] => continue,
            // Not tab-delimited
            [single] => single.split_whitespace().collect(),
            many => many.to_vec(),
        };
        match pair.as_slice() {
            [query, reference] => pairs.push((query.to_string(), reference.to_string())),
            _ => {
                return Err(CustomError::PairsFileLine {
                    path: path.to_path_buf(),
                    line_num,
                });
            }
        }
    }

    if pairs.is_empty() {
        return Err(CustomError::PairsEmpty);
    }
    Ok(pairs)
}

/// Convert sample pairs from names to column indices of the query and reference files.
fn resolve_sample_pairs(
    query: &SampleIndex<'_>,
    reference: &SampleIndex<'_>,
    pairs: &[(String, String)],
) -> Result<Vec<(usize, usize)>> {
    pairs
        .iter()
        .map(|(q, r)| Ok((query.get(q)?, reference.get(r)?)))
        .collect()
}

pub fn build_input_spec(args: &Args) -> Result<InputSpec> {
    let has_pairs = args.pairs.is_some() || args.pairs_file.is_some();
    let has_samples = !args.samples.is_empty() || !args.samples_file.is_empty();
    if args.pairs.is_some() && args.pairs_file.is_some() {
        return Err(CustomError::ConflictingOptions {
            first: "-p",
            second: "-P",
        });
    }
    if has_pairs && has_samples {
        return Err(CustomError::ConflictingOptions {
            first: "-p/-P",
            second: "-s/-S",
        });
    }
    if has_pairs && args.n_matches.is_some() {
        return Err(CustomError::ConflictingOptions {
            first: "--n-matches",
            second: "-p/-P",
        });
    }
    if args.targets.is_some() && args.targets_file.is_some() {
        return Err(CustomError::ConflictingOptions {
            first: "-t",
            second: "-T",
        });
    }
    if args.homs_only && args.genotypes.is_none() {
        return Err(CustomError::HomsOnlyWithoutGenotypes);
    }

    // A single tag is used for both files
    let (query_tag, genotypes_tag) = match &args.use_tags {
        Some(arg) => {
            let (query, genotypes) = parse_use(arg)?;
            (Some(query), Some(genotypes.unwrap_or(query)))
        }
        None => (None, None),
    };

    let targets = match (&args.targets, &args.targets_file) {
        (Some(list), _) => Some(Targets::parse_list(list)?),
        (None, Some(file)) => Some(Targets::from_file(file)?),
        (None, None) => None,
    };

    let mut query_samples: Option<Vec<String>> = None;
    let mut genotype_samples: Option<Vec<String>> = None;
    let selectors = args
        .samples
        .iter()
        .map(|arg| (arg, false))
        .chain(args.samples_file.iter().map(|arg| (arg, true)));
    for (arg, is_file) in selectors {
        let (side, list) = parse_selector(arg)?;
        let names = read_list(list, is_file)?;
        let target = match side {
            Side::Query => &mut query_samples,
            Side::Genotypes => &mut genotype_samples,
        };
        target.get_or_insert_with(Vec::new).extend(names);
    }

    let pairs = match (&args.pairs, &args.pairs_file) {
        (Some(list), _) => Some(parse_pair_list(list)?),
        (None, Some(path)) => Some(load_pairs_file(path)?),
        (None, None) => None,
    };

    let max_mem = parse_mem(&args.max_mem).ok_or_else(|| CustomError::MaxMem {
        arg: args.max_mem.clone(),
    })?;
    if let Some(value) = args.distinctive_sites {
        if !value.is_finite() || value <= 0.0 {
            return Err(CustomError::DistinctiveSitesLow { value });
        }
    }

    Ok(InputSpec {
        query: args.query.clone(),
        genotypes: args.genotypes.clone(),
        output_dir: PathBuf::from(&args.output_directory),
        query_tag,
        genotypes_tag,
        query_samples,
        genotype_samples,
        pairs,
        targets,
        homs_only: args.homs_only,
        n_matches: args.n_matches.unwrap_or(0),
        calc_hwe: !args.no_hwe_prob,
        distinctive_sites: args.distinctive_sites,
        dry_run: args.dry_run,
        temp_dir: args.temp_dir.clone().unwrap_or_else(std::env::temp_dir),
        max_mem,
        seed: args.seed,
    })
}

/// Chooses how pairs are enumerated: an explicit list, a full cross product
/// between two sample sets, or all unordered pairs of one set.
pub fn build_pair_set(
    spec: &InputSpec,
    query: &dyn SiteReader,
    reference: Option<&dyn SiteReader>,
) -> Result<PairSet> {
    let query_index = SampleIndex::new(query.samples(), query.path());
    let reference_file = reference.unwrap_or(query);
    let reference_index = SampleIndex::new(reference_file.samples(), reference_file.path());

    if let Some(pairs) = &spec.pairs {
        let resolved = resolve_sample_pairs(&query_index, &reference_index, pairs)?;
        return Ok(PairSet::Explicit(resolved));
    }

    let query_samples = match &spec.query_samples {
        Some(names) => query_index.resolve(names)?,
        None => (0..query.samples().len()).collect(),
    };
    if reference.is_some() || spec.genotype_samples.is_some() {
        let reference_samples = match &spec.genotype_samples {
            Some(names) => reference_index.resolve(names)?,
            None => (0..reference_file.samples().len()).collect(),
        };
        return Ok(PairSet::Cross {
            query: query_samples,
            reference: reference_samples,
        });
    }
    if query_samples.len() < 2 {
        return Err(CustomError::SampleCount {
            n_samples: query_samples.len(),
        });
    }
    Ok(PairSet::Triangular {
        samples: query_samples,
    })
}

pub fn run(spec: &InputSpec, command_line: &str) -> Result<()> {
    let mut query = VcfReader::open(&spec.query)?;
    let query_kind = query.choose_evidence(
        spec.query_tag,
        [EvidenceKind::Likelihood, EvidenceKind::Called],
    )?;
    let mut reference = spec.genotypes.as_ref().map(VcfReader::open).transpose()?;
    let reference_kind = match reference.as_mut() {
        Some(r) => r.choose_evidence(
            spec.genotypes_tag,
            [EvidenceKind::Called, EvidenceKind::Likelihood],
        )?,
        None => query_kind,
    };
    debug!(
        "comparing query {} against reference {}",
        query_kind.tag(),
        reference_kind.tag()
    );
    if spec.calc_hwe {
        match reference.as_mut() {
            Some(r) => r.set_count_alleles(true),
            None => query.set_count_alleles(true),
        }
    }

    let pairs = build_pair_set(
        spec,
        &query,
        reference.as_ref().map(|r| r as &dyn SiteReader),
    )?;
    let query_names = query.samples().to_vec();
    let reference_names = match &reference {
        Some(r) => r.samples().to_vec(),
        None => query_names.clone(),
    };
    info!("tracking {} sample pairs", pairs.len());

    let mut counts = Counts::new(pairs, spec.homs_only, spec.calc_hwe);
    let mut selector = match spec.distinctive_sites {
        Some(value) => {
            let threshold = resolve_threshold(value, counts.n_pairs())?;
            let selector = DistinctiveSites::new(
                counts.n_pairs(),
                threshold,
                spec.temp_dir.clone(),
                spec.max_mem,
                spec.seed,
            );
            info!(
                "collecting sites that distinguish {} pairs per block",
                selector.threshold()
            );
            Some(selector)
        }
        None => None,
    };

    let mut sites = SyncedSites::new(
        Box::new(query),
        reference.map(|r| Box::new(r) as Box<dyn SiteReader>),
    )
    .with_targets(spec.targets.clone());
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("[{elapsed_precise}] {spinner} {pos} sites")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );

    let mut seconds_per_record = None;
    for site in &mut sites {
        let site = site?;
        pb.inc(1);
        if site.columns().is_none() {
            continue;
        }
        let hwe = if spec.calc_hwe {
            let allele_counts = site.allele_counts.ok_or_else(|| CustomError::AlleleCounts {
                contig: site.contig.clone(),
                pos: site.pos,
            })?;
            Some(HweTable::from_allele_counts(allele_counts))
        } else {
            None
        };

        // Time one record to give an estimate for very big files
        let started = (counts.n_sites() == 0).then(Instant::now);
        let diff = selector.as_mut().map(|s| s.begin_site());
        let n_diff = counts.add_site(&site, hwe.as_ref(), diff);
        if let Some(s) = selector.as_mut() {
            s.push_site(&site.contig, site.pos, n_diff)?;
        }
        if let Some(t0) = started {
            let elapsed = t0.elapsed().as_secs_f64();
            info!("Time required to process one record .. {elapsed:.6} seconds");
            seconds_per_record = Some(elapsed);
            if spec.dry_run {
                break;
            }
        }
    }
    pb.finish_and_clear();
    info!(
        "compared {} sites ({} records without a partner skipped)",
        counts.n_sites(),
        sites.n_skipped()
    );

    let report_path = spec.report_path();
    let mut reporter = Reporter::create(&report_path)?;
    let cwd = std::env::current_dir().unwrap_or_default();
    reporter.write_provenance(command_line, &cwd)?;

    if spec.dry_run {
        if let Some(seconds) = seconds_per_record {
            reporter.write_info(seconds)?;
        }
        reporter.finish()?;
        return Ok(());
    }

    reporter.write_discordance(&counts, &query_names, &reference_names, spec.n_matches)?;
    if let Some(selector) = selector {
        reporter.write_distinctive_header()?;
        selector.drain(|site| reporter.write_distinctive_site(site))?;
    }
    reporter.finish()?;
    info!("Wrote report to {}", report_path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["gtcheck", "query.vcf"];
        argv.extend_from_slice(extra);
        Args::try_parse_from(argv).expect("arguments should parse")
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolve_sample_pairs_succeeds() {
        let query = names(&["A", "B", "C"]);
        let reference = names(&["X", "Y"]);
        let qi = SampleIndex::new(&query, Path::new("q.vcf"));
        let ri = SampleIndex::new(&reference, Path::new("g.vcf"));
        let pairs = vec![
            ("C".to_string(), "X".to_string()),
            ("A".to_string(), "Y".to_string()),
            ("C".to_string(), "X".to_string()),
        ];
        let resolved = resolve_sample_pairs(&qi, &ri, &pairs).expect("pairs should resolve");
        assert_eq!(resolved, vec![(2, 0), (0, 1), (2, 0)]);
    }

    #[test]
    fn resolve_sample_pairs_rejects_unknown_sample() {
        let query = names(&["A", "B"]);
        let qi = SampleIndex::new(&query, Path::new("q.vcf"));
        let pairs = vec![("A".to_string(), "Z".to_string())];
        let err = resolve_sample_pairs(&qi, &qi, &pairs).unwrap_err();
        match err {
            CustomError::UnknownSample { sample, path } => {
                assert_eq!(sample, "Z");
                assert_eq!(path, PathBuf::from("q.vcf"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn pair_list_needs_even_count() {
        assert_eq!(
            parse_pair_list("A,B,C,D").unwrap(),
            vec![
                ("A".to_string(), "B".to_string()),
                ("C".to_string(), "D".to_string())
            ]
        );
        assert!(matches!(
            parse_pair_list("A,B,C"),
            Err(CustomError::PairsOdd { n_samples: 3 })
        ));
        assert!(matches!(parse_pair_list(""), Err(CustomError::PairsEmpty)));
    }

    #[test]
    fn pairs_file_accepts_tabs_and_spaces() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# query\tgenotyped\nA\tX\n\nB   Y\n  C\tZ  ").unwrap();
        let pairs = load_pairs_file(file.path()).unwrap();
        assert_eq!(
            pairs,
            vec![
                ("A".to_string(), "X".to_string()),
                ("B".to_string(), "Y".to_string()),
                ("C".to_string(), "Z".to_string()),
            ]
        );
    }

    #[test]
    fn pairs_file_rejects_single_name() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "A\tX\nlonely").unwrap();
        let err = load_pairs_file(file.path()).unwrap_err();
        match err {
            CustomError::PairsFileLine { line_num, .. } => assert_eq!(line_num, 2),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn use_tags() {
        assert_eq!(parse_use("gt").unwrap(), (EvidenceKind::Called, None));
        assert_eq!(
            parse_use("PL,GT").unwrap(),
            (EvidenceKind::Likelihood, Some(EvidenceKind::Called))
        );
        assert!(matches!(parse_use("GT,PL,GT"), Err(CustomError::UseTag { .. })));
        assert!(matches!(parse_use("DP"), Err(CustomError::UseTag { .. })));
    }

    #[test]
    fn conflicting_options_are_rejected() {
        let err = build_input_spec(&args(&["-p", "A,B", "-s", "qry:A"])).unwrap_err();
        assert!(matches!(
            err,
            CustomError::ConflictingOptions {
                first: "-p/-P",
                second: "-s/-S"
            }
        ));
        let err = build_input_spec(&args(&["-p", "A,B", "--n-matches", "2"])).unwrap_err();
        assert!(matches!(
            err,
            CustomError::ConflictingOptions {
                first: "--n-matches",
                ..
            }
        ));
        let err = build_input_spec(&args(&["--homs-only"])).unwrap_err();
        assert!(matches!(err, CustomError::HomsOnlyWithoutGenotypes));
        let err = build_input_spec(&args(&["-s", "A,B"])).unwrap_err();
        assert!(matches!(err, CustomError::SampleSelector { .. }));
        let err = build_input_spec(&args(&["--max-mem", "lots"])).unwrap_err();
        assert!(matches!(err, CustomError::MaxMem { .. }));
        let err = build_input_spec(&args(&["--distinctive-sites", "0"])).unwrap_err();
        assert!(matches!(err, CustomError::DistinctiveSitesLow { .. }));
        let err = build_input_spec(&args(&["-t", "1", "-T", "targets.txt"])).unwrap_err();
        assert!(matches!(
            err,
            CustomError::ConflictingOptions {
                first: "-t",
                second: "-T"
            }
        ));
        let err = build_input_spec(&args(&["-t", "1:9-2"])).unwrap_err();
        assert!(matches!(err, CustomError::TargetsInvalid { .. }));
    }

    #[test]
    fn tags_per_file() {
        let spec = build_input_spec(&args(&["-u", "PL"])).unwrap();
        assert_eq!(spec.query_tag, Some(EvidenceKind::Likelihood));
        assert_eq!(spec.genotypes_tag, Some(EvidenceKind::Likelihood));
        let spec = build_input_spec(&args(&["-u", "PL,GT"])).unwrap();
        assert_eq!(spec.query_tag, Some(EvidenceKind::Likelihood));
        assert_eq!(spec.genotypes_tag, Some(EvidenceKind::Called));
        let spec = build_input_spec(&args(&[])).unwrap();
        assert_eq!((spec.query_tag, spec.genotypes_tag), (None, None));
    }

    #[test]
    fn targets_are_parsed_up_front() {
        let spec = build_input_spec(&args(&["-t", "1:10-20,2"])).unwrap();
        let targets = spec.targets.expect("targets should be set");
        assert!(targets.contains("1", 15));
        assert!(!targets.contains("1", 21));
        assert!(targets.contains("2", 1));
    }

    #[test]
    fn defaults_and_selectors() {
        let spec = build_input_spec(&args(&[
            "-s",
            "qry:A,B",
            "-s",
            "gt:C",
            "--n-matches",
            "-3",
            "--no-hwe-prob",
            "-u",
            "GT",
        ]))
        .unwrap();
        assert_eq!(spec.query_samples, Some(names(&["A", "B"])));
        assert_eq!(spec.genotype_samples, Some(names(&["C"])));
        assert_eq!(spec.n_matches, -3);
        assert!(!spec.calc_hwe);
        assert_eq!(spec.query_tag, Some(EvidenceKind::Called));
        assert_eq!(spec.genotypes_tag, Some(EvidenceKind::Called));
        assert!(spec.targets.is_none());
        assert_eq!(spec.max_mem, 500 << 20);
        assert_eq!(spec.report_path().file_name().unwrap(), REPORT_FILE);
    }
}
