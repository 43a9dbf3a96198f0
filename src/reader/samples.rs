use std::collections::HashMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::error::{CustomError, Result};

/// Which input file a `-s`/`-S` selector applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Side {
    Query,
    Genotypes,
}

/// Splits `qry:LIST` or `gt:LIST` into its side and the remaining list.
pub fn parse_selector(arg: &str) -> Result<(Side, &str)> {
    if let Some(rest) = arg.strip_prefix("qry:") {
        Ok((Side::Query, rest))
    } else if let Some(rest) = arg.strip_prefix("gt:") {
        Ok((Side::Genotypes, rest))
    } else {
        Err(CustomError::SampleSelector {
            arg: arg.to_string(),
        })
    }
}

/// Sample names from a comma-delimited list, or one name per line of a file.
pub fn read_list(list: &str, is_file: bool) -> Result<Vec<String>> {
    let names: Vec<String> = if is_file {
        let path = PathBuf::from(list);
        let f = File::open(&path).map_err(|e| CustomError::ReadWithPath {
            source: e,
            path: path.clone(),
        })?;
        let mut names = Vec::new();
        for line in BufReader::new(f).lines() {
            let line = line.map_err(|e| CustomError::ReadWithPath {
                source: e,
                path: path.clone(),
            })?;
            let name = line.trim();
            if !name.is_empty() && !name.starts_with('#') {
                names.push(name.to_string());
            }
        }
        names
    } else {
        list.split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect()
    };
    if names.is_empty() {
        return Err(CustomError::SamplesEmpty {
            arg: list.to_string(),
        });
    }
    Ok(names)
}

/// Name to column index lookup for the samples of one input file.
pub struct SampleIndex<'a> {
    path: &'a Path,
    lookup: HashMap<&'a str, usize>,
}

impl<'a> SampleIndex<'a> {
    pub fn new(samples: &'a [String], path: &'a Path) -> Self {
        let mut lookup = HashMap::with_capacity(samples.len());
        for (idx, sample) in samples.iter().enumerate() {
            // First occurrence wins on duplicated header names
            lookup.entry(sample.as_str()).or_insert(idx);
        }
        Self { path, lookup }
    }

    pub fn get(&self, name: &str) -> Result<usize> {
        self.lookup
            .get(name)
            .copied()
            .ok_or_else(|| CustomError::UnknownSample {
                sample: name.to_string(),
                path: self.path.to_path_buf(),
            })
    }

    /// Indices of `names`, sorted ascending with duplicates removed.
    pub fn resolve(&self, names: &[String]) -> Result<Vec<usize>> {
        let mut indices = names
            .iter()
            .map(|name| self.get(name))
            .collect::<Result<Vec<_>>>()?;
        indices.sort_unstable();
        indices.dedup();
        Ok(indices)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn samples() -> Vec<String> {
        ["A", "B", "C", "D"].iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn resolves_sorted_unique_indices() {
        let samples = samples();
        let index = SampleIndex::new(&samples, Path::new("in.vcf"));
        let names: Vec<String> = ["D", "A", "D", "C"].iter().map(|s| s.to_string()).collect();
        assert_eq!(index.resolve(&names).unwrap(), vec![0, 2, 3]);
    }

    #[test]
    fn errors_on_missing_sample() {
        let samples = samples();
        let index = SampleIndex::new(&samples, Path::new("in.vcf"));
        let err = index.resolve(&["A".to_string(), "Z".to_string()]).unwrap_err();
        match err {
            CustomError::UnknownSample { sample, path } => {
                assert_eq!(sample, "Z");
                assert_eq!(path, PathBuf::from("in.vcf"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn selectors_need_a_side() {
        assert_eq!(parse_selector("qry:A,B").unwrap(), (Side::Query, "A,B"));
        assert_eq!(parse_selector("gt:list.txt").unwrap(), (Side::Genotypes, "list.txt"));
        assert!(matches!(
            parse_selector("A,B"),
            Err(CustomError::SampleSelector { .. })
        ));
    }

    #[test]
    fn reads_lists_and_files() {
        assert_eq!(read_list("A, B,,C", false).unwrap(), vec!["A", "B", "C"]);
        assert!(matches!(read_list(",", false), Err(CustomError::SamplesEmpty { .. })));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "S1\n\n# comment\n  S2  ").unwrap();
        let path = file.path().to_str().unwrap();
        assert_eq!(read_list(path, true).unwrap(), vec!["S1", "S2"]);
    }
}
