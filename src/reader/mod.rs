pub mod samples;
pub mod synced;
pub mod targets;
pub mod vcf;

use std::path::Path;

use crate::error::Result;
use crate::model::Record;

/// A stream of records from one input file, each carrying one evidence column.
pub trait SiteReader: Iterator<Item = Result<Record>> {
    fn path(&self) -> &Path;
    fn samples(&self) -> &[String];
    /// Contig names in header order.
    fn contigs(&self) -> &[String];
}
