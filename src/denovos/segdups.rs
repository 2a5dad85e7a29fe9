//! Overlap with segmental duplication regions.

use std::{path::Path, time::Instant};

use bio::data_structures::interval_tree::ArrayBackedIntervalTree;
use indexmap::IndexMap;
use thousands::Separable;

use crate::{
    common::{canonicalize_chrom, io::open_read_maybe_gz, trace_rss_now},
    err::DenovoError,
};

/// Alias for the interval tree that we use.
type IntervalTree = ArrayBackedIntervalTree<i32, u32>;

/// A segmental duplication region with half-open coordinates `[start, end)`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize, derive_new::new)]
pub struct SegdupRegion {
    pub chrom: String,
    pub start: i32,
    pub end: i32,
}

impl SegdupRegion {
    /// Build from source coordinates whose end is inclusive, `None` if the
    /// exclusive end is not representable.
    pub fn from_inclusive(chrom: &str, start: i32, end: i32) -> Option<Self> {
        let end = end.checked_add(1)?;
        Some(Self::new(canonicalize_chrom(chrom), start, end))
    }
}

/// Segmental duplication regions, indexed by chromosome.
#[derive(Debug, Default)]
pub struct SegdupIndex {
    /// Regions, stored by chromosome.
    pub records: IndexMap<String, Vec<SegdupRegion>>,
    /// Interval trees, stored by chromosome.
    pub trees: IndexMap<String, IntervalTree>,
}

impl SegdupIndex {
    /// Build the index from half-open regions.
    pub fn build<I>(regions: I) -> Result<Self, DenovoError>
    where
        I: IntoIterator<Item = SegdupRegion>,
    {
        let mut result = Self::default();
        for (idx, region) in regions.into_iter().enumerate() {
            if region.start >= region.end {
                return Err(DenovoError::InvalidSegdupRecord {
                    line: idx + 1,
                    message: format!("empty interval [{}, {})", region.start, region.end),
                });
            }
            let chrom = canonicalize_chrom(&region.chrom);
            let records = result.records.entry(chrom.clone()).or_default();
            result
                .trees
                .entry(chrom)
                .or_insert_with(IntervalTree::new)
                .insert(region.start..region.end, records.len() as u32);
            records.push(region);
        }

        result.trees.values_mut().for_each(|tree| tree.index());
        Ok(result)
    }

    /// Regions that contain the 1-based position `pos`.
    pub fn overlapping(&self, chrom: &str, pos: i32) -> Vec<&SegdupRegion> {
        let chrom = canonicalize_chrom(chrom);
        // no half-open region can contain the largest position
        let Some(next) = pos.checked_add(1) else {
            return Vec::new();
        };
        match (self.trees.get(&chrom), self.records.get(&chrom)) {
            (Some(tree), Some(records)) => tree
                .find(pos..next)
                .iter()
                .map(|entry| &records[*entry.data() as usize])
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Whether `pos` falls into any region on `chrom`.
    pub fn is_in_segdup(&self, chrom: &str, pos: i32) -> bool {
        !self.overlapping(chrom, pos).is_empty()
    }

    pub fn len(&self) -> usize {
        self.records.values().map(|records| records.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parse tab-separated `chrom`, `start`, `end` rows with inclusive ends.
///
/// Lines starting with `#` are skipped, additional columns are ignored.
pub fn parse_segdups<R: std::io::Read>(reader: R) -> Result<SegdupIndex, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .delimiter(b'\t')
        .comment(Some(b'#'))
        .flexible(true)
        .from_reader(reader);

    let mut regions = Vec::new();
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let line = record.position().map(|p| p.line() as usize).unwrap_or(idx + 1);
        let invalid = |message: String| DenovoError::InvalidSegdupRecord { line, message };

        let field = |i: usize, name: &str| {
            record
                .get(i)
                .ok_or_else(|| invalid(format!("missing {} column", name)))
        };
        let chrom = field(0, "chrom")?;
        let start = match field(1, "start")?.trim().parse::<i32>() {
            Ok(start) => start,
            Err(_) if idx == 0 => {
                tracing::trace!("skipping header {:?}", &record);
                continue;
            }
            Err(e) => return Err(invalid(format!("invalid start: {}", e)).into()),
        };
        let end = field(2, "end")?
            .trim()
            .parse::<i32>()
            .map_err(|e| invalid(format!("invalid end: {}", e)))?;
        if end < start {
            return Err(invalid(format!("end {} before start {}", end, start)).into());
        }

        let region = SegdupRegion::from_inclusive(chrom, start, end)
            .ok_or_else(|| invalid(format!("end {} out of range", end)))?;
        regions.push(region);
    }

    Ok(SegdupIndex::build(regions)?)
}

/// Load segmental duplications from a (possibly gzip-compressed) BED-like file.
#[tracing::instrument]
pub fn load_segdups(path: &Path) -> Result<SegdupIndex, anyhow::Error> {
    tracing::debug!("loading segdup regions from {:?}", path);

    let before_loading = Instant::now();
    let result = parse_segdups(open_read_maybe_gz(path)?)
        .map_err(|e| anyhow::anyhow!("error reading segdups from {:?}: {}", path, e))?;
    tracing::debug!(
        "done loading {} segdup regions on {} chromosomes from {:?} in {:?}",
        result.len().separate_with_commas(),
        result.trees.len(),
        path,
        before_loading.elapsed()
    );

    trace_rss_now();

    Ok(result)
}
