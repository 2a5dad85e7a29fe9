//! Loading of candidate call and family tables.

use std::{collections::HashMap, path::Path, time::Instant};

use indexmap::IndexMap;
use thousands::Separable;

use super::schema::CandidateCall;
use crate::{
    common::{canonicalize_chrom, io::open_read_maybe_gz},
    err::DenovoError,
};

/// Person to family mapping.
pub type Families = HashMap<String, String>;

/// Candidate table with the parsed calls next to the raw records.
///
/// The raw records are kept so that all input columns can be written back.
#[derive(Debug, Clone, Default)]
pub struct CandidateTable {
    pub header: csv::StringRecord,
    /// Column index by name, in header order.
    pub columns: IndexMap<String, usize>,
    pub records: Vec<csv::StringRecord>,
    pub calls: Vec<CandidateCall>,
}

impl CandidateTable {
    /// Index of the column `name` or one of its aliases.
    fn column(&self, name: &str, aliases: &[&str]) -> Option<usize> {
        std::iter::once(&name)
            .chain(aliases.iter())
            .find_map(|name| self.columns.get(*name).copied())
    }

    fn required(&self, name: &str, aliases: &[&str]) -> Result<usize, DenovoError> {
        self.column(name, aliases)
            .ok_or_else(|| DenovoError::MissingColumn {
                column: name.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.calls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

fn parse_value<T>(value: &str, row: usize, column: &str) -> Result<T, DenovoError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    value.trim().parse::<T>().map_err(|e| {
        DenovoError::InvalidValue {
            value: value.to_string(),
            message: e.to_string(),
        }
        .in_row(row, column)
    })
}

/// Parse a tab-separated candidate table with a header line.
///
/// Family identifiers come from the `family_id` column if present and
/// otherwise from `families`.  Persons without a family are their own
/// family.
pub fn parse_candidates<R: std::io::Read>(
    reader: R,
    families: Option<&Families>,
) -> Result<CandidateTable, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .quoting(false)
        .from_reader(reader);

    let mut table = CandidateTable {
        header: reader.headers()?.clone(),
        ..Default::default()
    };
    table.columns = table
        .header
        .iter()
        .enumerate()
        .map(|(idx, name)| (name.trim().to_string(), idx))
        .collect();

    let person_id = table.required("person_id", &["person_stable_id"])?;
    let chrom = table.required("chrom", &[])?;
    let pos = table.required("pos", &[])?;
    let reference = table.required("ref", &[])?;
    let alternative = table.required("alt", &[])?;
    let symbol = table.required("symbol", &[])?;
    let consequence = table.required("consequence", &[])?;
    let dp4_child = table.required("dp4_child", &[])?;
    let dp4_mother = table.required("dp4_mother", &[])?;
    let dp4_father = table.required("dp4_father", &[])?;
    let family_id = table.column("family_id", &[]);
    if family_id.is_none() && families.is_none() {
        return Err(DenovoError::MissingColumn {
            column: String::from("family_id"),
        }
        .into());
    }
    let max_af = table.column("max_af", &[]);
    let in_vcf_columns = [
        table.column("in_child_vcf", &[]),
        table.column("in_mother_vcf", &[]),
        table.column("in_father_vcf", &[]),
    ];

    let mut without_family = 0usize;
    for (idx, record) in reader.records().enumerate() {
        let record = record?;
        let row = idx + 1;
        let field = |col: usize| record.get(col).unwrap_or_default();

        let person = field(person_id).to_string();
        let family = match family_id.map(field).filter(|value| !value.is_empty()) {
            Some(family) => family.to_string(),
            None => match families.and_then(|families| families.get(&person)) {
                Some(family) => family.clone(),
                None => {
                    without_family += 1;
                    person.clone()
                }
            },
        };
        let in_vcf = in_vcf_columns
            .iter()
            .zip(["in_child_vcf", "in_mother_vcf", "in_father_vcf"])
            .map(|(col, name)| {
                col.map(|col| parse_value::<u8>(field(col), row, name))
                    .transpose()
            })
            .collect::<Result<Vec<_>, _>>()?;

        table.calls.push(CandidateCall {
            person_id: person,
            family_id: family,
            chrom: canonicalize_chrom(field(chrom)),
            pos: parse_value(field(pos), row, "pos")?,
            reference: field(reference).to_string(),
            alternative: field(alternative).to_string(),
            symbol: field(symbol).to_string(),
            consequence: field(consequence).to_string(),
            dp4_child: field(dp4_child).to_string(),
            dp4_mother: field(dp4_mother).to_string(),
            dp4_father: field(dp4_father).to_string(),
            max_af: max_af.map(|col| field(col).to_string()),
            in_child_vcf: in_vcf[0],
            in_mother_vcf: in_vcf[1],
            in_father_vcf: in_vcf[2],
        });
        table.records.push(record);
    }

    if without_family > 0 {
        tracing::warn!(
            "{} candidates without family, using person as family",
            without_family.separate_with_commas()
        );
    }

    Ok(table)
}

/// Load candidates from a (possibly gzip-compressed) TSV file.
pub fn load_candidates(
    path: &Path,
    families: Option<&Families>,
) -> Result<CandidateTable, anyhow::Error> {
    tracing::info!("loading candidates from {:?}...", path);
    let before_loading = Instant::now();
    let table = parse_candidates(open_read_maybe_gz(path)?, families)
        .map_err(|e| anyhow::anyhow!("could not load candidates from {:?}: {}", path, e))?;
    tracing::info!(
        "... done loading {} candidates in {:?}",
        table.len().separate_with_commas(),
        before_loading.elapsed()
    );
    Ok(table)
}

/// One row of the families table; other columns are ignored.
#[derive(Debug, Clone, serde::Deserialize)]
struct FamilyEntry {
    individual_id: String,
    family_id: String,
}

/// Parse a tab-separated families table with `individual_id` and `family_id`.
pub fn parse_families<R: std::io::Read>(reader: R) -> Result<Families, anyhow::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(true)
        .from_reader(reader);
    let mut result = Families::new();
    for entry in reader.deserialize() {
        let entry: FamilyEntry = entry?;
        result.insert(entry.individual_id, entry.family_id);
    }
    Ok(result)
}

/// Load the families table from a (possibly gzip-compressed) file.
pub fn load_families(path: &Path) -> Result<Families, anyhow::Error> {
    tracing::debug!("loading families from {:?}", path);
    parse_families(open_read_maybe_gz(path)?)
        .map_err(|e| anyhow::anyhow!("could not load families from {:?}: {}", path, e))
}
