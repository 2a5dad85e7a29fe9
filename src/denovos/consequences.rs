//! Normalisation of consequence and gene symbol annotations.

use std::{
    collections::{HashMap, HashSet},
    path::Path,
};

use itertools::Itertools;

use super::schema::{CandidateCall, Consequence, VarClass};
use crate::{
    common::{canonicalize_chrom, io::open_read_maybe_gz},
    err::DenovoError,
};

/// Placeholder for a missing gene symbol.
const MISSING_SYMBOL: &str = ".";

fn first_entry(value: &str) -> &str {
    value.split(',').next().unwrap_or(value)
}

/// Symbol among those annotated with the chosen consequence.
///
/// Missing symbols (`-` or absent) become `.`, which loses against any real
/// symbol; remaining ties go to the lexicographically smallest.
fn pick_symbol(symbols: &[&str], terms: &[Consequence], chosen: Consequence) -> String {
    let allowed = terms
        .iter()
        .positions(|csq| *csq == chosen)
        .map(|idx| match symbols.get(idx) {
            Some(&"-") | None => MISSING_SYMBOL,
            Some(symbol) => *symbol,
        })
        .sorted()
        .dedup()
        .collect::<Vec<_>>();

    allowed
        .iter()
        .find(|symbol| **symbol != MISSING_SYMBOL)
        .or_else(|| allowed.first())
        .map(|symbol| symbol.to_string())
        .unwrap_or_else(|| MISSING_SYMBOL.to_string())
}

/// Reduce the consequence and symbol of `call` to single values.
///
/// Comma-separated duplicates collapse to their first entry.  For
/// `|`-separated per-transcript annotations the most severe consequence is
/// chosen together with the symbol of the matching transcript.
pub fn tidy(call: &mut CandidateCall) -> Result<(), DenovoError> {
    let consequence = first_entry(&call.consequence).to_string();
    let symbol = first_entry(&call.symbol).to_string();

    if !consequence.contains('|') {
        call.consequence = consequence;
        call.symbol = symbol;
        return Ok(());
    }

    let terms = consequence
        .split('|')
        .map(|term| match term {
            "-" => Ok(Consequence::IntergenicVariant),
            term => Consequence::parse(term),
        })
        .collect::<Result<Vec<_>, _>>()?;
    // the split yields at least one term
    let chosen = terms
        .iter()
        .min()
        .copied()
        .unwrap_or(Consequence::IntergenicVariant);
    let symbols = symbol.split('|').collect::<Vec<_>>();

    call.symbol = pick_symbol(&symbols, &terms, chosen);
    call.consequence = chosen.to_string();
    Ok(())
}

/// Tidy all calls, reporting the row of the first failure.
pub fn tidy_all(calls: &mut [CandidateCall]) -> Result<(), DenovoError> {
    for (idx, call) in calls.iter_mut().enumerate() {
        tidy(call).map_err(|e| e.in_row(idx + 1, "consequence"))?;
    }
    Ok(())
}

/// Either a JSON number or a JSON string.
#[derive(Debug, Clone, serde::Deserialize)]
#[serde(untagged)]
enum Scalar {
    Int(i64),
    Str(String),
}

impl std::fmt::Display for Scalar {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Scalar::Int(value) => write!(f, "{}", value),
            Scalar::Str(value) => write!(f, "{}", value),
        }
    }
}

/// Conserved sites at the last base of exons, by chromosome.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LastBaseSites {
    pub sites: HashMap<String, HashSet<i32>>,
}

impl LastBaseSites {
    pub fn contains(&self, chrom: &str, pos: i32) -> bool {
        self.sites
            .get(&canonicalize_chrom(chrom))
            .map(|positions| positions.contains(&pos))
            .unwrap_or(false)
    }

    /// Parse a JSON list of `[chrom, pos]` pairs.
    pub fn from_json(json: &str) -> Result<Self, anyhow::Error> {
        let pairs: Vec<(Scalar, Scalar)> = serde_json::from_str(json)
            .map_err(|e| anyhow::anyhow!("invalid last base sites JSON: {}", e))?;

        let mut result = Self::default();
        for (chrom, pos) in pairs {
            let pos = pos
                .to_string()
                .parse::<i32>()
                .map_err(|e| anyhow::anyhow!("invalid last base position {:?}: {}", pos, e))?;
            result
                .sites
                .entry(canonicalize_chrom(&chrom.to_string()))
                .or_default()
                .insert(pos);
        }
        Ok(result)
    }
}

/// Load conserved last base sites from a (possibly gzip-compressed) JSON file.
pub fn load_last_base_sites(path: &Path) -> Result<LastBaseSites, anyhow::Error> {
    let json = std::io::read_to_string(open_read_maybe_gz(path)?)?;
    LastBaseSites::from_json(&json)
        .map_err(|e| anyhow::anyhow!("could not load {:?}: {}", path, e))
}

/// Annotate single nucleotide calls at conserved last bases of exons.
///
/// Returns the number of changed calls.
pub fn reannotate_last_base(calls: &mut [CandidateCall], sites: &LastBaseSites) -> usize {
    let mut changed = 0;
    for call in calls
        .iter_mut()
        .filter(|call| call.var_class() == VarClass::Snv && sites.contains(&call.chrom, call.pos))
    {
        call.consequence = Consequence::ConservedExonTerminusVariant.to_string();
        changed += 1;
    }
    changed
}
