//! Extraction and aggregation of stranded allele counts.

use crate::err::DenovoError;

use super::schema::{CandidateCall, Dp4, TrioCounts, TrioMember};

/// Which trio members contribute to the strand bias contingency table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    clap::ValueEnum,
    serde::Serialize,
    serde::Deserialize,
    strum::Display,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum StrandBiasMembers {
    /// Child, mother, and father.
    #[default]
    All,
    /// The child only, parental reads are excluded.
    Child,
}

impl StrandBiasMembers {
    fn includes(&self, member: TrioMember) -> bool {
        match self {
            StrandBiasMembers::All => true,
            StrandBiasMembers::Child => member == TrioMember::Child,
        }
    }
}

/// Split a `ref_F,ref_R,alt_F,alt_R` encoding into its four counts.
pub fn parse_depth_field(encoding: &str) -> Result<Dp4, DenovoError> {
    let malformed = || DenovoError::MalformedDepthField {
        value: encoding.to_string(),
    };

    let values = encoding
        .split(',')
        .map(|token| token.trim().parse::<u32>().map_err(|_| malformed()))
        .collect::<Result<Vec<_>, _>>()?;
    match values.as_slice() {
        [ref_fwd, ref_rev, alt_fwd, alt_rev] => {
            Ok(Dp4::new(*ref_fwd, *ref_rev, *alt_fwd, *alt_rev))
        }
        _ => Err(malformed()),
    }
}

/// Parse the depth encodings of all three trio members of `call`.
pub fn extract_counts(call: &CandidateCall) -> Result<TrioCounts, DenovoError> {
    Ok(TrioCounts {
        child: parse_depth_field(call.dp4(TrioMember::Child))?,
        mother: parse_depth_field(call.dp4(TrioMember::Mother))?,
        father: parse_depth_field(call.dp4(TrioMember::Father))?,
    })
}

/// Extract counts for all calls, failing on the first malformed row.
pub fn extract_all(calls: &[CandidateCall]) -> Result<Vec<TrioCounts>, DenovoError> {
    calls
        .iter()
        .enumerate()
        .map(|(idx, call)| {
            let parse = |member: TrioMember| {
                parse_depth_field(call.dp4(member))
                    .map_err(|e| e.in_row(idx + 1, member.dp4_column()))
            };
            Ok(TrioCounts {
                child: parse(TrioMember::Child)?,
                mother: parse(TrioMember::Mother)?,
                father: parse(TrioMember::Father)?,
            })
        })
        .collect()
}

/// Summed counts for all rows sharing one site key.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct SiteCounts {
    pub ref_fwd: u64,
    pub ref_rev: u64,
    pub alt_fwd: u64,
    pub alt_rev: u64,
    /// Parental alternate reads (mother and father only).
    pub parent_alt: u64,
    /// Parental reference reads (mother and father only).
    pub parent_ref: u64,
}

/// Summed parental counts for all rows sharing one gene symbol.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize)]
pub struct GeneCounts {
    pub parent_alt: u64,
    pub parent_ref: u64,
}

/// Sum the stranded counts of the rows at one site.
pub fn aggregate_site<'a, I>(rows: I, members: StrandBiasMembers) -> SiteCounts
where
    I: IntoIterator<Item = &'a TrioCounts>,
{
    let mut result = SiteCounts::default();
    for row in rows {
        for member in [TrioMember::Child, TrioMember::Mother, TrioMember::Father] {
            let dp4 = row.member(member);
            if members.includes(member) {
                result.ref_fwd += dp4.ref_fwd as u64;
                result.ref_rev += dp4.ref_rev as u64;
                result.alt_fwd += dp4.alt_fwd as u64;
                result.alt_rev += dp4.alt_rev as u64;
            }
            if member != TrioMember::Child {
                result.parent_alt += dp4.alt();
                result.parent_ref += dp4.reference();
            }
        }
    }
    result
}

/// Sum the parental counts of the rows in one gene.
pub fn aggregate_gene<'a, I>(rows: I) -> GeneCounts
where
    I: IntoIterator<Item = &'a TrioCounts>,
{
    rows.into_iter().fold(GeneCounts::default(), |acc, row| GeneCounts {
        parent_alt: acc.parent_alt + row.mother.alt() + row.father.alt(),
        parent_ref: acc.parent_ref + row.mother.reference() + row.father.reference(),
    })
}

/// Depth, alternate depth, and alternate proportion of one trio member.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct MemberDepths {
    pub depth: u64,
    pub alts: u64,
    /// `alts / depth`, `NaN` for zero depth.
    pub proportion: f64,
}

impl From<&Dp4> for MemberDepths {
    fn from(dp4: &Dp4) -> Self {
        let depth = dp4.depth();
        let alts = dp4.alt();
        let proportion = if depth == 0 {
            f64::NAN
        } else {
            alts as f64 / depth as f64
        };
        Self {
            depth,
            alts,
            proportion,
        }
    }
}

/// Depths and proportions for a trio at one site.
#[derive(Debug, Clone, Copy, Default, PartialEq, serde::Serialize)]
pub struct TrioDepths {
    pub child: MemberDepths,
    pub mother: MemberDepths,
    pub father: MemberDepths,
}

impl TrioDepths {
    pub fn min_parent_depth(&self) -> u64 {
        self.mother.depth.min(self.father.depth)
    }

    /// Larger of the parental alternate proportions, ignoring `NaN` unless
    /// both are `NaN`.
    pub fn max_parent_proportion(&self) -> f64 {
        self.mother.proportion.max(self.father.proportion)
    }
}

pub fn depths_and_proportions(counts: &TrioCounts) -> TrioDepths {
    TrioDepths {
        child: (&counts.child).into(),
        mother: (&counts.mother).into(),
        father: (&counts.father).into(),
    }
}
