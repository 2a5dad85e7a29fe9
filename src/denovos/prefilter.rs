//! Preliminary eligibility screen of candidate calls.

use std::collections::HashSet;

use indexmap::IndexMap;

use super::{
    schema::{CandidateCall, Consequence},
    segdups::SegdupIndex,
};

/// Clean a raw maximal population allele frequency.
///
/// Multiple comma-separated values count as common, missing values as
/// absent from the population.  Returns `None` for unparseable values.
pub fn fix_max_af(value: Option<&str>) -> Option<f64> {
    match value.map(str::trim) {
        None | Some("") | Some(".") | Some("missing") => Some(0.0),
        Some(value) if value.contains(',') => Some(1.0),
        Some(value) => value.parse::<f64>().ok().filter(|af| !af.is_nan()),
    }
}

/// Whether the consequence term hits coding sequence or a splice site.
///
/// Unknown terms are not coding.
pub fn is_coding(consequence: &str) -> bool {
    Consequence::parse(consequence)
        .map(|csq| csq.is_coding_or_splicing())
        .unwrap_or(false)
}

/// Reason for a call being ineligible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum Exclusion {
    /// Too common or unparseable population frequency.
    MaxAf,
    /// Not called in the child only.
    VcfPresence,
    /// The person failed sample QC.
    SampleFail,
    /// Neither coding nor splicing.
    NonCoding,
    /// Located in a segmental duplication.
    Segdup,
}

/// Settings of the eligibility screen.
#[derive(Debug, Clone, Copy)]
pub struct EligibilityScreen<'a> {
    pub maf_cutoff: f64,
    pub sample_fails: &'a HashSet<String>,
    pub segdups: Option<&'a SegdupIndex>,
}

impl<'a> EligibilityScreen<'a> {
    /// First reason that excludes `call`, if any.
    pub fn check(&self, call: &CandidateCall) -> Result<(), Exclusion> {
        let max_af_ok = fix_max_af(call.max_af.as_deref())
            .map(|af| af <= self.maf_cutoff)
            .unwrap_or(false);
        if !max_af_ok {
            return Err(Exclusion::MaxAf);
        }
        let child_only = call.in_child_vcf.unwrap_or(1) == 1
            && call.in_mother_vcf.unwrap_or(0) == 0
            && call.in_father_vcf.unwrap_or(0) == 0;
        if !child_only {
            return Err(Exclusion::VcfPresence);
        }
        if self.sample_fails.contains(&call.person_id) {
            return Err(Exclusion::SampleFail);
        }
        if !is_coding(&call.consequence) {
            return Err(Exclusion::NonCoding);
        }
        if let Some(segdups) = self.segdups {
            if segdups.is_in_segdup(&call.chrom, call.pos) {
                return Err(Exclusion::Segdup);
            }
        }
        Ok(())
    }

    /// Eligibility of each call; no rows are removed.
    pub fn mask(&self, calls: &[CandidateCall]) -> Vec<bool> {
        let mut excluded: IndexMap<Exclusion, usize> = IndexMap::new();
        let result = calls
            .iter()
            .map(|call| match self.check(call) {
                Ok(()) => true,
                Err(reason) => {
                    *excluded.entry(reason).or_default() += 1;
                    false
                }
            })
            .collect::<Vec<_>>();

        for (reason, count) in &excluded {
            tracing::debug!("excluded {} calls for reason {}", count, reason);
        }
        result
    }
}
