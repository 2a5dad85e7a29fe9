//! Pass/fail decisions for candidate calls.

use itertools::Itertools;
use thousands::Separable;

use super::{
    allele_counts::depths_and_proportions,
    deviations::DeviationTester,
    schema::{CandidateCall, TrioCounts, VarClass},
};

/// Statistical signals of one call that feed into the decision.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CallSignals {
    pub var_class: VarClass,
    pub strand_bias_p: f64,
    pub site_parental_p: f64,
    pub gene_parental_p: f64,
    pub min_parent_alt: u64,
    /// Whether the call's gene has more than one candidate.
    pub gene_recurrent: bool,
}

/// The three failure criteria of the "2-of-3" rule.
///
/// A `NaN` p-value never satisfies a criterion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Criteria {
    /// Both parents show alternate reads.
    pub alts: bool,
    /// Excess parental alternate reads at the site.
    pub site: bool,
    /// Excess parental alternate reads in the gene, with more than one candidate.
    pub gene: bool,
}

impl Criteria {
    pub fn count(&self) -> usize {
        [self.alts, self.site, self.gene]
            .into_iter()
            .filter(|c| *c)
            .count()
    }
}

/// Per-call outcome of the caller-confirmed site filter.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize)]
pub struct FilterResult {
    pub strand_bias_p: f64,
    pub site_parental_p: f64,
    pub gene_parental_p: f64,
    pub min_parent_alt: u64,
    pub overall_pass: bool,
}

/// Decides on caller-confirmed sites.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FilterEngine {
    pub p_cutoff: f64,
}

impl FilterEngine {
    pub fn new(p_cutoff: f64) -> Self {
        Self { p_cutoff }
    }

    fn significant(&self, p: f64) -> bool {
        // comparisons with NaN are false
        p < self.p_cutoff
    }

    pub fn criteria(&self, signals: &CallSignals) -> Criteria {
        Criteria {
            alts: signals.min_parent_alt > 0,
            site: self.significant(signals.site_parental_p),
            gene: self.significant(signals.gene_parental_p) && signals.gene_recurrent,
        }
    }

    /// Strand bias fails single nucleotide calls only, two or more criteria
    /// fail any call.
    pub fn decide(&self, signals: &CallSignals) -> bool {
        let strand_biased =
            signals.var_class == VarClass::Snv && self.significant(signals.strand_bias_p);
        !strand_biased && self.criteria(signals).count() < 2
    }

    /// Run the site and gene tests on the eligible rows and decide on every
    /// row.
    ///
    /// Ineligible rows keep their test results but never pass.
    pub fn filter_sites(
        &self,
        tester: &DeviationTester,
        calls: &[CandidateCall],
        counts: &[TrioCounts],
        eligible: &[bool],
    ) -> Vec<FilterResult> {
        let sites = tester.test_sites(calls, counts, Some(eligible));
        let gene_parental =
            tester.test_genes(calls, counts, &sites.strand_bias, Some(eligible));

        let per_gene = calls
            .iter()
            .zip(eligible)
            .filter(|(_, eligible)| **eligible)
            .map(|(call, _)| call.symbol.as_str())
            .counts();

        let result = calls
            .iter()
            .enumerate()
            .map(|(idx, call)| {
                let signals = CallSignals {
                    var_class: call.var_class(),
                    strand_bias_p: sites.strand_bias[idx],
                    site_parental_p: sites.site_parental[idx],
                    gene_parental_p: gene_parental[idx],
                    min_parent_alt: counts[idx].min_parent_alt(),
                    gene_recurrent: per_gene.get(call.symbol.as_str()).copied().unwrap_or(0) > 1,
                };
                FilterResult {
                    strand_bias_p: signals.strand_bias_p,
                    site_parental_p: signals.site_parental_p,
                    gene_parental_p: signals.gene_parental_p,
                    min_parent_alt: signals.min_parent_alt,
                    overall_pass: eligible[idx] && self.decide(&signals),
                }
            })
            .collect::<Vec<_>>();

        tracing::debug!(
            "{} of {} candidate sites pass",
            result
                .iter()
                .filter(|r| r.overall_pass)
                .count()
                .separate_with_commas(),
            result.len().separate_with_commas()
        );
        result
    }
}

/// Depth and proportion thresholds for indels missed by the caller.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MissingIndelThresholds {
    /// Child alternate depth must be above this.
    pub min_child_alts: u64,
    /// Both parents' total depth must be above this.
    pub min_parent_depth: u64,
    /// Both parents' alternate proportion must be below this.
    pub max_parent_proportion: f64,
    /// Child alternate proportion must be above this.
    pub min_child_proportion: f64,
    /// The smaller parental alternate count must be below this.
    pub max_min_parent_alt: u64,
}

impl Default for MissingIndelThresholds {
    fn default() -> Self {
        Self {
            min_child_alts: 2,
            min_parent_depth: 7,
            max_parent_proportion: 0.1,
            min_child_proportion: 0.2,
            max_min_parent_alt: 2,
        }
    }
}

impl MissingIndelThresholds {
    pub fn passes(&self, counts: &TrioCounts) -> bool {
        let depths = depths_and_proportions(counts);
        depths.child.alts > self.min_child_alts
            && depths.min_parent_depth() > self.min_parent_depth
            && depths.max_parent_proportion() < self.max_parent_proportion
            && depths.child.proportion > self.min_child_proportion
            && counts.min_parent_alt() < self.max_min_parent_alt
    }
}

/// Decide on indels that the caller never examined.
pub fn filter_missing_indels(
    counts: &[TrioCounts],
    eligible: &[bool],
    thresholds: &MissingIndelThresholds,
) -> Vec<bool> {
    counts
        .iter()
        .zip(eligible)
        .map(|(counts, eligible)| *eligible && thresholds.passes(counts))
        .collect()
}
