//! Site- and gene-level tests for strand bias and parental alternate reads.

use indexmap::IndexMap;
use rayon::prelude::*;

use super::{
    allele_counts::{aggregate_gene, aggregate_site, SiteCounts, StrandBiasMembers},
    schema::{CandidateCall, SiteKey, TrioCounts, VarClass},
    stats,
};

/// Strand bias p-value from Fisher's exact test on the table
/// `[[ref_F, ref_R], [alt_F, alt_R]]`.
///
/// Degenerate tables give `1.0`, i.e., no detectable bias.
pub fn site_strand_bias(counts: &SiteCounts) -> f64 {
    match stats::fisher_exact(
        counts.ref_fwd,
        counts.ref_rev,
        counts.alt_fwd,
        counts.alt_rev,
    ) {
        Some(p) => p,
        None => {
            tracing::trace!("degenerate strand bias table {:?}, using p=1", counts);
            1.0
        }
    }
}

/// P-value for the parental alternate read count given the sequencing error rate.
pub fn parental_alt_excess(parent_alt: u64, parent_ref: u64, error_rate: f64) -> f64 {
    stats::binom_test(parent_alt, parent_alt + parent_ref, error_rate)
}

/// Per-row p-values of the site-level tests.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SiteTestResult {
    pub strand_bias: Vec<f64>,
    pub site_parental: Vec<f64>,
}

/// Runs the site- and gene-level deviation tests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DeviationTester {
    /// Significance threshold, used for excluding strand-biased sites from gene tests.
    pub p_cutoff: f64,
    /// Per-read sequencing error probability.
    pub error_rate: f64,
    /// Trio members feeding into the strand bias table.
    pub members: StrandBiasMembers,
}

impl DeviationTester {
    pub fn new(p_cutoff: f64, error_rate: f64, members: StrandBiasMembers) -> Self {
        Self {
            p_cutoff,
            error_rate,
            members,
        }
    }

    /// Test each distinct site for strand bias and parental alternate reads.
    ///
    /// When `pass_mask` is given, only rows with a `true` entry are aggregated
    /// but the result is still assigned to every row sharing the site key.
    /// Rows whose site has no aggregated row get `NaN`.
    pub fn test_sites(
        &self,
        calls: &[CandidateCall],
        counts: &[TrioCounts],
        pass_mask: Option<&[bool]>,
    ) -> SiteTestResult {
        let keys = calls.iter().map(|call| call.site_key()).collect::<Vec<_>>();

        let mut groups: IndexMap<&SiteKey, Vec<&TrioCounts>> = IndexMap::new();
        for (idx, key) in keys.iter().enumerate() {
            if is_selected(pass_mask, idx) {
                groups.entry(key).or_default().push(&counts[idx]);
            }
        }
        tracing::debug!(
            "testing {} sites from {} candidates",
            groups.len(),
            calls.len()
        );

        let per_site = groups
            .par_iter()
            .map(|(key, rows)| {
                let site = aggregate_site(rows.iter().copied(), self.members);
                let result = (
                    site_strand_bias(&site),
                    parental_alt_excess(site.parent_alt, site.parent_ref, self.error_rate),
                );
                (*key, result)
            })
            .collect::<IndexMap<_, _>>();

        let mut result = SiteTestResult::default();
        for key in &keys {
            let (strand_bias, site_parental) =
                per_site.get(key).copied().unwrap_or((f64::NAN, f64::NAN));
            result.strand_bias.push(strand_bias);
            result.site_parental.push(site_parental);
        }
        result
    }

    /// Test each gene for excess parental alternate reads.
    ///
    /// Only single nucleotide calls without significant strand bias contribute,
    /// restricted further by `pass_mask` if given.  Genes without any
    /// contributing row get `NaN` on all of their rows.
    pub fn test_genes(
        &self,
        calls: &[CandidateCall],
        counts: &[TrioCounts],
        strand_bias: &[f64],
        pass_mask: Option<&[bool]>,
    ) -> Vec<f64> {
        let mut groups: IndexMap<&str, Vec<&TrioCounts>> = IndexMap::new();
        for (idx, call) in calls.iter().enumerate() {
            let biased = strand_bias[idx] < self.p_cutoff;
            if call.var_class() == VarClass::Snv && !biased && is_selected(pass_mask, idx) {
                groups
                    .entry(call.symbol.as_str())
                    .or_default()
                    .push(&counts[idx]);
            }
        }
        tracing::debug!("testing {} genes", groups.len());

        let per_gene = groups
            .par_iter()
            .map(|(symbol, rows)| {
                let gene = aggregate_gene(rows.iter().copied());
                let p = parental_alt_excess(gene.parent_alt, gene.parent_ref, self.error_rate);
                (*symbol, p)
            })
            .collect::<IndexMap<_, _>>();

        calls
            .iter()
            .map(|call| {
                per_gene
                    .get(call.symbol.as_str())
                    .copied()
                    .unwrap_or(f64::NAN)
            })
            .collect()
    }
}

fn is_selected(pass_mask: Option<&[bool]>, idx: usize) -> bool {
    pass_mask.map(|mask| mask[idx]).unwrap_or(true)
}

#[cfg(test)]
mod test {
    use float_cmp::approx_eq;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::denovos::allele_counts::extract_all;

    fn call(pos: i32, alt: &str, symbol: &str, dp4: [&str; 3]) -> CandidateCall {
        CandidateCall {
            person_id: format!("person-{}", pos),
            chrom: String::from("1"),
            pos,
            reference: String::from("A"),
            alternative: alt.into(),
            symbol: symbol.into(),
            consequence: String::from("missense_variant"),
            dp4_child: dp4[0].into(),
            dp4_mother: dp4[1].into(),
            dp4_father: dp4[2].into(),
            ..Default::default()
        }
    }

    #[rstest::fixture]
    fn tester() -> DeviationTester {
        DeviationTester::new(0.05, 0.01, StrandBiasMembers::All)
    }

    #[test]
    fn site_strand_bias_fisher() {
        let counts = SiteCounts {
            ref_fwd: 5,
            ref_rev: 30,
            alt_fwd: 10,
            alt_rev: 10,
            ..Default::default()
        };

        assert!(approx_eq!(
            f64,
            site_strand_bias(&counts),
            0.010024722592,
            epsilon = 1e-11
        ));
    }

    #[test]
    fn site_strand_bias_all_zero() {
        assert_eq!(site_strand_bias(&SiteCounts::default()), 1.0);
    }

    #[test]
    fn parental_alt_excess_no_reads() {
        assert_eq!(parental_alt_excess(0, 0, 0.002), 1.0);
    }

    #[rstest::rstest]
    fn test_sites_groups_by_key(tester: DeviationTester) -> Result<(), anyhow::Error> {
        // rows 0 and 2 share a site, row 1 differs by the alternate allele only
        let calls = vec![
            call(1, "C", "TEST1", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
            call(1, "T", "TEST1", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
            call(1, "C", "TEST1", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
        ];
        let counts = extract_all(&calls)?;

        let result = tester.test_sites(&calls, &counts, None);

        // shared site: 4 parental alts out of 244 reads
        let shared = parental_alt_excess(4, 240, 0.01);
        let single = parental_alt_excess(2, 120, 0.01);
        assert_eq!(result.site_parental, vec![shared, single, shared]);
        assert_eq!(result.strand_bias[0], result.strand_bias[2]);

        Ok(())
    }

    #[rstest::rstest]
    fn test_sites_mask_maps_back(tester: DeviationTester) -> Result<(), anyhow::Error> {
        let calls = vec![
            call(1, "C", "TEST1", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
            call(1, "C", "TEST1", ["20,15,30,25", "30,30,0,9", "30,30,0,9"]),
            call(2, "C", "TEST1", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
        ];
        let counts = extract_all(&calls)?;

        let result = tester.test_sites(&calls, &counts, Some(&[true, false, false]));

        // row 1 is excluded from aggregation but receives its site's value
        let expected = parental_alt_excess(2, 120, 0.01);
        assert_eq!(result.site_parental[0], expected);
        assert_eq!(result.site_parental[1], expected);
        // no row of the site at position 2 was aggregated
        assert!(result.site_parental[2].is_nan());
        assert!(result.strand_bias[2].is_nan());

        Ok(())
    }

    #[rstest::rstest]
    fn test_genes_excludes_strand_biased_snvs(
        tester: DeviationTester,
    ) -> Result<(), anyhow::Error> {
        let mut calls = vec![
            call(1, "C", "TEST1", ["40,15,20,25", "40,15,0,1", "60,30,0,1"]),
            call(2, "T", "TEST1", ["20,15,30,25", "20,20,0,1", "30,30,0,1"]),
            call(3, "T", "TEST2", ["20,15,30,25", "20,20,0,1", "30,30,0,1"]),
        ];
        calls[2].alternative = String::from("TA");
        let counts = extract_all(&calls)?;
        let sites = tester.test_sites(&calls, &counts, None);
        assert!(sites.strand_bias[0] < 0.05);

        let result = tester.test_genes(&calls, &counts, &sites.strand_bias, None);

        // only the unbiased SNV contributes to TEST1
        let expected = parental_alt_excess(2, 100, 0.01);
        assert_eq!(result[0], expected);
        assert_eq!(result[1], expected);
        // TEST2 only has an indel
        assert!(result[2].is_nan());

        Ok(())
    }

    #[rstest::rstest]
    fn test_genes_empty_selection(tester: DeviationTester) -> Result<(), anyhow::Error> {
        let calls = vec![
            call(1, "C", "TEST1", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
            call(2, "C", "TEST2", ["20,15,30,25", "30,30,0,1", "30,30,0,1"]),
        ];
        let counts = extract_all(&calls)?;
        let mask = [false, false];
        let sites = tester.test_sites(&calls, &counts, Some(&mask));

        let result = tester.test_genes(&calls, &counts, &sites.strand_bias, Some(&mask));

        assert!(result.iter().all(|p| p.is_nan()));

        Ok(())
    }

    #[rstest::rstest]
    fn test_genes_nan_strand_bias_contributes(
        tester: DeviationTester,
    ) -> Result<(), anyhow::Error> {
        let calls = vec![call(
            1,
            "C",
            "TEST1",
            ["20,15,30,25", "30,30,0,1", "30,30,0,1"],
        )];
        let counts = extract_all(&calls)?;

        let result = tester.test_genes(&calls, &counts, &[f64::NAN], None);

        assert_eq!(result, vec![parental_alt_excess(2, 120, 0.01)]);

        Ok(())
    }
}
