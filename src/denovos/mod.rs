//! Screening of candidate de novo calls for technical artefacts.

pub mod allele_counts;
pub mod consequences;
pub mod deviations;
pub mod filter;
pub mod input;
pub mod min_depth;
pub mod output;
pub mod prefilter;
pub mod recurrence;
pub mod schema;
pub mod segdups;
pub mod stats;

use std::{collections::HashSet, path::Path, time::Instant};

use thousands::Separable;

use crate::common::{self, io::open_write_maybe_gz};

use self::{
    allele_counts::{extract_all, StrandBiasMembers},
    consequences::{load_last_base_sites, reannotate_last_base, tidy_all, LastBaseSites},
    deviations::DeviationTester,
    filter::{filter_missing_indels, FilterEngine, FilterResult, MissingIndelThresholds},
    input::{load_candidates, load_families, CandidateTable},
    output::write_table,
    prefilter::EligibilityScreen,
    recurrence::{resolve_recurrence, RecurrenceMode},
    segdups::{load_segdups, SegdupIndex},
};

/// Which kind of candidates are screened.
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
pub enum FilterMode {
    /// Sites confirmed by the de novo caller, screened with the statistical tests.
    #[default]
    Denovogear,
    /// Indels missed by the caller, screened with depth and proportion thresholds.
    MissingIndels,
}

/// Settings of the screening pipeline.
#[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize, derive_builder::Builder)]
#[builder(build_fn(validate = "Self::validate"))]
pub struct FilterParams {
    /// Significance threshold of all tests.
    pub p_cutoff: f64,
    /// Per-read sequencing error probability.
    pub error_rate: f64,
    /// Maximal population allele frequency of caller-confirmed sites.
    #[builder(default = "0.01")]
    pub maf_cutoff: f64,
    #[builder(default)]
    pub mode: FilterMode,
    /// Keep all rows and add a `pass` column.
    #[builder(default)]
    pub annotate_only: bool,
    /// Skip the recurrence resolution.
    #[builder(default)]
    pub include_recurrent: bool,
    #[builder(default)]
    pub strand_bias_members: StrandBiasMembers,
    #[builder(default)]
    pub missing_indels: MissingIndelThresholds,
}

impl FilterParamsBuilder {
    fn validate(&self) -> Result<(), String> {
        if let Some(p_cutoff) = self.p_cutoff {
            if !(p_cutoff > 0.0 && p_cutoff <= 1.0) {
                return Err(format!("p-value cutoff must be in (0, 1], got {}", p_cutoff));
            }
        }
        if let Some(error_rate) = self.error_rate {
            if !(0.0..=1.0).contains(&error_rate) {
                return Err(format!("error rate must be in [0, 1], got {}", error_rate));
            }
        }
        Ok(())
    }
}

/// Partial settings as given with `--params`.
#[derive(Debug, Clone, Default, PartialEq, serde::Deserialize)]
#[serde(deny_unknown_fields)]
struct ParamsFile {
    p_cutoff: Option<f64>,
    error_rate: Option<f64>,
    maf_cutoff: Option<f64>,
    mode: Option<FilterMode>,
    annotate_only: Option<bool>,
    include_recurrent: Option<bool>,
    strand_bias_members: Option<StrandBiasMembers>,
    missing_indels: Option<MissingIndelThresholds>,
}

impl ParamsFile {
    fn apply(&self, builder: &mut FilterParamsBuilder) {
        if let Some(p_cutoff) = self.p_cutoff {
            builder.p_cutoff(p_cutoff);
        }
        if let Some(error_rate) = self.error_rate {
            builder.error_rate(error_rate);
        }
        if let Some(maf_cutoff) = self.maf_cutoff {
            builder.maf_cutoff(maf_cutoff);
        }
        if let Some(mode) = self.mode {
            builder.mode(mode);
        }
        if let Some(annotate_only) = self.annotate_only {
            builder.annotate_only(annotate_only);
        }
        if let Some(include_recurrent) = self.include_recurrent {
            builder.include_recurrent(include_recurrent);
        }
        if let Some(members) = self.strand_bias_members {
            builder.strand_bias_members(members);
        }
        if let Some(thresholds) = self.missing_indels {
            builder.missing_indels(thresholds);
        }
    }
}

/// Load params from a JSON string or `@` with the path to a JSON file.
fn load_params(params: &str) -> Result<ParamsFile, anyhow::Error> {
    if let Some(path) = params.strip_prefix('@') {
        let json = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("failed to open params file {:?}: {}", path, e))?;
        serde_json::from_str(&json)
            .map_err(|e| anyhow::anyhow!("failed to parse params from {:?}: {}", path, e))
    } else {
        serde_json::from_str(params).map_err(|e| anyhow::anyhow!("failed to parse params: {}", e))
    }
}

/// Command line arguments for `denovos filter` sub command.
#[derive(Debug, Default, clap::Parser)]
#[command(author, version, about = "Screen candidate de novo calls", long_about = None)]
pub struct Args {
    /// Path to the candidate TSV file.
    #[clap(long)]
    pub path_input: String,
    /// Path to the output TSV file.
    #[clap(long)]
    pub path_output: String,

    /// Significance threshold of all tests.
    #[clap(long)]
    pub p_cutoff: Option<f64>,
    /// Per-read sequencing error probability.
    #[clap(long)]
    pub error_rate: Option<f64>,
    /// Maximal population allele frequency, defaults to 0.01.
    #[clap(long)]
    pub maf_cutoff: Option<f64>,
    /// Kind of candidates in the input.
    #[clap(long, value_enum)]
    pub mode: Option<FilterMode>,
    /// Keep all rows and add a `pass` column.
    #[clap(long)]
    pub annotate_only: bool,
    /// Keep calls recurring within a family or within a person's gene.
    #[clap(long)]
    pub include_recurrent: bool,
    /// Trio members contributing to the strand bias test.
    #[clap(long, value_enum)]
    pub strand_bias_members: Option<StrandBiasMembers>,
    /// Filter parameters as JSON or @ with path to JSON file.
    #[clap(long)]
    pub params: Option<String>,

    /// Path to segmental duplication regions.
    #[clap(long)]
    pub path_segdups: Option<String>,
    /// Path to families table with `individual_id` and `family_id`.
    #[clap(long)]
    pub path_families: Option<String>,
    /// Persons failing sample QC, or @ with path to file with one per line.
    #[clap(long)]
    pub sample_fails: Vec<String>,
    /// Path to JSON list of conserved last base of exon sites.
    #[clap(long)]
    pub path_last_base_sites: Option<String>,

    /// Set the number of threads to use, defaults to number of cores.
    #[clap(long)]
    pub num_threads: Option<usize>,
}

/// Combine `--params` with the explicit options, the latter taking precedence.
pub fn build_params(args: &Args) -> Result<FilterParams, anyhow::Error> {
    let mut builder = FilterParamsBuilder::default();
    if let Some(params) = &args.params {
        load_params(params)?.apply(&mut builder);
    }

    if let Some(p_cutoff) = args.p_cutoff {
        builder.p_cutoff(p_cutoff);
    }
    if let Some(error_rate) = args.error_rate {
        builder.error_rate(error_rate);
    }
    if let Some(maf_cutoff) = args.maf_cutoff {
        builder.maf_cutoff(maf_cutoff);
    }
    if let Some(mode) = args.mode {
        builder.mode(mode);
    }
    if args.annotate_only {
        builder.annotate_only(true);
    }
    if args.include_recurrent {
        builder.include_recurrent(true);
    }
    if let Some(members) = args.strand_bias_members {
        builder.strand_bias_members(members);
    }

    builder
        .build()
        .map_err(|e| anyhow::anyhow!("invalid filter parameters: {}", e))
}

/// Auxiliary data of the eligibility screen and re-annotation.
#[derive(Debug, Default)]
pub struct Resources {
    pub segdups: Option<SegdupIndex>,
    pub sample_fails: HashSet<String>,
    pub last_base_sites: Option<LastBaseSites>,
}

impl Resources {
    pub fn load(args: &Args) -> Result<Self, anyhow::Error> {
        let segdups = args
            .path_segdups
            .as_ref()
            .map(|path| load_segdups(Path::new(path)))
            .transpose()?;
        let last_base_sites = args
            .path_last_base_sites
            .as_ref()
            .map(|path| load_last_base_sites(Path::new(path)))
            .transpose()?;
        let sample_fails = common::expand_at_paths(&args.sample_fails)?
            .into_iter()
            .collect::<HashSet<_>>();
        tracing::debug!("{} persons failed sample QC", sample_fails.len());

        Ok(Self {
            segdups,
            sample_fails,
            last_base_sites,
        })
    }
}

/// Outcome of [`screen`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Screened {
    /// One result per input row, `overall_pass` including recurrence.
    pub results: Vec<FilterResult>,
    /// Indices of the rows to write.
    pub rows: Vec<usize>,
}

/// Run the screening pipeline over `table`.
///
/// The calls of `table` are tidied and re-annotated in place.
pub fn screen(
    table: &mut CandidateTable,
    params: &FilterParams,
    resources: &Resources,
) -> Result<Screened, anyhow::Error> {
    tidy_all(&mut table.calls)?;
    if let Some(sites) = &resources.last_base_sites {
        let changed = reannotate_last_base(&mut table.calls, sites);
        tracing::debug!("{} calls at conserved last bases of exons", changed);
    }

    let maf_cutoff = match params.mode {
        FilterMode::Denovogear => params.maf_cutoff,
        FilterMode::MissingIndels => 0.0,
    };
    let eligible = EligibilityScreen {
        maf_cutoff,
        sample_fails: &resources.sample_fails,
        segdups: resources.segdups.as_ref(),
    }
    .mask(&table.calls);
    tracing::info!(
        "{} of {} candidates are eligible",
        eligible.iter().filter(|e| **e).count().separate_with_commas(),
        table.len().separate_with_commas()
    );

    let counts = extract_all(&table.calls)?;
    let mut results = match params.mode {
        FilterMode::Denovogear => {
            let tester = DeviationTester::new(
                params.p_cutoff,
                params.error_rate,
                params.strand_bias_members,
            );
            FilterEngine::new(params.p_cutoff).filter_sites(
                &tester,
                &table.calls,
                &counts,
                &eligible,
            )
        }
        FilterMode::MissingIndels => {
            filter_missing_indels(&counts, &eligible, &params.missing_indels)
                .into_iter()
                .zip(&counts)
                .map(|(pass, counts)| FilterResult {
                    strand_bias_p: f64::NAN,
                    site_parental_p: f64::NAN,
                    gene_parental_p: f64::NAN,
                    min_parent_alt: counts.min_parent_alt(),
                    overall_pass: pass,
                })
                .collect()
        }
    };

    let mut pass = results.iter().map(|r| r.overall_pass).collect::<Vec<_>>();
    let rows = if params.include_recurrent {
        if params.annotate_only {
            (0..pass.len()).collect()
        } else {
            (0..pass.len()).filter(|idx| pass[*idx]).collect()
        }
    } else {
        let mode = if params.annotate_only {
            RecurrenceMode::AnnotateOnly
        } else {
            RecurrenceMode::Drop
        };
        resolve_recurrence(&table.calls, &mut pass, mode)?
    };
    for (result, pass) in results.iter_mut().zip(pass) {
        result.overall_pass = pass;
    }

    tracing::info!(
        "{} of {} candidates pass",
        results
            .iter()
            .filter(|r| r.overall_pass)
            .count()
            .separate_with_commas(),
        results.len().separate_with_commas()
    );
    Ok(Screened { results, rows })
}

/// Main entry point for `denovos filter` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    let before_anything = Instant::now();
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    if let Some(num_threads) = args.num_threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .map_err(|e| anyhow::anyhow!("building global Rayon thread pool failed: {}", e))?;
    }

    let params = build_params(args)?;
    tracing::info!("params = {:?}", &params);

    let families = args
        .path_families
        .as_ref()
        .map(|path| load_families(Path::new(path)))
        .transpose()?;
    let resources = Resources::load(args)?;
    let mut table = load_candidates(Path::new(&args.path_input), families.as_ref())?;
    common::trace_rss_now();

    tracing::info!("screening candidates...");
    let before_screening = Instant::now();
    let screened = screen(&mut table, &params, &resources)?;
    tracing::info!("... done screening in {:?}", before_screening.elapsed());

    tracing::info!(
        "writing {} rows to {:?}...",
        screened.rows.len().separate_with_commas(),
        &args.path_output
    );
    write_table(
        open_write_maybe_gz(&args.path_output)?,
        &table,
        &screened.results,
        &screened.rows,
        params.annotate_only,
    )?;
    common::trace_rss_now();

    tracing::info!(
        "All of `denovos filter` completed in {:?}",
        before_anything.elapsed()
    );
    Ok(())
}

#[cfg(test)]
mod test {
    use clap::Parser;
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::denovos::input::parse_candidates;

    const CANDIDATES: &str = "person_id\tfamily_id\tchrom\tpos\tref\talt\tsymbol\tconsequence\t\
                              dp4_child\tdp4_mother\tdp4_father\n\
                              a\tfam1\tchr1\t100\tA\tC\tTEST1\tmissense_variant\t\
                              20,15,30,25\t30,30,0,0\t30,30,0,0\n\
                              b\tfam2\tchr1\t200\tA\tC\tTEST2\tsynonymous_variant\t\
                              20,15,30,25\t30,30,5,5\t30,30,5,5\n\
                              a\tfam1\tchr1\t300\tG\tT\tTEST1|TEST1\tintron_variant|stop_gained\t\
                              20,15,30,25\t30,30,0,0\t30,30,0,0\n\
                              c\tfam3\tchr2\t100\tA\tC\tTEST3\tintergenic_variant\t\
                              20,15,30,25\t30,30,0,0\t30,30,0,0\n";

    #[rstest::fixture]
    fn table() -> CandidateTable {
        parse_candidates(CANDIDATES.as_bytes(), None).expect("valid candidates")
    }

    fn params(mode: FilterMode, annotate_only: bool, include_recurrent: bool) -> FilterParams {
        FilterParamsBuilder::default()
            .p_cutoff(0.05)
            .error_rate(0.01)
            .mode(mode)
            .annotate_only(annotate_only)
            .include_recurrent(include_recurrent)
            .build()
            .expect("valid params")
    }

    fn passing(screened: &Screened) -> Vec<bool> {
        screened.results.iter().map(|r| r.overall_pass).collect()
    }

    #[test]
    #[tracing_test::traced_test]
    fn screen_denovogear() -> Result<(), anyhow::Error> {
        let mut table = parse_candidates(CANDIDATES.as_bytes(), None)?;

        let screened = screen(
            &mut table,
            &params(FilterMode::Denovogear, false, false),
            &Resources::default(),
        )?;

        // the first call is superseded by the more severe one in the same gene
        assert_eq!(screened.rows, vec![2]);
        assert_eq!(passing(&screened), vec![false, false, true, false]);
        assert_eq!(table.calls[2].consequence, "stop_gained");
        assert_eq!(screened.results[1].min_parent_alt, 10);
        assert!(screened.results[1].site_parental_p < 0.05);
        assert!(screened.results[3].strand_bias_p.is_nan());
        assert!(logs_contain("3 of 4 candidates are eligible"));
        assert!(logs_contain("1 of 4 candidates pass"));

        Ok(())
    }

    #[rstest::rstest]
    fn screen_annotate_only(mut table: CandidateTable) -> Result<(), anyhow::Error> {
        let screened = screen(
            &mut table,
            &params(FilterMode::Denovogear, true, false),
            &Resources::default(),
        )?;

        assert_eq!(screened.rows, vec![0, 1, 2, 3]);
        assert_eq!(passing(&screened), vec![false, false, true, false]);

        Ok(())
    }

    #[rstest::rstest]
    fn screen_include_recurrent(mut table: CandidateTable) -> Result<(), anyhow::Error> {
        let screened = screen(
            &mut table,
            &params(FilterMode::Denovogear, false, true),
            &Resources::default(),
        )?;

        assert_eq!(screened.rows, vec![0, 2]);

        Ok(())
    }

    #[rstest::rstest]
    fn screen_sample_fails(mut table: CandidateTable) -> Result<(), anyhow::Error> {
        let resources = Resources {
            sample_fails: HashSet::from([String::from("a")]),
            ..Default::default()
        };

        let screened = screen(
            &mut table,
            &params(FilterMode::Denovogear, false, false),
            &resources,
        )?;

        assert!(screened.rows.is_empty());

        Ok(())
    }

    #[rstest::rstest]
    fn screen_missing_indels(mut table: CandidateTable) -> Result<(), anyhow::Error> {
        let screened = screen(
            &mut table,
            &params(FilterMode::MissingIndels, true, true),
            &Resources::default(),
        )?;

        // parental alternate proportion of the second call is too high
        assert_eq!(passing(&screened), vec![true, false, true, false]);
        assert!(screened.results[0].strand_bias_p.is_nan());
        assert_eq!(screened.results[1].min_parent_alt, 10);

        Ok(())
    }

    #[rstest::rstest]
    fn screen_malformed_depth(mut table: CandidateTable) {
        table.calls[1].dp4_father = String::from("30,30,5");

        let err = screen(
            &mut table,
            &params(FilterMode::Denovogear, false, false),
            &Resources::default(),
        )
        .unwrap_err();

        assert_eq!(
            err.to_string(),
            "row 2, column \"dp4_father\": malformed depth field \"30,30,5\", expected four \
             comma-separated counts"
        );
    }

    #[test]
    fn build_params_from_options() -> Result<(), anyhow::Error> {
        let args = Args::try_parse_from([
            "filter",
            "--path-input",
            "in.tsv",
            "--path-output",
            "out.tsv",
            "--p-cutoff",
            "0.05",
            "--error-rate",
            "0.01",
            "--mode",
            "missing-indels",
            "--strand-bias-members",
            "child",
        ])?;

        let params = build_params(&args)?;

        assert_eq!(params.p_cutoff, 0.05);
        assert_eq!(params.error_rate, 0.01);
        assert_eq!(params.maf_cutoff, 0.01);
        assert_eq!(params.mode, FilterMode::MissingIndels);
        assert_eq!(params.strand_bias_members, StrandBiasMembers::Child);
        assert!(!params.annotate_only);
        assert_eq!(params.missing_indels, MissingIndelThresholds::default());

        Ok(())
    }

    #[test]
    fn build_params_options_override_file() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path = tmpdir.join("params.json");
        std::fs::write(
            &path,
            r#"{"p_cutoff": 0.01, "error_rate": 0.02, "annotate_only": true,
                "missing_indels": {"min_parent_depth": 10}}"#,
        )?;
        let args = Args {
            p_cutoff: Some(0.05),
            params: Some(format!("@{}", path.display())),
            ..Default::default()
        };

        let params = build_params(&args)?;

        assert_eq!(params.p_cutoff, 0.05);
        assert_eq!(params.error_rate, 0.02);
        assert!(params.annotate_only);
        assert_eq!(params.missing_indels.min_parent_depth, 10);
        assert_eq!(params.missing_indels.min_child_alts, 2);

        Ok(())
    }

    #[test]
    fn build_params_inline_json() -> Result<(), anyhow::Error> {
        let args = Args {
            params: Some(String::from(
                r#"{"p_cutoff": 0.05, "error_rate": 0.01, "mode": "missing-indels"}"#,
            )),
            ..Default::default()
        };

        assert_eq!(build_params(&args)?.mode, FilterMode::MissingIndels);

        Ok(())
    }

    #[rstest::rstest]
    #[case(None, Some(0.01), "p_cutoff")]
    #[case(Some(0.05), None, "error_rate")]
    #[case(Some(0.0), Some(0.01), "p-value cutoff must be in (0, 1], got 0")]
    #[case(Some(0.05), Some(1.5), "error rate must be in [0, 1], got 1.5")]
    fn build_params_invalid(
        #[case] p_cutoff: Option<f64>,
        #[case] error_rate: Option<f64>,
        #[case] message: &str,
    ) {
        let args = Args {
            p_cutoff,
            error_rate,
            ..Default::default()
        };

        let err = build_params(&args).unwrap_err();

        assert!(err.to_string().contains(message), "{}", err);
    }

    #[test]
    fn build_params_unknown_field() {
        let args = Args {
            params: Some(String::from(r#"{"p_value": 0.05}"#)),
            ..Default::default()
        };

        assert!(build_params(&args).is_err());
    }

    #[test]
    fn run_smoke() -> Result<(), anyhow::Error> {
        let tmpdir = temp_testdir::TempDir::default();
        let path_input = tmpdir.join("candidates.tsv");
        let path_output = tmpdir.join("out.tsv.gz");
        let path_segdups = tmpdir.join("segdups.bed");
        std::fs::write(&path_input, CANDIDATES)?;
        std::fs::write(&path_segdups, "chr1\t250\t350\n")?;

        let args = Args {
            path_input: path_input.display().to_string(),
            path_output: path_output.display().to_string(),
            p_cutoff: Some(0.05),
            error_rate: Some(0.01),
            annotate_only: true,
            path_segdups: Some(path_segdups.display().to_string()),
            ..Default::default()
        };
        run(&crate::common::Args::default(), &args)?;

        let output =
            std::io::read_to_string(crate::common::io::open_read_maybe_gz(&path_output)?)?;
        let pass = output
            .lines()
            .skip(1)
            .map(|line| line.rsplit('\t').next().unwrap_or_default())
            .collect::<Vec<_>>();
        // the stop_gained call is in a segdup, so the missense call is independent
        assert_eq!(pass, vec!["True", "False", "False", "False"]);

        Ok(())
    }
}
