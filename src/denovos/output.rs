//! Writing of screened candidate tables.

use std::io::Write;

use super::{filter::FilterResult, input::CandidateTable};

/// Metric columns appended to the input columns.
pub const METRIC_COLUMNS: &[&str] = &[
    "min_parent_alt",
    "strand_bias_p",
    "site_parental_p",
    "gene_parental_p",
];

/// Format a p-value, leaving `NaN` blank.
fn format_p(p: f64) -> String {
    if p.is_nan() {
        String::new()
    } else {
        p.to_string()
    }
}

/// Write the rows `rows` of `table` as TSV.
///
/// The input columns are written unchanged except for `symbol` and
/// `consequence`, which carry the tidied values.  With `annotate_only`, a
/// `pass` column is appended.
pub fn write_table<W: Write>(
    writer: W,
    table: &CandidateTable,
    results: &[FilterResult],
    rows: &[usize],
    annotate_only: bool,
) -> Result<(), anyhow::Error> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(writer);

    let mut header = table.header.iter().collect::<Vec<_>>();
    header.extend_from_slice(METRIC_COLUMNS);
    if annotate_only {
        header.push("pass");
    }
    writer.write_record(&header)?;

    let symbol = table.columns.get("symbol").copied();
    let consequence = table.columns.get("consequence").copied();
    for idx in rows {
        let (record, call, result) = (&table.records[*idx], &table.calls[*idx], &results[*idx]);
        let mut out = record
            .iter()
            .enumerate()
            .map(|(col, value)| {
                if Some(col) == symbol {
                    call.symbol.clone()
                } else if Some(col) == consequence {
                    call.consequence.clone()
                } else {
                    value.to_string()
                }
            })
            .collect::<Vec<_>>();
        out.push(result.min_parent_alt.to_string());
        out.push(format_p(result.strand_bias_p));
        out.push(format_p(result.site_parental_p));
        out.push(format_p(result.gene_parental_p));
        if annotate_only {
            out.push(if result.overall_pass { "True" } else { "False" }.to_string());
        }
        writer.write_record(&out)?;
    }

    writer.flush()?;
    Ok(())
}
