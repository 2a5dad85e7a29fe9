//! Common functionality.

use clap::Parser;
use clap_verbosity_flag::{InfoLevel, Verbosity};

pub mod io;

/// Commonly used command line arguments.
#[derive(Parser, Debug)]
pub struct Args {
    /// Verbosity of the program
    #[clap(flatten)]
    pub verbose: Verbosity<InfoLevel>,
}

impl Default for Args {
    fn default() -> Self {
        Self {
            verbose: Verbosity::new(0, 0),
        }
    }
}

/// Helper to print the current memory resident set size via `tracing`.
pub fn trace_rss_now() {
    let rss = procfs::process::Process::myself()
        .and_then(|me| me.stat())
        .map(|stat| stat.rss * procfs::page_size());
    match rss {
        Ok(rss) => tracing::debug!("RSS now: {}", bytesize::ByteSize::b(rss)),
        Err(e) => tracing::debug!("could not determine RSS: {}", e),
    }
}

/// Canonicalize chromosome name by stripping a leading `chr` and mapping the
/// mitochondrial aliases to `MT`.
pub fn canonicalize_chrom(chrom: &str) -> String {
    let chrom = chrom.trim();
    let stripped = chrom
        .strip_prefix("chr")
        .or_else(|| chrom.strip_prefix("CHR"))
        .or_else(|| chrom.strip_prefix("Chr"))
        .unwrap_or(chrom);
    match stripped {
        "M" | "m" | "mt" | "MT" => String::from("MT"),
        "x" => String::from("X"),
        "y" => String::from("Y"),
        _ => stripped.to_string(),
    }
}

/// Parse a list of values given either inline or as `@path` to a file with
/// one value per line.
pub fn expand_at_paths(values: &[String]) -> Result<Vec<String>, anyhow::Error> {
    let mut result = Vec::new();
    for value in values {
        if let Some(path) = value.strip_prefix('@') {
            let contents = std::fs::read_to_string(path)
                .map_err(|e| anyhow::anyhow!("could not read {:?}: {}", path, e))?;
            result.extend(
                contents
                    .lines()
                    .map(|line| line.trim())
                    .filter(|line| !line.is_empty())
                    .map(|line| line.to_string()),
            );
        } else {
            result.push(value.clone());
        }
    }
    Ok(result)
}
