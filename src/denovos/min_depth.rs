//! Maximal parental alternate depth consistent with a sequencing error model.

use statrs::distribution::{Binomial, DiscreteCDF};

use crate::err::DenovoError;

/// Parental sequencing depth, either shared by both parents or per parent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParentalDepth {
    /// The same depth for mother and father.
    Both(u64),
    /// Mother and father depth.
    PerParent(u64, u64),
}

impl ParentalDepth {
    fn depths(&self) -> [u64; 2] {
        match self {
            ParentalDepth::Both(depth) => [*depth, *depth],
            ParentalDepth::PerParent(first, second) => [*first, *second],
        }
    }
}

impl From<u64> for ParentalDepth {
    fn from(depth: u64) -> Self {
        ParentalDepth::Both(depth)
    }
}

impl From<(u64, u64)> for ParentalDepth {
    fn from((first, second): (u64, u64)) -> Self {
        ParentalDepth::PerParent(first, second)
    }
}

impl TryFrom<&[u64]> for ParentalDepth {
    type Error = DenovoError;

    /// A collection of depths must hold exactly one value per parent.
    fn try_from(depths: &[u64]) -> Result<Self, Self::Error> {
        match depths {
            [first, second] => Ok(ParentalDepth::PerParent(*first, *second)),
            _ => Err(DenovoError::AmbiguousDepthInput { len: depths.len() }),
        }
    }
}

/// Default confidence threshold.
pub const DEFAULT_THRESHOLD: f64 = 0.98;

/// Smallest alternate read count `x` such that the probability of both
/// parents showing more than `x` error reads is at most `1 - threshold`.
///
/// Each parent's alternate depth is modelled as `Binomial(depth, error_rate)`
/// and the parents are independent.
pub fn min_depth<D>(error_rate: f64, depth: D, threshold: f64) -> Result<u64, DenovoError>
where
    D: Into<ParentalDepth>,
{
    if !(0.0..1.0).contains(&threshold) {
        return Err(DenovoError::InvalidThreshold { threshold });
    }
    let depths = depth.into().depths();
    let dists = depths
        .iter()
        .map(|n| Binomial::new(error_rate, *n))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| DenovoError::InvalidErrorRate { error_rate })?;

    // Beyond the largest depth both survival terms vanish.
    let max_depth = depths.iter().copied().max().unwrap_or_default();
    for x in 0..max_depth {
        let both_exceed: f64 = dists.iter().map(|dist| dist.sf(x)).product();
        if 1.0 - both_exceed > threshold {
            return Ok(x);
        }
    }
    Ok(max_depth)
}

/// Command line arguments for `denovos min-depth` sub command.
#[derive(Debug, clap::Parser)]
#[command(author, version, about = "Compute maximal permitted parental alt depth", long_about = None)]
pub struct Args {
    /// Per-read sequencing error probability.
    #[arg(long)]
    pub error_rate: f64,
    /// Parental depth, given once for both parents or once per parent.
    #[arg(long, required = true, num_args = 1..)]
    pub depth: Vec<u64>,
    /// Confidence that the true de novo's parental alt depth is not above the result.
    #[arg(long, default_value_t = DEFAULT_THRESHOLD)]
    pub threshold: f64,
}

impl Args {
    fn parental_depth(&self) -> Result<ParentalDepth, DenovoError> {
        match self.depth.as_slice() {
            [depth] => Ok(ParentalDepth::Both(*depth)),
            depths => ParentalDepth::try_from(depths),
        }
    }
}

/// Main entry point for `denovos min-depth` sub command.
pub fn run(args_common: &crate::common::Args, args: &Args) -> Result<(), anyhow::Error> {
    tracing::info!("args_common = {:?}", &args_common);
    tracing::info!("args = {:?}", &args);

    let depth = args.parental_depth()?;
    let result = min_depth(args.error_rate, depth, args.threshold)?;
    tracing::info!(
        "maximal parental alt depth for {:?} at threshold {}: {}",
        depth,
        args.threshold,
        result
    );
    println!("{}", result);

    Ok(())
}
