//! Exact hypothesis tests on read counts.

use statrs::distribution::{Binomial, Discrete, DiscreteCDF, Hypergeometric};

/// Relative tolerance when comparing table probabilities against the observed one.
const RELATIVE_TOLERANCE: f64 = 1e-7;

/// Two-sided Fisher's exact test on the 2x2 table `[[a, b], [c, d]]`.
///
/// Returns `None` if the table is degenerate, i.e., a row or column sums to
/// zero, or if the probabilities cannot be represented.
pub fn fisher_exact(a: u64, b: u64, c: u64, d: u64) -> Option<f64> {
    let n = a + b + c + d;
    let row1 = a + b;
    let col1 = a + c;
    if n == 0 || row1 == 0 || col1 == 0 || row1 == n || col1 == n {
        return None;
    }

    let dist = Hypergeometric::new(n, row1, col1).ok()?;

    // Work in log space, the tables may hold millions of reads.
    let ln_observed = dist.ln_pmf(a);
    let ln_cutoff = ln_observed + RELATIVE_TOLERANCE.ln_1p();
    let lo = (row1 + col1).saturating_sub(n);
    let hi = row1.min(col1);
    let p_value: f64 = (lo..=hi)
        .map(|k| dist.ln_pmf(k))
        .filter(|ln_p| *ln_p <= ln_cutoff)
        .map(f64::exp)
        .sum();

    if p_value.is_finite() {
        Some(p_value.min(1.0))
    } else {
        None
    }
}

/// Two-sided exact binomial test of `successes` out of `trials` against the
/// success probability `p`.
///
/// Tables with zero trials yield `1.0`.  Returns `NaN` if `p` is outside of
/// `[0, 1]`.
pub fn binom_test(successes: u64, trials: u64, p: f64) -> f64 {
    if trials == 0 {
        return 1.0;
    }
    let dist = match Binomial::new(p, trials) {
        Ok(dist) => dist,
        Err(e) => {
            tracing::warn!("invalid binomial parameters p={}, n={}: {}", p, trials, e);
            return f64::NAN;
        }
    };

    let d = dist.pmf(successes) * (1.0 + RELATIVE_TOLERANCE);
    let expected = trials as f64 * p;
    let k = successes as f64;
    let p_value = if k < expected {
        // Add up the upper tail with probabilities no larger than the observed.
        let lo = expected.ceil() as u64;
        let y = (lo..=trials).filter(|i| dist.pmf(*i) <= d).count() as u64;
        dist.cdf(successes) + dist.sf(trials - y)
    } else if k > expected {
        let hi = expected.floor() as u64;
        let y = (0..=hi).filter(|i| dist.pmf(*i) <= d).count() as u64;
        let lower = if y == 0 { 0.0 } else { dist.cdf(y - 1) };
        lower + dist.sf(successes - 1)
    } else {
        1.0
    };

    p_value.min(1.0)
}
