use statrs::distribution::{Discrete, Hypergeometric};

/// Two-sided Fisher exact test for the 2x2 table
///
/// ```text
///            positive   negative
/// group 1       a          b
/// group 2       c          d
/// ```
///
/// Computes the hypergeometric probability of the observed cell `c` with
/// all margins fixed, then sums the probabilities of every feasible table
/// whose probability is `<=` the observed one (two-sided by probability
/// ranking, not by tail summing). The small epsilon guards against float
/// noise when an alternative table ties the observed probability.
///
/// Degenerate tables (empty table or a zero/full margin) return 1.0: the
/// margins fully determine the table, so nothing is more extreme than the
/// observation.
pub fn fisher_test(a: u64, b: u64, c: u64, d: u64) -> f64 {
    let n = a + b + c + d;
    let successes = a + c;
    let draws = c + d;

    if n == 0 || successes == 0 || draws == 0 || successes == n || draws == n {
        return 1.0;
    }

    let dist = match Hypergeometric::new(n, successes, draws) {
        Ok(dist) => dist,
        Err(_) => return 1.0,
    };

    let cutoff = dist.pmf(c);

    let min_k = successes.saturating_sub(n - draws);
    let max_k = successes.min(draws);

    let mut pvalue = 0.0;
    for k in min_k..=max_k {
        let p = dist.pmf(k);
        if p <= cutoff + 1e-10 {
            pvalue += p;
        }
    }

    pvalue.min(1.0)
}
