use crate::convaq_structs::{Cnvr, Region, Score, VariationType};
use crate::fisher::fisher_test;

/// Score every region against every tested variation type.
///
/// For each (region, type) pair the 2x2 table is the per-group split into
/// patients carrying the type here (positives) and the rest of the group
/// (negatives). Pairs whose exact-test p-value passes the cutoff become
/// candidate CNVRs; regions are never mutated.
pub fn statistical_model(
    regions: &[Region],
    npatients1: usize,
    npatients2: usize,
    cutoff: f64,
) -> Vec<Cnvr> {
    let mut result = Vec::new();

    for (i, r) in regions.iter().enumerate() {
        for kind in VariationType::TESTED {
            let pos1 = r.state.count(0, kind);
            let neg1 = npatients1 - pos1;
            let pos2 = r.state.count(1, kind);
            let neg2 = npatients2 - pos2;

            let pvalue = fisher_test(pos1 as u64, neg1 as u64, pos2 as u64, neg2 as u64);
            if pvalue <= cutoff {
                result.push(Cnvr::from_region(i, r, kind, Score::Fisher(pvalue)));
            }
        }
    }

    result
}
