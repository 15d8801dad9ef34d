use radsort::sort_by_key;

use crate::convaq_structs::Cnvr;

/// Coalesce same-type, same-chromosome CNVRs separated by at most
/// `threshold` bases.
///
/// CNVRs are sorted by (type, chromosome, start); a maximal run where each
/// member starts within `threshold` bases of the previous member's end
/// collapses into one CNVR (union span, max p-value and q-value,
/// concatenated origin regions). Runs of length one pass through
/// unchanged. Output order beyond that grouping is unspecified; callers
/// re-sort afterwards.
pub fn merge_adjacent(cnvrs: Vec<Cnvr>, threshold: u32) -> Vec<Cnvr> {
    let mut cnvrs = cnvrs;

    sort_by_key(&mut cnvrs, |c| c.start);
    sort_by_key(&mut cnvrs, |c| c.chr);
    sort_by_key(&mut cnvrs, |c| c.kind.slot() as u8);

    let mut out = Vec::with_capacity(cnvrs.len());

    let mut i = 0;
    while i < cnvrs.len() {
        let first = i;
        i += 1;

        while i < cnvrs.len()
            && cnvrs[i].kind == cnvrs[first].kind
            && cnvrs[i].chr == cnvrs[first].chr
            && cnvrs[i].start - cnvrs[i - 1].end - 1 <= threshold as i64
        {
            i += 1;
        }

        if i - first == 1 {
            out.push(cnvrs[first].clone());
        } else {
            out.push(Cnvr::from_members(&cnvrs[first..i]));
        }
    }

    out
}
