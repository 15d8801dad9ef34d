use std::str::FromStr;

use crate::error::ConvaqError;

pub const N_GROUPS: usize = 2;
/// Variation types that segments can carry and models test.
pub const N_TYPES: usize = 3;
/// Result-type slots: the three tested types plus the query-mode tag.
pub const N_SLOTS: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VariationType {
    Gain,
    Loss,
    Loh,
    Normal,
}

impl VariationType {
    pub const TESTED: [VariationType; N_TYPES] =
        [VariationType::Gain, VariationType::Loss, VariationType::Loh];

    /// Fixed slot index, shared with the permutation best-length table.
    #[inline]
    pub fn slot(self) -> usize {
        match self {
            VariationType::Gain => 0,
            VariationType::Loss => 1,
            VariationType::Loh => 2,
            VariationType::Normal => 3,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            VariationType::Gain => "gain",
            VariationType::Loss => "loss",
            VariationType::Loh => "loh",
            VariationType::Normal => "normal",
        }
    }
}

impl FromStr for VariationType {
    type Err = ConvaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "gain" => Ok(VariationType::Gain),
            "loss" => Ok(VariationType::Loss),
            "loh" => Ok(VariationType::Loh),
            "normal" => Ok(VariationType::Normal),
            _ => Err(ConvaqError::InvalidVariationType(s.to_string())),
        }
    }
}

/// One observed CNV call for one patient. Chromosomes are interned to
/// dense codes by the marshalling layer before segments reach the core.
#[derive(Debug, Clone)]
pub struct Segment {
    pub patient: u32,
    pub chr: u32,
    pub start: i64,
    pub end: i64,
    pub kind: VariationType,
}

/// An "event" in the sweep line:
/// - `pos`: the coordinate (start or end of a segment)
/// - `is_start`: true if it's a start event, false if it's an end event
/// - `group`: which cohort the segment belongs to (0 or 1)
/// - `kind`/`patient`: which presence bit the event toggles
#[derive(Debug, Clone)]
pub struct Event {
    pub pos: i64,
    pub kind: VariationType,
    pub patient: u32,
    pub is_start: bool,
    pub group: usize,
}

/// Per-group, per-type patient presence bitmap. The sweep mutates one
/// running table and every emitted region deep-copies it, so regions
/// never alias the live state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresenceTable {
    state: [[Vec<bool>; N_TYPES]; N_GROUPS],
}

#[inline]
fn type_index(kind: VariationType) -> usize {
    debug_assert!(kind != VariationType::Normal);
    kind.slot()
}

impl PresenceTable {
    pub fn new(npatients1: usize, npatients2: usize) -> Self {
        let row1 = || vec![false; npatients1];
        let row2 = || vec![false; npatients2];
        PresenceTable {
            state: [[row1(), row1(), row1()], [row2(), row2(), row2()]],
        }
    }

    #[inline]
    pub fn set(&mut self, group: usize, kind: VariationType, patient: u32, present: bool) {
        self.state[group][type_index(kind)][patient as usize] = present;
    }

    #[inline]
    pub fn get(&self, group: usize, kind: VariationType, patient: usize) -> bool {
        self.state[group][type_index(kind)][patient]
    }

    pub fn group_size(&self, group: usize) -> usize {
        self.state[group][0].len()
    }

    /// Number of patients in `group` carrying `kind` here.
    pub fn count(&self, group: usize, kind: VariationType) -> usize {
        self.state[group][type_index(kind)]
            .iter()
            .filter(|&&p| p)
            .count()
    }

    /// Number of patients in `group` carrying no variation of any type here.
    pub fn normal_count(&self, group: usize) -> usize {
        let rows = &self.state[group];
        (0..self.group_size(group))
            .filter(|&p| !rows[0][p] && !rows[1][p] && !rows[2][p])
            .count()
    }
}

/// A maximal genomic sub-interval over which the combined per-patient
/// presence state is constant. Consecutive regions on a chromosome share
/// their boundary position, so `length = end - start + 1` overlaps the
/// next region by one base; this mirrors the sweep's emission rule and is
/// kept as-is.
#[derive(Debug, Clone)]
pub struct Region {
    pub chr: u32,
    pub start: i64,
    pub end: i64,
    pub length: i64,
    pub state: PresenceTable,
}

/// How a CNVR was scored: an exact-test p-value, or a predicate match
/// (reported downstream through the sentinel `pvalue = 1`).
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Score {
    Fisher(f64),
    Query,
}

impl Score {
    /// Numeric p-value as reported on output; `Query` maps to the
    /// sentinel 1, meaning "not a statistical test".
    #[inline]
    pub fn pvalue(self) -> f64 {
        match self {
            Score::Fisher(p) => p,
            Score::Query => 1.0,
        }
    }
}

/// Candidate or final result region. `region_idxs` index into the region
/// vector of the pipeline run that produced this CNVR.
#[derive(Debug, Clone)]
pub struct Cnvr {
    pub chr: u32,
    pub start: i64,
    pub end: i64,
    pub length: i64,
    pub kind: VariationType,
    pub score: Score,
    pub qvalue: f64,
    pub region_idxs: Vec<usize>,
}

impl Cnvr {
    pub fn from_region(region_idx: usize, region: &Region, kind: VariationType, score: Score) -> Self {
        Cnvr {
            chr: region.chr,
            start: region.start,
            end: region.end,
            length: region.length,
            kind,
            score,
            qvalue: 0.0,
            region_idxs: vec![region_idx],
        }
    }

    /// Collapse a run of same-type, same-chromosome members into one CNVR:
    /// union span, max p-value, max q-value, concatenated origin regions.
    pub fn from_members(members: &[Cnvr]) -> Self {
        debug_assert!(!members.is_empty());
        let mut start = members[0].start;
        let mut end = members[0].end;
        let mut qvalue = members[0].qvalue;
        let mut pvalue = members[0].score.pvalue();
        let all_query = members.iter().all(|m| m.score == Score::Query);
        let mut region_idxs = Vec::new();
        for m in members {
            start = start.min(m.start);
            end = end.max(m.end);
            pvalue = pvalue.max(m.score.pvalue());
            qvalue = qvalue.max(m.qvalue);
            region_idxs.extend_from_slice(&m.region_idxs);
        }
        Cnvr {
            chr: members[0].chr,
            start,
            end,
            length: end - start + 1,
            kind: members[0].kind,
            score: if all_query { Score::Query } else { Score::Fisher(pvalue) },
            qvalue,
            region_idxs,
        }
    }

    /// Sorted per-origin-region presence fractions of `kind` in `group`.
    pub fn frequencies(&self, regions: &[Region], group: usize, kind: VariationType) -> Vec<f64> {
        let mut freqs: Vec<f64> = self
            .region_idxs
            .iter()
            .map(|&i| {
                let r = &regions[i];
                r.state.count(group, kind) as f64 / r.state.group_size(group) as f64
            })
            .collect();
        radsort::sort(&mut freqs);
        freqs
    }

    /// For each patient of `group`, the sorted set of variation types the
    /// patient shows at any origin region of this CNVR; `Normal` marks
    /// origin regions where the patient carries nothing.
    pub fn patient_states(&self, regions: &[Region], group: usize) -> Vec<Vec<VariationType>> {
        let npatients = self
            .region_idxs
            .first()
            .map(|&i| regions[i].state.group_size(group))
            .unwrap_or(0);
        let mut out = Vec::with_capacity(npatients);
        for patient in 0..npatients {
            let mut found = [false; N_SLOTS];
            for &i in &self.region_idxs {
                let state = &regions[i].state;
                let mut any = false;
                for kind in VariationType::TESTED {
                    if state.get(group, kind, patient) {
                        found[kind.slot()] = true;
                        any = true;
                    }
                }
                if !any {
                    found[VariationType::Normal.slot()] = true;
                }
            }
            let kinds = [
                VariationType::Gain,
                VariationType::Loss,
                VariationType::Loh,
                VariationType::Normal,
            ];
            out.push(
                kinds
                    .into_iter()
                    .filter(|k| found[k.slot()])
                    .collect(),
            );
        }
        out
    }
}

/// Comparison half of a frequency predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Less,
    Greater,
    Leq,
    Geq,
}

impl Comparison {
    #[inline]
    pub fn holds(self, a: f64, b: f64) -> bool {
        match self {
            Comparison::Less => a < b,
            Comparison::Greater => a > b,
            Comparison::Leq => a <= b,
            Comparison::Geq => a >= b,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Comparison::Less => "<",
            Comparison::Greater => ">",
            Comparison::Leq => "<=",
            Comparison::Geq => ">=",
        }
    }
}

impl FromStr for Comparison {
    type Err = ConvaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "<" => Ok(Comparison::Less),
            ">" => Ok(Comparison::Greater),
            "<=" => Ok(Comparison::Leq),
            ">=" => Ok(Comparison::Geq),
            _ => Err(ConvaqError::InvalidComparison(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn region(chr: u32, start: i64, end: i64, state: PresenceTable) -> Region {
        Region {
            chr,
            start,
            end,
            length: end - start + 1,
            state,
        }
    }

    #[test]
    fn presence_counts() {
        let mut t = PresenceTable::new(3, 2);
        t.set(0, VariationType::Gain, 0, true);
        t.set(0, VariationType::Gain, 2, true);
        t.set(0, VariationType::Loss, 2, true);
        assert_eq!(t.count(0, VariationType::Gain), 2);
        assert_eq!(t.count(0, VariationType::Loss), 1);
        assert_eq!(t.count(1, VariationType::Gain), 0);
        // patient 1 carries nothing
        assert_eq!(t.normal_count(0), 1);
        assert_eq!(t.normal_count(1), 2);
    }

    #[test]
    fn merged_cnvr_takes_union_and_max() {
        let mut t = PresenceTable::new(1, 1);
        t.set(0, VariationType::Gain, 0, true);
        let r1 = region(0, 100, 200, t.clone());
        let r2 = region(0, 250, 400, t);
        let a = Cnvr {
            qvalue: 0.2,
            ..Cnvr::from_region(0, &r1, VariationType::Gain, Score::Fisher(0.01))
        };
        let b = Cnvr {
            qvalue: 0.1,
            ..Cnvr::from_region(1, &r2, VariationType::Gain, Score::Fisher(0.04))
        };
        let m = Cnvr::from_members(&[a, b]);
        assert_eq!(m.start, 100);
        assert_eq!(m.end, 400);
        assert_eq!(m.length, 301);
        assert_eq!(m.score, Score::Fisher(0.04));
        assert_eq!(m.qvalue, 0.2);
        assert_eq!(m.region_idxs, vec![0, 1]);
    }

    #[test]
    fn patient_states_collects_types_across_origin_regions() {
        let mut t1 = PresenceTable::new(2, 1);
        t1.set(0, VariationType::Gain, 0, true);
        let mut t2 = PresenceTable::new(2, 1);
        t2.set(0, VariationType::Loss, 0, true);
        let regions = vec![region(0, 1, 10, t1), region(0, 10, 20, t2)];
        let mut c = Cnvr::from_region(0, &regions[0], VariationType::Gain, Score::Fisher(1.0));
        c.region_idxs.push(1);

        let states = c.patient_states(&regions, 0);
        assert_eq!(
            states[0],
            vec![VariationType::Gain, VariationType::Loss]
        );
        // patient 1 is normal in both origin regions
        assert_eq!(states[1], vec![VariationType::Normal]);
    }

    #[test]
    fn frequencies_are_sorted() {
        let mut t1 = PresenceTable::new(4, 1);
        t1.set(0, VariationType::Gain, 0, true);
        t1.set(0, VariationType::Gain, 1, true);
        t1.set(0, VariationType::Gain, 2, true);
        let mut t2 = PresenceTable::new(4, 1);
        t2.set(0, VariationType::Gain, 0, true);
        let regions = vec![region(0, 1, 10, t1), region(0, 10, 20, t2)];
        let mut c = Cnvr::from_region(0, &regions[0], VariationType::Gain, Score::Fisher(1.0));
        c.region_idxs.push(1);
        assert_eq!(
            c.frequencies(&regions, 0, VariationType::Gain),
            vec![0.25, 0.75]
        );
    }

    #[test]
    fn parses_names() {
        assert_eq!("Gain".parse::<VariationType>().unwrap(), VariationType::Gain);
        assert_eq!("loh".parse::<VariationType>().unwrap(), VariationType::Loh);
        assert!("amp".parse::<VariationType>().is_err());
        assert_eq!(">=".parse::<Comparison>().unwrap(), Comparison::Geq);
        assert!("=".parse::<Comparison>().is_err());
    }
}
