use std::str::FromStr;

use crate::convaq_structs::{Cnvr, Comparison, Region, Score, VariationType};
use crate::error::ConvaqError;

/// Frequency-threshold condition evaluated against one cohort's presence
/// state at a region.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Predicate {
    pub comparison: Comparison,
    pub value: f64,
    pub negate: bool,
    pub kind: VariationType,
}

impl Predicate {
    /// True when the predicate holds for `group` at `region`.
    ///
    /// The frequency is the fraction of the group's patients carrying the
    /// target type here; for `Normal` it is the fraction carrying no
    /// variation of any type. `negate` flips the frequency to `1 - f`.
    pub fn matches(&self, region: &Region, group: usize) -> bool {
        let size = region.state.group_size(group);
        let count = if self.kind == VariationType::Normal {
            region.state.normal_count(group)
        } else {
            region.state.count(group, self.kind)
        };

        let mut freq = count as f64 / size as f64;
        if self.negate {
            freq = 1.0 - freq;
        }
        self.comparison.holds(freq, self.value)
    }
}

/// Compact predicate notation used at the marshalling surfaces:
/// `<type><comparison><value>` with an optional leading `!` for negation,
/// e.g. `gain>=0.5` or `!loss<0.25`.
impl FromStr for Predicate {
    type Err = ConvaqError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (negate, rest) = match s.trim().strip_prefix('!') {
            Some(rest) => (true, rest),
            None => (false, s.trim()),
        };

        let op_at = rest
            .find(|ch| ch == '<' || ch == '>')
            .ok_or_else(|| ConvaqError::InvalidPredicate(s.to_string()))?;
        let (kind_str, tail) = rest.split_at(op_at);
        let op_len = if tail[1..].starts_with('=') { 2 } else { 1 };
        let (op_str, value_str) = tail.split_at(op_len);

        let kind = kind_str.trim().parse::<VariationType>()?;
        let comparison = op_str.parse::<Comparison>()?;
        let value = value_str
            .trim()
            .parse::<f64>()
            .map_err(|_| ConvaqError::InvalidPredicate(s.to_string()))?;

        Ok(Predicate {
            comparison,
            value,
            negate,
            kind,
        })
    }
}

/// Regions where BOTH group predicates hold become CNVRs.
///
/// Query results carry the fixed sentinel tag `Normal` no matter which
/// types the predicates tested, plus a `Query` score instead of a
/// p-value. Downstream consumers rely on that fixed tag; do not make it
/// echo the predicate types.
pub fn query_model(regions: &[Region], pred1: &Predicate, pred2: &Predicate) -> Vec<Cnvr> {
    regions
        .iter()
        .enumerate()
        .filter(|(_, r)| pred1.matches(r, 0) && pred2.matches(r, 1))
        .map(|(i, r)| Cnvr::from_region(i, r, VariationType::Normal, Score::Query))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convaq_structs::PresenceTable;

    fn region(bits: &[(usize, VariationType, u32)], np1: usize, np2: usize) -> Region {
        let mut state = PresenceTable::new(np1, np2);
        for &(group, kind, patient) in bits {
            state.set(group, kind, patient, true);
        }
        Region {
            chr: 0,
            start: 10,
            end: 20,
            length: 11,
            state,
        }
    }

    fn pred(s: &str) -> Predicate {
        s.parse().unwrap()
    }

    #[test]
    fn parses_compact_notation() {
        assert_eq!(
            pred("gain>=0.5"),
            Predicate {
                comparison: Comparison::Geq,
                value: 0.5,
                negate: false,
                kind: VariationType::Gain,
            }
        );
        assert_eq!(
            pred("!loss<0.25"),
            Predicate {
                comparison: Comparison::Less,
                value: 0.25,
                negate: true,
                kind: VariationType::Loss,
            }
        );
        assert_eq!(pred("normal > 0.9").kind, VariationType::Normal);
        assert!("gain=0.5".parse::<Predicate>().is_err());
        assert!("gain>=high".parse::<Predicate>().is_err());
        assert!("dup>=0.5".parse::<Predicate>().is_err());
    }

    #[test]
    fn frequency_of_two_thirds_meets_half_threshold() {
        let r = region(
            &[(0, VariationType::Gain, 0), (0, VariationType::Gain, 1)],
            3,
            1,
        );
        assert!(pred("gain>=0.5").matches(&r, 0));
        assert!(!pred("gain>0.7").matches(&r, 0));
    }

    #[test]
    fn normal_counts_patients_without_any_variation() {
        let r = region(
            &[(0, VariationType::Gain, 0), (0, VariationType::Loh, 1)],
            4,
            2,
        );
        // patients 2 and 3 carry nothing
        assert!(pred("normal>=0.5").matches(&r, 0));
        assert!(pred("normal>=1.0").matches(&r, 1));
    }

    #[test]
    fn negation_flips_the_frequency() {
        let r = region(&[(0, VariationType::Loss, 0)], 4, 1);
        // loss frequency 0.25, negated 0.75
        assert!(pred("!loss>=0.75").matches(&r, 0));
        assert!(!pred("loss>=0.75").matches(&r, 0));
    }

    #[test]
    fn both_group_predicates_must_hold() {
        let regions = vec![region(
            &[
                (0, VariationType::Gain, 0),
                (0, VariationType::Gain, 1),
                (1, VariationType::Gain, 0),
            ],
            2,
            4,
        )];
        let all = query_model(&regions, &pred("gain>=1.0"), &pred("gain<=0.25"));
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].kind, VariationType::Normal);
        assert_eq!(all[0].score, Score::Query);
        assert_eq!(all[0].region_idxs, vec![0]);

        let none = query_model(&regions, &pred("gain>=1.0"), &pred("gain>=0.5"));
        assert!(none.is_empty());
    }

    #[test]
    fn empty_group_never_matches() {
        let regions = vec![region(&[(0, VariationType::Gain, 0)], 1, 0)];
        // group 2 frequency is 0/0; the comparison is false, not a crash
        assert!(query_model(&regions, &pred("gain>=0.5"), &pred("gain>=0.0")).is_empty());
    }
}
