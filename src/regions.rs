use log::debug;

use crate::convaq_structs::{PresenceTable, Region, Segment};
use crate::sorts;

/// Sweep one chromosome's event stream into state-labeled regions.
///
/// All events sharing a position are applied as one batch before anything
/// is emitted; after a batch, if events remain, the span from the previous
/// boundary to the next distinct position (both inclusive) becomes a
/// region carrying a deep copy of the running presence table. Nothing is
/// emitted after the final batch. Consecutive regions therefore share
/// their boundary position.
pub fn sweep_chromosome(
    chr: u32,
    segments1: &[Segment],
    segments2: &[Segment],
    npatients1: usize,
    npatients2: usize,
    regions: &mut Vec<Region>,
) {
    let events = sorts::build_sorted_events(segments1, segments2);
    if events.is_empty() {
        return;
    };

    let mut state = PresenceTable::new(npatients1, npatients2);

    let mut next_pos = events.first().unwrap().pos;
    let mut i = 0;
    while i < events.len() {
        while i < events.len() && events[i].pos == next_pos {
            let e = &events[i];
            // level encoding: a start sets presence, an end clears it
            state.set(e.group, e.kind, e.patient, e.is_start);
            i += 1;
        }
        if i >= events.len() {
            break;
        }

        let current_pos = next_pos;
        next_pos = events[i].pos;

        regions.push(Region {
            chr,
            start: current_pos,
            end: next_pos,
            length: next_pos - current_pos + 1,
            state: state.clone(),
        });
    }
}

/// Regions for every chromosome present in either cohort.
///
/// Chromosome processing order is unspecified; callers that need a
/// deterministic order sort the result by (chr, start) themselves.
pub fn sweep_line_regions(
    segments1: &[Segment],
    segments2: &[Segment],
    npatients1: usize,
    npatients2: usize,
) -> Vec<Region> {
    let mut regions = Vec::new();

    for (chr, (group1, group2)) in sorts::align_segments_on_chromosome(segments1, segments2) {
        sweep_chromosome(chr, &group1, &group2, npatients1, npatients2, &mut regions);
    }

    debug!(
        "swept {} + {} segments into {} regions",
        segments1.len(),
        segments2.len(),
        regions.len()
    );

    regions
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convaq_structs::VariationType;

    fn seg(patient: u32, chr: u32, start: i64, end: i64, kind: VariationType) -> Segment {
        Segment {
            patient,
            chr,
            start,
            end,
            kind,
        }
    }

    fn sorted(mut regions: Vec<Region>) -> Vec<Region> {
        radsort::sort_by_key(&mut regions, |r| r.start);
        radsort::sort_by_key(&mut regions, |r| r.chr);
        regions
    }

    #[test]
    fn no_segments_no_regions() {
        assert!(sweep_line_regions(&[], &[], 3, 3).is_empty());
    }

    #[test]
    fn single_segment_single_region() {
        let regions =
            sweep_line_regions(&[seg(0, 1, 100, 200, VariationType::Gain)], &[], 1, 1);
        assert_eq!(regions.len(), 1);
        let r = &regions[0];
        assert_eq!((r.start, r.end, r.length), (100, 200, 101));
        assert!(r.state.get(0, VariationType::Gain, 0));
        assert_eq!(r.state.count(1, VariationType::Gain), 0);
    }

    #[test]
    fn regions_tile_the_event_span_and_share_boundaries() {
        let regions = sorted(sweep_line_regions(
            &[seg(0, 1, 100, 300, VariationType::Gain)],
            &[seg(0, 1, 200, 400, VariationType::Loss)],
            1,
            1,
        ));
        // boundaries: 100, 200, 300, 400
        assert_eq!(regions.len(), 3);
        assert_eq!((regions[0].start, regions[0].end), (100, 200));
        assert_eq!((regions[1].start, regions[1].end), (200, 300));
        assert_eq!((regions[2].start, regions[2].end), (300, 400));
        // each region starts where the previous one ends
        assert_eq!(regions[0].end, regions[1].start);
        assert_eq!(regions[1].end, regions[2].start);

        assert!(regions[0].state.get(0, VariationType::Gain, 0));
        assert!(!regions[0].state.get(1, VariationType::Loss, 0));
        assert!(regions[1].state.get(0, VariationType::Gain, 0));
        assert!(regions[1].state.get(1, VariationType::Loss, 0));
        // the middle batch at 300 clears the gain before the last region
        assert!(!regions[2].state.get(0, VariationType::Gain, 0));
        assert!(regions[2].state.get(1, VariationType::Loss, 0));
    }

    #[test]
    fn emitted_state_is_independent_of_later_mutation() {
        let regions = sorted(sweep_line_regions(
            &[
                seg(0, 1, 100, 200, VariationType::Gain),
                seg(1, 1, 150, 250, VariationType::Gain),
            ],
            &[],
            2,
            1,
        ));
        assert_eq!(regions.len(), 3);
        assert_eq!(regions[0].state.count(0, VariationType::Gain), 1);
        assert_eq!(regions[1].state.count(0, VariationType::Gain), 2);
        assert_eq!(regions[2].state.count(0, VariationType::Gain), 1);
    }

    #[test]
    fn end_event_clears_presence_for_overlapping_same_patient_segments() {
        // level encoding, not a counter: the first segment's end at 150
        // clears the bit even though the second segment is still open
        let regions = sorted(sweep_line_regions(
            &[
                seg(0, 1, 100, 150, VariationType::Gain),
                seg(0, 1, 120, 200, VariationType::Gain),
            ],
            &[],
            1,
            1,
        ));
        assert_eq!(regions.len(), 3);
        assert!(regions[0].state.get(0, VariationType::Gain, 0));
        assert!(regions[1].state.get(0, VariationType::Gain, 0));
        assert!(!regions[2].state.get(0, VariationType::Gain, 0));
    }

    #[test]
    fn chromosomes_are_swept_independently() {
        let regions = sweep_line_regions(
            &[
                seg(0, 1, 100, 200, VariationType::Gain),
                seg(0, 2, 500, 600, VariationType::Loss),
            ],
            &[],
            1,
            1,
        );
        assert_eq!(regions.len(), 2);
        let r1 = regions.iter().find(|r| r.chr == 1).unwrap();
        let r2 = regions.iter().find(|r| r.chr == 2).unwrap();
        assert_eq!((r1.start, r1.end), (100, 200));
        assert_eq!((r2.start, r2.end), (500, 600));
        assert!(!r2.state.get(0, VariationType::Gain, 0));
        assert!(r2.state.get(0, VariationType::Loss, 0));
    }
}
