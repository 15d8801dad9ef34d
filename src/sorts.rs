use radsort::sort_by_key;
use rustc_hash::FxHashMap;

use crate::convaq_structs::Event;
use crate::convaq_structs::Segment;

pub fn build_events(segments: &[Segment], group: usize, events: &mut Vec<Event>) {
    for s in segments {
        events.push(Event {
            pos: s.start,
            kind: s.kind,
            patient: s.patient,
            is_start: true,
            group,
        });
        events.push(Event {
            pos: s.end,
            kind: s.kind,
            patient: s.patient,
            is_start: false,
            group,
        });
    }
}

/// Sorted event stream for one chromosome's segments from both cohorts.
///
/// Sorted by position only; radsort is stable, so events at the same
/// position keep insertion order (group 1 before group 2, each segment's
/// start before its paired end). The sweep applies all events at one
/// position as a single batch, which is what the level encoding of the
/// presence table relies on.
pub fn build_sorted_events(segments1: &[Segment], segments2: &[Segment]) -> Vec<Event> {
    let mut events: Vec<Event> = Vec::with_capacity(2 * (segments1.len() + segments2.len()));

    build_events(segments1, 0, &mut events);
    build_events(segments2, 1, &mut events);

    sort_by_key(&mut events, |e| e.pos);

    events
}

pub fn split_by_chromosome(segments: &[Segment]) -> FxHashMap<u32, Vec<Segment>> {
    let mut result: FxHashMap<u32, Vec<Segment>> = FxHashMap::default();
    for s in segments {
        result.entry(s.chr).or_default().push(s.clone());
    }
    result
}

/// Group both cohorts' segments by chromosome. A chromosome present in
/// only one cohort is paired with an empty vector for the other.
pub fn align_segments_on_chromosome(
    segments1: &[Segment],
    segments2: &[Segment],
) -> FxHashMap<u32, (Vec<Segment>, Vec<Segment>)> {
    let map1 = split_by_chromosome(segments1);
    let map2 = split_by_chromosome(segments2);

    let mut result: FxHashMap<u32, (Vec<Segment>, Vec<Segment>)> = FxHashMap::default();

    for (chr, group1) in map1 {
        result.insert(chr, (group1, Vec::new()));
    }
    for (chr, group2) in map2 {
        result
            .entry(chr)
            .or_insert_with(|| (Vec::new(), Vec::new()))
            .1 = group2;
    }

    result
}
