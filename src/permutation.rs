use log::{debug, info};
use rand::seq::SliceRandom;

use crate::analysis::Model;
use crate::convaq_structs::{Cnvr, Segment, N_SLOTS};
use crate::merge::merge_adjacent;
use crate::query::query_model;
use crate::regions::sweep_line_regions;
use crate::statistical::statistical_model;

/// Empirical per-type null distribution of the best (max) CNVR length
/// under random patient relabeling.
///
/// Repetitions are statically interleaved across workers (worker `w` owns
/// repetitions `w, w + workers, ...`), so every repetition index is
/// written by exactly one worker and the per-worker accumulators merge
/// after join without any synchronization. The result is independent of
/// thread scheduling; only the shuffles themselves are random, with an
/// independent thread-local generator per worker.
pub fn best_lengths(
    segments1: &[Segment],
    segments2: &[Segment],
    npatients1: usize,
    npatients2: usize,
    model: &Model,
    merge_threshold: Option<u32>,
    repetitions: usize,
    workers: usize,
) -> [Vec<i64>; N_SLOTS] {
    let mut merged: [Vec<i64>; N_SLOTS] = std::array::from_fn(|_| vec![0; repetitions]);

    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..workers)
            .map(|offset| {
                scope.spawn(move || {
                    let mut best: [Vec<i64>; N_SLOTS] =
                        std::array::from_fn(|_| vec![0; repetitions]);
                    let mut rng = rand::thread_rng();

                    // pooled (group, patient) pairs across both cohorts
                    let mut pairs: Vec<(usize, u32)> = (0..npatients1)
                        .map(|p| (0, p as u32))
                        .chain((0..npatients2).map(|p| (1, p as u32)))
                        .collect();

                    for rep in (offset..repetitions).step_by(workers) {
                        pairs.shuffle(&mut rng);
                        run_repetition(
                            &pairs,
                            segments1,
                            segments2,
                            npatients1,
                            npatients2,
                            model,
                            merge_threshold,
                            |slot, length| best[slot][rep] = best[slot][rep].max(length),
                        );
                    }

                    best
                })
            })
            .collect();

        for handle in handles {
            let worker_best = handle.join().expect("permutation worker panicked");
            for slot in 0..N_SLOTS {
                for (m, w) in merged[slot].iter_mut().zip(worker_best[slot].iter()) {
                    *m = (*m).max(*w);
                }
            }
        }
    });

    merged
}

/// One relabeling trial: the first `npatients1` shuffled pairs become
/// synthetic group 0 and the rest synthetic group 1 (each original
/// group's size is preserved, not its membership). Patients are
/// renumbered densely within their synthetic group so the rebuilt
/// presence tables stay correctly sized, then the full pipeline reruns
/// on the re-tagged segments.
fn run_repetition<F: FnMut(usize, i64)>(
    pairs: &[(usize, u32)],
    segments1: &[Segment],
    segments2: &[Segment],
    npatients1: usize,
    npatients2: usize,
    model: &Model,
    merge_threshold: Option<u32>,
    mut record: F,
) {
    let mut remap = [vec![(0usize, 0u32); npatients1], vec![(0usize, 0u32); npatients2]];
    for (i, &(group, patient)) in pairs.iter().enumerate() {
        remap[group][patient as usize] = if i < npatients1 {
            (0, i as u32)
        } else {
            (1, (i - npatients1) as u32)
        };
    }

    let mut relabeled: [Vec<Segment>; 2] = [
        Vec::with_capacity(segments1.len()),
        Vec::with_capacity(segments2.len()),
    ];
    for s in segments1 {
        let (group, patient) = remap[0][s.patient as usize];
        relabeled[group].push(Segment {
            patient,
            ..s.clone()
        });
    }
    for s in segments2 {
        let (group, patient) = remap[1][s.patient as usize];
        relabeled[group].push(Segment {
            patient,
            ..s.clone()
        });
    }

    let regions = sweep_line_regions(&relabeled[0], &relabeled[1], npatients1, npatients2);

    let mut cnvrs = match model {
        Model::Statistical { cutoff } => {
            statistical_model(&regions, npatients1, npatients2, *cutoff)
        }
        Model::Query { group1, group2 } => query_model(&regions, group1, group2),
    };
    if let Some(threshold) = merge_threshold {
        cnvrs = merge_adjacent(cnvrs, threshold);
    }

    // distinct same-type CNVRs within one trial reduce to a single max
    for c in &cnvrs {
        record(c.kind.slot(), c.length);
    }
}

/// `qvalue` = fraction of relabeling trials whose best same-type region
/// was strictly longer than the observed CNVR.
pub fn apply_qvalues(results: &mut [Cnvr], best: &[Vec<i64>; N_SLOTS], repetitions: usize) {
    for r in results.iter_mut() {
        let better = best[r.kind.slot()].iter().filter(|&&l| l > r.length).count();
        r.qvalue = better as f64 / repetitions as f64;
    }
}

#[allow(clippy::too_many_arguments)]
pub fn assign_qvalues(
    results: &mut [Cnvr],
    segments1: &[Segment],
    segments2: &[Segment],
    npatients1: usize,
    npatients2: usize,
    model: &Model,
    merge_threshold: Option<u32>,
    repetitions: usize,
    workers: usize,
) {
    info!(
        "permutation phase: {} repetitions across {} workers",
        repetitions, workers
    );
    let best = best_lengths(
        segments1,
        segments2,
        npatients1,
        npatients2,
        model,
        merge_threshold,
        repetitions,
        workers,
    );
    debug!(
        "null best lengths per slot: {:?}",
        best.iter().map(|b| b.iter().max()).collect::<Vec<_>>()
    );
    apply_qvalues(results, &best, repetitions);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::convaq_structs::{Score, VariationType};

    fn gain_segment(patient: u32, chr: u32, start: i64, end: i64) -> Segment {
        Segment {
            patient,
            chr,
            start,
            end,
            kind: VariationType::Gain,
        }
    }

    #[test]
    fn aggregation_counts_strictly_longer_trials() {
        let mut best: [Vec<i64>; N_SLOTS] = std::array::from_fn(|_| vec![0; 4]);
        best[VariationType::Gain.slot()] = vec![10, 200, 150, 100];

        let mut results = vec![Cnvr {
            chr: 0,
            start: 0,
            end: 99,
            length: 100,
            kind: VariationType::Gain,
            score: Score::Fisher(0.01),
            qvalue: 0.0,
            region_idxs: vec![0],
        }];
        apply_qvalues(&mut results, &best, 4);
        // 200 and 150 beat the observed length; 100 ties and does not
        assert_eq!(results[0].qvalue, 0.5);
    }

    #[test]
    fn qvalue_zero_when_no_trial_is_longer() {
        let best: [Vec<i64>; N_SLOTS] = std::array::from_fn(|_| vec![5; 8]);
        let mut results = vec![Cnvr {
            chr: 0,
            start: 0,
            end: 99,
            length: 100,
            kind: VariationType::Loss,
            score: Score::Fisher(0.01),
            qvalue: 1.0,
            region_idxs: vec![0],
        }];
        apply_qvalues(&mut results, &best, 8);
        assert_eq!(results[0].qvalue, 0.0);
    }

    #[test]
    fn best_lengths_cover_every_repetition_for_any_worker_count() {
        // with one patient per group every relabeling yields the same
        // regions, so the null is deterministic regardless of shuffling
        let segments1 = vec![gain_segment(0, 1, 100, 200)];
        let model = Model::Statistical { cutoff: 1.0 };

        for workers in [1, 2, 3] {
            let best = best_lengths(&segments1, &[], 1, 1, &model, None, 5, workers);
            assert_eq!(best[VariationType::Gain.slot()], vec![101; 5]);
            // slots without any observed CNVR of that type keep zeros
            assert_eq!(best[VariationType::Normal.slot()], vec![0; 5]);
        }
    }

    #[test]
    fn relabeling_preserves_group_sizes() {
        // two patients in group 1 with very different footprints; whatever
        // the shuffle, synthetic groups keep sizes 2 and 1 and the sweep
        // never sees a patient index outside its group's table
        let segments1 = vec![
            gain_segment(0, 1, 0, 1000),
            gain_segment(1, 1, 500, 600),
        ];
        let segments2 = vec![gain_segment(0, 1, 200, 800)];
        let model = Model::Statistical { cutoff: 1.0 };

        let best = best_lengths(&segments1, &segments2, 2, 1, &model, None, 16, 4);
        for rep in 0..16 {
            assert!(best[VariationType::Gain.slot()][rep] > 0);
        }
    }
}
