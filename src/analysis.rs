use log::{debug, info};
use radsort::sort_by_key;

use crate::convaq_structs::{Cnvr, Region, Segment};
use crate::error::ConvaqError;
use crate::merge::merge_adjacent;
use crate::permutation;
use crate::query::{query_model, Predicate};
use crate::regions::sweep_line_regions;
use crate::statistical::statistical_model;

/// Which model scores the swept regions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Model {
    Statistical { cutoff: f64 },
    Query { group1: Predicate, group2: Predicate },
}

impl Model {
    /// Selector parsing shared by the marshalling surfaces: the
    /// statistical model takes the cutoff, the query model requires one
    /// predicate string per cohort.
    pub fn parse(
        model: &str,
        cutoff: f64,
        query1: Option<&str>,
        query2: Option<&str>,
    ) -> Result<Model, ConvaqError> {
        match model.to_ascii_lowercase().as_str() {
            "statistical" | "stat" => Ok(Model::Statistical { cutoff }),
            "query" => {
                let group1 = query1
                    .ok_or_else(|| {
                        ConvaqError::InvalidPredicate("query model needs a group 1 predicate".into())
                    })?
                    .parse()?;
                let group2 = query2
                    .ok_or_else(|| {
                        ConvaqError::InvalidPredicate("query model needs a group 2 predicate".into())
                    })?
                    .parse()?;
                Ok(Model::Query { group1, group2 })
            }
            other => Err(ConvaqError::InvalidModel(other.to_string())),
        }
    }
}

/// One full run's configuration. `workers` must already be resolved to a
/// concrete count by the caller; the core never inspects host parallelism.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    pub model: Model,
    /// Merge pass gap threshold in bases; `None` skips the merge pass.
    pub merge_threshold: Option<u32>,
    /// Permutation repetition count; `None` skips q-value computation.
    pub qvalue_repetitions: Option<usize>,
    pub workers: usize,
}

impl Config {
    /// Reject invalid configurations synchronously, before any pipeline
    /// work starts.
    pub fn validate(&self) -> Result<(), ConvaqError> {
        if let Model::Statistical { cutoff } = self.model {
            if !(0.0..=1.0).contains(&cutoff) {
                return Err(ConvaqError::InvalidCutoff(cutoff));
            }
        }
        match self.qvalue_repetitions {
            Some(0) => return Err(ConvaqError::NoRepetitions),
            Some(_) if self.workers == 0 => return Err(ConvaqError::NoWorkers),
            _ => {}
        }
        Ok(())
    }
}

/// Final CNVR list plus the real-data regions they originate from, so the
/// per-region frequency and per-patient state accessors on [`Cnvr`] can
/// be served after the run.
#[derive(Debug)]
pub struct Analysis {
    pub cnvrs: Vec<Cnvr>,
    pub regions: Vec<Region>,
}

/// Execute the pipeline on one pair of cohorts: sweep the segments into
/// regions, score them with the configured model, optionally merge
/// adjacent candidates, sort by p-value, and optionally estimate
/// permutation q-values (re-sorting by q-value when they are computed).
pub fn run(
    config: &Config,
    segments1: &[Segment],
    segments2: &[Segment],
    npatients1: usize,
    npatients2: usize,
) -> Result<Analysis, ConvaqError> {
    config.validate()?;

    let regions = sweep_line_regions(segments1, segments2, npatients1, npatients2);

    let mut cnvrs = match &config.model {
        Model::Statistical { cutoff } => {
            statistical_model(&regions, npatients1, npatients2, *cutoff)
        }
        Model::Query { group1, group2 } => query_model(&regions, group1, group2),
    };
    debug!(
        "model produced {} candidates from {} regions",
        cnvrs.len(),
        regions.len()
    );

    if let Some(threshold) = config.merge_threshold {
        let before = cnvrs.len();
        cnvrs = merge_adjacent(cnvrs, threshold);
        debug!("merge pass: {} -> {} CNVRs", before, cnvrs.len());
    }

    sort_by_key(&mut cnvrs, |c| c.score.pvalue());

    if let Some(repetitions) = config.qvalue_repetitions {
        permutation::assign_qvalues(
            &mut cnvrs,
            segments1,
            segments2,
            npatients1,
            npatients2,
            &config.model,
            config.merge_threshold,
            repetitions,
            config.workers,
        );
        sort_by_key(&mut cnvrs, |c| c.qvalue);
    }

    info!("analysis finished with {} CNVRs", cnvrs.len());

    Ok(Analysis { cnvrs, regions })
}
