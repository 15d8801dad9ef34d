use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1};
use pyo3::exceptions::PyValueError;
use pyo3::prelude::*;
use rustc_hash::FxHashMap;

use crate::analysis::{self, Analysis, Config, Model};
use crate::convaq_structs::{Segment, VariationType};
use crate::error::ConvaqError;

fn to_py_err(e: ConvaqError) -> PyErr {
    PyValueError::new_err(e.to_string())
}

/// Chromosome names are interned to dense codes before they reach the
/// core and decoded again on output.
struct ChromosomeTable {
    codes: FxHashMap<String, u32>,
    names: Vec<String>,
}

impl ChromosomeTable {
    fn new() -> Self {
        ChromosomeTable {
            codes: FxHashMap::default(),
            names: Vec::new(),
        }
    }

    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&code) = self.codes.get(name) {
            return code;
        }
        let code = self.names.len() as u32;
        self.codes.insert(name.to_string(), code);
        self.names.push(name.to_string());
        code
    }

    fn name(&self, code: u32) -> &str {
        &self.names[code as usize]
    }
}

/// Convert one cohort's columns into segments. The cohort's patient
/// count is the highest patient index plus one.
fn build_segments(
    table: &mut ChromosomeTable,
    patients: &[i64],
    chrs: &[String],
    starts: &[i64],
    ends: &[i64],
    kinds: &[String],
) -> PyResult<(Vec<Segment>, usize)> {
    let n = patients.len();
    if chrs.len() != n || starts.len() != n || ends.len() != n || kinds.len() != n {
        return Err(PyValueError::new_err(
            "segment columns must all have the same length",
        ));
    }

    let mut segments = Vec::with_capacity(n);
    let mut npatients = 0usize;
    for i in 0..n {
        let patient = u32::try_from(patients[i]).map_err(|_| {
            PyValueError::new_err(format!(
                "patient index must be nonnegative, got {}",
                patients[i]
            ))
        })?;
        let kind: VariationType = kinds[i].parse().map_err(to_py_err)?;
        if kind == VariationType::Normal {
            return Err(PyValueError::new_err(
                "segments must carry gain, loss or loh, not normal",
            ));
        }
        npatients = npatients.max(patient as usize + 1);
        segments.push(Segment {
            patient,
            chr: table.intern(&chrs[i]),
            start: starts[i],
            end: ends[i],
            kind,
        });
    }

    Ok((segments, npatients))
}

fn resolve_threads(threads: usize) -> usize {
    if threads == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        threads
    }
}

type CnvrColumns = (
    Vec<String>,
    Py<PyArray1<i64>>,
    Py<PyArray1<i64>>,
    Py<PyArray1<i64>>,
    Vec<String>,
    Py<PyArray1<f64>>,
    Py<PyArray1<f64>>,
);

fn cnvr_columns(py: Python, table: &ChromosomeTable, analysis: &Analysis) -> CnvrColumns {
    let n = analysis.cnvrs.len();
    let mut chrs = Vec::with_capacity(n);
    let mut starts = Vec::with_capacity(n);
    let mut ends = Vec::with_capacity(n);
    let mut lengths = Vec::with_capacity(n);
    let mut kinds = Vec::with_capacity(n);
    let mut pvalues = Vec::with_capacity(n);
    let mut qvalues = Vec::with_capacity(n);

    for c in &analysis.cnvrs {
        chrs.push(table.name(c.chr).to_string());
        starts.push(c.start);
        ends.push(c.end);
        lengths.push(c.length);
        kinds.push(c.kind.name().to_string());
        pvalues.push(c.score.pvalue());
        qvalues.push(c.qvalue);
    }

    (
        chrs,
        starts.into_pyarray(py).to_owned().into(),
        ends.into_pyarray(py).to_owned().into(),
        lengths.into_pyarray(py).to_owned().into(),
        kinds,
        pvalues.into_pyarray(py).to_owned().into(),
        qvalues.into_pyarray(py).to_owned().into(),
    )
}

#[allow(clippy::too_many_arguments)]
fn run_analysis(
    py: Python,
    table: &mut ChromosomeTable,
    patients1: PyReadonlyArray1<i64>,
    chrs1: Vec<String>,
    starts1: PyReadonlyArray1<i64>,
    ends1: PyReadonlyArray1<i64>,
    types1: Vec<String>,
    patients2: PyReadonlyArray1<i64>,
    chrs2: Vec<String>,
    starts2: PyReadonlyArray1<i64>,
    ends2: PyReadonlyArray1<i64>,
    types2: Vec<String>,
    model: &str,
    cutoff: f64,
    query1: Option<String>,
    query2: Option<String>,
    merge: bool,
    merge_threshold: u32,
    qvalues: bool,
    qvalues_rep: usize,
    threads: usize,
) -> PyResult<Analysis> {
    let (segments1, npatients1) = build_segments(
        table,
        patients1.as_slice()?,
        &chrs1,
        starts1.as_slice()?,
        ends1.as_slice()?,
        &types1,
    )?;
    let (segments2, npatients2) = build_segments(
        table,
        patients2.as_slice()?,
        &chrs2,
        starts2.as_slice()?,
        ends2.as_slice()?,
        &types2,
    )?;

    let config = Config {
        model: Model::parse(model, cutoff, query1.as_deref(), query2.as_deref())
            .map_err(to_py_err)?,
        merge_threshold: merge.then_some(merge_threshold),
        qvalue_repetitions: qvalues.then_some(qvalues_rep),
        workers: resolve_threads(threads),
    };

    py.allow_threads(|| analysis::run(&config, &segments1, &segments2, npatients1, npatients2))
        .map_err(to_py_err)
}

/// Compare two cohorts of CNV segments and return the scored CNVRs as
/// columnar arrays: (chr, start, end, length, type, pvalue, qvalue).
#[pyfunction]
#[pyo3(signature = (
    patients1, chrs1, starts1, ends1, types1,
    patients2, chrs2, starts2, ends2, types2,
    model = "statistical", cutoff = 0.05, query1 = None, query2 = None,
    merge = false, merge_threshold = 0,
    qvalues = false, qvalues_rep = 100,
    threads = 0,
))]
#[allow(clippy::too_many_arguments)]
pub fn convaq_analysis(
    py: Python,
    patients1: PyReadonlyArray1<i64>,
    chrs1: Vec<String>,
    starts1: PyReadonlyArray1<i64>,
    ends1: PyReadonlyArray1<i64>,
    types1: Vec<String>,
    patients2: PyReadonlyArray1<i64>,
    chrs2: Vec<String>,
    starts2: PyReadonlyArray1<i64>,
    ends2: PyReadonlyArray1<i64>,
    types2: Vec<String>,
    model: &str,
    cutoff: f64,
    query1: Option<String>,
    query2: Option<String>,
    merge: bool,
    merge_threshold: u32,
    qvalues: bool,
    qvalues_rep: usize,
    threads: usize,
) -> PyResult<CnvrColumns> {
    let mut table = ChromosomeTable::new();
    let analysis = run_analysis(
        py, &mut table, patients1, chrs1, starts1, ends1, types1, patients2, chrs2, starts2,
        ends2, types2, model, cutoff, query1, query2, merge, merge_threshold, qvalues,
        qvalues_rep, threads,
    )?;
    Ok(cnvr_columns(py, &table, &analysis))
}

/// Like `convaq_analysis`, with two extra trailing members:
/// per-CNVR origin-region frequencies indexed `[cnvr][group][type]` (the
/// type axis is gain, loss, loh) and per-CNVR patient classifications
/// indexed `[cnvr][group][patient]` as lists of type names.
#[pyfunction]
#[pyo3(signature = (
    patients1, chrs1, starts1, ends1, types1,
    patients2, chrs2, starts2, ends2, types2,
    model = "statistical", cutoff = 0.05, query1 = None, query2 = None,
    merge = false, merge_threshold = 0,
    qvalues = false, qvalues_rep = 100,
    threads = 0,
))]
#[allow(clippy::too_many_arguments)]
pub fn convaq_analysis_detailed(
    py: Python,
    patients1: PyReadonlyArray1<i64>,
    chrs1: Vec<String>,
    starts1: PyReadonlyArray1<i64>,
    ends1: PyReadonlyArray1<i64>,
    types1: Vec<String>,
    patients2: PyReadonlyArray1<i64>,
    chrs2: Vec<String>,
    starts2: PyReadonlyArray1<i64>,
    ends2: PyReadonlyArray1<i64>,
    types2: Vec<String>,
    model: &str,
    cutoff: f64,
    query1: Option<String>,
    query2: Option<String>,
    merge: bool,
    merge_threshold: u32,
    qvalues: bool,
    qvalues_rep: usize,
    threads: usize,
) -> PyResult<(
    Vec<String>,
    Py<PyArray1<i64>>,
    Py<PyArray1<i64>>,
    Py<PyArray1<i64>>,
    Vec<String>,
    Py<PyArray1<f64>>,
    Py<PyArray1<f64>>,
    Vec<Vec<Vec<Vec<f64>>>>,
    Vec<Vec<Vec<Vec<String>>>>,
)> {
    let mut table = ChromosomeTable::new();
    let analysis = run_analysis(
        py, &mut table, patients1, chrs1, starts1, ends1, types1, patients2, chrs2, starts2,
        ends2, types2, model, cutoff, query1, query2, merge, merge_threshold, qvalues,
        qvalues_rep, threads,
    )?;

    let mut frequencies = Vec::with_capacity(analysis.cnvrs.len());
    let mut states = Vec::with_capacity(analysis.cnvrs.len());
    for c in &analysis.cnvrs {
        let mut cnvr_freqs = Vec::with_capacity(2);
        let mut cnvr_states = Vec::with_capacity(2);
        for group in 0..2 {
            cnvr_freqs.push(
                VariationType::TESTED
                    .iter()
                    .map(|&kind| c.frequencies(&analysis.regions, group, kind))
                    .collect::<Vec<_>>(),
            );
            cnvr_states.push(
                c.patient_states(&analysis.regions, group)
                    .into_iter()
                    .map(|kinds| kinds.into_iter().map(|k| k.name().to_string()).collect())
                    .collect::<Vec<Vec<String>>>(),
            );
        }
        frequencies.push(cnvr_freqs);
        states.push(cnvr_states);
    }

    let (chrs, starts, ends, lengths, kinds, pvalues, qvalues_out) =
        cnvr_columns(py, &table, &analysis);
    Ok((
        chrs, starts, ends, lengths, kinds, pvalues, qvalues_out, frequencies, states,
    ))
}
