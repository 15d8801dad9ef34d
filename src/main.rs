use clap::Parser;
use polars::prelude::*;
use rustc_hash::FxHashMap;

use std::path::PathBuf;

use convaq::analysis::{self, Config, Model};
use convaq::convaq_structs::{Segment, VariationType};

/// Compare two cohorts of CNV segment calls and report genomic regions
/// where variation frequencies differ.
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Segment table for cohort 1 (TSV with patient, chr, start, end, type)
    input1: PathBuf,

    /// Segment table for cohort 2
    input2: PathBuf,

    /// Scoring model: statistical or query
    #[arg(long, default_value = "statistical")]
    model: String,

    /// P-value cutoff for the statistical model
    #[arg(long, default_value_t = 0.05)]
    cutoff: f64,

    /// Cohort 1 predicate for the query model, e.g. "gain>=0.5"
    #[arg(long)]
    query1: Option<String>,

    /// Cohort 2 predicate for the query model
    #[arg(long)]
    query2: Option<String>,

    /// Merge adjacent same-type CNVRs
    #[arg(long)]
    merge: bool,

    /// Largest gap in bases the merge pass closes
    #[arg(long, default_value_t = 0)]
    merge_threshold: u32,

    /// Estimate permutation q-values
    #[arg(long)]
    qvalues: bool,

    /// Permutation repetitions
    #[arg(long, default_value_t = 100)]
    qvalues_rep: usize,

    /// Worker threads for the permutation phase; 0 uses all cores
    #[arg(long, default_value_t = 0)]
    threads: usize,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args = Args::parse();

    let schema = Schema::from_iter(vec![
        Field::new("patient".into(), DataType::Int64),
        Field::new("chr".into(), DataType::String),
        Field::new("start".into(), DataType::Int64),
        Field::new("end".into(), DataType::Int64),
        Field::new("type".into(), DataType::String),
    ]);

    let mut chr_codes: FxHashMap<String, u32> = FxHashMap::default();
    let mut chr_names: Vec<String> = Vec::new();

    let (segments1, npatients1) =
        read_segments(&args.input1, &schema, &mut chr_codes, &mut chr_names)?;
    let (segments2, npatients2) =
        read_segments(&args.input2, &schema, &mut chr_codes, &mut chr_names)?;

    let workers = if args.threads == 0 {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1)
    } else {
        args.threads
    };

    let config = Config {
        model: Model::parse(
            &args.model,
            args.cutoff,
            args.query1.as_deref(),
            args.query2.as_deref(),
        )?,
        merge_threshold: args.merge.then_some(args.merge_threshold),
        qvalue_repetitions: args.qvalues.then_some(args.qvalues_rep),
        workers,
    };

    let analysis = analysis::run(&config, &segments1, &segments2, npatients1, npatients2)?;

    let cnvrs = &analysis.cnvrs;
    let mut df = DataFrame::new(vec![
        Column::new(
            "chr".into(),
            cnvrs
                .iter()
                .map(|c| chr_names[c.chr as usize].clone())
                .collect::<Vec<String>>(),
        ),
        Column::new("start".into(), cnvrs.iter().map(|c| c.start).collect::<Vec<i64>>()),
        Column::new("end".into(), cnvrs.iter().map(|c| c.end).collect::<Vec<i64>>()),
        Column::new(
            "length".into(),
            cnvrs.iter().map(|c| c.length).collect::<Vec<i64>>(),
        ),
        Column::new(
            "type".into(),
            cnvrs
                .iter()
                .map(|c| c.kind.name().to_string())
                .collect::<Vec<String>>(),
        ),
        Column::new(
            "pvalue".into(),
            cnvrs.iter().map(|c| c.score.pvalue()).collect::<Vec<f64>>(),
        ),
        Column::new(
            "qvalue".into(),
            cnvrs.iter().map(|c| c.qvalue).collect::<Vec<f64>>(),
        ),
    ])?;

    let stdout = std::io::stdout();
    let mut handle = stdout.lock();
    CsvWriter::new(&mut handle)
        .include_header(true)
        .with_separator(b'\t')
        .finish(&mut df)?;

    Ok(())
}

/// Read one cohort's segment table, interning chromosome names into the
/// shared code table. The cohort's patient count is the highest patient
/// index plus one.
fn read_segments(
    path: &PathBuf,
    schema: &Schema,
    chr_codes: &mut FxHashMap<String, u32>,
    chr_names: &mut Vec<String>,
) -> Result<(Vec<Segment>, usize), Box<dyn std::error::Error>> {
    let parse_options: CsvParseOptions = CsvParseOptions::default().with_separator(b'\t');
    let df = CsvReadOptions::default()
        .with_has_header(true)
        .with_schema_overwrite(Some(std::sync::Arc::new(schema.clone())))
        .with_rechunk(true)
        .with_parse_options(parse_options)
        .try_into_reader_with_file_path(Some(path.clone()))?
        .finish()?;

    let patients = df.column("patient")?.i64()?;
    let chrs = df.column("chr")?.str()?;
    let starts = df.column("start")?.i64()?;
    let ends = df.column("end")?.i64()?;
    let types = df.column("type")?.str()?;

    let mut segments = Vec::with_capacity(df.height());
    let mut npatients = 0usize;
    for i in 0..df.height() {
        let row_err = || format!("{}: row {} has missing fields", path.display(), i);
        let patient = patients.get(i).ok_or_else(row_err)?;
        let patient = u32::try_from(patient)
            .map_err(|_| format!("patient index must be nonnegative, got {patient}"))?;
        let chr = chrs.get(i).ok_or_else(row_err)?;
        let kind: VariationType = types.get(i).ok_or_else(row_err)?.parse()?;
        if kind == VariationType::Normal {
            return Err("segments must carry gain, loss or loh, not normal".into());
        }

        let code = match chr_codes.get(chr) {
            Some(&code) => code,
            None => {
                let code = chr_names.len() as u32;
                chr_codes.insert(chr.to_string(), code);
                chr_names.push(chr.to_string());
                code
            }
        };

        npatients = npatients.max(patient as usize + 1);
        segments.push(Segment {
            patient,
            chr: code,
            start: starts.get(i).ok_or_else(row_err)?,
            end: ends.get(i).ok_or_else(row_err)?,
            kind,
        });
    }

    Ok((segments, npatients))
}
