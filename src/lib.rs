//! Randomized stress-test input profile synthesis for test-rig simulation.
//!
//! A deterministic baseline of named time/value curves is combined with
//! rate-limited, sample-and-held random delta waveforms, consolidated on a
//! shared timeline, and split into bounded artifact chunks the rig tooling
//! can load. A fixed calibration seed reproduces every output byte.

pub mod baseline;
pub mod composite;
pub mod curve;
pub mod emitter;
pub mod generator;
pub mod random;
pub mod tokens;

use std::fs;
use std::path::PathBuf;

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;

pub use baseline::BaselineSet;
pub use composite::{assemble, CompositeCurveSet};
pub use curve::{BreakpointCurve, TIME_PAD, TIME_RESOLUTION};
pub use emitter::{plan_chunks, render_chunk, write_chunk, ChunkWindow, MAX_OUTPUT_CURVES};
pub use generator::{RandomSpecSet, WaveformGenerator};
pub use random::{DistributionKind, SeedAllocator};
pub use tokens::TokenFile;

pub const OUTPUT_SCHEMA_VERSION: &str = "1.0.0";

#[derive(Debug, Error)]
pub enum GenError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{file}:{line}:{column}: {msg}")]
    Parse {
        file: String,
        line: usize,
        column: usize,
        msg: String,
    },
    #[error("curve {name}: time not increasing at breakpoint {index} near t={time}")]
    TimeOrder { name: String, index: usize, time: f64 },
    #[error("random variable {0} has no matching baseline curve")]
    UnmatchedVariable(String),
    #[error("variable {name}: update period {update} must be positive")]
    BadUpdateRate { name: String, update: f64 },
    #[error("curve {name}: consolidation exceeds {max} breakpoints")]
    TooManyBreakpoints { name: String, max: usize },
    #[error("chunk segmentation failed after {chunks} chunks at t={at:.3}")]
    TooManyChunks { chunks: usize, at: f64 },
}

impl GenError {
    pub(crate) fn parse(file: &str, line: usize, column: usize, msg: impl Into<String>) -> Self {
        GenError::Parse {
            file: file.to_string(),
            line,
            column,
            msg: msg.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub baseline: PathBuf,
    pub randomization: PathBuf,
    pub out_dir: PathBuf,
    pub stem: Option<String>,
    pub calibration_seed: Option<u64>,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub seed: u64,
    pub chunk_count: usize,
    pub files: Vec<PathBuf>,
    pub manifest_path: PathBuf,
}

#[derive(Debug, Clone, Serialize)]
pub struct Manifest {
    pub schema_version: String,
    pub seed: u64,
    pub baseline: String,
    pub randomization: String,
    pub chunks: usize,
    pub files: Vec<String>,
}

/// Runs the full pipeline: load and parse both inputs, synthesize and
/// consolidate every variable, plan chunks, then write one artifact
/// quadruple per chunk plus a run manifest.
///
/// All parsing, synthesis, and rendering complete before the first file
/// is opened, so a failing run leaves nothing behind.
pub fn run(opts: &RunOptions) -> Result<RunSummary, GenError> {
    let base_tokens = TokenFile::load(&opts.baseline)?;
    let random_tokens = TokenFile::load(&opts.randomization)?;

    let base = BaselineSet::from_tokens(&base_tokens)?;
    let mut seeds = SeedAllocator::new(opts.calibration_seed);
    let seed = seeds.base_seed();
    let spec = RandomSpecSet::from_tokens(&random_tokens, &mut seeds)?;

    let set = assemble(base, spec)?;
    let windows = plan_chunks(&set)?;

    let stem = opts
        .stem
        .clone()
        .unwrap_or_else(|| default_stem(opts.calibration_seed, seed));

    let rendered: Vec<_> = windows
        .iter()
        .enumerate()
        .map(|(i, window)| render_chunk(&set, window, &stem, i, seed))
        .collect();
    for (i, artifacts) in rendered.iter().enumerate() {
        if artifacts.curve_count > MAX_OUTPUT_CURVES {
            eprintln!(
                "WARNING(stressgen): {stem}{i}.def holds {} curves, the rig table loader accepts {MAX_OUTPUT_CURVES}",
                artifacts.curve_count
            );
        }
    }

    let mut files = Vec::with_capacity(rendered.len() * 4);
    for (i, artifacts) in rendered.iter().enumerate() {
        let chunk_files = write_chunk(&opts.out_dir, &stem, i, artifacts)?;
        files.extend([
            chunk_files.definition,
            chunk_files.initial,
            chunk_files.schedule,
            chunk_files.plot,
        ]);
    }

    let manifest = Manifest {
        schema_version: OUTPUT_SCHEMA_VERSION.to_string(),
        seed,
        baseline: base_tokens.name.clone(),
        randomization: random_tokens.name.clone(),
        chunks: windows.len(),
        files: files
            .iter()
            .map(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_else(|| p.display().to_string())
            })
            .collect(),
    };
    let manifest_path = opts.out_dir.join("manifest.json");
    fs::write(&manifest_path, serde_json::to_string_pretty(&manifest)?)?;

    Ok(RunSummary {
        seed,
        chunk_count: windows.len(),
        files,
        manifest_path,
    })
}

fn default_stem(calibrated: Option<u64>, seed: u64) -> String {
    match calibrated {
        Some(_) => format!("g{seed}"),
        None => format!("g{}", Utc::now().format("%H%M")),
    }
}

/// Convenience for callers holding already-loaded input text: parses,
/// assembles, and renders without touching the filesystem.
pub fn render_from_contents(
    baseline_name: &str,
    baseline_text: &str,
    random_name: &str,
    random_text: &str,
    calibration_seed: u64,
    stem: &str,
) -> Result<Vec<emitter::ChunkArtifacts>, GenError> {
    let base = BaselineSet::from_tokens(&TokenFile::from_contents(baseline_name, baseline_text))?;
    let mut seeds = SeedAllocator::new(Some(calibration_seed));
    let spec = RandomSpecSet::from_tokens(
        &TokenFile::from_contents(random_name, random_text),
        &mut seeds,
    )?;
    let set = assemble(base, spec)?;
    let windows = plan_chunks(&set)?;
    Ok(windows
        .iter()
        .enumerate()
        .map(|(i, window)| render_chunk(&set, window, stem, i, calibration_seed))
        .collect())
}
