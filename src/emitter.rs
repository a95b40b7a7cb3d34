use std::fs;
use std::path::{Path, PathBuf};

use crate::composite::CompositeCurveSet;
use crate::curve::{BreakpointCurve, TIME_PAD};
use crate::GenError;

/// Longest span a single chunk may cover, pads included [s].
pub const MAX_CHUNK_SECONDS: f64 = 3600.0;
/// Most breakpoints one curve may contribute to a chunk.
pub const MAX_CHUNK_BREAKPOINTS: usize = 200;
/// Slots reserved for the lead-in and trailing pad points of a window.
pub const CHUNK_BREAKPOINT_RESERVE: usize = 3;
/// Most chunks one run may emit.
pub const MAX_CHUNKS: usize = 25;
/// Definition entries per chunk the rig table loader accepts.
pub const MAX_OUTPUT_CURVES: usize = 15;

/// One chunk of the run: `[begin, end]` of the composite timeline.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkWindow {
    pub begin: f64,
    pub end: f64,
}

impl ChunkWindow {
    /// Emitted duration, window span plus both pads.
    pub fn duration(&self) -> f64 {
        self.end - self.begin + 4.0 * TIME_PAD
    }
}

/// The four rendered artifacts of one chunk, built entirely before any
/// file is opened.
#[derive(Debug, Clone)]
pub struct ChunkArtifacts {
    pub definition: String,
    pub initial: String,
    pub schedule: String,
    pub plot: String,
    pub curve_count: usize,
}

#[derive(Debug, Clone)]
pub struct ChunkFiles {
    pub definition: PathBuf,
    pub initial: PathBuf,
    pub schedule: PathBuf,
    pub plot: PathBuf,
}

/// Splits the run into sequential windows honoring the duration and
/// per-curve breakpoint ceilings.
pub fn plan_chunks(set: &CompositeCurveSet) -> Result<Vec<ChunkWindow>, GenError> {
    let mut chunks = Vec::new();
    let mut t_begin = 0.0;
    loop {
        let Some(boundary) = next_boundary(&set.curves, t_begin) else {
            return Err(GenError::TooManyChunks {
                chunks: chunks.len(),
                at: t_begin,
            });
        };
        let end = boundary.min(set.run_duration);
        chunks.push(ChunkWindow { begin: t_begin, end });
        if end >= set.run_duration {
            return Ok(chunks);
        }
        if chunks.len() >= MAX_CHUNKS {
            return Err(GenError::TooManyChunks {
                chunks: chunks.len(),
                at: end,
            });
        }
        t_begin = end;
    }
}

/// Furthest admissible chunk end from `t_begin`, or `None` when no curve
/// allows any forward progress.
fn next_boundary(curves: &[BreakpointCurve], t_begin: f64) -> Option<f64> {
    let t_max = t_begin + MAX_CHUNK_SECONDS - 4.0 * TIME_PAD;
    let budget = (MAX_CHUNK_BREAKPOINTS - CHUNK_BREAKPOINT_RESERVE) as isize;
    let mut t_next = t_begin;
    let mut t_lim = t_max;
    for curve in curves {
        let j_begin = curve.find_place(t_begin).map_or(-1, |j| j as isize);
        let mut j_end = curve.find_place(t_max).map_or(-1, |j| j as isize);
        let mut t_end = t_next;
        if j_end != j_begin {
            t_end = curve.time(j_end as usize).min(t_max);
        }
        if j_end - j_begin > budget {
            j_end = j_begin + budget;
            t_end = curve.time(j_end as usize);
            t_lim = t_lim.min(t_end);
        }
        t_next = t_end.max(t_next).min(t_lim);
    }
    if t_next == t_begin {
        None
    } else {
        Some(t_next)
    }
}

/// Renders the artifact quadruple for one chunk. Field widths and decimal
/// precision are a fixed contract with the downstream rig tooling.
pub fn render_chunk(
    set: &CompositeCurveSet,
    window: &ChunkWindow,
    stem: &str,
    index: usize,
    seed: u64,
) -> ChunkArtifacts {
    let def_name = format!("{stem}{index}.def");
    let int_name = format!("{stem}{index}.int");
    let scd_name = format!("{stem}{index}.scd");
    let plot_name = format!("{stem}{index}.mtp");
    let duration = window.duration();

    let mut definition = format!(
        "# {def_name} generated by stressgen\n# from {} and {}.\n# seed= {seed}\n",
        set.base_name, set.random_name
    );
    definition.push_str(&format!("$FTIME  {duration:7.2}\n"));

    let mut initial = format!(
        "# {int_name} generated by stressgen\n# from {} and {}.\n",
        set.base_name, set.random_name
    );

    let mut schedule = format!(
        "# {scd_name} generated by stressgen\n# from {} and {}.\n",
        set.base_name, set.random_name
    );
    schedule.push_str(&format!(
        "START_TIME {:8.3}\nSTOP_TIME  {:8.3}",
        2.0,
        duration - TIME_PAD
    ));

    let mut plot = format!(
        "# {plot_name} generated by stressgen\n# from {} and {}.\nTITLE1='{}',\nTITLE2='{plot_name}',\n",
        set.base_name, set.random_name, set.base_name
    );

    let mut curve_count = 0;
    for curve in &set.curves {
        let slice = curve.extract_window(window.begin, window.end);
        if !slice.constant {
            curve_count += 1;
            definition.push_str(&format!(
                "$INPUT {}  {:<2} {:<4}\n",
                curve.name(),
                curve.curve_type(),
                slice.points.len()
            ));
            for &(t, v) in &slice.points {
                definition.push_str(&format!(" {t:7.2}  {v:13.4}\n"));
            }
            initial.push_str(&format!("{:<17} {:13.4}\n", curve.name(), slice.initial_value));
        }

        // the plot file carries every curve in full
        plot.push_str(&format!("$INPUT T='{}',\n X= ", curve.name()));
        for i in 0..curve.len() {
            plot.push_str(&format!("{:8.3},", curve.time(i)));
            if (i + 1) % 9 == 0 {
                plot.push_str("\n ");
            }
        }
        plot.push_str("\n Z=");
        for i in 0..curve.len() {
            plot.push_str(&fmt_g7(curve.value(i)));
            plot.push(',');
            if (i + 1) % 9 == 0 {
                plot.push_str("\n ");
            }
        }
        plot.push_str("\n$\n");
    }

    ChunkArtifacts {
        definition,
        initial,
        schedule,
        plot,
        curve_count,
    }
}

/// Writes the rendered quadruple under `outdir`.
pub fn write_chunk(
    outdir: &Path,
    stem: &str,
    index: usize,
    artifacts: &ChunkArtifacts,
) -> Result<ChunkFiles, GenError> {
    fs::create_dir_all(outdir)?;
    let files = ChunkFiles {
        definition: outdir.join(format!("{stem}{index}.def")),
        initial: outdir.join(format!("{stem}{index}.int")),
        schedule: outdir.join(format!("{stem}{index}.scd")),
        plot: outdir.join(format!("{stem}{index}.mtp")),
    };
    fs::write(&files.definition, &artifacts.definition)?;
    fs::write(&files.initial, &artifacts.initial)?;
    fs::write(&files.schedule, &artifacts.schedule)?;
    fs::write(&files.plot, &artifacts.plot)?;
    Ok(files)
}

fn fmt_g7(value: f64) -> String {
    format!("{:>7}", general_format(value, 5))
}

/// printf `%g` with the given significant-digit precision: fixed notation
/// while the decimal exponent fits, otherwise two-digit e-notation, with
/// trailing zeros trimmed either way.
pub(crate) fn general_format(value: f64, precision: usize) -> String {
    if value == 0.0 {
        return "0".to_string();
    }
    let sci = format!("{:.*e}", precision.saturating_sub(1), value);
    let (mantissa, exponent) = sci.split_once('e').unwrap_or((sci.as_str(), "0"));
    let exponent: i32 = exponent.parse().unwrap_or(0);
    if exponent < -4 || exponent >= precision as i32 {
        let mantissa = trim_zeros(mantissa);
        let sign = if exponent < 0 { '-' } else { '+' };
        format!("{mantissa}e{sign}{:02}", exponent.abs())
    } else {
        let decimals = (precision as i32 - 1 - exponent).max(0) as usize;
        trim_zeros(&format!("{value:.decimals$}"))
    }
}

fn trim_zeros(text: &str) -> String {
    if text.contains('.') {
        text.trim_end_matches('0').trim_end_matches('.').to_string()
    } else {
        text.to_string()
    }
}
