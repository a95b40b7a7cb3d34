use std::path::PathBuf;

use clap::Parser;
use stressgen::{run, RunOptions};

#[derive(Debug, Parser)]
#[command(name = "stressgen")]
#[command(about = "Generate randomized stress-test input profiles for test-rig simulation")]
struct Cli {
    /// Baseline definition file (.def)
    baseline: PathBuf,

    /// Randomization specification file (.mtc)
    randomization: PathBuf,

    /// Calibration seed for bit-reproducible output
    #[arg(short = 'c', long)]
    calibrating: Option<u64>,

    /// Output file stem; chunk index and extension are appended
    #[arg(short, long)]
    output: Option<String>,

    /// Directory receiving the generated files
    #[arg(long, default_value = ".")]
    outdir: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let summary = run(&RunOptions {
        baseline: cli.baseline,
        randomization: cli.randomization,
        out_dir: cli.outdir,
        stem: cli.output,
        calibration_seed: cli.calibrating,
    })?;

    for file in &summary.files {
        println!("wrote {}", file.display());
    }
    println!(
        "{} chunks generated with seed {}",
        summary.chunk_count, summary.seed
    );

    Ok(())
}
