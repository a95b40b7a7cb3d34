use std::fs;
use std::path::PathBuf;

use stressgen::{render_from_contents, run, GenError, RunOptions};

const BASELINE: &str = "\
# single-variable warm-up profile
$FTIME 20
$INPUT alt 0 2
0 1000
20 1000
";

const RANDOMIZATION: &str =
    "alt 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100\n";

fn temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("stressgen-{}-{tag}", std::process::id()));
    let _ = fs::remove_dir_all(&dir);
    dir
}

#[test]
fn seed_11_scenario_emits_one_padded_chunk() {
    let chunks =
        render_from_contents("g1000.def", BASELINE, "airstart.mtc", RANDOMIZATION, 11, "g11")
            .unwrap();
    assert_eq!(chunks.len(), 1);
    let def = &chunks[0].definition;

    assert!(def.contains("# seed= 11\n"));
    assert!(def.contains("$FTIME    40.00\n"));

    // every emitted value stays on the baseline band
    let mut point_lines = Vec::new();
    let mut in_curve = false;
    for line in def.lines() {
        if line.starts_with("$INPUT") {
            in_curve = true;
            continue;
        }
        if in_curve && line.starts_with(' ') {
            point_lines.push(line);
        }
    }
    assert!(!point_lines.is_empty());
    for line in &point_lines {
        let value: f64 = line.split_whitespace().nth(1).unwrap().parse().unwrap();
        assert!(
            (900.0..=1100.0).contains(&value),
            "emitted value {value} escaped the band"
        );
    }

    // lead-in pad convention: the first two points hold the initial value
    let first: Vec<&str> = point_lines[0].split_whitespace().collect();
    let second: Vec<&str> = point_lines[1].split_whitespace().collect();
    assert_eq!(first[0], "0.00");
    assert_eq!(second[0], "5.00");
    assert_eq!(first[1], "1000.0000");
    assert_eq!(second[1], "1000.0000");
    assert!(chunks[0].initial.contains("1000.0000"));
}

#[test]
fn quiescent_start_holds_through_the_first_release() {
    let chunks =
        render_from_contents("g1000.def", BASELINE, "airstart.mtc", RANDOMIZATION, 11, "g11")
            .unwrap();
    let def = &chunks[0].definition;
    // padded times 5..8 replay composite ticks 0..3, still latched at init
    let held: Vec<&str> = def
        .lines()
        .filter(|l| l.starts_with(' '))
        .skip(1)
        .take(4)
        .map(|l| l.split_whitespace().nth(1).unwrap())
        .collect();
    assert_eq!(held, vec!["1000.0000"; 4]);
}

#[test]
fn identical_seeds_reproduce_identical_files() {
    let opts = |dir: PathBuf| RunOptions {
        baseline: PathBuf::from("g1000.def"),
        randomization: PathBuf::from("airstart.mtc"),
        out_dir: dir,
        stem: None,
        calibration_seed: Some(11),
    };

    let work = temp_dir("repro");
    fs::create_dir_all(&work).unwrap();
    let base_path = work.join("g1000.def");
    let mtc_path = work.join("airstart.mtc");
    fs::write(&base_path, BASELINE).unwrap();
    fs::write(&mtc_path, RANDOMIZATION).unwrap();

    let mut first = opts(work.join("a"));
    first.baseline = base_path.clone();
    first.randomization = mtc_path.clone();
    let mut second = opts(work.join("b"));
    second.baseline = base_path;
    second.randomization = mtc_path;

    let summary_a = run(&first).unwrap();
    let summary_b = run(&second).unwrap();
    assert_eq!(summary_a.seed, 11);
    assert_eq!(summary_a.chunk_count, 1);
    assert_eq!(summary_a.files.len(), summary_b.files.len());

    for (a, b) in summary_a.files.iter().zip(&summary_b.files) {
        let bytes_a = fs::read(a).unwrap();
        let bytes_b = fs::read(b).unwrap();
        assert_eq!(bytes_a, bytes_b, "{} differs", a.display());
        assert!(!bytes_a.is_empty());
    }

    let manifest = fs::read_to_string(summary_a.manifest_path).unwrap();
    assert!(manifest.contains("\"seed\": 11"));
    assert!(manifest.contains("g110.def"));

    fs::remove_dir_all(&work).unwrap();
}

#[test]
fn differing_seeds_produce_differing_definitions() {
    let a = render_from_contents("g.def", BASELINE, "g.mtc", RANDOMIZATION, 11, "g").unwrap();
    let b = render_from_contents("g.def", BASELINE, "g.mtc", RANDOMIZATION, 12, "g").unwrap();
    let strip = |text: &str| {
        text.lines()
            .filter(|l| !l.starts_with('#'))
            .collect::<Vec<_>>()
            .join("\n")
    };
    assert_ne!(strip(&a[0].definition), strip(&b[0].definition));
}

#[test]
fn unmatched_variable_leaves_no_files_behind() {
    let work = temp_dir("unmatched");
    let input_dir = temp_dir("unmatched-in");
    fs::create_dir_all(&input_dir).unwrap();
    let base_path = input_dir.join("g1000.def");
    let mtc_path = input_dir.join("airstart.mtc");
    fs::write(&base_path, BASELINE).unwrap();
    fs::write(
        &mtc_path,
        "vane 1 UNIFORM -5 5 UNIFORM 1 1 UNIFORM -1 -1 UNIFORM 2 2 -100 100\n",
    )
    .unwrap();

    let err = run(&RunOptions {
        baseline: base_path,
        randomization: mtc_path,
        out_dir: work.clone(),
        stem: None,
        calibration_seed: Some(11),
    })
    .unwrap_err();

    assert!(matches!(err, GenError::UnmatchedVariable(name) if name == "VANE"));
    assert!(!work.exists(), "output directory should never be created");

    fs::remove_dir_all(&input_dir).unwrap();
}
