use std::{
    fs,
    path::PathBuf,
    process::{Command, Output},
};

fn levels_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("../../levels")
}

fn cube_roll(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_cube-roll"))
        .args(args)
        .output()
        .expect("failed to invoke cube-roll binary")
}

#[test]
fn cli_compiles_without_warnings() {
    let status = Command::new(env!("CARGO"))
        .current_dir(env!("CARGO_MANIFEST_DIR"))
        .args(["check", "--quiet", "--bin", "cube-roll"])
        .status()
        .expect("failed to invoke cargo check for cube-roll CLI binary");

    assert!(status.success(), "cargo check --bin cube-roll should succeed");
}

#[test]
fn inspect_prints_the_bundled_level() {
    let levels = levels_dir();
    let output = cube_roll(&[
        "inspect",
        "--levels",
        levels.to_str().expect("utf-8 path"),
        "--level",
        "Level_01",
        "--part",
        "1",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Level_01 part 1: 3x2 cells, 2 playfield rows, ground 3x4"));
    assert!(stdout.contains("  XBX"));
}

#[test]
fn inspect_json_lists_every_cell() {
    let levels = levels_dir();
    let output = cube_roll(&[
        "inspect",
        "--levels",
        levels.to_str().expect("utf-8 path"),
        "--part",
        "2",
        "--json",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"width\": 4"));
    assert!(stdout.contains("\"part_index\": 2"));
}

#[test]
fn missing_part_fails_with_context() {
    let levels = levels_dir();
    let output = cube_roll(&[
        "inspect",
        "--levels",
        levels.to_str().expect("utf-8 path"),
        "--part",
        "9",
    ]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("failed to load Level_01 part 9"));
}

#[test]
fn run_plays_a_level_and_reports_a_summary() {
    let dir = tempfile::tempdir().expect("temp dir");
    fs::write(dir.path().join("Level_01.txt"), "//1\n$1\nXG\n").expect("write level");
    let settings = dir.path().join("settings.toml");
    fs::write(&settings, "[pressure]\nmax_seconds = 1.0\n").expect("write settings");

    let output = cube_roll(&[
        "run",
        "--levels",
        dir.path().to_str().expect("utf-8 path"),
        "--settings",
        settings.to_str().expect("utf-8 path"),
        "--seconds",
        "8",
    ]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("rolls "));
    assert!(!stdout.contains("rolls 0,"), "pressure forced at least one roll");
}
