use assert_cmd::prelude::*;
use predicates::prelude::*;
use rstest::rstest;
use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

// Minimal valid config for a simulated calibration run.
fn write_valid_config(dir: &tempfile::TempDir) -> PathBuf {
    let toml = r#"
[throttle]
address = 40
settle_ms = 100

[calibration]
top_smph = 35.0
scale = 87.1
steps = 28
floor = 1
min_samples = 2

[[segments.measured]]
id = "LS235"
length_in = 20.4375
"#;
    let path = dir.path().join("cfg.toml");
    fs::write(&path, toml).unwrap();
    path
}

fn steps_from_json(stdout: &[u8]) -> Vec<u64> {
    let v: serde_json::Value = serde_json::from_slice(stdout).expect("stdout should be JSON");
    v["steps"]
        .as_array()
        .expect("steps array")
        .iter()
        .map(|s| s.as_u64().expect("integer step"))
        .collect()
}

#[rstest]
fn help_prints_usage() {
    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--help");
    cmd.assert().success().stdout(predicate::str::contains("Usage:"));
}

#[rstest]
fn simulated_run_emits_a_complete_table() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("--sim-jitter")
        .arg("0");

    let output = cmd.output().unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let steps = steps_from_json(&output.stdout);
    assert_eq!(steps.len(), 28);
    for &value in &steps {
        assert!((1..=255).contains(&value), "value {value} out of range");
    }
    for pair in steps.windows(2) {
        assert!(pair[0] <= pair[1], "table not monotone: {steps:?}");
    }
}

#[rstest]
fn human_output_lists_every_step() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);

    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--config").arg(&cfg).arg("--sim-jitter").arg("0");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Computed speed table (28 steps)"))
        .stdout(predicate::str::contains("step 28:"));
}

#[rstest]
fn invalid_configuration_exits_with_code_2() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(
        &path,
        r#"
[calibration]
top_smph = 0.0

[[segments.measured]]
id = "LS235"
length_in = 20.4375
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--config").arg(&path);
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[rstest]
fn single_monitored_detector_is_a_config_error_not_a_crash() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(
        &path,
        r#"
[[segments.measured]]
id = "LS235"
length_in = 20.4375

[detectors]
monitored = ["LS235"]
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--config").arg(&path);
    cmd.assert()
        .code(2)
        .stderr(predicate::str::contains("Invalid configuration"))
        .stderr(predicate::str::contains("at least two detectors"));
}

#[rstest]
fn missing_config_file_fails() {
    let dir = tempdir().unwrap();
    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--config").arg(dir.path().join("nope.toml"));
    cmd.assert().failure().code(1);
}

#[rstest]
fn saved_samples_resynthesize_to_the_same_table() {
    let dir = tempdir().unwrap();
    let cfg = write_valid_config(&dir);
    let samples = dir.path().join("samples.csv");

    let mut first = Command::cargo_bin("speedmatch_cli").unwrap();
    first
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("--sim-jitter")
        .arg("0")
        .arg("--save-samples")
        .arg(&samples);
    let live = first.output().unwrap();
    assert!(live.status.success(), "stderr: {}", String::from_utf8_lossy(&live.stderr));
    assert!(samples.exists());

    let mut second = Command::cargo_bin("speedmatch_cli").unwrap();
    second
        .arg("--config")
        .arg(&cfg)
        .arg("--json")
        .arg("--load-samples")
        .arg(&samples);
    let replayed = second.output().unwrap();
    assert!(
        replayed.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&replayed.stderr)
    );

    assert_eq!(steps_from_json(&live.stdout), steps_from_json(&replayed.stdout));
}

#[rstest]
fn json_errors_carry_a_machine_readable_reason() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("cfg.toml");
    fs::write(
        &path,
        r#"
[calibration]
top_smph = -1.0

[[segments.measured]]
id = "LS235"
length_in = 20.4375
"#,
    )
    .unwrap();

    let mut cmd = Command::cargo_bin("speedmatch_cli").unwrap();
    cmd.arg("--config").arg(&path).arg("--json");

    let output = cmd.output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["reason"], "InvalidConfiguration");
}
