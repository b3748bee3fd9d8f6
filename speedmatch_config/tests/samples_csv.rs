use std::fs::File;
use std::io::Write;

use rstest::rstest;
use speedmatch_config::{SampleRow, load_samples_csv, save_samples_csv};
use tempfile::tempdir;

#[rstest]
fn save_then_load_round_trips() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("samples.csv");

    let rows = vec![
        SampleRow {
            direction: "fwd".into(),
            command: 80,
            segment: "LS235".into(),
            seconds: 2.31,
        },
        SampleRow {
            direction: "rev".into(),
            command: 80,
            segment: "LS235".into(),
            seconds: 2.47,
        },
    ];
    save_samples_csv(&path, &rows).unwrap();

    let loaded = load_samples_csv(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0].direction, "fwd");
    assert_eq!(loaded[0].command, 80);
    assert_eq!(loaded[1].segment, "LS235");
    assert!((loaded[1].seconds - 2.47).abs() < 1e-12);
}

#[rstest]
fn csv_with_wrong_headers_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_headers.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "dir,value,block,time").unwrap();
    writeln!(f, "fwd,80,LS1,2.0").unwrap();

    let err = load_samples_csv(&path).expect_err("should error on bad headers");
    assert!(format!("{err}").contains("headers 'direction,command,segment,seconds'"));
}

#[rstest]
fn csv_with_unknown_direction_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_direction.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "direction,command,segment,seconds").unwrap();
    writeln!(f, "fwd,80,LS1,2.0").unwrap();
    writeln!(f, "backwards,80,LS1,2.0").unwrap();

    let err = load_samples_csv(&path).expect_err("should error on unknown direction");
    let msg = format!("{err}");
    // row numbers are 1-based and include the header line
    assert!(msg.contains("row 3"), "got: {msg}");
    assert!(msg.contains("'fwd' or 'rev'"), "got: {msg}");
}

#[rstest]
fn csv_with_non_numeric_seconds_errors() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_numeric.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "direction,command,segment,seconds").unwrap();
    writeln!(f, "fwd,80,LS1,abc").unwrap();

    let err = load_samples_csv(&path).expect_err("should error on non-numeric seconds");
    assert!(format!("{err}").contains("invalid CSV row"));
}

#[rstest]
#[case("fwd,0,LS1,2.0", "command must be in 1..=255")]
#[case("fwd,80,LS1,0.0", "seconds must be > 0")]
#[case("fwd,80,LS1,-1.5", "seconds must be > 0")]
fn csv_with_out_of_range_values_errors(#[case] row: &str, #[case] expected: &str) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("bad_range.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "direction,command,segment,seconds").unwrap();
    writeln!(f, "{row}").unwrap();

    let err = load_samples_csv(&path).expect_err("should error on out-of-range value");
    assert!(format!("{err}").contains(expected), "got: {err}");
}

#[rstest]
fn empty_csv_with_headers_loads_no_rows() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("empty.csv");

    let mut f = File::create(&path).unwrap();
    writeln!(f, "direction,command,segment,seconds").unwrap();

    let rows = load_samples_csv(&path).unwrap();
    assert!(rows.is_empty());
}
