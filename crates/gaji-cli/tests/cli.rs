use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

const PAYSLIP: &str = "\
PENYATA GAJI PEGAWAI
Nama : AHMAD BIN ABDULLAH No. Gaji : 12345678
Bulan : OGOS 2024
PENDAPATAN
0001 Gaji Pokok 4,672.76
0201 Elaun Sara Hidup 300.00
0210 Bantuan Khas Kewangan 1,010.00
Jumlah Pendapatan : 5,982.76
POTONGAN
4011 KWSP 514.00
4301 Cukai Pendapatan 163.40
5402 Pinjaman Perumahan 2,600.00
Jumlah Potongan : 3,277.40
Gaji Bersih : 2,705.36
Peratus Gaji Bersih : 45.22
";

const RULES: &str = r#"[
  {"name": "Koperasi A", "min_peratus_gaji_bersih": 40.0},
  {"name": "Koperasi B", "min_peratus_gaji_bersih": 60.0}
]"#;

fn gaji() -> Command {
    Command::cargo_bin("gaji").unwrap()
}

fn write(dir: &Path, name: &str, content: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

#[test]
fn process_prints_json_record() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "ogos.txt", PAYSLIP);

    gaji()
        .arg("process")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("\"gaji_bersih\": 2705.36"))
        .stdout(predicate::str::contains("\"peratus_gaji_bersih\": 45.22"))
        .stdout(predicate::str::contains("\"nama\": \"AHMAD BIN ABDULLAH\""));
}

#[test]
fn process_evaluates_rules() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "ogos.txt", PAYSLIP);
    let rules = write(dir.path(), "rules.json", RULES);

    gaji()
        .args(["process", "--format", "text", "--rules"])
        .arg(&rules)
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("Koperasi A - eligible"))
        .stdout(predicate::str::contains("Koperasi B - not eligible"));
}

#[test]
fn process_writes_csv_output() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "ogos.txt", PAYSLIP);
    let output = dir.path().join("out.csv");

    gaji()
        .args(["process", "--format", "csv", "--output"])
        .arg(&output)
        .arg(&input)
        .assert()
        .success();

    let csv = fs::read_to_string(&output).unwrap();
    assert!(csv.starts_with("nama,no_gaji,bulan"));
    assert!(csv.contains("AHMAD BIN ABDULLAH,12345678,OGOS 2024,4672.76"));
}

#[test]
fn process_rejects_missing_and_empty_input() {
    let dir = TempDir::new().unwrap();

    gaji()
        .arg("process")
        .arg(dir.path().join("missing.txt"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Input file not found"));

    let empty = write(dir.path(), "empty.txt", "   \n");
    gaji()
        .arg("process")
        .arg(&empty)
        .assert()
        .failure()
        .stderr(predicate::str::contains("No text could be extracted"));
}

#[test]
fn process_enforces_input_cap() {
    let dir = TempDir::new().unwrap();
    let input = write(dir.path(), "ogos.txt", PAYSLIP);
    let config = write(
        dir.path(),
        "config.json",
        r#"{"extraction": {"max_input_bytes": 16}}"#,
    );

    gaji()
        .arg("--config")
        .arg(&config)
        .arg("process")
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("byte limit"));
}

#[test]
fn batch_writes_outputs_and_summary() {
    let dir = TempDir::new().unwrap();
    let inputs = dir.path().join("in");
    let outputs = dir.path().join("out");
    fs::create_dir_all(&inputs).unwrap();
    write(&inputs, "ogos.txt", PAYSLIP);
    write(&inputs, "september.txt", &PAYSLIP.replace("OGOS", "SEPTEMBER"));
    write(&inputs, "blank.txt", "\n\n");

    gaji()
        .args(["batch", "--summary", "--continue-on-error", "--jobs", "2", "--output-dir"])
        .arg(&outputs)
        .arg(format!("{}/*.txt", inputs.display()))
        .assert()
        .success()
        .stdout(predicate::str::contains("2 successful, 1 failed"));

    assert!(outputs.join("ogos.txt.json").exists());
    assert!(outputs.join("september.txt.json").exists());

    let summary = fs::read_to_string(outputs.join("summary.csv")).unwrap();
    assert_eq!(summary.lines().count(), 4);
    assert!(summary.contains("blank.txt,error"));
    assert!(summary.contains("september.txt,success"));
}

#[test]
fn batch_stops_on_error_by_default() {
    let dir = TempDir::new().unwrap();
    write(dir.path(), "blank.txt", "\n\n");

    gaji()
        .arg("batch")
        .arg(format!("{}/*.txt", dir.path().display()))
        .assert()
        .failure()
        .stderr(predicate::str::contains("Processing failed"));
}

#[test]
fn config_init_set_get() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("gaji").join("config.json");

    gaji()
        .arg("--config")
        .arg(&config)
        .args(["config", "init"])
        .assert()
        .success();
    assert!(config.exists());

    gaji()
        .arg("--config")
        .arg(&config)
        .args(["config", "set", "reconcile.ratio_min", "0.25"])
        .assert()
        .success();

    gaji()
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "reconcile.ratio_min"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0.25"));

    gaji()
        .arg("--config")
        .arg(&config)
        .args(["config", "get", "reconcile.nope"])
        .assert()
        .failure();
}
