use assert_cmd::prelude::*;
use predicates::str::contains;
use std::process::Command;

#[test]
fn runs_without_arguments() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.assert().success();
}

#[test]
fn runs_countdown() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("run").arg("tests/files/countdown.asm");

    cmd.assert()
        .success()
        .stdout(contains("Halted"))
        .stdout(contains("r0: 0x00"))
        .stdout(contains("r1: 0x06"))
        .stdout(contains("z: 1"));
}

#[test]
fn runs_path_without_subcommand() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("tests/files/countdown.asm");
    cmd.assert().success().stdout(contains("r1: 0x06"));
}

#[test]
fn stops_at_cycle_budget() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("run")
        .arg("tests/files/forever.asm")
        .arg("--max-cycles")
        .arg("3");

    cmd.assert()
        .success()
        .stdout(contains("cycle budget exhausted after 3 cycles"));
}

#[test]
fn cycle_budget_from_environment() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.env("OCTET_MAX_CYCLES", "7")
        .arg("run")
        .arg("tests/files/forever.asm");

    cmd.assert()
        .success()
        .stdout(contains("after 7 cycles"));
}

#[test]
fn check_accepts_valid_file() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("check").arg("tests/files/countdown.asm");
    cmd.assert().success().stdout(contains("no errors found!"));
}

#[test]
fn check_reports_unknown_label() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("check").arg("tests/files/bad_label.asm");
    cmd.assert().failure().stderr(contains("Unknown label"));
}

#[test]
fn compiles_and_runs_binary() {
    let dest = std::env::temp_dir().join(format!("octet-origin-{}.bin", std::process::id()));

    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("compile").arg("tests/files/origin.asm").arg(&dest);
    cmd.assert().success().stdout(contains("259 bytes"));

    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("run").arg(&dest);
    cmd.assert()
        .success()
        .stdout(contains("Halted"))
        .stdout(contains("r2: 0x2a"));

    let _ = std::fs::remove_file(dest);
}

#[test]
fn disassembles_from_address() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("disasm")
        .arg("tests/files/origin.asm")
        .arg("--start")
        .arg("0x100")
        .arg("-n")
        .arg("2");

    cmd.assert()
        .success()
        .stdout(contains("0100:"))
        .stdout(contains("LDI R2, #0x2a"))
        .stdout(contains("HLT"));
}

#[test]
fn lists_symbols() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("symbols").arg("tests/files/origin.asm");
    cmd.assert().success().stdout(contains("0100  main"));
}

#[test]
fn rejects_unknown_extension() {
    let mut cmd = Command::cargo_bin("octet").unwrap();
    cmd.arg("run").arg("Cargo.toml");
    cmd.assert().failure();
}
