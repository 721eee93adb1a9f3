use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::io::Write;
use std::process::Command;

mod common;

#[test]
fn test_malformed_csv_handling() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, user, subject, value").unwrap();
    writeln!(csv, "add, 1, a, 1").unwrap();
    // Unknown command type
    writeln!(csv, "refund, 1, a, 1").unwrap();
    // Missing quantity
    writeln!(csv, "add, 1, b,").unwrap();
    // Non-integer user
    writeln!(csv, "add, abc, b, 1").unwrap();
    writeln!(csv, "add, 1, b, 1").unwrap();
    writeln!(csv, "checkout, 1").unwrap();
    writeln!(csv, "confirm, 1, , succeeded").unwrap();

    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg(csv.path()).arg("--catalog").arg(common::CATALOG);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Skipping malformed command"))
        .stdout(predicate::str::contains(",15,CAD,"))
        .stdout(predicate::str::contains("a:1;b:1"));
}

#[test]
fn test_rejected_commands_do_not_stop_replay() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, user, subject, value").unwrap();
    // Unknown product
    writeln!(csv, "add, 1, ghost, 1").unwrap();
    // More than the two mugs in stock
    writeln!(csv, "add, 1, mug, 3").unwrap();
    // Nothing to check out yet
    writeln!(csv, "checkout, 1").unwrap();
    // No checkout to confirm
    writeln!(csv, "confirm, 1, , succeeded").unwrap();
    // Zero-day interval
    writeln!(csv, "subscribe, 1, coffee, 0").unwrap();
    // Not a positive amount
    writeln!(csv, "penalty, 1, late return, -4").unwrap();
    writeln!(csv, "add, 1, mug, 2").unwrap();
    writeln!(csv, "checkout, 1").unwrap();
    writeln!(csv, "confirm, 1, , succeeded").unwrap();

    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg(csv.path()).arg("--catalog").arg(common::CATALOG);

    cmd.assert()
        .success()
        .stderr(predicate::str::contains("Command rejected"))
        .stdout(predicate::str::contains(",16,CAD,"))
        .stdout(predicate::str::contains("mug:2"));
}

#[test]
fn test_empty_command_file() {
    let mut csv = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv, "type, user, subject, value").unwrap();

    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg(csv.path()).arg("--catalog").arg(common::CATALOG);

    cmd.assert()
        .success()
        .stdout("order,user,intent,total,currency,status,items\n");
}
