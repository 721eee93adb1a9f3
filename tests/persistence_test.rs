#![cfg(feature = "storage-rocksdb")]

use assert_cmd::cargo_bin;
use std::io::Write;
use std::process::Command;
use tempfile::tempdir;

mod common;

#[test]
fn test_rocksdb_persistence_recovery() {
    let dir = tempdir().unwrap();
    let db_path = dir.path().join("test_db");

    // 1. First run: check out and pay
    let mut csv1 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv1, "type, user, subject, value").unwrap();
    writeln!(csv1, "add, 1, a, 1").unwrap();
    writeln!(csv1, "checkout, 1").unwrap();
    writeln!(csv1, "confirm, 1, , succeeded").unwrap();
    // Left in the cart for the next run
    writeln!(csv1, "add, 1, b, 1").unwrap();

    let output1 = Command::new(cargo_bin!("cartflow"))
        .arg(csv1.path())
        .arg("--catalog")
        .arg(common::CATALOG)
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output1.status.success());
    let stdout1 = String::from_utf8_lossy(&output1.stdout);
    assert_eq!(stdout1.lines().count(), 2);
    assert!(stdout1.contains(",10,CAD,"));

    // 2. Second run: the saved cart is checked out against the same DB path
    let mut csv2 = tempfile::NamedTempFile::new().unwrap();
    writeln!(csv2, "type, user, subject, value").unwrap();
    writeln!(csv2, "checkout, 1").unwrap();
    writeln!(csv2, "confirm, 1, , succeeded").unwrap();

    let output2 = Command::new(cargo_bin!("cartflow"))
        .arg(csv2.path())
        .arg("--catalog")
        .arg(common::CATALOG)
        .arg("--db-path")
        .arg(&db_path)
        .output()
        .expect("Failed to execute command");
    assert!(output2.status.success());
    let stdout2 = String::from_utf8_lossy(&output2.stdout);

    // The first order survived and the recovered cart produced the second
    assert_eq!(stdout2.lines().count(), 3);
    assert!(stdout2.contains(",10,CAD,"));
    assert!(stdout2.contains(",5,CAD,"));
}
