use assert_cmd::cargo_bin;
use std::process::Command;

mod common;

#[test]
fn test_many_checkouts() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("checkouts.csv");
    common::generate_checkouts(&input, 2_000).expect("Failed to generate CSV");

    let output = Command::new(cargo_bin!("cartflow"))
        .arg(&input)
        .arg("--catalog")
        .arg(common::CATALOG)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Binary failed to replay checkouts");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.lines().count(), 2_001);
    assert!(stdout.lines().skip(1).all(|line| line.contains(",20,CAD,")));
}

#[test]
fn test_cart_churn_streaming() {
    let dir = tempfile::tempdir().unwrap();
    let input = dir.path().join("churn.csv");
    common::generate_cart_churn(&input, 50_000, 200).expect("Failed to generate CSV");

    let output = Command::new(cargo_bin!("cartflow"))
        .arg(&input)
        .arg("--catalog")
        .arg(common::CATALOG)
        .output()
        .expect("Failed to execute command");
    assert!(output.status.success(), "Binary failed to replay cart edits");
    // Cart edits alone never produce orders.
    assert_eq!(String::from_utf8_lossy(&output.stdout).lines().count(), 1);
}
