use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

mod common;

#[test]
fn test_checkout_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg("tests/fixtures/checkout.csv")
        .arg("--catalog")
        .arg(common::CATALOG);

    let output = cmd.output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let mut lines = stdout.lines();

    assert_eq!(
        lines.next(),
        Some("order,user,intent,total,currency,status,items")
    );
    let orders: Vec<&str> = lines.collect();
    // The repeated confirmation and the failed payment add nothing.
    assert_eq!(orders.len(), 1);
    assert!(orders[0].contains(",1,pi_"));
    assert!(orders[0].contains(",5,CAD,"));
    assert!(orders[0].ends_with(",b:1"));

    Ok(())
}

#[test]
fn test_subscription_renewals_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg("tests/fixtures/subscriptions.csv")
        .arg("--catalog")
        .arg(common::CATALOG)
        .arg("--now")
        .arg("2026-01-01T00:00:00Z")
        .arg("--decline-user")
        .arg("4");

    let output = cmd.output()?;
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout)?;
    let stderr = String::from_utf8(output.stderr)?;

    let orders: Vec<&str> = stdout.lines().skip(1).collect();
    assert_eq!(orders.len(), 1, "two ticks at the same instant renew once");
    assert!(orders[0].contains(",3,pi_"));
    assert!(orders[0].contains(",14.99,CAD,"));
    assert!(orders[0].ends_with(",coffee:1"));
    assert!(stderr.contains("Subscription paused after repeated renewal failures"));

    Ok(())
}

#[test]
fn test_tax_rate_flag() {
    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg("tests/fixtures/checkout.csv")
        .arg("--catalog")
        .arg(common::CATALOG)
        .arg("--tax-rate")
        .arg("0.1");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(",5.5,CAD,"));
}

#[test]
fn test_missing_catalog_fails() {
    let mut cmd = Command::new(cargo_bin!("cartflow"));
    cmd.arg("tests/fixtures/checkout.csv")
        .arg("--catalog")
        .arg("tests/fixtures/no_such_catalog.csv");

    cmd.assert().failure();
}
