use rand::Rng;
use std::fs::File;
use std::io::Error;
use std::path::Path;

pub const CATALOG: &str = "tests/fixtures/catalog.csv";

const PRODUCTS: [&str; 3] = ["a", "b", "coffee"];

/// Writes `users` shoppers who each fill a cart, check out and confirm.
pub fn generate_checkouts(path: &Path, users: u64) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["type", "user", "subject", "value"])?;

    for user in 1..=users {
        let user = user.to_string();
        wtr.write_record(["add", &user, "a", "1"])?;
        wtr.write_record(["add", &user, "b", "2"])?;
        wtr.write_record(["checkout", &user, "", ""])?;
        wtr.write_record(["confirm", &user, "", "succeeded"])?;
    }

    wtr.flush()?;
    Ok(())
}

/// Writes `rows` random cart edits spread over `users` shoppers.
pub fn generate_cart_churn(path: &Path, rows: usize, users: u64) -> Result<(), Error> {
    let file = File::create(path)?;
    let mut wtr = csv::WriterBuilder::new().from_writer(file);
    wtr.write_record(["type", "user", "subject", "value"])?;

    let mut rng = rand::thread_rng();
    for _ in 0..rows {
        let user = rng.gen_range(1..=users).to_string();
        let product = PRODUCTS[rng.gen_range(0..PRODUCTS.len())];
        let quantity = rng.gen_range(0..3).to_string();
        let kind = match rng.gen_range(0..3) {
            0 => "add",
            1 => "update",
            _ => "remove",
        };
        wtr.write_record([kind, &user, product, &quantity])?;
    }

    wtr.flush()?;
    Ok(())
}
