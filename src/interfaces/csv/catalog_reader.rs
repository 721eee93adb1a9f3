use crate::domain::money::Amount;
use crate::domain::product::Product;
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize)]
struct CatalogRecord {
    product: String,
    name: String,
    price: Decimal,
    stock: u32,
}

impl TryFrom<CatalogRecord> for Product {
    type Error = CheckoutError;

    fn try_from(record: CatalogRecord) -> Result<Self> {
        if record.product.is_empty() {
            return Err(CheckoutError::InvalidArgument(
                "catalog row without a product id".to_string(),
            ));
        }
        Ok(Product::new(
            record.product,
            record.name,
            Amount::new(record.price)?,
            record.stock,
        ))
    }
}

/// Reads catalog entries (`product, name, price, stock`) from a CSV source.
pub struct CatalogReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> CatalogReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn products(self) -> impl Iterator<Item = Result<Product>> {
        self.reader
            .into_deserialize::<CatalogRecord>()
            .map(|result| result.map_err(CheckoutError::from).and_then(Product::try_from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::ProductId;
    use rust_decimal_macros::dec;

    #[test]
    fn test_reads_products() {
        let data = "product, name, price, stock\ncoffee, House Blend, 14.99, 40\nmug, Mug, 8, 0";
        let products: Vec<Product> = CatalogReader::new(data.as_bytes())
            .products()
            .map(|p| p.unwrap())
            .collect();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].id, ProductId::new("coffee"));
        assert_eq!(products[0].price.value(), dec!(14.99));
        assert!(!products[1].is_purchasable());
    }

    #[test]
    fn test_rejects_non_positive_price() {
        let data = "product, name, price, stock\nfree, Free, 0, 10\nbad, Bad, abc, 1";
        let results: Vec<Result<Product>> = CatalogReader::new(data.as_bytes()).products().collect();
        assert!(matches!(results[0], Err(CheckoutError::InvalidArgument(_))));
        assert!(matches!(results[1], Err(CheckoutError::Csv(_))));
    }
}
