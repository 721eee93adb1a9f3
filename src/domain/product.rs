use super::ids::ProductId;
use super::money::Amount;
use serde::{Deserialize, Serialize};

/// A catalog entry as seen by checkout: current price and stock.
///
/// The catalog itself is an external collaborator; checkout only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub price: Amount,
    pub stock: u32,
    #[serde(default = "available_by_default")]
    pub available: bool,
}

fn available_by_default() -> bool {
    true
}

impl Product {
    pub fn new(id: impl Into<ProductId>, name: impl Into<String>, price: Amount, stock: u32) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            price,
            stock,
            available: true,
        }
    }

    pub fn is_purchasable(&self) -> bool {
        self.available && self.stock > 0
    }
}
