use super::ids::{IntentId, ProductId, UserId};
use super::money::{Amount, Money};
use super::product::Product;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One product line in a cart.
///
/// The subtotal is never stored; it is always `unit_price * quantity`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product: ProductId,
    pub name: String,
    /// Price captured when the product was first added.
    pub unit_price: Amount,
    pub quantity: u32,
}

impl CartItem {
    pub fn subtotal(&self) -> Money {
        self.unit_price * self.quantity
    }
}

/// A user's pending purchase. Created lazily; finalization takes out what was bought.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub user: UserId,
    items: Vec<CartItem>,
    /// Checkout intents whose purchased lines were already taken out.
    #[serde(default)]
    settled: Vec<IntentId>,
}

impl Cart {
    pub fn new(user: UserId) -> Self {
        Self {
            user,
            items: Vec::new(),
            settled: Vec::new(),
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn total(&self) -> Money {
        self.items.iter().map(CartItem::subtotal).sum()
    }

    pub fn quantity_of(&self, product: &ProductId) -> u32 {
        self.items
            .iter()
            .find(|item| &item.product == product)
            .map_or(0, |item| item.quantity)
    }

    /// Adds `quantity` units, summing into an existing line if present.
    pub fn add(&mut self, product: &Product, quantity: u32) {
        if quantity == 0 {
            return;
        }
        match self.items.iter_mut().find(|item| item.product == product.id) {
            Some(item) => item.quantity = item.quantity.saturating_add(quantity),
            None => self.items.push(CartItem {
                product: product.id.clone(),
                name: product.name.clone(),
                unit_price: product.price,
                quantity,
            }),
        }
    }

    /// Sets the quantity of an existing line. Zero removes the line.
    ///
    /// Returns `false` when the product is not in the cart and nothing changed.
    pub fn set_quantity(&mut self, product: &ProductId, quantity: u32) -> bool {
        if quantity == 0 {
            return self.remove(product);
        }
        match self.items.iter_mut().find(|item| &item.product == product) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    /// Removes a line. Removing an absent product is a no-op.
    pub fn remove(&mut self, product: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.product != product);
        self.items.len() != before
    }

    /// Takes the lines bought by `intent` out of the cart.
    ///
    /// Each purchased quantity is subtracted from its line; lines that reach
    /// zero are dropped and anything added after checkout stays. Settling the
    /// same intent twice changes nothing. Returns `false` in that case.
    pub fn remove_purchased(&mut self, intent: &IntentId, purchased: &[LineItem]) -> bool {
        if self.settled.contains(intent) {
            return false;
        }
        for line in purchased {
            if let Some(item) = self.items.iter_mut().find(|item| item.product == line.product) {
                item.quantity = item.quantity.saturating_sub(line.quantity);
            }
        }
        self.items.retain(|item| item.quantity > 0);
        self.settled.push(intent.clone());
        true
    }

    pub fn is_settled(&self, intent: &IntentId) -> bool {
        self.settled.contains(intent)
    }

    /// Freezes the current lines and total into an owned value.
    pub fn snapshot(&self) -> CartSnapshot {
        CartSnapshot {
            user: self.user,
            lines: self.items.iter().map(LineItem::from).collect(),
            total: self.total(),
        }
    }
}

/// A purchased or about-to-be-purchased line with its price frozen.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub product: ProductId,
    pub name: String,
    pub unit_price: Amount,
    pub quantity: u32,
    pub subtotal: Money,
}

impl From<&CartItem> for LineItem {
    fn from(item: &CartItem) -> Self {
        Self {
            product: item.product.clone(),
            name: item.name.clone(),
            unit_price: item.unit_price,
            quantity: item.quantity,
            subtotal: item.subtotal(),
        }
    }
}

/// Immutable copy of a cart at one instant, passed by value into checkout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub user: UserId,
    pub lines: Vec<LineItem>,
    pub total: Money,
}

impl CartSnapshot {
    /// A one-line snapshot at the product's current catalog price.
    pub fn single(user: UserId, product: &Product, quantity: u32) -> Self {
        let mut cart = Cart::new(user);
        cart.add(product, quantity);
        cart.snapshot()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    /// Prices the snapshot with a flat tax rate.
    pub fn quote(&self, tax_rate: Decimal) -> Quote {
        let tax = self.total.tax_at(tax_rate);
        Quote {
            subtotal: self.total,
            tax,
            total: self.total + tax,
        }
    }
}

/// What a snapshot costs once tax is applied.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Quote {
    pub subtotal: Money,
    pub tax: Money,
    pub total: Money,
}
