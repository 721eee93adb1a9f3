use super::locks::KeyedLocks;
use crate::domain::cart::{Cart, CartSnapshot, Quote};
use crate::domain::ids::{ProductId, UserId};
use crate::domain::intent::PaymentIntent;
use crate::domain::ports::{SharedCartStore, SharedCatalog};
use crate::domain::product::Product;
use crate::error::{CheckoutError, Result};
use rust_decimal::Decimal;
use tracing::debug;

/// Per-user carts.
///
/// Every mutation runs under that user's lock: load, change, save. Readers
/// only ever see whole saved carts, so totals are never stale or partial.
pub struct CartService {
    carts: SharedCartStore,
    catalog: SharedCatalog,
    locks: KeyedLocks<UserId>,
}

fn positive_quantity(quantity: i64) -> Result<u32> {
    if quantity <= 0 {
        return Err(CheckoutError::InvalidArgument(format!(
            "quantity must be greater than 0, got {quantity}"
        )));
    }
    u32::try_from(quantity)
        .map_err(|_| CheckoutError::InvalidArgument(format!("quantity too large: {quantity}")))
}

impl CartService {
    pub fn new(carts: SharedCartStore, catalog: SharedCatalog) -> Self {
        Self {
            carts,
            catalog,
            locks: KeyedLocks::new(),
        }
    }

    async fn purchasable(&self, id: &ProductId) -> Result<Product> {
        match self.catalog.product(id).await? {
            Some(product) if product.available => Ok(product),
            _ => Err(CheckoutError::not_found("product", id)),
        }
    }

    fn check_stock(product: &Product, requested: u32) -> Result<()> {
        if requested > product.stock {
            Err(CheckoutError::InsufficientStock {
                product: product.id.to_string(),
                available: product.stock,
            })
        } else {
            Ok(())
        }
    }

    async fn load(&self, user: UserId) -> Result<Cart> {
        Ok(self
            .carts
            .load(user)
            .await?
            .unwrap_or_else(|| Cart::new(user)))
    }

    /// Adds `quantity` units of `product`, summing with any existing line.
    pub async fn add_item(
        &self,
        user: UserId,
        product: &ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot> {
        let quantity = positive_quantity(quantity)?;
        let product = self.purchasable(product).await?;

        let _guard = self.locks.lock(&user).await;
        let mut cart = self.load(user).await?;
        let requested = cart.quantity_of(&product.id).saturating_add(quantity);
        Self::check_stock(&product, requested)?;

        cart.add(&product, quantity);
        let snapshot = cart.snapshot();
        self.carts.save(cart).await?;
        debug!(%user, product = %product.id, quantity, total = %snapshot.total, "Item added to cart");
        Ok(snapshot)
    }

    /// Sets the quantity of a line already in the cart. Zero removes it.
    pub async fn update_quantity(
        &self,
        user: UserId,
        product: &ProductId,
        quantity: i64,
    ) -> Result<CartSnapshot> {
        if quantity == 0 {
            return self.remove_item(user, product).await;
        }
        let quantity = positive_quantity(quantity)?;
        let product = self.purchasable(product).await?;
        Self::check_stock(&product, quantity)?;

        let _guard = self.locks.lock(&user).await;
        let mut cart = self.load(user).await?;
        if !cart.set_quantity(&product.id, quantity) {
            return Err(CheckoutError::not_found("cart item", &product.id));
        }
        let snapshot = cart.snapshot();
        self.carts.save(cart).await?;
        debug!(%user, product = %product.id, quantity, total = %snapshot.total, "Cart quantity updated");
        Ok(snapshot)
    }

    /// Removes a line. Absent products are a no-op, not an error.
    pub async fn remove_item(&self, user: UserId, product: &ProductId) -> Result<CartSnapshot> {
        let _guard = self.locks.lock(&user).await;
        let mut cart = self.load(user).await?;
        if cart.remove(product) {
            let snapshot = cart.snapshot();
            self.carts.save(cart).await?;
            debug!(%user, %product, total = %snapshot.total, "Item removed from cart");
            Ok(snapshot)
        } else {
            Ok(cart.snapshot())
        }
    }

    /// The current cart, or an empty one if the user never added anything.
    pub async fn get_cart(&self, user: UserId) -> Result<CartSnapshot> {
        Ok(self.load(user).await?.snapshot())
    }

    /// Prices the current cart without changing it.
    pub async fn summary(&self, user: UserId, tax_rate: Decimal) -> Result<Quote> {
        Ok(self.get_cart(user).await?.quote(tax_rate))
    }

    /// Takes the lines an intent paid for out of its owner's cart.
    ///
    /// Reserved for order finalization. Repeated calls for the same intent are
    /// no-ops and return `false`.
    pub(crate) async fn clear_purchased(&self, intent: &PaymentIntent) -> Result<bool> {
        let _guard = self.locks.lock(&intent.user).await;
        let mut cart = self.load(intent.user).await?;
        if !cart.remove_purchased(&intent.id, &intent.lines) {
            return Ok(false);
        }
        self.carts.save(cart).await?;
        debug!(user = %intent.user, intent = %intent.id, "Purchased lines removed from cart");
        Ok(true)
    }
}
