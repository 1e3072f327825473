use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use tracing::{info, warn};

use vitrina_core::domain::cart::{Cart, CartId, CartItemInput, Quantity, ResolvedCart};
use vitrina_core::errors::{ApplicationError, EntityKind};
use vitrina_db::{CartRepository, ProductRepository, RepositoryError};

use crate::product::parse_product_id;

/// Cart composition. Cart writes are not broadcast to viewers.
pub struct CartService {
    carts: Arc<dyn CartRepository>,
    products: Arc<dyn ProductRepository>,
}

impl CartService {
    pub fn new(carts: Arc<dyn CartRepository>, products: Arc<dyn ProductRepository>) -> Self {
        Self { carts, products }
    }

    pub async fn create(&self) -> Result<ResolvedCart, ApplicationError> {
        let cart = Cart::new(CartId::generate(), Utc::now());
        self.carts
            .insert(cart.clone())
            .await
            .map_err(|error| ApplicationError::persistence("cart.create", error))?;

        info!(event_name = "cart.created", cart_id = %cart.id, "cart created");
        Ok(ResolvedCart::resolve(cart, &HashMap::new()))
    }

    pub async fn get(&self, raw_cart_id: &str) -> Result<ResolvedCart, ApplicationError> {
        let id = CartId::parse(raw_cart_id)?;
        let cart = self
            .carts
            .find_by_id(&id)
            .await
            .map_err(|error| ApplicationError::persistence("cart.get", error))?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Cart, id.0.clone()))?;

        self.resolve(cart).await
    }

    pub async fn add_item(
        &self,
        raw_cart_id: &str,
        raw_product_id: &str,
    ) -> Result<ResolvedCart, ApplicationError> {
        let id = CartId::parse(raw_cart_id)?;
        let product_id = parse_product_id(raw_product_id)?;

        let exists = self
            .products
            .find_by_id(&product_id)
            .await
            .map_err(|error| ApplicationError::persistence("cart.add_item", error))?
            .is_some();
        if !exists {
            return Err(ApplicationError::not_found(EntityKind::Product, product_id.0));
        }

        let cart = self
            .carts
            .add_one(&id, &product_id, Utc::now())
            .await
            .map_err(|error| map_cart_error("cart.add_item", error))?;

        info!(
            event_name = "cart.item.added",
            cart_id = %id,
            product_id = %product_id,
            quantity = cart.item(&product_id).map(|item| item.quantity.get()).unwrap_or_default(),
            "cart item added"
        );
        self.resolve(cart).await
    }

    pub async fn remove_item(
        &self,
        raw_cart_id: &str,
        raw_product_id: &str,
    ) -> Result<ResolvedCart, ApplicationError> {
        let id = CartId::parse(raw_cart_id)?;
        let product_id = parse_product_id(raw_product_id)?;

        let cart = self
            .carts
            .remove_item(&id, &product_id, Utc::now())
            .await
            .map_err(|error| map_cart_error("cart.remove_item", error))?;

        info!(event_name = "cart.item.removed", cart_id = %id, product_id = %product_id, "cart item removed");
        self.resolve(cart).await
    }

    pub async fn update_quantity(
        &self,
        raw_cart_id: &str,
        raw_product_id: &str,
        quantity: i64,
    ) -> Result<ResolvedCart, ApplicationError> {
        let quantity = Quantity::new(quantity)?;
        let id = CartId::parse(raw_cart_id)?;
        let product_id = parse_product_id(raw_product_id)?;

        let cart = self
            .carts
            .set_quantity(&id, &product_id, quantity, Utc::now())
            .await
            .map_err(|error| map_cart_error("cart.update_quantity", error))?;

        info!(
            event_name = "cart.item.quantity_set",
            cart_id = %id,
            product_id = %product_id,
            quantity = quantity.get(),
            "cart item quantity updated"
        );
        self.resolve(cart).await
    }

    pub async fn replace_items(
        &self,
        raw_cart_id: &str,
        items: Vec<CartItemInput>,
    ) -> Result<ResolvedCart, ApplicationError> {
        let id = CartId::parse(raw_cart_id)?;
        let items = CartItemInput::validate_all(items)?;
        let count = items.len();

        let cart = self
            .carts
            .replace_items(&id, items, Utc::now())
            .await
            .map_err(|error| map_cart_error("cart.replace_items", error))?;

        info!(event_name = "cart.items.replaced", cart_id = %id, item_count = count, "cart items replaced");
        self.resolve(cart).await
    }

    pub async fn clear(&self, raw_cart_id: &str) -> Result<ResolvedCart, ApplicationError> {
        let id = CartId::parse(raw_cart_id)?;

        let cart = self
            .carts
            .clear(&id, Utc::now())
            .await
            .map_err(|error| map_cart_error("cart.clear", error))?;

        info!(event_name = "cart.cleared", cart_id = %id, "cart cleared");
        self.resolve(cart).await
    }

    /// Second step of a cart read: batch-load the referenced products.
    async fn resolve(&self, cart: Cart) -> Result<ResolvedCart, ApplicationError> {
        let products = self
            .products
            .find_many(&cart.product_ids())
            .await
            .map_err(|error| ApplicationError::persistence("cart.resolve", error))?;
        let catalog = products.into_iter().map(|product| (product.id.clone(), product)).collect();

        let resolved = ResolvedCart::resolve(cart, &catalog);
        let missing = resolved.missing_product_ids();
        if !missing.is_empty() {
            warn!(
                event_name = "cart.reference.missing",
                cart_id = %resolved.id,
                missing = missing.len(),
                "cart references products that no longer exist"
            );
        }
        Ok(resolved)
    }
}

fn map_cart_error(operation: &'static str, error: RepositoryError) -> ApplicationError {
    match error {
        RepositoryError::CartNotFound(id) => ApplicationError::not_found(EntityKind::Cart, id.0),
        RepositoryError::ItemNotFound { cart_id, product_id } => {
            ApplicationError::ItemNotFound { cart_id: cart_id.0, product_id: product_id.0 }
        }
        other => ApplicationError::persistence(operation, other),
    }
}
