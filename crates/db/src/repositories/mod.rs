use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

use vitrina_core::domain::cart::{Cart, CartId, CartItem, Quantity};
use vitrina_core::domain::listing::{Page, ProductQuery};
use vitrina_core::domain::product::{Product, ProductChanges, ProductId};

pub mod cart;
pub mod memory;
pub mod product;

pub use cart::SqlCartRepository;
pub use memory::{InMemoryCartRepository, InMemoryProductRepository};
pub use product::SqlProductRepository;

#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("decode error: {0}")]
    Decode(String),
    #[error("unique constraint violated on `{field}`")]
    Conflict { field: &'static str },
    #[error("cart `{0}` not found")]
    CartNotFound(CartId),
    #[error("product `{product_id}` is not in cart `{cart_id}`")]
    ItemNotFound { cart_id: CartId, product_id: ProductId },
}

/// Catalog Store. Implementations own the uniqueness of `code`: `insert` must reject a
/// second product with the same code even when both inserts race.
#[async_trait]
pub trait ProductRepository: Send + Sync {
    async fn insert(&self, product: Product) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError>;

    async fn find_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError>;

    /// Products for the given ids that still exist, in no particular order.
    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError>;

    async fn list_page(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError>;

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError>;

    /// Applies `changes` atomically. `None` when the product does not exist.
    async fn update(
        &self,
        id: &ProductId,
        changes: &ProductChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepositoryError>;

    /// Returns whether a product was removed.
    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError>;
}

/// Cart Store. Every mutation is a single atomic step that returns the cart as it
/// stands after the change, or [`RepositoryError::CartNotFound`].
#[async_trait]
pub trait CartRepository: Send + Sync {
    async fn insert(&self, cart: Cart) -> Result<(), RepositoryError>;

    async fn find_by_id(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError>;

    /// Increments the entry for `product_id` by one, creating it with quantity 1.
    async fn add_one(
        &self,
        id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError>;

    /// Removing an absent entry is not an error.
    async fn remove_item(
        &self,
        id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError>;

    async fn set_quantity(
        &self,
        id: &CartId,
        product_id: &ProductId,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError>;

    async fn replace_items(
        &self,
        id: &CartId,
        items: Vec<CartItem>,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError>;

    async fn clear(&self, id: &CartId, now: DateTime<Utc>) -> Result<Cart, RepositoryError>;
}
