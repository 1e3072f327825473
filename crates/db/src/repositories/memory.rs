use std::collections::HashMap;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use vitrina_core::domain::cart::{Cart, CartId, CartItem, Quantity};
use vitrina_core::domain::listing::{Page, PageMeta, PriceSort, ProductQuery};
use vitrina_core::domain::product::{Product, ProductChanges, ProductId};

use super::{CartRepository, ProductRepository, RepositoryError};

/// Products kept in insertion order, which is also the tie-break for price sorting.
#[derive(Default)]
pub struct InMemoryProductRepository {
    products: RwLock<Vec<Product>>,
}

#[async_trait::async_trait]
impl ProductRepository for InMemoryProductRepository {
    async fn insert(&self, product: Product) -> Result<(), RepositoryError> {
        let mut products = self.products.write().await;
        if products.iter().any(|existing| existing.code == product.code) {
            return Err(RepositoryError::Conflict { field: "code" });
        }
        if products.iter().any(|existing| existing.id == product.id) {
            return Err(RepositoryError::Conflict { field: "id" });
        }
        products.push(product);
        Ok(())
    }

    async fn find_by_id(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| &product.id == id).cloned())
    }

    async fn find_by_code(&self, code: &str) -> Result<Option<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().find(|product| product.code == code).cloned())
    }

    async fn find_many(&self, ids: &[ProductId]) -> Result<Vec<Product>, RepositoryError> {
        let products = self.products.read().await;
        Ok(products.iter().filter(|product| ids.contains(&product.id)).cloned().collect())
    }

    async fn list_page(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let products = self.products.read().await;
        let mut matching: Vec<&Product> =
            products.iter().filter(|product| query.filter.matches(product)).collect();

        match query.sort {
            Some(PriceSort::Asc) => matching.sort_by(|a, b| a.price.cmp(&b.price)),
            Some(PriceSort::Desc) => matching.sort_by(|a, b| b.price.cmp(&a.price)),
            None => {}
        }

        let total_docs = matching.len() as u64;
        let offset = usize::try_from(query.offset()).unwrap_or(usize::MAX);
        let items = matching
            .into_iter()
            .skip(offset)
            .take(query.limit as usize)
            .cloned()
            .collect();

        Ok(Page { items, meta: PageMeta::compute(total_docs, query.page, query.limit) })
    }

    async fn list_all(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.products.read().await.clone())
    }

    async fn update(
        &self,
        id: &ProductId,
        changes: &ProductChanges,
        now: DateTime<Utc>,
    ) -> Result<Option<Product>, RepositoryError> {
        let mut products = self.products.write().await;
        let Some(product) = products.iter_mut().find(|product| &product.id == id) else {
            return Ok(None);
        };
        changes.apply_to(product, now);
        Ok(Some(product.clone()))
    }

    async fn delete(&self, id: &ProductId) -> Result<bool, RepositoryError> {
        let mut products = self.products.write().await;
        let before = products.len();
        products.retain(|product| &product.id != id);
        Ok(products.len() != before)
    }
}

#[derive(Default)]
pub struct InMemoryCartRepository {
    carts: RwLock<HashMap<String, Cart>>,
}

impl InMemoryCartRepository {
    /// Runs `mutate` against the stored cart under the write lock and returns the result.
    async fn mutate<F>(&self, id: &CartId, now: DateTime<Utc>, mutate: F) -> Result<Cart, RepositoryError>
    where
        F: FnOnce(&mut Cart) -> Result<(), RepositoryError> + Send,
    {
        let mut carts = self.carts.write().await;
        let cart = carts.get_mut(&id.0).ok_or_else(|| RepositoryError::CartNotFound(id.clone()))?;
        let mut draft = cart.clone();
        mutate(&mut draft)?;
        draft.updated_at = now;
        *cart = draft.clone();
        Ok(draft)
    }
}

#[async_trait::async_trait]
impl CartRepository for InMemoryCartRepository {
    async fn insert(&self, cart: Cart) -> Result<(), RepositoryError> {
        let mut carts = self.carts.write().await;
        if carts.contains_key(&cart.id.0) {
            return Err(RepositoryError::Conflict { field: "id" });
        }
        carts.insert(cart.id.0.clone(), cart);
        Ok(())
    }

    async fn find_by_id(&self, id: &CartId) -> Result<Option<Cart>, RepositoryError> {
        let carts = self.carts.read().await;
        Ok(carts.get(&id.0).cloned())
    }

    async fn add_one(
        &self,
        id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        self.mutate(id, now, |cart| {
            cart.add_one(product_id.clone());
            Ok(())
        })
        .await
    }

    async fn remove_item(
        &self,
        id: &CartId,
        product_id: &ProductId,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        self.mutate(id, now, |cart| {
            cart.remove(product_id);
            Ok(())
        })
        .await
    }

    async fn set_quantity(
        &self,
        id: &CartId,
        product_id: &ProductId,
        quantity: Quantity,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        self.mutate(id, now, |cart| {
            if cart.set_quantity(product_id, quantity) {
                Ok(())
            } else {
                Err(RepositoryError::ItemNotFound {
                    cart_id: cart.id.clone(),
                    product_id: product_id.clone(),
                })
            }
        })
        .await
    }

    async fn replace_items(
        &self,
        id: &CartId,
        items: Vec<CartItem>,
        now: DateTime<Utc>,
    ) -> Result<Cart, RepositoryError> {
        self.mutate(id, now, |cart| {
            cart.items = items;
            Ok(())
        })
        .await
    }

    async fn clear(&self, id: &CartId, now: DateTime<Utc>) -> Result<Cart, RepositoryError> {
        self.mutate(id, now, |cart| {
            cart.items.clear();
            Ok(())
        })
        .await
    }
}
