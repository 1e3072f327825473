use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use vitrina_core::domain::listing::{ListingRequest, Page, PageDefaults, ProductQuery};
use vitrina_core::domain::product::{Product, ProductDraft, ProductId, ProductPatch};
use vitrina_core::errors::{ApplicationError, EntityKind};
use vitrina_db::{ProductRepository, RepositoryError};

use crate::notifier::ChangeNotifier;

/// Catalog reads and writes. Every successful write pushes a full snapshot to viewers.
pub struct ProductService {
    products: Arc<dyn ProductRepository>,
    notifier: Arc<dyn ChangeNotifier>,
    page_defaults: PageDefaults,
}

impl ProductService {
    pub fn new(
        products: Arc<dyn ProductRepository>,
        notifier: Arc<dyn ChangeNotifier>,
        page_defaults: PageDefaults,
    ) -> Self {
        Self { products, notifier, page_defaults }
    }

    pub fn query_from(&self, request: &ListingRequest) -> Result<ProductQuery, ApplicationError> {
        Ok(ProductQuery::from_request(request, self.page_defaults)?)
    }

    pub async fn list(&self, query: &ProductQuery) -> Result<Page<Product>, ApplicationError> {
        if query.page == 0 || query.limit == 0 {
            return Err(ApplicationError::Validation(
                "page and limit must be positive integers".to_string(),
            ));
        }
        let query = ProductQuery { limit: query.limit.min(self.page_defaults.max_limit), ..query.clone() };

        self.products
            .list_page(&query)
            .await
            .map_err(|error| ApplicationError::persistence("product.list", error))
    }

    pub async fn get(&self, raw_id: &str) -> Result<Product, ApplicationError> {
        let id = parse_product_id(raw_id)?;
        self.products
            .find_by_id(&id)
            .await
            .map_err(|error| ApplicationError::persistence("product.get", error))?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Product, id.0))
    }

    /// The whole catalog without pagination.
    pub async fn snapshot(&self) -> Result<Vec<Product>, ApplicationError> {
        self.products
            .list_all()
            .await
            .map_err(|error| ApplicationError::persistence("product.snapshot", error))
    }

    pub async fn create(&self, draft: ProductDraft) -> Result<Product, ApplicationError> {
        let new_product = draft.validate()?;

        // Fast path only; the store's unique index decides races.
        let existing = self
            .products
            .find_by_code(&new_product.code)
            .await
            .map_err(|error| ApplicationError::persistence("product.create", error))?;
        if existing.is_some() {
            return Err(ApplicationError::DuplicateCode { code: new_product.code });
        }

        let code = new_product.code.clone();
        let product = new_product.into_product(ProductId::generate(), Utc::now());
        self.products.insert(product.clone()).await.map_err(|error| match error {
            RepositoryError::Conflict { field: "code" } => ApplicationError::DuplicateCode { code },
            other => ApplicationError::persistence("product.create", other),
        })?;

        info!(
            event_name = "catalog.product.created",
            product_id = %product.id,
            code = %product.code,
            "product created"
        );
        self.notifier.broadcast_all().await;

        Ok(product)
    }

    pub async fn update(&self, raw_id: &str, patch: ProductPatch) -> Result<Product, ApplicationError> {
        let id = parse_product_id(raw_id)?;
        let changes = patch.validate()?;

        let updated = self
            .products
            .update(&id, &changes, Utc::now())
            .await
            .map_err(|error| ApplicationError::persistence("product.update", error))?
            .ok_or_else(|| ApplicationError::not_found(EntityKind::Product, id.0.clone()))?;

        info!(
            event_name = "catalog.product.updated",
            product_id = %updated.id,
            empty_patch = changes.is_empty(),
            "product updated"
        );
        self.notifier.broadcast_all().await;

        Ok(updated)
    }

    pub async fn delete(&self, raw_id: &str) -> Result<(), ApplicationError> {
        let id = parse_product_id(raw_id)?;

        let removed = self
            .products
            .delete(&id)
            .await
            .map_err(|error| ApplicationError::persistence("product.delete", error))?;
        if !removed {
            return Err(ApplicationError::not_found(EntityKind::Product, id.0));
        }

        info!(event_name = "catalog.product.deleted", product_id = %id, "product deleted");
        self.notifier.broadcast_all().await;

        Ok(())
    }
}

/// A malformed product id cannot name an existing product, so it reads as not found.
pub(crate) fn parse_product_id(raw: &str) -> Result<ProductId, ApplicationError> {
    ProductId::parse(raw).map_err(|_| ApplicationError::not_found(EntityKind::Product, raw))
}
