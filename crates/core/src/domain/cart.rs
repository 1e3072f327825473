use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::product::{Product, ProductId};
use crate::errors::{DomainError, EntityKind};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CartId(pub String);

impl CartId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(raw.trim()).map(|id| Self(id.to_string())).map_err(|_| {
            DomainError::InvalidIdentifier { entity: EntityKind::Cart, value: raw.to_string() }
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CartId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A strictly positive item quantity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Quantity(u32);

impl Quantity {
    pub const ONE: Quantity = Quantity(1);

    pub fn new(raw: i64) -> Result<Self, DomainError> {
        match u32::try_from(raw) {
            Ok(value) if value > 0 => Ok(Self(value)),
            _ => Err(DomainError::Validation(format!(
                "quantity must be a positive integer, got {raw}"
            ))),
        }
    }

    pub fn get(self) -> u32 {
        self.0
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartItem {
    #[serde(rename = "product")]
    pub product_id: ProductId,
    pub quantity: Quantity,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cart {
    pub id: CartId,
    #[serde(rename = "products")]
    pub items: Vec<CartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn new(id: CartId, now: DateTime<Utc>) -> Self {
        Self { id, items: Vec::new(), created_at: now, updated_at: now }
    }

    pub fn item(&self, product_id: &ProductId) -> Option<&CartItem> {
        self.items.iter().find(|item| &item.product_id == product_id)
    }

    /// Adds one unit of `product_id`, merging into an existing entry when present.
    pub fn add_one(&mut self, product_id: ProductId) -> Quantity {
        if let Some(item) = self.items.iter_mut().find(|item| item.product_id == product_id) {
            item.quantity = Quantity(item.quantity.0.saturating_add(1));
            return item.quantity;
        }
        self.items.push(CartItem { product_id, quantity: Quantity::ONE });
        Quantity::ONE
    }

    /// Returns whether an entry was removed.
    pub fn remove(&mut self, product_id: &ProductId) -> bool {
        let before = self.items.len();
        self.items.retain(|item| &item.product_id != product_id);
        before != self.items.len()
    }

    /// Returns `false` when the product has no entry in this cart.
    pub fn set_quantity(&mut self, product_id: &ProductId, quantity: Quantity) -> bool {
        match self.items.iter_mut().find(|item| &item.product_id == product_id) {
            Some(item) => {
                item.quantity = quantity;
                true
            }
            None => false,
        }
    }

    pub fn product_ids(&self) -> Vec<ProductId> {
        self.items.iter().map(|item| item.product_id.clone()).collect()
    }
}

/// Raw item from a wholesale replace request.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct CartItemInput {
    pub product: Option<String>,
    pub quantity: Option<i64>,
}

impl CartItemInput {
    pub fn validate_all(inputs: Vec<CartItemInput>) -> Result<Vec<CartItem>, DomainError> {
        let mut seen = HashSet::new();
        let mut items = Vec::with_capacity(inputs.len());

        for (index, input) in inputs.into_iter().enumerate() {
            let raw_product = input.product.ok_or_else(|| {
                DomainError::Validation(format!("products[{index}].product is required"))
            })?;
            let product_id = ProductId::parse(&raw_product).map_err(|_| {
                DomainError::Validation(format!(
                    "products[{index}].product `{raw_product}` is not a valid product id"
                ))
            })?;
            let quantity = input
                .quantity
                .ok_or_else(|| {
                    DomainError::Validation(format!("products[{index}].quantity is required"))
                })
                .and_then(Quantity::new)?;

            if !seen.insert(product_id.clone()) {
                return Err(DomainError::Validation(format!(
                    "product `{product_id}` appears more than once"
                )));
            }
            items.push(CartItem { product_id, quantity });
        }

        Ok(items)
    }
}

/// Outcome of resolving one cart entry against the catalog.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum ProductRef {
    Resolved { product: Product },
    Missing,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCartItem {
    pub product_id: ProductId,
    pub quantity: Quantity,
    #[serde(flatten)]
    pub reference: ProductRef,
}

impl ResolvedCartItem {
    pub fn is_missing(&self) -> bool {
        matches!(self.reference, ProductRef::Missing)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedCart {
    pub id: CartId,
    pub products: Vec<ResolvedCartItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl ResolvedCart {
    /// Joins cart entries with the products that could be found. Entries whose product
    /// no longer exists are kept and marked [`ProductRef::Missing`].
    pub fn resolve(cart: Cart, catalog: &HashMap<ProductId, Product>) -> Self {
        let products = cart
            .items
            .into_iter()
            .map(|item| {
                let reference = match catalog.get(&item.product_id) {
                    Some(product) => ProductRef::Resolved { product: product.clone() },
                    None => ProductRef::Missing,
                };
                ResolvedCartItem { product_id: item.product_id, quantity: item.quantity, reference }
            })
            .collect();

        Self { id: cart.id, products, created_at: cart.created_at, updated_at: cart.updated_at }
    }

    pub fn missing_product_ids(&self) -> Vec<&ProductId> {
        self.products.iter().filter(|item| item.is_missing()).map(|item| &item.product_id).collect()
    }
}
