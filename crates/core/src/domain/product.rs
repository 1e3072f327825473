use std::fmt;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::{DomainError, EntityKind};

const MIN_TITLE_CHARS: usize = 3;
const MIN_DESCRIPTION_CHARS: usize = 10;

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub String);

impl ProductId {
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Accepts any UUID spelling and returns the canonical lowercase hyphenated form.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        Uuid::parse_str(raw.trim()).map(|id| Self(id.to_string())).map_err(|_| {
            DomainError::InvalidIdentifier { entity: EntityKind::Product, value: raw.to_string() }
        })
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProductId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    pub code: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub status: bool,
    pub thumbnails: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Raw create payload. Every field is optional so that missing fields surface as
/// validation messages instead of deserialization failures.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductDraft {
    pub title: Option<String>,
    pub description: Option<String>,
    pub code: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub status: Option<bool>,
    pub thumbnails: Option<Vec<String>>,
}

/// A validated product ready to be inserted. `code` is already trimmed and uppercased.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewProduct {
    pub title: String,
    pub description: String,
    pub code: String,
    pub price: Decimal,
    pub stock: u32,
    pub category: String,
    pub status: bool,
    pub thumbnails: Vec<String>,
}

impl NewProduct {
    pub fn into_product(self, id: ProductId, now: DateTime<Utc>) -> Product {
        Product {
            id,
            title: self.title,
            description: self.description,
            code: self.code,
            price: self.price,
            stock: self.stock,
            category: self.category,
            status: self.status,
            thumbnails: self.thumbnails,
            created_at: now,
            updated_at: now,
        }
    }
}

pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_uppercase()
}

impl ProductDraft {
    pub fn validate(self) -> Result<NewProduct, DomainError> {
        let mut problems = Violations::default();

        let title = problems.required_text("title", self.title, MIN_TITLE_CHARS);
        let description =
            problems.required_text("description", self.description, MIN_DESCRIPTION_CHARS);
        let code = problems.required_text("code", self.code, 1).map(|code| normalize_code(&code));
        let category = problems.required_text("category", self.category, 1);
        let price = match self.price {
            Some(price) => problems.price(price),
            None => problems.missing("price"),
        };
        let stock = match self.stock {
            Some(stock) => problems.stock(stock),
            None => problems.missing("stock"),
        };
        let thumbnails = problems.thumbnails(self.thumbnails.unwrap_or_default());

        problems.finish()?;

        match (title, description, code, price, stock, category) {
            (
                Some(title),
                Some(description),
                Some(code),
                Some(price),
                Some(stock),
                Some(category),
            ) => Ok(NewProduct {
                title,
                description,
                code,
                price,
                stock,
                category,
                status: self.status.unwrap_or(true),
                thumbnails,
            }),
            _ => Err(DomainError::Validation("missing required product fields".to_string())),
        }
    }
}

/// Partial update payload. Only the fields listed here may change; `id` and `code`
/// are not part of the mask, so any such keys in the request body are ignored.
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default, with = "rust_decimal::serde::float_option")]
    pub price: Option<Decimal>,
    pub stock: Option<i64>,
    pub category: Option<String>,
    pub status: Option<bool>,
    pub thumbnails: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ProductChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub stock: Option<u32>,
    pub category: Option<String>,
    pub status: Option<bool>,
    pub thumbnails: Option<Vec<String>>,
}

impl ProductPatch {
    pub fn validate(self) -> Result<ProductChanges, DomainError> {
        let mut problems = Violations::default();

        let title = self.title.and_then(|v| problems.required_text("title", Some(v), MIN_TITLE_CHARS));
        let description = self
            .description
            .and_then(|v| problems.required_text("description", Some(v), MIN_DESCRIPTION_CHARS));
        let category = self.category.and_then(|v| problems.required_text("category", Some(v), 1));
        let price = self.price.and_then(|v| problems.price(v));
        let stock = self.stock.and_then(|v| problems.stock(v));
        let thumbnails = self.thumbnails.map(|v| problems.thumbnails(v));

        problems.finish()?;

        Ok(ProductChanges {
            title,
            description,
            price,
            stock,
            category,
            status: self.status,
            thumbnails,
        })
    }
}

impl ProductChanges {
    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn apply_to(&self, product: &mut Product, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            product.title = title.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(status) = self.status {
            product.status = status;
        }
        if let Some(thumbnails) = &self.thumbnails {
            product.thumbnails = thumbnails.clone();
        }
        product.updated_at = now;
    }
}

#[derive(Default)]
struct Violations {
    messages: Vec<String>,
}

impl Violations {
    fn missing<T>(&mut self, field: &str) -> Option<T> {
        self.messages.push(format!("{field} is required"));
        None
    }

    fn required_text(&mut self, field: &str, value: Option<String>, min_chars: usize) -> Option<String> {
        let Some(value) = value else {
            return self.missing(field);
        };
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return self.missing(field);
        }
        if trimmed.chars().count() < min_chars {
            self.messages.push(format!("{field} must be at least {min_chars} characters"));
            return None;
        }
        Some(trimmed.to_string())
    }

    fn price(&mut self, price: Decimal) -> Option<Decimal> {
        if price.is_sign_negative() && !price.is_zero() {
            self.messages.push("price must not be negative".to_string());
            return None;
        }
        Some(price.normalize())
    }

    fn stock(&mut self, stock: i64) -> Option<u32> {
        if stock < 0 {
            self.messages.push("stock must not be negative".to_string());
            return None;
        }
        match u32::try_from(stock) {
            Ok(stock) => Some(stock),
            Err(_) => {
                self.messages.push(format!("stock must be at most {}", u32::MAX));
                None
            }
        }
    }

    fn thumbnails(&mut self, thumbnails: Vec<String>) -> Vec<String> {
        let cleaned: Vec<String> =
            thumbnails.iter().map(|thumbnail| thumbnail.trim().to_string()).collect();
        if cleaned.iter().any(String::is_empty) {
            self.messages.push("thumbnails must not contain empty entries".to_string());
        }
        cleaned
    }

    fn finish(self) -> Result<(), DomainError> {
        if self.messages.is_empty() {
            Ok(())
        } else {
            Err(DomainError::Validation(self.messages.join(", ")))
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{ProductDraft, ProductId, ProductPatch};
    use crate::errors::DomainError;

    fn mouse_draft() -> ProductDraft {
        ProductDraft {
            title: Some("Mouse".to_string()),
            description: Some("Wireless mouse device".to_string()),
            code: Some("mou001".to_string()),
            price: Some(Decimal::from(100)),
            stock: Some(5),
            category: Some("Accessories".to_string()),
            status: None,
            thumbnails: None,
        }
    }

    #[test]
    fn draft_uppercases_code_and_defaults_status() {
        let product = mouse_draft().validate().expect("valid draft");

        assert_eq!(product.code, "MOU001");
        assert!(product.status);
        assert!(product.thumbnails.is_empty());
    }

    #[test]
    fn draft_trims_text_fields() {
        let draft = ProductDraft {
            title: Some("  Mouse  ".to_string()),
            code: Some("  mou001 ".to_string()),
            ..mouse_draft()
        };

        let product = draft.validate().expect("valid draft");
        assert_eq!(product.title, "Mouse");
        assert_eq!(product.code, "MOU001");
    }

    #[test]
    fn draft_reports_every_missing_field() {
        let error = ProductDraft::default().validate().expect_err("empty draft should fail");

        let DomainError::Validation(message) = error else {
            panic!("expected validation error");
        };
        for field in ["title", "description", "code", "price", "stock", "category"] {
            assert!(message.contains(&format!("{field} is required")), "missing {field}: {message}");
        }
    }

    #[test]
    fn draft_rejects_short_text_and_negative_numbers() {
        let draft = ProductDraft {
            title: Some("ab".to_string()),
            description: Some("short".to_string()),
            price: Some(Decimal::new(-1, 0)),
            stock: Some(-3),
            ..mouse_draft()
        };

        let error = draft.validate().expect_err("invalid draft");
        let DomainError::Validation(message) = error else {
            panic!("expected validation error");
        };
        assert!(message.contains("title must be at least 3 characters"));
        assert!(message.contains("description must be at least 10 characters"));
        assert!(message.contains("price must not be negative"));
        assert!(message.contains("stock must not be negative"));
    }

    #[test]
    fn patch_ignores_id_and_code_keys() {
        let patch: ProductPatch = serde_json::from_str(
            r#"{"id":"abc","code":"NEW","_id":"x","price":12.5,"title":"Mouse Pro"}"#,
        )
        .expect("patch should deserialize");

        let changes = patch.validate().expect("valid patch");
        assert_eq!(changes.price, Some(Decimal::new(125, 1)));
        assert_eq!(changes.title.as_deref(), Some("Mouse Pro"));
        assert_eq!(changes.stock, None);
    }

    #[test]
    fn patch_validates_provided_numbers() {
        let patch = ProductPatch { stock: Some(-1), ..ProductPatch::default() };

        assert!(matches!(patch.validate(), Err(DomainError::Validation(_))));
    }

    #[test]
    fn product_id_parse_canonicalizes_and_rejects_garbage() {
        let id = ProductId::parse("6F9619FF-8B86-D011-B42D-00C04FC964FF").expect("valid uuid");
        assert_eq!(id.as_str(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");

        assert!(matches!(
            ProductId::parse("64f0c2e1"),
            Err(DomainError::InvalidIdentifier { .. })
        ));
    }
}
