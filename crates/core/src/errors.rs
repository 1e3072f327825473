use std::fmt;

use thiserror::Error;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Product,
    Cart,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Product => f.write_str("product"),
            Self::Cart => f.write_str("cart"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("invalid {entity} id `{value}`")]
    InvalidIdentifier { entity: EntityKind, value: String },
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error("validation failed: {0}")]
    Validation(String),
    #[error("{entity} `{id}` not found")]
    NotFound { entity: EntityKind, id: String },
    #[error("product `{product_id}` is not in cart `{cart_id}`")]
    ItemNotFound { cart_id: String, product_id: String },
    #[error("a product with code `{code}` already exists")]
    DuplicateCode { code: String },
    #[error("invalid {entity} id `{id}`")]
    InvalidReference { entity: EntityKind, id: String },
    #[error("persistence failure during {operation}: {message}")]
    Persistence { operation: &'static str, message: String },
}

impl From<DomainError> for ApplicationError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(message) => Self::Validation(message),
            DomainError::InvalidIdentifier { entity, value } => {
                Self::InvalidReference { entity, id: value }
            }
        }
    }
}

impl ApplicationError {
    pub fn not_found(entity: EntityKind, id: impl Into<String>) -> Self {
        Self::NotFound { entity, id: id.into() }
    }

    pub fn persistence(operation: &'static str, error: impl fmt::Display) -> Self {
        Self::Persistence { operation, message: error.to_string() }
    }
}

/// Transport-facing error classes. The HTTP layer maps each class to a status code.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum InterfaceError {
    #[error("bad request: {message}")]
    BadRequest { message: String },
    #[error("not found: {message}")]
    NotFound { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

impl InterfaceError {
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest { message } | Self::NotFound { message } | Self::Internal { message } => {
                message
            }
        }
    }
}

impl From<ApplicationError> for InterfaceError {
    fn from(value: ApplicationError) -> Self {
        let message = value.to_string();
        match value {
            ApplicationError::Validation(_) | ApplicationError::DuplicateCode { .. } => {
                Self::BadRequest { message }
            }
            ApplicationError::NotFound { .. }
            | ApplicationError::ItemNotFound { .. }
            | ApplicationError::InvalidReference { .. } => Self::NotFound { message },
            ApplicationError::Persistence { .. } => Self::Internal { message },
        }
    }
}
