pub mod config;
pub mod domain;
pub mod errors;

pub use domain::cart::{
    Cart, CartId, CartItem, CartItemInput, ProductRef, Quantity, ResolvedCart, ResolvedCartItem,
};
pub use domain::listing::{
    ListingRequest, Page, PageDefaults, PageMeta, PriceSort, ProductFilter, ProductQuery,
};
pub use domain::product::{
    NewProduct, Product, ProductChanges, ProductDraft, ProductId, ProductPatch,
};
pub use errors::{ApplicationError, DomainError, EntityKind, InterfaceError};
