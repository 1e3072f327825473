pub mod cart;
pub mod listing;
pub mod product;
