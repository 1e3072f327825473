pub mod cart;
pub mod notifier;
pub mod product;

pub use cart::CartService;
pub use notifier::{
    BroadcastReport, CatalogSnapshot, ChangeNotifier, NoopNotifier, ViewerChannel, ViewerId,
    ViewerRegistry,
};
pub use product::ProductService;
