pub mod index;
pub mod models;
pub mod sku;
pub mod snapshot;
pub mod store;

pub use index::{CatalogIndex, RowRef};
pub use models::{MekariState, MekariStatus, Product, VariantAxis, VariantPricingRow};
pub use snapshot::CatalogSnapshot;
pub use store::{CatalogBackend, CatalogStore, InMemoryCatalogStore, StoreError};
