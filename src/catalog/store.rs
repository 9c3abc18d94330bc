use crate::catalog::models::Product;
use crate::supabase::SupabaseClient;
use std::{future::Future, sync::Arc};
use thiserror::Error;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("catalog store request failed: {0}")]
    Request(String),
    #[error("catalog store returned invalid data: {0}")]
    Deserialize(String),
    #[error("product `{0}` not found")]
    NotFound(String),
}

/// Persistence collaborator for the catalog. Implementations may be
/// eventually consistent; callers merge their own writes into reads.
pub trait CatalogStore: Send + Sync {
    fn list_products(&self) -> impl Future<Output = Result<Vec<Product>, StoreError>> + Send;

    fn upsert_products(
        &self,
        products: &[Product],
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete_product(&self, id: &str) -> impl Future<Output = Result<(), StoreError>> + Send;
}

impl<T: CatalogStore> CatalogStore for Arc<T> {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        self.as_ref().list_products().await
    }

    async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        self.as_ref().upsert_products(products).await
    }

    async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        self.as_ref().delete_product(id).await
    }
}

#[derive(Clone, Default)]
pub struct InMemoryCatalogStore {
    products: Arc<Mutex<Vec<Product>>>,
}

impl InMemoryCatalogStore {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(Mutex::new(products)),
        }
    }
}

impl CatalogStore for InMemoryCatalogStore {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        Ok(self.products.lock().await.clone())
    }

    async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        let mut guard = self.products.lock().await;
        for product in products {
            match guard.iter_mut().find(|existing| existing.id == product.id) {
                Some(slot) => *slot = product.clone(),
                None => guard.push(product.clone()),
            }
        }
        Ok(())
    }

    async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        let mut guard = self.products.lock().await;
        let before = guard.len();
        guard.retain(|product| product.id != id);
        if guard.len() == before {
            return Err(StoreError::NotFound(id.to_string()));
        }
        Ok(())
    }
}

/// Store selected at startup: Supabase when configured, memory otherwise.
#[derive(Clone)]
pub enum CatalogBackend {
    Memory(InMemoryCatalogStore),
    Supabase(SupabaseClient),
}

impl CatalogBackend {
    pub fn from_env() -> Self {
        match SupabaseClient::from_env() {
            Some(client) => Self::Supabase(client),
            None => Self::Memory(InMemoryCatalogStore::default()),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            CatalogBackend::Memory(_) => "memory",
            CatalogBackend::Supabase(_) => "supabase",
        }
    }

    pub fn supabase(&self) -> Option<&SupabaseClient> {
        match self {
            CatalogBackend::Supabase(client) => Some(client),
            CatalogBackend::Memory(_) => None,
        }
    }
}

impl CatalogStore for CatalogBackend {
    async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        match self {
            CatalogBackend::Memory(store) => store.list_products().await,
            CatalogBackend::Supabase(client) => client.list_products().await,
        }
    }

    async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        match self {
            CatalogBackend::Memory(store) => store.upsert_products(products).await,
            CatalogBackend::Supabase(client) => client.upsert_products(products).await,
        }
    }

    async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        match self {
            CatalogBackend::Memory(store) => store.delete_product(id).await,
            CatalogBackend::Supabase(client) => client.delete_product(id).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[tokio::test]
    async fn memory_store_upserts_by_id() {
        let store = InMemoryCatalogStore::default();
        let now = Utc::now();
        store
            .upsert_products(&[Product::new("p1", "One", now)])
            .await
            .expect("insert");
        store
            .upsert_products(&[Product::new("p1", "Uno", now), Product::new("p2", "Two", now)])
            .await
            .expect("upsert");
        let products = store.list_products().await.expect("list");
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].name, "Uno");
    }

    #[tokio::test]
    async fn memory_store_reports_missing_delete() {
        let store = InMemoryCatalogStore::new(vec![Product::new("p1", "One", Utc::now())]);
        store.delete_product("p1").await.expect("delete");
        let err = store.delete_product("p1").await.expect_err("gone");
        assert!(matches!(err, StoreError::NotFound(id) if id == "p1"));
    }
}
