use crate::catalog::models::Product;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Last known catalog contents, shared between the sync engine, the merge
/// service and the read endpoints.
#[derive(Clone, Default)]
pub struct CatalogSnapshot {
    products: Arc<RwLock<Vec<Product>>>,
}

impl CatalogSnapshot {
    pub fn new(products: Vec<Product>) -> Self {
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }

    pub async fn read(&self) -> Vec<Product> {
        self.products.read().await.clone()
    }

    pub async fn replace(&self, products: Vec<Product>) {
        *self.products.write().await = products;
    }

    pub async fn remove(&self, ids: &[String]) {
        self.products
            .write()
            .await
            .retain(|product| !ids.contains(&product.id));
    }

    /// Overlays `written` onto `base` so a stale post-write read never hides
    /// this process's own writes.
    pub fn merge_writes(mut base: Vec<Product>, written: &[Product]) -> Vec<Product> {
        for product in written {
            match base.iter_mut().find(|existing| existing.id == product.id) {
                Some(slot) if slot.updated_at <= product.updated_at => *slot = product.clone(),
                Some(_) => {}
                None => base.push(product.clone()),
            }
        }
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    #[test]
    fn merge_prefers_newer_writes_and_appends_missing() {
        let now = Utc::now();
        let stale = Product::new("p1", "Old", now - Duration::seconds(30));
        let mut fresh = Product::new("p1", "New", now);
        fresh.updated_at = now;
        let created = Product::new("p2", "Created", now);

        let merged = CatalogSnapshot::merge_writes(vec![stale], &[fresh, created]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].name, "New");
        assert_eq!(merged[1].id, "p2");
    }

    #[test]
    fn merge_keeps_store_copy_when_it_is_newer() {
        let now = Utc::now();
        let mut stored = Product::new("p1", "Edited elsewhere", now);
        stored.updated_at = now + Duration::seconds(5);
        let written = Product::new("p1", "Ours", now);
        let merged = CatalogSnapshot::merge_writes(vec![stored], &[written]);
        assert_eq!(merged[0].name, "Edited elsewhere");
    }
}
