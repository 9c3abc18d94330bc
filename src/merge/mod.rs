pub mod fold;
pub mod groups;

pub use fold::MergeError;
pub use groups::{MappingGroup, build_auto_mapping_groups};

use crate::catalog::{CatalogSnapshot, CatalogStore};
use chrono::Utc;
use fold::merge_into;
use serde::Serialize;
use tracing::{info, warn};

const DELETE_ATTEMPTS: usize = 2;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FailedDeletion {
    pub product_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeReport {
    pub primary_id: String,
    pub spu: String,
    pub variant_count: usize,
    pub removed: Vec<String>,
    pub failed_deletions: Vec<FailedDeletion>,
}

/// Applies merge plans against the store and keeps the snapshot in step.
pub struct MergeService<S> {
    store: S,
    snapshot: CatalogSnapshot,
}

impl<S: CatalogStore> MergeService<S> {
    pub fn new(store: S, snapshot: CatalogSnapshot) -> Self {
        Self { store, snapshot }
    }

    pub async fn merge(&self, ids: &[String], target_spu: &str) -> Result<MergeReport, MergeError> {
        let products = self.store.list_products().await?;
        let plan = merge_into(&products, ids, target_spu, Utc::now())?;
        let primary = plan.primary;

        self.store.upsert_products(std::slice::from_ref(&primary)).await?;
        info!(
            target = "catalog.merge",
            product_id = %primary.id,
            spu = primary.spu.as_deref().unwrap_or_default(),
            rows = primary.variant_pricing.len(),
            "primary product upserted"
        );

        let mut removed = Vec::new();
        let mut failed_deletions = Vec::new();
        for id in &plan.removed_ids {
            let mut last_error = None;
            for attempt in 1..=DELETE_ATTEMPTS {
                match self.store.delete_product(id).await {
                    Ok(()) => {
                        last_error = None;
                        break;
                    }
                    Err(err) => {
                        warn!(target = "catalog.merge", product_id = %id, attempt, error = %err, "delete failed");
                        last_error = Some(err);
                    }
                }
            }
            match last_error {
                None => removed.push(id.clone()),
                Some(err) => failed_deletions.push(FailedDeletion {
                    product_id: id.clone(),
                    message: err.to_string(),
                }),
            }
        }

        let merged = CatalogSnapshot::merge_writes(self.snapshot.read().await, std::slice::from_ref(&primary));
        self.snapshot.replace(merged).await;
        self.snapshot.remove(&removed).await;

        Ok(MergeReport {
            primary_id: primary.id.clone(),
            spu: primary.spu.clone().unwrap_or_default(),
            variant_count: primary.variant_pricing.len(),
            removed,
            failed_deletions,
        })
    }
}
