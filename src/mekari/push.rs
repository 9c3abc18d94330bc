use crate::catalog::{
    CatalogSnapshot, CatalogStore, MekariState, MekariStatus, Product, StoreError, VariantPricingRow,
};
use crate::mekari::client::{MekariClient, MekariError};
use crate::mekari::models::ProductPayload;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum PushError {
    #[error(transparent)]
    Remote(#[from] MekariError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushFailure {
    pub sku: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushReport {
    pub attempted: usize,
    pub created_count: usize,
    pub updated_count: usize,
    pub errors: Vec<PushFailure>,
}

/// Registry name for a row: `"{product} - {variant values}"`.
pub fn remote_name(product: &Product, row: &VariantPricingRow) -> String {
    let label = row.variants.values().map(String::as_str).collect::<Vec<_>>().join(" / ");
    if label.is_empty() {
        product.name.clone()
    } else {
        format!("{} - {label}", product.name)
    }
}

fn payload_for(product: &Product, row: &VariantPricingRow) -> ProductPayload {
    ProductPayload {
        name: remote_name(product, row),
        description: Some(product.description.clone()).filter(|d| !d.trim().is_empty()),
        buy_price_per_unit: row.purchase_price_idr,
        sell_price_per_unit: row.offline_price,
        custom_id: Some(row.id.clone()).filter(|id| !id.is_empty()),
        product_code: Some(row.seller_sku.trim().to_string()),
        ..ProductPayload::default()
    }
}

/// Creates or updates one registry product per pricing row of the selected
/// products (all products when `product_ids` is `None`). Per-row failures
/// are collected; created ids are written back and persisted.
pub async fn push_products<S: CatalogStore>(
    client: &MekariClient,
    store: &S,
    snapshot: &CatalogSnapshot,
    product_ids: Option<&[String]>,
) -> Result<PushReport, PushError> {
    if !client.configured() {
        return Err(PushError::Remote(MekariError::Unconfigured));
    }
    let mut products = store.list_products().await?;
    let mut report = PushReport::default();
    let mut changed = Vec::new();
    let now = Utc::now();

    for product in products.iter_mut() {
        if product_ids.is_some_and(|ids| !ids.contains(&product.id)) {
            continue;
        }
        let mut failures = Vec::new();
        let mut pushed = 0;
        for idx in 0..product.variant_pricing.len() {
            let row = &product.variant_pricing[idx];
            let sku = row.seller_sku.trim().to_string();
            report.attempted += 1;
            if sku.is_empty() {
                failures.push(PushFailure {
                    sku,
                    message: format!("row {} has no seller SKU", row.id),
                });
                continue;
            }
            let payload = payload_for(product, row);
            let existing = row
                .mekari_product_id
                .as_deref()
                .map(str::trim)
                .filter(|id| !id.is_empty())
                .map(str::to_string);
            let result = match existing {
                Some(id) => client.update_product(&id, &payload).await.map(|_| None),
                None => {
                    let payload = payload.with_create_fields(
                        row.stock.unwrap_or(0),
                        now.format("%Y-%m-%d").to_string(),
                    );
                    client.create_product(&payload).await.map(Some)
                }
            };
            match result {
                Ok(Some(id)) => {
                    product.variant_pricing[idx].mekari_product_id = Some(id);
                    report.created_count += 1;
                    pushed += 1;
                }
                Ok(None) => {
                    report.updated_count += 1;
                    pushed += 1;
                }
                Err(err) => {
                    warn!(target = "catalog.mekari", sku = %sku, error = %err, "push failed");
                    failures.push(PushFailure {
                        sku,
                        message: err.to_string(),
                    });
                }
            }
        }
        if !failures.is_empty() {
            let summary = failures
                .iter()
                .map(|f| f.message.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            product.mekari_status = Some(MekariStatus::failed(now, summary));
        } else if pushed > 0 {
            // a clean push clears any error left by an earlier one
            product.mekari_status = Some(MekariStatus::new(
                MekariState::Synced,
                now,
                format!("pushed {pushed} variant(s) to Mekari"),
            ));
        }
        if pushed > 0 || !failures.is_empty() {
            product.updated_at = now;
            changed.push(product.clone());
        }
        report.errors.extend(failures);
    }

    if !changed.is_empty() {
        store.upsert_products(&changed).await?;
        let merged = CatalogSnapshot::merge_writes(snapshot.read().await, &changed);
        snapshot.replace(merged).await;
    }
    info!(
        target = "catalog.mekari",
        attempted = report.attempted,
        created = report.created_count,
        updated = report.updated_count,
        failed = report.errors.len(),
        "bulk push finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::InMemoryCatalogStore;
    use crate::mekari::config::PRODUCTS_PATH;
    use axum::{
        Json, Router,
        extract::Path,
        http::StatusCode,
        routing::{patch, post},
    };
    use serde_json::{Value, json};

    async fn registry() -> String {
        let router = Router::new()
            .route(
                PRODUCTS_PATH,
                post(|Json(body): Json<Value>| async move {
                    let code = body["product"]["product_code"].as_str().unwrap_or("").to_string();
                    Json(json!({ "product": { "id": 500, "product_code": code } }))
                }),
            )
            .route(
                &format!("{PRODUCTS_PATH}/{{id}}"),
                patch(|Path(id): Path<String>| async move {
                    if id == "bad" {
                        (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "errors": ["name is too long"] })))
                    } else {
                        (StatusCode::OK, Json(json!({ "product": { "id": id } })))
                    }
                }),
            );
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind");
        let addr = listener.local_addr().expect("addr");
        tokio::spawn(async move {
            let _ = axum::serve(listener, router).await;
        });
        format!("http://{addr}")
    }

    fn product() -> Product {
        let mut product = Product::new("p1", "Widget", Utc::now());
        let mut fresh = VariantPricingRow::new("r1", "SKU-NEW");
        fresh.variants.insert("Warna".into(), "Merah".into());
        let mut linked = VariantPricingRow::new("r2", "SKU-OLD");
        linked.mekari_product_id = Some("77".into());
        let mut broken = VariantPricingRow::new("r3", "SKU-BAD");
        broken.mekari_product_id = Some("bad".into());
        product.variant_pricing = vec![fresh, linked, broken];
        product
    }

    #[test]
    fn remote_names_join_variant_values() {
        let p = product();
        assert_eq!(remote_name(&p, &p.variant_pricing[0]), "Widget - Merah");
        assert_eq!(remote_name(&p, &p.variant_pricing[1]), "Widget");
    }

    #[tokio::test]
    async fn push_creates_updates_and_collects_failures() {
        let store = InMemoryCatalogStore::new(vec![product()]);
        let snapshot = CatalogSnapshot::new(vec![product()]);
        let client = MekariClient::new(registry().await, "token");

        let report = push_products(&client, &store, &snapshot, None)
            .await
            .expect("push");
        assert_eq!(report.attempted, 3);
        assert_eq!(report.created_count, 1);
        assert_eq!(report.updated_count, 1);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].sku, "SKU-BAD");
        assert!(report.errors[0].message.contains("HTTP 422"));

        let stored = store.list_products().await.expect("list");
        assert_eq!(
            stored[0].variant_pricing[0].mekari_product_id.as_deref(),
            Some("500")
        );
        let status = stored[0].mekari_status.clone().expect("status");
        assert_eq!(status.effective_state(), MekariState::Error);
        assert_eq!(snapshot.read().await, stored);
    }

    #[tokio::test]
    async fn clean_push_clears_earlier_error() {
        let mut failed = product();
        failed.variant_pricing.truncate(2);
        failed.mekari_status = Some(MekariStatus::failed(Utc::now(), "HTTP 422: name is too long"));
        let store = InMemoryCatalogStore::new(vec![failed.clone()]);
        let snapshot = CatalogSnapshot::new(vec![failed]);
        let client = MekariClient::new(registry().await, "token");

        let report = push_products(&client, &store, &snapshot, Some(&["p1".to_string()]))
            .await
            .expect("push");
        assert!(report.errors.is_empty());
        assert_eq!(report.created_count + report.updated_count, 2);

        let stored = store.list_products().await.expect("list");
        let status = stored[0].mekari_status.clone().expect("status");
        assert_eq!(status.effective_state(), MekariState::Synced);
        assert_eq!(status.error, None);
        assert_eq!(status.message.as_deref(), Some("pushed 2 variant(s) to Mekari"));
        assert_eq!(snapshot.read().await, stored);
    }

    #[tokio::test]
    async fn unconfigured_client_aborts() {
        let store = InMemoryCatalogStore::new(vec![product()]);
        let err = push_products(&MekariClient::new("", ""), &store, &CatalogSnapshot::default(), None)
            .await
            .expect_err("unconfigured");
        assert!(matches!(err, PushError::Remote(MekariError::Unconfigured)));
    }
}
