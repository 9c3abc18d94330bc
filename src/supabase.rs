use crate::catalog::{MekariStatus, Product, StoreError, VariantAxis, VariantPricingRow};
use crate::http::build_client;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use urlencoding::encode;

#[derive(Debug, Clone)]
pub struct SupabaseClient {
    base_url: String,
    service_key: String,
    http: Client,
}

/// Row shape of the `products` table; variant data lives in jsonb columns.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProductRow {
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    brand: Option<String>,
    #[serde(default)]
    spu: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    variants: Option<Vec<VariantAxis>>,
    #[serde(default)]
    variant_pricing: Option<Vec<VariantPricingRow>>,
    #[serde(default)]
    mekari_status: Option<MekariStatus>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    updated_at: Option<DateTime<Utc>>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        let now = Utc::now();
        let created_at = row.created_at.unwrap_or(now);
        Product {
            id: row.id,
            name: row.name,
            category: row.category.unwrap_or_default(),
            brand: row.brand.unwrap_or_default(),
            spu: row.spu,
            description: row.description.unwrap_or_default(),
            variants: row.variants.unwrap_or_default(),
            variant_pricing: row.variant_pricing.unwrap_or_default(),
            mekari_status: row.mekari_status,
            created_at,
            updated_at: row.updated_at.unwrap_or(created_at),
        }
    }
}

impl From<&Product> for ProductRow {
    fn from(product: &Product) -> Self {
        ProductRow {
            id: product.id.clone(),
            name: product.name.clone(),
            category: Some(product.category.clone()),
            brand: Some(product.brand.clone()),
            spu: product.spu.clone(),
            description: Some(product.description.clone()),
            variants: Some(product.variants.clone()),
            variant_pricing: Some(product.variant_pricing.clone()),
            mekari_status: product.mekari_status.clone(),
            created_at: Some(product.created_at),
            updated_at: Some(product.updated_at),
        }
    }
}

/// Row of the `integrations` table holding remote API credentials.
#[derive(Debug, Clone, Deserialize)]
pub struct IntegrationRow {
    #[allow(dead_code)]
    pub name: String,
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default)]
    pub api_token: Option<String>,
    #[serde(default)]
    pub per_page: Option<u32>,
    #[serde(default)]
    pub include_archive: Option<bool>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

fn default_enabled() -> bool {
    true
}

impl SupabaseClient {
    pub fn from_env() -> Option<Self> {
        let base_url = std::env::var("SUPABASE_URL").ok()?;
        let service_key = std::env::var("SUPABASE_SERVICE_ROLE_KEY")
            .or_else(|_| std::env::var("SUPABASE_SERVICE_KEY"))
            .or_else(|_| std::env::var("SUPABASE_KEY"))
            .ok()?;
        Some(Self::new(base_url, service_key))
    }

    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            service_key: service_key.into(),
            http: build_client(),
        }
    }

    fn request(&self, method: reqwest::Method, path_and_query: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, format!("{}/rest/v1/{path_and_query}", self.base_url))
            .header("apikey", &self.service_key)
            .bearer_auth(&self.service_key)
    }

    pub async fn list_products(&self) -> Result<Vec<Product>, StoreError> {
        let response = self
            .request(reqwest::Method::GET, "products?select=*&order=created_at.asc")
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "HTTP {} listing products",
                response.status()
            )));
        }
        let rows: Vec<ProductRow> = response
            .json()
            .await
            .map_err(|err| StoreError::Deserialize(err.to_string()))?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    pub async fn upsert_products(&self, products: &[Product]) -> Result<(), StoreError> {
        if products.is_empty() {
            return Ok(());
        }
        let rows: Vec<ProductRow> = products.iter().map(ProductRow::from).collect();
        let response = self
            .request(reqwest::Method::POST, "products?on_conflict=id")
            .header("Prefer", "resolution=merge-duplicates,return=minimal")
            .json(&rows)
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Request(format!(
                "HTTP {status} upserting {} products: {}",
                rows.len(),
                body.chars().take(200).collect::<String>()
            )));
        }
        Ok(())
    }

    pub async fn delete_product(&self, id: &str) -> Result<(), StoreError> {
        let response = self
            .request(reqwest::Method::DELETE, &format!("products?id=eq.{}", encode(id)))
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;
        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "HTTP {} deleting product {id}",
                response.status()
            )));
        }
        Ok(())
    }

    pub async fn fetch_integration(&self, name: &str) -> Result<Option<IntegrationRow>, StoreError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("integrations?name=eq.{}&select=*&limit=1", encode(name)),
            )
            .send()
            .await
            .map_err(|err| StoreError::Request(err.to_string()))?;

        if !response.status().is_success() {
            return Err(StoreError::Request(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let mut payload: Vec<IntegrationRow> = response
            .json()
            .await
            .map_err(|err| StoreError::Deserialize(err.to_string()))?;
        Ok(payload.pop())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn product_rows_fill_missing_columns() {
        let row: ProductRow = serde_json::from_value(json!({
            "id": "p1",
            "name": "Widget",
            "variant_pricing": [{ "id": "r1", "sellerSku": "SKU-A-1", "stock": "3" }],
            "created_at": "2024-05-01T00:00:00Z"
        }))
        .expect("row");
        let product = Product::from(row);
        assert_eq!(product.category, "");
        assert_eq!(product.variant_pricing[0].stock, Some(3));
        assert_eq!(product.updated_at, product.created_at);
    }

    #[test]
    fn rows_round_trip_through_products() {
        let product = Product::new("p1", "Widget", Utc::now());
        let value = serde_json::to_value(ProductRow::from(&product)).expect("json");
        assert_eq!(value["id"], json!("p1"));
        assert!(value.get("variant_pricing").is_some());
        assert!(value.get("spu").is_none());
    }
}
