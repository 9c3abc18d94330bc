use crate::catalog::models::lenient::number_from_value;
use crate::catalog::sku::{normalize_remote_id, normalize_sku};
use serde::Serialize;
use serde_json::Value;
use serde_with::skip_serializing_none;

/// One product as listed by the Mekari registry, read leniently: ids and
/// numbers may arrive as strings, categories as strings or `{ name }`.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct RemoteProductRecord {
    pub id: String,
    pub product_code: String,
    pub name: String,
    pub buy_price_per_unit: Option<f64>,
    pub quantity_available: Option<i64>,
    pub product_categories: Vec<String>,
    pub archived: bool,
}

impl RemoteProductRecord {
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let text = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
                .unwrap_or_default()
        };
        let id = object.get("id").map(normalize_remote_id).unwrap_or_default();
        let mut product_code = text("product_code");
        if product_code.is_empty() {
            product_code = text("sku");
        }
        if id.is_empty() && product_code.is_empty() {
            return None;
        }
        let flag = |key: &str| object.get(key).and_then(Value::as_bool);
        let archived = ["archive", "archived", "is_archived"]
            .iter()
            .any(|key| flag(key) == Some(true))
            || flag("active") == Some(false);
        let product_categories = object
            .get("product_categories")
            .and_then(Value::as_array)
            .map(|entries| entries.iter().filter_map(category_name).collect())
            .unwrap_or_default();

        Some(Self {
            id,
            product_code,
            name: text("name"),
            buy_price_per_unit: object.get("buy_price_per_unit").and_then(number_from_value),
            quantity_available: object
                .get("quantity_available")
                .and_then(number_from_value)
                .map(|qty| qty.round() as i64),
            product_categories,
            archived,
        })
    }

    pub fn sku_key(&self) -> String {
        normalize_sku(Some(&self.product_code))
    }

    /// Cross-page identity: normalized SKU, else remote id.
    pub fn dedup_key(&self) -> String {
        let sku = self.sku_key();
        if sku.is_empty() {
            format!("id:{}", self.id)
        } else {
            format!("sku:{sku}")
        }
    }
}

fn category_name(entry: &Value) -> Option<String> {
    let name = match entry {
        Value::String(name) => name.as_str(),
        Value::Object(object) => object.get("name").and_then(Value::as_str)?,
        _ => return None,
    };
    let name = name.trim();
    (!name.is_empty()).then(|| name.to_string())
}

/// Body of a create or update call, wrapped as `{ "product": ... }`.
#[skip_serializing_none]
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProductPayload {
    pub name: String,
    pub description: Option<String>,
    pub buy_price_per_unit: Option<f64>,
    pub sell_price_per_unit: Option<f64>,
    pub custom_id: Option<String>,
    pub product_code: Option<String>,
    pub is_bought: Option<bool>,
    pub is_sold: Option<bool>,
    pub track_inventory: Option<bool>,
    pub init_quantity: Option<i64>,
    pub init_date: Option<String>,
    pub unit_cost: Option<f64>,
    pub buy_account_number: Option<String>,
    pub sell_account_number: Option<String>,
    pub inventory_asset_account_number: Option<String>,
}

impl ProductPayload {
    /// Adds the fields the registry only accepts when a product is created.
    pub fn with_create_fields(mut self, init_quantity: i64, init_date: String) -> Self {
        self.is_bought = Some(true);
        self.is_sold = Some(true);
        self.track_inventory = Some(true);
        self.init_quantity = Some(init_quantity.max(0));
        self.init_date = Some(init_date);
        self.unit_cost = self.buy_price_per_unit;
        self.buy_account_number = Some(ACCOUNT_INVENTORY.to_string());
        self.sell_account_number = Some(ACCOUNT_SALES.to_string());
        self.inventory_asset_account_number = Some(ACCOUNT_INVENTORY.to_string());
        self
    }
}

const ACCOUNT_INVENTORY: &str = "1-10200";
const ACCOUNT_SALES: &str = "4-40000";

#[derive(Debug, Serialize)]
pub struct ProductEnvelope<'a> {
    pub product: &'a ProductPayload,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_loose_records() {
        let record = RemoteProductRecord::from_value(&json!({
            "id": 9,
            "sku": " SKU-A-1 ",
            "name": "Widget - Red",
            "buy_price_per_unit": "150000",
            "quantity_available": 42.0,
            "product_categories": ["Root", { "name": "Aksesoris" }, 3],
            "active": true
        }))
        .expect("record");
        assert_eq!(record.id, "9");
        assert_eq!(record.product_code, "SKU-A-1");
        assert_eq!(record.buy_price_per_unit, Some(150_000.0));
        assert_eq!(record.quantity_available, Some(42));
        assert_eq!(record.product_categories, vec!["Root", "Aksesoris"]);
        assert!(!record.archived);
        assert_eq!(record.dedup_key(), "sku:sku-a-1");
    }

    #[test]
    fn archive_flags_and_identity() {
        let archived =
            RemoteProductRecord::from_value(&json!({ "id": "7", "archive": true })).expect("record");
        assert!(archived.archived);
        assert_eq!(archived.dedup_key(), "id:7");

        let inactive = RemoteProductRecord::from_value(&json!({ "id": 8, "active": false }))
            .expect("record");
        assert!(inactive.archived);

        assert!(RemoteProductRecord::from_value(&json!({ "name": "orphan" })).is_none());
        assert!(RemoteProductRecord::from_value(&json!("nope")).is_none());
    }

    #[test]
    fn create_payload_carries_inventory_fields() {
        let payload = ProductPayload {
            name: "Widget".into(),
            buy_price_per_unit: Some(1000.0),
            ..ProductPayload::default()
        }
        .with_create_fields(5, "2024-05-01".into());
        let body = serde_json::to_value(ProductEnvelope { product: &payload }).expect("json");
        assert_eq!(body["product"]["track_inventory"], json!(true));
        assert_eq!(body["product"]["unit_cost"], json!(1000.0));
        assert!(body["product"].get("custom_id").is_none());
    }
}
