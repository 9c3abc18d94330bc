use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;
use std::collections::BTreeMap;

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub brand: String,
    #[serde(default)]
    pub spu: Option<String>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub variants: Vec<VariantAxis>,
    #[serde(default)]
    pub variant_pricing: Vec<VariantPricingRow>,
    #[serde(default)]
    pub mekari_status: Option<MekariStatus>,
    #[serde(default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default = "Utc::now")]
    pub updated_at: DateTime<Utc>,
}

impl Product {
    pub fn new(id: impl Into<String>, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            category: String::new(),
            brand: String::new(),
            spu: None,
            description: String::new(),
            variants: Vec::new(),
            variant_pricing: Vec::new(),
            mekari_status: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// SPU with surrounding whitespace removed, `None` when blank.
    pub fn spu_key(&self) -> Option<&str> {
        self.spu
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
    }

    pub fn axis_mut(&mut self, name: &str) -> Option<&mut VariantAxis> {
        self.variants.iter_mut().find(|axis| axis.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariantAxis {
    pub name: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl VariantAxis {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            options: Vec::new(),
        }
    }

    /// Appends `value` unless an option with the same text already exists.
    /// Returns whether the axis changed.
    pub fn add_option(&mut self, value: &str) -> bool {
        if self.options.iter().any(|existing| existing == value) {
            return false;
        }
        self.options.push(value.to_string());
        true
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariantPricingRow {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub variants: BTreeMap<String, String>,
    #[serde(default)]
    pub variant_label: Option<String>,
    #[serde(default)]
    pub seller_sku: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub purchase_price: Option<f64>,
    #[serde(default)]
    pub purchase_currency: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub exchange_rate: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub purchase_price_idr: Option<f64>,
    #[serde(default)]
    pub shipping_method: Option<String>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub volume: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub arrival_cost: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub offline_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub entraverse_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub tokopedia_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub shopee_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient::integer")]
    pub stock: Option<i64>,
    #[serde(default, deserialize_with = "lenient::number")]
    pub daily_average_sales: Option<f64>,
    #[serde(default, deserialize_with = "lenient::identifier")]
    pub mekari_product_id: Option<String>,
}

impl VariantPricingRow {
    pub fn new(id: impl Into<String>, seller_sku: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            seller_sku: seller_sku.into(),
            ..Self::default()
        }
    }

    /// Every variant-axis value followed by the manual label, if any.
    pub fn variant_texts(&self) -> impl Iterator<Item = &str> {
        self.variants
            .values()
            .map(String::as_str)
            .chain(self.variant_label.as_deref())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MekariState {
    Pending,
    Syncing,
    Synced,
    Error,
    Missing,
}

impl MekariState {
    pub fn as_str(&self) -> &'static str {
        match self {
            MekariState::Pending => "pending",
            MekariState::Syncing => "syncing",
            MekariState::Synced => "synced",
            MekariState::Error => "error",
            MekariState::Missing => "missing",
        }
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MekariStatus {
    pub state: MekariState,
    #[serde(default)]
    pub last_synced_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl MekariStatus {
    pub fn new(state: MekariState, at: DateTime<Utc>, message: impl Into<String>) -> Self {
        Self {
            state,
            last_synced_at: Some(at),
            message: Some(message.into()),
            error: None,
        }
    }

    pub fn failed(at: DateTime<Utc>, error: impl Into<String>) -> Self {
        Self {
            state: MekariState::Error,
            last_synced_at: Some(at),
            message: None,
            error: Some(error.into()),
        }
    }

    /// A recorded error always wins over the stored state.
    pub fn effective_state(&self) -> MekariState {
        match self.error.as_deref().map(str::trim) {
            Some(error) if !error.is_empty() => MekariState::Error,
            _ => self.state,
        }
    }
}

/// Stored catalogs carry numbers as JSON numbers, numeric strings or blanks.
pub(crate) mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn number_from_value(value: &Value) -> Option<f64> {
        match value {
            Value::Number(n) => n.as_f64().filter(|v| v.is_finite()),
            Value::String(s) => {
                let cleaned: String = s.trim().chars().filter(|c| *c != ',').collect();
                if cleaned.is_empty() {
                    None
                } else {
                    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
                }
            }
            _ => None,
        }
    }

    pub fn number<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(number_from_value(&value))
    }

    pub fn integer<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        Ok(number_from_value(&value).map(|v| v.round() as i64))
    }

    pub fn identifier<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let value = Value::deserialize(deserializer)?;
        let id = crate::catalog::sku::normalize_remote_id(&value);
        Ok((!id.is_empty()).then_some(id))
    }
}
