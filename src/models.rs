use crate::catalog::VariantPricingRow;
use crate::pricing::PriceBreakdown;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(error: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            detail: Some(detail.into()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MergeRequest {
    pub product_ids: Vec<String>,
    pub target_spu: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricingPreviewRequest {
    pub row: VariantPricingRow,
    /// Category id or name; the catch-all category when absent or unknown.
    #[serde(default)]
    pub category: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct PricingPreviewResponse {
    pub category: Option<String>,
    #[serde(flatten)]
    pub breakdown: PriceBreakdown,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PushRequest {
    /// Restricts the push to these products; every product when absent.
    #[serde(default)]
    pub product_ids: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
pub struct EnqueueResponse {
    pub job_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn requests_accept_camel_case_bodies() {
        let merge: MergeRequest = serde_json::from_value(json!({
            "productIds": ["p1", "p2"],
            "targetSpu": "ABC-001"
        }))
        .expect("merge body");
        assert_eq!(merge.product_ids.len(), 2);

        let preview: PricingPreviewRequest = serde_json::from_value(json!({
            "row": { "sellerSku": "A-1", "purchasePrice": "100", "purchaseCurrency": "USD" }
        }))
        .expect("preview body");
        assert_eq!(preview.row.purchase_price, Some(100.0));
        assert!(preview.category.is_none());

        let push: PushRequest = serde_json::from_value(json!({})).expect("push body");
        assert!(push.product_ids.is_none());
    }
}
