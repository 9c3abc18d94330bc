use crate::catalog::VariantPricingRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const LOCAL_CURRENCY: &str = "IDR";

/// Currency code -> IDR per unit.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, f64>", into = "BTreeMap<String, f64>")]
pub struct ExchangeRates(BTreeMap<String, f64>);

impl From<BTreeMap<String, f64>> for ExchangeRates {
    fn from(rates: BTreeMap<String, f64>) -> Self {
        Self::new(rates)
    }
}

impl From<ExchangeRates> for BTreeMap<String, f64> {
    fn from(rates: ExchangeRates) -> Self {
        rates.0
    }
}

impl ExchangeRates {
    pub fn new(rates: impl IntoIterator<Item = (impl Into<String>, f64)>) -> Self {
        Self(
            rates
                .into_iter()
                .map(|(code, rate)| (code.into().trim().to_uppercase(), rate))
                .collect(),
        )
    }

    pub fn rate_for(&self, currency: &str) -> Option<f64> {
        let code = currency.trim().to_uppercase();
        if code.is_empty() || code == LOCAL_CURRENCY {
            return Some(1.0);
        }
        self.0
            .get(&code)
            .copied()
            .filter(|rate| rate.is_finite() && *rate > 0.0)
    }

    /// Rate applied to a row: IDR is 1, the global table wins for known
    /// currencies, and the row's own rate covers everything else.
    pub fn resolve_for_row(&self, row: &VariantPricingRow) -> Option<f64> {
        let currency = row.purchase_currency.as_deref().unwrap_or(LOCAL_CURRENCY);
        self.rate_for(currency)
            .or(row.exchange_rate)
            .filter(|rate| rate.is_finite())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShippingMethod {
    Air,
    Sea,
    Other,
}

impl ShippingMethod {
    pub fn parse(raw: Option<&str>) -> Self {
        let value = raw.unwrap_or("").trim().to_lowercase();
        match value.as_str() {
            "air" | "udara" | "air freight" | "pesawat" => Self::Air,
            "sea" | "laut" | "sea freight" | "kapal" => Self::Sea,
            _ if value.contains("udara") || value.contains("air") => Self::Air,
            _ if value.contains("laut") || value.contains("sea") => Self::Sea,
            _ => Self::Other,
        }
    }
}

/// Freight forwarder tariff: IDR per kilogram by air, per CBM by sea.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FreightVendor {
    pub name: String,
    pub air_rate_per_kg: f64,
    pub sea_rate_per_cbm: f64,
}

impl FreightVendor {
    pub fn arrival_cost(&self, row: &VariantPricingRow) -> f64 {
        let cost = match ShippingMethod::parse(row.shipping_method.as_deref()) {
            ShippingMethod::Air => row.weight.unwrap_or(0.0) * self.air_rate_per_kg,
            ShippingMethod::Sea => row.volume.unwrap_or(0.0) * self.sea_rate_per_cbm,
            ShippingMethod::Other => 0.0,
        };
        if cost.is_finite() && cost > 0.0 { cost } else { 0.0 }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idr_and_blank_currency_use_unit_rate() {
        let rates = ExchangeRates::new([("usd", 15500.0)]);
        assert_eq!(rates.rate_for("IDR"), Some(1.0));
        assert_eq!(rates.rate_for(""), Some(1.0));
        assert_eq!(rates.rate_for("USD"), Some(15500.0));
        assert_eq!(rates.rate_for("CNY"), None);
    }

    #[test]
    fn row_rate_fills_unknown_currencies() {
        let rates = ExchangeRates::new([("USD", 15500.0)]);
        let mut row = VariantPricingRow::new("r1", "SKU-1");
        row.purchase_currency = Some("CNY".into());
        row.exchange_rate = Some(2200.0);
        assert_eq!(rates.resolve_for_row(&row), Some(2200.0));

        row.purchase_currency = Some("USD".into());
        assert_eq!(rates.resolve_for_row(&row), Some(15500.0));
    }

    #[test]
    fn freight_follows_shipping_method() {
        let vendor = FreightVendor {
            name: "Cargo".into(),
            air_rate_per_kg: 120_000.0,
            sea_rate_per_cbm: 6_500_000.0,
        };
        let mut row = VariantPricingRow::new("r1", "SKU-1");
        row.weight = Some(1.5);
        row.volume = Some(0.02);

        row.shipping_method = Some("Udara".into());
        assert_eq!(vendor.arrival_cost(&row), 180_000.0);
        row.shipping_method = Some("sea".into());
        assert_eq!(vendor.arrival_cost(&row), 130_000.0);
        row.shipping_method = Some("ambil sendiri".into());
        assert_eq!(vendor.arrival_cost(&row), 0.0);
    }
}
