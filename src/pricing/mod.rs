//! Marketplace sell-price derivation.
//!
//! Every price is recomputed from the row's purchase inputs, the category's
//! margin and fee schedule and the exchange-rate table. Missing inputs clear
//! the dependent prices instead of failing.

pub mod category;
pub mod rates;
pub mod rounding;
pub mod warranty;

pub use category::Category;
pub use rates::{ExchangeRates, FreightVendor};
pub use rounding::apply_rounding_rules;

use crate::catalog::VariantPricingRow;
use serde::{Deserialize, Serialize};
use serde_with::skip_serializing_none;

/// Flat handling fee added before marketplace fees.
const TOKOPEDIA_HANDLING_FEE: f64 = 1_250.0;
const SERVICE_FEE_CAP: (f64, f64) = (0.018, 50_000.0);
const DYNAMIC_COMMISSION_CAP: (f64, f64) = (0.04, 40_000.0);
const CASHBACK_CAP: (f64, f64) = (0.035, 60_000.0);

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PricingConfig {
    #[serde(default)]
    pub categories: Vec<Category>,
    #[serde(default)]
    pub exchange_rates: ExchangeRates,
    #[serde(default)]
    pub freight_vendors: Vec<FreightVendor>,
    #[serde(default)]
    pub default_freight_vendor: Option<String>,
    #[serde(default)]
    pub default_category: Option<String>,
}

impl PricingConfig {
    pub fn find_category(&self, key: &str) -> Option<&Category> {
        self.categories.iter().find(|category| category.matches(key))
    }

    pub fn catch_all_category(&self) -> Option<&Category> {
        self.default_category
            .as_deref()
            .and_then(|key| self.find_category(key))
    }

    pub fn freight_vendor(&self) -> Option<&FreightVendor> {
        let name = self.default_freight_vendor.as_deref()?.trim();
        self.freight_vendors
            .iter()
            .find(|vendor| vendor.name.eq_ignore_ascii_case(name))
    }
}

#[skip_serializing_none]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceBreakdown {
    pub exchange_rate: Option<f64>,
    pub arrival_cost: f64,
    pub purchase_price_idr: Option<f64>,
    pub warranty: bool,
    pub offline_price: Option<f64>,
    pub entraverse_price: Option<f64>,
    pub tokopedia_price: Option<f64>,
    pub shopee_price: Option<f64>,
}

pub fn compute(
    row: &VariantPricingRow,
    category: Option<&Category>,
    config: &PricingConfig,
) -> PriceBreakdown {
    let arrival_cost = match config.freight_vendor() {
        Some(vendor) => vendor.arrival_cost(row),
        None => row
            .arrival_cost
            .filter(|cost| cost.is_finite())
            .unwrap_or(0.0),
    };
    let exchange_rate = config.exchange_rates.resolve_for_row(row);
    let purchase_price_idr = match (row.purchase_price, exchange_rate) {
        (Some(price), Some(rate)) if price.is_finite() => {
            Some((price * rate + arrival_cost).round()).filter(|idr| idr.is_finite())
        }
        _ => None,
    };

    let warranty = warranty::row_has_warranty(row);
    let mut breakdown = PriceBreakdown {
        exchange_rate,
        arrival_cost,
        purchase_price_idr,
        warranty,
        ..PriceBreakdown::default()
    };
    let (Some(idr), Some(category)) = (purchase_price_idr, category) else {
        return breakdown;
    };
    let Some(margin) = category.margin_rate() else {
        return breakdown;
    };
    let multiplier = warranty::warranty_multiplier(row);

    let offline = offline_price(idr, margin).and_then(|price| apply_rounding_rules(price * multiplier));
    breakdown.offline_price = offline;
    // TODO: entraverse and shopee need their own fee schedules once the
    // category fees for them are confirmed; they mirror offline until then
    breakdown.entraverse_price = offline;
    breakdown.shopee_price = offline;
    breakdown.tokopedia_price = category
        .marketplace_fee_rate()
        .and_then(|fee| tokopedia_price(idr, margin, fee))
        .and_then(|price| apply_rounding_rules(price * multiplier));
    breakdown
}

fn offline_price(idr: f64, margin: f64) -> Option<f64> {
    if margin >= 1.0 || idr <= 0.0 {
        return None;
    }
    Some(idr / (1.0 - margin))
}

fn capped(idr: f64, (rate, amount): (f64, f64)) -> f64 {
    rate.min(amount / idr)
}

fn tokopedia_price(idr: f64, margin: f64, marketplace_fee: f64) -> Option<f64> {
    if idr <= 0.0 {
        return None;
    }
    let deductions = margin
        + marketplace_fee
        + capped(idr, SERVICE_FEE_CAP)
        + capped(idr, DYNAMIC_COMMISSION_CAP)
        + capped(idr, CASHBACK_CAP);
    if deductions >= 1.0 {
        return None;
    }
    Some((idr + TOKOPEDIA_HANDLING_FEE) / (1.0 - deductions))
}

/// Writes the computed prices back onto `row`. Returns whether anything
/// changed.
pub fn apply_to_row(
    row: &mut VariantPricingRow,
    category: Option<&Category>,
    config: &PricingConfig,
) -> bool {
    let breakdown = compute(row, category, config);
    let before = row.clone();
    if breakdown.exchange_rate.is_some() {
        row.exchange_rate = breakdown.exchange_rate;
    }
    if config.freight_vendor().is_some() {
        row.arrival_cost = Some(breakdown.arrival_cost);
    }
    row.purchase_price_idr = breakdown.purchase_price_idr;
    row.offline_price = breakdown.offline_price;
    row.entraverse_price = breakdown.entraverse_price;
    row.tokopedia_price = breakdown.tokopedia_price;
    row.shopee_price = breakdown.shopee_price;
    *row != before
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pricing::category::{CategoryFees, CategoryMargin};

    fn category(margin: &str, marketplace: &str) -> Category {
        Category {
            id: "cat-1".into(),
            name: "Elektronik".into(),
            fees: CategoryFees {
                marketplace: marketplace.into(),
                ..CategoryFees::default()
            },
            margin: CategoryMargin {
                value: margin.into(),
                note: String::new(),
            },
        }
    }

    fn usd_config() -> PricingConfig {
        PricingConfig {
            exchange_rates: ExchangeRates::new([("USD", 15_500.0)]),
            ..PricingConfig::default()
        }
    }

    fn usd_row() -> VariantPricingRow {
        let mut row = VariantPricingRow::new("r1", "SKU-A-1");
        row.purchase_price = Some(100.0);
        row.purchase_currency = Some("USD".into());
        row.arrival_cost = Some(20_000.0);
        row
    }

    #[test]
    fn converts_usd_and_applies_margin() {
        let breakdown = compute(&usd_row(), Some(&category("10", "0")), &usd_config());
        assert_eq!(breakdown.purchase_price_idr, Some(1_570_000.0));
        assert_eq!(breakdown.offline_price, Some(1_749_000.0));
        assert_eq!(breakdown.shopee_price, breakdown.offline_price);
        assert_eq!(breakdown.entraverse_price, breakdown.offline_price);

        // service 1.8% + commission min(4%, 40000/1.57M) + cashback 3.5%
        let tokopedia = breakdown.tokopedia_price.expect("tokopedia price");
        assert!(tokopedia > 1_749_000.0);
        assert_eq!((tokopedia + 1_000.0) % 50_000.0, 0.0);
    }

    #[test]
    fn warranty_raises_offline_and_tokopedia() {
        let mut row = usd_row();
        let plain = compute(&row, Some(&category("10", "5")), &usd_config());
        row.variants.insert("Garansi".into(), "1 Tahun".into());
        let covered = compute(&row, Some(&category("10", "5")), &usd_config());
        assert!(covered.warranty);
        // 1_744_444 × 1.06 = 1_849_111 → 1_849_000
        assert_eq!(covered.offline_price, Some(1_849_000.0));
        assert!(covered.tokopedia_price > plain.tokopedia_price);
    }

    #[test]
    fn missing_inputs_clear_prices() {
        let mut row = usd_row();
        row.purchase_price = None;
        row.offline_price = Some(99_900.0);
        let changed = apply_to_row(&mut row, Some(&category("10", "0")), &usd_config());
        assert!(changed);
        assert_eq!(row.purchase_price_idr, None);
        assert_eq!(row.offline_price, None);
        assert_eq!(row.tokopedia_price, None);
    }

    #[test]
    fn full_margin_blocks_sell_prices() {
        let breakdown = compute(&usd_row(), Some(&category("100", "0")), &usd_config());
        assert_eq!(breakdown.purchase_price_idr, Some(1_570_000.0));
        assert_eq!(breakdown.offline_price, None);
        assert_eq!(breakdown.tokopedia_price, None);
    }

    #[test]
    fn unknown_category_keeps_idr_only() {
        let breakdown = compute(&usd_row(), None, &usd_config());
        assert_eq!(breakdown.purchase_price_idr, Some(1_570_000.0));
        assert_eq!(breakdown.offline_price, None);
    }

    #[test]
    fn freight_vendor_replaces_entered_arrival_cost() {
        let mut config = usd_config();
        config.freight_vendors.push(FreightVendor {
            name: "Cargo".into(),
            air_rate_per_kg: 100_000.0,
            sea_rate_per_cbm: 5_000_000.0,
        });
        config.default_freight_vendor = Some("cargo".into());
        let mut row = usd_row();
        row.shipping_method = Some("Air".into());
        row.weight = Some(0.5);
        let breakdown = compute(&row, None, &config);
        assert_eq!(breakdown.arrival_cost, 50_000.0);
        assert_eq!(breakdown.purchase_price_idr, Some(1_600_000.0));
    }

    #[test]
    fn recomputation_is_drift_free() {
        let config = usd_config();
        let category = category("12.5", "4");
        let mut row = usd_row();
        assert!(apply_to_row(&mut row, Some(&category), &config));
        let settled = row.clone();
        assert!(!apply_to_row(&mut row, Some(&category), &config));
        assert_eq!(row, settled);
    }
}
