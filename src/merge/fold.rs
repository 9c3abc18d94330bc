use crate::catalog::sku::{normalize_sku, sku_suffix};
use crate::catalog::{Product, VariantAxis, VariantPricingRow};
use crate::sync::naming::{DEFAULT_LABEL, FALLBACK_AXIS, split_remote_name};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no products selected for merge")]
    NoProducts,
    #[error("product `{0}` not found")]
    UnknownProduct(String),
    #[error("target SPU must not be empty")]
    EmptyTarget,
    #[error(transparent)]
    Store(#[from] crate::catalog::StoreError),
}

/// Result of folding several products into one.
#[derive(Debug, Clone)]
pub struct MergePlan {
    pub primary: Product,
    pub removed_ids: Vec<String>,
}

/// Variant label a folded row contributes to the `Varian 1` axis. Rows of
/// multi-row products are told apart by SKU suffix; a single row takes the
/// product name's `" - label"` first.
fn variant_label(product: &Product, row: &VariantPricingRow) -> String {
    let from_name = match split_remote_name(&product.name) {
        (_, Some(label)) if !label.eq_ignore_ascii_case(DEFAULT_LABEL) => Some(label),
        _ => None,
    };
    let from_sku = sku_suffix(&row.seller_sku);
    let label = if product.variant_pricing.len() > 1 {
        from_sku.or(from_name)
    } else {
        from_name.or(from_sku)
    };
    label.unwrap_or(product.name.trim()).to_string()
}

fn base_name(name: &str) -> &str {
    split_remote_name(name).0
}

/// Folds the products named by `ids` into the one with the most pricing
/// rows (ties: earliest `created_at`, then id).
pub fn merge_into(
    products: &[Product],
    ids: &[String],
    target_spu: &str,
    now: DateTime<Utc>,
) -> Result<MergePlan, MergeError> {
    let target_spu = target_spu.trim();
    if target_spu.is_empty() {
        return Err(MergeError::EmptyTarget);
    }
    let mut selected: Vec<&Product> = Vec::new();
    for id in ids {
        if selected.iter().any(|p| &p.id == id) {
            continue;
        }
        let product = products
            .iter()
            .find(|p| &p.id == id)
            .ok_or_else(|| MergeError::UnknownProduct(id.clone()))?;
        selected.push(product);
    }
    if selected.is_empty() {
        return Err(MergeError::NoProducts);
    }
    selected.sort_by(|a, b| {
        b.variant_pricing
            .len()
            .cmp(&a.variant_pricing.len())
            .then(a.created_at.cmp(&b.created_at))
            .then(a.id.cmp(&b.id))
    });

    let mut primary = selected[0].clone();
    let mut rows: Vec<VariantPricingRow> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();
    let mut axis_values: Vec<String> = primary
        .variants
        .iter()
        .find(|axis| axis.name == FALLBACK_AXIS)
        .map(|axis| axis.options.clone())
        .unwrap_or_default();
    let mut name_votes: BTreeMap<String, usize> = BTreeMap::new();

    for (position, product) in selected.iter().enumerate() {
        let folded = position > 0;
        *name_votes
            .entry(base_name(&product.name).to_string())
            .or_default() += 1;
        for row in &product.variant_pricing {
            let mut row = row.clone();
            if folded && !row.variants.contains_key(FALLBACK_AXIS) {
                let label = variant_label(product, &row);
                if !label.is_empty() {
                    row.variants.insert(FALLBACK_AXIS.to_string(), label);
                }
            }
            if let Some(value) = row.variants.get(FALLBACK_AXIS)
                && !axis_values.contains(value)
            {
                axis_values.push(value.clone());
            }
            let sku = normalize_sku(Some(&row.seller_sku));
            let key = if sku.is_empty() {
                format!("row:{}", row.id)
            } else {
                format!("sku:{sku}")
            };
            match slots.get(&key) {
                Some(&slot) => rows[slot] = row,
                None => {
                    slots.insert(key, rows.len());
                    rows.push(row);
                }
            }
        }
    }

    // majority base name; BTreeMap order makes ties resolve to the smallest
    let name = name_votes
        .iter()
        .fold(None::<(&String, usize)>, |best, (name, votes)| match best {
            Some((_, top)) if top >= *votes => best,
            _ => Some((name, *votes)),
        })
        .map(|(name, _)| name.clone())
        .unwrap_or_else(|| primary.name.clone());

    match primary.variants.iter_mut().find(|axis| axis.name == FALLBACK_AXIS) {
        Some(axis) => axis.options = axis_values,
        None if !axis_values.is_empty() => primary.variants.insert(
            0,
            VariantAxis {
                name: FALLBACK_AXIS.to_string(),
                options: axis_values,
            },
        ),
        None => {}
    }
    primary.name = name;
    primary.spu = Some(target_spu.to_string());
    primary.variant_pricing = rows;
    primary.updated_at = now;

    let removed_ids = selected[1..].iter().map(|p| p.id.clone()).collect();
    Ok(MergePlan {
        primary,
        removed_ids,
    })
}
