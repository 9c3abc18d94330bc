use crate::catalog::{
    CatalogIndex, MekariState, MekariStatus, Product, RowRef, VariantPricingRow,
};
use crate::mekari::RemoteProductRecord;
use crate::pricing::{self, Category, PricingConfig, rates::LOCAL_CURRENCY};
use crate::sync::naming::apply_remote_name;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;
use uuid::Uuid;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PassSummary {
    pub remote_records: usize,
    pub skipped_archived: usize,
    pub matched_by_id: usize,
    pub matched_by_sku: usize,
    pub created: usize,
    pub marked_synced: usize,
    pub marked_missing: usize,
    pub changed: usize,
}

#[derive(Debug, Clone)]
pub struct PassOutcome {
    /// Full catalog after the pass, created products appended.
    pub products: Vec<Product>,
    /// Products that differ from the input, with `updated_at` bumped.
    pub changed: Vec<Product>,
    pub summary: PassSummary,
}

pub fn synced_message(total: usize) -> String {
    format!("all {total} variant(s) matched in Mekari")
}

pub fn missing_message(missing: usize, total: usize) -> String {
    format!("{missing} of {total} variant(s) not found in Mekari")
}

/// Reconciles `products` with the full registry listing. Pure: the caller
/// persists `changed`.
pub fn reconcile(
    products: Vec<Product>,
    records: &[RemoteProductRecord],
    pricing: &PricingConfig,
    now: DateTime<Utc>,
) -> PassOutcome {
    let original_len = products.len();
    let original = products.clone();
    let mut pass = Pass {
        index: CatalogIndex::build(&products),
        products,
        created_keys: HashMap::new(),
        summary: PassSummary {
            remote_records: records.len(),
            ..PassSummary::default()
        },
        pricing,
        now,
    };
    for record in records {
        pass.apply(record);
    }
    pass.mark_statuses();

    let Pass {
        products: mut working,
        mut summary,
        ..
    } = pass;
    let mut changed = Vec::new();
    for (idx, product) in working.iter_mut().enumerate() {
        let is_new = idx >= original_len;
        if is_new || original.get(idx) != Some(&*product) {
            if !is_new {
                product.updated_at = now;
            }
            changed.push(product.clone());
        }
    }
    summary.changed = changed.len();
    PassOutcome {
        products: working,
        changed,
        summary,
    }
}

struct Pass<'a> {
    products: Vec<Product>,
    index: CatalogIndex,
    /// Keys (`sku:..`, `id:..`) of products minted earlier in this pass.
    created_keys: HashMap<String, RowRef>,
    summary: PassSummary,
    pricing: &'a PricingConfig,
    now: DateTime<Utc>,
}

impl Pass<'_> {
    fn apply(&mut self, record: &RemoteProductRecord) {
        if record.archived {
            self.summary.skipped_archived += 1;
            return;
        }
        let sku = record.sku_key();
        let id_rows = self.lookup(&record.id, CatalogIndex::by_remote_id);
        let sku_rows = self.lookup(&sku, CatalogIndex::by_sku);

        if !id_rows.is_empty() {
            let mut rows = id_rows;
            for row in sku_rows {
                if !rows.contains(&row) && self.remote_id_of(row).is_empty() {
                    rows.push(row);
                }
            }
            self.link(&rows, record);
            self.rename(&rows, &record.name);
            self.summary.matched_by_id += 1;
        } else if !sku_rows.is_empty() {
            self.link(&sku_rows, record);
            if !record.id.is_empty() {
                self.rename(&sku_rows, &record.name);
            }
            self.summary.matched_by_sku += 1;
        } else if let Some(row) = self.created_row(record) {
            self.link(&[row], record);
        } else {
            self.create(record);
        }
    }

    fn lookup(
        &self,
        key: &str,
        table: for<'i> fn(&'i CatalogIndex, &str) -> &'i [RowRef],
    ) -> Vec<RowRef> {
        if key.is_empty() {
            return Vec::new();
        }
        table(&self.index, key).to_vec()
    }

    fn remote_id_of(&self, row: RowRef) -> &str {
        self.products[row.product].variant_pricing[row.variant]
            .mekari_product_id
            .as_deref()
            .map(str::trim)
            .unwrap_or("")
    }

    fn link(&mut self, rows: &[RowRef], record: &RemoteProductRecord) {
        for &row_ref in rows {
            self.index.mark_matched(row_ref);
            let row = &mut self.products[row_ref.product].variant_pricing[row_ref.variant];
            if !record.id.is_empty() && row.mekari_product_id.as_deref() != Some(record.id.as_str()) {
                row.mekari_product_id = Some(record.id.clone());
            }
            if let Some(stock) = record.quantity_available {
                row.stock = Some(stock);
            }
            if !record.product_code.is_empty() && row.seller_sku != record.product_code {
                row.seller_sku = record.product_code.clone();
            }
        }
    }

    fn rename(&mut self, rows: &[RowRef], remote_name: &str) {
        let mut by_product: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
        for row in rows {
            by_product.entry(row.product).or_default().push(row.variant);
        }
        for (product, variants) in by_product {
            apply_remote_name(&mut self.products[product], &variants, remote_name);
        }
    }

    fn created_row(&self, record: &RemoteProductRecord) -> Option<RowRef> {
        let sku = record.sku_key();
        let by_sku = (!sku.is_empty())
            .then(|| self.created_keys.get(&format!("sku:{sku}")))
            .flatten();
        let by_id = (!record.id.is_empty())
            .then(|| self.created_keys.get(&format!("id:{}", record.id)))
            .flatten();
        by_id.or(by_sku).copied()
    }

    fn category_for(&self, record: &RemoteProductRecord) -> Option<&Category> {
        record
            .product_categories
            .iter()
            .rev()
            .find_map(|name| self.pricing.find_category(name))
            .or_else(|| self.pricing.catch_all_category())
    }

    fn create(&mut self, record: &RemoteProductRecord) {
        let now = self.now;
        let category = self.category_for(record).cloned();
        let name = if record.name.is_empty() {
            record.product_code.clone()
        } else {
            record.name.clone()
        };

        let mut row = VariantPricingRow::new(Uuid::new_v4().to_string(), record.product_code.clone());
        row.purchase_price = record.buy_price_per_unit;
        row.purchase_currency = Some(LOCAL_CURRENCY.to_string());
        row.exchange_rate = Some(1.0);
        row.stock = record.quantity_available;
        row.mekari_product_id = (!record.id.is_empty()).then(|| record.id.clone());
        pricing::apply_to_row(&mut row, category.as_ref(), self.pricing);

        let mut product = Product::new(Uuid::new_v4().to_string(), name.clone(), now);
        product.category = category
            .map(|category| category.name)
            .or_else(|| self.pricing.default_category.clone())
            .unwrap_or_default();
        product.variant_pricing.push(row);
        apply_remote_name(&mut product, &[0], &name);
        product.mekari_status = Some(MekariStatus::new(
            MekariState::Synced,
            now,
            synced_message(1),
        ));

        let row_ref = RowRef {
            product: self.products.len(),
            variant: 0,
        };
        let sku = record.sku_key();
        if !sku.is_empty() {
            self.created_keys.insert(format!("sku:{sku}"), row_ref);
        }
        if !record.id.is_empty() {
            self.created_keys.insert(format!("id:{}", record.id), row_ref);
        }
        debug!(
            target = "catalog.sync",
            sku = %record.product_code,
            product_id = %product.id,
            "created product from registry record"
        );
        self.products.push(product);
        self.summary.created += 1;
    }

    /// Every indexed product becomes `synced` or `missing`. The status is
    /// only replaced when its state or message changes.
    fn mark_statuses(&mut self) {
        let now = self.now;
        let stats: Vec<_> = self.index.indexed_products().collect();
        for (idx, stats) in stats {
            let (state, message) = if stats.is_complete() {
                self.summary.marked_synced += 1;
                (MekariState::Synced, synced_message(stats.total))
            } else {
                self.summary.marked_missing += 1;
                (
                    MekariState::Missing,
                    missing_message(stats.unmatched(), stats.total),
                )
            };
            let product = &mut self.products[idx];
            let unchanged = product.mekari_status.as_ref().is_some_and(|status| {
                status.effective_state() == state && status.message.as_deref() == Some(message.as_str())
            });
            if !unchanged {
                product.mekari_status = Some(MekariStatus::new(state, now, message));
            }
        }
    }
}
