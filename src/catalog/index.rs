use crate::catalog::models::Product;
use crate::catalog::sku::{normalize_remote_id_str, normalize_sku};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Position of one pricing row inside a catalog snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct RowRef {
    pub product: usize,
    pub variant: usize,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MatchStats {
    pub total: usize,
    pub matched: usize,
}

impl MatchStats {
    pub fn unmatched(&self) -> usize {
        self.total.saturating_sub(self.matched)
    }

    pub fn is_complete(&self) -> bool {
        self.matched >= self.total
    }
}

/// Lookup tables over one catalog snapshot. Always built from scratch right
/// before use; positions are only valid for the snapshot they came from.
#[derive(Debug, Default)]
pub struct CatalogIndex {
    by_sku: HashMap<String, Vec<RowRef>>,
    by_remote_id: HashMap<String, Vec<RowRef>>,
    match_stats: BTreeMap<usize, MatchStats>,
    matched_rows: HashSet<RowRef>,
}

impl CatalogIndex {
    pub fn build(products: &[Product]) -> Self {
        let mut index = Self::default();
        for (product_idx, product) in products.iter().enumerate() {
            for (variant_idx, row) in product.variant_pricing.iter().enumerate() {
                let sku = normalize_sku(Some(&row.seller_sku));
                let remote_id = normalize_remote_id_str(row.mekari_product_id.as_deref());
                if sku.is_empty() && remote_id.is_empty() {
                    continue;
                }
                let row_ref = RowRef {
                    product: product_idx,
                    variant: variant_idx,
                };
                if !sku.is_empty() {
                    index.by_sku.entry(sku).or_default().push(row_ref);
                }
                if !remote_id.is_empty() {
                    index.by_remote_id.entry(remote_id).or_default().push(row_ref);
                }
                index.match_stats.entry(product_idx).or_default().total += 1;
            }
        }
        index
    }

    pub fn by_sku(&self, key: &str) -> &[RowRef] {
        self.by_sku.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn by_remote_id(&self, key: &str) -> &[RowRef] {
        self.by_remote_id.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Records a match for an indexed row. Each row counts once no matter how
    /// many remote records reach it; unindexed rows are ignored.
    pub fn mark_matched(&mut self, row: RowRef) -> bool {
        let Some(stats) = self.match_stats.get_mut(&row.product) else {
            return false;
        };
        if !self.matched_rows.insert(row) {
            return false;
        }
        stats.matched += 1;
        true
    }

    /// Products that contributed at least one row, in catalog order.
    pub fn indexed_products(&self) -> impl Iterator<Item = (usize, MatchStats)> + '_ {
        self.match_stats.iter().map(|(idx, stats)| (*idx, *stats))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::models::VariantPricingRow;
    use chrono::Utc;

    fn product(id: &str, rows: &[(&str, Option<&str>)]) -> Product {
        let mut product = Product::new(id, id, Utc::now());
        for (idx, (sku, remote)) in rows.iter().enumerate() {
            let mut row = VariantPricingRow::new(format!("{id}-{idx}"), *sku);
            row.mekari_product_id = remote.map(str::to_string);
            product.variant_pricing.push(row);
        }
        product
    }

    fn stats(index: &CatalogIndex, product: usize) -> Option<MatchStats> {
        index
            .indexed_products()
            .find(|(idx, _)| *idx == product)
            .map(|(_, stats)| stats)
    }

    #[test]
    fn rows_count_once_even_with_two_keys() {
        let products = vec![product("p1", &[("SKU-1", Some("10")), ("SKU-2", None)])];
        let index = CatalogIndex::build(&products);
        assert_eq!(stats(&index, 0), Some(MatchStats { total: 2, matched: 0 }));
        assert_eq!(index.by_sku("sku-1").len(), 1);
        assert_eq!(index.by_remote_id("10").len(), 1);
    }

    #[test]
    fn rows_without_keys_are_not_indexed() {
        let products = vec![
            product("p1", &[("", None), ("  ", Some(" "))]),
            product("p2", &[("SKU-9", None)]),
        ];
        let index = CatalogIndex::build(&products);
        assert_eq!(stats(&index, 0), None);
        assert_eq!(stats(&index, 1).map(|s| s.total), Some(1));
        assert_eq!(index.indexed_products().count(), 1);
    }

    #[test]
    fn duplicate_skus_share_a_key() {
        let products = vec![
            product("p1", &[("DUP-1", None)]),
            product("p2", &[(" dup-1 ", None)]),
        ];
        let index = CatalogIndex::build(&products);
        assert_eq!(index.by_sku("dup-1").len(), 2);
    }

    #[test]
    fn matching_is_counted_once_per_row() {
        let products = vec![product("p1", &[("SKU-1", None), ("SKU-2", None)])];
        let mut index = CatalogIndex::build(&products);
        let row = RowRef {
            product: 0,
            variant: 0,
        };
        assert!(index.mark_matched(row));
        assert!(!index.mark_matched(row));
        let stats = stats(&index, 0).expect("stats");
        assert_eq!(stats.matched, 1);
        assert_eq!(stats.unmatched(), 1);
        assert!(!stats.is_complete());
    }
}
