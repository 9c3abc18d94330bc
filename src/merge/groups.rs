use crate::catalog::Product;
use crate::catalog::sku::{normalize_sku, sku_prefix};
use serde::Serialize;
use std::collections::BTreeMap;

/// Candidate SPU family: SKUs sharing a prefix across one or more products.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingGroup {
    pub prefix: String,
    pub skus: Vec<String>,
    pub product_ids: Vec<String>,
    pub target_spu: String,
    pub is_merged: bool,
}

#[derive(Default)]
struct Bucket {
    prefix: String,
    // normalized SKU -> first spelling seen
    skus: BTreeMap<String, String>,
    product_ids: Vec<String>,
}

pub fn build_auto_mapping_groups(products: &[Product]) -> Vec<MappingGroup> {
    let mut buckets: BTreeMap<String, Bucket> = BTreeMap::new();
    for product in products {
        for row in &product.variant_pricing {
            let sku = row.seller_sku.trim();
            let Some(prefix) = sku_prefix(sku) else {
                continue;
            };
            let key = normalize_sku(Some(prefix));
            let bucket = buckets.entry(key).or_insert_with(|| Bucket {
                prefix: prefix.to_string(),
                ..Bucket::default()
            });
            bucket
                .skus
                .entry(normalize_sku(Some(sku)))
                .or_insert_with(|| sku.to_string());
            if !bucket.product_ids.contains(&product.id) {
                bucket.product_ids.push(product.id.clone());
            }
        }
    }

    buckets
        .into_values()
        .filter(|bucket| bucket.skus.len() > 1 || bucket.product_ids.len() > 1)
        .map(|bucket| {
            let target_spu = bucket.prefix.to_uppercase();
            let is_merged = bucket.product_ids.iter().all(|id| {
                products
                    .iter()
                    .find(|product| &product.id == id)
                    .and_then(Product::spu_key)
                    .is_some_and(|spu| spu.eq_ignore_ascii_case(&target_spu))
            });
            MappingGroup {
                prefix: bucket.prefix,
                skus: bucket.skus.into_values().collect(),
                product_ids: bucket.product_ids,
                target_spu,
                is_merged,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::VariantPricingRow;
    use chrono::Utc;

    fn product(id: &str, spu: Option<&str>, skus: &[&str]) -> Product {
        let mut product = Product::new(id, id, Utc::now());
        product.spu = spu.map(str::to_string);
        product.variant_pricing = skus
            .iter()
            .enumerate()
            .map(|(i, sku)| VariantPricingRow::new(format!("{id}-{i}"), *sku))
            .collect();
        product
    }

    #[test]
    fn groups_shared_prefixes_and_drops_singletons() {
        let products = vec![
            product("p1", None, &["abc-001-red"]),
            product("p2", None, &["ABC-001-BLUE"]),
            product("p3", None, &["LONE-1"]),
            product("p4", None, &["NODASH"]),
        ];
        let groups = build_auto_mapping_groups(&products);
        assert_eq!(groups.len(), 1);
        let group = &groups[0];
        assert_eq!(group.prefix, "abc-001");
        assert_eq!(group.target_spu, "ABC-001");
        assert_eq!(group.product_ids, vec!["p1", "p2"]);
        assert_eq!(group.skus.len(), 2);
        assert!(!group.is_merged);
    }

    #[test]
    fn case_variants_of_one_sku_do_not_form_a_group() {
        let products = vec![product("p1", None, &["LONE-1", "lone-1 "])];
        assert!(build_auto_mapping_groups(&products).is_empty());

        let products = vec![
            product("p1", None, &["LONE-1"]),
            product("p2", None, &["lone-1"]),
        ];
        let groups = build_auto_mapping_groups(&products);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].skus, vec!["LONE-1"]);
        assert_eq!(groups[0].product_ids, vec!["p1", "p2"]);
    }

    #[test]
    fn merged_when_every_member_carries_target_spu() {
        let products = vec![
            product("p1", Some("abc-001"), &["ABC-001-RED", "ABC-001-BLUE"]),
            product("p2", Some("XYZ"), &["XYZ-1", "XYZ-2"]),
            product("p3", None, &["XYZ-3"]),
        ];
        let groups = build_auto_mapping_groups(&products);
        let prefixes: Vec<&str> = groups.iter().map(|g| g.prefix.as_str()).collect();
        assert_eq!(prefixes, vec!["ABC-001", "XYZ"]);
        assert!(groups[0].is_merged);
        assert!(!groups[1].is_merged);
    }
}
