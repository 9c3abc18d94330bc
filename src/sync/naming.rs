use crate::catalog::{Product, VariantAxis};

/// Label the registry uses for products without variants.
pub const DEFAULT_LABEL: &str = "Default";
/// Axis created when a product has no variant axis yet.
pub const FALLBACK_AXIS: &str = "Varian 1";

/// Splits `"Widget - Red"` into `("Widget", Some("Red"))` on the last `" - "`.
pub fn split_remote_name(name: &str) -> (&str, Option<&str>) {
    let name = name.trim();
    match name.rsplit_once(" - ") {
        Some((base, label)) if !base.trim().is_empty() && !label.trim().is_empty() => {
            (base.trim(), Some(label.trim()))
        }
        _ => (name, None),
    }
}

fn is_default_label(label: &str) -> bool {
    label.eq_ignore_ascii_case(DEFAULT_LABEL)
}

/// The full remote name without a trailing `Default` label.
pub fn standalone_name(name: &str) -> &str {
    match split_remote_name(name) {
        (base, Some(label)) if is_default_label(label) => base,
        _ => name.trim(),
    }
}

/// Upper-cased SPU code: runs of non-alphanumerics collapse to one `-`.
pub fn derive_spu(text: &str) -> String {
    let mut spu = String::with_capacity(text.len());
    for ch in text.trim().chars() {
        if ch.is_alphanumeric() {
            spu.extend(ch.to_uppercase());
        } else if !spu.is_empty() && !spu.ends_with('-') {
            spu.push('-');
        }
    }
    spu.trim_end_matches('-').to_string()
}

/// Resynchronizes a linked product's name from the registry's name for it.
/// `rows` are the product's pricing rows matched to that record.
pub fn apply_remote_name(product: &mut Product, rows: &[usize], remote_name: &str) {
    if remote_name.trim().is_empty() {
        return;
    }
    let whole = standalone_name(remote_name);
    let standalone_spu = derive_spu(whole);
    let is_standalone = match product.spu_key() {
        None => true,
        Some(spu) => derive_spu(spu) == standalone_spu,
    };
    if is_standalone {
        product.name = whole.to_string();
        product.spu = Some(standalone_spu);
        return;
    }

    let (base, label) = split_remote_name(remote_name);
    product.name = base.to_string();
    let Some(label) = label.filter(|label| !is_default_label(label)) else {
        return;
    };
    let axis_name = match product.variants.first() {
        Some(axis) => axis.name.clone(),
        None => {
            product.variants.push(VariantAxis::new(FALLBACK_AXIS));
            FALLBACK_AXIS.to_string()
        }
    };
    if let Some(axis) = product.axis_mut(&axis_name) {
        axis.add_option(label);
    }
    for &row in rows {
        if let Some(row) = product.variant_pricing.get_mut(row) {
            row.variants.insert(axis_name.clone(), label.to_string());
        }
    }
}
