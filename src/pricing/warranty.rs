use crate::catalog::VariantPricingRow;

/// Surcharge applied per covered year.
pub const WARRANTY_RATE_PER_YEAR: f64 = 0.03;
pub const WARRANTY_YEARS: f64 = 1.0;

const NEGATIONS: [&str; 5] = [
    "tanpa garansi",
    "non garansi",
    "non-garansi",
    "no warranty",
    "without warranty",
];

const MARKERS: [&str; 12] = [
    "1 tahun",
    "1tahun",
    "1 thn",
    "1thn",
    "12 bulan",
    "12bulan",
    "1 year",
    "1-year",
    "1yr",
    "one year",
    "garansi",
    "warranty",
];

pub fn text_indicates_warranty(text: &str) -> bool {
    let text = text.trim().to_lowercase();
    if text.is_empty() || NEGATIONS.iter().any(|negation| text.contains(negation)) {
        return false;
    }
    MARKERS.iter().any(|marker| text.contains(marker))
}

pub fn row_has_warranty(row: &VariantPricingRow) -> bool {
    row.variant_texts().any(text_indicates_warranty)
}

/// `1 + 0.03 × (1 + years)` for warranty rows, `1` otherwise.
pub fn warranty_multiplier(row: &VariantPricingRow) -> f64 {
    if row_has_warranty(row) {
        1.0 + WARRANTY_RATE_PER_YEAR * (1.0 + WARRANTY_YEARS)
    } else {
        1.0
    }
}
