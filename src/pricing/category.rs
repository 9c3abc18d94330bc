use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub fees: CategoryFees,
    #[serde(default)]
    pub margin: CategoryMargin,
}

/// Marketplace fee percentages as entered by the catalog editor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryFees {
    #[serde(default)]
    pub marketplace: String,
    #[serde(default)]
    pub shopee: String,
    #[serde(default)]
    pub entraverse: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryMargin {
    #[serde(default)]
    pub value: String,
    #[serde(default)]
    pub note: String,
}

impl Category {
    /// Margin as a fraction. Blank counts as zero; unparsable is `None`.
    pub fn margin_rate(&self) -> Option<f64> {
        parse_percent(&self.margin.value)
    }

    pub fn marketplace_fee_rate(&self) -> Option<f64> {
        parse_percent(&self.fees.marketplace)
    }

    pub fn matches(&self, key: &str) -> bool {
        let key = key.trim();
        !key.is_empty() && (self.id.eq_ignore_ascii_case(key) || self.name.eq_ignore_ascii_case(key))
    }
}

/// Parses `"10"`, `"10%"`, `"2,5"` or `" 2.5 % "` into a fraction (`0.10`).
pub fn parse_percent(raw: &str) -> Option<f64> {
    let cleaned = raw.trim().trim_end_matches('%').trim().replace(',', ".");
    if cleaned.is_empty() {
        return Some(0.0);
    }
    cleaned
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .map(|value| value / 100.0)
}
