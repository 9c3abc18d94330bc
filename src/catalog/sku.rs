use serde_json::Value;

/// Canonical form of a seller SKU for matching. Absent or blank input maps to
/// `""`, which callers treat as "no match key".
pub fn normalize_sku(value: Option<&str>) -> String {
    value
        .map(|raw| raw.trim().to_lowercase())
        .unwrap_or_default()
}

/// Canonical string form of a remote product identifier, which the registry
/// sends either as a JSON number or a string.
pub fn normalize_remote_id(value: &Value) -> String {
    match value {
        Value::String(raw) => raw.trim().to_string(),
        Value::Number(number) => {
            if let Some(int) = number.as_i64() {
                int.to_string()
            } else if let Some(uint) = number.as_u64() {
                uint.to_string()
            } else {
                match number.as_f64() {
                    Some(float) if float.is_finite() && float.fract() == 0.0 => {
                        format!("{float:.0}")
                    }
                    Some(float) if float.is_finite() => float.to_string(),
                    _ => String::new(),
                }
            }
        }
        _ => String::new(),
    }
}

pub fn normalize_remote_id_str(value: Option<&str>) -> String {
    value.map(|raw| raw.trim().to_string()).unwrap_or_default()
}

/// Everything before the last `-` delimited segment, e.g. `ABC-RED-1` -> `ABC-RED`.
pub fn sku_prefix(sku: &str) -> Option<&str> {
    let trimmed = sku.trim();
    let (prefix, suffix) = trimmed.rsplit_once('-')?;
    let prefix = prefix.trim_end_matches('-').trim();
    if prefix.is_empty() || suffix.trim().is_empty() {
        return None;
    }
    Some(prefix)
}

/// Last `-` delimited segment of a SKU.
pub fn sku_suffix(sku: &str) -> Option<&str> {
    let (_, suffix) = sku.trim().rsplit_once('-')?;
    let suffix = suffix.trim();
    (!suffix.is_empty()).then_some(suffix)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn normalize_is_idempotent() {
        for raw in ["  SKU-A-1 ", "sku-a-1", "MiXeD Case", "", "   "] {
            let once = normalize_sku(Some(raw));
            assert_eq!(normalize_sku(Some(&once)), once);
        }
        assert_eq!(normalize_sku(Some("  SKU-A-1 ")), "sku-a-1");
    }

    #[test]
    fn empty_and_absent_yield_empty_key() {
        assert_eq!(normalize_sku(Some("")), "");
        assert_eq!(normalize_sku(None), "");
        assert_eq!(normalize_remote_id(&Value::Null), "");
        assert_eq!(normalize_remote_id_str(None), "");
    }

    #[test]
    fn remote_ids_stringify_numbers() {
        assert_eq!(normalize_remote_id(&json!(9)), "9");
        assert_eq!(normalize_remote_id(&json!(9.0)), "9");
        assert_eq!(normalize_remote_id(&json!(" 77 ")), "77");
        assert_eq!(normalize_remote_id(&json!(true)), "");
    }

    #[test]
    fn prefix_and_suffix_split_on_last_dash() {
        assert_eq!(sku_prefix("ABC-RED-1"), Some("ABC-RED"));
        assert_eq!(sku_suffix("ABC-RED-1"), Some("1"));
        assert_eq!(sku_prefix("ABC"), None);
        assert_eq!(sku_prefix("ABC-"), None);
        assert_eq!(sku_suffix("-"), None);
    }
}
