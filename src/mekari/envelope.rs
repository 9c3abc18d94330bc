//! Readers for the registry's loosely shaped list responses.
//!
//! Each concern (where the records live, where pagination hints live, where
//! error text lives) is an ordered list of strategies; the first one that
//! yields something wins.

use reqwest::{Url, header::HeaderMap};
use serde_json::Value;

/// Dotted paths that may hold the record array, in preference order.
pub const LIST_PATHS: [&str; 7] = [
    "products",
    "data.products",
    "data",
    "result",
    "result.products",
    "items",
    "data.items",
];

const META_PATHS: [&str; 8] = [
    "pagination",
    "meta.pagination",
    "meta",
    "data.pagination",
    "data.meta",
    "page_info",
    "paging",
    "",
];

const TOTAL_PAGES_KEYS: [&str; 4] = ["total_pages", "totalPages", "last_page", "page_count"];
const NEXT_PAGE_KEYS: [&str; 2] = ["next_page", "nextPage"];
const HAS_MORE_KEYS: [&str; 4] = ["has_more", "hasMore", "has_next", "hasNext"];

const NEXT_LINK_PATHS: [&str; 5] = [
    "links.next",
    "pagination.links.next",
    "meta.links.next",
    "next_page_url",
    "next",
];

fn lookup<'a>(body: &'a Value, path: &str) -> Option<&'a Value> {
    if path.is_empty() {
        return Some(body);
    }
    path.split('.').try_fold(body, |node, key| node.get(key))
}

/// The record array of a page, or an empty slice when none is found.
pub fn extract_records(body: &Value) -> &[Value] {
    if let Some(items) = body.as_array() {
        return items;
    }
    LIST_PATHS
        .iter()
        .filter_map(|path| lookup(body, path).and_then(Value::as_array))
        .find(|items| !items.is_empty())
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageSignal {
    pub total_pages: Option<u32>,
    pub next_page: Option<u32>,
    pub has_more: Option<bool>,
}

impl PageSignal {
    pub fn is_empty(&self) -> bool {
        self.total_pages.is_none() && self.next_page.is_none() && self.has_more.is_none()
    }

    /// Field-wise merge where `self` wins.
    pub fn or(self, other: PageSignal) -> PageSignal {
        PageSignal {
            total_pages: self.total_pages.or(other.total_pages),
            next_page: self.next_page.or(other.next_page),
            has_more: self.has_more.or(other.has_more),
        }
    }

    /// Page to request after `page`, or `None` when the listing is exhausted
    /// or the page number cannot advance.
    pub fn next_after(&self, page: u32, count: usize, per_page: u32) -> Option<u32> {
        if let Some(next) = self.next_page.filter(|next| *next > page) {
            return Some(next);
        }
        let following = page.checked_add(1);
        match self.has_more {
            Some(true) => return following,
            Some(false) => return None,
            None => {}
        }
        if let Some(total) = self.total_pages {
            return following.filter(|_| page < total);
        }
        if self.next_page.is_some() {
            return None;
        }
        following.filter(|_| count >= per_page as usize)
    }
}

/// Strategy reading one source of pagination hints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalSource {
    Headers,
    BodyMeta,
    NextLink,
}

pub const SIGNAL_SOURCES: [SignalSource; 3] = [
    SignalSource::Headers,
    SignalSource::BodyMeta,
    SignalSource::NextLink,
];

impl SignalSource {
    pub fn read(&self, headers: &HeaderMap, body: &Value) -> PageSignal {
        match self {
            SignalSource::Headers => from_headers(headers),
            SignalSource::BodyMeta => from_body_meta(body),
            SignalSource::NextLink => from_next_link(body),
        }
    }
}

pub fn page_signal(headers: &HeaderMap, body: &Value) -> PageSignal {
    SIGNAL_SOURCES
        .iter()
        .fold(PageSignal::default(), |signal, source| {
            signal.or(source.read(headers, body))
        })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Some(true),
        "false" | "0" | "no" => Some(false),
        _ => None,
    }
}

fn page_number(value: &Value) -> Option<u32> {
    match value {
        Value::Number(n) => n.as_u64().and_then(|n| u32::try_from(n).ok()),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn from_headers(headers: &HeaderMap) -> PageSignal {
    let header = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());
    PageSignal {
        total_pages: header("X-Total-Pages").and_then(|v| v.trim().parse().ok()),
        next_page: header("X-Next-Page").and_then(|v| v.trim().parse().ok()),
        has_more: header("X-Has-More").and_then(parse_bool),
    }
}

fn meta_signal(meta: &Value) -> PageSignal {
    let first = |keys: &[&str]| keys.iter().find_map(|key| meta.get(*key));
    PageSignal {
        total_pages: first(&TOTAL_PAGES_KEYS).and_then(page_number),
        next_page: first(&NEXT_PAGE_KEYS).and_then(page_number),
        has_more: first(&HAS_MORE_KEYS).and_then(|value| match value {
            Value::Bool(flag) => Some(*flag),
            Value::String(raw) => parse_bool(raw),
            _ => None,
        }),
    }
}

fn from_body_meta(body: &Value) -> PageSignal {
    META_PATHS
        .iter()
        .filter_map(|path| lookup(body, path).filter(|meta| meta.is_object()))
        .fold(PageSignal::default(), |signal, meta| signal.or(meta_signal(meta)))
}

fn from_next_link(body: &Value) -> PageSignal {
    let Some(link) = NEXT_LINK_PATHS
        .iter()
        .filter_map(|path| lookup(body, path))
        .find_map(Value::as_str)
        .map(str::trim)
        .filter(|link| !link.is_empty())
    else {
        return PageSignal::default();
    };
    let next_page = Url::parse("http://registry.invalid/")
        .and_then(|base| base.join(link))
        .ok()
        .and_then(|url| {
            url.query_pairs()
                .find(|(key, _)| key == "page")
                .and_then(|(_, value)| value.trim().parse().ok())
        });
    PageSignal {
        next_page,
        has_more: next_page.is_some().then_some(true),
        ..PageSignal::default()
    }
}

const ERROR_FIELDS: [&str; 7] = [
    "message",
    "error.message",
    "error_description",
    "error",
    "errors",
    "detail",
    "title",
];

fn collect_text(value: &Value, into: &mut Vec<String>) {
    match value {
        Value::String(text) => {
            let text = text.trim();
            if !text.is_empty() && !into.iter().any(|seen| seen == text) {
                into.push(text.to_string());
            }
        }
        Value::Array(items) => items.iter().for_each(|item| collect_text(item, into)),
        Value::Object(map) => {
            if let Some(message) = map.get("message") {
                collect_text(message, into);
            } else {
                for (field, detail) in map {
                    let mut nested = Vec::new();
                    collect_text(detail, &mut nested);
                    for text in nested {
                        let line = format!("{field}: {text}");
                        if !into.contains(&line) {
                            into.push(line);
                        }
                    }
                }
            }
        }
        _ => {}
    }
}

/// Human-readable error text assembled from whichever error fields the
/// payload carries, joined with `"; "`.
pub fn error_message(body: &Value) -> Option<String> {
    let mut parts = Vec::new();
    for path in ERROR_FIELDS {
        let Some(value) = lookup(body, path) else {
            continue;
        };
        // `error` as an object is covered by `error.message`
        if path == "error" && value.is_object() {
            continue;
        }
        collect_text(value, &mut parts);
    }
    (!parts.is_empty()).then(|| parts.join("; "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;
    use serde_json::json;

    #[test]
    fn finds_records_under_known_paths() {
        let top = json!([{ "id": 1 }]);
        assert_eq!(extract_records(&top).len(), 1);

        let nested = json!({ "data": { "products": [{ "id": 1 }, { "id": 2 }] } });
        assert_eq!(extract_records(&nested).len(), 2);

        // empty `products` falls through to `data.items`
        let fallthrough = json!({ "products": [], "data": { "items": [{ "id": 3 }] } });
        assert_eq!(extract_records(&fallthrough).len(), 1);

        assert!(extract_records(&json!({ "unrelated": true })).is_empty());
    }

    #[test]
    fn headers_win_over_body_meta_per_field() {
        let mut headers = HeaderMap::new();
        headers.insert("x-has-more", HeaderValue::from_static("false"));
        let body = json!({ "meta": { "pagination": { "total_pages": 4, "has_more": true } } });
        let signal = page_signal(&headers, &body);
        assert_eq!(signal.has_more, Some(false));
        assert_eq!(signal.total_pages, Some(4));
        assert_eq!(signal.next_after(1, 10, 10), None);
    }

    #[test]
    fn camel_case_meta_and_next_links() {
        let body = json!({ "paging": { "totalPages": "3", "hasNext": "true" } });
        let signal = page_signal(&HeaderMap::new(), &body);
        assert_eq!(signal.total_pages, Some(3));
        assert_eq!(signal.next_after(1, 1, 100), Some(2));

        let linked = json!({ "links": { "next": "/partner/core/api/v1/products?page=5&per_page=50" } });
        let signal = page_signal(&HeaderMap::new(), &linked);
        assert_eq!(signal.next_page, Some(5));
        assert_eq!(signal.next_after(4, 0, 50), Some(5));

        let last = json!({ "links": { "next": null }, "meta": { "next_page": null } });
        assert!(page_signal(&HeaderMap::new(), &last).is_empty());
    }

    #[test]
    fn next_page_decision_order() {
        let total = PageSignal {
            total_pages: Some(2),
            ..PageSignal::default()
        };
        assert_eq!(total.next_after(1, 0, 100), Some(2));
        assert_eq!(total.next_after(2, 100, 100), None);

        let stale = PageSignal {
            next_page: Some(1),
            ..PageSignal::default()
        };
        assert_eq!(stale.next_after(1, 100, 100), None);

        let silent = PageSignal::default();
        assert_eq!(silent.next_after(1, 100, 100), Some(2));
        assert_eq!(silent.next_after(1, 99, 100), None);
    }

    #[test]
    fn last_representable_page_ends_listing() {
        let more = PageSignal {
            has_more: Some(true),
            ..PageSignal::default()
        };
        assert_eq!(more.next_after(u32::MAX, 1, 1), None);
        assert_eq!(more.next_after(7, 1, 1), Some(8));

        let totals = PageSignal {
            total_pages: Some(u32::MAX),
            ..PageSignal::default()
        };
        assert_eq!(totals.next_after(u32::MAX, 1, 1), None);
        assert_eq!(PageSignal::default().next_after(u32::MAX, 5, 5), None);
    }

    #[test]
    fn error_message_collects_known_fields() {
        let body = json!({
            "message": "Validation failed",
            "errors": { "product_code": ["has already been taken"] },
        });
        assert_eq!(
            error_message(&body).as_deref(),
            Some("Validation failed; product_code: has already been taken")
        );

        let nested = json!({ "error": { "message": "token expired" } });
        assert_eq!(error_message(&nested).as_deref(), Some("token expired"));

        let plain = json!({ "error": "invalid_token", "error_description": "expired" });
        assert_eq!(error_message(&plain).as_deref(), Some("expired; invalid_token"));

        assert_eq!(error_message(&json!({})), None);
    }
}
