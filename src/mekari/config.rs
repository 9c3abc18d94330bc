use once_cell::sync::Lazy;
use std::env;

pub const PRODUCTS_PATH: &str = "/partner/core/api/v1/products";
pub const DEFAULT_PER_PAGE: u32 = 100;
/// Hard stop for the page loop.
pub const MAX_PAGES: u32 = 200;
/// Name of the row in the `integrations` table.
pub const INTEGRATION_NAME: &str = "mekari";

pub static API_BASE_URL: Lazy<String> = Lazy::new(|| {
    env::var("MEKARI_API_BASE_URL")
        .map(|url| url.trim().trim_end_matches('/').to_string())
        .unwrap_or_default()
});

pub static API_TOKEN: Lazy<String> =
    Lazy::new(|| env::var("MEKARI_API_TOKEN").unwrap_or_default());

pub static PER_PAGE: Lazy<u32> = Lazy::new(|| {
    env::var("MEKARI_PER_PAGE")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_PER_PAGE)
});

pub static INCLUDE_ARCHIVE: Lazy<bool> = Lazy::new(|| {
    env::var("MEKARI_INCLUDE_ARCHIVE")
        .map(|v| matches!(v.trim().to_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false)
});
