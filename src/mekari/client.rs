use crate::http::build_client;
use crate::mekari::config::{self, MAX_PAGES, PRODUCTS_PATH};
use crate::mekari::envelope::{error_message, extract_records, page_signal};
use crate::mekari::models::{ProductEnvelope, ProductPayload, RemoteProductRecord};
use reqwest::{Client, RequestBuilder, Response};
use serde_json::Value;
use std::collections::HashSet;
use thiserror::Error;
use tracing::{debug, info, warn};
use urlencoding::encode;

#[derive(Debug, Clone, Error)]
pub enum MekariError {
    #[error("network: {context}: {message}")]
    Network { context: String, message: String },
    #[error("remote-rejected: {context}: HTTP {status}: {message}")]
    Rejected {
        context: String,
        status: u16,
        message: String,
    },
    #[error("parse: {context}: {message}")]
    Parse { context: String, message: String },
    #[error("Mekari integration is not configured")]
    Unconfigured,
}

impl MekariError {
    pub fn tag(&self) -> &'static str {
        match self {
            MekariError::Network { .. } => "network",
            MekariError::Rejected { .. } => "remote-rejected",
            MekariError::Parse { .. } => "parse",
            MekariError::Unconfigured => "unconfigured",
        }
    }
}

#[derive(Debug, Clone)]
pub struct MekariClient {
    base_url: String,
    token: String,
    http: Client,
    per_page: u32,
    include_archive: bool,
    max_pages: u32,
}

/// One fetched page: its records and the page to request next.
#[derive(Debug)]
pub struct FetchedPage {
    pub records: Vec<RemoteProductRecord>,
    pub next_page: Option<u32>,
}

impl MekariClient {
    pub fn from_env() -> Self {
        Self::new(config::API_BASE_URL.as_str(), config::API_TOKEN.as_str())
            .with_per_page(*config::PER_PAGE)
            .with_include_archive(*config::INCLUDE_ARCHIVE)
    }

    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim().trim_end_matches('/').to_string(),
            token: token.into().trim().to_string(),
            http: build_client(),
            per_page: config::DEFAULT_PER_PAGE,
            include_archive: false,
            max_pages: MAX_PAGES,
        }
    }

    pub fn with_per_page(mut self, per_page: u32) -> Self {
        self.per_page = per_page.max(1);
        self
    }

    pub fn with_include_archive(mut self, include_archive: bool) -> Self {
        self.include_archive = include_archive;
        self
    }

    pub fn with_max_pages(mut self, max_pages: u32) -> Self {
        self.max_pages = max_pages.max(1);
        self
    }

    pub fn configured(&self) -> bool {
        !self.base_url.is_empty() && !self.token.is_empty()
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    fn request(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, format!("{}{path}", self.base_url))
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
    }

    async fn read_json(response: Response, context: &str) -> Result<Value, MekariError> {
        let status = response.status();
        let text = response.text().await.map_err(|err| MekariError::Network {
            context: context.to_string(),
            message: err.to_string(),
        })?;
        let body: Option<Value> = if text.trim().is_empty() {
            Some(Value::Null)
        } else {
            serde_json::from_str(&text).ok()
        };
        if !status.is_success() {
            let message = body
                .as_ref()
                .and_then(error_message)
                .unwrap_or_else(|| text.chars().take(200).collect());
            return Err(MekariError::Rejected {
                context: context.to_string(),
                status: status.as_u16(),
                message,
            });
        }
        body.ok_or_else(|| MekariError::Parse {
            context: context.to_string(),
            message: "response body is not JSON".to_string(),
        })
    }

    pub async fn fetch_page(&self, page: u32, per_page: u32) -> Result<FetchedPage, MekariError> {
        if !self.configured() {
            return Err(MekariError::Unconfigured);
        }
        let context = format!("page {page}");
        let response = self
            .request(reqwest::Method::GET, PRODUCTS_PATH)
            .query(&[
                ("page", page.to_string()),
                ("per_page", per_page.to_string()),
                ("include_archive", self.include_archive.to_string()),
            ])
            .send()
            .await
            .map_err(|err| MekariError::Network {
                context: context.clone(),
                message: err.to_string(),
            })?;
        let headers = response.headers().clone();
        let body = Self::read_json(response, &context).await?;
        let items = extract_records(&body);
        let records: Vec<RemoteProductRecord> = items
            .iter()
            .filter_map(RemoteProductRecord::from_value)
            .collect();
        let next_page = if items.is_empty() {
            None
        } else {
            page_signal(&headers, &body).next_after(page, items.len(), per_page)
        };
        debug!(
            target = "catalog.mekari",
            page,
            records = records.len(),
            next_page = ?next_page,
            "fetched registry page"
        );
        Ok(FetchedPage { records, next_page })
    }

    /// Walks every page, de-duplicating by SKU (else id). Any failing page
    /// aborts the whole listing.
    pub async fn fetch_all(&self, per_page_hint: Option<u32>) -> Result<Vec<RemoteProductRecord>, MekariError> {
        let per_page = per_page_hint.filter(|n| *n > 0).unwrap_or(self.per_page);
        let mut seen = HashSet::new();
        let mut records = Vec::new();
        let mut page = 1;
        let mut fetched = 0;
        loop {
            if fetched >= self.max_pages {
                warn!(
                    target = "catalog.mekari",
                    pages = fetched,
                    "page cap reached; stopping registry listing"
                );
                break;
            }
            let batch = self.fetch_page(page, per_page).await?;
            fetched += 1;
            if batch.records.is_empty() && batch.next_page.is_none() {
                break;
            }
            for record in batch.records {
                if seen.insert(record.dedup_key()) {
                    records.push(record);
                }
            }
            match batch.next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        info!(
            target = "catalog.mekari",
            pages = fetched,
            records = records.len(),
            "registry listing complete"
        );
        Ok(records)
    }

    /// Creates a product and returns the id the registry assigned.
    pub async fn create_product(&self, payload: &ProductPayload) -> Result<String, MekariError> {
        if !self.configured() {
            return Err(MekariError::Unconfigured);
        }
        let context = format!(
            "create {}",
            payload.product_code.as_deref().unwrap_or(&payload.name)
        );
        let response = self
            .request(reqwest::Method::POST, PRODUCTS_PATH)
            .json(&ProductEnvelope { product: payload })
            .send()
            .await
            .map_err(|err| MekariError::Network {
                context: context.clone(),
                message: err.to_string(),
            })?;
        let body = Self::read_json(response, &context).await?;
        created_id(&body).ok_or(MekariError::Parse {
            context,
            message: "created product id missing from response".to_string(),
        })
    }

    pub async fn update_product(&self, id: &str, payload: &ProductPayload) -> Result<(), MekariError> {
        if !self.configured() {
            return Err(MekariError::Unconfigured);
        }
        let context = format!("update {id}");
        let response = self
            .request(
                reqwest::Method::PATCH,
                &format!("{PRODUCTS_PATH}/{}", encode(id)),
            )
            .json(&ProductEnvelope { product: payload })
            .send()
            .await
            .map_err(|err| MekariError::Network {
                context: context.clone(),
                message: err.to_string(),
            })?;
        Self::read_json(response, &context).await?;
        Ok(())
    }
}

fn created_id(body: &Value) -> Option<String> {
    ["/product/id", "/data/id", "/data/product/id", "/id"]
        .iter()
        .filter_map(|pointer| body.pointer(pointer))
        .map(crate::catalog::sku::normalize_remote_id)
        .find(|id| !id.is_empty())
}
