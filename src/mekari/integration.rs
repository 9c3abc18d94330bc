use crate::cache::TtlCache;
use crate::mekari::client::{MekariClient, MekariError};
use crate::mekari::config::{self, INTEGRATION_NAME};
use crate::mekari::models::RemoteProductRecord;
use crate::supabase::{IntegrationRow, SupabaseClient};
use crate::sync::RemoteCatalog;
use std::time::Duration;
use tracing::{info, warn};

/// Credentials and listing options for the registry API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MekariSettings {
    pub base_url: String,
    pub api_token: String,
    pub per_page: u32,
    pub include_archive: bool,
}

impl MekariSettings {
    pub fn from_env() -> Option<Self> {
        Self::complete(
            config::API_BASE_URL.as_str(),
            config::API_TOKEN.as_str(),
            *config::PER_PAGE,
            *config::INCLUDE_ARCHIVE,
        )
    }

    fn from_row(row: IntegrationRow) -> Option<Self> {
        if !row.enabled {
            return None;
        }
        Self::complete(
            row.base_url.as_deref().unwrap_or(config::API_BASE_URL.as_str()),
            row.api_token.as_deref().unwrap_or_default(),
            row.per_page.filter(|n| *n > 0).unwrap_or(*config::PER_PAGE),
            row.include_archive.unwrap_or(*config::INCLUDE_ARCHIVE),
        )
    }

    fn complete(base_url: &str, api_token: &str, per_page: u32, include_archive: bool) -> Option<Self> {
        let base_url = base_url.trim().trim_end_matches('/');
        let api_token = api_token.trim();
        if base_url.is_empty() || api_token.is_empty() {
            return None;
        }
        Some(Self {
            base_url: base_url.to_string(),
            api_token: api_token.to_string(),
            per_page,
            include_archive,
        })
    }

    pub fn client(&self) -> MekariClient {
        MekariClient::new(&self.base_url, &self.api_token)
            .with_per_page(self.per_page)
            .with_include_archive(self.include_archive)
    }
}

fn ttl_from_env() -> Duration {
    let secs = std::env::var("INTEGRATION_TTL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(300);
    Duration::from_secs(secs)
}

/// Looks up registry settings (Supabase row first, then env) and memoizes
/// the answer, including "not configured", for the cache TTL.
pub struct IntegrationResolver {
    supabase: Option<SupabaseClient>,
    env_fallback: Option<MekariSettings>,
    cache: TtlCache<Option<MekariSettings>>,
}

impl IntegrationResolver {
    pub fn from_env(supabase: Option<SupabaseClient>) -> Self {
        Self::new(supabase, MekariSettings::from_env(), ttl_from_env())
    }

    pub fn new(
        supabase: Option<SupabaseClient>,
        env_fallback: Option<MekariSettings>,
        ttl: Duration,
    ) -> Self {
        Self {
            supabase,
            env_fallback,
            cache: TtlCache::new(ttl),
        }
    }

    pub async fn settings(&self) -> Option<MekariSettings> {
        self.cache
            .get_or_load(INTEGRATION_NAME, || self.load())
            .await
    }

    async fn load(&self) -> Option<MekariSettings> {
        if let Some(supabase) = &self.supabase {
            match supabase.fetch_integration(INTEGRATION_NAME).await {
                Ok(Some(row)) => {
                    if let Some(settings) = MekariSettings::from_row(row) {
                        info!(target = "catalog.mekari", "using stored Mekari integration");
                        return Some(settings);
                    }
                }
                Ok(None) => {}
                Err(err) => warn!(
                    target = "catalog.mekari",
                    error = %err,
                    "integration lookup failed; falling back to env"
                ),
            }
        }
        self.env_fallback.clone()
    }
}

/// Registry access through whatever settings are currently resolved.
pub struct MekariGateway {
    resolver: IntegrationResolver,
}

impl MekariGateway {
    pub fn new(resolver: IntegrationResolver) -> Self {
        Self { resolver }
    }

    pub async fn client(&self) -> Result<MekariClient, MekariError> {
        self.resolver
            .settings()
            .await
            .map(|settings| settings.client())
            .ok_or(MekariError::Unconfigured)
    }

    pub fn resolver(&self) -> &IntegrationResolver {
        &self.resolver
    }
}

impl RemoteCatalog for MekariGateway {
    async fn is_configured(&self) -> bool {
        self.resolver.settings().await.is_some()
    }

    async fn fetch_all(&self) -> Result<Vec<RemoteProductRecord>, MekariError> {
        self.client().await?.fetch_all(None).await
    }
}
