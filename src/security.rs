use crate::models::ApiError;
use axum::{
    Json,
    body::Body,
    extract::State,
    http::{self, Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{collections::HashMap, convert::Infallible, env, sync::Arc};
use tracing::{info, warn};

const KEY_HEADER: &str = "X-Catalog-Key";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Viewer,
    Editor,
}

impl Role {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_lowercase().as_str() {
            "" | "editor" | "admin" => Some(Role::Editor),
            "viewer" | "read" | "readonly" => Some(Role::Viewer),
            _ => None,
        }
    }
}

#[derive(Clone)]
pub struct AuthState {
    records: Arc<HashMap<String, AuthContext>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AuthContext {
    pub org_id: String,
    pub api_key_id: String,
    pub role: Role,
}

impl AuthContext {
    pub fn can_edit(&self) -> bool {
        self.role == Role::Editor
    }
}

impl AuthState {
    pub fn from_env() -> Self {
        let raw = env::var("CATALOG_API_KEYS").unwrap_or_else(|_| "demo-org:demo-key".to_string());
        Self::from_entries(&raw)
    }

    /// Parses comma-separated `org:key[:role]` entries; keys default to the
    /// editor role. Falls back to the demo key when nothing usable is given.
    pub fn from_entries(raw: &str) -> Self {
        let mut records = HashMap::new();
        for (idx, token) in raw.split(',').enumerate() {
            let trimmed = token.trim();
            if trimmed.is_empty() {
                continue;
            }
            let mut parts = trimmed.splitn(3, ':');
            let org_id = parts.next().map(str::trim).filter(|s| !s.is_empty());
            let key = parts.next().map(str::trim).filter(|s| !s.is_empty());
            let role = Role::parse(parts.next().unwrap_or_default());
            match (org_id, key, role) {
                (Some(org), Some(secret), Some(role)) => {
                    records.insert(
                        secret.to_string(),
                        AuthContext {
                            org_id: org.to_string(),
                            api_key_id: format!("key-{:02}", idx + 1),
                            role,
                        },
                    );
                }
                _ => warn!(
                    target = "catalog.api",
                    "ignored malformed CATALOG_API_KEYS entry #{}",
                    idx + 1
                ),
            }
        }

        if records.is_empty() {
            warn!(
                target = "catalog.api",
                "CATALOG_API_KEYS produced no keys; falling back to demo credentials"
            );
            records.insert(
                "demo-key".to_string(),
                AuthContext {
                    org_id: "demo-org".to_string(),
                    api_key_id: "key-01".to_string(),
                    role: Role::Editor,
                },
            );
        } else {
            info!(
                target = "catalog.api",
                key_count = records.len(),
                "loaded API keys"
            );
        }
        Self {
            records: Arc::new(records),
        }
    }

    fn authenticate(&self, presented: &str) -> Option<AuthContext> {
        self.records.get(presented).cloned()
    }
}

pub async fn require_api_auth(
    State(state): State<AuthState>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, Infallible> {
    let Some(presented) = extract_api_key(request.headers()) else {
        return Ok(unauthorized_response(
            "missing_api_key",
            "Provide X-Catalog-Key or Bearer token",
        ));
    };

    let Some(context) = state.authenticate(&presented) else {
        return Ok(unauthorized_response("invalid_api_key", "Key not recognized"));
    };

    request.extensions_mut().insert(context);
    Ok(next.run(request).await)
}

fn extract_api_key(headers: &http::HeaderMap) -> Option<String> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION)
        && let Ok(raw) = value.to_str()
        && raw.len() >= 7
        && raw[..6].eq_ignore_ascii_case("bearer")
    {
        return Some(raw[6..].trim().to_string());
    }
    headers
        .get(KEY_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn unauthorized_response(code: &str, message: &str) -> Response {
    (StatusCode::UNAUTHORIZED, Json(ApiError::new(code, message))).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn entries_carry_org_and_role() {
        let state = AuthState::from_entries("acme:s3cret, acme:peek:viewer ,broken,x:y:owner");
        let editor = state.authenticate("s3cret").expect("editor key");
        assert_eq!(editor.org_id, "acme");
        assert_eq!(editor.api_key_id, "key-01");
        assert!(editor.can_edit());

        let viewer = state.authenticate("peek").expect("viewer key");
        assert_eq!(viewer.role, Role::Viewer);
        assert!(!viewer.can_edit());

        assert!(state.authenticate("y").is_none());
        assert!(state.authenticate("broken").is_none());
    }

    #[test]
    fn empty_config_falls_back_to_demo_key() {
        let state = AuthState::from_entries(" , ");
        assert_eq!(
            state.authenticate("demo-key").map(|ctx| ctx.org_id),
            Some("demo-org".to_string())
        );
    }

    #[test]
    fn bearer_takes_precedence_over_key_header() {
        let mut headers = http::HeaderMap::new();
        headers.insert("x-catalog-key", HeaderValue::from_static("from-header"));
        assert_eq!(extract_api_key(&headers).as_deref(), Some("from-header"));

        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_static("Bearer  token-1 "),
        );
        assert_eq!(extract_api_key(&headers).as_deref(), Some("token-1"));

        let mut blank = http::HeaderMap::new();
        blank.insert("x-catalog-key", HeaderValue::from_static("  "));
        assert_eq!(extract_api_key(&blank), None);
    }
}
