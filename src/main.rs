mod cache;
mod catalog;
mod config;
mod http;
mod idempotency;
mod jobs;
mod mekari;
mod merge;
mod metrics;
mod models;
mod pricing;
mod security;
mod supabase;
mod sync;

use axum::{
    Json, Router,
    extract::{Extension, Path, State},
    http::{HeaderMap, StatusCode, header},
    middleware,
    response::{IntoResponse, Response},
    routing::{get, post},
};
use catalog::{CatalogBackend, CatalogSnapshot, CatalogStore, Product};
use eyre::WrapErr;
use idempotency::IdempotencyCache;
use mekari::{IntegrationResolver, MekariError, MekariGateway, PushError, PushReport, push_products};
use merge::{MappingGroup, MergeError, MergeReport, MergeService, build_auto_mapping_groups};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use models::{
    ApiError, EnqueueResponse, MergeRequest, PricingPreviewRequest, PricingPreviewResponse,
    PushRequest,
};
use pricing::PricingConfig;
use security::{AuthContext, AuthState, require_api_auth};
use serde_json::json;
use std::{net::SocketAddr, sync::Arc};
use sync::{EngineStatus, Reconciler, SyncReport, SyncTrigger};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, fmt};

type Engine = Reconciler<CatalogBackend, MekariGateway>;

#[tokio::main]
async fn main() -> eyre::Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();
    run().await
}

async fn run() -> eyre::Result<()> {
    let pricing = Arc::new(config::load_pricing_config().wrap_err("loading pricing config")?);
    let store = CatalogBackend::from_env();
    let snapshot = CatalogSnapshot::default();
    match store.list_products().await {
        Ok(products) => {
            info!(
                target = "catalog.store",
                backend = store.label(),
                products = products.len(),
                "catalog loaded"
            );
            snapshot.replace(products).await;
        }
        Err(err) => warn!(
            target = "catalog.store",
            backend = store.label(),
            error = %err,
            "initial catalog load failed; starting empty"
        ),
    }

    let gateway = MekariGateway::new(IntegrationResolver::from_env(store.supabase().cloned()));
    let engine = Arc::new(Reconciler::new(
        store.clone(),
        gateway,
        pricing.clone(),
        snapshot.clone(),
    ));
    let (queue, _worker) = jobs::SyncJobQueue::spawn(engine.clone());
    let _schedule = jobs::spawn_schedule(engine.clone(), config::SyncSettings::from_env());

    let openapi: serde_json::Value = serde_yaml::from_str(include_str!("../docs/openapi.yaml"))
        .unwrap_or(json!({"openapi": "3.0.3"}));
    let prometheus_handle = PrometheusBuilder::new()
        .install_recorder()
        .wrap_err("installing prometheus recorder")?;

    let state = AppState {
        merger: Arc::new(MergeService::new(store.clone(), snapshot.clone())),
        engine,
        store,
        snapshot,
        pricing,
        queue,
        openapi: Arc::new(openapi),
        push_replays: IdempotencyCache::from_env(),
        prometheus_handle,
    };

    let cors = CorsLayer::new()
        .allow_headers(Any)
        .allow_methods(Any)
        .allow_origin(Any);

    let protected = Router::new()
        .route("/sync", post(run_sync))
        .route("/sync/status", get(sync_status))
        .nest(
            "/jobs",
            Router::new()
                .route("/sync", post(enqueue_sync_job))
                .route("/{id}", get(get_job_status)),
        )
        .route("/products", get(list_products))
        .route("/mapping-groups", get(mapping_groups))
        .route("/merge", post(merge_products))
        .route("/pricing/preview", post(pricing_preview))
        .route("/mekari/push", post(push_to_mekari))
        .route_layer(middleware::from_fn_with_state(
            AuthState::from_env(),
            require_api_auth,
        ));

    let app = Router::new()
        .route("/health", get(health))
        .route("/metrics", get(metrics_endpoint))
        .route("/openapi.json", get(openapi_json))
        .route("/docs", get(swagger_ui))
        .merge(protected)
        .with_state(state)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .layer(axum::extract::DefaultBodyLimit::max(body_limit_from_env()));

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(8000);
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    info!(target = "catalog.api", "listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service()).await?;
    Ok(())
}

#[derive(Clone)]
struct AppState {
    engine: Arc<Engine>,
    merger: Arc<MergeService<CatalogBackend>>,
    store: CatalogBackend,
    snapshot: CatalogSnapshot,
    pricing: Arc<PricingConfig>,
    queue: jobs::SyncJobQueue,
    openapi: Arc<serde_json::Value>,
    push_replays: IdempotencyCache<PushReport>,
    prometheus_handle: PrometheusHandle,
}

/// Health and readiness check.
///
/// - Method: `GET`
/// - Path: `/health`
/// - Auth: none
async fn health(State(state): State<AppState>) -> Json<serde_json::Value> {
    Json(json!({
        "status": "ok",
        "service": "catalog-sync-rs",
        "store": state.store.label(),
    }))
}

fn presented_matches(headers: &HeaderMap, header_name: &str, secret: &str) -> bool {
    headers
        .get(header_name)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|presented| presented == secret)
}

async fn openapi_json(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<Json<serde_json::Value>, AppError> {
    if let Ok(key) = std::env::var("OPENAPI_KEY")
        && !presented_matches(&headers, "X-Docs-Key", &key)
    {
        return Err(AppError::Unauthorized);
    }
    Ok(Json((*state.openapi).clone()))
}

async fn swagger_ui() -> impl IntoResponse {
    let html = r#"<!doctype html>
<html>
<head>
  <meta charset='utf-8'/>
  <title>Catalog Sync API Docs</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css" />
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.onload = () => {
      window.ui = SwaggerUIBundle({ url: '/openapi.json', dom_id: '#swagger-ui' });
    };
  </script>
</body>
</html>"#;
    ([(header::CONTENT_TYPE, "text/html; charset=utf-8")], html)
}

fn body_limit_from_env() -> usize {
    std::env::var("REQUEST_MAX_BYTES")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256 * 1024)
}

async fn metrics_endpoint(State(state): State<AppState>, headers: HeaderMap) -> Response {
    if let Ok(secret) = std::env::var("METRICS_KEY")
        && !presented_matches(&headers, "X-Metrics-Key", &secret)
    {
        return (StatusCode::UNAUTHORIZED, "unauthorized").into_response();
    }
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        state.prometheus_handle.render(),
    )
        .into_response()
}

fn require_editor(context: &AuthContext) -> Result<(), AppError> {
    if context.can_edit() {
        Ok(())
    } else {
        Err(AppError::Forbidden)
    }
}

/// Run a reconciliation pass now, or join the one already running.
///
/// - Method: `POST`
/// - Path: `/sync`
/// - Auth: `Authorization: Bearer <key>` or `X-Catalog-Key: <key>`
/// - Response: `SyncReport`; viewers get a `skipped` report
async fn run_sync(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Json<SyncReport> {
    crate::metrics::inc_requests("/sync");
    info!(
        target = "catalog.api",
        org_id = %context.org_id,
        api_key = %context.api_key_id,
        "manual sync requested",
    );
    Json(state.engine.run(SyncTrigger::Manual, context.can_edit()).await)
}

async fn sync_status(State(state): State<AppState>) -> Json<EngineStatus> {
    crate::metrics::inc_requests("/sync/status");
    Json(state.engine.status())
}

async fn enqueue_sync_job(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
) -> Result<(StatusCode, Json<EnqueueResponse>), AppError> {
    crate::metrics::inc_requests("/jobs/sync");
    require_editor(&context)?;
    let id = state.queue.enqueue_sync().await.map_err(AppError::Api)?;
    Ok((
        StatusCode::ACCEPTED,
        Json(EnqueueResponse {
            job_id: id.to_string(),
        }),
    ))
}

async fn get_job_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<jobs::JobInfo>, AppError> {
    let Ok(uuid) = uuid::Uuid::parse_str(&id) else {
        return Err(AppError::BadRequest("invalid_job_id", id));
    };
    state
        .queue
        .get(uuid)
        .await
        .map(Json)
        .ok_or(AppError::NotFound("job_not_found", id))
}

async fn list_products(State(state): State<AppState>) -> Json<Vec<Product>> {
    crate::metrics::inc_requests("/products");
    Json(state.snapshot.read().await)
}

async fn mapping_groups(State(state): State<AppState>) -> Json<Vec<MappingGroup>> {
    crate::metrics::inc_requests("/mapping-groups");
    Json(build_auto_mapping_groups(&state.snapshot.read().await))
}

/// Fold several products into one SPU.
///
/// - Method: `POST`
/// - Path: `/merge`
/// - Body: `MergeRequest { productIds, targetSpu }`
/// - Response: `MergeReport`
async fn merge_products(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    Json(payload): Json<MergeRequest>,
) -> Result<Json<MergeReport>, AppError> {
    crate::metrics::inc_requests("/merge");
    require_editor(&context)?;
    let report = state
        .merger
        .merge(&payload.product_ids, &payload.target_spu)
        .await?;
    Ok(Json(report))
}

async fn pricing_preview(
    State(state): State<AppState>,
    Json(payload): Json<PricingPreviewRequest>,
) -> Json<PricingPreviewResponse> {
    crate::metrics::inc_requests("/pricing/preview");
    let category = payload
        .category
        .as_deref()
        .and_then(|key| state.pricing.find_category(key))
        .or_else(|| state.pricing.catch_all_category());
    Json(PricingPreviewResponse {
        category: category.map(|c| c.id.clone()),
        breakdown: pricing::compute(&payload.row, category, &state.pricing),
    })
}

/// Create or update registry products from local pricing rows.
///
/// - Method: `POST`
/// - Path: `/mekari/push`
/// - Body: `PushRequest { productIds? }`
/// - Response: `PushReport`; repeated `Idempotency-Key`s replay the first report
async fn push_to_mekari(
    State(state): State<AppState>,
    Extension(context): Extension<AuthContext>,
    headers: HeaderMap,
    Json(payload): Json<PushRequest>,
) -> Result<Json<PushReport>, AppError> {
    crate::metrics::inc_requests("/mekari/push");
    require_editor(&context)?;

    let replay_key = headers
        .get("Idempotency-Key")
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|key| IdempotencyCache::<PushReport>::scoped_key("push", &context.org_id, key));
    if let Some(key) = &replay_key
        && let Some(existing) = state.push_replays.get(key).await
    {
        return Ok(Json(existing));
    }

    let client = state.engine.remote().client().await.map_err(PushError::from)?;
    let report = push_products(
        &client,
        &state.store,
        &state.snapshot,
        payload.product_ids.as_deref(),
    )
    .await?;
    if let Some(key) = &replay_key {
        state.push_replays.put(key, &report).await;
    }
    Ok(Json(report))
}

#[derive(Debug)]
enum AppError {
    Unauthorized,
    Forbidden,
    BadRequest(&'static str, String),
    NotFound(&'static str, String),
    Api(ApiError),
    Merge(MergeError),
    Push(PushError),
}

impl From<MergeError> for AppError {
    fn from(value: MergeError) -> Self {
        Self::Merge(value)
    }
}

impl From<PushError> for AppError {
    fn from(value: PushError) -> Self {
        Self::Push(value)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, payload) = match self {
            AppError::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                ApiError::new("unauthorized", "missing or invalid docs key"),
            ),
            AppError::Forbidden => (
                StatusCode::FORBIDDEN,
                ApiError::new("forbidden", "this API key may not modify the catalog"),
            ),
            AppError::BadRequest(code, detail) => (StatusCode::BAD_REQUEST, ApiError::new(code, detail)),
            AppError::NotFound(code, detail) => (StatusCode::NOT_FOUND, ApiError::new(code, detail)),
            AppError::Api(err) => (StatusCode::SERVICE_UNAVAILABLE, err),
            AppError::Merge(err) => {
                let status = match &err {
                    MergeError::NoProducts | MergeError::EmptyTarget => StatusCode::BAD_REQUEST,
                    MergeError::UnknownProduct(_) => StatusCode::NOT_FOUND,
                    MergeError::Store(_) => StatusCode::BAD_GATEWAY,
                };
                (status, ApiError::new("merge_failed", err.to_string()))
            }
            AppError::Push(err) => {
                let (status, code) = match &err {
                    PushError::Remote(MekariError::Unconfigured) => {
                        (StatusCode::CONFLICT, "unconfigured")
                    }
                    PushError::Remote(remote) => (StatusCode::BAD_GATEWAY, remote.tag()),
                    PushError::Store(_) => (StatusCode::BAD_GATEWAY, "persistence"),
                };
                (status, ApiError::new(code, err.to_string()))
            }
        };
        if status.is_server_error() {
            warn!(target = "catalog.api", status = status.as_u16(), error = %payload.error, "request failed");
        }
        (status, Json(payload)).into_response()
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,tower_http=debug"));
    let _ = fmt().with_env_filter(filter).try_init();
}
