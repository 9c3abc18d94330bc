use crate::cache::SingleFlight;
use crate::catalog::{CatalogSnapshot, CatalogStore};
use crate::pricing::PricingConfig;
use crate::sync::error::{SyncError, SyncErrorKind};
use crate::sync::pass::{PassSummary, reconcile};
use crate::sync::RemoteCatalog;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_with::skip_serializing_none;
use std::{sync::Arc, sync::Mutex, time::Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Single-flight key shared by every caller of a pass.
const PASS_KEY: &str = "catalog-sync";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncTrigger {
    Manual,
    Scheduled,
    Job,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncOutcome {
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    Unconfigured,
    Unauthorized,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    Idle,
    Running,
    Success,
    Error,
    Skipped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SyncFailure {
    pub kind: SyncErrorKind,
    pub stage: String,
    pub message: String,
}

#[skip_serializing_none]
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub id: Uuid,
    pub trigger: SyncTrigger,
    pub outcome: SyncOutcome,
    pub reason: Option<SkipReason>,
    pub error: Option<SyncFailure>,
    pub summary: Option<PassSummary>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl SyncReport {
    fn new(trigger: SyncTrigger, outcome: SyncOutcome, started_at: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger,
            outcome,
            reason: None,
            error: None,
            summary: None,
            started_at,
            finished_at: Utc::now(),
        }
    }

    pub fn skipped(trigger: SyncTrigger, reason: SkipReason, started_at: DateTime<Utc>) -> Self {
        Self {
            reason: Some(reason),
            ..Self::new(trigger, SyncOutcome::Skipped, started_at)
        }
    }

    /// One-line summary for logs and job status.
    pub fn describe(&self) -> String {
        match (self.outcome, &self.summary, &self.error, self.reason) {
            (SyncOutcome::Success, Some(s), _, _) => format!(
                "sync finished: {} record(s), {} matched by id, {} by SKU, {} created, {} synced, {} missing, {} changed",
                s.remote_records,
                s.matched_by_id,
                s.matched_by_sku,
                s.created,
                s.marked_synced,
                s.marked_missing,
                s.changed
            ),
            (SyncOutcome::Error, _, Some(err), _) => {
                format!("sync failed during {} ({}): {}", err.stage, err.kind.tag(), err.message)
            }
            (SyncOutcome::Skipped, _, _, Some(SkipReason::Unauthorized)) => {
                "sync skipped: caller may not modify the catalog".to_string()
            }
            (SyncOutcome::Skipped, _, _, _) => {
                "sync skipped: Mekari integration is not configured".to_string()
            }
            _ => format!("sync {:?}", self.outcome),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct EngineStatus {
    pub state: EngineState,
    pub last_report: Option<SyncReport>,
}

/// Drives reconciliation passes against a catalog store and a remote
/// registry. Concurrent callers of [`Reconciler::run`] share one pass, and
/// a pass keeps running when the caller that started it goes away.
pub struct Reconciler<S, R> {
    inner: Arc<Inner<S, R>>,
    inflight: SingleFlight<SyncReport>,
}

struct Inner<S, R> {
    store: S,
    remote: R,
    pricing: Arc<PricingConfig>,
    snapshot: CatalogSnapshot,
    status: Mutex<EngineStatus>,
}

impl<S, R> Reconciler<S, R>
where
    S: CatalogStore + 'static,
    R: RemoteCatalog + 'static,
{
    pub fn new(store: S, remote: R, pricing: Arc<PricingConfig>, snapshot: CatalogSnapshot) -> Self {
        Self {
            inner: Arc::new(Inner {
                store,
                remote,
                pricing,
                snapshot,
                status: Mutex::new(EngineStatus {
                    state: EngineState::Idle,
                    last_report: None,
                }),
            }),
            inflight: SingleFlight::new(),
        }
    }

    pub fn status(&self) -> EngineStatus {
        self.inner
            .status
            .lock()
            .map(|status| status.clone())
            .unwrap_or(EngineStatus {
                state: EngineState::Idle,
                last_report: None,
            })
    }

    pub fn snapshot(&self) -> &CatalogSnapshot {
        &self.inner.snapshot
    }

    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    /// Runs one pass, or joins the pass already in flight.
    pub async fn run(&self, trigger: SyncTrigger, authorized: bool) -> SyncReport {
        if !authorized {
            let report = SyncReport::skipped(trigger, SkipReason::Unauthorized, Utc::now());
            info!(target = "catalog.sync", trigger = ?trigger, "{}", report.describe());
            self.inner.set_state(EngineState::Skipped, Some(report.clone()));
            return report;
        }
        self.inflight
            .run_detached(PASS_KEY, || Arc::clone(&self.inner).execute(trigger))
            .await
    }
}

impl<S: CatalogStore, R: RemoteCatalog> Inner<S, R> {
    fn set_state(&self, state: EngineState, report: Option<SyncReport>) {
        if let Ok(mut status) = self.status.lock() {
            status.state = state;
            if report.is_some() {
                status.last_report = report;
            }
        }
    }

    async fn execute(self: Arc<Self>, trigger: SyncTrigger) -> SyncReport {
        let started_at = Utc::now();
        let timer = Instant::now();
        self.set_state(EngineState::Running, None);

        let report = match self.pass().await {
            Ok(summary) => SyncReport {
                summary: Some(summary),
                ..SyncReport::new(trigger, SyncOutcome::Success, started_at)
            },
            Err(err) if err.kind() == SyncErrorKind::Unconfigured => {
                SyncReport::skipped(trigger, SkipReason::Unconfigured, started_at)
            }
            Err(err) => SyncReport {
                error: Some(SyncFailure {
                    kind: err.kind(),
                    stage: err.stage().to_string(),
                    message: err.message().to_string(),
                }),
                ..SyncReport::new(trigger, SyncOutcome::Error, started_at)
            },
        };

        let state = match report.outcome {
            SyncOutcome::Success => EngineState::Success,
            SyncOutcome::Error => EngineState::Error,
            SyncOutcome::Skipped => EngineState::Skipped,
        };
        let outcome = match report.outcome {
            SyncOutcome::Success => "success",
            SyncOutcome::Error => "error",
            SyncOutcome::Skipped => "skipped",
        };
        crate::metrics::pass_elapsed(outcome, timer.elapsed().as_millis());
        if report.outcome == SyncOutcome::Error {
            error!(target = "catalog.sync", trigger = ?trigger, "{}", report.describe());
        } else {
            info!(target = "catalog.sync", trigger = ?trigger, "{}", report.describe());
        }
        self.set_state(state, Some(report.clone()));
        report
    }

    async fn pass(&self) -> Result<PassSummary, SyncError> {
        if !self.remote.is_configured().await {
            return Err(SyncError::unconfigured());
        }
        let products = self
            .store
            .list_products()
            .await
            .map_err(|err| SyncError::persistence("load", err))?;
        let records = self
            .remote
            .fetch_all()
            .await
            .map_err(|err| SyncError::remote("fetch", err))?;
        crate::metrics::records_fetched(records.len());

        let before = products.clone();
        let outcome = reconcile(products, &records, &self.pricing, Utc::now());
        if !outcome.changed.is_empty() {
            self.store
                .upsert_products(&outcome.changed)
                .await
                .map_err(|err| SyncError::persistence("persist", err))?;
        }

        let base = match self.store.list_products().await {
            Ok(products) => products,
            Err(err) => {
                warn!(
                    target = "catalog.sync",
                    error = %err,
                    "catalog refresh failed; keeping pre-pass snapshot"
                );
                before
            }
        };
        self.snapshot
            .replace(CatalogSnapshot::merge_writes(base, &outcome.changed))
            .await;
        Ok(outcome.summary)
    }
}
