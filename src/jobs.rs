use crate::{
    catalog::CatalogStore,
    config::SyncSettings,
    models::ApiError,
    sync::{Reconciler, RemoteCatalog, SyncOutcome, SyncReport, SyncTrigger},
};
use serde::Serialize;
use std::{
    collections::{HashMap, VecDeque},
    sync::Arc,
};
use tokio::{
    sync::{Mutex, mpsc},
    task::JoinHandle,
    time::{Instant, MissedTickBehavior, interval_at},
};
use tracing::info;
use uuid::Uuid;

/// Queued reconciliation passes, run one at a time by a background worker.
#[derive(Clone)]
pub struct SyncJobQueue {
    tx: mpsc::Sender<Uuid>,
    statuses: Arc<Mutex<JobTable>>,
}

/// Job states by id. Only the most recent `history_limit` finished jobs
/// are kept; queued and running jobs are never evicted.
struct JobTable {
    states: HashMap<Uuid, JobState>,
    finished: VecDeque<Uuid>,
    history_limit: usize,
}

impl JobTable {
    fn new(history_limit: usize) -> Self {
        Self {
            states: HashMap::new(),
            finished: VecDeque::new(),
            history_limit,
        }
    }

    fn set(&mut self, id: Uuid, state: JobState) {
        self.states.insert(id, state);
    }

    fn finish(&mut self, id: Uuid, state: JobState) {
        self.states.insert(id, state);
        self.finished.push_back(id);
        while self.finished.len() > self.history_limit {
            if let Some(old) = self.finished.pop_front() {
                self.states.remove(&old);
            }
        }
    }
}

#[derive(Clone, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed {
        report: SyncReport,
    },
    Failed {
        error: String,
        stage: Option<String>,
    },
}

impl JobState {
    fn finished(report: SyncReport) -> Self {
        match (report.outcome, &report.error) {
            (SyncOutcome::Error, Some(failure)) => JobState::Failed {
                error: failure.message.clone(),
                stage: Some(failure.stage.clone()),
            },
            (SyncOutcome::Error, None) => JobState::Failed {
                error: report.describe(),
                stage: None,
            },
            _ => JobState::Completed { report },
        }
    }
}

#[derive(Clone, Serialize)]
pub struct JobInfo {
    pub id: String,
    #[serde(flatten)]
    pub state: JobState,
}

impl SyncJobQueue {
    pub fn spawn<S, R>(engine: Arc<Reconciler<S, R>>) -> (Self, JoinHandle<()>)
    where
        S: CatalogStore + 'static,
        R: RemoteCatalog + 'static,
    {
        Self::spawn_with_history(engine, job_history_from_env())
    }

    fn spawn_with_history<S, R>(engine: Arc<Reconciler<S, R>>, history_limit: usize) -> (Self, JoinHandle<()>)
    where
        S: CatalogStore + 'static,
        R: RemoteCatalog + 'static,
    {
        let (tx, mut rx) = mpsc::channel::<Uuid>(queue_capacity_from_env());
        let statuses = Arc::new(Mutex::new(JobTable::new(history_limit)));
        let statuses_bg = statuses.clone();

        let handle = tokio::spawn(async move {
            while let Some(id) = rx.recv().await {
                {
                    let mut guard = statuses_bg.lock().await;
                    guard.set(id, JobState::Running);
                }
                let report = engine.run(SyncTrigger::Job, true).await;
                let mut guard = statuses_bg.lock().await;
                guard.finish(id, JobState::finished(report));
            }
        });

        (Self { tx, statuses }, handle)
    }

    pub async fn enqueue_sync(&self) -> Result<Uuid, ApiError> {
        let id = Uuid::new_v4();
        {
            let mut guard = self.statuses.lock().await;
            guard.set(id, JobState::Queued);
        }
        if self.tx.send(id).await.is_err() {
            self.statuses.lock().await.states.remove(&id);
            return Err(ApiError::new("queue_send_failed", "worker not available"));
        }
        Ok(id)
    }

    pub async fn get(&self, id: Uuid) -> Option<JobInfo> {
        let guard = self.statuses.lock().await;
        guard.states.get(&id).cloned().map(|state| JobInfo {
            id: id.to_string(),
            state,
        })
    }
}

fn queue_capacity_from_env() -> usize {
    std::env::var("QUEUE_CAPACITY")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(64)
}

fn job_history_from_env() -> usize {
    std::env::var("JOB_HISTORY_LIMIT")
        .ok()
        .and_then(|v| v.parse::<usize>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(256)
}

/// Starts the recurring pass. The first tick fires one interval after start.
pub fn spawn_schedule<S, R>(engine: Arc<Reconciler<S, R>>, settings: SyncSettings) -> Option<JoinHandle<()>>
where
    S: CatalogStore + 'static,
    R: RemoteCatalog + 'static,
{
    if !settings.schedule_enabled {
        info!(target = "catalog.sync", "scheduled sync disabled");
        return None;
    }
    info!(
        target = "catalog.sync",
        interval_secs = settings.interval.as_secs(),
        "scheduled sync enabled"
    );
    Some(tokio::spawn(async move {
        let mut ticker = interval_at(Instant::now() + settings.interval, settings.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            engine.run(SyncTrigger::Scheduled, true).await;
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{CatalogSnapshot, InMemoryCatalogStore, Product, VariantPricingRow};
    use crate::config::default_pricing_config;
    use crate::mekari::{MekariError, RemoteProductRecord};
    use crate::sync::EngineState;
    use chrono::Utc;
    use std::time::Duration;

    struct StaticRemote {
        records: Result<Vec<RemoteProductRecord>, MekariError>,
    }

    impl RemoteCatalog for StaticRemote {
        async fn is_configured(&self) -> bool {
            true
        }

        async fn fetch_all(&self) -> Result<Vec<RemoteProductRecord>, MekariError> {
            self.records.clone()
        }
    }

    fn engine(records: Result<Vec<RemoteProductRecord>, MekariError>) -> Arc<Reconciler<InMemoryCatalogStore, StaticRemote>> {
        let mut product = Product::new("p1", "Widget", Utc::now());
        product.variant_pricing = vec![VariantPricingRow::new("r1", "SKU-A-1")];
        Arc::new(Reconciler::new(
            InMemoryCatalogStore::new(vec![product]),
            StaticRemote { records },
            Arc::new(default_pricing_config()),
            CatalogSnapshot::default(),
        ))
    }

    async fn wait_for_terminal(queue: &SyncJobQueue, id: Uuid) -> JobState {
        for _ in 0..200 {
            if let Some(info) = queue.get(id).await
                && matches!(info.state, JobState::Completed { .. } | JobState::Failed { .. })
            {
                return info.state;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("job {id} never finished");
    }

    #[tokio::test]
    async fn queued_job_runs_a_pass() {
        let record = RemoteProductRecord {
            id: "9".into(),
            product_code: "SKU-A-1".into(),
            name: "Widget".into(),
            ..RemoteProductRecord::default()
        };
        let (queue, _worker) = SyncJobQueue::spawn(engine(Ok(vec![record])));
        let id = queue.enqueue_sync().await.expect("enqueue");

        match wait_for_terminal(&queue, id).await {
            JobState::Completed { report } => {
                assert_eq!(report.trigger, SyncTrigger::Job);
                assert_eq!(report.outcome, SyncOutcome::Success);
            }
            _ => panic!("expected completed job"),
        }
        assert!(queue.get(Uuid::new_v4()).await.is_none());
    }

    #[tokio::test]
    async fn failed_pass_surfaces_stage() {
        let failure = MekariError::Network {
            context: "page 1".into(),
            message: "connection reset".into(),
        };
        let (queue, _worker) = SyncJobQueue::spawn(engine(Err(failure)));
        let id = queue.enqueue_sync().await.expect("enqueue");

        match wait_for_terminal(&queue, id).await {
            JobState::Failed { error, stage } => {
                assert!(error.contains("connection reset"));
                assert_eq!(stage.as_deref(), Some("fetch"));
            }
            _ => panic!("expected failed job"),
        }
    }

    #[tokio::test]
    async fn oldest_finished_jobs_are_evicted() {
        let (queue, _worker) = SyncJobQueue::spawn_with_history(engine(Ok(Vec::new())), 2);
        let mut ids = Vec::new();
        for _ in 0..3 {
            let id = queue.enqueue_sync().await.expect("enqueue");
            wait_for_terminal(&queue, id).await;
            ids.push(id);
        }
        assert!(queue.get(ids[0]).await.is_none());
        assert!(queue.get(ids[1]).await.is_some());
        assert!(queue.get(ids[2]).await.is_some());
    }

    #[tokio::test]
    async fn schedule_runs_after_each_interval() {
        let engine = engine(Ok(Vec::new()));
        let settings = SyncSettings {
            schedule_enabled: true,
            interval: Duration::from_millis(200),
        };
        let handle = spawn_schedule(engine.clone(), settings).expect("schedule");
        tokio::task::yield_now().await;
        assert_eq!(engine.status().state, EngineState::Idle);

        tokio::time::sleep(Duration::from_millis(300)).await;
        let status = engine.status();
        assert_eq!(status.state, EngineState::Success);
        assert_eq!(
            status.last_report.map(|report| report.trigger),
            Some(SyncTrigger::Scheduled)
        );
        handle.abort();

        let disabled = SyncSettings {
            schedule_enabled: false,
            interval: Duration::from_secs(1),
        };
        assert!(spawn_schedule(engine, disabled).is_none());
    }
}
